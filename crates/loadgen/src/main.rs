use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use loadgen_core::report::{parse_trace, parse_trace_file, reconstruct, Summary};
use loadgen_core::{LoadGenerator, Paging, RunConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Paged HTTP load generator: sends seed URLs in fixed-size concurrent pages
/// and writes a REQSTART/REQEND trace.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a test from a seed file
    Run(RunArgs),
    /// Summarize a trace (files, or both files concatenated on stdin)
    Report(ReportArgs),
}

/// Flags left unset keep the value from `--config` (or the built-in default).
#[derive(Args, Debug, Default)]
struct RunArgs {
    /// JSON run configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// text file with the list of urls
    #[arg(short = 'i', long = "inputfile")]
    inputfile: Option<PathBuf>,

    /// first line (0-based) of the seed file to use
    #[arg(long = "lfrom", visible_alias = "from-line")]
    lfrom: Option<usize>,

    /// last line (inclusive) of the seed file to use
    #[arg(long = "lto", visible_alias = "to-line")]
    lto: Option<usize>,

    /// seconds to wait after every batch
    #[arg(short = 'w', long = "wait")]
    wait: Option<f64>,

    /// size of the batch (requests sent concurrently)
    #[arg(short = 's', long = "size")]
    size: Option<usize>,

    /// base name for the -start.csv / -end.csv files
    #[arg(short = 'o', long)]
    output: Option<String>,

    /// per-request timeout in ms (0 = none)
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// use the old page boundary rule (skips/re-sends at page edges)
    #[arg(long, default_value_t = false)]
    legacy_paging: bool,

    #[arg(short = 'v', long, default_value_t = false)]
    verbose: bool,
}

impl RunArgs {
    fn into_config(self) -> anyhow::Result<RunConfig> {
        let mut cfg = match &self.config {
            Some(path) => RunConfig::from_json_file(path)?,
            None => RunConfig::default(),
        };

        if let Some(v) = self.inputfile {
            cfg.seed_file = v;
        }
        if let Some(v) = self.lfrom {
            cfg.from_line = v;
        }
        if let Some(v) = self.lto {
            cfg.to_line = v;
        }
        if let Some(v) = self.wait {
            cfg.spare_time = v;
        }
        if let Some(v) = self.size {
            cfg.requests_per_second = v;
        }
        if let Some(v) = self.output {
            cfg.output = Some(v);
        }
        if let Some(v) = self.timeout_ms {
            cfg.timeout_ms = v;
        }
        if self.legacy_paging {
            cfg.paging = Paging::Legacy;
        }
        cfg.verbose |= self.verbose;

        cfg.validate()?;
        Ok(cfg)
    }
}

#[derive(Args, Debug)]
struct ReportArgs {
    /// <name>-start.csv
    #[arg(long, requires = "end")]
    start: Option<PathBuf>,

    /// <name>-end.csv
    #[arg(long, requires = "start")]
    end: Option<PathBuf>,
}

/// Default directives on top of `RUST_LOG`; `verbose` turns on debug for our crates.
fn env_filter(verbose: bool) -> anyhow::Result<EnvFilter> {
    let mut filter = EnvFilter::from_default_env().add_directive("info".parse()?);
    if verbose {
        filter = filter
            .add_directive("loadgen=debug".parse()?)
            .add_directive("loadgen_core=debug".parse()?);
    }
    Ok(filter)
}

fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(env_filter(verbose)?)
        .with(tracing_subscriber::fmt::layer())
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Command::Run(args) => {
            let cfg = args.into_config()?;
            init_tracing(cfg.verbose)?;
            run(cfg).await
        }
        Command::Report(args) => {
            init_tracing(false)?;
            report(args)
        }
    }
}

async fn run(cfg: RunConfig) -> anyhow::Result<()> {
    tracing::debug!(?cfg, "resolved run config");
    println!("Starting test...");
    let artifacts = LoadGenerator::new(cfg)?.run().await?;
    println!("Test finished!");

    println!(
        "pages={} dispatched={} recorded={}",
        artifacts.outcome.pages.len(),
        artifacts.outcome.dispatched(),
        artifacts.outcome.store.len()
    );
    println!("output file with name: {}", artifacts.paths.start.display());
    println!("output file with name: {}", artifacts.paths.end.display());
    Ok(())
}

fn report(args: ReportArgs) -> anyhow::Result<()> {
    let lines = match (args.start, args.end) {
        (Some(start), Some(end)) => {
            let mut lines = parse_trace_file(&start)?;
            lines.extend(parse_trace_file(&end)?);
            lines
        }
        // 和画图脚本一样：两个文件 cat 到 stdin
        _ => parse_trace(std::io::stdin().lock()).context("read trace from stdin")?,
    };

    let spans = reconstruct(&lines);
    let summary = Summary::from_spans(&spans)?;
    println!("{summary}");
    Ok(())
}
