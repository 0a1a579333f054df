pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod export;
pub mod generator;
pub mod report;
pub mod scheduler;
pub mod seed;
pub mod store;
pub mod trace;
pub mod util;

pub use config::RunConfig;
pub use generator::{LoadGenerator, RunArtifacts};
pub use scheduler::{BatchScheduler, Paging};
pub use store::TraceStore;
pub use trace::TraceRecord;
