pub mod error;
pub mod runner;
pub mod service;
pub mod tasks;

pub use error::MonitorError;
pub use service::{CloseOutcome, DisputeHandler, MonitoringService, MonitoringServiceCreateArgs};
pub use tasks::{IngestionTaskTracker, ProofSink, TaskHandle, TaskId};
