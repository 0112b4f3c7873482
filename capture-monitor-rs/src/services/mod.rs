//! External service clients
//!
//! Each external system sits behind a trait so the pipeline can run against
//! in-memory implementations in tests.

pub mod judge;
pub mod storage;
pub mod tracking;
mod common;

pub use common::UserAgent;
pub use judge::{ChatJudgeClient, JudgeModel, JudgeRequest};
pub use storage::{MemoryObjectStore, ObjectStore, S3ObjectStore};
pub use tracking::{InMemoryTraceStore, MlflowTrackingClient, TraceStore};
