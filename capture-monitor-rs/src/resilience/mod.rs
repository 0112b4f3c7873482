//! Resilience patterns
//!
//! The only retry in the pipeline is the two-pass evaluation run; it is
//! expressed as a named [`RetryConfig`] preset executed by [`RetryExecutor`].

mod retry;

pub use retry::{RetryConfig, RetryExecutor};
