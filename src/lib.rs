pub mod adapters;
pub mod catalog;
pub mod core;
pub mod credentials;
pub mod normalize;
pub mod queue;
pub mod registry;
pub mod routing;
pub mod runtime;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use core::types::*;
pub use queue::{PollPolicy, QueueClient, QueueClientBuilder};
pub use runtime::{ExecutionMode, GenerationOutput, MediaRuntime, MediaRuntimeBuilder};
