//! Model client abstraction: messages, the provider trait, and a test mock.

pub mod error;
#[cfg(feature = "mock")]
pub mod mock;
pub mod provider;

pub use error::LlmError;
pub use provider::{ChatStream, LlmProvider, Message, Role};
