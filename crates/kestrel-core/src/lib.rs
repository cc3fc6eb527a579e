//! Agent turn controller, channel abstraction, and configuration loading.

pub mod agent;
pub mod channel;
pub mod config;

pub use agent::{Agent, AgentError, TurnPhase, TurnReport};
pub use channel::{Channel, ChannelError, ChannelMessage};
pub use config::{AgentConfig, Config};
