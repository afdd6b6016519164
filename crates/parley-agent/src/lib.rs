//! parley-agent: Turn-taking conversation orchestrator
//!
//! This crate provides the state machine that sequences speech capture, the
//! streaming chat exchange and speech synthesis for one conversation, along
//! with the snapshot, event and handle types used to observe and drive it.

pub mod config;
pub mod conversation;
pub mod error;
pub mod events;
pub mod greetings;
pub mod handle;
pub mod orchestrator;

pub use config::{OrchestratorConfig, SettleDelays};
pub use conversation::{ConversationState, Phase, Snapshot};
pub use error::{Error, Result};
pub use events::{ConversationEvent, ErrorKind};
pub use handle::ConversationHandle;
pub use orchestrator::Orchestrator;
