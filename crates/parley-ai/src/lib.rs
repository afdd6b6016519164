//! parley-ai: Streaming chat exchange layer
//!
//! This crate provides the message types sent to the chat endpoint, the
//! line-framed streaming client, and the accumulator that assembles a reply
//! from its deltas.

pub mod client;
pub mod error;
pub mod frame;
pub mod stream;
pub mod types;

pub use client::{ChatClient, HttpChatClient};
pub use error::{Error, Result};
pub use stream::{ChatEvent, ChatEventStream, TranscriptAccumulator};
pub use types::*;
