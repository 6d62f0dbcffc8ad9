//! Core types for smart-query
//!
//! Domain types shared by the storage, LLM, service and CLI crates: verified
//! queries, adaptation results, conversation context and the session event
//! protocol exchanged with observers.

mod adaptation;
mod constants;
mod conversation;
mod env_config;
mod events;
mod json_utils;
mod verified_query;

pub use adaptation::*;
pub use constants::*;
pub use conversation::*;
pub use env_config::*;
pub use events::*;
pub use json_utils::*;
pub use verified_query::*;
