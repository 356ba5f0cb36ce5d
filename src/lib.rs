//! # prodev-agent
//!
//! An autonomous coding agent that plans work for a target repository, asks
//! a generative model for concrete file edits, applies them, and persists
//! its own task list, conversation history, and learned context *inside
//! that same repository*.
//!
//! Every HTTP request is handled by an independent, stateless invocation:
//! all durable state lives as JSON documents under `.prodev/` in the target
//! repository, and all caches are request-scoped.
//!
//! ## Architecture
//!
//! - [`store::RepoStateStore`] — JSON documents over a remote file host
//! - [`indexer::CodebaseIndexer`] — incremental lexical indexing
//! - [`agent::TaskPlanner`] / [`agent::TaskImplementer`] / [`agent::BatchRunner`]
//! - [`agent::ConversationEngine`] — chat with typed tool calls
//! - [`agent::AutonomousFollowUp`] — bounded follow-up action chains

pub mod agent;
pub mod api;
pub mod config;
pub mod deploy;
pub mod error;
pub mod indexer;
pub mod jsonfix;
pub mod llm;
pub mod remote;
pub mod search;
pub mod store;
pub mod tools;
pub mod types;

pub use config::Config;
pub use error::{AgentError, Result};
