//! Nested-container RPC client used by command probes that run inside the
//! observed task's container rather than directly in the supervisor's
//! process tree.

mod client;
pub mod protocol;
pub mod recordio;
pub mod waitstatus;

pub use client::{AgentClient, AgentError};
