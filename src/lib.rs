#![deny(unsafe_code)]

//! `task-checker` — per-task health-check supervisor.
//!
//! A long-lived, per-task component that periodically probes a running
//! task's liveness or readiness through one of several probe protocols
//! (command, HTTP, TCP), funnels each probe outcome through a uniform
//! result pipeline, and notifies an upstream observer. See [`check`] for
//! the core supervisor and [`agent`] for the nested-container RPC client
//! used by command probes that run inside the observed task's container.
//!
//! Entering a task's namespaces and isolating a probe child's process
//! group are the only operations that need anything beyond safe Rust, and
//! both are expressed with the stable, safe `process_group` builder method
//! plus `nix`'s safe signal wrappers — so the crate denies `unsafe_code`
//! outright rather than forbidding it with no exceptions.

pub mod agent;
pub mod check;
pub mod config;
pub mod errors;

pub use errors::{AppError, Result};
