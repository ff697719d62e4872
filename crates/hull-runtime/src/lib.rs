//! Container lifecycle management for the hull runtime.
//!
//! [`engine::Engine`] drives `run`, `stop`, `rm` and friends on top of the
//! isolated-process launcher in [`process`] and the in-container bootstrap
//! in [`init`]. Container state persists through [`state::RecordStore`].

#![allow(unsafe_code)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod commit;
pub mod engine;
pub mod exec;
pub mod init;
pub mod logs;
pub mod process;
pub mod state;

pub use engine::{Engine, RunOptions, RunOutcome};
