//! # hull-common
//!
//! Shared types, error definitions, configuration models, and constants
//! used across the entire hull workspace.
//!
//! This crate is the leaf of the dependency graph: it depends on no other
//! internal crate and provides the on-disk record formats and path layout
//! that every other crate agrees on.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod constants;
pub mod error;
pub mod layout;
pub mod types;
