//! # hull-core
//!
//! Low-level Linux isolation primitives for the hull runtime.
//!
//! This crate provides safe abstractions over:
//! - **Namespaces**: clone flags for PID, Mount, Network, IPC, and UTS
//!   isolation, and a scoped guard for entering a container's network
//!   namespace.
//! - **Cgroups v1**: cpuset, memory, and cpu-share resource limiting.
//! - **Filesystem**: `OverlayFS` workspaces, volumes, and `pivot_root`.
//!
//! Kernel calls go through `nix`. Operations that touch the host are
//! gated on Linux; other targets get stubs returning a configuration error.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod cgroup;
pub mod filesystem;
pub mod namespace;
