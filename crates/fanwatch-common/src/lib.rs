//! # fanwatch-common
//!
//! Shared types, error definitions, configuration models, and kernel
//! constants used across the fanwatch workspace.
//!
//! This crate is the leaf of the dependency graph. It depends on no other
//! internal crate and never touches the kernel itself; it only describes
//! the values the engine in `fanwatch-core` exchanges with its host.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
