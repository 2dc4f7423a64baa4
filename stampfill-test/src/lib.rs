//! Test utilities for stampfill and its client.
//!
//! This crate provides utilities to facilitate testing against a storage node without running
//! one. See the modules for all available utilities.

pub mod node;
pub mod server;
pub mod tracing;
