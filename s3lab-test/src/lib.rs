//! Test utilities for s3lab.
//!
//! This crate provides utilities to facilitate testing of the s3lab crates. See the modules for
//! all available utilities.

pub mod logs;
pub mod tracing;
