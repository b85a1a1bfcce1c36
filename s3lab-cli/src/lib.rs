//! The `s3lab` command line tool.
//!
//! This wires the [`s3lab_harness`] load harness to an S3-compatible service through the
//! instrumented client of [`s3lab_service`], and adds configuration loading and log setup.

pub mod cli;
pub mod config;
pub mod observability;
pub mod pooling;
