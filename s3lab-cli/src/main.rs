//! Connection pool load tester for S3-compatible object stores.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

fn main() -> anyhow::Result<()> {
    s3lab_cli::cli::execute()
}
