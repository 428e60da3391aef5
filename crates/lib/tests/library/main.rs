//! Integration tests for the toolchain-bootstrap library.

mod archive_tests;
mod download_tests;
mod pipeline_tests;
