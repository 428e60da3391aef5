//! toolchain-bootstrap: reproducible toolchain archives
//!
//! This crate drives the whole pipeline that turns a pinned list of build
//! inputs into a byte-deterministic `.tar.zst` toolchain:
//! - `manifest`: pinned, hash-identified artifacts per tool
//! - `fetch`: integrity-verified, retried downloads with atomic commit
//! - `archive`: deterministic tar assembly from a directory tree
//! - `pipeline`: staging, build driver invocation and packaging
//! - `tablegen`: normalization of `llvm-tblgen` JSON dumps

pub mod archive;
pub mod consts;
pub mod fetch;
pub mod manifest;
pub mod pipeline;
pub mod platform;
pub mod tablegen;
pub mod util;
