/// Modification time stamped on every archive entry (2021-01-01).
pub const DEFAULT_MTIME: u64 = 1_609_488_000;

/// zstd level used for the final toolchain archive.
pub const COMPRESSION_LEVEL: i32 = 18;

/// Owner and group name recorded on every archive entry.
pub const ARCHIVE_OWNER: &str = "root";

/// Total download attempts before a transfer failure becomes fatal.
pub const DOWNLOAD_ATTEMPTS: u32 = 5;

/// Read buffer size used when streaming downloads and hashing files.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Prefix for ephemeral build workspaces.
pub const WORKSPACE_PREFIX: &str = "toolchain-bootstrap-";

/// Manifest schema version understood by this crate.
pub const MANIFEST_SCHEMA: u32 = 1;
