//! Downloads against a local HTTP server.

use std::fs;
use std::io::Write;
use std::net::TcpListener;

use flate2::Compression;
use flate2::write::GzEncoder;
use tempfile::TempDir;
use toolchain_bootstrap::fetch::{DownloadState, Downloader, FetchError};
use toolchain_bootstrap::manifest::ArtifactSpec;
use toolchain_bootstrap::util::hash::hash_bytes;

fn spec(name: &str, url: String, content: &[u8]) -> ArtifactSpec {
  ArtifactSpec {
    name: name.to_string(),
    url,
    sha256: hash_bytes(content),
    version: "3.26.3".to_string(),
  }
}

fn gzip(data: &[u8]) -> Vec<u8> {
  let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
  encoder.write_all(data).unwrap();
  encoder.finish().unwrap()
}

#[test]
fn downloads_and_verifies() {
  let mut server = mockito::Server::new();
  let body = b"cmake release tarball".to_vec();
  let mock = server
    .mock("GET", "/cmake-3.26.3.tar")
    .with_status(200)
    .with_body(&body)
    .expect(1)
    .create();

  let temp = TempDir::new().unwrap();
  let downloader = Downloader::http().unwrap();
  let fetched = downloader
    .fetch(&spec("cmake", format!("{}/cmake-3.26.3.tar", server.url()), &body), temp.path())
    .unwrap();

  mock.assert();
  assert_eq!(fetched.path, temp.path().join("cmake-3.26.3.tar"));
  assert_eq!(fetched.attempts, 1);
  assert_eq!(fetched.state, DownloadState::Verified { cached: false });
  assert_eq!(fs::read(&fetched.path).unwrap(), body);
  assert!(!temp.path().join("cmake-3.26.3.tar.tmp").exists());
}

#[test]
fn verified_file_is_not_downloaded_again() {
  let mut server = mockito::Server::new();
  let body = b"ninja".to_vec();
  let mock = server.mock("GET", "/ninja-mac.zip").with_body(&body).expect(0).create();

  let temp = TempDir::new().unwrap();
  fs::write(temp.path().join("ninja-mac.zip"), &body).unwrap();

  let fetched = Downloader::http()
    .unwrap()
    .fetch(&spec("ninja", format!("{}/ninja-mac.zip", server.url()), &body), temp.path())
    .unwrap();

  mock.assert();
  assert_eq!(fetched.attempts, 0);
  assert_eq!(fetched.state, DownloadState::Verified { cached: true });
}

#[test]
fn stale_file_is_replaced() {
  let mut server = mockito::Server::new();
  let body = b"fresh".to_vec();
  let mock = server.mock("GET", "/llvm.src.tar.xz").with_body(&body).expect(1).create();

  let temp = TempDir::new().unwrap();
  fs::write(temp.path().join("llvm.src.tar.xz"), "stale").unwrap();

  Downloader::http()
    .unwrap()
    .fetch(&spec("llvm", format!("{}/llvm.src.tar.xz", server.url()), &body), temp.path())
    .unwrap();

  mock.assert();
  assert_eq!(fs::read(temp.path().join("llvm.src.tar.xz")).unwrap(), body);
}

#[test]
fn server_errors_use_every_attempt() {
  let mut server = mockito::Server::new();
  let mock = server.mock("GET", "/flaky.tar").with_status(503).expect(5).create();

  let temp = TempDir::new().unwrap();
  let err = Downloader::http()
    .unwrap()
    .fetch(&spec("flaky", format!("{}/flaky.tar", server.url()), b"x"), temp.path())
    .unwrap_err();

  mock.assert();
  assert!(err.is_retryable());
  assert!(matches!(err, FetchError::Transfer { attempts: 5, .. }));
  assert!(!temp.path().join("flaky.tar").exists());
  assert!(!temp.path().join("flaky.tar.tmp").exists());
}

#[test]
fn connection_failures_use_every_attempt() {
  // Reserve a port, then close it so every connection is refused.
  let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();

  let temp = TempDir::new().unwrap();
  let err = Downloader::http()
    .unwrap()
    .fetch(&spec("gone", format!("http://127.0.0.1:{port}/gone.tar"), b"x"), temp.path())
    .unwrap_err();

  assert!(err.is_retryable());
  assert!(matches!(err, FetchError::Transfer { attempts: 5, .. }));
  assert!(!temp.path().join("gone.tar").exists());
  assert!(!temp.path().join("gone.tar.tmp").exists());
}

#[test]
fn integrity_mismatch_is_not_retried() {
  let mut server = mockito::Server::new();
  let mock = server
    .mock("GET", "/sccache.tar.gz")
    .with_body("tampered")
    .expect(1)
    .create();

  let temp = TempDir::new().unwrap();
  let expected = spec("sccache", format!("{}/sccache.tar.gz", server.url()), b"genuine");
  let err = Downloader::http().unwrap().fetch(&expected, temp.path()).unwrap_err();

  mock.assert();
  assert!(!err.is_retryable());
  match err {
    FetchError::Integrity { expected: want, actual, .. } => {
      assert_eq!(want, hash_bytes(b"genuine").to_string());
      assert_eq!(actual, hash_bytes(b"tampered").to_string());
    }
    other => panic!("unexpected error: {other}"),
  }
  assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[test]
fn gzip_content_encoding_is_decoded() {
  let mut server = mockito::Server::new();
  let plain = b"uncompressed payload ".repeat(64);
  let mock = server
    .mock("GET", "/payload.tar")
    .with_header("content-encoding", "gzip")
    .with_body(gzip(&plain))
    .create();

  let temp = TempDir::new().unwrap();
  let fetched = Downloader::http()
    .unwrap()
    .fetch(&spec("payload", format!("{}/payload.tar", server.url()), &plain), temp.path())
    .unwrap();

  mock.assert();
  assert_eq!(fs::read(fetched.path).unwrap(), plain);
}

#[test]
fn gzip_file_is_stored_as_served() {
  let mut server = mockito::Server::new();
  let compressed = gzip(b"a tarball");
  let mock = server
    .mock("GET", "/cmake.tar.gz")
    .with_header("content-encoding", "gzip")
    .with_body(&compressed)
    .create();

  let temp = TempDir::new().unwrap();
  let fetched = Downloader::http()
    .unwrap()
    .fetch(&spec("cmake", format!("{}/cmake.tar.gz", server.url()), &compressed), temp.path())
    .unwrap();

  mock.assert();
  assert_eq!(fs::read(fetched.path).unwrap(), compressed);
}
