//! Full pipeline runs against a local HTTP server and a stub build driver.

#![cfg(unix)]

use std::fs;
use std::io::Read;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use toolchain_bootstrap::fetch::Downloader;
use toolchain_bootstrap::manifest::Manifest;
use toolchain_bootstrap::pipeline::{Pipeline, PipelineError, Stage};
use toolchain_bootstrap::platform::{Arch, FixedProbe, PlatformProbe};
use toolchain_bootstrap::util::hash::hash_bytes;

const INPUTS: [(&str, &str, &[u8]); 3] = [
  ("cmake", "cmake-3.26.3-macos-universal.tar.gz", b"cmake bytes"),
  ("ninja", "ninja-mac.zip", b"ninja bytes"),
  ("llvm", "llvm-project-17.0.6.src.tar.xz", b"llvm bytes"),
];

fn manifest_for(server_url: &str) -> Manifest {
  let mut text = String::from(
    r#"
schema = 1
tool = "llvm"
driver = "clang-macos.sh"
platform = "apple-darwin"
deployment_target = "11.0"
output_dir = "out/toolchain"
path_prefix = "llvm"
export_host_triple = true
"#,
  );
  for (name, file, body) in INPUTS {
    text.push_str(&format!(
      "\n[[artifacts]]\nname = \"{name}\"\nversion = \"1.{}\"\nurl = \"{server_url}/{file}\"\nsha256 = \"{}\"\n",
      name.len(),
      hash_bytes(body)
    ));
  }
  Manifest::from_toml(&text).unwrap()
}

fn driver(dir: &Path, body: &str) -> PathBuf {
  fs::create_dir_all(dir).unwrap();
  let path = dir.join("clang-macos.sh");
  fs::write(&path, format!("#!/bin/sh\nset -e\n{body}\n")).unwrap();
  fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
  path
}

fn pipeline(workspace_root: &Path) -> Pipeline {
  let host = FixedProbe {
    arch: Arch::Aarch64,
    cpus: 4,
  }
  .probe()
  .unwrap();
  Pipeline::new(Downloader::http().unwrap(), host).with_workspace_root(workspace_root)
}

#[test]
fn builds_archive_from_stub_driver() {
  let mut server = mockito::Server::new();
  let mocks: Vec<_> = INPUTS
    .iter()
    .map(|(_, file, body)| server.mock("GET", format!("/{file}").as_str()).with_body(body).expect(1).create())
    .collect();

  let temp = TempDir::new().unwrap();
  let scripts = temp.path().join("scripts");
  let artifacts = temp.path().join("artifacts");
  let driver = driver(
    &scripts,
    r#"
for f in cmake-3.26.3-macos-universal.tar.gz ninja-mac.zip llvm-project-17.0.6.src.tar.xz; do test -f "$f"; done
mkdir -p out/toolchain/bin out/toolchain/lib/clang
printf '%s|%s|%s|%s|%s' "$CMAKE_VERSION" "$NINJA_VERSION" "$LLVM_VERSION" "$NUM_CPUS" "$NUM_JOBS_AGGRESSIVE" > out/toolchain/env
printf '%s' "$HOST_TRIPLE" > out/toolchain/triple
printf 'clang' > out/toolchain/bin/clang
ln -s clang out/toolchain/bin/cc
"#,
  );

  let manifest = manifest_for(&server.url());
  let output = pipeline(&temp.path().join("ws")).run(&manifest, &driver, &artifacts).unwrap();

  for mock in &mocks {
    mock.assert();
  }
  assert_eq!(output.path, artifacts.join("llvm-aarch64-apple-darwin.tar.zst"));
  for (_, file, body) in INPUTS {
    assert_eq!(fs::read(artifacts.join(file)).unwrap(), body);
  }
  assert_eq!(fs::read_dir(temp.path().join("ws")).unwrap().count(), 0);

  let decoder = zstd::Decoder::new(fs::File::open(&output.path).unwrap()).unwrap();
  let mut archive = tar::Archive::new(decoder);
  let mut names = Vec::new();
  for entry in archive.entries().unwrap() {
    let mut entry = entry.unwrap();
    let name = entry.path().unwrap().to_string_lossy().into_owned();
    let mut content = String::new();
    entry.read_to_string(&mut content).unwrap();
    match name.as_str() {
      "llvm/env" => assert_eq!(content, "1.5|1.5|1.4|4|8"),
      "llvm/triple" => assert_eq!(content, "aarch64-apple-darwin"),
      _ => {}
    }
    names.push(name);
  }
  assert_eq!(
    names,
    [
      "llvm/bin",
      "llvm/lib",
      "llvm/env",
      "llvm/triple",
      "llvm/bin/cc",
      "llvm/bin/clang",
      "llvm/lib/clang"
    ]
  );
}

#[test]
fn rebuild_is_byte_identical_and_offline() {
  let mut server = mockito::Server::new();
  let mocks: Vec<_> = INPUTS
    .iter()
    .map(|(_, file, body)| server.mock("GET", format!("/{file}").as_str()).with_body(body).expect(1).create())
    .collect();

  let temp = TempDir::new().unwrap();
  let artifacts = temp.path().join("artifacts");
  let driver = driver(
    &temp.path().join("scripts"),
    "mkdir -p out/toolchain/share\nprintf doc > out/toolchain/share/README",
  );
  let manifest = manifest_for(&server.url());

  let first = pipeline(&temp.path().join("ws")).run(&manifest, &driver, &artifacts).unwrap();
  let first_bytes = fs::read(&first.path).unwrap();
  let second = pipeline(&temp.path().join("ws")).run(&manifest, &driver, &artifacts).unwrap();

  for mock in &mocks {
    mock.assert();
  }
  assert_eq!(first.sha256, second.sha256);
  assert_eq!(first_bytes, fs::read(&second.path).unwrap());
}

#[test]
fn failed_download_stops_before_the_driver_runs() {
  let mut server = mockito::Server::new();
  let _ok = server.mock("GET", "/cmake-3.26.3-macos-universal.tar.gz").with_body("cmake bytes").create();
  let bad = server
    .mock("GET", "/ninja-mac.zip")
    .with_body("not ninja")
    .expect(1)
    .create();
  let never = server.mock("GET", "/llvm-project-17.0.6.src.tar.xz").expect(0).create();

  let temp = TempDir::new().unwrap();
  let marker = temp.path().join("driver-ran");
  let driver = driver(&temp.path().join("scripts"), &format!("touch {}", marker.display()));

  let err = pipeline(&temp.path().join("ws"))
    .run(&manifest_for(&server.url()), &driver, &temp.path().join("artifacts"))
    .unwrap_err();

  bad.assert();
  never.assert();
  assert_eq!(err.stage(), Stage::FetchingInputs);
  assert!(matches!(err, PipelineError::Fetch { ref name, .. } if name == "ninja"));
  assert!(!marker.exists());
  assert!(!temp.path().join("artifacts/llvm-aarch64-apple-darwin.tar.zst").exists());
}
