//! Host introspection.
//!
//! Platform facts are resolved once, through a [`PlatformProbe`], into a
//! [`HostInfo`] value that the rest of the pipeline receives explicitly.

pub mod arch;

use std::fmt;

pub use arch::Arch;

/// Facts about the machine a pipeline run executes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostInfo {
  pub arch: Arch,
  pub cpus: usize,
}

impl HostInfo {
  /// Target triple for this host on the given vendor/OS pair
  /// (e.g. `aarch64-apple-darwin`).
  pub fn triple(&self, platform: &str) -> String {
    format!("{}-{}", self.arch, platform)
  }
}

impl fmt::Display for HostInfo {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({} cpus)", self.arch, self.cpus)
  }
}

/// Source of platform facts.
pub trait PlatformProbe {
  fn arch(&self) -> Option<Arch>;
  fn cpu_count(&self) -> usize;

  /// Resolve everything the pipeline needs in one go.
  ///
  /// Returns `None` when the architecture is not supported.
  fn probe(&self) -> Option<HostInfo> {
    Some(HostInfo {
      arch: self.arch()?,
      cpus: self.cpu_count().max(1),
    })
  }
}

/// Probe for the machine we are running on.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostProbe;

impl PlatformProbe for HostProbe {
  fn arch(&self) -> Option<Arch> {
    Arch::current()
  }

  fn cpu_count(&self) -> usize {
    std::thread::available_parallelism().map(|p| p.get()).unwrap_or(1)
  }
}

/// Probe returning fixed answers, for cross-architecture runs and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedProbe {
  pub arch: Arch,
  pub cpus: usize,
}

impl PlatformProbe for FixedProbe {
  fn arch(&self) -> Option<Arch> {
    Some(self.arch)
  }

  fn cpu_count(&self) -> usize {
    self.cpus
  }
}
