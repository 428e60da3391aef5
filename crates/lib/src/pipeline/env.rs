//! Environment handed to the build driver.

use std::collections::BTreeMap;

use crate::manifest::{ArtifactSpec, Manifest};
use crate::platform::HostInfo;

pub const NUM_CPUS: &str = "NUM_CPUS";
pub const NUM_JOBS_AGGRESSIVE: &str = "NUM_JOBS_AGGRESSIVE";
pub const MACOSX_DEPLOYMENT_TARGET: &str = "MACOSX_DEPLOYMENT_TARGET";
pub const HOST_TRIPLE: &str = "HOST_TRIPLE";

/// Job count for builds that should saturate the machine.
pub fn aggressive_jobs(cpus: usize) -> usize {
  (cpus + 2).max(cpus * 2)
}

/// Variables exported to the build driver, in addition to the inherited
/// process environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildEnvironment {
  vars: BTreeMap<String, String>,
}

impl BuildEnvironment {
  /// Derive the environment for one run.
  pub fn new(manifest: &Manifest, artifacts: &[&ArtifactSpec], host: &HostInfo) -> Self {
    let mut vars = BTreeMap::new();

    for spec in artifacts {
      vars.insert(spec.version_var(), spec.version.clone());
    }

    vars.insert(NUM_CPUS.to_string(), host.cpus.to_string());
    vars.insert(NUM_JOBS_AGGRESSIVE.to_string(), aggressive_jobs(host.cpus).to_string());
    vars.insert(MACOSX_DEPLOYMENT_TARGET.to_string(), manifest.deployment_target.clone());

    if manifest.export_host_triple {
      vars.insert(HOST_TRIPLE.to_string(), host.triple(&manifest.platform));
    }

    Self { vars }
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self.vars.get(key).map(String::as_str)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }

  pub fn len(&self) -> usize {
    self.vars.len()
  }

  pub fn is_empty(&self) -> bool {
    self.vars.is_empty()
  }
}
