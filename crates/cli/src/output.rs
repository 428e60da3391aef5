//! Terminal reporting for the CLI.
//!
//! Commands print one status line followed by an aligned block of facts.
//! Colors are applied only when the target stream supports them.

use std::time::Duration;

use owo_colors::{OwoColorize, Stream};

/// Outcome marker shown in front of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
  Done,
  Failed,
  Note,
}

impl Status {
  fn marker(self) -> &'static str {
    match self {
      Status::Done => "✓",
      Status::Failed => "✗",
      Status::Note => "•",
    }
  }
}

/// Print `message` with the marker for `status`. Failures go to stderr.
pub fn status(status: Status, message: &str) {
  let marker = status.marker();
  match status {
    Status::Done => println!("{} {message}", marker.if_supports_color(Stream::Stdout, |s| s.green())),
    Status::Note => println!("{} {message}", marker.if_supports_color(Stream::Stdout, |s| s.blue())),
    Status::Failed => eprintln!(
      "{} {}",
      marker.if_supports_color(Stream::Stderr, |s| s.red()),
      message.if_supports_color(Stream::Stderr, |s| s.red())
    ),
  }
}

/// Labelled values printed as one indented, column-aligned block.
#[derive(Debug, Default)]
pub struct Facts {
  rows: Vec<(&'static str, String)>,
}

impl Facts {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add(mut self, label: &'static str, value: impl Into<String>) -> Self {
    self.rows.push((label, value.into()));
    self
  }

  fn lines(&self) -> Vec<(String, &str)> {
    let width = self.rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    self
      .rows
      .iter()
      .map(|(label, value)| (format!("{label:<width$}"), value.as_str()))
      .collect()
  }

  pub fn print(&self) {
    for (label, value) in self.lines() {
      println!("  {}  {value}", label.if_supports_color(Stream::Stdout, |s| s.dimmed()));
    }
  }
}

/// Size in binary units, with the exact byte count for anything above a KiB.
pub fn format_size(bytes: u64) -> String {
  const UNITS: [&str; 3] = ["KiB", "MiB", "GiB"];

  let mut scaled = bytes as f64;
  let mut unit = None;
  for name in UNITS {
    if scaled < 1024.0 {
      break;
    }
    scaled /= 1024.0;
    unit = Some(name);
  }

  match unit {
    Some(unit) => format!("{scaled:.1} {unit} ({bytes} bytes)"),
    None => format!("{bytes} bytes"),
  }
}

pub fn format_elapsed(elapsed: Duration) -> String {
  let secs = elapsed.as_secs();
  match secs {
    0 => format!("{}ms", elapsed.subsec_millis()),
    1..60 => format!("{:.1}s", elapsed.as_secs_f64()),
    _ => format!("{}m {:02}s", secs / 60, secs % 60),
  }
}

/// Join an error and its causes into one line, skipping causes whose text
/// is already part of the message.
pub fn error_chain(err: &anyhow::Error) -> String {
  let mut message = String::new();
  for cause in err.chain() {
    let text = cause.to_string();
    if message.contains(&text) {
      continue;
    }
    if !message.is_empty() {
      message.push_str(": ");
    }
    message.push_str(&text);
  }
  message
}
