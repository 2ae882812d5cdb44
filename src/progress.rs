//! Upload progress reporting.
//!
//! Emitted on **stderr** so stdout stays reserved for answers. The CLI
//! picks human output when stderr is a TTY and nothing otherwise; the HTTP
//! server never reports progress.

use std::io::Write;

/// A single progress event during an upload.
#[derive(Clone, Debug)]
pub enum IngestProgressEvent {
    /// Extracting document `n` of `total`.
    Extracting { document: String, n: u64, total: u64 },
    /// Embedding `chunks` chunks into a fresh index.
    Indexing { chunks: u64 },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: IngestProgressEvent);
}

/// Human-friendly progress on stderr: "extract  2 / 5  report.pdf".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: IngestProgressEvent) {
        let line = match &event {
            IngestProgressEvent::Extracting { document, n, total } => {
                format!(
                    "extract  {} / {}  {}\n",
                    format_number(*n),
                    format_number(*total),
                    document
                )
            }
            IngestProgressEvent::Indexing { chunks } => {
                format!("index    embedding {} chunks\n", format_number(*chunks))
            }
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: IngestProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Human progress when stderr is a TTY, otherwise none.
pub fn default_reporter() -> Box<dyn ProgressReporter> {
    if atty::is(atty::Stream::Stderr) {
        Box::new(StderrProgress)
    } else {
        Box::new(NoProgress)
    }
}
