//! Diagnostics sink for the preview pipeline.
//!
//! Each pass appends `{pass, level, message}` records instead of printing.
//! Records are mirrored to `tracing` so a host with a subscriber still gets
//! log lines at every pass boundary.

#[cfg(feature = "napi")]
use napi_derive::napi;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pass {
    Fences,
    Files,
    Modules,
    Types,
    Resolve,
    Verify,
    Harness,
    Lifecycle,
}

impl Pass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pass::Fences => "fences",
            Pass::Files => "files",
            Pass::Modules => "modules",
            Pass::Types => "types",
            Pass::Resolve => "resolve",
            Pass::Verify => "verify",
            Pass::Harness => "harness",
            Pass::Lifecycle => "lifecycle",
        }
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub pass: Pass,
    pub level: Level,
    pub message: String,
}

/// Flattened record handed across the napi boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "napi", napi(object))]
pub struct DiagnosticRecord {
    pub pass: String,
    pub level: String,
    pub message: String,
}

impl From<&Diagnostic> for DiagnosticRecord {
    fn from(d: &Diagnostic) -> Self {
        DiagnosticRecord {
            pass: d.pass.as_str().to_string(),
            level: match d.level {
                Level::Info => "info".to_string(),
                Level::Warn => "warn".to_string(),
            },
            message: d.message.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    records: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, pass: Pass, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(target: "preview", pass = pass.as_str(), "{}", message);
        self.records.push(Diagnostic {
            pass,
            level: Level::Info,
            message,
        });
    }

    pub fn warn(&mut self, pass: Pass, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(target: "preview", pass = pass.as_str(), "{}", message);
        self.records.push(Diagnostic {
            pass,
            level: Level::Warn,
            message,
        });
    }

    pub fn records(&self) -> &[Diagnostic] {
        &self.records
    }

    pub fn for_pass(&self, pass: Pass) -> impl Iterator<Item = &Diagnostic> {
        self.records.iter().filter(move |d| d.pass == pass)
    }

    pub fn has_warnings(&self) -> bool {
        self.records.iter().any(|d| d.level == Level::Warn)
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.records.extend(other.records);
    }

    pub fn to_records(&self) -> Vec<DiagnosticRecord> {
        self.records.iter().map(DiagnosticRecord::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_keep_order_and_pass() {
        let mut diags = Diagnostics::new();
        diags.info(Pass::Fences, "removed 2 fence lines");
        diags.warn(Pass::Resolve, "fell back to App");

        assert_eq!(diags.records().len(), 2);
        assert_eq!(diags.records()[0].pass, Pass::Fences);
        assert!(diags.has_warnings());
        assert_eq!(diags.for_pass(Pass::Resolve).count(), 1);

        let records = diags.to_records();
        assert_eq!(records[1].level, "warn");
        assert_eq!(records[1].pass, "resolve");
    }
}
