#[cfg(feature = "napi")]
use napi_derive::napi;
use serde::{Deserialize, Serialize};
use std::fmt;

// ═══════════════════════════════════════════════════════════════════════════════
// INPUT
// ═══════════════════════════════════════════════════════════════════════════════

/// Raw generated source as handed over by the host on every change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDocument {
    pub code: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub class_name: Option<String>,
}

impl SourceDocument {
    pub fn new(code: impl Into<String>) -> Self {
        SourceDocument {
            code: code.into(),
            filename: None,
            class_name: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub fn is_blank(&self) -> bool {
        self.code.trim().is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOGICAL FILES
// ═══════════════════════════════════════════════════════════════════════════════

/// A file recovered from a concatenated multi-file blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalFile {
    pub path: String,
    pub content: String,
}

impl LogicalFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        LogicalFile {
            path: path.into(),
            content: content.into(),
        }
    }

    /// File name without directories.
    pub fn basename(&self) -> &str {
        self.path
            .rsplit(|c| c == '/' || c == '\\')
            .next()
            .unwrap_or(&self.path)
    }

    /// File name without directories or any extension (`App.test.tsx` → `App`).
    pub fn stem(&self) -> &str {
        let base = self.basename();
        base.split('.').next().unwrap_or(base)
    }

    /// Lowercased extension, with `.d.ts` reported as `d.ts`.
    pub fn extension(&self) -> String {
        let base = self.basename().to_lowercase();
        if base.ends_with(".d.ts") || base.ends_with(".d.tsx") {
            return "d.ts".to_string();
        }
        match base.rfind('.') {
            Some(idx) if idx > 0 => base[idx + 1..].to_string(),
            _ => String::new(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSFORMATION OUTPUT
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of the stripping passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "napi", napi(object))]
#[serde(rename_all = "camelCase")]
pub struct TransformationResult {
    pub is_multi_file: bool,
    pub processed_code: String,
    pub component_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentSource {
    ExportDefault,
    DeclaredConst,
    DeclaredFunction,
    DeclaredClass,
    Filename,
    Fallback,
}

impl fmt::Display for ComponentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComponentSource::ExportDefault => "export-default",
            ComponentSource::DeclaredConst => "declared-const",
            ComponentSource::DeclaredFunction => "declared-function",
            ComponentSource::DeclaredClass => "declared-class",
            ComponentSource::Filename => "filename",
            ComponentSource::Fallback => "fallback",
        };
        f.write_str(s)
    }
}

/// The entry symbol the harness mounts, with where it was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    pub name: String,
    pub source: ComponentSource,
}

/// Bindings removed with an `import` statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBinding {
    pub source: String,
    pub default: Option<String>,
    pub namespace: Option<String>,
    /// `(imported, local)` pairs.
    pub named: Vec<(String, String)>,
    pub type_only: bool,
}

impl ImportBinding {
    pub fn is_relative(&self) -> bool {
        self.source.starts_with('.') || self.source.starts_with('/') || self.source.starts_with("@/")
    }

    /// Every local name this import introduced.
    pub fn local_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        if let Some(d) = &self.default {
            names.push(d.as_str());
        }
        if let Some(ns) = &self.namespace {
            names.push(ns.as_str());
        }
        for (_, local) in &self.named {
            names.push(local.as_str());
        }
        names
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RENDER DOCUMENT
// ═══════════════════════════════════════════════════════════════════════════════

/// Complete executable document handed to the sandbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "napi", napi(object))]
#[serde(rename_all = "camelCase")]
pub struct RenderDocument {
    pub html: String,
    pub run_id: String,
    pub component_name: String,
    pub libraries: Vec<String>,
    /// True when this document only displays a build failure.
    pub is_error: bool,
}
