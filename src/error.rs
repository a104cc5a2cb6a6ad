use thiserror::Error;

/// Failures surfaced by the preview pipeline and its lifecycle.
///
/// Detection fallbacks are not errors; they are reported through
/// [`crate::diagnostics::Diagnostics`] instead.
#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("No code to preview: the generated source is empty")]
    EmptyInput,

    #[error("Failed to build preview: {0}")]
    Transformation(String),

    #[error("{message}")]
    SandboxRuntime {
        message: String,
        stack: Option<String>,
    },

    #[error("Invalid preview options: {0}")]
    InvalidOptions(#[from] serde_json::Error),

    #[error("Preview builder panicked: {0}")]
    Panicked(String),
}

impl PreviewError {
    /// Title shown on the error card for this failure.
    pub fn title(&self) -> &'static str {
        match self {
            Self::EmptyInput => "Nothing to preview",
            Self::Transformation(_) | Self::Panicked(_) => "Preview Build Error",
            Self::SandboxRuntime { .. } => "Runtime Error",
            Self::InvalidOptions(_) => "Configuration Error",
        }
    }
}

#[cfg(feature = "napi")]
impl From<PreviewError> for napi::Error {
    fn from(err: PreviewError) -> Self {
        napi::Error::from_reason(err.to_string())
    }
}
