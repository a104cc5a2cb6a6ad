//! # Preview Native
//!
//! Turns LLM-generated React/TypeScript answers into a single document that a
//! sandboxed browser frame can execute without a build step.
//!
//! ## Pipeline
//!
//! 1. **Fences** (`normalize`): documentation fences and prose are removed,
//!    file-name lines become `// <path>` boundary markers.
//! 2. **Files** (`discovery`): multi-file input is split, non-executable files
//!    are dropped, survivors are ordered type modules first and `App` last.
//! 3. **Modules** (`modules`): `import`/`export` syntax is removed; default
//!    export names and import bindings are kept as metadata.
//! 4. **Types** (`strip_types`): a shallow scanner removes TypeScript syntax
//!    without touching JSX, strings or comments.
//! 5. **Verify** (`validate`): the result must parse as JavaScript + JSX.
//! 6. **Resolve** (`component`): picks the component to mount.
//! 7. **Harness** (`document`): assembles the HTML with runtime libraries,
//!    import rebinding, error capture and the mount call.
//!
//! The passes are pure. [`LifecycleController`] wraps them in the
//! `Idle → Loading → Success | Error` state machine and [`PreviewSession`]
//! drives it on tokio.
//!
//! ## Failure Policy
//!
//! Nothing escapes to the host. [`build_preview`] always returns a renderable
//! document; construction failures and panics become an error page.

#[cfg(feature = "napi")]
use napi_derive::napi;

mod scanner;

pub mod component;
pub mod diagnostics;
pub mod discovery;
pub mod document;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod modules;
pub mod normalize;
pub mod options;
pub mod pipeline;
pub mod session;
pub mod strip_types;
pub mod validate;

#[cfg(test)]
mod strip_types_tests;

pub use component::{component_name_from_filename, resolve_component};
pub use diagnostics::{Diagnostic, DiagnosticRecord, Diagnostics, Level, Pass};
pub use error::PreviewError;
pub use lifecycle::{
    Command, LifecycleController, LifecycleSnapshot, LifecycleState, PipelineBuilder,
    PreviewBuilder, SandboxEvent,
};
pub use model::{
    ComponentDescriptor, ComponentSource, ImportBinding, LogicalFile, RenderDocument,
    SourceDocument, TransformationResult,
};
pub use options::{CdnConfig, PreviewOptions};
pub use pipeline::{build_preview, build_render_document, transform, try_build, PipelineOutput};
pub use session::PreviewSession;

#[cfg(feature = "napi")]
fn options_from(options_json: Option<String>) -> napi::Result<PreviewOptions> {
    match options_json {
        Some(json) => Ok(PreviewOptions::from_json(&json)?),
        None => Ok(PreviewOptions::default()),
    }
}

#[cfg(feature = "napi")]
fn source_from(code: String, filename: Option<String>, class_name: Option<String>) -> SourceDocument {
    let mut doc = SourceDocument::new(code);
    doc.filename = filename;
    doc.class_name = class_name;
    doc
}

/// Runs the stripping passes only. Returns the transformation result with
/// the resolved component and the diagnostics as JSON.
#[cfg(feature = "napi")]
#[napi]
pub fn transform_preview_native(
    code: String,
    filename: Option<String>,
    options_json: Option<String>,
) -> napi::Result<serde_json::Value> {
    let options = options_from(options_json)?;
    let output = transform(&source_from(code, filename, None), &options)?;
    Ok(serde_json::json!({
        "isMultiFile": output.result.is_multi_file,
        "processedCode": output.result.processed_code,
        "componentName": output.result.component_name,
        "componentSource": output.component.source.to_string(),
        "files": output.files,
        "diagnostics": output.diagnostics.to_records(),
    }))
}

/// Builds the complete preview document. Never fails for bad code; only
/// malformed options are rejected.
#[cfg(feature = "napi")]
#[napi]
pub fn build_preview_native(
    code: String,
    filename: Option<String>,
    class_name: Option<String>,
    retry_token: Option<u32>,
    options_json: Option<String>,
) -> napi::Result<RenderDocument> {
    let options = options_from(options_json)?;
    let doc = source_from(code, filename, class_name);
    Ok(build_preview(&doc, &options, u64::from(retry_token.unwrap_or(0))))
}
