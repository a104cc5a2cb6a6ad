//! Preview pipeline.
//!
//! Composes the passes in order: fences, files, modules, types, verify,
//! resolve, harness. Every pass is a pure function; the only state threaded
//! through is the [`Diagnostics`] sink.

use std::panic::{self, AssertUnwindSafe};

use crate::component::resolve_component;
use crate::diagnostics::{Diagnostics, Pass};
use crate::discovery::merge_files;
use crate::document::{build_harness, error_document, run_id, HarnessInput};
use crate::error::PreviewError;
use crate::model::{
    ComponentDescriptor, ComponentSource, ImportBinding, RenderDocument, SourceDocument,
    TransformationResult,
};
use crate::modules::{strip_modules, ANONYMOUS_DEFAULT};
use crate::normalize::{normalize, trim_blank_lines};
use crate::options::PreviewOptions;
use crate::strip_types::strip_types;
use crate::validate::{verify, VerifyReport};

const CODE_PREVIEW_CHARS: usize = 240;

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub result: TransformationResult,
    pub component: ComponentDescriptor,
    /// Import bindings removed by the module pass.
    pub imports: Vec<ImportBinding>,
    pub report: VerifyReport,
    /// Merged logical files in output order; empty for single-file input.
    pub files: Vec<String>,
    pub diagnostics: Diagnostics,
}

fn code_preview(code: &str) -> String {
    match code.char_indices().nth(CODE_PREVIEW_CHARS) {
        Some((idx, _)) => format!("{}…", &code[..idx]),
        None => code.to_string(),
    }
}

/// Runs the stripping passes and resolves the entry component.
pub fn transform(
    doc: &SourceDocument,
    options: &PreviewOptions,
) -> Result<PipelineOutput, PreviewError> {
    if doc.is_blank() {
        return Err(PreviewError::EmptyInput);
    }
    let mut diagnostics = Diagnostics::new();

    let normalized = normalize(&doc.code);
    if normalized.fence_blocks > 0 {
        diagnostics.info(
            Pass::Fences,
            format!("kept {} fenced block(s)", normalized.fence_blocks),
        );
    }
    if !normalized.file_markers.is_empty() {
        diagnostics.info(
            Pass::Fences,
            format!(
                "{} file marker(s), multi-file: {}",
                normalized.file_markers.len(),
                normalized.is_multi_file
            ),
        );
    }

    let merged = merge_files(&normalized.code, normalized.is_multi_file, &mut diagnostics);

    let modules = strip_modules(&merged.code);
    if !modules.imports.is_empty() {
        let sources: Vec<&str> = modules.imports.iter().map(|i| i.source.as_str()).collect();
        diagnostics.info(
            Pass::Modules,
            format!("removed {} import(s): {}", sources.len(), sources.join(", ")),
        );
    }
    match modules.default_exports.len() {
        0 => {}
        1 => diagnostics.info(
            Pass::Modules,
            format!("default export: {}", modules.default_exports[0]),
        ),
        n => diagnostics.info(
            Pass::Modules,
            format!(
                "collapsed {} default exports: {}",
                n,
                modules.default_exports.join(", ")
            ),
        ),
    }
    if modules
        .default_exports
        .iter()
        .any(|name| name.starts_with(ANONYMOUS_DEFAULT))
    {
        diagnostics.info(Pass::Modules, "named an anonymous default export");
    }

    let (stripped, strip_report) = strip_types(&modules.code);
    diagnostics.info(Pass::Types, strip_report.summary());

    let processed_code = trim_blank_lines(&stripped);

    let report = verify(&processed_code);
    for statement in &report.module_statements {
        diagnostics.warn(Pass::Verify, format!("module statement survived: {}", statement));
    }
    if !report.parsed {
        let detail = report.parse_errors.join("; ");
        if options.strict_syntax_check {
            return Err(PreviewError::Transformation(format!(
                "processed code does not parse: {}",
                detail
            )));
        }
        diagnostics.warn(Pass::Verify, format!("processed code does not parse: {}", detail));
    }

    let filename_hint = doc
        .filename
        .as_deref()
        .or_else(|| normalized.file_markers.last().map(|m| m.path.as_str()));
    let component = resolve_component(
        &report.declarations,
        &modules.default_exports,
        filename_hint,
        &options.fallback_component,
    );
    if component.source == ComponentSource::Fallback {
        diagnostics.warn(
            Pass::Resolve,
            format!("no component detected, falling back to {}", component.name),
        );
    } else {
        diagnostics.info(
            Pass::Resolve,
            format!("component {} ({})", component.name, component.source),
        );
    }

    diagnostics.info(Pass::Verify, format!("final code: {}", code_preview(&processed_code)));

    Ok(PipelineOutput {
        result: TransformationResult {
            is_multi_file: merged.is_multi_file,
            processed_code,
            component_name: component.name.clone(),
        },
        component,
        imports: modules.imports,
        report,
        files: merged.files,
        diagnostics,
    })
}

/// Runs the pipeline and assembles the harness document.
pub fn build_render_document(
    doc: &SourceDocument,
    options: &PreviewOptions,
    retry_token: u64,
) -> Result<(RenderDocument, PipelineOutput), PreviewError> {
    let mut output = transform(doc, options)?;
    let declared = output.report.declared_symbols();
    let input = HarnessInput {
        result: &output.result,
        component: &output.component,
        imports: &output.imports,
        declared: &declared,
        class_name: doc.class_name.as_deref(),
        retry_token,
    };
    let mut harness_diagnostics = Diagnostics::new();
    let document = build_harness(&input, options, &mut harness_diagnostics)?;
    output.diagnostics.extend(harness_diagnostics);
    Ok((document, output))
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// [`build_render_document`] with panics turned into [`PreviewError::Panicked`].
pub fn try_build(
    doc: &SourceDocument,
    options: &PreviewOptions,
    retry_token: u64,
) -> Result<RenderDocument, PreviewError> {
    match panic::catch_unwind(AssertUnwindSafe(|| {
        build_render_document(doc, options, retry_token)
    })) {
        Ok(result) => result.map(|(document, _)| document),
        Err(payload) => {
            let message = panic_message(payload);
            tracing::error!(target: "preview", "preview build panicked: {}", message);
            Err(PreviewError::Panicked(message))
        }
    }
}

/// Always returns a renderable document; failures become an error page.
pub fn build_preview(doc: &SourceDocument, options: &PreviewOptions, retry_token: u64) -> RenderDocument {
    match try_build(doc, options, retry_token) {
        Ok(document) => document,
        Err(err) => error_document(
            err.title(),
            &err.to_string(),
            &run_id(retry_token, &doc.code),
            options,
        ),
    }
}
