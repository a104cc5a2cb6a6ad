//! Component Name Resolver
//!
//! Picks the symbol the harness mounts. Tiers are tried in order and the
//! first hit wins:
//!
//! 1. the last captured `export default` name
//! 2. the last capitalized binding initialized with a function
//! 3. the last capitalized function declaration, then the last class
//!    extending `Component`
//! 4. a PascalCase name derived from the filename hint
//! 5. the configured fallback
//!
//! "Last" matters: merged multi-file sources place the root file at the end.

use crate::model::{ComponentDescriptor, ComponentSource};
use crate::scanner::is_valid_identifier;
use crate::validate::{DeclKind, Declaration};

const IGNORED_FILE_STEMS: &[&str] = &["index", "main", "preamble"];

fn is_capitalized(name: &str) -> bool {
    name.chars().next().map_or(false, |c| c.is_ascii_uppercase())
}

fn last_matching(declarations: &[Declaration], pred: impl Fn(&Declaration) -> bool) -> Option<&str> {
    declarations
        .iter()
        .rev()
        .find(|d| is_capitalized(&d.name) && pred(d))
        .map(|d| d.name.as_str())
}

/// `user-card.tsx` → `UserCard`, `dashboard_view.jsx` → `DashboardView`.
/// Returns `None` for entry-point stems or names that are not identifiers.
pub fn component_name_from_filename(filename: &str) -> Option<String> {
    let base = filename
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(filename);
    let stem = match base.rfind('.') {
        Some(idx) if idx > 0 => &base[..idx],
        _ => base,
    };
    let stem = stem.strip_suffix(".d").unwrap_or(stem);

    if IGNORED_FILE_STEMS.contains(&stem.to_lowercase().as_str()) {
        return None;
    }

    let name: String = stem
        .split(|c: char| c == '-' || c == '_' || c == '.' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect();

    if is_valid_identifier(&name) {
        Some(name)
    } else {
        None
    }
}

/// Never returns an empty name: a blank `fallback` becomes `App`.
pub fn resolve_component(
    declarations: &[Declaration],
    default_exports: &[String],
    filename: Option<&str>,
    fallback: &str,
) -> ComponentDescriptor {
    if let Some(name) = default_exports.iter().rev().find(|n| is_valid_identifier(n)) {
        return ComponentDescriptor {
            name: name.clone(),
            source: ComponentSource::ExportDefault,
        };
    }

    if let Some(name) = last_matching(declarations, |d| d.kind == DeclKind::FunctionBinding) {
        return ComponentDescriptor {
            name: name.to_string(),
            source: ComponentSource::DeclaredConst,
        };
    }

    if let Some(name) = last_matching(declarations, |d| d.kind == DeclKind::Function) {
        return ComponentDescriptor {
            name: name.to_string(),
            source: ComponentSource::DeclaredFunction,
        };
    }

    if let Some(name) = last_matching(declarations, |d| {
        d.kind == DeclKind::Class {
            extends_component: true,
        }
    }) {
        return ComponentDescriptor {
            name: name.to_string(),
            source: ComponentSource::DeclaredClass,
        };
    }

    if let Some(name) = filename.and_then(component_name_from_filename) {
        return ComponentDescriptor {
            name,
            source: ComponentSource::Filename,
        };
    }

    let name = if is_valid_identifier(fallback.trim()) {
        fallback.trim().to_string()
    } else {
        crate::options::DEFAULT_FALLBACK_COMPONENT.to_string()
    };
    ComponentDescriptor {
        name,
        source: ComponentSource::Fallback,
    }
}
