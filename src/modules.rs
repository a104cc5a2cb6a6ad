//! Module Syntax Stripper
//!
//! The sandbox has no module loader, so every `import` is removed and every
//! `export` keyword is peeled off its declaration. Patterns are anchored at
//! line start so import-like text inside literals mid-line is left alone.
//! What was removed is returned as metadata: default-exported names feed the
//! component resolver, import bindings feed the harness prelude.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::model::ImportBinding;
use crate::scanner::is_valid_identifier;

/// Name given to an anonymous default export.
pub const ANONYMOUS_DEFAULT: &str = "DefaultExport";

lazy_static! {
    static ref IMPORT_FROM_RE: Regex = Regex::new(
        r#"(?m)^[ \t]*import\s+(type\s+)?([\w$*\s{},]*?)\s*from\s*['"]([^'"\n]+)['"][ \t]*;?[ \t]*(?:\r?\n)?"#
    )
    .unwrap();
    static ref SIDE_EFFECT_IMPORT_RE: Regex =
        Regex::new(r#"(?m)^[ \t]*import\s*['"]([^'"\n]+)['"][ \t]*;?[ \t]*(?:\r?\n)?"#).unwrap();
    static ref IMPORT_REQUIRE_RE: Regex = Regex::new(
        r#"(?m)^[ \t]*import\s+([\w$]+)\s*=\s*require\(\s*['"]([^'"\n]+)['"]\s*\)[ \t]*;?[ \t]*(?:\r?\n)?"#
    )
    .unwrap();
    static ref EXPORT_LIST_RE: Regex = Regex::new(
        r#"(?m)^[ \t]*export\s+(?:type\s+)?\{([^}]*)\}(?:\s*from\s*['"][^'"\n]+['"])?[ \t]*;?[ \t]*(?:\r?\n)?"#
    )
    .unwrap();
    static ref EXPORT_STAR_RE: Regex = Regex::new(
        r#"(?m)^[ \t]*export\s+\*(?:\s+as\s+[\w$]+)?\s+from\s*['"][^'"\n]+['"][ \t]*;?[ \t]*(?:\r?\n)?"#
    )
    .unwrap();
    static ref EXPORT_ASSIGN_RE: Regex =
        Regex::new(r#"(?m)^[ \t]*export\s*=\s*([\w$]+)[ \t]*;?[ \t]*(?:\r?\n)?"#).unwrap();
    static ref EXPORT_DEFAULT_DECL_RE: Regex = Regex::new(
        r"(?m)^([ \t]*)export\s+default\s+((?:async\s+)?function\b\s*\*?|(?:abstract\s+)?class\b)([ \t]*)([A-Za-z_$][\w$]*)?"
    )
    .unwrap();
    static ref EXPORT_DEFAULT_RE: Regex = Regex::new(r"(?m)^([ \t]*)export\s+default\s+").unwrap();
    static ref WRAPPED_COMPONENT_RE: Regex =
        Regex::new(r"^[\w$.]+\(\s*([A-Z][\w$]*)\s*\)$").unwrap();
    static ref EXPORT_DECL_RE: Regex = Regex::new(
        r"(?m)^([ \t]*)export\s+((?:declare\s+)?(?:async\s+function|function|const|let|var|class|abstract\s+class|interface|type|enum|namespace|module)\b)"
    )
    .unwrap();
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleStripOutput {
    pub code: String,
    /// Default-exported identifiers in source order.
    pub default_exports: Vec<String>,
    pub imports: Vec<ImportBinding>,
}

/// Remove import statements and export keywords. Idempotent.
pub fn strip_modules(code: &str) -> ModuleStripOutput {
    let mut imports = Vec::new();
    let mut default_exports = Vec::new();

    let code = IMPORT_REQUIRE_RE.replace_all(code, |caps: &Captures| {
        imports.push(ImportBinding {
            source: caps[2].to_string(),
            default: Some(caps[1].to_string()),
            ..Default::default()
        });
        String::new()
    });

    let code = IMPORT_FROM_RE.replace_all(&code, |caps: &Captures| {
        let type_only = caps.get(1).is_some();
        imports.push(parse_import_clause(&caps[2], &caps[3], type_only));
        String::new()
    });

    let code = SIDE_EFFECT_IMPORT_RE.replace_all(&code, |caps: &Captures| {
        imports.push(ImportBinding {
            source: caps[1].to_string(),
            ..Default::default()
        });
        String::new()
    });

    let code = EXPORT_LIST_RE.replace_all(&code, |caps: &Captures| {
        for spec in caps[1].split(',') {
            let parts: Vec<&str> = spec.split_whitespace().collect();
            if let [local, "as", "default"] = parts.as_slice() {
                if is_valid_identifier(local) {
                    default_exports.push(local.to_string());
                }
            }
        }
        String::new()
    });

    let code = EXPORT_STAR_RE.replace_all(&code, "");

    let code = EXPORT_ASSIGN_RE.replace_all(&code, |caps: &Captures| {
        default_exports.push(caps[1].to_string());
        String::new()
    });

    let mut anonymous = 0usize;
    let code = EXPORT_DEFAULT_DECL_RE.replace_all(&code, |caps: &Captures| {
        let indent = &caps[1];
        match caps.get(4) {
            Some(name) if name.as_str() != "extends" => {
                default_exports.push(name.as_str().to_string());
                format!("{}{}{}{}", indent, &caps[2], &caps[3], name.as_str())
            }
            other => {
                let name = anonymous_name(&mut anonymous);
                default_exports.push(name.clone());
                let rest = other.map(|m| format!(" {}", m.as_str())).unwrap_or_default();
                format!("{}{} {}{}", indent, caps[2].trim_end(), name, rest)
            }
        }
    });

    let code = strip_default_expressions(&code, &mut default_exports, &mut anonymous);

    let code = EXPORT_DECL_RE.replace_all(&code, "${1}${2}").into_owned();

    ModuleStripOutput {
        code,
        default_exports,
        imports,
    }
}

fn anonymous_name(counter: &mut usize) -> String {
    *counter += 1;
    if *counter == 1 {
        ANONYMOUS_DEFAULT.to_string()
    } else {
        format!("{}{}", ANONYMOUS_DEFAULT, counter)
    }
}

/// `export default <expr>`: identifiers and single-component wrappers are
/// dropped and recorded, anything else becomes a named binding.
fn strip_default_expressions(
    code: &str,
    default_exports: &mut Vec<String>,
    anonymous: &mut usize,
) -> String {
    let mut out = String::with_capacity(code.len());
    let mut last = 0;

    for caps in EXPORT_DEFAULT_RE.captures_iter(code) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let indent = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let line_end = code[whole.end()..]
            .find('\n')
            .map(|i| whole.end() + i)
            .unwrap_or(code.len());
        let expr = code[whole.end()..line_end]
            .trim()
            .trim_end_matches(';')
            .trim_end();

        out.push_str(&code[last..whole.start()]);

        if is_valid_identifier(expr) {
            default_exports.push(expr.to_string());
            last = (line_end + 1).min(code.len());
            continue;
        }
        if let Some(inner) = WRAPPED_COMPONENT_RE.captures(expr) {
            default_exports.push(inner[1].to_string());
            last = (line_end + 1).min(code.len());
            continue;
        }

        let name = anonymous_name(anonymous);
        out.push_str(&format!("{}const {} = ", indent, name));
        default_exports.push(name);
        last = whole.end();
    }

    out.push_str(&code[last..]);
    out
}

/// Parses the clause between `import` and `from`.
fn parse_import_clause(clause: &str, source: &str, type_only: bool) -> ImportBinding {
    let mut binding = ImportBinding {
        source: source.to_string(),
        type_only,
        ..Default::default()
    };

    let clause = clause.trim();
    let (head, named) = match (clause.find('{'), clause.rfind('}')) {
        (Some(open), Some(close)) if close > open => {
            (format!("{}{}", &clause[..open], &clause[close + 1..]), Some(&clause[open + 1..close]))
        }
        _ => (clause.to_string(), None),
    };

    for part in head.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if let Some(ns) = part.strip_prefix('*') {
            let ns = ns.trim().trim_start_matches("as").trim();
            if is_valid_identifier(ns) {
                binding.namespace = Some(ns.to_string());
            }
        } else if is_valid_identifier(part) {
            binding.default = Some(part.to_string());
        }
    }

    if let Some(named) = named {
        for spec in named.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            // Type-only specifiers have no runtime value.
            if spec.starts_with("type ") {
                continue;
            }
            let parts: Vec<&str> = spec.split_whitespace().collect();
            let pair = match parts.as_slice() {
                [name] => (name.to_string(), name.to_string()),
                [name, "as", local] => (name.to_string(), local.to_string()),
                _ => continue,
            };
            if is_valid_identifier(&pair.1) {
                binding.named.push(pair);
            }
        }
    }

    binding
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_imports_are_removed_and_recorded() {
        let src = "import React, { useState } from 'react';\nimport * as d3 from \"d3\";\nimport './index.css';\nimport type { Props } from './types';\nconst x = 1;\n";
        let out = strip_modules(src);
        assert_eq!(out.code, "const x = 1;\n");
        assert_eq!(out.imports.len(), 4);
        assert_eq!(out.imports[0].default.as_deref(), Some("React"));
        assert_eq!(out.imports[0].named, vec![("useState".to_string(), "useState".to_string())]);
        assert_eq!(out.imports[1].namespace.as_deref(), Some("d3"));
        assert!(out.imports[2].type_only);
        assert_eq!(out.imports[3].source, "./index.css");
    }

    #[test]
    fn test_multiline_named_import() {
        let src = "import {\n  LineChart,\n  Line as L,\n  type TooltipProps,\n} from 'recharts';\nfoo();\n";
        let out = strip_modules(src);
        assert_eq!(out.code, "foo();\n");
        assert_eq!(
            out.imports[0].named,
            vec![
                ("LineChart".to_string(), "LineChart".to_string()),
                ("Line".to_string(), "L".to_string()),
            ]
        );
    }

    #[test]
    fn test_default_declarations_keep_names() {
        let out = strip_modules("export default function App() {\n  return null;\n}\n");
        assert_eq!(out.code, "function App() {\n  return null;\n}\n");
        assert_eq!(out.default_exports, vec!["App"]);

        let out = strip_modules("export default class Board extends React.Component {}\n");
        assert_eq!(out.code, "class Board extends React.Component {}\n");
        assert_eq!(out.default_exports, vec!["Board"]);
    }

    #[test]
    fn test_anonymous_defaults_are_named() {
        let out = strip_modules("export default function () {\n  return null;\n}\n");
        assert_eq!(out.code, "function DefaultExport() {\n  return null;\n}\n");
        assert_eq!(out.default_exports, vec![ANONYMOUS_DEFAULT]);

        let out = strip_modules("export default () => <div />;\n");
        assert_eq!(out.code, "const DefaultExport = () => <div />;\n");

        let out = strip_modules("export default class extends Base {}\n");
        assert_eq!(out.code, "class DefaultExport extends Base {}\n");
    }

    #[test]
    fn test_default_identifier_and_wrapper_lines_are_dropped() {
        let out = strip_modules("const A = 1;\nexport default A;\n");
        assert_eq!(out.code, "const A = 1;\n");
        assert_eq!(out.default_exports, vec!["A"]);

        let out = strip_modules("export default React.memo(Card);\n");
        assert_eq!(out.code, "");
        assert_eq!(out.default_exports, vec!["Card"]);
    }

    #[test]
    fn test_export_keywords_and_lists() {
        let src = "export const a = 1;\nexport async function load() {}\nexport interface P {}\nexport { a, load as default };\nexport * from './x';\nexport type { P as Q };\n";
        let out = strip_modules(src);
        assert_eq!(out.code, "const a = 1;\nasync function load() {}\ninterface P {}\n");
        assert_eq!(out.default_exports, vec!["load"]);
    }

    #[test]
    fn test_mid_line_text_is_untouched() {
        let src = "const s = \"import x from 'y'\";\n";
        assert_eq!(strip_modules(src).code, src);
    }

    #[test]
    fn test_idempotent() {
        let src = "import A from './A';\nexport default () => <A />;\nexport const b = 2;\n";
        let once = strip_modules(src).code;
        assert_eq!(strip_modules(&once).code, once);
    }
}
