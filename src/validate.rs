//! Output verification.
//!
//! Checks that processed code is a plain script: no module statements left
//! and parseable as JavaScript with JSX. Top-level declarations are collected
//! from the oxc program body while we have it, and recovered with a shallow
//! scan when parsing fails.

use lazy_static::lazy_static;
use oxc_allocator::Allocator;
use oxc_ast::ast::{BindingPattern, Class, Expression, Statement};
use oxc_parser::Parser;
use oxc_span::SourceType;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::scanner::{
    at_line_start, ident_end, is_ident_start, keyword_at, match_bracket, skip_block_comment,
    skip_inline_ws, skip_line_comment, skip_string, skip_template, skip_ws, word_at,
};

lazy_static! {
    static ref MODULE_STATEMENT_RE: Regex =
        Regex::new(r#"(?m)^[ \t]*(?:import[ \t]*[\w{*'"]|export\b)"#).unwrap();
}

/// Wrappers whose result is still a component.
const COMPONENT_WRAPPERS: &[&str] = &["memo", "forwardRef", "observer"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeclKind {
    /// `function Name() {}`
    Function,
    /// `const Name = () => ...`, `const Name = memo(...)`
    FunctionBinding,
    Class {
        extends_component: bool,
    },
    /// Any other binding.
    Binding,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub name: String,
    pub kind: DeclKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyReport {
    pub parsed: bool,
    pub parse_errors: Vec<String>,
    /// Lines that still look like `import`/`export` statements.
    pub module_statements: Vec<String>,
    /// Top-level declarations in source order.
    pub declarations: Vec<Declaration>,
}

impl VerifyReport {
    pub fn declared_symbols(&self) -> HashSet<&str> {
        self.declarations.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn is_clean(&self) -> bool {
        self.parsed && self.module_statements.is_empty()
    }
}

pub fn verify(code: &str) -> VerifyReport {
    let allocator = Allocator::default();
    let source_type = SourceType::default().with_module(true).with_jsx(true);
    let ret = Parser::new(&allocator, code, source_type).parse();

    let module_statements: Vec<String> = MODULE_STATEMENT_RE
        .find_iter(code)
        .map(|m| {
            let end = code[m.start()..].find('\n').map_or(code.len(), |i| m.start() + i);
            code[m.start()..end].trim().to_string()
        })
        .collect();

    if !ret.errors.is_empty() || ret.panicked {
        return VerifyReport {
            parsed: false,
            parse_errors: ret.errors.iter().map(|e| e.to_string()).collect(),
            module_statements,
            declarations: scan_declarations(code),
        };
    }

    let mut declarations = Vec::new();
    for stmt in &ret.program.body {
        match stmt {
            Statement::VariableDeclaration(var_decl) => {
                for decl in &var_decl.declarations {
                    if let BindingPattern::BindingIdentifier(id) = &decl.id {
                        let kind = match &decl.init {
                            Some(init) if is_component_initializer(init) => DeclKind::FunctionBinding,
                            _ => DeclKind::Binding,
                        };
                        declarations.push(Declaration {
                            name: id.name.to_string(),
                            kind,
                        });
                    } else {
                        let mut names = Vec::new();
                        collect_binding_pattern(&decl.id, &mut names);
                        declarations.extend(names.into_iter().map(|name| Declaration {
                            name,
                            kind: DeclKind::Binding,
                        }));
                    }
                }
            }
            Statement::FunctionDeclaration(func_decl) => {
                if let Some(id) = &func_decl.id {
                    declarations.push(Declaration {
                        name: id.name.to_string(),
                        kind: DeclKind::Function,
                    });
                }
            }
            Statement::ClassDeclaration(class_decl) => {
                if let Some(id) = &class_decl.id {
                    declarations.push(Declaration {
                        name: id.name.to_string(),
                        kind: DeclKind::Class {
                            extends_component: extends_component(class_decl),
                        },
                    });
                }
            }
            _ => {}
        }
    }

    VerifyReport {
        parsed: true,
        parse_errors: Vec::new(),
        module_statements,
        declarations,
    }
}

fn collect_binding_pattern(pattern: &BindingPattern, names: &mut Vec<String>) {
    match pattern {
        BindingPattern::BindingIdentifier(id) => {
            names.push(id.name.to_string());
        }
        BindingPattern::ObjectPattern(obj) => {
            for prop in &obj.properties {
                collect_binding_pattern(&prop.value, names);
            }
            if let Some(rest) = &obj.rest {
                collect_binding_pattern(&rest.argument, names);
            }
        }
        BindingPattern::ArrayPattern(arr) => {
            for pattern in arr.elements.iter().flatten() {
                collect_binding_pattern(pattern, names);
            }
            if let Some(rest) = &arr.rest {
                collect_binding_pattern(&rest.argument, names);
            }
        }
        _ => {}
    }
}

fn callee_name<'a>(callee: &'a Expression) -> Option<&'a str> {
    match callee {
        Expression::Identifier(id) => Some(id.name.as_str()),
        Expression::StaticMemberExpression(member) => Some(member.property.name.as_str()),
        _ => None,
    }
}

fn is_component_initializer(expr: &Expression) -> bool {
    match expr {
        Expression::ArrowFunctionExpression(_) | Expression::FunctionExpression(_) => true,
        Expression::ParenthesizedExpression(paren) => is_component_initializer(&paren.expression),
        Expression::CallExpression(call) => {
            let wrapped = callee_name(&call.callee).map_or(false, |n| COMPONENT_WRAPPERS.contains(&n));
            wrapped
                && call
                    .arguments
                    .first()
                    .and_then(|arg| arg.as_expression())
                    .map_or(false, |arg| {
                        matches!(arg, Expression::Identifier(_)) || is_component_initializer(arg)
                    })
        }
        _ => false,
    }
}

fn extends_component(class: &Class) -> bool {
    class
        .super_class
        .as_ref()
        .and_then(callee_name)
        .map_or(false, |n| n == "Component" || n == "PureComponent")
}

/// Top-level declarations found without a parser: brace depth is tracked
/// across literals and comments, and only depth-0 line starts are inspected.
pub fn scan_declarations(code: &str) -> Vec<Declaration> {
    let bytes = code.as_bytes();
    let mut declarations = Vec::new();
    let mut depth = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' | b'(' | b'[' => {
                depth += 1;
                i += 1;
            }
            b'}' | b')' | b']' => {
                depth = depth.saturating_sub(1);
                i += 1;
            }
            b'"' | b'\'' => i = skip_string(bytes, i),
            b'`' => i = skip_template(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'/') => i = skip_line_comment(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'*') => i = skip_block_comment(bytes, i),
            b if is_ident_start(b) => {
                let end = ident_end(bytes, i);
                if depth == 0 && at_line_start(bytes, i) {
                    if let Some(decl) = declaration_at(code, i) {
                        declarations.push(decl);
                    }
                }
                i = end;
            }
            _ => i += 1,
        }
    }

    declarations
}

fn declaration_at(code: &str, pos: usize) -> Option<Declaration> {
    let bytes = code.as_bytes();
    let mut p = pos;
    if keyword_at(code, p, "async") {
        p = skip_inline_ws(bytes, p + 5);
    }
    let keyword = word_at(code, p)?;
    let after = skip_ws(bytes, p + keyword.len());
    let after = if keyword == "function" && bytes.get(after) == Some(&b'*') {
        skip_ws(bytes, after + 1)
    } else {
        after
    };
    let name = word_at(code, after)?;
    let name_end = after + name.len();

    let kind = match keyword {
        "function" => DeclKind::Function,
        "class" => {
            let rest = skip_ws(bytes, name_end);
            let extends_component = keyword_at(code, rest, "extends") && {
                let parent_start = skip_ws(bytes, rest + 7);
                let parent_end = ident_end_dotted(bytes, parent_start);
                let parent = &code[parent_start..parent_end];
                parent.ends_with("Component")
            };
            DeclKind::Class { extends_component }
        }
        "const" | "let" | "var" => {
            let eq = skip_ws(bytes, name_end);
            if bytes.get(eq) == Some(&b'=') && bytes.get(eq + 1) != Some(&b'=') {
                if initializer_is_function(code, skip_ws(bytes, eq + 1)) {
                    DeclKind::FunctionBinding
                } else {
                    DeclKind::Binding
                }
            } else {
                DeclKind::Binding
            }
        }
        _ => return None,
    };

    Some(Declaration {
        name: name.to_string(),
        kind,
    })
}

fn ident_end_dotted(bytes: &[u8], pos: usize) -> usize {
    let mut end = ident_end(bytes, pos);
    while end > pos && bytes.get(end) == Some(&b'.') {
        let next = ident_end(bytes, end + 1);
        if next == end + 1 {
            break;
        }
        end = next;
    }
    end
}

fn initializer_is_function(code: &str, pos: usize) -> bool {
    let bytes = code.as_bytes();
    let mut p = pos;
    if keyword_at(code, p, "async") {
        p = skip_ws(bytes, p + 5);
    }
    if keyword_at(code, p, "function") {
        return true;
    }
    match bytes.get(p) {
        Some(b'(') => match match_bracket(bytes, p) {
            Some(close) => {
                let q = skip_ws(bytes, close);
                bytes.get(q) == Some(&b'=') && bytes.get(q + 1) == Some(&b'>')
            }
            None => false,
        },
        Some(&b) if is_ident_start(b) => {
            let end = ident_end_dotted(bytes, p);
            let callee = &code[p..end];
            let last = callee.rsplit('.').next().unwrap_or(callee);
            let q = skip_ws(bytes, end);
            if COMPONENT_WRAPPERS.contains(&last) && bytes.get(q) == Some(&b'(') {
                return true;
            }
            bytes.get(q) == Some(&b'=') && bytes.get(q + 1) == Some(&b'>')
        }
        _ => false,
    }
}
