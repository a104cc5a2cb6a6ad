//! Type Annotation Stripper
//!
//! Removes TypeScript surface syntax from TSX source while copying markup and
//! literals verbatim. The stripper walks the source once, keeping just enough
//! state to tell a type-position `:` or `<` apart from an object key, a
//! ternary branch, a comparison or a JSX tag:
//!
//! - a frame stack (`(`, `[`, `{`, class bodies) with a pending-ternary count
//! - the previous significant token
//! - a JSX mode that copies elements and recurses into `{...}` expressions
//!
//! A `:` directly inside parentheses with no pending `?` can only be a type
//! annotation, and a `<` can only open markup where an expression may start.
//! Those two facts carry most of the rules below.

use lazy_static::lazy_static;
use std::collections::{BTreeMap, HashSet};

use crate::scanner::{
    char_len, ident_end, is_ident_char, is_ident_start, is_reserved_word, keyword_at, match_bracket,
    skip_block_comment, skip_inline_ws, skip_line_comment, skip_string, skip_template, skip_ws,
    word_at,
};

lazy_static! {
    /// Runtime-state constructors whose generic arguments are always types.
    pub static ref KNOWN_HOOKS: HashSet<&'static str> = [
        "useState",
        "useEffect",
        "useLayoutEffect",
        "useMemo",
        "useRef",
        "useCallback",
        "useContext",
        "createContext",
        "useReducer",
        "useImperativeHandle",
        "forwardRef",
        "memo",
        "createRef",
        "useId",
        "useTransition",
        "useDeferredValue",
    ]
    .into_iter()
    .collect();
}

// ═══════════════════════════════════════════════════════════════════════════════
// REPORT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rule {
    Interface,
    TypeAlias,
    Declare,
    Enum,
    HookGeneric,
    SymbolGeneric,
    ArrowTypeParams,
    ParamAnnotation,
    ThisParam,
    ReturnAnnotation,
    VariableAnnotation,
    FieldAnnotation,
    AsAssertion,
    Satisfies,
    NonNull,
    OptionalMarker,
    AccessModifier,
    Implements,
    ClassTypeParams,
    Abstract,
}

impl Rule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rule::Interface => "interface",
            Rule::TypeAlias => "type-alias",
            Rule::Declare => "declare",
            Rule::Enum => "enum",
            Rule::HookGeneric => "hook-generic",
            Rule::SymbolGeneric => "symbol-generic",
            Rule::ArrowTypeParams => "arrow-type-params",
            Rule::ParamAnnotation => "param-annotation",
            Rule::ThisParam => "this-param",
            Rule::ReturnAnnotation => "return-annotation",
            Rule::VariableAnnotation => "variable-annotation",
            Rule::FieldAnnotation => "field-annotation",
            Rule::AsAssertion => "as-assertion",
            Rule::Satisfies => "satisfies",
            Rule::NonNull => "non-null",
            Rule::OptionalMarker => "optional-marker",
            Rule::AccessModifier => "access-modifier",
            Rule::Implements => "implements",
            Rule::ClassTypeParams => "class-type-params",
            Rule::Abstract => "abstract",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StripReport {
    counts: BTreeMap<Rule, usize>,
}

impl StripReport {
    fn hit(&mut self, rule: Rule) {
        *self.counts.entry(rule).or_insert(0) += 1;
    }

    pub fn count(&self, rule: Rule) -> usize {
        self.counts.get(&rule).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn summary(&self) -> String {
        if self.counts.is_empty() {
            return "no type syntax found".to_string();
        }
        self.counts
            .iter()
            .map(|(rule, n)| format!("{} x{}", rule.as_str(), n))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRY POINT
// ═══════════════════════════════════════════════════════════════════════════════

/// Strip type syntax from `code`. Markup, strings, comments and regex
/// literals are never rewritten.
pub fn strip_types(code: &str) -> (String, StripReport) {
    let mut stripper = Stripper::new(code);
    stripper.code(false);
    (stripper.out, stripper.report)
}

// ═══════════════════════════════════════════════════════════════════════════════
// TYPE GRAMMAR (lookahead only)
// ═══════════════════════════════════════════════════════════════════════════════

fn byte_at(bytes: &[u8], pos: usize) -> Option<u8> {
    bytes.get(pos).copied()
}

/// Offset just after the type expression that starts at `pos` (leading
/// whitespace allowed), or `None` if no type starts there.
pub fn scan_type(src: &str, pos: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    let end = scan_union(src, pos)?;

    let p = skip_ws(bytes, end);
    if keyword_at(src, p, "extends") {
        if let Some(check_end) = scan_union(src, p + "extends".len()) {
            let q = skip_ws(bytes, check_end);
            if byte_at(bytes, q) == Some(b'?') {
                let when_true = scan_type(src, q + 1)?;
                let r = skip_ws(bytes, when_true);
                if byte_at(bytes, r) == Some(b':') {
                    return scan_type(src, r + 1);
                }
            }
        }
    }
    Some(end)
}

fn scan_union(src: &str, pos: usize) -> Option<usize> {
    scan_joined(src, pos, b'|', scan_intersection)
}

fn scan_intersection(src: &str, pos: usize) -> Option<usize> {
    scan_joined(src, pos, b'&', scan_postfix)
}

fn scan_joined(
    src: &str,
    pos: usize,
    op: u8,
    operand: fn(&str, usize) -> Option<usize>,
) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut p = skip_ws(bytes, pos);
    if byte_at(bytes, p) == Some(op) && byte_at(bytes, p + 1) != Some(op) {
        p += 1;
    }
    let mut end = operand(src, p)?;
    loop {
        let q = skip_ws(bytes, end);
        if byte_at(bytes, q) == Some(op)
            && byte_at(bytes, q + 1) != Some(op)
            && byte_at(bytes, q + 1) != Some(b'=')
        {
            end = operand(src, q + 1)?;
        } else {
            return Some(end);
        }
    }
}

fn scan_postfix(src: &str, pos: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut end = scan_primary(src, pos)?;
    while byte_at(bytes, end) == Some(b'[') {
        end = match_bracket(bytes, end)?;
    }
    Some(end)
}

fn scan_primary(src: &str, pos: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    let p = skip_ws(bytes, pos);
    let b = byte_at(bytes, p)?;
    match b {
        b'(' => {
            let close = match_bracket(bytes, p)?;
            let q = skip_ws(bytes, close);
            if src[q..].starts_with("=>") {
                scan_type(src, q + 2)
            } else {
                Some(close)
            }
        }
        b'{' | b'[' => match_bracket(bytes, p),
        b'"' | b'\'' => {
            let end = skip_string(bytes, p);
            if end > p + 1 && bytes[end - 1] == b {
                Some(end)
            } else {
                None
            }
        }
        b'`' => Some(skip_template(bytes, p)),
        b'<' => {
            let params_end = scan_type_params(src, p)?;
            scan_primary(src, params_end)
        }
        b'-' | b'0'..=b'9' => {
            let mut e = if b == b'-' { p + 1 } else { p };
            let digits_start = e;
            while e < bytes.len() && (bytes[e].is_ascii_digit() || bytes[e] == b'.') {
                e += 1;
            }
            if e > digits_start {
                Some(e)
            } else {
                None
            }
        }
        _ if is_ident_start(b) => {
            let w_end = ident_end(bytes, p);
            let word = &src[p..w_end];
            match word {
                "typeof" => {
                    let start = skip_ws(bytes, w_end);
                    let end = scan_dotted(bytes, start)?;
                    Some(end)
                }
                "keyof" | "readonly" | "unique" | "infer" => scan_postfix(src, w_end),
                "new" | "abstract" => scan_primary(src, w_end),
                "asserts" => {
                    let subject = skip_ws(bytes, w_end);
                    let subject_end = ident_end(bytes, subject);
                    let q = skip_inline_ws(bytes, subject_end);
                    if keyword_at(src, q, "is") {
                        scan_type(src, q + 2)
                    } else {
                        Some(subject_end)
                    }
                }
                _ => {
                    if is_reserved_word(word)
                        && !matches!(word, "null" | "true" | "false" | "void" | "this")
                    {
                        return None;
                    }
                    let mut end = scan_dotted(bytes, p)?;
                    if byte_at(bytes, end) == Some(b'<') {
                        if let Some(args_end) = scan_type_args(src, end) {
                            end = args_end;
                        }
                    }
                    let q = skip_inline_ws(bytes, end);
                    if keyword_at(src, q, "is") {
                        return scan_type(src, q + 2);
                    }
                    Some(end)
                }
            }
        }
        _ => None,
    }
}

fn scan_dotted(bytes: &[u8], pos: usize) -> Option<usize> {
    let mut end = ident_end(bytes, pos);
    if end == pos {
        return None;
    }
    while byte_at(bytes, end) == Some(b'.') && byte_at(bytes, end + 1).map_or(false, is_ident_start)
    {
        end = ident_end(bytes, end + 1);
    }
    Some(end)
}

/// `<A, B<C>>` at `pos`. Fails on anything that is not a list of types, which
/// is what keeps attribute-bearing or self-closing markup out.
pub fn scan_type_args(src: &str, pos: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    if byte_at(bytes, pos) != Some(b'<') {
        return None;
    }
    let mut p = pos + 1;
    let mut seen = false;
    loop {
        let q = skip_ws(bytes, p);
        if seen && byte_at(bytes, q) == Some(b'>') {
            return Some(q + 1);
        }
        let end = scan_type(src, q)?;
        seen = true;
        let r = skip_ws(bytes, end);
        match byte_at(bytes, r)? {
            b',' => p = r + 1,
            b'>' => return Some(r + 1),
            _ => return None,
        }
    }
}

/// `<T, U extends X = Y>` declaration list at `pos`.
pub fn scan_type_params(src: &str, pos: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    if byte_at(bytes, pos) != Some(b'<') {
        return None;
    }
    let mut p = pos + 1;
    let mut seen = false;
    loop {
        let mut q = skip_ws(bytes, p);
        if seen && byte_at(bytes, q) == Some(b'>') {
            return Some(q + 1);
        }
        for modifier in ["const", "in", "out"] {
            if keyword_at(src, q, modifier) {
                let after = skip_ws(bytes, q + modifier.len());
                if word_at(src, after).is_some() {
                    q = after;
                }
            }
        }
        let name_end = ident_end(bytes, q);
        if name_end == q {
            return None;
        }
        seen = true;
        let mut r = skip_ws(bytes, name_end);
        if keyword_at(src, r, "extends") {
            r = skip_ws(bytes, scan_type(src, r + "extends".len())?);
        }
        if byte_at(bytes, r) == Some(b'=') && byte_at(bytes, r + 1) != Some(b'>') {
            r = skip_ws(bytes, scan_type(src, r + 1)?);
        }
        match byte_at(bytes, r)? {
            b',' => p = r + 1,
            b'>' => return Some(r + 1),
            _ => return None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCANNER STATE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Root,
    Paren { fn_params: bool },
    Bracket,
    Block,
    ClassBody,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    kind: FrameKind,
    ternary: usize,
    /// Inside a `const`/`let`/`var` list; reset at `;`.
    declarators: bool,
}

impl Frame {
    fn new(kind: FrameKind) -> Self {
        Frame {
            kind,
            ternary: 0,
            declarators: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Angle {
    Markup,
    Stripped,
    Operator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prev<'a> {
    Start,
    Punct(u8),
    Arrow,
    Word(&'a str),
    Value,
}

/// Keywords after which `(` does not open a parameter list.
fn is_control_keyword(word: &str) -> bool {
    matches!(
        word,
        "if" | "for"
            | "while"
            | "switch"
            | "catch"
            | "with"
            | "return"
            | "typeof"
            | "await"
            | "yield"
            | "in"
            | "of"
            | "void"
            | "delete"
            | "case"
            | "do"
            | "else"
            | "new"
            | "throw"
            | "instanceof"
    )
}

/// Keywords after which an expression (and so markup or a regex) may start.
fn is_expression_keyword(word: &str) -> bool {
    matches!(
        word,
        "return"
            | "yield"
            | "await"
            | "case"
            | "default"
            | "else"
            | "in"
            | "of"
            | "typeof"
            | "void"
            | "do"
            | "throw"
            | "delete"
            | "instanceof"
    )
}

fn expression_may_start(prev: Prev<'_>) -> bool {
    match prev {
        Prev::Start | Prev::Arrow => true,
        Prev::Punct(b'.') => false,
        Prev::Punct(_) => true,
        Prev::Word(w) => is_expression_keyword(w),
        Prev::Value => false,
    }
}

fn ends_expression(prev: Prev<'_>) -> bool {
    match prev {
        Prev::Value => true,
        Prev::Word(w) => !is_reserved_word(w) || matches!(w, "this" | "null" | "true" | "false"),
        _ => false,
    }
}

fn statement_start(prev: Prev<'_>, newline: bool) -> bool {
    match prev {
        Prev::Start => true,
        Prev::Punct(b';') | Prev::Punct(b'{') | Prev::Punct(b'}') => true,
        Prev::Value | Prev::Word(_) => newline,
        _ => false,
    }
}

struct Stripper<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    out: String,
    report: StripReport,
    declaration_started: bool,
}

impl<'a> Stripper<'a> {
    fn new(src: &'a str) -> Self {
        Stripper {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            out: String::with_capacity(src.len()),
            report: StripReport::default(),
            declaration_started: false,
        }
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn copy_to(&mut self, end: usize) {
        let end = end.min(self.bytes.len());
        if end > self.pos {
            self.out.push_str(&self.src[self.pos..end]);
            self.pos = end;
        }
    }

    fn copy_char(&mut self) {
        self.copy_to(self.pos + char_len(self.src, self.pos));
    }

    fn skip_to(&mut self, end: usize, rule: Rule) {
        self.pos = end.min(self.bytes.len());
        self.report.hit(rule);
    }

    fn trim_trailing_inline_ws(&mut self) {
        let trimmed = self.out.trim_end_matches([' ', '\t']).len();
        self.out.truncate(trimmed);
    }

    // ───────────────────────────────────────────────────────────────────────────
    // CODE MODE
    // ───────────────────────────────────────────────────────────────────────────

    /// Copy code, stripping types, until end of input or (when `nested`) an
    /// unmatched `}`, which is left unconsumed for the caller.
    fn code(&mut self, nested: bool) {
        let mut frames = vec![Frame::new(FrameKind::Root)];
        let mut prev = Prev::Start;
        let mut newline = true;
        let mut class_header = false;

        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            let next = self.peek(1);

            match b {
                b'\n' => {
                    newline = true;
                    self.copy_to(self.pos + 1);
                    continue;
                }
                b' ' | b'\t' | b'\r' => {
                    self.copy_to(self.pos + 1);
                    continue;
                }
                b'/' if next == Some(b'/') => {
                    let end = skip_line_comment(self.bytes, self.pos);
                    self.copy_to(end);
                    continue;
                }
                b'/' if next == Some(b'*') => {
                    let end = skip_block_comment(self.bytes, self.pos);
                    self.copy_to(end);
                    continue;
                }
                _ => {}
            }

            match b {
                b'/' => {
                    if expression_may_start(prev) {
                        if let Some(end) = self.regex_end() {
                            self.copy_to(end);
                            prev = Prev::Value;
                        } else {
                            self.copy_to(self.pos + 1);
                            prev = Prev::Punct(b'/');
                        }
                    } else {
                        self.copy_to(self.pos + 1);
                        prev = Prev::Punct(b'/');
                    }
                }
                b'"' | b'\'' => {
                    let end = skip_string(self.bytes, self.pos);
                    self.copy_to(end);
                    prev = Prev::Value;
                }
                b'`' => {
                    self.template();
                    prev = Prev::Value;
                }
                b'(' => {
                    let fn_params = match prev {
                        Prev::Word(w) => !is_control_keyword(w),
                        _ => false,
                    };
                    frames.push(Frame::new(FrameKind::Paren { fn_params }));
                    self.copy_to(self.pos + 1);
                    prev = Prev::Punct(b'(');
                }
                b')' => {
                    let closed = match frames.last() {
                        Some(f) if matches!(f.kind, FrameKind::Paren { .. }) => frames.pop(),
                        _ => None,
                    };
                    self.copy_to(self.pos + 1);
                    prev = Prev::Value;
                    if let (Some(closed), Some(outer)) = (closed, frames.last()) {
                        self.return_annotation(closed, *outer);
                    }
                }
                b'[' => {
                    frames.push(Frame::new(FrameKind::Bracket));
                    self.copy_to(self.pos + 1);
                    prev = Prev::Punct(b'[');
                }
                b']' => {
                    if matches!(frames.last(), Some(f) if f.kind == FrameKind::Bracket) {
                        frames.pop();
                    }
                    self.copy_to(self.pos + 1);
                    prev = Prev::Value;
                }
                b'{' => {
                    let kind = if class_header {
                        class_header = false;
                        FrameKind::ClassBody
                    } else {
                        FrameKind::Block
                    };
                    frames.push(Frame::new(kind));
                    self.copy_to(self.pos + 1);
                    prev = Prev::Punct(b'{');
                }
                b'}' => {
                    if frames.len() == 1 && nested {
                        return;
                    }
                    if frames.len() > 1 {
                        frames.pop();
                    }
                    self.copy_to(self.pos + 1);
                    prev = Prev::Punct(b'}');
                }
                b'?' => {
                    if next == Some(b'?') {
                        self.copy_to(self.pos + 2);
                        prev = Prev::Punct(b'?');
                    } else if next == Some(b'.')
                        && !self.peek(2).map_or(false, |c| c.is_ascii_digit())
                    {
                        self.copy_to(self.pos + 2);
                        prev = Prev::Punct(b'.');
                    } else {
                        let after = skip_ws(self.bytes, self.pos + 1);
                        let after_byte = byte_at(self.bytes, after);
                        let in_params = matches!(
                            frames.last().map(|f| f.kind),
                            Some(FrameKind::Paren { .. }) | Some(FrameKind::ClassBody)
                        );
                        let optional_marker = matches!(prev, Prev::Word(_))
                            && (after_byte == Some(b':')
                                || (in_params
                                    && matches!(after_byte, Some(b',') | Some(b')') | Some(b'=') | Some(b';'))
                                    && self.peek(1) != Some(b'=')));
                        if optional_marker {
                            self.skip_to(self.pos + 1, Rule::OptionalMarker);
                        } else {
                            if let Some(frame) = frames.last_mut() {
                                frame.ternary += 1;
                            }
                            self.copy_to(self.pos + 1);
                            prev = Prev::Punct(b'?');
                        }
                    }
                }
                b':' => {
                    let Some(frame) = frames.last_mut() else {
                        self.copy_to(self.pos + 1);
                        continue;
                    };
                    if frame.ternary > 0 {
                        frame.ternary -= 1;
                        self.copy_to(self.pos + 1);
                        prev = Prev::Punct(b':');
                    } else if matches!(frame.kind, FrameKind::Paren { .. } | FrameKind::ClassBody)
                        && matches!(prev, Prev::Word(_) | Prev::Value | Prev::Punct(b'}'))
                    {
                        let rule = if frame.kind == FrameKind::ClassBody {
                            Rule::FieldAnnotation
                        } else {
                            Rule::ParamAnnotation
                        };
                        match scan_type(self.src, self.pos + 1) {
                            Some(end) => self.skip_to(end, rule),
                            None => {
                                self.copy_to(self.pos + 1);
                                prev = Prev::Punct(b':');
                            }
                        }
                    } else {
                        self.copy_to(self.pos + 1);
                        prev = Prev::Punct(b':');
                    }
                }
                b'!' => {
                    let not_operator = next != Some(b'=');
                    let attached = self.pos > 0 && !self.bytes[self.pos - 1].is_ascii_whitespace();
                    if not_operator && attached && ends_expression(prev) && !newline {
                        self.skip_to(self.pos + 1, Rule::NonNull);
                    } else {
                        self.copy_to(self.pos + 1);
                        prev = Prev::Punct(b'!');
                    }
                }
                b'<' => match self.angle(prev) {
                    Angle::Markup => prev = Prev::Value,
                    Angle::Stripped => {}
                    Angle::Operator => {
                        self.copy_to(self.pos + 1);
                        prev = Prev::Punct(b'<');
                    }
                },
                b'=' => {
                    if next == Some(b'>') {
                        self.copy_to(self.pos + 2);
                        prev = Prev::Arrow;
                    } else {
                        self.copy_to(self.pos + 1);
                        prev = Prev::Punct(b'=');
                    }
                }
                b'0'..=b'9' => {
                    let mut end = self.pos + 1;
                    while end < self.bytes.len()
                        && (is_ident_char(self.bytes[end]) || self.bytes[end] == b'.')
                    {
                        end += 1;
                    }
                    self.copy_to(end);
                    prev = Prev::Value;
                }
                b'.' if next.map_or(false, |c| c.is_ascii_digit()) => {
                    let mut end = self.pos + 1;
                    while end < self.bytes.len() && is_ident_char(self.bytes[end]) {
                        end += 1;
                    }
                    self.copy_to(end);
                    prev = Prev::Value;
                }
                b',' => {
                    self.copy_to(self.pos + 1);
                    prev = Prev::Punct(b',');
                    if matches!(frames.last(), Some(f) if f.declarators && f.ternary == 0) {
                        if let Some(binding) = self.next_declarator() {
                            prev = binding;
                        }
                    }
                }
                b';' => {
                    if let Some(frame) = frames.last_mut() {
                        frame.declarators = false;
                    }
                    self.copy_to(self.pos + 1);
                    prev = Prev::Punct(b';');
                }
                _ if is_ident_start(b) => {
                    prev = self.word(&frames, prev, newline, &mut class_header);
                    if std::mem::take(&mut self.declaration_started) {
                        if let Some(frame) = frames.last_mut() {
                            frame.declarators = true;
                        }
                    }
                }
                _ if b.is_ascii() => {
                    self.copy_to(self.pos + 1);
                    prev = Prev::Punct(b);
                }
                _ => {
                    self.copy_char();
                    prev = Prev::Value;
                }
            }
            newline = false;
        }
    }

    /// Decides what a `<` in code opens. Markup is copied, type arguments
    /// and arrow type parameters are skipped, operators are left to the caller.
    fn angle(&mut self, prev: Prev<'a>) -> Angle {
        let next = self.peek(1);
        let allows_async = matches!(prev, Prev::Word("async"));

        if expression_may_start(prev) || allows_async {
            if let Some(end) = self.arrow_type_params() {
                self.skip_to(end, Rule::ArrowTypeParams);
                return Angle::Stripped;
            }
            if !allows_async && next.map_or(false, |c| c.is_ascii_alphabetic() || c == b'>') {
                self.jsx_element();
                return Angle::Markup;
            }
        }

        if let Prev::Word(word) = prev {
            if !is_reserved_word(word) {
                // Hooks first: their arguments are types even with a space before `<`.
                let hook = KNOWN_HOOKS.contains(word);
                let adjacent = self.pos > 0 && is_ident_char(self.bytes[self.pos - 1]);
                if hook || adjacent {
                    // `f<T extends X>(` declares parameters rather than passing arguments.
                    let args = scan_type_args(self.src, self.pos)
                        .or_else(|| scan_type_params(self.src, self.pos));
                    if let Some(end) = args {
                        let after = skip_ws(self.bytes, end);
                        if matches!(byte_at(self.bytes, after), Some(b'(') | Some(b'`')) {
                            let rule = if hook {
                                Rule::HookGeneric
                            } else {
                                Rule::SymbolGeneric
                            };
                            self.skip_to(end, rule);
                            return Angle::Stripped;
                        }
                    }
                }
            }
        }
        Angle::Operator
    }

    /// `<T,>(x: T) => …` type parameters on an arrow function.
    fn arrow_type_params(&self) -> Option<usize> {
        let end = scan_type_params(self.src, self.pos)?;
        let inner = &self.src[self.pos + 1..end - 1];
        let open = skip_ws(self.bytes, end);
        if byte_at(self.bytes, open) != Some(b'(') {
            return None;
        }
        let close = match_bracket(self.bytes, open)?;
        let after = skip_ws(self.bytes, close);
        let arrow = self.src[after..].starts_with("=>");
        let explicit = inner.contains(',') || inner.contains(" extends ");
        let annotated = byte_at(self.bytes, after) == Some(b':');
        if arrow || (annotated && explicit) {
            Some(end)
        } else {
            None
        }
    }

    /// Return type after a closed parameter list: `): T =>` or `): T {`.
    fn return_annotation(&mut self, closed: Frame, outer: Frame) {
        let colon = skip_ws(self.bytes, self.pos);
        if byte_at(self.bytes, colon) != Some(b':') || outer.ternary > 0 {
            return;
        }
        let Some(end) = scan_type(self.src, colon + 1) else {
            return;
        };
        let after = skip_ws(self.bytes, end);
        let arrow = self.src[after..].starts_with("=>");
        let body = byte_at(self.bytes, after) == Some(b'{')
            && matches!(closed.kind, FrameKind::Paren { fn_params: true });
        if arrow || body {
            self.copy_to(colon);
            self.trim_trailing_inline_ws();
            self.skip_to(end, Rule::ReturnAnnotation);
        }
    }

    fn regex_end(&self) -> Option<usize> {
        let mut i = self.pos + 1;
        let mut in_class = false;
        while i < self.bytes.len() {
            match self.bytes[i] {
                b'\\' => i += 2,
                b'\n' => return None,
                b'[' => {
                    in_class = true;
                    i += 1;
                }
                b']' => {
                    in_class = false;
                    i += 1;
                }
                b'/' if !in_class => {
                    let mut end = i + 1;
                    while end < self.bytes.len() && is_ident_char(self.bytes[end]) {
                        end += 1;
                    }
                    return Some(end);
                }
                _ => i += 1,
            }
        }
        None
    }

    fn template(&mut self) {
        self.copy_to(self.pos + 1);
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'\\' => {
                    let escaped = self.pos + 1;
                    if escaped < self.bytes.len() {
                        self.copy_to(escaped + char_len(self.src, escaped));
                    } else {
                        self.copy_to(escaped);
                    }
                }
                b'`' => {
                    self.copy_to(self.pos + 1);
                    return;
                }
                b'$' if self.peek(1) == Some(b'{') => {
                    self.copy_to(self.pos + 2);
                    self.code(true);
                    if self.peek(0) == Some(b'}') {
                        self.copy_to(self.pos + 1);
                    }
                }
                _ => self.copy_char(),
            }
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // WORDS
    // ───────────────────────────────────────────────────────────────────────────

    fn word(
        &mut self,
        frames: &[Frame],
        prev: Prev<'a>,
        newline: bool,
        class_header: &mut bool,
    ) -> Prev<'a> {
        let start = self.pos;
        let end = ident_end(self.bytes, start);
        let src: &'a str = self.src;
        let word: &'a str = &src[start..end];
        let stmt = statement_start(prev, newline);
        let next_word_pos = skip_ws(self.bytes, end);
        let next_word = word_at(self.src, next_word_pos);
        let in_class_body = matches!(frames.last().map(|f| f.kind), Some(FrameKind::ClassBody));

        match word {
            "interface" if stmt && next_word.is_some() => {
                if let Some(decl_end) = self.interface_end(next_word_pos) {
                    self.skip_to(decl_end, Rule::Interface);
                    return Prev::Punct(b';');
                }
            }
            "type" if stmt && next_word.is_some() => {
                if let Some(decl_end) = self.type_alias_end(next_word_pos) {
                    self.skip_to(decl_end, Rule::TypeAlias);
                    return Prev::Punct(b';');
                }
            }
            "declare" if stmt && next_word.is_some() && !in_class_body => {
                let decl_end = self.statement_end(next_word_pos);
                self.skip_to(decl_end, Rule::Declare);
                return Prev::Punct(b';');
            }
            "enum" if stmt && next_word.is_some() => {
                if self.convert_enum(next_word_pos) {
                    return Prev::Punct(b';');
                }
            }
            "const" if stmt && next_word == Some("enum") => {
                let name_pos = skip_ws(self.bytes, next_word_pos + "enum".len());
                if self.convert_enum(name_pos) {
                    return Prev::Punct(b';');
                }
            }
            "abstract" if next_word == Some("class") => {
                self.skip_to(next_word_pos, Rule::Abstract);
                return prev;
            }
            "class"
                if prev != Prev::Punct(b'.')
                    && (next_word.is_some() || byte_at(self.bytes, next_word_pos) == Some(b'{')) =>
            {
                self.copy_to(end);
                self.class_header();
                *class_header = true;
                return Prev::Word("class");
            }
            "const" | "let" | "var" if prev != Prev::Punct(b'.') => {
                self.copy_to(end);
                self.declaration_started = true;
                return self.variable_binding();
            }
            "this"
                if prev == Prev::Punct(b'(')
                    && matches!(
                        frames.last().map(|f| f.kind),
                        Some(FrameKind::Paren { fn_params: true })
                    )
                    && byte_at(self.bytes, next_word_pos) == Some(b':') =>
            {
                if let Some(type_end) = scan_type(self.src, next_word_pos + 1) {
                    let after = skip_ws(self.bytes, type_end);
                    let param_end = if byte_at(self.bytes, after) == Some(b',') {
                        skip_ws(self.bytes, after + 1)
                    } else {
                        type_end
                    };
                    self.skip_to(param_end, Rule::ThisParam);
                    return Prev::Punct(b'(');
                }
            }
            "as" | "satisfies"
                if (ends_expression(prev) || prev == Prev::Punct(b'}')) && next_word_pos > end =>
            {
                let assertion_end = if word == "as" && next_word == Some("const") {
                    Some(next_word_pos + "const".len())
                } else {
                    scan_type(self.src, end)
                };
                if let Some(assertion_end) = assertion_end {
                    self.trim_trailing_inline_ws();
                    let rule = if word == "as" {
                        Rule::AsAssertion
                    } else {
                        Rule::Satisfies
                    };
                    self.skip_to(assertion_end, rule);
                    return prev;
                }
            }
            "public" | "private" | "protected" | "readonly" | "override" | "declare"
                if next_word.is_some() || byte_at(self.bytes, next_word_pos) == Some(b'[') =>
            {
                let member_start = in_class_body
                    && (matches!(prev, Prev::Punct(b'{') | Prev::Punct(b';') | Prev::Punct(b'}'))
                        || newline);
                let param_start = matches!(
                    frames.last().map(|f| f.kind),
                    Some(FrameKind::Paren { fn_params: true })
                ) && matches!(prev, Prev::Punct(b'(') | Prev::Punct(b','));
                if member_start || param_start {
                    self.skip_to(next_word_pos, Rule::AccessModifier);
                    return prev;
                }
            }
            _ => {}
        }

        self.copy_to(end);
        Prev::Word(word)
    }

    /// After `const`/`let`/`var`: copy the binding, drop `!` and `: T`.
    fn variable_binding(&mut self) -> Prev<'a> {
        let binding = skip_ws(self.bytes, self.pos);
        let binding_end = match byte_at(self.bytes, binding) {
            Some(b'{') | Some(b'[') => match match_bracket(self.bytes, binding) {
                Some(end) => end,
                None => return Prev::Word("const"),
            },
            Some(c) if is_ident_start(c) => ident_end(self.bytes, binding),
            _ => return Prev::Word("const"),
        };
        self.copy_to(binding);
        let src: &'a str = self.src;
        let word = word_at(src, binding);
        self.copy_to(binding_end);

        let mut p = binding_end;
        if byte_at(self.bytes, p) == Some(b'!') && byte_at(self.bytes, p + 1) == Some(b':') {
            self.skip_to(p + 1, Rule::NonNull);
            p += 1;
        }
        let colon = skip_ws(self.bytes, p);
        if byte_at(self.bytes, colon) == Some(b':') {
            if let Some(end) = scan_type(self.src, colon + 1) {
                self.copy_to(colon);
                self.trim_trailing_inline_ws();
                self.skip_to(end, Rule::VariableAnnotation);
            }
        }
        match word {
            Some(w) => Prev::Word(w),
            None => Prev::Value,
        }
    }

    /// A later declarator in `let a: A = 1, b: B = 2`. Only plain identifiers
    /// followed by an annotation are touched.
    fn next_declarator(&mut self) -> Option<Prev<'a>> {
        let name = skip_ws(self.bytes, self.pos);
        if !byte_at(self.bytes, name).map_or(false, is_ident_start) {
            return None;
        }
        let name_end = ident_end(self.bytes, name);
        let src: &'a str = self.src;
        let word = &src[name..name_end];
        if is_reserved_word(word) {
            return None;
        }
        let definite = byte_at(self.bytes, name_end) == Some(b'!')
            && byte_at(self.bytes, name_end + 1) == Some(b':');
        let colon = skip_ws(self.bytes, if definite { name_end + 1 } else { name_end });
        if byte_at(self.bytes, colon) != Some(b':') {
            return None;
        }
        let type_end = scan_type(self.src, colon + 1)?;
        let after = skip_ws(self.bytes, type_end);
        if !matches!(byte_at(self.bytes, after), None | Some(b'=') | Some(b',') | Some(b';')) {
            return None;
        }
        self.copy_to(name_end);
        if definite {
            self.skip_to(name_end + 1, Rule::NonNull);
        }
        self.skip_to(type_end, Rule::VariableAnnotation);
        Some(Prev::Word(word))
    }

    /// Copies a class header up to its body, dropping type parameters,
    /// heritage type arguments and `implements` clauses.
    fn class_header(&mut self) {
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            match b {
                b'{' => return,
                b'<' => {
                    let end = scan_type_params(self.src, self.pos)
                        .or_else(|| scan_type_args(self.src, self.pos));
                    match end {
                        Some(end) => self.skip_to(end, Rule::ClassTypeParams),
                        None => self.copy_to(self.pos + 1),
                    }
                }
                b'(' => match match_bracket(self.bytes, self.pos) {
                    Some(end) => self.copy_to(end),
                    None => self.copy_to(self.pos + 1),
                },
                _ if is_ident_start(b) => {
                    let end = ident_end(self.bytes, self.pos);
                    if &self.src[self.pos..end] == "implements" {
                        let mut body = end;
                        while body < self.bytes.len() && self.bytes[body] != b'{' {
                            body += 1;
                        }
                        self.skip_to(body, Rule::Implements);
                    } else {
                        self.copy_to(end);
                    }
                }
                _ => self.copy_char(),
            }
        }
    }

    fn interface_end(&self, name_pos: usize) -> Option<usize> {
        let mut i = name_pos;
        while i < self.bytes.len() && self.bytes[i] != b'{' {
            if self.bytes[i] == b';' {
                return None;
            }
            i += 1;
        }
        let end = match_bracket(self.bytes, i)?;
        Some(self.eat_semicolon(end))
    }

    fn type_alias_end(&self, name_pos: usize) -> Option<usize> {
        let name_end = ident_end(self.bytes, name_pos);
        let mut p = skip_ws(self.bytes, name_end);
        if byte_at(self.bytes, p) == Some(b'<') {
            p = skip_ws(self.bytes, scan_type_params(self.src, p)?);
        }
        if byte_at(self.bytes, p) != Some(b'=') || byte_at(self.bytes, p + 1) == Some(b'=') {
            return None;
        }
        let fallback = self.statement_end(p + 1);
        let end = match scan_type(self.src, p + 1) {
            Some(end) => {
                let tail = skip_inline_ws(self.bytes, end);
                match byte_at(self.bytes, tail) {
                    None | Some(b';') | Some(b'\n') | Some(b'\r') | Some(b'}') => end,
                    _ => fallback,
                }
            }
            None => fallback,
        };
        Some(self.eat_semicolon(end))
    }

    /// End of a statement starting at `pos`: the first `;`, or the first
    /// newline whose next line does not continue a type (`|`, `&`), skipping
    /// balanced brackets.
    fn statement_end(&self, pos: usize) -> usize {
        let mut i = pos;
        while i < self.bytes.len() {
            match self.bytes[i] {
                b'(' | b'[' | b'{' => {
                    i = match match_bracket(self.bytes, i) {
                        Some(end) => end,
                        None => return self.bytes.len(),
                    };
                }
                b'"' | b'\'' => i = skip_string(self.bytes, i),
                b'`' => i = skip_template(self.bytes, i),
                b';' => return i + 1,
                b'\n' => {
                    let next = skip_ws(self.bytes, i);
                    let continues = matches!(byte_at(self.bytes, next), Some(b'|') | Some(b'&'));
                    let before = self.src[pos..i].trim_end();
                    let dangling = before.ends_with('=')
                        || before.ends_with('|')
                        || before.ends_with('&')
                        || before.ends_with(',')
                        || before.is_empty();
                    if !continues && !dangling {
                        return i;
                    }
                    i += 1;
                }
                _ => i += 1,
            }
        }
        self.bytes.len()
    }

    fn eat_semicolon(&self, end: usize) -> usize {
        let p = skip_inline_ws(self.bytes, end);
        if byte_at(self.bytes, p) == Some(b';') {
            p + 1
        } else {
            end
        }
    }

    /// Rewrites `enum Name { A, B = 2 }` starting at the name as a plain
    /// object literal. Returns false if the shape is not recognised.
    fn convert_enum(&mut self, name_pos: usize) -> bool {
        let name_end = ident_end(self.bytes, name_pos);
        if name_end == name_pos {
            return false;
        }
        let open = skip_ws(self.bytes, name_end);
        if byte_at(self.bytes, open) != Some(b'{') {
            return false;
        }
        let Some(close) = match_bracket(self.bytes, open) else {
            return false;
        };
        let name = &self.src[name_pos..name_end];
        let body = &self.src[open + 1..close - 1];

        let mut members = Vec::new();
        let mut next_value: Option<i64> = Some(0);
        for raw in split_top_level(body, b',') {
            let member = strip_comments(raw);
            let member = member.trim();
            if member.is_empty() {
                continue;
            }
            let (key, init) = match member.split_once('=') {
                Some((k, v)) => (k.trim().to_string(), Some(v.trim().to_string())),
                None => (member.to_string(), None),
            };
            let value = match init {
                Some(v) => {
                    next_value = v.parse::<i64>().ok().map(|n| n + 1);
                    v
                }
                None => {
                    let n = next_value.unwrap_or(members.len() as i64);
                    next_value = Some(n + 1);
                    n.to_string()
                }
            };
            let key_text = key.trim_matches(|c| c == '"' || c == '\'');
            let key = if crate::scanner::is_valid_identifier(key_text) {
                key_text.to_string()
            } else {
                format!("{:?}", key_text)
            };
            members.push(format!("{}: {}", key, value));
        }

        self.out
            .push_str(&format!("const {} = {{ {} }};", name, members.join(", ")));
        let end = self.eat_semicolon(close);
        self.skip_to(end, Rule::Enum);
        true
    }

    // ───────────────────────────────────────────────────────────────────────────
    // MARKUP
    // ───────────────────────────────────────────────────────────────────────────

    /// Copies a JSX element or fragment starting at `<`; expressions in
    /// braces are stripped recursively.
    fn jsx_element(&mut self) {
        self.copy_to(self.pos + 1);
        if self.peek(0) == Some(b'>') {
            self.copy_to(self.pos + 1);
            self.jsx_children();
            return;
        }

        let mut name_end = self.pos;
        while name_end < self.bytes.len()
            && (is_ident_char(self.bytes[name_end]) || matches!(self.bytes[name_end], b'.' | b':' | b'-'))
        {
            name_end += 1;
        }
        self.copy_to(name_end);

        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'/' if self.peek(1) == Some(b'>') => {
                    self.copy_to(self.pos + 2);
                    return;
                }
                b'>' => {
                    self.copy_to(self.pos + 1);
                    self.jsx_children();
                    return;
                }
                b'{' => self.jsx_expression(),
                b'"' | b'\'' => {
                    let quote = self.bytes[self.pos];
                    let mut end = self.pos + 1;
                    while end < self.bytes.len() && self.bytes[end] != quote {
                        end += 1;
                    }
                    self.copy_to(end + 1);
                }
                b'<' => self.jsx_element(),
                _ => self.copy_char(),
            }
        }
    }

    fn jsx_children(&mut self) {
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'<' if self.peek(1) == Some(b'/') => {
                    let mut end = self.pos + 2;
                    while end < self.bytes.len() && self.bytes[end] != b'>' {
                        end += 1;
                    }
                    self.copy_to(end + 1);
                    return;
                }
                b'<' => self.jsx_element(),
                b'{' => self.jsx_expression(),
                _ => self.copy_char(),
            }
        }
    }

    fn jsx_expression(&mut self) {
        self.copy_to(self.pos + 1);
        self.code(true);
        if self.peek(0) == Some(b'}') {
            self.copy_to(self.pos + 1);
        }
    }
}

/// Splits on `sep` outside brackets and literals.
fn split_top_level(src: &str, sep: u8) -> Vec<&str> {
    let bytes = src.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'(' | b'[' | b'{' => i = match_bracket(bytes, i).unwrap_or(bytes.len()),
            b'"' | b'\'' => i = skip_string(bytes, i),
            b'`' => i = skip_template(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'/') => i = skip_line_comment(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'*') => i = skip_block_comment(bytes, i),
            b if b == sep => {
                parts.push(&src[start..i]);
                i += 1;
                start = i;
            }
            _ => i += 1,
        }
    }
    parts.push(&src[start..]);
    parts
}

fn strip_comments(src: &str) -> String {
    let bytes = src.as_bytes();
    let mut out = String::with_capacity(src.len());
    let mut i = 0;
    let mut last = 0;
    while i < bytes.len() {
        if bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'/') {
            out.push_str(&src[last..i]);
            i = skip_line_comment(bytes, i);
            last = i;
        } else if bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'*') {
            out.push_str(&src[last..i]);
            i = skip_block_comment(bytes, i);
            last = i;
        } else if bytes[i] == b'"' || bytes[i] == b'\'' {
            i = skip_string(bytes, i);
        } else {
            i += 1;
        }
    }
    out.push_str(&src[last.min(src.len())..]);
    out
}
