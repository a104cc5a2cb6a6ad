//! Fence & Separator Normalizer
//!
//! Turns a chat-style answer into plain source text. Documentation fences are
//! removed (keeping their content), prose around them is dropped, and file
//! name lines are turned into canonical `// <path>` boundary markers. All
//! detection works on whole lines anchored at line start.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Fence tags whose content is never executable script.
const NON_SCRIPT_LANGUAGES: &[&str] = &[
    "bash", "sh", "shell", "zsh", "console", "terminal", "powershell", "ps", "cmd", "bat", "css",
    "scss", "sass", "less", "json", "jsonc", "html", "xml", "svg", "yaml", "yml", "toml", "ini",
    "env", "dotenv", "text", "txt", "plaintext", "markdown", "md", "diff", "sql", "graphql", "python",
    "py",
];

const PATH_PATTERN: &str =
    r"[\w@./-]+\.(?:tsx|ts|jsx|js|mjs|cjs|css|scss|sass|less|json|md|mdx|html|svg|txt|ya?ml)";

lazy_static! {
    static ref FENCE_RE: Regex = Regex::new(r"^[ \t]*(`{3,}|~{3,})[ \t]*([^`\n]*?)[ \t]*$").unwrap();
    static ref MARKER_RE: Regex = Regex::new(&format!(
        r"^[ \t]*(?://|/\*+)[ \t]*(?:[-=*]{{2,}}[ \t]*)?(?:(?i:file(?:name)?|path)[ \t]*:[ \t]*)?({})[ \t]*(?:[-=*]{{2,}})?[ \t]*(?:\*+/)?[ \t]*$",
        PATH_PATTERN
    ))
    .unwrap();
    static ref HEADING_RE: Regex = Regex::new(&format!(
        r"^[ \t]*(?:#{{1,6}}[ \t]+|[-*][ \t]+|\d+\.[ \t]+)?(?:\*\*|__|`)?(?:(?i:file(?:name)?)[ \t]*:[ \t]*)?(?:\*\*|__|`)?({})(?:\*\*|__|`)?[ \t]*:?[ \t]*(?:\*\*|__)?[ \t]*$",
        PATH_PATTERN
    ))
    .unwrap();
    static ref PATH_TOKEN_RE: Regex = Regex::new(&format!(r"({})\b", PATH_PATTERN)).unwrap();
    static ref CODE_LINE_RE: Regex = Regex::new(
        r"^[ \t]*(?:import\b|export\b|const\b|let\b|var\b|function\b|class\b|interface\b|type\s+\w+\s*=|<[A-Za-z])|[;{}][ \t]*$"
    )
    .unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMarker {
    pub path: String,
    /// 1-based line of the marker in the normalized code, before single-file
    /// markers are dropped.
    pub line: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedSource {
    pub code: String,
    pub file_markers: Vec<FileMarker>,
    pub is_multi_file: bool,
    /// Number of fenced blocks whose content was kept.
    pub fence_blocks: usize,
}

/// Path named by a boundary marker line, if `line` is one.
pub fn marker_path(line: &str) -> Option<&str> {
    MARKER_RE.captures(line).and_then(|c| c.get(1)).map(|m| m.as_str())
}

fn heading_path(line: &str) -> Option<&str> {
    marker_path(line).or_else(|| HEADING_RE.captures(line).and_then(|c| c.get(1)).map(|m| m.as_str()))
}

pub fn normalize(raw: &str) -> NormalizedSource {
    let text = raw.replace("\r\n", "\n");

    let (code, fence_blocks) = match extract_fenced(&text) {
        Some((code, blocks)) => (code, blocks),
        None => (trim_stray_fences(&text), 0),
    };

    let mut file_markers = Vec::new();
    for (idx, line) in code.lines().enumerate() {
        if let Some(path) = marker_path(line) {
            file_markers.push(FileMarker {
                path: path.to_string(),
                line: idx + 1,
            });
        }
    }

    let distinct: HashSet<&str> = file_markers.iter().map(|m| m.path.as_str()).collect();
    let is_multi_file = distinct.len() > 1;

    let mut lines = Vec::new();
    for line in code.lines() {
        match marker_path(line) {
            Some(path) if is_multi_file => lines.push(format!("// {}", path)),
            Some(_) => {}
            None => lines.push(line.to_string()),
        }
    }

    NormalizedSource {
        code: trim_blank_lines(&lines.join("\n")),
        file_markers,
        is_multi_file,
        fence_blocks,
    }
}

struct FencedBlock<'a> {
    path: Option<String>,
    body: Vec<&'a str>,
}

/// Keeps only fenced content when the text reads like a chat answer.
/// Returns `None` when fences are absent, empty, or the text starts as code.
fn extract_fenced(text: &str) -> Option<(String, usize)> {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut blocks: Vec<FencedBlock> = Vec::new();
    let mut pending_path: Option<String> = None;
    let mut fenced_content = false;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let Some(caps) = FENCE_RE.captures(line) else {
            if blocks.is_empty() && CODE_LINE_RE.is_match(line) && marker_path(line).is_none() {
                // Code before the first fence: fences here belong to the code.
                return None;
            }
            if let Some(path) = heading_path(line) {
                pending_path = Some(path.to_string());
            }
            i += 1;
            continue;
        };

        let fence = caps.get(1).map(|m| m.as_str()).unwrap_or("```");
        let info = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        let fence_char = fence.as_bytes()[0];
        let fence_len = fence.len();

        let mut body = Vec::new();
        i += 1;
        while i < lines.len() {
            if is_closing_fence(lines[i], fence_char, fence_len) {
                i += 1;
                break;
            }
            body.push(lines[i]);
            i += 1;
        }

        let info_path = PATH_TOKEN_RE
            .captures(info)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());
        let path = info_path.or_else(|| pending_path.take());
        if body.iter().any(|l| !l.trim().is_empty()) {
            fenced_content = true;
        }
        // A named file goes to the classifier, whatever its tag.
        if path.is_none() && is_non_script_tag(info) {
            continue;
        }
        blocks.push(FencedBlock { path, body });
    }

    if !fenced_content {
        return None;
    }

    let mut out = String::new();
    for block in &blocks {
        if let Some(path) = &block.path {
            let first = block.body.iter().find(|l| !l.trim().is_empty());
            if first.map_or(true, |l| marker_path(l).is_none()) {
                out.push_str("// ");
                out.push_str(path);
                out.push('\n');
            }
        }
        for line in &block.body {
            out.push_str(line);
            out.push('\n');
        }
    }
    Some((out, blocks.len()))
}

fn is_non_script_tag(info: &str) -> bool {
    info.split(|c: char| c.is_whitespace() || c == '{' || c == ',')
        .next()
        .map(|tag| NON_SCRIPT_LANGUAGES.contains(&tag.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn is_closing_fence(line: &str, fence_char: u8, min_len: usize) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= min_len && trimmed.bytes().all(|b| b == fence_char)
}

/// Drops whitespace-only lines at both ends; non-empty output ends in one newline.
pub fn trim_blank_lines(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.iter().position(|l| !l.trim().is_empty());
    let end = lines.iter().rposition(|l| !l.trim().is_empty());
    match (start, end) {
        (Some(start), Some(end)) => format!("{}\n", lines[start..=end].join("\n")),
        _ => String::new(),
    }
}

/// Drops a lone fence line at the very start or end of otherwise plain code.
fn trim_stray_fences(text: &str) -> String {
    let trimmed = trim_blank_lines(text);
    let mut lines: Vec<&str> = trimmed.lines().collect();
    if lines.first().map_or(false, |l| FENCE_RE.is_match(l)) {
        lines.remove(0);
    }
    if lines.last().map_or(false, |l| FENCE_RE.is_match(l)) {
        lines.pop();
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_code_is_untouched() {
        let src = "const App = () => <div>Hi</div>;\n";
        let out = normalize(src);
        assert_eq!(out.code, src);
        assert!(!out.is_multi_file);
        assert_eq!(out.fence_blocks, 0);
    }

    #[test]
    fn test_fence_with_prose_keeps_only_code() {
        let src = "Here is your component:\n\n```tsx\nconst A = 1;\n```\n\nLet me know if you need more.";
        let out = normalize(src);
        assert_eq!(out.code, "const A = 1;\n");
        assert_eq!(out.fence_blocks, 1);
    }

    #[test]
    fn test_shell_and_style_blocks_are_dropped() {
        let src = "```tsx\nfunction App() { return <div/>; }\n```\n\nInstall:\n\n```bash\nnpm install recharts\n```\n\n```css\n.card { color: red; }\n```\n";
        let out = normalize(src);
        assert_eq!(out.code, "function App() { return <div/>; }\n");
        assert_eq!(out.fence_blocks, 1);

        let only_shell = normalize("Run this:\n```sh\nnpm i\n```");
        assert_eq!(only_shell.code, "");
    }

    #[test]
    fn test_named_style_block_is_kept_for_the_classifier() {
        let src = "### styles.css\n```css\n.a {}\n```\n### App.tsx\n```tsx\nconst App = 1;\n```";
        let out = normalize(src);
        assert!(out.is_multi_file);
        assert_eq!(out.code, "// styles.css\n.a {}\n// App.tsx\nconst App = 1;\n");
    }

    #[test]
    fn test_tilde_fence_and_unclosed_fence() {
        assert_eq!(normalize("~~~js\nlet a;\n~~~").code, "let a;\n");
        assert_eq!(normalize("```typescript\nlet a;\nlet b;").code, "let a;\nlet b;\n");
    }

    #[test]
    fn test_headings_become_markers() {
        let src = "### types.ts\n```ts\nexport type A = string;\n```\n**App.tsx**\n```tsx\nexport default function App() {}\n```\n";
        let out = normalize(src);
        assert!(out.is_multi_file);
        assert_eq!(
            out.code,
            "// types.ts\nexport type A = string;\n// App.tsx\nexport default function App() {}\n"
        );
        let paths: Vec<&str> = out.file_markers.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(paths, vec!["types.ts", "App.tsx"]);
    }

    #[test]
    fn test_fence_info_names_the_file() {
        let out = normalize("```tsx title=\"src/Card.tsx\"\nconst Card = 1;\n```\n```tsx App.tsx\nconst App = 2;\n```");
        assert_eq!(out.code, "// src/Card.tsx\nconst Card = 1;\n// App.tsx\nconst App = 2;\n");
    }

    #[test]
    fn test_marker_formats() {
        assert_eq!(marker_path("// App.tsx"), Some("App.tsx"));
        assert_eq!(marker_path("  // File: src/components/Card.jsx"), Some("src/components/Card.jsx"));
        assert_eq!(marker_path("/* === types.ts === */"), Some("types.ts"));
        assert_eq!(marker_path("// --- styles.css ---"), Some("styles.css"));
        assert_eq!(marker_path("// ----- source: App.tsx -----"), None);
        assert_eq!(marker_path("// uses React.memo here"), None);
        assert_eq!(marker_path("const x = 1; // App.tsx"), None);
    }

    #[test]
    fn test_single_marker_is_stripped() {
        let out = normalize("// App.tsx\nconst App = () => null;\n");
        assert_eq!(out.code, "const App = () => null;\n");
        assert!(!out.is_multi_file);
        assert_eq!(out.file_markers.len(), 1);
    }

    #[test]
    fn test_fences_inside_code_are_kept() {
        let src = "const md = `\n```js\nfoo()\n```\n`;\n";
        assert_eq!(normalize(src).code, src);
    }

    #[test]
    fn test_stray_trailing_fence() {
        assert_eq!(normalize("const a = 1;\n```\n").code, "const a = 1;\n");
    }

    #[test]
    fn test_idempotent() {
        let src = "### a.ts\n```ts\nconst a = 1;\n```\n### App.tsx\n```tsx\nconst App = 1;\n```";
        let once = normalize(src).code;
        assert_eq!(normalize(&once).code, once);
    }
}
