//! File Classifier & Merger
//!
//! Splits a normalized multi-file blob back into logical files, decides which
//! of them carry executable code, orders the survivors (type modules first,
//! the root `App` file last) and concatenates them behind boundary comments.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::diagnostics::{Diagnostics, Pass};
use crate::model::LogicalFile;
use crate::normalize::marker_path;

/// Path given to code that precedes the first marker.
pub const PREAMBLE_PATH: &str = "(preamble)";

const ASSET_EXTENSIONS: &[&str] = &[
    "css", "scss", "sass", "less", "json", "md", "mdx", "html", "svg", "txt", "yml", "yaml",
];
const TYPE_FILE_STEMS: &[&str] = &["types", "type", "interfaces", "models", "typings", "constants"];
const ENTRY_STEMS: &[&str] = &["index", "main"];

lazy_static! {
    static ref EXECUTABLE_DECL_RE: Regex = Regex::new(
        r"(?m)^[ \t]*(?:export[ \t]+)?(?:default[ \t]+)?(?:async[ \t]+)?(?:function\b|(?:abstract[ \t]+)?class[ \t]+[A-Za-z_$]|(?:const|let|var)[ \t]+[^=;]+=|(?:const[ \t]+)?enum[ \t]+[A-Za-z_$])"
    )
    .unwrap();
    static ref DEFAULT_EXPORT_RE: Regex = Regex::new(r"(?m)^[ \t]*export[ \t]+default\b").unwrap();
    static ref CAPITALIZED_DECL_RE: Regex = Regex::new(
        r"(?m)^[ \t]*(?:export[ \t]+)?(?:default[ \t]+)?(?:async[ \t]+)?(?:function[ \t]*\*?[ \t]*|class[ \t]+|(?:const|let|var)[ \t]+)[A-Z]"
    )
    .unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rejection {
    /// Stylesheet, data or documentation file.
    Asset,
    /// Ambient `.d.ts` declarations.
    Declaration,
    /// `index`/`main` file that only mounts the app.
    EntryPoint,
    NoExecutableDeclaration,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::Asset => "stylesheet/data",
            Rejection::Declaration => "declaration file",
            Rejection::EntryPoint => "entry point",
            Rejection::NoExecutableDeclaration => "no executable declaration",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedSource {
    pub code: String,
    pub is_multi_file: bool,
    /// Paths of the merged files, in output order.
    pub files: Vec<String>,
}

/// True if `content` declares a named function, class, enum or initialized binding.
pub fn has_executable_declaration(content: &str) -> bool {
    EXECUTABLE_DECL_RE.is_match(content) || DEFAULT_EXPORT_RE.is_match(content)
}

/// Splits at boundary markers. A repeated path keeps only its last body.
pub fn split_logical_files(code: &str) -> Vec<LogicalFile> {
    let mut files: Vec<LogicalFile> = Vec::new();
    let mut path = PREAMBLE_PATH.to_string();
    let mut body = String::new();

    for line in code.lines() {
        if let Some(next) = marker_path(line) {
            files.push(LogicalFile::new(std::mem::take(&mut path), std::mem::take(&mut body)));
            path = next.to_string();
            continue;
        }
        body.push_str(line);
        body.push('\n');
    }
    files.push(LogicalFile::new(path, body));

    files.retain(|f| f.path != PREAMBLE_PATH || !f.content.trim().is_empty());

    let mut kept: Vec<LogicalFile> = Vec::with_capacity(files.len());
    for file in files {
        kept.retain(|f| f.path != file.path);
        kept.push(file);
    }
    kept
}

/// Inclusion predicate for a single logical file.
pub fn classify(file: &LogicalFile) -> Result<(), Rejection> {
    let ext = file.extension();
    if ASSET_EXTENSIONS.contains(&ext.as_str()) {
        return Err(Rejection::Asset);
    }
    if ext == "d.ts" {
        return Err(Rejection::Declaration);
    }
    let stem = file.stem().to_lowercase();
    if ENTRY_STEMS.contains(&stem.as_str()) && !CAPITALIZED_DECL_RE.is_match(&file.content) {
        return Err(Rejection::EntryPoint);
    }
    if !has_executable_declaration(&file.content) {
        return Err(Rejection::NoExecutableDeclaration);
    }
    Ok(())
}

fn is_type_file(file: &LogicalFile) -> bool {
    let base = file.basename().to_lowercase();
    let stem = file.stem().to_lowercase();
    TYPE_FILE_STEMS.contains(&stem.as_str()) || base.contains(".types.")
}

fn is_root_file(file: &LogicalFile) -> bool {
    file.stem().eq_ignore_ascii_case("app")
}

/// Type modules first, the root file last, everything else in input order.
pub fn order_files(files: &mut [LogicalFile]) {
    files.sort_by_key(|f| {
        if is_type_file(f) {
            0
        } else if is_root_file(f) {
            2
        } else {
            1
        }
    });
}

pub fn boundary_comment(path: &str) -> String {
    format!("// ----- source: {} -----", path)
}

/// Classifies and merges a normalized source. Single-file input passes through.
pub fn merge_files(code: &str, is_multi_file: bool, diagnostics: &mut Diagnostics) -> MergedSource {
    if !is_multi_file {
        return MergedSource {
            code: code.to_string(),
            is_multi_file: false,
            files: Vec::new(),
        };
    }

    let mut retained = Vec::new();
    for file in split_logical_files(code) {
        match classify(&file) {
            Ok(()) => retained.push(file),
            Err(reason) => diagnostics.info(
                Pass::Files,
                format!("excluded {} ({})", file.path, reason.as_str()),
            ),
        }
    }

    if retained.is_empty() {
        diagnostics.warn(
            Pass::Files,
            "no file passed the inclusion predicate, treating input as a single file",
        );
        return MergedSource {
            code: code.to_string(),
            is_multi_file: true,
            files: Vec::new(),
        };
    }

    order_files(&mut retained);

    let blocks: Vec<String> = retained
        .iter()
        .map(|f| format!("{}\n{}\n", boundary_comment(&f.path), f.content.trim_matches('\n')))
        .collect();
    let files: Vec<String> = retained.into_iter().map(|f| f.path).collect();

    diagnostics.info(Pass::Files, format!("merged {} files: {}", files.len(), files.join(", ")));

    MergedSource {
        code: blocks.join("\n"),
        is_multi_file: true,
        files,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_keeps_preamble_and_last_duplicate() {
        let code = "const shared = 1;\n// A.tsx\nconst A = 1;\n// B.tsx\nconst B = 1;\n// A.tsx\nconst A = 2;\n";
        let files = split_logical_files(code);
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec![PREAMBLE_PATH, "B.tsx", "A.tsx"]);
        assert_eq!(files[2].content, "const A = 2;\n");
    }

    #[test]
    fn test_classify_rejections() {
        let css = LogicalFile::new("styles.css", ".a { color: red; }");
        assert_eq!(classify(&css), Err(Rejection::Asset));

        let dts = LogicalFile::new("global.d.ts", "declare const x: number;");
        assert_eq!(classify(&dts), Err(Rejection::Declaration));

        let index = LogicalFile::new(
            "src/index.tsx",
            "const root = ReactDOM.createRoot(document.getElementById('root'));\nroot.render(<App />);\n",
        );
        assert_eq!(classify(&index), Err(Rejection::EntryPoint));

        let types = LogicalFile::new("types.ts", "export interface Props {\n  name: string;\n}\n");
        assert_eq!(classify(&types), Err(Rejection::NoExecutableDeclaration));

        let app = LogicalFile::new("App.tsx", "export default function App() {}\n");
        assert_eq!(classify(&app), Ok(()));
    }

    #[test]
    fn test_index_with_component_is_kept() {
        let index = LogicalFile::new("index.jsx", "function Widget() { return null; }\n");
        assert_eq!(classify(&index), Ok(()));
    }

    #[test]
    fn test_ordering_type_first_root_last() {
        let mut files = vec![
            LogicalFile::new("App.tsx", ""),
            LogicalFile::new("Card.tsx", ""),
            LogicalFile::new("types.ts", ""),
            LogicalFile::new("List.tsx", ""),
            LogicalFile::new("user.types.ts", ""),
        ];
        order_files(&mut files);
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["types.ts", "user.types.ts", "Card.tsx", "List.tsx", "App.tsx"]);
    }

    #[test]
    fn test_merge_fails_soft() {
        let mut diags = Diagnostics::new();
        let code = "// a.css\n.a {}\n// b.json\n{}\n";
        let merged = merge_files(code, true, &mut diags);
        assert_eq!(merged.code, code);
        assert!(merged.files.is_empty());
        assert!(diags.has_warnings());
    }

    #[test]
    fn test_boundary_comment_is_not_a_marker() {
        assert_eq!(marker_path(&boundary_comment("App.tsx")), None);
    }
}
