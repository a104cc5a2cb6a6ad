//! # Render Harness Builder
//!
//! Wraps processed code into a complete HTML document that the sandbox can
//! execute without a build step.
//!
//! ## Key Invariants
//!
//! 1. **Runtime First**: React, ReactDOM and Babel standalone load before any
//!    user code; detected libraries load after them.
//! 2. **Verbatim Code**: processed code is embedded unchanged apart from
//!    `</script` and `<!--` escapes.
//! 3. **No Duplicate Bindings**: every local bound by the prelude is bound
//!    once, and never when the processed code declares it itself.
//! 4. **Every Failure Is Visible**: the error boundary, the mount `try/catch`
//!    and the window `error`/`unhandledrejection` listeners all render the
//!    same error card and post one `preview-harness` message tagged with the
//!    run id. The first failure wins.
//! 5. **No Panics, No Throws**: construction returns `Result`; the pipeline
//!    converts an `Err` into [`error_document`].

use lazy_static::lazy_static;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

use crate::diagnostics::{Diagnostics, Pass};
use crate::error::PreviewError;
use crate::model::{ComponentDescriptor, ImportBinding, RenderDocument, TransformationResult};
use crate::options::PreviewOptions;
use crate::scanner::{is_ident_char, is_valid_identifier};

/// `source` field of every message the harness posts to its parent.
pub const MESSAGE_SOURCE: &str = "preview-harness";

lazy_static! {
    static ref SCRIPT_CLOSE_RE: Regex = Regex::new(r"(?i)</(script)").unwrap();
}

/// A runtime library the harness knows how to load from a CDN.
#[derive(Debug)]
pub struct Library {
    pub name: &'static str,
    /// Import sources that map onto this library.
    pub modules: &'static [&'static str],
    /// Global the UMD build installs on `window`.
    pub global: &'static str,
    pub scripts: &'static [&'static str],
    /// Usage tokens that pull the library in without an import.
    pub tokens: &'static [&'static str],
}

const REACT_MODULES: &[&str] = &["react", "react/jsx-runtime"];
const REACT_DOM_MODULES: &[&str] = &["react-dom", "react-dom/client"];

pub static LIBRARIES: &[Library] = &[
    Library {
        name: "recharts",
        modules: &["recharts"],
        global: "Recharts",
        scripts: &[
            "https://unpkg.com/prop-types@15/prop-types.min.js",
            "https://unpkg.com/recharts@2/umd/Recharts.js",
        ],
        tokens: &["Recharts", "ResponsiveContainer", "LineChart", "BarChart", "AreaChart", "PieChart"],
    },
    Library {
        name: "lodash",
        modules: &["lodash", "lodash-es"],
        global: "_",
        scripts: &["https://unpkg.com/lodash@4/lodash.min.js"],
        tokens: &["_."],
    },
    Library {
        name: "d3",
        modules: &["d3"],
        global: "d3",
        scripts: &["https://unpkg.com/d3@7/dist/d3.min.js"],
        tokens: &["d3."],
    },
    Library {
        name: "chart.js",
        modules: &["chart.js", "chart.js/auto"],
        global: "Chart",
        scripts: &["https://unpkg.com/chart.js@4/dist/chart.umd.js"],
        tokens: &["new Chart("],
    },
    Library {
        name: "axios",
        modules: &["axios"],
        global: "axios",
        scripts: &["https://unpkg.com/axios@1/dist/axios.min.js"],
        tokens: &["axios."],
    },
    Library {
        name: "dayjs",
        modules: &["dayjs"],
        global: "dayjs",
        scripts: &["https://unpkg.com/dayjs@1/dayjs.min.js"],
        tokens: &["dayjs("],
    },
    Library {
        name: "socket.io",
        modules: &["socket.io-client"],
        global: "io",
        scripts: &["https://cdn.socket.io/4.7.5/socket.io.min.js"],
        tokens: &["io("],
    },
    Library {
        name: "framer-motion",
        modules: &["framer-motion"],
        global: "Motion",
        scripts: &["https://unpkg.com/framer-motion@10/dist/framer-motion.js"],
        tokens: &["<motion.", "AnimatePresence"],
    },
    Library {
        name: "lucide",
        modules: &["lucide-react"],
        global: "LucideReact",
        scripts: &["https://unpkg.com/lucide-react@0.294.0/dist/umd/lucide-react.js"],
        tokens: &[],
    },
];

/// React exports destructured for every run.
const REACT_PRELUDE: &[&str] = &[
    "useState",
    "useEffect",
    "useLayoutEffect",
    "useMemo",
    "useRef",
    "useCallback",
    "useContext",
    "useReducer",
    "useId",
    "useTransition",
    "useDeferredValue",
    "useImperativeHandle",
    "createContext",
    "forwardRef",
    "memo",
    "lazy",
    "Fragment",
    "Suspense",
    "Children",
    "cloneElement",
    "isValidElement",
];

pub fn library_for_module(source: &str) -> Option<&'static Library> {
    LIBRARIES.iter().find(|lib| lib.modules.contains(&source))
}

/// True if `token` occurs in `code` and is not glued to a preceding identifier.
fn mentions(code: &str, token: &str) -> bool {
    let bytes = code.as_bytes();
    code.match_indices(token).any(|(idx, _)| {
        let glued = token.as_bytes()[0].is_ascii_alphanumeric() || token.starts_with('_');
        !glued || idx == 0 || !is_ident_char(bytes[idx - 1])
    })
}

/// Libraries referenced by a stripped import or by a usage token, in registry order.
pub fn detect_libraries(code: &str, imports: &[ImportBinding]) -> Vec<&'static Library> {
    LIBRARIES
        .iter()
        .filter(|lib| {
            imports.iter().any(|imp| lib.modules.contains(&imp.source.as_str()))
                || lib.tokens.iter().any(|t| mentions(code, t))
        })
        .collect()
}

/// `<retry token>-<first 12 hex chars of sha256(code)>`.
pub fn run_id(retry_token: u64, code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    format!("{}-{}", retry_token, &hash[..12])
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Keeps embedded code from terminating its `<script>` element.
pub fn escape_script(code: &str) -> String {
    SCRIPT_CLOSE_RE.replace_all(code, "<\\/$1").replace("<!--", "<\\!--")
}

fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

/// Import rebinding statements, returned with the names they stub.
/// Identifier tokens of detected libraries are bound from the library global
/// too, so code that uses them without an import still resolves.
fn import_bindings(
    imports: &[ImportBinding],
    declared: &HashSet<&str>,
    libraries: &[&Library],
    code: &str,
    options: &PreviewOptions,
) -> (Vec<String>, Vec<String>) {
    let mut bound: HashSet<String> = declared.iter().map(|s| s.to_string()).collect();
    let mut lines = Vec::new();
    let mut stubbed = Vec::new();

    let mut react_names: Vec<(String, String)> = REACT_PRELUDE
        .iter()
        .map(|n| (n.to_string(), n.to_string()))
        .collect();
    for imp in imports.iter().filter(|i| REACT_MODULES.contains(&i.source.as_str())) {
        react_names.extend(imp.named.iter().cloned());
    }
    let mut react_fields = Vec::new();
    for (imported, local) in react_names {
        if bound.insert(local.clone()) {
            react_fields.push(if imported == local {
                local
            } else {
                format!("{}: {}", imported, local)
            });
        }
    }
    bound.insert("React".to_string());
    bound.insert("ReactDOM".to_string());
    if !react_fields.is_empty() {
        lines.push(format!("const {{ {} }} = React;", react_fields.join(", ")));
    }

    for imp in imports.iter().filter(|i| !i.type_only) {
        let source = imp.source.as_str();
        if REACT_MODULES.contains(&source) {
            for local in [&imp.default, &imp.namespace].into_iter().flatten() {
                if bound.insert(local.clone()) {
                    lines.push(format!("const {} = React;", local));
                }
            }
            continue;
        }
        let global = if REACT_DOM_MODULES.contains(&source) {
            Some("ReactDOM")
        } else {
            library_for_module(source).map(|lib| lib.global)
        };

        if let Some(global) = global {
            let mut pick = |local: &str, name: &str| {
                if local != global && bound.insert(local.to_string()) {
                    lines.push(format!(
                        "const {} = __previewImport({}, {});",
                        local,
                        js_string(global),
                        js_string(name)
                    ));
                }
            };
            if let Some(local) = &imp.default {
                pick(local, "default");
            }
            if let Some(local) = &imp.namespace {
                pick(local, "*");
            }
            for (imported, local) in &imp.named {
                pick(local, imported);
            }
            continue;
        }

        if !options.stub_unknown_imports {
            continue;
        }
        if let Some(local) = &imp.namespace {
            if bound.insert(local.clone()) {
                lines.push(format!("const {} = __previewStubModule({});", local, js_string(local)));
                stubbed.push(local.clone());
            }
        }
        let names = imp.default.iter().chain(imp.named.iter().map(|(_, local)| local));
        for local in names {
            if bound.insert(local.clone()) {
                lines.push(format!("const {} = __previewStub({});", local, js_string(local)));
                stubbed.push(local.clone());
            }
        }
    }

    for lib in libraries {
        let tokens = lib
            .tokens
            .iter()
            .filter(|t| **t != lib.global && is_valid_identifier(t));
        for token in tokens {
            if mentions(code, token) && bound.insert(token.to_string()) {
                lines.push(format!(
                    "const {} = __previewImport({}, {});",
                    token,
                    js_string(lib.global),
                    js_string(token)
                ));
            }
        }
    }

    (lines, stubbed)
}

const HARNESS_STYLE: &str = r#"
  html, body { margin: 0; padding: 0; }
  body { font-family: system-ui, -apple-system, "Segoe UI", Roboto, sans-serif; }
  .preview-error { margin: 16px; padding: 16px; border: 1px solid #fca5a5; border-radius: 8px; background: #fef2f2; color: #7f1d1d; }
  .preview-error h2 { margin: 0 0 8px; font-size: 16px; }
  .preview-error pre { margin: 8px 0 0; white-space: pre-wrap; word-break: break-word; font-size: 12px; }
  .preview-error .preview-error-stack { color: #991b1b; opacity: 0.8; max-height: 240px; overflow: auto; }
  [data-preview-stub] { display: inline-block; padding: 4px 8px; border: 1px dashed #cbd5e1; border-radius: 4px; color: #64748b; font-size: 12px; }
"#;

/// Error reporting and import helpers, run as a classic script before the
/// Babel block so its functions are globals.
fn runtime_script(run_id: &str, root_id: &str, stubs: bool) -> String {
    format!(
        r#"
  window.__PREVIEW_RUN_ID__ = {run_id};
  var __PREVIEW_STUBS__ = {stubs};
  var __previewFailed = false;

  function __previewReport(error, extraStack) {{
    var message = (error && error.message) ? error.message : String(error);
    var stack = (error && error.stack) ? String(error.stack) : "";
    if (extraStack) {{ stack = stack ? stack + "\n" + extraStack : String(extraStack); }}
    try {{
      window.parent.postMessage({{ source: {source}, type: "error", runId: window.__PREVIEW_RUN_ID__, message: message, stack: stack }}, "*");
    }} catch (_) {{}}
    return {{ message: message, stack: stack }};
  }}

  function __previewShowError(title, error, extraStack) {{
    if (__previewFailed) return;
    __previewFailed = true;
    var info = __previewReport(error, extraStack);
    var root = document.getElementById({root_id});
    if (root) root.style.display = "none";
    var card = document.getElementById("preview-error");
    if (!card) return;
    card.innerHTML = "";
    var heading = document.createElement("h2");
    heading.textContent = title;
    var message = document.createElement("pre");
    message.className = "preview-error-message";
    message.textContent = info.message;
    card.appendChild(heading);
    card.appendChild(message);
    if (info.stack) {{
      var stack = document.createElement("pre");
      stack.className = "preview-error-stack";
      stack.textContent = info.stack;
      card.appendChild(stack);
    }}
    card.hidden = false;
  }}

  window.addEventListener("error", function (event) {{
    __previewShowError("Runtime Error", event.error || event.message);
  }});
  window.addEventListener("unhandledrejection", function (event) {{
    __previewShowError("Unhandled Promise Rejection", event.reason);
  }});

  function __previewStub(name) {{
    var Stub = function (props) {{
      return React.createElement("span", {{ "data-preview-stub": name }}, (props && props.children) || name);
    }};
    Stub.displayName = name;
    return Stub;
  }}

  function __previewStubModule(name) {{
    return new Proxy({{}}, {{ get: function (_, key) {{ return __previewStub(name + "." + String(key)); }} }});
  }}

  function __previewImport(global, name) {{
    var mod = window[global];
    if (name === "*") return mod || (__PREVIEW_STUBS__ ? __previewStubModule(global) : undefined);
    if (name === "default") return mod && mod.__esModule && mod.default ? mod.default : mod;
    if (mod && mod[name] !== undefined) return mod[name];
    return __PREVIEW_STUBS__ ? __previewStub(name) : undefined;
  }}

  class __PreviewErrorBoundary extends React.Component {{
    constructor(props) {{
      super(props);
      this.state = {{ failed: false }};
    }}
    static getDerivedStateFromError() {{
      return {{ failed: true }};
    }}
    componentDidCatch(error, info) {{
      __previewShowError("Render Error", error, info && info.componentStack);
    }}
    render() {{
      return this.state.failed ? null : this.props.children;
    }}
  }}
"#,
        run_id = js_string(run_id),
        stubs = stubs,
        source = js_string(MESSAGE_SOURCE),
        root_id = js_string(root_id),
    )
}

fn mount_block(component: &str, root_id: &str) -> String {
    format!(
        r#"
try {{
  const __previewContainer = document.getElementById({root_id});
  const __previewElement = React.createElement(__PreviewErrorBoundary, null, React.createElement({component}));
  if (ReactDOM.createRoot) {{
    ReactDOM.createRoot(__previewContainer).render(__previewElement);
  }} else {{
    ReactDOM.render(__previewElement, __previewContainer);
  }}
}} catch (error) {{
  __previewShowError("Render Error", error);
}}
"#,
        root_id = js_string(root_id),
        component = component,
    )
}

fn head(options: &PreviewOptions, libraries: &[&Library]) -> String {
    let mut head = String::new();
    head.push_str("<meta charset=\"UTF-8\" />\n");
    head.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\" />\n");
    head.push_str("<title>Preview</title>\n");
    for src in [&options.cdn.react, &options.cdn.react_dom] {
        head.push_str(&format!("<script crossorigin src=\"{}\"></script>\n", escape_html(src)));
    }
    head.push_str(&format!("<script src=\"{}\"></script>\n", escape_html(&options.cdn.babel)));
    if options.tailwind {
        head.push_str(&format!("<script src=\"{}\"></script>\n", escape_html(&options.cdn.tailwind)));
    }
    for lib in libraries {
        for src in lib.scripts {
            head.push_str(&format!("<script crossorigin src=\"{}\"></script>\n", escape_html(src)));
        }
    }
    head.push_str(&format!("<style>{}</style>\n", HARNESS_STYLE));
    head
}

/// Everything the harness needs from the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct HarnessInput<'a> {
    pub result: &'a TransformationResult,
    pub component: &'a ComponentDescriptor,
    pub imports: &'a [ImportBinding],
    pub declared: &'a HashSet<&'a str>,
    pub class_name: Option<&'a str>,
    pub retry_token: u64,
}

pub fn build_harness(
    input: &HarnessInput,
    options: &PreviewOptions,
    diagnostics: &mut Diagnostics,
) -> Result<RenderDocument, PreviewError> {
    let component = input.component.name.as_str();
    if !is_valid_identifier(component) {
        return Err(PreviewError::Transformation(format!(
            "'{}' is not a valid component identifier",
            component
        )));
    }

    let code = &input.result.processed_code;
    let libraries = detect_libraries(code, input.imports);
    let (bindings, stubbed) = import_bindings(input.imports, input.declared, &libraries, code, options);
    let run_id = run_id(input.retry_token, code);

    if !libraries.is_empty() {
        let names: Vec<&str> = libraries.iter().map(|l| l.name).collect();
        diagnostics.info(Pass::Harness, format!("libraries: {}", names.join(", ")));
    }
    if !stubbed.is_empty() {
        diagnostics.warn(
            Pass::Harness,
            format!("unresolved imports bound to stubs: {}", stubbed.join(", ")),
        );
    }

    let class_attr = input
        .class_name
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| format!(" class=\"{}\"", escape_html(c)))
        .unwrap_or_default();
    let root_id = options.root_element_id.as_str();

    let mut babel = String::new();
    babel.push_str(&bindings.join("\n"));
    babel.push_str("\n\n");
    babel.push_str(&escape_script(code));
    babel.push('\n');
    babel.push_str(&mount_block(component, root_id));

    let html = format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n{head}</head>\n<body>\n<div id=\"{root}\"{class_attr}></div>\n<div id=\"preview-error\" class=\"preview-error\" role=\"alert\" hidden></div>\n<script>{runtime}</script>\n<script type=\"text/babel\" data-presets=\"react\">\n{babel}</script>\n</body>\n</html>\n",
        head = head(options, &libraries),
        root = escape_html(root_id),
        class_attr = class_attr,
        runtime = runtime_script(&run_id, root_id, options.stub_unknown_imports),
        babel = babel,
    );

    diagnostics.info(
        Pass::Harness,
        format!("mounting {} ({}), run {}", component, input.component.source, run_id),
    );

    Ok(RenderDocument {
        html,
        run_id,
        component_name: component.to_string(),
        libraries: libraries.iter().map(|l| l.name.to_string()).collect(),
        is_error: false,
    })
}

/// Static document showing a build failure. Runs no user code.
pub fn error_document(title: &str, message: &str, run_id: &str, options: &PreviewOptions) -> RenderDocument {
    let html = format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\" />\n<title>Preview</title>\n<style>{style}</style>\n</head>\n<body>\n<div id=\"{root}\">\n<div class=\"preview-error\" role=\"alert\">\n<h2>{title}</h2>\n<pre class=\"preview-error-message\">{message}</pre>\n</div>\n</div>\n</body>\n</html>\n",
        style = HARNESS_STYLE,
        root = escape_html(&options.root_element_id),
        title = escape_html(title),
        message = escape_html(message),
    );
    RenderDocument {
        html,
        run_id: run_id.to_string(),
        component_name: String::new(),
        libraries: Vec::new(),
        is_error: true,
    }
}
