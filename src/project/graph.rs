//! Module graph walk: starting from the root files, follow local imports so
//! the program contains every file the compiler would pull in.

use crate::constants::{JS_EXTENSIONS, TS_EXTENSIONS};
use crate::project::tsconfig::{normalize, CompilerOptions};
use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tree_sitter::{Node, Parser};

/// Output extensions and the source extensions they are compiled from
const JS_TO_TS: &[(&str, &[&str])] = &[
    (".js", &[".ts", ".tsx"]),
    (".jsx", &[".tsx"]),
    (".mjs", &[".mts"]),
    (".cjs", &[".cts"]),
];

fn reference_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^///\s*<reference\s+path\s*=\s*["']([^"']+)["']"#).expect("reference regex")
    })
}

/// A dependency named by a source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleReference {
    /// `import`, `export … from`, `import()` or `require()`
    Module(String),
    /// `/// <reference path="…" />`, always relative to the referencing file
    Path(String),
}

fn grammar_for(path: &Path) -> tree_sitter::Language {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("tsx") | Some("jsx") => tree_sitter_typescript::LANGUAGE_TSX.into(),
        _ => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
    }
}

/// Contents of a string literal node, without its quotes
fn string_value(node: Node, source: &str) -> Option<String> {
    if node.kind() != "string" {
        return None;
    }
    let value = source[node.byte_range()].trim_matches(|c| c == '"' || c == '\'');
    (!value.is_empty()).then(|| value.to_string())
}

/// `import('…')` and `require('…')` with a literal argument
fn call_target(node: Node, source: &str) -> Option<String> {
    let function = node.child_by_field_name("function")?;
    let is_loader = match function.kind() {
        "import" => true,
        "identifier" => &source[function.byte_range()] == "require",
        _ => false,
    };
    if !is_loader {
        return None;
    }
    let arguments = node.child_by_field_name("arguments")?;
    let mut cursor = arguments.walk();
    let first = arguments.named_children(&mut cursor).next()?;
    string_value(first, source)
}

/// Dependencies referenced by `source`, in document order.
///
/// The file is parsed with the TypeScript grammar (TSX for `.tsx`/`.jsx`), so
/// commented-out imports and import-like text inside strings are ignored.
pub fn module_references(path: &Path, source: &str) -> Result<Vec<ModuleReference>> {
    let mut parser = Parser::new();
    parser
        .set_language(&grammar_for(path))
        .context("Failed to load TypeScript grammar")?;
    let tree = parser
        .parse(source, None)
        .with_context(|| format!("Failed to parse source file: {}", path.display()))?;

    let mut references: Vec<ModuleReference> = Vec::new();
    let mut stack = vec![tree.root_node()];
    while let Some(node) = stack.pop() {
        let found = match node.kind() {
            "import_statement" | "export_statement" => node
                .child_by_field_name("source")
                .and_then(|n| string_value(n, source))
                .map(ModuleReference::Module),
            // `import x = require('…')`
            "import_require_clause" => {
                let mut cursor = node.walk();
                let target = node
                    .named_children(&mut cursor)
                    .find_map(|n| string_value(n, source));
                target.map(ModuleReference::Module)
            }
            "call_expression" => call_target(node, source).map(ModuleReference::Module),
            "comment" => reference_re()
                .captures(&source[node.byte_range()])
                .map(|caps| ModuleReference::Path(caps[1].trim().to_string())),
            _ => None,
        };
        if let Some(reference) = found {
            if !references.contains(&reference) {
                references.push(reference);
            }
        }

        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }

    Ok(references)
}

/// Maps import specifiers to files on disk the way the compiler's classic
/// node-style resolution does for local files
pub struct ModuleResolver {
    extensions: Vec<&'static str>,
    base_url: Option<PathBuf>,
}

impl ModuleResolver {
    pub fn new(options: &CompilerOptions) -> Self {
        let mut extensions: Vec<&'static str> = TS_EXTENSIONS.to_vec();
        extensions.push(".d.ts");
        if options.allow_js {
            extensions.extend_from_slice(JS_EXTENSIONS);
        }
        Self {
            extensions,
            base_url: options.base_url.clone(),
        }
    }

    /// Whether `path` has an extension the program accepts
    pub fn is_source_file(&self, path: &Path) -> bool {
        let name = path.to_string_lossy();
        self.extensions.iter().any(|ext| name.ends_with(ext))
    }

    /// Resolve a dependency of `from`; package imports yield `None`
    pub fn resolve_reference(&self, from: &Path, reference: &ModuleReference) -> Option<PathBuf> {
        match reference {
            ModuleReference::Module(specifier) => self.resolve(from, specifier),
            ModuleReference::Path(path) => {
                let base = if Path::new(path).is_absolute() {
                    PathBuf::from(path)
                } else {
                    from.parent()?.join(path)
                };
                self.probe(&normalize(&base))
            }
        }
    }

    /// Resolve `specifier` imported from `from`; package imports yield `None`
    pub fn resolve(&self, from: &Path, specifier: &str) -> Option<PathBuf> {
        let is_relative = specifier.starts_with("./")
            || specifier.starts_with("../")
            || specifier == "."
            || specifier == "..";

        let base = if is_relative {
            from.parent()?.join(specifier)
        } else if Path::new(specifier).is_absolute() {
            PathBuf::from(specifier)
        } else {
            self.base_url.as_ref()?.join(specifier)
        };

        self.probe(&normalize(&base))
    }

    fn probe(&self, base: &Path) -> Option<PathBuf> {
        let name = base.to_string_lossy().into_owned();

        // `./util.js` written in TypeScript sources refers to `./util.ts`
        for (js, ts) in JS_TO_TS {
            if let Some(stem) = name.strip_suffix(js) {
                for ext in ts.iter() {
                    let candidate = PathBuf::from(format!("{}{}", stem, ext));
                    if candidate.is_file() {
                        return Some(candidate);
                    }
                }
            }
        }

        if base.is_file() && self.is_source_file(base) {
            return Some(base.to_path_buf());
        }

        for ext in &self.extensions {
            let candidate = PathBuf::from(format!("{}{}", name, ext));
            if candidate.is_file() {
                return Some(candidate);
            }
        }

        if base.is_dir() {
            for ext in &self.extensions {
                let candidate = base.join(format!("index{}", ext));
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }

        None
    }
}

/// Walk the import graph from `roots`, returning every reachable file with
/// each file's local dependencies listed before the file itself
pub fn resolve_program(roots: &[PathBuf], resolver: &ModuleResolver) -> Result<Vec<PathBuf>> {
    enum Frame {
        Enter(PathBuf),
        Exit(PathBuf),
    }

    let mut ordered = Vec::new();
    let mut seen: HashSet<PathBuf> = HashSet::new();

    for root in roots {
        let mut stack = vec![Frame::Enter(root.clone())];

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(path) => {
                    if !seen.insert(path.clone()) {
                        continue;
                    }
                    let bytes = std::fs::read(&path)
                        .with_context(|| format!("Failed to read source file: {}", path.display()))?;
                    let source = String::from_utf8_lossy(&bytes);

                    let deps: Vec<PathBuf> = module_references(&path, &source)?
                        .iter()
                        .filter_map(|reference| resolver.resolve_reference(&path, reference))
                        .collect();

                    stack.push(Frame::Exit(path));
                    for dep in deps.into_iter().rev() {
                        if !seen.contains(&dep) {
                            stack.push(Frame::Enter(dep));
                        }
                    }
                }
                Frame::Exit(path) => ordered.push(path),
            }
        }
    }

    Ok(ordered)
}
