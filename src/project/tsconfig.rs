//! Reading `tsconfig.json`: comment-tolerant parsing, `extends` chains and
//! path resolution relative to the config that declared each setting.

use crate::constants::TSCONFIG_FILE_NAME;
use crate::error::CodeQueryError;
use anyhow::Result;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Compiler options the enumerator cares about
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompilerOptions {
    #[serde(default)]
    pub allow_js: bool,
    #[serde(default)]
    pub out_dir: Option<PathBuf>,
    #[serde(default)]
    pub declaration_dir: Option<PathBuf>,
    #[serde(default)]
    pub base_url: Option<PathBuf>,
}

/// A fully resolved tsconfig with every path made absolute
#[derive(Debug, Clone)]
pub struct TsConfig {
    pub path: PathBuf,
    pub options: CompilerOptions,
    /// Explicit root files
    pub files: Option<Vec<PathBuf>>,
    /// Include patterns, anchored at the directory of the declaring config
    pub include: Option<Vec<String>>,
    /// Exclude patterns, anchored the same way
    pub exclude: Option<Vec<String>>,
}

impl TsConfig {
    /// Directory containing the config file
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("/"))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    #[serde(default)]
    extends: Option<Extends>,
    #[serde(default)]
    compiler_options: Option<Map<String, Value>>,
    #[serde(default)]
    files: Option<Vec<String>>,
    #[serde(default)]
    include: Option<Vec<String>>,
    #[serde(default)]
    exclude: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Extends {
    One(String),
    Many(Vec<String>),
}

impl Extends {
    fn into_vec(self) -> Vec<String> {
        match self {
            Extends::One(s) => vec![s],
            Extends::Many(v) => v,
        }
    }
}

/// Options holding paths, resolved against the declaring config's directory
const PATH_OPTIONS: &[&str] = &["outDir", "declarationDir", "baseUrl", "rootDir"];

#[derive(Debug, Default)]
struct Merged {
    compiler_options: Map<String, Value>,
    files: Option<Vec<PathBuf>>,
    include: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
}

impl Merged {
    fn overlay(&mut self, other: Merged) {
        self.compiler_options.extend(other.compiler_options);
        if other.files.is_some() {
            self.files = other.files;
        }
        if other.include.is_some() {
            self.include = other.include;
        }
        if other.exclude.is_some() {
            self.exclude = other.exclude;
        }
    }
}

/// Find the nearest tsconfig.json at or above `start`
pub fn find_config_file(start: &Path) -> Option<PathBuf> {
    let start = if start.is_file() { start.parent()? } else { start };
    start
        .ancestors()
        .map(|dir| dir.join(TSCONFIG_FILE_NAME))
        .find(|candidate| candidate.is_file())
}

/// Read and resolve the config at `path`, following `extends`
pub fn read_config(path: &Path) -> Result<TsConfig> {
    let mut chain = Vec::new();
    let merged = read_chain(path, &mut chain)?;

    let options: CompilerOptions = serde_json::from_value(Value::Object(merged.compiler_options))
        .map_err(|e| parse_error(path, format!("invalid compilerOptions: {}", e)))?;

    Ok(TsConfig {
        path: path.to_path_buf(),
        options,
        files: merged.files,
        include: merged.include,
        exclude: merged.exclude,
    })
}

fn read_chain(path: &Path, chain: &mut Vec<PathBuf>) -> Result<Merged> {
    if chain.iter().any(|p| p == path) {
        return Err(parse_error(path, "circularity detected while resolving 'extends'".to_string()));
    }
    chain.push(path.to_path_buf());

    let text = std::fs::read_to_string(path)
        .map_err(|e| parse_error(path, format!("cannot read file: {}", e)))?;
    let raw: RawConfig = parse_jsonc(&text).map_err(|message| parse_error(path, message))?;
    let dir = path.parent().unwrap_or_else(|| Path::new("/"));

    let mut merged = Merged::default();
    for base_ref in raw.extends.map(Extends::into_vec).unwrap_or_default() {
        let base = resolve_extends(dir, &base_ref).ok_or_else(|| {
            parse_error(path, format!("file '{}' referenced by 'extends' not found", base_ref))
        })?;
        tracing::debug!(config = %path.display(), base = %base.display(), "following extends");
        merged.overlay(read_chain(&base, chain)?);
    }

    let mut own = Merged::default();
    if let Some(mut options) = raw.compiler_options {
        for key in PATH_OPTIONS {
            if let Some(Value::String(value)) = options.get(*key) {
                let absolute = dir.join(value).to_string_lossy().into_owned();
                options.insert((*key).to_string(), Value::String(absolute));
            }
        }
        own.compiler_options = options;
    }
    own.files = raw
        .files
        .map(|files| files.iter().map(|f| normalize(&dir.join(f))).collect());
    own.include = raw.include.map(|patterns| anchor_patterns(dir, &patterns));
    own.exclude = raw.exclude.map(|patterns| anchor_patterns(dir, &patterns));
    merged.overlay(own);

    chain.pop();
    Ok(merged)
}

/// Prefix each pattern with the (glob-escaped) directory it is relative to
pub(crate) fn anchor_patterns(dir: &Path, patterns: &[String]) -> Vec<String> {
    let base = glob::Pattern::escape(&dir.to_string_lossy());
    let base = base.trim_end_matches('/');
    patterns
        .iter()
        .map(|p| {
            let p = p.trim_start_matches("./");
            if Path::new(p).is_absolute() {
                p.to_string()
            } else {
                format!("{}/{}", base, p)
            }
        })
        .collect()
}

fn resolve_extends(dir: &Path, base_ref: &str) -> Option<PathBuf> {
    let is_path = base_ref.starts_with("./") || base_ref.starts_with("../") || Path::new(base_ref).is_absolute();
    if is_path {
        return with_json_fallback(&dir.join(base_ref));
    }

    // Package reference: look through node_modules of every ancestor
    dir.ancestors().find_map(|ancestor| {
        let candidate = ancestor.join("node_modules").join(base_ref);
        with_json_fallback(&candidate).or_else(|| {
            let nested = candidate.join(TSCONFIG_FILE_NAME);
            nested.is_file().then_some(nested)
        })
    })
}

fn with_json_fallback(candidate: &Path) -> Option<PathBuf> {
    if candidate.is_file() {
        return Some(normalize(candidate));
    }
    let mut with_ext = candidate.as_os_str().to_owned();
    with_ext.push(".json");
    let with_ext = PathBuf::from(with_ext);
    with_ext.is_file().then(|| normalize(&with_ext))
}

fn parse_error(path: &Path, message: String) -> anyhow::Error {
    CodeQueryError::ConfigurationParse {
        path: path.to_path_buf(),
        message,
    }
    .into()
}

/// Lexically resolve `.` and `..` components
pub(crate) fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Parse JSON that may carry comments and trailing commas
fn parse_jsonc<T: serde::de::DeserializeOwned>(text: &str) -> std::result::Result<T, String> {
    let cleaned = strip_trailing_commas(&strip_comments(text));
    serde_json::from_str(&cleaned).map_err(|e| e.to_string())
}

/// Replace comments with whitespace, keeping line numbers intact for error messages
pub(crate) fn strip_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match (c, chars.peek()) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                    }
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    out
}

/// Drop commas directly followed (modulo whitespace) by `}` or `]`
pub(crate) fn strip_trailing_commas(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if c == '\\' {
                if let Some(&escaped) = chars.get(i + 1) {
                    out.push(escaped);
                    i += 1;
                }
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
            out.push(c);
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
            if !matches!(next, Some('}') | Some(']')) {
                out.push(c);
            }
        } else {
            out.push(c);
        }
        i += 1;
    }
    out
}
