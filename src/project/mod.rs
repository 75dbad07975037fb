//! Project file enumeration: locate the compiler configuration for a
//! repository and list the source files the compiler would build.

pub mod graph;
pub mod tsconfig;

pub use graph::ModuleResolver;
pub use tsconfig::{CompilerOptions, TsConfig};

use crate::constants::{DEFAULT_EXCLUDES, VENDOR_MARKER};
use crate::error::CodeQueryError;
use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A repository described by its tsconfig
pub struct Project {
    config: TsConfig,
    resolver: ModuleResolver,
}

impl Project {
    /// Locate the nearest tsconfig.json at or above `root` and parse it
    pub fn discover(root: &Path) -> Result<Self> {
        let root = root
            .canonicalize()
            .with_context(|| format!("Failed to resolve repository path: {}", root.display()))?;

        let config_path = tsconfig::find_config_file(&root)
            .ok_or_else(|| CodeQueryError::ConfigurationNotFound(root.clone()))?;
        println!("tsconfig located at {}", config_path.display());

        Self::from_config_file(&config_path)
    }

    pub fn from_config_file(path: &Path) -> Result<Self> {
        let config = tsconfig::read_config(path)?;
        let resolver = ModuleResolver::new(&config.options);
        Ok(Self { config, resolver })
    }

    pub fn config(&self) -> &TsConfig {
        &self.config
    }

    /// Files named by `files` plus everything matched by `include` and not by `exclude`
    pub fn root_files(&self) -> Result<Vec<PathBuf>> {
        let mut roots: Vec<PathBuf> = Vec::new();
        let mut seen = HashSet::new();

        for file in self.config.files.iter().flatten() {
            if file.is_file() && seen.insert(file.clone()) {
                roots.push(file.clone());
            }
        }

        let include = self.include_patterns()?;
        if include.is_empty() {
            return Ok(roots);
        }
        let exclude = self.exclude_patterns()?;

        for walk_root in walk_roots(&include) {
            let walker = WalkDir::new(&walk_root)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|entry| entry.depth() == 0 || !is_skipped_dir(entry));

            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping unreadable entry");
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }

                let path = entry.path();
                if !self.resolver.is_source_file(path) {
                    continue;
                }
                let text = path.to_string_lossy();
                let included = include.iter().any(|p| p.matches_with(&text, MATCH_OPTIONS));
                let excluded = exclude.iter().any(|p| p.matches_with(&text, MATCH_OPTIONS));
                if included && !excluded && seen.insert(path.to_path_buf()) {
                    roots.push(path.to_path_buf());
                }
            }
        }

        Ok(roots)
    }

    /// Every file of the program, dependencies first, minus vendored ones
    pub fn source_files(&self) -> Result<Vec<PathBuf>> {
        let roots = self.root_files()?;
        tracing::debug!(roots = roots.len(), "resolving module graph");

        let program = graph::resolve_program(&roots, &self.resolver)?;
        let files: Vec<PathBuf> = program
            .into_iter()
            .filter(|path| !is_vendored(path))
            .collect();

        tracing::info!(files = files.len(), config = %self.config.path.display(), "enumerated project files");
        Ok(files)
    }

    fn include_patterns(&self) -> Result<Vec<Pattern>> {
        let defaults;
        let patterns = match (&self.config.include, &self.config.files) {
            (Some(include), _) => include,
            (None, Some(_)) => return Ok(Vec::new()),
            (None, None) => {
                defaults = tsconfig::anchor_patterns(self.config.dir(), &["**/*".to_string()]);
                &defaults
            }
        };

        patterns
            .iter()
            .map(|p| compile(&directory_pattern(p)))
            .collect()
    }

    fn exclude_patterns(&self) -> Result<Vec<Pattern>> {
        let patterns = match &self.config.exclude {
            Some(exclude) => exclude.clone(),
            None => {
                let mut defaults: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
                let options = &self.config.options;
                for dir in [&options.out_dir, &options.declaration_dir].into_iter().flatten() {
                    defaults.push(dir.to_string_lossy().into_owned());
                }
                tsconfig::anchor_patterns(self.config.dir(), &defaults)
            }
        };

        let mut compiled = Vec::with_capacity(patterns.len() * 2);
        for pattern in &patterns {
            let pattern = pattern.trim_end_matches('/');
            compiled.push(compile(pattern)?);
            compiled.push(compile(&format!("{}/**/*", pattern))?);
        }
        Ok(compiled)
    }
}

/// Enumerate the source files of the project containing `root`
pub fn enumerate_source_files(root: &Path) -> Result<Vec<PathBuf>> {
    Project::discover(root)?.source_files()
}

/// True for paths inside a vendored dependency directory
pub fn is_vendored(path: &Path) -> bool {
    path.to_string_lossy().contains(VENDOR_MARKER)
}

fn is_skipped_dir(entry: &walkdir::DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || name == VENDOR_MARKER
}

fn compile(pattern: &str) -> Result<Pattern> {
    Pattern::new(pattern).with_context(|| format!("Invalid file pattern in tsconfig: {}", pattern))
}

/// A last segment without wildcard or extension names a directory
fn directory_pattern(pattern: &str) -> String {
    let pattern = pattern.trim_end_matches('/');
    let last = pattern.rsplit('/').next().unwrap_or(pattern);
    if last == "**" {
        format!("{}/*", pattern)
    } else if !last.contains(['*', '?']) && !last.contains('.') {
        format!("{}/**/*", pattern)
    } else {
        pattern.to_string()
    }
}

/// Directories to walk: the literal prefix of each include pattern
fn walk_roots(include: &[Pattern]) -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = Vec::new();
    for pattern in include {
        let mut root = PathBuf::new();
        for segment in pattern.as_str().split('/') {
            if segment.contains(['*', '?', '[']) {
                break;
            }
            root.push(if segment.is_empty() { "/" } else { segment });
        }
        // The last literal segment may be a file name
        if root.is_file() {
            root.pop();
        }
        if !root.is_dir() {
            tracing::debug!(pattern = pattern.as_str(), "include pattern matches no directory");
            continue;
        }
        if !roots.iter().any(|r| root.starts_with(r)) {
            roots.retain(|r| !r.starts_with(&root));
            roots.push(root);
        }
    }
    roots
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn canonical_tmp() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        (dir, root)
    }

    #[test]
    fn test_default_include_and_vendor_filter() {
        let (_dir, root) = canonical_tmp();
        write(&root, "tsconfig.json", "{}");
        write(&root, "src/index.ts", "import { helper } from './helper';\nimport React from 'react';");
        write(&root, "src/helper.ts", "export const helper = 1;");
        write(&root, "src/readme.md", "# not source");
        write(&root, "node_modules/react/index.d.ts", "export {};");
        write(&root, ".git/hooks/x.ts", "");

        let files = enumerate_source_files(&root).unwrap();

        assert!(!files.is_empty());
        assert!(files.iter().all(|f| !f.to_string_lossy().contains("node_modules")));
        assert_eq!(files, vec![root.join("src/helper.ts"), root.join("src/index.ts")]);
    }

    #[test]
    fn test_relative_import_into_node_modules_is_filtered() {
        let (_dir, root) = canonical_tmp();
        write(&root, "tsconfig.json", r#"{ "include": ["src"] }"#);
        write(&root, "src/app.ts", "import '../node_modules/lib/index';");
        write(&root, "node_modules/lib/index.ts", "export {};");

        let files = enumerate_source_files(&root).unwrap();
        assert_eq!(files, vec![root.join("src/app.ts")]);
    }

    #[test]
    fn test_graph_pulls_in_files_outside_include() {
        let (_dir, root) = canonical_tmp();
        write(&root, "tsconfig.json", r#"{ "include": ["src/**/*"] }"#);
        write(&root, "src/main.ts", "import { shared } from '../lib/shared';");
        write(&root, "lib/shared.ts", "export const shared = 1;");
        write(&root, "scripts/unused.ts", "");

        let files = enumerate_source_files(&root.join("src")).unwrap();
        assert_eq!(files, vec![root.join("lib/shared.ts"), root.join("src/main.ts")]);
    }

    #[test]
    fn test_files_only_config() {
        let (_dir, root) = canonical_tmp();
        write(&root, "tsconfig.json", r#"{ "files": ["entry.ts"] }"#);
        write(&root, "entry.ts", "");
        write(&root, "other.ts", "");

        let files = enumerate_source_files(&root).unwrap();
        assert_eq!(files, vec![root.join("entry.ts")]);
    }

    #[test]
    fn test_exclude_and_out_dir() {
        let (_dir, root) = canonical_tmp();
        write(&root, "tsconfig.json", r#"{ "compilerOptions": { "outDir": "build", "allowJs": true } }"#);
        write(&root, "src/a.ts", "");
        write(&root, "src/b.js", "");
        write(&root, "build/a.js", "");

        let files = enumerate_source_files(&root).unwrap();
        assert_eq!(files, vec![root.join("src/a.ts"), root.join("src/b.js")]);

        write(&root, "tsconfig.json", r#"{ "exclude": ["src/b.ts", "generated"] }"#);
        write(&root, "src/b.ts", "");
        write(&root, "generated/deep/c.ts", "");
        let files = enumerate_source_files(&root).unwrap();
        assert_eq!(files, vec![root.join("src/a.ts")]);
    }

    #[test]
    fn test_missing_config() {
        let (_dir, root) = canonical_tmp();
        write(&root, "src/a.ts", "");

        match enumerate_source_files(&root.join("src")) {
            Ok(files) => {
                // A tsconfig above the temp dir on the host would be picked up instead
                assert!(files.iter().all(|f| !f.starts_with(&root)));
            }
            Err(err) => assert!(matches!(
                err.downcast_ref::<CodeQueryError>(),
                Some(CodeQueryError::ConfigurationNotFound(_))
            )),
        }
    }

    #[test]
    fn test_empty_project() {
        let (_dir, root) = canonical_tmp();
        write(&root, "tsconfig.json", "{}");

        let files = enumerate_source_files(&root).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_directory_pattern() {
        assert_eq!(directory_pattern("/r/src"), "/r/src/**/*");
        assert_eq!(directory_pattern("/r/src/**"), "/r/src/**/*");
        assert_eq!(directory_pattern("/r/src/*.ts"), "/r/src/*.ts");
        assert_eq!(directory_pattern("/r/index.ts"), "/r/index.ts");
    }
}
