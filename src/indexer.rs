//! Incremental lightweight static analysis of tracked files.
//!
//! The analyzer is regex-level lexing, not a real parser, so it sits behind
//! the [`StaticAnalyzer`] trait: a per-language parser can replace it later
//! without touching any caller. The index itself is a per-path map of
//! [`IndexEntry`] values, persisted inside agent memory and updated on every
//! successful file write.

use std::collections::HashMap;

use chrono::Utc;
use regex::Regex;

use crate::types::{AgentMemory, IndexEntry};

/// Cap on files surfaced into a prompt summary.
const SUMMARY_MAX_FILES: usize = 25;
/// Cap on symbols listed per file in a prompt summary.
const SUMMARY_MAX_SYMBOLS: usize = 8;

/// Pluggable lexical analyzer. Returns `None` for files it cannot classify.
pub trait StaticAnalyzer: Send + Sync {
    fn analyze(&self, path: &str, content: &str) -> Option<IndexEntry>;
}

/// Regex-based analyzer covering the common web/backend languages.
pub struct RegexAnalyzer {
    ts_import: Regex,
    ts_require: Regex,
    ts_export: Regex,
    ts_function: Regex,
    ts_arrow: Regex,
    ts_class: Regex,
    rust_use: Regex,
    rust_fn: Regex,
    rust_type: Regex,
    py_import: Regex,
    py_from: Regex,
    py_def: Regex,
    py_class: Regex,
    go_import: Regex,
    go_func: Regex,
    go_type: Regex,
}

impl Default for RegexAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl RegexAnalyzer {
    pub fn new() -> Self {
        // Unwraps are on literal patterns.
        Self {
            ts_import: Regex::new(
                r#"import\s+(?:type\s+)?(?:[\w$]+|\*\s+as\s+[\w$]+|\{[^}]*\})?\s*(?:,\s*\{[^}]*\})?\s*(?:from\s+)?['"]([^'"]+)['"]"#,
            )
            .unwrap(),
            ts_require: Regex::new(r#"require\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap(),
            ts_export: Regex::new(
                r"export\s+(?:default\s+)?(?:abstract\s+)?(?:async\s+)?(?:function|class|const|let|var|interface|type|enum)\s+([\w$]+)",
            )
            .unwrap(),
            ts_function: Regex::new(r"(?:^|\s)(?:async\s+)?function\s+([\w$]+)").unwrap(),
            ts_arrow: Regex::new(r"(?:const|let)\s+([\w$]+)\s*=\s*(?:async\s*)?\(").unwrap(),
            ts_class: Regex::new(r"class\s+([\w$]+)").unwrap(),
            rust_use: Regex::new(r"(?m)^\s*(?:pub\s+)?use\s+([\w:]+)").unwrap(),
            rust_fn: Regex::new(r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?fn\s+(\w+)").unwrap(),
            rust_type: Regex::new(r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?(?:struct|enum|trait)\s+(\w+)")
                .unwrap(),
            py_import: Regex::new(r"(?m)^import\s+([\w.]+)").unwrap(),
            py_from: Regex::new(r"(?m)^from\s+([\w.]+)\s+import").unwrap(),
            py_def: Regex::new(r"(?m)^def\s+(\w+)").unwrap(),
            py_class: Regex::new(r"(?m)^class\s+(\w+)").unwrap(),
            go_import: Regex::new(r#""([\w./-]+)""#).unwrap(),
            go_func: Regex::new(r"(?m)^func\s+(?:\([^)]*\)\s+)?(\w+)").unwrap(),
            go_type: Regex::new(r"(?m)^type\s+(\w+)\s+struct").unwrap(),
        }
    }

    fn captures(regex: &Regex, content: &str) -> Vec<String> {
        let mut out = Vec::new();
        for cap in regex.captures_iter(content) {
            if let Some(m) = cap.get(1) {
                let name = m.as_str().to_string();
                if !out.contains(&name) {
                    out.push(name);
                }
            }
        }
        out
    }
}

/// Map a file extension to a language name.
pub fn language_for_path(path: &str) -> Option<&'static str> {
    let ext = path.rsplit('.').next()?;
    Some(match ext {
        "ts" | "tsx" => "typescript",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "rs" => "rust",
        "py" => "python",
        "go" => "go",
        "rb" => "ruby",
        "java" => "java",
        "css" | "scss" => "css",
        "html" => "html",
        "json" => "json",
        "md" => "markdown",
        _ => return None,
    })
}

impl StaticAnalyzer for RegexAnalyzer {
    fn analyze(&self, path: &str, content: &str) -> Option<IndexEntry> {
        let language = language_for_path(path)?;
        let mut entry = IndexEntry {
            language: language.to_string(),
            imports: vec![],
            exports: vec![],
            functions: vec![],
            classes: vec![],
            last_modified: Utc::now(),
        };

        match language {
            "typescript" | "javascript" => {
                entry.imports = Self::captures(&self.ts_import, content);
                for req in Self::captures(&self.ts_require, content) {
                    if !entry.imports.contains(&req) {
                        entry.imports.push(req);
                    }
                }
                entry.exports = Self::captures(&self.ts_export, content);
                entry.functions = Self::captures(&self.ts_function, content);
                for arrow in Self::captures(&self.ts_arrow, content) {
                    if !entry.functions.contains(&arrow) {
                        entry.functions.push(arrow);
                    }
                }
                entry.classes = Self::captures(&self.ts_class, content);
            }
            "rust" => {
                entry.imports = Self::captures(&self.rust_use, content);
                entry.functions = Self::captures(&self.rust_fn, content);
                entry.classes = Self::captures(&self.rust_type, content);
                entry.exports = entry
                    .functions
                    .iter()
                    .chain(entry.classes.iter())
                    .cloned()
                    .collect();
            }
            "python" => {
                entry.imports = Self::captures(&self.py_import, content);
                for import in Self::captures(&self.py_from, content) {
                    if !entry.imports.contains(&import) {
                        entry.imports.push(import);
                    }
                }
                entry.functions = Self::captures(&self.py_def, content);
                entry.classes = Self::captures(&self.py_class, content);
            }
            "go" => {
                entry.imports = Self::captures(&self.go_import, content);
                entry.functions = Self::captures(&self.go_func, content);
                entry.classes = Self::captures(&self.go_type, content);
            }
            // Markup and data files carry no symbols worth indexing.
            _ => {}
        }
        Some(entry)
    }
}

/// The per-project codebase index.
pub struct CodebaseIndexer {
    analyzer: Box<dyn StaticAnalyzer>,
    entries: HashMap<String, IndexEntry>,
}

impl Default for CodebaseIndexer {
    fn default() -> Self {
        Self::new(Box::new(RegexAnalyzer::new()))
    }
}

impl CodebaseIndexer {
    pub fn new(analyzer: Box<dyn StaticAnalyzer>) -> Self {
        Self {
            analyzer,
            entries: HashMap::new(),
        }
    }

    /// Rebuild from the index persisted in agent memory.
    pub fn from_memory(memory: &AgentMemory) -> Self {
        let mut indexer = Self::default();
        indexer.entries = memory.codebase_index.clone();
        indexer
    }

    /// Index (or re-index) one file. Unclassifiable files are ignored.
    pub fn index_file(&mut self, path: &str, content: &str) {
        if let Some(entry) = self.analyzer.analyze(path, content) {
            self.entries.insert(path.to_string(), entry);
        }
    }

    pub fn remove_file(&mut self, path: &str) {
        self.entries.remove(path);
    }

    pub fn get(&self, path: &str) -> Option<&IndexEntry> {
        self.entries.get(path)
    }

    pub fn entries(&self) -> &HashMap<String, IndexEntry> {
        &self.entries
    }

    /// Copy the index into memory for persistence.
    pub fn persist_into(&self, memory: &mut AgentMemory) {
        memory.codebase_index = self.entries.clone();
    }

    /// Compact textual summary for prompts, capped so prompt size stays
    /// bounded as the repository grows.
    pub fn summary(&self) -> String {
        let mut paths: Vec<&String> = self.entries.keys().collect();
        paths.sort();
        let mut lines = Vec::new();
        for path in paths.iter().take(SUMMARY_MAX_FILES) {
            let entry = &self.entries[*path];
            let mut symbols: Vec<&String> = entry
                .exports
                .iter()
                .chain(entry.functions.iter())
                .chain(entry.classes.iter())
                .collect();
            symbols.dedup();
            let shown: Vec<&str> = symbols
                .iter()
                .take(SUMMARY_MAX_SYMBOLS)
                .map(|s| s.as_str())
                .collect();
            if shown.is_empty() {
                lines.push(format!("- {} ({})", path, entry.language));
            } else {
                lines.push(format!(
                    "- {} ({}): {}",
                    path,
                    entry.language,
                    shown.join(", ")
                ));
            }
        }
        if self.entries.len() > SUMMARY_MAX_FILES {
            lines.push(format!(
                "... and {} more files",
                self.entries.len() - SUMMARY_MAX_FILES
            ));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexes_typescript_imports_and_functions() {
        let mut indexer = CodebaseIndexer::default();
        indexer.index_file("src/a.ts", "import {x} from './b'\nexport function f(){}");
        let entry = indexer.get("src/a.ts").expect("entry");
        assert_eq!(entry.language, "typescript");
        assert_eq!(entry.imports, vec!["./b"]);
        assert_eq!(entry.functions, vec!["f"]);
        assert_eq!(entry.exports, vec!["f"]);
    }

    #[test]
    fn indexes_arrow_functions_and_classes() {
        let mut indexer = CodebaseIndexer::default();
        indexer.index_file(
            "src/widget.tsx",
            "import React from 'react'\nexport const Widget = () => <div/>\nclass Helper {}",
        );
        let entry = indexer.get("src/widget.tsx").unwrap();
        assert!(entry.imports.contains(&"react".to_string()));
        assert!(entry.functions.contains(&"Widget".to_string()));
        assert_eq!(entry.classes, vec!["Helper"]);
    }

    #[test]
    fn indexes_rust_items() {
        let mut indexer = CodebaseIndexer::default();
        indexer.index_file(
            "src/lib.rs",
            "use std::fmt;\npub struct Thing;\npub fn run() {}\n",
        );
        let entry = indexer.get("src/lib.rs").unwrap();
        assert_eq!(entry.language, "rust");
        assert_eq!(entry.imports, vec!["std::fmt"]);
        assert_eq!(entry.functions, vec!["run"]);
        assert_eq!(entry.classes, vec!["Thing"]);
    }

    #[test]
    fn indexes_python_defs() {
        let mut indexer = CodebaseIndexer::default();
        indexer.index_file(
            "app.py",
            "import os\nfrom flask import Flask\ndef main():\n    pass\nclass App:\n    pass\n",
        );
        let entry = indexer.get("app.py").unwrap();
        assert_eq!(entry.imports, vec!["os", "flask"]);
        assert_eq!(entry.functions, vec!["main"]);
        assert_eq!(entry.classes, vec!["App"]);
    }

    #[test]
    fn unknown_extension_is_ignored() {
        let mut indexer = CodebaseIndexer::default();
        indexer.index_file("logo.png", "\u{1}\u{2}");
        assert!(indexer.get("logo.png").is_none());
    }

    #[test]
    fn remove_file_drops_the_entry() {
        let mut indexer = CodebaseIndexer::default();
        indexer.index_file("src/a.ts", "export function f(){}");
        indexer.remove_file("src/a.ts");
        assert!(indexer.get("src/a.ts").is_none());
    }

    #[test]
    fn summary_is_capped() {
        let mut indexer = CodebaseIndexer::default();
        for i in 0..40 {
            indexer.index_file(&format!("src/m{i}.ts"), "export function f(){}");
        }
        let summary = indexer.summary();
        assert_eq!(summary.lines().count(), SUMMARY_MAX_FILES + 1);
        assert!(summary.contains("more files"));
    }

    #[test]
    fn round_trips_through_memory() {
        let mut indexer = CodebaseIndexer::default();
        indexer.index_file("src/a.ts", "export function f(){}");
        let mut memory = AgentMemory::default();
        indexer.persist_into(&mut memory);
        let restored = CodebaseIndexer::from_memory(&memory);
        assert!(restored.get("src/a.ts").is_some());
    }
}
