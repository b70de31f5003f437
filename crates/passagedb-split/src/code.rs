//! Syntax-aware splitter for source code.
//!
//! Passages align to parse-tree node boundaries and, concatenated in order,
//! reproduce the input byte-for-byte. Absolute byte offsets are used when
//! slicing so whitespace between sibling nodes is never lost.

use passagedb_core::traits::Splitter;
use passagedb_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tree_sitter::{Node, Parser};

/// Languages with bundled tree-sitter grammars, detected from file
/// extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    Go,
    C,
}

impl Language {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "rs" => Some(Self::Rust),
            "py" => Some(Self::Python),
            "js" | "mjs" => Some(Self::JavaScript),
            "go" => Some(Self::Go),
            "c" | "h" => Some(Self::C),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Rust => "rust",
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::Go => "go",
            Self::C => "c",
        }
    }

    fn grammar(self) -> tree_sitter::Language {
        match self {
            Self::Rust => tree_sitter_rust::LANGUAGE.into(),
            Self::Python => tree_sitter_python::LANGUAGE.into(),
            Self::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Self::Go => tree_sitter_go::LANGUAGE.into(),
            Self::C => tree_sitter_c::LANGUAGE.into(),
        }
    }
}

/// Splits source text along syntax-tree node boundaries, recursively
/// subdividing any node whose span exceeds `max_chars`.
///
/// `max_chars` is a soft bound: an atomic node larger than the limit is
/// emitted whole rather than split mid-token. A parse error is a hard
/// failure; degraded chunking would poison index quality downstream.
pub struct CodeSplitter {
    language: Language,
    max_chars: usize,
}

impl CodeSplitter {
    pub fn new(language: Language, max_chars: usize) -> Self {
        Self { language, max_chars }
    }

    fn chunk_node(&self, node: Node, text: &str, last_end: &mut usize, out: &mut Vec<String>) {
        let mut buf = String::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            let span = child.end_byte() - child.start_byte();
            let segment = &text[*last_end..child.end_byte()];
            if span > self.max_chars && child.child_count() > 0 {
                // Too big on its own: flush and descend into the child.
                if !buf.is_empty() {
                    out.push(std::mem::take(&mut buf));
                }
                self.chunk_node(child, text, last_end, out);
            } else if buf.len() + segment.len() > self.max_chars {
                if !buf.is_empty() {
                    out.push(std::mem::take(&mut buf));
                }
                // The segment may itself exceed max_chars when a single
                // child does; the bound is soft per emitted passage.
                buf.push_str(segment);
            } else {
                buf.push_str(segment);
            }
            *last_end = child.end_byte();
        }
        if !buf.is_empty() {
            out.push(buf);
        }
    }
}

impl Splitter for CodeSplitter {
    fn split(&self, text: &str) -> Result<Vec<String>> {
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let mut parser = Parser::new();
        parser
            .set_language(&self.language.grammar())
            .map_err(|e| Error::Parse(format!("{} grammar: {}", self.language.name(), e)))?;
        let tree = parser
            .parse(text, None)
            .ok_or_else(|| Error::Parse(format!("parser returned no tree for {}", self.language.name())))?;
        let root = tree.root_node();
        if root.child(0).is_some_and(|c| c.is_error()) {
            return Err(Error::Parse(format!(
                "source does not parse as {}",
                self.language.name()
            )));
        }
        let mut out = Vec::new();
        let mut last_end = 0usize;
        self.chunk_node(root, text, &mut last_end, &mut out);
        // Text past the last named child (usually a trailing newline) still
        // belongs to the document; keep coverage byte-exact.
        if last_end < text.len() {
            let tail = &text[last_end..];
            match out.last_mut() {
                Some(last) => last.push_str(tail),
                None => out.push(tail.to_string()),
            }
        }
        Ok(out)
    }
}
