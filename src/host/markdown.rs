// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Markdown documents with fenced pattern blocks.
//!
//! A pattern block is a fenced code block whose info string starts with
//! the configured language tag:
//!
//! ````text
//! ```strudel id=drums
//! s("bd sd")
//! ```
//! ````
//!
//! An `id=<name>` token gives the block a stable name. Unnamed blocks are
//! identified by their ordinal among pattern blocks.

use std::collections::HashSet;

use super::{BlockId, SourceRange};

/// Fence language recognized when no other is configured
pub const DEFAULT_LANGUAGE: &str = "strudel";

/// A pattern block found in a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredBlock {
    /// Stable block id
    pub id: BlockId,
    /// Body text (without fences)
    pub text: String,
    /// Body line range
    pub range: SourceRange,
}

/// An opening or closing code fence
#[derive(Debug, Clone, PartialEq, Eq)]
struct Fence {
    marker: char,
    len: usize,
    info: String,
}

/// Parse a fence line (``` or ~~~, up to three spaces of indent)
fn parse_fence(line: &str) -> Option<Fence> {
    let trimmed = line.trim_start_matches(' ');
    if line.len() - trimmed.len() > 3 {
        return None;
    }

    let marker = trimmed.chars().next()?;
    if marker != '`' && marker != '~' {
        return None;
    }

    let len = trimmed.chars().take_while(|c| *c == marker).count();
    if len < 3 {
        return None;
    }

    // Markers are ASCII, so `len` is also a byte offset
    let info = trimmed[len..].trim();
    if marker == '`' && info.contains('`') {
        return None;
    }

    Some(Fence {
        marker,
        len,
        info: info.to_string(),
    })
}

/// Check whether `line` closes `fence`
fn closes(fence: &Fence, line: &str) -> bool {
    match parse_fence(line) {
        Some(close) => close.marker == fence.marker && close.len >= fence.len && close.info.is_empty(),
        None => false,
    }
}

/// Check whether a fence info string names the pattern language
fn is_pattern_fence(info: &str, language: &str) -> bool {
    info.split_whitespace()
        .next()
        .map(|tag| tag.eq_ignore_ascii_case(language))
        .unwrap_or(false)
}

/// Extract an explicit `id=<name>` token from a fence info string
fn fence_id(info: &str) -> Option<&str> {
    info.split_whitespace()
        .skip(1)
        .find_map(|token| token.strip_prefix("id="))
        .map(|id| id.trim_matches('"'))
        .filter(|id| !id.is_empty())
}

/// Scan lines for terminated pattern blocks
fn scan_blocks(lines: &[String], language: &str) -> Vec<DiscoveredBlock> {
    let mut blocks = Vec::new();
    let mut used: HashSet<BlockId> = HashSet::new();
    let mut ordinal = 0;
    let mut i = 0;

    while i < lines.len() {
        let Some(fence) = parse_fence(&lines[i]) else {
            i += 1;
            continue;
        };

        let body_start = i + 1;
        let Some(close) = (body_start..lines.len()).find(|&j| closes(&fence, &lines[j])) else {
            // An unterminated fence swallows the rest of the document
            break;
        };

        if is_pattern_fence(&fence.info, language) {
            let named = fence_id(&fence.info)
                .map(BlockId::new)
                .filter(|id| !used.contains(id));
            let id = named.unwrap_or_else(|| BlockId::ordinal(ordinal));
            ordinal += 1;

            used.insert(id.clone());
            blocks.push(DiscoveredBlock {
                id,
                text: lines[body_start..close].join("\n"),
                range: SourceRange::new(body_start, close),
            });
        }

        i = close + 1;
    }

    blocks
}

/// An in-memory markdown document
#[derive(Debug, Clone)]
pub struct MarkdownDocument {
    lines: Vec<String>,
    trailing_newline: bool,
    line_ending: &'static str,
    language: String,
    blocks: Vec<DiscoveredBlock>,
}

impl MarkdownDocument {
    /// Parse a document, discovering blocks tagged with `language`
    pub fn parse(source: &str, language: impl Into<String>) -> Self {
        let language = language.into();
        let lines: Vec<String> = source.lines().map(String::from).collect();
        let blocks = scan_blocks(&lines, &language);

        Self {
            lines,
            trailing_newline: source.ends_with('\n'),
            line_ending: if source.contains("\r\n") { "\r\n" } else { "\n" },
            language,
            blocks,
        }
    }

    /// Render the document back to text
    pub fn text(&self) -> String {
        let mut text = self.lines.join(self.line_ending);
        if self.trailing_newline {
            text.push_str(self.line_ending);
        }
        text
    }

    /// Get the pattern language tag
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Get the discovered pattern blocks in document order
    pub fn blocks(&self) -> &[DiscoveredBlock] {
        &self.blocks
    }

    /// Get a block by id
    pub fn block(&self, id: &BlockId) -> Option<&DiscoveredBlock> {
        self.blocks.iter().find(|b| &b.id == id)
    }

    /// Locate a block body
    pub fn locate(&self, id: &BlockId) -> Option<SourceRange> {
        self.block(id).map(|b| b.range)
    }

    /// Get number of lines
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Replace the body of `block`.
    ///
    /// Returns `false` without touching the document when `range` is not
    /// the current body of that same block.
    pub fn replace_range(&mut self, block: &BlockId, range: SourceRange, text: &str) -> bool {
        if self.locate(block) != Some(range) {
            return false;
        }

        self.lines
            .splice(range.start_line..range.end_line, text.lines().map(String::from));
        self.blocks = scan_blocks(&self.lines, &self.language);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = concat!(
        "# Jam\n",
        "\n",
        "```strudel\n",
        "s(\"bd sd\")\n",
        "```\n",
        "\n",
        "```js\n",
        "console.log(1)\n",
        "```\n",
        "\n",
        "```strudel id=bass\n",
        "note(\"c2 e2\")\n",
        "  .s(\"sawtooth\")\n",
        "```\n",
    );

    #[test]
    fn test_discovers_pattern_blocks() {
        let doc = MarkdownDocument::parse(DOC, DEFAULT_LANGUAGE);
        let blocks = doc.blocks();

        // The js block is skipped
        assert_eq!(blocks.len(), 2);

        assert_eq!(blocks[0].id, BlockId::ordinal(0));
        assert_eq!(blocks[0].text, "s(\"bd sd\")");
        assert_eq!(blocks[0].range, SourceRange::new(3, 4));

        assert_eq!(blocks[1].id, BlockId::new("bass"));
        assert_eq!(blocks[1].text, "note(\"c2 e2\")\n  .s(\"sawtooth\")");
        assert_eq!(blocks[1].range, SourceRange::new(11, 13));
    }

    #[test]
    fn test_text_round_trips() {
        let doc = MarkdownDocument::parse(DOC, DEFAULT_LANGUAGE);
        assert_eq!(doc.text(), DOC);
    }

    #[test]
    fn test_crlf_round_trips_through_replace() {
        let source = "# Jam\r\n```strudel\r\ns(\"bd\")\r\n```\r\n";
        let mut doc = MarkdownDocument::parse(source, DEFAULT_LANGUAGE);
        assert_eq!(doc.text(), source);
        assert_eq!(doc.blocks()[0].text, "s(\"bd\")");

        let range = doc.locate(&BlockId::ordinal(0)).unwrap();
        assert!(doc.replace_range(&BlockId::ordinal(0), range, "s(\"hh\")\n  .fast(2)"));
        assert_eq!(doc.text(), "# Jam\r\n```strudel\r\ns(\"hh\")\r\n  .fast(2)\r\n```\r\n");
    }

    #[test]
    fn test_replace_rejects_range_of_another_block() {
        let source = "```strudel id=a\nA\n```\n```strudel id=x\nX\n```\n```strudel id=b\nB\n```\n";
        let mut doc = MarkdownDocument::parse(source, DEFAULT_LANGUAGE);
        let b_range = doc.locate(&BlockId::new("b")).unwrap();

        // Growing `a` moves `x` onto the range `b` was located at
        let a_range = doc.locate(&BlockId::new("a")).unwrap();
        assert!(doc.replace_range(&BlockId::new("a"), a_range, "A\nA\nA\nA"));
        assert_eq!(doc.locate(&BlockId::new("x")), Some(b_range));

        assert!(!doc.replace_range(&BlockId::new("b"), b_range, "B EDIT"));
        assert_eq!(doc.block(&BlockId::new("x")).unwrap().text, "X");
        assert_eq!(doc.block(&BlockId::new("b")).unwrap().text, "B");
    }

    #[test]
    fn test_unterminated_fence_is_ignored() {
        let doc = MarkdownDocument::parse("```strudel\ns(\"hh*4\")\n", DEFAULT_LANGUAGE);
        assert!(doc.blocks().is_empty());
    }

    #[test]
    fn test_tilde_fences_and_case() {
        let doc = MarkdownDocument::parse("~~~Strudel\nn(\"0 2\")\n~~~\n", DEFAULT_LANGUAGE);
        assert_eq!(doc.blocks().len(), 1);
        assert_eq!(doc.blocks()[0].text, "n(\"0 2\")");
    }

    #[test]
    fn test_duplicate_ids_fall_back_to_ordinal() {
        let source = "```strudel id=a\nx\n```\n```strudel id=a\ny\n```\n";
        let doc = MarkdownDocument::parse(source, DEFAULT_LANGUAGE);
        assert_eq!(doc.blocks()[0].id, BlockId::new("a"));
        assert_eq!(doc.blocks()[1].id, BlockId::ordinal(1));
    }

    #[test]
    fn test_replace_shifts_later_blocks() {
        let mut doc = MarkdownDocument::parse(DOC, DEFAULT_LANGUAGE);
        let first = doc.locate(&BlockId::ordinal(0)).unwrap();

        assert!(doc.replace_range(&BlockId::ordinal(0), first, "s(\"bd*2\")\n  .fast(2)\n  .gain(0.8)"));

        // First block grew by two lines, bass moved down
        assert_eq!(doc.locate(&BlockId::ordinal(0)), Some(SourceRange::new(3, 6)));
        assert_eq!(doc.locate(&BlockId::new("bass")), Some(SourceRange::new(13, 15)));
        assert!(doc.text().ends_with("```\n"));
    }

    #[test]
    fn test_replace_rejects_stale_range() {
        let mut doc = MarkdownDocument::parse(DOC, DEFAULT_LANGUAGE);
        let before = doc.text();

        assert!(!doc.replace_range(&BlockId::new("bass"), SourceRange::new(0, 2), "oops"));
        assert_eq!(doc.text(), before);
    }

    #[test]
    fn test_replace_with_empty_body() {
        let mut doc = MarkdownDocument::parse(DOC, DEFAULT_LANGUAGE);
        let bass = doc.locate(&BlockId::new("bass")).unwrap();

        assert!(doc.replace_range(&BlockId::new("bass"), bass, ""));
        let block = doc.block(&BlockId::new("bass")).unwrap();
        assert!(block.range.is_empty());
        assert_eq!(block.text, "");
    }
}
