//! # Editor state documents
//!
//! A note's content is a serialized rich-text editor tree. This crate treats
//! the tree as opaque except for three things: checking that it is a tree at
//! all, extracting readable text for previews, and finding the first image.
//!
//! The tree has the shape
//!
//! ```json
//! {"root":{"type":"root","children":[{"type":"paragraph","children":[{"type":"text","text":"Hi"}]}]}}
//! ```
//!
//! Previews are derived by walking the parsed tree, never by scraping
//! rendered HTML, so toolbar or placeholder strings rendered around the
//! content can not end up in a note body.

use serde_json::{Map, Value};
use thiserror::Error;

/// Default character budget for note previews.
pub const EXCERPT_LIMIT: usize = 300;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("editor state is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("editor state has no root node")]
    MissingRoot,
}

/// Node types rendered as their own line.
const BLOCK_TYPES: &[&str] = &[
    "paragraph",
    "heading",
    "quote",
    "listitem",
    "code",
    "tablecell",
    "collapsible-title",
    "page-break",
];

const IMAGE_TYPES: &[&str] = &["image", "inline-image"];

/// A parsed editor tree.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorState {
    value: Value,
}

impl EditorState {
    /// Parse a serialized editor state. Key order is preserved, so a compact
    /// input re-serializes byte for byte.
    pub fn parse(state: &str) -> Result<Self, DocumentError> {
        let value: Value = serde_json::from_str(state)?;
        let root = value
            .get("root")
            .and_then(Value::as_object)
            .ok_or(DocumentError::MissingRoot)?;
        if root.get("type").and_then(Value::as_str) != Some("root") {
            return Err(DocumentError::MissingRoot);
        }
        Ok(Self { value })
    }

    /// An editor state with a single empty paragraph.
    pub fn empty() -> Self {
        let value = serde_json::json!({
            "root": {
                "children": [{
                    "children": [],
                    "direction": null,
                    "format": "",
                    "indent": 0,
                    "type": "paragraph",
                    "version": 1
                }],
                "direction": null,
                "format": "",
                "indent": 0,
                "type": "root",
                "version": 1
            }
        });
        Self { value }
    }

    pub fn to_json(&self) -> String {
        self.value.to_string()
    }

    // Always present after `parse`
    fn root(&self) -> Option<&Map<String, Value>> {
        self.value.get("root").and_then(Value::as_object)
    }

    /// Readable text of the whole document, blocks separated by newlines.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        if let Some(root) = self.root() {
            collect_text(root, &mut out);
        }
        out.trim_end_matches('\n').to_string()
    }

    /// Single-line preview, at most `limit` characters.
    pub fn excerpt(&self, limit: usize) -> String {
        let text = self.plain_text();
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        collapsed.chars().take(limit).collect()
    }

    /// Source URL of the first image in document order.
    pub fn first_image(&self) -> Option<String> {
        self.root().and_then(find_image)
    }
}

fn node_type(node: &Map<String, Value>) -> &str {
    node.get("type").and_then(Value::as_str).unwrap_or_default()
}

fn children(node: &Map<String, Value>) -> impl Iterator<Item = &Map<String, Value>> {
    node.get("children")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

fn collect_text(node: &Map<String, Value>, out: &mut String) {
    match node_type(node) {
        "text" | "code-highlight" | "hashtag" | "autolink" | "keyword" => {
            if let Some(text) = node.get("text").and_then(Value::as_str) {
                out.push_str(text);
            }
        }
        "linebreak" => out.push('\n'),
        "tab" => out.push('\t'),
        "equation" => {
            if let Some(eq) = node.get("equation").and_then(Value::as_str) {
                out.push_str(eq);
            }
        }
        kind => {
            let block = BLOCK_TYPES.contains(&kind);
            for child in children(node) {
                collect_text(child, out);
            }
            if block && !out.ends_with('\n') {
                out.push('\n');
            }
        }
    }
}

fn find_image(node: &Map<String, Value>) -> Option<String> {
    if IMAGE_TYPES.contains(&node_type(node)) {
        if let Some(src) = node.get("src").and_then(Value::as_str) {
            if !src.trim().is_empty() {
                return Some(src.to_string());
            }
        }
    }
    children(node).find_map(find_image)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{"root":{"children":[{"children":[{"detail":0,"format":0,"mode":"normal","style":"","text":"Groceries","type":"text","version":1}],"direction":"ltr","format":"","indent":0,"type":"heading","version":1,"tag":"h1"},{"children":[{"children":[{"text":"milk","type":"text","version":1}],"type":"listitem","value":1,"version":1},{"children":[{"text":"eggs","type":"text","version":1},{"type":"linebreak","version":1},{"text":"brown","type":"text","version":1}],"type":"listitem","value":2,"version":1}],"listType":"bullet","type":"list","version":1},{"altText":"cart","src":"https://img.example.com/cart.png","type":"image","version":1},{"type":"poll","question":"Which store?","options":[{"text":"Detach all labels","uid":"a"}],"version":1},{"equation":"x^2","inline":true,"type":"equation","version":1}],"direction":"ltr","format":"","indent":0,"type":"root","version":1}}"#;

    #[test]
    fn test_parse_roundtrip_is_byte_identical() {
        let state = EditorState::parse(SAMPLE).unwrap();
        assert_eq!(state.to_json(), SAMPLE);
    }

    #[test]
    fn test_parse_rejects_non_trees() {
        assert!(matches!(
            EditorState::parse("not json"),
            Err(DocumentError::Json(_))
        ));
        assert!(matches!(
            EditorState::parse(r#"{"children":[]}"#),
            Err(DocumentError::MissingRoot)
        ));
        assert!(matches!(
            EditorState::parse(r#"{"root":{"type":"paragraph"}}"#),
            Err(DocumentError::MissingRoot)
        ));
    }

    #[test]
    fn test_plain_text_walks_blocks() {
        let state = EditorState::parse(SAMPLE).unwrap();
        assert_eq!(state.plain_text(), "Groceries\nmilk\neggs\nbrown\nx^2");
    }

    #[test]
    fn test_excerpt_skips_decorator_text() {
        let state = EditorState::parse(SAMPLE).unwrap();
        let excerpt = state.excerpt(EXCERPT_LIMIT);
        assert_eq!(excerpt, "Groceries milk eggs brown x^2");
        assert!(!excerpt.contains("Detach all labels"));
        assert!(!excerpt.contains("Which store"));
    }

    #[test]
    fn test_excerpt_truncates_on_char_boundary() {
        let state = EditorState::parse(
            r#"{"root":{"type":"root","children":[{"type":"paragraph","children":[{"type":"text","text":"héllo wörld"}]}]}}"#,
        )
        .unwrap();
        assert_eq!(state.excerpt(4), "héll");
        assert_eq!(state.excerpt(0), "");
    }

    #[test]
    fn test_first_image() {
        let state = EditorState::parse(SAMPLE).unwrap();
        assert_eq!(
            state.first_image().as_deref(),
            Some("https://img.example.com/cart.png")
        );
        assert_eq!(EditorState::empty().first_image(), None);
    }

    #[test]
    fn test_empty_state_parses() {
        let empty = EditorState::empty();
        let reparsed = EditorState::parse(&empty.to_json()).unwrap();
        assert_eq!(reparsed, empty);
        assert_eq!(reparsed.plain_text(), "");
    }
}
