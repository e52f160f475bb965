use crate::core::error::RenderError;
use serde::Serialize;

use super::citations::Citation;

/// Kind tag of one top-level block of rendered markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Heading,
    Paragraph,
    CodeBlock,
    List,
    BlockQuote,
    Table,
    Rule,
    /// Raw HTML from the source, shown escaped.
    RawHtml,
    Error,
}

impl BlockKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BlockKind::Heading => "heading",
            BlockKind::Paragraph => "paragraph",
            BlockKind::CodeBlock => "code_block",
            BlockKind::List => "list",
            BlockKind::BlockQuote => "block_quote",
            BlockKind::Table => "table",
            BlockKind::Rule => "rule",
            BlockKind::RawHtml => "raw_html",
            BlockKind::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedBlock {
    pub kind: BlockKind,
    pub html: String,
}

/// Everything the display layer needs for one assistant turn.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedContent {
    pub blocks: Vec<RenderedBlock>,
    pub citations: Vec<Citation>,
    /// Set when the markup is the single error block.
    pub error: Option<RenderError>,
}

impl RenderedContent {
    pub fn to_html(&self) -> String {
        self.blocks
            .iter()
            .map(|block| block.html.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
