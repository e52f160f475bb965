//! Assistant markup to display-ready HTML blocks.
//!
//! Everything that leaves this module is escaped: raw HTML in the source is
//! shown as text, links survive only for web and mail targets, and a failure
//! anywhere collapses into a single error block rather than partial output.

mod anchors;
mod citations;
mod code;
mod escape;
mod metadata;
mod parser;
mod render;

#[cfg(test)]
mod tests;

use crate::core::error::RenderError;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::warn;

pub use citations::{citations_html, extract_citations, Citation};
pub use escape::escape_html;
pub use metadata::{BlockKind, RenderedBlock, RenderedContent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub syntax_highlighting: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            syntax_highlighting: true,
        }
    }
}

/// Render markup into top-level HTML blocks.
pub fn render_markup(
    content: &str,
    options: &RenderOptions,
) -> Result<Vec<RenderedBlock>, RenderError> {
    let depth = parser::block_nesting_depth(content);
    if depth > parser::MAX_BLOCK_DEPTH {
        return Err(RenderError::NestingTooDeep {
            depth,
            limit: parser::MAX_BLOCK_DEPTH,
        });
    }
    render::MarkdownRenderer::new(content, options.syntax_highlighting).render()
}

/// Render one assistant turn. Never fails: errors become a single error
/// block, and citations are extracted either way.
pub fn render_assistant_content(content: &str, options: &RenderOptions) -> RenderedContent {
    let citations = extract_citations(content);
    let outcome = catch_unwind(AssertUnwindSafe(|| render_markup(content, options)))
        .unwrap_or_else(|_| Err(RenderError::Internal("renderer panicked".to_string())));

    match outcome {
        Ok(blocks) => RenderedContent {
            blocks,
            citations,
            error: None,
        },
        Err(err) => {
            warn!(error = %err, "rendering assistant content failed");
            RenderedContent {
                blocks: vec![error_block(&err)],
                citations,
                error: Some(err),
            }
        }
    }
}

fn error_block(err: &RenderError) -> RenderedBlock {
    RenderedBlock {
        kind: BlockKind::Error,
        html: format!(
            "<div class=\"render-error\" role=\"alert\">Could not render this answer: {}</div>",
            escape_html(&err.to_string())
        ),
    }
}
