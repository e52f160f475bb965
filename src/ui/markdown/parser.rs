use pulldown_cmark::{Event, Options, Parser, Tag};

/// Deepest block nesting the renderer accepts.
pub(super) const MAX_BLOCK_DEPTH: usize = 64;

pub(super) fn markdown_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

pub(super) fn is_block(tag: &Tag<'_>) -> bool {
    matches!(
        tag,
        Tag::Paragraph
            | Tag::Heading { .. }
            | Tag::BlockQuote(_)
            | Tag::CodeBlock(_)
            | Tag::HtmlBlock
            | Tag::List(_)
            | Tag::Item
            | Tag::Table(_)
            | Tag::TableHead
            | Tag::TableRow
            | Tag::TableCell
    )
}

/// Maximum depth of nested block elements in `content`.
pub(super) fn block_nesting_depth(content: &str) -> usize {
    let mut stack: Vec<bool> = Vec::new();
    let mut depth = 0usize;
    let mut deepest = 0usize;
    for event in Parser::new_ext(content, markdown_options()) {
        match event {
            Event::Start(tag) => {
                let block = is_block(&tag);
                if block {
                    depth += 1;
                    deepest = deepest.max(depth);
                }
                stack.push(block);
            }
            Event::End(_) => {
                if stack.pop().unwrap_or(false) {
                    depth = depth.saturating_sub(1);
                }
            }
            _ => {}
        }
    }
    deepest
}
