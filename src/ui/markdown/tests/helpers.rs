use crate::ui::markdown::{render_markup, BlockKind, RenderOptions, RenderedBlock};

pub fn plain_options() -> RenderOptions {
    RenderOptions {
        syntax_highlighting: false,
    }
}

pub fn render_plain(content: &str) -> Vec<RenderedBlock> {
    render_markup(content, &plain_options()).expect("markup renders")
}

pub fn kinds(blocks: &[RenderedBlock]) -> Vec<BlockKind> {
    blocks.iter().map(|block| block.kind).collect()
}

pub fn only_block(content: &str) -> RenderedBlock {
    let mut blocks = render_plain(content);
    assert_eq!(blocks.len(), 1, "expected one block, got {blocks:?}");
    blocks.remove(0)
}
