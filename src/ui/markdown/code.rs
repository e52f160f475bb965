use crate::core::error::RenderError;
use pulldown_cmark::CodeBlockKind;
use std::fmt::Write as _;

use super::escape::escape_html;

pub(super) fn language_hint_from_codeblock_kind(kind: &CodeBlockKind<'_>) -> String {
    match kind {
        CodeBlockKind::Indented => String::new(),
        CodeBlockKind::Fenced(info) => info.split_ascii_whitespace().next().unwrap_or("").into(),
    }
}

pub(super) fn push_codeblock_text(code: &mut String, text: &str) {
    code.push_str(&detab(text));
}

/// Emit a code block with its language label and a copy button that carries
/// the raw source.
pub(super) fn code_block_html(
    language: &str,
    code: &str,
    syntax_enabled: bool,
) -> Result<String, RenderError> {
    let highlighted = if syntax_enabled {
        crate::utils::syntax::highlight_code_html(language, code)?
    } else {
        None
    };
    let body = highlighted.unwrap_or_else(|| escape_html(code));
    let label = if language.is_empty() {
        "text".to_string()
    } else {
        escape_html(language)
    };

    let mut html = String::with_capacity(body.len() + code.len() + 256);
    let _ = write!(
        html,
        "<div class=\"code-block\" data-language=\"{label}\">\
         <div class=\"code-toolbar\"><span class=\"code-language\">{label}</span>\
         <button class=\"copy-code\" type=\"button\" data-code=\"{raw}\">Copy</button></div>\
         <pre><code class=\"language-{label}\">{body}</code></pre></div>",
        raw = escape_html(code),
    );
    Ok(html)
}

fn detab(s: &str) -> String {
    s.replace('\t', "    ")
}
