//! Render assistant markup from a file as HTML

use std::error::Error;
use std::fs;
use std::io::{self, Read};
use std::path::Path;

use crate::core::config::Config;
use crate::ui::markdown::{citations_html, render_assistant_content, RenderOptions};
use crate::utils::syntax::highlight_stylesheet;

pub fn render_file(config: &Config, file: &Path) -> Result<(), Box<dyn Error>> {
    let content = if file == Path::new("-") {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(file).map_err(|err| format!("Could not read {}: {err}", file.display()))?
    };

    if config.ui.syntax {
        println!("<style>\n{}</style>", highlight_stylesheet(true)?);
    }
    println!("{}", render_document(&content, config.ui.syntax));
    Ok(())
}

/// Markup blocks followed by the numbered source list.
pub(crate) fn render_document(content: &str, syntax_highlighting: bool) -> String {
    let rendered = render_assistant_content(content, &RenderOptions { syntax_highlighting });
    let mut html = rendered.to_html();
    let sources = citations_html(&rendered.citations);
    if !sources.is_empty() {
        html.push('\n');
        html.push_str(&sources);
    }
    html
}
