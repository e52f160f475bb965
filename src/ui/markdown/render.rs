use super::anchors::SlugRegistry;
use super::citations::{escape_with_citation_refs, marker_number, push_citation_ref};
use super::code::{code_block_html, language_hint_from_codeblock_kind, push_codeblock_text};
use super::escape::{escape_html, is_allowed_link};
use super::metadata::{BlockKind, RenderedBlock};
use super::parser::{is_block, markdown_options};
use crate::core::error::RenderError;
use pulldown_cmark::{Alignment, Event, HeadingLevel, Parser, Tag, TagEnd};
use std::fmt::Write as _;

struct HeadingFrame {
    level: HeadingLevel,
    start: usize,
    plain: String,
}

struct LinkFrame {
    dest: String,
    title: String,
    start: usize,
    plain: String,
}

struct ImageFrame {
    dest: String,
    title: String,
    alt: String,
}

struct TableState {
    alignments: Vec<Alignment>,
    in_head: bool,
    cell: usize,
}

/// Turns markup into a sequence of HTML blocks, one per top-level element.
pub(super) struct MarkdownRenderer<'a> {
    content: &'a str,
    syntax_enabled: bool,
    blocks: Vec<RenderedBlock>,
    out: String,
    /// Unflushed text; markers split across parser events are matched here.
    text: String,
    depth: usize,
    block_stack: Vec<bool>,
    current_kind: BlockKind,
    code_block: Option<(String, String)>,
    heading: Option<HeadingFrame>,
    links: Vec<LinkFrame>,
    image: Option<ImageFrame>,
    table: Option<TableState>,
    slugs: SlugRegistry,
}

impl<'a> MarkdownRenderer<'a> {
    pub(super) fn new(content: &'a str, syntax_enabled: bool) -> Self {
        Self {
            content,
            syntax_enabled,
            blocks: Vec::new(),
            out: String::new(),
            text: String::new(),
            depth: 0,
            block_stack: Vec::new(),
            current_kind: BlockKind::Paragraph,
            code_block: None,
            heading: None,
            links: Vec::new(),
            image: None,
            table: None,
            slugs: SlugRegistry::default(),
        }
    }

    pub(super) fn render(mut self) -> Result<Vec<RenderedBlock>, RenderError> {
        let parser = Parser::new_ext(self.content, markdown_options());

        for event in parser {
            if self.image.is_some() && !matches!(event, Event::End(TagEnd::Image)) {
                self.image_alt_event(event);
                continue;
            }
            match event {
                Event::Start(tag) => self.start_tag(tag),
                Event::End(end) => self.end_tag(end)?,
                Event::Text(text) => self.push_text(&text),
                Event::Code(code) => {
                    self.flush_text();
                    self.track_plain(&code);
                    let _ = write!(self.out, "<code>{}</code>", escape_html(&code));
                }
                Event::Html(html) | Event::InlineHtml(html) => {
                    self.flush_text();
                    self.out.push_str(&escape_html(&html));
                }
                Event::SoftBreak => self.push_text("\n"),
                Event::HardBreak => {
                    self.flush_text();
                    self.out.push_str("<br>");
                }
                Event::Rule => {
                    self.flush_text();
                    if self.depth == 0 {
                        self.finish_pending();
                        self.blocks.push(RenderedBlock {
                            kind: BlockKind::Rule,
                            html: "<hr>".to_string(),
                        });
                    } else {
                        self.out.push_str("<hr>");
                    }
                }
                Event::TaskListMarker(checked) => {
                    self.flush_text();
                    self.out.push_str(if checked {
                        "<input type=\"checkbox\" disabled checked> "
                    } else {
                        "<input type=\"checkbox\" disabled> "
                    });
                }
                Event::FootnoteReference(label) => {
                    self.push_text(&format!("[^{label}]"));
                }
                Event::InlineMath(math) | Event::DisplayMath(math) => {
                    self.flush_text();
                    let _ = write!(
                        self.out,
                        "<code class=\"math\">{}</code>",
                        escape_html(&math)
                    );
                }
            }
        }

        self.finish_pending();
        Ok(self.blocks)
    }

    fn start_tag(&mut self, tag: Tag<'_>) {
        let block = is_block(&tag);
        self.block_stack.push(block);
        if block {
            self.flush_text();
            if self.depth == 0 {
                self.finish_pending();
                self.current_kind = top_level_kind(&tag);
            }
            self.depth += 1;
        }

        match tag {
            Tag::Paragraph => self.out.push_str("<p>"),
            Tag::Heading { level, .. } => {
                self.heading = Some(HeadingFrame {
                    level,
                    start: self.out.len(),
                    plain: String::new(),
                });
            }
            Tag::BlockQuote(_) => self.out.push_str("<blockquote>"),
            Tag::CodeBlock(kind) => {
                self.code_block = Some((language_hint_from_codeblock_kind(&kind), String::new()));
            }
            Tag::HtmlBlock => self.out.push_str("<pre class=\"raw-html\">"),
            Tag::List(Some(1)) => self.out.push_str("<ol>"),
            Tag::List(Some(start)) => {
                let _ = write!(self.out, "<ol start=\"{start}\">");
            }
            Tag::List(None) => self.out.push_str("<ul>"),
            Tag::Item => self.out.push_str("<li>"),
            Tag::Table(alignments) => {
                self.table = Some(TableState {
                    alignments,
                    in_head: false,
                    cell: 0,
                });
                self.out.push_str("<table>");
            }
            Tag::TableHead => {
                if let Some(table) = self.table.as_mut() {
                    table.in_head = true;
                    table.cell = 0;
                }
                self.out.push_str("<thead><tr>");
            }
            Tag::TableRow => {
                if let Some(table) = self.table.as_mut() {
                    table.cell = 0;
                }
                self.out.push_str("<tr>");
            }
            Tag::TableCell => {
                let (element, align) = match self.table.as_mut() {
                    Some(table) => {
                        let align = table.alignments.get(table.cell).copied();
                        table.cell += 1;
                        (if table.in_head { "th" } else { "td" }, align)
                    }
                    None => ("td", None),
                };
                let style = match align {
                    Some(Alignment::Left) => " style=\"text-align: left\"",
                    Some(Alignment::Center) => " style=\"text-align: center\"",
                    Some(Alignment::Right) => " style=\"text-align: right\"",
                    _ => "",
                };
                let _ = write!(self.out, "<{element}{style}>");
            }
            Tag::Emphasis => self.push_inline("<em>"),
            Tag::Strong => self.push_inline("<strong>"),
            Tag::Strikethrough => self.push_inline("<del>"),
            Tag::Link {
                dest_url, title, ..
            } => {
                self.flush_text();
                self.links.push(LinkFrame {
                    dest: dest_url.into_string(),
                    title: title.into_string(),
                    start: self.out.len(),
                    plain: String::new(),
                });
            }
            Tag::Image {
                dest_url, title, ..
            } => {
                self.flush_text();
                self.image = Some(ImageFrame {
                    dest: dest_url.into_string(),
                    title: title.into_string(),
                    alt: String::new(),
                });
            }
            _ => {}
        }
    }

    fn end_tag(&mut self, end: TagEnd) -> Result<(), RenderError> {
        let block = self.block_stack.pop().unwrap_or(false);
        if !matches!(end, TagEnd::CodeBlock) {
            self.flush_text();
        }

        match end {
            TagEnd::Paragraph => self.out.push_str("</p>"),
            TagEnd::Heading(_) => self.finish_heading(),
            TagEnd::BlockQuote(_) => self.out.push_str("</blockquote>"),
            TagEnd::CodeBlock => {
                if let Some((language, code)) = self.code_block.take() {
                    let html = code_block_html(&language, &code, self.syntax_enabled)?;
                    self.out.push_str(&html);
                }
            }
            TagEnd::HtmlBlock => self.out.push_str("</pre>"),
            TagEnd::List(true) => self.out.push_str("</ol>"),
            TagEnd::List(false) => self.out.push_str("</ul>"),
            TagEnd::Item => self.out.push_str("</li>"),
            TagEnd::Table => {
                self.table = None;
                self.out.push_str("</tbody></table>");
            }
            TagEnd::TableHead => {
                if let Some(table) = self.table.as_mut() {
                    table.in_head = false;
                }
                self.out.push_str("</tr></thead><tbody>");
            }
            TagEnd::TableRow => self.out.push_str("</tr>"),
            TagEnd::TableCell => {
                let in_head = self.table.as_ref().is_some_and(|table| table.in_head);
                self.out.push_str(if in_head { "</th>" } else { "</td>" });
            }
            TagEnd::Emphasis => self.out.push_str("</em>"),
            TagEnd::Strong => self.out.push_str("</strong>"),
            TagEnd::Strikethrough => self.out.push_str("</del>"),
            TagEnd::Link => self.finish_link(),
            TagEnd::Image => self.finish_image(),
            _ => {}
        }

        if block {
            self.depth = self.depth.saturating_sub(1);
            if self.depth == 0 {
                self.finish_pending();
            }
        }
        Ok(())
    }

    fn push_inline(&mut self, html: &str) {
        self.flush_text();
        self.out.push_str(html);
    }

    fn push_text(&mut self, text: &str) {
        if let Some((_, code)) = self.code_block.as_mut() {
            push_codeblock_text(code, text);
            return;
        }
        self.track_plain(text);
        self.text.push_str(text);
    }

    fn track_plain(&mut self, text: &str) {
        if let Some(heading) = self.heading.as_mut() {
            heading.plain.push_str(text);
        }
        if let Some(link) = self.links.last_mut() {
            link.plain.push_str(text);
        }
    }

    fn flush_text(&mut self) {
        if self.text.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.text);
        // Link text and headings never carry citation refs.
        if self.heading.is_some() || !self.links.is_empty() {
            self.out.push_str(&escape_html(&text));
        } else {
            self.out.push_str(&escape_with_citation_refs(&text));
        }
    }

    fn image_alt_event(&mut self, event: Event<'_>) {
        let Some(image) = self.image.as_mut() else {
            return;
        };
        match event {
            Event::Text(text) | Event::Code(text) => image.alt.push_str(&text),
            Event::SoftBreak | Event::HardBreak => image.alt.push(' '),
            Event::Start(tag) => self.block_stack.push(is_block(&tag)),
            Event::End(_) => {
                self.block_stack.pop();
            }
            _ => {}
        }
    }

    fn finish_heading(&mut self) {
        let Some(heading) = self.heading.take() else {
            return;
        };
        let inner = self.out.split_off(heading.start.min(self.out.len()));
        let slug = escape_html(&self.slugs.unique(&heading.plain));
        let level = heading.level as usize;
        let _ = write!(
            self.out,
            "<h{level} id=\"{slug}\"><a class=\"anchor\" href=\"#{slug}\" aria-hidden=\"true\">#</a>{inner}</h{level}>"
        );
    }

    fn finish_link(&mut self) {
        let Some(link) = self.links.pop() else {
            return;
        };
        let inner = self.out.split_off(link.start.min(self.out.len()));
        let label = link.plain.trim();
        let is_web = link.dest.starts_with("http://") || link.dest.starts_with("https://");

        if let Some(number) = marker_number(label).filter(|_| is_web) {
            push_citation_ref(&mut self.out, &number.to_string(), Some(&link.dest));
        } else if is_allowed_link(&link.dest) {
            let _ = write!(self.out, "<a href=\"{}\"", escape_html(link.dest.trim()));
            if !link.title.is_empty() {
                let _ = write!(self.out, " title=\"{}\"", escape_html(&link.title));
            }
            let _ = write!(self.out, " rel=\"noopener noreferrer\">{inner}</a>");
        } else {
            self.out.push_str(&inner);
        }
    }

    fn finish_image(&mut self) {
        let Some(image) = self.image.take() else {
            return;
        };
        self.track_plain(&image.alt);
        let is_web = image.dest.starts_with("http://") || image.dest.starts_with("https://");
        if is_web {
            let _ = write!(
                self.out,
                "<img src=\"{}\" alt=\"{}\"",
                escape_html(&image.dest),
                escape_html(&image.alt)
            );
            if !image.title.is_empty() {
                let _ = write!(self.out, " title=\"{}\"", escape_html(&image.title));
            }
            self.out.push('>');
        } else {
            self.out.push_str(&escape_html(&image.alt));
        }
    }

    fn finish_pending(&mut self) {
        self.flush_text();
        if self.out.is_empty() {
            return;
        }
        self.blocks.push(RenderedBlock {
            kind: self.current_kind,
            html: std::mem::take(&mut self.out),
        });
        self.current_kind = BlockKind::Paragraph;
    }
}

fn top_level_kind(tag: &Tag<'_>) -> BlockKind {
    match tag {
        Tag::Heading { .. } => BlockKind::Heading,
        Tag::BlockQuote(_) => BlockKind::BlockQuote,
        Tag::CodeBlock(_) => BlockKind::CodeBlock,
        Tag::HtmlBlock => BlockKind::RawHtml,
        Tag::List(_) => BlockKind::List,
        Tag::Table(_) => BlockKind::Table,
        _ => BlockKind::Paragraph,
    }
}
