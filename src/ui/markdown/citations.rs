//! Numbered source references.
//!
//! A marker `[n]` cites the URL in parentheses right after it (`[n](url)`),
//! or else the n-th bare URL in the text. Markers that resolve to nothing
//! are not citations.

use regex::Regex;
use reqwest::Url;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::ops::Range;
use std::sync::OnceLock;

use super::escape::escape_html;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Citation {
    pub number: u32,
    pub url: String,
    pub title: String,
    pub domain: String,
}

fn marker_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\[(\d{1,9})\]").ok())
        .as_ref()
}

fn url_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r#"https?://[^\s<>\[\]"'`]+"#).ok())
        .as_ref()
}

/// The citation number a marker label stands for. Only positive integers
/// count; `[0]` stays plain text.
pub(super) fn marker_number(label: &str) -> Option<u32> {
    if label.is_empty() || label.len() > 9 || !label.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    label.parse::<u32>().ok().filter(|n| *n > 0)
}

/// Byte range of the URL in a `(url)` group starting at `open`. Parentheses
/// inside the URL must balance, as in a Markdown link destination.
fn explicit_url_span(content: &str, open: usize) -> Option<Range<usize>> {
    let rest = content.get(open..)?.strip_prefix('(')?;
    if !(rest.starts_with("http://") || rest.starts_with("https://")) {
        return None;
    }
    let start = open + 1;
    let mut depth = 0usize;
    for (offset, ch) in rest.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' if depth == 0 => return Some(start..start + offset),
            ')' => depth -= 1,
            '<' | '>' => return None,
            ch if ch.is_whitespace() => return None,
            _ => {}
        }
    }
    None
}

/// Collect the citations in `content`, ordered by number. When a number is
/// cited more than once the first occurrence wins.
pub fn extract_citations(content: &str) -> Vec<Citation> {
    let (Some(markers_re), Some(urls_re)) = (marker_pattern(), url_pattern()) else {
        return Vec::new();
    };
    let mut explicit_spans: Vec<Range<usize>> = Vec::new();
    let mut markers: Vec<(u32, Option<&str>)> = Vec::new();

    for captures in markers_re.captures_iter(content) {
        let (Some(whole), Some(label)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        // "[2]" inside an earlier "(url)" is part of that URL.
        if explicit_spans
            .last()
            .is_some_and(|span| whole.start() < span.end)
        {
            continue;
        }
        let span = explicit_url_span(content, whole.end());
        let url = span.clone().map(|range| &content[range]);
        if let Some(span) = span {
            explicit_spans.push(span);
        }
        if let Some(number) = marker_number(label.as_str()) {
            markers.push((number, url));
        }
    }

    let bare_urls: Vec<&str> = urls_re
        .find_iter(content)
        .filter(|m| {
            !explicit_spans
                .iter()
                .any(|span| span.start < m.end() && m.start() < span.end)
        })
        .map(|m| trim_url_end(m.as_str()))
        .filter(|url| !url.is_empty())
        .collect();

    let mut citations: BTreeMap<u32, Citation> = BTreeMap::new();
    for (number, explicit) in markers {
        if citations.contains_key(&number) {
            continue;
        }
        let url = explicit.or_else(|| {
            (number as usize)
                .checked_sub(1)
                .and_then(|index| bare_urls.get(index).copied())
        });
        if let Some(url) = url {
            citations.insert(number, citation_for(number, url));
        }
    }
    citations.into_values().collect()
}

fn citation_for(number: u32, url: &str) -> Citation {
    match Url::parse(url).ok().and_then(|parsed| {
        parsed
            .host_str()
            .map(|host| host.strip_prefix("www.").unwrap_or(host).to_string())
    }) {
        Some(domain) => Citation {
            number,
            url: url.to_string(),
            title: domain.clone(),
            domain,
        },
        None => Citation {
            number,
            url: url.to_string(),
            title: format!("Source {number}"),
            domain: String::new(),
        },
    }
}

/// Drop sentence punctuation and unbalanced closing parentheses, so
/// "(see https://a.com/x)." yields "https://a.com/x".
fn trim_url_end(url: &str) -> &str {
    let mut url = url.trim_end_matches(['.', ',', ';', ':', '!', '?']);
    while url.ends_with(')') && url.matches(')').count() > url.matches('(').count() {
        url = url[..url.len() - 1].trim_end_matches(['.', ',', ';', ':', '!', '?']);
    }
    url
}

/// Escape `text` and wrap each `[n]` marker as a citation reference.
pub(super) fn escape_with_citation_refs(text: &str) -> String {
    let Some(markers_re) = marker_pattern() else {
        return escape_html(text);
    };
    let mut out = String::with_capacity(text.len() + 16);
    let mut last = 0;
    for captures in markers_re.captures_iter(text) {
        let (Some(whole), Some(label)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let Some(number) = marker_number(label.as_str()) else {
            continue;
        };
        out.push_str(&escape_html(&text[last..whole.start()]));
        push_citation_ref(&mut out, &number.to_string(), None);
        last = whole.end();
    }
    out.push_str(&escape_html(&text[last..]));
    out
}

/// Append a citation reference; `href` defaults to the in-page source anchor.
pub(super) fn push_citation_ref(out: &mut String, number: &str, href: Option<&str>) {
    let target = match href {
        Some(url) => escape_html(url),
        None => format!("#cite-{number}"),
    };
    let _ = write!(
        out,
        "<sup class=\"citation-ref\" data-citation=\"{number}\"><a href=\"{target}\">[{number}]</a></sup>"
    );
}

/// The numbered source list that `#cite-n` references point at.
pub fn citations_html(citations: &[Citation]) -> String {
    if citations.is_empty() {
        return String::new();
    }
    let mut html = String::from("<ol class=\"citations\">");
    for citation in citations {
        let _ = write!(
            html,
            "<li id=\"cite-{n}\" value=\"{n}\"><a href=\"{url}\" rel=\"noopener noreferrer\">{title}</a>",
            n = citation.number,
            url = escape_html(&citation.url),
            title = escape_html(&citation.title),
        );
        if !citation.domain.is_empty() && citation.domain != citation.title {
            let _ = write!(
                html,
                " <span class=\"citation-domain\">{}</span>",
                escape_html(&citation.domain)
            );
        }
        html.push_str("</li>");
    }
    html.push_str("</ol>");
    html
}
