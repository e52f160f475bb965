use crate::core::error::RenderError;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};
use syntect::html::{css_for_theme_with_class_style, ClassStyle, ClassedHTMLGenerator};
use syntect::highlighting::ThemeSet;
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

/// Every highlight class carries this prefix so page styles cannot collide.
pub const CLASS_STYLE: ClassStyle = ClassStyle::SpacedPrefixed { prefix: "hl-" };

const CACHE_CAPACITY: usize = 64;

/// Highlighted blocks keyed by normalized language and full source text.
type CacheKey = (String, String);

/// Bounded FIFO of highlighted blocks.
struct HighlightCache {
    map: HashMap<CacheKey, String>,
    order: VecDeque<CacheKey>,
    cap: usize,
}

impl HighlightCache {
    fn new(cap: usize) -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            cap,
        }
    }

    fn get(&self, lang: &str, code: &str) -> Option<String> {
        self.map.get(&(lang.to_string(), code.to_string())).cloned()
    }

    fn put(&mut self, key: CacheKey, html: String) {
        if !self.map.contains_key(&key) {
            self.order.push_back(key.clone());
        }
        self.map.insert(key, html);
        while self.map.len() > self.cap {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.map.remove(&oldest);
        }
    }
}

static SYNTAX_CACHE: Mutex<Option<HighlightCache>> = Mutex::new(None);

fn get_cache() -> MutexGuard<'static, Option<HighlightCache>> {
    let mut guard = SYNTAX_CACHE.lock().unwrap_or_else(PoisonError::into_inner);
    if guard.is_none() {
        *guard = Some(HighlightCache::new(CACHE_CAPACITY));
    }
    guard
}

fn syntax_set() -> &'static SyntaxSet {
    static SYNTAX_SET: OnceLock<SyntaxSet> = OnceLock::new();
    SYNTAX_SET.get_or_init(SyntaxSet::load_defaults_newlines)
}

pub(crate) fn normalize_lang_hint(s: &str) -> String {
    let t = s.trim().to_ascii_lowercase();
    match t.as_str() {
        "py" | "python" => "python".into(),
        "bash" | "sh" | "zsh" | "shell" => "bash".into(),
        "js" | "javascript" | "jsx" => "javascript".into(),
        "ts" | "tsx" | "typescript" => "typescript".into(),
        "json" => "json".into(),
        "toml" => "toml".into(),
        "yaml" | "yml" => "yaml".into(),
        "rust" | "rs" => "rust".into(),
        "go" => "go".into(),
        "c" | "h" => "c".into(),
        "cpp" | "cc" | "cxx" | "hpp" | "hxx" => "cpp".into(),
        "java" => "java".into(),
        "kotlin" | "kt" => "kotlin".into(),
        "swift" => "swift".into(),
        "html" => "html".into(),
        "css" => "css".into(),
        "sql" => "sql".into(),
        other => other.into(),
    }
}

/// Highlight `code` as class-annotated HTML spans.
///
/// Returns `Ok(None)` when the language is unknown (or empty) so the caller
/// can emit escaped plain text. Results are cached by language and content.
pub fn highlight_code_html(lang_hint: &str, code: &str) -> Result<Option<String>, RenderError> {
    let lang_norm = normalize_lang_hint(lang_hint);
    if lang_norm.is_empty() {
        return Ok(None);
    }
    let ps = syntax_set();
    let Some(syntax) = ps.find_syntax_by_token(&lang_norm) else {
        return Ok(None);
    };

    if let Some(html) = get_cache().as_ref().and_then(|c| c.get(&lang_norm, code)) {
        return Ok(Some(html));
    }

    let mut generator = ClassedHTMLGenerator::new_with_class_style(syntax, ps, CLASS_STYLE);
    for line in LinesWithEndings::from(code) {
        generator
            .parse_html_for_line_which_includes_newline(line)
            .map_err(|err| RenderError::Highlight {
                language: lang_norm.clone(),
                message: err.to_string(),
            })?;
    }
    let html = generator.finalize();

    if let Some(cache) = get_cache().as_mut() {
        cache.put((lang_norm, code.to_string()), html.clone());
    }
    Ok(Some(html))
}

// Helper to choose a syntect theme name based on background brightness.
pub(crate) fn pick_syntect_theme_name(dark_background: bool) -> &'static str {
    if dark_background {
        "base16-ocean.dark"
    } else {
        "InspiredGitHub"
    }
}

/// CSS for the classes emitted by [`highlight_code_html`].
pub fn highlight_stylesheet(dark_background: bool) -> Result<String, RenderError> {
    let ts = ThemeSet::load_defaults();
    let name = pick_syntect_theme_name(dark_background);
    let fallback_names = ["base16-ocean.light", "Solarized (light)", "base16-ocean.dark"];
    let theme = ts
        .themes
        .get(name)
        .or_else(|| fallback_names.iter().find_map(|n| ts.themes.get(*n)))
        .ok_or_else(|| RenderError::Internal(format!("syntax theme {name} is missing")))?;
    css_for_theme_with_class_style(theme, CLASS_STYLE).map_err(|err| RenderError::Highlight {
        language: "css".to_string(),
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_lang_hint_maps_common_aliases() {
        assert_eq!(normalize_lang_hint("py"), "python");
        assert_eq!(normalize_lang_hint("JS"), "javascript");
        assert_eq!(normalize_lang_hint("TsX"), "typescript");
        assert_eq!(normalize_lang_hint("yml"), "yaml");
        assert_eq!(normalize_lang_hint("hpp"), "cpp");
        assert_eq!(normalize_lang_hint("rs"), "rust");
    }

    #[test]
    fn known_languages_produce_prefixed_classes() {
        let html = highlight_code_html("rs", "fn main() {}\n")
            .expect("highlight")
            .expect("rust is known");
        assert!(html.contains("class=\"hl-"));
        assert!(html.contains("main"));
    }

    #[test]
    fn unknown_languages_fall_back_to_plain_text() {
        assert_eq!(highlight_code_html("klingon", "qapla'").expect("ok"), None);
        assert_eq!(highlight_code_html("", "plain").expect("ok"), None);
    }

    #[test]
    fn highlighted_markup_escapes_source() {
        let html = highlight_code_html("html", "<script>alert(1)</script>\n")
            .expect("highlight")
            .expect("html is known");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;"));
    }

    #[test]
    fn cache_evicts_oldest_entries() {
        let mut cache = HighlightCache::new(2);
        cache.put(("rust".into(), "a".into()), "one".into());
        cache.put(("rust".into(), "b".into()), "two".into());
        cache.put(("rust".into(), "c".into()), "three".into());
        assert_eq!(cache.get("rust", "a"), None);
        assert_eq!(cache.get("rust", "c").as_deref(), Some("three"));
    }

    #[test]
    fn cache_hits_require_identical_source() {
        let mut cache = HighlightCache::new(4);
        cache.put(("rust".into(), "let a = 1;".into()), "first".into());
        assert_eq!(cache.get("rust", "let a = 2;"), None);
        assert_eq!(cache.get("python", "let a = 1;"), None);
        assert_eq!(cache.get("rust", "let a = 1;").as_deref(), Some("first"));
    }

    #[test]
    fn repeated_blocks_highlight_their_own_source() {
        let first = highlight_code_html("python", "alpha = 1\n")
            .expect("highlight")
            .expect("python is known");
        let second = highlight_code_html("py", "beta = 2\n")
            .expect("highlight")
            .expect("python is known");
        assert!(first.contains("alpha") && !first.contains("beta"));
        assert!(second.contains("beta") && !second.contains("alpha"));
        assert_eq!(
            highlight_code_html("python", "alpha = 1\n").expect("highlight"),
            Some(first)
        );
    }

    #[test]
    fn stylesheet_targets_prefixed_classes() {
        assert_eq!(pick_syntect_theme_name(true), "base16-ocean.dark");
        let css = highlight_stylesheet(false).expect("css");
        assert!(css.contains(".hl-"));
    }
}
