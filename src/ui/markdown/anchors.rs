use std::collections::HashSet;

/// Hands out heading anchors that are unique within one render.
#[derive(Default)]
pub(super) struct SlugRegistry {
    used: HashSet<String>,
}

impl SlugRegistry {
    /// `"Intro"` twice yields `intro` then `intro-1`.
    pub(super) fn unique(&mut self, heading_text: &str) -> String {
        let base = slugify(heading_text);
        if self.used.insert(base.clone()) {
            return base;
        }
        let mut suffix = 1usize;
        loop {
            let candidate = format!("{base}-{suffix}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            suffix += 1;
        }
    }
}

pub(super) fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(ch.to_lowercase());
        } else if ch.is_whitespace() || ch == '-' || ch == '_' {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        "section".to_string()
    } else {
        slug
    }
}
