/// Heading anchors and label slugs: lowercase ASCII word characters and CJK
/// ideographs, joined by single dashes.
#[must_use]
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for ch in input.trim().to_lowercase().chars() {
        if ch.is_whitespace() || ch == '-' {
            pending_dash = true;
            continue;
        }
        if !is_slug_char(ch) {
            continue;
        }
        if pending_dash && !slug.is_empty() {
            slug.push('-');
        }
        pending_dash = false;
        slug.push(ch);
    }
    slug
}

fn is_slug_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ('\u{4e00}'..='\u{9fa5}').contains(&ch)
}

#[cfg(test)]
mod tests {
    use super::slugify;

    #[test]
    fn joins_words_with_single_dashes() {
        assert_eq!(slugify("  Hello   World  "), "hello-world");
        assert_eq!(slugify("a - b"), "a-b");
        assert_eq!(slugify("--Lead and trail--"), "lead-and-trail");
    }

    #[test]
    fn drops_punctuation_without_splitting() {
        assert_eq!(slugify("What's new?"), "whats-new");
        assert_eq!(slugify("C++ & Rust_2024"), "c-rust_2024");
    }

    #[test]
    fn keeps_cjk_ideographs() {
        assert_eq!(slugify("线性代数 第1章"), "线性代数-第1章");
        assert_eq!(slugify("!!!"), "");
    }
}
