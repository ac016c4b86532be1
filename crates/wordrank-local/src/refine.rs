//! Cleanup of raw visible text before tokenization.
//!
//! Rendered `innerText` occasionally carries markup that leaked through templating, or
//! attribute fragments like `width=100` left behind once the surrounding tag is gone.

use regex::Regex;
use std::sync::OnceLock;

/// Attribute/layout keywords stripped when they appear as `keyword=value`.
pub const ATTRIBUTE_KEYWORDS: &[&str] = &[
    "width",
    "px",
    "img",
    "decoding",
    "async",
    "class",
    "size",
    "src",
    "srcset",
    "alt",
    "vw",
    "height",
    "sizes",
    "max-width",
];

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("static tag pattern"))
}

fn attribute_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let alts = ATTRIBUTE_KEYWORDS
            .iter()
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|");
        // ASCII word boundaries: `é` next to a keyword is a separator, not part of a word.
        Regex::new(&format!(r"(?i)(?-u:\b)(?:{alts})(?-u:\b)=[^ ]*\s*"))
            .expect("static attribute pattern")
    })
}

fn ws_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static whitespace pattern"))
}

/// Strip tags, then stray `keyword=value` fragments, then collapse and trim whitespace.
///
/// Idempotent: `refine(&refine(x)) == refine(x)`.
pub fn refine(raw: &str) -> String {
    let s = tag_re().replace_all(raw, "");
    let s = attribute_re().replace_all(&s, "");
    let s = ws_re().replace_all(&s, " ");
    s.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn strips_tag_and_attribute_leftovers() {
        assert_eq!(refine(r#"<div width=100 class="x">Hello</div>"#), "Hello");
    }

    #[test]
    fn strips_stray_attribute_fragments_case_insensitively() {
        assert_eq!(
            refine("Photo WIDTH=640 Height=480px srcset=a.jpg,b.jpg caption"),
            "Photo caption"
        );
        assert_eq!(refine("max-width=100vw  banner"), "banner");
    }

    #[test]
    fn keywords_without_equals_or_inside_words_survive() {
        assert_eq!(refine("the width of the class"), "the width of the class");
        assert_eq!(refine("bandwidth=3 classy=yes"), "bandwidth=3 classy=yes");
    }

    #[test]
    fn unclosed_angle_bracket_is_left_alone() {
        assert_eq!(refine("a < b and c"), "a < b and c");
        assert_eq!(refine("x <b>bold</b> > y"), "x bold > y");
    }

    #[test]
    fn collapses_and_trims_whitespace() {
        assert_eq!(refine("  one\n\ttwo   three \r\n"), "one two three");
        assert_eq!(refine(""), "");
    }

    fn fragment() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("<".to_string()),
            Just(">".to_string()),
            Just("=".to_string()),
            Just(" ".to_string()),
            Just("\n\t".to_string()),
            Just("max-".to_string()),
            Just("WIDTH=".to_string()),
            Just("<img src=x>".to_string()),
            "[a-zA-Z]{1,6}",
            prop::sample::select(ATTRIBUTE_KEYWORDS).prop_map(|k| k.to_string()),
        ]
    }

    proptest! {
        #[test]
        fn refine_is_idempotent(parts in prop::collection::vec(fragment(), 0..24)) {
            let raw = parts.concat();
            let once = refine(&raw);
            prop_assert_eq!(refine(&once), once.clone());
        }

        #[test]
        fn refine_output_has_no_tags_or_double_spaces(raw in any::<String>()) {
            let out = refine(&raw);
            prop_assert!(!tag_re().is_match(&out), "tag survived: {out:?}");
            prop_assert!(!attribute_re().is_match(&out), "attribute survived: {out:?}");
            prop_assert!(!out.contains("  "));
            prop_assert_eq!(out.trim(), out.as_str());
        }
    }
}
