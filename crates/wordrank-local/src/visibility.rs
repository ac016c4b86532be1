//! Leaf-only visible text collection over a rendered element snapshot.
//!
//! The snapshot is the flat, document-order list the renderer reports for `body *`.
//! Text is attributed to innermost elements only, so nothing is counted twice up the
//! ancestor chain.

use wordrank_core::RenderedElement;

/// Visible-and-leaf rule.
///
/// `opacity` is compared against the exact string `"0"`: a computed `"0.01"` counts as
/// visible. Keep it that way unless the heuristic itself is being revisited.
pub fn is_visible_leaf(el: &RenderedElement) -> bool {
    el.display != "none"
        && el.visibility != "hidden"
        && el.opacity != "0"
        && el.child_element_count == 0
}

/// Space-joined visible leaf text, whitespace-collapsed and trimmed.
pub fn collect_visible_text<'a, I>(elements: I) -> String
where
    I: IntoIterator<Item = &'a RenderedElement>,
{
    let mut acc = String::new();
    for el in elements {
        if !is_visible_leaf(el) {
            continue;
        }
        let text = el.inner_text.as_deref().unwrap_or("").trim();
        if text.is_empty() {
            continue;
        }
        acc.push(' ');
        acc.push_str(text);
    }
    collapse_ws(&acc)
}

pub(crate) fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(text: &str) -> RenderedElement {
        RenderedElement {
            display: "block".into(),
            visibility: "visible".into(),
            opacity: "1".into(),
            child_element_count: 0,
            inner_text: Some(text.into()),
        }
    }

    #[test]
    fn hidden_styles_are_skipped() {
        let mut none = leaf("display none");
        none.display = "none".into();
        let mut hidden = leaf("visibility hidden");
        hidden.visibility = "hidden".into();
        let mut clear = leaf("opacity zero");
        clear.opacity = "0".into();

        for el in [&none, &hidden, &clear] {
            assert!(!is_visible_leaf(el), "expected hidden: {el:?}");
        }
        assert!(is_visible_leaf(&leaf("shown")));
    }

    #[test]
    fn near_zero_opacity_still_counts_as_visible() {
        let mut faint = leaf("faint");
        faint.opacity = "0.01".into();
        assert!(is_visible_leaf(&faint));
        faint.opacity = "0.0".into();
        assert!(is_visible_leaf(&faint));
    }

    #[test]
    fn only_leaves_contribute_text() {
        let parent = RenderedElement {
            child_element_count: 1,
            inner_text: Some("Parent Child".into()),
            ..leaf("")
        };
        let child = leaf("Child");
        assert_eq!(collect_visible_text([&parent, &child]), "Child");
    }

    #[test]
    fn fragments_keep_document_order_and_collapse_whitespace() {
        let els = vec![
            leaf("  first\n\nline "),
            leaf("   "),
            RenderedElement {
                inner_text: None,
                ..leaf("")
            },
            leaf("second\t\tpart"),
        ];
        assert_eq!(collect_visible_text(&els), "first line second part");
    }

    #[test]
    fn empty_snapshot_yields_empty_text() {
        assert_eq!(collect_visible_text(&Vec::<RenderedElement>::new()), "");
    }
}
