use once_cell::sync::Lazy;
use scraper::{Html, Selector};

static PAGE_CHROME: Lazy<Selector> =
    Lazy::new(|| Selector::parse("header, footer").expect("static selector"));

/// Remove every `<header>` and `<footer>` element, subtree included, and return the
/// serialized remainder. Parsing is lenient, malformed markup never fails.
pub fn sanitize(markup: &str) -> String {
    let mut document = Html::parse_document(markup);

    let doomed: Vec<_> = document.select(&PAGE_CHROME).map(|el| el.id()).collect();
    for id in doomed {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }

    document.html()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html><head><title>Team</title></head>
<body>
  <header><nav><a href="/home">Home nav</a></nav></header>
  <main>
    <article><header>Card heading</header><p>Jane Doe, Coach</p></article>
  </main>
  <footer><p>Copyright footer text</p><header>Nested</header></footer>
</body></html>"#;

    #[test]
    fn strips_header_and_footer_subtrees() {
        let out = sanitize(PAGE);

        assert!(out.contains("Jane Doe, Coach"));
        for gone in ["Home nav", "Card heading", "Copyright footer text", "Nested"] {
            assert!(!out.contains(gone), "{} should be removed", gone);
        }
        assert!(!out.contains("<header"));
        assert!(!out.contains("<footer"));
    }

    #[test]
    fn is_idempotent() {
        let once = sanitize(PAGE);
        assert_eq!(sanitize(&once), once);
    }

    #[test]
    fn markup_without_chrome_keeps_all_content() {
        let page = "<html><head></head><body><div class=\"header\">Still here</div><p>Body</p></body></html>";
        let out = sanitize(page);
        assert_eq!(out, Html::parse_document(page).html());
        assert!(out.contains("Still here"));
    }

    #[test]
    fn tolerates_malformed_markup() {
        let out = sanitize("<div><p>unclosed <footer>gone<b>bold");
        assert!(out.contains("unclosed"));
        assert!(!out.contains("gone"));
    }
}
