use htmd::HtmlToMarkdown;
use scraper::Html;
use tracing::warn;

const SKIPPED_TAGS: &[&str] = &["head", "script", "style", "noscript", "template"];

/// Render markup as Markdown, keeping hyperlink targets as literal `[text](url)` text.
pub fn project(markup: &str) -> String {
    let converter = HtmlToMarkdown::builder()
        .skip_tags(SKIPPED_TAGS.to_vec())
        .build();

    match converter.convert(markup) {
        Ok(markdown) => markdown,
        Err(e) => {
            warn!("Markdown conversion failed ({}), falling back to plain text", e);
            plain_text(markup)
        }
    }
}

fn plain_text(markup: &str) -> String {
    let document = Html::parse_document(markup);
    document
        .root_element()
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
