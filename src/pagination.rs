use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::Result;
use crate::llm::{strip_code_fence, ChatModel};

pub const PAGINATION_PROMPT: &str = r#"
You are an assistant that extracts pagination elements from the markdown content of websites. Your goal is to act as a universal pagination URL scraper that works on any website, no matter how different they are.

Please extract the following:

- The URL of the 'Next', 'More', 'See more', 'Load more' or any other control leading to the next page, if any. It must be exactly one URL; if several URLs share the same structure, leave this out.

- A list of page URLs for pagination. They must form a pattern of similar URLs whose pages are numbered. If you detect such a pattern and the numbers run from a low number to a large one, generate the remaining URLs even when they are not present in the content.
Your goal is to give the user as many URLs as possible to choose from for further scraping. Websites can contain many URLs for images and other elements; only keep URLs that clearly define a pattern for showing data over multiple pages. Sometimes only part of a URL is present and you must combine it with the initial URL, which is given at the end of this prompt.

- The user may give indications about how pagination works on this particular website at the end of this prompt. If those indications are not empty, pay special attention to them: they tell you the structure and the number of pages to generate.

Provide the output as a JSON object with the following structure:

{
    "page_urls": ["url1", "url2", "url3",...,"urlN"]
}

Do not include any additional text or explanations.
"#;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaginationData {
    /// Candidate page URLs, in reply order. Duplicates are not removed.
    #[serde(default)]
    pub page_urls: Vec<String>,
}

/// Build the system prompt. The instructions are repeated when user hints are present.
pub fn pagination_prompt(url: &str, hints: Option<&str>) -> String {
    let mut prompt = format!(
        "{}\nThe URL of the page to extract pagination from: {}\nIf the URLs you find are not complete, combine them with it so they fit the pattern. **ALWAYS GIVE A FULL URL**",
        PAGINATION_PROMPT, url
    );

    match hints.map(str::trim).filter(|h| !h.is_empty()) {
        Some(hints) => {
            prompt.push_str(PAGINATION_PROMPT);
            prompt.push_str("\n\nThese are the user's indications, pay special attention to them: ");
            prompt.push_str(hints);
        }
        None => {
            prompt.push_str("\nThere are no user indications in this case, just apply the logic described.");
        }
    }
    prompt.push_str("\n\nBelow is the markdown of the website:\n\n");
    prompt
}

/// Read `{"page_urls": [...]}` out of a reply. Malformed replies yield no URLs.
pub fn parse_page_urls(reply: &str) -> PaginationData {
    let value: Value = match serde_json::from_str(strip_code_fence(reply)) {
        Ok(value) => value,
        Err(e) => {
            warn!("Pagination reply is not valid JSON: {}", e);
            return PaginationData::default();
        }
    };

    let page_urls = value
        .get("page_urls")
        .and_then(Value::as_array)
        .map(|urls| {
            urls.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    PaginationData { page_urls }
}

pub struct PaginationRequestor {
    model: Arc<dyn ChatModel>,
}

impl PaginationRequestor {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Ask the model for pagination URLs of `url`. Only transport/API failures error out.
    pub async fn detect(
        &self,
        url: &str,
        hints: Option<&str>,
        page_text: &str,
    ) -> Result<PaginationData> {
        let prompt = pagination_prompt(url, hints);
        let reply = self.model.complete(&prompt, page_text).await?;
        let data = parse_page_urls(&reply);
        info!("Detected {} pagination URLs for {}", data.page_urls.len(), url);
        Ok(data)
    }
}
