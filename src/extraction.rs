use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{Result, ScrapeError};
use crate::llm::{strip_code_fence, ChatModel};

pub const DEFAULT_FIELDS: &[&str] = &["Name", "Title", "Sport", "Email"];

pub const USER_MESSAGE_HEADER: &str =
    "Extract the following information from the provided text:\nPage content:\n\n";

/// One extracted row: requested field name to value. Missing fields stay absent or empty.
pub type Record = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Listings {
    pub listings: Vec<Record>,
}

/// Outcome of one extraction request. A reply that is not the expected JSON shape
/// is kept verbatim rather than retried.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Extraction {
    Parsed(Listings),
    Raw { reply: String, error: String },
}

impl Extraction {
    pub fn listings(&self) -> Option<&Listings> {
        match self {
            Extraction::Parsed(listings) => Some(listings),
            Extraction::Raw { .. } => None,
        }
    }
}

/// System prompt asking for pure JSON shaped as `{"listings": [{field: value, ...}]}`.
pub fn system_message(fields: &[String], instruction: Option<&str>) -> String {
    let schema = fields
        .iter()
        .map(|field| format!("                \"{}\": \"\"", field.replace('"', "\\\"")))
        .collect::<Vec<_>>()
        .join(",\n");

    let mut message = format!(
        r#"You are an intelligent text extraction and conversion assistant. Your task is to extract structured information
from the given text and convert it into a pure JSON format. The JSON must contain only the structured data extracted
from the text, with no additional commentary, explanations, or extraneous information.
Some fields may be missing from the text or written in a foreign language; leave a field empty when you cannot find it.
Respond with pure JSON and no words before or after it, strictly following this schema:

{{
    "listings": [
        {{
{}
        }}
    ]
}}"#,
        schema
    );

    if let Some(extra) = instruction.map(str::trim).filter(|s| !s.is_empty()) {
        message.push_str("\n\nAdditional instructions from the user: ");
        message.push_str(extra);
    }
    message
}

/// Parse a model reply into listings. Anything but an object with a `listings`
/// array of objects is a [`ScrapeError::Parse`].
pub fn parse_listings(reply: &str) -> Result<Listings> {
    let value: Value = serde_json::from_str(strip_code_fence(reply))
        .map_err(|e| ScrapeError::Parse(format!("reply is not valid JSON: {}", e)))?;

    let items = value
        .get("listings")
        .and_then(Value::as_array)
        .ok_or_else(|| ScrapeError::Parse("reply has no \"listings\" array".to_string()))?;

    let listings = items
        .iter()
        .map(|item| {
            item.as_object()
                .cloned()
                .ok_or_else(|| ScrapeError::Parse(format!("listing is not an object: {}", item)))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Listings { listings })
}

/// Sends page text to the model and turns its reply into records.
pub struct ExtractionRequestor {
    model: Arc<dyn ChatModel>,
}

impl ExtractionRequestor {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Network and API failures are returned as errors; a malformed reply degrades to
    /// [`Extraction::Raw`].
    pub async fn extract(
        &self,
        content: &str,
        fields: &[String],
        instruction: Option<&str>,
    ) -> Result<Extraction> {
        let system = system_message(fields, instruction);
        let user = format!("{}{}", USER_MESSAGE_HEADER, content);

        let reply = self.model.complete(&system, &user).await?;

        match parse_listings(&reply) {
            Ok(listings) => {
                info!("Extracted {} listings", listings.listings.len());
                Ok(Extraction::Parsed(listings))
            }
            Err(e) => {
                warn!("Model reply could not be parsed: {}", e);
                Ok(Extraction::Raw {
                    reply,
                    error: e.to_string(),
                })
            }
        }
    }
}
