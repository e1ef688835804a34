//! Best-effort cookie banner dismissal.
//!
//! Candidates are (element kind, phrase) pairs tried in a fixed priority order:
//! every phrase against buttons, then links, then generic containers. The first
//! candidate that resolves to an element is clicked and the search stops. There is
//! no scoring, so an unrelated element whose text contains a phrase can be hit.

use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::browser::PageDriver;
use crate::error::{Result, ScrapeError};

pub const ACCEPT_PHRASES: &[&str] = &[
    "accept", "agree", "allow", "consent", "continue", "ok", "i agree", "got it",
];

pub const ELEMENT_KINDS: [ElementKind; 3] =
    [ElementKind::Button, ElementKind::Link, ElementKind::Container];

/// Matches any element a banner could be built from.
pub const ANY_INTERACTIVE_XPATH: &str = "//button | //a | //div";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ElementKind {
    Button,
    Link,
    Container,
}

impl ElementKind {
    pub fn tag(self) -> &'static str {
        match self {
            ElementKind::Button => "button",
            ElementKind::Link => "a",
            ElementKind::Container => "div",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementQuery {
    pub kind: ElementKind,
    pub phrase: &'static str,
}

impl ElementQuery {
    /// Case-insensitive "text contains phrase" lookup on the element's own text.
    pub fn xpath(&self) -> String {
        format!(
            "//{}[contains(translate(text(), 'ABCDEFGHIJKLMNOPQRSTUVWXYZ', 'abcdefghijklmnopqrstuvwxyz'), '{}')]",
            self.kind.tag(),
            self.phrase.to_lowercase()
        )
    }
}

/// All candidates in evaluation order.
pub fn candidates() -> Vec<ElementQuery> {
    ELEMENT_KINDS
        .iter()
        .flat_map(|&kind| {
            ACCEPT_PHRASES
                .iter()
                .map(move |&phrase| ElementQuery { kind, phrase })
        })
        .collect()
}

/// Try to click a consent control. Never fails; returns whether something was clicked.
pub fn try_dismiss<D: PageDriver + ?Sized>(driver: &D, timeout: Duration) -> bool {
    match dismiss(driver, timeout) {
        Ok(Some(query)) => {
            info!("Clicked the '{}' {}", query.phrase, query.kind.tag());
            true
        }
        Ok(None) => {
            info!("No 'Accept Cookies' control found");
            false
        }
        Err(e) => {
            warn!("{}", e);
            false
        }
    }
}

/// Returns the candidate that was activated, if any.
pub fn dismiss<D: PageDriver + ?Sized>(
    driver: &D,
    timeout: Duration,
) -> Result<Option<ElementQuery>> {
    driver
        .wait_for_any(ANY_INTERACTIVE_XPATH, timeout)
        .map_err(|e| ScrapeError::ConsentDismiss(format!("no interactive elements: {}", e)))?;

    for query in candidates() {
        match driver.click_first(&query) {
            Ok(true) => return Ok(Some(query)),
            Ok(false) => {}
            Err(e) => debug!("Click on {:?} failed: {}", query, e),
        }
    }
    Ok(None)
}
