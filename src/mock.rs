//! In-memory `PageDriver` for browser-free tests

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::Duration;

use serde_json::Value;

use crate::browser::PageDriver;
use crate::consent::{ElementKind, ElementQuery};
use crate::error::{Result, ScrapeError};
use crate::scroll::{DOCUMENT_HEIGHT_JS, SCROLL_TO_BOTTOM_JS};

pub struct MockPage {
    html: String,
    elements: Vec<(ElementKind, String)>,
    heights: RefCell<VecDeque<Value>>,
    last_height: RefCell<Value>,
    fail_navigation: bool,
    fail_maximize: bool,
    failing_click_kind: Option<ElementKind>,
    clicked: RefCell<Option<(ElementKind, String)>>,
    calls: RefCell<Vec<String>>,
    height_reads: Cell<usize>,
    scrolls: Cell<usize>,
}

impl MockPage {
    pub fn new(html: &str) -> Self {
        Self {
            html: html.to_string(),
            elements: Vec::new(),
            heights: RefCell::new(VecDeque::new()),
            last_height: RefCell::new(Value::from(0)),
            fail_navigation: false,
            fail_maximize: false,
            failing_click_kind: None,
            clicked: RefCell::new(None),
            calls: RefCell::new(Vec::new()),
            height_reads: Cell::new(0),
            scrolls: Cell::new(0),
        }
    }

    pub fn with_element(mut self, kind: ElementKind, text: &str) -> Self {
        self.elements.push((kind, text.to_string()));
        self
    }

    /// Heights returned by successive measurements; the last one repeats.
    pub fn with_heights(self, heights: &[u64]) -> Self {
        self.heights
            .borrow_mut()
            .extend(heights.iter().map(|&h| Value::from(h)));
        self
    }

    pub fn with_raw_height(self, value: Value) -> Self {
        self.heights.borrow_mut().push_back(value);
        self
    }

    pub fn failing_navigation(mut self) -> Self {
        self.fail_navigation = true;
        self
    }

    pub fn failing_maximize(mut self) -> Self {
        self.fail_maximize = true;
        self
    }

    pub fn failing_clicks_on(mut self, kind: ElementKind) -> Self {
        self.failing_click_kind = Some(kind);
        self
    }

    pub fn clicked(&self) -> Option<(ElementKind, String)> {
        self.clicked.borrow().clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn height_reads(&self) -> usize {
        self.height_reads.get()
    }

    pub fn scrolls(&self) -> usize {
        self.scrolls.get()
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }
}

/// What the XPath from [`ElementQuery::xpath`] selects in a real tab: same tag,
/// text containing the phrase regardless of case.
fn query_matches(query: &ElementQuery, kind: ElementKind, text: &str) -> bool {
    query.kind == kind && text.to_lowercase().contains(&query.phrase.to_lowercase())
}

impl PageDriver for MockPage {
    fn navigate(&self, url: &str) -> Result<()> {
        self.record(format!("navigate {}", url));
        if self.fail_navigation {
            return Err(ScrapeError::navigation(url, "net::ERR_NAME_NOT_RESOLVED"));
        }
        Ok(())
    }

    fn maximize(&self) -> Result<()> {
        self.record("maximize".to_string());
        if self.fail_maximize {
            return Err(ScrapeError::browser("window bounds unavailable"));
        }
        Ok(())
    }

    fn evaluate(&self, script: &str) -> Result<Value> {
        match script {
            DOCUMENT_HEIGHT_JS => {
                self.height_reads.set(self.height_reads.get() + 1);
                if let Some(next) = self.heights.borrow_mut().pop_front() {
                    *self.last_height.borrow_mut() = next;
                }
                Ok(self.last_height.borrow().clone())
            }
            SCROLL_TO_BOTTOM_JS => {
                self.scrolls.set(self.scrolls.get() + 1);
                Ok(Value::Null)
            }
            other => Err(ScrapeError::browser(format!("unexpected script: {}", other))),
        }
    }

    fn wait_for_any(&self, _xpath: &str, timeout: Duration) -> Result<()> {
        self.record("wait_for_any".to_string());
        if self.elements.is_empty() {
            return Err(ScrapeError::browser(format!(
                "The event waited for never came after {:?}",
                timeout
            )));
        }
        Ok(())
    }

    fn click_first(&self, query: &ElementQuery) -> Result<bool> {
        let hit = self
            .elements
            .iter()
            .find(|(kind, text)| query_matches(query, *kind, text));
        match hit {
            Some((kind, _)) if Some(*kind) == self.failing_click_kind => {
                Err(ScrapeError::browser("element is not clickable"))
            }
            Some((kind, text)) => {
                self.record(format!("click {}", text));
                *self.clicked.borrow_mut() = Some((*kind, text.clone()));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn content(&self) -> Result<String> {
        self.record("content".to_string());
        Ok(self.html.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_matching_ignores_case_but_not_kind() {
        let agree = ElementQuery {
            kind: ElementKind::Button,
            phrase: "i agree",
        };
        assert!(query_matches(&agree, ElementKind::Button, "YES, I AGREE"));
        assert!(!query_matches(&agree, ElementKind::Link, "I agree"));
        assert!(!query_matches(&agree, ElementKind::Button, "Agree"));
    }
}
