use headless_chrome::types::Bounds;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::Serialize;
use std::cell::Cell;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::BrowserConfig;
use crate::consent::{self, ElementQuery};
use crate::error::{Result, ScrapeError};
use crate::scroll;

/// Chrome flags for unattended runs. Headless mode and the viewport are set
/// through `LaunchOptions`.
const CHROME_ARGS: &[&str] = &[
    "--disable-gpu",
    "--disable-dev-shm-usage",
    "--disable-search-engine-choice-screen",
];

/// Raw markup captured once scrolling has stabilized.
#[derive(Debug, Clone, Serialize)]
pub struct PageSnapshot {
    pub url: String,
    pub html: String,
    pub captured_at: chrono::DateTime<chrono::Utc>,
}

/// The tab operations the acquisition pipeline needs from a browser.
pub trait PageDriver {
    fn navigate(&self, url: &str) -> Result<()>;
    fn maximize(&self) -> Result<()>;
    fn evaluate(&self, script: &str) -> Result<serde_json::Value>;
    /// Block until an element matching `xpath` exists or `timeout` elapses.
    fn wait_for_any(&self, xpath: &str, timeout: Duration) -> Result<()>;
    /// Click the first element matching `query`. `Ok(false)` when nothing matches.
    fn click_first(&self, query: &ElementQuery) -> Result<bool>;
    fn content(&self) -> Result<String>;
}

/// Produces one snapshot per URL. Implementations must not reuse a browser
/// session across calls.
pub trait PageSource: Send + Sync {
    fn acquire(&self, url: &str) -> Result<PageSnapshot>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Navigated,
    Closed,
}

impl SessionState {
    /// States only move forward; a session is never re-navigated once closed.
    pub fn can_advance_to(self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (SessionState::Created, SessionState::Navigated)
                | (SessionState::Created, SessionState::Closed)
                | (SessionState::Navigated, SessionState::Closed)
        )
    }
}

/// One headless Chrome process bound to a single navigation.
/// Dropping the session closes the browser.
pub struct ChromeSession {
    // Field order matters: the tab goes before the browser that owns it.
    tab: Arc<Tab>,
    _browser: Browser,
    state: Cell<SessionState>,
}

impl ChromeSession {
    pub fn launch(config: &BrowserConfig) -> Result<Self> {
        let args: Vec<&OsStr> = CHROME_ARGS.iter().map(OsStr::new).collect();

        let browser = Browser::new(LaunchOptions {
            headless: config.headless,
            sandbox: config.sandbox,
            window_size: Some(config.window_size),
            path: config.chrome_path.clone(),
            idle_browser_timeout: Duration::from_secs(300),
            args,
            ..Default::default()
        })
        .map_err(|e| ScrapeError::browser(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| ScrapeError::browser(format!("Failed to create tab: {}", e)))?;

        debug!("Browser session created");
        Ok(Self {
            tab,
            _browser: browser,
            state: Cell::new(SessionState::Created),
        })
    }

    fn advance(&self, next: SessionState) {
        let current = self.state.get();
        if current.can_advance_to(next) {
            debug!("Browser session {:?} -> {:?}", current, next);
            self.state.set(next);
        } else {
            warn!("Ignoring browser session transition {:?} -> {:?}", current, next);
        }
    }
}

impl PageDriver for ChromeSession {
    fn navigate(&self, url: &str) -> Result<()> {
        self.tab
            .navigate_to(url)
            .map_err(|e| ScrapeError::navigation(url, e))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| ScrapeError::navigation(url, e))?;
        self.advance(SessionState::Navigated);
        Ok(())
    }

    fn maximize(&self) -> Result<()> {
        self.tab
            .set_bounds(Bounds::Maximized)
            .map(|_| ())
            .map_err(ScrapeError::browser)
    }

    fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        let remote = self
            .tab
            .evaluate(script, false)
            .map_err(ScrapeError::browser)?;
        Ok(remote.value.unwrap_or(serde_json::Value::Null))
    }

    fn wait_for_any(&self, xpath: &str, timeout: Duration) -> Result<()> {
        self.tab
            .wait_for_xpath_with_custom_timeout(xpath, timeout)
            .map(|_| ())
            .map_err(ScrapeError::browser)
    }

    fn click_first(&self, query: &ElementQuery) -> Result<bool> {
        let element = match self.tab.find_element_by_xpath(&query.xpath()) {
            Ok(element) => element,
            Err(_) => return Ok(false),
        };
        element.click().map_err(ScrapeError::browser)?;
        Ok(true)
    }

    fn content(&self) -> Result<String> {
        self.tab.get_content().map_err(ScrapeError::browser)
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        if let Err(e) = self.tab.close(false) {
            debug!("Tab close before shutdown failed: {}", e);
        }
        self.advance(SessionState::Closed);
        info!("Browser session closed");
    }
}

/// Render `url` and return the stabilized markup.
///
/// Steps: navigate, settle, maximize, dismiss the consent banner (best effort),
/// then scroll until the document height stops growing.
pub fn acquire_page<D: PageDriver + ?Sized>(
    driver: &D,
    url: &str,
    config: &BrowserConfig,
) -> Result<PageSnapshot> {
    info!("Navigating to: {}", url);
    driver.navigate(url)?;

    std::thread::sleep(config.settle_delay);

    if let Err(e) = driver.maximize() {
        warn!("Could not maximize window: {}", e);
    }

    consent::try_dismiss(driver, config.consent_timeout);

    let html = scroll::scroll_until_stable(
        driver,
        &config.scroll_pause_secs,
        config.max_stable_attempts,
    )?;
    info!("Captured {} bytes from {}", html.len(), url);

    Ok(PageSnapshot {
        url: url.to_string(),
        html,
        captured_at: chrono::Utc::now(),
    })
}

/// Launches a fresh [`ChromeSession`] for every acquisition.
#[derive(Debug, Clone)]
pub struct ChromePageSource {
    config: BrowserConfig,
}

impl ChromePageSource {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

impl PageSource for ChromePageSource {
    fn acquire(&self, url: &str) -> Result<PageSnapshot> {
        let session = ChromeSession::launch(&self.config)?;
        acquire_page(&session, url, &self.config)
    }
}
