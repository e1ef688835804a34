use std::env;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, ScrapeError};

pub const DEFAULT_LLM_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_LLM_MODEL: &str = "llama-3.1-70b-versatile";

/// Browser launch and page-acquisition knobs.
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub chrome_path: Option<PathBuf>,
    pub headless: bool,
    pub sandbox: bool,
    pub window_size: (u32, u32),
    pub settle_delay: Duration,
    pub consent_timeout: Duration,
    /// Seconds to pause after each scroll, drawn uniformly from this range
    pub scroll_pause_secs: RangeInclusive<f64>,
    pub max_stable_attempts: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: true,
            sandbox: true,
            window_size: (1920, 1080),
            settle_delay: Duration::from_secs(2),
            consent_timeout: Duration::from_secs(10),
            scroll_pause_secs: 1.1..=1.8,
            max_stable_attempts: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_LLM_URL.to_string(),
            api_key: None,
            model: DEFAULT_LLM_MODEL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub browser: BrowserConfig,
    pub llm: LlmConfig,
    pub output_dir: PathBuf,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser: BrowserConfig::default(),
            llm: LlmConfig::default(),
            output_dir: PathBuf::from("output"),
            port: 3000,
        }
    }
}

impl Config {
    /// Build the configuration from process environment variables.
    /// Call `dotenv().ok()` first if a `.env` file should be honoured.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Config::from_env`] but reads values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        let browser = &mut config.browser;
        if let Some(path) = lookup("CHROME_PATH") {
            browser.chrome_path = Some(PathBuf::from(path));
        }
        if let Some(v) = parsed::<bool>(&lookup, "SCRAPER_HEADLESS")? {
            browser.headless = v;
        }
        if let Some(v) = parsed::<bool>(&lookup, "SCRAPER_SANDBOX")? {
            browser.sandbox = v;
        }
        if let Some(w) = parsed::<u32>(&lookup, "SCRAPER_WINDOW_WIDTH")? {
            browser.window_size.0 = w;
        }
        if let Some(h) = parsed::<u32>(&lookup, "SCRAPER_WINDOW_HEIGHT")? {
            browser.window_size.1 = h;
        }
        if let Some(ms) = parsed::<u64>(&lookup, "SCRAPER_SETTLE_MS")? {
            browser.settle_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = parsed::<u64>(&lookup, "SCRAPER_CONSENT_TIMEOUT_SECS")? {
            browser.consent_timeout = Duration::from_secs(secs);
        }
        let min = parsed::<f64>(&lookup, "SCRAPER_SCROLL_PAUSE_MIN")?
            .unwrap_or(*browser.scroll_pause_secs.start());
        let max = parsed::<f64>(&lookup, "SCRAPER_SCROLL_PAUSE_MAX")?
            .unwrap_or(*browser.scroll_pause_secs.end());
        if !(min >= 0.0 && min <= max && max.is_finite()) {
            return Err(ScrapeError::config(format!(
                "Invalid scroll pause range {}..={}",
                min, max
            )));
        }
        browser.scroll_pause_secs = min..=max;
        if let Some(n) = parsed::<u32>(&lookup, "SCRAPER_MAX_STABLE_ATTEMPTS")? {
            browser.max_stable_attempts = n;
        }

        let llm = &mut config.llm;
        llm.api_key = lookup("LLM_API_KEY").or_else(|| lookup("GROQ_API_KEY"));
        if let Some(url) = lookup("LLM_API_URL") {
            llm.api_url = url;
        }
        if let Some(model) = lookup("LLM_MODEL") {
            llm.model = model;
        }
        if let Some(secs) = parsed::<u64>(&lookup, "LLM_TIMEOUT_SECS")? {
            llm.timeout = Duration::from_secs(secs);
        }

        if let Some(dir) = lookup("SCRAPER_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        if let Some(port) = parsed::<u16>(&lookup, "PORT")? {
            config.port = port;
        }

        Ok(config)
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ScrapeError::config(format!("Invalid {}: {:?}", key, raw))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.browser.max_stable_attempts, 10);
        assert_eq!(config.browser.window_size, (1920, 1080));
        assert_eq!(config.browser.scroll_pause_secs, 1.1..=1.8);
        assert_eq!(config.llm.model, DEFAULT_LLM_MODEL);
        assert!(config.llm.api_key.is_none());
        assert_eq!(config.output_dir, PathBuf::from("output"));
    }

    #[test]
    fn overrides_and_key_precedence() {
        let config = Config::from_lookup(lookup_from(&[
            ("GROQ_API_KEY", "groq"),
            ("LLM_API_KEY", "explicit"),
            ("SCRAPER_MAX_STABLE_ATTEMPTS", "3"),
            ("SCRAPER_SCROLL_PAUSE_MIN", "0"),
            ("SCRAPER_SCROLL_PAUSE_MAX", "0.5"),
            ("SCRAPER_SANDBOX", "false"),
            ("PORT", "8080"),
        ]))
        .unwrap();
        assert_eq!(config.llm.api_key.as_deref(), Some("explicit"));
        assert_eq!(config.browser.max_stable_attempts, 3);
        assert_eq!(config.browser.scroll_pause_secs, 0.0..=0.5);
        assert!(!config.browser.sandbox);
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn rejects_inverted_pause_range() {
        let err = Config::from_lookup(lookup_from(&[
            ("SCRAPER_SCROLL_PAUSE_MIN", "3"),
            ("SCRAPER_SCROLL_PAUSE_MAX", "1"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ScrapeError::Config(_)));
    }

    #[test]
    fn rejects_garbage_numbers() {
        let err = Config::from_lookup(lookup_from(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
