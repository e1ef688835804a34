//! Scroll-until-stable loop.
//!
//! Termination is driven purely by document height: after `max_stable_attempts`
//! consecutive measurements without growth the page is considered loaded. Slow
//! asynchronous content may still be missing at that point.

use rand::Rng;
use std::ops::RangeInclusive;
use std::time::Duration;
use tracing::debug;

use crate::browser::PageDriver;
use crate::error::{Result, ScrapeError};

pub const SCROLL_TO_BOTTOM_JS: &str = "window.scrollTo(0, document.body.scrollHeight);";
pub const DOCUMENT_HEIGHT_JS: &str = "document.body.scrollHeight";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollState {
    /// The last measurement saw the height change
    Progressing,
    /// Consecutive measurements without a height change
    Stalled(u32),
    Done,
}

impl ScrollState {
    pub fn initial(max_stable_attempts: u32) -> Self {
        if max_stable_attempts == 0 {
            ScrollState::Done
        } else {
            ScrollState::Progressing
        }
    }

    /// Advance after one measurement.
    pub fn observe(self, height_changed: bool, max_stable_attempts: u32) -> Self {
        let stalled = |count: u32| {
            if count >= max_stable_attempts {
                ScrollState::Done
            } else {
                ScrollState::Stalled(count)
            }
        };
        match self {
            ScrollState::Done => ScrollState::Done,
            _ if height_changed => ScrollState::Progressing,
            ScrollState::Progressing => stalled(1),
            ScrollState::Stalled(count) => stalled(count + 1),
        }
    }

    pub fn is_done(self) -> bool {
        self == ScrollState::Done
    }
}

/// Scroll to the bottom repeatedly, pausing a random duration from `pause_secs`
/// between scrolls, until the height has been unchanged `max_stable_attempts`
/// times in a row. Returns the full rendered markup.
pub fn scroll_until_stable<D: PageDriver + ?Sized>(
    driver: &D,
    pause_secs: &RangeInclusive<f64>,
    max_stable_attempts: u32,
) -> Result<String> {
    let mut last_height = document_height(driver)?;
    let mut state = ScrollState::initial(max_stable_attempts);
    let mut rounds = 0u32;

    while !state.is_done() {
        driver.evaluate(SCROLL_TO_BOTTOM_JS)?;
        std::thread::sleep(random_pause(pause_secs));

        let new_height = document_height(driver)?;
        state = state.observe(new_height != last_height, max_stable_attempts);
        last_height = new_height;
        rounds += 1;
    }

    debug!("Scrolling settled after {} rounds at height {}", rounds, last_height);
    driver.content()
}

fn random_pause(pause_secs: &RangeInclusive<f64>) -> Duration {
    let (low, high) = (*pause_secs.start(), *pause_secs.end());
    let secs = if low < high {
        rand::thread_rng().gen_range(low..=high)
    } else {
        low
    };
    Duration::from_secs_f64(secs.max(0.0))
}

fn document_height<D: PageDriver + ?Sized>(driver: &D) -> Result<u64> {
    let value = driver.evaluate(DOCUMENT_HEIGHT_JS)?;
    value
        .as_f64()
        .map(|h| h as u64)
        .ok_or_else(|| ScrapeError::browser(format!("Unexpected document height: {}", value)))
}
