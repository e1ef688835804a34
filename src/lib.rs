pub mod api;
pub mod browser;
pub mod config;
pub mod consent;
pub mod error;
pub mod export;
pub mod extraction;
pub mod llm;
pub mod pagination;
pub mod projector;
pub mod sanitize;
pub mod scroll;
pub mod storage;
pub mod worker;

#[cfg(test)]
mod mock;

pub use error::{Result, ScrapeError};
