use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::browser::PageSource;
use crate::error::{Result, ScrapeError};
use crate::extraction::{Extraction, ExtractionRequestor, DEFAULT_FIELDS};
use crate::llm::ChatModel;
use crate::pagination::{PaginationData, PaginationRequestor};
use crate::projector;
use crate::sanitize;
use crate::storage::StorageManager;

/// Split operator input on whitespace into target URLs.
pub fn parse_urls(input: &str) -> Vec<String> {
    input.split_whitespace().map(str::to_string).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeJob {
    pub urls: Vec<String>,
    /// Field names to extract; empty means the default set
    #[serde(default)]
    pub fields: Vec<String>,
    /// Run the extraction requestor on each page
    #[serde(default = "default_true")]
    pub extract: bool,
    /// Ask for pagination URLs (single-URL runs only)
    #[serde(default)]
    pub paginate: bool,
    #[serde(default)]
    pub pagination_hint: Option<String>,
    #[serde(default)]
    pub instruction: Option<String>,
}

fn default_true() -> bool {
    true
}

impl ScrapeJob {
    pub fn new(urls: Vec<String>) -> Self {
        Self {
            urls,
            fields: Vec::new(),
            extract: true,
            paginate: false,
            pagination_hint: None,
            instruction: None,
        }
    }

    /// Trimmed, non-empty field names, falling back to [`DEFAULT_FIELDS`].
    pub fn effective_fields(&self) -> Vec<String> {
        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect();
        if fields.is_empty() {
            DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect()
        } else {
            fields
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PageReport {
    pub url: String,
    pub raw_data_path: PathBuf,
    pub extraction: Option<Extraction>,
    pub json_path: Option<PathBuf>,
    pub xlsx_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UrlFailure {
    pub url: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub output_dir: PathBuf,
    pub fields: Vec<String>,
    /// One entry per input URL, in input order; `None` where processing failed
    pub pages: Vec<Option<PageReport>>,
    pub failures: Vec<UrlFailure>,
    pub pagination: Option<PaginationData>,
    pub pagination_error: Option<String>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.pages.iter().flatten().count()
    }
}

/// Runs the scrape pipeline over a batch of URLs, one at a time.
pub struct Worker {
    source: Arc<dyn PageSource>,
    extractor: ExtractionRequestor,
    paginator: PaginationRequestor,
    output_root: PathBuf,
}

impl Worker {
    pub fn new(source: Arc<dyn PageSource>, model: Arc<dyn ChatModel>, output_root: PathBuf) -> Self {
        Self {
            source,
            extractor: ExtractionRequestor::new(model.clone()),
            paginator: PaginationRequestor::new(model),
            output_root,
        }
    }

    /// Process every URL in order. A failure is recorded against its URL and the
    /// batch moves on; only an empty batch or an unwritable output folder fail the call.
    pub async fn run(&self, job: &ScrapeJob) -> Result<BatchReport> {
        let first_url = job
            .urls
            .first()
            .ok_or_else(|| ScrapeError::InvalidRequest("No URLs to scrape".to_string()))?;
        let storage = StorageManager::for_run(&self.output_root, first_url, Local::now().naive_local())?;
        let fields = job.effective_fields();

        info!(
            "🚀 Scraping {} URL(s) into {}",
            job.urls.len(),
            storage.run_dir().display()
        );

        let mut report = BatchReport {
            output_dir: storage.run_dir().to_path_buf(),
            fields: fields.clone(),
            pages: Vec::with_capacity(job.urls.len()),
            failures: Vec::new(),
            pagination: None,
            pagination_error: None,
        };
        // Only needed for pagination, never kept on the report.
        let mut first_page_text = None;

        for (idx, url) in job.urls.iter().enumerate() {
            let n = idx + 1;
            match self.process_url(&storage, n, url, job, &fields).await {
                Ok((page, text)) => {
                    if n == 1 && job.paginate {
                        first_page_text = Some(text);
                    }
                    report.pages.push(Some(page));
                }
                Err(e) => {
                    error!("❌ An error occurred while processing {}: {}", url, e);
                    report.failures.push(UrlFailure {
                        url: url.clone(),
                        error: e.to_string(),
                    });
                    report.pages.push(None);
                }
            }
        }

        if job.paginate {
            self.detect_pagination(job, first_page_text, &mut report).await;
        }

        info!(
            "✅ Batch finished: {}/{} URL(s) succeeded",
            report.succeeded(),
            job.urls.len()
        );
        Ok(report)
    }

    async fn process_url(
        &self,
        storage: &StorageManager,
        n: usize,
        url: &str,
        job: &ScrapeJob,
        fields: &[String],
    ) -> Result<(PageReport, String)> {
        let source = self.source.clone();
        let target = url.to_string();
        // Browser work blocks; keep it off the async executor.
        let snapshot = tokio::task::spawn_blocking(move || source.acquire(&target))
            .await
            .map_err(|e| ScrapeError::browser(format!("Acquisition task failed: {}", e)))??;

        let text = projector::project(&sanitize::sanitize(&snapshot.html));
        let raw_data_path = storage.store_raw(n, &text)?;

        let mut page = PageReport {
            url: url.to_string(),
            raw_data_path,
            extraction: None,
            json_path: None,
            xlsx_path: None,
        };

        if job.extract {
            let extraction = self
                .extractor
                .extract(&text, fields, job.instruction.as_deref())
                .await?;
            match extraction.listings() {
                Some(listings) => {
                    let (json_path, xlsx_path) = storage.store_listings(n, listings, fields)?;
                    page.json_path = Some(json_path);
                    page.xlsx_path = xlsx_path;
                }
                None => warn!("⚠️ Keeping unparsed model reply for {}", url),
            }
            page.extraction = Some(extraction);
        }

        Ok((page, text))
    }

    async fn detect_pagination(
        &self,
        job: &ScrapeJob,
        first_page_text: Option<String>,
        report: &mut BatchReport,
    ) {
        if job.urls.len() != 1 {
            warn!("Pagination detection only runs for a single URL; skipping");
            return;
        }
        let Some(text) = first_page_text else {
            report.pagination_error = Some("Page could not be fetched".to_string());
            return;
        };

        match self
            .paginator
            .detect(&job.urls[0], job.pagination_hint.as_deref(), &text)
            .await
        {
            Ok(data) => report.pagination = Some(data),
            Err(e) => {
                error!("❌ Pagination detection failed for {}: {}", job.urls[0], e);
                report.pagination_error = Some(e.to_string());
            }
        }
    }
}
