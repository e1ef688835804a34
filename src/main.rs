use axum::{
    routing::{get, post},
    Router,
};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tracing::info;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use page_harvester::api;
use page_harvester::browser::ChromePageSource;
use page_harvester::config::Config;
use page_harvester::export;
use page_harvester::llm::OpenAiCompatClient;
use page_harvester::worker::{BatchReport, ScrapeJob, Worker};

#[derive(OpenApi)]
#[openapi(
    paths(
        api::trigger_scrape,
        api::get_job,
        api::list_jobs,
        api::export_json,
        api::export_csv,
        api::pagination_json,
        api::pagination_csv
    ),
    components(schemas(api::ScrapeRequest, api::ScrapeResponse, api::JobStatus, api::JobSummary)),
    tags((name = "scraper", description = "Scrape Job API"))
)]
struct ApiDoc;

#[derive(Parser)]
#[command(name = "page-harvester", version, about = "Render pages in Chrome and extract structured listings with an LLM")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API and dashboard
    Serve {
        /// Overrides PORT
        #[arg(long)]
        port: Option<u16>,
    },
    /// Scrape URLs once and print where results were written
    Scrape {
        #[arg(required = true)]
        urls: Vec<String>,
        /// Comma-separated field names (default: Name,Title,Sport,Email)
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
        /// Only save the page text, skip the model
        #[arg(long)]
        no_extract: bool,
        /// Ask the model for pagination URLs (single URL only)
        #[arg(long)]
        paginate: bool,
        /// How the site paginates, in your own words
        #[arg(long)]
        hint: Option<String>,
        /// Extra instruction appended to the extraction prompt
        #[arg(long)]
        instruction: Option<String>,
    },
}

fn build_worker(config: &Config) -> anyhow::Result<Worker> {
    let source = ChromePageSource::new(config.browser.clone());
    let model = OpenAiCompatClient::new(config.llm.clone())?;
    Ok(Worker::new(
        Arc::new(source),
        Arc::new(model),
        config.output_dir.clone(),
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    if config.llm.api_key.is_none() {
        tracing::warn!("⚠️ No LLM API key set; extraction and pagination requests will fail");
    }
    let worker = Arc::new(build_worker(&config)?);

    match cli.command {
        Command::Serve { port } => serve(worker, port.unwrap_or(config.port)).await,
        Command::Scrape {
            urls,
            fields,
            no_extract,
            paginate,
            hint,
            instruction,
        } => {
            let job = ScrapeJob {
                urls: urls.iter().flat_map(|u| page_harvester::worker::parse_urls(u)).collect(),
                fields,
                extract: !no_extract,
                paginate,
                pagination_hint: hint,
                instruction,
            };
            let report = worker.run(&job).await?;
            print_report(&report);
            Ok(())
        }
    }
}

async fn serve(worker: Arc<Worker>, port: u16) -> anyhow::Result<()> {
    let state = Arc::new(api::AppState::new(worker));

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/scrape", post(api::trigger_scrape))
        .route("/scrape/:job_id", get(api::get_job))
        .route("/scrape/:job_id/export.json", get(api::export_json))
        .route("/scrape/:job_id/export.csv", get(api::export_csv))
        .route("/scrape/:job_id/pagination.json", get(api::pagination_json))
        .route("/scrape/:job_id/pagination.csv", get(api::pagination_csv))
        .route("/jobs", get(api::list_jobs))
        .fallback_service(ServeDir::new("static")) // Serve Dashboard
        .with_state(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

fn print_report(report: &BatchReport) {
    println!("📁 Output folder: {}", report.output_dir.display());

    for page in report.pages.iter().flatten() {
        println!("\n🌐 {}", page.url);
        println!("   raw text: {}", page.raw_data_path.display());
        if let Some(path) = &page.json_path {
            println!("   json:     {}", path.display());
        }
        if let Some(path) = &page.xlsx_path {
            println!("   xlsx:     {}", path.display());
        }
    }

    let table = export::combined_table(report);
    if !table.is_empty() {
        println!("\n{}", export::table_to_csv(&table));
    }

    if let Some(pagination) = &report.pagination {
        println!("🔗 Pagination URLs:");
        for url in &pagination.page_urls {
            println!("   {}", url);
        }
    } else if let Some(err) = &report.pagination_error {
        println!("⚠️ Pagination detection failed: {}", err);
    }

    for failure in &report.failures {
        println!("❌ {}: {}", failure.url, failure.error);
    }
}
