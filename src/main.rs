use anyhow::{Context, Result};
use arxiv_mcp::config::{init_config_file, load_config, user_config_path, Config, LogFormat};
use arxiv_mcp::mcp::McpServer;
use arxiv_mcp::models::{PaperRecord, PaperSummary, SearchQuery, SortBy, DEFAULT_MAX_RESULTS};
use arxiv_mcp::pipeline::{DownloadOptions, Pipeline, PipelineConfig};
use arxiv_mcp::sources::{ArxivSource, Source};
use arxiv_mcp::store::PaperStore;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// arxiv-mcp - Fetch arXiv papers as markdown for MCP clients
#[derive(Parser, Debug)]
#[command(name = "arxiv-mcp")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Search arXiv and convert papers to markdown, over MCP or the command line", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (-v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short)]
    quiet: bool,

    /// Output format
    #[arg(long, short, value_enum, global = true, default_value_t = OutputFormat::Auto)]
    output: OutputFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for converted papers (overrides config)
    #[arg(long, global = true)]
    storage_path: Option<PathBuf>,

    /// Request timeout in seconds (overrides config)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Table if stdout is a terminal, JSON otherwise
    Auto,
    Table,
    Json,
}

impl OutputFormat {
    fn resolve(self) -> Self {
        match self {
            OutputFormat::Auto if std::io::stdout().is_terminal() => OutputFormat::Table,
            OutputFormat::Auto => OutputFormat::Json,
            other => other,
        }
    }
}

/// Sort field for search results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SortField {
    Relevance,
    /// Most recently submitted first
    Date,
}

impl From<SortField> for SortBy {
    fn from(field: SortField) -> Self {
        match field {
            SortField::Relevance => SortBy::Relevance,
            SortField::Date => SortBy::Date,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the MCP server (stdio unless --http is given)
    Serve {
        /// Serve streamable HTTP instead of stdio
        #[arg(long)]
        http: bool,

        /// Port for HTTP mode
        #[arg(long, short, default_value_t = 3000)]
        port: u16,

        /// Host to bind to for HTTP mode
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Search arXiv
    #[command(alias = "s")]
    Search {
        /// Query, e.g. "attention transformers" or "au:hinton AND ti:capsule"
        query: String,

        /// Maximum number of results
        #[arg(long, short, default_value_t = DEFAULT_MAX_RESULTS)]
        max_results: usize,

        /// Earliest submission date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date_arg)]
        date_from: Option<NaiveDate>,

        /// Latest submission date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date_arg)]
        date_to: Option<NaiveDate>,

        /// Category filter, may be repeated (e.g. -c cs.AI -c cs.LG)
        #[arg(long, short)]
        category: Vec<String>,

        #[arg(long, value_enum, default_value_t = SortField::Relevance)]
        sort_by: SortField,
    },

    /// Download a paper and convert it to markdown
    #[command(alias = "d")]
    Download {
        /// arXiv identifier or URL
        paper_id: String,

        /// Fetch again even if already stored
        #[arg(long, short)]
        force: bool,
    },

    /// List stored papers
    #[command(alias = "ls")]
    List,

    /// Print a downloaded paper's markdown
    #[command(alias = "r")]
    Read {
        /// arXiv identifier or URL
        paper_id: String,
    },

    /// Show the catalog record for a paper
    Status {
        /// arXiv identifier or URL
        paper_id: String,
    },

    /// Write a default configuration file
    InitConfig {
        /// Destination (default: user config directory)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn parse_date_arg(raw: &str) -> Result<NaiveDate, String> {
    arxiv_mcp::models::parse_date(raw)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(path) = &cli.storage_path {
        config.storage.path = path.clone();
    }
    if let Some(timeout) = cli.timeout {
        config.fetch.timeout_seconds = timeout;
    }

    init_tracing(&cli, &config);

    match cli.command {
        None => serve(&config, false, "127.0.0.1", 3000).await,

        Some(Commands::Serve { http, port, host }) => serve(&config, http, &host, port).await,

        Some(Commands::Search {
            query,
            max_results,
            date_from,
            date_to,
            category,
            sort_by,
        }) => {
            let mut search_query = SearchQuery::new(&query)
                .max_results(max_results)
                .sort_by(sort_by.into());
            if let Some(date) = date_from {
                search_query = search_query.date_from(date);
            }
            if let Some(date) = date_to {
                search_query = search_query.date_to(date);
            }
            for c in category {
                search_query = search_query.category(c);
            }

            let source = ArxivSource::new(&config.fetch)?;
            let response = source.search(&search_query).await?;
            if !cli.quiet {
                eprintln!("Found {} papers", response.papers.len());
            }
            output_summaries(&response.papers, cli.output)
        }

        Some(Commands::Download { paper_id, force }) => {
            let pipeline = build_pipeline(&config).await?;
            let record = pipeline
                .download(&paper_id, DownloadOptions { force })
                .await
                .with_context(|| format!("Failed to download {}", paper_id))?;
            if !cli.quiet {
                if let Some(path) = &record.path {
                    eprintln!("Saved {} to {}", record.paper_id, path.display());
                }
            }
            output_records(std::slice::from_ref(&record), cli.output)
        }

        Some(Commands::List) => {
            let pipeline = build_pipeline(&config).await?;
            let records = pipeline.list().await?;
            output_records(&records, cli.output)
        }

        Some(Commands::Read { paper_id }) => {
            let pipeline = build_pipeline(&config).await?;
            let document = pipeline.read(&paper_id).await?;
            match cli.output.resolve() {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&document)?),
                _ => print!("{}", document.markdown),
            }
            Ok(())
        }

        Some(Commands::Status { paper_id }) => {
            let pipeline = build_pipeline(&config).await?;
            match pipeline.status(&paper_id).await? {
                Some(record) => output_records(std::slice::from_ref(&record), cli.output),
                None => {
                    println!("{}: unknown (not downloaded)", paper_id);
                    Ok(())
                }
            }
        }

        Some(Commands::InitConfig { path, force }) => {
            let path = path
                .or_else(user_config_path)
                .context("No config directory available; pass a path")?;
            let written = init_config_file(&path, force)?;
            println!("Wrote {}", written.display());
            Ok(())
        }
    }
}

/// Logs go to stderr; stdout carries the stdio transport
fn init_tracing(cli: &Cli, config: &Config) {
    let level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => config.logging.level.as_str(),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("arxiv_mcp={}", level)),
    );
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(filter);

    match config.logging.format {
        LogFormat::Json => registry.with(fmt_layer.json()).init(),
        LogFormat::Text => registry.with(fmt_layer).init(),
    }
}

async fn build_pipeline(config: &Config) -> Result<Arc<Pipeline>> {
    let store = PaperStore::open(&config.storage.path)
        .await
        .with_context(|| format!("Failed to open store at {}", config.storage.path.display()))?;
    tracing::debug!("Paper store at {}", store.root().display());

    let source = ArxivSource::new(&config.fetch)?;
    Ok(Arc::new(Pipeline::new(
        Arc::new(source),
        Arc::new(store),
        PipelineConfig::from(&config.fetch),
    )))
}

async fn serve(config: &Config, http: bool, host: &str, port: u16) -> Result<()> {
    let pipeline = build_pipeline(config).await?;
    let server = McpServer::new(pipeline)?;

    if http {
        let addr = format!("{}:{}", host, port);
        let (bound_addr, handle) = server.run_http(&addr).await?;
        tracing::info!("MCP server listening on {}", bound_addr);

        handle
            .await
            .map_err(|e| anyhow::anyhow!("Server task failed: {}", e))?;
    } else {
        server.run().await?;
    }
    Ok(())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        text.to_string()
    }
}

fn output_summaries(papers: &[PaperSummary], format: OutputFormat) -> Result<()> {
    match format.resolve() {
        OutputFormat::Table => {
            use comfy_table::{Attribute, Cell, Table};
            let mut table = Table::new();
            table.load_preset(comfy_table::presets::UTF8_FULL);
            table.set_header(vec!["ID", "Title", "Authors", "Published"]);

            for paper in papers {
                let published = paper
                    .published
                    .as_deref()
                    .map(|d| d.chars().take(10).collect::<String>())
                    .unwrap_or_default();

                table.add_row(vec![
                    Cell::new(&paper.paper_id),
                    Cell::new(truncate(&paper.title, 60)).add_attribute(Attribute::Bold),
                    Cell::new(truncate(&paper.authors.join(", "), 40)),
                    Cell::new(published),
                ]);
            }
            println!("{table}");
        }
        _ => println!("{}", serde_json::to_string_pretty(papers)?),
    }
    Ok(())
}

fn output_records(records: &[PaperRecord], format: OutputFormat) -> Result<()> {
    match format.resolve() {
        OutputFormat::Table => {
            use comfy_table::{Cell, Color, Table};
            let mut table = Table::new();
            table.load_preset(comfy_table::presets::UTF8_FULL);
            table.set_header(vec!["ID", "Status", "Title", "Updated"]);

            for record in records {
                let status = Cell::new(record.status.as_str()).fg(match record.status {
                    arxiv_mcp::PaperStatus::Success => Color::Green,
                    arxiv_mcp::PaperStatus::Pending => Color::Yellow,
                    arxiv_mcp::PaperStatus::Failed => Color::Red,
                });
                let detail = match (&record.title, &record.error) {
                    (_, Some(error)) if record.is_failed() => truncate(error, 60),
                    (Some(title), _) => truncate(title, 60),
                    _ => String::new(),
                };

                table.add_row(vec![
                    Cell::new(record.paper_id.as_str()),
                    status,
                    Cell::new(detail),
                    Cell::new(record.updated_at.format("%Y-%m-%d %H:%M").to_string()),
                ]);
            }
            println!("{table}");
        }
        _ => println!("{}", serde_json::to_string_pretty(records)?),
    }
    Ok(())
}
