use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::EnvFilter;

use faculty_tracker::api::{self, AppState};
use faculty_tracker::config::Config;
use faculty_tracker::listing::{self, Filters, ListQuery, SortDirection, SortField, SortState};
use faculty_tracker::models::{Period, Zone};
use faculty_tracker::store::Store;
use faculty_tracker::template::{self, Semester};
use faculty_tracker::{db, env_file, report, upload, zone};

#[derive(Parser)]
#[command(name = "faculty-tracker")]
#[command(about = "Faculty academic performance tracker", long_about = None)]
struct Cli {
    /// Environment file loaded before reading configuration
    #[arg(long, global = true, default_value = ".env")]
    env_file: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a sample roster
    Seed,
    /// Import teacher records from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, default_value = "1st")]
        semester: Semester,
    },
    /// Write the CSV upload template
    Template {
        #[arg(long, default_value = "1st")]
        semester: Semester,
        /// Output path; defaults to the template's download name
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print one page of the teacher table
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        department: Option<String>,
        #[arg(long)]
        zone: Option<Zone>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        sort: Option<SortField>,
        #[arg(long)]
        desc: bool,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long)]
        page_size: Option<usize>,
    },
    /// Generate a markdown report for one period
    Report {
        #[arg(long, default_value = "P1")]
        period: Period,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Run the HTTP API
    Serve {
        #[arg(long)]
        addr: Option<SocketAddr>,
        /// Keep records in memory instead of Postgres
        #[arg(long)]
        in_memory: bool,
        /// Start the in-memory store with the sample roster
        #[arg(long, requires = "in_memory")]
        seed: bool,
    },
}

async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(config.require_database_url()?)
        .await
        .context("failed to connect to Postgres")
}

// The environment file is applied before the runtime exists; its worker
// threads must never observe `set_var`.
fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let loaded = env_file::load(&cli.env_file)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    tracing::debug!(loaded, path = %cli.env_file.display(), "environment file processed");

    let config = Config::from_env()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?
        .block_on(run(cli.command, config))
}

async fn run(command: Commands, config: Config) -> anyhow::Result<()> {
    match command {
        Commands::InitDb => {
            let pool = connect(&config).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(&config).await?;
            let summary = db::seed(&pool).await?;
            println!(
                "Seed data loaded ({} new, {} updated).",
                summary.inserted, summary.updated
            );
        }
        Commands::Import { csv, semester } => {
            let rows = upload::parse_file(&csv, semester)
                .with_context(|| format!("failed to read {}", csv.display()))?;
            let pool = connect(&config).await?;
            let summary = db::import_teachers(&pool, rows).await?;
            println!(
                "Imported {} teachers from {} ({} new, {} updated).",
                summary.total(),
                csv.display(),
                summary.inserted,
                summary.updated
            );
        }
        Commands::Template { semester, out } => {
            let out = out.unwrap_or_else(|| PathBuf::from(template::file_name(semester)));
            std::fs::write(&out, template::render(semester)?)?;
            println!("Template written to {}.", out.display());
        }
        Commands::List {
            search,
            department,
            zone: zone_filter,
            status,
            sort,
            desc,
            page,
            page_size,
        } => {
            let pool = connect(&config).await?;
            let teachers = db::fetch_teachers(&pool).await?;
            let query = ListQuery {
                filters: Filters {
                    search,
                    department,
                    zone: zone_filter,
                    status,
                },
                sort: sort.map(|field| SortState {
                    field,
                    direction: if desc {
                        SortDirection::Desc
                    } else {
                        SortDirection::Asc
                    },
                }),
                page,
                page_size: page_size.unwrap_or(config.page_size),
            };
            let page = listing::query(&teachers, &query);

            if page.items.is_empty() {
                println!("No teachers match these filters.");
                return Ok(());
            }

            println!(
                "Page {} of {} ({} teachers):",
                page.page, page.total_pages, page.total_items
            );
            for teacher in page.items.iter() {
                let p1 = zone::resolve(teacher, Period::P1);
                println!(
                    "- {} {} ({}, {}) enrolled {} zone {} P1 {}",
                    teacher.teacher_id,
                    teacher.full_name(),
                    teacher.department,
                    if teacher.status.is_empty() { "-" } else { teacher.status.as_str() },
                    teacher.enrolled_students,
                    teacher.zone.map(|z| z.as_str()).unwrap_or("-"),
                    p1.percent
                        .map(|pct| format!("{pct:.2}%"))
                        .or(p1.label)
                        .unwrap_or_else(|| "-".to_string()),
                );
            }
            if page.has_next {
                println!("More: --page {}", page.next_page);
            }
        }
        Commands::Report { period, out } => {
            let pool = connect(&config).await?;
            let teachers = db::fetch_teachers(&pool).await?;
            let report = report::build_period_report(&teachers, period);
            std::fs::write(&out, report::render_markdown(&report))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Serve {
            addr,
            in_memory,
            seed,
        } => {
            let store = if in_memory {
                let store = Store::memory();
                if seed {
                    store.import(db::seed_records()).await?;
                }
                store
            } else {
                Store::Postgres(connect(&config).await?)
            };
            let state = AppState {
                store,
                page_size: config.page_size,
                max_upload_bytes: config.max_upload_bytes,
            };
            api::serve(state, addr.unwrap_or(config.bind_addr)).await?;
        }
    }

    Ok(())
}
