use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod aggregate;
mod config;
mod db;
mod error;
mod evaluate;
mod models;
mod numeric;
mod pipeline;
mod promotion;
mod ranking;
mod report;
mod store;

use config::ScoringConfig;
use models::{BatchRequest, BatchResponse};

#[derive(Parser)]
#[command(name = "school-scoring")]
#[command(about = "Term and annual averages, class ranking and promotion for a school year", long_about = None)]
struct Cli {
    /// TOML file overriding grade bands and promotion thresholds
    #[arg(long, global = true, env = "SCORING_CONFIG")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Scope {
    #[arg(long)]
    academic_year: String,
    #[arg(long)]
    level: Option<i32>,
    #[arg(long)]
    department: Option<String>,
    #[arg(long)]
    student: Option<Uuid>,
}

impl Scope {
    fn into_request(self, term_id: Option<String>, next_academic_year_id: Option<String>) -> BatchRequest {
        BatchRequest {
            academic_year_id: self.academic_year,
            term_id,
            student_id: self.student,
            level_id: self.level,
            department_id: self.department,
            next_academic_year_id,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import score rows from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Evaluate a single pair of scores
    Evaluate {
        #[arg(long)]
        ca: Option<String>,
        #[arg(long)]
        exam: Option<String>,
        #[arg(long)]
        coefficient: Option<String>,
    },
    /// Rank a cohort by annual (or term) average
    Rank {
        #[command(flatten)]
        scope: Scope,
        #[arg(long)]
        term: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Resolve promotions and create next year's enrollments
    Promote {
        #[command(flatten)]
        scope: Scope,
        #[arg(long)]
        next_academic_year: String,
    },
    /// Generate a markdown cohort report
    Report {
        #[command(flatten)]
        scope: Scope,
        #[arg(long)]
        term: Option<String>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_json(response: &BatchResponse) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(response)?);
    Ok(())
}

async fn connect() -> anyhow::Result<sqlx::PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = ScoringConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Evaluate {
            ca,
            exam,
            coefficient,
        } => {
            let result = evaluate::evaluate(
                ca.as_deref(),
                exam.as_deref(),
                coefficient.as_deref(),
                &config.grading,
            );
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::InitDb => {
            let pool = connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect().await?;
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let pool = connect().await?;
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} score rows from {}.", csv.display());
        }
        Commands::Rank { scope, term, limit } => {
            let store = db::PgStore::new(connect().await?);
            let request = scope.into_request(term, None);
            let mut response = pipeline::run_ranking(&store, &request, &config).await?;
            if let Some(limit) = limit {
                response.students.truncate(limit);
            }
            print_json(&response)?;
        }
        Commands::Promote {
            scope,
            next_academic_year,
        } => {
            let store = db::PgStore::new(connect().await?);
            let request = scope.into_request(None, Some(next_academic_year));
            let response = pipeline::run_promotion(&store, &request, &config).await?;
            print_json(&response)?;
        }
        Commands::Report { scope, term, out } => {
            let store = db::PgStore::new(connect().await?);
            let request = scope.into_request(term, None);
            let response = pipeline::run_ranking(&store, &request, &config).await?;
            let report = report::build_report(&request, &response, &config, Utc::now().date_naive());
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
