use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use course_audit::config::AuditConfig;
use course_audit::db::PostgresSource;
use course_audit::{export, report, AuditSource, Auditor};

#[derive(Parser)]
#[command(name = "course-audit")]
#[command(about = "Course quality audit and rating for the learning platform", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the rating table
    InitDb,
    /// List top-level categories that can be audited
    Categories,
    /// Rate every visible course in a category and its sub-categories
    Audit {
        #[arg(long)]
        category: i64,
        /// Review sheet to write, edit its override column and pass to apply-overrides
        #[arg(long, default_value = "audit.csv")]
        out: PathBuf,
    },
    /// Apply the override column of a reviewed audit sheet
    ApplyOverrides {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Write the rating distribution per top-level category
    Summary {
        #[arg(long, default_value = "summary.md")]
        out: PathBuf,
        /// Heading used for the site-wide totals
        #[arg(long, default_value = "All courses")]
        site_name: String,
        /// Write JSON instead of markdown
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Export every rating row as a tab-separated spreadsheet
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AuditConfig::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;

    let source = PostgresSource::new(
        pool,
        &config.table_prefix,
        config.excluded_categories.clone(),
    );
    let auditor = Auditor::new(source, config.collector_settings());

    match cli.command {
        Commands::InitDb => {
            auditor.source().init_db().await?;
            println!("Schema ready.");
        }
        Commands::Categories => {
            let categories = auditor.source().list_top_level_categories().await?;
            if categories.is_empty() {
                println!("No categories found.");
            }
            for category in categories {
                println!("{:>6}  {}", category.id, category.name);
            }
        }
        Commands::Audit { category, out } => {
            let audit = auditor.audit_category(category).await?;

            if audit.courses.is_empty()
                && audit.failures.is_empty()
                && audit.skipped_categories.is_empty()
            {
                println!(
                    "No visible courses found in '{}' or its sub-categories.",
                    audit.category.name
                );
                return Ok(());
            }

            report::write_review_sheet(&out, &audit)?;
            println!(
                "Rated {} courses in '{}'. Review sheet written to {}.",
                audit.courses.len(),
                audit.category.name,
                out.display()
            );
            for failure in &audit.failures {
                println!("- course {} skipped: {}", failure.course_id, failure.reason);
            }
            for skipped in &audit.skipped_categories {
                println!("- category {} skipped: {}", skipped.category_id, skipped.reason);
            }
        }
        Commands::ApplyOverrides { csv } => {
            let submissions = report::read_review_sheet(&csv)
                .with_context(|| format!("failed to read review sheet {}", csv.display()))?;
            let outcome = auditor.apply_overrides(submissions).await?;

            println!("Applied ratings for {} courses.", outcome.applied);
            for failure in &outcome.failures {
                println!("- course {} not updated: {}", failure.course_id, failure.reason);
            }
        }
        Commands::Summary {
            out,
            site_name,
            json,
        } => {
            let summaries = report::collect_summaries(auditor.source(), &site_name).await?;
            let content = if json {
                serde_json::to_string_pretty(&summaries)?
            } else {
                report::build_summary_report(&summaries)
            };
            std::fs::write(&out, content)?;
            println!("Summary written to {}.", out.display());
        }
        Commands::Export { out } => {
            let out =
                out.unwrap_or_else(|| PathBuf::from(export::default_file_name(Utc::now().date_naive())));
            let rows = auditor.source().list_export_rows().await?;
            let file = std::fs::File::create(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            export::write_export(file, &rows)?;
            info!(rows = rows.len(), "export complete");
            println!("Exported {} courses to {}.", rows.len(), out.display());
        }
    }

    Ok(())
}
