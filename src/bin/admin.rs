//! CLI administration tool for ad-click-tracker.
//!
//! Seeds and inspects the advertisement catalogue and click log directly in
//! PostgreSQL, without going through the HTTP API.
//!
//! # Usage
//!
//! ```bash
//! # Insert the ten demo advertisements
//! cargo run --bin admin -- seed
//!
//! # List advertisements
//! cargo run --bin admin -- ads
//!
//! # View totals
//! cargo run --bin admin -- stats
//!
//! # Check database connection
//! cargo run --bin admin -- db check
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` (required): PostgreSQL connection string

use ad_click_tracker::domain::entities::Advertisement;
use ad_click_tracker::domain::repositories::AdRepository;
use ad_click_tracker::infrastructure::persistence::PgAdRepository;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Confirm;
use sqlx::PgPool;
use std::sync::Arc;

/// CLI tool for managing ad-click-tracker.
#[derive(Parser)]
#[command(name = "admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Insert demo advertisements into an empty catalogue
    Seed {
        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// List advertisements
    Ads,

    /// Show advertisement and click totals
    Stats,

    /// Database operations
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
}

#[derive(Subcommand)]
enum DbAction {
    /// Check database connection
    Check,

    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    let pool = PgPool::connect(&database_url)
        .await
        .context("Failed to connect to database")?;

    match cli.command {
        Commands::Seed { yes } => seed(&pool, yes).await?,
        Commands::Ads => list_ads(&pool).await?,
        Commands::Stats => handle_stats(&pool).await?,
        Commands::Db { action } => handle_db_action(action, &pool).await?,
    }

    Ok(())
}

fn demo_ads() -> Vec<Advertisement> {
    (1..=10)
        .map(|n| {
            Advertisement::new(
                n.to_string(),
                format!("https://example.com/images/ad{}.jpg", n),
                format!("https://example.com/landing/ad{}", n),
            )
        })
        .collect()
}

/// Inserts the demo catalogue in one transaction.
///
/// Does nothing when the `ads` table already has rows.
async fn seed(pool: &PgPool, skip_confirm: bool) -> Result<()> {
    println!("{}", "🌱 Seed advertisements".bright_blue().bold());
    println!();

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ads")
        .fetch_one(pool)
        .await?;

    if existing > 0 {
        println!(
            "{}",
            format!("⚠️  {} advertisements already present, skipping", existing).yellow()
        );
        return Ok(());
    }

    let ads = demo_ads();

    if !skip_confirm {
        let confirmed = Confirm::new()
            .with_prompt(format!("Insert {} demo advertisements?", ads.len()))
            .default(true)
            .interact()?;

        if !confirmed {
            println!("{}", "❌ Cancelled".red());
            return Ok(());
        }
    }

    let mut tx = pool.begin().await?;
    for ad in &ads {
        sqlx::query("INSERT INTO ads (id, image_url, target_url) VALUES ($1, $2, $3)")
            .bind(&ad.id)
            .bind(&ad.image_url)
            .bind(&ad.target_url)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to insert advertisement {}", ad.id))?;
    }
    tx.commit().await?;

    println!(
        "{}",
        format!("✅ Inserted {} advertisements", ads.len())
            .green()
            .bold()
    );
    println!();

    Ok(())
}

async fn list_ads(pool: &PgPool) -> Result<()> {
    let repo = PgAdRepository::new(Arc::new(pool.clone()));

    let ads = repo
        .fetch_all()
        .await
        .map_err(|e| anyhow::anyhow!("Database error: {}", e))?;

    if ads.is_empty() {
        println!("{}", "No advertisements. Run `admin seed` first.".yellow());
        return Ok(());
    }

    println!("{}", "📋 Advertisements".bright_blue().bold());
    println!();
    for ad in ads {
        println!(
            "  {:<6} {}  →  {}",
            ad.id.cyan(),
            ad.image_url.bright_black(),
            ad.target_url
        );
    }
    println!();

    Ok(())
}

/// Displays advertisement and click totals from the durable store.
async fn handle_stats(pool: &PgPool) -> Result<()> {
    println!("{}", "📊 Statistics".bright_blue().bold());
    println!();

    let ads_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ads")
        .fetch_one(pool)
        .await?;

    let clicks_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clicks")
        .fetch_one(pool)
        .await?;

    let last_hour: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM clicks WHERE timestamp > NOW() - INTERVAL '1 hour'",
    )
    .fetch_one(pool)
    .await?;

    println!(
        "  Advertisements:   {}",
        ads_count.to_string().bright_green().bold()
    );
    println!(
        "  Clicks:           {}",
        clicks_count.to_string().bright_green().bold()
    );
    println!(
        "  Clicks last hour: {}",
        last_hour.to_string().bright_green().bold()
    );
    println!();

    Ok(())
}

async fn handle_db_action(action: DbAction, pool: &PgPool) -> Result<()> {
    match action {
        DbAction::Check => {
            println!("{}", "🔍 Checking database connection...".bright_blue());

            sqlx::query("SELECT 1").fetch_one(pool).await?;

            println!("{}", "✅ Database connection OK".green().bold());
        }
        DbAction::Migrate => {
            println!("{}", "🛠  Applying migrations...".bright_blue());

            sqlx::migrate!("./migrations")
                .run(pool)
                .await
                .context("Migration failed")?;

            println!("{}", "✅ Migrations applied".green().bold());
        }
    }

    Ok(())
}
