use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use solcast_core::Config;
use solcast_data::FetchError;

use crate::context::AppContext;
use crate::render;

/// How long a one-shot command waits for a just-triggered fetch before
/// printing whatever is stored.
const FIRST_FETCH_WAIT: Duration = Duration::from_secs(15);

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "solcast", version, about = "Weather forecast viewer with an offline cache")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the multi-day forecast (list view).
    Forecast,

    /// Show full details for one day.
    Show {
        /// Date to show, e.g. 2026-08-06.
        date: NaiveDate,
    },

    /// Fetch fresh forecast data now.
    Sync,

    /// Delete cached days older than today.
    Purge,

    /// Keep running, re-rendering the forecast as new data arrives.
    Watch,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config = Config::load()?;
        let ctx = AppContext::from_config(&config)?;

        match self.command {
            Command::Forecast => forecast(&ctx).await,
            Command::Show { date } => show(&ctx, date).await,
            Command::Sync => sync(&ctx).await,
            Command::Purge => purge(&ctx).await,
            Command::Watch => watch(&ctx).await,
        }
    }
}

async fn forecast(ctx: &AppContext) -> Result<()> {
    let mut rows = ctx.repository.current_forecasts();

    // Wait for the standing query to deliver its first result.
    rows.changed().await.ok();
    if rows.borrow_and_update().is_empty() {
        // Nothing cached yet; the catch-up fetch was just triggered.
        println!("No forecast cached yet, fetching...");
        let _ = tokio::time::timeout(FIRST_FETCH_WAIT, rows.changed()).await;
    }

    render::print_forecast_list(&rows.borrow().clone());
    Ok(())
}

async fn show(ctx: &AppContext, date: NaiveDate) -> Result<()> {
    let mut found = ctx.repository.forecast_for_date(date);
    found.changed().await.ok();

    if found.borrow_and_update().is_none() {
        let _ = tokio::time::timeout(FIRST_FETCH_WAIT, found.changed()).await;
    }

    match found.borrow().clone() {
        Some(record) => render::print_forecast_detail(&record),
        None => println!("No forecast stored for {date}."),
    }
    Ok(())
}

async fn sync(ctx: &AppContext) -> Result<()> {
    let mut version = ctx.repository.data_version();
    let baseline = *version.borrow_and_update();

    match ctx.network.fetch_weather().await {
        Ok(0) => {
            println!("The forecast service returned an empty forecast.");
            Ok(())
        }
        Ok(days) => {
            // Wait for the fetched batch to land in the store before exiting.
            let landed = tokio::time::timeout(FIRST_FETCH_WAIT, async {
                while *version.borrow_and_update() == baseline {
                    if version.changed().await.is_err() {
                        break;
                    }
                }
            })
            .await
            .is_ok();

            if landed {
                println!("Fetched and stored {days} day(s) of forecast data.");
            } else {
                println!("Fetched {days} day(s); the cache write has not finished.");
            }
            Ok(())
        }
        Err(FetchError::Api) => {
            // Expected upstream condition (bad location, service outage).
            println!("The forecast service has no usable data right now.");
            Ok(())
        }
        Err(e) => Err(anyhow!(e).context("Fetching forecast data failed")),
    }
}

async fn purge(ctx: &AppContext) -> Result<()> {
    let removed = ctx.repository.delete_old_data().await?;
    println!("Removed {removed} expired day(s).");
    Ok(())
}

async fn watch(ctx: &AppContext) -> Result<()> {
    let mut rows = ctx.repository.current_forecasts();
    println!("Watching for forecast updates (ctrl-c to stop)...");

    loop {
        rows.changed()
            .await
            .map_err(|_| anyhow!("forecast query ended unexpectedly"))?;
        let current = rows.borrow_and_update().clone();
        println!();
        render::print_forecast_list(&current);
    }
}
