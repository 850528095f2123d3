// platecache - caching, prefetching and chunked meal sorting core
// Author: kelexine (https://github.com/kelexine)

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use platecache::cache::CacheKey;
use platecache::cli::{Args, Command};
use platecache::config::AppConfig;
use platecache::context::CoreContext;
use platecache::error::CoreError;
use platecache::meals::{DailySummary, Meal, SortMethod, SortedSection};
use platecache::metrics;
use platecache::prefetch::PrefetchOptions;
use platecache::utils::logging;
use platecache::utils::retry::{with_retry, DEFAULT_MAX_ATTEMPTS};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Phase 1: Load configuration
    let config = match &args.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };

    // Phase 2: Initialize logging
    logging::init(&config.logging)?;
    info!("Starting platecache v{}", env!("CARGO_PKG_VERSION"));

    // Phase 3: Build the core context
    let context = CoreContext::new(config);

    match args.command {
        Command::Methods => {
            for method in SortMethod::ALL {
                println!("{:<24} {}", method.id(), method.label());
            }
        }
        Command::Config => {
            print!("{}", context.config().to_toml()?);
        }
        Command::Sort {
            file,
            method,
            json,
            low_performance,
        } => {
            context.set_low_performance(low_performance);
            let meals = load_meals(&context, &file).await?;
            if context.should_virtualize(meals.len()) {
                info!("{} meals: list should be virtualized", meals.len());
            }

            let sections = context.sort_meals(&meals, method).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&sections)?);
            } else {
                print_sections(&context, method, &sections);
            }
        }
        Command::Summary { file, date } => {
            let meals = load_meals(&context, &file).await?;
            let offset = context.sorting().offset();
            let date = date.unwrap_or_else(|| Utc::now().with_timezone(&offset).date_naive());
            let summary = DailySummary::for_day(&meals, date, offset);
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Metrics { file } => {
            if let Some(file) = file {
                let meals = load_meals(&context, &file).await?;
                for method in SortMethod::ALL {
                    context.sort_meals(&meals, method).await;
                }
            }
            print!("{}", metrics::gather_metrics());
        }
    }

    Ok(())
}

/// Read a meal file through the prefetch layer so repeated loads within the
/// TTL (or across runs, with persistence on) are served from cache.
async fn load_meals(context: &CoreContext, path: &Path) -> Result<Vec<Meal>> {
    let prefetcher = context.prefetcher::<Vec<Meal>, Arc<CoreError>>("meals");
    let store = context.cache_store();

    if let Some(store) = &store {
        let restored = prefetcher.cache().hydrate(store)?;
        debug!("Restored {} cached entries from {}", restored, store.path().display());
    }

    let source = path.display().to_string();
    let key = CacheKey::from(["meal-file", source.as_str()]);
    let file: PathBuf = path.to_path_buf();
    let urgent = context.admission().urgent_priority();

    let meals = prefetcher
        .prefetch(
            key,
            move || async move {
                with_retry(
                    "read meal file",
                    DEFAULT_MAX_ATTEMPTS,
                    |e: &Arc<CoreError>| matches!(**e, CoreError::Io(_)),
                    || {
                        let file = file.clone();
                        async move { read_meal_file(&file).await.map_err(Arc::new) }
                    },
                )
                .await
            },
            PrefetchOptions::default().with_priority(urgent),
        )
        .await?;

    if let Some(store) = &store {
        prefetcher.cache().persist(store)?;
    }

    info!("Loaded {} meals from {}", meals.len(), source);
    Ok(meals)
}

async fn read_meal_file(path: &Path) -> platecache::error::Result<Vec<Meal>> {
    let raw = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&raw)?)
}

fn print_sections(context: &CoreContext, method: SortMethod, sections: &[SortedSection]) {
    let offset = context.sorting().offset();
    println!("{} ({})", method.label(), method.id());

    for section in sections {
        println!();
        println!("== {} ==", section.title);
        for meal in &section.data {
            let name = if meal.name.is_empty() { "(unnamed)" } else { meal.name.as_str() };
            println!(
                "  {}  {:<28} {:>6.0} kcal {:>6.1} g protein",
                meal.timestamp.with_timezone(&offset).format("%Y-%m-%d %H:%M"),
                name,
                meal.nutrition.calories,
                meal.nutrition.protein
            );
        }
    }
}
