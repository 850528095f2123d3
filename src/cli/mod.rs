// CLI module for platecache
// Author: kelexine (https://github.com/kelexine)

use crate::meals::SortMethod;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// platecache - sort and summarize logged meals through the caching core
#[derive(Parser, Debug)]
#[command(name = "platecache", version, about, long_about = None)]
pub struct Args {
    /// Config file to read instead of ~/.platecache/config.toml
    #[arg(long, env = "PLATECACHE_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sort a JSON file of meals and print the grouped sections
    Sort {
        /// JSON array of meals
        file: PathBuf,

        /// Sort method id (see `platecache methods`)
        #[arg(short, long, default_value = "date-desc")]
        method: SortMethod,

        /// Print sections as JSON
        #[arg(long)]
        json: bool,

        /// Run with the reduced prefetch concurrency ceiling
        #[arg(long)]
        low_performance: bool,
    },

    /// Print the nutrition summary for one day
    Summary {
        /// JSON array of meals
        file: PathBuf,

        /// Day to summarize (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },

    /// List the available sort methods
    Methods,

    /// Print the effective configuration as TOML
    Config,

    /// Sort a meal file by every method and print the collected metrics
    Metrics {
        /// JSON array of meals
        file: Option<PathBuf>,
    },
}
