use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "catalog-crawl")]
#[command(about = "Browser-driven crawler for product listing and product detail pages")]
#[command(version)]
pub struct Args {
    /// JSON configuration file (defaults are used when omitted)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Number of concurrent browser sessions
    #[arg(short, long, global = true)]
    pub concurrency: Option<usize>,

    /// Directory for the JSON/CSV output files
    #[arg(short, long, global = true)]
    pub output_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Discover product links on listing pages
    Links {
        /// Listing pages to start from (overrides the configured ones)
        start_urls: Vec<String>,
    },

    /// Scrape product pages listed in a links file
    Products {
        /// Links file written by the `links` command
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Run link discovery and then product scraping
    Crawl {
        /// Listing pages to start from (overrides the configured ones)
        start_urls: Vec<String>,
    },
}
