use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use imagematch::{init, lookup, Config, EmbedderKind};

/// Find the most visually similar image in a dataset
#[derive(Parser, Debug)]
#[command(name = "imagematch")]
#[command(version)]
#[command(about = "Find the most visually similar image in a local dataset", long_about = None)]
struct Cli {
    /// Query image to match
    query: PathBuf,

    /// Dataset root containing one directory per category
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Image extension collected from the dataset
    #[arg(long)]
    extension: Option<String>,

    /// Embedder: "resnet" or "pixel"
    #[arg(long)]
    embedder: Option<EmbedderKind>,

    /// ResNet-50 weights (.ot)
    #[arg(long)]
    weights: Option<PathBuf>,

    /// Thumbnail side length for the pixel embedder
    #[arg(long)]
    pixel_size: Option<u32>,

    /// Embedding cache file, created or refreshed on every run
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Number of matches to print
    #[arg(short = 'k', long)]
    top: Option<usize>,

    /// Write the query and its best match side by side to this PNG
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Do not match the query against itself if it is part of the dataset
    #[arg(long)]
    exclude_query: bool,

    /// Print the full report as JSON
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn apply(self, mut config: Config) -> Config {
        if let Some(dir) = self.data_dir {
            config.data_dir = dir;
        }
        if let Some(ext) = self.extension {
            config.extension = ext;
        }
        if let Some(kind) = self.embedder {
            config.embedder = kind;
        }
        if let Some(weights) = self.weights {
            config.weights = Some(weights);
        }
        if let Some(size) = self.pixel_size {
            config.pixel_size = size;
        }
        if let Some(cache) = self.cache {
            config.cache_path = Some(cache);
        }
        if let Some(top) = self.top {
            config.top_k = top;
        }
        if let Some(output) = self.output {
            config.comparison_output = Some(output);
        }
        config.exclude_query |= self.exclude_query;
        config
    }
}

fn main() -> Result<()> {
    init()?;

    let cli = Cli::parse();
    let query = cli.query.clone();
    let json = cli.json;
    let config = cli.apply(Config::from_env()?);

    let report = lookup(&config, &query)
        .with_context(|| format!("matching {}", query.display()))?;

    if json {
        println!("{}", report.to_json()?);
    } else {
        println!("{}", report);
    }

    Ok(())
}
