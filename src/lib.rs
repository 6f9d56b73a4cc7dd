#![doc(html_root_url = "https://docs.rs/imagematch/0.1.0")]
#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

//! # imagematch
//!
//! Find the image in a local dataset that looks most like a query image.
//!
//! Every image is turned into a fixed-length embedding (ResNet-50 pooled
//! features, or a normalised thumbnail when built without libtorch). The
//! query's embedding is compared with each dataset embedding using the mean
//! squared difference, and the closest dataset images are reported.
//!
//! ```text
//! DATA/*/*.jpg -> Embedder -> Catalog
//!                                |
//! query.jpg -> Embedder -> matcher::rank -> MatchReport
//! ```
//!
//! ## Features
//!
//! - `embeddings`: ResNet-50 embedder via `tch` (needs libtorch and a `.ot`
//!   weights file)
//! - `full`: everything above
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use imagematch::{lookup, Config, EmbedderKind, Result};
//! use std::path::Path;
//!
//! fn main() -> Result<()> {
//!     let config = Config {
//!         embedder: EmbedderKind::Pixel,
//!         ..Config::default()
//!     };
//!     let report = lookup(&config, Path::new("query.jpg"))?;
//!     println!("{}", report);
//!     Ok(())
//! }
//! ```

pub mod core;
/// Defines the library's error types and result aliases.
pub mod error;
pub mod models;
/// Run configuration.
pub mod state;
mod utils;

/// Build metadata generated at compile time.
#[allow(dead_code, unreachable_pub)]
mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

use std::path::Path;

pub use crate::{
    core::{
        catalog::{BuiltCatalog, Catalog, CatalogBuilder, CatalogEntry},
        dataset::{category_of, discover},
        embeddings::{self, Embedder, Embedding, PixelEmbedder},
        matcher::{self, distance, find_nearest, nearest, rank, Neighbor},
        render::{save_comparison, side_by_side},
    },
    error::{MatchError, Result, ResultExt},
    models::{
        cache::CatalogCache,
        report::{MatchReport, RankedMatch},
    },
    state::{Config, EmbedderKind},
};

#[cfg(feature = "embeddings")]
pub use crate::core::embeddings::ResNetEmbedder;

/// Initialize logging and load `.env`
///
/// Call once, early in `main`. `RUST_LOG` overrides the default `info` filter.
///
/// # Errors
///
/// Returns an error if a logger has already been installed.
pub fn init() -> Result<()> {
    // A missing .env file is fine.
    let _ = dotenv::dotenv();

    let env = env_logger::Env::default()
        .default_filter_or("info")
        .default_write_style_or("auto");

    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .format_module_path(false)
        .format_target(false)
        .try_init()
        .map_err(|e| MatchError::Internal(format!("logger already initialized: {}", e)))?;

    log::info!(
        "imagematch {} ({}, built {})",
        built_info::PKG_VERSION,
        built_info::PROFILE,
        built_info::BUILT_TIME_UTC
    );
    Ok(())
}

/// Find the dataset images closest to the image at `query`
///
/// Builds the configured embedder once, embeds the query, embeds every image
/// under `config.data_dir` (reusing and refreshing the cache when
/// `config.cache_path` is set), and ranks the `config.top_k` nearest. When
/// `config.comparison_output` is set, the query and its best match are also
/// written side by side to that file.
///
/// # Errors
///
/// Fails on the first image that cannot be embedded, when the dataset holds
/// no images, or on any I/O error.
pub fn lookup(config: &Config, query: &Path) -> Result<MatchReport> {
    config.validate()?;
    let embedder = embeddings::from_config(config)?;
    lookup_with(&*embedder, config, query)
}

/// [`lookup`] with an embedder the caller already holds
pub fn lookup_with(embedder: &dyn Embedder, config: &Config, query: &Path) -> Result<MatchReport> {
    config.validate()?;
    log::debug!("Embedding query {}", query.display());
    let query_embedding = embedder.embed(query)?;

    let mut files = discover(&config.data_dir, &config.extension)?;
    if config.exclude_query {
        let query_abs = query.canonicalize()?;
        files.retain(|f| f.canonicalize().map(|p| p != query_abs).unwrap_or(true));
    }
    log::info!(
        "Matching {} against {} images in {}",
        query.display(),
        files.len(),
        config.data_dir.display()
    );

    let mut builder = CatalogBuilder::new(embedder);
    if let Some(cache_path) = &config.cache_path {
        builder = builder.refresh_cache();
        if let Some(cache) = CatalogCache::load(cache_path)? {
            builder = builder.with_cache(cache);
        }
    }
    let built = builder.build(&files)?;

    let matches: Vec<RankedMatch> = rank(&query_embedding, &built.catalog, config.top_k)?
        .into_iter()
        .map(|n| RankedMatch {
            path: n.id.to_path_buf(),
            category: category_of(n.id),
            distance: n.distance,
        })
        .collect();

    // Only a successful run may replace the previous cache.
    if let (Some(cache_path), Some(cache)) = (&config.cache_path, &built.cache) {
        cache.save(cache_path)?;
    }

    let comparison = match (&config.comparison_output, matches.first()) {
        (Some(output), Some(best)) => {
            save_comparison(query, &best.path, output, config.comparison_height)?;
            Some(output.clone())
        }
        _ => None,
    };

    Ok(MatchReport {
        query: query.to_path_buf(),
        embedder: embedder.name().to_string(),
        catalog_size: built.catalog.len(),
        cached: built.reused,
        matches,
        comparison,
    })
}
