use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{MatchError, Result};

/// Which embedder turns images into vectors
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbedderKind {
    /// ResNet-50 pooled features (needs the `embeddings` feature).
    Resnet,
    /// Normalised RGB thumbnail.
    Pixel,
}

impl Default for EmbedderKind {
    fn default() -> Self {
        if cfg!(feature = "embeddings") {
            EmbedderKind::Resnet
        } else {
            EmbedderKind::Pixel
        }
    }
}

impl FromStr for EmbedderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "resnet" | "resnet50" => Ok(EmbedderKind::Resnet),
            "pixel" => Ok(EmbedderKind::Pixel),
            other => Err(format!("unknown embedder '{}' (expected resnet or pixel)", other)),
        }
    }
}

impl fmt::Display for EmbedderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmbedderKind::Resnet => f.write_str("resnet"),
            EmbedderKind::Pixel => f.write_str("pixel"),
        }
    }
}

/// Configuration for a lookup run
#[derive(Clone, Debug)]
pub struct Config {
    /// Dataset root; images live one directory below it
    pub data_dir: PathBuf,
    /// Image file extension to collect from the dataset
    pub extension: String,
    /// Embedder used for both the query and the catalog
    pub embedder: EmbedderKind,
    /// ResNet-50 weights in `.ot` VarStore format
    pub weights: Option<PathBuf>,
    /// Side length the ResNet input is resized to
    pub image_size: u32,
    /// Thumbnail side length for the pixel embedder
    pub pixel_size: u32,
    /// Embedding cache file, reused across runs when set
    pub cache_path: Option<PathBuf>,
    /// Number of ranked matches to report
    pub top_k: usize,
    /// Where to write the side-by-side comparison image
    pub comparison_output: Option<PathBuf>,
    /// Height of the comparison image in pixels
    pub comparison_height: u32,
    /// Skip the query file if it is also part of the dataset
    pub exclude_query: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("DATA"),
            extension: String::from("jpg"),
            embedder: EmbedderKind::default(),
            weights: None,
            image_size: 224,
            pixel_size: 16,
            cache_path: None,
            top_k: 1,
            comparison_output: None,
            comparison_height: 320,
            exclude_query: false,
        }
    }
}

impl Config {
    /// Defaults overlaid with `IMAGEMATCH_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(dir) = env_var("IMAGEMATCH_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(ext) = env_var("IMAGEMATCH_EXTENSION") {
            config.extension = ext;
        }
        if let Some(kind) = env_var("IMAGEMATCH_EMBEDDER") {
            config.embedder = kind
                .parse()
                .map_err(|e| MatchError::Config(format!("IMAGEMATCH_EMBEDDER: {}", e)))?;
        }
        if let Some(weights) = env_var("IMAGEMATCH_WEIGHTS") {
            config.weights = Some(PathBuf::from(weights));
        }
        if let Some(size) = env_var("IMAGEMATCH_PIXEL_SIZE") {
            config.pixel_size = parse_number("IMAGEMATCH_PIXEL_SIZE", &size)?;
        }
        if let Some(cache) = env_var("IMAGEMATCH_CACHE") {
            config.cache_path = Some(PathBuf::from(cache));
        }
        if let Some(top_k) = env_var("IMAGEMATCH_TOP_K") {
            config.top_k = parse_number("IMAGEMATCH_TOP_K", &top_k)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings no run could succeed with
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(MatchError::Config("top_k must be at least 1".to_string()));
        }
        if self.pixel_size == 0 || self.image_size == 0 || self.comparison_height == 0 {
            return Err(MatchError::Config(
                "image sizes must be non-zero".to_string(),
            ));
        }
        if self.extension.trim_start_matches('.').is_empty() {
            return Err(MatchError::Config("extension must not be empty".to_string()));
        }
        Ok(())
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| MatchError::Config(format!("{} is not a valid number: {}", key, value)))
}
