use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One ranked dataset image.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RankedMatch {
    /// Path of the dataset image.
    pub path: PathBuf,
    /// Category label, the name of the image's directory.
    pub category: Option<String>,
    /// Distance to the query (mean squared difference).
    ///
    /// JSON has no NaN, so a non-finite distance is written as `null` and
    /// read back as NaN.
    #[serde(with = "non_finite_as_null")]
    pub distance: f32,
}

/// Outcome of matching one query against a dataset.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MatchReport {
    /// The query image.
    pub query: PathBuf,
    /// Name of the embedder used for query and catalog.
    pub embedder: String,
    /// Number of images compared against.
    pub catalog_size: usize,
    /// Catalog embeddings reused from the cache.
    pub cached: usize,
    /// Closest images, nearest first.
    pub matches: Vec<RankedMatch>,
    /// Side-by-side image written for visual inspection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<PathBuf>,
}

mod non_finite_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &f32, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f32(*value)
        } else {
            serializer.serialize_none()
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
        Ok(Option::<f32>::deserialize(deserializer)?.unwrap_or(f32::NAN))
    }
}

impl MatchReport {
    /// The closest image.
    pub fn best(&self) -> Option<&RankedMatch> {
        self.matches.first()
    }

    /// Serializes the report to a pretty-printed JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Plain-text form: the best path alone, or `distance<TAB>path` per match when
/// more than one was requested.
impl fmt::Display for MatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.matches.as_slice() {
            [] => Ok(()),
            [only] => write!(f, "{}", only.path.display()),
            many => {
                for (i, m) in many.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{:.6}\t{}", m.distance, m.path.display())?;
                }
                Ok(())
            }
        }
    }
}
