use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::core::embeddings::{Embedder, Embedding};
use crate::core::hash::compute_file_hash;
use crate::core::matcher::{self, Neighbor};
use crate::error::{MatchError, Result};
use crate::models::cache::{CachedEmbedding, CatalogCache};

/// One identifier and its embedding
#[derive(Clone, Debug, PartialEq)]
pub struct CatalogEntry {
    /// Identifier, usually the image path
    pub id: PathBuf,
    /// Embedding of the image
    pub embedding: Embedding,
}

/// Insertion-ordered mapping from identifier to embedding
///
/// All embeddings share the dimension of the first one inserted.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<PathBuf, usize>,
}

impl Catalog {
    /// An empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry, replacing the embedding in place if `id` is already present
    pub fn insert<P: Into<PathBuf>>(&mut self, id: P, embedding: Embedding) -> Result<()> {
        if let Some(expected) = self.dimension() {
            if embedding.len() != expected {
                return Err(MatchError::DimensionMismatch {
                    expected,
                    found: embedding.len(),
                });
            }
        }

        let id = id.into();
        match self.index.get(&id) {
            Some(&position) => self.entries[position].embedding = embedding,
            None => {
                self.index.insert(id.clone(), self.entries.len());
                self.entries.push(CatalogEntry { id, embedding });
            }
        }
        Ok(())
    }

    /// Embedding stored under `id`
    pub fn get(&self, id: &Path) -> Option<&Embedding> {
        self.index.get(id).map(|&i| &self.entries[i].embedding)
    }

    /// Entries in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, CatalogEntry> {
        self.entries.iter()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Shared embedding length, `None` while empty
    pub fn dimension(&self) -> Option<usize> {
        self.entries.first().map(|e| e.embedding.len())
    }

    /// Closest entry to `query`; see [`matcher::nearest`]
    pub fn nearest(&self, query: &Embedding) -> Result<Neighbor<'_>> {
        matcher::nearest(query, self)
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a CatalogEntry;
    type IntoIter = std::slice::Iter<'a, CatalogEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A freshly built catalog and what it cost
#[derive(Debug)]
pub struct BuiltCatalog {
    /// The catalog, in the order the paths were given
    pub catalog: Catalog,
    /// Cache describing exactly the files in `catalog`, when caching was enabled
    pub cache: Option<CatalogCache>,
    /// Entries taken from the previous cache
    pub reused: usize,
    /// Entries computed by the embedder
    pub embedded: usize,
}

/// Embeds a list of files into a [`Catalog`]
///
/// Files are processed one at a time in the given order. The first file the
/// embedder rejects aborts the build.
pub struct CatalogBuilder<'e> {
    embedder: &'e dyn Embedder,
    // Previous cache entries keyed by path.
    previous: HashMap<PathBuf, CachedEmbedding>,
    refresh: bool,
}

impl std::fmt::Debug for CatalogBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogBuilder")
            .field("embedder", &self.embedder.name())
            .field("cached", &self.previous.len())
            .field("refresh", &self.refresh)
            .finish()
    }
}

impl<'e> CatalogBuilder<'e> {
    /// Builder that runs every file through `embedder`
    pub fn new(embedder: &'e dyn Embedder) -> Self {
        Self {
            embedder,
            previous: HashMap::new(),
            refresh: false,
        }
    }

    /// Hash every file and return a fresh [`CatalogCache`] with the catalog
    pub fn refresh_cache(mut self) -> Self {
        self.refresh = true;
        self
    }

    /// Reuse embeddings from `cache` for files whose contents have not changed
    ///
    /// Implies [`refresh_cache`](Self::refresh_cache). A cache written by a
    /// different embedder is ignored.
    pub fn with_cache(mut self, cache: CatalogCache) -> Self {
        self.refresh = true;
        if cache.is_compatible(self.embedder.name(), self.embedder.dimension()) {
            self.previous = cache.into_index();
        } else {
            log::warn!(
                "Ignoring embedding cache from '{}' ({} dims); current embedder is '{}' ({} dims)",
                cache.embedder,
                cache.dimension,
                self.embedder.name(),
                self.embedder.dimension()
            );
        }
        self
    }

    /// Embed `paths` in order
    pub fn build(self, paths: &[PathBuf]) -> Result<BuiltCatalog> {
        let mut catalog = Catalog::new();
        let mut cache = self
            .refresh
            .then(|| CatalogCache::new(self.embedder.name(), self.embedder.dimension()));
        let mut reused = 0;
        let mut embedded = 0;

        for (i, path) in paths.iter().enumerate() {
            let hash = if cache.is_some() {
                Some(compute_file_hash(path).map_err(|e| MatchError::embedding(path, e))?)
            } else {
                None
            };

            let cached = hash.as_deref().and_then(|hash| {
                self.previous.get(path).filter(|e| {
                    e.sha3_256_hash == hash && e.embedding.len() == self.embedder.dimension()
                })
            });

            let embedding = match cached {
                Some(entry) => {
                    reused += 1;
                    Embedding::from(entry.embedding.clone())
                }
                None => {
                    log::debug!("Embedding {} ({}/{})", path.display(), i + 1, paths.len());
                    embedded += 1;
                    self.embedder.embed(path)?
                }
            };

            if let (Some(cache), Some(hash)) = (cache.as_mut(), hash) {
                cache.entries.push(CachedEmbedding {
                    path: path.clone(),
                    sha3_256_hash: hash,
                    embedding: embedding.to_vec(),
                });
            }
            catalog.insert(path.clone(), embedding)?;
        }

        log::info!(
            "Catalog ready: {} images ({} embedded, {} from cache)",
            catalog.len(),
            embedded,
            reused
        );

        Ok(BuiltCatalog {
            catalog,
            cache,
            reused,
            embedded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;
    use ndarray::arr1;
    use std::cell::Cell;
    use std::io::Write;
    use tempfile::TempDir;

    /// Embeds a file as the first byte of its contents, counting calls
    struct ByteEmbedder {
        calls: Cell<usize>,
    }

    impl ByteEmbedder {
        fn new() -> Self {
            Self { calls: Cell::new(0) }
        }
    }

    impl Embedder for ByteEmbedder {
        fn name(&self) -> &str {
            "byte"
        }

        fn dimension(&self) -> usize {
            1
        }

        fn embed_image(&self, _img: &DynamicImage) -> Result<Embedding> {
            unreachable!("ByteEmbedder reads raw files")
        }

        fn embed(&self, path: &Path) -> Result<Embedding> {
            self.calls.set(self.calls.get() + 1);
            let data = std::fs::read(path).map_err(|e| MatchError::embedding(path, e))?;
            match data.first() {
                Some(&b) if b != b'!' => Ok(arr1(&[b as f32])),
                _ => Err(MatchError::embedding(path, "unreadable")),
            }
        }
    }

    fn write_files(dir: &TempDir, files: &[(&str, &[u8])]) -> Vec<PathBuf> {
        files
            .iter()
            .map(|(name, contents)| {
                let path = dir.path().join(name);
                let mut file = std::fs::File::create(&path).unwrap();
                file.write_all(contents).unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn test_insert_keeps_order_and_replaces_in_place() {
        let mut catalog = Catalog::new();
        catalog.insert("b", arr1(&[1.0, 1.0])).unwrap();
        catalog.insert("a", arr1(&[0.0, 0.0])).unwrap();
        catalog.insert("b", arr1(&[2.0, 2.0])).unwrap();

        let ids: Vec<&Path> = catalog.iter().map(|e| e.id.as_path()).collect();
        assert_eq!(ids, vec![Path::new("b"), Path::new("a")]);
        assert_eq!(catalog.get(Path::new("b")), Some(&arr1(&[2.0, 2.0])));
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.dimension(), Some(2));
    }

    #[test]
    fn test_insert_rejects_other_dimension() {
        let mut catalog = Catalog::new();
        catalog.insert("a", arr1(&[0.0, 0.0])).unwrap();
        assert!(matches!(
            catalog.insert("b", arr1(&[0.0])),
            Err(MatchError::DimensionMismatch { expected: 2, found: 1 })
        ));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_catalog_nearest() {
        let mut catalog = Catalog::new();
        catalog.insert("near", arr1(&[1.0])).unwrap();
        catalog.insert("far", arr1(&[9.0])).unwrap();
        assert_eq!(catalog.nearest(&arr1(&[0.0])).unwrap().id, Path::new("near"));
    }

    #[test]
    fn test_build_embeds_every_file_in_order() {
        let dir = TempDir::new().unwrap();
        let paths = write_files(&dir, &[("z", b"\x03"), ("a", b"\x01"), ("m", b"\x02")]);

        let embedder = ByteEmbedder::new();
        let built = CatalogBuilder::new(&embedder)
            .refresh_cache()
            .build(&paths)
            .unwrap();

        assert_eq!(embedder.calls.get(), 3);
        assert_eq!(built.embedded, 3);
        assert_eq!(built.reused, 0);
        let ids: Vec<&PathBuf> = built.catalog.iter().map(|e| &e.id).collect();
        assert_eq!(ids, paths.iter().collect::<Vec<_>>());

        let cache = built.cache.unwrap();
        assert_eq!(cache.entries.len(), 3);
        assert_eq!(cache.embedder, "byte");
        assert_eq!(cache.entries[0].sha3_256_hash, compute_file_hash(&paths[0]).unwrap());
    }

    #[test]
    fn test_build_without_cache_skips_hashing() {
        let dir = TempDir::new().unwrap();
        let paths = write_files(&dir, &[("a", b"\x01"), ("b", b"\x02")]);

        let embedder = ByteEmbedder::new();
        let built = CatalogBuilder::new(&embedder).build(&paths).unwrap();

        assert!(built.cache.is_none());
        assert_eq!(built.catalog.len(), 2);
        assert_eq!(built.embedded, 2);
    }

    #[test]
    fn test_build_propagates_first_failure() {
        let dir = TempDir::new().unwrap();
        let paths = write_files(&dir, &[("ok", b"\x01"), ("bad", b"!"), ("never", b"\x02")]);

        let embedder = ByteEmbedder::new();
        match CatalogBuilder::new(&embedder).build(&paths) {
            Err(MatchError::Embedding { path, .. }) => assert_eq!(path, paths[1]),
            other => panic!("expected embedding error, got {:?}", other),
        }
        assert_eq!(embedder.calls.get(), 2);
    }

    #[test]
    fn test_build_missing_file_is_embedding_failure() {
        let embedder = ByteEmbedder::new();
        let missing = vec![PathBuf::from("/nonexistent/imagematch/file.jpg")];
        assert!(matches!(
            CatalogBuilder::new(&embedder).build(&missing),
            Err(MatchError::Embedding { .. })
        ));
    }

    #[test]
    fn test_build_reuses_cache_for_unchanged_files() {
        let dir = TempDir::new().unwrap();
        let paths = write_files(&dir, &[("one", b"\x01"), ("two", b"\x02")]);

        let embedder = ByteEmbedder::new();
        let first = CatalogBuilder::new(&embedder)
            .refresh_cache()
            .build(&paths)
            .unwrap();

        // Change one file; only that one should be embedded again.
        std::fs::write(&paths[1], b"\x07").unwrap();
        let second = CatalogBuilder::new(&embedder)
            .with_cache(first.cache.unwrap())
            .build(&paths)
            .unwrap();

        assert_eq!(second.reused, 1);
        assert_eq!(second.embedded, 1);
        assert_eq!(embedder.calls.get(), 3);
        assert_eq!(second.catalog.get(&paths[1]), Some(&arr1(&[7.0])));
    }

    #[test]
    fn test_build_ignores_cache_from_other_embedder() {
        let dir = TempDir::new().unwrap();
        let paths = write_files(&dir, &[("one", b"\x01")]);

        let mut foreign = CatalogCache::new("pixel-16", 768);
        foreign.entries.push(CachedEmbedding {
            path: paths[0].clone(),
            sha3_256_hash: compute_file_hash(&paths[0]).unwrap(),
            embedding: vec![0.0; 768],
        });

        let embedder = ByteEmbedder::new();
        let built = CatalogBuilder::new(&embedder)
            .with_cache(foreign)
            .build(&paths)
            .unwrap();
        assert_eq!(built.reused, 0);
        assert_eq!(embedder.calls.get(), 1);
    }
}
