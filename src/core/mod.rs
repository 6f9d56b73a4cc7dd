//! Core functionality: embedding, cataloguing and matching images

/// Catalog of embeddings and the builder that fills it.
pub mod catalog;
/// Finds the image files that make up a dataset.
pub mod dataset;
/// Maps images to fixed-length feature vectors.
pub mod embeddings;
/// Content hashing for cache validation.
pub mod hash;
pub mod matcher;
/// Side-by-side rendering of a query and its match.
pub mod render;
