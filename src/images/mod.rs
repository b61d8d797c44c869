//! Derived image generation with a persistent, content-addressed cache.
//!
//! The module is split into:
//! - **Parameters**: [`ImageRequest`] and its option types, plus the options hash
//! - **Cache**: [`CacheManifest`] persisted at `<cache_dir>/cache.json`
//! - **Codec**: [`ImageCodec`] trait + [`RustCodec`]
//! - **Pipeline**: [`generate`], the parallel cached run over all requests

pub mod cache;
pub mod codec;
pub mod params;
pub mod pipeline;

pub use cache::{CacheEntry, CacheManifest, CacheStats};
pub use codec::{CodecError, ImageCodec, RustCodec};
pub use params::{ImageFormat, ImageRequest, ImageRequests, Quality, ResizeStrategy};
pub use pipeline::{ImageError, ImageOutcome, ImageReport, ImageStatus, generate, load_requests};
