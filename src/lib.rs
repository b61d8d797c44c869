//! # sitewright
//!
//! A multi-pass static site build pipeline. Several independent compilation
//! passes run over the project's sources; their outputs are reconciled into
//! one deployable file tree; derived images are generated through a
//! persistent, content-addressed cache.
//!
//! # Architecture: Three Stages
//!
//! ```text
//! 1. Orchestrate  sources   →  PassOutputs   (static-render ∥ asset, then partial-hydration)
//! 2. Reconcile    outputs   →  dist/         (pages, canonical assets, markers, write-out)
//! 3. Images       requests  →  dist/ + cache (cached resize + encode)
//! ```
//!
//! Module bundling, page rendering and image decoding are delegated to
//! collaborators behind traits ([`bundler::Bundler`],
//! [`enumerate::PageEnumerator`], [`images::ImageCodec`],
//! [`beautify::Beautifier`]). Each has a production implementation and a
//! recording mock in its tests.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`orchestrate`] | Runs the compilation passes and collects their raw outputs |
//! | [`reconcile`] | Merges pass outputs and pages into the final tree and writes it |
//! | [`images`] | Image requests, cache manifest, codec, and the cached generation run |
//! | [`markers`] | Placeholder rewrite rules for cross-pass markers |
//! | [`delivery`] | The page listing injected into delivery placeholders |
//! | [`bundler`] | Bundler trait, fixed pass specs, external-command bundler |
//! | [`enumerate`] | Static-page enumeration trait and external-command enumerator |
//! | [`beautify`] | Pretty-printing trait and the whitespace formatter |
//! | [`config`] | `sitewright.toml` loading, layering, validation, resolved paths |
//! | [`entry`] | Normalization of entry declarations |
//! | [`types`] | Shared types: build items, payloads, pages |
//! | [`build`] | Composes the three stages |
//! | [`output`] | CLI report formatting |
//! | [`logging`] | `tracing` subscriber setup |
//!
//! # Design Decisions
//!
//! ## Two-Phase Marker Resolution
//!
//! The static-render pass emits placeholder attributes for companions it
//! cannot see (the bundle stylesheet, the partial-hydration script). Whether
//! the bundle exists is decided once over every asset before any page is
//! rewritten; whether a page needs the partial script is decided per page
//! from its own markup. Pages never observe each other's rewrites.
//!
//! ## The Image Cache Is an Accumulator
//!
//! Image tasks run in parallel but never write the manifest. Each returns its
//! new entry; the run merges them and persists the manifest once, so there is
//! no locking and no lost update.

pub mod beautify;
pub mod build;
pub mod bundler;
pub mod config;
pub mod delivery;
pub mod entry;
pub mod enumerate;
pub mod images;
pub mod logging;
pub mod markers;
pub mod orchestrate;
pub mod output;
pub mod reconcile;
pub mod types;
