//! Image generation requests and their option types.
//!
//! The rendering layer records one [`ImageRequest`] per derived image in
//! `<temp_dir>/images.json`, keyed by output file name:
//!
//! ```json
//! {
//!   "images/hero-800.webp": {
//!     "input": "/abs/src/assets/hero.jpg",
//!     "width": 800,
//!     "resize": "cover",
//!     "format": "webp",
//!     "formatOptions": { "webp": { "lossless": true } }
//!   }
//! }
//! ```
//!
//! ## Types
//!
//! - [`Quality`]: lossy quality (1-100, default 80). Clamped on construction
//!   and on deserialization.
//! - [`ResizeStrategy`]: how the source is fitted into the target box.
//! - [`FormatOptions`]: per-format encoder options; only the block of the
//!   selected [`ImageFormat`] is used.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct Quality(u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

impl From<u32> for Quality {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<Quality> for u32 {
    fn from(q: Quality) -> Self {
        q.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Jpg,
    Png,
    Webp,
    Avif,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Webp => "webp",
            ImageFormat::Avif => "avif",
        }
    }
}

/// How the source is fitted into `width` x `height`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeStrategy {
    /// Fill the box, center-cropping the overflow.
    #[default]
    Cover,
    /// Fit inside the box, preserving aspect ratio.
    Contain,
    /// Stretch to exactly the box.
    Fill,
    /// Same as `Contain`.
    Inside,
    /// Cover the box without cropping; one side may exceed it.
    Outside,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JpgOptions {
    pub quality: Quality,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct PngOptions {
    /// 0 (fastest) to 9 (smallest).
    pub compression_level: u8,
}

impl Default for PngOptions {
    fn default() -> Self {
        Self {
            compression_level: 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WebpOptions {
    pub lossless: bool,
}

impl Default for WebpOptions {
    fn default() -> Self {
        Self { lossless: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AvifOptions {
    pub quality: Quality,
    /// Encoder speed, 1 (slowest) to 10 (fastest).
    pub speed: u8,
}

impl Default for AvifOptions {
    fn default() -> Self {
        Self {
            quality: Quality::default(),
            speed: 6,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    pub jpg: JpgOptions,
    pub png: PngOptions,
    pub webp: WebpOptions,
    pub avif: AvifOptions,
}

/// One derived image to produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRequest {
    pub input: PathBuf,
    /// Target width. `None` derives it from `height` and the source aspect.
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub resize: ResizeStrategy,
    #[serde(default)]
    pub format: ImageFormat,
    #[serde(default)]
    pub format_options: FormatOptions,
}

/// The fields of a request that affect the produced bytes, in a fixed order.
#[derive(Serialize)]
struct OptionsKey<'a> {
    width: Option<u32>,
    height: Option<u32>,
    resize: ResizeStrategy,
    format: ImageFormat,
    options: SelectedOptions<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum SelectedOptions<'a> {
    Jpg(&'a JpgOptions),
    Png(&'a PngOptions),
    Webp(&'a WebpOptions),
    Avif(&'a AvifOptions),
}

impl ImageRequest {
    /// SHA-256 (hex) of the canonical JSON of the generation options.
    ///
    /// Only the selected format's options take part, so editing the options
    /// of an unused format keeps the cache warm. The source path does not
    /// take part either: the content hash covers the source.
    pub fn options_hash(&self) -> String {
        let opts = &self.format_options;
        let key = OptionsKey {
            width: self.width,
            height: self.height,
            resize: self.resize,
            format: self.format,
            options: match self.format {
                ImageFormat::Jpg => SelectedOptions::Jpg(&opts.jpg),
                ImageFormat::Png => SelectedOptions::Png(&opts.png),
                ImageFormat::Webp => SelectedOptions::Webp(&opts.webp),
                ImageFormat::Avif => SelectedOptions::Avif(&opts.avif),
            },
        };
        // Serializing plain structs of integers, bools and enums cannot fail.
        let json = serde_json::to_vec(&key).unwrap_or_default();
        hash_bytes(&json)
    }
}

/// SHA-256 of a byte slice, returned as a hex string.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// The request file: output file name → request.
pub type ImageRequests = BTreeMap<String, ImageRequest>;

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ImageRequest {
        ImageRequest {
            input: "/src/hero.jpg".into(),
            width: Some(800),
            height: Some(600),
            resize: ResizeStrategy::Cover,
            format: ImageFormat::Webp,
            format_options: FormatOptions::default(),
        }
    }

    #[test]
    fn quality_clamped() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(150).value(), 100);
        let q: Quality = serde_json::from_str("250").unwrap();
        assert_eq!(q.value(), 100);
    }

    #[test]
    fn request_parses_with_defaults() {
        let req: ImageRequest = serde_json::from_str(r#"{"input": "a.png", "width": 320}"#).unwrap();
        assert_eq!(req.width, Some(320));
        assert_eq!(req.height, None);
        assert_eq!(req.resize, ResizeStrategy::Cover);
        assert_eq!(req.format, ImageFormat::Jpg);
        assert_eq!(req.format_options.avif.speed, 6);
    }

    #[test]
    fn request_parses_format_options() {
        let req: ImageRequest = serde_json::from_str(
            r#"{"input": "a.png", "format": "png", "resize": "inside",
                "formatOptions": {"png": {"compressionLevel": 9}}}"#,
        )
        .unwrap();
        assert_eq!(req.format, ImageFormat::Png);
        assert_eq!(req.resize, ResizeStrategy::Inside);
        assert_eq!(req.format_options.png.compression_level, 9);
    }

    #[test]
    fn options_hash_is_stable() {
        assert_eq!(request().options_hash(), request().options_hash());
        assert_eq!(request().options_hash().len(), 64);
    }

    #[test]
    fn options_hash_changes_with_size_and_format() {
        let base = request().options_hash();
        let mut wider = request();
        wider.width = Some(801);
        assert_ne!(wider.options_hash(), base);
        let mut avif = request();
        avif.format = ImageFormat::Avif;
        assert_ne!(avif.options_hash(), base);
        let mut fill = request();
        fill.resize = ResizeStrategy::Fill;
        assert_ne!(fill.options_hash(), base);
    }

    #[test]
    fn options_hash_ignores_unselected_format_options() {
        let base = request().options_hash();
        let mut other = request();
        other.format_options.jpg.quality = Quality::new(10);
        other.format_options.avif.speed = 1;
        assert_eq!(other.options_hash(), base);
        other.format_options.webp.lossless = false;
        assert_ne!(other.options_hash(), base);
    }

    #[test]
    fn options_hash_ignores_input_path() {
        let mut moved = request();
        moved.input = "/elsewhere/hero.jpg".into();
        assert_eq!(moved.options_hash(), request().options_hash());
    }

    #[test]
    fn hash_bytes_known_value() {
        assert_eq!(
            hash_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
