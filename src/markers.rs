//! Placeholder markers embedded by the static-render pass.
//!
//! The static-render pass cannot know whether the other passes will produce a
//! partial-hydration script or a bundle stylesheet, so it emits placeholders:
//!
//! - `<script data-sitewright-build-partial-src="/assets/partial.js"></script>`
//! - `<link rel="stylesheet" data-sitewright-build-bundle-href="/assets/bundle.css">`
//! - `<div data-sitewright-build-delivery></div>`
//!
//! Reconciliation decides their final form here. Removed elements leave a
//! blank-line gap so the surrounding markup keeps its line structure.

use regex::Regex;
use std::sync::LazyLock;

pub const PARTIAL_SRC_ATTR: &str = "data-sitewright-build-partial-src=";
pub const BUNDLE_HREF_ATTR: &str = "data-sitewright-build-bundle-href=";

const GAP: &str = "\n\n";

static PARTIAL_SCRIPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<script[^>]*\sdata-sitewright-build-partial-src=[^>]*>.*?</script>")
        .expect("partial script pattern is valid")
});

static BUNDLE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<link[^>]*\sdata-sitewright-build-bundle-href=[^>]*>")
        .expect("bundle link pattern is valid")
});

static DELIVERY_SLOT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<div\s+data-sitewright-build-delivery(?:="")?\s*>\s*</div>"#)
        .expect("delivery slot pattern is valid")
});

/// Does the page contain a partial-hydration root?
pub fn has_partial_root(html: &str, root_attr: &str) -> bool {
    html.contains(root_attr)
}

/// Resolve partial-hydration script placeholders.
pub fn resolve_partial(html: &str, has_partial_js: bool) -> String {
    if has_partial_js {
        html.replace(PARTIAL_SRC_ATTR, "src=")
    } else {
        PARTIAL_SCRIPT.replace_all(html, GAP).into_owned()
    }
}

/// Resolve bundle stylesheet placeholders.
pub fn resolve_bundle(html: &str, has_bundle_css: bool) -> String {
    if has_bundle_css {
        html.replace(BUNDLE_HREF_ATTR, "href=")
    } else {
        BUNDLE_LINK.replace_all(html, GAP).into_owned()
    }
}

pub fn has_delivery_slot(html: &str) -> bool {
    DELIVERY_SLOT.is_match(html)
}

/// Replace every delivery placeholder with `list`.
pub fn fill_delivery(html: &str, list: &str) -> String {
    DELIVERY_SLOT
        .replace_all(html, regex::NoExpand(list))
        .into_owned()
}
