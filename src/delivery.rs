//! The delivery list: an index of every published page.
//!
//! Pages opt into it by embedding `<div data-sitewright-build-delivery></div>`;
//! reconciliation swaps that placeholder for [`render_list`] over the full
//! page set.

use crate::config::SortBy;
use crate::types::Page;
use maud::{Markup, html};
use regex::Regex;
use std::sync::LazyLock;

static TITLE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("title pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryItem {
    pub title: String,
    pub path: String,
}

/// Build the listing for `pages`.
///
/// The title is the page title, or the `<title>` of its html. `/404` and
/// untitled pages are left out.
pub fn listing(pages: &[Page], sort_by: SortBy) -> Vec<DeliveryItem> {
    let mut items: Vec<DeliveryItem> = pages
        .iter()
        .filter(|page| page.route_path != "/404")
        .filter_map(|page| {
            let title = if page.title.is_empty() {
                title_from_html(&page.html)?
            } else {
                page.title.clone()
            };
            (!title.is_empty()).then(|| DeliveryItem {
                title,
                path: page.route_path.clone(),
            })
        })
        .collect();

    match sort_by {
        SortBy::Path => items.sort_by(|a, b| a.path.cmp(&b.path)),
        SortBy::Title => items.sort_by(|a, b| a.title.cmp(&b.title)),
    }
    items
}

fn title_from_html(html: &str) -> Option<String> {
    TITLE_TAG
        .captures(html)
        .map(|caps| caps[1].trim().to_string())
}

/// Render the listing markup. No items render nothing.
pub fn render_list(items: &[DeliveryItem]) -> Markup {
    if items.is_empty() {
        return html! {};
    }
    html! {
        ul.sitewright-delivery-list {
            @for item in items {
                li.sitewright-delivery-item {
                    a href=(item.path) {
                        span.sitewright-delivery-title { (item.title) }
                        span.sitewright-delivery-path { (item.path) }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Frontmatter;

    fn page(path: &str, title: &str, html: &str) -> Page {
        Page {
            route_path: path.to_string(),
            html_file_name: crate::types::html_path(path),
            html: html.to_string(),
            frontmatter: Frontmatter::default(),
            group: String::new(),
            title: title.to_string(),
        }
    }

    fn pages() -> Vec<Page> {
        vec![
            page("/about", "ABOUT", "<p>about</p>"),
            page("/", "", "<title>HOME</title>"),
            page("/404", "404", "<p>missing</p>"),
        ]
    }

    #[test]
    fn default_sort_is_by_path() {
        let items = listing(&pages(), SortBy::Path);
        assert_eq!(
            items,
            vec![
                DeliveryItem {
                    title: "HOME".into(),
                    path: "/".into()
                },
                DeliveryItem {
                    title: "ABOUT".into(),
                    path: "/about".into()
                },
            ]
        );
    }

    #[test]
    fn sort_by_title() {
        let titles: Vec<String> = listing(&pages(), SortBy::Title)
            .into_iter()
            .map(|i| i.title)
            .collect();
        assert_eq!(titles, vec!["ABOUT", "HOME"]);
    }

    #[test]
    fn untitled_pages_are_skipped() {
        let items = listing(&[page("/x", "", "<p>no title</p>")], SortBy::Path);
        assert!(items.is_empty());
        let items = listing(&[page("/y", "", "<title>  </title>")], SortBy::Path);
        assert!(items.is_empty());
    }

    #[test]
    fn title_tag_with_attributes_and_newlines() {
        let html = "<head><title lang=\"en\">\n  Docs\n</title></head>";
        assert_eq!(title_from_html(html), Some("Docs".to_string()));
    }

    #[test]
    fn empty_listing_renders_nothing() {
        assert_eq!(render_list(&[]).into_string(), "");
    }

    #[test]
    fn render_list_escapes_titles() {
        let items = vec![DeliveryItem {
            title: "Q&A".into(),
            path: "/qa".into(),
        }];
        let html = render_list(&items).into_string();
        assert!(html.starts_with("<ul class=\"sitewright-delivery-list\">"));
        assert!(html.contains("<a href=\"/qa\">"));
        assert!(html.contains("Q&amp;A"));
    }
}
