use serde::Deserialize;
use serde_json::Value;

use crate::content::{ContentBuilder, ExtractedContent, PageStructure};

/// In-page extraction script; returns a [`PageSnapshot`] as JSON.
pub(crate) const PAGE_SNAPSHOT_SCRIPT: &str = include_str!("page_snapshot.js");

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SnapshotHeading {
    level: u8,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SnapshotLink {
    #[serde(default)]
    href: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SnapshotImage {
    #[serde(default)]
    src: String,
    alt: Option<String>,
}

/// Raw, unlimited page data as the in-page script sees it. Normalization
/// happens on the Rust side through [`ContentBuilder`], the same path the
/// regex extractor uses.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PageSnapshot {
    pub url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    meta_description: String,
    #[serde(default)]
    headings: Vec<SnapshotHeading>,
    #[serde(default)]
    links: Vec<SnapshotLink>,
    #[serde(default)]
    images: Vec<SnapshotImage>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    structure: PageStructure,
    #[serde(default)]
    pub performance: Value,
}

impl PageSnapshot {
    pub(crate) fn into_content(self, fallback_base: &str) -> ExtractedContent {
        let base = if self.url.is_empty() || self.url == "about:blank" {
            fallback_base
        } else {
            self.url.as_str()
        };
        let mut builder = ContentBuilder::new(base);
        builder.title(&self.title);
        builder.meta_description(&self.meta_description);
        for heading in &self.headings {
            builder.push_heading(heading.level, &heading.text);
        }
        for link in &self.links {
            if builder.links_full() {
                break;
            }
            builder.push_link(&link.href, &link.text);
        }
        for image in &self.images {
            if builder.images_full() {
                break;
            }
            builder.push_image(&image.src, image.alt.as_deref());
        }
        builder.text(&self.text);
        builder.structure(self.structure);
        builder.finish()
    }
}
