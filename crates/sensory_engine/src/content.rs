//! Extracted page content and the normalization rules every extraction
//! backend goes through.
//!
//! Both the regex extractor and the in-page browser snapshot feed raw
//! strings into [`ContentBuilder`], which owns the limits, the whitespace
//! rules, the empty-text skip for links and URL resolution. Keeping those
//! rules in one place is what keeps the two backends in agreement.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::links::resolve_url;
use crate::preview::clip_chars;

/// Caps applied to every extraction result.
pub mod limits {
    pub const MAX_HEADINGS_PER_LEVEL: usize = 5;
    pub const MAX_HEADING_CHARS: usize = 200;
    pub const MAX_LINKS: usize = 20;
    pub const MAX_LINK_TEXT_CHARS: usize = 100;
    pub const MAX_IMAGES: usize = 10;
    pub const MAX_TEXT_CHARS: usize = 2_000;
}

/// Title reported when the page has none.
pub const NO_TITLE: &str = "No title found";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLink {
    pub url: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageImage {
    pub url: String,
    pub alt: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageStructure {
    pub has_articles: bool,
    pub has_main: bool,
    pub paragraph_count: usize,
    pub div_count: usize,
    pub script_count: usize,
    pub form_count: usize,
    pub table_count: usize,
    /// Heuristic signal of content-bearing regions, not a guarantee.
    pub content_area_score: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedContent {
    pub title: String,
    pub meta_description: String,
    pub headings: Vec<Heading>,
    pub links: Vec<PageLink>,
    pub images: Vec<PageImage>,
    pub text_content: String,
    /// Length in characters of the text before truncation.
    pub text_length: usize,
    pub structure: PageStructure,
}

impl Default for ExtractedContent {
    fn default() -> Self {
        Self {
            title: NO_TITLE.to_string(),
            meta_description: String::new(),
            headings: Vec::new(),
            links: Vec::new(),
            images: Vec::new(),
            text_content: String::new(),
            text_length: 0,
            structure: PageStructure::default(),
        }
    }
}

/// Collapse whitespace runs to a single space and trim both ends.
pub fn normalize_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Accumulates one [`ExtractedContent`] while enforcing the shared rules.
pub struct ContentBuilder {
    base: Option<Url>,
    content: ExtractedContent,
    headings_by_level: [Vec<Heading>; 6],
}

impl ContentBuilder {
    pub fn new(base_url: &str) -> Self {
        Self {
            base: Url::parse(base_url).ok(),
            content: ExtractedContent::default(),
            headings_by_level: Default::default(),
        }
    }

    pub fn title(&mut self, raw: &str) {
        let title = normalize_whitespace(raw);
        self.content.title = if title.is_empty() {
            NO_TITLE.to_string()
        } else {
            title
        };
    }

    pub fn meta_description(&mut self, raw: &str) {
        self.content.meta_description = raw.trim().to_string();
    }

    pub fn heading_level_full(&self, level: u8) -> bool {
        match Self::level_slot(level) {
            Some(slot) => self.headings_by_level[slot].len() >= limits::MAX_HEADINGS_PER_LEVEL,
            None => true,
        }
    }

    /// Returns whether the heading was kept.
    pub fn push_heading(&mut self, level: u8, raw_text: &str) -> bool {
        let Some(slot) = Self::level_slot(level) else {
            return false;
        };
        if self.heading_level_full(level) {
            return false;
        }
        let text = normalize_whitespace(raw_text);
        if text.is_empty() {
            return false;
        }
        self.headings_by_level[slot].push(Heading {
            level,
            text: clip_chars(&text, limits::MAX_HEADING_CHARS).to_string(),
        });
        true
    }

    pub fn links_full(&self) -> bool {
        self.content.links.len() >= limits::MAX_LINKS
    }

    /// Returns whether the link was kept. Links whose text is empty after
    /// normalization are skipped.
    pub fn push_link(&mut self, href: &str, raw_text: &str) -> bool {
        if self.links_full() {
            return false;
        }
        let text = normalize_whitespace(raw_text);
        if text.is_empty() || href.trim().is_empty() {
            return false;
        }
        self.content.links.push(PageLink {
            url: resolve_url(href, self.base.as_ref()),
            text: clip_chars(&text, limits::MAX_LINK_TEXT_CHARS).to_string(),
        });
        true
    }

    pub fn images_full(&self) -> bool {
        self.content.images.len() >= limits::MAX_IMAGES
    }

    /// Returns whether the image was kept. A missing alt is not a reason to skip.
    pub fn push_image(&mut self, src: &str, alt: Option<&str>) -> bool {
        if self.images_full() || src.trim().is_empty() {
            return false;
        }
        self.content.images.push(PageImage {
            url: resolve_url(src, self.base.as_ref()),
            alt: alt.map(str::trim).unwrap_or_default().to_string(),
        });
        true
    }

    pub fn text(&mut self, raw_text: &str) {
        let text = normalize_whitespace(raw_text);
        self.content.text_length = text.chars().count();
        self.content.text_content = clip_chars(&text, limits::MAX_TEXT_CHARS).to_string();
    }

    pub fn structure(&mut self, structure: PageStructure) {
        self.content.structure = structure;
    }

    pub fn finish(mut self) -> ExtractedContent {
        self.content.headings = self.headings_by_level.into_iter().flatten().collect();
        self.content
    }

    fn level_slot(level: u8) -> Option<usize> {
        (1..=6).contains(&level).then(|| usize::from(level - 1))
    }
}
