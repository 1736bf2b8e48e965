use std::sync::LazyLock;

use html_escape::decode_html_entities;
use regex::Regex;

use crate::content::{normalize_whitespace, ContentBuilder, ExtractedContent, PageStructure};

/// Attribute section of a tag. Quoted values may contain `>`.
const TAG_ATTRS: &str = r#"(?:[^>"']|"[^"]*"|'[^']*')*"#;

fn tag_regex(template: &str) -> Regex {
    Regex::new(&template.replace("ATTRS", TAG_ATTRS)).expect("Failed to compile tag regex")
}

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| tag_regex(r"(?is)<title\bATTRS>(.*?)</title\s*>"));
static META_RE: LazyLock<Regex> = LazyLock::new(|| tag_regex(r"(?is)<meta\b(ATTRS)>"));
static HEADING_RES: LazyLock<Vec<(u8, Regex)>> = LazyLock::new(|| {
    (1..=6u8)
        .map(|level| {
            let pattern = format!(r"(?is)<h{level}\bATTRS>(.*?)</h{level}\s*>");
            (level, tag_regex(&pattern))
        })
        .collect()
});
static ANCHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| tag_regex(r"(?is)<a\b(ATTRS)>(.*?)</a\s*>"));
static IMG_RE: LazyLock<Regex> = LazyLock::new(|| tag_regex(r"(?is)<img\b(ATTRS)>"));
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#)
        .expect("Failed to compile attribute regex")
});
static SCRIPT_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| tag_regex(r"(?is)<script\bATTRS>.*?</script\s*>"));
static STYLE_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| tag_regex(r"(?is)<style\bATTRS>.*?</style\s*>"));
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| tag_regex(r"(?s)<ATTRS>"));
static CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)\sclass\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#)
        .expect("Failed to compile class regex")
});

struct OpeningTag {
    article: Regex,
    main: Regex,
    p: Regex,
    div: Regex,
    script: Regex,
    form: Regex,
    table: Regex,
}

static OPENING_TAGS: LazyLock<OpeningTag> = LazyLock::new(|| {
    let tag = |name: &str| {
        Regex::new(&format!(r"(?i)<{name}\b")).expect("Failed to compile opening tag regex")
    };
    OpeningTag {
        article: tag("article"),
        main: tag("main"),
        p: tag("p"),
        div: tag("div"),
        script: tag("script"),
        form: tag("form"),
        table: tag("table"),
    }
});

const CONTENT_CLASS_HINTS: [&str; 4] = ["content", "article", "post", "main"];

pub trait Extractor: Send + Sync {
    fn extract(&self, html: &str, base_url: &str) -> ExtractedContent;
}

/// Pattern-matching extractor working on the raw HTML string.
///
/// No DOM is built: each field has its own pattern. Malformed markup never
/// causes an error, an unclosed `<title>` or `<hN>` simply does not match.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlExtractor;

impl Extractor for HtmlExtractor {
    fn extract(&self, html: &str, base_url: &str) -> ExtractedContent {
        let mut builder = ContentBuilder::new(base_url);

        let title = TITLE_RE
            .captures(html)
            .and_then(|caps| caps.get(1))
            .map(|m| strip_tags(m.as_str()))
            .unwrap_or_default();
        builder.title(&title);
        builder.meta_description(&meta_description(html).unwrap_or_default());

        for (level, re) in HEADING_RES.iter() {
            for caps in re.captures_iter(html) {
                if builder.heading_level_full(*level) {
                    break;
                }
                if let Some(inner) = caps.get(1) {
                    builder.push_heading(*level, &strip_tags(inner.as_str()));
                }
            }
        }

        for caps in ANCHOR_RE.captures_iter(html) {
            if builder.links_full() {
                break;
            }
            let attrs = caps.get(1).map_or("", |m| m.as_str());
            let Some(href) = attribute(attrs, "href") else {
                continue;
            };
            let text = caps.get(2).map(|m| strip_tags(m.as_str())).unwrap_or_default();
            builder.push_link(&href, &text);
        }

        for caps in IMG_RE.captures_iter(html) {
            if builder.images_full() {
                break;
            }
            let attrs = caps.get(1).map_or("", |m| m.as_str());
            if let Some(src) = attribute(attrs, "src") {
                builder.push_image(&src, attribute(attrs, "alt").as_deref());
            }
        }

        builder.text(&visible_text(html));
        builder.structure(analyze_structure(html));
        builder.finish()
    }
}

/// Convenience wrapper around [`HtmlExtractor`].
pub fn extract_content(html: &str, base_url: &str) -> ExtractedContent {
    HtmlExtractor.extract(html, base_url)
}

/// Text with `<script>`/`<style>` blocks removed, every other tag replaced
/// by a space and whitespace collapsed. Not truncated.
pub fn visible_text(html: &str) -> String {
    let without_scripts = SCRIPT_BLOCK_RE.replace_all(html, " ");
    let without_styles = STYLE_BLOCK_RE.replace_all(&without_scripts, " ");
    strip_tags(&without_styles)
}

pub fn analyze_structure(html: &str) -> PageStructure {
    let tags = &*OPENING_TAGS;
    PageStructure {
        has_articles: tags.article.is_match(html),
        has_main: tags.main.is_match(html),
        paragraph_count: tags.p.find_iter(html).count(),
        div_count: tags.div.find_iter(html).count(),
        script_count: tags.script.find_iter(html).count(),
        form_count: tags.form.find_iter(html).count(),
        table_count: tags.table.find_iter(html).count(),
        content_area_score: content_area_score(html),
    }
}

/// One point per (class attribute, hint) pair where the attribute value
/// mentions the hint.
fn content_area_score(html: &str) -> usize {
    CLASS_RE
        .captures_iter(html)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)))
        .map(|value| {
            let value = value.as_str().to_ascii_lowercase();
            CONTENT_CLASS_HINTS
                .iter()
                .filter(|hint| value.contains(*hint))
                .count()
        })
        .sum()
}

fn meta_description(html: &str) -> Option<String> {
    META_RE.captures_iter(html).find_map(|caps| {
        let attrs = caps.get(1)?.as_str();
        let name = attribute(attrs, "name")?;
        if !name.trim().eq_ignore_ascii_case("description") {
            return None;
        }
        attribute(attrs, "content")
    })
}

/// Value of the first attribute called `name` (case-insensitive) in the
/// attribute section of a tag, with character references decoded.
fn attribute(attrs: &str, name: &str) -> Option<String> {
    ATTR_RE.captures_iter(attrs).find_map(|caps| {
        let key = caps.get(1)?.as_str();
        if !key.eq_ignore_ascii_case(name) {
            return None;
        }
        caps.get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| decode_html_entities(m.as_str()).into_owned())
    })
}

/// Tags become spaces, character references are decoded, whitespace collapses.
fn strip_tags(fragment: &str) -> String {
    let replaced = TAG_RE.replace_all(fragment, " ");
    normalize_whitespace(&decode_html_entities(&replaced))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_lookup_handles_quotes_and_case() {
        let attrs = r#" CLASS='x' data-href="no" HREF=/plain alt="a b""#;
        assert_eq!(attribute(attrs, "href").as_deref(), Some("/plain"));
        assert_eq!(attribute(attrs, "class").as_deref(), Some("x"));
        assert_eq!(attribute(attrs, "alt").as_deref(), Some("a b"));
        assert_eq!(attribute(attrs, "src"), None);
    }

    #[test]
    fn meta_description_does_not_assume_attribute_order() {
        let html = r#"<meta content="About us" name="Description">"#;
        assert_eq!(meta_description(html).as_deref(), Some("About us"));
    }

    #[test]
    fn first_meta_description_wins() {
        let html = r#"<meta name="keywords" content="k"><meta name="description" content="one"><meta name="description" content="two">"#;
        assert_eq!(meta_description(html).as_deref(), Some("one"));
    }

    #[test]
    fn content_area_score_counts_hints_per_class_attribute() {
        let html = r#"<div class="main-content"></div><section class='post'></section><div class="nav"></div>"#;
        assert_eq!(content_area_score(html), 3);
    }

    #[test]
    fn visible_text_drops_multiline_script_and_style() {
        let html = "<p>a</p><SCRIPT type=\"x\">\nvar x = '<p>';\n</script><style>\np{}\n</STYLE><p>b</p>";
        assert_eq!(visible_text(html), "a b");
    }

    #[test]
    fn opening_tag_counts_do_not_confuse_similar_names() {
        let structure = analyze_structure("<p>x</p><param><pre></pre><P class=a>y</P>");
        assert_eq!(structure.paragraph_count, 2);
    }
}
