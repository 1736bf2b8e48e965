use url::Url;

/// Resolve an `href`/`src` against the page URL.
///
/// A reference that already parses as an absolute URL is returned exactly as
/// written (trimmed). Relative references are joined onto `base`; when there
/// is no usable base the trimmed reference is returned unchanged.
pub fn resolve_url(reference: &str, base: Option<&Url>) -> String {
    let trimmed = reference.trim();
    if Url::parse(trimmed).is_ok() {
        return trimmed.to_string();
    }
    base.and_then(|base| base.join(trimmed).ok())
        .map(String::from)
        .unwrap_or_else(|| trimmed.to_string())
}
