use url::Url;

/// Resolve a discovered icon href into an absolute URL, keeping only
/// origin + path. Query strings and fragments are cache-busting noise for a
/// thumbnail, so they are dropped. Relative hrefs resolve against the page.
///
/// Returns `None` on anything malformed; icon discovery is best-effort and
/// never fails a check.
pub fn canonical_icon_url(page_url: &str, href: &str) -> Option<String> {
    let base = Url::parse(page_url).ok()?;
    let resolved = base.join(href).ok()?;
    Some(format!(
        "{}{}",
        resolved.origin().ascii_serialization(),
        resolved.path()
    ))
}
