use crate::types::ScrapeResultKind;

/// Classify extracted content against the watch's baseline text.
///
/// Comparison is substring containment over normalized text, not equality:
/// the watched phrase may be surrounded by other text that legitimately
/// shifts between loads, and the check only cares whether the phrase itself
/// is still there.
pub fn classify(extracted: Option<&str>, baseline: &str, initial: bool) -> ScrapeResultKind {
    let Some(extracted) = extracted else {
        // Element present but content extraction returned nothing.
        return if initial {
            ScrapeResultKind::TextNotFound
        } else {
            ScrapeResultKind::Change
        };
    };

    if normalize(extracted).contains(&normalize(baseline)) {
        ScrapeResultKind::NoChange
    } else {
        ScrapeResultKind::Change
    }
}

/// Lowercase and trim surrounding whitespace before comparison.
fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}
