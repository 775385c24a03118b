//! Fill gaps in one result from another.

use crate::output::{is_blank, ExtractedInfo};
use crate::pipeline::normalize::normalize_date;

/// Return `base` with missing core fields taken from `extra`.
///
/// * `date` is replaced only when base's does not normalize and extra's does.
/// * `date_basis`, `provider`, `document_type` and `title` are filled only
///   when blank in base and non-blank in extra.
/// * `confidence` becomes the larger of the two (missing counts as 0).
///
/// `author`, `subject` and `keywords` always come from base.
pub fn merge_fill_missing(base: &ExtractedInfo, extra: &ExtractedInfo) -> ExtractedInfo {
    let mut merged = base.clone();

    if normalize_date(base.date.as_deref()).is_none()
        && normalize_date(extra.date.as_deref()).is_some()
    {
        merged.date = extra.date.clone();
    }

    if merged.date_basis.is_none() && extra.date_basis.is_some() {
        merged.date_basis = extra.date_basis;
    }

    for (slot, other) in [
        (&mut merged.provider, &extra.provider),
        (&mut merged.document_type, &extra.document_type),
        (&mut merged.title, &extra.title),
    ] {
        if is_blank(slot.as_deref()) && !is_blank(other.as_deref()) {
            *slot = other.clone();
        }
    }

    merged.confidence = Some(base.confidence_or_zero().max(extra.confidence_or_zero()));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::DateBasis;

    #[test]
    fn fills_only_missing_fields() {
        let base = ExtractedInfo {
            date: Some("sometime".into()),
            provider: Some("Acme".into()),
            document_type: Some(" ".into()),
            author: Some("Base Author".into()),
            confidence: Some(0.4),
            ..Default::default()
        };
        let extra = ExtractedInfo {
            date: Some("2024-03-01".into()),
            date_basis: Some(DateBasis::Service),
            provider: Some("Other".into()),
            document_type: Some("Invoice".into()),
            title: Some("March invoice".into()),
            author: Some("Extra Author".into()),
            subject: Some("extra subject".into()),
            confidence: Some(0.9),
            ..Default::default()
        };
        let m = merge_fill_missing(&base, &extra);
        assert_eq!(m.date.as_deref(), Some("2024-03-01"));
        assert_eq!(m.date_basis, Some(DateBasis::Service));
        assert_eq!(m.provider.as_deref(), Some("Acme"));
        assert_eq!(m.document_type.as_deref(), Some("Invoice"));
        assert_eq!(m.title.as_deref(), Some("March invoice"));
        assert_eq!(m.author.as_deref(), Some("Base Author"));
        assert_eq!(m.subject, None);
        assert_eq!(m.confidence, Some(0.9));
    }

    #[test]
    fn valid_base_date_is_kept() {
        let base = ExtractedInfo {
            date: Some("2024-01-01".into()),
            ..Default::default()
        };
        let extra = ExtractedInfo {
            date: Some("2025-01-01".into()),
            ..Default::default()
        };
        let m = merge_fill_missing(&base, &extra);
        assert_eq!(m.date.as_deref(), Some("2024-01-01"));
        assert_eq!(m.confidence, Some(0.0));
    }

    #[test]
    fn invalid_extra_date_does_not_replace() {
        let base = ExtractedInfo {
            date: Some("garbage".into()),
            confidence: Some(0.7),
            ..Default::default()
        };
        let extra = ExtractedInfo {
            date: Some("2024-13-01".into()),
            ..Default::default()
        };
        let m = merge_fill_missing(&base, &extra);
        assert_eq!(m.date.as_deref(), Some("garbage"));
        assert_eq!(m.confidence, Some(0.7));
    }
}
