// URLs, slugs and QR targets for a contact record

use serde::Serialize;

use crate::db::ContactRecord;
use crate::resolver::{select_source, CardSource};
use crate::vcard::normalize_vcard_text;

/// Filename stem used when a record has nothing slug-worthy
pub const FALLBACK_SLUG: &str = "contact";

/// Lowercase ASCII slug: every run of non-alphanumerics collapses to one `-`,
/// with no separator at either end.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_separator = false;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }

    slug
}

/// `<slug>.vcf`, derived from the record slug, then its title, then "contact"
pub fn vcard_filename(record: &ContactRecord) -> String {
    let stem = [record.slug.as_str(), record.title.as_str()]
        .iter()
        .map(|s| slugify(s))
        .find(|s| !s.is_empty())
        .unwrap_or_else(|| FALLBACK_SLUG.to_string());

    format!("{}.vcf", stem)
}

/// Path of the delivery endpoint for a record
pub fn delivery_path(id: i64) -> String {
    format!("/wme/vcard/{}/", id)
}

/// Path of the HTML contact page for a record
pub fn contact_page_path(id: i64) -> String {
    format!("/contact/{}/", id)
}

/// Make a path absolute against the public base URL.
/// Values that already carry an http(s) scheme pass through untouched.
pub fn absolute_url(base_url: Option<&str>, path_or_url: &str) -> String {
    if path_or_url.starts_with("http://") || path_or_url.starts_with("https://") {
        return path_or_url.to_string();
    }

    match base_url.map(|b| b.trim_end_matches('/')).filter(|b| !b.is_empty()) {
        Some(base) if path_or_url.starts_with('/') => format!("{}{}", base, path_or_url),
        Some(base) => format!("{}/{}", base, path_or_url),
        None => path_or_url.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    /// Raw vCard text, imported by scanners without a network round-trip
    Vcard,
    Url,
}

/// What a QR code optically encodes
#[derive(Debug, Clone, PartialEq)]
pub struct QrPayload {
    pub kind: PayloadKind,
    pub text: String,
}

/// Pasted vCard text is encoded directly, using the same normalized text the
/// delivery endpoint serves. Everything else encodes the delivery URL.
pub fn qr_image_payload(record: &ContactRecord, base_url: Option<&str>) -> QrPayload {
    match select_source(record) {
        CardSource::Pasted(text) => QrPayload {
            kind: PayloadKind::Vcard,
            text: normalize_vcard_text(text.trim()),
        },
        _ => QrPayload {
            kind: PayloadKind::Url,
            text: absolute_url(base_url, &delivery_path(record.id)),
        },
    }
}

/// Where a click on the rendered QR image goes. Always a URL, never vCard text.
pub fn qr_click_href(record: &ContactRecord, base_url: Option<&str>) -> String {
    absolute_url(base_url, &delivery_path(record.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Option<&str> = Some("https://example.com/");

    fn record(id: i64) -> ContactRecord {
        let mut record = ContactRecord::new("work-with-me", "Work With Me");
        record.id = id;
        record
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Work With Me!"), "work-with-me");
        assert_eq!(slugify("  --Jane__DOE's   Card--  "), "jane-doe-s-card");
        assert_eq!(slugify("already-a-slug"), "already-a-slug");
        assert_eq!(slugify("?!"), "");
    }

    #[test]
    fn test_vcard_filename() {
        let mut r = record(1);
        r.slug = "Press & Media".to_string();
        assert_eq!(vcard_filename(&r), "press-media.vcf");

        r.slug = String::new();
        r.title = "Miriam's Contact".to_string();
        assert_eq!(vcard_filename(&r), "miriam-s-contact.vcf");

        r.title = "***".to_string();
        assert_eq!(vcard_filename(&r), "contact.vcf");
    }

    #[test]
    fn test_absolute_url() {
        assert_eq!(absolute_url(BASE, "/wme/vcard/3/"), "https://example.com/wme/vcard/3/");
        assert_eq!(absolute_url(BASE, "media/a.vcf"), "https://example.com/media/a.vcf");
        assert_eq!(absolute_url(BASE, "http://other.org/x"), "http://other.org/x");
        assert_eq!(absolute_url(None, "/wme/vcard/3/"), "/wme/vcard/3/");
        assert_eq!(absolute_url(Some(""), "/x"), "/x");
    }

    #[test]
    fn test_qr_payload_prefers_pasted_vcard() {
        let mut r = record(3);
        r.qr_data = Some("BEGIN:VCARD\nFN:Jane\nEND:VCARD".to_string());

        let payload = qr_image_payload(&r, BASE);
        assert_eq!(payload.kind, PayloadKind::Vcard);
        assert_eq!(payload.text, "BEGIN:VCARD\r\nFN:Jane\r\nEND:VCARD\r\n");

        // The click target stays a URL
        assert_eq!(qr_click_href(&r, BASE), "https://example.com/wme/vcard/3/");
    }

    #[test]
    fn test_qr_payload_falls_back_to_url() {
        let mut r = record(4);
        r.vcard_file = Some("vcards/a.vcf".to_string());

        let payload = qr_image_payload(&r, BASE);
        assert_eq!(payload.kind, PayloadKind::Url);
        assert_eq!(payload.text, "https://example.com/wme/vcard/4/");
    }
}
