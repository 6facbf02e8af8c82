// vCard text handling: detection, normalization, decoding, synthesis
//
// Everything here is pure string work. The resolver decides which of these to apply.

/// Marker that identifies pre-authored vCard text
pub const VCARD_MARKER: &str = "BEGIN:VCARD";

/// Line ending mandated by the vCard format
pub const CRLF: &str = "\r\n";

/// Display name used when a record has no usable title
pub const FALLBACK_NAME: &str = "Contact";

// ============================================================================
// DETECTION & NORMALIZATION
// ============================================================================

/// True when the text, ignoring surrounding whitespace and case, starts with `BEGIN:VCARD`
pub fn is_vcard_text(text: &str) -> bool {
    text.trim().to_uppercase().starts_with(VCARD_MARKER)
}

/// Normalize vCard text to CRLF line endings with exactly one trailing CRLF.
///
/// Leading and trailing blank lines are dropped, interior lines are kept as-is.
/// Blank input yields an empty string. Applying this twice gives the same result
/// as applying it once.
pub fn normalize_vcard_text(text: &str) -> String {
    let unified = text.replace(CRLF, "\n").replace('\r', "\n");
    let lines: Vec<&str> = unified.split('\n').collect();

    let first = lines.iter().position(|line| !line.trim().is_empty());
    let last = lines.iter().rposition(|line| !line.trim().is_empty());

    match (first, last) {
        (Some(first), Some(last)) => {
            let mut out = lines[first..=last].join(CRLF);
            out.push_str(CRLF);
            out
        }
        _ => String::new(),
    }
}

/// Decode uploaded bytes as UTF-8, falling back to Latin-1 so no byte is lost
pub fn decode_vcard_bytes(raw: &[u8]) -> String {
    match std::str::from_utf8(raw) {
        Ok(text) => text.strip_prefix('\u{FEFF}').unwrap_or(text).to_string(),
        // Every byte maps to one char, BOM bytes included
        Err(_) => raw.iter().map(|&b| char::from(b)).collect(),
    }
}

// ============================================================================
// SYNTHESIS
// ============================================================================

/// Structured contact fields used to build a minimal card
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactFields<'a> {
    pub display_name: &'a str,
    pub email: Option<&'a str>,
    pub phone: Option<&'a str>,
}

/// Escape a vCard 3.0 TEXT value
pub fn escape_text_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ',' => out.push_str("\\,"),
            ';' => out.push_str("\\;"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            _ => out.push(c),
        }
    }
    out
}

/// Phone numbers are written without whitespace ("+45 12 34" -> "+451234")
pub fn compact_phone(phone: &str) -> String {
    phone.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Build a minimal vCard 3.0 from structured fields.
///
/// The result is never empty: a blank display name becomes [`FALLBACK_NAME`].
pub fn synthesize_vcard(fields: &ContactFields) -> String {
    let name = fields.display_name.trim();
    let name = if name.is_empty() { FALLBACK_NAME } else { name };

    let mut lines = vec![
        VCARD_MARKER.to_string(),
        "VERSION:3.0".to_string(),
        format!("FN:{}", escape_text_value(name)),
    ];

    if let Some(email) = fields.email.map(str::trim).filter(|e| !e.is_empty()) {
        lines.push(format!("EMAIL;TYPE=INTERNET:{}", email));
    }

    if let Some(phone) = fields.phone.map(compact_phone).filter(|p| !p.is_empty()) {
        lines.push(format!("TEL;TYPE=CELL:{}", phone));
    }

    lines.push("END:VCARD".to_string());
    normalize_vcard_text(&lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesize_full_card() {
        let card = synthesize_vcard(&ContactFields {
            display_name: "Jane Doe",
            email: Some("jane@example.com"),
            phone: Some("+45 12 34 56 78"),
        });

        assert_eq!(
            card,
            "BEGIN:VCARD\r\nVERSION:3.0\r\nFN:Jane Doe\r\nEMAIL;TYPE=INTERNET:jane@example.com\r\nTEL;TYPE=CELL:+4512345678\r\nEND:VCARD\r\n"
        );
    }

    #[test]
    fn test_synthesize_omits_absent_lines() {
        let card = synthesize_vcard(&ContactFields {
            display_name: "Jane Doe",
            email: None,
            phone: Some("   "),
        });

        assert_eq!(card, "BEGIN:VCARD\r\nVERSION:3.0\r\nFN:Jane Doe\r\nEND:VCARD\r\n");
    }

    #[test]
    fn test_synthesize_blank_name_uses_placeholder() {
        let card = synthesize_vcard(&ContactFields {
            display_name: "  ",
            email: None,
            phone: None,
        });

        assert!(card.contains("FN:Contact\r\n"));
    }

    #[test]
    fn test_synthesize_escapes_name() {
        let card = synthesize_vcard(&ContactFields {
            display_name: "Doe, Jane; Reporter",
            email: None,
            phone: None,
        });

        assert!(card.contains("FN:Doe\\, Jane\\; Reporter\r\n"));
    }

    #[test]
    fn test_normalize_line_endings() {
        assert_eq!(normalize_vcard_text("A\nB\rC\r\nD"), "A\r\nB\r\nC\r\nD\r\n");
    }

    #[test]
    fn test_normalize_strips_blank_edges() {
        let text = "\n\n  \nBEGIN:VCARD\n\nEND:VCARD\n\n\n";
        assert_eq!(normalize_vcard_text(text), "BEGIN:VCARD\r\n\r\nEND:VCARD\r\n");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let inputs = [
            "BEGIN:VCARD\nFN:X\nEND:VCARD",
            "\r\n\r\nBEGIN:VCARD\r\rEND:VCARD\r\n\r\n",
            "single line",
            "",
            "   \n\t\n",
        ];

        for input in inputs {
            let once = normalize_vcard_text(input);
            assert_eq!(normalize_vcard_text(&once), once, "input: {:?}", input);
        }
    }

    #[test]
    fn test_normalize_blank_is_empty() {
        assert_eq!(normalize_vcard_text(""), "");
        assert_eq!(normalize_vcard_text("\r\n \n"), "");
    }

    #[test]
    fn test_is_vcard_text() {
        assert!(is_vcard_text("BEGIN:VCARD\nEND:VCARD"));
        assert!(is_vcard_text("  \n begin:vcard\n"));
        assert!(!is_vcard_text("https://example.com"));
        assert!(!is_vcard_text(""));
    }

    #[test]
    fn test_decode_utf8_and_bom() {
        assert_eq!(decode_vcard_bytes("FN:Zoë".as_bytes()), "FN:Zoë");
        assert_eq!(decode_vcard_bytes(b"\xEF\xBB\xBFFN:X"), "FN:X");
    }

    #[test]
    fn test_decode_falls_back_to_latin1() {
        // 0xE9 is 'é' in Latin-1 but an invalid lone byte in UTF-8
        assert_eq!(decode_vcard_bytes(b"FN:Ren\xE9"), "FN:René");
    }

    #[test]
    fn test_latin1_fallback_keeps_leading_bom_bytes() {
        let decoded = decode_vcard_bytes(b"\xEF\xBB\xBFFN:Ren\xE9");
        assert_eq!(decoded, "\u{EF}\u{BB}\u{BF}FN:René");
        assert_eq!(decoded.chars().count(), 10);
    }
}
