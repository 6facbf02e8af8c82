// Contact-payload resolver
//
// One canonical resolution order, shared by the delivery endpoint and the QR
// renderer so the downloaded card and the scanned card never diverge:
//
//   1. pasted vCard text (qr_data starting with BEGIN:VCARD)
//   2. uploaded .vcf attachment
//   3. minimal card synthesized from title / email / phone

use serde::Serialize;
use tracing::{debug, warn};

use crate::db::ContactRecord;
use crate::storage::AttachmentStore;
use crate::vcard::{
    decode_vcard_bytes, is_vcard_text, normalize_vcard_text, synthesize_vcard, ContactFields,
};

/// Where a record's card comes from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CardSource<'a> {
    /// Pre-authored vCard text pasted by an editor
    Pasted(&'a str),
    /// Media-relative name of an uploaded .vcf
    Uploaded(&'a str),
    Structured(ContactFields<'a>),
}

/// Which source actually produced the resolved card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CardOrigin {
    Pasted,
    Uploaded,
    Synthesized,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCard {
    /// Normalized vCard text, CRLF terminated, never empty
    pub text: String,
    pub origin: CardOrigin,
}

/// Structured fields of a record
pub fn contact_fields(record: &ContactRecord) -> ContactFields<'_> {
    ContactFields {
        display_name: &record.title,
        email: record.email(),
        phone: record.phone(),
    }
}

/// Pick the first applicable source. Pasted text wins over an uploaded file.
pub fn select_source(record: &ContactRecord) -> CardSource<'_> {
    if let Some(text) = record.pasted_text().filter(|t| is_vcard_text(t)) {
        return CardSource::Pasted(text);
    }

    if let Some(name) = record.attachment() {
        return CardSource::Uploaded(name);
    }

    CardSource::Structured(contact_fields(record))
}

/// Resolve a record's card. An unreadable or empty attachment falls through to
/// the synthesized card, so this always produces content.
pub fn resolve_card(record: &ContactRecord, attachments: &dyn AttachmentStore) -> ResolvedCard {
    let source = select_source(record);
    debug!(record_id = record.id, ?source, "Resolving contact card");

    match source {
        CardSource::Pasted(text) => {
            let text = normalize_vcard_text(text.trim());
            return ResolvedCard {
                text,
                origin: CardOrigin::Pasted,
            };
        }
        CardSource::Uploaded(name) => match attachments.read(name) {
            Ok(bytes) => {
                let text = normalize_vcard_text(&decode_vcard_bytes(&bytes));
                if !text.is_empty() {
                    return ResolvedCard {
                        text,
                        origin: CardOrigin::Uploaded,
                    };
                }
                warn!(record_id = record.id, attachment = name, "vCard attachment is empty, synthesizing card");
            }
            Err(e) => {
                warn!(record_id = record.id, attachment = name, error = %e, "vCard attachment unreadable, synthesizing card");
            }
        },
        CardSource::Structured(_) => {}
    }

    ResolvedCard {
        text: synthesize_vcard(&contact_fields(record)),
        origin: CardOrigin::Synthesized,
    }
}
