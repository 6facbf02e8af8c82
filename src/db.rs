use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::error::Result;

/// Default module scale for a page's QR code
pub const DEFAULT_QR_SCALE: u32 = 10;

/// A contact page as stored in the content store
///
/// Every optional field may also arrive as an empty or whitespace-only string
/// (CSV cells, form input). The accessor methods treat those as absent.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ContactRecord {
    /// Stable record identifier, assigned by the store
    #[serde(default)]
    pub id: i64,

    pub slug: String,

    pub title: String,

    #[serde(default)]
    pub contact_email: Option<String>,

    #[serde(default)]
    pub phone_number: Option<String>,

    /// Free text: pre-authored vCard, URL, mailto: or anything else
    #[serde(default)]
    pub qr_data: Option<String>,

    /// Media-relative name of an uploaded .vcf
    #[serde(default)]
    pub vcard_file: Option<String>,

    #[serde(default = "default_qr_scale", deserialize_with = "scale_or_default")]
    pub qr_scale: u32,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_qr_scale() -> u32 {
    DEFAULT_QR_SCALE
}

// Empty CSV cells arrive as a present-but-empty field, not a missing one
fn scale_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u32, D::Error> {
    Ok(Option::<u32>::deserialize(deserializer)?.unwrap_or(DEFAULT_QR_SCALE))
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

impl ContactRecord {
    pub fn new(slug: &str, title: &str) -> Self {
        Self {
            id: 0,
            slug: slug.to_string(),
            title: title.to_string(),
            contact_email: None,
            phone_number: None,
            qr_data: None,
            vcard_file: None,
            qr_scale: DEFAULT_QR_SCALE,
            updated_at: Utc::now(),
        }
    }

    pub fn email(&self) -> Option<&str> {
        non_blank(&self.contact_email).map(str::trim)
    }

    pub fn phone(&self) -> Option<&str> {
        non_blank(&self.phone_number)
    }

    pub fn pasted_text(&self) -> Option<&str> {
        non_blank(&self.qr_data)
    }

    pub fn attachment(&self) -> Option<&str> {
        non_blank(&self.vcard_file).map(str::trim)
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL keeps readers (the server) unblocked while the CLI imports
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS contact_pages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            slug TEXT UNIQUE NOT NULL,
            title TEXT NOT NULL,
            contact_email TEXT,
            phone_number TEXT,
            qr_data TEXT,
            vcard_file TEXT,
            qr_scale INTEGER NOT NULL DEFAULT 10,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_contact_pages_slug ON contact_pages(slug)",
        [],
    )?;

    Ok(())
}

pub fn load_csv(csv_path: &Path) -> Result<Vec<ContactRecord>> {
    let mut rdr = csv::Reader::from_path(csv_path)?;

    let mut records = Vec::new();
    for result in rdr.deserialize() {
        let record: ContactRecord = result?;
        records.push(record);
    }

    debug!("Loaded {} contact records from {}", records.len(), csv_path.display());
    Ok(records)
}

/// Insert or update records keyed by slug. Returns the number of rows written.
pub fn upsert_records(conn: &Connection, records: &[ContactRecord]) -> Result<usize> {
    let mut written = 0;

    for record in records {
        written += conn.execute(
            "INSERT INTO contact_pages (
                slug, title, contact_email, phone_number, qr_data, vcard_file, qr_scale, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(slug) DO UPDATE SET
                title = excluded.title,
                contact_email = excluded.contact_email,
                phone_number = excluded.phone_number,
                qr_data = excluded.qr_data,
                vcard_file = excluded.vcard_file,
                qr_scale = excluded.qr_scale,
                updated_at = excluded.updated_at",
            params![
                record.slug,
                record.title,
                record.contact_email,
                record.phone_number,
                record.qr_data,
                record.vcard_file,
                record.qr_scale,
                Utc::now().to_rfc3339(),
            ],
        )?;
    }

    info!("Upserted {} contact records", written);
    Ok(written)
}

const SELECT_COLUMNS: &str = "SELECT id, slug, title, contact_email, phone_number, qr_data,
    vcard_file, qr_scale, updated_at FROM contact_pages";

fn row_to_record(row: &Row) -> rusqlite::Result<ContactRecord> {
    let updated_at: String = row.get(8)?;
    let updated_at = DateTime::parse_from_rfc3339(&updated_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))?;

    Ok(ContactRecord {
        id: row.get(0)?,
        slug: row.get(1)?,
        title: row.get(2)?,
        contact_email: row.get(3)?,
        phone_number: row.get(4)?,
        qr_data: row.get(5)?,
        vcard_file: row.get(6)?,
        qr_scale: row.get(7)?,
        updated_at,
    })
}

pub fn get_record(conn: &Connection, id: i64) -> Result<Option<ContactRecord>> {
    let sql = format!("{} WHERE id = ?1", SELECT_COLUMNS);
    let record = conn.query_row(&sql, params![id], row_to_record).optional()?;
    Ok(record)
}

pub fn get_record_by_slug(conn: &Connection, slug: &str) -> Result<Option<ContactRecord>> {
    let sql = format!("{} WHERE slug = ?1", SELECT_COLUMNS);
    let record = conn.query_row(&sql, params![slug], row_to_record).optional()?;
    Ok(record)
}

pub fn list_records(conn: &Connection) -> Result<Vec<ContactRecord>> {
    let sql = format!("{} ORDER BY id", SELECT_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;

    let records = stmt
        .query_map([], row_to_record)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(records)
}

pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM contact_pages", [], |row| row.get(0))?;
    Ok(count)
}
