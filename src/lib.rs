// Contact Cards - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod config;
pub mod db;
pub mod error;
pub mod links;
pub mod qr;
pub mod resolver;
pub mod storage;
pub mod vcard;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use config::Config;
pub use db::{
    ContactRecord,
    load_csv, setup_database, upsert_records,
    get_record, get_record_by_slug, list_records, verify_count,
};
pub use error::{CardError, Result};
pub use links::{
    absolute_url, delivery_path, qr_click_href, qr_image_payload, slugify, vcard_filename,
    PayloadKind, QrPayload,
};
pub use qr::{render_img_tag, render_png, render_png_data_uri, render_svg, QrOptions};
pub use resolver::{resolve_card, select_source, CardOrigin, CardSource, ResolvedCard};
pub use storage::{AttachmentStore, MediaDir};
pub use vcard::{normalize_vcard_text, synthesize_vcard, ContactFields};

#[cfg(feature = "server")]
pub use api::{build_router, AppState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
