// HTTP surface: vCard delivery endpoint, contact page, JSON API

use axum::{
    extract::{Path, Query, Request, State},
    http::{
        header::{
            CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE, ETAG, IF_NONE_MATCH,
            X_CONTENT_TYPE_OPTIONS,
        },
        HeaderMap, HeaderName, HeaderValue, StatusCode,
    },
    middleware::{self, Next},
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use crate::config::{is_truthy, Config};
use crate::db::{self, ContactRecord};
use crate::error::{CardError, Result};
use crate::links::{
    contact_page_path, delivery_path, qr_click_href, qr_image_payload, vcard_filename, PayloadKind,
};
use crate::qr::{escape_xml, render_img_tag, render_svg};
use crate::resolver::{resolve_card, CardOrigin};
use crate::storage::AttachmentStore;

pub const VCARD_CONTENT_TYPE: &str = "text/vcard; charset=utf-8";
pub const IMMUTABLE_CACHE: &str = "public, max-age=31536000, immutable";
pub const DEBUG_CACHE: &str = "no-cache";
pub const AI_OPTOUT: &str = "noai, noimageai";

const QR_TITLE: &str = "Add contact";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub attachments: Arc<dyn AttachmentStore>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(conn: Connection, attachments: Arc<dyn AttachmentStore>, config: Config) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            attachments,
            config: Arc::new(config),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| CardError::Internal("database lock poisoned".to_string()))
    }

    /// Look up a record by its path segment. Anything that is not a known id is not-found.
    fn load_record(&self, raw_id: &str) -> Result<ContactRecord> {
        let id: i64 = raw_id
            .parse()
            .map_err(|_| CardError::NotFound(raw_id.to_string()))?;

        let conn = self.conn()?;
        db::get_record(&conn, id)?.ok_or_else(|| CardError::NotFound(raw_id.to_string()))
    }
}

fn status_for(err: &CardError) -> StatusCode {
    if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn log_error(err: &CardError) {
    if err.is_not_found() {
        debug!(error = %err, "Not found");
    } else {
        error!(error = %err, "Request failed");
    }
}

impl IntoResponse for CardError {
    fn into_response(self) -> Response {
        log_error(&self);
        let status = status_for(&self);
        let body = if self.is_not_found() {
            "Not found"
        } else {
            "Internal server error"
        };
        (status, body).into_response()
    }
}

// ============================================================================
// API Response Types
// ============================================================================

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

fn api_error(err: CardError) -> Response {
    log_error(&err);
    let status = status_for(&err);
    let body = ApiResponse {
        success: false,
        data: (),
        error: Some(err.to_string()),
    };
    (status, Json(body)).into_response()
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct ContactSummary {
    id: i64,
    slug: String,
    title: String,
    vcard_url: String,
    page_url: String,
    updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct ContactDetail {
    #[serde(flatten)]
    summary: ContactSummary,
    filename: String,
    card_origin: CardOrigin,
    qr_payload_kind: PayloadKind,
    qr_click_href: String,
}

impl ContactSummary {
    fn new(record: &ContactRecord) -> Self {
        Self {
            id: record.id,
            slug: record.slug.clone(),
            title: record.title.clone(),
            vcard_url: delivery_path(record.id),
            page_url: contact_page_path(record.id),
            updated_at: record.updated_at,
        }
    }
}

// ============================================================================
// vCard Delivery
// ============================================================================

fn etag_for(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    format!("\"{:x}\"", hasher.finalize())
}

fn etag_matches(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get(IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(|value| {
            value.split(',').map(str::trim).any(|candidate| {
                candidate == "*" || candidate == etag || candidate.strip_prefix("W/") == Some(etag)
            })
        })
        .unwrap_or(false)
}

/// GET /wme/vcard/:id/ - Serve a record's resolved vCard
///
/// Inline by default so phones offer "add to contacts"; `?download=1` forces a save.
async fn vcard_inline(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response> {
    let record = state.load_record(&id)?;
    let card = resolve_card(&record, state.attachments.as_ref());
    debug!(record_id = record.id, origin = ?card.origin, "Serving vCard");

    let cache_control = if state.config.site.debug {
        DEBUG_CACHE
    } else {
        IMMUTABLE_CACHE
    };
    let etag = etag_for(&card.text);

    if etag_matches(&headers, &etag) {
        return Ok((
            StatusCode::NOT_MODIFIED,
            [(ETAG, etag), (CACHE_CONTROL, cache_control.to_string())],
        )
            .into_response());
    }

    let download = params.get("download").map(|v| is_truthy(v)).unwrap_or(false);
    let disposition = if download { "attachment" } else { "inline" };

    Ok((
        [
            (CONTENT_TYPE, VCARD_CONTENT_TYPE.to_string()),
            (
                CONTENT_DISPOSITION,
                format!("{}; filename=\"{}\"", disposition, vcard_filename(&record)),
            ),
            (CACHE_CONTROL, cache_control.to_string()),
            (X_CONTENT_TYPE_OPTIONS, "nosniff".to_string()),
            (ETAG, etag),
        ],
        card.text,
    )
        .into_response())
}

// ============================================================================
// Contact Page
// ============================================================================

/// GET /contact/:id/ - Contact block with a scannable QR code
async fn contact_page(State(state): State<AppState>, Path(id): Path<String>) -> Result<Html<String>> {
    let record = state.load_record(&id)?;
    let config = &state.config;

    let payload = qr_image_payload(&record, config.base_url());
    let href = qr_click_href(&record, config.base_url());

    let mut qr = render_svg(
        &payload.text,
        &config.svg_options(Some(record.qr_scale)).with_title(QR_TITLE),
    );
    if qr.is_empty() {
        qr = render_img_tag(&payload.text, &config.png_options().with_title(QR_TITLE));
    }

    let title = escape_xml(&record.title);
    let href = escape_xml(&href);

    Ok(Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
</head>
<body>
<main class="contact">
<h1>{title}</h1>
<a class="contact-qr" href="{href}">{qr}</a>
<p><a href="{href}">Add to contacts</a> · <a href="{href}?download=1" download>Download vCard</a></p>
</main>
</body>
</html>
"#,
    )))
}

// ============================================================================
// JSON API
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok(HealthResponse {
        status: "ok",
        version: crate::VERSION,
    }))
}

/// GET /api/contacts - All contact records
async fn list_contacts(State(state): State<AppState>) -> Response {
    let records = match state.conn().and_then(|conn| db::list_records(&conn)) {
        Ok(records) => records,
        Err(e) => return api_error(e),
    };

    let summaries: Vec<ContactSummary> = records.iter().map(ContactSummary::new).collect();
    Json(ApiResponse::ok(summaries)).into_response()
}

/// GET /api/contacts/:id - One record with its resolved card details
async fn get_contact(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let record = match state.load_record(&id) {
        Ok(record) => record,
        Err(e) => return api_error(e),
    };

    let base = state.config.base_url();
    let card = resolve_card(&record, state.attachments.as_ref());

    let detail = ContactDetail {
        summary: ContactSummary::new(&record),
        filename: vcard_filename(&record),
        card_origin: card.origin,
        qr_payload_kind: qr_image_payload(&record, base).kind,
        qr_click_href: qr_click_href(&record, base),
    };

    Json(ApiResponse::ok(detail)).into_response()
}

// ============================================================================
// Middleware
// ============================================================================

/// Outside debug mode, ask AI crawlers not to train on HTML pages
async fn ai_optout(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    if state.config.site.debug {
        return response;
    }

    let is_html = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/html"))
        .unwrap_or(false);
    if !is_html {
        return response;
    }

    let robots = HeaderName::from_static("x-robots-tag");
    let value = match response.headers().get(&robots).and_then(|v| v.to_str().ok()) {
        Some(existing) if !existing.is_empty() => format!("{}, {}", existing, AI_OPTOUT),
        _ => AI_OPTOUT.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        response.headers_mut().insert(robots, value);
    }

    response
}

// ============================================================================
// Router
// ============================================================================

pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/contacts", get(list_contacts))
        .route("/contacts/:id", get(get_contact));

    Router::new()
        .route("/wme/vcard/:id/", get(vcard_inline))
        .route("/wme/vcard/:id", get(vcard_inline))
        .route("/contact/:id/", get(contact_page))
        .route("/contact/:id", get(contact_page))
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(state.clone(), ai_optout))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_etag_is_quoted_sha256() {
        let etag = etag_for("BEGIN:VCARD\r\nEND:VCARD\r\n");
        assert!(etag.starts_with('"') && etag.ends_with('"'));
        assert_eq!(etag.len(), 64 + 2);
    }

    #[test]
    fn test_etag_matches() {
        let etag = etag_for("x");
        let mut headers = HeaderMap::new();
        assert!(!etag_matches(&headers, &etag));

        headers.insert(IF_NONE_MATCH, HeaderValue::from_str(&format!("\"other\", W/{}", etag)).unwrap());
        assert!(etag_matches(&headers, &etag));

        headers.insert(IF_NONE_MATCH, HeaderValue::from_static("*"));
        assert!(etag_matches(&headers, &etag));
    }
}
