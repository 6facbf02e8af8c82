//! Integration tests for configuration loading

use contact_cards::{CardError, Config};
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

#[test]
fn test_load_config_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();

    let config_content = r#"
[server]
bind_addr = "0.0.0.0:8080"

[storage]
database_path = "/var/lib/contact-cards/cards.db"
media_root = "/var/lib/contact-cards/media"
max_attachment_bytes = 65536

[site]
public_base_url = "https://example.com"
debug = true

[qr]
svg_scale = 6
svg_border = 2
png_scale = 4
png_border = 4
"#;

    temp_file.write_all(config_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.server.bind_addr, "0.0.0.0:8080");
    assert_eq!(
        config.storage.database_path,
        PathBuf::from("/var/lib/contact-cards/cards.db")
    );
    assert_eq!(config.storage.max_attachment_bytes, 65536);
    assert_eq!(config.base_url(), Some("https://example.com"));
    assert!(config.site.debug);
    assert_eq!(config.qr.svg_scale, 6);
    assert_eq!(config.png_options().border, 4);
    assert_eq!(config.media_dir().root(), PathBuf::from("/var/lib/contact-cards/media").as_path());
    assert!(config.validate().is_ok());
}

#[test]
fn test_empty_file_gives_defaults() {
    let temp_file = NamedTempFile::new().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_missing_file_is_config_error() {
    let err = Config::from_file("/nonexistent/contact-cards.toml").unwrap_err();
    assert!(matches!(err, CardError::Config(_)));
}

#[test]
fn test_invalid_toml_is_config_error() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[server\nbind_addr = ").unwrap();
    temp_file.flush().unwrap();

    let err = Config::from_file(temp_file.path()).unwrap_err();
    assert!(matches!(err, CardError::Config(_)));
}

#[test]
fn test_load_rejects_zero_border() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[qr]\npng_border = 0\n").unwrap();
    temp_file.flush().unwrap();

    let err = Config::load(Some(temp_file.path())).unwrap_err();
    assert!(matches!(err, CardError::Config(_)));
}
