use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use contact_cards::{
    get_record, list_records, load_csv, qr_image_payload, render_png, render_svg, resolve_card,
    setup_database, upsert_records, vcard_filename, verify_count, Config, ContactRecord,
};

/// Contact Cards - manage contact records and their vCard / QR output
#[derive(Parser, Debug)]
#[command(name = "contact-cards", version, about)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, global = true, env = "CONTACT_CARDS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the content store schema
    Init,
    /// Import contact records from CSV (upsert by slug)
    Import { csv: PathBuf },
    /// List stored contact records
    List,
    /// Print a record's resolved vCard
    Show { id: i64 },
    /// Render a record's QR code
    Qr {
        id: i64,
        #[arg(long, value_enum, default_value_t = QrFormat::Svg)]
        format: QrFormat,
        /// Output file (SVG goes to stdout when omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
enum QrFormat {
    Svg,
    Png,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Init => run_init(&config),
        Command::Import { csv } => run_import(&config, &csv),
        Command::List => run_list(&config),
        Command::Show { id } => run_show(&config, id),
        Command::Qr { id, format, out } => run_qr(&config, id, format, out.as_deref()),
    }
}

fn open_existing(config: &Config) -> Result<Connection> {
    let db_path = &config.storage.database_path;
    if !db_path.exists() {
        bail!(
            "Database not found at {}. Run `contact-cards init` or `contact-cards import <csv>` first.",
            db_path.display()
        );
    }

    Connection::open(db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))
}

fn load_record(config: &Config, id: i64) -> Result<ContactRecord> {
    let conn = open_existing(config)?;
    get_record(&conn, id)?.with_context(|| format!("No contact record with id {}", id))
}

fn run_init(config: &Config) -> Result<()> {
    let db_path = &config.storage.database_path;
    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    setup_database(&conn)?;

    println!("✓ Database initialized at {}", db_path.display());
    Ok(())
}

fn run_import(config: &Config, csv_path: &Path) -> Result<()> {
    let records = load_csv(csv_path)
        .with_context(|| format!("Failed to load {}", csv_path.display()))?;
    println!("✓ Loaded {} records from CSV", records.len());

    let conn = Connection::open(&config.storage.database_path)?;
    setup_database(&conn)?;
    upsert_records(&conn, &records)?;

    let count = verify_count(&conn)?;
    println!("✓ Database contains {} contact records", count);
    Ok(())
}

fn run_list(config: &Config) -> Result<()> {
    let conn = open_existing(config)?;

    for record in list_records(&conn)? {
        println!(
            "{:>5}  {:<30}  {:<30}  {}",
            record.id,
            record.slug,
            record.title,
            vcard_filename(&record)
        );
    }
    Ok(())
}

fn run_show(config: &Config, id: i64) -> Result<()> {
    let record = load_record(config, id)?;
    let card = resolve_card(&record, &config.media_dir());

    eprintln!("source: {:?}", card.origin);
    print!("{}", card.text);
    Ok(())
}

fn run_qr(config: &Config, id: i64, format: QrFormat, out: Option<&Path>) -> Result<()> {
    let record = load_record(config, id)?;
    let payload = qr_image_payload(&record, config.base_url());

    match format {
        QrFormat::Svg => {
            let svg = render_svg(&payload.text, &config.svg_options(Some(record.qr_scale)));
            if svg.is_empty() {
                bail!("Nothing rendered: payload too large or QR support not compiled in");
            }
            match out {
                Some(path) => {
                    fs::write(path, svg)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("✓ Wrote {}", path.display());
                }
                None => println!("{}", svg),
            }
        }
        QrFormat::Png => {
            let Some(path) = out else {
                bail!("PNG output needs --out <path>");
            };
            let Some(png) = render_png(&payload.text, &config.png_options()) else {
                bail!("Nothing rendered: payload too large or QR support not compiled in");
            };
            fs::write(path, png).with_context(|| format!("Failed to write {}", path.display()))?;
            println!("✓ Wrote {}", path.display());
        }
    }

    Ok(())
}
