// QR renderer
//
// Turns a payload into inline SVG markup or an embeddable PNG. Error correction
// is fixed at level H so printed codes survive small sizes. Output is meant to
// be dropped straight into a page, so nothing here returns an error: an empty
// payload, an oversized payload or a build without the `qr` feature all yield
// an empty render.

use tracing::debug;
#[cfg(feature = "qr")]
use tracing::warn;

pub const SVG_DEFAULT_SCALE: u32 = 10;
pub const SVG_DEFAULT_BORDER: u32 = 4;
pub const PNG_DEFAULT_SCALE: u32 = 8;
pub const PNG_DEFAULT_BORDER: u32 = 8;

/// Smallest quiet zone ever rendered; scanners need one
pub const MIN_BORDER: u32 = 1;

/// Upper bounds on per-render sizing; larger values are clamped
pub const MAX_SCALE: u32 = 40;
pub const MAX_BORDER: u32 = 32;

const DEFAULT_TITLE: &str = "Scan QR";

#[derive(Debug, Clone, PartialEq)]
pub struct QrOptions {
    /// Pixels per module
    pub scale: u32,
    /// Quiet zone width in modules
    pub border: u32,
    /// SVG fill colors; PNG output is always black on white
    pub dark: String,
    pub light: String,
    /// SVG `<title>` and `<img alt>`
    pub title: String,
}

impl QrOptions {
    pub fn svg() -> Self {
        Self {
            scale: SVG_DEFAULT_SCALE,
            border: SVG_DEFAULT_BORDER,
            dark: "black".to_string(),
            light: "white".to_string(),
            title: DEFAULT_TITLE.to_string(),
        }
    }

    pub fn png() -> Self {
        Self {
            scale: PNG_DEFAULT_SCALE,
            border: PNG_DEFAULT_BORDER,
            ..Self::svg()
        }
    }

    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_border(mut self, border: u32) -> Self {
        self.border = border;
        self
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    fn effective_scale(&self) -> u32 {
        self.scale.clamp(1, MAX_SCALE)
    }

    fn effective_border(&self) -> u32 {
        self.border.clamp(MIN_BORDER, MAX_BORDER)
    }

    /// Side length in modules and in pixels, or `None` if it does not fit a u32
    fn canvas(&self, modules: usize) -> Option<(u32, u32)> {
        let size = u32::try_from(modules)
            .ok()?
            .checked_add(self.effective_border().checked_mul(2)?)?;
        Some((size, size.checked_mul(self.effective_scale())?))
    }
}

impl Default for QrOptions {
    fn default() -> Self {
        Self::svg()
    }
}

/// Square grid of modules, row-major, `true` = dark
struct ModuleGrid {
    width: usize,
    modules: Vec<bool>,
}

impl ModuleGrid {
    fn is_dark(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.width && self.modules[y * self.width + x]
    }
}

#[cfg(feature = "qr")]
fn encode(payload: &str) -> Option<ModuleGrid> {
    use qrcode::{Color, EcLevel, QrCode};

    match QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::H) {
        Ok(code) => Some(ModuleGrid {
            width: code.width(),
            modules: code.to_colors().into_iter().map(|c| c == Color::Dark).collect(),
        }),
        Err(e) => {
            warn!(error = %e, bytes = payload.len(), "QR encoding failed");
            None
        }
    }
}

#[cfg(not(feature = "qr"))]
fn encode(_payload: &str) -> Option<ModuleGrid> {
    debug!("QR support not compiled in, rendering nothing");
    None
}

fn encode_non_empty(payload: &str) -> Option<ModuleGrid> {
    if payload.is_empty() {
        debug!("Empty QR payload, rendering nothing");
        return None;
    }
    encode(payload)
}

fn warn_canvas_overflow(modules: usize, opts: &QrOptions) {
    tracing::warn!(
        modules,
        scale = opts.scale,
        border = opts.border,
        "QR canvas too large, rendering nothing"
    );
}

pub(crate) fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Inline `<svg>` markup, or an empty string when nothing can be rendered
pub fn render_svg(payload: &str, opts: &QrOptions) -> String {
    let Some(grid) = encode_non_empty(payload) else {
        return String::new();
    };

    let Some((size, pixels)) = opts.canvas(grid.width) else {
        warn_canvas_overflow(grid.width, opts);
        return String::new();
    };
    let border = opts.effective_border() as usize;

    // One subpath per horizontal run of dark modules, in module units
    let mut path = String::new();
    for y in 0..grid.width {
        let mut x = 0;
        while x < grid.width {
            if !grid.is_dark(x, y) {
                x += 1;
                continue;
            }
            let start = x;
            while grid.is_dark(x, y) {
                x += 1;
            }
            let run = x - start;
            path.push_str(&format!("M{},{}h{}v1h-{}z", start + border, y + border, run, run));
        }
    }

    format!(
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{px}" height="{px}" "#,
            r#"viewBox="0 0 {size} {size}" class="qr" role="img">"#,
            r#"<title>{title}</title>"#,
            r#"<rect width="{size}" height="{size}" fill="{light}"/>"#,
            r#"<path fill="{dark}" shape-rendering="crispEdges" d="{path}"/>"#,
            r#"</svg>"#
        ),
        px = pixels,
        size = size,
        title = escape_xml(&opts.title),
        light = escape_xml(&opts.light),
        dark = escape_xml(&opts.dark),
        path = path,
    )
}

/// PNG bytes (black on white), or `None` when nothing can be rendered
#[cfg(feature = "qr")]
pub fn render_png(payload: &str, opts: &QrOptions) -> Option<Vec<u8>> {
    use image::{GrayImage, ImageFormat, Luma};
    use std::io::Cursor;

    let grid = encode_non_empty(payload)?;

    let Some((_, pixels)) = opts.canvas(grid.width) else {
        warn_canvas_overflow(grid.width, opts);
        return None;
    };
    let scale = opts.effective_scale();
    let border = opts.effective_border();

    let img = GrayImage::from_fn(pixels, pixels, |px, py| {
        let mx = (px / scale) as i64 - border as i64;
        let my = (py / scale) as i64 - border as i64;
        let dark = mx >= 0 && my >= 0 && grid.is_dark(mx as usize, my as usize);
        Luma([if dark { 0 } else { 255 }])
    });

    let mut bytes = Vec::new();
    if let Err(e) = img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png) {
        warn!(error = %e, "PNG encoding failed");
        return None;
    }

    Some(bytes)
}

#[cfg(not(feature = "qr"))]
pub fn render_png(_payload: &str, _opts: &QrOptions) -> Option<Vec<u8>> {
    debug!("QR support not compiled in, rendering nothing");
    None
}

/// `data:image/png;base64,...` URI for direct embedding
#[cfg(feature = "qr")]
pub fn render_png_data_uri(payload: &str, opts: &QrOptions) -> Option<String> {
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    render_png(payload, opts).map(|bytes| format!("data:image/png;base64,{}", STANDARD.encode(bytes)))
}

#[cfg(not(feature = "qr"))]
pub fn render_png_data_uri(_payload: &str, _opts: &QrOptions) -> Option<String> {
    None
}

/// `<img>` tag carrying the PNG as a data URI, or an empty string
pub fn render_img_tag(payload: &str, opts: &QrOptions) -> String {
    match render_png_data_uri(payload, opts) {
        Some(uri) => format!(
            r#"<img src="{}" alt="{}" decoding="async" loading="eager" />"#,
            uri,
            escape_xml(&opts.title)
        ),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_payload_renders_nothing() {
        assert_eq!(render_svg("", &QrOptions::svg()), "");
        assert_eq!(render_png("", &QrOptions::png()), None);
        assert_eq!(render_img_tag("", &QrOptions::png()), "");
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn test_zero_border_is_raised() {
        let opts = QrOptions::svg().with_border(0).with_scale(0);
        assert_eq!(opts.effective_border(), MIN_BORDER);
        assert_eq!(opts.effective_scale(), 1);
    }

    #[test]
    fn test_huge_scale_and_border_are_clamped() {
        let opts = QrOptions::svg().with_scale(u32::MAX).with_border(u32::MAX);
        assert_eq!(opts.effective_scale(), MAX_SCALE);
        assert_eq!(opts.effective_border(), MAX_BORDER);

        let (size, pixels) = opts.canvas(177).unwrap();
        assert_eq!(size, 177 + 2 * MAX_BORDER);
        assert_eq!(pixels, size * MAX_SCALE);
    }

    #[test]
    fn test_canvas_overflow_is_none() {
        assert_eq!(QrOptions::svg().canvas(usize::MAX), None);
        assert_eq!(QrOptions::svg().with_scale(MAX_SCALE).canvas(u32::MAX as usize - 10), None);
    }

    #[cfg(feature = "qr")]
    #[test]
    fn test_svg_dimensions() {
        let svg = render_svg("https://example.com/wme/vcard/1/", &QrOptions::svg().with_scale(3));

        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("<title>Scan QR</title>"));

        let view_box = svg.split(r#"viewBox="0 0 "#).nth(1).unwrap();
        let size: u32 = view_box.split(' ').next().unwrap().parse().unwrap();

        // Symbol widths are 21 + 4k modules, plus the quiet zone on both sides
        let modules = size - 2 * SVG_DEFAULT_BORDER;
        assert!(modules >= 21);
        assert_eq!((modules - 21) % 4, 0);
        assert!(svg.contains(&format!(r#"width="{}""#, size * 3)));
    }

    #[cfg(feature = "qr")]
    #[test]
    fn test_svg_with_huge_scale_renders_clamped() {
        let svg = render_svg("https://example.com/wme/vcard/1/", &QrOptions::svg().with_scale(u32::MAX));
        assert!(svg.starts_with("<svg"));

        let view_box = svg.split(r#"viewBox="0 0 "#).nth(1).unwrap();
        let size: u32 = view_box.split(' ').next().unwrap().parse().unwrap();
        assert!(svg.contains(&format!(r#"width="{}""#, size * MAX_SCALE)));
    }

    #[cfg(feature = "qr")]
    #[test]
    fn test_svg_title_is_escaped() {
        let svg = render_svg("hello", &QrOptions::svg().with_title("Add <contact>"));
        assert!(svg.contains("<title>Add &lt;contact&gt;</title>"));
    }

    #[cfg(feature = "qr")]
    #[test]
    fn test_png_and_data_uri() {
        let png = render_png("hello", &QrOptions::png()).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

        let uri = render_png_data_uri("hello", &QrOptions::png()).unwrap();
        assert!(uri.starts_with("data:image/png;base64,"));

        let tag = render_img_tag("hello", &QrOptions::png().with_title("Add contact"));
        assert!(tag.starts_with(r#"<img src="data:image/png;base64,"#));
        assert!(tag.contains(r#"alt="Add contact""#));
    }

    #[cfg(feature = "qr")]
    #[test]
    fn test_oversized_payload_renders_nothing() {
        // Level H tops out at 1273 bytes
        let payload = "x".repeat(4000);
        assert_eq!(render_svg(&payload, &QrOptions::svg()), "");
        assert_eq!(render_png(&payload, &QrOptions::png()), None);
    }
}
