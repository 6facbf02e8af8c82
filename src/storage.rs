// Uploaded attachment access
//
// Attachments are named relative to the media root (e.g. "vcards/press.vcf").
// Reads are bounded and the file handle never outlives a single call.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

/// Default upper bound for an uploaded .vcf
pub const DEFAULT_MAX_ATTACHMENT_BYTES: u64 = 256 * 1024;

/// Source of uploaded attachment bytes
pub trait AttachmentStore: Send + Sync {
    /// Read the whole attachment. Any failure is reported as an I/O error.
    fn read(&self, name: &str) -> io::Result<Vec<u8>>;
}

/// Attachments stored on the local filesystem under a media root
#[derive(Debug, Clone)]
pub struct MediaDir {
    root: PathBuf,
    max_bytes: u64,
}

impl MediaDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map an attachment name to a path inside the media root.
    /// Absolute names and `..` components are rejected.
    pub fn resolve_path(&self, name: &str) -> io::Result<PathBuf> {
        let relative = Path::new(name);
        let contained = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));

        if name.is_empty() || !contained {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("attachment name escapes media root: {:?}", name),
            ));
        }

        Ok(self.root.join(relative))
    }
}

impl AttachmentStore for MediaDir {
    fn read(&self, name: &str) -> io::Result<Vec<u8>> {
        let path = self.resolve_path(name)?;

        let file = File::open(&path)?;
        let mut bytes = Vec::new();
        // One byte past the limit tells an exact-size file apart from an oversized one
        file.take(self.max_bytes.saturating_add(1)).read_to_end(&mut bytes)?;

        if bytes.len() as u64 > self.max_bytes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("attachment {} exceeds {} bytes", path.display(), self.max_bytes),
            ));
        }

        Ok(bytes)
    }
}
