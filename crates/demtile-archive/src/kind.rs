//! Archive kind detection.

use std::path::Path;

/// Archive formats the extractor can open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveKind {
    /// `.zip`
    Zip,
    /// `.gz`, a single compressed file
    Gzip,
}

impl ArchiveKind {
    /// Detect the kind from the file extension (case-insensitive).
    pub fn detect(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "zip" => Some(ArchiveKind::Zip),
            "gz" | "gzip" => Some(ArchiveKind::Gzip),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveKind::Zip => "zip",
            ArchiveKind::Gzip => "gz",
        }
    }
}
