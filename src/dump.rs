//! Dump file access.
//!
//! Dumps are opened as plain byte streams, with transparent gzip
//! decompression detected from the file extension. Progress is reported on
//! compressed bytes read, so the byte counters line up with the on-disk
//! file size.

use crate::progress::ProgressReader;
use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Name and size of the dump as recorded into watermark documents.
#[derive(Debug, Clone)]
pub struct DumpMeta {
    pub name: String,
    pub size: u64,
}

pub fn stat(path: &Path) -> Result<DumpMeta> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("cannot stat dump file: {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("dump.sql")
        .to_string();
    Ok(DumpMeta {
        name,
        size: metadata.len(),
    })
}

/// Compression format detected from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
}

impl Compression {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("gz" | "gzip") => Compression::Gzip,
            _ => Compression::None,
        }
    }

    pub fn wrap_reader<'a>(&self, reader: Box<dyn Read + 'a>) -> Box<dyn Read + 'a> {
        match self {
            Compression::None => reader,
            Compression::Gzip => Box::new(GzDecoder::new(reader)),
        }
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Compression::None => write!(f, "none"),
            Compression::Gzip => write!(f, "gzip"),
        }
    }
}

/// Opens a dump for scanning. `progress` receives cumulative bytes read from
/// the underlying file after each buffer refill.
pub fn open<'a, F>(path: &Path, progress: F) -> Result<Box<dyn Read + 'a>>
where
    F: FnMut(u64) + 'a,
{
    let file = File::open(path)
        .with_context(|| format!("cannot open dump file: {}", path.display()))?;
    let tracked = ProgressReader::new(file, progress);
    Ok(Compression::from_path(path).wrap_reader(Box::new(tracked)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn detects_gzip_from_extension() {
        assert_eq!(
            Compression::from_path(&PathBuf::from("dump.sql.gz")),
            Compression::Gzip
        );
        assert_eq!(
            Compression::from_path(&PathBuf::from("dump.SQL")),
            Compression::None
        );
    }

    #[test]
    fn reads_gzipped_dump_transparently() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mini.sql.gz");

        let file = File::create(&path).unwrap();
        let mut enc = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        enc.write_all(b"INSERT INTO t VALUES (1);").unwrap();
        enc.finish().unwrap();

        let mut reader = open(&path, |_| {}).unwrap();
        let mut text = String::new();
        reader.read_to_string(&mut text).unwrap();
        assert_eq!(text, "INSERT INTO t VALUES (1);");
    }

    #[test]
    fn stat_reports_name_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.sql");
        std::fs::write(&path, b"SELECT 1;").unwrap();

        let meta = stat(&path).unwrap();
        assert_eq!(meta.name, "export.sql");
        assert_eq!(meta.size, 9);
    }
}
