//! Data file resolution
//!
//! Maps a schema's logical source file name onto the concrete files present
//! in the source directory. Export tooling writes either a single file, a
//! gzip-compressed file, or a numbered multi-part series, so for
//! `trades.dat` the resolver accepts:
//!
//! - `trades.dat`
//! - `trades.dat.gz`
//! - `trades.dat.001`, `trades.dat.002`, ... (optionally `.gz`-suffixed)
//!
//! Matches are returned in lexicographic order, which is the part order the
//! export tool wrote them in. An empty result is not an error; the caller
//! decides whether a table without data is worth a warning.

use crate::error::Result;
use crate::schema::RecordDescriptor;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// Boundary for locating a table's data files under a source directory.
pub trait DataFileResolver: Send + Sync {
    fn resolve(&self, schema: &RecordDescriptor, dir: &Path) -> Result<Vec<PathBuf>>;
}

/// Filesystem resolver implementing the naming rules above.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsDataFileResolver;

impl FsDataFileResolver {
    pub fn new() -> Self {
        Self
    }
}

impl DataFileResolver for FsDataFileResolver {
    fn resolve(&self, schema: &RecordDescriptor, dir: &Path) -> Result<Vec<PathBuf>> {
        let base = schema.source_file();
        let mut matches: Vec<PathBuf> = Vec::new();

        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if matches_source(base, &name) {
                matches.push(path);
            }
        }

        matches.sort();
        Ok(matches)
    }
}

/// Whether `name` is one of the accepted on-disk spellings of `base`.
fn matches_source(base: &str, name: &str) -> bool {
    if name == base {
        return true;
    }
    let Some(rest) = name.strip_prefix(base) else {
        return false;
    };
    match rest.strip_prefix('.') {
        Some("gz") => true,
        Some(part) => is_part_suffix(part),
        None => false,
    }
}

/// Numbered part suffix: digits, optionally followed by `.gz`.
fn is_part_suffix(part: &str) -> bool {
    let digits = part.strip_suffix(".gz").unwrap_or(part);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Open a data file for sequential reading, transparently decompressing a
/// `.gz` file.
pub fn open_data_reader(path: &Path) -> Result<Box<dyn Read + Send>> {
    let file = BufReader::new(File::open(path)?);
    if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        Ok(Box::new(GzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

/// On-disk size of a data file; this is the "compressed size" a
/// [`DataFileInfo`](crate::stats::DataFileInfo) reports, whether or not the
/// file is actually compressed.
pub fn on_disk_size(path: &Path) -> Result<u64> {
    Ok(std::fs::metadata(path)?.len())
}
