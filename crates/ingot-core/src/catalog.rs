//! Schema manifest catalog
//!
//! The control-file grammar lives outside the loader; by the time a run
//! starts, every loadable table is described by a JSON schema manifest in
//! the source directory. This module is the `parse(file) -> schema | null`
//! boundary: it reads one manifest into a validated [`RecordDescriptor`],
//! and scans a directory for the full schema set of a run.
//!
//! # Format
//!
//! A manifest is named `<table>.schema.json`:
//!
//! ```json
//! {
//!   "table": "trade_history",
//!   "source_file": "trade_history.dat",
//!   "record_length": 24,
//!   "fields": [
//!     { "name": "id", "kind": "integer64" },
//!     { "name": "name", "kind": "fixed_text", "width": 8 },
//!     { "name": "score", "kind": "float64" }
//!   ]
//! }
//! ```
//!
//! `source_file` defaults to `<table>.dat`; `record_length` is an optional
//! cross-check against the summed field widths; `"loadable": false` marks a
//! manifest that describes no loadable table.

use crate::error::{LoadError, Result};
use crate::schema::{FieldDescriptor, FieldKind, RecordDescriptor, NUMERIC_WIDTH};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// File name suffix identifying a schema manifest.
pub const MANIFEST_SUFFIX: &str = ".schema.json";

/// On-disk form of one parsed control file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaManifest {
    pub table: String,

    /// Logical data file name; defaults to `<table>.dat`.
    #[serde(default)]
    pub source_file: Option<String>,

    /// Declared total record length, cross-checked against the field
    /// widths when present.
    #[serde(default)]
    pub record_length: Option<usize>,

    /// `false` marks a manifest that is not a loadable table.
    #[serde(default = "default_loadable")]
    pub loadable: bool,

    pub fields: Vec<ManifestField>,
}

fn default_loadable() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestField {
    pub name: String,
    pub kind: FieldKind,

    /// Required for `fixed_text`; optional for the numeric kinds, where a
    /// conflicting declaration is schema corruption.
    #[serde(default)]
    pub width: Option<usize>,
}

impl SchemaManifest {
    /// Convert into a validated descriptor, or `None` for a non-loadable
    /// manifest.
    pub fn into_descriptor(self) -> Result<Option<RecordDescriptor>> {
        if !self.loadable {
            return Ok(None);
        }

        let mut fields = Vec::with_capacity(self.fields.len());
        for spec in &self.fields {
            let field = match spec.kind {
                FieldKind::Integer64 | FieldKind::Float64 => {
                    if let Some(width) = spec.width {
                        if width != NUMERIC_WIDTH {
                            return Err(LoadError::SchemaInconsistency {
                                table: self.table.clone(),
                                reason: format!(
                                    "field '{}' declares width {} but kind {} is fixed at {}",
                                    spec.name, width, spec.kind, NUMERIC_WIDTH
                                ),
                            });
                        }
                    }
                    match spec.kind {
                        FieldKind::Integer64 => FieldDescriptor::integer64(&spec.name),
                        _ => FieldDescriptor::float64(&spec.name),
                    }
                },
                FieldKind::FixedText => {
                    let width = spec.width.ok_or_else(|| LoadError::SchemaInconsistency {
                        table: self.table.clone(),
                        reason: format!("text field '{}' is missing a width", spec.name),
                    })?;
                    FieldDescriptor::fixed_text(&spec.name, width)
                },
            };
            fields.push(field);
        }

        let source_file = self
            .source_file
            .unwrap_or_else(|| format!("{}.dat", self.table));
        let descriptor = RecordDescriptor::new(self.table, source_file, fields)?;
        if let Some(declared) = self.record_length {
            descriptor.verify_declared_length(declared)?;
        }
        Ok(Some(descriptor))
    }
}

/// Parse one manifest file.
///
/// `Ok(None)` means the manifest is not a loadable table; malformed JSON
/// and layout violations are [`LoadError::SchemaInconsistency`].
pub fn parse_schema(path: &Path) -> Result<Option<RecordDescriptor>> {
    let raw = std::fs::read_to_string(path)?;
    let manifest: SchemaManifest =
        serde_json::from_str(&raw).map_err(|e| LoadError::SchemaInconsistency {
            table: manifest_stem(path),
            reason: format!("invalid manifest JSON: {e}"),
        })?;
    manifest.into_descriptor()
}

/// Table identity for errors raised before the manifest parses.
fn manifest_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.strip_suffix(MANIFEST_SUFFIX)
        .map(str::to_string)
        .unwrap_or(name)
}

/// Result of scanning a source directory for schema manifests.
#[derive(Debug, Default)]
pub struct CatalogScan {
    /// Parsed, validated schemas, ordered by table name.
    pub schemas: Vec<Arc<RecordDescriptor>>,
    /// Per-table parse failures; these count as failed tables but do not
    /// stop the run.
    pub failures: Vec<(String, LoadError)>,
}

/// Scan `dir` for `*.schema.json` manifests.
///
/// Files without the manifest suffix are ignored. A manifest that fails to
/// parse is recorded as a failure for its table; scanning continues.
pub fn scan_dir(dir: &Path) -> Result<CatalogScan> {
    let mut manifest_paths: Vec<PathBuf> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_manifest = path
            .file_name()
            .map(|n| n.to_string_lossy().ends_with(MANIFEST_SUFFIX))
            .unwrap_or(false);
        if is_manifest && path.is_file() {
            manifest_paths.push(path);
        }
    }
    manifest_paths.sort();

    let mut scan = CatalogScan::default();
    let mut seen: HashSet<String> = HashSet::new();
    for path in manifest_paths {
        match parse_schema(&path) {
            Ok(Some(descriptor)) => {
                if !seen.insert(descriptor.table_name().to_string()) {
                    let table = descriptor.table_name().to_string();
                    warn!(table = %table, path = %path.display(), "Duplicate schema manifest");
                    scan.failures.push((
                        table.clone(),
                        LoadError::SchemaInconsistency {
                            table,
                            reason: "duplicate schema manifest for table".to_string(),
                        },
                    ));
                    continue;
                }
                debug!(
                    table = %descriptor.table_name(),
                    record_len = descriptor.record_len(),
                    fields = descriptor.fields().len(),
                    "Parsed schema manifest"
                );
                scan.schemas.push(Arc::new(descriptor));
            },
            Ok(None) => {
                debug!(path = %path.display(), "Manifest is not a loadable table; skipping");
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to parse schema manifest");
                scan.failures.push((manifest_stem(&path), e));
            },
        }
    }

    Ok(scan)
}
