//! JSONL directory sink
//!
//! Writes each target as `<root>/<table>.jsonl`, one entry per line:
//!
//! ```json
//! {"key":0,"id":42,"name":"ABC","score":3.5}
//! ```
//!
//! `current_size` reports the number of lines already in the target file, so
//! a finished load makes the next run skip the table.

use super::{BulkSink, BulkWriter, SinkError, SinkResult, SinkTarget};
use crate::record::DecodedRecord;
use async_trait::async_trait;
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWriteExt, BufWriter};

pub struct JsonlSink {
    root: PathBuf,
}

impl JsonlSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn target_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.jsonl"))
    }
}

#[async_trait]
impl BulkSink for JsonlSink {
    async fn create_target(&self, name: &str) -> SinkResult<Box<dyn SinkTarget>> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(Box::new(JsonlTarget {
            name: name.to_string(),
            path: self.target_path(name),
        }))
    }

    async fn drop_target(&self, name: &str) -> SinkResult<()> {
        match tokio::fs::remove_file(self.target_path(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

struct JsonlTarget {
    name: String,
    path: PathBuf,
}

#[async_trait]
impl SinkTarget for JsonlTarget {
    fn name(&self) -> &str {
        &self.name
    }

    async fn current_size(&self) -> SinkResult<u64> {
        let meta = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        if meta.len() == 0 {
            return Ok(0);
        }
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || count_lines(&path))
            .await
            .map_err(|e| SinkError::Other(format!("line count task failed: {e}")))?
    }

    async fn open_writer(&self) -> SinkResult<Box<dyn BulkWriter>> {
        let file = tokio::fs::File::create(&self.path).await?;
        Ok(Box::new(JsonlWriter {
            writer: BufWriter::new(file),
        }))
    }
}

fn count_lines(path: &Path) -> SinkResult<u64> {
    let mut file = std::fs::File::open(path)?;
    let mut buf = [0u8; 64 * 1024];
    let mut lines = 0u64;
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        lines += buf[..n].iter().filter(|&&b| b == b'\n').count() as u64;
    }
    Ok(lines)
}

#[derive(Serialize)]
struct JsonlEntry<'a> {
    key: i64,
    #[serde(flatten)]
    record: &'a DecodedRecord,
}

struct JsonlWriter {
    writer: BufWriter<tokio::fs::File>,
}

#[async_trait]
impl BulkWriter for JsonlWriter {
    async fn add(&mut self, key: i64, record: DecodedRecord) -> SinkResult<()> {
        let mut line = serde_json::to_vec(&JsonlEntry {
            key,
            record: &record,
        })?;
        line.push(b'\n');
        self.writer.write_all(&line).await?;
        Ok(())
    }

    async fn close(mut self: Box<Self>) -> SinkResult<()> {
        self.writer.flush().await?;
        Ok(())
    }
}
