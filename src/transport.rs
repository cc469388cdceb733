//! JSONL stream files.
//!
//! Each named stream (control changes, mentions, results, late, audit) is a
//! newline-delimited JSON file `<data_dir>/<stream>.jsonl`. Readers consume a
//! file to its end; writers append one record per line.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};

pub const STREAM_EXTENSION: &str = "jsonl";

pub fn stream_path(data_dir: &Path, stream: &str) -> PathBuf {
    data_dir.join(format!("{}.{}", stream, STREAM_EXTENSION))
}

/// Sequential reader over one stream file.
pub struct StreamReader {
    stream: String,
    lines: Lines<BufReader<File>>,
    line_no: u64,
}

impl StreamReader {
    pub async fn open(data_dir: &Path, stream: &str) -> Result<Self> {
        let path = stream_path(data_dir, stream);
        let file = File::open(&path)
            .await
            .with_context(|| format!("Failed to open stream {} at {}", stream, path.display()))?;
        Ok(Self {
            stream: stream.to_string(),
            lines: BufReader::new(file).lines(),
            line_no: 0,
        })
    }

    /// Next non-blank record, `None` at end of stream.
    pub async fn next_record(&mut self) -> Result<Option<String>> {
        loop {
            let line = self
                .lines
                .next_line()
                .await
                .with_context(|| format!("Failed reading stream {}", self.stream))?;
            let Some(line) = line else {
                return Ok(None);
            };
            self.line_no += 1;
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                return Ok(Some(trimmed.to_string()));
            }
        }
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn line_no(&self) -> u64 {
        self.line_no
    }
}

/// Append-only writer for one stream file.
pub struct StreamWriter {
    path: PathBuf,
    file: File,
}

impl StreamWriter {
    pub async fn create(data_dir: &Path, stream: &str) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir)
            .await
            .with_context(|| format!("Failed to create data dir {}", data_dir.display()))?;
        let path = stream_path(data_dir, stream);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to open {} for append", path.display()))?;
        Ok(Self { path, file })
    }

    pub async fn append(&mut self, record: &str) -> Result<()> {
        let mut line = String::with_capacity(record.len() + 1);
        line.push_str(record);
        line.push('\n');
        self.file.write_all(line.as_bytes()).await?;
        self.file.flush().await?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
