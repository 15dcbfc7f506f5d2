//! Append-only command log.
//!
//! Entries are u32-LE length-prefixed MessagePack frames. Every append is
//! flushed and fsynced before it is acknowledged; reading validates frame
//! integrity and gap-free ascending sequence numbers, and any corruption is
//! fatal rather than skipped.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::{ExecutionContext, PrevalenceError, Result};

/// A logged command: sequence number, replay context, and the serialized
/// command payload (opaque at this layer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub seq: u64,
    pub ctx: ExecutionContext,
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,
}

pub struct CommandLog {
    path: PathBuf,
    file: BufWriter<File>,
    last_seq: u64,
}

impl CommandLog {
    /// Opens (creating if missing) the log at `path` for appending.
    ///
    /// The sequence counter starts at 0; recovery establishes the real
    /// position via [`CommandLog::resume_from`] after replay.
    pub fn open(path: PathBuf) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                PrevalenceError::DurabilityFailure(format!("failed to open command log: {}", e))
            })?;
        Ok(Self {
            path,
            file: BufWriter::new(file),
            last_seq: 0,
        })
    }

    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    pub fn next_seq(&self) -> u64 {
        self.last_seq + 1
    }

    pub(crate) fn resume_from(&mut self, seq: u64) {
        self.last_seq = seq;
    }

    /// Durably appends a command. The frame is flushed and fsynced before the
    /// sequence counter advances; a failed append leaves the counter (and the
    /// root, which is only mutated afterwards) untouched.
    pub fn append(&mut self, ctx: &ExecutionContext, payload: &[u8]) -> Result<u64> {
        let seq = self.last_seq + 1;
        debug_assert_eq!(seq, ctx.seq);
        let entry = LogEntry {
            seq,
            ctx: ctx.clone(),
            payload: payload.to_vec(),
        };
        let frame = rmp_serde::to_vec(&entry).map_err(|e| {
            PrevalenceError::SerializationFailure(format!("failed to encode log entry: {}", e))
        })?;
        self.file
            .write_all(&(frame.len() as u32).to_le_bytes())
            .map_err(append_err)?;
        self.file.write_all(&frame).map_err(append_err)?;
        self.file.flush().map_err(append_err)?;
        self.file.get_ref().sync_all().map_err(append_err)?;
        self.last_seq = seq;
        Ok(seq)
    }

    /// Entries with sequence strictly greater than `seq`, ascending.
    /// Re-reads the file from durable storage on every call.
    pub fn entries_since(&self, seq: u64) -> Result<Vec<LogEntry>> {
        Self::read_entries_since(&self.path, seq)
    }

    /// Like [`CommandLog::entries_since`], but against a path directly and
    /// without opening the log for appending. A missing file reads as empty.
    pub fn read_entries_since(path: &Path, seq: u64) -> Result<Vec<LogEntry>> {
        let entries: Vec<LogEntry> = Self::read_entries(path)?
            .into_iter()
            .filter(|e| e.seq > seq)
            .collect();
        if let Some(first) = entries.first() {
            if first.seq != seq + 1 {
                return Err(PrevalenceError::CorruptLog(format!(
                    "sequence gap: expected entry {} after {}, found {}",
                    seq + 1,
                    seq,
                    first.seq
                )));
            }
        }
        Ok(entries)
    }

    /// All entries in the log, validated for frame integrity and gap-free
    /// ascending sequence numbers.
    pub fn read_entries(path: &Path) -> Result<Vec<LogEntry>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(path).map_err(|e| {
            PrevalenceError::DurabilityFailure(format!(
                "failed to open command log for reading: {}",
                e
            ))
        })?;
        let mut reader = BufReader::new(file);
        let mut entries: Vec<LogEntry> = Vec::new();
        loop {
            let mut len_bytes = [0u8; 4];
            let read = read_up_to(&mut reader, &mut len_bytes)
                .map_err(|e| PrevalenceError::CorruptLog(format!("failed to read entry length: {}", e)))?;
            if read == 0 {
                break;
            }
            if read < len_bytes.len() {
                return Err(PrevalenceError::CorruptLog(
                    "torn entry length at end of log".to_string(),
                ));
            }
            let len = u32::from_le_bytes(len_bytes) as u64;
            if len == 0 {
                return Err(PrevalenceError::CorruptLog("zero-length entry".to_string()));
            }
            let mut frame = Vec::new();
            let got = reader
                .by_ref()
                .take(len)
                .read_to_end(&mut frame)
                .map_err(|e| PrevalenceError::CorruptLog(format!("failed to read entry: {}", e)))?;
            if (got as u64) < len {
                return Err(PrevalenceError::CorruptLog(format!(
                    "torn entry: expected {} bytes, found {}",
                    len, got
                )));
            }
            let entry: LogEntry = rmp_serde::from_slice(&frame).map_err(|e| {
                PrevalenceError::CorruptLog(format!("failed to decode log entry: {}", e))
            })?;
            if let Some(prev) = entries.last() {
                if entry.seq != prev.seq + 1 {
                    return Err(PrevalenceError::CorruptLog(format!(
                        "sequence gap: entry {} follows {}",
                        entry.seq, prev.seq
                    )));
                }
            }
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Discards entries with sequence <= `seq`. Callers must only pass a
    /// sequence already covered by a durable snapshot. The retained tail is
    /// rewritten through a temp file and published atomically, so a crash
    /// mid-truncation leaves either the old log or the new one.
    pub fn truncate_up_to(&mut self, seq: u64) -> Result<()> {
        let retained: Vec<LogEntry> = Self::read_entries(&self.path)?
            .into_iter()
            .filter(|e| e.seq > seq)
            .collect();
        let dir = self.path.parent().ok_or_else(|| {
            PrevalenceError::DurabilityFailure("command log has no parent directory".to_string())
        })?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
            PrevalenceError::DurabilityFailure(format!("failed to create temp log: {}", e))
        })?;
        for entry in &retained {
            let frame = rmp_serde::to_vec(entry).map_err(|e| {
                PrevalenceError::SerializationFailure(format!("failed to encode log entry: {}", e))
            })?;
            tmp.write_all(&(frame.len() as u32).to_le_bytes())
                .map_err(truncate_err)?;
            tmp.write_all(&frame).map_err(truncate_err)?;
        }
        tmp.flush().map_err(truncate_err)?;
        tmp.as_file().sync_all().map_err(truncate_err)?;
        tmp.persist(&self.path).map_err(|e| {
            PrevalenceError::DurabilityFailure(format!("failed to publish truncated log: {}", e))
        })?;
        // The old append handle points at the unlinked inode; reopen.
        let file = OpenOptions::new().append(true).open(&self.path).map_err(|e| {
            PrevalenceError::DurabilityFailure(format!("failed to reopen command log: {}", e))
        })?;
        self.file = BufWriter::new(file);
        Ok(())
    }
}

fn append_err(e: std::io::Error) -> PrevalenceError {
    PrevalenceError::DurabilityFailure(format!("failed to append to command log: {}", e))
}

fn truncate_err(e: std::io::Error) -> PrevalenceError {
    PrevalenceError::DurabilityFailure(format!("failed to rewrite command log: {}", e))
}

/// Reads until `buf` is full or EOF; returns the number of bytes read.
fn read_up_to(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
