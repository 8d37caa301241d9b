use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::constants::MAX_JOURNAL_PAYLOAD;
use crate::error::{HealthNexusError, Result};

// Each journal record header: [seq: u64][len: u32][reserved: 4 bytes][checksum: 32 bytes]
const ENTRY_HEADER_SIZE: usize = 48;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalRecord {
    pub sequence: u64,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JournalStats {
    pub bytes: u64,
    pub last_sequence: u64,
    pub appends_since_checkpoint: u64,
    /// Bytes discarded from a torn or corrupt tail when the journal was opened.
    pub truncated_bytes: u64,
}

/// Append-only, checksummed log of store mutations written next to the snapshot.
///
/// Every append is synced before it returns, so a record is either fully present or cut off
/// at the tail; a cut-off tail is discarded on the next open.
#[derive(Debug)]
pub struct Journal {
    file: File,
    path: PathBuf,
    write_head: u64,
    last_sequence: u64,
    appends_since_checkpoint: u64,
    truncated_bytes: u64,
}

impl Journal {
    /// Open (or create) the journal and return the intact records it holds.
    ///
    /// `base_sequence` is the sequence already materialized in the snapshot; new appends
    /// continue after whichever is larger, the snapshot or the journal tail.
    pub fn open(path: &Path, base_sequence: u64) -> Result<(Self, Vec<JournalRecord>)> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let bytes = fs_err::read(path)?;
        let (records, valid_end) = Self::scan_records(&bytes);

        let truncated_bytes = bytes.len() as u64 - valid_end;
        if truncated_bytes > 0 {
            tracing::warn!(
                target: "healthnexus::store",
                journal = %path.display(),
                valid_end,
                truncated_bytes,
                "discarding torn journal tail"
            );
            file.set_len(valid_end)?;
            file.sync_all()?;
        }

        let last_sequence = records
            .last()
            .map_or(base_sequence, |record| record.sequence.max(base_sequence));
        let journal = Self {
            file,
            path: path.to_path_buf(),
            write_head: valid_end,
            last_sequence,
            appends_since_checkpoint: records.len() as u64,
            truncated_bytes,
        };
        Ok((journal, records))
    }

    pub fn append(&mut self, payload: &[u8]) -> Result<u64> {
        if payload.len() > MAX_JOURNAL_PAYLOAD {
            return Err(HealthNexusError::CorruptJournal {
                offset: self.write_head,
                reason: format!(
                    "payload of {} bytes exceeds the {MAX_JOURNAL_PAYLOAD} byte limit",
                    payload.len()
                ),
            });
        }
        let sequence = self.last_sequence + 1;
        let mut entry = Vec::with_capacity(ENTRY_HEADER_SIZE + payload.len());
        entry.extend_from_slice(&sequence.to_le_bytes());
        entry.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        entry.extend_from_slice(&[0u8; 4]);
        entry.extend_from_slice(blake3::hash(payload).as_bytes());
        entry.extend_from_slice(payload);

        tracing::debug!(
            journal.write_head = self.write_head,
            journal.sequence = sequence,
            journal.payload_len = payload.len(),
            "journal append"
        );
        self.file.seek(SeekFrom::Start(self.write_head))?;
        if let Err(err) = self.file.write_all(&entry).and_then(|()| self.file.sync_data()) {
            self.discard_unacknowledged();
            return Err(err.into());
        }

        self.write_head += entry.len() as u64;
        self.last_sequence = sequence;
        self.appends_since_checkpoint += 1;
        Ok(sequence)
    }

    /// Drop every record once the snapshot holds them. The sequence keeps counting.
    pub fn reset(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.sync_all()?;
        self.write_head = 0;
        self.appends_since_checkpoint = 0;
        Ok(())
    }

    #[must_use]
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    #[must_use]
    pub fn appends_since_checkpoint(&self) -> u64 {
        self.appends_since_checkpoint
    }

    #[must_use]
    pub fn stats(&self) -> JournalStats {
        JournalStats {
            bytes: self.write_head,
            last_sequence: self.last_sequence,
            appends_since_checkpoint: self.appends_since_checkpoint,
            truncated_bytes: self.truncated_bytes,
        }
    }

    /// Cut the file back to the last acknowledged record so a failed append can never be
    /// replayed, even when its bytes reached the disk before the error.
    fn discard_unacknowledged(&mut self) {
        let trimmed = self
            .file
            .set_len(self.write_head)
            .and_then(|()| self.file.sync_all());
        if let Err(err) = trimmed {
            tracing::error!(
                target: "healthnexus::store",
                journal = %self.path.display(),
                write_head = self.write_head,
                error = %err,
                "could not discard failed journal append"
            );
        }
    }

    /// Walk records from the start, stopping at the first one that is incomplete, fails its
    /// checksum, or breaks sequence order. Returns the records and the end of the valid prefix.
    fn scan_records(bytes: &[u8]) -> (Vec<JournalRecord>, u64) {
        let mut records = Vec::new();
        let mut offset = 0usize;
        let mut previous = 0u64;

        while bytes.len() - offset >= ENTRY_HEADER_SIZE {
            let header = &bytes[offset..offset + ENTRY_HEADER_SIZE];
            let sequence = u64::from_le_bytes(header[0..8].try_into().unwrap_or([0; 8]));
            let length = u32::from_le_bytes(header[8..12].try_into().unwrap_or([0; 4])) as usize;
            let checksum = &header[16..48];

            if sequence == 0 || sequence <= previous || length > MAX_JOURNAL_PAYLOAD {
                break;
            }
            let start = offset + ENTRY_HEADER_SIZE;
            let Some(end) = start.checked_add(length).filter(|end| *end <= bytes.len()) else {
                break;
            };
            let payload = &bytes[start..end];
            if blake3::hash(payload).as_bytes() != checksum {
                break;
            }

            records.push(JournalRecord {
                sequence,
                payload: payload.to_vec(),
            });
            previous = sequence;
            offset = end;
        }
        (records, offset as u64)
    }
}
