use std::io::Write;
use std::path::Path;

use atomic_write_file::AtomicWriteFile;
use serde::{Deserialize, Serialize};

use crate::constants::{SNAPSHOT_HEADER_SIZE, SNAPSHOT_MAGIC, SNAPSHOT_VERSION};
use crate::error::{HealthNexusError, Result};
use crate::types::{Doctor, IndexSpec};

/// Materialized collection state as of journal sequence `sequence`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotState {
    pub sequence: u64,
    pub indexes: Vec<IndexSpec>,
    pub doctors: Vec<Doctor>,
}

/// Replace the snapshot at `path` atomically; readers see either the old or the new file.
pub fn write_snapshot(path: &Path, state: &SnapshotState) -> Result<()> {
    let bytes = encode(state)?;
    let mut file = AtomicWriteFile::open(path)?;
    file.write_all(&bytes)?;
    file.commit()?;
    tracing::debug!(
        target: "healthnexus::store",
        snapshot = %path.display(),
        sequence = state.sequence,
        doctors = state.doctors.len(),
        bytes = bytes.len(),
        "snapshot written"
    );
    Ok(())
}

/// Load the snapshot, or `None` when the store has never been checkpointed.
pub fn read_snapshot(path: &Path) -> Result<Option<SnapshotState>> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs_err::read(path)?;
    decode(&bytes).map(Some).map_err(|reason| HealthNexusError::CorruptSnapshot {
        path: path.to_path_buf(),
        reason,
    })
}

fn encode(state: &SnapshotState) -> Result<Vec<u8>> {
    let payload = serde_json::to_vec(state)?;
    let mut bytes = Vec::with_capacity(SNAPSHOT_HEADER_SIZE + payload.len());
    bytes.extend_from_slice(&SNAPSHOT_MAGIC);
    bytes.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&[0u8; 2]);
    bytes.extend_from_slice(blake3::hash(&payload).as_bytes());
    bytes.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

fn decode(bytes: &[u8]) -> std::result::Result<SnapshotState, String> {
    if bytes.len() < SNAPSHOT_HEADER_SIZE {
        return Err(format!("{} bytes is shorter than the header", bytes.len()));
    }
    if bytes[0..4] != SNAPSHOT_MAGIC {
        return Err("bad magic".to_string());
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != SNAPSHOT_VERSION {
        return Err(format!("unsupported snapshot version {version:#06x}"));
    }
    let checksum = &bytes[8..40];
    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&bytes[40..48]);
    let length = u64::from_le_bytes(len_bytes);

    let payload = &bytes[SNAPSHOT_HEADER_SIZE..];
    if payload.len() as u64 != length {
        return Err(format!(
            "payload length {} does not match header {length}",
            payload.len()
        ));
    }
    if blake3::hash(payload).as_bytes() != checksum {
        return Err("checksum mismatch".to_string());
    }
    serde_json::from_slice(payload).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::TempDir;

    use super::*;
    use crate::types::{NewDoctor, policy_indexes};

    fn state() -> SnapshotState {
        let doctor = NewDoctor::new("Dr. Ngo", "ngo@clinic.org", "555-0102", "Dermatology")
            .into_doctor("$2b$04$abcdefghijklmnopqrstuuABCDEFGHIJKLMNOPQRSTUVWXYZ01234", Utc::now());
        SnapshotState {
            sequence: 7,
            indexes: policy_indexes(),
            doctors: vec![doctor],
        }
    }

    #[test]
    fn write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clinic.hnx");
        assert!(read_snapshot(&path).unwrap().is_none());

        let state = state();
        write_snapshot(&path, &state).unwrap();
        assert_eq!(read_snapshot(&path).unwrap(), Some(state));
    }

    #[test]
    fn detects_corruption() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clinic.hnx");
        write_snapshot(&path, &state()).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        let mid = SNAPSHOT_HEADER_SIZE + 10;
        bytes[mid] ^= 0x20;
        std::fs::write(&path, &bytes).unwrap();

        let err = read_snapshot(&path).unwrap_err();
        assert!(matches!(err, HealthNexusError::CorruptSnapshot { .. }));
    }
}
