//! Pre-write hooks run by `DoctorStore` on every mutation path.

use crate::error::Result;
use crate::types::{Doctor, DoctorPatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Insert,
    Import,
    Replace,
}

/// The candidate write a hook may inspect or rewrite before it is validated and persisted.
#[derive(Debug)]
pub enum PendingWrite<'a> {
    /// Whole-document write (`insert`, `import`, `replace`).
    Document {
        kind: WriteKind,
        doctor: &'a mut Doctor,
    },
    /// Partial write (`update`, `update_where`); runs once per call, before any record matches.
    Patch(&'a mut DoctorPatch),
}

/// A hook registered on the store. Returning an error aborts the write before anything is
/// journaled.
pub trait WriteHook: Send + Sync {
    fn name(&self) -> &'static str;

    fn before_write(&self, write: &mut PendingWrite<'_>) -> Result<()>;
}
