//! Copying a reachability closure between stores.
//!
//! Identifiers survive the copy unchanged: content ids are hashes of the
//! bytes, and pointers keep their ids and targets.

use gentle_store::{DataStore, StoreError};
use tracing::info;

use crate::error::ReachResult;
use crate::findall::{findall, Reachability};

/// What a transfer copied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransferReport {
    /// Content entries copied, plain and JSON.
    pub content: usize,
    pub pointers: usize,
}

impl TransferReport {
    pub fn total(&self) -> usize {
        self.content + self.pointers
    }
}

/// Copy everything in `reach` from `source` into `dest`: content first,
/// so every pointer target exists by the time pointers are set.
fn copy_closure(
    reach: &Reachability,
    source: &dyn DataStore,
    dest: &dyn DataStore,
) -> ReachResult<TransferReport> {
    let mut report = TransferReport::default();
    for id in reach.content_ids() {
        let bytes = source.content().get(id)?;
        let copied = dest.content().put(&bytes)?;
        if copied != *id {
            return Err(StoreError::HashMismatch {
                id: *id,
                computed: copied,
            }
            .into());
        }
        report.content += 1;
    }
    for id in &reach.pointers {
        let target = source.get_pointer(id)?;
        dest.set_pointer(id, &target)?;
        report.pointers += 1;
    }
    Ok(report)
}

/// Copy the closure of `root` from `local` into `remote`.
///
/// `root` may be a partial identifier; it is resolved in `local`.
pub fn export(
    root: &str,
    local: &dyn DataStore,
    remote: &dyn DataStore,
) -> ReachResult<TransferReport> {
    let reach = findall(local, &[root])?;
    let report = copy_closure(&reach, local, remote)?;
    info!(
        root,
        content = report.content,
        pointers = report.pointers,
        "exported closure"
    );
    Ok(report)
}

/// Copy the closure of `root` from `remote` into `local`.
///
/// The mirror of [`export`]: `root` is resolved in `remote`.
pub fn import(
    root: &str,
    local: &dyn DataStore,
    remote: &dyn DataStore,
) -> ReachResult<TransferReport> {
    let reach = findall(remote, &[root])?;
    let report = copy_closure(&reach, remote, local)?;
    info!(
        root,
        content = report.content,
        pointers = report.pointers,
        "imported closure"
    );
    Ok(report)
}
