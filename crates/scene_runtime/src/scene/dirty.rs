//! Dirty-propagation pass
//!
//! Runs once per frame before any binding or draw work. Only objects whose
//! dirty flag is set get their parameter block rebuilt, so a scene where
//! nothing moves costs nothing here.

use crate::render::{FrameReplicatedStore, ObjectParams, RenderError};

use super::object_table::ObjectTable;

/// What one pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropagationStats {
    /// Parameter blocks written
    pub written: usize,
    /// Whether the store was flushed
    pub flushed: bool,
}

/// Upload every dirty object into all replicas and flush once
pub fn propagate_dirty(
    table: &mut ObjectTable,
    store: &mut FrameReplicatedStore,
) -> Result<PropagationStats, RenderError> {
    let mut written = 0;

    for (id, record) in table.iter_mut().filter(|(_, r)| r.is_dirty()) {
        let params = ObjectParams::from_record(record);
        store.write_at_all_replicas(id, params.as_bytes())?;
        record.clear_dirty();
        written += 1;
    }

    let flushed = if written > 0 { store.flush()? } else { false };
    if written > 0 {
        log::trace!("Propagated {} dirty objects", written);
    }

    Ok(PropagationStats { written, flushed })
}
