// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Save / Restore — the `SaveBlob` header format shared by every
//! recording and by stand-alone save files.
//!
//! `SaveBlob := TOTAL_BYTES | COUNT | FINGERPRINT_HEX | (D_i, N_i)* | RAW_BYTES_i*`
//!
//! Restore reads and verifies every piece of metadata *before* touching
//! any live memory — `ChunkPool::open` in the teacher reads and validates
//! a pool header before trusting the file's contents, and this follows
//! the same order, but escalates a mismatch to a hard failure instead of
//! treating it as an empty/fresh file (spec §4.3 requires refusing a
//! mismatched layout outright rather than tolerating it).

use tracing::{error, info};

use crate::blob::{BlobStore, ReadHandle, WriteHandle};
use crate::codec::{read_int, read_raw, read_str, write_int, write_raw, write_str};
use crate::error::{CoreError, Result};
use crate::region::{LiveRegions, Region, RegionSet};

/// Write a `SaveBlob` header plus every region's current bytes, in
/// registration order, to a freshly opened write handle. Any write
/// failure aborts; a next `open_read` will simply see a truncated file,
/// which [`restore`] rejects.
pub fn save<S: BlobStore>(
    store: &mut S,
    set: &RegionSet,
    live: &LiveRegions<'_>,
    handle: &mut WriteHandle,
) -> Result<()> {
    let total_bytes = set.total_bytes();
    let count = set.count();
    let fingerprint = set.fingerprint();

    write_int(store, handle, total_bytes as i64)?;
    write_int(store, handle, count as i64)?;
    write_str(store, handle, &fingerprint)?;

    for region in set.regions() {
        write_str(store, handle, &region.description)?;
        write_int(store, handle, region.length as i64)?;
    }

    write_raw(store, handle, &live.snapshot())?;
    Ok(())
}

/// Read and verify a `SaveBlob` header against `set`, then (only if every
/// check passes) overwrite `live` with the stored bytes.
///
/// Returns `Ok(())` on success. On any mismatch, returns `Err` *without*
/// mutating `live` at all — metadata is fully verified before the first
/// region byte is read.
pub fn restore<S: BlobStore>(
    store: &mut S,
    set: &RegionSet,
    live: &mut LiveRegions<'_>,
    handle: &mut ReadHandle,
) -> Result<()> {
    let total_bytes = read_int(store, handle)? as usize;
    let count = read_int(store, handle)? as usize;
    let fingerprint = read_str(store, handle)?;

    if total_bytes != set.total_bytes() || count != set.count() || fingerprint != set.fingerprint()
    {
        error!(
            expected_bytes = set.total_bytes(),
            got_bytes = total_bytes,
            expected_count = set.count(),
            got_count = count,
            expected_fp = %set.fingerprint(),
            got_fp = %fingerprint,
            "save header does not match the live region set"
        );
        return Err(CoreError::Integrity("save header mismatch".into()));
    }

    let mut stored_regions = Vec::with_capacity(count);
    for _ in 0..count {
        let description = read_str(store, handle)?;
        let length = read_int(store, handle)? as usize;
        stored_regions.push(Region { description, length });
    }

    if !set.matches_metadata(count, total_bytes, &stored_regions) {
        error!("save header per-region metadata does not match the live region set");
        return Err(CoreError::Integrity("save per-region metadata mismatch".into()));
    }

    // Metadata fully verified; now and only now read the raw bytes.
    let bytes = read_raw(store, handle, total_bytes)?;
    live.apply(&bytes)?;
    info!(total_bytes, count, "restore applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::FileBlobStore;
    use crate::region::RegionRegistry;
    use tempfile::tempdir;

    fn make_set() -> RegionSet {
        let mut reg = RegionRegistry::new();
        reg.register("pos", 4).unwrap();
        reg.register("hp", 2).unwrap();
        reg.seal()
    }

    #[test]
    fn round_trip() {
        let dir = tempdir().unwrap();
        let mut store = FileBlobStore::new(dir.path()).unwrap();
        let set = make_set();

        let mut pos = [1u8, 2, 3, 4];
        let mut hp = [5u8, 6];
        let live = LiveRegions::new(&set, vec![&mut pos, &mut hp]).unwrap();

        let mut w = store.open_write("save.bin").unwrap();
        save(&mut store, &set, &live, &mut w).unwrap();
        store.close_write(w).unwrap();

        let mut pos2 = [0u8; 4];
        let mut hp2 = [0u8; 2];
        let mut live2 = LiveRegions::new(&set, vec![&mut pos2, &mut hp2]).unwrap();
        let mut r = store.open_read("save.bin").unwrap();
        restore(&mut store, &set, &mut live2, &mut r).unwrap();
        store.close_read(r).unwrap();

        assert_eq!(pos2, [1, 2, 3, 4]);
        assert_eq!(hp2, [5, 6]);
    }

    #[test]
    fn restore_rejects_layout_drift_without_mutating_live() {
        let dir = tempdir().unwrap();
        let mut store = FileBlobStore::new(dir.path()).unwrap();
        let set = make_set();

        let mut pos = [1u8, 2, 3, 4];
        let mut hp = [5u8, 6];
        let live = LiveRegions::new(&set, vec![&mut pos, &mut hp]).unwrap();
        let mut w = store.open_write("save.bin").unwrap();
        save(&mut store, &set, &live, &mut w).unwrap();
        store.close_write(w).unwrap();

        // Drifted layout: an extra "mp" region.
        let mut reg2 = RegionRegistry::new();
        reg2.register("pos", 4).unwrap();
        reg2.register("hp", 2).unwrap();
        reg2.register("mp", 2).unwrap();
        let drifted_set = reg2.seal();

        let mut pos2 = [9u8, 9, 9, 9];
        let mut hp2 = [9u8, 9];
        let mut mp2 = [9u8, 9];
        let mut live2 =
            LiveRegions::new(&drifted_set, vec![&mut pos2, &mut hp2, &mut mp2]).unwrap();
        let mut r = store.open_read("save.bin").unwrap();
        let result = restore(&mut store, &drifted_set, &mut live2, &mut r);
        assert!(result.is_err());
        // Untouched: restore must bail before writing any region byte.
        assert_eq!(pos2, [9, 9, 9, 9]);
        assert_eq!(hp2, [9, 9]);
        assert_eq!(mp2, [9, 9]);
    }
}
