// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Persisted single-integer settings: an arbitrarily-named blob holding
//! one NUL-terminated decimal integer (spec §6), used by crash recovery
//! for `nextRecoveryNumber`.

use crate::blob::BlobStore;
use crate::codec::{read_int, write_int};
use crate::error::Result;

/// Read a persisted integer setting, defaulting to `0` if the blob does
/// not exist yet.
pub fn read_setting<S: BlobStore>(store: &mut S, name: &str) -> Result<i64> {
    if !store.exists(name) {
        return Ok(0);
    }
    let mut handle = store.open_read(name)?;
    let value = read_int(store, &mut handle)?;
    store.close_read(handle)?;
    Ok(value)
}

/// Overwrite a persisted integer setting.
pub fn write_setting<S: BlobStore>(store: &mut S, name: &str, value: i64) -> Result<()> {
    store.delete(name)?;
    let mut handle = store.open_write(name)?;
    write_int(store, &mut handle, value)?;
    store.close_write(handle)
}
