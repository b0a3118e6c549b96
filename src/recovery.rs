// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Crash recovery: if a previous run left `recordingIndex.bin` behind
//! without finalizing, splice it and `recording.bin` into a numbered
//! recovery artifact on the next startup.
//!
//! Grounded on `ChunkPool::open`'s startup recovery scan — detect
//! leftover state from a previous run and fold it into the current
//! session before normal operation resumes.

use tracing::{info, warn};

use crate::blob::{copy_blob, BlobStore};
use crate::codec::{write_padded, write_str, MAGIC_FOOTER};
use crate::error::Result;
use crate::settings::{read_setting, write_setting};

const NEXT_RECOVERY_NUMBER: &str = "nextRecoveryNumber";

/// True if the previous run left an unfinalized recording behind.
pub fn needs_recovery<S: BlobStore>(store: &S, recording_name: &str, index_name: &str) -> bool {
    store.exists(index_name) && store.exists(recording_name)
}

/// Splice `recording_name` and `index_name` into `crashRecording_<N>.bin`,
/// delete `index_name`, and bump `nextRecoveryNumber`. Returns the name
/// of the produced artifact.
pub fn recover<S: BlobStore>(
    store: &mut S,
    recording_name: &str,
    index_name: &str,
) -> Result<String> {
    let n = read_setting(store, NEXT_RECOVERY_NUMBER)?;
    let artifact_name = format!("crashRecording_{n}.bin");

    let mut artifact = store.open_write(&artifact_name)?;
    copy_blob(store, recording_name, &mut artifact)?;
    let index_len = copy_blob(store, index_name, &mut artifact)?;
    write_padded(store, &mut artifact, index_len)?;
    write_str(store, &mut artifact, MAGIC_FOOTER)?;
    store.close_write(artifact)?;

    store.delete(index_name)?;
    write_setting(store, NEXT_RECOVERY_NUMBER, n + 1)?;

    warn!(artifact = %artifact_name, "recovered unfinalized recording");
    info!(next_recovery_number = n + 1, "recovery counter advanced");
    Ok(artifact_name)
}
