// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Keyframe index — the in-memory list of absolute blob positions of
//! every FullFrame in a recording, in emission order.
//!
//! During recording the index lives as a side-car blob that is appended
//! to as each keyframe is written (so a crash mid-recording leaves a
//! usable index behind, see [`crate::recovery`]); once a recording is
//! finalized, the same bytes are spliced onto the tail of the recording
//! and the side-car is deleted. This mirrors the teacher's
//! `storage::index::SegmentIndex`, which is likewise a small in-memory
//! structure that is rebuilt by scanning the underlying store rather than
//! kept as its own durable file across restarts — here the "scan"
//! degenerates to "read the already-written side-car blob back."

use crate::blob::{BlobStore, ReadHandle, WriteHandle};
use crate::codec::{read_padded, write_padded, PADDED_WIDTH};
use crate::error::Result;

/// In-memory list of keyframe positions.
#[derive(Debug, Default, Clone)]
pub struct KeyframeIndex {
    positions: Vec<u64>,
}

impl KeyframeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, pos: u64) {
        self.positions.push(pos);
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn get(&self, k: usize) -> Option<u64> {
        self.positions.get(k).copied()
    }

    /// Total byte length this index occupies on disk — always a multiple
    /// of [`PADDED_WIDTH`].
    pub fn byte_len(&self) -> u64 {
        (self.positions.len() * PADDED_WIDTH) as u64
    }

    /// Append one padded position to an open index blob.
    pub fn append_one<S: BlobStore>(store: &mut S, handle: &mut WriteHandle, pos: u64) -> Result<()> {
        write_padded(store, handle, pos)
    }

    /// Read back `byte_len` bytes of padded positions (a multiple of
    /// [`PADDED_WIDTH`]) starting at the handle's current position.
    pub fn read_from<S: BlobStore>(
        store: &mut S,
        handle: &mut ReadHandle,
        byte_len: u64,
    ) -> Result<Self> {
        let count = (byte_len / PADDED_WIDTH as u64) as usize;
        let mut positions = Vec::with_capacity(count);
        for _ in 0..count {
            positions.push(read_padded(store, handle)?);
        }
        Ok(Self { positions })
    }
}
