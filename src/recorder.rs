// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Recorder — produces the append-only `recording` stream: a `SaveBlob`
//! header, an initial full snapshot, then one frame per step (an
//! xor-diff against the previous step, with a full snapshot inserted
//! every `keyframe_period` steps), plus a side-car `recordingIndex` blob
//! of keyframe positions kept current as it goes.
//!
//! Shaped after the teacher's `storage::global_writer::writer_loop`: a
//! single writer, append-only, checking whether a rotation/keyframe is
//! due before each write — generalized here from "rotate to the next
//! pool file" to "emit a keyframe and reset the diff counter."

use tracing::{debug, warn};

use crate::blob::{BlobStore, WriteHandle};
use crate::codec::{write_int, write_padded, write_str, MAGIC_FOOTER};
use crate::error::Result;
use crate::index::KeyframeIndex;
use crate::region::{LiveRegions, RegionSet};
use crate::save;

/// Names of the two blobs a recording session writes to.
pub struct RecordingNames<'a> {
    pub recording: &'a str,
    pub index: &'a str,
}

/// Two-slot ring holding the previous and current logical snapshot, used
/// to build the next diff frame.
struct Ring {
    slots: [Vec<u8>; 2],
    current: usize,
}

impl Ring {
    fn new(total_bytes: usize) -> Self {
        Self { slots: [vec![0u8; total_bytes], vec![0u8; total_bytes]], current: 0 }
    }

    fn prev(&self) -> &[u8] {
        &self.slots[self.current]
    }

    fn push(&mut self, new_state: Vec<u8>) {
        let next = 1 - self.current;
        self.slots[next] = new_state;
        self.current = next;
    }

    fn current(&self) -> &[u8] {
        &self.slots[self.current]
    }
}

/// Drives one recording session. Created via [`Recorder::start`], fed one
/// [`Recorder::step`] per host tick, and closed with [`Recorder::finalize`].
pub struct Recorder {
    recording: WriteHandle,
    index_handle: Option<WriteHandle>,
    index_name: String,
    index: KeyframeIndex,
    ring: Ring,
    keyframe_period: u32,
    diffs_since_full: u32,
    diff_enabled: bool,
    has_regions: bool,
}

impl Recorder {
    /// Open `names.recording` and `names.index` for write, write the
    /// `SaveBlob` header, and emit the initial full snapshot.
    pub fn start<S: BlobStore>(
        store: &mut S,
        set: &RegionSet,
        live: &LiveRegions<'_>,
        names: RecordingNames<'_>,
        region_cap_bytes: usize,
        keyframe_period: u32,
    ) -> Result<Self> {
        // `open_write` always appends; a fresh recording session must start
        // at offset 0 even if a blob of this name survived a previous,
        // unfinalized session (spec §4.3: the `SaveBlob` header sits at the
        // very start of the recording).
        store.delete(names.recording)?;
        store.delete(names.index)?;
        let mut recording = store.open_write(names.recording)?;
        let index_handle = store.open_write(names.index)?;

        save::save(store, set, live, &mut recording)?;

        let diff_enabled = set.total_bytes() <= region_cap_bytes;
        let mut recorder = Recorder {
            recording,
            index_handle: Some(index_handle),
            index_name: names.index.to_string(),
            index: KeyframeIndex::new(),
            ring: Ring::new(set.total_bytes()),
            keyframe_period,
            diffs_since_full: 0,
            diff_enabled,
            has_regions: set.count() > 0,
        };

        if recorder.has_regions {
            let initial = live.snapshot();
            recorder.emit_full_frame(store, &initial)?;
            recorder.ring.push(initial);
        }

        if diff_enabled {
            debug!(total_bytes = set.total_bytes(), keyframe_period, "recording started");
        } else {
            warn!(
                total_bytes = set.total_bytes(),
                region_cap_bytes,
                "region set exceeds capacity: diff recording disabled, every step emits a full snapshot"
            );
        }
        Ok(recorder)
    }

    /// Consume one step's worth of live state into the recording. A
    /// no-op when no regions were registered (spec §8 scenario A: the
    /// recorder emits no frames at all in that case).
    pub fn step<S: BlobStore>(&mut self, store: &mut S, live: &LiveRegions<'_>) -> Result<()> {
        if !self.has_regions {
            return Ok(());
        }
        let new_state = live.snapshot();

        if !self.diff_enabled {
            self.emit_full_frame(store, &new_state)?;
            self.ring.push(new_state);
            return Ok(());
        }

        let prev = self.ring.prev().to_vec();
        self.emit_diff_frame(store, &prev, &new_state)?;
        self.diffs_since_full += 1;

        self.ring.push(new_state);

        if self.diffs_since_full == self.keyframe_period {
            let snapshot = self.ring.current().to_vec();
            self.emit_full_frame(store, &snapshot)?;
            self.diffs_since_full = 0;
        }
        Ok(())
    }

    fn emit_full_frame<S: BlobStore>(&mut self, store: &mut S, state: &[u8]) -> Result<()> {
        let start_pos = store.tell_write(&mut self.recording)?;
        let index_handle = self.index_handle.as_mut().expect("index handle open while recording");
        KeyframeIndex::append_one(store, index_handle, start_pos)?;
        self.index.push(start_pos);

        write_str(store, &mut self.recording, "F")?;
        store.write(&mut self.recording, state)?;
        write_padded(store, &mut self.recording, start_pos)?;
        debug!(start_pos, "full frame emitted");
        Ok(())
    }

    fn emit_diff_frame<S: BlobStore>(
        &mut self,
        store: &mut S,
        prev: &[u8],
        new_state: &[u8],
    ) -> Result<()> {
        let start_pos = store.tell_write(&mut self.recording)?;
        write_str(store, &mut self.recording, "D")?;

        let mut last_pos: usize = 0;
        for b in 0..prev.len() {
            if prev[b] != new_state[b] {
                let offset = (b - last_pos) as i64;
                write_int(store, &mut self.recording, offset)?;
                store.write(&mut self.recording, &[prev[b] ^ new_state[b]])?;
                last_pos = b;
            }
        }
        write_int(store, &mut self.recording, -1)?;
        write_padded(store, &mut self.recording, start_pos)?;
        debug!(start_pos, "diff frame emitted");
        Ok(())
    }

    /// Close the index blob, splice its bytes onto the tail of the
    /// recording, delete the side-car, and append the padded index
    /// length and the magic footer.
    pub fn finalize<S: BlobStore>(mut self, store: &mut S) -> Result<()> {
        let index_handle = self.index_handle.take().expect("index handle present");
        store.close_write(index_handle)?;

        let index_len = crate::blob::copy_blob(store, &self.index_name, &mut self.recording)?;
        store.delete(&self.index_name)?;

        write_padded(store, &mut self.recording, index_len)?;
        write_str(store, &mut self.recording, MAGIC_FOOTER)?;
        store.close_write(self.recording)?;
        debug!(index_len, "recording finalized");
        Ok(())
    }

    pub fn num_keyframes(&self) -> usize {
        self.index.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::FileBlobStore;
    use crate::region::RegionRegistry;
    use tempfile::tempdir;

    fn names() -> RecordingNames<'static> {
        RecordingNames { recording: "recording.bin", index: "recordingIndex.bin" }
    }

    #[test]
    fn single_region_three_steps_emits_expected_frames() {
        let dir = tempdir().unwrap();
        let mut store = FileBlobStore::new(dir.path()).unwrap();

        let mut reg = RegionRegistry::new();
        reg.register("buf", 4).unwrap();
        let set = reg.seal();

        let mut buf = [0u8, 0, 0, 0];
        let live = LiveRegions::new(&set, vec![&mut buf]).unwrap();
        let mut rec = Recorder::start(&mut store, &set, &live, names(), 1 << 20, 60).unwrap();

        let mut buf1 = [1u8, 0, 0, 0];
        let live1 = LiveRegions::new(&set, vec![&mut buf1]).unwrap();
        rec.step(&mut store, &live1).unwrap();

        let mut buf2 = [1u8, 2, 0, 0];
        let live2 = LiveRegions::new(&set, vec![&mut buf2]).unwrap();
        rec.step(&mut store, &live2).unwrap();

        let mut buf3 = [1u8, 2, 0, 0xFF];
        let live3 = LiveRegions::new(&set, vec![&mut buf3]).unwrap();
        rec.step(&mut store, &live3).unwrap();

        assert_eq!(rec.num_keyframes(), 1);
        rec.finalize(&mut store).unwrap();

        assert!(!store.exists("recordingIndex.bin"));
        assert!(store.exists("recording.bin"));
    }

    #[test]
    fn keyframe_period_inserts_full_frames() {
        let dir = tempdir().unwrap();
        let mut store = FileBlobStore::new(dir.path()).unwrap();

        let mut reg = RegionRegistry::new();
        reg.register("buf", 1).unwrap();
        let set = reg.seal();

        let mut buf = [0u8];
        let live = LiveRegions::new(&set, vec![&mut buf]).unwrap();
        let mut rec = Recorder::start(&mut store, &set, &live, names(), 1 << 20, 3).unwrap();

        for step in 1..=9u8 {
            let mut b = [step];
            let l = LiveRegions::new(&set, vec![&mut b]).unwrap();
            rec.step(&mut store, &l).unwrap();
        }
        // Keyframes at step 0, 3, 6, 9 => 4 total.
        assert_eq!(rec.num_keyframes(), 4);
        rec.finalize(&mut store).unwrap();
    }

    #[test]
    fn cap_overflow_degrades_to_full_frames_every_step() {
        let dir = tempdir().unwrap();
        let mut store = FileBlobStore::new(dir.path()).unwrap();

        let mut reg = RegionRegistry::new();
        reg.register("buf", 8).unwrap();
        let set = reg.seal();

        let mut buf = [0u8; 8];
        let live = LiveRegions::new(&set, vec![&mut buf]).unwrap();
        // cap smaller than total_bytes => diff recording disabled.
        let mut rec = Recorder::start(&mut store, &set, &live, names(), 4, 60).unwrap();

        for step in 1..=5u8 {
            let mut b = [step; 8];
            let l = LiveRegions::new(&set, vec![&mut b]).unwrap();
            rec.step(&mut store, &l).unwrap();
        }
        // initial + 5 steps, all full frames since diffing is disabled.
        assert_eq!(rec.num_keyframes(), 6);
        rec.finalize(&mut store).unwrap();
    }

    #[test]
    fn empty_region_set_emits_no_frames() {
        let dir = tempdir().unwrap();
        let mut store = FileBlobStore::new(dir.path()).unwrap();

        let reg = RegionRegistry::new();
        let set = reg.seal();
        let live = LiveRegions::new(&set, vec![]).unwrap();
        let mut rec = Recorder::start(&mut store, &set, &live, names(), 1 << 20, 60).unwrap();
        rec.step(&mut store, &live).unwrap();
        assert_eq!(rec.num_keyframes(), 0);
        rec.finalize(&mut store).unwrap();
    }
}
