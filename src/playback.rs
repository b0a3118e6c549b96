// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Playback engine: open a finalized recording, restore its header, and
//! step forward, step backward, jump to a keyframe, or run under speed
//! control.
//!
//! Grounded on the teacher's `export_range`: both read indexed locations
//! out of a store and re-materialize them in order. Here that becomes
//! "apply frames to live memory, forward or backward" instead of
//! "concatenate segment payloads to a file."

use tracing::{debug, error, info, warn};

use crate::blob::{BlobStore, ReadHandle};
use crate::codec::{read_int, read_padded, read_raw, read_str, MAGIC_FOOTER, PADDED_WIDTH};
use crate::error::{CoreError, Result};
use crate::index::KeyframeIndex;
use crate::region::{LiveRegions, RegionSet};
use crate::save;

/// Outcome of one playback step, reported back to the host so it can
/// decide whether to keep ticking playback or fall back to recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// A frame was applied to live memory.
    Applied,
    /// Playback reached the start or end of the stream; the engine is
    /// no longer running.
    Ended,
    /// Paused, or a slow-motion sub-tick that did not yet fire a step.
    Idle,
}

/// Drives a single finalized recording. See spec §4.5's speed table —
/// `speed` never takes the value `0` or `-1`; that omission is
/// deliberate, not a bug (see DESIGN.md open question 3).
pub struct PlaybackEngine {
    handle: ReadHandle,
    index: KeyframeIndex,
    total_bytes: usize,
    full_snapshot_last_played: usize,
    num_full_snapshots: usize,
    direction: i32,
    speed: i32,
    sub_tick: u32,
    paused: bool,
    running: bool,
}

impl PlaybackEngine {
    /// Open `name` for playback: restore the `SaveBlob` header into
    /// `live`, verify the magic footer, locate and load the keyframe
    /// index, and apply the first keyframe.
    pub fn open<S: BlobStore>(
        store: &mut S,
        set: &RegionSet,
        live: &mut LiveRegions<'_>,
        name: &str,
    ) -> Result<Self> {
        if set.count() == 0 {
            warn!("no memory records");
            return Err(CoreError::Precondition("no memory records".into()));
        }

        let mut handle = store.open_read(name)?;
        let total_len = handle.len();

        save::restore(store, set, live, &mut handle)?;

        let footer_len = MAGIC_FOOTER.len() as u64 + 1;
        let footer_pos = total_len.checked_sub(footer_len).ok_or_else(|| {
            error!("recording too short to contain a magic footer");
            CoreError::Integrity("truncated recording: no room for footer".into())
        })?;
        store.seek(&mut handle, footer_pos)?;
        let footer = read_str(store, &mut handle)?;
        if footer != MAGIC_FOOTER {
            error!(got = %footer, "magic footer mismatch");
            return Err(CoreError::Integrity("missing or corrupt magic footer".into()));
        }

        let index_len_pos = footer_pos.checked_sub(PADDED_WIDTH as u64).ok_or_else(|| {
            CoreError::Integrity("truncated recording: no room for index length".into())
        })?;
        store.seek(&mut handle, index_len_pos)?;
        let index_length = read_padded(store, &mut handle)?;

        let index_start = index_len_pos
            .checked_sub(index_length)
            .ok_or_else(|| CoreError::Integrity("index length exceeds recording size".into()))?;
        store.seek(&mut handle, index_start)?;
        let index = KeyframeIndex::read_from(store, &mut handle, index_length)?;
        if index.is_empty() {
            error!("keyframe index is empty for a non-empty region set");
            return Err(CoreError::Integrity("empty keyframe index".into()));
        }

        let mut engine = PlaybackEngine {
            handle,
            num_full_snapshots: index.len(),
            index,
            total_bytes: set.total_bytes(),
            full_snapshot_last_played: 0,
            direction: 1,
            speed: 1,
            sub_tick: 0,
            paused: false,
            running: true,
        };

        let first_pos = engine.index.get(0).expect("checked non-empty above");
        store.seek(&mut engine.handle, first_pos)?;
        engine.apply_full_frame_here(store, live)?;
        info!(keyframes = engine.num_full_snapshots, "playback opened");
        Ok(engine)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn full_snapshot_last_played(&self) -> usize {
        self.full_snapshot_last_played
    }

    pub fn num_full_snapshots(&self) -> usize {
        self.num_full_snapshots
    }

    pub fn speed(&self) -> i32 {
        self.speed
    }

    pub fn direction(&self) -> i32 {
        self.direction
    }

    /// Close the underlying read handle, releasing the blob store
    /// resource (spec §5: handles released on exit from PLAYBACK).
    pub fn close<S: BlobStore>(self, store: &mut S) -> Result<()> {
        store.close_read(self.handle)
    }

    fn apply_full_frame_here<S: BlobStore>(
        &mut self,
        store: &mut S,
        live: &mut LiveRegions<'_>,
    ) -> Result<()> {
        let tag = read_str(store, &mut self.handle)?;
        if tag != "F" {
            return Err(CoreError::Integrity(format!(
                "expected FullFrame tag, got {tag:?}"
            )));
        }
        let bytes = read_raw(store, &mut self.handle, self.total_bytes)?;
        live.apply(&bytes)?;
        read_padded(store, &mut self.handle)?;
        Ok(())
    }

    /// Apply a DiffFrame body (the tag byte must already have been
    /// consumed by the caller) and skip its footer.
    fn apply_diff_frame_here<S: BlobStore>(
        &mut self,
        store: &mut S,
        live: &mut LiveRegions<'_>,
    ) -> Result<()> {
        let mut buf = live.snapshot();
        let mut pos: i64 = 0;
        loop {
            let offset = read_int(store, &mut self.handle)?;
            if offset == -1 {
                break;
            }
            pos += offset;
            let mut byte = [0u8; 1];
            let n = store.read(&mut self.handle, 1, &mut byte)?;
            if n != 1 {
                return Err(CoreError::Integrity("truncated diff frame".into()));
            }
            let idx = usize::try_from(pos)
                .map_err(|_| CoreError::Integrity("negative diff offset".into()))?;
            if idx >= buf.len() {
                return Err(CoreError::Integrity("diff offset out of range".into()));
            }
            buf[idx] ^= byte[0];
        }
        read_padded(store, &mut self.handle)?;
        live.apply(&buf)?;
        Ok(())
    }

    /// Advance one frame forward. See spec §4.5: attempt a DiffFrame
    /// first; on failure, apply the redundant FullFrame and, only if a
    /// DiffFrame immediately follows it, fold that in too so a keyframe
    /// boundary still counts as a single step. A FullFrame not followed
    /// by a DiffFrame (cap degradation, spec §8 invariant 7) is its own
    /// step instead of a sign of end-of-stream.
    pub fn forward_step<S: BlobStore>(
        &mut self,
        store: &mut S,
        live: &mut LiveRegions<'_>,
    ) -> Result<PlaybackEvent> {
        let saved_pos = store.tell_read(&mut self.handle)?;
        let tag = read_str(store, &mut self.handle);
        if matches!(tag, Ok(ref t) if t == "D") {
            self.apply_diff_frame_here(store, live)?;
            debug!(pos = saved_pos, "forward diff applied");
            return Ok(PlaybackEvent::Applied);
        }

        if self.full_snapshot_last_played + 1 >= self.num_full_snapshots {
            store.seek(&mut self.handle, saved_pos)?;
            info!("reached end of stream");
            self.running = false;
            return Ok(PlaybackEvent::Ended);
        }

        store.seek(&mut self.handle, saved_pos)?;
        self.apply_full_frame_here(store, live)?;
        self.full_snapshot_last_played += 1;

        let after_full = store.tell_read(&mut self.handle)?;
        let tag2 = read_str(store, &mut self.handle);
        if matches!(tag2, Ok(ref t) if t == "D") {
            self.apply_diff_frame_here(store, live)?;
            debug!(pos = saved_pos, "forward crossed keyframe boundary");
        } else {
            // No DiffFrame follows: either end of stream, or this
            // FullFrame was its own step (degraded recording). Leave the
            // cursor right after the FullFrame either way.
            store.seek(&mut self.handle, after_full)?;
            debug!(pos = saved_pos, "forward applied a standalone keyframe");
        }
        Ok(PlaybackEvent::Applied)
    }

    /// Step backward by re-applying the diff at the just-applied frame's
    /// own `startPos` (XOR is self-inverse) and rewinding the cursor
    /// there. See spec §4.5 and DESIGN.md open question 1: the footer
    /// preceding the cursor is the just-applied frame's *own* start, not
    /// the next frame's — that quirk is exactly what makes this work.
    pub fn backward_step<S: BlobStore>(
        &mut self,
        store: &mut S,
        live: &mut LiveRegions<'_>,
    ) -> Result<PlaybackEvent> {
        let cur = store.tell_read(&mut self.handle)?;
        let footer_pos = match cur.checked_sub(PADDED_WIDTH as u64) {
            Some(p) => p,
            None => {
                self.running = false;
                return Ok(PlaybackEvent::Ended);
            }
        };
        store.seek(&mut self.handle, footer_pos)?;
        let start_pos = read_padded(store, &mut self.handle)?;
        store.seek(&mut self.handle, start_pos)?;

        let tag = read_str(store, &mut self.handle);
        if matches!(tag, Ok(ref t) if t == "D") {
            self.apply_diff_frame_here(store, live)?;
            store.seek(&mut self.handle, start_pos)?;
            debug!(start_pos, "backward diff un-applied");
            return Ok(PlaybackEvent::Applied);
        }

        if self.full_snapshot_last_played == 0 {
            info!("reached start of stream");
            self.running = false;
            return Ok(PlaybackEvent::Ended);
        }

        store.seek(&mut self.handle, start_pos)?;
        self.apply_full_frame_here(store, live)?;
        self.full_snapshot_last_played -= 1;
        store.seek(&mut self.handle, start_pos)?;
        debug!(start_pos, "backward crossed keyframe boundary");
        self.backward_step(store, live)
    }

    fn step_once<S: BlobStore>(
        &mut self,
        store: &mut S,
        live: &mut LiveRegions<'_>,
    ) -> Result<PlaybackEvent> {
        if self.direction >= 1 {
            self.forward_step(store, live)
        } else {
            self.backward_step(store, live)
        }
    }

    /// Jump to the `k`-th keyframe and force one forward application of
    /// it, regardless of the current direction.
    pub fn jump_to_full_snapshot<S: BlobStore>(
        &mut self,
        store: &mut S,
        live: &mut LiveRegions<'_>,
        k: usize,
    ) -> Result<()> {
        let pos = self
            .index
            .get(k)
            .ok_or_else(|| CoreError::Precondition(format!("no keyframe {k}")))?;
        store.seek(&mut self.handle, pos)?;
        self.apply_full_frame_here(store, live)?;
        self.full_snapshot_last_played = k;
        Ok(())
    }

    pub fn jump_half_ahead<S: BlobStore>(
        &mut self,
        store: &mut S,
        live: &mut LiveRegions<'_>,
    ) -> Result<()> {
        let k = self.full_snapshot_last_played
            + (self.num_full_snapshots - self.full_snapshot_last_played) / 2;
        self.jump_to_full_snapshot(store, live, k)
    }

    pub fn jump_half_back<S: BlobStore>(
        &mut self,
        store: &mut S,
        live: &mut LiveRegions<'_>,
    ) -> Result<()> {
        let k = self.full_snapshot_last_played / 2;
        self.jump_to_full_snapshot(store, live, k)
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    pub fn normal(&mut self) {
        self.speed = 1;
        self.direction = 1;
        self.paused = false;
    }

    pub fn reverse(&mut self) {
        self.direction = -self.direction;
    }

    /// See spec §4.5's speed table — this ordering (paused, then ≥1,
    /// then the two slow-motion edges) is the exact transition set, not
    /// a simplification of it.
    pub fn faster<S: BlobStore>(
        &mut self,
        store: &mut S,
        live: &mut LiveRegions<'_>,
    ) -> Result<PlaybackEvent> {
        if self.paused {
            return self.step_once(store, live);
        }
        if self.speed >= 1 {
            self.speed += 1;
        } else if self.speed == -2 {
            self.speed = 1;
        } else if self.speed <= -4 {
            self.speed = -(self.speed.unsigned_abs() as i32 / 2);
        }
        Ok(PlaybackEvent::Idle)
    }

    pub fn slower(&mut self) {
        if self.speed > 1 {
            self.speed -= 1;
        } else if self.speed == 1 {
            self.speed = -2;
        } else if self.speed <= -2 {
            self.speed *= 2;
        }
    }

    /// One host tick: do nothing while paused, execute `speed` steps
    /// per tick at speed ≥ 1, or one step every `|speed|` ticks at
    /// speed ≤ −2.
    pub fn advance_tick<S: BlobStore>(
        &mut self,
        store: &mut S,
        live: &mut LiveRegions<'_>,
    ) -> Result<PlaybackEvent> {
        if self.paused || !self.running {
            return Ok(PlaybackEvent::Idle);
        }
        if self.speed >= 1 {
            let mut last = PlaybackEvent::Idle;
            for _ in 0..self.speed {
                last = self.step_once(store, live)?;
                if !self.running {
                    break;
                }
            }
            Ok(last)
        } else {
            self.sub_tick += 1;
            if self.sub_tick >= self.speed.unsigned_abs() {
                self.sub_tick = 0;
                self.step_once(store, live)
            } else {
                Ok(PlaybackEvent::Idle)
            }
        }
    }
}
