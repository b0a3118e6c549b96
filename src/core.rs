// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! `Core` — the single value that owns every piece of per-run state and
//! exposes the `IDLE → RECORDING ↔ PLAYBACK` state machine of spec §4.7.
//!
//! Grounded on the teacher's `RecordingManager`: one top-level owner,
//! constructed once by the host, holding the shared resources and
//! exposing the lifecycle operations the CLI calls into.

use tracing::{info, warn};

use crate::blob::BlobStore;
use crate::config::RecorderConfig;
use crate::error::{CoreError, Result};
use crate::recorder::{Recorder, RecordingNames};
use crate::recovery;
use crate::region::{LiveRegions, RegionRegistry, RegionSet};
use crate::save;

/// Which of the spec's three states the core is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreState {
    Idle,
    Recording,
    Playback,
}

/// Owns the blob store, the frozen region layout, and whichever of
/// `Recorder`/`PlaybackEngine` is active for the current state.
pub struct Core<S: BlobStore> {
    store: S,
    config: RecorderConfig,
    set: Option<RegionSet>,
    recorder: Option<Recorder>,
    playback: Option<crate::playback::PlaybackEngine>,
    interrupted: bool,
    state: CoreState,
}

impl<S: BlobStore> Core<S> {
    pub fn new(store: S, config: RecorderConfig) -> Self {
        Self {
            store,
            config,
            set: None,
            recorder: None,
            playback: None,
            interrupted: false,
            state: CoreState::Idle,
        }
    }

    pub fn state(&self) -> CoreState {
        self.state
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// The single initialization phase: `build` receives a fresh
    /// [`RegionRegistry`] and may register any number of regions on it.
    /// The registry is sealed into a [`RegionSet`] on return; calling
    /// this more than once replaces the previous layout and is only
    /// valid while IDLE.
    pub fn init_regions<F>(&mut self, build: F) -> Result<()>
    where
        F: FnOnce(&mut RegionRegistry) -> Result<()>,
    {
        if self.state != CoreState::Idle {
            warn!("init_regions called outside IDLE");
            return Err(CoreError::Precondition(
                "region initialization attempted outside IDLE".into(),
            ));
        }
        let mut registry = RegionRegistry::with_max_regions(self.config.max_regions);
        build(&mut registry)?;
        self.set = Some(registry.seal());
        Ok(())
    }

    /// The frozen region layout, if [`Core::init_regions`] has run.
    pub fn regions(&self) -> Result<&RegionSet> {
        self.set()
    }

    fn set(&self) -> Result<&RegionSet> {
        self.set.as_ref().ok_or_else(|| {
            CoreError::Precondition("no region set registered before this operation".into())
        })
    }

    /// Check for, and perform, crash recovery. Call once at startup
    /// before entering RECORDING.
    pub fn recover_if_needed(&mut self) -> Result<Option<String>> {
        let names = &self.config.blob_names;
        if recovery::needs_recovery(&self.store, &names.recording, &names.recording_index) {
            let artifact = recovery::recover(&mut self.store, &names.recording, &names.recording_index)?;
            Ok(Some(artifact))
        } else {
            Ok(None)
        }
    }

    /// `IDLE → RECORDING`: open the recording stream and emit the
    /// initial keyframe from `live`.
    pub fn start_recording(&mut self, live: &LiveRegions<'_>) -> Result<()> {
        if self.state != CoreState::Idle {
            return Err(CoreError::Precondition("start_recording outside IDLE".into()));
        }
        let set = self.set()?.clone();
        let names = RecordingNames {
            recording: &self.config.blob_names.recording,
            index: &self.config.blob_names.recording_index,
        };
        let recorder = Recorder::start(
            &mut self.store,
            &set,
            live,
            names,
            self.config.region_cap_bytes,
            self.config.keyframe_period,
        )?;
        self.recorder = Some(recorder);
        self.state = CoreState::Recording;
        info!("entered RECORDING");
        Ok(())
    }

    /// One host tick. In RECORDING, consumes `live` into the next frame;
    /// `final_flag` requests a save-and-finalize shutdown. In PLAYBACK,
    /// advances the playback cursor by one tick's worth of steps and
    /// applies the result to `live`.
    pub fn step(&mut self, live: &mut LiveRegions<'_>, final_flag: bool) -> Result<()> {
        match self.state {
            CoreState::Recording => {
                if let Some(recorder) = self.recorder.as_mut() {
                    recorder.step(&mut self.store, live)?;
                }
                if final_flag {
                    self.quit(live)?;
                }
                Ok(())
            }
            CoreState::Playback => {
                let ev = self
                    .playback
                    .as_mut()
                    .expect("playback engine present while in PLAYBACK")
                    .advance_tick(&mut self.store, live)?;
                if ev == crate::playback::PlaybackEvent::Ended {
                    self.stop_playback(live)?;
                }
                Ok(())
            }
            CoreState::Idle => Ok(()),
        }
    }

    /// `RECORDING → PLAYBACK`: finalize the current recording, remember
    /// that RECORDING was interrupted, and open `playback.bin`.
    pub fn start_playback(&mut self, live: &mut LiveRegions<'_>) -> Result<()> {
        if self.state != CoreState::Recording {
            return Err(CoreError::Precondition("start_playback outside RECORDING".into()));
        }
        if let Some(recorder) = self.recorder.take() {
            recorder.finalize(&mut self.store)?;
        }
        self.interrupted = true;
        let set = self.set()?.clone();
        let playback = crate::playback::PlaybackEngine::open(
            &mut self.store,
            &set,
            live,
            &self.config.blob_names.playback,
        )?;
        self.playback = Some(playback);
        self.state = CoreState::Playback;
        info!("entered PLAYBACK");
        Ok(())
    }

    /// `PLAYBACK → RECORDING` (or `IDLE`): on user stop or natural
    /// end-of-stream. If RECORDING was interrupted to enter PLAYBACK, a
    /// fresh RECORDING session starts from the current live state.
    pub fn stop_playback(&mut self, live: &mut LiveRegions<'_>) -> Result<()> {
        if self.state != CoreState::Playback {
            return Err(CoreError::Precondition("stop_playback outside PLAYBACK".into()));
        }
        if let Some(playback) = self.playback.take() {
            playback.close(&mut self.store)?;
        }
        self.state = CoreState::Idle;
        if self.interrupted {
            self.interrupted = false;
            self.start_recording(live)?;
        }
        info!("left PLAYBACK");
        Ok(())
    }

    /// Terminal transition from any state: persist `live` to `save.bin`
    /// and finalize the recording if one is running.
    pub fn quit(&mut self, live: &LiveRegions<'_>) -> Result<()> {
        let set = self.set()?.clone();
        let mut handle = self.store.open_write(&self.config.blob_names.save)?;
        save::save(&mut self.store, &set, live, &mut handle)?;
        self.store.close_write(handle)?;

        if let Some(recorder) = self.recorder.take() {
            recorder.finalize(&mut self.store)?;
        }
        self.state = CoreState::Idle;
        info!("quit: state saved and recording finalized");
        Ok(())
    }
}
