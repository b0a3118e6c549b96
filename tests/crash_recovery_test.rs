// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! End-to-end crash recovery: a recording session that never reaches
//! `finalize` leaves `recordingIndex.bin` behind; the next `Core` started
//! against the same store must splice it into a numbered artifact before
//! recording resumes.

use chronoshift::blob::{BlobStore, FileBlobStore};
use chronoshift::config::RecorderConfig;
use chronoshift::core::{Core, CoreState};
use chronoshift::playback::{PlaybackEngine, PlaybackEvent};
use chronoshift::region::LiveRegions;
use tempfile::tempdir;

#[test]
fn leftover_recording_is_spliced_on_next_startup() {
    let dir = tempdir().unwrap();

    // First "run": start recording, take a few steps, then simulate a
    // crash by dropping the Core without calling quit().
    {
        let store = FileBlobStore::new(dir.path()).unwrap();
        let mut core = Core::new(store, RecorderConfig::default());
        core.init_regions(|r| r.register("counter", 1)).unwrap();

        let mut buf = [0u8];
        let live = LiveRegions::new(core.regions().unwrap(), vec![&mut buf]).unwrap();
        core.start_recording(&live).unwrap();

        for step in 1..=3u8 {
            let mut b = [step];
            let mut l = LiveRegions::new(core.regions().unwrap(), vec![&mut b]).unwrap();
            core.step(&mut l, false).unwrap();
        }
        // core (and its open Recorder) is dropped here, mid-session.
    }

    // Second "run": a fresh Core against the same store must detect and
    // recover the leftover recording before anything else happens.
    let store = FileBlobStore::new(dir.path()).unwrap();
    let mut core = Core::new(store, RecorderConfig::default());
    let artifact = core.recover_if_needed().unwrap();
    assert_eq!(artifact.as_deref(), Some("crashRecording_0.bin"));

    assert!(core.store_mut().exists("crashRecording_0.bin"));
    assert!(!core.store_mut().exists("recordingIndex.bin"));
    assert_eq!(core.state(), CoreState::Idle);

    // A second call with nothing left over is a no-op.
    assert!(core.recover_if_needed().unwrap().is_none());

    // Normal operation resumes cleanly afterward.
    core.init_regions(|r| r.register("counter", 1)).unwrap();
    let mut buf = [9u8];
    let live = LiveRegions::new(core.regions().unwrap(), vec![&mut buf]).unwrap();
    core.start_recording(&live).unwrap();
    assert_eq!(core.state(), CoreState::Recording);
    core.quit(&live).unwrap();

    // The new session's `recording.bin` must start fresh at offset 0, not
    // carry the previous, unfinalized session's bytes underneath it.
    let set = core.regions().unwrap().clone();
    let mut playback_buf = [0u8];
    let mut playback_live = LiveRegions::new(&set, vec![&mut playback_buf]).unwrap();
    let mut engine =
        PlaybackEngine::open(core.store_mut(), &set, &mut playback_live, "recording.bin").unwrap();
    assert_eq!(playback_live.snapshot(), vec![9]);
    assert_eq!(engine.num_full_snapshots(), 1);
    assert_eq!(engine.forward_step(core.store_mut(), &mut playback_live).unwrap(), PlaybackEvent::Ended);
}

#[test]
fn recovery_counter_advances_across_successive_crashes() {
    let dir = tempdir().unwrap();

    for expected in 0..2u32 {
        {
            let store = FileBlobStore::new(dir.path()).unwrap();
            let mut core = Core::new(store, RecorderConfig::default());
            core.recover_if_needed().unwrap();
            core.init_regions(|r| r.register("counter", 1)).unwrap();
            let mut buf = [0u8];
            let live = LiveRegions::new(core.regions().unwrap(), vec![&mut buf]).unwrap();
            core.start_recording(&live).unwrap();
            // crash again without finalizing.
        }

        let store = FileBlobStore::new(dir.path()).unwrap();
        let mut core = Core::new(store, RecorderConfig::default());
        let artifact = core.recover_if_needed().unwrap().unwrap();
        assert_eq!(artifact, format!("crashRecording_{expected}.bin"));
    }

    // After two crash-and-recover cycles, a session that actually
    // finalizes must still produce a clean, independently playable
    // recording — not one with the prior unfinalized sessions' bytes
    // still sitting underneath its header.
    let store = FileBlobStore::new(dir.path()).unwrap();
    let mut core = Core::new(store, RecorderConfig::default());
    core.recover_if_needed().unwrap();
    core.init_regions(|r| r.register("counter", 1)).unwrap();
    let mut buf = [0u8];
    let live = LiveRegions::new(core.regions().unwrap(), vec![&mut buf]).unwrap();
    core.start_recording(&live).unwrap();
    for step in 1..=3u8 {
        let mut b = [step];
        let mut l = LiveRegions::new(core.regions().unwrap(), vec![&mut b]).unwrap();
        core.step(&mut l, false).unwrap();
    }
    let mut final_buf = [3u8];
    let final_live = LiveRegions::new(core.regions().unwrap(), vec![&mut final_buf]).unwrap();
    core.quit(&final_live).unwrap();

    let set = core.regions().unwrap().clone();
    let mut playback_buf = [0u8];
    let mut playback_live = LiveRegions::new(&set, vec![&mut playback_buf]).unwrap();
    let mut engine =
        PlaybackEngine::open(core.store_mut(), &set, &mut playback_live, "recording.bin").unwrap();
    assert_eq!(playback_live.snapshot(), vec![0]);
    for expected in 1..=3u8 {
        let ev = engine.forward_step(core.store_mut(), &mut playback_live).unwrap();
        assert_eq!(ev, PlaybackEvent::Applied);
        assert_eq!(playback_live.snapshot(), vec![expected]);
    }
}
