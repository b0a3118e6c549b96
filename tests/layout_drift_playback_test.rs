// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Scenario E, at the playback boundary: opening a recording against a
//! region layout that has drifted since it was recorded must be refused
//! before any live byte is written — complements `save.rs`'s own
//! restore-level drift test by exercising the same check through
//! `PlaybackEngine::open`.

use chronoshift::blob::FileBlobStore;
use chronoshift::playback::PlaybackEngine;
use chronoshift::recorder::{Recorder, RecordingNames};
use chronoshift::region::{LiveRegions, RegionRegistry};
use tempfile::tempdir;

fn names() -> RecordingNames<'static> {
    RecordingNames { recording: "recording.bin", index: "recordingIndex.bin" }
}

#[test]
fn drifted_region_set_is_refused_without_mutating_live() {
    let dir = tempdir().unwrap();
    let mut store = FileBlobStore::new(dir.path()).unwrap();

    let mut reg = RegionRegistry::new();
    reg.register("pos", 4).unwrap();
    reg.register("hp", 2).unwrap();
    let set = reg.seal();

    let mut pos = [1u8, 2, 3, 4];
    let mut hp = [5u8, 6];
    let live = LiveRegions::new(&set, vec![&mut pos, &mut hp]).unwrap();
    let rec = Recorder::start(&mut store, &set, &live, names(), 1 << 20, 60).unwrap();
    rec.finalize(&mut store).unwrap();

    // A binary rebuilt with an extra "mp" region must not be able to
    // open the old recording at all.
    let mut reg2 = RegionRegistry::new();
    reg2.register("pos", 4).unwrap();
    reg2.register("hp", 2).unwrap();
    reg2.register("mp", 2).unwrap();
    let drifted_set = reg2.seal();

    let mut pos2 = [9u8, 9, 9, 9];
    let mut hp2 = [9u8, 9];
    let mut mp2 = [9u8, 9];
    let mut drifted_live =
        LiveRegions::new(&drifted_set, vec![&mut pos2, &mut hp2, &mut mp2]).unwrap();

    let result =
        PlaybackEngine::open(&mut store, &drifted_set, &mut drifted_live, "recording.bin");
    assert!(result.is_err());
    assert_eq!(pos2, [9, 9, 9, 9]);
    assert_eq!(hp2, [9, 9]);
    assert_eq!(mp2, [9, 9]);
}
