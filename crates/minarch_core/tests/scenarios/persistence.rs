use crate::setup::FakeCore;
use minarch_core::pacing::SramAutosave;
use minarch_core::persistence::{
    checksum, read_memory, read_state, take_resume_slot, write_memory, write_state, GamePaths, MemoryError,
    MemoryKind, StateCore, StateError, AUTO_RESUME_SLOT, HIDDEN_RESUME_SLOT,
};
use std::time::{Duration, Instant};

fn game_paths(root: &std::path::Path) -> GamePaths {
    let paths = GamePaths::new(root.join("Saves/GB"), root.join("States/GB-gambatte"), "Tetris.gb");
    std::fs::create_dir_all(&paths.saves_dir).unwrap();
    std::fs::create_dir_all(&paths.states_dir).unwrap();
    paths
}

#[test]
pub fn test_state_round_trip_restores_sram() {
    let dir = tempfile::tempdir().unwrap();
    let paths = game_paths(dir.path());
    let mut core = FakeCore::new(32);
    for _ in 0..5 {
        core.run();
    }
    let sram_before = core.sram.clone();
    let wram_before = core.wram.clone();

    let written = write_state(&mut core, &paths.state_path(0)).unwrap();
    assert_eq!(written, core.serialize_size());

    core.run();
    assert_ne!(core.sram, sram_before);

    let report = read_state(&mut core, &paths.state_path(0)).unwrap();
    assert!(!report.is_short());
    assert_eq!(core.sram, sram_before);
    assert_eq!(core.wram, wram_before);
    assert_eq!(core.frame, 5);
}

#[test]
pub fn test_state_survives_reset() {
    let dir = tempfile::tempdir().unwrap();
    let paths = game_paths(dir.path());
    let mut core = FakeCore::new(16);
    core.run();
    core.run();
    let snapshot = core.clone();

    write_state(&mut core, &paths.state_path(AUTO_RESUME_SLOT)).unwrap();
    core.reset();
    assert_eq!(core.frame, 0);

    read_state(&mut core, &paths.state_path(AUTO_RESUME_SLOT)).unwrap();
    assert_eq!(core.frame, snapshot.frame);
    assert_eq!(core.sram, snapshot.sram);
    assert_eq!(core.wram, snapshot.wram);
}

#[test]
pub fn test_state_errors() {
    let dir = tempfile::tempdir().unwrap();
    let paths = game_paths(dir.path());
    let mut core = FakeCore::new(16);

    // A missing hidden resume slot is the launcher's normal case.
    assert!(matches!(
        read_state(&mut core, &paths.state_path(HIDDEN_RESUME_SLOT)),
        Err(StateError::FileNotFound)
    ));

    // Only the leading serialize_size() bytes reach the core.
    let size = core.serialize_size();
    let mut long = vec![0u8; size + 4];
    long[..4].copy_from_slice(&42u32.to_le_bytes());
    long[size..].fill(0xEE);
    std::fs::write(paths.state_path(1), long).unwrap();
    let report = read_state(&mut core, &paths.state_path(1)).unwrap();
    assert_eq!((report.expected, report.read), (size, size));
    assert_eq!(core.frame, 42);

    // Short files are passed on and reported.
    std::fs::write(paths.state_path(2), vec![0u8; size - 8]).unwrap();
    let report = read_state(&mut core, &paths.state_path(2)).unwrap();
    assert!(report.is_short());
    assert_eq!((report.expected, report.read), (size, size - 8));

    core.supports_states = false;
    assert!(matches!(
        write_state(&mut core, &paths.state_path(3)),
        Err(StateError::NoSupport)
    ));
    assert!(!paths.state_path(3).exists());
}

#[test]
pub fn test_sram_and_rtc_files() {
    let dir = tempfile::tempdir().unwrap();
    let paths = game_paths(dir.path());
    let mut core = FakeCore::new(8);
    core.run();
    let saved = core.sram.clone();

    assert_eq!(write_memory(&mut core, MemoryKind::SaveRam, &paths.sram_path()).unwrap(), 8);
    // No RTC region, nothing written and nothing to complain about.
    let rtc = write_memory(&mut core, MemoryKind::Rtc, &paths.rtc_path()).unwrap_err();
    assert!(rtc.is_benign());
    assert!(!paths.rtc_path().exists());

    core.reset();
    assert_eq!(read_memory(&mut core, MemoryKind::SaveRam, &paths.sram_path()).unwrap(), 8);
    assert_eq!(core.sram, saved);

    assert!(matches!(
        read_memory(&mut core, MemoryKind::VideoRam, &paths.sram_path()),
        Err(MemoryError::NoSupport)
    ));
}

#[test]
pub fn test_sram_autosave_coalesces_writes() {
    let mut core = FakeCore::new(8);
    let start = Instant::now();
    let mut autosave = SramAutosave::new(checksum(&core.sram));

    core.run();
    assert!(!autosave.update(checksum(&core.sram), start));
    assert!(autosave.is_dirty());

    core.run();
    assert!(!autosave.update(checksum(&core.sram), start + Duration::from_secs(3)));
    // Stable for the flush window after the last change.
    assert!(!autosave.update(checksum(&core.sram), start + Duration::from_secs(7)));
    assert!(autosave.update(checksum(&core.sram), start + Duration::from_secs(9)));
    assert!(!autosave.is_dirty());

    // Shutdown writes outside the schedule.
    core.run();
    autosave.update(checksum(&core.sram), start + Duration::from_secs(10));
    autosave.mark_written(checksum(&core.sram));
    assert!(!autosave.is_dirty());
}

#[test]
pub fn test_resume_slot_file_is_consumed() {
    let dir = tempfile::tempdir().unwrap();
    let slot_file = dir.path().join("resume_slot.txt");

    std::fs::write(&slot_file, format!("{}", HIDDEN_RESUME_SLOT)).unwrap();
    assert_eq!(take_resume_slot(&slot_file), Some(HIDDEN_RESUME_SLOT));
    assert!(!slot_file.exists());
    assert_eq!(take_resume_slot(&slot_file), None);
}
