mod common;

use common::{add_file, mounted};
use eefs::fsck::{run_fsck, MediumBackend};
use eefs::{Attributes, MemoryMedium};

fn checked(medium: &MemoryMedium) -> eefs::fsck::FsckReport {
    let report = run_fsck(&MediumBackend::new(medium, 0));
    log!("fsck errors: {:?}", report.errors);
    report
}

#[test]
fn test_fresh_volume_is_clean() {
    let fs = mounted(4096);
    let report = checked(fs.medium());
    assert!(report.is_clean());
    assert_eq!(report.files_in_use, 0);
}

#[test]
fn test_used_volume_is_clean() {
    let mut fs = mounted(4096);
    add_file(&mut fs, "a", b"alpha");
    add_file(&mut fs, "b", b"beta");
    fs.remove("a").unwrap();
    let fd = fs.create("c", Attributes::READONLY).unwrap();
    fs.close(fd).unwrap();

    let report = checked(fs.medium());
    assert!(report.is_clean());
    assert_eq!(report.files_in_use, 2);
    assert_eq!(report.tombstones, 1);
}

#[test]
fn test_corrupt_magic() {
    let fs = mounted(4096);
    let mut medium = fs.into_medium();
    medium.as_bytes_mut()[4] = 0;
    let report = checked(&medium);
    assert!(!report.header_ok);
    assert!(report.errors[0].contains("bad magic"));
}

#[test]
fn test_corrupt_file_size() {
    let mut fs = mounted(4096);
    add_file(&mut fs, "a", b"alpha");
    let mut medium = fs.into_medium();

    // file_size of the first header, big-endian at +12
    medium.as_bytes_mut()[536 + 12..536 + 16].copy_from_slice(&u32::MAX.to_be_bytes());
    let report = checked(&medium);
    assert!(report.header_ok);
    assert!(report.allocation_ok);
    assert!(!report.files_ok);
    assert!(report.errors.iter().any(|e| e.contains("exceeds capacity")));
}

#[test]
fn test_corrupt_allocation_entry() {
    let mut fs = mounted(4096);
    add_file(&mut fs, "a", b"alpha");
    add_file(&mut fs, "b", b"beta");
    let mut medium = fs.into_medium();

    // max_file_size of entry 0 grows, so entry 1 no longer follows it
    medium.as_bytes_mut()[24 + 4..24 + 8].copy_from_slice(&1000u32.to_be_bytes());
    let report = checked(&medium);
    assert!(!report.allocation_ok);
    assert!(report.errors.iter().any(|e| e.starts_with("Entry 1: starts at")));
}

#[test]
fn test_free_region_past_medium() {
    let fs = mounted(4096);
    let mut medium = fs.into_medium();
    medium.as_bytes_mut()[16..20].copy_from_slice(&10_000u32.to_be_bytes());
    let report = checked(&medium);
    assert!(!report.header_ok);
    assert!(report.errors.iter().any(|e| e.contains("past the medium")));
}
