/*Checks a volume in three passes: the header, the allocation table, and
then every file header the table points at. Each pass writes into the same
report. When the header is unusable, the later passes are skipped. */
use std::collections::HashSet;

use tracing::{debug, info};

use super::{fsck_backend::FsckBackend, fsck_types::*};
use crate::codec::{AllocationEntry, VolumeHeader, ALLOCATION_TABLE_SIZE, FILE_HEADER_SIZE};
use crate::config::{MAGIC, MAX_FILES, VERSION};
use crate::fs::Attributes;

fn check_header<B: FsckBackend>(backend: &B, report: &mut FsckReport) -> Option<VolumeHeader> {
    let header = match backend.load_header() {
        Ok(header) => header,
        Err(e) => {
            report.errors.push(format!("Header: unreadable ({e})"));
            report.header_ok = false;
            return None;
        }
    };

    // 1. Magic and version
    if header.magic != MAGIC {
        report
            .errors
            .push(format!("Header: bad magic {:#010x}", header.magic));
        report.header_ok = false;
    }
    if header.version != VERSION {
        report
            .errors
            .push(format!("Header: unsupported version {}", header.version));
        report.header_ok = false;
    }

    // 2. File count fits the table
    if header.number_of_files as usize > MAX_FILES {
        report.errors.push(format!(
            "Header: number_of_files = {}, the table holds {}",
            header.number_of_files, MAX_FILES
        ));
        report.header_ok = false;
    }

    if !report.header_ok {
        return None;
    }

    // 3. Free region inside the medium
    if (header.free_memory_offset as usize) < ALLOCATION_TABLE_SIZE {
        report.errors.push(format!(
            "Header: free_memory_offset = {} lies inside the allocation table",
            header.free_memory_offset
        ));
        report.header_ok = false;
    }
    let free_end = u64::from(header.free_memory_offset) + u64::from(header.free_memory_size);
    if free_end > u64::from(backend.capacity()) {
        report.errors.push(format!(
            "Header: free region ends at {}, past the medium ({} bytes)",
            free_end,
            backend.capacity()
        ));
        report.header_ok = false;
    }

    Some(header)
}

fn check_allocation<B: FsckBackend>(
    backend: &B,
    header: &VolumeHeader,
    report: &mut FsckReport,
) -> Vec<AllocationEntry> {
    let mut entries = Vec::with_capacity(header.number_of_files as usize);
    let mut expected = ALLOCATION_TABLE_SIZE as u64;

    for index in 0..header.number_of_files as usize {
        let entry = match backend.load_allocation_entry(index) {
            Ok(entry) => entry,
            Err(e) => {
                report
                    .errors
                    .push(format!("Entry {index}: unreadable ({e})"));
                report.allocation_ok = false;
                break;
            }
        };

        // Files are packed back to back in inode order.
        if u64::from(entry.file_header_offset) != expected {
            report.errors.push(format!(
                "Entry {}: starts at {}, expected {}",
                index, entry.file_header_offset, expected
            ));
            report.allocation_ok = false;
        }

        let end = u64::from(entry.file_header_offset)
            + FILE_HEADER_SIZE as u64
            + u64::from(entry.max_file_size);
        if end > u64::from(header.free_memory_offset) {
            report.errors.push(format!(
                "Entry {}: ends at {}, past the free cursor ({})",
                index, end, header.free_memory_offset
            ));
            report.allocation_ok = false;
        }

        expected = end;
        entries.push(entry);
    }

    if report.allocation_ok && expected != u64::from(header.free_memory_offset) {
        report.errors.push(format!(
            "Allocation: last file ends at {}, free cursor is {}",
            expected, header.free_memory_offset
        ));
        report.allocation_ok = false;
    }

    entries
}

fn check_files<B: FsckBackend>(backend: &B, entries: &[AllocationEntry], report: &mut FsckReport) {
    let mut names = HashSet::new();

    for (index, entry) in entries.iter().enumerate() {
        let header = match backend.load_file_header(entry.file_header_offset) {
            Ok(header) => header,
            Err(e) => {
                report
                    .errors
                    .push(format!("File {index}: unreadable header ({e})"));
                report.files_ok = false;
                continue;
            }
        };

        if !header.in_use {
            report.tombstones += 1;
            continue;
        }
        report.files_in_use += 1;

        if header.file_size > entry.max_file_size {
            report.errors.push(format!(
                "File {}: size {} exceeds capacity {}",
                index, header.file_size, entry.max_file_size
            ));
            report.files_ok = false;
        }

        if !Attributes::from_raw(header.attributes).is_valid() {
            report.errors.push(format!(
                "File {}: unknown attributes {:#x}",
                index, header.attributes
            ));
            report.files_ok = false;
        }

        if header.filename.is_empty() {
            report.errors.push(format!("File {index}: empty filename"));
            report.files_ok = false;
        } else if !names.insert(header.filename.clone()) {
            report.errors.push(format!(
                "File {}: duplicate name '{}'",
                index, header.filename
            ));
            report.files_ok = false;
        }
    }
}

pub fn run_fsck<B: FsckBackend>(backend: &B) -> FsckReport {
    let mut report = FsckReport::new();

    // --- Pass 1: volume header ---
    let Some(header) = check_header(backend, &mut report) else {
        info!(errors = report.errors.len(), "fsck stopped at the volume header");
        return report;
    };

    // --- Pass 2: allocation table ---
    let entries = check_allocation(backend, &header, &mut report);

    // --- Pass 3: file headers ---
    check_files(backend, &entries, &mut report);

    debug!(
        files = report.files_in_use,
        tombstones = report.tombstones,
        "fsck file pass done"
    );
    info!(errors = report.errors.len(), "fsck finished");
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FileHeader;
    use crate::fsck::mock::MockBackend;

    fn file(name: &str, size: u32) -> FileHeader {
        FileHeader {
            in_use: true,
            file_size: size,
            filename: name.into(),
            ..FileHeader::default()
        }
    }

    /// Two packed files of capacity 100 on a 4096-byte volume.
    fn healthy() -> MockBackend {
        let first = ALLOCATION_TABLE_SIZE as u32;
        let second = first + 64 + 100;
        let free = second + 64 + 100;
        MockBackend {
            capacity: 4096,
            header: VolumeHeader {
                crc: 0,
                magic: MAGIC,
                version: VERSION,
                free_memory_offset: free,
                free_memory_size: 4096 - free,
                number_of_files: 2,
            },
            entries: vec![
                AllocationEntry {
                    file_header_offset: first,
                    max_file_size: 100,
                },
                AllocationEntry {
                    file_header_offset: second,
                    max_file_size: 100,
                },
            ],
            files: [(first, file("a", 10)), (second, file("b", 100))]
                .into_iter()
                .collect(),
        }
    }

    #[test]
    fn healthy_volume_is_clean() {
        let report = run_fsck(&healthy());
        assert!(report.is_clean(), "{:?}", report.errors);
        assert_eq!(report.files_in_use, 2);
    }

    #[test]
    fn bad_magic_stops_early() {
        let mut backend = healthy();
        backend.header.magic = 0xDEAD_BEEF;
        let report = run_fsck(&backend);
        assert!(!report.header_ok);
        assert!(report.allocation_ok);
        assert_eq!(report.files_in_use, 0);
    }

    #[test]
    fn gap_in_allocation_table() {
        let mut backend = healthy();
        backend.entries[1].file_header_offset += 4;
        let report = run_fsck(&backend);
        assert!(!report.allocation_ok);
        assert!(report.errors.iter().any(|e| e.starts_with("Entry 1: starts at")));
    }

    #[test]
    fn oversize_and_duplicate_files() {
        let mut backend = healthy();
        let second = backend.entries[1].file_header_offset;
        backend.files.insert(second, file("a", 101));
        let report = run_fsck(&backend);
        assert!(!report.files_ok);
        assert!(report.errors.iter().any(|e| e.contains("exceeds capacity")));
        assert!(report.errors.iter().any(|e| e.contains("duplicate name 'a'")));
    }

    #[test]
    fn tombstones_may_share_names() {
        let mut backend = healthy();
        let second = backend.entries[1].file_header_offset;
        backend.files.insert(
            second,
            FileHeader {
                in_use: false,
                ..file("a", 0)
            },
        );
        let report = run_fsck(&backend);
        assert!(report.is_clean(), "{:?}", report.errors);
        assert_eq!(report.tombstones, 1);
    }
}
