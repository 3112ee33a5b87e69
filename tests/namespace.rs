mod common;

use std::sync::Arc;

use common::{add_file, formatted, mount_with, mounted, options, read_all, status, NOW};
use eefs::{AsciiCaseInsensitive, Attributes, DirEntry, Mode, OpenFlags, Status};

fn names(fs: &eefs::Eefs<eefs::MemoryMedium>) -> Vec<String> {
    fs.entries().map(|e| e.unwrap().filename).collect()
}

#[test]
fn test_remove_leaves_tombstone() {
    let mut fs = mounted(4096);
    add_file(&mut fs, "a", b"1");
    add_file(&mut fs, "b", b"2");

    fs.remove("a").unwrap();
    assert_eq!(status(fs.stat("a")), Status::FileNotFound);
    assert_eq!(status(fs.stat_inode(0)), Status::FileNotFound);
    assert_eq!(fs.volume().number_of_files(), 2);
    assert_eq!(names(&fs), ["b"]);

    // The slot is never handed out again.
    let index = add_file(&mut fs, "a", b"again");
    assert_eq!(index, 2);
    assert_eq!(read_all(&mut fs, "a"), b"again");
    assert_eq!(names(&fs), ["b", "a"]);
}

#[test]
fn test_remove_refusals() {
    let mut fs = mounted(4096);
    add_file(&mut fs, "open", b"x");
    let fd = fs.create("locked", Attributes::READONLY).unwrap();
    fs.close(fd).unwrap();

    assert_eq!(status(fs.remove("missing")), Status::FileNotFound);
    assert_eq!(status(fs.remove("locked")), Status::PermissionDenied);
    assert_eq!(status(fs.remove(&"n".repeat(41))), Status::InvalidArgument);

    let fd = fs.open("open", OpenFlags::RDONLY, Attributes::NONE).unwrap();
    assert_eq!(status(fs.remove("open")), Status::PermissionDenied);
    fs.close(fd).unwrap();
    fs.remove("open").unwrap();

    let medium = fs.into_medium();
    let mut fs = mount_with(medium, options().with_write_protected(true));
    assert_eq!(status(fs.remove("locked")), Status::ReadOnlyFileSystem);
}

#[test]
fn test_rename() {
    let mut fs = mounted(4096);
    let index = add_file(&mut fs, "old", b"contents");
    add_file(&mut fs, "taken", b"");

    fs.rename("old", "new").unwrap();
    assert_eq!(status(fs.stat("old")), Status::FileNotFound);
    let stat = fs.stat("new").unwrap();
    assert_eq!(stat.inode_index, index);
    assert_eq!(stat.modification_date, NOW);
    assert_eq!(read_all(&mut fs, "new"), b"contents");

    assert_eq!(status(fs.rename("new", "taken")), Status::PermissionDenied);
    assert_eq!(status(fs.rename("ghost", "other")), Status::FileNotFound);
    assert_eq!(status(fs.rename("new", "")), Status::InvalidArgument);

    fs.set_file_attributes("new", Attributes::READONLY).unwrap();
    assert_eq!(status(fs.rename("new", "newer")), Status::PermissionDenied);
}

#[test]
fn test_rename_onto_removed_name() {
    let mut fs = mounted(4096);
    add_file(&mut fs, "a", b"first");
    add_file(&mut fs, "b", b"second");
    fs.remove("a").unwrap();
    fs.rename("b", "a").unwrap();
    assert_eq!(read_all(&mut fs, "a"), b"second");
    assert_eq!(names(&fs), ["a"]);
}

#[test]
fn test_set_file_attributes() {
    let mut fs = mounted(4096);
    add_file(&mut fs, "cfg", b"x=1");

    assert_eq!(
        status(fs.set_file_attributes("cfg", Attributes::from_raw(7))),
        Status::InvalidArgument
    );
    assert_eq!(
        status(fs.set_file_attributes("nope", Attributes::READONLY)),
        Status::FileNotFound
    );

    fs.set_file_attributes("cfg", Attributes::READONLY).unwrap();
    assert_eq!(fs.stat("cfg").unwrap().attributes, Attributes::READONLY);
    assert_eq!(status(fs.remove("cfg")), Status::PermissionDenied);

    fs.set_file_attributes("cfg", Attributes::NONE).unwrap();
    fs.remove("cfg").unwrap();
}

#[test]
fn test_filename_limits() {
    let mut fs = mounted(4096);
    let longest = "L".repeat(40);
    add_file(&mut fs, &longest, b"edge");
    assert_eq!(fs.stat(&longest).unwrap().filename, longest);

    // Byte length counts, not characters.
    let wide = "é".repeat(21);
    assert_eq!(status(fs.create(&wide, Attributes::NONE)), Status::InvalidArgument);
    assert_eq!(status(fs.stat(&"L".repeat(41))), Status::InvalidArgument);
}

#[test]
fn test_custom_collator() {
    let options = options().with_collator(Arc::new(AsciiCaseInsensitive));
    let mut fs = mount_with(formatted(4096), options);
    add_file(&mut fs, "ReadMe.TXT", b"hi");

    assert_eq!(fs.stat("readme.txt").unwrap().filename, "ReadMe.TXT");
    assert_eq!(read_all(&mut fs, "README.TXT"), b"hi");
    assert_eq!(status(fs.rename("x", "readme.txt")), Status::PermissionDenied);
}

#[test]
fn test_entries_in_index_order() {
    let mut fs = mounted(8192);
    for (i, name) in ["c", "a", "b", "d"].iter().enumerate() {
        add_file(&mut fs, name, &vec![b'z'; i * 10]);
    }
    fs.remove("a").unwrap();

    let entries: Vec<DirEntry> = fs.entries().collect::<Result<_, _>>().unwrap();
    assert_eq!(
        entries,
        [
            DirEntry { inode_index: 0, filename: "c".into(), file_size: 0 },
            DirEntry { inode_index: 2, filename: "b".into(), file_size: 20 },
            DirEntry { inode_index: 3, filename: "d".into(), file_size: 30 },
        ]
    );

    // Every call walks again from the start.
    assert_eq!(fs.entries().count(), 3);
    assert_eq!(names(&fs), ["c", "b", "d"]);
}

#[test]
fn test_table_fills_at_sixty_four() {
    let mut fs = mount_with(formatted(8192), options().with_spare_bytes(0));
    for i in 0..64 {
        add_file(&mut fs, &format!("f{i:02}"), b"");
    }
    assert_eq!(fs.volume().number_of_files(), 64);
    assert_eq!(status(fs.create("f64", Attributes::NONE)), Status::NoSpaceLeftOnDevice);

    // Removing does not give the slot back.
    fs.remove("f00").unwrap();
    assert_eq!(status(fs.create("f64", Attributes::NONE)), Status::NoSpaceLeftOnDevice);
}

#[test]
fn test_list_open_files() {
    let mut fs = mounted(4096);
    add_file(&mut fs, "a", b"1");
    add_file(&mut fs, "b", b"2");

    let ra = fs.open("a", OpenFlags::RDONLY, Attributes::NONE).unwrap();
    let wb = fs.open("b", OpenFlags::WRONLY, Attributes::NONE).unwrap();
    let open = fs.list_open_files().unwrap();
    assert_eq!(open.len(), 2);
    assert_eq!((open[0].fd, open[0].filename.as_str(), open[0].mode), (ra, "a", Mode::READ));
    assert_eq!((open[1].fd, open[1].filename.as_str(), open[1].mode), (wb, "b", Mode::WRITE));

    fs.close(ra).unwrap();
    fs.close(wb).unwrap();
    assert!(fs.list_open_files().unwrap().is_empty());
}
