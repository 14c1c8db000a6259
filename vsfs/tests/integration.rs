//! End-to-end scenarios against a mounted image, reaching only the public
//! façade plus the read-only table dumps used to assert structural
//! invariants from outside the session.

use std::fs::File;

use vsfs::{bitmap, directory, metadata, Session};

fn scratch(tag: &str) -> std::path::PathBuf {
	std::env::temp_dir().join(format!("vsfs-integration-{tag}-{}", std::process::id()))
}

fn reopen(path: &std::path::Path) -> File {
	File::options().read(true).write(true).open(path).unwrap()
}

#[test]
fn format_mount_unmount_reports_same_superblock() {
	let path = scratch("fmt");
	let session = Session::format(&path, 32768).unwrap();
	let sb = session.superblock();
	assert_eq!(sb.image_size, 32768);
	assert_eq!(sb.block_size, 256);
	assert!(sb.n_blocks >= 2);
	session.unmount().unwrap();

	let mounted = Session::mount(&path).unwrap();
	assert_eq!(mounted.superblock(), sb);
	mounted.unmount().unwrap();
	let _ = std::fs::remove_file(&path);
}

#[test]
fn create_write_read_scenario() {
	let path = scratch("create-write-read");
	let mut session = Session::format(&path, 32768).unwrap();

	let id = session.create("a").unwrap();
	let fd = session.open("a").unwrap();
	assert_eq!(session.write(fd, 0, b"Hello, world!").unwrap(), 13);

	let mut buf = [0u8; 13];
	assert_eq!(session.read(fd, 0, &mut buf).unwrap(), 13);
	assert_eq!(&buf, b"Hello, world!");
	assert_eq!(session.stat(id).unwrap().size, 13);

	session.close(fd).unwrap();
	session.unmount().unwrap();
	let _ = std::fs::remove_file(&path);
}

#[test]
fn hole_write_scenario() {
	let path = scratch("hole");
	let mut session = Session::format(&path, 32768).unwrap();

	let id = session.create("b").unwrap();
	let fd = session.open("b").unwrap();
	session.write(fd, 1000, b"xyz").unwrap();

	let mut buf = [0u8; 1003];
	assert_eq!(session.read(fd, 0, &mut buf).unwrap(), 1003);
	assert!(buf[0..1000].iter().all(|&b| b == 0));
	assert_eq!(&buf[1000..1003], b"xyz");
	assert_eq!(session.stat(id).unwrap().size, 1003);

	session.unmount().unwrap();
	let _ = std::fs::remove_file(&path);
}

#[test]
fn link_and_unlink_scenario() {
	let path = scratch("link");
	let mut session = Session::format(&path, 32768).unwrap();

	let id = session.create("c").unwrap();
	session.link("c", "d").unwrap();
	session.unlink("c").unwrap();

	assert!(matches!(session.open("c").unwrap_err(), vsfs::VsfsError::NotFound));
	session.open("d").unwrap();
	assert_eq!(session.stat(id).unwrap().nlinks, 1);

	session.unmount().unwrap();
	let _ = std::fs::remove_file(&path);
}

#[test]
fn truncate_shrink_scenario_frees_blocks() {
	let path = scratch("shrink");
	let mut session = Session::format(&path, 65536).unwrap();

	let id = session.create("e").unwrap();
	let fd = session.open("e").unwrap();
	let pattern = vec![0xABu8; 2000];
	session.write(fd, 0, &pattern).unwrap();
	session.truncate("e", 100).unwrap();
	assert_eq!(session.stat(id).unwrap().size, 100);

	let sb = session.superblock();
	let layout = sb.layout();
	session.unmount().unwrap();

	let mut dev = reopen(&path);
	let used = bitmap::read_bitmap(&mut dev, &layout, sb.n_blocks)
		.unwrap()
		.iter()
		.filter(|&&b| b != 0)
		.count();
	// One direct block covers the 100 remaining bytes; every block past it
	// (including the indirect block the 2000-byte write allocated) is free.
	assert_eq!(used, 1);
	let _ = std::fs::remove_file(&path);
}

#[test]
fn readdir_returns_stored_order_ending_at_terminator() {
	let path = scratch("readdir");
	let mut session = Session::format(&path, 32768).unwrap();

	session.create("one").unwrap();
	session.create("two").unwrap();
	session.create("three").unwrap();

	let mut names = Vec::new();
	let mut advance = false;
	loop {
		let rec = session.readdir(advance).unwrap();
		if rec.id == vsfs::END_ID {
			break;
		}
		if rec.is_bound() {
			names.push(String::from_utf8_lossy(rec.name_bytes()).into_owned());
		}
		advance = true;
	}
	assert_eq!(names, vec!["one", "two", "three"]);

	session.unmount().unwrap();
	let _ = std::fs::remove_file(&path);
}

#[test]
fn nlinks_sum_matches_bound_directory_entries() {
	let path = scratch("nlinks");
	let mut session = Session::format(&path, 32768).unwrap();

	session.create("a").unwrap();
	session.create("b").unwrap();
	session.link("a", "a2").unwrap();

	let sb = session.superblock();
	let layout = sb.layout();
	session.unmount().unwrap();

	let mut dev = reopen(&path);
	let total_nlinks: i32 = metadata::read_table(&mut dev, &layout, sb.max_files)
		.unwrap()
		.iter()
		.map(|r| r.nlinks)
		.sum();
	let bound_entries = directory::read_table(&mut dev, &layout, sb.max_files)
		.unwrap()
		.iter()
		.filter(|r| r.is_bound())
		.count();
	assert_eq!(total_nlinks as usize, bound_entries);
	let _ = std::fs::remove_file(&path);
}

#[test]
fn boundary_last_direct_byte_and_first_indirect_byte() {
	let path = scratch("boundary");
	let mut session = Session::format(&path, 65536).unwrap();

	session.create("f").unwrap();
	let fd = session.open("f").unwrap();
	let last_direct = (4 * 256) - 1; // FILE_BLOCKS - 1 direct blocks, last byte
	assert_eq!(session.write(fd, last_direct, b"X").unwrap(), 1);
	assert_eq!(session.write(fd, last_direct + 1, b"Y").unwrap(), 1);

	let mut buf = [0u8; 2];
	session.read(fd, last_direct, &mut buf).unwrap();
	assert_eq!(&buf, b"XY");

	session.unmount().unwrap();
	let _ = std::fs::remove_file(&path);
}

#[test]
fn exhaustion_yields_short_write_and_full_bitmap() {
	let path = scratch("exhaustion");
	let mut session = Session::format(&path, 2048).unwrap();
	let sb = session.superblock();

	session.create("g").unwrap();
	let fd = session.open("g").unwrap();
	let payload = vec![0x42u8; sb.n_blocks as usize * 256 * 4];
	let written = session.write(fd, 0, &payload).unwrap();
	assert!(written < payload.len());

	let layout = sb.layout();
	session.unmount().unwrap();
	let mut dev = reopen(&path);
	let bitmap = bitmap::read_bitmap(&mut dev, &layout, sb.n_blocks).unwrap();
	assert!(bitmap.iter().all(|&b| b != 0));
	let _ = std::fs::remove_file(&path);
}
