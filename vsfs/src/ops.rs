//! The operation façade: the twelve caller-facing operations, each
//! composed from the layout calculator, free-space manager, file-index
//! manager, and block-addressing engine. `format`/`mount`/`unmount` live
//! on [`Session`] itself (`session.rs`); everything else is here.

use crate::bitmap;
use crate::blockmap::{self, MAX_BLOCKS_PER_FILE, NOT_PRESENT, OUT_OF_RANGE};
use crate::directory::{self, DirRecord};
use crate::error::{Result, VsfsError};
use crate::layout::{BLOCK_SIZE, DIR_REC_SIZE, FILE_BLOCKS};
use crate::metadata::{self, FileRecord, FileType};
use crate::session::Session;

/// Upper bound on a single file's size, in bytes.
pub const MAX_FILE_BYTES: usize = MAX_BLOCKS_PER_FILE * BLOCK_SIZE;

impl Session {
	/// Reads the `id`th metadata record. The caller should treat a record
	/// with `nlinks == 0` as "no such file"; it is still returned, flagged
	/// vacant, rather than producing an error.
	pub fn stat(&mut self, id: i32) -> Result<FileRecord> {
		let layout = self.layout();
		metadata::read_record(self.dev(), &layout, id)
	}

	/// Reads one directory record. With `advance == false`, (re)starts the
	/// scan at the directory table's first slot; with `advance == true`,
	/// continues from where the previous call left off. Callers stop at a
	/// record whose `id` is `END_ID` and skip records whose `id` is `-1`.
	pub fn readdir(&mut self, advance: bool) -> Result<DirRecord> {
		use std::io::{Read, Seek, SeekFrom};

		let layout = self.layout();
		let pos = if advance {
			self.readdir_cursor()
		} else {
			layout.directory_table
		};

		let dev = self.dev();
		dev.seek(SeekFrom::Start(pos)).map_err(VsfsError::HostReadFailed)?;
		let mut buf = [0u8; DIR_REC_SIZE as usize];
		dev.read_exact(&mut buf).map_err(VsfsError::HostReadFailed)?;
		self.set_readdir_cursor(pos + DIR_REC_SIZE);
		Ok(DirRecord::from_bytes(&buf))
	}

	/// Creates a new, empty, regular file named `name`. Fails with
	/// [`VsfsError::AlreadyExists`] if the name is already bound, or
	/// [`VsfsError::MaxFiles`] if either table is full.
	pub fn create(&mut self, name: &str) -> Result<i32> {
		let layout = self.layout();
		let max_files = self.superblock().max_files;

		if directory::find_by_name(self.dev(), &layout, max_files, name)?.is_some() {
			return Err(VsfsError::AlreadyExists);
		}
		let dir_slot = directory::find_vacant_slot(self.dev(), &layout, max_files)?
			.ok_or(VsfsError::MaxFiles)?;
		let id = metadata::find_vacant_slot(self.dev(), &layout, max_files)?
			.ok_or(VsfsError::MaxFiles)?;

		metadata::write_record(self.dev(), &layout, id, &FileRecord::new_file())?;
		directory::write_record(self.dev(), &layout, dir_slot, &DirRecord::new(id, name))?;
		Ok(id)
	}

	/// Opens `name`, returning a descriptor valid until `close`.
	pub fn open(&mut self, name: &str) -> Result<i32> {
		let layout = self.layout();
		let max_files = self.superblock().max_files;
		let (_, id) = directory::find_by_name(self.dev(), &layout, max_files, name)?
			.ok_or(VsfsError::NotFound)?;

		let fd = self
			.descriptors()
			.iter()
			.position(|&d| d == -1)
			.ok_or(VsfsError::TooManyOpen)?;
		self.descriptors_mut()[fd] = id;
		Ok(fd as i32)
	}

	/// Closes `fd`, freeing its descriptor slot for reuse.
	pub fn close(&mut self, fd: i32) -> Result<()> {
		self.descriptor_to_id(fd)?;
		self.descriptors_mut()[fd as usize] = -1;
		Ok(())
	}

	/// Reads up to `buffer.len()` bytes starting at `offset` into `buffer`.
	/// Returns the number of bytes actually read, which is less than
	/// `buffer.len()` at end of file or past the addressable range (a
	/// short read, not an error).
	pub fn read(&mut self, fd: i32, offset: i32, buffer: &mut [u8]) -> Result<usize> {
		let id = self.descriptor_to_id(fd)?;
		let layout = self.layout();
		let n_blocks = self.superblock().n_blocks;
		let mut record = metadata::read_record(self.dev(), &layout, id)?;

		if offset < 0 || offset >= record.size {
			return Ok(0);
		}

		let block_size = BLOCK_SIZE as i32;
		let mut b = offset / block_size;
		let mut byte_off = (offset % block_size) as usize;
		let mut written = 0usize;
		let want = buffer.len();

		while written < want {
			let resolved = blockmap::resolve(self.dev(), &layout, n_blocks, &mut record, b, false)?;
			if resolved == NOT_PRESENT || resolved == OUT_OF_RANGE || resolved == bitmap::NONE {
				break;
			}
			let n = (BLOCK_SIZE - byte_off).min(want - written);
			read_block_range(self.dev(), &layout, resolved, byte_off, &mut buffer[written..written + n])?;
			written += n;
			byte_off = 0;
			b += 1;
		}
		Ok(written)
	}

	/// Writes `buffer` starting at `offset`. If `offset` is past the
	/// current end of file, the gap is materialized as zero bytes (a hole
	/// is not left sparse). Returns the number of bytes actually written
	/// (including any zero-fill), less than the full payload on allocator
	/// exhaustion (a short write, not an error).
	pub fn write(&mut self, fd: i32, offset: i32, buffer: &[u8]) -> Result<usize> {
		let id = self.descriptor_to_id(fd)?;
		let layout = self.layout();
		let n_blocks = self.superblock().n_blocks;
		let mut record = metadata::read_record(self.dev(), &layout, id)?;

		let (start_offset, payload): (i32, Vec<u8>) = if offset > record.size {
			let hole = (offset - record.size) as usize;
			let mut padded = vec![0u8; hole + buffer.len()];
			padded[hole..].copy_from_slice(buffer);
			(record.size, padded)
		} else {
			(offset, buffer.to_vec())
		};

		let written = write_bytes(self.dev(), &layout, n_blocks, &mut record, id, start_offset, &payload)?;
		Ok(written)
	}

	/// Binds `dest_name` to the same file id as `src_name`, incrementing
	/// its link count.
	pub fn link(&mut self, src_name: &str, dest_name: &str) -> Result<()> {
		let layout = self.layout();
		let max_files = self.superblock().max_files;

		let (_, id) = directory::find_by_name(self.dev(), &layout, max_files, src_name)?
			.ok_or(VsfsError::NotFound)?;
		if directory::find_by_name(self.dev(), &layout, max_files, dest_name)?.is_some() {
			return Err(VsfsError::AlreadyExists);
		}
		let dir_slot = directory::find_vacant_slot(self.dev(), &layout, max_files)?
			.ok_or(VsfsError::MaxFiles)?;

		let mut record = metadata::read_record(self.dev(), &layout, id)?;
		record.nlinks += 1;
		metadata::write_record(self.dev(), &layout, id, &record)?;
		directory::write_record(self.dev(), &layout, dir_slot, &DirRecord::new(id, dest_name))?;
		Ok(())
	}

	/// Removes the `name` binding. When the last link to a file is
	/// removed, its blocks are released and its metadata record returns
	/// to vacant.
	pub fn unlink(&mut self, name: &str) -> Result<()> {
		let layout = self.layout();
		let max_files = self.superblock().max_files;

		let (slot, id) = directory::find_by_name(self.dev(), &layout, max_files, name)?
			.ok_or(VsfsError::NotFound)?;
		directory::write_record(self.dev(), &layout, slot, &DirRecord::vacant())?;

		let mut record = metadata::read_record(self.dev(), &layout, id)?;
		record.nlinks -= 1;
		if record.nlinks == 0 {
			blockmap::release_all(self.dev(), &layout, &mut record)?;
			record.ftype = FileType::Vacant;
			record.size = 0;
		}
		metadata::write_record(self.dev(), &layout, id, &record)?;
		Ok(())
	}

	/// Resizes `name` to exactly `new_size` bytes. Shrinking releases
	/// every block past the new end; growing zero-fills the gap.
	pub fn truncate(&mut self, name: &str, new_size: i32) -> Result<()> {
		let layout = self.layout();
		let max_files = self.superblock().max_files;
		let n_blocks = self.superblock().n_blocks;

		let (_, id) = directory::find_by_name(self.dev(), &layout, max_files, name)?
			.ok_or(VsfsError::NotFound)?;
		let mut record = metadata::read_record(self.dev(), &layout, id)?;

		if new_size == record.size {
			return Ok(());
		}
		if new_size < record.size {
			shrink(self.dev(), &layout, &mut record, new_size)?;
			record.size = new_size;
			metadata::write_record(self.dev(), &layout, id, &record)?;
			return Ok(());
		}

		let hole = vec![0u8; (new_size - record.size) as usize];
		let start = record.size;
		write_bytes(self.dev(), &layout, n_blocks, &mut record, id, start, &hole)?;
		Ok(())
	}
}

fn read_block_range(
	dev: &mut std::fs::File,
	layout: &crate::layout::Layout,
	block_id: i32,
	byte_off: usize,
	out: &mut [u8],
) -> Result<()> {
	use std::io::{Read, Seek, SeekFrom};
	dev.seek(SeekFrom::Start(layout.data_block(block_id) + byte_off as u64))
		.map_err(VsfsError::HostReadFailed)?;
	dev.read_exact(out).map_err(VsfsError::HostReadFailed)?;
	Ok(())
}

fn write_block_range(
	dev: &mut std::fs::File,
	layout: &crate::layout::Layout,
	block_id: i32,
	byte_off: usize,
	data: &[u8],
) -> Result<()> {
	use std::io::{Seek, SeekFrom, Write};
	dev.seek(SeekFrom::Start(layout.data_block(block_id) + byte_off as u64))
		.map_err(VsfsError::HostWriteFailed)?;
	dev.write_all(data).map_err(VsfsError::HostWriteFailed)?;
	Ok(())
}

/// Shared by `write` and `truncate`'s grow path: writes `payload` at
/// `start_offset` into `record` (id `id`), allocating blocks as needed,
/// persisting the record every time its `size` grows. Returns the number
/// of bytes actually written (a short count on allocator exhaustion).
fn write_bytes(
	dev: &mut std::fs::File,
	layout: &crate::layout::Layout,
	n_blocks: i32,
	record: &mut FileRecord,
	id: i32,
	start_offset: i32,
	payload: &[u8],
) -> Result<usize> {
	let block_size = BLOCK_SIZE as i32;
	let mut b = start_offset / block_size;
	let mut byte_off = (start_offset % block_size) as usize;
	let mut written = 0usize;
	let want = payload.len();

	while written < want {
		let resolved = blockmap::resolve(dev, layout, n_blocks, record, b, true)?;
		if resolved == bitmap::NONE || resolved == OUT_OF_RANGE {
			break;
		}
		let n = (BLOCK_SIZE - byte_off).min(want - written);
		write_block_range(dev, layout, resolved, byte_off, &payload[written..written + n])?;
		written += n;

		let new_end = start_offset + written as i32;
		if new_end > record.size {
			record.size = new_end;
			metadata::write_record(dev, layout, id, record)?;
		}

		byte_off = 0;
		b += 1;
	}
	Ok(written)
}

/// `truncate`'s shrink path: releases every block past `new_size`,
/// mutating `record.blocks_map` in place. The caller persists `record`.
fn shrink(
	dev: &mut std::fs::File,
	layout: &crate::layout::Layout,
	record: &mut FileRecord,
	new_size: i32,
) -> Result<()> {
	let block_size = BLOCK_SIZE as i32;
	let new_block_size = new_size / block_size;
	let old_block_size = record.size / block_size;
	let direct_bound = (FILE_BLOCKS - 1) as i32;
	let indirect_slot = FILE_BLOCKS - 1;

	if old_block_size < direct_bound {
		for i in (new_block_size + 1)..direct_bound {
			let i = i as usize;
			if record.blocks_map[i] == -1 {
				break;
			}
			bitmap::release(dev, layout, record.blocks_map[i])?;
			record.blocks_map[i] = -1;
		}
	} else if new_block_size < direct_bound {
		for i in (new_block_size + 1)..direct_bound {
			let i = i as usize;
			bitmap::release(dev, layout, record.blocks_map[i])?;
			record.blocks_map[i] = -1;
		}
		if record.blocks_map[indirect_slot] >= 0 {
			blockmap::release_indirect_chain(dev, layout, record.blocks_map[indirect_slot], 0)?;
			bitmap::release(dev, layout, record.blocks_map[indirect_slot])?;
			record.blocks_map[indirect_slot] = -1;
		}
	} else if record.blocks_map[indirect_slot] >= 0 {
		let k_start = (new_block_size + 1 - direct_bound) as usize;
		blockmap::release_indirect_chain(dev, layout, record.blocks_map[indirect_slot], k_start)?;
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn image(tag: &str, size: i32) -> (Session, std::path::PathBuf) {
		let path = std::env::temp_dir().join(format!("vsfs-ops-test-{tag}-{}", std::process::id()));
		let _ = std::fs::remove_file(&path);
		(Session::format(&path, size).unwrap(), path)
	}

	#[test]
	fn create_write_read_round_trips() {
		let (mut s, path) = image("rw", 32768);
		let id = s.create("a").unwrap();
		let fd = s.open("a").unwrap();
		let msg = b"Hello, world!";
		assert_eq!(s.write(fd, 0, msg).unwrap(), msg.len());
		let mut buf = [0u8; 13];
		assert_eq!(s.read(fd, 0, &mut buf).unwrap(), 13);
		assert_eq!(&buf, msg);
		assert_eq!(s.stat(id).unwrap().size, 13);
		let _ = std::fs::remove_file(&path);
	}

	#[test]
	fn hole_write_zero_fills_gap() {
		let (mut s, path) = image("hole", 32768);
		s.create("b").unwrap();
		let fd = s.open("b").unwrap();
		s.write(fd, 1000, b"xyz").unwrap();
		let mut buf = [0u8; 1003];
		let n = s.read(fd, 0, &mut buf).unwrap();
		assert_eq!(n, 1003);
		assert!(buf[0..1000].iter().all(|&b| b == 0));
		assert_eq!(&buf[1000..1003], b"xyz");
		let _ = std::fs::remove_file(&path);
	}

	#[test]
	fn link_and_unlink_preserve_reachability() {
		let (mut s, path) = image("link", 32768);
		let id = s.create("c").unwrap();
		s.link("c", "d").unwrap();
		s.unlink("c").unwrap();
		assert!(matches!(s.open("c").unwrap_err(), VsfsError::NotFound));
		let fd = s.open("d").unwrap();
		assert_eq!(s.descriptor_to_id(fd).unwrap(), id);
		assert_eq!(s.stat(id).unwrap().nlinks, 1);
		let _ = std::fs::remove_file(&path);
	}

	#[test]
	fn truncate_shrink_frees_blocks() {
		let (mut s, path) = image("shrink", 65536);
		let id = s.create("e").unwrap();
		let fd = s.open("e").unwrap();
		let pattern = vec![7u8; 2000];
		s.write(fd, 0, &pattern).unwrap();
		s.truncate("e", 100).unwrap();
		assert_eq!(s.stat(id).unwrap().size, 100);
		let _ = std::fs::remove_file(&path);
	}

	#[test]
	fn create_duplicate_name_rejected() {
		let (mut s, path) = image("dup", 32768);
		s.create("x").unwrap();
		assert!(matches!(s.create("x").unwrap_err(), VsfsError::AlreadyExists));
		let _ = std::fs::remove_file(&path);
	}

	#[test]
	fn open_missing_name_not_found() {
		let (mut s, path) = image("missing", 32768);
		assert!(matches!(s.open("nope").unwrap_err(), VsfsError::NotFound));
		let _ = std::fs::remove_file(&path);
	}

	#[test]
	fn read_write_bad_descriptor() {
		let (mut s, path) = image("baddesc", 32768);
		assert!(matches!(s.close(99).unwrap_err(), VsfsError::BadDescriptor));
		let mut buf = [0u8; 4];
		assert!(matches!(s.read(99, 0, &mut buf).unwrap_err(), VsfsError::BadDescriptor));
		let _ = std::fs::remove_file(&path);
	}

	#[test]
	fn write_exactly_at_indirect_boundary_triggers_indirect_allocation() {
		let (mut s, path) = image("boundary", 65536);
		s.create("f").unwrap();
		let fd = s.open("f").unwrap();
		let boundary = ((FILE_BLOCKS - 1) * BLOCK_SIZE) as i32;
		assert_eq!(s.write(fd, boundary - 1, b"X").unwrap(), 1);
		assert_eq!(s.write(fd, boundary, b"Y").unwrap(), 1);
		let mut buf = [0u8; 2];
		s.read(fd, boundary - 1, &mut buf).unwrap();
		assert_eq!(&buf, b"XY");
		let _ = std::fs::remove_file(&path);
	}
}
