//! File-index manager, metadata half: the fixed-size table of file-metadata
//! records ("fstat"). A record's index in this table is the file's id.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{Result, VsfsError};
use crate::layout::{Layout, FILE_BLOCKS, FSTAT_SIZE};

/// File type stored in a [`FileRecord`]. Directories are reserved in the
/// on-disk format but unused by this core: every file created through the
/// façade is [`FileType::Regular`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
	/// The record is vacant (`nlinks == 0`).
	Vacant,
	/// A regular file.
	Regular,
}

impl FileType {
	fn to_raw(self) -> i32 {
		match self {
			Self::Vacant => -1,
			Self::Regular => 0,
		}
	}

	fn from_raw(raw: i32) -> Self {
		if raw == 0 {
			Self::Regular
		} else {
			Self::Vacant
		}
	}
}

/// A file-metadata record. "In use" iff `nlinks > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileRecord {
	/// Regular file, or vacant.
	pub ftype: FileType,
	/// Number of directory entries bound to this id.
	pub nlinks: i32,
	/// File size in bytes.
	pub size: i32,
	/// Direct block ids, with the last slot holding the indirect block's
	/// id. `-1` marks an unassigned slot.
	pub blocks_map: [i32; FILE_BLOCKS],
}

impl FileRecord {
	/// A freshly vacated record: no type, no links, no size, no blocks.
	pub fn vacant() -> Self {
		Self {
			ftype: FileType::Vacant,
			nlinks: 0,
			size: 0,
			blocks_map: [-1; FILE_BLOCKS],
		}
	}

	/// A freshly created record with one link and no data yet.
	pub fn new_file() -> Self {
		Self {
			ftype: FileType::Regular,
			nlinks: 1,
			size: 0,
			blocks_map: [-1; FILE_BLOCKS],
		}
	}

	/// Whether the record currently names a file.
	pub fn in_use(&self) -> bool {
		self.nlinks > 0
	}

	/// Serializes the record as little-endian bytes.
	pub fn to_bytes(&self) -> [u8; FSTAT_SIZE as usize] {
		let mut buf = [0u8; FSTAT_SIZE as usize];
		buf[0..4].copy_from_slice(&self.ftype.to_raw().to_le_bytes());
		buf[4..8].copy_from_slice(&self.nlinks.to_le_bytes());
		buf[8..12].copy_from_slice(&self.size.to_le_bytes());
		for (i, &block) in self.blocks_map.iter().enumerate() {
			let off = 12 + i * 4;
			buf[off..off + 4].copy_from_slice(&block.to_le_bytes());
		}
		buf
	}

	/// Deserializes a record from little-endian bytes.
	pub fn from_bytes(buf: &[u8]) -> Self {
		let ftype = FileType::from_raw(i32::from_le_bytes(buf[0..4].try_into().unwrap()));
		let nlinks = i32::from_le_bytes(buf[4..8].try_into().unwrap());
		let size = i32::from_le_bytes(buf[8..12].try_into().unwrap());
		let mut blocks_map = [-1i32; FILE_BLOCKS];
		for (i, slot) in blocks_map.iter_mut().enumerate() {
			let off = 12 + i * 4;
			*slot = i32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
		}
		Self {
			ftype,
			nlinks,
			size,
			blocks_map,
		}
	}
}

/// Reads the `id`th metadata record directly (no full-table scan).
pub fn read_record(dev: &mut File, layout: &Layout, id: i32) -> Result<FileRecord> {
	let mut buf = [0u8; FSTAT_SIZE as usize];
	dev.seek(SeekFrom::Start(layout.metadata_record(id)))
		.map_err(VsfsError::HostReadFailed)?;
	dev.read_exact(&mut buf).map_err(VsfsError::HostReadFailed)?;
	Ok(FileRecord::from_bytes(&buf))
}

/// Writes `record` back at `id`.
pub fn write_record(dev: &mut File, layout: &Layout, id: i32, record: &FileRecord) -> Result<()> {
	dev.seek(SeekFrom::Start(layout.metadata_record(id)))
		.map_err(VsfsError::HostWriteFailed)?;
	dev.write_all(&record.to_bytes())
		.map_err(VsfsError::HostWriteFailed)?;
	Ok(())
}

/// Reads the whole metadata table, `max_files` records long.
pub fn read_table(dev: &mut File, layout: &Layout, max_files: i32) -> Result<Vec<FileRecord>> {
	dev.seek(SeekFrom::Start(layout.metadata_table))
		.map_err(VsfsError::HostReadFailed)?;
	let mut records = Vec::with_capacity(max_files as usize);
	let mut buf = [0u8; FSTAT_SIZE as usize];
	for _ in 0..max_files {
		dev.read_exact(&mut buf).map_err(VsfsError::HostReadFailed)?;
		records.push(FileRecord::from_bytes(&buf));
	}
	Ok(records)
}

/// Finds the first record with `nlinks == 0`, i.e. an available file id.
pub fn find_vacant_slot(dev: &mut File, layout: &Layout, max_files: i32) -> Result<Option<i32>> {
	let table = read_table(dev, layout, max_files)?;
	Ok(table.iter().position(|r| !r.in_use()).map(|i| i as i32))
}
