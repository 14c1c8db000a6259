//! The image session: owns the backing file handle while mounted, the
//! in-memory superblock, and the open-descriptor table. One session per
//! mounted image; every façade operation other than `format`/`mount`
//! takes `&mut self`.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, Write};
use std::path::Path;

use crate::error::{Result, VsfsError};
use crate::layout::{Layout, Superblock, FSTAT_SIZE, MARKER, MARKER_SIZE};
use crate::layout::{BLOCK_SIZE, DIR_REC_SIZE, MAX_FILES_OPENED};
use crate::{directory, metadata};

/// An open image: the backing file, its superblock, and the
/// open-descriptor table.
#[derive(Debug)]
pub struct Session {
	dev: File,
	superblock: Superblock,
	/// `descriptors[fd]` holds the file id bound to `fd`, or `-1`.
	descriptors: [i32; MAX_FILES_OPENED],
	/// Byte offset of the next record `readdir` will read when called with
	/// `advance == true`.
	readdir_cursor: u64,
}

impl Session {
	/// Creates a brand new image at `path` and mounts it.
	///
	/// Derives `n_blocks` as the largest integer satisfying the layout
	/// budget for `image_size`; `max_files = n_blocks / 2`. Fails with
	/// [`VsfsError::ImageTooSmall`] if fewer than 2 blocks would result.
	pub fn format(path: impl AsRef<Path>, image_size: i32) -> Result<Self> {
		let denom = BLOCK_SIZE as i64 + 1 + FSTAT_SIZE as i64 / 2 + DIR_REC_SIZE as i64 / 2;
		let budget = image_size as i64 - MARKER_SIZE as i64 - 16 - DIR_REC_SIZE as i64;
		let n_blocks = if budget > 0 { budget / denom } else { 0 };
		if n_blocks < 2 {
			return Err(VsfsError::ImageTooSmall);
		}
		let n_blocks = n_blocks as i32;
		let max_files = n_blocks / 2;

		let superblock = Superblock {
			image_size,
			block_size: BLOCK_SIZE as i32,
			n_blocks,
			max_files,
		};
		let layout = superblock.layout();

		let mut dev = OpenOptions::new()
			.read(true)
			.write(true)
			.create(true)
			.truncate(true)
			.open(path.as_ref())
			.map_err(VsfsError::HostCreateFailed)?;

		dev.write_all(&MARKER).map_err(VsfsError::HostWriteFailed)?;
		dev.write_all(&superblock.to_bytes())
			.map_err(VsfsError::HostWriteFailed)?;
		dev.write_all(&vec![0u8; n_blocks as usize])
			.map_err(VsfsError::HostWriteFailed)?;

		let vacant_record = metadata::FileRecord::vacant().to_bytes();
		for _ in 0..max_files {
			dev.write_all(&vacant_record).map_err(VsfsError::HostWriteFailed)?;
		}

		let vacant_dir = directory::DirRecord::vacant().to_bytes();
		for _ in 0..max_files {
			dev.write_all(&vacant_dir).map_err(VsfsError::HostWriteFailed)?;
		}
		dev.write_all(&directory::DirRecord::terminator().to_bytes())
			.map_err(VsfsError::HostWriteFailed)?;

		let data_region_len = n_blocks as u64 * BLOCK_SIZE as u64;
		write_zeroes(&mut dev, data_region_len)?;

		debug_assert_eq!(
			dev.stream_position().map_err(VsfsError::HostWriteFailed)?,
			layout.data_blocks + data_region_len
		);

		Ok(Self {
			dev,
			superblock,
			descriptors: [-1; MAX_FILES_OPENED],
			readdir_cursor: 0,
		})
	}

	/// Opens an existing image read-write and mounts it.
	pub fn mount(path: impl AsRef<Path>) -> Result<Self> {
		let mut dev = OpenOptions::new()
			.read(true)
			.write(true)
			.open(path.as_ref())
			.map_err(VsfsError::HostOpenFailed)?;

		let mut marker = [0u8; MARKER_SIZE as usize];
		dev.read_exact(&mut marker).map_err(VsfsError::HostReadFailed)?;
		if marker != MARKER {
			return Err(VsfsError::BadMarker);
		}

		let mut sb_buf = [0u8; 16];
		dev.read_exact(&mut sb_buf).map_err(VsfsError::HostReadFailed)?;
		let superblock = Superblock::from_bytes(&sb_buf);

		Ok(Self {
			dev,
			superblock,
			descriptors: [-1; MAX_FILES_OPENED],
			readdir_cursor: 0,
		})
	}

	/// Closes every still-open descriptor and the backing file.
	pub fn unmount(mut self) -> Result<()> {
		for slot in self.descriptors.iter_mut() {
			*slot = -1;
		}
		self.dev.sync_all().map_err(VsfsError::HostCloseFailed)?;
		Ok(())
	}

	/// The mounted image's superblock.
	pub fn superblock(&self) -> Superblock {
		self.superblock
	}

	/// The region layout derived from the current superblock.
	pub fn layout(&self) -> Layout {
		self.superblock.layout()
	}

	pub(crate) fn dev(&mut self) -> &mut File {
		&mut self.dev
	}

	pub(crate) fn descriptors(&self) -> &[i32; MAX_FILES_OPENED] {
		&self.descriptors
	}

	pub(crate) fn descriptors_mut(&mut self) -> &mut [i32; MAX_FILES_OPENED] {
		&mut self.descriptors
	}

	pub(crate) fn readdir_cursor(&self) -> u64 {
		self.readdir_cursor
	}

	pub(crate) fn set_readdir_cursor(&mut self, pos: u64) {
		self.readdir_cursor = pos;
	}

	/// Resolves an open descriptor to its bound file id.
	pub(crate) fn descriptor_to_id(&self, fd: i32) -> Result<i32> {
		if fd < 0 || fd as usize >= MAX_FILES_OPENED {
			return Err(VsfsError::BadDescriptor);
		}
		let id = self.descriptors[fd as usize];
		if id < 0 {
			return Err(VsfsError::BadDescriptor);
		}
		Ok(id)
	}
}

/// Writes `len` zero bytes starting at the current position, in
/// fixed-size chunks rather than one giant heap buffer.
fn write_zeroes(dev: &mut File, mut len: u64) -> Result<()> {
	const CHUNK: usize = 64 * 1024;
	let zeroes = [0u8; CHUNK];
	while len > 0 {
		let n = len.min(CHUNK as u64) as usize;
		dev.write_all(&zeroes[..n]).map_err(VsfsError::HostWriteFailed)?;
		len -= n as u64;
	}
	Ok(())
}
