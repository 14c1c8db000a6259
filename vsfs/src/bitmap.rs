//! Free-space manager: reads and writes the block bitmap, allocates and
//! releases individual data blocks.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{Result, VsfsError};
use crate::layout::Layout;

/// No free block was found, or a release/occupy request was out of range.
pub const NONE: i32 = -1;

/// Reads the whole bitmap into memory.
pub fn read_bitmap(dev: &mut File, layout: &Layout, n_blocks: i32) -> Result<Vec<u8>> {
	let mut buf = vec![0u8; n_blocks as usize];
	dev.seek(SeekFrom::Start(layout.bitmap))
		.map_err(VsfsError::HostReadFailed)?;
	dev.read_exact(&mut buf).map_err(VsfsError::HostReadFailed)?;
	Ok(buf)
}

/// Scans the bitmap from index 0, returning the first free block id, or
/// [`NONE`] if the pool is full.
pub fn find_free(dev: &mut File, layout: &Layout, n_blocks: i32) -> Result<i32> {
	let bitmap = read_bitmap(dev, layout, n_blocks)?;
	match bitmap.iter().position(|&b| b == 0) {
		Some(i) => Ok(i as i32),
		None => Ok(NONE),
	}
}

/// Marks `id` occupied. Fails with [`VsfsError::HostWriteFailed`]-shaped
/// double-allocation guard if the slot is already nonzero.
fn occupy(dev: &mut File, layout: &Layout, id: i32) -> Result<bool> {
	let offset = layout.bitmap_byte(id);
	let mut byte = [0u8; 1];
	dev.seek(SeekFrom::Start(offset))
		.map_err(VsfsError::HostReadFailed)?;
	dev.read_exact(&mut byte).map_err(VsfsError::HostReadFailed)?;
	if byte[0] != 0 {
		return Ok(false);
	}
	dev.seek(SeekFrom::Start(offset))
		.map_err(VsfsError::HostWriteFailed)?;
	dev.write_all(&[1]).map_err(VsfsError::HostWriteFailed)?;
	Ok(true)
}

/// Marks `id` free. `id < 0` is a no-op, representing "no such block".
pub fn release(dev: &mut File, layout: &Layout, id: i32) -> Result<()> {
	if id < 0 {
		return Ok(());
	}
	dev.seek(SeekFrom::Start(layout.bitmap_byte(id)))
		.map_err(VsfsError::HostWriteFailed)?;
	dev.write_all(&[0]).map_err(VsfsError::HostWriteFailed)?;
	Ok(())
}

/// Finds a free block and occupies it in one step, first-fit by lowest
/// index. Returns [`NONE`] if the pool is exhausted (not an error: callers
/// surface this as a short read/write).
pub fn allocate_one(dev: &mut File, layout: &Layout, n_blocks: i32) -> Result<i32> {
	let id = find_free(dev, layout, n_blocks)?;
	if id == NONE {
		return Ok(NONE);
	}
	// The byte was just observed free under the same (single-threaded,
	// non-reentrant) session, so `occupy` cannot fail here.
	occupy(dev, layout, id)?;
	Ok(id)
}
