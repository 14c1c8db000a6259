//! Block-addressing engine: maps a (file record, logical block offset)
//! pair to an absolute data-block id, allocating direct slots and the
//! indirect block on demand.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use crate::bitmap;
use crate::error::{Result, VsfsError};
use crate::layout::{Layout, BLOCK_SIZE, FILE_BLOCKS};
use crate::metadata::FileRecord;

/// Number of block ids an indirect block can hold.
pub const INDIRECT_ENTRIES: usize = BLOCK_SIZE / 4;

/// Maximum number of blocks addressable by a single file.
pub const MAX_BLOCKS_PER_FILE: usize = (FILE_BLOCKS - 1) + INDIRECT_ENTRIES;

/// The address a resolve call would need lies past the indirect block's
/// capacity.
pub const OUT_OF_RANGE: i32 = -2;
/// The address is not currently backed by a block (and `create` was
/// false).
pub const NOT_PRESENT: i32 = -1;

/// Resolves logical block `b` within `record` to an absolute block id,
/// allocating on demand when `create` is true.
///
/// Mutates `record.blocks_map` in place for direct slots and to install
/// the indirect-block pointer, but never writes `record` back to the
/// metadata table (the caller does that once, after every resolve call
/// for the operation has completed).
pub fn resolve(
	dev: &mut File,
	layout: &Layout,
	n_blocks: i32,
	record: &mut FileRecord,
	b: i32,
	create: bool,
) -> Result<i32> {
	let b = b as usize;
	if b < FILE_BLOCKS - 1 {
		let slot = record.blocks_map[b];
		if slot >= 0 || !create {
			return Ok(if slot >= 0 { slot } else { NOT_PRESENT });
		}
		let new_id = bitmap::allocate_one(dev, layout, n_blocks)?;
		if new_id == bitmap::NONE {
			return Ok(bitmap::NONE);
		}
		record.blocks_map[b] = new_id;
		return Ok(new_id);
	}

	let k = b - (FILE_BLOCKS - 1);
	if k >= INDIRECT_ENTRIES {
		return Ok(OUT_OF_RANGE);
	}

	let indirect_slot = FILE_BLOCKS - 1;
	if record.blocks_map[indirect_slot] < 0 {
		if !create {
			return Ok(NOT_PRESENT);
		}
		let indirect_id = bitmap::allocate_one(dev, layout, n_blocks)?;
		if indirect_id == bitmap::NONE {
			return Ok(bitmap::NONE);
		}
		let k0_id = bitmap::allocate_one(dev, layout, n_blocks)?;
		if k0_id == bitmap::NONE {
			bitmap::release(dev, layout, indirect_id)?;
			return Ok(bitmap::NONE);
		}
		let mut entries = [-1i32; INDIRECT_ENTRIES];
		entries[0] = k0_id;
		write_indirect_block(dev, layout, indirect_id, &entries)?;
		record.blocks_map[indirect_slot] = indirect_id;
		return Ok(k0_id);
	}

	let indirect_id = record.blocks_map[indirect_slot];
	let mut entries = read_indirect_block(dev, layout, indirect_id)?;
	let slot = entries[k];
	if slot >= 0 || !create {
		return Ok(if slot >= 0 { slot } else { NOT_PRESENT });
	}
	let new_id = bitmap::allocate_one(dev, layout, n_blocks)?;
	if new_id == bitmap::NONE {
		return Ok(bitmap::NONE);
	}
	entries[k] = new_id;
	write_indirect_block(dev, layout, indirect_id, &entries)?;
	Ok(new_id)
}

/// Reads the indirect block at `indirect_id`, reinterpreted as an array of
/// block ids.
pub fn read_indirect_block(
	dev: &mut File,
	layout: &Layout,
	indirect_id: i32,
) -> Result<[i32; INDIRECT_ENTRIES]> {
	let mut buf = [0u8; BLOCK_SIZE];
	dev.seek(SeekFrom::Start(layout.data_block(indirect_id)))
		.map_err(VsfsError::HostReadFailed)?;
	dev.read_exact(&mut buf).map_err(VsfsError::HostReadFailed)?;
	let mut entries = [-1i32; INDIRECT_ENTRIES];
	for (i, slot) in entries.iter_mut().enumerate() {
		let off = i * 4;
		*slot = i32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
	}
	Ok(entries)
}

/// Writes `entries` back to the indirect block at `indirect_id`.
pub fn write_indirect_block(
	dev: &mut File,
	layout: &Layout,
	indirect_id: i32,
	entries: &[i32; INDIRECT_ENTRIES],
) -> Result<()> {
	let mut buf = [0u8; BLOCK_SIZE];
	for (i, &entry) in entries.iter().enumerate() {
		let off = i * 4;
		buf[off..off + 4].copy_from_slice(&entry.to_le_bytes());
	}
	dev.seek(SeekFrom::Start(layout.data_block(indirect_id)))
		.map_err(VsfsError::HostWriteFailed)?;
	dev.write_all(&buf).map_err(VsfsError::HostWriteFailed)?;
	Ok(())
}

/// Releases every block reachable from `record` (direct, indirect, and the
/// blocks the indirect block references), and the indirect block itself.
/// Leaves `record.blocks_map` all `-1`; the caller persists the record.
pub fn release_all(dev: &mut File, layout: &Layout, record: &mut FileRecord) -> Result<()> {
	for slot in record.blocks_map.iter_mut().take(FILE_BLOCKS - 1) {
		bitmap::release(dev, layout, *slot)?;
		*slot = -1;
	}
	let indirect_slot = FILE_BLOCKS - 1;
	if record.blocks_map[indirect_slot] >= 0 {
		release_indirect_chain(dev, layout, record.blocks_map[indirect_slot], 0)?;
		bitmap::release(dev, layout, record.blocks_map[indirect_slot])?;
		record.blocks_map[indirect_slot] = -1;
	}
	Ok(())
}

/// Releases every block referenced by the indirect block at `indirect_id`
/// from entry `start` onward, stopping at the first `-1`. Does **not**
/// release the indirect block itself (see [`release_all`] for that).
pub fn release_indirect_chain(
	dev: &mut File,
	layout: &Layout,
	indirect_id: i32,
	start: usize,
) -> Result<()> {
	let mut entries = read_indirect_block(dev, layout, indirect_id)?;
	let mut changed = false;
	for entry in entries.iter_mut().skip(start) {
		if *entry < 0 {
			break;
		}
		bitmap::release(dev, layout, *entry)?;
		*entry = -1;
		changed = true;
	}
	if changed {
		write_indirect_block(dev, layout, indirect_id, &entries)?;
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::layout::Superblock;

	fn scratch(n_blocks: i32) -> (File, Layout) {
		let sb = Superblock {
			image_size: 0,
			block_size: BLOCK_SIZE as i32,
			n_blocks,
			max_files: 4,
		};
		let layout = sb.layout();
		let path = std::env::temp_dir().join(format!("vsfs-blockmap-test-{:p}", &sb as *const _));
		let mut f = File::options()
			.read(true)
			.write(true)
			.create(true)
			.truncate(true)
			.open(&path)
			.unwrap();
		use std::io::Write as _;
		f.write_all(&vec![0u8; layout.data_blocks as usize + n_blocks as usize * BLOCK_SIZE])
			.unwrap();
		(f, layout)
	}

	#[test]
	fn direct_slots_allocate_lazily() {
		let (mut f, layout) = scratch(8);
		let mut rec = FileRecord::new_file();
		assert_eq!(
			resolve(&mut f, &layout, 8, &mut rec, 0, false).unwrap(),
			NOT_PRESENT
		);
		let id = resolve(&mut f, &layout, 8, &mut rec, 0, true).unwrap();
		assert!(id >= 0);
		assert_eq!(resolve(&mut f, &layout, 8, &mut rec, 0, false).unwrap(), id);
	}

	#[test]
	fn indirect_region_allocates_index_block_and_first_entry() {
		let (mut f, layout) = scratch(8);
		let mut rec = FileRecord::new_file();
		let b = (FILE_BLOCKS - 1) as i32;
		let id = resolve(&mut f, &layout, 8, &mut rec, b, true).unwrap();
		assert!(id >= 0);
		assert!(rec.blocks_map[FILE_BLOCKS - 1] >= 0);
		assert_ne!(rec.blocks_map[FILE_BLOCKS - 1], id);
	}

	#[test]
	fn beyond_indirect_capacity_is_out_of_range() {
		let (mut f, layout) = scratch(8);
		let mut rec = FileRecord::new_file();
		let b = (FILE_BLOCKS - 1 + INDIRECT_ENTRIES) as i32;
		assert_eq!(
			resolve(&mut f, &layout, 8, &mut rec, b, true).unwrap(),
			OUT_OF_RANGE
		);
	}

	#[test]
	fn release_all_frees_direct_and_indirect_chain() {
		let (mut f, layout) = scratch(8);
		let mut rec = FileRecord::new_file();
		resolve(&mut f, &layout, 8, &mut rec, 0, true).unwrap();
		let b = (FILE_BLOCKS - 1) as i32;
		resolve(&mut f, &layout, 8, &mut rec, b, true).unwrap();
		release_all(&mut f, &layout, &mut rec).unwrap();
		assert!(rec.blocks_map.iter().all(|&b| b == -1));
		assert_eq!(bitmap::find_free(&mut f, &layout, 8).unwrap(), 0);
	}
}
