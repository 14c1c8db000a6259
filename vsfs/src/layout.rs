//! On-disk layout: the superblock, the start marker, and the layout
//! calculator that turns a superblock into byte offsets of each region.

/// Number of entries in a file record's `blocks_map`. The last entry holds
/// the indirect block's id, not a direct data block.
pub const FILE_BLOCKS: usize = 5;
/// Fixed width, in bytes, of a directory record's name field.
pub const MAX_NAMESIZE: usize = 28;
/// Size in bytes of one data block.
pub const BLOCK_SIZE: usize = 256;
/// Size of the open-descriptor table.
pub const MAX_FILES_OPENED: usize = 256;
/// Sentinel terminating the directory table. Distinct from `-1` (vacant)
/// and from any id a `max_files`-bounded metadata table could produce.
pub const END_ID: i32 = i32::MAX;

/// The 8-byte identifier present at offset 0 of every valid image.
pub const MARKER: [u8; 8] = *b"VSFSIMG\0";

/// Serialized size of the [`MARKER`].
pub const MARKER_SIZE: u64 = 8;
/// Serialized size of a [`Superblock`]: four `i32`s.
pub const SUPERBLOCK_SIZE: u64 = 16;
/// Serialized size of a [`crate::metadata::FileRecord`].
pub const FSTAT_SIZE: u64 = 3 * 4 + FILE_BLOCKS as u64 * 4;
/// Serialized size of a [`crate::directory::DirRecord`].
pub const DIR_REC_SIZE: u64 = 4 + MAX_NAMESIZE as u64;

/// The four integers written once at format and read at mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Superblock {
	/// Total size of the backing image, in bytes.
	pub image_size: i32,
	/// Size of one data block, in bytes. Always [`BLOCK_SIZE`].
	pub block_size: i32,
	/// Number of blocks in the data-block pool.
	pub n_blocks: i32,
	/// Number of records in the metadata table (and non-terminator slots
	/// in the directory table).
	pub max_files: i32,
}

impl Superblock {
	/// Serializes the superblock as little-endian bytes.
	pub fn to_bytes(self) -> [u8; SUPERBLOCK_SIZE as usize] {
		let mut buf = [0u8; SUPERBLOCK_SIZE as usize];
		buf[0..4].copy_from_slice(&self.image_size.to_le_bytes());
		buf[4..8].copy_from_slice(&self.block_size.to_le_bytes());
		buf[8..12].copy_from_slice(&self.n_blocks.to_le_bytes());
		buf[12..16].copy_from_slice(&self.max_files.to_le_bytes());
		buf
	}

	/// Deserializes a superblock from little-endian bytes.
	pub fn from_bytes(buf: &[u8]) -> Self {
		Self {
			image_size: i32::from_le_bytes(buf[0..4].try_into().unwrap()),
			block_size: i32::from_le_bytes(buf[4..8].try_into().unwrap()),
			n_blocks: i32::from_le_bytes(buf[8..12].try_into().unwrap()),
			max_files: i32::from_le_bytes(buf[12..16].try_into().unwrap()),
		}
	}

	/// Byte offsets of every on-disk region, computed from `self`. Always
	/// re-derived rather than cached, since a superblock is tiny and this
	/// keeps a stale `Layout` from ever being read alongside a mutated
	/// superblock.
	pub fn layout(&self) -> Layout {
		let n_blocks = self.n_blocks as u64;
		let max_files = self.max_files as u64;

		let marker = 0u64;
		let superblock = marker + MARKER_SIZE;
		let bitmap = superblock + SUPERBLOCK_SIZE;
		let metadata_table = bitmap + n_blocks;
		let directory_table = metadata_table + max_files * FSTAT_SIZE;
		let data_blocks = directory_table + (max_files + 1) * DIR_REC_SIZE;

		Layout {
			marker,
			superblock,
			bitmap,
			metadata_table,
			directory_table,
			data_blocks,
		}
	}
}

/// Byte offsets of each on-disk region, derived from a [`Superblock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
	/// Offset of the 8-byte start marker. Always 0.
	pub marker: u64,
	/// Offset of the superblock.
	pub superblock: u64,
	/// Offset of the free-block bitmap (one byte per block).
	pub bitmap: u64,
	/// Offset of the metadata (fstat) table.
	pub metadata_table: u64,
	/// Offset of the directory table.
	pub directory_table: u64,
	/// Offset of the data-block pool.
	pub data_blocks: u64,
}

impl Layout {
	/// Offset of the `id`th metadata record.
	pub fn metadata_record(&self, id: i32) -> u64 {
		self.metadata_table + id as u64 * FSTAT_SIZE
	}

	/// Offset of the `slot`th directory record.
	pub fn dir_record(&self, slot: i32) -> u64 {
		self.directory_table + slot as u64 * DIR_REC_SIZE
	}

	/// Offset of the `block_id`th data block.
	pub fn data_block(&self, block_id: i32) -> u64 {
		self.data_blocks + block_id as u64 * BLOCK_SIZE as u64
	}

	/// Offset of the bitmap byte for `block_id`.
	pub fn bitmap_byte(&self, block_id: i32) -> u64 {
		self.bitmap + block_id as u64
	}
}
