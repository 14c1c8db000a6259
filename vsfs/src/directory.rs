//! File-index manager, directory half: the single flat table of
//! name-to-id bindings.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{Result, VsfsError};
use crate::layout::{Layout, DIR_REC_SIZE, END_ID, MAX_NAMESIZE};

/// A directory record: either a vacant slot, the terminator, or a
/// name-to-id binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirRecord {
	/// The bound file id, `-1` if vacant, or [`END_ID`] for the terminator.
	pub id: i32,
	/// NUL-padded name, fixed at [`MAX_NAMESIZE`] bytes.
	pub name: [u8; MAX_NAMESIZE],
}

impl DirRecord {
	/// A vacant slot: no id, no name.
	pub fn vacant() -> Self {
		Self {
			id: -1,
			name: [0; MAX_NAMESIZE],
		}
	}

	/// The terminator record.
	pub fn terminator() -> Self {
		Self {
			id: END_ID,
			name: [0; MAX_NAMESIZE],
		}
	}

	/// Builds a record binding `name` to `id`. Truncates names longer than
	/// [`MAX_NAMESIZE`] to fit the fixed-width field.
	pub fn new(id: i32, name: &str) -> Self {
		let mut buf = [0u8; MAX_NAMESIZE];
		let bytes = name.as_bytes();
		let len = bytes.len().min(MAX_NAMESIZE);
		buf[..len].copy_from_slice(&bytes[..len]);
		Self { id, name: buf }
	}

	/// Whether the slot is neither vacant nor the terminator.
	pub fn is_bound(&self) -> bool {
		self.id >= 0 && self.id != END_ID
	}

	/// The name up to its first NUL byte, as raw bytes.
	pub fn name_bytes(&self) -> &[u8] {
		let end = self.name.iter().position(|&b| b == 0).unwrap_or(self.name.len());
		&self.name[..end]
	}

	/// Whether `name` matches this record's bound name exactly.
	pub fn name_matches(&self, name: &str) -> bool {
		self.name_bytes() == name.as_bytes()
	}

	/// Serializes the record as little-endian bytes.
	pub fn to_bytes(&self) -> [u8; DIR_REC_SIZE as usize] {
		let mut buf = [0u8; DIR_REC_SIZE as usize];
		buf[0..4].copy_from_slice(&self.id.to_le_bytes());
		buf[4..4 + MAX_NAMESIZE].copy_from_slice(&self.name);
		buf
	}

	/// Deserializes a record from little-endian bytes.
	pub fn from_bytes(buf: &[u8]) -> Self {
		let id = i32::from_le_bytes(buf[0..4].try_into().unwrap());
		let mut name = [0u8; MAX_NAMESIZE];
		name.copy_from_slice(&buf[4..4 + MAX_NAMESIZE]);
		Self { id, name }
	}
}

/// Reads the whole directory table, `max_files + 1` records long
/// (including the terminator).
pub fn read_table(dev: &mut File, layout: &Layout, max_files: i32) -> Result<Vec<DirRecord>> {
	dev.seek(SeekFrom::Start(layout.directory_table))
		.map_err(VsfsError::HostReadFailed)?;
	let mut records = Vec::with_capacity(max_files as usize + 1);
	let mut buf = [0u8; DIR_REC_SIZE as usize];
	for _ in 0..=max_files {
		dev.read_exact(&mut buf).map_err(VsfsError::HostReadFailed)?;
		records.push(DirRecord::from_bytes(&buf));
	}
	Ok(records)
}

/// Writes `record` back at `slot`.
pub fn write_record(dev: &mut File, layout: &Layout, slot: i32, record: &DirRecord) -> Result<()> {
	dev.seek(SeekFrom::Start(layout.dir_record(slot)))
		.map_err(VsfsError::HostWriteFailed)?;
	dev.write_all(&record.to_bytes())
		.map_err(VsfsError::HostWriteFailed)?;
	Ok(())
}

/// Linear-scans the non-terminator slots for a binding with this `name`.
/// Returns the slot index and bound id.
pub fn find_by_name(dev: &mut File, layout: &Layout, max_files: i32, name: &str) -> Result<Option<(i32, i32)>> {
	let table = read_table(dev, layout, max_files)?;
	Ok(table
		.iter()
		.take(max_files as usize)
		.enumerate()
		.find(|(_, rec)| rec.is_bound() && rec.name_matches(name))
		.map(|(slot, rec)| (slot as i32, rec.id)))
}

/// Finds the first vacant (non-terminator) slot.
pub fn find_vacant_slot(dev: &mut File, layout: &Layout, max_files: i32) -> Result<Option<i32>> {
	let table = read_table(dev, layout, max_files)?;
	Ok(table
		.iter()
		.take(max_files as usize)
		.position(|rec| rec.id == -1)
		.map(|i| i as i32))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn record_round_trips() {
		let rec = DirRecord::new(3, "hello");
		assert_eq!(DirRecord::from_bytes(&rec.to_bytes()), rec);
		assert!(rec.name_matches("hello"));
		assert!(!rec.name_matches("hell"));
	}

	#[test]
	fn name_longer_than_field_gets_truncated_not_panicking() {
		let long = "x".repeat(MAX_NAMESIZE + 10);
		let rec = DirRecord::new(1, &long);
		assert_eq!(rec.name_bytes().len(), MAX_NAMESIZE);
	}

	#[test]
	fn terminator_is_not_bound() {
		assert!(!DirRecord::terminator().is_bound());
		assert!(!DirRecord::vacant().is_bound());
	}
}
