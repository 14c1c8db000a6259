//! The closed taxonomy of errors the core can return.

use std::fmt;
use std::io;

/// An error produced by a core operation.
///
/// Each variant names one failure a caller must be able to distinguish.
/// Running out of free blocks is deliberately not a variant here: the
/// allocator surfaces exhaustion as a short read/write count, not an error.
#[derive(Debug)]
pub enum VsfsError {
	/// Could not create the backing file.
	HostCreateFailed(io::Error),
	/// Could not open an existing backing file.
	HostOpenFailed(io::Error),
	/// Could not close the backing file.
	HostCloseFailed(io::Error),
	/// A read against the backing file failed.
	HostReadFailed(io::Error),
	/// A write against the backing file failed.
	HostWriteFailed(io::Error),
	/// `format` cannot satisfy the minimum block count for the requested
	/// image size.
	ImageTooSmall,
	/// `mount` was called on a file that does not start with the marker.
	BadMarker,
	/// The metadata table or directory table is full.
	MaxFiles,
	/// A name is already bound in the directory table.
	AlreadyExists,
	/// A name is not bound in the directory table.
	NotFound,
	/// A descriptor is out of range or not currently open.
	BadDescriptor,
	/// The open-descriptor table is full.
	TooManyOpen,
}

impl fmt::Display for VsfsError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::HostCreateFailed(e) => write!(f, "failed to create image: {e}"),
			Self::HostOpenFailed(e) => write!(f, "failed to open image: {e}"),
			Self::HostCloseFailed(e) => write!(f, "failed to close image: {e}"),
			Self::HostReadFailed(e) => write!(f, "failed to read image: {e}"),
			Self::HostWriteFailed(e) => write!(f, "failed to write image: {e}"),
			Self::ImageTooSmall => write!(f, "image size too small to hold a filesystem"),
			Self::BadMarker => write!(f, "not a vsfs image"),
			Self::MaxFiles => write!(f, "maximum number of files reached"),
			Self::AlreadyExists => write!(f, "file already exists"),
			Self::NotFound => write!(f, "no such file"),
			Self::BadDescriptor => write!(f, "bad file descriptor"),
			Self::TooManyOpen => write!(f, "too many open files"),
		}
	}
}

impl std::error::Error for VsfsError {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Self::HostCreateFailed(e)
			| Self::HostOpenFailed(e)
			| Self::HostCloseFailed(e)
			| Self::HostReadFailed(e)
			| Self::HostWriteFailed(e) => Some(e),
			_ => None,
		}
	}
}

/// Result type used throughout the core.
pub type Result<T> = std::result::Result<T, VsfsError>;
