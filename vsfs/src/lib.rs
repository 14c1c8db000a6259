//! Core of a very simple single-file-backed filesystem: a handful of
//! fixed-size on-disk tables (superblock, bitmap, metadata, directory)
//! plus a data-block pool, addressed directly and through one level of
//! indirection.
//!
//! The on-disk format is deliberately small and not portable C struct
//! layout; every record is serialized field-by-field as little-endian
//! integers so the image is readable on any host regardless of its
//! native struct padding or endianness.
//!
//! [`Session`] is the entry point: [`Session::format`] lays out a brand
//! new image and mounts it, [`Session::mount`] opens an existing one.
//! Every other operation (`stat`, `readdir`, `create`, `open`, `close`,
//! `read`, `write`, `link`, `unlink`, `truncate`) is a method on the
//! mounted session, defined in [`ops`].

pub mod bitmap;
pub mod blockmap;
pub mod directory;
pub mod error;
pub mod layout;
pub mod metadata;
mod ops;
pub mod session;

pub use directory::DirRecord;
pub use error::{Result, VsfsError};
pub use layout::{Layout, Superblock, END_ID};
pub use metadata::{FileRecord, FileType};
pub use ops::MAX_FILE_BYTES;
pub use session::Session;
