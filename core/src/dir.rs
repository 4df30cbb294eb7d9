/*
 * Copyright 2026 nanofs contributors
 *
 * This file is part of nanofs.
 *
 * nanofs is free software: you can redistribute it and/or modify it under the
 * terms of the GNU General Public License as published by the Free Software
 * Foundation, either version 3 of the License, or (at your option) any later
 * version.
 *
 * nanofs is distributed in the hope that it will be useful, but WITHOUT ANY
 * WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR
 * A PARTICULAR PURPOSE. See the GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License along with
 * nanofs. If not, see <https://www.gnu.org/licenses/>.
 */

//! Directories are plain files whose bytes are a packed array of fixed-size
//! entries. This module never opens a public handle: it drives a throwaway
//! [`FileCursor`] directly over the parent directory's content.

use crate::device::BlockDevice;
use crate::error::{Error, Result};
use crate::index::{Ctx, FileCursor, Geometry};
use crate::inode::InodeId;
use nanofs_macros::BigEndianRecord;

/// Bytes of name storage in one entry; the name is zero-padded and is only
/// null-terminated when shorter than this.
pub const NAME_LEN: usize = 14;
/// The on-disk size of one directory entry.
pub const ENTRY_SIZE: usize = 16;

/// One directory entry: a name and the inode it names.
///
/// `name[0] == 0` marks a tombstone (deleted, or never used).
#[repr(C)]
#[derive(BigEndianRecord, Clone, Copy, Debug, Default)]
pub struct DirEntryRecord {
	pub name: [u8; NAME_LEN],
	pub inode: InodeId,
}

impl DirEntryRecord {
	fn is_tombstone(&self) -> bool {
		self.name[0] == 0
	}
}

/// Packs `name` into the fixed 14-byte field. A name that does not fit, or
/// is empty (which would be indistinguishable from a tombstone), is
/// rejected.
pub fn encode_name(name: &str) -> Result<[u8; NAME_LEN]> {
	let bytes = name.as_bytes();
	if bytes.is_empty() || bytes.len() > NAME_LEN {
		return Err(Error::NameTooLong);
	}
	let mut out = [0u8; NAME_LEN];
	out[..bytes.len()].copy_from_slice(bytes);
	Ok(out)
}

/// Recovers the stored name bytes, trimming the zero padding (or the whole
/// 14 bytes if the name used every slot).
pub fn decode_name(raw: &[u8; NAME_LEN]) -> Vec<u8> {
	let end = raw.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
	raw[..end].to_vec()
}

fn read_entry_seq<D: BlockDevice>(
	cursor: &mut FileCursor,
	ctx: &mut Ctx<D>,
	geom: &Geometry,
	size: u64,
) -> Result<DirEntryRecord> {
	let mut buf = [0u8; ENTRY_SIZE];
	let (n, _) = cursor.read(ctx, geom, size, &mut buf)?;
	if n != ENTRY_SIZE as u64 {
		return Err(Error::FatalInternalError);
	}
	Ok(DirEntryRecord::read_be(&buf))
}

/// Returns the inode named by `name` in the directory at `root_blk`, if any.
pub fn lookup<D: BlockDevice>(
	ctx: &mut Ctx<D>,
	geom: &Geometry,
	root_blk: u16,
	size: u64,
	name: &str,
) -> Result<Option<InodeId>> {
	let target = encode_name(name)?;
	Ok(scan(ctx, geom, root_blk, size, &target)?.found.map(|(_, inode)| inode))
}

struct ScanResult {
	/// `(offset, inode)` of the matching live entry, if found.
	found: Option<(u64, InodeId)>,
	/// Offset of the first tombstone seen before a match (or before the end).
	first_tombstone: Option<u64>,
}

fn scan<D: BlockDevice>(
	ctx: &mut Ctx<D>,
	geom: &Geometry,
	root_blk: u16,
	size: u64,
	target: &[u8; NAME_LEN],
) -> Result<ScanResult> {
	let mut cursor = FileCursor::open(ctx, root_blk)?;
	let mut first_tombstone = None;
	while cursor.abs_offset() < size {
		let offset = cursor.abs_offset();
		let rec = read_entry_seq(&mut cursor, ctx, geom, size)?;
		if rec.is_tombstone() {
			if first_tombstone.is_none() {
				first_tombstone = Some(offset);
			}
		} else if rec.name == *target {
			return Ok(ScanResult { found: Some((offset, rec.inode)), first_tombstone });
		}
	}
	Ok(ScanResult { found: None, first_tombstone })
}

/// Whether `name` already has a live entry in the directory.
pub fn exists<D: BlockDevice>(ctx: &mut Ctx<D>, geom: &Geometry, root_blk: u16, size: u64, name: &str) -> Result<bool> {
	let target = encode_name(name)?;
	Ok(scan(ctx, geom, root_blk, size, &target)?.found.is_some())
}

/// Inserts `(name, inode)`, reusing the first tombstone found or appending.
/// Fails with [`Error::Exists`] if the name is already live. Returns the
/// directory's new byte size.
pub fn insert<D: BlockDevice>(
	ctx: &mut Ctx<D>,
	geom: &Geometry,
	root_blk: u16,
	size: u64,
	name: &str,
	inode: InodeId,
) -> Result<u64> {
	let target = encode_name(name)?;
	let scan_result = scan(ctx, geom, root_blk, size, &target)?;
	if scan_result.found.is_some() {
		return Err(Error::Exists);
	}
	let offset = scan_result.first_tombstone.unwrap_or(size);
	let mut cursor = FileCursor::open(ctx, root_blk)?;
	cursor.seek(offset);
	let rec = DirEntryRecord { name: target, inode };
	let mut buf = [0u8; ENTRY_SIZE];
	rec.write_be(&mut buf);
	let (_, new_size) = cursor.write(ctx, geom, size, &buf)?;
	Ok(new_size)
}

/// Finds `name`, zeroes its entry (turning it into a tombstone) and returns
/// the inode it named. Fails with [`Error::NoEnt`] if not present.
pub fn remove<D: BlockDevice>(
	ctx: &mut Ctx<D>,
	geom: &Geometry,
	root_blk: u16,
	size: u64,
	name: &str,
) -> Result<InodeId> {
	let target = encode_name(name)?;
	let (offset, inode) = scan(ctx, geom, root_blk, size, &target)?.found.ok_or(Error::NoEnt)?;
	let mut cursor = FileCursor::open(ctx, root_blk)?;
	cursor.seek(offset);
	cursor.write(ctx, geom, size, &[0u8; ENTRY_SIZE])?;
	Ok(inode)
}

/// Whether a directory holds no live entries (tombstones don't count).
pub fn is_empty<D: BlockDevice>(ctx: &mut Ctx<D>, geom: &Geometry, root_blk: u16, size: u64) -> Result<bool> {
	let mut cursor = FileCursor::open(ctx, root_blk)?;
	while cursor.abs_offset() < size {
		let rec = read_entry_seq(&mut cursor, ctx, geom, size)?;
		if !rec.is_tombstone() {
			return Ok(false);
		}
	}
	Ok(true)
}

/// Reads the next live entry at or after byte offset `from`, skipping
/// tombstones. Returns the entry and the offset to resume from on the next
/// call, or `None` at end-of-directory.
pub fn next_live_entry<D: BlockDevice>(
	ctx: &mut Ctx<D>,
	geom: &Geometry,
	root_blk: u16,
	size: u64,
	from: u64,
) -> Result<Option<(DirEntryRecord, u64)>> {
	let mut cursor = FileCursor::open(ctx, root_blk)?;
	cursor.seek(from);
	while cursor.abs_offset() < size {
		let rec = read_entry_seq(&mut cursor, ctx, geom, size)?;
		if !rec.is_tombstone() {
			return Ok(Some((rec, cursor.abs_offset())));
		}
	}
	Ok(None)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::device::MemBlockDevice;
	use crate::freelist::Freelist;
	use crate::index::alloc_new_file;
	use crate::pool::BlockPool;

	fn setup() -> (MemBlockDevice, Freelist, BlockPool, Geometry, u16) {
		let mut dev = MemBlockDevice::new(0, 128, 4096);
		let (mut fl, _) = Freelist::create(&mut dev, 0).unwrap();
		let mut pool = BlockPool::new(128);
		let geom = Geometry::new(128);
		let root_blk = {
			let mut ctx = Ctx { device: &mut dev, freelist: &mut fl, pool: &mut pool };
			alloc_new_file(&mut ctx, &geom).unwrap()
		};
		(dev, fl, pool, geom, root_blk)
	}

	#[test]
	fn insert_then_lookup() {
		let (mut dev, mut fl, mut pool, geom, root_blk) = setup();
		let mut ctx = Ctx { device: &mut dev, freelist: &mut fl, pool: &mut pool };
		let size = insert(&mut ctx, &geom, root_blk, 0, "hello", 7).unwrap();
		assert_eq!(size, ENTRY_SIZE as u64);
		let found = lookup(&mut ctx, &geom, root_blk, size, "hello").unwrap();
		assert_eq!(found, Some(7));
		assert!(exists(&mut ctx, &geom, root_blk, size, "hello").unwrap());
		assert!(!exists(&mut ctx, &geom, root_blk, size, "missing").unwrap());
	}

	#[test]
	fn duplicate_insert_fails_exists() {
		let (mut dev, mut fl, mut pool, geom, root_blk) = setup();
		let mut ctx = Ctx { device: &mut dev, freelist: &mut fl, pool: &mut pool };
		let size = insert(&mut ctx, &geom, root_blk, 0, "a", 1).unwrap();
		let err = insert(&mut ctx, &geom, root_blk, size, "a", 2).unwrap_err();
		assert_eq!(err, Error::Exists);
	}

	#[test]
	fn tombstone_is_reused_without_growing_size() {
		let (mut dev, mut fl, mut pool, geom, root_blk) = setup();
		let mut ctx = Ctx { device: &mut dev, freelist: &mut fl, pool: &mut pool };
		let size = insert(&mut ctx, &geom, root_blk, 0, "a", 1).unwrap();
		let size = insert(&mut ctx, &geom, root_blk, size, "b", 2).unwrap();
		remove(&mut ctx, &geom, root_blk, size, "a").unwrap();
		let size2 = insert(&mut ctx, &geom, root_blk, size, "c", 3).unwrap();
		assert_eq!(size2, size, "reusing a tombstone must not grow the directory");
		assert_eq!(lookup(&mut ctx, &geom, root_blk, size2, "c").unwrap(), Some(3));
	}

	#[test]
	fn empty_directory_iterates_to_nothing() {
		let (mut dev, mut fl, mut pool, geom, root_blk) = setup();
		let mut ctx = Ctx { device: &mut dev, freelist: &mut fl, pool: &mut pool };
		assert!(is_empty(&mut ctx, &geom, root_blk, 0).unwrap());
		assert_eq!(next_live_entry(&mut ctx, &geom, root_blk, 0, 0).unwrap().map(|_| ()), None);
	}
}
