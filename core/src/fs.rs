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

//! The filesystem facade: `format`/`init`/`deinit`, root creation, the
//! config header, and every public operation, composed from the inode
//! table, freelist, file-index engine, directory layer and open-handle
//! layer.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::device::BlockDevice;
use crate::dir;
use crate::error::{Error, Result};
use crate::handle::{HandleTable, OPEN_READ, OPEN_SEEK_END, OPEN_TRUNCATE, OPEN_WRITE};
use crate::index::{self, Ctx, FileCursor, Geometry};
use crate::inode::{InodeId, InodeTable, ROOT_INODE};
use crate::stat::Stat;
use crate::trace::warn;
use nanofs_macros::BigEndianRecord;

/// The on-disk config header size, produced by `format` and required by `init`.
pub const CONFIG_LEN: usize = 16;

const MAGIC: u8 = 1;
const VERSION: u8 = 1;

/// The on-disk config header: `(magic, version, size_code)`, the first 3 of
/// the 16 bytes `format`/`init` exchange. `size_code` encodes the inode
/// table's block count as `size_code = block_count / 8 - 1`, since it is
/// always a multiple of 8.
#[repr(C)]
#[derive(BigEndianRecord, Clone, Copy, Debug, Default)]
struct ConfigHeader {
	magic: u8,
	version: u8,
	size_code: u8,
}

fn now() -> u32 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs() as u32)
		.unwrap_or(0)
}

fn encode_config(inode_block_count: u16) -> [u8; CONFIG_LEN] {
	let header = ConfigHeader {
		magic: MAGIC,
		version: VERSION,
		size_code: ((inode_block_count / 8) - 1) as u8,
	};
	let mut buf = [0u8; CONFIG_LEN];
	header.write_be(&mut buf);
	buf
}

/// Decodes and validates the config header; any layout other than the
/// current `(magic, version, size_code)` form is `InvalidFSParams`.
fn decode_config(config: &[u8; CONFIG_LEN]) -> Result<u16> {
	let header = ConfigHeader::read_be(config);
	if header.magic != MAGIC || header.version != VERSION {
		return Err(Error::InvalidFSParams);
	}
	Ok((header.size_code as u16 + 1) * 8)
}

/// The origin a [`Filesystem::seek`] offset is relative to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Whence {
	Abs,
	RelCurr,
	RelEnd,
}

/// Aggregate filesystem statistics, the `statfs`-equivalent.
#[derive(Clone, Copy, Debug)]
pub struct FsStats {
	pub total_blocks: u32,
	pub free_blocks: u32,
	pub total_inodes: u32,
	pub free_inodes: u32,
	pub block_size: u32,
}

/// The engine's single in-process entry point: owns the device and every
/// in-memory structure layered over it.
pub struct Filesystem<D> {
	device: D,
	geom: Geometry,
	inode_table: InodeTable,
	freelist: crate::freelist::Freelist,
	pool: crate::pool::BlockPool,
	handles: HandleTable,
}

impl<D: BlockDevice> Filesystem<D> {
	/// Formats `device` from scratch: zeroes the inode region, lays out the
	/// freelist immediately after it, creates the root directory (inode 0)
	/// and returns the config header the caller must persist externally
	/// (block 0 is not managed by the core).
	pub fn format(device: &mut D, inode_block_count: u16) -> Result<[u8; CONFIG_LEN]> {
		if inode_block_count == 0 || inode_block_count % 8 != 0 {
			return Err(Error::InvalidFSParams);
		}
		let mut inode_table = InodeTable::create(device, inode_block_count)?;
		let (mut freelist, _first_free) = crate::freelist::Freelist::create(device, 1 + inode_block_count as u32)?;
		let geom = Geometry::new(device.block_size());
		let mut pool = crate::pool::BlockPool::new(device.block_size());
		let root_blk = {
			let mut ctx = Ctx { device: &mut *device, freelist: &mut freelist, pool: &mut pool };
			index::alloc_new_file(&mut ctx, &geom)?
		};
		let root_inode = inode_table.create_inode(device, true, root_blk, now())?;
		debug_assert_eq!(root_inode, ROOT_INODE, "format must create the root directory first");
		Ok(encode_config(inode_block_count))
	}

	/// Loads a previously-formatted device. Fails with `Busy` if the device
	/// is already bound to another live instance.
	pub fn init(mut device: D, config: &[u8; CONFIG_LEN]) -> Result<Self> {
		device.try_bind()?;
		let inode_block_count = decode_config(config)?;
		let block_size = device.block_size();
		let inode_table = InodeTable::init(&device, inode_block_count)?;
		let freelist = crate::freelist::Freelist::init(&device, 1 + inode_block_count as u32)?;
		Ok(Self {
			device,
			geom: Geometry::new(block_size),
			inode_table,
			freelist,
			pool: crate::pool::BlockPool::new(block_size),
			handles: HandleTable::new(),
		})
	}

	/// Drops every in-memory structure and hands the device back to the
	/// caller, who owns it externally.
	pub fn deinit(mut self) -> D {
		self.device.unbind();
		self.device
	}

	fn read_inode(&self, ptr: InodeId) -> Result<crate::inode::InodeRecord> {
		self.inode_table.read(&self.device, ptr)?.ok_or(Error::NoEnt)
	}

	/// Aggregate block/inode usage, the engine equivalent of `statfs(2)`.
	pub fn stat_fs(&self) -> FsStats {
		FsStats {
			total_blocks: self.device.block_count(),
			free_blocks: self.freelist.free_block_count(),
			total_inodes: self.inode_table.capacity(),
			free_inodes: self.inode_table.free_count(),
			block_size: self.geom.block_size,
		}
	}

	pub fn lookup(&mut self, parent: InodeId, name: &str) -> Result<InodeId> {
		let parent_rec = self.read_inode(parent)?;
		if !parent_rec.is_dir() {
			return Err(Error::NotDir);
		}
		let (root_blk, size, geom) = (parent_rec.data_blk, parent_rec.size as u64, self.geom);
		let mut ctx = Ctx { device: &mut self.device, freelist: &mut self.freelist, pool: &mut self.pool };
		dir::lookup(&mut ctx, &geom, root_blk, size, name)?.ok_or(Error::NoEnt)
	}

	pub fn exists(&mut self, parent: InodeId, name: &str) -> Result<bool> {
		match self.lookup(parent, name) {
			Ok(_) => Ok(true),
			Err(Error::NoEnt) => Ok(false),
			Err(e) => Err(e),
		}
	}

	pub fn stat(&self, inode_ptr: InodeId) -> Result<Stat> {
		let rec = self.read_inode(inode_ptr)?;
		Ok(Stat::from_inode(inode_ptr, &rec, None))
	}

	fn make_entry(&mut self, parent: InodeId, name: &str, is_dir: bool) -> Result<InodeId> {
		dir::encode_name(name)?;
		let parent_rec = self.read_inode(parent)?;
		if !parent_rec.is_dir() {
			return Err(Error::NotDir);
		}
		let (parent_root, parent_size, geom) = (parent_rec.data_blk, parent_rec.size as u64, self.geom);

		let already_exists = {
			let mut ctx = Ctx { device: &mut self.device, freelist: &mut self.freelist, pool: &mut self.pool };
			dir::exists(&mut ctx, &geom, parent_root, parent_size, name)?
		};
		if already_exists {
			return Err(Error::Exists);
		}

		let new_root_blk = {
			let mut ctx = Ctx { device: &mut self.device, freelist: &mut self.freelist, pool: &mut self.pool };
			index::alloc_new_file(&mut ctx, &geom)?
		};

		let now_ts = now();
		let inode_ptr = match self.inode_table.create_inode(&mut self.device, is_dir, new_root_blk, now_ts) {
			Ok(ptr) => ptr,
			Err(e) => {
				let mut ctx = Ctx { device: &mut self.device, freelist: &mut self.freelist, pool: &mut self.pool };
				if let Err(purge_err) = index::purge(&mut ctx, &geom, new_root_blk) {
					warn!("rolling back failed inode allocation: purge of block {new_root_blk} failed: {purge_err}");
				}
				return Err(e);
			}
		};

		let insert_result = {
			let mut ctx = Ctx { device: &mut self.device, freelist: &mut self.freelist, pool: &mut self.pool };
			dir::insert(&mut ctx, &geom, parent_root, parent_size, name, inode_ptr)
		};
		match insert_result {
			Ok(new_parent_size) => {
				self.inode_table.update(&mut self.device, parent, Some(new_parent_size as u32), Some(now_ts))?;
				Ok(inode_ptr)
			}
			Err(e) => {
				if let Err(free_err) = self.inode_table.must_free(&mut self.device, inode_ptr) {
					warn!("rolling back failed directory insert: freeing inode {inode_ptr} failed: {free_err}");
				}
				let mut ctx = Ctx { device: &mut self.device, freelist: &mut self.freelist, pool: &mut self.pool };
				if let Err(purge_err) = index::purge(&mut ctx, &geom, new_root_blk) {
					warn!("rolling back failed directory insert: purge of block {new_root_blk} failed: {purge_err}");
				}
				Err(e)
			}
		}
	}

	/// Creates a regular file. Fails with `Exists` or `NameTooLong`.
	pub fn create(&mut self, parent: InodeId, name: &str) -> Result<InodeId> {
		self.make_entry(parent, name, false)
	}

	/// Creates a subdirectory. Fails with `Exists` or `NameTooLong`.
	pub fn mkdir(&mut self, parent: InodeId, name: &str) -> Result<InodeId> {
		self.make_entry(parent, name, true)
	}

	/// Removes an empty subdirectory. Fails with `NotEmpty` if it still has
	/// live entries.
	pub fn rmdir(&mut self, parent: InodeId, name: &str) -> Result<()> {
		let parent_rec = self.read_inode(parent)?;
		if !parent_rec.is_dir() {
			return Err(Error::NotDir);
		}
		let (parent_root, parent_size, geom) = (parent_rec.data_blk, parent_rec.size as u64, self.geom);

		let target_ptr = {
			let mut ctx = Ctx { device: &mut self.device, freelist: &mut self.freelist, pool: &mut self.pool };
			dir::lookup(&mut ctx, &geom, parent_root, parent_size, name)?
		}
		.ok_or(Error::NoEnt)?;
		let target_rec = self.inode_table.read(&self.device, target_ptr)?.ok_or(Error::FatalInternalError)?;
		if !target_rec.is_dir() {
			return Err(Error::NotDir);
		}
		let (target_root, target_size) = (target_rec.data_blk, target_rec.size as u64);

		let empty = {
			let mut ctx = Ctx { device: &mut self.device, freelist: &mut self.freelist, pool: &mut self.pool };
			dir::is_empty(&mut ctx, &geom, target_root, target_size)?
		};
		if !empty {
			return Err(Error::NotEmpty);
		}

		self.inode_table.must_free(&mut self.device, target_ptr)?;
		{
			let mut ctx = Ctx { device: &mut self.device, freelist: &mut self.freelist, pool: &mut self.pool };
			index::purge(&mut ctx, &geom, target_root)?;
			dir::remove(&mut ctx, &geom, parent_root, parent_size, name)?;
		}
		self.inode_table.update(&mut self.device, parent, None, Some(now()))?;
		Ok(())
	}

	/// Removes a directory entry naming a regular file. Rejects directories
	/// with `IsDir`. If the file is currently open, purge is deferred to its
	/// last close.
	pub fn unlink(&mut self, parent: InodeId, name: &str) -> Result<()> {
		let parent_rec = self.read_inode(parent)?;
		if !parent_rec.is_dir() {
			return Err(Error::NotDir);
		}
		let (parent_root, parent_size, geom) = (parent_rec.data_blk, parent_rec.size as u64, self.geom);

		let target_ptr = {
			let mut ctx = Ctx { device: &mut self.device, freelist: &mut self.freelist, pool: &mut self.pool };
			dir::lookup(&mut ctx, &geom, parent_root, parent_size, name)?
		}
		.ok_or(Error::NoEnt)?;
		let target_rec = self.inode_table.read(&self.device, target_ptr)?.ok_or(Error::FatalInternalError)?;
		if target_rec.is_dir() {
			return Err(Error::IsDir);
		}

		{
			let mut ctx = Ctx { device: &mut self.device, freelist: &mut self.freelist, pool: &mut self.pool };
			dir::remove(&mut ctx, &geom, parent_root, parent_size, name)?;
		}

		if let Some(live) = self.handles.live_mut(target_ptr) {
			live.deleted = true;
		} else {
			{
				let mut ctx = Ctx { device: &mut self.device, freelist: &mut self.freelist, pool: &mut self.pool };
				index::purge(&mut ctx, &geom, target_rec.data_blk)?;
			}
			self.inode_table.must_free(&mut self.device, target_ptr)?;
		}
		self.inode_table.update(&mut self.device, parent, None, Some(now()))?;
		Ok(())
	}

	/// Opens `inode_ptr` as a regular file. `flags` is a bitset of
	/// [`crate::handle::OPEN_SEEK_END`], [`crate::handle::OPEN_TRUNCATE`],
	/// [`OPEN_READ`], [`OPEN_WRITE`] (`CREATE`
	/// only matters to a caller that resolves names, since this takes an
	/// already-resolved inode; the core itself ignores it).
	pub fn open(&mut self, inode_ptr: InodeId, flags: u32) -> Result<u32> {
		let rec = self.read_inode(inode_ptr)?;
		if !rec.is_file() {
			return Err(Error::IsDir);
		}
		let root_blk = rec.data_blk;
		let cached_size = self.handles.live(inode_ptr).map(|l| l.size);
		let mut size = cached_size.unwrap_or(rec.size as u64);

		let truncate = flags & OPEN_TRUNCATE != 0;
		{
			let live = self.handles.acquire_live(inode_ptr, root_blk, size);
			if truncate && live.ref_count > 1 {
				self.handles.release_live_on_failed_open(inode_ptr);
				return Err(Error::Busy);
			}
		}

		let geom = self.geom;
		let cursor = {
			let mut ctx = Ctx { device: &mut self.device, freelist: &mut self.freelist, pool: &mut self.pool };
			match FileCursor::open(&mut ctx, root_blk) {
				Ok(c) => c,
				Err(e) => {
					drop(ctx);
					self.handles.release_live_on_failed_open(inode_ptr);
					return Err(e);
				}
			}
		};
		let mut cursor = cursor;

		if truncate {
			let result = {
				let mut ctx = Ctx { device: &mut self.device, freelist: &mut self.freelist, pool: &mut self.pool };
				index::truncate_to_zero(&mut ctx, &geom, root_blk)
			};
			if let Err(e) = result {
				self.handles.release_live_on_failed_open(inode_ptr);
				return Err(e);
			}
			size = 0;
			if let Some(live) = self.handles.live_mut(inode_ptr) {
				live.size = 0;
			}
			self.inode_table.update(&mut self.device, inode_ptr, Some(0), Some(now()))?;
		}

		if flags & OPEN_SEEK_END != 0 {
			cursor.seek(size);
		}

		Ok(self.handles.register_file(inode_ptr, cursor, flags))
	}

	/// Closes a file handle. On the last close of a deleted file, purges its
	/// blocks and frees its inode slot.
	pub fn close(&mut self, fd: u32) -> Result<()> {
		let handle = self.handles.take_file(fd)?;
		if let Some(closed) = self.handles.close_live(handle.live_inode) {
			if closed.deleted {
				{
					let mut ctx = Ctx { device: &mut self.device, freelist: &mut self.freelist, pool: &mut self.pool };
					index::purge(&mut ctx, &self.geom, closed.root_blk)?;
				}
				self.inode_table.must_free(&mut self.device, handle.live_inode)?;
			}
		}
		Ok(())
	}

	pub fn opendir(&mut self, inode_ptr: InodeId) -> Result<u32> {
		let rec = self.read_inode(inode_ptr)?;
		if !rec.is_dir() {
			return Err(Error::NotDir);
		}
		let root_blk = rec.data_blk;
		let cached_size = self.handles.live(inode_ptr).map(|l| l.size);
		let size = cached_size.unwrap_or(rec.size as u64);
		self.handles.acquire_live(inode_ptr, root_blk, size);
		let cursor = {
			let mut ctx = Ctx { device: &mut self.device, freelist: &mut self.freelist, pool: &mut self.pool };
			match FileCursor::open(&mut ctx, root_blk) {
				Ok(c) => c,
				Err(e) => {
					drop(ctx);
					self.handles.release_live_on_failed_open(inode_ptr);
					return Err(e);
				}
			}
		};
		Ok(self.handles.register_dir(inode_ptr, cursor))
	}

	pub fn closedir(&mut self, fd: u32) -> Result<()> {
		let handle = self.handles.take_dir(fd)?;
		self.handles.close_live(handle.live_inode);
		Ok(())
	}

	/// Reads the next live entry, or `Ok(None)` at end-of-directory.
	pub fn readdir(&mut self, fd: u32) -> Result<Option<Stat>> {
		let (live_inode, from) = {
			let h = self.handles.dir_mut(fd)?;
			(h.live_inode, h.read_cursor)
		};
		let (root_blk, size) = {
			let live = self.handles.live(live_inode).ok_or(Error::FatalInternalError)?;
			(live.root_blk, live.size)
		};
		let geom = self.geom;
		let next = {
			let mut ctx = Ctx { device: &mut self.device, freelist: &mut self.freelist, pool: &mut self.pool };
			dir::next_live_entry(&mut ctx, &geom, root_blk, size, from)?
		};
		match next {
			None => Ok(None),
			Some((entry, resume_at)) => {
				self.handles.dir_mut(fd)?.read_cursor = resume_at;
				let rec = self.inode_table.read(&self.device, entry.inode)?.ok_or(Error::FatalInternalError)?;
				let name = dir::decode_name(&entry.name);
				Ok(Some(Stat::from_inode(entry.inode, &rec, Some(name))))
			}
		}
	}

	/// Collects every remaining entry of an open directory handle, a
	/// convenience wrapper that loops `readdir` to exhaustion.
	pub fn read_dir_all(&mut self, fd: u32) -> Result<Vec<Stat>> {
		let mut out = Vec::new();
		while let Some(entry) = self.readdir(fd)? {
			out.push(entry);
		}
		Ok(out)
	}

	pub fn read(&mut self, fd: u32, dst: &mut [u8]) -> Result<(u64, bool)> {
		let (live_inode, flags) = {
			let h = self.handles.file(fd)?;
			(h.live_inode, h.flags)
		};
		if flags & OPEN_READ == 0 {
			return Err(Error::NotReadable);
		}
		let size = self.handles.live(live_inode).map(|l| l.size).ok_or(Error::FatalInternalError)?;
		let geom = self.geom;
		let mut ctx = Ctx { device: &mut self.device, freelist: &mut self.freelist, pool: &mut self.pool };
		let handle = self.handles.file_mut(fd)?;
		handle.cursor.read(&mut ctx, &geom, size, dst)
	}

	pub fn write(&mut self, fd: u32, src: &[u8]) -> Result<u64> {
		let (live_inode, flags) = {
			let h = self.handles.file(fd)?;
			(h.live_inode, h.flags)
		};
		if flags & OPEN_WRITE == 0 {
			return Err(Error::NotWritable);
		}
		let size = self.handles.live(live_inode).map(|l| l.size).ok_or(Error::FatalInternalError)?;
		let geom = self.geom;
		let (written, new_size) = {
			let mut ctx = Ctx { device: &mut self.device, freelist: &mut self.freelist, pool: &mut self.pool };
			let handle = self.handles.file_mut(fd)?;
			handle.cursor.write(&mut ctx, &geom, size, src)?
		};
		if written > 0 {
			if let Some(live) = self.handles.live_mut(live_inode) {
				live.size = new_size;
			}
			self.inode_table.update(&mut self.device, live_inode, Some(new_size as u32), Some(now()))?;
		}
		Ok(written)
	}

	pub fn seek(&mut self, fd: u32, offset: i64, whence: Whence) -> Result<u64> {
		let (live_inode, cur_abs) = {
			let h = self.handles.file(fd)?;
			(h.live_inode, h.cursor.abs_offset())
		};
		let size = self.handles.live(live_inode).map(|l| l.size).ok_or(Error::FatalInternalError)?;
		let base = match whence {
			Whence::Abs => 0i64,
			Whence::RelCurr => cur_abs as i64,
			Whence::RelEnd => size as i64,
		};
		let target = base.checked_add(offset).ok_or(Error::InvalidOffset)?;
		if target < 0 || target as u64 > size {
			return Err(Error::InvalidOffset);
		}
		self.handles.file_mut(fd)?.cursor.seek(target as u64);
		Ok(target as u64)
	}

	pub fn tell(&mut self, fd: u32) -> Result<u64> {
		Ok(self.handles.file(fd)?.cursor.abs_offset())
	}

	pub fn eof(&mut self, fd: u32) -> Result<bool> {
		let (live_inode, abs) = {
			let h = self.handles.file(fd)?;
			(h.live_inode, h.cursor.abs_offset())
		};
		let size = self.handles.live(live_inode).map(|l| l.size).ok_or(Error::FatalInternalError)?;
		Ok(abs >= size)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::device::MemBlockDevice;
	use crate::stat::Kind;

	fn formatted(block_size: u32, block_count: u32, inode_block_count: u16) -> Filesystem<MemBlockDevice> {
		let mut dev = MemBlockDevice::new(0, block_size, block_count);
		let config = Filesystem::format(&mut dev, inode_block_count).unwrap();
		Filesystem::init(dev, &config).unwrap()
	}

	#[test]
	fn root_starts_as_an_empty_directory() {
		let mut fs = formatted(128, 4096, 8);
		let root = fs.stat(ROOT_INODE).unwrap();
		assert_eq!(root.kind, Kind::Dir);
		let fd = fs.opendir(ROOT_INODE).unwrap();
		assert_eq!(fs.read_dir_all(fd).unwrap().len(), 0);
		fs.closedir(fd).unwrap();
	}

	#[test]
	fn reinit_with_mismatched_config_fails() {
		let mut dev = MemBlockDevice::new(0, 128, 4096);
		Filesystem::format(&mut dev, 8).unwrap();
		let bad_config = [0u8; CONFIG_LEN];
		assert_eq!(Filesystem::init(dev, &bad_config).unwrap_err(), Error::InvalidFSParams);
	}

	#[test]
	fn create_lookup_and_unlink_round_trip() {
		let mut fs = formatted(128, 4096, 8);
		let inode = fs.create(ROOT_INODE, "a.txt").unwrap();
		assert_eq!(fs.lookup(ROOT_INODE, "a.txt").unwrap(), inode);
		assert!(fs.exists(ROOT_INODE, "a.txt").unwrap());
		assert_eq!(fs.create(ROOT_INODE, "a.txt").unwrap_err(), Error::Exists);

		fs.unlink(ROOT_INODE, "a.txt").unwrap();
		assert!(!fs.exists(ROOT_INODE, "a.txt").unwrap());
		assert_eq!(fs.unlink(ROOT_INODE, "a.txt").unwrap_err(), Error::NoEnt);
	}

	#[test]
	fn mkdir_rmdir_rejects_nonempty_then_succeeds_once_empty() {
		let mut fs = formatted(128, 4096, 8);
		fs.mkdir(ROOT_INODE, "sub").unwrap();
		let sub = fs.lookup(ROOT_INODE, "sub").unwrap();
		fs.create(sub, "child").unwrap();

		assert_eq!(fs.rmdir(ROOT_INODE, "sub").unwrap_err(), Error::NotEmpty);
		fs.unlink(sub, "child").unwrap();
		fs.rmdir(ROOT_INODE, "sub").unwrap();
		assert_eq!(fs.lookup(ROOT_INODE, "sub").unwrap_err(), Error::NoEnt);
	}

	#[test]
	fn rmdir_on_a_file_fails_not_dir() {
		let mut fs = formatted(128, 4096, 8);
		fs.create(ROOT_INODE, "f").unwrap();
		assert_eq!(fs.rmdir(ROOT_INODE, "f").unwrap_err(), Error::NotDir);
	}

	#[test]
	fn write_then_read_back_small_file() {
		let mut fs = formatted(128, 4096, 8);
		let inode = fs.create(ROOT_INODE, "f").unwrap();
		let fd = fs.open(inode, OPEN_WRITE).unwrap();
		let data = b"hello, nanofs";
		assert_eq!(fs.write(fd, data).unwrap(), data.len() as u64);
		fs.close(fd).unwrap();

		let fd = fs.open(inode, OPEN_READ).unwrap();
		let mut buf = [0u8; 32];
		let (n, eof) = fs.read(fd, &mut buf).unwrap();
		assert_eq!(&buf[..n as usize], data);
		assert!(eof);
		fs.close(fd).unwrap();

		let stat = fs.stat(inode).unwrap();
		assert_eq!(stat.size as usize, data.len());
	}

	#[test]
	fn truncate_on_open_rejects_a_second_open_handle() {
		let mut fs = formatted(128, 4096, 8);
		let inode = fs.create(ROOT_INODE, "f").unwrap();
		let fd1 = fs.open(inode, OPEN_WRITE).unwrap();
		assert_eq!(fs.open(inode, OPEN_WRITE | OPEN_TRUNCATE).unwrap_err(), Error::Busy);
		fs.close(fd1).unwrap();
	}

	#[test]
	fn unlink_while_open_defers_purge_to_last_close() {
		let mut fs = formatted(128, 4096, 8);
		let inode = fs.create(ROOT_INODE, "f").unwrap();
		let fd = fs.open(inode, OPEN_WRITE).unwrap();
		fs.write(fd, b"still here").unwrap();
		let free_before = fs.stat_fs().free_blocks;

		fs.unlink(ROOT_INODE, "f").unwrap();
		assert!(!fs.exists(ROOT_INODE, "f").unwrap());
		// Blocks aren't reclaimed yet: the handle is still open.
		assert_eq!(fs.stat_fs().free_blocks, free_before);

		fs.close(fd).unwrap();
		assert!(fs.stat_fs().free_blocks > free_before);
	}

	#[test]
	fn seek_rejects_offsets_past_the_end() {
		let mut fs = formatted(128, 4096, 8);
		let inode = fs.create(ROOT_INODE, "f").unwrap();
		let fd = fs.open(inode, OPEN_WRITE | OPEN_READ).unwrap();
		fs.write(fd, b"abcde").unwrap();
		assert_eq!(fs.seek(fd, 2, Whence::Abs).unwrap(), 2);
		assert_eq!(fs.tell(fd).unwrap(), 2);
		assert_eq!(fs.seek(fd, 100, Whence::Abs).unwrap_err(), Error::InvalidOffset);
		assert_eq!(fs.seek(fd, -1, Whence::RelCurr).unwrap(), 1);
		fs.close(fd).unwrap();
	}
}
