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

//! The open-handle layer: per-inode "live" state shared by every handle of
//! that inode, and the two handle maps drawing from one shared sequence.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::index::FileCursor;
use crate::inode::InodeId;
use crate::seq::SequenceGenerator;

/// Bit flags accepted by `open`.
pub const OPEN_CREATE: u32 = 1;
pub const OPEN_SEEK_END: u32 = 2;
pub const OPEN_TRUNCATE: u32 = 4;
pub const OPEN_READ: u32 = 8;
pub const OPEN_WRITE: u32 = 16;

/// The per-inode state shared by every handle currently open on it.
pub struct LiveFile {
	pub inode_ptr: InodeId,
	/// Root index-block pointer, fixed for the file's lifetime.
	pub root_blk: u16,
	/// Cached, authoritative logical size while any handle is open.
	pub size: u64,
	/// Set by `unlink` when a handle was still open; purge is deferred to
	/// the last close.
	pub deleted: bool,
	pub ref_count: u32,
}

/// One open file descriptor.
pub struct FileHandle {
	pub live_inode: InodeId,
	pub cursor: FileCursor,
	pub flags: u32,
}

/// One open directory descriptor: same shape as a file handle, but kept in
/// a separate map so file operations can never be aimed at a directory
/// handle number and vice versa.
pub struct DirHandle {
	pub live_inode: InodeId,
	pub cursor: FileCursor,
	/// Byte offset `readdir` resumes scanning from.
	pub read_cursor: u64,
}

/// The outcome of closing the last handle on an inode.
pub struct ClosedLive {
	pub root_blk: u16,
	pub deleted: bool,
}

/// Owns the live-file table and the file/directory handle maps, all drawing
/// handle numbers from one [`SequenceGenerator`].
#[derive(Default)]
pub struct HandleTable {
	seq: SequenceGenerator,
	live: HashMap<InodeId, LiveFile>,
	files: HashMap<u32, FileHandle>,
	dirs: HashMap<u32, DirHandle>,
}

impl HandleTable {
	pub fn new() -> Self {
		Self::default()
	}

	fn fresh_handle(&mut self) -> u32 {
		loop {
			let candidate = self.seq.next();
			if !self.files.contains_key(&candidate) && !self.dirs.contains_key(&candidate) {
				return candidate;
			}
		}
	}

	/// The live-state entry for `inode_ptr`, if any handle currently holds
	/// it open.
	pub fn live(&self, inode_ptr: InodeId) -> Option<&LiveFile> {
		self.live.get(&inode_ptr)
	}

	pub fn live_mut(&mut self, inode_ptr: InodeId) -> Option<&mut LiveFile> {
		self.live.get_mut(&inode_ptr)
	}

	/// Opens (creating if necessary) the live-state entry for `inode_ptr`
	/// and increments its refcount. `root_blk`/`size` seed a freshly-created
	/// entry; an existing entry's cached values win.
	pub fn acquire_live(&mut self, inode_ptr: InodeId, root_blk: u16, size: u64) -> &mut LiveFile {
		let entry = self.live.entry(inode_ptr).or_insert_with(|| LiveFile {
			inode_ptr,
			root_blk,
			size,
			deleted: false,
			ref_count: 0,
		});
		entry.ref_count += 1;
		entry
	}

	/// Rolls back a failed open: undoes the refcount bump from
	/// [`Self::acquire_live`], dropping the entry entirely if it was this
	/// call that created it.
	pub fn release_live_on_failed_open(&mut self, inode_ptr: InodeId) {
		if let Some(live) = self.live.get_mut(&inode_ptr) {
			live.ref_count -= 1;
			if live.ref_count == 0 {
				self.live.remove(&inode_ptr);
			}
		}
	}

	/// Decrements the refcount of `inode_ptr`'s live state; on the last
	/// reference, removes and returns it so the caller can purge if it was
	/// marked deleted.
	pub fn close_live(&mut self, inode_ptr: InodeId) -> Option<ClosedLive> {
		let live = self.live.get_mut(&inode_ptr)?;
		live.ref_count -= 1;
		if live.ref_count > 0 {
			return None;
		}
		let live = self.live.remove(&inode_ptr).expect("just looked up");
		Some(ClosedLive { root_blk: live.root_blk, deleted: live.deleted })
	}

	pub fn register_file(&mut self, live_inode: InodeId, cursor: FileCursor, flags: u32) -> u32 {
		let fd = self.fresh_handle();
		self.files.insert(fd, FileHandle { live_inode, cursor, flags });
		fd
	}

	pub fn register_dir(&mut self, live_inode: InodeId, cursor: FileCursor) -> u32 {
		let fd = self.fresh_handle();
		self.dirs.insert(fd, DirHandle { live_inode, cursor, read_cursor: 0 });
		fd
	}

	pub fn file(&self, fd: u32) -> Result<&FileHandle> {
		self.files.get(&fd).ok_or(Error::InvalidFileHandle)
	}

	pub fn file_mut(&mut self, fd: u32) -> Result<&mut FileHandle> {
		self.files.get_mut(&fd).ok_or(Error::InvalidFileHandle)
	}

	pub fn dir_mut(&mut self, fd: u32) -> Result<&mut DirHandle> {
		self.dirs.get_mut(&fd).ok_or(Error::InvalidFileHandle)
	}

	pub fn take_file(&mut self, fd: u32) -> Result<FileHandle> {
		self.files.remove(&fd).ok_or(Error::InvalidFileHandle)
	}

	pub fn take_dir(&mut self, fd: u32) -> Result<DirHandle> {
		self.dirs.remove(&fd).ok_or(Error::InvalidFileHandle)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn acquiring_twice_then_closing_defers_purge_until_last() {
		let mut table = HandleTable::new();
		table.acquire_live(0, 10, 0);
		table.acquire_live(0, 10, 0);
		table.live_mut(0).unwrap().deleted = true;
		assert!(table.close_live(0).is_none());
		let closed = table.close_live(0).unwrap();
		assert!(closed.deleted);
		assert_eq!(closed.root_blk, 10);
	}

	#[test]
	fn failed_open_rollback_drops_fresh_entry() {
		let mut table = HandleTable::new();
		table.acquire_live(3, 1, 0);
		table.release_live_on_failed_open(3);
		assert!(table.live(3).is_none());
	}
}
