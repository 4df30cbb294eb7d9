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

//! The stat record callers observe and its wire encoding for host bridging.

use crate::dir::NAME_LEN;
use crate::inode::{InodeId, InodeRecord};

/// The kind of filesystem object an inode names.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
	File = 1,
	Dir = 2,
}

/// A snapshot of an inode's metadata, plus its name when it came from
/// [`crate::fs::Filesystem::readdir`].
#[derive(Clone, Debug)]
pub struct Stat {
	/// Present only when produced by `readdir`; `stat()` never populates it.
	pub name: Option<Vec<u8>>,
	pub inode: InodeId,
	pub kind: Kind,
	pub executable: bool,
	pub mtime: u32,
	pub size: u32,
}

impl Stat {
	pub(crate) fn from_inode(inode: InodeId, rec: &InodeRecord, name: Option<Vec<u8>>) -> Self {
		Self {
			name,
			inode,
			kind: if rec.is_dir() { Kind::Dir } else { Kind::File },
			executable: rec.is_executable(),
			mtime: rec.mtime,
			size: rec.size,
		}
	}

	/// The 29-byte wire form used by the host bridge: 14-byte name (zero
	/// padded, no name yields an all-zero field) + a trailing null, the
	/// big-endian inode pointer, a type byte, an executable byte, two
	/// reserved zero bytes, and big-endian `mtime`/`size`.
	pub fn to_wire(&self) -> [u8; 29] {
		let mut buf = [0u8; 29];
		if let Some(name) = &self.name {
			let len = name.len().min(NAME_LEN);
			buf[..len].copy_from_slice(&name[..len]);
		}
		// buf[14] is the trailing null terminator; already zero.
		buf[15..17].copy_from_slice(&self.inode.to_be_bytes());
		buf[17] = self.kind as u8;
		buf[18] = self.executable as u8;
		// buf[19..21] reserved, zero.
		buf[21..25].copy_from_slice(&self.mtime.to_be_bytes());
		buf[25..29].copy_from_slice(&self.size.to_be_bytes());
		buf
	}
}
