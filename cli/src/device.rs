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

//! A [`BlockDevice`] backed by a plain file, addressed with positional I/O so
//! reads don't need `&mut File`.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::Path;

use nanofs_core::{BlockDevice, Error, Result};

pub struct FileBlockDevice {
	file: File,
	block_size: u32,
	block_count: u32,
}

impl FileBlockDevice {
	/// Opens an existing image file, sizing `block_count` from its length.
	pub fn open(path: impl AsRef<Path>, block_size: u32) -> io::Result<Self> {
		let file = OpenOptions::new().read(true).write(true).open(path)?;
		let len = file.metadata()?.len();
		let block_count = (len / block_size as u64) as u32;
		Ok(Self { file, block_size, block_count })
	}

	/// Creates a fresh, zeroed image file of `total_blocks` blocks.
	pub fn create(path: impl AsRef<Path>, block_size: u32, total_blocks: u32) -> io::Result<Self> {
		let file = OpenOptions::new().read(true).write(true).create(true).truncate(true).open(path)?;
		file.set_len(block_size as u64 * total_blocks as u64)?;
		Ok(Self { file, block_size, block_count: total_blocks })
	}
}

impl BlockDevice for FileBlockDevice {
	fn block_size(&self) -> u32 {
		self.block_size
	}

	fn block_count(&self) -> u32 {
		self.block_count
	}

	fn read_block(&self, blk: u32, dst: &mut [u8]) -> Result<()> {
		if blk >= self.block_count {
			return Err(Error::FatalInternalError);
		}
		let offset = blk as u64 * self.block_size as u64;
		self.file.read_exact_at(dst, offset).map_err(|_| Error::FatalInternalError)
	}

	fn write_block(&mut self, blk: u32, src: &[u8]) -> Result<()> {
		if blk >= self.block_count {
			return Err(Error::FatalInternalError);
		}
		let offset = blk as u64 * self.block_size as u64;
		self.file.write_all_at(src, offset).map_err(|_| Error::FatalInternalError)
	}
}
