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

//! The block freelist: a persistent bitmap mirrored by an in-memory stack for
//! O(1) allocation.
//!
//! Bit `i` set means block `i` is free. The bitmap lives in a contiguous
//! block range immediately following the inode table; every mutation writes
//! back only the bitmap block(s) it touched, there is no deferred sync.

use crate::device::BlockDevice;
use crate::error::{Error, Result};

fn bitmap_bytes(block_count: u32) -> u32 {
	block_count.div_ceil(8)
}

fn get_bit(bits: &[u8], i: u32) -> bool {
	(bits[(i / 8) as usize] >> (i % 8)) & 1 == 1
}

fn set_bit(bits: &mut [u8], i: u32, val: bool) {
	let byte = &mut bits[(i / 8) as usize];
	let mask = 1u8 << (i % 8);
	if val {
		*byte |= mask;
	} else {
		*byte &= !mask;
	}
}

/// The block freelist.
pub struct Freelist {
	/// First block of the bitmap region on disk.
	start_blk: u32,
	/// Number of blocks occupied by the bitmap region.
	bitmap_len: u32,
	/// Total number of blocks on the device the bitmap covers.
	block_count: u32,
	block_size: u32,
	/// In-memory mirror of the on-disk bitmap.
	bits: Vec<u8>,
	/// Free block numbers, lowest on top.
	free_stack: Vec<u32>,
}

impl Freelist {
	/// Formats a fresh bitmap covering every block of `device`, marking
	/// `[0, start_blk + bitmap_len)` occupied (the inode table, this bitmap,
	/// and nothing else yet) and the remainder free.
	///
	/// Returns the freshly-created freelist and the first block past the
	/// bitmap, i.e. the start of the data/index pool.
	pub fn create<D: BlockDevice>(device: &mut D, start_blk: u32) -> Result<(Self, u32)> {
		let block_size = device.block_size();
		let block_count = device.block_count();
		let byte_len = bitmap_bytes(block_count);
		let bitmap_len = (byte_len as u64).div_ceil(block_size as u64) as u32;
		let first_free = start_blk + bitmap_len;
		let mut bits = vec![0xffu8; byte_len as usize];
		for blk in 0..first_free.min(block_count) {
			set_bit(&mut bits, blk, false);
		}
		// Padding bits past the real block count must never be handed out.
		for blk in block_count..byte_len * 8 {
			set_bit(&mut bits, blk, false);
		}
		let mut fl = Self {
			start_blk,
			bitmap_len,
			block_count,
			block_size,
			bits,
			free_stack: Vec::new(),
		};
		fl.rebuild_stack();
		fl.write_all(device)?;
		Ok((fl, first_free))
	}

	/// Loads an existing bitmap starting at `start_blk` and rebuilds the
	/// in-memory free stack from it.
	pub fn init<D: BlockDevice>(device: &D, start_blk: u32) -> Result<Self> {
		let block_size = device.block_size();
		let block_count = device.block_count();
		let byte_len = bitmap_bytes(block_count);
		let bitmap_len = (byte_len as u64).div_ceil(block_size as u64) as u32;
		let mut bits = vec![0u8; byte_len as usize];
		let mut buf = vec![0u8; block_size as usize];
		for i in 0..bitmap_len {
			device.read_block(start_blk + i, &mut buf)?;
			let off = i as usize * block_size as usize;
			let end = (off + block_size as usize).min(bits.len());
			if off < bits.len() {
				bits[off..end].copy_from_slice(&buf[..end - off]);
			}
		}
		let mut fl = Self {
			start_blk,
			bitmap_len,
			block_count,
			block_size,
			bits,
			free_stack: Vec::new(),
		};
		fl.rebuild_stack();
		Ok(fl)
	}

	/// Scans the bitmap from the highest block to the lowest, pushing free
	/// blocks onto the stack, so the stack pops the lowest free block first.
	fn rebuild_stack(&mut self) {
		self.free_stack.clear();
		for blk in (0..self.block_count).rev() {
			if get_bit(&self.bits, blk) {
				self.free_stack.push(blk);
			}
		}
	}

	/// Writes back the bitmap block(s) containing bit `blk`.
	fn write_back<D: BlockDevice>(&self, device: &mut D, blk: u32) -> Result<()> {
		let byte_idx = (blk / 8) as u32;
		let blk_idx = byte_idx / self.block_size;
		let off = (blk_idx * self.block_size) as usize;
		let end = (off + self.block_size as usize).min(self.bits.len());
		let mut buf = vec![0u8; self.block_size as usize];
		buf[..end - off].copy_from_slice(&self.bits[off..end]);
		device.write_block(self.start_blk + blk_idx, &buf)
	}

	fn write_all<D: BlockDevice>(&self, device: &mut D) -> Result<()> {
		for i in 0..self.bitmap_len {
			let off = i as usize * self.block_size as usize;
			let end = (off + self.block_size as usize).min(self.bits.len());
			let mut buf = vec![0u8; self.block_size as usize];
			buf[..end - off].copy_from_slice(&self.bits[off..end]);
			device.write_block(self.start_blk + i, &buf)?;
		}
		Ok(())
	}

	/// Allocates the smallest free block number.
	pub fn alloc<D: BlockDevice>(&mut self, device: &mut D) -> Result<u32> {
		let blk = self.free_stack.pop().ok_or(Error::NoSpace)?;
		set_bit(&mut self.bits, blk, false);
		self.write_back(device, blk)?;
		Ok(blk)
	}

	/// Frees `blk`, making it available for a future [`Self::alloc`].
	///
	/// Freeing an already-free block is a programming error.
	pub fn free<D: BlockDevice>(&mut self, device: &mut D, blk: u32) -> Result<()> {
		debug_assert!(
			!get_bit(&self.bits, blk),
			"double free of block {blk}"
		);
		set_bit(&mut self.bits, blk, true);
		self.write_back(device, blk)?;
		self.free_stack.push(blk);
		Ok(())
	}

	/// The number of blocks currently available for allocation.
	pub fn free_block_count(&self) -> u32 {
		self.free_stack.len() as u32
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::device::MemBlockDevice;

	#[test]
	fn alloc_hands_out_lowest_first() {
		let mut dev = MemBlockDevice::new(0, 64, 32);
		let (mut fl, first_free) = Freelist::create(&mut dev, 1).unwrap();
		assert!(first_free > 1);
		let a = fl.alloc(&mut dev).unwrap();
		let b = fl.alloc(&mut dev).unwrap();
		assert_eq!(a, first_free);
		assert_eq!(b, first_free + 1);
	}

	#[test]
	fn free_then_alloc_reuses_block() {
		let mut dev = MemBlockDevice::new(0, 64, 32);
		let (mut fl, first_free) = Freelist::create(&mut dev, 1).unwrap();
		let before = fl.free_block_count();
		let a = fl.alloc(&mut dev).unwrap();
		fl.free(&mut dev, a).unwrap();
		assert_eq!(fl.free_block_count(), before);
		let b = fl.alloc(&mut dev).unwrap();
		assert_eq!(b, first_free);
	}

	#[test]
	fn init_round_trips_through_create() {
		let mut dev = MemBlockDevice::new(0, 64, 32);
		let (mut fl, _) = Freelist::create(&mut dev, 1).unwrap();
		let a = fl.alloc(&mut dev).unwrap();
		let reloaded = Freelist::init(&dev, 1).unwrap();
		assert_eq!(reloaded.free_block_count(), fl.free_block_count());
		assert!(!get_bit(&reloaded.bits, a));
	}
}
