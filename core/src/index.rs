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

//! The file-index engine: two-level (direct + single-indirect) block
//! addressing, byte-cursor advancement and block-by-block read/write.
//!
//! Every file has exactly one index block. Its first half is an array of
//! direct data-block pointers; its second half is an array of indirect-block
//! pointers, each addressing a block that is itself entirely filled with data
//! block pointers. A pointer value of `0` means "not yet allocated".

use crate::device::BlockDevice;
use crate::error::{Error, Result};
use crate::freelist::Freelist;
use crate::pool::BlockPool;

/// Geometry derived from the block size alone.
#[derive(Clone, Copy)]
pub struct Geometry {
	pub block_size: u32,
}

impl Geometry {
	pub fn new(block_size: u32) -> Self {
		Self { block_size }
	}

	/// Number of direct pointer slots (first half of the index block).
	pub fn direct_slots(&self) -> u32 {
		self.block_size / 4
	}

	/// Number of indirect pointer slots (second half of the index block).
	pub fn indirect_slots(&self) -> u32 {
		self.block_size / 4
	}

	/// Number of data-block pointers a fully-populated indirect block holds.
	pub fn entries_per_indirect(&self) -> u32 {
		self.block_size / 2
	}

	/// The first absolute offset that requires indirect addressing.
	pub fn threshold(&self) -> u64 {
		self.direct_slots() as u64 * self.block_size as u64
	}

	/// The largest byte offset one past the end of a file this geometry can
	/// address.
	pub fn max_file_size(&self) -> u64 {
		self.threshold()
			+ self.indirect_slots() as u64
				* self.entries_per_indirect() as u64
				* self.block_size as u64
	}
}

/// A block/offset pair locating a position inside one block.
#[derive(Clone, Copy, Default, Debug)]
pub struct Position {
	pub blk: u16,
	pub offset: u32,
}

/// Borrowed access to everything an index operation needs to allocate or
/// free blocks, grouped so functions don't take three separate parameters.
pub struct Ctx<'a, D> {
	pub device: &'a mut D,
	pub freelist: &'a mut Freelist,
	pub pool: &'a mut BlockPool,
}

fn alloc_zeroed<D: BlockDevice>(ctx: &mut Ctx<D>) -> Result<u16> {
	let blk = ctx.freelist.alloc(ctx.device)?;
	ctx.device.zero_block(blk)?;
	debug_assert!(blk <= u16::MAX as u32, "block pointers are 16-bit");
	Ok(blk as u16)
}

fn read_ptr<D: BlockDevice>(ctx: &mut Ctx<D>, blk: u16, offset: u32) -> Result<u16> {
	let mut buf = ctx.pool.take();
	ctx.device.read_block(blk as u32, &mut buf)?;
	let val = u16::from_be_bytes([buf[offset as usize], buf[offset as usize + 1]]);
	ctx.pool.give(buf);
	Ok(val)
}

fn write_ptr<D: BlockDevice>(ctx: &mut Ctx<D>, blk: u16, offset: u32, val: u16) -> Result<()> {
	let mut buf = ctx.pool.take();
	ctx.device.read_block(blk as u32, &mut buf)?;
	buf[offset as usize..offset as usize + 2].copy_from_slice(&val.to_be_bytes());
	ctx.device.write_block(blk as u32, &buf)?;
	ctx.pool.give(buf);
	Ok(())
}

/// The per-handle tri-level cursor: `root` locates a slot in the index
/// block, `mid` locates a slot in the current indirect block (only
/// meaningful once `deep`), `data` locates the byte within the current data
/// block.
pub struct FileCursor {
	root_blk: u16,
	abs_offset: u64,
	root: Position,
	mid: Position,
	data: Position,
	deep: bool,
	refs_invalid: bool,
}

impl FileCursor {
	/// Opens a cursor at offset `0` on the file whose index block is
	/// `root_blk`.
	pub fn open<D: BlockDevice>(ctx: &mut Ctx<D>, root_blk: u16) -> Result<Self> {
		let data_blk = read_ptr(ctx, root_blk, 0)?;
		Ok(Self {
			root_blk,
			abs_offset: 0,
			root: Position { blk: root_blk, offset: 0 },
			mid: Position::default(),
			data: Position { blk: data_blk, offset: 0 },
			deep: false,
			refs_invalid: false,
		})
	}

	pub fn abs_offset(&self) -> u64 {
		self.abs_offset
	}

	/// Stores a new absolute offset without walking the index; the next read
	/// or write recomputes `root`/`mid`/`data` via [`Self::update_refs`].
	///
	/// The caller must have already validated `offset` against the file
	/// size.
	pub fn seek(&mut self, offset: u64) {
		self.abs_offset = offset;
		self.refs_invalid = true;
	}

	/// Recomputes `root`/`mid`/`data` purely from `abs_offset` arithmetic.
	fn update_refs<D: BlockDevice>(&mut self, ctx: &mut Ctx<D>, geom: &Geometry, size: u64) -> Result<()> {
		let b = geom.block_size as u64;
		let t = geom.threshold();
		let mut off = self.abs_offset;
		let mut prime_next_block = false;
		if off == size && size > 0 && size % b == 0 {
			off -= b;
			prime_next_block = true;
		}
		self.root.blk = self.root_blk;
		if off < t {
			self.deep = false;
			self.root.offset = ((off / b) * 2) as u32;
			let ptr = read_ptr(ctx, self.root.blk, self.root.offset)?;
			self.data.blk = ptr;
		} else {
			self.deep = true;
			let per_indirect = geom.entries_per_indirect() as u64 * b;
			let rel = off - t;
			let k = rel / per_indirect;
			self.root.offset = (b / 2) as u32 + (k * 2) as u32;
			let ind = read_ptr(ctx, self.root.blk, self.root.offset)?;
			self.mid.blk = ind;
			self.mid.offset = (((rel % per_indirect) / b) * 2) as u32;
			let data_ptr = read_ptr(ctx, ind, self.mid.offset)?;
			self.data.blk = data_ptr;
		}
		self.data.offset = if prime_next_block { b as u32 } else { (off % b) as u32 };
		self.refs_invalid = false;
		Ok(())
	}

	/// Moves onto the next data block, allocating index structure as needed.
	fn advance<D: BlockDevice>(&mut self, ctx: &mut Ctx<D>, geom: &Geometry) -> Result<()> {
		let b = geom.block_size;
		if !self.deep && self.root.offset + 2 < b / 2 {
			self.root.offset += 2;
			let mut ptr = read_ptr(ctx, self.root.blk, self.root.offset)?;
			if ptr == 0 {
				ptr = alloc_zeroed(ctx)?;
				write_ptr(ctx, self.root.blk, self.root.offset, ptr)?;
			}
			self.data = Position { blk: ptr, offset: 0 };
		} else if !self.deep {
			self.root.offset = b / 2;
			let mut ind = read_ptr(ctx, self.root.blk, self.root.offset)?;
			if ind == 0 {
				ind = alloc_zeroed(ctx)?;
				write_ptr(ctx, self.root.blk, self.root.offset, ind)?;
			}
			self.mid = Position { blk: ind, offset: 0 };
			let mut data = read_ptr(ctx, ind, 0)?;
			if data == 0 {
				data = alloc_zeroed(ctx)?;
				write_ptr(ctx, ind, 0, data)?;
			}
			self.data = Position { blk: data, offset: 0 };
			self.deep = true;
		} else if self.mid.offset + 2 < b {
			self.mid.offset += 2;
			let mut data = read_ptr(ctx, self.mid.blk, self.mid.offset)?;
			if data == 0 {
				data = alloc_zeroed(ctx)?;
				write_ptr(ctx, self.mid.blk, self.mid.offset, data)?;
			}
			self.data = Position { blk: data, offset: 0 };
		} else if self.root.offset + 2 < b {
			self.root.offset += 2;
			let ind = read_ptr(ctx, self.root.blk, self.root.offset)?;
			if ind == 0 {
				let new_ind = alloc_zeroed(ctx)?;
				write_ptr(ctx, self.root.blk, self.root.offset, new_ind)?;
				let data = alloc_zeroed(ctx)?;
				write_ptr(ctx, new_ind, 0, data)?;
				self.mid = Position { blk: new_ind, offset: 0 };
				self.data = Position { blk: data, offset: 0 };
			} else {
				self.mid = Position { blk: ind, offset: 0 };
				let mut data = read_ptr(ctx, ind, 0)?;
				if data == 0 {
					data = alloc_zeroed(ctx)?;
					write_ptr(ctx, ind, 0, data)?;
				}
				self.data = Position { blk: data, offset: 0 };
			}
		} else {
			return Err(Error::NoSpace);
		}
		Ok(())
	}

	/// Reads up to `dst.len()` bytes starting at the cursor, clamped to the
	/// file's logical `size`. Returns `(bytes_read, eof)`.
	pub fn read<D: BlockDevice>(
		&mut self,
		ctx: &mut Ctx<D>,
		geom: &Geometry,
		size: u64,
		dst: &mut [u8],
	) -> Result<(u64, bool)> {
		let want = dst.len() as u64;
		let avail = size.saturating_sub(self.abs_offset);
		let to_read = want.min(avail);
		if to_read == 0 {
			return Ok((0, want > 0));
		}
		if self.refs_invalid {
			self.update_refs(ctx, geom, size)?;
		}
		let b = geom.block_size as u64;
		let mut done = 0u64;
		while done < to_read {
			if self.data.offset as u64 == b {
				self.advance(ctx, geom)?;
			}
			let mut buf = ctx.pool.take();
			ctx.device.read_block(self.data.blk as u32, &mut buf)?;
			let avail_in_block = b - self.data.offset as u64;
			let n = (to_read - done).min(avail_in_block);
			let start = self.data.offset as usize;
			dst[done as usize..(done + n) as usize].copy_from_slice(&buf[start..start + n as usize]);
			ctx.pool.give(buf);
			self.data.offset += n as u32;
			self.abs_offset += n;
			done += n;
		}
		Ok((done, done < want))
	}

	/// Writes `src` at the cursor, allocating blocks as needed. Returns
	/// `(bytes_written, new_logical_size)`.
	///
	/// A write that runs out of space partway through is a short write, not
	/// an error: whatever was already committed to disk before `NoSpace` hit
	/// is reported back so the caller can persist it. `NoSpace` itself is
	/// only returned when nothing could be written at all.
	pub fn write<D: BlockDevice>(
		&mut self,
		ctx: &mut Ctx<D>,
		geom: &Geometry,
		size: u64,
		src: &[u8],
	) -> Result<(u64, u64)> {
		if self.refs_invalid {
			self.update_refs(ctx, geom, size)?;
		}
		let b = geom.block_size as u64;
		let want = src.len() as u64;
		let mut done = 0u64;
		while done < want {
			if self.data.offset as u64 == b {
				if let Err(e) = self.advance(ctx, geom) {
					if done > 0 {
						return Ok((done, size.max(self.abs_offset)));
					}
					return Err(e);
				}
			}
			let mut buf = ctx.pool.take();
			ctx.device.read_block(self.data.blk as u32, &mut buf)?;
			let avail_in_block = b - self.data.offset as u64;
			let n = (want - done).min(avail_in_block);
			let start = self.data.offset as usize;
			buf[start..start + n as usize].copy_from_slice(&src[done as usize..(done + n) as usize]);
			ctx.device.write_block(self.data.blk as u32, &buf)?;
			ctx.pool.give(buf);
			self.data.offset += n as u32;
			self.abs_offset += n;
			done += n;
		}
		Ok((done, size.max(self.abs_offset)))
	}
}

/// Frees every data block an indirect block references, then the indirect
/// block itself.
fn free_indirect_block<D: BlockDevice>(ctx: &mut Ctx<D>, ind_blk: u16) -> Result<()> {
	let mut buf = ctx.pool.take();
	ctx.device.read_block(ind_blk as u32, &mut buf)?;
	for chunk in buf.chunks_exact(2) {
		let ptr = u16::from_be_bytes([chunk[0], chunk[1]]);
		if ptr != 0 {
			ctx.freelist.free(ctx.device, ptr as u32)?;
		}
	}
	ctx.pool.give(buf);
	ctx.freelist.free(ctx.device, ind_blk as u32)
}

/// Truncates a file to zero length (used by the `TRUNCATE` open flag):
/// every data block except the one at direct slot `0` is freed, along with
/// every indirect block and the data it references; the index block itself
/// survives, zeroed past its first pointer.
pub fn truncate_to_zero<D: BlockDevice>(ctx: &mut Ctx<D>, geom: &Geometry, root_blk: u16) -> Result<()> {
	let b = geom.block_size as usize;
	let mut idx_buf = ctx.pool.take();
	ctx.device.read_block(root_blk as u32, &mut idx_buf)?;
	let first_data = u16::from_be_bytes([idx_buf[0], idx_buf[1]]);

	let direct_slots = geom.direct_slots();
	for i in 1..direct_slots {
		let off = (i * 2) as usize;
		let ptr = u16::from_be_bytes([idx_buf[off], idx_buf[off + 1]]);
		if ptr != 0 {
			ctx.freelist.free(ctx.device, ptr as u32)?;
		}
	}
	let half = b / 2;
	let indirect_slots = geom.indirect_slots();
	for i in 0..indirect_slots {
		let off = half + (i * 2) as usize;
		let ind = u16::from_be_bytes([idx_buf[off], idx_buf[off + 1]]);
		if ind != 0 {
			free_indirect_block(ctx, ind)?;
		}
	}

	idx_buf[2..].fill(0);
	ctx.device.write_block(root_blk as u32, &idx_buf)?;
	ctx.pool.give(idx_buf);
	ctx.device.zero_block(first_data as u32)
}

/// Frees every block belonging to a file: its data and indirect blocks, and
/// finally the index block itself (used on delete).
pub fn purge<D: BlockDevice>(ctx: &mut Ctx<D>, geom: &Geometry, root_blk: u16) -> Result<()> {
	let b = geom.block_size as usize;
	let mut idx_buf = ctx.pool.take();
	ctx.device.read_block(root_blk as u32, &mut idx_buf)?;

	let direct_slots = geom.direct_slots();
	for i in 0..direct_slots {
		let off = (i * 2) as usize;
		let ptr = u16::from_be_bytes([idx_buf[off], idx_buf[off + 1]]);
		if ptr != 0 {
			ctx.freelist.free(ctx.device, ptr as u32)?;
		}
	}
	let half = b / 2;
	let indirect_slots = geom.indirect_slots();
	for i in 0..indirect_slots {
		let off = half + (i * 2) as usize;
		let ind = u16::from_be_bytes([idx_buf[off], idx_buf[off + 1]]);
		if ind != 0 {
			free_indirect_block(ctx, ind)?;
		}
	}
	ctx.pool.give(idx_buf);
	ctx.freelist.free(ctx.device, root_blk as u32)
}

/// Allocates a fresh index block with its first direct slot already
/// pointing at a freshly-allocated, zeroed data block, satisfying the
/// invariant that every file always has at least one index block and one
/// data block.
pub fn alloc_new_file<D: BlockDevice>(ctx: &mut Ctx<D>, _geom: &Geometry) -> Result<u16> {
	let root_blk = alloc_zeroed(ctx)?;
	let data_blk = alloc_zeroed(ctx)?;
	write_ptr(ctx, root_blk, 0, data_blk)?;
	Ok(root_blk)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::device::MemBlockDevice;

	fn setup(block_size: u32, blocks: u32) -> (MemBlockDevice, Freelist, BlockPool, u32) {
		let mut dev = MemBlockDevice::new(0, block_size, blocks);
		let (fl, first_free) = Freelist::create(&mut dev, 0).unwrap();
		let pool = BlockPool::new(block_size);
		(dev, fl, pool, first_free)
	}

	#[test]
	fn write_then_read_small() {
		let geom = Geometry::new(128);
		let (mut dev, mut fl, mut pool, _) = setup(128, 4096);
		let mut ctx = Ctx { device: &mut dev, freelist: &mut fl, pool: &mut pool };
		let root_blk = alloc_new_file(&mut ctx, &geom).unwrap();
		let mut cursor = FileCursor::open(&mut ctx, root_blk).unwrap();
		let data = b"Hello, World!";
		let (written, new_size) = cursor.write(&mut ctx, &geom, 0, data).unwrap();
		assert_eq!(written, data.len() as u64);
		assert_eq!(new_size, data.len() as u64);
		cursor.seek(0);
		let mut buf = vec![0u8; data.len()];
		let (read, eof) = cursor.read(&mut ctx, &geom, new_size, &mut buf).unwrap();
		assert_eq!(read, data.len() as u64);
		assert!(!eof);
		assert_eq!(&buf, data);
	}

	#[test]
	fn write_spanning_many_blocks_round_trips() {
		let geom = Geometry::new(128);
		let (mut dev, mut fl, mut pool, _) = setup(128, 4096);
		let mut ctx = Ctx { device: &mut dev, freelist: &mut fl, pool: &mut pool };
		let root_blk = alloc_new_file(&mut ctx, &geom).unwrap();
		let mut cursor = FileCursor::open(&mut ctx, root_blk).unwrap();
		let data: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
		let (_, new_size) = cursor.write(&mut ctx, &geom, 0, &data).unwrap();
		cursor.seek(0);
		let mut out = vec![0u8; data.len()];
		let (read, eof) = cursor.read(&mut ctx, &geom, new_size, &mut out).unwrap();
		assert_eq!(read, data.len() as u64);
		assert!(!eof);
		assert_eq!(out, data);
	}

	#[test]
	fn max_file_size_then_one_more_byte_fails() {
		let geom = Geometry::new(128);
		let max = geom.max_file_size();
		// 4 MiB of blocks is plenty for B=128's geometry (266_240 bytes).
		let (mut dev, mut fl, mut pool, _) = setup(128, (max / 128) as u32 + 256);
		let mut ctx = Ctx { device: &mut dev, freelist: &mut fl, pool: &mut pool };
		let root_blk = alloc_new_file(&mut ctx, &geom).unwrap();
		let mut cursor = FileCursor::open(&mut ctx, root_blk).unwrap();
		let chunk = vec![0xABu8; 4096];
		let mut written_total = 0u64;
		let mut size = 0u64;
		while written_total < max {
			let remaining = (max - written_total).min(chunk.len() as u64) as usize;
			let (w, s) = cursor.write(&mut ctx, &geom, size, &chunk[..remaining]).unwrap();
			written_total += w;
			size = s;
		}
		assert_eq!(size, max);
		let err = cursor.write(&mut ctx, &geom, size, &[0u8]).unwrap_err();
		assert_eq!(err, Error::NoSpace);
	}

	#[test]
	fn write_crossing_max_size_commits_the_partial_prefix_instead_of_losing_it() {
		let geom = Geometry::new(128);
		let max = geom.max_file_size();
		let (mut dev, mut fl, mut pool, _) = setup(128, (max / 128) as u32 + 256);
		let mut ctx = Ctx { device: &mut dev, freelist: &mut fl, pool: &mut pool };
		let root_blk = alloc_new_file(&mut ctx, &geom).unwrap();
		let mut cursor = FileCursor::open(&mut ctx, root_blk).unwrap();
		let chunk = vec![0xABu8; 4096];
		let mut written_total = 0u64;
		let mut size = 0u64;
		// Fill to exactly 10 bytes short of capacity, so the next write has
		// room for only part of what it's asked to write.
		while written_total < max - 10 {
			let remaining = (max - 10 - written_total).min(chunk.len() as u64) as usize;
			let (w, s) = cursor.write(&mut ctx, &geom, size, &chunk[..remaining]).unwrap();
			written_total += w;
			size = s;
		}
		assert_eq!(size, max - 10);

		let (written, new_size) = cursor.write(&mut ctx, &geom, size, &[0xCDu8; 100]).unwrap();
		assert_eq!(written, 10, "only the bytes that fit before NoSpace should be reported written");
		assert_eq!(new_size, max);

		cursor.seek(new_size - 10);
		let mut tail = [0u8; 10];
		let (read, _) = cursor.read(&mut ctx, &geom, new_size, &mut tail).unwrap();
		assert_eq!(read, 10);
		assert_eq!(tail, [0xCDu8; 10], "the committed prefix must actually be the bytes that were written");
	}

	#[test]
	fn eof_semantics() {
		let geom = Geometry::new(128);
		let (mut dev, mut fl, mut pool, _) = setup(128, 4096);
		let mut ctx = Ctx { device: &mut dev, freelist: &mut fl, pool: &mut pool };
		let root_blk = alloc_new_file(&mut ctx, &geom).unwrap();
		let mut cursor = FileCursor::open(&mut ctx, root_blk).unwrap();
		let (_, size) = cursor.write(&mut ctx, &geom, 0, b"abc").unwrap();
		cursor.seek(size);
		let mut buf = [0u8; 4];
		let (n, eof) = cursor.read(&mut ctx, &geom, size, &mut buf).unwrap();
		assert_eq!(n, 0);
		assert!(eof);
		let (n, eof) = cursor.read(&mut ctx, &geom, size, &mut buf[..0]).unwrap();
		assert_eq!(n, 0);
		assert!(!eof);
	}
}
