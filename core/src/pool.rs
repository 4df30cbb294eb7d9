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

//! A process-wide reusable scratch-buffer source, sized to the block size.
//!
//! The engine reads and writes whole blocks constantly; without this pool
//! every such operation would allocate and drop a `Vec<u8>`. This is not
//! thread-safe — a filesystem instance is single-threaded by design — it
//! only exists to spare single-threaded allocator churn.

/// A cache of reusable block-sized buffers.
pub struct BlockPool {
	block_size: usize,
	free: Vec<Vec<u8>>,
}

impl BlockPool {
	/// Creates a pool that lends buffers of `block_size` bytes.
	pub fn new(block_size: u32) -> Self {
		Self {
			block_size: block_size as usize,
			free: Vec::new(),
		}
	}

	/// Lends a zeroed block-sized buffer, reusing a cached one if available.
	pub fn take(&mut self) -> Vec<u8> {
		self.free
			.pop()
			.map(|mut buf| {
				buf.iter_mut().for_each(|b| *b = 0);
				buf
			})
			.unwrap_or_else(|| vec![0u8; self.block_size])
	}

	/// Returns a buffer previously obtained from [`Self::take`] to the pool.
	pub fn give(&mut self, buf: Vec<u8>) {
		debug_assert_eq!(buf.len(), self.block_size);
		self.free.push(buf);
	}
}

/// A buffer borrowed from a [`BlockPool`], returned to it on drop.
///
/// A panic or an early `?` return both still run `Drop`, so the buffer is
/// never leaked out of the pool.
pub struct PooledBlock<'p> {
	pool: &'p mut BlockPool,
	buf: Option<Vec<u8>>,
}

impl<'p> PooledBlock<'p> {
	/// Borrows a buffer from `pool`.
	pub fn new(pool: &'p mut BlockPool) -> Self {
		let buf = pool.take();
		Self { pool, buf: Some(buf) }
	}
}

impl std::ops::Deref for PooledBlock<'_> {
	type Target = [u8];

	fn deref(&self) -> &[u8] {
		self.buf.as_deref().unwrap()
	}
}

impl std::ops::DerefMut for PooledBlock<'_> {
	fn deref_mut(&mut self) -> &mut [u8] {
		self.buf.as_deref_mut().unwrap()
	}
}

impl Drop for PooledBlock<'_> {
	fn drop(&mut self) {
		if let Some(buf) = self.buf.take() {
			self.pool.give(buf);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reuses_buffers() {
		let mut pool = BlockPool::new(64);
		{
			let mut b = PooledBlock::new(&mut pool);
			b[0] = 0xff;
		}
		assert_eq!(pool.free.len(), 1);
		let b = PooledBlock::new(&mut pool);
		assert_eq!(&b[..], &vec![0u8; 64][..]);
	}
}
