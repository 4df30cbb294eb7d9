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

//! The block device contract.
//!
//! This is deliberately the thinnest possible abstraction: a fixed number of
//! fixed-size blocks, read and written whole. The engine never partially
//! reads or writes a block; callers of this trait therefore never need to
//! worry about alignment. A "not ready" read failure is modeled and treated
//! as fatal by the engine: a future version with a transaction context could
//! recover from it, this one cannot.

use crate::error::{Error, Result};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// A fixed-geometry, block-addressable storage device.
///
/// Implementations are expected to be cheap to read from/write to; the engine
/// calls these methods constantly and performs no caching of its own beyond
/// the scratch [`crate::pool::BlockPool`].
pub trait BlockDevice {
	/// The size of one block, in bytes. Must be a power of two and the same
	/// for the lifetime of the device.
	fn block_size(&self) -> u32;

	/// The number of addressable blocks on the device.
	fn block_count(&self) -> u32;

	/// Reads block `blk` into `dst`, which must be exactly [`Self::block_size`]
	/// bytes long.
	///
	/// A device that models lazy loading may return [`Error::Busy`] to signal
	/// "not ready yet"; the engine treats this as fatal (see module docs).
	fn read_block(&self, blk: u32, dst: &mut [u8]) -> Result<()>;

	/// Writes `src`, which must be exactly [`Self::block_size`] bytes long,
	/// to block `blk`.
	fn write_block(&mut self, blk: u32, src: &[u8]) -> Result<()>;

	/// Zeroes block `blk`. The default implementation writes a zeroed buffer;
	/// devices that can do this more cheaply (e.g. sparse files) may override
	/// it.
	fn zero_block(&mut self, blk: u32) -> Result<()> {
		let size = self.block_size() as usize;
		let zeros = vec![0u8; size];
		self.write_block(blk, &zeros)
	}

	/// Attempts to bind this device to a filesystem instance.
	///
	/// A device may be bound to at most one initialized filesystem at a
	/// time; the default implementation never tracks this
	/// (a plain owned device can't be bound twice since Rust ownership
	/// already prevents that), but [`SharedDevice`] overrides it to enforce
	/// the rule for devices shared between multiple [`crate::Filesystem`]
	/// instances.
	fn try_bind(&self) -> Result<()> {
		Ok(())
	}

	/// Releases a previous successful [`Self::try_bind`].
	fn unbind(&self) {}
}

/// A block device entirely held in memory, backed by a flat byte buffer.
///
/// This is the reference implementation of the external block-device
/// contract: every block is just a slice of one big `Vec<u8>`. An optional
/// change-notification hook fires `(device_id, blk)` after every write.
pub struct MemBlockDevice {
	device_id: u32,
	block_size: u32,
	blocks: Vec<u8>,
	on_change: Option<Box<dyn FnMut(u32, u32)>>,
}

impl MemBlockDevice {
	/// Creates a new zeroed in-memory device of `block_count` blocks of
	/// `block_size` bytes each. `block_size` must be a power of two.
	pub fn new(device_id: u32, block_size: u32, block_count: u32) -> Self {
		assert!(block_size.is_power_of_two(), "block size must be a power of two");
		Self {
			device_id,
			block_size,
			blocks: vec![0u8; block_size as usize * block_count as usize],
			on_change: None,
		}
	}

	/// Registers a callback invoked with `(device_id, blk)` after every write
	/// or zero operation.
	pub fn set_change_hook(&mut self, hook: impl FnMut(u32, u32) + 'static) {
		self.on_change = Some(Box::new(hook));
	}

	/// The identifier passed to the change-notification hook.
	pub fn device_id(&self) -> u32 {
		self.device_id
	}

	fn block_range(&self, blk: u32) -> std::ops::Range<usize> {
		let size = self.block_size as usize;
		let start = blk as usize * size;
        start..start + size
	}
}

impl BlockDevice for MemBlockDevice {
	fn block_size(&self) -> u32 {
		self.block_size
	}

	fn block_count(&self) -> u32 {
		(self.blocks.len() / self.block_size as usize) as u32
	}

	fn read_block(&self, blk: u32, dst: &mut [u8]) -> Result<()> {
		if blk >= self.block_count() {
			return Err(Error::FatalInternalError);
		}
		let range = self.block_range(blk);
		dst.copy_from_slice(&self.blocks[range]);
		Ok(())
	}

	fn write_block(&mut self, blk: u32, src: &[u8]) -> Result<()> {
		if blk >= self.block_count() {
			return Err(Error::FatalInternalError);
		}
		let range = self.block_range(blk);
		self.blocks[range].copy_from_slice(src);
		let device_id = self.device_id;
		if let Some(hook) = &mut self.on_change {
			hook(device_id, blk);
		}
		Ok(())
	}
}

/// A [`BlockDevice`] shared by reference count, with bind-count enforcement.
///
/// Used when one backing device must be reachable from more than one place
/// (e.g. the host bridge, which keeps a table of `fs_id -> Filesystem` and may
/// legitimately want to `init` the same device twice sequentially, but never
/// concurrently).
pub struct SharedDevice<D> {
	inner: Rc<RefCell<D>>,
	bound: Rc<Cell<bool>>,
}

impl<D> SharedDevice<D> {
	/// Wraps `device` for sharing.
	pub fn new(device: D) -> Self {
		Self {
			inner: Rc::new(RefCell::new(device)),
			bound: Rc::new(Cell::new(false)),
		}
	}
}

impl<D> Clone for SharedDevice<D> {
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
			bound: self.bound.clone(),
		}
	}
}

impl<D: BlockDevice> BlockDevice for SharedDevice<D> {
	fn block_size(&self) -> u32 {
		self.inner.borrow().block_size()
	}

	fn block_count(&self) -> u32 {
		self.inner.borrow().block_count()
	}

	fn read_block(&self, blk: u32, dst: &mut [u8]) -> Result<()> {
		self.inner.borrow().read_block(blk, dst)
	}

	fn write_block(&mut self, blk: u32, src: &[u8]) -> Result<()> {
		self.inner.borrow_mut().write_block(blk, src)
	}

	fn zero_block(&mut self, blk: u32) -> Result<()> {
		self.inner.borrow_mut().zero_block(blk)
	}

	fn try_bind(&self) -> Result<()> {
		if self.bound.replace(true) {
			return Err(Error::Busy);
		}
		Ok(())
	}

	fn unbind(&self) {
		self.bound.set(false);
	}
}
