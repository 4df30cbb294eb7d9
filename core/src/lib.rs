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

//! nanofs: a small, block-addressable in-memory filesystem engine.
//!
//! Layered bottom to top: a [`device::BlockDevice`] supplies fixed-size
//! blocks; [`freelist::Freelist`] and [`inode::InodeTable`] track which
//! blocks and inode slots are in use; [`index`] addresses a file's data
//! through a two-level direct/indirect index block; [`dir`] builds plain
//! directories out of that addressing; [`handle`] layers open file and
//! directory descriptors over it all; [`fs::Filesystem`] is the facade
//! tying every layer together into the public operation set.

pub mod device;
pub mod dir;
pub mod error;
pub mod freelist;
pub mod fs;
pub mod handle;
pub mod index;
pub mod inode;
pub mod pool;
pub mod seq;
pub mod stat;
pub mod trace;

pub use device::{BlockDevice, MemBlockDevice, SharedDevice};
pub use error::{Error, Result};
pub use fs::{FsStats, Filesystem, Whence, CONFIG_LEN};
pub use handle::{OPEN_CREATE, OPEN_READ, OPEN_SEEK_END, OPEN_TRUNCATE, OPEN_WRITE};
pub use inode::{InodeId, ROOT_INODE};
pub use stat::{Kind, Stat};
