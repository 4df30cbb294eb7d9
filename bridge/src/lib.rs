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

//! The host bridge: a thin `extern "C"` surface mapping every engine
//! operation onto an integer return code. Bulk data (read/write payloads,
//! stat records) crosses through a shared "shuttle" buffer; names cross
//! through a separate name buffer. Negative return values are
//! [`Error`](nanofs_core::Error) codes; non-negative values are the
//! operation's own result (a count, a handle, an inode pointer, a boolean).
//!
//! Every exported function locks one process-wide registry of devices and
//! filesystem instances: this bridge does not add concurrency the core
//! doesn't already support, it just exposes the same single-threaded
//! instance to a foreign caller.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use nanofs_core::{Error, Filesystem, MemBlockDevice, Whence, CONFIG_LEN};

/// Size of the shared bulk-data buffer.
pub const SHUTTLE_LEN: usize = 64 * 1024;
/// Size of the shared name buffer; comfortably larger than the 14-byte
/// on-disk name field, since bridge callers pass names before they're
/// validated/truncated by the core.
pub const NAME_BUF_LEN: usize = 256;

const E_NAME_TOO_LONG: i32 = -1;
const E_INVALID_OFFSET: i32 = -2;
const E_IS_DIR: i32 = -3;
const E_NOT_DIR: i32 = -4;
const E_NO_ENT: i32 = -5;
const E_EXISTS: i32 = -6;
const E_NO_SPACE: i32 = -7;
const E_INVALID_FS_PARAMS: i32 = -8;
const E_BUSY: i32 = -9;
const E_NOT_READABLE: i32 = -10;
const E_NOT_WRITABLE: i32 = -11;
const E_NO_FREE_INODES: i32 = -12;
const E_INVALID_FILE_HANDLE: i32 = -13;
const E_NOT_EMPTY: i32 = -14;
const E_FATAL_INTERNAL: i32 = -15;
/// Not part of the core's own taxonomy: `device_id`/`fs_id` named nothing
/// the registry knows about.
const E_UNKNOWN_ID: i32 = -16;
/// Not part of the core's own taxonomy: a length argument didn't fit the
/// shuttle or name buffer.
const E_BUFFER_OVERFLOW: i32 = -17;

fn error_code(e: Error) -> i32 {
	match e {
		Error::NameTooLong => E_NAME_TOO_LONG,
		Error::InvalidOffset => E_INVALID_OFFSET,
		Error::IsDir => E_IS_DIR,
		Error::NotDir => E_NOT_DIR,
		Error::NoEnt => E_NO_ENT,
		Error::Exists => E_EXISTS,
		Error::NoSpace => E_NO_SPACE,
		Error::InvalidFSParams => E_INVALID_FS_PARAMS,
		Error::Busy => E_BUSY,
		Error::NotReadable => E_NOT_READABLE,
		Error::NotWritable => E_NOT_WRITABLE,
		Error::NoFreeInodes => E_NO_FREE_INODES,
		Error::InvalidFileHandle => E_INVALID_FILE_HANDLE,
		Error::NotEmpty => E_NOT_EMPTY,
		Error::FatalInternalError => E_FATAL_INTERNAL,
	}
}

struct Registry {
	next_device_id: u32,
	next_fs_id: u32,
	devices: HashMap<u32, MemBlockDevice>,
	filesystems: HashMap<u32, Filesystem<MemBlockDevice>>,
	fs_device_id: HashMap<u32, u32>,
	shuttle: Vec<u8>,
	name_buf: Vec<u8>,
	last_eof: bool,
}

impl Registry {
	fn new() -> Self {
		Self {
			next_device_id: 0,
			next_fs_id: 0,
			devices: HashMap::new(),
			filesystems: HashMap::new(),
			fs_device_id: HashMap::new(),
			shuttle: vec![0u8; SHUTTLE_LEN],
			name_buf: vec![0u8; NAME_BUF_LEN],
			last_eof: false,
		}
	}

	fn read_name(&self, name_len: u32) -> std::result::Result<String, i32> {
		let len = name_len as usize;
		if len == 0 || len > NAME_BUF_LEN {
			return Err(E_BUFFER_OVERFLOW);
		}
		std::str::from_utf8(&self.name_buf[..len]).map(str::to_owned).map_err(|_| E_NAME_TOO_LONG)
	}
}

static REGISTRY: OnceLock<Mutex<Registry>> = OnceLock::new();

fn registry() -> &'static Mutex<Registry> {
	REGISTRY.get_or_init(|| Mutex::new(Registry::new()))
}

/// A raw pointer into the shuttle buffer, stable for the process's lifetime.
/// Callers write bulk input (e.g. a `write` payload) before the call and read
/// bulk output (e.g. a `read`/`stat` result) after it.
#[no_mangle]
pub extern "C" fn nanofs_shuttle_ptr() -> *mut u8 {
	registry().lock().unwrap().shuttle.as_mut_ptr()
}

#[no_mangle]
pub extern "C" fn nanofs_shuttle_len() -> u32 {
	SHUTTLE_LEN as u32
}

/// A raw pointer into the name buffer, used by every operation that takes a
/// directory-entry name.
#[no_mangle]
pub extern "C" fn nanofs_name_ptr() -> *mut u8 {
	registry().lock().unwrap().name_buf.as_mut_ptr()
}

#[no_mangle]
pub extern "C" fn nanofs_name_len() -> u32 {
	NAME_BUF_LEN as u32
}

/// Creates a fresh in-memory block device, returning a `device_id` to pass to
/// [`nanofs_format`]/[`nanofs_init`].
#[no_mangle]
pub extern "C" fn nanofs_create_device(block_size: u32, block_count: u32) -> i32 {
	if !block_size.is_power_of_two() {
		return E_INVALID_FS_PARAMS;
	}
	let mut reg = registry().lock().unwrap();
	let id = reg.next_device_id;
	reg.next_device_id += 1;
	reg.devices.insert(id, MemBlockDevice::new(id, block_size, block_count));
	id as i32
}

/// Formats `device_id` and writes the 16-byte config header to the front of
/// the shuttle buffer.
#[no_mangle]
pub extern "C" fn nanofs_format(device_id: u32, inode_block_count: u16) -> i32 {
	let mut reg = registry().lock().unwrap();
	let Some(device) = reg.devices.get_mut(&device_id) else {
		return E_UNKNOWN_ID;
	};
	match Filesystem::format(device, inode_block_count) {
		Ok(config) => {
			reg.shuttle[..CONFIG_LEN].copy_from_slice(&config);
			0
		}
		Err(e) => error_code(e),
	}
}

/// Initializes a filesystem instance over `device_id`, reading the 16-byte
/// config header from the front of the shuttle buffer. Returns the new
/// `fs_id`, consuming `device_id` (it is returned to the registry by
/// [`nanofs_deinit`]).
#[no_mangle]
pub extern "C" fn nanofs_init(device_id: u32) -> i32 {
	let mut reg = registry().lock().unwrap();
	let Some(device) = reg.devices.remove(&device_id) else {
		return E_UNKNOWN_ID;
	};
	let mut config = [0u8; CONFIG_LEN];
	config.copy_from_slice(&reg.shuttle[..CONFIG_LEN]);
	match Filesystem::init(device, &config) {
		Ok(fs) => {
			let fs_id = reg.next_fs_id;
			reg.next_fs_id += 1;
			reg.filesystems.insert(fs_id, fs);
			reg.fs_device_id.insert(fs_id, device_id);
			fs_id as i32
		}
		Err(e) => error_code(e),
	}
}

/// Drops a filesystem instance and returns its device to the registry under
/// its original `device_id`.
#[no_mangle]
pub extern "C" fn nanofs_deinit(fs_id: u32) -> i32 {
	let mut reg = registry().lock().unwrap();
	let Some(fs) = reg.filesystems.remove(&fs_id) else {
		return E_UNKNOWN_ID;
	};
	let device_id = reg.fs_device_id.remove(&fs_id).expect("every registered fs_id has a device_id");
	reg.devices.insert(device_id, fs.deinit());
	0
}

#[no_mangle]
pub extern "C" fn nanofs_lookup(fs_id: u32, parent: u16, name_len: u32) -> i32 {
	let mut reg = registry().lock().unwrap();
	let name = match reg.read_name(name_len) {
		Ok(n) => n,
		Err(code) => return code,
	};
	let Some(fs) = reg.filesystems.get_mut(&fs_id) else {
		return E_UNKNOWN_ID;
	};
	match fs.lookup(parent, &name) {
		Ok(inode) => inode as i32,
		Err(e) => error_code(e),
	}
}

#[no_mangle]
pub extern "C" fn nanofs_exists(fs_id: u32, parent: u16, name_len: u32) -> i32 {
	let mut reg = registry().lock().unwrap();
	let name = match reg.read_name(name_len) {
		Ok(n) => n,
		Err(code) => return code,
	};
	let Some(fs) = reg.filesystems.get_mut(&fs_id) else {
		return E_UNKNOWN_ID;
	};
	match fs.exists(parent, &name) {
		Ok(b) => b as i32,
		Err(e) => error_code(e),
	}
}

/// Writes the 29-byte stat wire form to the front of the shuttle buffer.
#[no_mangle]
pub extern "C" fn nanofs_stat(fs_id: u32, inode: u16) -> i32 {
	let mut reg = registry().lock().unwrap();
	let Some(fs) = reg.filesystems.get_mut(&fs_id) else {
		return E_UNKNOWN_ID;
	};
	match fs.stat(inode) {
		Ok(stat) => {
			reg.shuttle[..29].copy_from_slice(&stat.to_wire());
			0
		}
		Err(e) => error_code(e),
	}
}

#[no_mangle]
pub extern "C" fn nanofs_create(fs_id: u32, parent: u16, name_len: u32) -> i32 {
	let mut reg = registry().lock().unwrap();
	let name = match reg.read_name(name_len) {
		Ok(n) => n,
		Err(code) => return code,
	};
	let Some(fs) = reg.filesystems.get_mut(&fs_id) else {
		return E_UNKNOWN_ID;
	};
	match fs.create(parent, &name) {
		Ok(inode) => inode as i32,
		Err(e) => error_code(e),
	}
}

#[no_mangle]
pub extern "C" fn nanofs_mkdir(fs_id: u32, parent: u16, name_len: u32) -> i32 {
	let mut reg = registry().lock().unwrap();
	let name = match reg.read_name(name_len) {
		Ok(n) => n,
		Err(code) => return code,
	};
	let Some(fs) = reg.filesystems.get_mut(&fs_id) else {
		return E_UNKNOWN_ID;
	};
	match fs.mkdir(parent, &name) {
		Ok(inode) => inode as i32,
		Err(e) => error_code(e),
	}
}

#[no_mangle]
pub extern "C" fn nanofs_rmdir(fs_id: u32, parent: u16, name_len: u32) -> i32 {
	let mut reg = registry().lock().unwrap();
	let name = match reg.read_name(name_len) {
		Ok(n) => n,
		Err(code) => return code,
	};
	let Some(fs) = reg.filesystems.get_mut(&fs_id) else {
		return E_UNKNOWN_ID;
	};
	match fs.rmdir(parent, &name) {
		Ok(()) => 0,
		Err(e) => error_code(e),
	}
}

#[no_mangle]
pub extern "C" fn nanofs_unlink(fs_id: u32, parent: u16, name_len: u32) -> i32 {
	let mut reg = registry().lock().unwrap();
	let name = match reg.read_name(name_len) {
		Ok(n) => n,
		Err(code) => return code,
	};
	let Some(fs) = reg.filesystems.get_mut(&fs_id) else {
		return E_UNKNOWN_ID;
	};
	match fs.unlink(parent, &name) {
		Ok(()) => 0,
		Err(e) => error_code(e),
	}
}

#[no_mangle]
pub extern "C" fn nanofs_open(fs_id: u32, inode: u16, flags: u32) -> i32 {
	let mut reg = registry().lock().unwrap();
	let Some(fs) = reg.filesystems.get_mut(&fs_id) else {
		return E_UNKNOWN_ID;
	};
	match fs.open(inode, flags) {
		Ok(fd) => fd as i32,
		Err(e) => error_code(e),
	}
}

#[no_mangle]
pub extern "C" fn nanofs_close(fs_id: u32, fd: u32) -> i32 {
	let mut reg = registry().lock().unwrap();
	let Some(fs) = reg.filesystems.get_mut(&fs_id) else {
		return E_UNKNOWN_ID;
	};
	match fs.close(fd) {
		Ok(()) => 0,
		Err(e) => error_code(e),
	}
}

/// Reads up to `len` bytes (clamped to the shuttle's size) into the front of
/// the shuttle buffer. Returns the byte count read; call [`nanofs_last_eof`]
/// immediately afterward to learn whether end-of-file was reached.
#[no_mangle]
pub extern "C" fn nanofs_read(fs_id: u32, fd: u32, len: u32) -> i32 {
	let mut reg = registry().lock().unwrap();
	let len = (len as usize).min(SHUTTLE_LEN);
	let Some(fs) = reg.filesystems.get_mut(&fs_id) else {
		return E_UNKNOWN_ID;
	};
	let mut buf = vec![0u8; len];
	match fs.read(fd, &mut buf) {
		Ok((n, eof)) => {
			reg.shuttle[..n as usize].copy_from_slice(&buf[..n as usize]);
			reg.last_eof = eof;
			n as i32
		}
		Err(e) => error_code(e),
	}
}

#[no_mangle]
pub extern "C" fn nanofs_last_eof() -> i32 {
	registry().lock().unwrap().last_eof as i32
}

/// Writes the first `len` bytes (clamped to the shuttle's size) of the
/// shuttle buffer to `fd`. Returns the byte count written.
#[no_mangle]
pub extern "C" fn nanofs_write(fs_id: u32, fd: u32, len: u32) -> i32 {
	let mut reg = registry().lock().unwrap();
	let len = (len as usize).min(SHUTTLE_LEN);
	let src = reg.shuttle[..len].to_vec();
	let Some(fs) = reg.filesystems.get_mut(&fs_id) else {
		return E_UNKNOWN_ID;
	};
	match fs.write(fd, &src) {
		Ok(n) => n as i32,
		Err(e) => error_code(e),
	}
}

#[no_mangle]
pub extern "C" fn nanofs_seek(fs_id: u32, fd: u32, offset: i64, whence: u8) -> i64 {
	let whence = match whence {
		0 => Whence::Abs,
		1 => Whence::RelCurr,
		2 => Whence::RelEnd,
		_ => return E_INVALID_FS_PARAMS as i64,
	};
	let mut reg = registry().lock().unwrap();
	let Some(fs) = reg.filesystems.get_mut(&fs_id) else {
		return E_UNKNOWN_ID as i64;
	};
	match fs.seek(fd, offset, whence) {
		Ok(pos) => pos as i64,
		Err(e) => error_code(e) as i64,
	}
}

#[no_mangle]
pub extern "C" fn nanofs_tell(fs_id: u32, fd: u32) -> i64 {
	let mut reg = registry().lock().unwrap();
	let Some(fs) = reg.filesystems.get_mut(&fs_id) else {
		return E_UNKNOWN_ID as i64;
	};
	match fs.tell(fd) {
		Ok(pos) => pos as i64,
		Err(e) => error_code(e) as i64,
	}
}

#[no_mangle]
pub extern "C" fn nanofs_eof(fs_id: u32, fd: u32) -> i32 {
	let mut reg = registry().lock().unwrap();
	let Some(fs) = reg.filesystems.get_mut(&fs_id) else {
		return E_UNKNOWN_ID;
	};
	match fs.eof(fd) {
		Ok(b) => b as i32,
		Err(e) => error_code(e),
	}
}

#[no_mangle]
pub extern "C" fn nanofs_opendir(fs_id: u32, inode: u16) -> i32 {
	let mut reg = registry().lock().unwrap();
	let Some(fs) = reg.filesystems.get_mut(&fs_id) else {
		return E_UNKNOWN_ID;
	};
	match fs.opendir(inode) {
		Ok(fd) => fd as i32,
		Err(e) => error_code(e),
	}
}

#[no_mangle]
pub extern "C" fn nanofs_closedir(fs_id: u32, fd: u32) -> i32 {
	let mut reg = registry().lock().unwrap();
	let Some(fs) = reg.filesystems.get_mut(&fs_id) else {
		return E_UNKNOWN_ID;
	};
	match fs.closedir(fd) {
		Ok(()) => 0,
		Err(e) => error_code(e),
	}
}

/// Writes the next entry's 29-byte stat wire form (name included) to the
/// front of the shuttle buffer. Returns `1` on an entry, `0` at
/// end-of-directory.
#[no_mangle]
pub extern "C" fn nanofs_readdir(fs_id: u32, fd: u32) -> i32 {
	let mut reg = registry().lock().unwrap();
	let Some(fs) = reg.filesystems.get_mut(&fs_id) else {
		return E_UNKNOWN_ID;
	};
	match fs.readdir(fd) {
		Ok(Some(stat)) => {
			reg.shuttle[..29].copy_from_slice(&stat.to_wire());
			1
		}
		Ok(None) => 0,
		Err(e) => error_code(e),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	// The registry and its shuttle/name buffers are one process-wide
	// singleton, same as a real bridge caller would see; tests that poke at
	// them must not interleave.
	static TEST_LOCK: Mutex<()> = Mutex::new(());

	fn write_name(name: &str) {
		let mut reg = registry().lock().unwrap();
		reg.name_buf[..name.len()].copy_from_slice(name.as_bytes());
	}

	#[test]
	fn format_init_create_and_stat_round_trip() {
		let _guard = TEST_LOCK.lock().unwrap();
		let device_id = nanofs_create_device(128, 4096) as u32;
		assert_eq!(nanofs_format(device_id, 8), 0);
		let fs_id = nanofs_init(device_id);
		assert!(fs_id >= 0);
		let fs_id = fs_id as u32;

		write_name("greeting");
		let inode = nanofs_create(fs_id, 0, "greeting".len() as u32);
		assert!(inode > 0);

		assert_eq!(nanofs_stat(fs_id, inode as u16), 0);
		let reg = registry().lock().unwrap();
		assert_eq!(reg.shuttle[17], 1, "created entry must be a regular file");
		drop(reg);

		assert_eq!(nanofs_deinit(fs_id), 0);
	}

	#[test]
	fn unknown_ids_report_unknown_id() {
		assert_eq!(nanofs_stat(999_999, 0), E_UNKNOWN_ID);
		assert_eq!(nanofs_format(999_999, 8), E_UNKNOWN_ID);
	}
}
