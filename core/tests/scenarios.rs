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

//! End-to-end scenarios exercising the public API against a handful of
//! literal, worked examples.

use nanofs_core::{Error, Filesystem, Kind, MemBlockDevice, Whence, OPEN_READ, OPEN_WRITE, ROOT_INODE};

fn formatted(block_size: u32, block_count: u32, inode_block_count: u16) -> Filesystem<MemBlockDevice> {
	let mut dev = MemBlockDevice::new(0, block_size, block_count);
	let config = Filesystem::format(&mut dev, inode_block_count).unwrap();
	Filesystem::init(dev, &config).unwrap()
}

#[test]
fn format_and_root_is_empty() {
	let mut fs = formatted(512, 512, 8);
	let root = fs.stat(ROOT_INODE).unwrap();
	assert_eq!(root.kind, Kind::Dir);
	let fd = fs.opendir(ROOT_INODE).unwrap();
	assert!(fs.readdir(fd).unwrap().is_none());
	fs.closedir(fd).unwrap();
}

#[test]
fn mkdir_rmdir_churn() {
	let mut fs = formatted(512, 512, 8);
	fs.mkdir(ROOT_INODE, "a").unwrap();
	fs.mkdir(ROOT_INODE, "b").unwrap();
	fs.mkdir(ROOT_INODE, "c").unwrap();
	fs.rmdir(ROOT_INODE, "b").unwrap();
	fs.mkdir(ROOT_INODE, "d").unwrap();

	let fd = fs.opendir(ROOT_INODE).unwrap();
	let mut names: Vec<String> = fs
		.read_dir_all(fd)
		.unwrap()
		.into_iter()
		.map(|s| String::from_utf8(s.name.unwrap()).unwrap())
		.collect();
	fs.closedir(fd).unwrap();
	names.sort();
	assert_eq!(names, vec!["a", "c", "d"]);
	assert!(!fs.exists(ROOT_INODE, "b").unwrap());
}

#[test]
fn write_then_read_small_then_overwrite_and_extend() {
	let mut fs = formatted(512, 512, 8);
	let inode = fs.create(ROOT_INODE, "hello").unwrap();
	let fd = fs.open(inode, OPEN_READ | OPEN_WRITE).unwrap();

	fs.write(fd, b"Hello, World!").unwrap();
	fs.seek(fd, 0, Whence::Abs).unwrap();
	let mut buf = [0u8; 13];
	let (n, eof) = fs.read(fd, &mut buf).unwrap();
	assert_eq!(n, 13);
	assert_eq!(&buf, b"Hello, World!");
	assert!(!eof);

	// Overwrite the first few bytes, then extend past the original length.
	fs.seek(fd, 0, Whence::Abs).unwrap();
	fs.write(fd, b"FNARR").unwrap();
	assert_eq!(fs.stat(inode).unwrap().size, 13);

	fs.seek(fd, 13, Whence::Abs).unwrap();
	fs.write(fd, b" This is goodbye :(").unwrap();
	assert_eq!(fs.stat(inode).unwrap().size, 32);

	fs.seek(fd, 0, Whence::Abs).unwrap();
	let mut content = vec![0u8; 32];
	let mut done = 0;
	while done < content.len() {
		let (n, _) = fs.read(fd, &mut content[done..]).unwrap();
		assert!(n > 0);
		done += n as usize;
	}
	assert_eq!(&content, b"FNARR, World! This is goodbye :(");
	fs.close(fd).unwrap();
}

#[test]
fn content_survives_deinit_and_reinit_on_the_same_device() {
	let config;
	let device = {
		let mut dev = MemBlockDevice::new(0, 512, 512);
		config = Filesystem::format(&mut dev, 8).unwrap();
		let mut fs = Filesystem::init(dev, &config).unwrap();

		let inode = fs.create(ROOT_INODE, "persisted").unwrap();
		let fd = fs.open(inode, OPEN_WRITE).unwrap();
		fs.write(fd, b"this should survive a reopen").unwrap();
		fs.close(fd).unwrap();
		fs.mkdir(ROOT_INODE, "subdir").unwrap();

		fs.deinit()
	};

	let mut fs = Filesystem::init(device, &config).unwrap();
	let inode = fs.lookup(ROOT_INODE, "persisted").unwrap();
	let fd = fs.open(inode, OPEN_READ).unwrap();
	let mut buf = vec![0u8; "this should survive a reopen".len()];
	let (n, eof) = fs.read(fd, &mut buf).unwrap();
	assert_eq!(n, buf.len() as u64);
	assert!(!eof, "a read that exactly fills the remaining content is not itself short");
	assert_eq!(&buf, b"this should survive a reopen");
	fs.close(fd).unwrap();

	assert!(fs.exists(ROOT_INODE, "subdir").unwrap());
	let subdir = fs.lookup(ROOT_INODE, "subdir").unwrap();
	assert_eq!(fs.stat(subdir).unwrap().kind, Kind::Dir);
}

#[test]
fn max_file_size_then_delete_restores_free_blocks() {
	// A 128-byte block size gives a maximum file size of exactly 266_240
	// bytes under the direct+single-indirect addressing scheme.
	const MAX: u64 = 266_240;
	let mut fs = formatted(128, 3000, 8);
	let free_before = fs.stat_fs().free_blocks;

	let inode = fs.create(ROOT_INODE, "big").unwrap();
	let fd = fs.open(inode, OPEN_WRITE).unwrap();
	let chunk = vec![0xABu8; 4096];
	let mut written = 0u64;
	while written < MAX {
		let want = (MAX - written).min(chunk.len() as u64) as usize;
		written += fs.write(fd, &chunk[..want]).unwrap();
	}
	assert_eq!(written, MAX);
	assert_eq!(fs.stat(inode).unwrap().size as u64, MAX);
	assert_eq!(fs.write(fd, &[0u8]).unwrap_err(), Error::NoSpace);

	fs.close(fd).unwrap();
	fs.unlink(ROOT_INODE, "big").unwrap();
	assert_eq!(fs.stat_fs().free_blocks, free_before);
}

/// A minimal seeded linear-congruential generator, local to this test since
/// nothing else in the workspace needs a PRNG.
struct Lcg(u64);

impl Lcg {
	fn next_u32(&mut self) -> u32 {
		self.0 = self.0.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
		(self.0 >> 32) as u32
	}
}

#[test]
fn ten_handles_of_random_seeks_and_writes_match_a_byte_array_model() {
	let mut fs = formatted(128, 4096, 8);
	let inode = fs.create(ROOT_INODE, "fuzz").unwrap();
	let fds: Vec<u32> = (0..10).map(|_| fs.open(inode, OPEN_READ | OPEN_WRITE).unwrap()).collect();

	let mut model: Vec<u8> = Vec::new();
	let mut rng = Lcg(0xdead_beef_cafe_f00d);
	for _ in 0..500 {
		let fd = fds[rng.next_u32() as usize % fds.len()];
		let size = fs.stat(inode).unwrap().size as u64;
		let offset = if size == 0 { 0 } else { rng.next_u32() as u64 % (size + 1) };
		fs.seek(fd, offset as i64, Whence::Abs).unwrap();

		let len = 1 + (rng.next_u32() % 16) as usize;
		let chunk: Vec<u8> = (0..len).map(|_| rng.next_u32() as u8).collect();
		fs.write(fd, &chunk).unwrap();

		let end = offset as usize + len;
		if end > model.len() {
			model.resize(end, 0);
		}
		model[offset as usize..end].copy_from_slice(&chunk);
	}

	let read_fd = fs.open(inode, OPEN_READ).unwrap();
	let mut dump = vec![0u8; model.len()];
	let mut done = 0;
	while done < dump.len() {
		let (n, _) = fs.read(read_fd, &mut dump[done..]).unwrap();
		assert!(n > 0, "read stalled before reaching the modeled length");
		done += n as usize;
	}
	assert_eq!(dump, model);

	fs.close(read_fd).unwrap();
	for fd in fds {
		fs.close(fd).unwrap();
	}
}
