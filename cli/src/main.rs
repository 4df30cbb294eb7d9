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

//! `nanofsctl`: a small command-line driver backing the block device with a
//! plain file, for formatting, inspecting and poking at a nanofs image
//! without going through the host bridge.

mod device;

use std::env;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::exit;

use nanofs_core::{BlockDevice, Error, Filesystem, InodeId, Kind, CONFIG_LEN, ROOT_INODE};

use device::FileBlockDevice;

const DEFAULT_BLOCK_SIZE: u32 = 512;

/// Prints `{bin}: {msg}` to stderr and exits with status 1.
fn die(bin: &str, msg: impl std::fmt::Display) -> ! {
	eprintln!("{bin}: {msg}");
	exit(1);
}

fn usage() -> ! {
	eprintln!(
		"usage: nanofsctl <command> [args...]\n\
		 commands:\n\
		 \x20 mkfs <image> <total-blocks> <inode-blocks>\n\
		 \x20 statfs <image>\n\
		 \x20 ls <image> [dir-path]\n\
		 \x20 mkdir <image> <dir-path>\n\
		 \x20 rmdir <image> <dir-path>\n\
		 \x20 touch <image> <file-path>\n\
		 \x20 rm <image> <file-path>\n\
		 \x20 cat <image> <file-path>\n\
		 \x20 write <image> <file-path>   (reads new content from stdin)"
	);
	exit(2);
}

fn main() {
	let mut args = env::args();
	let bin = args.next().unwrap_or_else(|| "nanofsctl".to_string());
	let Some(command) = args.next() else { usage() };
	let rest: Vec<String> = args.collect();

	let result = match command.as_str() {
		"mkfs" => cmd_mkfs(&rest),
		"statfs" => cmd_statfs(&rest),
		"ls" => cmd_ls(&rest),
		"mkdir" => cmd_mkdir(&rest),
		"rmdir" => cmd_rmdir(&rest),
		"touch" => cmd_touch(&rest),
		"rm" => cmd_rm(&rest),
		"cat" => cmd_cat(&rest),
		"write" => cmd_write(&rest),
		_ => usage(),
	};
	if let Err(e) = result {
		die(&bin, e);
	}
}

enum CliError {
	Io(io::Error),
	Fs(Error),
	Usage,
}

impl std::fmt::Display for CliError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Io(e) => write!(f, "{e}"),
			Self::Fs(e) => write!(f, "{e}"),
			Self::Usage => write!(f, "wrong number of arguments"),
		}
	}
}

impl From<io::Error> for CliError {
	fn from(e: io::Error) -> Self {
		Self::Io(e)
	}
}

impl From<Error> for CliError {
	fn from(e: Error) -> Self {
		Self::Fs(e)
	}
}

type CliResult = Result<(), CliError>;

fn cmd_mkfs(args: &[String]) -> CliResult {
	let [image, total_blocks, inode_blocks] = args else { return Err(CliError::Usage) };
	let total_blocks: u32 = total_blocks.parse().map_err(|_| CliError::Usage)?;
	let inode_blocks: u16 = inode_blocks.parse().map_err(|_| CliError::Usage)?;

	let mut dev = FileBlockDevice::create(PathBuf::from(image), DEFAULT_BLOCK_SIZE, total_blocks)?;
	let config = Filesystem::format(&mut dev, inode_blocks)?;
	let mut header = vec![0u8; DEFAULT_BLOCK_SIZE as usize];
	header[..CONFIG_LEN].copy_from_slice(&config);
	dev.write_block(0, &header)?;
	Ok(())
}

fn open_existing(image: &str) -> Result<Filesystem<FileBlockDevice>, CliError> {
	let dev = FileBlockDevice::open(PathBuf::from(image), DEFAULT_BLOCK_SIZE)?;
	let mut header = vec![0u8; dev.block_size() as usize];
	dev.read_block(0, &mut header)?;
	let mut config = [0u8; CONFIG_LEN];
	config.copy_from_slice(&header[..CONFIG_LEN]);
	Ok(Filesystem::init(dev, &config)?)
}

fn cmd_statfs(args: &[String]) -> CliResult {
	let [image] = args else { return Err(CliError::Usage) };
	let fs = open_existing(image)?;
	let s = fs.stat_fs();
	println!("block_size:   {}", s.block_size);
	println!("total_blocks: {}", s.total_blocks);
	println!("free_blocks:  {}", s.free_blocks);
	println!("total_inodes: {}", s.total_inodes);
	println!("free_inodes:  {}", s.free_inodes);
	Ok(())
}

/// Splits a `/`-separated path into its components, ignoring empty segments
/// (so both `/a/b` and `a/b` resolve the same way, rooted at [`ROOT_INODE`]).
fn components(path: &str) -> Vec<&str> {
	path.split('/').filter(|s| !s.is_empty()).collect()
}

fn resolve(fs: &mut Filesystem<FileBlockDevice>, path: &str) -> Result<InodeId, Error> {
	let mut cur = ROOT_INODE;
	for part in components(path) {
		cur = fs.lookup(cur, part)?;
	}
	Ok(cur)
}

/// Resolves every component but the last, returning `(parent_inode, last_name)`.
fn resolve_parent<'a>(fs: &mut Filesystem<FileBlockDevice>, path: &'a str) -> Result<(InodeId, &'a str), Error> {
	let parts = components(path);
	let (last, dirs) = parts.split_last().ok_or(Error::NoEnt)?;
	let mut cur = ROOT_INODE;
	for part in dirs {
		cur = fs.lookup(cur, part)?;
	}
	Ok((cur, last))
}

fn cmd_ls(args: &[String]) -> CliResult {
	if args.len() > 1 {
		return Err(CliError::Usage);
	}
	let image = args.first().ok_or(CliError::Usage)?;
	let mut fs = open_existing(image)?;
	let dir_path = args.get(1).map(String::as_str).unwrap_or("/");
	let inode = resolve(&mut fs, dir_path)?;
	let fd = fs.opendir(inode)?;
	let entries = fs.read_dir_all(fd)?;
	fs.closedir(fd)?;
	for entry in entries {
		let name = entry.name.as_deref().map(|n| String::from_utf8_lossy(n).into_owned()).unwrap_or_default();
		let kind = match entry.kind {
			Kind::Dir => 'd',
			Kind::File => '-',
		};
		println!("{kind} {:>8} {name}", entry.size);
	}
	Ok(())
}

fn cmd_mkdir(args: &[String]) -> CliResult {
	let [image, path] = args else { return Err(CliError::Usage) };
	let mut fs = open_existing(image)?;
	let (parent, name) = resolve_parent(&mut fs, path)?;
	fs.mkdir(parent, name)?;
	Ok(())
}

fn cmd_rmdir(args: &[String]) -> CliResult {
	let [image, path] = args else { return Err(CliError::Usage) };
	let mut fs = open_existing(image)?;
	let (parent, name) = resolve_parent(&mut fs, path)?;
	fs.rmdir(parent, name)?;
	Ok(())
}

fn cmd_touch(args: &[String]) -> CliResult {
	let [image, path] = args else { return Err(CliError::Usage) };
	let mut fs = open_existing(image)?;
	let (parent, name) = resolve_parent(&mut fs, path)?;
	fs.create(parent, name)?;
	Ok(())
}

fn cmd_rm(args: &[String]) -> CliResult {
	let [image, path] = args else { return Err(CliError::Usage) };
	let mut fs = open_existing(image)?;
	let (parent, name) = resolve_parent(&mut fs, path)?;
	fs.unlink(parent, name)?;
	Ok(())
}

fn cmd_cat(args: &[String]) -> CliResult {
	let [image, path] = args else { return Err(CliError::Usage) };
	let mut fs = open_existing(image)?;
	let inode = resolve(&mut fs, path)?;
	let fd = fs.open(inode, nanofs_core::OPEN_READ)?;
	let mut buf = [0u8; 4096];
	let stdout = io::stdout();
	let mut out = stdout.lock();
	loop {
		let (n, eof) = fs.read(fd, &mut buf)?;
		if n > 0 {
			out.write_all(&buf[..n as usize])?;
		}
		if eof {
			break;
		}
	}
	fs.close(fd)?;
	Ok(())
}

fn cmd_write(args: &[String]) -> CliResult {
	let [image, path] = args else { return Err(CliError::Usage) };
	let mut fs = open_existing(image)?;
	let (parent, name) = resolve_parent(&mut fs, path)?;
	let inode = match fs.lookup(parent, name) {
		Ok(inode) => inode,
		Err(Error::NoEnt) => fs.create(parent, name)?,
		Err(e) => return Err(e.into()),
	};
	let mut input = Vec::new();
	io::stdin().read_to_end(&mut input)?;
	let flags = nanofs_core::OPEN_WRITE | nanofs_core::OPEN_TRUNCATE;
	let fd = fs.open(inode, flags)?;
	let mut written = 0usize;
	while written < input.len() {
		let n = fs.write(fd, &input[written..])?;
		written += n as usize;
	}
	fs.close(fd)?;
	Ok(())
}
