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

//! The error taxonomy returned by the engine's public API.
//!
//! Errors are split in the design between expected operational errors (this
//! type), structural invariant violations (`Error::FatalInternalError`, never
//! retried) and allocation failure, which is not representable here because it
//! is fatal: the process aborts instead (see [`crate::trace`]).

use core::fmt;

/// An error produced by a nanofs operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
	/// A name exceeded the maximum length for a directory entry.
	NameTooLong,
	/// A seek offset was negative or overflowed the file size.
	InvalidOffset,
	/// The target of an operation that requires a regular file is a directory.
	IsDir,
	/// The target of an operation that requires a directory is not one.
	NotDir,
	/// No entry by that name exists.
	NoEnt,
	/// An entry by that name already exists.
	Exists,
	/// The device has no free blocks left.
	NoSpace,
	/// The filesystem parameters (config header, format arguments) are invalid.
	InvalidFSParams,
	/// The requested operation conflicts with an in-progress one (e.g.
	/// truncating an already-open file, or `init`-ing an already-bound device).
	Busy,
	/// The handle is not open for reading.
	NotReadable,
	/// The handle is not open for writing.
	NotWritable,
	/// The inode table has no free slots left.
	NoFreeInodes,
	/// The handle number does not name an open file or directory.
	InvalidFileHandle,
	/// A directory slated for removal still contains entries.
	NotEmpty,
	/// The on-disk bytes contradict an invariant the engine just established.
	///
	/// This is never retried: callers should treat it the same as a panic,
	/// modulo being recoverable enough to unwind and close handles.
	FatalInternalError,
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let msg = match self {
			Self::NameTooLong => "name too long",
			Self::InvalidOffset => "invalid offset",
			Self::IsDir => "is a directory",
			Self::NotDir => "not a directory",
			Self::NoEnt => "no such entry",
			Self::Exists => "entry already exists",
			Self::NoSpace => "no space left on device",
			Self::InvalidFSParams => "invalid filesystem parameters",
			Self::Busy => "resource busy",
			Self::NotReadable => "file not open for reading",
			Self::NotWritable => "file not open for writing",
			Self::NoFreeInodes => "no free inodes",
			Self::InvalidFileHandle => "invalid file handle",
			Self::NotEmpty => "directory not empty",
			Self::FatalInternalError => "fatal internal error: on-disk invariant violated",
		};
		f.write_str(msg)
	}
}

impl std::error::Error for Error {}

/// Shorthand for `core::result::Result<T, Error>`.
pub type Result<T> = core::result::Result<T, Error>;

/// Builds an [`Error`] value. Exists mainly so error sites read the same way
/// a kernel's `errno!(EINVAL)` call sites do.
macro_rules! fserror {
	($kind:ident) => {
		$crate::error::Error::$kind
	};
}
pub(crate) use fserror;
