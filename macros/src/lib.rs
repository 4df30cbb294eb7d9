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

//! Derive macros for the nanofs on-disk record types.

extern crate proc_macro;

mod record;

use proc_macro::TokenStream;

/// Derives `SIZE`, `write_be` and `read_be` for a `#[repr(C)]` struct whose
/// fields are all `u8`/`u16`/`u32`/`u64` or `[u8; N]`, laid out in
/// declaration order as fixed-width big-endian fields.
///
/// This plays the same role as a kernel's `AnyRepr` derive, but instead of
/// reinterpreting raw memory (which assumes the host is little-endian and
/// the struct has no padding), it generates explicit byte-at-a-time
/// encode/decode, since every record this crate stores on disk is specified
/// in big-endian regardless of host.
#[proc_macro_derive(BigEndianRecord)]
pub fn derive_big_endian_record(input: TokenStream) -> TokenStream {
	record::derive(input)
}
