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

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, Type};

enum FieldKind {
	Int(&'static str, usize),
	ByteArray(usize),
}

fn classify(ty: &Type) -> FieldKind {
	match ty {
		Type::Path(p) => {
			let ident = p.path.segments.last().unwrap().ident.to_string();
			match ident.as_str() {
				"u8" => FieldKind::Int("u8", 1),
				"u16" => FieldKind::Int("u16", 2),
				"u32" => FieldKind::Int("u32", 4),
				"u64" => FieldKind::Int("u64", 8),
				other => panic!("BigEndianRecord: unsupported field type `{other}`"),
			}
		}
		Type::Array(arr) => {
			let len = match &arr.len {
				syn::Expr::Lit(syn::ExprLit {
					lit: syn::Lit::Int(i),
					..
				}) => i.base10_parse::<usize>().unwrap(),
				_ => panic!("BigEndianRecord: array length must be an integer literal"),
			};
			FieldKind::ByteArray(len)
		}
		_ => panic!("BigEndianRecord: unsupported field type"),
	}
}

pub fn derive(input: TokenStream) -> TokenStream {
	let input = parse_macro_input!(input as DeriveInput);
	let name = &input.ident;
	let Data::Struct(data) = &input.data else {
		panic!("BigEndianRecord can only be derived for structs");
	};
	let Fields::Named(fields) = &data.fields else {
		panic!("BigEndianRecord requires named fields");
	};

	let mut offset = 0usize;
	let mut writes = Vec::<TokenStream2>::new();
	let mut reads = Vec::<TokenStream2>::new();
	let mut field_inits = Vec::<TokenStream2>::new();

	for field in &fields.named {
		let fname = field.ident.as_ref().unwrap();
		match classify(&field.ty) {
			FieldKind::Int(ty_name, size) => {
				let ty_ident = syn::Ident::new(ty_name, fname.span());
				let start = offset;
				let end = offset + size;
				writes.push(quote! {
					buf[#start..#end].copy_from_slice(&self.#fname.to_be_bytes());
				});
				reads.push(quote! {
					let #fname = #ty_ident::from_be_bytes(buf[#start..#end].try_into().unwrap());
				});
				field_inits.push(quote! { #fname });
				offset = end;
			}
			FieldKind::ByteArray(len) => {
				let start = offset;
				let end = offset + len;
				writes.push(quote! {
					buf[#start..#end].copy_from_slice(&self.#fname);
				});
				reads.push(quote! {
					let mut #fname = [0u8; #len];
					#fname.copy_from_slice(&buf[#start..#end]);
				});
				field_inits.push(quote! { #fname });
				offset = end;
			}
		}
	}

	let size = offset;
	let expanded = quote! {
		impl #name {
			/// The fixed on-disk size of this record, in bytes.
			pub const SIZE: usize = #size;

			/// Writes this record's fields, in declaration order, as
			/// fixed-width big-endian integers into `buf`.
			///
			/// `buf` must be at least [`Self::SIZE`] bytes long.
			pub fn write_be(&self, buf: &mut [u8]) {
				debug_assert!(buf.len() >= Self::SIZE);
				#(#writes)*
			}

			/// Reads a record out of `buf`, the inverse of [`Self::write_be`].
			///
			/// `buf` must be at least [`Self::SIZE`] bytes long.
			pub fn read_be(buf: &[u8]) -> Self {
				debug_assert!(buf.len() >= Self::SIZE);
				#(#reads)*
				Self { #(#field_inits),* }
			}
		}
	};
	expanded.into()
}
