#[cfg(feature = "io_ext")]
pub mod io_ext;

use thiserror::Error;

/// Converts a 4-byte string into a 32-bit little endian integer.
/// Byte strings longer than 4 bytes are truncated.
#[macro_export]
macro_rules! rtag4 {
	($b4: literal) => {
		u32::from_le_bytes([$b4[0], $b4[1], $b4[2], $b4[3]])
	}
}

/// Converts a 4-byte string into a 32-bit big endian integer.
/// Byte strings longer than 4 bytes are truncated.
#[macro_export]
macro_rules! tag4 {
	($b4: literal) => {
		u32::from_be_bytes([$b4[0], $b4[1], $b4[2], $b4[3]])
	}
}

/// A read of `needed` bytes at `offset` that the file can't satisfy
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("{needed} bytes at offset {offset} run past the end of a {available} byte file")]
pub struct Truncated {
	pub offset: usize,
	pub needed: usize,
	pub available: usize,
}

/// Returns the `len` bytes of `file` starting at `offset`
pub fn window(file: &[u8], offset: usize, len: usize) -> Result<&[u8], Truncated> {
	let err = Truncated {
		offset,
		needed: len,
		available: file.len(),
	};

	match offset.checked_add(len) {
		Some(end) if end <= file.len() => Ok(&file[offset..end]),
		_ => Err(err),
	}
}
