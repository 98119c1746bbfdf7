#[cfg(feature = "import")]
use byteorder::ReadBytesExt;

#[cfg(feature = "export")]
use byteorder::WriteBytesExt;

use byteorder::LE;
use log::warn;

use std::io;

use skinkit_core::rtag4;

use crate::m2::{
	Array,
	Batch,
	ShadowBatch,
	SkinBone,
	SkinSection,
	Triangle
};

#[cfg(feature = "import")]
use import::SkinImportError;

pub const MAGIC: u32 = rtag4!(b"SKIN");
pub const COMPACT_HEADER_SIZE: u32 = 48;
pub const LEGACY_HEADER_SIZE: u32 = 64;
pub const RESERVED_SIZE: usize = 8;

/// On-disk header shape
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Layout {
	/// Carries shadow batches and 8 reserved bytes, vertices start at 64
	Legacy,
	/// No shadow batches or reserved bytes, vertices start at 48
	Compact,
}

impl Layout {
	/// Classifies a header by the value in its vertex array offset slot.
	///
	/// Only 48 is [`Layout::Compact`]. Everything else is treated as [`Layout::Legacy`], with a
	/// warning for anything other than 64.
	pub fn detect(vertex_offset: u32) -> Layout {
		match vertex_offset {
			COMPACT_HEADER_SIZE => Layout::Compact,
			LEGACY_HEADER_SIZE => Layout::Legacy,
			other => {
				warn!("Unexpected skin vertex offset {}, assuming legacy layout", other);
				Layout::Legacy
			}
		}
	}

	/// Header length, which is also where the vertex array starts
	pub const fn header_size(self) -> u32 {
		match self {
			Layout::Legacy => LEGACY_HEADER_SIZE,
			Layout::Compact => COMPACT_HEADER_SIZE,
		}
	}
}

/// Header fields that only exist in the legacy layout
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LegacyFields {
	pub shadow_batches: Array,
	pub reserved: [u8; RESERVED_SIZE],
}

/// The offset table at the start of every skin profile
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
	pub magic: u32,
	pub vertices: Array,
	/// Counts indices, not triangles
	pub indices: Array,
	pub bones: Array,
	pub submeshes: Array,
	pub batches: Array,
	pub global_vertex_offset: u32,
	pub legacy: Option<LegacyFields>,
}

impl Header {
	pub fn layout(&self) -> Layout {
		match self.legacy {
			Some(_) => Layout::Legacy,
			None => Layout::Compact,
		}
	}

	/// Array locations in on-disk order
	pub fn arrays(&self) -> Vec<Array> {
		let mut arrays = vec![self.vertices, self.indices, self.bones, self.submeshes, self.batches];
		if let Some(legacy) = self.legacy {
			arrays.push(legacy.shadow_batches);
		}

		arrays
	}

	#[cfg(feature = "import")]
	pub fn read(file: &[u8]) -> Result<Header, SkinImportError> {
		use std::io::Read;
		use skinkit_core::window;

		let mut buf = window(file, 0, COMPACT_HEADER_SIZE as usize)?;
		let magic = buf.read_u32::<LE>()?;
		let vertices = Array::read(&mut buf)?;
		let indices = Array::read(&mut buf)?;
		let bones = Array::read(&mut buf)?;
		let submeshes = Array::read(&mut buf)?;
		let batches = Array::read(&mut buf)?;
		let global_vertex_offset = buf.read_u32::<LE>()?;

		let legacy = match Layout::detect(vertices.offset) {
			Layout::Compact => None,
			Layout::Legacy => {
				let mut buf = window(file, COMPACT_HEADER_SIZE as usize,
					(LEGACY_HEADER_SIZE - COMPACT_HEADER_SIZE) as usize)?;
				let shadow_batches = Array::read(&mut buf)?;
				let mut reserved = [0; RESERVED_SIZE];
				buf.read_exact(&mut reserved)?;

				Some(LegacyFields {
					shadow_batches,
					reserved,
				})
			}
		};

		Ok(Header {
			magic,
			vertices,
			indices,
			bones,
			submeshes,
			batches,
			global_vertex_offset,
			legacy,
		})
	}

	#[cfg(feature = "export")]
	pub fn write<W>(&self, buf: &mut W) -> io::Result<()>
	where
		W: WriteBytesExt,
	{
		buf.write_u32::<LE>(self.magic)?;
		self.vertices.write(buf)?;
		self.indices.write(buf)?;
		self.bones.write(buf)?;
		self.submeshes.write(buf)?;
		self.batches.write(buf)?;
		buf.write_u32::<LE>(self.global_vertex_offset)?;

		if let Some(legacy) = &self.legacy {
			legacy.shadow_batches.write(buf)?;
			buf.write_all(&legacy.reserved)?;
		}

		Ok(())
	}
}

/// A skin profile: which part of an M2's geometry to draw, and how
#[derive(Clone, Debug, PartialEq)]
pub struct Skin {
	layout: Layout,
	/// Indices into the model's vertex list, offset by `global_vertex_offset`
	pub vertices: Vec<u16>,
	/// Indices into `vertices`
	pub triangles: Vec<Triangle>,
	pub bones: Vec<SkinBone>,
	pub submeshes: Vec<SkinSection>,
	pub batches: Vec<Batch>,
	pub global_vertex_offset: u32,
	/// Only stored by [`Layout::Legacy`]
	pub shadow_batches: Vec<ShadowBatch>,
	/// Only stored by [`Layout::Legacy`], kept verbatim
	pub reserved: [u8; RESERVED_SIZE],
}

impl Skin {
	pub fn new(layout: Layout) -> Skin {
		Skin {
			layout,
			vertices: vec![],
			triangles: vec![],
			bones: vec![],
			submeshes: vec![],
			batches: vec![],
			global_vertex_offset: 0,
			shadow_batches: vec![],
			reserved: [0; RESERVED_SIZE],
		}
	}

	pub fn layout(&self) -> Layout {
		self.layout
	}

	/// Length of the encoded skin in bytes
	pub fn encoded_len(&self) -> usize {
		use skinkit_core::io_ext::Record;

		let mut len = self.layout.header_size() as usize
			+ self.vertices.len() * <u16 as Record>::SIZE
			+ self.triangles.len() * <Triangle as Record>::SIZE
			+ self.bones.len() * <SkinBone as Record>::SIZE
			+ self.submeshes.len() * SkinSection::SIZE
			+ self.batches.len() * Batch::SIZE;

		if self.layout == Layout::Legacy {
			len += self.shadow_batches.len() * ShadowBatch::SIZE;
		}

		len
	}
}

#[cfg(feature = "import")]
pub mod import {
	use log::{
		debug,
		warn
	};

	use thiserror::Error;

	use skinkit_core::{
		io_ext::records_at,
		Truncated
	};

	use super::*;

	#[derive(Error, Debug)]
	pub enum SkinImportError {
		#[error("I/O error")]
		IO {
			#[from]
			source: io::Error,
		},
		#[error("Index count is not a multiple of 3: {0}")]
		IndexCount(u32),
		#[error("Not a skin profile: {0:X}")]
		Magic(u32),
		#[error("Truncated skin profile: {0}")]
		Truncated(#[from] Truncated),
	}

	#[derive(Clone, Copy, Debug, PartialEq, Eq)]
	pub struct ImportOptions {
		/// Reject files that don't start with `SKIN`
		pub verify_magic: bool,
		/// Reject index counts that aren't a multiple of 3 instead of dropping the remainder
		pub strict_index_count: bool,
	}

	impl Default for ImportOptions {
		fn default() -> Self {
			Self {
				verify_magic: true,
				strict_index_count: false,
			}
		}
	}

	impl Skin {
		pub fn decode(file: &[u8]) -> Result<Skin, SkinImportError> {
			Self::decode_with(file, &ImportOptions::default())
		}

		pub fn decode_with(file: &[u8], opts: &ImportOptions) -> Result<Skin, SkinImportError> {
			let header = Header::read(file)?;
			if opts.verify_magic && header.magic != MAGIC {
				return Err(SkinImportError::Magic(header.magic));
			}

			let nindices = header.indices.count;
			if nindices % 3 != 0 {
				if opts.strict_index_count {
					return Err(SkinImportError::IndexCount(nindices));
				}
				warn!("Skin index count {} is not a multiple of 3, dropping {} indices", nindices, nindices % 3);
			}

			let (shadow_batches, reserved) = match header.legacy {
				Some(legacy) => (
					records_at(file, legacy.shadow_batches.offset, legacy.shadow_batches.count as usize)?,
					legacy.reserved,
				),
				None => (vec![], [0; RESERVED_SIZE]),
			};

			let skin = Skin {
				layout: header.layout(),
				vertices: records_at(file, header.vertices.offset, header.vertices.count as usize)?,
				triangles: records_at(file, header.indices.offset, (nindices / 3) as usize)?,
				bones: records_at(file, header.bones.offset, header.bones.count as usize)?,
				submeshes: records_at(file, header.submeshes.offset, header.submeshes.count as usize)?,
				batches: records_at(file, header.batches.offset, header.batches.count as usize)?,
				global_vertex_offset: header.global_vertex_offset,
				shadow_batches,
				reserved,
			};

			debug!("Decoded {:?} skin: {} vertices, {} triangles, {} submeshes, {} batches, {} shadow batches",
				skin.layout, skin.vertices.len(), skin.triangles.len(), skin.submeshes.len(),
				skin.batches.len(), skin.shadow_batches.len());

			Ok(skin)
		}
	}

	#[cfg(test)]
	mod tests {
		use crate::skin::fixtures::{
			compact_file,
			legacy_file,
			words
		};

		use super::*;

		#[test]
		fn test_detect() {
			assert_eq!(Layout::detect(48), Layout::Compact);
			assert_eq!(Layout::detect(64), Layout::Legacy);
			assert_eq!(Layout::detect(0), Layout::Legacy);
			assert_eq!(Layout::detect(52), Layout::Legacy);
			assert_eq!(Layout::detect(u32::MAX), Layout::Legacy);
		}

		#[test]
		fn test_compact() {
			let skin = Skin::decode(&compact_file()).unwrap();

			assert_eq!(skin.layout(), Layout::Compact);
			assert_eq!(skin.vertices, [10, 11, 12]);
			assert_eq!(skin.triangles, [[0, 1, 2]]);
			assert!(skin.bones.is_empty());
			assert!(skin.submeshes.is_empty());
			assert!(skin.batches.is_empty());
			assert!(skin.shadow_batches.is_empty());
			assert_eq!(skin.global_vertex_offset, 100);
			assert_eq!(skin.reserved, [0; RESERVED_SIZE]);
		}

		#[test]
		fn test_legacy() {
			let skin = Skin::decode(&legacy_file()).unwrap();

			assert_eq!(skin.layout(), Layout::Legacy);
			assert_eq!(skin.vertices, [5, 6]);
			assert_eq!(skin.triangles, [[1, 0, 1]]);
			assert_eq!(skin.bones, [[9, 8, 7, 6]]);
			assert!(skin.submeshes.is_empty());
			assert_eq!(skin.batches, [Batch {
				flags: 0x10,
				shader_id: 1,
				color_index: 0xFFFF,
				texture_count: 1,
				..Default::default()
			}]);
			assert_eq!(skin.shadow_batches, [ShadowBatch {
				flags: 1,
				texture_id: 2,
				..Default::default()
			}]);
			assert_eq!(skin.global_vertex_offset, 7);
			assert_eq!(skin.reserved, [1, 2, 3, 4, 5, 6, 7, 8]);
		}

		#[test]
		fn test_header_counts() {
			let file = legacy_file();
			let header = Header::read(&file).unwrap();
			let skin = Skin::decode(&file).unwrap();

			assert_eq!(header.vertices.count as usize, skin.vertices.len());
			assert_eq!(header.indices.count as usize, skin.triangles.len() * 3);
			assert_eq!(header.bones.count as usize, skin.bones.len());
			assert_eq!(header.submeshes.count as usize, skin.submeshes.len());
			assert_eq!(header.batches.count as usize, skin.batches.len());
			assert_eq!(header.legacy.unwrap().shadow_batches.count as usize, skin.shadow_batches.len());
		}

		#[test]
		fn test_compact_skips_legacy_fields() {
			// a compact header followed directly by vertex data that would be nonsense as shadow fields
			let header = Header::read(&compact_file()).unwrap();
			assert_eq!(header.layout(), Layout::Compact);
			assert_eq!(header.legacy, None);
			assert_eq!(header.arrays().len(), 5);
		}

		#[test]
		fn test_follows_declared_offsets() {
			// gap between the vertices and the triangle
			let mut file = words(&[MAGIC, 1, 48, 3, 56, 0, 0, 0, 0, 0, 0, 0]);
			file.extend_from_slice(&[0x34, 0x12]);
			file.extend_from_slice(&[0xAA; 6]);
			file.extend_from_slice(&[2, 0, 1, 0, 0, 0]);

			let skin = Skin::decode(&file).unwrap();
			assert_eq!(skin.vertices, [0x1234]);
			assert_eq!(skin.triangles, [[2, 1, 0]]);
		}

		#[test]
		fn test_truncated() {
			for file in [compact_file(), legacy_file()] {
				for len in 0..file.len() {
					match Skin::decode(&file[..len]) {
						Err(SkinImportError::Truncated(_)) => {},
						other => panic!("{} byte cut: {:?}", len, other),
					}
				}
			}
		}

		#[test]
		fn test_truncated_details() {
			let file = compact_file();
			match Skin::decode(&file[..58]) {
				Err(SkinImportError::Truncated(t)) => {
					assert_eq!(t, Truncated { offset: 54, needed: 6, available: 58 });
				},
				other => panic!("{:?}", other),
			}
		}

		#[test]
		fn test_offset_past_end() {
			let mut file = compact_file();
			file[24..28].copy_from_slice(&1000u32.to_le_bytes());
			file[20..24].copy_from_slice(&1u32.to_le_bytes());
			assert!(matches!(Skin::decode(&file), Err(SkinImportError::Truncated(_))));

			// empty arrays may point anywhere
			file[20..24].copy_from_slice(&0u32.to_le_bytes());
			assert!(Skin::decode(&file).is_ok());
		}

		#[test]
		fn test_magic() {
			let mut file = compact_file();
			file[..4].copy_from_slice(b"NIKS");

			assert!(matches!(Skin::decode(&file), Err(SkinImportError::Magic(m)) if m == rtag4!(b"NIKS")));

			let opts = ImportOptions {
				verify_magic: false,
				..Default::default()
			};
			assert_eq!(Skin::decode_with(&file, &opts).unwrap().vertices, [10, 11, 12]);
		}

		#[test]
		fn test_index_remainder() {
			let mut file = compact_file();
			file[12..16].copy_from_slice(&4u32.to_le_bytes());

			assert_eq!(Skin::decode(&file).unwrap().triangles, [[0, 1, 2]]);

			let opts = ImportOptions {
				strict_index_count: true,
				..Default::default()
			};
			assert!(matches!(Skin::decode_with(&file, &opts), Err(SkinImportError::IndexCount(4))));
		}

		#[test]
		fn test_decode_leaves_input() {
			let file = legacy_file();
			let copy = file.clone();
			let _ = Skin::decode(&file).unwrap();
			assert_eq!(file, copy);
		}
	}
}

#[cfg(feature = "export")]
pub mod export {
	use log::{
		debug,
		trace
	};

	use std::io::Write;

	use thiserror::Error;

	use skinkit_core::io_ext::{
		Record,
		WriteBinExt
	};

	use super::*;

	#[derive(Error, Debug)]
	pub enum SkinExportError {
		#[error("I/O error")]
		IO {
			#[from]
			source: io::Error,
		},
		#[error("Compact skins can't store shadow batches: {0}")]
		ShadowBatches(usize),
		#[error("Count or offset doesn't fit in 32 bits: {0}")]
		TooLarge(usize),
	}

	fn fit(n: usize) -> Result<u32, SkinExportError> {
		u32::try_from(n).map_err(|_| SkinExportError::TooLarge(n))
	}

	/// Places arrays back to back, starting right after the header
	struct Cursor {
		end: usize,
	}

	impl Cursor {
		fn place<T: Record>(&mut self, records: &[T]) -> Result<Array, SkinExportError> {
			let array = Array {
				count: fit(records.len())?,
				offset: fit(self.end)?,
			};
			self.end = records.len()
				.checked_mul(T::SIZE)
				.and_then(|n| n.checked_add(self.end))
				.ok_or(SkinExportError::TooLarge(usize::MAX))?;

			Ok(array)
		}
	}

	impl Skin {
		/// Lays out the arrays behind the header and returns the resulting offset table
		pub fn header(&self) -> Result<Header, SkinExportError> {
			if self.layout == Layout::Compact && !self.shadow_batches.is_empty() {
				return Err(SkinExportError::ShadowBatches(self.shadow_batches.len()));
			}

			let mut cur = Cursor {
				end: self.layout.header_size() as usize,
			};

			let vertices = cur.place(&self.vertices)?;
			let mut indices = cur.place(&self.triangles)?;
			indices.count = self.triangles.len()
				.checked_mul(3)
				.ok_or(SkinExportError::TooLarge(self.triangles.len()))
				.and_then(fit)?;
			let bones = cur.place(&self.bones)?;
			let submeshes = cur.place(&self.submeshes)?;
			let batches = cur.place(&self.batches)?;

			let legacy = match self.layout {
				Layout::Legacy => Some(LegacyFields {
					shadow_batches: cur.place(&self.shadow_batches)?,
					reserved: self.reserved,
				}),
				Layout::Compact => None,
			};

			let header = Header {
				magic: MAGIC,
				vertices,
				indices,
				bones,
				submeshes,
				batches,
				global_vertex_offset: self.global_vertex_offset,
				legacy,
			};
			trace!("Skin offset table: {:?}", header);

			Ok(header)
		}

		/// Writes the header followed by every array in on-disk order
		pub fn write<W>(&self, buf: &mut W) -> Result<(), SkinExportError>
		where
			W: Write,
		{
			let header = self.header()?;
			header.write(buf)?;

			buf.write_records(&self.vertices)?;
			buf.write_records(&self.triangles)?;
			buf.write_records(&self.bones)?;
			buf.write_records(&self.submeshes)?;
			buf.write_records(&self.batches)?;
			if header.legacy.is_some() {
				buf.write_records(&self.shadow_batches)?;
			}

			Ok(())
		}

		pub fn encode(&self) -> Result<Vec<u8>, SkinExportError> {
			let mut out = Vec::with_capacity(self.encoded_len());
			self.write(&mut out)?;

			debug!("Encoded {:?} skin into {} bytes", self.layout, out.len());
			Ok(out)
		}
	}

}
