use bitflags::bitflags;

use byteorder::{
	LE,
	ReadBytesExt,
	WriteBytesExt
};

use std::io::{
	Read,
	Result,
	Write
};

use ultraviolet::vec::Vec3;

use skinkit_core::io_ext::Record;

bitflags! {
	pub struct BatchFlags: u8 {
		const INVERT = 1;
		const TRANSFORM = 1 << 1;
		const PROJECTED_TEXTURE = 1 << 2;
		const UNKNOWN_08 = 1 << 3;
		const BATCH_COMPATIBLE = 1 << 4;
		const PROJECTED_TEXTURE_2 = 1 << 5;
		const TEXTURE_WEIGHTS = 1 << 6;
	}
}

/// Element count and location of an array
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Array {
	pub count: u32,
	pub offset: u32, // relative to file start
}

impl Array {
	#[cfg(feature = "import")]
	pub fn read<R>(buf: &mut R) -> Result<Array>
	where
		R: ReadBytesExt,
	{
		Ok(Array {
			count: buf.read_u32::<LE>()?,
			offset: buf.read_u32::<LE>()?,
		})
	}

	#[cfg(feature = "export")]
	pub fn write<W>(&self, buf: &mut W) -> Result<()>
	where
		W: WriteBytesExt,
	{
		buf.write_u32::<LE>(self.count)?;
		buf.write_u32::<LE>(self.offset)
	}
}

/// Indices into a skin's vertex list, right handed
pub type Triangle = [u16; 3];

/// Indices into the model's bone lookup table
pub type SkinBone = [u8; 4];

/// A submesh: a range of a skin's vertices and indices drawn with one bone set
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SkinSection {
	pub id: u16,
	pub level: u16,
	pub vertex_start: u16,
	pub vertex_count: u16,
	pub index_start: u16,
	pub index_count: u16,
	pub bone_count: u16,
	pub bone_combo_index: u16,
	pub bone_influences: u16,
	pub center_bone_index: u16,
	pub center_position: Vec3,
	pub sort_center_position: Vec3,
	pub sort_radius: f32,
}

impl Default for SkinSection {
	fn default() -> Self {
		Self {
			id: 0,
			level: 0,
			vertex_start: 0,
			vertex_count: 0,
			index_start: 0,
			index_count: 0,
			bone_count: 0,
			bone_combo_index: 0,
			bone_influences: 0,
			center_bone_index: 0,
			center_position: Vec3::zero(),
			sort_center_position: Vec3::zero(),
			sort_radius: 0.0,
		}
	}
}

impl Record for SkinSection {
	const SIZE: usize = 48;

	fn read<R>(buf: &mut R) -> Result<Self>
	where
		R: Read + ?Sized,
	{
		Ok(SkinSection {
			id: buf.read_u16::<LE>()?,
			level: buf.read_u16::<LE>()?,
			vertex_start: buf.read_u16::<LE>()?,
			vertex_count: buf.read_u16::<LE>()?,
			index_start: buf.read_u16::<LE>()?,
			index_count: buf.read_u16::<LE>()?,
			bone_count: buf.read_u16::<LE>()?,
			bone_combo_index: buf.read_u16::<LE>()?,
			bone_influences: buf.read_u16::<LE>()?,
			center_bone_index: buf.read_u16::<LE>()?,
			center_position: Vec3::read(buf)?,
			sort_center_position: Vec3::read(buf)?,
			sort_radius: buf.read_f32::<LE>()?,
		})
	}

	fn write<W>(&self, buf: &mut W) -> Result<()>
	where
		W: Write + ?Sized,
	{
		for v in [self.id, self.level, self.vertex_start, self.vertex_count, self.index_start,
			self.index_count, self.bone_count, self.bone_combo_index, self.bone_influences,
			self.center_bone_index]
		{
			buf.write_u16::<LE>(v)?;
		}
		self.center_position.write(buf)?;
		self.sort_center_position.write(buf)?;
		buf.write_f32::<LE>(self.sort_radius)
	}
}

/// A texture unit: binds a material and textures to a submesh
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Batch {
	/// Raw flag byte, see [`Batch::batch_flags`]
	pub flags: u8,
	pub priority_plane: i8,
	pub shader_id: u16,
	pub skin_section_index: u16,
	pub geoset_index: u16,
	pub color_index: u16,
	pub material_index: u16,
	pub material_layer: u16,
	pub texture_count: u16,
	pub texture_combo_index: u16,
	pub texture_coord_combo_index: u16,
	pub texture_weight_combo_index: u16,
	pub texture_transform_combo_index: u16,
}

impl Batch {
	/// Known flags; unknown bits are dropped
	pub fn batch_flags(&self) -> BatchFlags {
		BatchFlags::from_bits_truncate(self.flags)
	}
}

impl Record for Batch {
	const SIZE: usize = 24;

	fn read<R>(buf: &mut R) -> Result<Self>
	where
		R: Read + ?Sized,
	{
		Ok(Batch {
			flags: buf.read_u8()?,
			priority_plane: buf.read_i8()?,
			shader_id: buf.read_u16::<LE>()?,
			skin_section_index: buf.read_u16::<LE>()?,
			geoset_index: buf.read_u16::<LE>()?,
			color_index: buf.read_u16::<LE>()?,
			material_index: buf.read_u16::<LE>()?,
			material_layer: buf.read_u16::<LE>()?,
			texture_count: buf.read_u16::<LE>()?,
			texture_combo_index: buf.read_u16::<LE>()?,
			texture_coord_combo_index: buf.read_u16::<LE>()?,
			texture_weight_combo_index: buf.read_u16::<LE>()?,
			texture_transform_combo_index: buf.read_u16::<LE>()?,
		})
	}

	fn write<W>(&self, buf: &mut W) -> Result<()>
	where
		W: Write + ?Sized,
	{
		buf.write_u8(self.flags)?;
		buf.write_i8(self.priority_plane)?;
		for v in [self.shader_id, self.skin_section_index, self.geoset_index, self.color_index,
			self.material_index, self.material_layer, self.texture_count, self.texture_combo_index,
			self.texture_coord_combo_index, self.texture_weight_combo_index,
			self.texture_transform_combo_index]
		{
			buf.write_u16::<LE>(v)?;
		}

		Ok(())
	}
}

/// Per-submesh shadow rendering hints
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShadowBatch {
	pub flags: u8,
	pub flags2: u8,
	pub unknown_2: u16,
	pub submesh_id: u16,
	pub texture_id: u16,
	pub color_id: u16,
	pub transparency_id: u16,
}

impl Record for ShadowBatch {
	const SIZE: usize = 12;

	fn read<R>(buf: &mut R) -> Result<Self>
	where
		R: Read + ?Sized,
	{
		Ok(ShadowBatch {
			flags: buf.read_u8()?,
			flags2: buf.read_u8()?,
			unknown_2: buf.read_u16::<LE>()?,
			submesh_id: buf.read_u16::<LE>()?,
			texture_id: buf.read_u16::<LE>()?,
			color_id: buf.read_u16::<LE>()?,
			transparency_id: buf.read_u16::<LE>()?,
		})
	}

	fn write<W>(&self, buf: &mut W) -> Result<()>
	where
		W: Write + ?Sized,
	{
		buf.write_u8(self.flags)?;
		buf.write_u8(self.flags2)?;
		for v in [self.unknown_2, self.submesh_id, self.texture_id, self.color_id, self.transparency_id] {
			buf.write_u16::<LE>(v)?;
		}

		Ok(())
	}
}
