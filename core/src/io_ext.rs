use std::io::{
	Read,
	Result,
	Write
};

use ultraviolet::vec::Vec3;

use crate::{
	Truncated,
	window
};

/// A little endian binary record of constant width
pub trait Record: Sized {
	/// Encoded width in bytes
	const SIZE: usize;

	fn read<R>(buf: &mut R) -> Result<Self>
	where
		R: Read + ?Sized;

	fn write<W>(&self, buf: &mut W) -> Result<()>
	where
		W: Write + ?Sized;
}

macro_rules! impl_record {
	($($t: ty),*) => {$(
		impl Record for $t {
			const SIZE: usize = std::mem::size_of::<$t>();

			#[inline]
			fn read<R>(buf: &mut R) -> Result<Self>
			where
				R: Read + ?Sized,
			{
				let mut b = [0; std::mem::size_of::<$t>()];
				buf.read_exact(&mut b)?;
				Ok(<$t>::from_le_bytes(b))
			}

			#[inline]
			fn write<W>(&self, buf: &mut W) -> Result<()>
			where
				W: Write + ?Sized,
			{
				buf.write_all(&self.to_le_bytes())
			}
		}
	)*}
}

impl_record!(u8, i8, u16, i16, u32, i32, f32);

impl<T, const N: usize> Record for [T; N]
where
	T: Record + Copy + Default,
{
	const SIZE: usize = T::SIZE * N;

	fn read<R>(buf: &mut R) -> Result<Self>
	where
		R: Read + ?Sized,
	{
		let mut out = [T::default(); N];
		for v in out.iter_mut() {
			*v = T::read(buf)?;
		}

		Ok(out)
	}

	fn write<W>(&self, buf: &mut W) -> Result<()>
	where
		W: Write + ?Sized,
	{
		self.iter().try_for_each(|v| v.write(buf))
	}
}

impl Record for Vec3 {
	const SIZE: usize = 12;

	fn read<R>(buf: &mut R) -> Result<Self>
	where
		R: Read + ?Sized,
	{
		buf.read_vec3_le()
	}

	fn write<W>(&self, buf: &mut W) -> Result<()>
	where
		W: Write + ?Sized,
	{
		buf.write_vec3_le(*self)
	}
}

pub trait ReadBinExt: Read {
	/// Reads a little endian 3D vector
	#[inline]
	fn read_vec3_le(&mut self) -> Result<Vec3> {
		let mut x = [0; 4];
		let mut y = x;
		let mut z = y;

		self.read_exact(&mut x)?;
		self.read_exact(&mut y)?;
		self.read_exact(&mut z)?;

		Ok(Vec3::new(f32::from_le_bytes(x), f32::from_le_bytes(y), f32::from_le_bytes(z)))
	}

	/// Reads `count` consecutive records
	fn read_records<T>(&mut self, count: usize) -> Result<Vec<T>>
	where
		T: Record,
	{
		let mut out = Vec::with_capacity(count);
		for _ in 0..count {
			out.push(T::read(self)?);
		}

		Ok(out)
	}
}

impl<R> ReadBinExt for R
where
	R: Read + ?Sized,
{
}

pub trait WriteBinExt: Write {
	/// Writes a little endian 3D vector
	#[inline]
	fn write_vec3_le(&mut self, v: Vec3) -> Result<()> {
		self.write_all(&v.x.to_le_bytes())?;
		self.write_all(&v.y.to_le_bytes())?;
		self.write_all(&v.z.to_le_bytes())
	}

	/// Writes every record in order, without padding
	fn write_records<T>(&mut self, records: &[T]) -> Result<()>
	where
		T: Record,
	{
		records.iter().try_for_each(|r| r.write(self))
	}
}

impl<W> WriteBinExt for W
where
	W: Write + ?Sized,
{
}

/// Reads `count` records starting `offset` bytes into `file`.
///
/// Empty arrays never touch `file`, so their offset may point anywhere.
pub fn records_at<T>(file: &[u8], offset: u32, count: usize) -> std::result::Result<Vec<T>, Truncated>
where
	T: Record,
{
	if count == 0 {
		return Ok(vec![]);
	}

	let offset = offset as usize;
	let needed = count.checked_mul(T::SIZE).ok_or(Truncated {
		offset,
		needed: usize::MAX,
		available: file.len(),
	})?;
	let mut data = window(file, offset, needed)?;

	// only fails if a record reads more than its declared width
	data.read_records(count).map_err(|_| Truncated {
		offset,
		needed,
		available: file.len(),
	})
}
