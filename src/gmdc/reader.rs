use std::io::Cursor;

use binrw::{BinRead, Endian};
use cgmath::{Quaternion, Vector2, Vector3};

use crate::{
    error::{GmdcError, Result},
    math::{GmQuaternion, GmVector2, GmVector3},
};

/// Forward-only little-endian cursor over an in-memory buffer.
///
/// Fixed-size reads check the remaining length first, so a failed one leaves
/// the cursor where it was and reports `TruncatedInput`. `read_string` may
/// already have consumed its length prefix when the body turns out short.
pub struct BinaryReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> BinaryReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    pub fn len(&self) -> usize {
        self.cursor.get_ref().len()
    }

    pub fn remaining(&self) -> usize {
        self.len().saturating_sub(self.position() as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Capacity to reserve for `count` elements of at least `min_size` bytes
    /// each, capped by what the buffer could actually hold.
    pub fn capacity_for(&self, count: u32, min_size: usize) -> usize {
        (count as usize).min(self.remaining() / min_size.max(1))
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        let available = self.remaining();
        if available < needed {
            return Err(GmdcError::TruncatedInput {
                offset: self.position(),
                needed,
                available,
            });
        }
        Ok(())
    }

    /// Read a fixed-size binrw type occupying exactly `size` bytes.
    pub fn read_struct<T>(&mut self, size: usize) -> Result<T>
    where
        T: for<'b> BinRead<Args<'b> = ()>,
    {
        self.ensure(size)?;
        let offset = self.position();
        T::read_options(&mut self.cursor, Endian::Little, ())
            .map_err(|err| GmdcError::from_binrw(err, offset))
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.read_struct(1)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.read_struct(2)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_struct(4)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.read_struct(4)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        self.read_struct(4)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.ensure(len)?;
        let data: &'a [u8] = *self.cursor.get_ref();
        let start = self.position() as usize;
        let end = start + len;
        self.cursor.set_position(end as u64);
        Ok(&data[start..end])
    }

    /// String prefixed by a 7-bit encoded byte length.
    pub fn read_string(&mut self) -> Result<String> {
        let offset = self.position();
        let mut len = 0usize;
        let mut shift = 0u32;
        loop {
            let byte = self.read_u8()?;
            len |= ((byte & 0x7F) as usize) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
            if shift >= 35 {
                return Err(GmdcError::InvalidString { offset });
            }
        }

        let bytes = self.read_bytes(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| GmdcError::InvalidString { offset })
    }

    pub fn read_vector2(&mut self) -> Result<Vector2<f32>> {
        Ok(self.read_struct::<GmVector2>(8)?.0)
    }

    pub fn read_vector3(&mut self) -> Result<Vector3<f32>> {
        Ok(self.read_struct::<GmVector3>(12)?.0)
    }

    /// Quaternion stored `w, x, y, z`.
    pub fn read_quaternion(&mut self) -> Result<Quaternion<f32>> {
        Ok(self.read_struct::<GmQuaternion>(16)?.0)
    }
}
