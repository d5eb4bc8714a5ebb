use crate::metadata::ScaleOffset;
use crate::octree::point_attributes::{AttributeDataType, AttributeSchema};
use byteorder::{ByteOrder, LittleEndian};
use bytes::Bytes;
use glam::DVec3;

/// Packed little-endian records of one node, laid out by `schema`.
#[derive(Clone, Debug)]
pub struct RawPointBlock {
    schema: AttributeSchema,
    point_count: usize,
    data: Bytes,
    scale_offset: ScaleOffset,
}

impl RawPointBlock {
    pub fn new(
        schema: AttributeSchema,
        point_count: usize,
        data: Bytes,
        scale_offset: ScaleOffset,
    ) -> Self {
        Self {
            schema,
            point_count,
            data,
            scale_offset,
        }
    }

    pub fn schema(&self) -> &AttributeSchema {
        &self.schema
    }

    pub fn point_count(&self) -> usize {
        self.point_count
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn record(&self, point: usize) -> Option<&[u8]> {
        let size = self.schema.record_size();
        if point >= self.point_count {
            return None;
        }
        self.data.get(point * size..(point + 1) * size)
    }

    /// Stored value of `attribute` for `point`, widened to `f64`.
    pub fn value(&self, point: usize, attribute: &str) -> Option<f64> {
        let data_type = self.schema.get(attribute)?.data_type;
        let offset = self.schema.offset_of(attribute)?;
        let record = self.record(point)?;
        let bytes = record.get(offset..offset + data_type.size_bytes())?;

        Some(match data_type {
            AttributeDataType::Int8 => bytes[0] as i8 as f64,
            AttributeDataType::UInt16 => LittleEndian::read_u16(bytes) as f64,
            AttributeDataType::Int16 => LittleEndian::read_i16(bytes) as f64,
            AttributeDataType::UInt32 => LittleEndian::read_u32(bytes) as f64,
            AttributeDataType::Int32 => LittleEndian::read_i32(bytes) as f64,
            AttributeDataType::Float32 => LittleEndian::read_f32(bytes) as f64,
            AttributeDataType::Float64 => LittleEndian::read_f64(bytes),
        })
    }

    /// Real world position of `point`; needs X, Y and Z in the block.
    pub fn position(&self, point: usize) -> Option<DVec3> {
        let stored = DVec3::new(
            self.value(point, "X")?,
            self.value(point, "Y")?,
            self.value(point, "Z")?,
        );
        Some(self.scale_offset.to_real(stored))
    }

    pub fn positions(&self) -> impl Iterator<Item = DVec3> + '_ {
        (0..self.point_count).filter_map(move |point| self.position(point))
    }
}
