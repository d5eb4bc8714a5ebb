use crate::metadata::ScaleOffset;
use crate::octree::point_attributes::AttributeSchema;
use crate::octree::NodeId;
use crate::point::RawPointBlock;
use bytes::{Bytes, BytesMut};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Point data encodings a dataset may declare in `dataType`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Encoding {
    Binary,
    Laszip,
    Zstandard,
}

impl Encoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::Laszip => "laszip",
            Self::Zstandard => "zstandard",
        }
    }

    /// Suffix of node data files under `ept-data/`.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Binary => "bin",
            Self::Laszip => "laz",
            Self::Zstandard => "zst",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown encoding `{0}`")]
pub struct UnknownEncoding(pub String);

impl FromStr for Encoding {
    type Err = UnknownEncoding;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "binary" => Ok(Self::Binary),
            "laszip" => Ok(Self::Laszip),
            "zstandard" => Ok(Self::Zstandard),
            other => Err(UnknownEncoding(other.to_string())),
        }
    }
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Node {id} holds {actual} bytes, expected {expected}")]
    Truncated {
        id: NodeId,
        expected: usize,
        actual: usize,
    },

    #[error("Decoder does not handle `{0}` data")]
    Unsupported(Encoding),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Everything a decoder gets for one node.
#[derive(Clone, Debug)]
pub struct NodeRequest<'a> {
    pub id: NodeId,
    pub point_count: u64,
    pub data: Bytes,
    /// Full record layout declared by the manifest.
    pub schema: &'a AttributeSchema,
    /// Attributes the caller wants back, in output order.
    pub requested: &'a AttributeSchema,
    pub scale_offset: ScaleOffset,
}

/// Turns the raw bytes of one node into point records.
///
/// Decoders are chosen by the caller for a dataset's [`Encoding`] and handed
/// to the index explicitly; there is no global registry.
pub trait NodeDecoder: Send + Sync {
    fn encoding(&self) -> Encoding;

    fn decode(&self, request: NodeRequest<'_>) -> Result<RawPointBlock, DecodeError>;
}

impl<D: NodeDecoder + ?Sized> NodeDecoder for std::sync::Arc<D> {
    fn encoding(&self) -> Encoding {
        (**self).encoding()
    }

    fn decode(&self, request: NodeRequest<'_>) -> Result<RawPointBlock, DecodeError> {
        (**self).decode(request)
    }
}

/// Decoder for `binary` datasets: packed little-endian records in schema
/// order, no compression.
#[derive(Clone, Copy, Debug, Default)]
pub struct BinaryDecoder;

impl NodeDecoder for BinaryDecoder {
    fn encoding(&self) -> Encoding {
        Encoding::Binary
    }

    fn decode(&self, request: NodeRequest<'_>) -> Result<RawPointBlock, DecodeError> {
        let record_size = request.schema.record_size();
        let point_count = usize::try_from(request.point_count)
            .map_err(|_| DecodeError::Codec(format!("node {} point count too large", request.id)))?;
        let expected = record_size.checked_mul(point_count).ok_or_else(|| {
            DecodeError::Codec(format!("node {} size overflows", request.id))
        })?;
        if request.data.len() != expected {
            return Err(DecodeError::Truncated {
                id: request.id,
                expected,
                actual: request.data.len(),
            });
        }

        if request.requested == request.schema {
            return Ok(RawPointBlock::new(
                request.requested.clone(),
                point_count,
                request.data,
                request.scale_offset,
            ));
        }

        // (source offset, size) per requested attribute
        let mut fields = Vec::with_capacity(request.requested.len());
        for attribute in request.requested {
            let offset = request
                .schema
                .offset_of(&attribute.name)
                .ok_or_else(|| DecodeError::Codec(format!("unknown attribute {}", attribute.name)))?;
            fields.push((offset, attribute.size_bytes()));
        }

        let mut out = BytesMut::with_capacity(request.requested.record_size() * point_count);
        for record in request.data.chunks_exact(record_size.max(1)).take(point_count) {
            for &(offset, size) in &fields {
                out.extend_from_slice(&record[offset..offset + size]);
            }
        }

        Ok(RawPointBlock::new(
            request.requested.clone(),
            point_count,
            out.freeze(),
            request.scale_offset,
        ))
    }
}
