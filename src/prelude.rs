pub use crate::resource::{ResourceClient, ResourceLoader};
pub use crate::point_cloud::{LoadOptions, PointCloudIndex};
pub use crate::decoder::{BinaryDecoder, Encoding, NodeDecoder};
pub use crate::octree::aabb::{Aabb, ConformingExtent};
pub use crate::octree::point_attributes::{AttributeDataType, AttributeSchema};
pub use crate::octree::snapshot::OctreeNodeSnapshot;
pub use crate::octree::statistics::{StatisticKind, StatisticValue};
pub use crate::octree::NodeId;
pub use crate::point::RawPointBlock;

// Error types
pub use crate::point_cloud::LoadError;
pub use crate::point_cloud::QueryError;
pub use crate::point_cloud::FetchError;
pub use crate::metadata::ManifestError;
pub use crate::hierarchy::HierarchyError;
