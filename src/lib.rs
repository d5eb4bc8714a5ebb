//! Reader for Entwine Point Tile (EPT) datasets.
//!
//! A dataset is an octree stored as one `ept.json` manifest, a paged node
//! hierarchy and one data file per node. [`PointCloudIndex`] parses the
//! manifest, walks every hierarchy page and then answers metadata queries
//! from memory; point data is fetched per node and handed to a
//! caller-chosen [`NodeDecoder`].

pub mod decoder;
pub mod hierarchy;
pub mod metadata;
pub mod octree;
pub mod point;
pub mod point_cloud;
pub mod prelude;
pub mod resource;

pub use decoder::{BinaryDecoder, DecodeError, Encoding, NodeDecoder, NodeRequest};
pub use hierarchy::{
    load_hierarchy, Hierarchy, HierarchyConfig, HierarchyError, PageFetcher, ResourcePageFetcher,
};
pub use metadata::{parse_manifest, CrsDefinition, Manifest, ManifestError, ScaleOffset};
pub use octree::NodeId;
pub use point::RawPointBlock;
pub use point_cloud::{FetchError, LoadError, LoadOptions, PointCloudIndex, QueryError};
