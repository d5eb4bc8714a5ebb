use crate::decoder::{DecodeError, Encoding, NodeDecoder, NodeRequest};
use crate::hierarchy::{load_hierarchy, Hierarchy, HierarchyConfig, HierarchyError, ResourcePageFetcher};
use crate::metadata::{parse_manifest, CrsDefinition, Manifest, ManifestError, ScaleOffset};
use crate::octree::aabb::{Aabb, ConformingExtent};
use crate::octree::point_attributes::AttributeSchema;
use crate::octree::snapshot::{snapshot, OctreeNodeSnapshot};
use crate::octree::statistics::{
    AttributeStatistics, ClassificationHistogram, StatisticKind, StatisticValue,
};
use crate::octree::NodeId;
use crate::point::RawPointBlock;
use crate::resource::{base_url, join_url, ResourceError, ResourceLoader};
use glam::DVec3;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, span, warn, Instrument, Level};

/// Directory of node data files, relative to the dataset root.
pub const DATA_DIR: &str = "ept-data";

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Error loading manifest: {0}")]
    Resource(#[from] ResourceError),

    #[error("Invalid manifest: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Error loading hierarchy: {0}")]
    Hierarchy(#[from] HierarchyError),

    #[error("Decoder handles `{decoder}` but the dataset is `{dataset}`")]
    DecoderMismatch { decoder: Encoding, dataset: Encoding },

    #[error("Point cloud is already loaded")]
    AlreadyLoaded,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Point cloud is not loaded")]
    NotLoaded,

    #[error("Node {0} does not exist")]
    NodeNotFound(NodeId),
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Point cloud is not loaded")]
    NotLoaded,

    #[error("Node {0} does not exist")]
    NodeNotFound(NodeId),

    #[error("Unknown attribute `{0}`")]
    UnknownAttribute(String),

    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoadOptions {
    pub hierarchy: HierarchyConfig,
    /// Relative edge length difference above which the root cube is
    /// reported as not cubic.
    pub cube_tolerance: f64,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            hierarchy: HierarchyConfig::default(),
            cube_tolerance: 1e-6,
        }
    }
}

struct LoadedIndex {
    manifest_url: String,
    base_url: String,
    manifest: Manifest,
    hierarchy: Hierarchy,
    decoder: Arc<dyn NodeDecoder>,
}

enum IndexState {
    Unloaded,
    Loaded(Box<LoadedIndex>),
}

/// Read-only index over one EPT dataset.
///
/// Starts unloaded; [`PointCloudIndex::load`] either fills everything or
/// leaves the index untouched. Queries never perform I/O, only
/// [`PointCloudIndex::fetch_node_data`] does.
pub struct PointCloudIndex {
    resource_loader: ResourceLoader,
    state: IndexState,
}

impl PointCloudIndex {
    pub fn new(resource_loader: ResourceLoader) -> Self {
        Self {
            resource_loader,
            state: IndexState::Unloaded,
        }
    }

    /// Opens the dataset whose manifest is at `url`, e.g.
    /// `file:///data/autzen/ept.json`. Pages and node files are resolved
    /// relative to it:
    ///  - Hierarchy: `<dir>/ept-hierarchy/<node>.json`
    ///  - Points: `<dir>/ept-data/<node>.<bin|laz|zst>`
    pub async fn from_url<D: NodeDecoder + 'static>(
        url: &str,
        resource_loader: ResourceLoader,
        decoder: D,
    ) -> Result<PointCloudIndex, LoadError> {
        let mut this = Self::new(resource_loader);
        this.load(url, decoder).await?;
        Ok(this)
    }

    pub async fn load<D: NodeDecoder + 'static>(
        &mut self,
        url: &str,
        decoder: D,
    ) -> Result<(), LoadError> {
        self.load_with(url, decoder, &LoadOptions::default(), &CancellationToken::new())
            .await
    }

    pub async fn load_with<D: NodeDecoder + 'static>(
        &mut self,
        url: &str,
        decoder: D,
        options: &LoadOptions,
        cancel: &CancellationToken,
    ) -> Result<(), LoadError> {
        if self.is_loaded() {
            return Err(LoadError::AlreadyLoaded);
        }

        let span = span!(Level::INFO, "load_point_cloud", url);
        let loaded = self
            .read_dataset(url, Arc::new(decoder), options, cancel)
            .instrument(span)
            .await?;
        self.state = IndexState::Loaded(Box::new(loaded));

        Ok(())
    }

    async fn read_dataset(
        &self,
        url: &str,
        decoder: Arc<dyn NodeDecoder>,
        options: &LoadOptions,
        cancel: &CancellationToken,
    ) -> Result<LoadedIndex, LoadError> {
        let bytes = self.resource_loader.get(url).await?;
        let manifest = parse_manifest(&bytes)?;

        if decoder.encoding() != manifest.encoding {
            return Err(LoadError::DecoderMismatch {
                decoder: decoder.encoding(),
                dataset: manifest.encoding,
            });
        }
        if !manifest.data_bounds.is_cube(options.cube_tolerance) {
            warn!(edges = ?manifest.root_edge_lengths(), "root bounds are not a cube");
        }
        debug!(
            encoding = %manifest.encoding,
            points = manifest.points,
            attributes = manifest.schema.len(),
            "manifest parsed"
        );

        let base_url = base_url(url).to_string();
        let fetcher = ResourcePageFetcher::new(self.resource_loader.clone(), base_url.clone());
        let hierarchy =
            load_hierarchy(NodeId::ROOT, &fetcher, &options.hierarchy, cancel).await?;

        let total = hierarchy.total_points();
        if total != manifest.points {
            warn!(
                manifest = manifest.points,
                hierarchy = total,
                "hierarchy point total differs from manifest"
            );
        }
        info!(nodes = hierarchy.len(), points = manifest.points, "point cloud loaded");

        Ok(LoadedIndex {
            manifest_url: url.to_string(),
            base_url,
            manifest,
            hierarchy,
            decoder,
        })
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, IndexState::Loaded(_))
    }

    fn loaded(&self) -> Result<&LoadedIndex, QueryError> {
        match &self.state {
            IndexState::Loaded(loaded) => Ok(loaded),
            IndexState::Unloaded => Err(QueryError::NotLoaded),
        }
    }

    fn manifest(&self) -> Result<&Manifest, QueryError> {
        self.loaded().map(|loaded| &loaded.manifest)
    }

    pub fn manifest_url(&self) -> Result<&str, QueryError> {
        self.loaded().map(|loaded| loaded.manifest_url.as_str())
    }

    /// Dataset directory, the base of page and node urls.
    pub fn base_url(&self) -> Result<&str, QueryError> {
        self.loaded().map(|loaded| loaded.base_url.as_str())
    }

    pub fn extent(&self) -> Result<ConformingExtent, QueryError> {
        Ok(self.manifest()?.extent)
    }

    pub fn crs(&self) -> Result<&CrsDefinition, QueryError> {
        Ok(&self.manifest()?.crs)
    }

    pub fn point_count(&self) -> Result<u64, QueryError> {
        Ok(self.manifest()?.points)
    }

    pub fn attributes(&self) -> Result<&AttributeSchema, QueryError> {
        Ok(&self.manifest()?.schema)
    }

    pub fn encoding(&self) -> Result<Encoding, QueryError> {
        Ok(self.manifest()?.encoding)
    }

    pub fn span(&self) -> Result<u64, QueryError> {
        Ok(self.manifest()?.span)
    }

    pub fn scale_offset(&self) -> Result<ScaleOffset, QueryError> {
        Ok(self.manifest()?.scale_offset)
    }

    /// Root cube in stored units.
    pub fn data_bounds(&self) -> Result<Aabb, QueryError> {
        Ok(self.manifest()?.data_bounds)
    }

    pub fn root_edge_lengths(&self) -> Result<DVec3, QueryError> {
        Ok(self.manifest()?.root_edge_lengths())
    }

    /// Cube of `id` in stored units. The node itself need not exist.
    pub fn node_bounds(&self, id: &NodeId) -> Result<Aabb, QueryError> {
        Ok(self.manifest()?.data_bounds.node_bounds(id))
    }

    /// Real world point spacing at `depth`: root edge / (span * 2^depth).
    pub fn resolution(&self, depth: u32) -> Result<f64, QueryError> {
        let manifest = self.manifest()?;
        let edge = manifest.root_bounds.size().max_element();
        Ok(edge / (manifest.span as f64 * (depth as f64).exp2()))
    }

    pub fn hierarchy(&self) -> Result<&Hierarchy, QueryError> {
        self.loaded().map(|loaded| &loaded.hierarchy)
    }

    /// Absence is not an error: the region simply holds no data.
    pub fn has_node(&self, id: &NodeId) -> Result<bool, QueryError> {
        Ok(self.hierarchy()?.contains(id))
    }

    pub fn node_point_count(&self, id: &NodeId) -> Result<Option<u64>, QueryError> {
        Ok(self.hierarchy()?.get(id))
    }

    pub fn hierarchy_snapshot(&self) -> Result<Vec<OctreeNodeSnapshot>, QueryError> {
        let loaded = self.loaded()?;
        Ok(snapshot(&loaded.hierarchy, &loaded.manifest.data_bounds))
    }

    pub fn statistics(&self, attribute: &str) -> Result<Option<&AttributeStatistics>, QueryError> {
        Ok(self.manifest()?.statistics.get(attribute))
    }

    /// `None` both for unknown attributes and for statistics the dataset
    /// does not provide.
    pub fn metadata_statistic(
        &self,
        attribute: &str,
        kind: StatisticKind,
    ) -> Result<Option<StatisticValue>, QueryError> {
        Ok(self
            .statistics(attribute)?
            .and_then(|statistics| statistics.get(kind)))
    }

    pub fn class_histogram(
        &self,
        attribute: &str,
    ) -> Result<Option<&ClassificationHistogram>, QueryError> {
        Ok(self.manifest()?.histograms.get(attribute))
    }

    /// Sorted class values seen for `attribute`, empty without a histogram.
    pub fn metadata_classes(&self, attribute: &str) -> Result<Vec<i64>, QueryError> {
        Ok(self
            .class_histogram(attribute)?
            .map(|histogram| histogram.keys().copied().collect())
            .unwrap_or_default())
    }

    pub fn metadata_class_count(
        &self,
        attribute: &str,
        class: i64,
    ) -> Result<Option<i64>, QueryError> {
        Ok(self
            .class_histogram(attribute)?
            .and_then(|histogram| histogram.get(&class).copied()))
    }

    /// Url of the data file of `id`.
    pub fn node_url(&self, id: &NodeId) -> Result<String, QueryError> {
        let loaded = self.loaded()?;
        let extension = loaded.manifest.encoding.extension();
        Ok(join_url(
            &loaded.base_url,
            &format!("{DATA_DIR}/{id}.{extension}"),
        ))
    }

    /// Fetches and decodes `attributes` of node `id`, in the requested order.
    ///
    /// Nodes missing from the hierarchy fail with `NodeNotFound` before any
    /// I/O. Failures only concern this node; the index stays usable.
    pub async fn fetch_node_data<S: AsRef<str>>(
        &self,
        id: &NodeId,
        attributes: &[S],
    ) -> Result<RawPointBlock, FetchError> {
        let loaded = self.loaded().map_err(|_| FetchError::NotLoaded)?;
        let requested = loaded
            .manifest
            .schema
            .subset(attributes)
            .map_err(FetchError::UnknownAttribute)?;

        self.fetch_node(loaded, id, &requested).await
    }

    /// Same as [`PointCloudIndex::fetch_node_data`] with the full schema.
    pub async fn fetch_all_node_data(&self, id: &NodeId) -> Result<RawPointBlock, FetchError> {
        let loaded = self.loaded().map_err(|_| FetchError::NotLoaded)?;
        self.fetch_node(loaded, id, &loaded.manifest.schema).await
    }

    async fn fetch_node(
        &self,
        loaded: &LoadedIndex,
        id: &NodeId,
        requested: &AttributeSchema,
    ) -> Result<RawPointBlock, FetchError> {
        let point_count = loaded
            .hierarchy
            .get(id)
            .ok_or(FetchError::NodeNotFound(*id))?;
        let url = self.node_url(id).map_err(|_| FetchError::NotLoaded)?;

        debug!(node = %id, point_count, %url, "fetching node data");
        let data = self.resource_loader.get(&url).await?;

        let block = loaded.decoder.decode(NodeRequest {
            id: *id,
            point_count,
            data,
            schema: &loaded.manifest.schema,
            requested,
            scale_offset: loaded.manifest.scale_offset,
        })?;
        Ok(block)
    }
}

impl fmt::Debug for PointCloudIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("PointCloudIndex");
        debug.field("resource_loader", &self.resource_loader);
        match &self.state {
            IndexState::Unloaded => debug.field("state", &"unloaded"),
            IndexState::Loaded(loaded) => debug
                .field("manifest_url", &loaded.manifest_url)
                .field("encoding", &loaded.manifest.encoding)
                .field("nodes", &loaded.hierarchy.len()),
        };
        debug.finish()
    }
}
