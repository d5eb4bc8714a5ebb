use crate::octree::{NodeId, ParseNodeIdError};
use crate::resource::{join_url, ResourceError, ResourceLoader};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet, VecDeque};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, span, trace, warn, Instrument, Level};

/// Directory of hierarchy pages, relative to the dataset root.
pub const HIERARCHY_DIR: &str = "ept-hierarchy";

#[derive(Error, Debug)]
pub enum HierarchyError {
    #[error("Failed to fetch hierarchy page {page}: {source}")]
    Resource {
        page: NodeId,
        #[source]
        source: ResourceError,
    },

    #[error("Invalid hierarchy page {page}: {reason}")]
    InvalidPage { page: NodeId, reason: String },

    #[error("Invalid node id in page {page}: {source}")]
    InvalidNodeId {
        page: NodeId,
        #[source]
        source: ParseNodeIdError,
    },

    #[error("Hierarchy page {0} is referenced more than once")]
    CyclicHierarchy(NodeId),

    #[error("Hierarchy exceeds {limit} pages")]
    HierarchyTooLarge { limit: usize },

    #[error("Hierarchy load cancelled")]
    Cancelled,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HierarchyConfig {
    /// Upper bound on fetched pages; `None` disables the check.
    pub max_pages: Option<usize>,
    /// Pages fetched at once from the front of the queue.
    pub concurrent_fetches: usize,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            max_pages: Some(1_000_000),
            concurrent_fetches: 1,
        }
    }
}

/// Source of raw hierarchy page documents, one per page id.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, page: &NodeId) -> Result<Bytes, ResourceError>;
}

/// Reads `<base>/ept-hierarchy/<page>.json` through a [`ResourceLoader`].
#[derive(Clone, Debug)]
pub struct ResourcePageFetcher {
    loader: ResourceLoader,
    base_url: String,
}

impl ResourcePageFetcher {
    pub fn new(loader: ResourceLoader, base_url: impl Into<String>) -> Self {
        Self {
            loader,
            base_url: base_url.into(),
        }
    }

    pub fn page_url(&self, page: &NodeId) -> String {
        join_url(&self.base_url, &format!("{HIERARCHY_DIR}/{page}.json"))
    }
}

#[async_trait]
impl PageFetcher for ResourcePageFetcher {
    async fn fetch_page(&self, page: &NodeId) -> Result<Bytes, ResourceError> {
        self.loader.get(&self.page_url(page)).await
    }
}

/// Point count of every node that holds data. Absent nodes do not exist.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Hierarchy {
    nodes: BTreeMap<NodeId, u64>,
}

impl Hierarchy {
    pub fn get(&self, id: &NodeId) -> Option<u64> {
        self.nodes.get(id).copied()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in `(depth, x, y, z)` order.
    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &u64)> {
        self.nodes.iter()
    }

    /// Sum of all node counts, saturating at `u64::MAX`.
    pub fn total_points(&self) -> u64 {
        self.nodes
            .values()
            .fold(0u64, |total, count| total.saturating_add(*count))
    }

    pub fn max_depth(&self) -> Option<u32> {
        self.nodes.keys().map(|id| id.depth).max()
    }

    pub fn children_of<'a>(&'a self, id: &NodeId) -> impl Iterator<Item = NodeId> + 'a {
        let id = *id;
        (0..8)
            .filter_map(move |index| id.child(index))
            .filter(move |child| self.nodes.contains_key(child))
    }
}

impl FromIterator<(NodeId, u64)> for Hierarchy {
    fn from_iter<T: IntoIterator<Item = (NodeId, u64)>>(iter: T) -> Self {
        Self {
            nodes: iter.into_iter().collect(),
        }
    }
}

/// Breadth first walk over the paged hierarchy starting at `root`.
///
/// Negative counts are forward references: the page of the same name is
/// queued and fetched later. Any fetch or parse failure aborts the whole
/// load, a partial map is never returned.
pub async fn load_hierarchy<F: PageFetcher + ?Sized>(
    root: NodeId,
    fetcher: &F,
    config: &HierarchyConfig,
    cancel: &CancellationToken,
) -> Result<Hierarchy, HierarchyError> {
    let span = span!(Level::DEBUG, "load_hierarchy", %root);
    load_pages(root, fetcher, config, cancel)
        .instrument(span)
        .await
}

async fn load_pages<F: PageFetcher + ?Sized>(
    root: NodeId,
    fetcher: &F,
    config: &HierarchyConfig,
    cancel: &CancellationToken,
) -> Result<Hierarchy, HierarchyError> {
    let concurrency = config.concurrent_fetches.max(1);
    let mut queue = VecDeque::from([root]);
    let mut seen = HashSet::from([root]);
    let mut nodes = BTreeMap::new();
    let mut fetched = 0usize;

    while !queue.is_empty() {
        if cancel.is_cancelled() {
            debug!(fetched, "hierarchy load cancelled");
            return Err(HierarchyError::Cancelled);
        }

        let take = concurrency.min(queue.len());
        let batch: Vec<NodeId> = queue.drain(..take).collect();
        if let Some(limit) = config.max_pages {
            if fetched + batch.len() > limit {
                return Err(HierarchyError::HierarchyTooLarge { limit });
            }
        }
        fetched += batch.len();

        let pages: Vec<(NodeId, Result<Bytes, ResourceError>)> = stream::iter(batch)
            .map(move |page| async move { (page, fetcher.fetch_page(&page).await) })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        for (page, result) in pages {
            let bytes = result.map_err(|source| HierarchyError::Resource { page, source })?;
            let entries: BTreeMap<String, i64> =
                serde_json::from_slice(&bytes).map_err(|error| HierarchyError::InvalidPage {
                    page,
                    reason: error.to_string(),
                })?;
            trace!(%page, entries = entries.len(), "hierarchy page");

            for (key, count) in entries {
                let id: NodeId = key
                    .parse()
                    .map_err(|source| HierarchyError::InvalidNodeId { page, source })?;

                if count < 0 {
                    if !seen.insert(id) {
                        return Err(HierarchyError::CyclicHierarchy(id));
                    }
                    debug!(%page, child_page = %id, "forward reference");
                    queue.push_back(id);
                } else if let Some(previous) = nodes.insert(id, count as u64) {
                    if previous != count as u64 {
                        warn!(%id, previous, count, "node listed twice with different counts");
                    }
                }
            }
        }
    }

    let hierarchy = Hierarchy { nodes };
    info!(
        pages = fetched,
        nodes = hierarchy.len(),
        points = hierarchy.total_points(),
        "hierarchy loaded"
    );
    Ok(hierarchy)
}
