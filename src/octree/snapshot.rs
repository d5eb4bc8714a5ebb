use crate::hierarchy::Hierarchy;
use crate::octree::aabb::Aabb;
use crate::octree::NodeId;

/// Copy of one loaded node, detached from the index.
#[derive(Clone, Debug, PartialEq)]
pub struct OctreeNodeSnapshot {
    pub id: NodeId,
    pub point_count: u64,
    /// Node cube in stored units.
    pub bounding_box: Aabb,
    /// Which of the eight children exist, bit `i` for octant `i`.
    pub child_mask: u8,
}

impl OctreeNodeSnapshot {
    pub fn is_leaf(&self) -> bool {
        self.child_mask == 0
    }
}

/// Every node of `hierarchy` in `(depth, x, y, z)` order.
pub fn snapshot(hierarchy: &Hierarchy, root_bounds: &Aabb) -> Vec<OctreeNodeSnapshot> {
    hierarchy
        .iter()
        .map(|(id, count)| {
            let child_mask = hierarchy
                .children_of(id)
                .filter_map(|child| child.child_index())
                .fold(0u8, |mask, index| mask | (1 << index));
            OctreeNodeSnapshot {
                id: *id,
                point_count: *count,
                bounding_box: root_bounds.node_bounds(id),
                child_mask,
            }
        })
        .collect()
}

pub struct SnapshotIter<'a> {
    nodes: &'a [OctreeNodeSnapshot],
    depth: u32,
    position: usize,
}

impl<'a> Iterator for SnapshotIter<'a> {
    type Item = &'a OctreeNodeSnapshot;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.nodes.get(self.position) {
            self.position += 1;
            if node.id.depth == self.depth {
                return Some(node);
            }
            if node.id.depth > self.depth {
                return None;
            }
        }
        None
    }
}

/// Nodes of one depth from a snapshot sorted by [`snapshot`].
pub fn at_depth(nodes: &[OctreeNodeSnapshot], depth: u32) -> SnapshotIter<'_> {
    let position = nodes.partition_point(|node| node.id.depth < depth);
    SnapshotIter {
        nodes,
        depth,
        position,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> NodeId {
        s.parse().unwrap()
    }

    #[test]
    fn snapshot_records_children_and_bounds() {
        let hierarchy: Hierarchy = [
            (id("0-0-0-0"), 10),
            (id("1-0-0-0"), 4),
            (id("1-1-1-1"), 3),
            (id("2-3-3-3"), 1),
        ]
        .into_iter()
        .collect();
        let root = Aabb::from_array([0.0, 0.0, 0.0, 8.0, 8.0, 8.0]);

        let nodes = snapshot(&hierarchy, &root);
        assert_eq!(nodes.len(), 4);
        assert_eq!(nodes[0].id, NodeId::ROOT);
        assert_eq!(nodes[0].child_mask, 0b1000_0001);
        assert!(nodes[1].is_leaf());
        assert_eq!(nodes[2].child_mask, 0b1000_0000);
        assert_eq!(nodes[3].bounding_box, Aabb::from_array([6.0, 6.0, 6.0, 8.0, 8.0, 8.0]));

        let depth_one: Vec<NodeId> = at_depth(&nodes, 1).map(|n| n.id).collect();
        assert_eq!(depth_one, [id("1-0-0-0"), id("1-1-1-1")]);
        assert_eq!(at_depth(&nodes, 5).count(), 0);
    }
}
