use super::NodeId;
use glam::{DVec2, DVec3};

/// Axis aligned box. Used for the octree root cube (stored units) and the
/// cubes of individual nodes.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    /// From `[xmin, ymin, zmin, xmax, ymax, zmax]`.
    pub fn from_array(values: [f64; 6]) -> Self {
        Self {
            min: DVec3::new(values[0], values[1], values[2]),
            max: DVec3::new(values[3], values[4], values[5]),
        }
    }

    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// True when every edge matches the longest one within `tolerance`,
    /// relative to that edge.
    pub fn is_cube(&self, tolerance: f64) -> bool {
        let size = self.size();
        let longest = size.max_element();
        if longest == 0.0 {
            return true;
        }
        (longest - size.min_element()) / longest <= tolerance
    }

    pub fn contains(&self, point: DVec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    pub fn volume(&self) -> f64 {
        let size = self.size();
        size.x * size.y * size.z
    }

    /// Cube of `id` inside this root cube.
    pub fn node_bounds(&self, id: &NodeId) -> Aabb {
        let cells = (id.depth as f64).exp2();
        let step = self.size() / cells;
        let min = self.min + step * DVec3::new(id.x as f64, id.y as f64, id.z as f64);
        Aabb::new(min, min + step)
    }
}

/// Real world extent of the data: 2D rectangle plus a z range.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ConformingExtent {
    pub min: DVec2,
    pub max: DVec2,
    pub z_min: f64,
    pub z_max: f64,
}

impl ConformingExtent {
    pub fn from_array(values: [f64; 6]) -> Self {
        Self {
            min: DVec2::new(values[0], values[1]),
            max: DVec2::new(values[3], values[4]),
            z_min: values[2],
            z_max: values[5],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Octant `index` of `parent`, split at its center.
    fn octant(parent: &Aabb, index: usize) -> Aabb {
        let center = parent.center();
        let upper = |bit: usize| index & bit != 0;
        let pick = |bit, low: f64, mid: f64, high: f64| {
            if upper(bit) {
                (mid, high)
            } else {
                (low, mid)
            }
        };
        let (x0, x1) = pick(4, parent.min.x, center.x, parent.max.x);
        let (y0, y1) = pick(2, parent.min.y, center.y, parent.max.y);
        let (z0, z1) = pick(1, parent.min.z, center.z, parent.max.z);
        Aabb::new(DVec3::new(x0, y0, z0), DVec3::new(x1, y1, z1))
    }

    fn root() -> Aabb {
        Aabb::from_array([-64.0, 0.0, 10.0, 64.0, 128.0, 138.0])
    }

    #[test]
    fn node_bounds_of_root_is_root() {
        assert_eq!(root().node_bounds(&NodeId::ROOT), root());
    }

    #[test]
    fn node_bounds_match_octants() {
        let root = root();
        for (index, child) in NodeId::ROOT.children().enumerate() {
            assert_eq!(root.node_bounds(&child), octant(&root, index));
        }
    }

    #[test]
    fn detects_non_cube() {
        assert!(root().is_cube(1e-9));
        let flat = Aabb::from_array([0.0, 0.0, 0.0, 10.0, 10.0, 5.0]);
        assert!(!flat.is_cube(1e-3));
        assert!(flat.is_cube(0.5));
    }

    #[test]
    fn conforming_extent_layout() {
        let extent = ConformingExtent::from_array([10.0, 20.0, 0.0, 138.0, 148.0, 5.0]);
        assert_eq!(extent.min, DVec2::new(10.0, 20.0));
        assert_eq!(extent.max, DVec2::new(138.0, 148.0));
        assert_eq!((extent.z_min, extent.z_max), (0.0, 5.0));
    }

    proptest! {
        #[test]
        fn prop_children_partition_parent(
            depth in 0u32..12,
            seed in any::<(u32, u32, u32)>(),
        ) {
            let cells = 1u32 << depth;
            let parent = NodeId { depth, x: seed.0 % cells, y: seed.1 % cells, z: seed.2 % cells };
            let root = Aabb::from_array([0.0, 0.0, 0.0, 4096.0, 4096.0, 4096.0]);
            let parent_box = root.node_bounds(&parent);

            let children: Vec<Aabb> = parent.children().map(|c| root.node_bounds(&c)).collect();
            let volume: f64 = children.iter().map(Aabb::volume).sum();
            prop_assert!((volume - parent_box.volume()).abs() <= parent_box.volume() * 1e-12);

            for (index, child) in children.iter().enumerate() {
                prop_assert_eq!(*child, octant(&parent_box, index));
                prop_assert!(parent_box.contains(child.min) && parent_box.contains(child.max));
                prop_assert!(child.contains(child.center()));
                for other in &children[index + 1..] {
                    let overlap = child.min.max(other.min);
                    let limit = child.max.min(other.max);
                    // shared faces only, no shared volume
                    prop_assert!((limit - overlap).min_element() <= 0.0);
                }
            }
        }
    }
}
