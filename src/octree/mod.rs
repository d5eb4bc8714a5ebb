pub mod aabb;
pub mod point_attributes;
pub mod snapshot;
pub mod statistics;

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Deepest level whose coordinates still fit a `u32` grid.
pub const MAX_DEPTH: u32 = 32;

/// Octree address `depth-x-y-z`.
///
/// The root is `0-0-0-0`; a node at depth `d` has coordinates in
/// `0..2^d` on every axis. Ordering is by `(depth, x, y, z)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId {
    pub depth: u32,
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseNodeIdError {
    #[error("Node id `{0}` must have four `-` separated parts")]
    Format(String),

    #[error("Node id `{0}` has a non numeric part")]
    Number(String),

    #[error("Node id `{0}` has coordinates outside its depth")]
    OutOfRange(String),
}

impl NodeId {
    pub const ROOT: NodeId = NodeId {
        depth: 0,
        x: 0,
        y: 0,
        z: 0,
    };

    /// Builds an address, rejecting coordinates outside `0..2^depth`.
    pub fn new(depth: u32, x: u32, y: u32, z: u32) -> Option<Self> {
        let id = Self { depth, x, y, z };
        id.is_valid().then_some(id)
    }

    pub fn is_root(&self) -> bool {
        self.depth == 0
    }

    pub fn is_valid(&self) -> bool {
        if self.depth > MAX_DEPTH {
            return false;
        }
        if self.depth == MAX_DEPTH {
            return true;
        }
        let cells = 1u64 << self.depth;
        (self.x as u64) < cells && (self.y as u64) < cells && (self.z as u64) < cells
    }

    pub fn parent(&self) -> Option<NodeId> {
        if self.is_root() {
            return None;
        }
        Some(NodeId {
            depth: self.depth - 1,
            x: self.x >> 1,
            y: self.y >> 1,
            z: self.z >> 1,
        })
    }

    /// Child in octant `index` (0..8): bit 2 selects x, bit 1 y, bit 0 z.
    pub fn child(&self, index: usize) -> Option<NodeId> {
        if index >= 8 || self.depth >= MAX_DEPTH {
            return None;
        }
        Some(NodeId {
            depth: self.depth + 1,
            x: (self.x << 1) | ((index >> 2) & 1) as u32,
            y: (self.y << 1) | ((index >> 1) & 1) as u32,
            z: (self.z << 1) | (index & 1) as u32,
        })
    }

    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..8).filter_map(move |index| self.child(index))
    }

    /// Octant of this node inside its parent, the inverse of [`NodeId::child`].
    pub fn child_index(&self) -> Option<usize> {
        if self.is_root() {
            return None;
        }
        Some((((self.x & 1) << 2) | ((self.y & 1) << 1) | (self.z & 1)) as usize)
    }

    /// Ancestors from the parent up to the root.
    pub fn ancestors(&self) -> impl Iterator<Item = NodeId> {
        std::iter::successors(self.parent(), |id| id.parent())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}-{}", self.depth, self.x, self.y, self.z)
    }
}

impl FromStr for NodeId {
    type Err = ParseNodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = [0u32; 4];
        let mut count = 0;
        for part in s.split('-') {
            if count == 4 {
                return Err(ParseNodeIdError::Format(s.to_string()));
            }
            // canonical decimal only: no sign, no leading zeros
            let canonical = part.bytes().all(|b| b.is_ascii_digit())
                && (part == "0" || !part.starts_with('0'));
            if !canonical {
                return Err(ParseNodeIdError::Number(s.to_string()));
            }
            parts[count] = part
                .parse()
                .map_err(|_| ParseNodeIdError::Number(s.to_string()))?;
            count += 1;
        }
        if count != 4 {
            return Err(ParseNodeIdError::Format(s.to_string()));
        }

        let [depth, x, y, z] = parts;
        NodeId::new(depth, x, y, z).ok_or_else(|| ParseNodeIdError::OutOfRange(s.to_string()))
    }
}
