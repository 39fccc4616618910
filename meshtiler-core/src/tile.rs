//! Tile hierarchy nodes

use crate::bounds::BoundingBox;

/// One node of the spatial-LOD tile tree.
///
/// Addresses follow the octant path from the root: `"root"`, `"2"`,
/// `"2_1"`, `"2_1_3"`. The tree is an owned structure; the serializer walks
/// it exactly once after the build completes.
#[derive(Debug, Clone)]
pub struct TileNode {
    pub address: String,
    /// Depth in the tree, root = 0.
    pub level: u32,
    pub bounds: BoundingBox,
    /// Screen-space-error driver in meters; 0 for leaves.
    pub geometric_error: f64,
    /// Relative URI of the written GLB, when the node has geometry.
    pub content_uri: Option<String>,
    /// Up to 8 children, ordered by octant index.
    pub children: Vec<TileNode>,
}

impl TileNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Nodes in the subtree rooted here, including this one.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(TileNode::node_count).sum::<usize>()
    }

    /// Nodes in the subtree that carry content.
    pub fn content_count(&self) -> usize {
        usize::from(self.content_uri.is_some())
            + self.children.iter().map(TileNode::content_count).sum::<usize>()
    }

    /// Deepest level present in the subtree.
    pub fn depth(&self) -> u32 {
        self.children
            .iter()
            .map(TileNode::depth)
            .max()
            .unwrap_or(self.level)
    }
}

/// Child address for an octant under `parent`.
pub fn child_address(parent: &str, octant: usize) -> String {
    if parent == "root" {
        octant.to_string()
    } else {
        format!("{parent}_{octant}")
    }
}

/// Relative URI for a tile address.
///
/// `"root"` maps to `tiles/root.glb`; any other address nests one directory
/// per octant digit: `"2_1"` becomes `tiles/2/1/tile.glb`.
pub fn address_to_uri(address: &str) -> String {
    if address == "root" {
        return "tiles/root.glb".into();
    }
    let dir = address.split('_').collect::<Vec<_>>().join("/");
    format!("tiles/{dir}/tile.glb")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(address: &str, level: u32, error: f64) -> TileNode {
        TileNode {
            address: address.into(),
            level,
            bounds: BoundingBox {
                min: [0.0; 3],
                max: [1.0; 3],
            },
            geometric_error: error,
            content_uri: Some(address_to_uri(address)),
            children: vec![],
        }
    }

    #[test]
    fn addresses() {
        assert_eq!(child_address("root", 5), "5");
        assert_eq!(child_address("5", 2), "5_2");
        assert_eq!(child_address("5_2", 7), "5_2_7");
    }

    #[test]
    fn uris() {
        assert_eq!(address_to_uri("root"), "tiles/root.glb");
        assert_eq!(address_to_uri("0"), "tiles/0/tile.glb");
        assert_eq!(address_to_uri("2_1"), "tiles/2/1/tile.glb");
        assert_eq!(address_to_uri("2_1_3"), "tiles/2/1/3/tile.glb");
    }

    #[test]
    fn tree_counts() {
        let mut root = leaf("root", 0, 10.0);
        root.children.push(leaf("0", 1, 0.0));
        root.children.push(leaf("7", 1, 0.0));

        assert!(!root.is_leaf());
        assert_eq!(root.node_count(), 3);
        assert_eq!(root.content_count(), 3);
        assert_eq!(root.depth(), 1);
        assert!(root.children[0].is_leaf());
    }
}
