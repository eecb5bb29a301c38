//! Node-hierarchy resolver
//!
//! Meshes made of rigid parts carry a small node tree. Each object instance
//! can override individual nodes; the resolver folds parent globals, authored
//! locals and overrides into one global matrix per node:
//!
//! ```text
//! global[i] = global[parent[i]] * local[i] * override[i]
//! ```
//!
//! Nodes must be ordered parents-before-children, which the mesh importer
//! guarantees.

use serde::{Deserialize, Serialize};

use crate::assets::MeshNode;
use crate::foundation::math::{Mat4, Transform};

/// Per-instance override for one mesh node
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeOverride {
    /// Whether the override is applied
    pub enabled: bool,
    /// Transform applied after the node's authored local transform
    pub transform: Transform,
}

impl NodeOverride {
    /// An enabled override
    pub fn new(transform: Transform) -> Self {
        Self {
            enabled: true,
            transform,
        }
    }

    /// Matrix contributed by this override
    pub fn matrix(&self) -> Mat4 {
        if self.enabled {
            self.transform.to_matrix()
        } else {
            Mat4::identity()
        }
    }
}

/// Compute the global transform of every node
///
/// `overrides` is either empty or addressed by node index; missing entries
/// count as disabled. A parent index that does not precede its child breaks
/// the ordering precondition and the node is treated as a root.
pub fn compute_globals(nodes: &[MeshNode], overrides: &[NodeOverride]) -> Vec<Mat4> {
    let mut globals: Vec<Mat4> = Vec::with_capacity(nodes.len());

    for (i, node) in nodes.iter().enumerate() {
        let parent = if node.parent >= 0 && (node.parent as usize) < i {
            globals[node.parent as usize]
        } else {
            if node.parent >= 0 {
                log::debug!(
                    "Node {} ('{}') has parent {} out of order, treating as root",
                    i,
                    node.name,
                    node.parent
                );
            }
            Mat4::identity()
        };

        let local_override = overrides.get(i).map_or_else(Mat4::identity, NodeOverride::matrix);
        globals.push(parent * node.local * local_override);
    }

    globals
}

/// World transform of a fragment attached to a node
pub fn fragment_world(object: &Mat4, node_global: &Mat4) -> Mat4 {
    object * node_global
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use approx::assert_relative_eq;

    fn node(name: &str, parent: i32, offset: Vec3) -> MeshNode {
        MeshNode {
            name: name.to_string(),
            parent,
            local: Mat4::new_translation(&offset),
        }
    }

    // root
    // +- arm
    // |  +- hand
    // +- leg
    fn rig() -> Vec<MeshNode> {
        vec![
            node("root", -1, Vec3::new(0.0, 1.0, 0.0)),
            node("arm", 0, Vec3::new(1.0, 0.0, 0.0)),
            node("hand", 1, Vec3::new(0.5, 0.0, 0.0)),
            node("leg", 0, Vec3::new(0.0, -1.0, 0.0)),
        ]
    }

    #[test]
    fn test_no_overrides_reproduces_bind_pose() {
        let nodes = rig();
        let globals = compute_globals(&nodes, &[]);

        assert_relative_eq!(globals[0], Mat4::new_translation(&Vec3::new(0.0, 1.0, 0.0)));
        assert_relative_eq!(globals[1], Mat4::new_translation(&Vec3::new(1.0, 1.0, 0.0)));
        assert_relative_eq!(globals[2], Mat4::new_translation(&Vec3::new(1.5, 1.0, 0.0)));
        assert_relative_eq!(globals[3], Mat4::new_translation(&Vec3::new(0.0, 0.0, 0.0)));

        // Disabled overrides are the same as none
        let disabled = vec![NodeOverride::default(); nodes.len()];
        assert_eq!(compute_globals(&nodes, &disabled), globals);
    }

    #[test]
    fn test_override_moves_node_and_descendants_only() {
        let nodes = rig();
        let bind = compute_globals(&nodes, &[]);

        let mut overrides = vec![NodeOverride::default(); nodes.len()];
        overrides[1] = NodeOverride::new(Transform::from_position(Vec3::new(0.0, 0.0, 2.0)));
        let posed = compute_globals(&nodes, &overrides);

        assert_relative_eq!(posed[0], bind[0]);
        assert_relative_eq!(posed[3], bind[3]);
        assert!((posed[1] - bind[1]).norm() > 1.0);
        assert!((posed[2] - bind[2]).norm() > 1.0);
        assert_relative_eq!(posed[2], Mat4::new_translation(&Vec3::new(1.5, 1.0, 2.0)));
    }

    #[test]
    fn test_out_of_order_parent_is_root() {
        let nodes = vec![
            node("a", 1, Vec3::new(1.0, 0.0, 0.0)),
            node("b", -1, Vec3::new(0.0, 1.0, 0.0)),
        ];
        let globals = compute_globals(&nodes, &[]);
        assert_relative_eq!(globals[0], nodes[0].local);
    }

    #[test]
    fn test_fragment_world() {
        let object = Mat4::new_translation(&Vec3::new(10.0, 0.0, 0.0));
        let global = Mat4::new_translation(&Vec3::new(0.0, 2.0, 0.0));
        assert_relative_eq!(
            fragment_world(&object, &global),
            Mat4::new_translation(&Vec3::new(10.0, 2.0, 0.0))
        );
    }
}
