use glam::{Affine3A, Quat, Vec3};
use itertools::Itertools;

use arcadia_files::glb::types::DocumentNode;

/// An attachable scene-graph node instance. This is the hand-over shape for
/// the external scene-graph runtime, the subsystem itself never renders.
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub transform: Affine3A,
    /// Opaque mesh index into the source container, resolved by the renderer.
    pub mesh: Option<usize>,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn from_document(node: &DocumentNode) -> SceneNode {
        SceneNode {
            name: node.name.clone(),
            transform: Affine3A::from_scale_rotation_translation(
                Vec3::from_array(node.scale),
                Quat::from_array(node.rotation),
                Vec3::from_array(node.translation),
            ),
            mesh: node.mesh,
            children: node.children.iter().map(SceneNode::from_document).collect_vec(),
        }
    }

    /// Number of nodes in this subtree, itself included.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(SceneNode::count).sum::<usize>()
    }

    pub fn find(&self, name: &str) -> Option<&SceneNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(name))
    }
}
