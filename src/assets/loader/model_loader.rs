use std::sync::Arc;

use arcadia_files::glb::types::ContainerDocument;

use crate::scene::SceneNode;

/// View over a static model container. No skeleton, no clips, just nodes.
#[derive(Debug)]
pub struct ModelView {
    document: Arc<ContainerDocument>,
}

pub struct ModelLoader {}

impl ModelLoader {
    pub fn load(document: Arc<ContainerDocument>) -> ModelView {
        ModelView { document }
    }
}

impl ModelView {
    /// Builds a fresh, attachable node instance of the cached scene graph.
    /// The document stays the immutable template for every instantiation.
    pub fn instantiate(&self) -> SceneNode {
        SceneNode::from_document(&self.document.root)
    }

    pub fn document(&self) -> &ContainerDocument {
        &self.document
    }
}
