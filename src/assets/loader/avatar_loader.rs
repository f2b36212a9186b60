use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use glam::{Affine3A, Quat, Vec3};
use log::warn;
use serde::Deserialize;

use arcadia_files::glb::types::{ContainerDocument, DocumentNode};

use crate::scene::SceneNode;

// The canonical bones a rig must resolve to be considered structurally sound.
pub const BONE_HIPS: &str = "hips";
pub const BONE_HEAD: &str = "head";
pub const BONE_LEFT_UPPER_ARM: &str = "leftUpperArm";
pub const BONE_RIGHT_UPPER_ARM: &str = "rightUpperArm";

const REQUIRED_BONES: [&str; 4] = [BONE_HIPS, BONE_HEAD, BONE_LEFT_UPPER_ARM, BONE_RIGHT_UPPER_ARM];

/// Humanoid rig metadata as the exporters embed it under the "rig" key:
/// a numeric naming-convention version plus canonical-to-node bone names.
#[derive(Debug, Clone, Deserialize)]
pub struct RigDescriptor {
    pub version: u32,
    pub bones: HashMap<String, String>,
}

/// View over an avatar container. A missing or unsound rig descriptor only
/// costs the factory, node instantiation keeps working.
#[derive(Debug)]
pub struct AvatarView {
    document: Arc<ContainerDocument>,
    pub factory: Option<AvatarFactory>,
}

pub struct AvatarLoader {}

impl AvatarLoader {
    pub fn load(document: Arc<ContainerDocument>) -> AvatarView {
        let factory = match AvatarFactory::from_document(&document) {
            Ok(factory) => Some(factory),
            Err(reason) => {
                warn!("Avatar rig unavailable, degrading to node instantiation only: {}", reason);
                None
            }
        };

        AvatarView { document, factory }
    }
}

impl AvatarView {
    pub fn instantiate(&self) -> SceneNode {
        SceneNode::from_document(&self.document.root)
    }

    pub fn document(&self) -> &ContainerDocument {
        &self.document
    }
}

/// One bone of the flattened skeleton. Parents precede their children, so a
/// single forward sweep recomputes every world transform.
#[derive(Debug)]
struct Bone {
    node_name: String,
    parent: Option<usize>,
    local: Affine3A,
}

/// Produces bone lookups and the height/bounds used for third-person camera
/// placement, and can re-run the rig's pose-update step on demand.
#[derive(Debug)]
pub struct AvatarFactory {
    rig_version: u32,
    bones: Vec<Bone>,
    by_canonical: HashMap<String, usize>,
    world_transforms: RwLock<Vec<Affine3A>>,
}

impl AvatarFactory {
    fn from_document(document: &ContainerDocument) -> Result<AvatarFactory, String> {
        let value = document
            .metadata
            .get("rig")
            .ok_or("no rig descriptor in the container metadata")?;
        let descriptor: RigDescriptor = serde_json::from_value(value.clone())
            .map_err(|err| format!("rig descriptor does not deserialize: {}", err))?;

        let mut bones = Vec::new();
        Self::flatten_skeleton(&document.root, None, &mut bones);

        let mut by_canonical = HashMap::new();
        for canonical in REQUIRED_BONES {
            let node_name = descriptor
                .bones
                .get(canonical)
                .ok_or_else(|| format!("rig descriptor lacks the {} bone", canonical))?;
            let index = bones
                .iter()
                .position(|bone| &bone.node_name == node_name)
                .ok_or_else(|| format!("rig bone {} is not part of the scene graph", node_name))?;
            by_canonical.insert(canonical.to_owned(), index);
        }
        // Optional bones only make it into the lookup when they resolve.
        for (canonical, node_name) in &descriptor.bones {
            if by_canonical.contains_key(canonical) {
                continue;
            }
            if let Some(index) = bones.iter().position(|bone| &bone.node_name == node_name) {
                by_canonical.insert(canonical.clone(), index);
            }
        }

        let world_transforms = RwLock::new(vec![Affine3A::IDENTITY; bones.len()]);
        let factory = AvatarFactory {
            rig_version: descriptor.version,
            bones,
            by_canonical,
            world_transforms,
        };
        factory.update_pose();
        Ok(factory)
    }

    fn flatten_skeleton(node: &DocumentNode, parent: Option<usize>, bones: &mut Vec<Bone>) {
        let index = bones.len();
        bones.push(Bone {
            node_name: node.name.clone(),
            parent,
            local: Affine3A::from_scale_rotation_translation(
                Vec3::from_array(node.scale),
                Quat::from_array(node.rotation),
                Vec3::from_array(node.translation),
            ),
        });
        for child in &node.children {
            Self::flatten_skeleton(child, Some(index), bones);
        }
    }

    pub fn rig_version(&self) -> u32 {
        self.rig_version
    }

    /// Maps a canonical bone to its name on an external skeleton via the
    /// caller-supplied mapping, falling back to the rig's own node name.
    pub fn bone_name(&self, canonical: &str, rename_bone: &dyn Fn(&str) -> Option<String>) -> Option<String> {
        let bone = &self.bones[*self.by_canonical.get(canonical)?];
        Some(rename_bone(&bone.node_name).unwrap_or_else(|| bone.node_name.clone()))
    }

    /// Approximate standing height: the head bone's world-space elevation.
    pub fn height(&self) -> f32 {
        self.bone_world(BONE_HEAD)
            .expect("construction guarantees a resolvable head bone")
            .translation
            .y
    }

    /// World-space extent over all bones, for camera framing.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        let worlds = self.world_transforms.read().expect("world transform lock poisoned");
        let mut min = Vec3::MAX;
        let mut max = Vec3::MIN;
        for world in worlds.iter() {
            min = min.min(world.translation.into());
            max = max.max(world.translation.into());
        }
        (min, max)
    }

    pub fn bone_world(&self, canonical: &str) -> Option<Affine3A> {
        let index = *self.by_canonical.get(canonical)?;
        let worlds = self.world_transforms.read().expect("world transform lock poisoned");
        Some(worlds[index])
    }

    /// Re-runs the rig's pose-update step: world transforms from local TRS,
    /// parents first.
    pub fn update_pose(&self) {
        let mut worlds = self.world_transforms.write().expect("world transform lock poisoned");
        for (index, bone) in self.bones.iter().enumerate() {
            worlds[index] = match bone.parent {
                Some(parent) => worlds[parent] * bone.local,
                None => bone.local,
            };
        }
    }
}
