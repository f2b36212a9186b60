use std::sync::Arc;

use glam::Vec3;
use itertools::Itertools;

use arcadia_files::ParserError;
use arcadia_files::glb::types::{AnimationClip, AnimationTrack, ContainerDocument, TrackPath, TrackValues};

use crate::assets::LoadError;

/// Options for re-targeting a clip onto an external skeleton.
pub struct RetargetOptions<'a> {
    /// Ratio between the target rig's root-to-hips distance and the source's.
    pub root_to_hips_scale: f32,
    /// Rig naming convention tag, stamped on the produced clip.
    pub rig_version: u32,
    /// Places a source bone on the target skeleton. `None` drops the track.
    pub rename_bone: &'a dyn Fn(&str) -> Option<String>,
}

/// View over an emote container: the first clip plus the retarget operation.
#[derive(Debug)]
pub struct EmoteView {
    document: Arc<ContainerDocument>,
}

pub struct EmoteLoader {}

impl EmoteLoader {
    pub fn load(document: Arc<ContainerDocument>) -> Result<EmoteView, LoadError> {
        if document.animations.is_empty() {
            return Err(LoadError::Parse(Arc::new(ParserError::FormatError {
                reason: "Emote container carries no animation clips",
            })));
        }
        Ok(EmoteView { document })
    }
}

impl EmoteView {
    pub fn clip(&self) -> &AnimationClip {
        &self.document.animations[0]
    }

    /// Re-targets the clip onto an external skeleton and returns the result
    /// as a fresh clip. Pure with respect to the stored document.
    pub fn retarget(&self, options: &RetargetOptions) -> AnimationClip {
        let source = self.clip();

        let tracks = source
            .tracks
            .iter()
            .filter_map(|track| {
                let target = (options.rename_bone)(&track.target)?;
                let values = match (&track.path, &track.values) {
                    // Humanoid clips only carry translation on the hips track,
                    // which has to follow the target rig's proportions.
                    (TrackPath::Translation, TrackValues::Vec3(values)) => TrackValues::Vec3(
                        values
                            .iter()
                            .map(|value| (Vec3::from_array(*value) * options.root_to_hips_scale).to_array())
                            .collect(),
                    ),
                    (_, values) => values.clone(),
                };

                Some(AnimationTrack {
                    target,
                    path: track.path,
                    times: track.times.clone(),
                    values,
                })
            })
            .collect_vec();

        AnimationClip {
            name: format!("{}@v{}", source.name, options.rig_version),
            tracks,
        }
    }
}
