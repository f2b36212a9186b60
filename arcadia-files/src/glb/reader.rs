use std::collections::HashSet;
use std::io::ErrorKind::UnexpectedEof;
use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::ParserError;
use crate::glb::types::{
    AnimationClip, AnimationTrack, CONTAINER_VERSION, ChunkKind, ContainerChunk, ContainerDocument, DocumentNode,
    FOURCC_CONTAINER, RawAccessor, RawBufferView, RawDocument, RawNode, TrackPath, TrackValues,
};

// The only accessor component type humanoid animation data is exported with.
const COMPONENT_TYPE_F32: u32 = 5126;

pub struct GlbReader {}

impl GlbReader {
    pub fn parse_document<R: Read>(rdr: &mut R) -> Result<ContainerDocument, ParserError> {
        let magic = rdr.read_u32::<LittleEndian>().map_err(|e| {
            if e.kind() == UnexpectedEof {
                ParserError::EmptySource
            } else {
                ParserError::IOError(e)
            }
        })?;
        if magic != FOURCC_CONTAINER {
            return Err(ParserError::InvalidMagicValue { magic });
        }

        let version = rdr.read_u32::<LittleEndian>()?;
        if version != CONTAINER_VERSION {
            return Err(ParserError::FormatError {
                reason: "Container version MUST BE 2",
            });
        }

        // Total length, redundant with the chunk framing.
        let _ = rdr.read_u32::<LittleEndian>()?;

        let mut chunk_list = Vec::<ContainerChunk>::new();
        loop {
            // EOF is only clean at a chunk boundary, i.e. on the length prefix.
            let length = match rdr.read_u32::<LittleEndian>() {
                Ok(length) => length,
                Err(internal) if internal.kind() == UnexpectedEof => break,
                Err(internal) => return Err(internal.into()),
            };
            chunk_list.push(ContainerChunk::read_body(rdr, length)?);
        }

        let json_chunk = chunk_list
            .iter()
            .find(|chunk| matches!(ChunkKind::try_from(chunk.kind), Ok(ChunkKind::Json)))
            .ok_or(ParserError::FormatError {
                reason: "Missing mandatory JSON chunk",
            })?;
        let bin = chunk_list
            .iter()
            .find(|chunk| matches!(ChunkKind::try_from(chunk.kind), Ok(ChunkKind::Bin)))
            .map(|chunk| chunk.data.as_slice());

        let raw: RawDocument = serde_json::from_slice(&json_chunk.data)?;
        if !raw.asset.version.starts_with("2.") {
            return Err(ParserError::FormatError {
                reason: "Scene description asset version MUST BE 2.x",
            });
        }

        let root = GlbReader::build_scene_tree(&raw)?;
        let animations = GlbReader::resolve_animations(&raw, bin)?;

        Ok(ContainerDocument {
            root,
            animations,
            metadata: raw.extras,
        })
    }

    /// The scene's root nodes become children of one synthetic root so
    /// consumers always deal with a single attachable tree.
    fn build_scene_tree(raw: &RawDocument) -> Result<DocumentNode, ParserError> {
        let scene = raw.scenes.get(raw.scene).ok_or(ParserError::FormatError {
            reason: "Default scene index is out of range",
        })?;

        let mut visited = HashSet::new();
        let children = scene
            .nodes
            .iter()
            .map(|&index| GlbReader::build_node(raw, index, &mut visited))
            .collect::<Result<Vec<DocumentNode>, ParserError>>()?;

        Ok(DocumentNode {
            name: scene.name.clone().unwrap_or_default(),
            translation: [0.0, 0.0, 0.0],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0, 1.0, 1.0],
            mesh: None,
            children,
        })
    }

    fn build_node(raw: &RawDocument, index: usize, visited: &mut HashSet<usize>) -> Result<DocumentNode, ParserError> {
        let node: &RawNode = raw.nodes.get(index).ok_or(ParserError::FormatError {
            reason: "Node index is out of range",
        })?;

        // The format requires a tree. A revisited index means a cycle (or a
        // shared child), either would make us recurse forever.
        if !visited.insert(index) {
            return Err(ParserError::FormatError {
                reason: "Node graph is not a tree",
            });
        }

        let children = node
            .children
            .iter()
            .map(|&child| GlbReader::build_node(raw, child, visited))
            .collect::<Result<Vec<DocumentNode>, ParserError>>()?;

        Ok(DocumentNode {
            name: node.name.clone().unwrap_or_else(|| format!("node_{}", index)),
            translation: node.translation.unwrap_or([0.0, 0.0, 0.0]),
            rotation: node.rotation.unwrap_or([0.0, 0.0, 0.0, 1.0]),
            scale: node.scale.unwrap_or([1.0, 1.0, 1.0]),
            mesh: node.mesh,
            children,
        })
    }

    fn resolve_animations(raw: &RawDocument, bin: Option<&[u8]>) -> Result<Vec<AnimationClip>, ParserError> {
        let mut clips = Vec::with_capacity(raw.animations.len());

        for (clip_index, animation) in raw.animations.iter().enumerate() {
            let mut tracks = Vec::with_capacity(animation.channels.len());

            for channel in &animation.channels {
                // Extension-driven channels carry no node, nothing to retarget.
                let Some(node_index) = channel.target.node else {
                    continue;
                };
                let target = raw
                    .nodes
                    .get(node_index)
                    .ok_or(ParserError::FormatError {
                        reason: "Animation channel targets a node out of range",
                    })?
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("node_{}", node_index));

                let sampler = animation.samplers.get(channel.sampler).ok_or(ParserError::FormatError {
                    reason: "Animation channel references a sampler out of range",
                })?;

                let path = TrackPath::from_channel_path(&channel.target.path)?;
                let times = match GlbReader::resolve_accessor(raw, bin, sampler.input)? {
                    TrackValues::Scalar(times) => times,
                    _ => {
                        return Err(ParserError::FormatError {
                            reason: "Sampler input accessor MUST BE scalar",
                        });
                    }
                };
                let values = GlbReader::resolve_accessor(raw, bin, sampler.output)?;

                let expected = match path {
                    TrackPath::Translation | TrackPath::Scale => matches!(values, TrackValues::Vec3(_)),
                    TrackPath::Rotation => matches!(values, TrackValues::Quat(_)),
                    TrackPath::Weights => matches!(values, TrackValues::Scalar(_)),
                };
                if !expected {
                    return Err(ParserError::FormatError {
                        reason: "Sampler output element type does not match the channel path",
                    });
                }
                // Weights tracks hold one scalar per morph target per keyframe,
                // everything else is strictly one element per keyframe.
                if path != TrackPath::Weights && values.len() != times.len() {
                    return Err(ParserError::FormatError {
                        reason: "Sampler keyframe counts do not line up",
                    });
                }

                tracks.push(AnimationTrack {
                    target,
                    path,
                    times,
                    values,
                });
            }

            clips.push(AnimationClip {
                name: animation
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("clip_{}", clip_index)),
                tracks,
            });
        }

        Ok(clips)
    }

    fn resolve_accessor(raw: &RawDocument, bin: Option<&[u8]>, index: usize) -> Result<TrackValues, ParserError> {
        let accessor: &RawAccessor = raw.accessors.get(index).ok_or(ParserError::FormatError {
            reason: "Accessor index is out of range",
        })?;
        if accessor.component_type != COMPONENT_TYPE_F32 {
            return Err(ParserError::FormatError {
                reason: "Unsupported accessor component type, keyframe data MUST BE f32",
            });
        }

        let components = match accessor.element_type.as_str() {
            "SCALAR" => 1,
            "VEC3" => 3,
            "VEC4" => 4,
            _ => {
                return Err(ParserError::FormatError {
                    reason: "Unsupported accessor element type",
                });
            }
        };

        let view: &RawBufferView = raw
            .buffer_views
            .get(accessor.buffer_view)
            .ok_or(ParserError::FormatError {
                reason: "Accessor references a buffer view out of range",
            })?;
        let bin = bin.ok_or(ParserError::FormatError {
            reason: "Accessor data requires a BIN chunk, none present",
        })?;
        // Offsets come off the wire, overflow means malformed, not panic.
        let view_end = view
            .byte_offset
            .checked_add(view.byte_length)
            .ok_or(ParserError::FormatError {
                reason: "Buffer view reaches past the binary chunk",
            })?;
        let view_data = bin.get(view.byte_offset..view_end).ok_or(ParserError::FormatError {
            reason: "Buffer view reaches past the binary chunk",
        })?;

        let element_size = components * 4;
        let stride = view.byte_stride.unwrap_or(element_size);

        let mut elements: Vec<Vec<f32>> = Vec::with_capacity(accessor.count);
        for i in 0..accessor.count {
            let start = i
                .checked_mul(stride)
                .and_then(|offset| offset.checked_add(accessor.byte_offset))
                .ok_or(ParserError::FormatError {
                    reason: "Accessor reaches past its buffer view",
                })?;
            let mut element_data = view_data
                .get(start..start.saturating_add(element_size))
                .ok_or(ParserError::FormatError {
                    reason: "Accessor reaches past its buffer view",
                })?;

            let mut element = Vec::with_capacity(components);
            for _ in 0..components {
                element.push(element_data.read_f32::<LittleEndian>()?);
            }
            elements.push(element);
        }

        Ok(match components {
            1 => TrackValues::Scalar(elements.iter().map(|e| e[0]).collect()),
            3 => TrackValues::Vec3(elements.iter().map(|e| [e[0], e[1], e[2]]).collect()),
            _ => TrackValues::Quat(elements.iter().map(|e| [e[0], e[1], e[2], e[3]]).collect()),
        })
    }
}
