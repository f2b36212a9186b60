use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};
use num_enum::TryFromPrimitive;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::ParserError;

pub const FOURCC_CONTAINER: u32 = u32::from_le_bytes(*b"glTF");
pub const CONTAINER_VERSION: u32 = 2;

/// The two chunk kinds the container format defines. Unknown kinds are
/// skipped by the reader, the format reserves them for extensions.
#[derive(Debug, Copy, Clone, Eq, PartialEq, TryFromPrimitive)]
#[repr(u32)]
pub enum ChunkKind {
    Json = 0x4E4F_534A, // b"JSON"
    Bin = 0x004E_4942,  // b"BIN\0"
}

/// A raw container chunk: length-prefixed, FOURCC-tagged, padded to 4 bytes.
/// Note the field order on the wire is (length, kind), unlike IFF.
#[derive(Debug)]
pub(crate) struct ContainerChunk {
    pub kind: u32,
    pub data: Vec<u8>,
}

impl ContainerChunk {
    /// Reads the remainder of a chunk whose length prefix the caller already
    /// consumed. Hitting EOF in here is a real truncation, not a clean end
    /// of the chunk list.
    pub fn read_body<R: Read>(rdr: &mut R, length: u32) -> Result<ContainerChunk, ParserError> {
        let kind = rdr.read_u32::<LittleEndian>()?;
        let mut data = vec![0; length as usize];
        rdr.read_exact(&mut data)?;

        let padding = (4 - length % 4) % 4;
        let mut pad = vec![0; padding as usize];
        rdr.read_exact(&mut pad)?;

        Ok(ContainerChunk { kind, data })
    }
}

// The JSON chunk's scene description, in the exact shape the exporters emit.
// Only the fields the document model needs are deserialized.

#[derive(Debug, Deserialize)]
pub(crate) struct RawDocument {
    pub asset: RawAssetInfo,
    #[serde(default)]
    pub scene: usize,
    #[serde(default)]
    pub scenes: Vec<RawScene>,
    #[serde(default)]
    pub nodes: Vec<RawNode>,
    #[serde(default)]
    pub animations: Vec<RawAnimation>,
    #[serde(default)]
    pub accessors: Vec<RawAccessor>,
    #[serde(default, rename = "bufferViews")]
    pub buffer_views: Vec<RawBufferView>,
    #[serde(default)]
    pub extras: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawAssetInfo {
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawScene {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub nodes: Vec<usize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawNode {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub children: Vec<usize>,
    #[serde(default)]
    pub translation: Option<[f32; 3]>,
    #[serde(default)]
    pub rotation: Option<[f32; 4]>,
    #[serde(default)]
    pub scale: Option<[f32; 3]>,
    #[serde(default)]
    pub mesh: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawAnimation {
    #[serde(default)]
    pub name: Option<String>,
    pub channels: Vec<RawChannel>,
    pub samplers: Vec<RawSampler>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawChannel {
    pub sampler: usize,
    pub target: RawChannelTarget,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawChannelTarget {
    // May be absent for extension-driven channels, those are skipped.
    #[serde(default)]
    pub node: Option<usize>,
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSampler {
    pub input: usize,
    pub output: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawAccessor {
    #[serde(rename = "bufferView")]
    pub buffer_view: usize,
    #[serde(default, rename = "byteOffset")]
    pub byte_offset: usize,
    #[serde(rename = "componentType")]
    pub component_type: u32,
    pub count: usize,
    #[serde(rename = "type")]
    pub element_type: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawBufferView {
    #[serde(default, rename = "byteOffset")]
    pub byte_offset: usize,
    #[serde(rename = "byteLength")]
    pub byte_length: usize,
    #[serde(default, rename = "byteStride")]
    pub byte_stride: Option<usize>,
}

// The decoded, self-contained document model. No raw buffer or index
// chasing is left for the consumers, animation samplers have been resolved
// into concrete keyframe tracks.

#[derive(Debug)]
pub struct ContainerDocument {
    pub root: DocumentNode,
    pub animations: Vec<AnimationClip>,
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct DocumentNode {
    pub name: String,
    pub translation: [f32; 3],
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
    /// Opaque index into the container's mesh list. Mesh payloads are the
    /// renderer's concern, the document only carries the reference.
    pub mesh: Option<usize>,
    pub children: Vec<DocumentNode>,
}

impl DocumentNode {
    /// Walks the subtree for a node carrying the given name.
    pub fn find(&self, name: &str) -> Option<&DocumentNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(name))
    }
}

#[derive(Debug, Clone)]
pub struct AnimationClip {
    pub name: String,
    pub tracks: Vec<AnimationTrack>,
}

impl AnimationClip {
    pub fn duration(&self) -> f32 {
        self.tracks
            .iter()
            .flat_map(|track| track.times.last().copied())
            .fold(0.0, f32::max)
    }
}

#[derive(Debug, Clone)]
pub struct AnimationTrack {
    /// Name of the node the keyframes drive.
    pub target: String,
    pub path: TrackPath,
    pub times: Vec<f32>,
    pub values: TrackValues,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TrackPath {
    Translation,
    Rotation,
    Scale,
    Weights,
}

impl TrackPath {
    pub(crate) fn from_channel_path(path: &str) -> Result<TrackPath, ParserError> {
        match path {
            "translation" => Ok(TrackPath::Translation),
            "rotation" => Ok(TrackPath::Rotation),
            "scale" => Ok(TrackPath::Scale),
            "weights" => Ok(TrackPath::Weights),
            _ => Err(ParserError::FormatError {
                reason: "Unknown animation channel target path",
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub enum TrackValues {
    Vec3(Vec<[f32; 3]>),
    Quat(Vec<[f32; 4]>),
    Scalar(Vec<f32>),
}

impl TrackValues {
    pub fn len(&self) -> usize {
        match self {
            TrackValues::Vec3(values) => values.len(),
            TrackValues::Quat(values) => values.len(),
            TrackValues::Scalar(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
