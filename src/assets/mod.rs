use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

use arcadia_files::ParserError;

use crate::assets::loader::avatar_loader::AvatarView;
use crate::assets::loader::emote_loader::EmoteView;
use crate::assets::loader::model_loader::ModelView;
use crate::assets::loader::script_gate::ScriptView;

pub mod cache;
pub mod fetcher;
pub mod loader;
pub mod url;

/// The asset kinds the load cache understands. Kind strings arrive from
/// world state descriptions, so the public API parses them late and fails
/// fast on anything unrecognized.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum AssetKind {
    Model,
    Avatar,
    Emote,
    Script,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Model => "model",
            AssetKind::Avatar => "avatar",
            AssetKind::Emote => "emote",
            AssetKind::Script => "script",
        }
    }
}

impl FromStr for AssetKind {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "model" => Ok(AssetKind::Model),
            "avatar" => Ok(AssetKind::Avatar),
            "emote" => Ok(AssetKind::Emote),
            "script" => Ok(AssetKind::Script),
            other => Err(LoadError::UnsupportedKind {
                kind: other.to_owned(),
            }),
        }
    }
}

/// Everything that can go wrong on a load. Clone because one settled outcome
/// fans out to every concurrent waiter on the key. Script rejection is
/// deliberately absent: that is the `Ok(None)` outcome, not a fault.
#[derive(Error, Debug, Clone)]
pub enum LoadError {
    #[error("asset reference {locator:?} cannot be resolved to a fetchable URL")]
    UnresolvableReference { locator: String },

    #[error("fetching {url} failed (status: {status:?})")]
    Fetch { url: String, status: Option<u16> },

    #[error("unsupported asset kind {kind:?}")]
    UnsupportedKind { kind: String },

    #[error("malformed asset container: {0}")]
    Parse(Arc<ParserError>),
}

/// The kind-specific view over a decoded container. Exactly four variants,
/// matched exhaustively at construction time so kind checks never scatter.
#[derive(Debug)]
pub enum AssetView {
    Model(ModelView),
    Avatar(AvatarView),
    Emote(EmoteView),
    Script(ScriptView),
}

impl AssetView {
    pub fn kind(&self) -> AssetKind {
        match self {
            AssetView::Model(_) => AssetKind::Model,
            AssetView::Avatar(_) => AssetKind::Avatar,
            AssetView::Emote(_) => AssetKind::Emote,
            AssetView::Script(_) => AssetKind::Script,
        }
    }

    pub fn as_model(&self) -> Option<&ModelView> {
        match self {
            AssetView::Model(view) => Some(view),
            _ => None,
        }
    }

    pub fn as_avatar(&self) -> Option<&AvatarView> {
        match self {
            AssetView::Avatar(view) => Some(view),
            _ => None,
        }
    }

    pub fn as_emote(&self) -> Option<&EmoteView> {
        match self {
            AssetView::Emote(view) => Some(view),
            _ => None,
        }
    }

    pub fn as_script(&self) -> Option<&ScriptView> {
        match self {
            AssetView::Script(view) => Some(view),
            _ => None,
        }
    }
}
