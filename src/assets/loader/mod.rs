/// Loaders sit one level above the arcadia-files parsers: the parser turns
/// container bytes into a document, the loader inspects that document and
/// builds the kind-specific view over it.
pub mod avatar_loader;
pub mod emote_loader;
pub mod model_loader;
pub mod script_gate;
