mod content;
mod library;
mod note;

pub use content::{AssetNode, ContentNode, Element, TextNode, ASSET_NODE_KINDS};
pub use library::{NoteLibrary, Tombstones};
pub use note::{now_millis, Note, NoteCollection};
