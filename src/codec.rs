//! Asset path rewriting between the device-local layout and portable URIs.
//!
//! Local content trees point at `note-assets/<note>/<file>` and
//! `file-assets/<file>`; exported snapshots use `assets://` and
//! `file-assets://` so another device can resolve them against its own roots.

use crate::entity::{ContentNode, NoteLibrary};

pub const LOCAL_NOTE_ASSETS: &str = "note-assets/";
pub const LOCAL_FILE_ASSETS: &str = "file-assets/";
pub const PORTABLE_NOTE_ASSETS: &str = "assets://";
pub const PORTABLE_FILE_ASSETS: &str = "file-assets://";

/// Rewrite a local asset path to its portable form.
pub fn encode_path(path: &str) -> String {
    // `file-assets://` also starts with `file-assets/`, so check portable first.
    if path.starts_with(PORTABLE_FILE_ASSETS) || path.starts_with(PORTABLE_NOTE_ASSETS) {
        return path.to_string();
    }
    if let Some(rest) = path.strip_prefix(LOCAL_NOTE_ASSETS) {
        format!("{}{}", PORTABLE_NOTE_ASSETS, rest)
    } else if let Some(rest) = path.strip_prefix(LOCAL_FILE_ASSETS) {
        format!("{}{}", PORTABLE_FILE_ASSETS, rest)
    } else {
        path.to_string()
    }
}

/// Rewrite a portable asset URI back to the local layout.
pub fn decode_path(path: &str) -> String {
    if let Some(rest) = path.strip_prefix(PORTABLE_FILE_ASSETS) {
        format!("{}{}", LOCAL_FILE_ASSETS, rest)
    } else if let Some(rest) = path.strip_prefix(PORTABLE_NOTE_ASSETS) {
        format!("{}{}", LOCAL_NOTE_ASSETS, rest)
    } else {
        path.to_string()
    }
}

pub fn encode_tree(tree: &ContentNode) -> ContentNode {
    let mut out = tree.clone();
    out.for_each_asset_path_mut(&mut |path| *path = encode_path(path));
    out
}

pub fn decode_tree(tree: &ContentNode) -> ContentNode {
    let mut out = tree.clone();
    out.for_each_asset_path_mut(&mut |path| *path = decode_path(path));
    out
}

/// Encode every note's content in place.
pub fn encode_library(library: &mut NoteLibrary) {
    for note in library.notes.values_mut() {
        note.content
            .for_each_asset_path_mut(&mut |path| *path = encode_path(path));
    }
}

/// Decode every note's content in place.
pub fn decode_library(library: &mut NoteLibrary) {
    for note in library.notes.values_mut() {
        note.content
            .for_each_asset_path_mut(&mut |path| *path = decode_path(path));
    }
}
