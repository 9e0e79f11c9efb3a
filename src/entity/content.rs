// src/entity/content.rs
//! Rich-text content tree.
//!
//! The editor's document format is opaque to the sync engine except for
//! asset references, so nodes are classified into a small tagged union and
//! every field the engine does not understand is carried through verbatim.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Node kinds whose `src` attribute points at a stored asset.
pub const ASSET_NODE_KINDS: &[&str] = &["image", "imageResize", "video", "audio", "fileEmbed"];

const ASSET_ATTR: &str = "src";
const TEXT_KIND: &str = "text";
const PARAGRAPH_KIND: &str = "paragraph";
const DOC_KIND: &str = "doc";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNode", into = "RawNode")]
pub enum ContentNode {
    Text(TextNode),
    Paragraph(Element),
    Asset(AssetNode),
    Container(Element),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextNode {
    pub text: String,
    pub attrs: Option<Map<String, Value>>,
    pub marks: Option<Vec<Value>>,
    pub extra: Map<String, Value>,
}

/// Any non-text node: its kind, attributes, children and unknown keys.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub kind: String,
    pub attrs: Option<Map<String, Value>>,
    pub children: Option<Vec<ContentNode>>,
    pub marks: Option<Vec<Value>>,
    pub extra: Map<String, Value>,
}

/// An asset-reference node. `element.attrs` holds every attribute except the
/// asset path itself.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetNode {
    pub path: String,
    pub element: Element,
}

impl ContentNode {
    /// An empty `doc` root.
    pub fn empty_doc() -> Self {
        ContentNode::Container(Element {
            kind: DOC_KIND.to_string(),
            children: Some(Vec::new()),
            ..Element::default()
        })
    }

    pub fn text(text: impl Into<String>) -> Self {
        ContentNode::Text(TextNode {
            text: text.into(),
            ..TextNode::default()
        })
    }

    pub fn paragraph(children: Vec<ContentNode>) -> Self {
        ContentNode::Paragraph(Element {
            kind: PARAGRAPH_KIND.to_string(),
            children: Some(children),
            ..Element::default()
        })
    }

    pub fn container(kind: impl Into<String>, children: Vec<ContentNode>) -> Self {
        ContentNode::Container(Element {
            kind: kind.into(),
            children: Some(children),
            ..Element::default()
        })
    }

    pub fn asset(kind: impl Into<String>, path: impl Into<String>) -> Self {
        ContentNode::Asset(AssetNode {
            path: path.into(),
            element: Element {
                kind: kind.into(),
                attrs: Some(Map::new()),
                ..Element::default()
            },
        })
    }

    pub fn kind(&self) -> &str {
        match self {
            ContentNode::Text(_) => TEXT_KIND,
            ContentNode::Paragraph(el) | ContentNode::Container(el) => &el.kind,
            ContentNode::Asset(asset) => &asset.element.kind,
        }
    }

    pub fn children(&self) -> &[ContentNode] {
        match self {
            ContentNode::Text(_) => &[],
            ContentNode::Paragraph(el) | ContentNode::Container(el) => {
                el.children.as_deref().unwrap_or(&[])
            }
            ContentNode::Asset(asset) => asset.element.children.as_deref().unwrap_or(&[]),
        }
    }

    /// Visit every asset path in the tree, depth first.
    pub fn for_each_asset_path_mut(&mut self, f: &mut impl FnMut(&mut String)) {
        match self {
            ContentNode::Text(_) => {}
            ContentNode::Paragraph(el) | ContentNode::Container(el) => {
                for child in el.children.iter_mut().flatten() {
                    child.for_each_asset_path_mut(f);
                }
            }
            ContentNode::Asset(asset) => {
                f(&mut asset.path);
                for child in asset.element.children.iter_mut().flatten() {
                    child.for_each_asset_path_mut(f);
                }
            }
        }
    }

    /// Collect every asset path in the tree, depth first.
    pub fn asset_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_asset_paths(&mut out);
        out
    }

    fn collect_asset_paths(&self, out: &mut Vec<String>) {
        if let ContentNode::Asset(asset) = self {
            out.push(asset.path.clone());
        }
        for child in self.children() {
            child.collect_asset_paths(out);
        }
    }
}

impl Default for ContentNode {
    fn default() -> Self {
        ContentNode::empty_doc()
    }
}

/// Wire shape of a node, shared by every variant.
#[derive(Serialize, Deserialize)]
struct RawNode {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    attrs: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<Vec<ContentNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    marks: Option<Vec<Value>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl TryFrom<RawNode> for ContentNode {
    type Error = String;

    fn try_from(raw: RawNode) -> Result<Self, Self::Error> {
        let RawNode {
            kind,
            mut attrs,
            content,
            text,
            marks,
            mut extra,
        } = raw;

        if kind == TEXT_KIND {
            if content.is_some() {
                return Err("text node cannot have child content".to_string());
            }
            let text = text.ok_or_else(|| "text node is missing its text".to_string())?;
            return Ok(ContentNode::Text(TextNode {
                text,
                attrs,
                marks,
                extra,
            }));
        }

        // Only text nodes own a `text` key; keep it verbatim on anything else.
        if let Some(text) = text {
            extra.insert("text".to_string(), Value::String(text));
        }

        if ASSET_NODE_KINDS.contains(&kind.as_str()) {
            let path = match attrs.as_mut().and_then(|a| a.remove(ASSET_ATTR)) {
                Some(Value::String(path)) => Some(path),
                Some(other) => {
                    // Not a path; put it back and treat the node as generic.
                    if let Some(a) = attrs.as_mut() {
                        a.insert(ASSET_ATTR.to_string(), other);
                    }
                    None
                }
                None => None,
            };
            if let Some(path) = path {
                return Ok(ContentNode::Asset(AssetNode {
                    path,
                    element: Element {
                        kind,
                        attrs,
                        children: content,
                        marks,
                        extra,
                    },
                }));
            }
        }

        let element = Element {
            kind,
            attrs,
            children: content,
            marks,
            extra,
        };
        if element.kind == PARAGRAPH_KIND {
            Ok(ContentNode::Paragraph(element))
        } else {
            Ok(ContentNode::Container(element))
        }
    }
}

impl From<ContentNode> for RawNode {
    fn from(node: ContentNode) -> Self {
        match node {
            ContentNode::Text(t) => RawNode {
                kind: TEXT_KIND.to_string(),
                attrs: t.attrs,
                content: None,
                text: Some(t.text),
                marks: t.marks,
                extra: t.extra,
            },
            ContentNode::Paragraph(el) | ContentNode::Container(el) => element_to_raw(el),
            ContentNode::Asset(asset) => {
                let mut raw = element_to_raw(asset.element);
                raw.attrs
                    .get_or_insert_with(Map::new)
                    .insert(ASSET_ATTR.to_string(), Value::String(asset.path));
                raw
            }
        }
    }
}

fn element_to_raw(el: Element) -> RawNode {
    let mut extra = el.extra;
    let text = match extra.remove("text") {
        Some(Value::String(s)) => Some(s),
        Some(other) => {
            extra.insert("text".to_string(), other);
            None
        }
        None => None,
    };
    RawNode {
        kind: el.kind,
        attrs: el.attrs,
        content: el.children,
        text,
        marks: el.marks,
        extra,
    }
}
