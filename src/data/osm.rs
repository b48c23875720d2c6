use std::collections::BTreeMap;

use serde::Serialize;

pub type OsmId = i64;

pub type Tags = BTreeMap<String, String>;

/// Per-element bookkeeping attributes. Anything else found on the element's
/// open tag is kept verbatim in `extra`.
#[derive(Serialize, Debug, Default, Clone, PartialEq)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changeset: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Node {
    pub id: OsmId,
    pub lat: f64,
    pub lon: f64,
    #[serde(flatten)]
    pub meta: Metadata,
    pub tags: Tags,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Way {
    pub id: OsmId,
    #[serde(flatten)]
    pub meta: Metadata,
    pub nodes: Vec<OsmId>,
    pub tags: Tags,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Member {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "ref")]
    pub reference: OsmId,
    pub role: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Relation {
    pub id: OsmId,
    #[serde(flatten)]
    pub meta: Metadata,
    pub members: Vec<Member>,
    pub tags: Tags,
}

/// One record of an Overpass-shaped response.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Element {
    Node(Node),
    Way(Way),
    Relation(Relation),
}

impl Element {
    pub fn kind(&self) -> &'static str {
        match self {
            Element::Node(_) => "node",
            Element::Way(_) => "way",
            Element::Relation(_) => "relation",
        }
    }
}

/// Map data as defined in the .osm file, elements kept in file order.
/// Serializes to the JSON shape returned by the Overpass API.
#[derive(Serialize, Debug, Default, Clone, PartialEq)]
pub struct Document {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
    pub elements: Vec<Element>,
}

impl Document {
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.elements.iter().filter_map(|element| match element {
            Element::Node(node) => Some(node),
            _ => None,
        })
    }

    pub fn ways(&self) -> impl Iterator<Item = &Way> {
        self.elements.iter().filter_map(|element| match element {
            Element::Way(way) => Some(way),
            _ => None,
        })
    }

    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.elements.iter().filter_map(|element| match element {
            Element::Relation(relation) => Some(relation),
            _ => None,
        })
    }
}
