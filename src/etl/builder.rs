//! Assembles OSM elements from a stream of open/close tag events.
//!
//! OSM XML never nests `node`/`way`/`relation` inside one another, so the only
//! state is the single element currently being built.

use crate::data::osm::{Element, Member, Node, Relation, Tags, Way};
use crate::errors::{Error, Result};

use super::coerce::{coerce_attrs, optional, parse_int, required, RawAttrs};

#[derive(Debug, Clone, PartialEq)]
pub enum TagEvent {
    Open { name: String, attrs: RawAttrs },
    Close { name: String },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum BuildState {
    #[default]
    Idle,
    Node(Node),
    Way(Way),
    Relation(Relation),
}

impl BuildState {
    fn describe(&self) -> &'static str {
        match self {
            BuildState::Idle => "no open element",
            BuildState::Node(_) => "<node>",
            BuildState::Way(_) => "<way>",
            BuildState::Relation(_) => "<relation>",
        }
    }

    fn tags_mut(&mut self) -> Option<&mut Tags> {
        match self {
            BuildState::Idle => None,
            BuildState::Node(node) => Some(&mut node.tags),
            BuildState::Way(way) => Some(&mut way.tags),
            BuildState::Relation(relation) => Some(&mut relation.tags),
        }
    }

    fn finish(self) -> Option<Element> {
        match self {
            BuildState::Idle => None,
            BuildState::Node(node) => Some(Element::Node(node)),
            BuildState::Way(way) => Some(Element::Way(way)),
            BuildState::Relation(relation) => Some(Element::Relation(relation)),
        }
    }
}

/// Output of one reducer step besides the next state.
#[derive(Debug, Clone, PartialEq)]
pub enum Emit {
    Header { version: Option<String>, generator: Option<String> },
    Element(Element),
}

fn expect_idle(state: &BuildState, name: &str) -> Result<()> {
    match state {
        BuildState::Idle => Ok(()),
        other => Err(Error::parse(format!("<{}> opened inside {}", name, other.describe()))),
    }
}

fn start_node(attrs: &RawAttrs) -> Result<Node> {
    let coerced = coerce_attrs(attrs)?;
    let id = coerced.id.ok_or_else(|| Error::parse("<node> is missing required attribute 'id'"))?;
    let lat = coerced
        .lat
        .ok_or_else(|| Error::parse(format!("node {} is missing required attribute 'lat'", id)))?;
    let lon = coerced
        .lon
        .ok_or_else(|| Error::parse(format!("node {} is missing required attribute 'lon'", id)))?;
    Ok(Node {
        id,
        lat,
        lon,
        meta: coerced.meta,
        tags: Tags::new(),
    })
}

fn start_way(attrs: &RawAttrs) -> Result<Way> {
    let mut coerced = coerce_attrs(attrs)?;
    let id = coerced.id.ok_or_else(|| Error::parse("<way> is missing required attribute 'id'"))?;
    keep_coordinates_as_text(&mut coerced);
    Ok(Way {
        id,
        meta: coerced.meta,
        nodes: Vec::new(),
        tags: Tags::new(),
    })
}

fn start_relation(attrs: &RawAttrs) -> Result<Relation> {
    let mut coerced = coerce_attrs(attrs)?;
    let id = coerced
        .id
        .ok_or_else(|| Error::parse("<relation> is missing required attribute 'id'"))?;
    keep_coordinates_as_text(&mut coerced);
    Ok(Relation {
        id,
        meta: coerced.meta,
        members: Vec::new(),
        tags: Tags::new(),
    })
}

// Ways and relations have no coordinates of their own.
fn keep_coordinates_as_text(coerced: &mut super::coerce::CoercedAttrs) {
    if let Some(lat) = coerced.lat.take() {
        coerced.meta.extra.insert("lat".to_string(), lat.to_string());
    }
    if let Some(lon) = coerced.lon.take() {
        coerced.meta.extra.insert("lon".to_string(), lon.to_string());
    }
}

fn reduce_open(mut state: BuildState, name: &str, attrs: &RawAttrs) -> Result<(BuildState, Option<Emit>)> {
    match name {
        "osm" => {
            expect_idle(&state, name)?;
            let header = Emit::Header {
                version: optional(attrs, "version").map(str::to_string),
                generator: optional(attrs, "generator").map(str::to_string),
            };
            Ok((state, Some(header)))
        }
        "node" => {
            expect_idle(&state, name)?;
            Ok((BuildState::Node(start_node(attrs)?), None))
        }
        "way" => {
            expect_idle(&state, name)?;
            Ok((BuildState::Way(start_way(attrs)?), None))
        }
        "relation" => {
            expect_idle(&state, name)?;
            Ok((BuildState::Relation(start_relation(attrs)?), None))
        }
        "tag" => {
            let key = required(attrs, "k", "tag")?.to_string();
            let value = required(attrs, "v", "tag")?.to_string();
            match state.tags_mut() {
                Some(tags) => {
                    tags.insert(key, value);
                }
                None => return Err(Error::parse(format!("<tag k=\"{}\"> outside of any element", key))),
            }
            Ok((state, None))
        }
        "nd" => {
            let reference = parse_int("ref", required(attrs, "ref", "nd")?)?;
            match &mut state {
                BuildState::Way(way) => way.nodes.push(reference),
                other => return Err(Error::parse(format!("<nd> inside {}", other.describe()))),
            }
            Ok((state, None))
        }
        "member" => {
            let member = Member {
                kind: optional(attrs, "type").unwrap_or_default().to_string(),
                reference: parse_int("ref", required(attrs, "ref", "member")?)?,
                role: optional(attrs, "role").unwrap_or_default().to_string(),
            };
            match &mut state {
                BuildState::Relation(relation) => relation.members.push(member),
                other => return Err(Error::parse(format!("<member> inside {}", other.describe()))),
            }
            Ok((state, None))
        }
        // bounds, note, meta, ...
        _ => Ok((state, None)),
    }
}

fn reduce_close(state: BuildState, name: &str) -> Result<(BuildState, Option<Emit>)> {
    let matches = matches!(
        (name, &state),
        ("node", BuildState::Node(_)) | ("way", BuildState::Way(_)) | ("relation", BuildState::Relation(_))
    );
    match name {
        "node" | "way" | "relation" if matches => {
            let element = state.finish().map(Emit::Element);
            Ok((BuildState::Idle, element))
        }
        "node" | "way" | "relation" => Err(Error::parse(format!(
            "</{}> closes {}",
            name,
            state.describe()
        ))),
        _ => Ok((state, None)),
    }
}

/// Advances the builder by one event.
pub fn reduce(state: BuildState, event: &TagEvent) -> Result<(BuildState, Option<Emit>)> {
    match event {
        TagEvent::Open { name, attrs } => reduce_open(state, name, attrs),
        TagEvent::Close { name } => reduce_close(state, name),
    }
}
