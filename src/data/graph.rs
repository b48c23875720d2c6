use std::{collections::BTreeMap, fmt, io::Read};

use serde::{Deserialize, Serialize};

use super::osm::OsmId;
use crate::errors::{Error, Result};

/// A dynamically typed table cell. Graph attributes come from arbitrary
/// upstream processing, so any column may hold any of these.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
}

impl Value {
    /// Null and NaN both count as missing.
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float(value) => value.is_nan(),
            _ => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(value) => Some(*value as f64),
            Value::Float(value) if !value.is_nan() => Some(*value),
            Value::Text(value) => value.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            Value::Text(value) => value.trim().parse().ok(),
            _ => None,
        }
    }

    /// Text as it appears in an XML attribute. `None` for missing values.
    pub fn to_wire_string(&self) -> Option<String> {
        if self.is_null() {
            None
        } else {
            Some(self.to_string())
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(true) => write!(f, "yes"),
            Value::Bool(false) => write!(f, "no"),
            Value::Int(value) => write!(f, "{}", value),
            Value::Float(value) => write!(f, "{}", value),
            Value::Text(value) => write!(f, "{}", value),
            // OSM's convention for multi-valued tags.
            Value::List(values) => {
                let parts: Vec<String> = values.iter().filter_map(Value::to_wire_string).collect();
                write!(f, "{}", parts.join(";"))
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

/// Column name → cell.
pub type Row = BTreeMap<String, Value>;

/// Builds a row from `(column, value)` pairs.
pub fn row<K, V, I>(cells: I) -> Row
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    cells.into_iter().map(|(key, value)| (key.into(), value.into())).collect()
}

/// Node table indexed by node id. Coordinates live in the `x` (longitude) and
/// `y` (latitude) columns.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct NodeTable {
    pub rows: BTreeMap<OsmId, Row>,
}

impl NodeTable {
    pub fn new() -> Self {
        NodeTable::default()
    }

    pub fn insert(&mut self, id: OsmId, row: Row) {
        self.rows.insert(id, row);
    }

    pub fn contains(&self, id: OsmId) -> bool {
        self.rows.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRow {
    pub u: OsmId,
    pub v: OsmId,
    pub key: u32,
    pub attrs: Row,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct EdgeTable {
    pub rows: Vec<EdgeRow>,
}

impl EdgeTable {
    pub fn new() -> Self {
        EdgeTable::default()
    }

    pub fn push(&mut self, u: OsmId, v: OsmId, attrs: Row) {
        let key = self
            .rows
            .iter()
            .filter(|edge| edge.u == u && edge.v == v)
            .count();
        self.rows.push(EdgeRow {
            u,
            v,
            key: u32::try_from(key).unwrap_or(u32::MAX),
            attrs,
        });
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Directed multigraph: parallel edges between the same pair of nodes are
/// told apart by their key.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MultiDiGraph {
    nodes: BTreeMap<OsmId, Row>,
    edges: Vec<EdgeRow>,
}

#[derive(Deserialize)]
struct NodeLinkNode {
    id: OsmId,
    #[serde(flatten)]
    attrs: Row,
}

#[derive(Deserialize)]
struct NodeLinkEdge {
    source: OsmId,
    target: OsmId,
    key: Option<u32>,
    #[serde(flatten)]
    attrs: Row,
}

#[derive(Deserialize)]
struct NodeLinkGraph {
    #[serde(default = "default_true")]
    directed: bool,
    nodes: Vec<NodeLinkNode>,
    #[serde(alias = "edges", default)]
    links: Vec<NodeLinkEdge>,
}

fn default_true() -> bool {
    true
}

impl MultiDiGraph {
    pub fn new() -> Self {
        MultiDiGraph::default()
    }

    pub fn add_node(&mut self, id: OsmId, attrs: Row) {
        self.nodes.insert(id, attrs);
    }

    /// Adds an edge and returns its key. Endpoints are not checked here; the
    /// writer rejects dangling edges.
    pub fn add_edge(&mut self, u: OsmId, v: OsmId, attrs: Row) -> u32 {
        let key = self.next_key(u, v);
        self.edges.push(EdgeRow { u, v, key, attrs });
        key
    }

    fn next_key(&self, u: OsmId, v: OsmId) -> u32 {
        self.edges
            .iter()
            .filter(|edge| edge.u == u && edge.v == v)
            .map(|edge| edge.key + 1)
            .max()
            .unwrap_or(0)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node(&self, id: OsmId) -> Option<&Row> {
        self.nodes.get(&id)
    }

    pub fn edges(&self) -> impl Iterator<Item = &EdgeRow> {
        self.edges.iter()
    }

    /// Splits the graph into its node and edge tables.
    pub fn to_tables(&self) -> (NodeTable, EdgeTable) {
        let nodes = NodeTable {
            rows: self.nodes.clone(),
        };
        let edges = EdgeTable {
            rows: self.edges.clone(),
        };
        (nodes, edges)
    }

    /// Loads a graph serialized in networkx node-link JSON.
    pub fn from_node_link_reader(reader: impl Read) -> Result<MultiDiGraph> {
        let data: NodeLinkGraph = serde_json::from_reader(reader)?;
        if !data.directed {
            return Err(Error::invalid_input("node-link graph must be directed"));
        }

        let mut graph = MultiDiGraph::new();
        for node in data.nodes {
            graph.add_node(node.id, node.attrs);
        }
        for link in data.links {
            let key = link.key.unwrap_or_else(|| graph.next_key(link.source, link.target));
            graph.edges.push(EdgeRow {
                u: link.source,
                v: link.target,
                key,
                attrs: link.attrs,
            });
        }
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use rstest::rstest;

    #[rstest]
    #[case(Value::Bool(true), Some("yes"))]
    #[case(Value::Bool(false), Some("no"))]
    #[case(Value::Int(50), Some("50"))]
    #[case(Value::Float(12.5), Some("12.5"))]
    #[case(Value::Text("Main Street".to_string()), Some("Main Street"))]
    #[case(Value::List(vec![Value::from("A"), Value::Null, Value::from("B")]), Some("A;B"))]
    #[case(Value::Null, None)]
    #[case(Value::Float(f64::NAN), None)]
    fn wire_strings(#[case] value: Value, #[case] expected: Option<&str>) {
        assert_eq!(value.to_wire_string().as_deref(), expected);
    }

    #[test]
    fn numbers_parse_from_text() {
        assert_eq!(Value::from("12.5").as_f64(), Some(12.5));
        assert_eq!(Value::from(" 7 ").as_i64(), Some(7));
        assert_eq!(Value::from("fast").as_f64(), None);
        assert_eq!(Value::Bool(true).as_f64(), None);
    }

    #[test]
    fn parallel_edges_get_distinct_keys() {
        let mut graph = MultiDiGraph::new();
        graph.add_node(1, Row::new());
        graph.add_node(2, Row::new());
        assert_eq!(graph.add_edge(1, 2, Row::new()), 0);
        assert_eq!(graph.add_edge(1, 2, Row::new()), 1);
        assert_eq!(graph.add_edge(2, 1, Row::new()), 0);

        let (nodes, edges) = graph.to_tables();
        assert_eq!(nodes.len(), 2);
        assert_eq!(edges.rows.iter().map(|edge| edge.key).collect::<Vec<_>>(), vec![0, 1, 0]);
    }

    #[test]
    fn reads_node_link_json() {
        let json = r#"{
            "directed": true,
            "multigraph": true,
            "graph": {"crs": "epsg:4326"},
            "nodes": [
                {"id": 1, "x": 0.0, "y": 0.0, "highway": null},
                {"id": 2, "x": 1.0, "y": 0.0, "highway": "traffic_signals"}
            ],
            "links": [
                {"source": 1, "target": 2, "key": 0, "oneway": true, "length": 111.2, "name": ["A", "B"]}
            ]
        }"#;
        let graph = MultiDiGraph::from_node_link_reader(json.as_bytes()).unwrap();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.node(1).and_then(|attrs| attrs.get("highway")), Some(&Value::Null));
        assert_eq!(
            graph.node(2).and_then(|attrs| attrs.get("x")),
            Some(&Value::Float(1.0))
        );

        let edge = graph.edges().next().unwrap();
        assert_eq!((edge.u, edge.v, edge.key), (1, 2, 0));
        assert_eq!(edge.attrs.get("oneway"), Some(&Value::Bool(true)));
        assert_eq!(edge.attrs.get("name").and_then(Value::to_wire_string).as_deref(), Some("A;B"));
    }

    #[test]
    fn rejects_undirected_node_link_json() {
        let json = r#"{"directed": false, "nodes": [], "links": []}"#;
        let err = MultiDiGraph::from_node_link_reader(json.as_bytes()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
    }
}
