//! Brings graph tables into the vocabulary of the OSM wire format.
//!
//! Each step is a pure function over rows; [`normalize`] chains them.

use std::collections::BTreeMap;

use chrono::Utc;

use crate::config::WriterConfig;
use crate::data::graph::{EdgeTable, MultiDiGraph, NodeTable, Row, Value};
use crate::data::osm::OsmId;
use crate::data::GENERATOR_NAME;
use crate::errors::{Error, Result};

pub const ONEWAY: &str = "oneway";

/// What the writer was given: a graph, or its node and edge tables.
#[derive(Debug, Clone, Copy)]
pub enum GraphSource<'a> {
    Graph(&'a MultiDiGraph),
    Tables(&'a NodeTable, &'a EdgeTable),
}

impl<'a> GraphSource<'a> {
    /// Exactly one of `graph` and `tables` must be given.
    pub fn from_parts(
        graph: Option<&'a MultiDiGraph>,
        tables: Option<(&'a NodeTable, &'a EdgeTable)>,
    ) -> Result<GraphSource<'a>> {
        match (graph, tables) {
            (Some(graph), None) => Ok(GraphSource::Graph(graph)),
            (None, Some((nodes, edges))) => Ok(GraphSource::Tables(nodes, edges)),
            (None, None) => Err(Error::invalid_input("either a graph or node/edge tables must be supplied")),
            (Some(_), Some(_)) => Err(Error::invalid_input("supply a graph or node/edge tables, not both")),
        }
    }

    fn tables(self) -> (NodeTable, EdgeTable) {
        match self {
            GraphSource::Graph(graph) => graph.to_tables(),
            GraphSource::Tables(nodes, edges) => (nodes.clone(), edges.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEdge {
    pub way_id: OsmId,
    pub u: OsmId,
    pub v: OsmId,
    pub row: Row,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTables {
    /// Node rows in ascending id order.
    pub nodes: Vec<Row>,
    /// Edge rows in input order.
    pub edges: Vec<NormalizedEdge>,
}

impl NormalizedTables {
    /// Edges grouped by way id, ascending. Edges keep their input order
    /// within a group.
    pub fn ways(&self) -> BTreeMap<OsmId, Vec<&NormalizedEdge>> {
        let mut ways: BTreeMap<OsmId, Vec<&NormalizedEdge>> = BTreeMap::new();
        for edge in &self.edges {
            ways.entry(edge.way_id).or_default().push(edge);
        }
        ways
    }
}

/// Fixed history written on every element.
#[derive(Debug, Clone, PartialEq)]
pub struct Provenance {
    pub uid: i64,
    pub user: String,
    pub version: i64,
    pub changeset: i64,
    pub timestamp: String,
}

impl Provenance {
    pub fn synthetic(timestamp: &str) -> Provenance {
        Provenance {
            uid: 1,
            user: GENERATOR_NAME.to_string(),
            version: 1,
            changeset: 1,
            timestamp: timestamp.to_string(),
        }
    }
}

pub fn utc_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

pub fn rename_coordinates(mut row: Row) -> Row {
    if let Some(x) = row.remove("x") {
        row.insert("lon".to_string(), x);
    }
    if let Some(y) = row.remove("y") {
        row.insert("lat".to_string(), y);
    }
    row
}

pub fn round_to(value: f64, precision: u8) -> f64 {
    let factor = 10f64.powi(i32::from(precision));
    (value * factor).round() / factor
}

/// Rounds `lat`/`lon`, which must both be numeric.
pub fn round_coordinates(mut row: Row, id: OsmId, precision: u8) -> Result<Row> {
    for column in ["lat", "lon"] {
        let value = row
            .get(column)
            .and_then(Value::as_f64)
            .ok_or_else(|| Error::invalid_input(format!("node {} has no numeric '{}' coordinate", id, column)))?;
        row.insert(column.to_string(), Value::Float(round_to(value, precision)));
    }
    Ok(row)
}

pub fn stamp_provenance(mut row: Row, provenance: &Provenance) -> Row {
    row.insert("uid".to_string(), Value::Int(provenance.uid));
    row.insert("user".to_string(), Value::Text(provenance.user.clone()));
    row.insert("version".to_string(), Value::Int(provenance.version));
    row.insert("changeset".to_string(), Value::Int(provenance.changeset));
    row.insert("timestamp".to_string(), Value::Text(provenance.timestamp.clone()));
    row
}

/// Fills a missing `oneway` with `default` and spells booleans as `yes`/`no`.
/// Other strings are left alone.
pub fn normalize_oneway(mut row: Row, default: bool) -> Row {
    let value = match row.remove(ONEWAY) {
        None => Value::Bool(default),
        Some(value) if value.is_null() => Value::Bool(default),
        Some(value) => value,
    };
    let normalized = match value {
        Value::Bool(true) => Value::Text("yes".to_string()),
        Value::Bool(false) => Value::Text("no".to_string()),
        Value::Text(text) if text == "True" => Value::Text("yes".to_string()),
        Value::Text(text) if text == "False" => Value::Text("no".to_string()),
        other => other,
    };
    row.insert(ONEWAY.to_string(), normalized);
    row
}

/// Reuses `column` as the way id when every edge carries an integer there;
/// otherwise each edge becomes its own way, numbered by position.
pub fn way_ids(edges: &EdgeTable, column: &str) -> Vec<OsmId> {
    let existing: Option<Vec<OsmId>> = edges
        .rows
        .iter()
        .map(|edge| edge.attrs.get(column).and_then(Value::as_i64))
        .collect();
    match existing {
        Some(ids) if !ids.is_empty() => ids,
        _ => (0..).take(edges.len()).collect(),
    }
}

fn check_endpoints(nodes: &NodeTable, edges: &EdgeTable) -> Result<()> {
    for edge in &edges.rows {
        for endpoint in [edge.u, edge.v] {
            if !nodes.contains(endpoint) {
                return Err(Error::invalid_input(format!(
                    "edge {} -> {} references unknown node {}",
                    edge.u, edge.v, endpoint
                )));
            }
        }
    }
    Ok(())
}

pub fn normalize(source: GraphSource, config: &WriterConfig, timestamp: &str) -> Result<NormalizedTables> {
    let (node_table, edge_table) = source.tables();
    check_endpoints(&node_table, &edge_table)?;
    let provenance = Provenance::synthetic(timestamp);

    let nodes = node_table
        .rows
        .into_iter()
        .map(|(id, row)| {
            let mut row = rename_coordinates(row);
            row.insert("id".to_string(), Value::Int(id));
            let row = round_coordinates(row, id, config.coordinate_precision)?;
            Ok(stamp_provenance(row, &provenance))
        })
        .collect::<Result<Vec<Row>>>()?;

    let ids = way_ids(&edge_table, &config.way_id_column);
    let edges = edge_table
        .rows
        .into_iter()
        .zip(ids)
        .map(|(edge, way_id)| {
            let mut row = edge.attrs;
            row.remove(&config.way_id_column);
            row.insert("id".to_string(), Value::Int(way_id));
            row.insert("u".to_string(), Value::Int(edge.u));
            row.insert("v".to_string(), Value::Int(edge.v));
            row.insert("key".to_string(), Value::Int(i64::from(edge.key)));
            let row = normalize_oneway(stamp_provenance(row, &provenance), config.oneway_default);
            NormalizedEdge {
                way_id,
                u: edge.u,
                v: edge.v,
                row,
            }
        })
        .collect();

    Ok(NormalizedTables { nodes, edges })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::graph::row;
    use crate::errors::ErrorKind;
    use rstest::rstest;

    const NOW: &str = "2024-05-01T12:00:00Z";

    fn two_node_graph() -> MultiDiGraph {
        let mut graph = MultiDiGraph::new();
        graph.add_node(1, row([("x", 0.123_456_789), ("y", 51.000_000_4)]));
        graph.add_node(2, row([("x", 1.0), ("y", 51.0)]));
        graph.add_edge(1, 2, row([("highway", Value::from("primary")), ("oneway", Value::Null)]));
        graph
    }

    #[test]
    fn renames_and_rounds_coordinates() {
        let tables = normalize(GraphSource::Graph(&two_node_graph()), &WriterConfig::default(), NOW).unwrap();
        let first = &tables.nodes[0];
        assert_eq!(first.get("lon"), Some(&Value::Float(0.123457)));
        assert_eq!(first.get("lat"), Some(&Value::Float(51.0)));
        assert_eq!(first.get("id"), Some(&Value::Int(1)));
        assert!(first.get("x").is_none());
    }

    #[test]
    fn stamps_synthetic_history() {
        let tables = normalize(GraphSource::Graph(&two_node_graph()), &WriterConfig::default(), NOW).unwrap();
        for row in tables.nodes.iter().chain(tables.edges.iter().map(|edge| &edge.row)) {
            assert_eq!(row.get("uid"), Some(&Value::Int(1)));
            assert_eq!(row.get("user"), Some(&Value::from(GENERATOR_NAME)));
            assert_eq!(row.get("version"), Some(&Value::Int(1)));
            assert_eq!(row.get("changeset"), Some(&Value::Int(1)));
            assert_eq!(row.get("timestamp"), Some(&Value::from(NOW)));
        }
    }

    #[rstest]
    #[case(None, false, "no")]
    #[case(None, true, "yes")]
    #[case(Some(Value::Null), false, "no")]
    #[case(Some(Value::Bool(true)), false, "yes")]
    #[case(Some(Value::Bool(false)), true, "no")]
    #[case(Some(Value::from("True")), false, "yes")]
    #[case(Some(Value::from("-1")), false, "-1")]
    #[case(Some(Value::from("reversible")), false, "reversible")]
    fn oneway_wire_values(#[case] value: Option<Value>, #[case] default: bool, #[case] expected: &str) {
        let mut input = Row::new();
        if let Some(value) = value {
            input.insert(ONEWAY.to_string(), value);
        }
        let output = normalize_oneway(input, default);
        assert_eq!(output.get(ONEWAY), Some(&Value::from(expected)));
    }

    #[test]
    fn reuses_integer_grouping_column() {
        let mut edges = EdgeTable::new();
        edges.push(1, 2, row([("uniqueid", Value::Int(500)), ("id", Value::Int(9))]));
        edges.push(2, 3, row([("uniqueid", Value::Int(500))]));
        edges.push(3, 4, row([("uniqueid", Value::Int(501))]));
        assert_eq!(way_ids(&edges, "uniqueid"), vec![500, 500, 501]);
    }

    #[test]
    fn synthesizes_ids_when_grouping_is_incomplete() {
        let mut edges = EdgeTable::new();
        edges.push(1, 2, row([("uniqueid", Value::Int(500))]));
        edges.push(2, 3, row([("uniqueid", Value::Null)]));
        assert_eq!(way_ids(&edges, "uniqueid"), vec![0, 1]);
        assert_eq!(way_ids(&edges, "osmid"), vec![0, 1]);
    }

    #[test]
    fn grouping_column_becomes_id() {
        let mut nodes = NodeTable::new();
        for id in 1..=3 {
            nodes.insert(id, row([("x", 0.0), ("y", 0.0)]));
        }
        let mut edges = EdgeTable::new();
        edges.push(1, 2, row([("uniqueid", 77_i64), ("id", 9)]));
        edges.push(2, 3, row([("uniqueid", 77_i64)]));

        let tables = normalize(GraphSource::Tables(&nodes, &edges), &WriterConfig::default(), NOW).unwrap();
        assert_eq!(tables.edges[0].row.get("id"), Some(&Value::Int(77)));
        assert!(tables.edges[0].row.get("uniqueid").is_none());
        assert_eq!(tables.ways().get(&77).map(Vec::len), Some(2));
    }

    #[test]
    fn dangling_edge_is_invalid_input() {
        let mut graph = two_node_graph();
        graph.add_edge(2, 3, Row::new());
        let err = normalize(GraphSource::Graph(&graph), &WriterConfig::default(), NOW).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
        assert_eq!(err.message, "edge 2 -> 3 references unknown node 3");
    }

    #[test]
    fn node_without_coordinates_is_invalid_input() {
        let mut nodes = NodeTable::new();
        nodes.insert(1, row([("x", 0.0)]));
        let err = normalize(GraphSource::Tables(&nodes, &EdgeTable::new()), &WriterConfig::default(), NOW)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
    }

    #[test]
    fn source_requires_exactly_one_input() {
        let graph = MultiDiGraph::new();
        let nodes = NodeTable::new();
        let edges = EdgeTable::new();
        assert!(GraphSource::from_parts(Some(&graph), None).is_ok());
        assert!(GraphSource::from_parts(None, Some((&nodes, &edges))).is_ok());
        let err = GraphSource::from_parts(None, None).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
        assert!(GraphSource::from_parts(Some(&graph), Some((&nodes, &edges))).is_err());
    }

    #[rstest]
    #[case(51.507_234_9, 6, 51.507235)]
    #[case(-0.127_649, 2, -0.13)]
    #[case(3.0, 0, 3.0)]
    fn rounding(#[case] value: f64, #[case] precision: u8, #[case] expected: f64) {
        assert!((round_to(value, precision) - expected).abs() < 1e-12);
    }
}
