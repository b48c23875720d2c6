use std::fs;

use osm_graph_xml::data::graph::row;
use osm_graph_xml::etl::aggregate::Aggregation;
use osm_graph_xml::etl::parse_osm::parse_osm_reader;
use osm_graph_xml::etl::write_osm::graph_to_osm_string;
use osm_graph_xml::{
    read_osm_xml, save_graph_xml, Diagnostic, EdgeTable, ErrorKind, GraphSource, MultiDiGraph, NodeTable, Value,
    WriterConfig,
};
use tempfile::tempdir;

fn one_way_street() -> MultiDiGraph {
    let mut graph = MultiDiGraph::new();
    graph.add_node(1, row([("x", -0.127_6), ("y", 51.507_2)]));
    graph.add_node(2, row([("x", -0.127_0), ("y", 51.507_9)]));
    graph.add_edge(
        1,
        2,
        row([
            ("highway", Value::from("primary")),
            ("name", Value::from("Strand")),
            ("oneway", Value::Bool(true)),
        ]),
    );
    graph
}

#[test]
fn single_node_survives_the_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("node.osm");
    let mut graph = MultiDiGraph::new();
    graph.add_node(42, row([("x", Value::Float(13.4)), ("y", Value::Float(52.52)), ("highway", Value::from("traffic_signals"))]));

    save_graph_xml(GraphSource::Graph(&graph), &path, &WriterConfig::default()).unwrap();
    let parsed = read_osm_xml(&path, "utf-8").unwrap();

    let nodes: Vec<_> = parsed.document.nodes().collect();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].id, 42);
    assert_eq!(nodes[0].lat, 52.52);
    assert_eq!(nodes[0].lon, 13.4);
    assert_eq!(nodes[0].tags.get("highway").map(String::as_str), Some("traffic_signals"));
    assert_eq!(nodes[0].meta.uid, Some(1));
    assert_eq!(nodes[0].meta.version, Some(1));
    assert_eq!(parsed.document.ways().count(), 0);
}

#[test]
fn written_file_is_flagged_when_read_back() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("street.osm");
    save_graph_xml(GraphSource::Graph(&one_way_street()), &path, &WriterConfig::default()).unwrap();

    let parsed = read_osm_xml(&path, "utf-8").unwrap();
    assert!(matches!(
        parsed.diagnostics.as_slice(),
        [Diagnostic::SelfGenerated { generator }] if generator.starts_with("osm_graph_xml")
    ));

    let ways: Vec<_> = parsed.document.ways().collect();
    assert_eq!(ways.len(), 1);
    assert_eq!(ways[0].nodes, vec![1, 2]);
    assert_eq!(ways[0].tags.get("oneway").map(String::as_str), Some("yes"));
    assert_eq!(ways[0].tags.get("name").map(String::as_str), Some("Strand"));
    assert_eq!(parsed.document.nodes().count(), 2);
}

#[test]
fn merged_way_sums_lengths() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("merged.osm");

    let mut nodes = NodeTable::new();
    for id in 1..=4 {
        nodes.insert(id, row([("x", 0.001 * id as f64), ("y", 0.0)]));
    }
    let mut edges = EdgeTable::new();
    for (u, v, length) in [(3, 4, 25), (1, 2, 10), (2, 3, 15)] {
        edges.push(u, v, row([("uniqueid", Value::Int(900)), ("length", Value::Int(length))]));
    }
    let config = WriterConfig {
        edge_tag_aggs: vec![("length".to_string(), Aggregation::Sum)],
        ..WriterConfig::default()
    };

    let diagnostics = save_graph_xml(GraphSource::Tables(&nodes, &edges), &path, &config).unwrap();
    assert!(diagnostics.is_empty());

    let parsed = read_osm_xml(&path, "utf-8").unwrap();
    let ways: Vec<_> = parsed.document.ways().collect();
    assert_eq!(ways.len(), 1);
    assert_eq!(ways[0].id, 900);
    assert_eq!(ways[0].nodes, vec![1, 2, 3, 4]);
    assert_eq!(ways[0].tags.get("length").map(String::as_str), Some("50"));
    assert_eq!(ways[0].tags.get("oneway").map(String::as_str), Some("no"));
}

#[test]
fn unmerged_edges_keep_one_way_each() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("edges.osm");
    let mut graph = one_way_street();
    graph.add_node(3, row([("x", -0.126_5), ("y", 51.508_1)]));
    graph.add_edge(2, 3, row([("highway", Value::from("primary"))]));
    let config = WriterConfig {
        merge_edges: false,
        ..WriterConfig::default()
    };

    save_graph_xml(GraphSource::Graph(&graph), &path, &config).unwrap();
    let parsed = read_osm_xml(&path, "utf-8").unwrap();

    let ways: Vec<_> = parsed.document.ways().collect();
    assert_eq!(ways.len(), 2);
    assert_eq!(ways[0].nodes, vec![1, 2]);
    assert_eq!(ways[1].nodes, vec![2, 3]);
    assert_eq!(ways[1].tags.get("oneway").map(String::as_str), Some("no"));
}

#[test]
fn broken_graph_leaves_no_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.osm");
    let mut graph = one_way_street();
    graph.add_edge(2, 77, row([("highway", Value::from("service"))]));

    let err = save_graph_xml(GraphSource::Graph(&graph), &path, &WriterConfig::default()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidInput);
    assert!(!path.exists());
}

#[test]
fn foreign_file_has_no_diagnostics() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("foreign.osm");
    fs::write(
        &path,
        r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6" generator="CGImap 0.8.3">
  <node id="1" lat="51.5" lon="-0.12" version="3" user="mapper" uid="7"/>
  <node id="2" lat="51.6" lon="-0.13"/>
  <way id="5">
    <nd ref="1"/>
    <nd ref="2"/>
    <tag k="highway" v="footway"/>
  </way>
</osm>"#,
    )
    .unwrap();

    let parsed = read_osm_xml(&path, "utf-8").unwrap();
    assert!(parsed.diagnostics.is_empty());
    assert_eq!(parsed.document.generator.as_deref(), Some("CGImap 0.8.3"));
    assert_eq!(parsed.document.elements.len(), 3);
}

#[test]
fn in_memory_round_trip() {
    let graph = one_way_street();
    assert_eq!((graph.node_count(), graph.edge_count()), (2, 1));

    let (xml, diagnostics) = graph_to_osm_string(GraphSource::Graph(&graph), &WriterConfig::default()).unwrap();
    assert!(diagnostics.is_empty());

    let document = parse_osm_reader(xml.as_bytes()).unwrap();
    assert_eq!(document.version.as_deref(), Some("0.6"));
    assert_eq!(document.nodes().count(), 2);
    let way = document.ways().next().unwrap();
    assert_eq!(way.nodes, vec![1, 2]);
    assert_eq!(way.meta.user.as_deref(), Some("osm_graph_xml"));
}
