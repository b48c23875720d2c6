use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::writer::Writer;

use crate::config::WriterConfig;
use crate::data::graph::{MultiDiGraph, Row, Value};
use crate::data::osm::OsmId;
use crate::data::{generator_signature, Diagnostic};
use crate::errors::{Error, Result};
use crate::etl::aggregate::merged_way_tags;
use crate::etl::normalize::{normalize, utc_timestamp, GraphSource, NormalizedEdge, NormalizedTables};
use crate::etl::way_order::{reconstruct, EdgeRef};
use crate::etl::Etl;

pub const ETL_NAME: &str = "write_osm";
pub const OUTPUT_FILE_NAME: &str = "graph.osm";

/// In-memory XML element. The whole document is built before anything is
/// written.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    pub name: &'static str,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    fn new(name: &'static str, attrs: Vec<(String, String)>) -> XmlElement {
        XmlElement {
            name,
            attrs,
            children: Vec::new(),
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

/// Present, non-null columns of `row` named in `names`, in `names` order.
fn select_columns(row: &Row, names: &[String]) -> Vec<(String, String)> {
    names
        .iter()
        .filter_map(|name| {
            row.get(name)
                .and_then(Value::to_wire_string)
                .map(|value| (name.clone(), value))
        })
        .collect()
}

fn tag_element(key: String, value: String) -> XmlElement {
    XmlElement::new("tag", vec![("k".to_string(), key), ("v".to_string(), value)])
}

fn nd_element(reference: OsmId) -> XmlElement {
    XmlElement::new("nd", vec![("ref".to_string(), reference.to_string())])
}

pub fn node_element(row: &Row, node_attrs: &[String], node_tags: &[String]) -> XmlElement {
    let mut node = XmlElement::new("node", select_columns(row, node_attrs));
    node.children = select_columns(row, node_tags)
        .into_iter()
        .map(|(key, value)| tag_element(key, value))
        .collect();
    node
}

/// A two-node way for a single edge.
pub fn edge_way_element(edge: &NormalizedEdge, config: &WriterConfig) -> XmlElement {
    let mut way = XmlElement::new("way", select_columns(&edge.row, &config.edge_attrs));
    way.children.push(nd_element(edge.u));
    way.children.push(nd_element(edge.v));
    way.children.extend(
        select_columns(&edge.row, &config.edge_tags)
            .into_iter()
            .map(|(key, value)| tag_element(key, value)),
    );
    way
}

/// One way for all edges sharing `way_id`. Attributes come from the first
/// edge; partial node-order recovery is reported through `diagnostics`.
pub fn merged_way_element(
    way_id: OsmId,
    edges: &[&NormalizedEdge],
    config: &WriterConfig,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<XmlElement> {
    let (first, _) = edges
        .split_first()
        .ok_or_else(|| Error::invalid_input(format!("way {} has no edges", way_id)))?;
    let mut way = XmlElement::new("way", select_columns(&first.row, &config.edge_attrs));

    let refs: Vec<EdgeRef> = edges.iter().map(|edge| (edge.u, edge.v)).collect();
    let order = reconstruct(&refs);
    if !order.is_complete() {
        warn!(
            way_id = way_id,
            recovered = order.recovered,
            total = order.total;
            "Recovered order for {} of {} nodes", order.recovered, order.total
        );
        diagnostics.push(Diagnostic::PartialWayOrder {
            way_id,
            recovered: order.recovered,
            total: order.total,
        });
    }
    way.children.extend(order.nodes.iter().map(|node| nd_element(*node)));

    let rows: Vec<&Row> = edges.iter().map(|edge| &edge.row).collect();
    let tags = merged_way_tags(&first.row, &rows, config)?;
    way.children.extend(tags.into_iter().map(|(key, value)| tag_element(key, value)));
    Ok(way)
}

/// Root `<osm>` element holding every node, then every way.
pub fn build_tree(tables: &NormalizedTables, config: &WriterConfig) -> Result<(XmlElement, Vec<Diagnostic>)> {
    let mut root = XmlElement::new(
        "osm",
        vec![
            ("version".to_string(), config.format_version.clone()),
            ("generator".to_string(), generator_signature()),
        ],
    );
    let mut diagnostics = Vec::new();

    for row in &tables.nodes {
        root.children.push(node_element(row, &config.node_attrs, &config.node_tags));
    }

    if config.merge_edges {
        for (way_id, edges) in tables.ways() {
            root.children.push(merged_way_element(way_id, &edges, config, &mut diagnostics)?);
        }
    } else {
        for edge in &tables.edges {
            root.children.push(edge_way_element(edge, config));
        }
    }

    Ok((root, diagnostics))
}

fn write_element<W: Write>(writer: &mut Writer<W>, element: &XmlElement) -> Result<()> {
    let mut start = BytesStart::new(element.name);
    for (key, value) in &element.attrs {
        start.push_attribute((key.as_str(), value.as_str()));
    }
    if element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
    } else {
        writer.write_event(Event::Start(start))?;
        for child in &element.children {
            write_element(writer, child)?;
        }
        writer.write_event(Event::End(BytesEnd::new(element.name)))?;
    }
    Ok(())
}

/// Serializes the tree as UTF-8 with a leading XML declaration.
pub fn write_tree<W: Write>(root: &XmlElement, out: W) -> Result<W> {
    let mut writer = Writer::new_with_indent(out, b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    write_element(&mut writer, root)?;
    let mut out = writer.into_inner();
    out.write_all(b"\n")?;
    Ok(out)
}

/// Renders a graph as an OSM XML string.
pub fn graph_to_osm_string(source: GraphSource, config: &WriterConfig) -> Result<(String, Vec<Diagnostic>)> {
    let tables = normalize(source, config, &utc_timestamp())?;
    let (root, diagnostics) = build_tree(&tables, config)?;
    let bytes = write_tree(&root, Vec::new())?;
    let xml = String::from_utf8(bytes).map_err(|err| Error::decode(err.to_string()))?;
    Ok((xml, diagnostics))
}

/// Creates `path`, parents included, and hands the file to `write`. A
/// failed write removes the file again.
fn write_or_remove<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(fs::File) -> Result<()>,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = fs::File::create(path)?;
    if let Err(err) = write(file) {
        if let Err(remove_err) = fs::remove_file(path) {
            warn!(path = path.display().to_string(), err = remove_err.to_string(); "Could not remove partial output");
        }
        return Err(err);
    }
    Ok(())
}

fn write_file(root: &XmlElement, path: &Path) -> Result<()> {
    write_or_remove(path, |file| {
        let mut out = write_tree(root, BufWriter::new(file))?;
        out.flush()?;
        Ok(())
    })
}

/// Saves a graph as an OSM XML file. Nothing is written unless the whole
/// document could be built.
pub fn save_graph_xml(source: GraphSource, path: &Path, config: &WriterConfig) -> Result<Vec<Diagnostic>> {
    let tables = normalize(source, config, &utc_timestamp())?;
    let (root, diagnostics) = build_tree(&tables, config)?;
    write_file(&root, path)?;
    info!(
        path = path.display().to_string(),
        nodes = tables.nodes.len(),
        edges = tables.edges.len();
        "Saved graph as .osm file"
    );
    Ok(diagnostics)
}

/// Reads a node-link JSON graph and writes it as OSM XML.
pub struct WriteOsmEtl<'a> {
    input_path: PathBuf,
    config: &'a WriterConfig,
    pub diagnostics: Vec<Diagnostic>,
}

impl<'a> WriteOsmEtl<'a> {
    pub fn new(input_path: &Path, config: &'a WriterConfig) -> WriteOsmEtl<'a> {
        WriteOsmEtl {
            input_path: input_path.to_path_buf(),
            config,
            diagnostics: Vec::new(),
        }
    }
}

impl Etl for WriteOsmEtl<'_> {
    type Input = MultiDiGraph;
    type Output = XmlElement;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn output_path(&self, dir: &Path) -> PathBuf {
        dir.join(OUTPUT_FILE_NAME)
    }

    fn extract(&mut self) -> Result<Self::Input> {
        let file = fs::File::open(&self.input_path)?;
        MultiDiGraph::from_node_link_reader(std::io::BufReader::new(file))
    }

    fn transform(&mut self, input: Self::Input) -> Result<Self::Output> {
        let tables = normalize(GraphSource::Graph(&input), self.config, &utc_timestamp())?;
        let (root, diagnostics) = build_tree(&tables, self.config)?;
        self.diagnostics.extend(diagnostics);
        Ok(root)
    }

    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        write_file(&output, &self.output_path(dir))
    }
}
