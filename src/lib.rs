//! Reading OpenStreetMap XML into Overpass-shaped documents, and writing
//! directed multigraphs back out as OSM XML.

pub mod config;
pub mod data;
pub mod errors;
pub mod etl;

pub use crate::config::WriterConfig;
pub use crate::data::graph::{EdgeTable, MultiDiGraph, NodeTable, Value};
pub use crate::data::osm::Document;
pub use crate::data::Diagnostic;
pub use crate::errors::{Error, ErrorKind, Result};
pub use crate::etl::normalize::GraphSource;
pub use crate::etl::parse_osm::{read_osm_xml, Parsed};
pub use crate::etl::write_osm::save_graph_xml;
