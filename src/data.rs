use std::fmt;

use self::osm::OsmId;

pub mod graph;
pub mod osm;

/// Name written into the `generator` attribute of every file this crate produces,
/// and looked for when reading files back in.
pub const GENERATOR_NAME: &str = "osm_graph_xml";

pub fn generator_signature() -> String {
    format!("{} {}", GENERATOR_NAME, env!("CARGO_PKG_VERSION"))
}

/// Advisory, non-fatal findings returned next to a read or write result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// The file being read was written by this crate. Its history fields are
    /// synthetic, so the round trip loses information.
    SelfGenerated { generator: String },
    /// Only part of a merged way's node order could be recovered.
    PartialWayOrder { way_id: OsmId, recovered: usize, total: usize },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::SelfGenerated { generator } => write!(
                f,
                "file was generated by '{}': re-importing written files is not supported and may lose information",
                generator
            ),
            Diagnostic::PartialWayOrder { way_id, recovered, total } => write!(
                f,
                "way {}: recovered order for {} of {} nodes",
                way_id, recovered, total
            ),
        }
    }
}
