use serde::Deserialize;

use crate::etl::aggregate::Aggregation;

/// Options controlling how a graph is written out as OSM XML.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct WriterConfig {
    /// Columns written as attributes of each `<node>`, in this order.
    pub node_attrs: Vec<String>,
    /// Columns written as `<tag>` children of each `<node>`.
    pub node_tags: Vec<String>,
    pub edge_attrs: Vec<String>,
    pub edge_tags: Vec<String>,
    /// One `<way>` per way id when set, one per edge otherwise.
    pub merge_edges: bool,
    /// Tags computed over every edge of a merged way, e.g. `[["length", "sum"]]`.
    pub edge_tag_aggs: Vec<(String, Aggregation)>,
    /// Fills `oneway` where an edge lacks it.
    pub oneway_default: bool,
    pub format_version: String,
    /// Decimal places kept in `lat`/`lon`. 6 is roughly 11cm at the equator.
    pub coordinate_precision: u8,
    /// Edge column that groups edges into ways. Edges without it become
    /// single-edge ways.
    pub way_id_column: String,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

impl Default for WriterConfig {
    fn default() -> Self {
        WriterConfig {
            node_attrs: strings(&["id", "timestamp", "uid", "user", "version", "changeset", "lat", "lon"]),
            node_tags: strings(&["highway"]),
            edge_attrs: strings(&["id", "timestamp", "uid", "user", "version", "changeset"]),
            edge_tags: strings(&["highway", "lanes", "maxspeed", "name", "oneway"]),
            merge_edges: true,
            edge_tag_aggs: Vec::new(),
            oneway_default: false,
            format_version: "0.6".to_string(),
            coordinate_precision: 6,
            way_id_column: "uniqueid".to_string(),
        }
    }
}

impl WriterConfig {
    pub fn aggregation_for(&self, tag: &str) -> Option<Aggregation> {
        self.edge_tag_aggs
            .iter()
            .find(|(name, _)| name == tag)
            .map(|(_, agg)| *agg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: WriterConfig = serde_json::from_str(
            r#"{"merge_edges": false, "edge_tag_aggs": [["length", "sum"]], "coordinate_precision": 4}"#,
        )
        .unwrap();
        assert!(!config.merge_edges);
        assert_eq!(config.coordinate_precision, 4);
        assert_eq!(config.aggregation_for("length"), Some(Aggregation::Sum));
        assert_eq!(config.aggregation_for("name"), None);
        assert_eq!(config.format_version, "0.6");
        assert_eq!(config.edge_tags, WriterConfig::default().edge_tags);
    }

    #[test]
    fn unknown_aggregation_is_rejected() {
        let result: Result<WriterConfig, _> =
            serde_json::from_str(r#"{"edge_tag_aggs": [["length", "geometric_mean"]]}"#);
        assert!(result.is_err());
    }
}
