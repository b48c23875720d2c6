use std::env;
use std::fs::{create_dir_all, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::Deserialize;
use structured_logger::json::new_writer;
use structured_logger::Builder;

use osm_graph_xml::data::Diagnostic;
use osm_graph_xml::errors::{Error, Result};
use osm_graph_xml::etl::parse_osm::ParseOsmEtl;
use osm_graph_xml::etl::write_osm::WriteOsmEtl;
use osm_graph_xml::etl::Etl;
use osm_graph_xml::WriterConfig;

fn default_encoding() -> String {
    "utf-8".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Deserialize)]
pub struct UserConfig {
    /// `.osm`, `.osm.bz2` or `.osm.xz` to parse, or a node-link `.json` graph
    /// to write.
    pub data_path: String,
    pub dest_path: String,
    #[serde(default = "default_encoding")]
    pub encoding: String,
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub writer: WriterConfig,
}

fn load_user_config(path: &Path) -> Result<UserConfig> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn create_output_dir(config: &UserConfig) -> Result<PathBuf> {
    let input_fname = Path::new(&config.data_path)
        .file_name()
        .ok_or_else(|| Error::invalid_input("Could not get input file name"))?;
    let output_dir = Path::new(&config.dest_path).join(input_fname);
    create_dir_all(&output_dir)?;
    Ok(output_dir)
}

fn setup_logging(level: &str) {
    Builder::with_level(level)
        .with_target_writer("*", new_writer(io::stdout()))
        .init();
}

fn run_etl<E: Etl>(etl: &mut E, output_dir: &Path, overwrite: bool) -> Result<()> {
    if overwrite {
        etl.clean(output_dir)?;
    }
    etl.process(output_dir)
}

fn report(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        warn!(diagnostic = diagnostic.to_string(); "Finished with a warning");
    }
}

fn main() -> Result<()> {
    let config_path = env::args()
        .nth(1)
        .ok_or_else(|| Error::invalid_input("usage: osm_graph_xml <config.json>"))?;
    let user_config = load_user_config(Path::new(&config_path))?;
    setup_logging(&user_config.log_level);

    let output_dir = create_output_dir(&user_config)?;
    let input_path = Path::new(&user_config.data_path);
    let is_graph = input_path
        .extension()
        .map_or(false, |extension| extension.eq_ignore_ascii_case("json"));

    if is_graph {
        let mut etl = WriteOsmEtl::new(input_path, &user_config.writer);
        run_etl(&mut etl, &output_dir, user_config.overwrite)?;
        report(&etl.diagnostics);
    } else {
        let mut etl = ParseOsmEtl::new(input_path, &user_config.encoding);
        run_etl(&mut etl, &output_dir, user_config.overwrite)?;
        report(&etl.diagnostics);
    }

    info!(output_dir = output_dir.display().to_string(); "Done");
    Ok(())
}
