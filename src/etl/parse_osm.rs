use std::borrow::Cow;
use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Cursor, Read};
use std::path::{Path, PathBuf};
use std::str;

use bzip2::read::MultiBzDecoder;
use encoding_rs::{Encoding, UTF_8};
use log::{info, warn};
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use xz::bufread::XzDecoder;

use crate::data::osm::Document;
use crate::data::{Diagnostic, GENERATOR_NAME};
use crate::errors::{Error, ErrorKind, Result};
use crate::etl::builder::{reduce, BuildState, Emit, TagEvent};
use crate::etl::coerce::RawAttrs;
use crate::etl::Etl;

pub const ETL_NAME: &str = "parse_osm";
pub const OUTPUT_FILE_NAME: &str = "osm_elements.json";

/// A document plus the advisory findings gathered while reading it.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    pub document: Document,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compression {
    None,
    Bzip2,
    Xz,
}

impl Compression {
    fn from_path(path: &Path) -> Compression {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("bz2") => Compression::Bzip2,
            Some("xz") => Compression::Xz,
            _ => Compression::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextEncoding {
    /// Strict 7-bit ASCII. The WHATWG `ascii` label means windows-1252.
    Ascii,
    Label(&'static Encoding),
}

impl TextEncoding {
    /// Accepts WHATWG labels and the usual spellings `latin-1`, `utf_8`, ...
    fn from_label(label: &str) -> Result<TextEncoding> {
        let lower = label.trim().to_ascii_lowercase();
        if lower == "ascii" || lower == "us-ascii" {
            return Ok(TextEncoding::Ascii);
        }
        [lower.clone(), lower.replace('_', "-"), lower.replace(['-', '_'], "")]
            .iter()
            .find_map(|candidate| Encoding::for_label(candidate.as_bytes()))
            .map(TextEncoding::Label)
            .ok_or_else(|| Error::decode(format!("unsupported encoding '{}'", label)))
    }

    fn decode(self, raw: &[u8]) -> Result<String> {
        match self {
            TextEncoding::Ascii if !raw.is_ascii() => Err(Error::decode(format!(
                "non-ASCII text '{}'",
                String::from_utf8_lossy(raw)
            ))),
            TextEncoding::Ascii => Ok(str::from_utf8(raw)?.to_string()),
            TextEncoding::Label(encoding) => encoding
                .decode_without_bom_handling_and_without_replacement(raw)
                .map(Cow::into_owned)
                .ok_or_else(|| {
                    Error::decode(format!(
                        "invalid {} text '{}'",
                        encoding.name(),
                        String::from_utf8_lossy(raw)
                    ))
                }),
        }
    }
}

/// Decodes a whole stream to UTF-8. Needed for encodings such as UTF-16
/// where markup bytes cannot be found without decoding.
fn transcode(mut input: Box<dyn BufRead>, encoding: &'static Encoding) -> Result<Box<dyn BufRead>> {
    let mut bytes = Vec::new();
    input.read_to_end(&mut bytes)?;
    let (text, _, malformed) = encoding.decode(&bytes);
    if malformed {
        return Err(Error::decode(format!("input is not valid {}", encoding.name())));
    }
    Ok(Box::new(Cursor::new(text.into_owned().into_bytes())))
}

/// Opens `path`, decompressing every concatenated stream of a `.bz2` or
/// `.xz` file. Returns the encoding the reader's bytes are in.
fn create_osm_reader(path: &Path, encoding: TextEncoding) -> Result<(Reader<Box<dyn BufRead>>, TextEncoding)> {
    let file = fs::File::open(path)
        .map_err(|err| Error::new(ErrorKind::Io, format!("{}: {}", path.display(), err)))?;
    let inner: Box<dyn BufRead> = match Compression::from_path(path) {
        Compression::Bzip2 => Box::new(BufReader::new(MultiBzDecoder::new(file))),
        Compression::Xz => Box::new(BufReader::new(XzDecoder::new_multi_decoder(BufReader::new(file)))),
        Compression::None => Box::new(BufReader::new(file)),
    };
    let (inner, encoding) = match encoding {
        TextEncoding::Label(label) if !label.is_ascii_compatible() => {
            (transcode(inner, label)?, TextEncoding::Label(UTF_8))
        }
        _ => (inner, encoding),
    };
    let mut reader = Reader::from_reader(inner);
    reader.trim_text(true);
    Ok((reader, encoding))
}

fn decode_name(raw: &[u8], encoding: TextEncoding) -> Result<String> {
    encoding.decode(raw)
}

fn decode_attrs(el: &BytesStart, encoding: TextEncoding) -> Result<RawAttrs> {
    let mut attrs = Vec::new();
    for attribute_res in el.attributes() {
        let attribute = attribute_res?;
        let key = decode_name(attribute.key.as_ref(), encoding)?;
        let raw_value = encoding.decode(&attribute.value)?;
        let value = unescape(&raw_value).map_err(|err| Error::parse(err.to_string()))?;
        attrs.push((key, value.into_owned()));
    }
    Ok(attrs)
}

/// Reads only as far as the root element and returns its `generator`.
fn prescan_generator(path: &Path, encoding: TextEncoding) -> Result<Option<String>> {
    let (mut reader, encoding) = create_osm_reader(path, encoding)?;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) => {
                let attrs = decode_attrs(&e, encoding)?;
                return Ok(attrs
                    .into_iter()
                    .find(|(key, _)| key == "generator")
                    .map(|(_, value)| value));
            }
            Event::Eof => return Ok(None),
            _ => (),
        }
        buf.clear();
    }
}

fn apply(state: BuildState, event: TagEvent, document: &mut Document) -> Result<BuildState> {
    let (next, emit) = reduce(state, &event)?;
    match emit {
        Some(Emit::Header { version, generator }) => {
            document.version = version;
            document.generator = generator;
        }
        Some(Emit::Element(element)) => document.elements.push(element),
        None => (),
    }
    Ok(next)
}

/// Drives the element builder over the whole event stream.
fn parse_events<R: BufRead>(reader: &mut Reader<R>, encoding: TextEncoding) -> Result<Document> {
    let mut document = Document::default();
    let mut state = BuildState::Idle;
    let mut depth: usize = 0;
    let mut saw_root = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => {
                let name = decode_name(e.name().as_ref(), encoding)?;
                if depth == 0 {
                    check_root(&name, saw_root)?;
                    saw_root = true;
                }
                depth += 1;
                let attrs = decode_attrs(&e, encoding)?;
                state = apply(state, TagEvent::Open { name, attrs }, &mut document)?;
            }
            Event::Empty(e) => {
                let name = decode_name(e.name().as_ref(), encoding)?;
                if depth == 0 {
                    check_root(&name, saw_root)?;
                    saw_root = true;
                }
                let attrs = decode_attrs(&e, encoding)?;
                state = apply(state, TagEvent::Open { name: name.clone(), attrs }, &mut document)?;
                state = apply(state, TagEvent::Close { name }, &mut document)?;
            }
            Event::End(e) => {
                let name = decode_name(e.name().as_ref(), encoding)?;
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| Error::parse(format!("unexpected </{}>", name)))?;
                state = apply(state, TagEvent::Close { name }, &mut document)?;
            }
            // Text, comments, declarations and the like carry no element data.
            _ => (),
        }
        // if we don't keep a borrow elsewhere, we can clear the buffer to keep memory usage low
        buf.clear();
    }

    if !saw_root {
        return Err(Error::parse("document has no <osm> root element"));
    }
    if depth != 0 || state != BuildState::Idle {
        return Err(Error::parse("document ended before all elements were closed"));
    }
    Ok(document)
}

fn check_root(name: &str, saw_root: bool) -> Result<()> {
    if saw_root {
        return Err(Error::parse(format!("unexpected second root element <{}>", name)));
    }
    if name != "osm" {
        return Err(Error::parse(format!("root element is <{}>, expected <osm>", name)));
    }
    Ok(())
}

fn self_generated(generator: &str) -> Option<Diagnostic> {
    if generator.contains(GENERATOR_NAME) {
        Some(Diagnostic::SelfGenerated {
            generator: generator.to_string(),
        })
    } else {
        None
    }
}

/// Reads an OSM XML file (plain, `.bz2` or `.xz`) into an Overpass-shaped
/// document.
pub fn read_osm_xml(path: &Path, encoding: &str) -> Result<Parsed> {
    let encoding = TextEncoding::from_label(encoding)?;
    let mut diagnostics = Vec::new();

    if let Some(generator) = prescan_generator(path, encoding)? {
        if let Some(diagnostic) = self_generated(&generator) {
            warn!(path = path.display().to_string(), generator = generator.as_str(); "{}", diagnostic);
            diagnostics.push(diagnostic);
        }
    }

    let (mut reader, encoding) = create_osm_reader(path, encoding)?;
    let document = parse_events(&mut reader, encoding)?;
    info!(
        path = path.display().to_string(),
        elements = document.elements.len();
        "Parsed OSM XML"
    );
    Ok(Parsed {
        document,
        diagnostics,
    })
}

/// Parses OSM XML held in memory. No provenance pre-scan is done.
pub fn parse_osm_str(xml: &str) -> Result<Document> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    reader.trim_text(true);
    parse_events(&mut reader, TextEncoding::Label(UTF_8))
}

/// Reads an .osm file and stores it as Overpass JSON.
pub struct ParseOsmEtl {
    input_path: PathBuf,
    encoding: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseOsmEtl {
    pub fn new(input_path: &Path, encoding: &str) -> ParseOsmEtl {
        ParseOsmEtl {
            input_path: input_path.to_path_buf(),
            encoding: encoding.to_string(),
            diagnostics: Vec::new(),
        }
    }
}

impl Etl for ParseOsmEtl {
    type Input = Parsed;
    type Output = Document;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn output_path(&self, dir: &Path) -> PathBuf {
        dir.join(OUTPUT_FILE_NAME)
    }

    fn extract(&mut self) -> Result<Self::Input> {
        read_osm_xml(&self.input_path, &self.encoding)
    }

    fn transform(&mut self, input: Self::Input) -> Result<Self::Output> {
        self.diagnostics.extend(input.diagnostics);
        Ok(input.document)
    }

    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        let output_file = fs::File::create(self.output_path(dir))?;
        serde_json::to_writer(BufWriter::new(output_file), &output)?;
        Ok(())
    }
}

/// Convenience for callers holding an arbitrary reader of plain OSM XML.
pub fn parse_osm_reader(input: impl Read) -> Result<Document> {
    let mut reader = Reader::from_reader(BufReader::new(input));
    reader.trim_text(true);
    parse_events(&mut reader, TextEncoding::Label(UTF_8))
}
