//! Typed fields from raw attribute strings.
//!
//! Which fields are numeric is fixed by [`FIELDS`]; every attribute that is
//! not listed there is carried through as a string.

use crate::data::osm::{Metadata, OsmId};
use crate::errors::{Error, Result};

/// Attribute name → unescaped value, in document order.
pub type RawAttrs = Vec<(String, String)>;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CoercedAttrs {
    pub id: Option<OsmId>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub meta: Metadata,
}

type FieldParser = fn(&mut CoercedAttrs, &str) -> Result<()>;

const FIELDS: [(&str, FieldParser); 8] = [
    ("id", set_id),
    ("lat", set_lat),
    ("lon", set_lon),
    ("uid", set_uid),
    ("version", set_version),
    ("changeset", set_changeset),
    ("user", set_user),
    ("timestamp", set_timestamp),
];

pub fn parse_int(name: &str, raw: &str) -> Result<i64> {
    raw.trim()
        .parse()
        .map_err(|_| Error::parse(format!("attribute '{}' is not an integer: '{}'", name, raw)))
}

pub fn parse_float(name: &str, raw: &str) -> Result<f64> {
    raw.trim()
        .parse()
        .map_err(|_| Error::parse(format!("attribute '{}' is not a number: '{}'", name, raw)))
}

fn set_id(attrs: &mut CoercedAttrs, raw: &str) -> Result<()> {
    attrs.id = Some(parse_int("id", raw)?);
    Ok(())
}

fn set_lat(attrs: &mut CoercedAttrs, raw: &str) -> Result<()> {
    attrs.lat = Some(parse_float("lat", raw)?);
    Ok(())
}

fn set_lon(attrs: &mut CoercedAttrs, raw: &str) -> Result<()> {
    attrs.lon = Some(parse_float("lon", raw)?);
    Ok(())
}

fn set_uid(attrs: &mut CoercedAttrs, raw: &str) -> Result<()> {
    attrs.meta.uid = Some(parse_int("uid", raw)?);
    Ok(())
}

fn set_version(attrs: &mut CoercedAttrs, raw: &str) -> Result<()> {
    attrs.meta.version = Some(parse_int("version", raw)?);
    Ok(())
}

fn set_changeset(attrs: &mut CoercedAttrs, raw: &str) -> Result<()> {
    attrs.meta.changeset = Some(parse_int("changeset", raw)?);
    Ok(())
}

fn set_user(attrs: &mut CoercedAttrs, raw: &str) -> Result<()> {
    attrs.meta.user = Some(raw.to_string());
    Ok(())
}

fn set_timestamp(attrs: &mut CoercedAttrs, raw: &str) -> Result<()> {
    attrs.meta.timestamp = Some(raw.to_string());
    Ok(())
}

fn field_parser(name: &str) -> Option<FieldParser> {
    FIELDS
        .iter()
        .find(|(field, _)| *field == name)
        .map(|(_, parser)| *parser)
}

pub fn coerce_attrs(raw: &[(String, String)]) -> Result<CoercedAttrs> {
    let mut attrs = CoercedAttrs::default();
    for (name, value) in raw {
        match field_parser(name) {
            Some(parser) => parser(&mut attrs, value)?,
            None => {
                attrs.meta.extra.insert(name.clone(), value.clone());
            }
        }
    }
    Ok(attrs)
}

/// Looks up an attribute that must be present on `element`.
pub fn required<'a>(raw: &'a [(String, String)], name: &str, element: &str) -> Result<&'a str> {
    raw.iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
        .ok_or_else(|| Error::parse(format!("<{}> is missing required attribute '{}'", element, name)))
}

pub fn optional<'a>(raw: &'a [(String, String)], name: &str) -> Option<&'a str> {
    raw.iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}
