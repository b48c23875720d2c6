//! Tag values for a way assembled from several edges.

use std::{fmt, str::FromStr};

use serde::Deserialize;

use crate::config::WriterConfig;
use crate::data::graph::{Row, Value};
use crate::errors::{Error, Result};

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Sum,
    Mean,
    Median,
    Min,
    Max,
    Count,
    First,
    Last,
    /// Distinct values joined with `;`.
    Concat,
}

impl FromStr for Aggregation {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "sum" => Ok(Aggregation::Sum),
            "mean" => Ok(Aggregation::Mean),
            "median" => Ok(Aggregation::Median),
            "min" => Ok(Aggregation::Min),
            "max" => Ok(Aggregation::Max),
            "count" => Ok(Aggregation::Count),
            "first" => Ok(Aggregation::First),
            "last" => Ok(Aggregation::Last),
            "concat" => Ok(Aggregation::Concat),
            _ => Err(Error::invalid_input(format!("unknown aggregation '{}'", name))),
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Aggregation::Sum => "sum",
            Aggregation::Mean => "mean",
            Aggregation::Median => "median",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
            Aggregation::Count => "count",
            Aggregation::First => "first",
            Aggregation::Last => "last",
            Aggregation::Concat => "concat",
        };
        write!(f, "{}", name)
    }
}

enum Numbers {
    Ints(Vec<i64>),
    Floats(Vec<f64>),
}

fn numbers(tag: &str, agg: Aggregation, values: &[&Value]) -> Result<Numbers> {
    if values.iter().all(|value| matches!(value, Value::Int(_))) {
        return Ok(Numbers::Ints(values.iter().filter_map(|value| value.as_i64()).collect()));
    }
    values
        .iter()
        .map(|value| {
            value.as_f64().ok_or_else(|| {
                Error::invalid_input(format!(
                    "cannot {} non-numeric value '{}' of tag '{}'",
                    agg, value, tag
                ))
            })
        })
        .collect::<Result<Vec<f64>>>()
        .map(Numbers::Floats)
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    match values.len() {
        0 => None,
        len if len % 2 == 1 => values.get(mid).copied(),
        _ => Some((values.get(mid - 1)? + values.get(mid)?) / 2.0),
    }
}

/// Applies `agg` to the non-null values of a group. `None` when there is
/// nothing to aggregate.
pub fn aggregate(tag: &str, agg: Aggregation, values: &[&Value]) -> Result<Option<Value>> {
    let values: Vec<&Value> = values.iter().copied().filter(|value| !value.is_null()).collect();
    if values.is_empty() {
        return Ok(None);
    }

    let result = match agg {
        Aggregation::First => values.first().map(|value| (*value).clone()),
        Aggregation::Last => values.last().map(|value| (*value).clone()),
        Aggregation::Count => Some(Value::Int(i64::try_from(values.len()).unwrap_or(i64::MAX))),
        Aggregation::Concat => {
            let mut parts: Vec<String> = Vec::new();
            for part in values.iter().filter_map(|value| value.to_wire_string()) {
                if !parts.contains(&part) {
                    parts.push(part);
                }
            }
            Some(Value::Text(parts.join(";")))
        }
        Aggregation::Sum => match numbers(tag, agg, &values)? {
            Numbers::Ints(ints) => {
                let sum = ints.iter().try_fold(0_i64, |total, value| total.checked_add(*value));
                let sum = sum.ok_or_else(|| Error::invalid_input(format!("sum of tag '{}' overflows", tag)))?;
                Some(Value::Int(sum))
            }
            Numbers::Floats(floats) => Some(Value::Float(floats.iter().sum())),
        },
        Aggregation::Min => match numbers(tag, agg, &values)? {
            Numbers::Ints(ints) => ints.into_iter().min().map(Value::Int),
            Numbers::Floats(floats) => floats.into_iter().reduce(f64::min).map(Value::Float),
        },
        Aggregation::Max => match numbers(tag, agg, &values)? {
            Numbers::Ints(ints) => ints.into_iter().max().map(Value::Int),
            Numbers::Floats(floats) => floats.into_iter().reduce(f64::max).map(Value::Float),
        },
        Aggregation::Mean => {
            let floats = match numbers(tag, agg, &values)? {
                Numbers::Ints(ints) => ints.into_iter().map(|value| value as f64).collect(),
                Numbers::Floats(floats) => floats,
            };
            let count = floats.len() as f64;
            Some(Value::Float(floats.iter().sum::<f64>() / count))
        }
        Aggregation::Median => {
            let floats = match numbers(tag, agg, &values)? {
                Numbers::Ints(ints) => ints.into_iter().map(|value| value as f64).collect(),
                Numbers::Floats(floats) => floats,
            };
            median(floats).map(Value::Float)
        }
    };
    Ok(result)
}

/// Tags of a merged way. Tags without an aggregation are copied from `first`;
/// declared aggregations run over every edge in `group`, whether or not the
/// tag is listed in `edge_tags`.
pub fn merged_way_tags(first: &Row, group: &[&Row], config: &WriterConfig) -> Result<Vec<(String, String)>> {
    let mut tags = Vec::new();

    for tag in &config.edge_tags {
        if config.aggregation_for(tag).is_some() {
            continue;
        }
        if let Some(value) = first.get(tag).and_then(Value::to_wire_string) {
            tags.push((tag.clone(), value));
        }
    }

    for (tag, agg) in &config.edge_tag_aggs {
        let values: Vec<&Value> = group.iter().filter_map(|row| row.get(tag)).collect();
        if let Some(value) = aggregate(tag, *agg, &values)?.and_then(|value| value.to_wire_string()) {
            tags.push((tag.clone(), value));
        }
    }

    Ok(tags)
}
