//! Typed search dimensions and the parser for their declarative descriptions.

use qopt_types::{ParamValue, QoptError, QoptResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

/// Sampling prior used for ranges without an explicit `distribution`.
pub const DEFAULT_DISTRIBUTION: &str = "uniform";
/// Logarithm base used for ranges without an explicit `base`.
pub const DEFAULT_BASE: i64 = 10;

const RANGE_FIELDS: [&str; 4] = ["low", "high", "distribution", "base"];

/// A single tunable axis of a parameter space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    /// Parameter name (e.g. "tie_breaker").
    pub name: String,
    /// Domain of the parameter.
    pub kind: DimensionKind,
}

/// The domain of a dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DimensionKind {
    /// Ordered discrete values.
    Categorical(Categories),
    /// Integer range [low, high] inclusive.
    Integer {
        low: i64,
        high: i64,
        prior: String,
        base: i64,
    },
    /// Continuous range [low, high].
    Real {
        low: f64,
        high: f64,
        prior: String,
        base: i64,
    },
}

/// Homogeneous discrete values of a categorical dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Categories {
    Int(Vec<i64>),
    Str(Vec<String>),
}

/// How a downstream strategy should encode a categorical dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    /// Ordinal values used as-is.
    Identity,
    OneHot,
}

impl Categories {
    pub fn len(&self) -> usize {
        match self {
            Self::Int(values) => values.len(),
            Self::Str(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn encoding(&self) -> Encoding {
        match self {
            Self::Int(_) => Encoding::Identity,
            Self::Str(_) => Encoding::OneHot,
        }
    }

    /// The value at `index`, in declaration order.
    pub fn get(&self, index: usize) -> Option<ParamValue> {
        match self {
            Self::Int(values) => values.get(index).map(|v| ParamValue::Int(*v)),
            Self::Str(values) => values.get(index).map(|v| ParamValue::Str(v.clone())),
        }
    }

    pub fn values(&self) -> Vec<ParamValue> {
        (0..self.len()).filter_map(|i| self.get(i)).collect()
    }
}

/// Intermediate, shape-classified form of a dimension description.
#[derive(Debug, Clone, PartialEq)]
enum DimensionDescription<'a> {
    Categorical(&'a [Value]),
    Range(RangeDescription<'a>),
}

#[derive(Debug, Clone, PartialEq)]
struct RangeDescription<'a> {
    low: &'a Value,
    high: &'a Value,
    distribution: String,
    base: i64,
}

impl<'a> DimensionDescription<'a> {
    fn classify(name: &str, raw: &'a Value) -> QoptResult<Self> {
        match raw {
            Value::Array(values) => Ok(Self::Categorical(values)),
            Value::Object(fields) if fields.keys().all(|k| RANGE_FIELDS.contains(&k.as_str())) => {
                RangeDescription::from_fields(name, fields).map(Self::Range)
            }
            _ => Err(QoptError::InvalidSpaceDescription {
                parameter: name.to_string(),
                description: raw.to_string(),
            }),
        }
    }
}

impl<'a> RangeDescription<'a> {
    fn from_fields(name: &str, fields: &'a Map<String, Value>) -> QoptResult<Self> {
        let context = format!("range for parameter '{name}'");
        let low = fields
            .get("low")
            .ok_or_else(|| QoptError::missing("low", &context))?;
        let high = fields
            .get("high")
            .ok_or_else(|| QoptError::missing("high", &context))?;

        let distribution = match fields.get("distribution") {
            None => DEFAULT_DISTRIBUTION.to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(_) => return Err(QoptError::shape("distribution", "a string", &context)),
        };

        let base = match fields.get("base") {
            None => DEFAULT_BASE,
            Some(v) => v
                .as_i64()
                .ok_or_else(|| QoptError::shape("base", "an integer", &context))?,
        };

        Ok(Self {
            low,
            high,
            distribution,
            base,
        })
    }
}

impl Dimension {
    /// Parse one declarative entry of a `space` mapping.
    ///
    /// A list becomes a categorical dimension (identity encoding for integers,
    /// one-hot for strings). A mapping restricted to `low`, `high`,
    /// `distribution` and `base` becomes an integer or real range depending on
    /// the type of `low`.
    pub fn parse(name: &str, raw: &Value) -> QoptResult<Self> {
        let kind = match DimensionDescription::classify(name, raw)? {
            DimensionDescription::Categorical(values) => {
                DimensionKind::Categorical(parse_categories(name, values)?)
            }
            DimensionDescription::Range(range) => parse_range(name, range)?,
        };

        let dimension = Self {
            name: name.to_string(),
            kind,
        };
        debug!("Parsed dimension {}: {:?}", dimension.name, dimension.kind);
        Ok(dimension)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self.kind, DimensionKind::Categorical(_))
    }

    /// Number of discrete values, or `None` for ranges.
    pub fn cardinality(&self) -> Option<usize> {
        match &self.kind {
            DimensionKind::Categorical(categories) => Some(categories.len()),
            _ => None,
        }
    }

    pub fn encoding(&self) -> Option<Encoding> {
        match &self.kind {
            DimensionKind::Categorical(categories) => Some(categories.encoding()),
            _ => None,
        }
    }

    /// Re-serialize the defining fields into the declarative form accepted by
    /// [`Dimension::parse`].
    pub fn to_description(&self) -> Value {
        match &self.kind {
            DimensionKind::Categorical(Categories::Int(values)) => json!(values),
            DimensionKind::Categorical(Categories::Str(values)) => json!(values),
            DimensionKind::Integer {
                low,
                high,
                prior,
                base,
            } => json!({ "low": low, "high": high, "distribution": prior, "base": base }),
            DimensionKind::Real {
                low,
                high,
                prior,
                base,
            } => json!({ "low": low, "high": high, "distribution": prior, "base": base }),
        }
    }
}

fn parse_categories(name: &str, values: &[Value]) -> QoptResult<Categories> {
    let mismatch = || {
        QoptError::dimension_kind(name, "discrete values must be all-integer or all-string")
    };

    match values.first() {
        None => Err(QoptError::dimension_kind(
            name,
            "discrete values must not be empty",
        )),
        Some(first) if first.is_i64() => values
            .iter()
            .map(|v| v.as_i64().ok_or_else(mismatch))
            .collect::<QoptResult<Vec<_>>>()
            .map(Categories::Int),
        Some(Value::String(_)) => values
            .iter()
            .map(|v| v.as_str().map(str::to_string).ok_or_else(mismatch))
            .collect::<QoptResult<Vec<_>>>()
            .map(Categories::Str),
        Some(_) => Err(mismatch()),
    }
}

fn parse_range(name: &str, range: RangeDescription<'_>) -> QoptResult<DimensionKind> {
    let RangeDescription {
        low,
        high,
        distribution,
        base,
    } = range;
    let mixed_bounds = || {
        QoptError::dimension_kind(name, "range bounds must both be integers or both be floats")
    };

    if let Some(low) = low.as_i64() {
        Ok(DimensionKind::Integer {
            low,
            high: high.as_i64().ok_or_else(mixed_bounds)?,
            prior: distribution,
            base,
        })
    } else if let Some(low) = as_float(low) {
        Ok(DimensionKind::Real {
            low,
            high: as_float(high).ok_or_else(mixed_bounds)?,
            prior: distribution,
            base,
        })
    } else {
        Err(QoptError::dimension_kind(
            name,
            "range values can only be int or float",
        ))
    }
}

/// Only genuine floating-point literals; integers are not widened.
fn as_float(value: &Value) -> Option<f64> {
    if value.is_f64() {
        value.as_f64()
    } else {
        None
    }
}
