//! Named parameter spaces and search method selection.

use qopt_types::{train_error, ParamSet, ParamValue, QoptError, QoptResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::debug;

use crate::dimension::Dimension;

/// Trial budget used when a space does not declare `num_iterations`.
pub const DEFAULT_NUM_ITERATIONS: usize = 30;

/// Search method as declared in a space configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Choose between grid and bayesian from the shape of the space.
    Auto,
    Grid,
    Bayesian,
}

impl Default for Method {
    fn default() -> Self {
        Self::Auto
    }
}

impl Method {
    /// Parse the `method` field; `null` means unset and resolves to `Auto`.
    pub fn parse(raw: &Value) -> QoptResult<Self> {
        match raw {
            Value::Null => Ok(Self::Auto),
            Value::String(s) => match s.as_str() {
                "auto" => Ok(Self::Auto),
                "grid" => Ok(Self::Grid),
                "bayesian" => Ok(Self::Bayesian),
                other => Err(QoptError::UnsupportedMethod {
                    method: other.to_string(),
                }),
            },
            other => Err(QoptError::UnsupportedMethod {
                method: other.to_string(),
            }),
        }
    }
}

/// A concrete search method, after `auto` has been resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMethod {
    Grid,
    Bayesian,
}

impl SearchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grid => "grid",
            Self::Bayesian => "bayesian",
        }
    }
}

impl fmt::Display for SearchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, ordered set of dimensions together with default parameters, a
/// search method and a trial budget.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSpace {
    name: String,
    default: ParamSet,
    method: Method,
    num_iterations: usize,
    dimensions: Vec<Dimension>,
}

impl ParameterSpace {
    /// Build a space from already parsed parts.
    ///
    /// `num_iterations` of `None` or `Some(0)` falls back to
    /// [`DEFAULT_NUM_ITERATIONS`]. Grid search has no notion of iterations, so
    /// combining `Method::Grid` with a non-zero budget is rejected.
    pub fn new(
        name: impl Into<String>,
        default: ParamSet,
        method: Method,
        num_iterations: Option<usize>,
        dimensions: Vec<Dimension>,
    ) -> QoptResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(QoptError::missing("name", "space configuration"));
        }
        if dimensions.is_empty() {
            return Err(QoptError::missing("space", format!("space '{name}'")));
        }

        let requested = num_iterations.unwrap_or(0);
        if method == Method::Grid && requested > 0 {
            return Err(QoptError::InvalidMethodConfiguration {
                space: name,
                num_iterations: requested as u64,
            });
        }

        Ok(Self {
            name,
            default,
            method,
            num_iterations: if requested > 0 {
                requested
            } else {
                DEFAULT_NUM_ITERATIONS
            },
            dimensions,
        })
    }

    /// Parse a space description:
    ///
    /// ```json
    /// { "name": "bm25", "method": "auto", "num_iterations": 50,
    ///   "default": {"k1": 1.2},
    ///   "space": {"k1": {"low": 0.5, "high": 5.0}, "b": [0, 1]} }
    /// ```
    pub fn parse(raw: &Value) -> QoptResult<Self> {
        let fields = raw
            .as_object()
            .ok_or_else(|| QoptError::shape("space", "a mapping", "space configuration"))?;

        let name = match fields.get("name") {
            None | Some(Value::Null) => {
                return Err(QoptError::missing("name", "space configuration"))
            }
            Some(Value::String(s)) => s.clone(),
            Some(_) => return Err(QoptError::shape("name", "a string", "space configuration")),
        };
        let context = format!("space '{name}'");

        let space = match fields.get("space") {
            None | Some(Value::Null) => return Err(QoptError::missing("space", &context)),
            Some(Value::Object(space)) => space,
            Some(_) => return Err(QoptError::shape("space", "a mapping", &context)),
        };

        let default = match fields.get("default") {
            None | Some(Value::Null) => ParamSet::new(),
            Some(raw) => parse_param_set("default", raw, &context)?,
        };

        let method = fields
            .get("method")
            .map(Method::parse)
            .transpose()?
            .unwrap_or_default();

        let num_iterations = match fields.get("num_iterations") {
            None | Some(Value::Null) => None,
            Some(v) => Some(v.as_u64().map(|n| n as usize).ok_or_else(|| {
                QoptError::shape("num_iterations", "a non-negative integer", &context)
            })?),
        };

        let dimensions = space
            .iter()
            .map(|(param, description)| Dimension::parse(param, description))
            .collect::<QoptResult<Vec<_>>>()?;

        let parsed = Self::new(name, default, method, num_iterations, dimensions)?;
        debug!(
            "Parsed space {} with {} dimensions (method: {:?}, iterations: {})",
            parsed.name,
            parsed.dimensions.len(),
            parsed.method,
            parsed.num_iterations
        );
        Ok(parsed)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_params(&self) -> &ParamSet {
        &self.default
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn num_iterations(&self) -> usize {
        self.num_iterations
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    /// Dimension names in declaration order.
    pub fn dimension_names(&self) -> Vec<&str> {
        self.dimensions.iter().map(Dimension::name).collect()
    }

    /// Number of grid points, or `None` if any dimension is a range.
    /// Saturates at `u64::MAX`.
    pub fn dimensionality(&self) -> Option<u64> {
        self.dimensions.iter().try_fold(1u64, |total, dim| {
            dim.cardinality()
                .map(|size| total.saturating_mul(size as u64))
        })
    }

    /// Resolve the search method to use for this space.
    ///
    /// An explicit method always wins. For `auto`, grid search is chosen only
    /// when every dimension is categorical and the full grid fits within the
    /// iteration budget; otherwise bayesian.
    pub fn select_method(&self) -> SearchMethod {
        let selected = match self.method {
            Method::Grid => SearchMethod::Grid,
            Method::Bayesian => SearchMethod::Bayesian,
            Method::Auto => match self.dimensionality() {
                Some(size) if size <= self.num_iterations as u64 => SearchMethod::Grid,
                _ => SearchMethod::Bayesian,
            },
        };
        debug!("Selected {} search for space {}", selected, self.name);
        selected
    }

    /// Pair a positional value vector from a strategy with the dimension names.
    pub fn zip_values(&self, values: &[ParamValue]) -> QoptResult<ParamSet> {
        if values.len() != self.dimensions.len() {
            return Err(train_error!(
                "space '{}' has {} dimensions but {} values were proposed",
                self.name,
                self.dimensions.len(),
                values.len()
            ));
        }
        Ok(self
            .dimensions
            .iter()
            .zip(values)
            .map(|(dim, value)| (dim.name.clone(), value.clone()))
            .collect())
    }
}

/// Parse a flat mapping of scalar parameter values.
pub(crate) fn parse_param_set(field: &str, raw: &Value, context: &str) -> QoptResult<ParamSet> {
    let fields = raw
        .as_object()
        .ok_or_else(|| QoptError::shape(field, "a mapping of simple key-value pairs", context))?;

    fields
        .iter()
        .map(|(key, value)| {
            ParamValue::from_json(value)
                .map(|v| (key.clone(), v))
                .ok_or_else(|| {
                    QoptError::shape(
                        format!("{field}.{key}"),
                        "an integer, float, string or boolean",
                        context,
                    )
                })
        })
        .collect()
}
