//! Top-level optimization configuration: global defaults plus an ordered
//! list of parameter spaces.

use qopt_types::{ParamSet, QoptError, QoptResult};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};

use crate::space::{parse_param_set, ParameterSpace};

const CONTEXT: &str = "configuration";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    default: ParamSet,
    spaces: Vec<ParameterSpace>,
}

impl Config {
    pub fn new(default: ParamSet, spaces: Vec<ParameterSpace>) -> Self {
        Self { default, spaces }
    }

    /// Parse a configuration of the form
    /// `{"default": {...}, "spaces": [<space>, ...]}`.
    ///
    /// Spaces keep their declared order. Errors from nested spaces are
    /// returned as-is.
    pub fn parse(raw: &Value) -> QoptResult<Self> {
        let fields = raw
            .as_object()
            .ok_or_else(|| QoptError::shape("configuration", "a mapping", CONTEXT))?;

        let default = match fields.get("default") {
            None => return Err(QoptError::missing("default", CONTEXT)),
            Some(raw) => parse_param_set("default", raw, CONTEXT)?,
        };

        let spaces = match fields.get("spaces") {
            None => return Err(QoptError::missing("spaces", CONTEXT)),
            Some(Value::Array(spaces)) => spaces
                .iter()
                .map(ParameterSpace::parse)
                .collect::<QoptResult<Vec<_>>>()?,
            Some(_) => return Err(QoptError::shape("spaces", "a sequence", CONTEXT)),
        };

        debug!(
            "Parsed configuration with {} default parameters and {} spaces",
            default.len(),
            spaces.len()
        );
        Ok(Self { default, spaces })
    }

    pub fn from_json_str(json: &str) -> QoptResult<Self> {
        let raw: Value = serde_json::from_str(json)?;
        Self::parse(&raw)
    }

    /// Read and parse a JSON configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> QoptResult<Self> {
        let path = path.as_ref();
        info!("Loading optimization config from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn default_params(&self) -> &ParamSet {
        &self.default
    }

    pub fn spaces(&self) -> &[ParameterSpace] {
        &self.spaces
    }

    pub fn space(&self, name: &str) -> Option<&ParameterSpace> {
        self.spaces.iter().find(|space| space.name() == name)
    }
}
