// Copyright 2024 Cloudflare, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Pool configurations

use connpool_error::{Error, ErrorType::*, OrErr, Result};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::fs;

/// The capacity settings of a [ChannelPool](crate::ChannelPool)
///
/// Pool configurations are YAML. Unknown keys are ignored so the settings can live in a larger
/// configuration file.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConf {
    /// How many connections are created when the pool is built. Must be at least 1.
    pub initial_capacity: usize,
    /// How many idle connections the pool keeps at most. Connections released beyond this are
    /// closed. Must not be below `initial_capacity`.
    pub max_capacity: usize,
}

impl Default for PoolConf {
    fn default() -> Self {
        PoolConf {
            initial_capacity: 1,
            max_capacity: 16,
        }
    }
}

impl PoolConf {
    pub fn load_from_yaml<P>(path: P) -> Result<Self>
    where
        P: AsRef<std::path::Path> + std::fmt::Display,
    {
        let conf_str = fs::read_to_string(&path).or_err_with(ReadError, || {
            format!("Unable to read conf file from {path}")
        })?;
        debug!("Conf file read from {path}");
        Self::from_yaml(&conf_str)
    }

    pub fn from_yaml(conf_str: &str) -> Result<Self> {
        trace!("Read conf file: {conf_str}");
        let conf: PoolConf = serde_yaml::from_str(conf_str).or_err_with(ReadError, || {
            format!("Unable to parse yaml conf {conf_str}")
        })?;

        trace!("Loaded conf: {conf:?}");
        conf.validate()
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).or_err(InternalError, "Unable to serialize conf")
    }

    /// Check `0 < initial_capacity <= max_capacity`
    pub fn validate(self) -> Result<Self> {
        if self.initial_capacity == 0 || self.max_capacity == 0 {
            return Error::e_explain(InvalidCapacity, "capacities must be positive");
        }
        if self.initial_capacity > self.max_capacity {
            return Error::e_explain(
                InvalidCapacity,
                format!(
                    "initial_capacity {} is above max_capacity {}",
                    self.initial_capacity, self.max_capacity
                ),
            );
        }
        Ok(self)
    }
}
