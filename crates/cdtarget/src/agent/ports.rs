use k8s_openapi::api::core::v1::ConfigMap;

use crate::util::errors::{Error, Result, StdError};

/// Data key of the reference config map holding one port per line
pub const PORTS_KEY: &str = "ports";

/// Reads the newline separated port list out of the reference config map.
///
/// Blank lines are skipped; a missing or empty `ports` entry yields no ports, which
/// the network policy builder turns into its fallback port rather than "all ports".
pub fn ports_from_config_map(cm: &ConfigMap) -> Result<Vec<i32>> {
    let Some(raw) = cm.data.as_ref().and_then(|data| data.get(PORTS_KEY)) else {
        return Ok(Vec::new());
    };

    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.parse::<i32>()
                .map_err(|e| Error::from(StdError::PortParseError(format!("{line:?}: {e}"))))
        })
        .collect()
}
