use serde::{Deserialize, Serialize};

/// Tunables for the per-mesh aggregation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Largest population scanned pairwise for nearest neighbours; larger
    /// meshes use the grid index.
    pub brute_force_limit: usize,
    /// Absolute slack (meters) for the grid search stop condition.
    pub grid_tolerance_m: f64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            brute_force_limit: 512,
            grid_tolerance_m: 0.05,
        }
    }
}

impl AggregationConfig {
    pub fn from_json_str(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::AggregationConfig;

    #[test]
    fn missing_fields_take_defaults() {
        let cfg = AggregationConfig::from_json_str(r#"{"brute_force_limit": 64}"#).unwrap();
        assert_eq!(cfg.brute_force_limit, 64);
        assert_eq!(cfg.grid_tolerance_m, AggregationConfig::default().grid_tolerance_m);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(AggregationConfig::from_json_str(r#"{"brute_force_limit": "x"}"#).is_err());
        assert!(AggregationConfig::from_json_str("42").is_err());
        assert!(AggregationConfig::from_json_str("{").is_err());
    }
}
