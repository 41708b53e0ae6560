use std::fs;
use std::path::{Path, PathBuf};

use compute::AggregationConfig;
use geo::Point;

pub const DEFAULT_AREA_BUFFER_M: f64 = 30.0;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("bad center {0:?}: expected \"lon,lat\"")]
    Center(String),
    #[error("centers file: {0}")]
    CentersCsv(#[from] csv::Error),
}

/// Loads an aggregation config file; missing keys keep their defaults.
pub fn load_aggregation_config(path: Option<&Path>) -> Result<AggregationConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(AggregationConfig::default());
    };
    let payload = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let cfg = AggregationConfig::from_json_str(&payload).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(?cfg, path = %path.display(), "aggregation config loaded");
    Ok(cfg)
}

pub fn parse_center(raw: &str) -> Result<Point<f64>, ConfigError> {
    let bad = || ConfigError::Center(raw.to_string());
    let (lon, lat) = raw.split_once(',').ok_or_else(bad)?;
    let lon: f64 = lon.trim().parse().map_err(|_| bad())?;
    let lat: f64 = lat.trim().parse().map_err(|_| bad())?;
    if !lon.is_finite() || !lat.is_finite() {
        return Err(bad());
    }
    Ok(Point::new(lon, lat))
}

/// Viewport centers from a headerless `lon,lat` CSV, one per line.
pub fn read_centers(payload: &str) -> Result<Vec<Point<f64>>, ConfigError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(payload.as_bytes());
    let mut out = Vec::new();
    for record in reader.records() {
        let record = record?;
        let joined = record.iter().take(2).collect::<Vec<_>>().join(",");
        out.push(parse_center(&joined)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{ConfigError, load_aggregation_config, parse_center, read_centers};

    #[test]
    fn parses_lon_lat_pairs() {
        let p = parse_center(" 136.62, 36.56 ").unwrap();
        assert_eq!((p.x(), p.y()), (136.62, 36.56));
        assert!(matches!(parse_center("136.62"), Err(ConfigError::Center(_))));
        assert!(parse_center("abc,1").is_err());
        assert!(parse_center("NaN,1").is_err());
    }

    #[test]
    fn reads_centers_skipping_comments() {
        let pts = read_centers("# replay\n136.0,36.0\n136.1, 36.1\n").unwrap();
        assert_eq!(pts.len(), 2);
        assert_eq!(pts[1].y(), 36.1);
    }

    #[test]
    fn missing_config_path_means_defaults() {
        let cfg = load_aggregation_config(None).unwrap();
        assert_eq!(cfg.brute_force_limit, 512);
    }

    #[test]
    fn config_file_overrides_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("canopy.json");
        fs::write(&path, r#"{"brute_force_limit": 32}"#).unwrap();
        let cfg = load_aggregation_config(Some(&path)).unwrap();
        assert_eq!(cfg.brute_force_limit, 32);

        fs::write(&path, "{").unwrap();
        assert!(matches!(
            load_aggregation_config(Some(&path)),
            Err(ConfigError::Json { .. })
        ));
    }
}
