use foundation::ids::{AreaName, MeshId};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde_json::{Map, Value};
use survey::{AreaPolygon, AreaSet, MeshCell, MeshGrid, MeshGridError, Region};

/// Property holding the survey area name in the TLS extent files.
pub const AREA_NAME_PROPERTY: &str = "エリア";

#[derive(Debug, thiserror::Error)]
pub enum GeoJsonError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected GeoJSON FeatureCollection")]
    NotAFeatureCollection,
    #[error("invalid feature at index {index}: {reason}")]
    InvalidFeature { index: usize, reason: String },
    #[error(transparent)]
    Grid(#[from] MeshGridError),
}

/// A polygonal GeoJSON feature.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonFeature {
    pub id: Option<String>,
    pub properties: Map<String, Value>,
    pub geometry: MultiPolygon<f64>,
}

impl PolygonFeature {
    /// A property rendered as text; numbers are accepted as ids often are.
    pub fn property_text(&self, key: &str) -> Option<String> {
        match self.properties.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

pub fn parse_polygon_features(payload: &str) -> Result<Vec<PolygonFeature>, GeoJsonError> {
    let value: Value = serde_json::from_str(payload)?;
    polygon_features_from_value(value)
}

pub fn polygon_features_from_value(value: Value) -> Result<Vec<PolygonFeature>, GeoJsonError> {
    let obj = value
        .as_object()
        .ok_or(GeoJsonError::NotAFeatureCollection)?;
    let ty = obj
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or(GeoJsonError::NotAFeatureCollection)?;
    if ty != "FeatureCollection" {
        return Err(GeoJsonError::NotAFeatureCollection);
    }

    let features_val = obj
        .get("features")
        .and_then(|v| v.as_array())
        .ok_or(GeoJsonError::NotAFeatureCollection)?;

    let mut features = Vec::with_capacity(features_val.len());
    for (index, feat_val) in features_val.iter().enumerate() {
        let invalid = |reason: String| GeoJsonError::InvalidFeature { index, reason };

        let feat_obj = feat_val
            .as_object()
            .ok_or_else(|| invalid("feature must be an object".to_string()))?;

        let feat_type = feat_obj
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| invalid("feature missing type".to_string()))?;
        if feat_type != "Feature" {
            return Err(invalid(format!("unexpected feature type: {feat_type}")));
        }

        let id = match feat_obj.get("id") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        let properties = feat_obj
            .get("properties")
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_default();

        let geometry_val = feat_obj
            .get("geometry")
            .ok_or_else(|| invalid("feature missing geometry".to_string()))?;
        let geometry = parse_geometry(geometry_val).map_err(invalid)?;

        features.push(PolygonFeature {
            id,
            properties,
            geometry,
        });
    }

    Ok(features)
}

/// Loads the statistics grid. The cell id comes from `properties.id`, falling
/// back to the feature id.
pub fn mesh_grid_from_geojson(payload: &str) -> Result<MeshGrid, GeoJsonError> {
    let features = parse_polygon_features(payload)?;
    let mut cells = Vec::with_capacity(features.len());
    for (index, f) in features.into_iter().enumerate() {
        let id = f
            .property_text("id")
            .or_else(|| f.id.clone())
            .ok_or_else(|| GeoJsonError::InvalidFeature {
                index,
                reason: "mesh feature has no id".to_string(),
            })?;
        cells.push(MeshCell::new(MeshId::new(id), Region::new(f.geometry)));
    }
    let grid = MeshGrid::new(cells)?;
    tracing::debug!(cells = grid.len(), "loaded mesh grid");
    Ok(grid)
}

/// Loads survey areas. The name comes from `エリア`, then `name`, then the
/// feature id.
pub fn area_set_from_geojson(payload: &str) -> Result<AreaSet, GeoJsonError> {
    let features = parse_polygon_features(payload)?;
    let mut areas = Vec::with_capacity(features.len());
    for (index, f) in features.into_iter().enumerate() {
        let name = f
            .property_text(AREA_NAME_PROPERTY)
            .or_else(|| f.property_text("name"))
            .or_else(|| f.id.clone())
            .ok_or_else(|| GeoJsonError::InvalidFeature {
                index,
                reason: "area feature has no name".to_string(),
            })?;
        areas.push(AreaPolygon::new(
            AreaName::new(name),
            Region::new(f.geometry),
        ));
    }
    tracing::debug!(areas = areas.len(), "loaded survey areas");
    Ok(AreaSet::new(areas))
}

fn parse_geometry(value: &Value) -> Result<MultiPolygon<f64>, String> {
    let obj = value
        .as_object()
        .ok_or("geometry must be an object".to_string())?;
    let ty = obj
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or("geometry missing type".to_string())?;

    let coords = obj
        .get("coordinates")
        .ok_or("geometry missing coordinates".to_string())?;

    match ty {
        "Polygon" => Ok(MultiPolygon::new(vec![parse_polygon(coords)?])),
        "MultiPolygon" => parse_multi_polygon(coords),
        other => Err(format!("unsupported geometry type: {other}")),
    }
}

fn parse_coord(coords: &Value) -> Result<Coord<f64>, String> {
    let arr = coords
        .as_array()
        .ok_or("position must be an array".to_string())?;
    if arr.len() < 2 {
        return Err("position must have [lon, lat]".to_string());
    }
    let x = arr[0].as_f64().ok_or("lon must be a number".to_string())?;
    let y = arr[1].as_f64().ok_or("lat must be a number".to_string())?;
    Ok(Coord { x, y })
}

fn parse_ring(coords: &Value) -> Result<LineString<f64>, String> {
    let arr = coords
        .as_array()
        .ok_or("ring must be an array of positions".to_string())?;
    let mut out = Vec::with_capacity(arr.len());
    for item in arr {
        out.push(parse_coord(item)?);
    }
    Ok(LineString::new(out))
}

fn parse_polygon(coords: &Value) -> Result<Polygon<f64>, String> {
    let rings = coords
        .as_array()
        .ok_or("Polygon coordinates must be an array of rings".to_string())?;
    let mut rings = rings.iter().map(parse_ring);
    let exterior = rings
        .next()
        .ok_or("Polygon has no exterior ring".to_string())??;
    let interiors = rings.collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn parse_multi_polygon(coords: &Value) -> Result<MultiPolygon<f64>, String> {
    let polys = coords
        .as_array()
        .ok_or("MultiPolygon coordinates must be an array of polygons".to_string())?;
    let mut out = Vec::with_capacity(polys.len());
    for poly in polys {
        out.push(parse_polygon(poly)?);
    }
    Ok(MultiPolygon::new(out))
}
