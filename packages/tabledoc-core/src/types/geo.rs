//! Geometry values stored as GeoJSON-shaped document maps.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::FieldValue;

const TYPE_KEY: &str = "type";
const COORDINATES_KEY: &str = "coordinates";
const POINT: &str = "point";
const POLYGON: &str = "polygon";

/// A point on the globe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// A closed polygon described by its single outer ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPolygon {
    pub points: Vec<GeoPoint>,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Encodes as `{"type": "point", "coordinates": [lon, lat]}`.
    pub fn to_field_value(&self) -> FieldValue {
        let mut map = BTreeMap::new();
        map.insert(TYPE_KEY.to_string(), FieldValue::from(POINT));
        map.insert(COORDINATES_KEY.to_string(), self.coordinates());
        FieldValue::Map(map)
    }

    /// Recognizes a point by shape. Returns `None` for anything else.
    pub fn from_field_value(value: &FieldValue) -> Option<Self> {
        let map = value.as_map()?;
        if !shape_is(map, POINT) {
            return None;
        }
        Self::from_coordinates(map.get(COORDINATES_KEY)?)
    }

    fn coordinates(&self) -> FieldValue {
        FieldValue::Array(vec![
            FieldValue::Double(self.longitude),
            FieldValue::Double(self.latitude),
        ])
    }

    fn from_coordinates(value: &FieldValue) -> Option<Self> {
        match value.as_array()? {
            [lon, lat] => Some(Self::new(lat.as_f64()?, lon.as_f64()?)),
            _ => None,
        }
    }
}

impl GeoPolygon {
    pub fn new(points: Vec<GeoPoint>) -> Self {
        Self { points }
    }

    /// Encodes as `{"type": "polygon", "coordinates": [[[lon, lat], ...]]}`.
    pub fn to_field_value(&self) -> FieldValue {
        let ring = self.points.iter().map(GeoPoint::coordinates).collect();
        let mut map = BTreeMap::new();
        map.insert(TYPE_KEY.to_string(), FieldValue::from(POLYGON));
        map.insert(
            COORDINATES_KEY.to_string(),
            FieldValue::Array(vec![FieldValue::Array(ring)]),
        );
        FieldValue::Map(map)
    }

    /// Recognizes a polygon by shape. Returns `None` for anything else.
    pub fn from_field_value(value: &FieldValue) -> Option<Self> {
        let map = value.as_map()?;
        if !shape_is(map, POLYGON) {
            return None;
        }
        let rings = map.get(COORDINATES_KEY)?.as_array()?;
        let ring = rings.first()?.as_array()?;
        let points = ring
            .iter()
            .map(GeoPoint::from_coordinates)
            .collect::<Option<Vec<_>>>()?;
        Some(Self::new(points))
    }
}

fn shape_is(map: &BTreeMap<String, FieldValue>, kind: &str) -> bool {
    map.len() == 2
        && map
            .get(TYPE_KEY)
            .and_then(FieldValue::as_str)
            .is_some_and(|t| t.eq_ignore_ascii_case(kind))
}
