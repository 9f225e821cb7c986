//! Geographic coordinate types

use serde::{Deserialize, Serialize};

use crate::{GeocodingError, Result};

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Reject positions outside latitude [-90, 90] / longitude [-180, 180].
    ///
    /// NaN fails both range checks and is rejected too.
    pub fn validate(&self) -> Result<()> {
        if (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude) {
            Ok(())
        } else {
            Err(GeocodingError::InvalidCoordinates {
                latitude: self.latitude,
                longitude: self.longitude,
            })
        }
    }
}

/// Axis-aligned bounding box (south-west / north-east corners).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }

    /// Whether `coords` falls inside the box (edges inclusive).
    pub fn contains(&self, coords: &Coordinates) -> bool {
        (self.south..=self.north).contains(&coords.latitude)
            && (self.west..=self.east).contains(&coords.longitude)
    }
}
