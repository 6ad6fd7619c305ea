use po_core::RandomSource;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Uniform point in a square of side `span` degrees centred here.
    pub fn jitter(&self, span: f64, rng: &dyn RandomSource) -> Self {
        let half = span / 2.0;
        Self {
            latitude: self.latitude + rng.range(-half, half),
            longitude: self.longitude + rng.range(-half, half),
        }
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((latitude, longitude): (f64, f64)) -> Self {
        Self::new(latitude, longitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl BoundingBox {
    pub fn around(center: Coordinate, span: f64) -> Self {
        let half = span / 2.0;
        Self {
            north: center.latitude + half,
            south: center.latitude - half,
            east: center.longitude + half,
            west: center.longitude - half,
        }
    }

    pub fn contains(&self, coord: Coordinate) -> bool {
        coord.latitude <= self.north
            && coord.latitude >= self.south
            && coord.longitude <= self.east
            && coord.longitude >= self.west
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use po_core::SeededRandom;

    #[test]
    fn jitter_stays_inside_the_box_it_describes() {
        let center = Coordinate::new(-26.2041, 28.0473);
        let bounds = BoundingBox::around(center, 0.15);
        let rng = SeededRandom::seeded(11);
        for _ in 0..200 {
            assert!(bounds.contains(center.jitter(0.15, &rng)));
        }
    }
}
