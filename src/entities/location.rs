use geo_types::Point;
use serde::{Deserialize, Serialize};

use crate::error::{invalid_input_error, Error};

/// A point picked on the map or reported by the device.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Builds a coordinate, rejecting non-finite or out-of-range values.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, Error> {
        let coordinates = Self {
            latitude,
            longitude,
        };
        coordinates.validate()?;

        Ok(coordinates)
    }

    pub fn validate(&self) -> Result<(), Error> {
        let valid = self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude.abs() <= 90.0
            && self.longitude.abs() <= 180.0;

        if !valid {
            return Err(invalid_input_error());
        }

        Ok(())
    }

    /// `[longitude, latitude]`, the axis order routing services expect.
    pub fn lng_lat(&self) -> [f64; 2] {
        let point: Point<f64> = (*self).into();
        [point.x(), point.y()]
    }
}

impl From<Coordinates> for Point<f64> {
    fn from(coordinates: Coordinates) -> Self {
        Point::new(coordinates.longitude, coordinates.latitude)
    }
}

impl From<Point<f64>> for Coordinates {
    fn from(point: Point<f64>) -> Self {
        Self {
            latitude: point.y(),
            longitude: point.x(),
        }
    }
}

#[test]
fn rejects_out_of_range_coordinates() {
    assert!(Coordinates::new(14.1122, 122.9553).is_ok());
    assert!(Coordinates::new(90.0, -180.0).is_ok());

    assert!(Coordinates::new(90.5, 0.0).is_err());
    assert!(Coordinates::new(0.0, 180.01).is_err());
    assert!(Coordinates::new(f64::NAN, 0.0).is_err());
    assert!(Coordinates::new(0.0, f64::INFINITY).is_err());
}

#[test]
fn lng_lat_swaps_axis_order() {
    let coordinates = Coordinates::new(14.1122, 122.9553).unwrap();
    assert_eq!(coordinates.lng_lat(), [122.9553, 14.1122]);

    let point: Point<f64> = coordinates.into();
    assert_eq!(Coordinates::from(point), coordinates);
}
