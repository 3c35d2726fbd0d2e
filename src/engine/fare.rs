use crate::{
    entities::{FareBreakdown, FareSchedule},
    error::{invalid_input_error, Error},
};

/// Flat fare over the base band, per-kilometer rate beyond it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FareEngine {
    schedule: FareSchedule,
}

impl FareEngine {
    pub fn new(schedule: FareSchedule) -> Self {
        Self { schedule }
    }

    /// Fare for a resolved distance. Values are left unrounded.
    pub fn quote(&self, distance_km: f64) -> Result<FareBreakdown, Error> {
        if !distance_km.is_finite() || distance_km < 0.0 {
            return Err(invalid_input_error());
        }

        let FareSchedule {
            base_fare,
            base_distance_km,
            extra_rate_per_km,
        } = self.schedule;

        // the base band is inclusive of its upper bound
        let (extra_distance_km, total_fare, minimum_applied) = if distance_km <= base_distance_km {
            (0.0, base_fare, true)
        } else {
            let extra_distance_km = distance_km - base_distance_km;
            (
                extra_distance_km,
                base_fare + extra_distance_km * extra_rate_per_km,
                false,
            )
        };

        Ok(FareBreakdown {
            base_fare,
            base_distance_km,
            extra_rate_per_km,
            extra_distance_km,
            total_fare,
            minimum_applied,
        })
    }
}

#[cfg(test)]
fn engine(base_distance_km: f64) -> FareEngine {
    FareEngine::new(FareSchedule::new(50.0, base_distance_km, 15.0).unwrap())
}

#[test]
fn minimum_fare_within_base_band() {
    let fare = engine(3.0).quote(2.5).unwrap();

    assert_eq!(fare.total_fare, 50.0);
    assert_eq!(fare.extra_distance_km, 0.0);
    assert!(fare.minimum_applied);

    let fare = engine(3.0).quote(0.0).unwrap();
    assert_eq!(fare.total_fare, 50.0);
    assert!(fare.minimum_applied);
}

#[test]
fn extra_rate_beyond_base_band() {
    let fare = engine(3.0).quote(5.0).unwrap();

    assert_eq!(fare.extra_distance_km, 2.0);
    assert_eq!(fare.total_fare, 80.0);
    assert!(!fare.minimum_applied);
    assert_eq!(fare.base_fare, 50.0);
    assert_eq!(fare.extra_rate_per_km, 15.0);
}

#[test]
fn boundary_distance_gets_minimum_fare() {
    let fare = engine(3.0).quote(3.0).unwrap();
    assert_eq!(fare.total_fare, 50.0);
    assert!(fare.minimum_applied);

    let fare = engine(4.0).quote(4.0).unwrap();
    assert_eq!(fare.total_fare, 50.0);
    assert!(fare.minimum_applied);
}

#[test]
fn base_distance_is_configurable() {
    let three = engine(3.0).quote(4.0).unwrap();
    let four = engine(4.0).quote(4.0).unwrap();

    assert_eq!(three.total_fare, 65.0);
    assert!(!three.minimum_applied);
    assert_eq!(four.total_fare, 50.0);
    assert!(four.minimum_applied);
}

#[test]
fn fare_keeps_full_precision() {
    let fare = engine(3.0).quote(3.333).unwrap();

    assert!((fare.extra_distance_km - 0.333).abs() < 1e-9);
    assert!((fare.total_fare - 54.995).abs() < 1e-9);
}

#[test]
fn rejects_negative_and_nan_distances() {
    use tokio_test::assert_err;

    assert!(engine(3.0).quote(-0.1).unwrap_err().is_invalid_input());
    assert!(engine(3.0).quote(f64::NAN).unwrap_err().is_invalid_input());
    assert_err!(engine(3.0).quote(f64::INFINITY));
}
