use serde::{Deserialize, Serialize};

use crate::error::{config_error, Error};

/// Fare parameters, fixed per deployment.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FareSchedule {
    pub base_fare: f64,
    pub base_distance_km: f64,
    pub extra_rate_per_km: f64,
}

impl FareSchedule {
    pub fn new(
        base_fare: f64,
        base_distance_km: f64,
        extra_rate_per_km: f64,
    ) -> Result<Self, Error> {
        let schedule = Self {
            base_fare,
            base_distance_km,
            extra_rate_per_km,
        };

        for (name, value) in [
            ("base_fare", base_fare),
            ("base_distance_km", base_distance_km),
            ("extra_rate_per_km", extra_rate_per_km),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(config_error(format!("{} must be a non-negative number", name)));
            }
        }

        Ok(schedule)
    }
}

/// Fare derived from one resolved distance.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FareBreakdown {
    pub base_fare: f64,
    pub base_distance_km: f64,
    pub extra_rate_per_km: f64,
    pub extra_distance_km: f64,
    pub total_fare: f64,
    pub minimum_applied: bool,
}

#[test]
fn schedule_rejects_negative_or_nan_parameters() {
    use tokio_test::{assert_err, assert_ok};

    assert_ok!(FareSchedule::new(50.0, 3.0, 15.0));
    assert_ok!(FareSchedule::new(50.0, 4.0, 15.0));
    assert_ok!(FareSchedule::new(0.0, 0.0, 0.0));

    assert_err!(FareSchedule::new(-1.0, 3.0, 15.0));
    assert_err!(FareSchedule::new(50.0, f64::NAN, 15.0));
    assert_err!(FareSchedule::new(50.0, 3.0, f64::INFINITY));
}
