use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::{
    api::{DynLocationAPI, DynRouteAPI},
    engine::ResetPolicy,
    entities::{Coordinates, FareSchedule},
    error::{config_error, Error},
    external::{device::StaticLocation, openrouteservice, relay},
};

/// How the booking side reaches the routing service.
#[derive(Clone, Debug, PartialEq)]
pub enum RoutingMode {
    /// Straight to OpenRouteService; needs the key locally.
    Direct,
    /// Through the relay server at `url`.
    Relay { url: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub ors_api_base: String,
    pub ors_api_key: Option<String>,
    pub routing: RoutingMode,
    pub relay_addr: SocketAddr,
    pub base_fare: f64,
    pub base_distance_km: Option<f64>,
    pub extra_rate_per_km: f64,
    pub currency: String,
    pub reset_policy: ResetPolicy,
    pub home: Option<Coordinates>,
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let number = |key: &str| -> Result<Option<f64>, Error> {
            lookup(key)
                .map(|value| value.trim().parse::<f64>())
                .transpose()
                .map_err(|err| config_error(format!("{}: {}", key, err)))
        };

        let routing = match lookup("ROUTING_MODE").as_deref() {
            None | Some("direct") => RoutingMode::Direct,
            Some("relay") => RoutingMode::Relay {
                url: lookup("RELAY_URL").unwrap_or_else(|| "http://127.0.0.1:5000".into()),
            },
            Some(other) => return Err(config_error(format!("unknown ROUTING_MODE {}", other))),
        };

        let reset_policy = match lookup("RESET_POLICY").as_deref() {
            None | Some("empty") => ResetPolicy::Empty,
            Some("home") => ResetPolicy::Home,
            Some(other) => return Err(config_error(format!("unknown RESET_POLICY {}", other))),
        };

        let home = match (number("HOME_LATITUDE")?, number("HOME_LONGITUDE")?) {
            (Some(latitude), Some(longitude)) => Some(Coordinates::new(latitude, longitude)?),
            (None, None) => None,
            _ => {
                return Err(config_error(
                    "HOME_LATITUDE and HOME_LONGITUDE must be set together",
                ))
            }
        };

        let relay_addr = lookup("RELAY_ADDR")
            .unwrap_or_else(|| "127.0.0.1:5000".into())
            .parse::<SocketAddr>()
            .map_err(|err| config_error(format!("RELAY_ADDR: {}", err)))?;

        Ok(Self {
            ors_api_base: lookup("ORS_API_BASE")
                .unwrap_or_else(|| openrouteservice::DEFAULT_API_BASE.into()),
            ors_api_key: lookup("ORS_API_KEY"),
            routing,
            relay_addr,
            base_fare: number("BASE_FARE")?.unwrap_or(50.0),
            base_distance_km: number("BASE_DISTANCE_KM")?,
            extra_rate_per_km: number("EXTRA_RATE_PER_KM")?.unwrap_or(15.0),
            currency: lookup("CURRENCY").unwrap_or_else(|| "₱".into()),
            reset_policy,
            home,
        })
    }

    /// The base band differs between deployments, so it has no default.
    pub fn fare_schedule(&self) -> Result<FareSchedule, Error> {
        let base_distance_km = self
            .base_distance_km
            .ok_or_else(|| config_error("BASE_DISTANCE_KM must be set"))?;

        FareSchedule::new(self.base_fare, base_distance_km, self.extra_rate_per_km)
    }

    pub fn directions(&self) -> Result<openrouteservice::Client, Error> {
        let api_key = self
            .ors_api_key
            .clone()
            .ok_or_else(|| config_error("ORS_API_KEY must be set"))?;

        Ok(openrouteservice::Client::new(
            self.ors_api_base.clone(),
            api_key,
        ))
    }

    pub fn route_api(&self) -> Result<DynRouteAPI, Error> {
        let routes: DynRouteAPI = match &self.routing {
            RoutingMode::Direct => Arc::new(self.directions()?),
            RoutingMode::Relay { url } => Arc::new(relay::Client::new(url)),
        };

        Ok(routes)
    }

    pub fn location_api(&self) -> DynLocationAPI {
        Arc::new(StaticLocation::new(self.home))
    }
}

#[cfg(test)]
fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: std::collections::HashMap<String, String> = pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();

    move |key: &str| vars.get(key).cloned()
}

#[test]
fn defaults_leave_base_distance_unset() {
    use tokio_test::{assert_err, assert_ok};

    let config = assert_ok!(Config::from_lookup(lookup(&[])));

    assert_eq!(config.routing, RoutingMode::Direct);
    assert_eq!(config.reset_policy, ResetPolicy::Empty);
    assert_eq!(config.relay_addr, "127.0.0.1:5000".parse().unwrap());
    assert_eq!(config.ors_api_base, openrouteservice::DEFAULT_API_BASE);
    assert_eq!(config.home, None);

    assert_err!(config.fare_schedule());
    assert_err!(config.directions());
    assert!(config.route_api().is_err());
}

#[test]
fn reads_fare_schedule() {
    let config = Config::from_lookup(lookup(&[
        ("BASE_FARE", "50"),
        ("BASE_DISTANCE_KM", "4"),
        ("EXTRA_RATE_PER_KM", "15"),
    ]))
    .unwrap();

    let schedule = config.fare_schedule().unwrap();
    assert_eq!(schedule, FareSchedule::new(50.0, 4.0, 15.0).unwrap());

    let err = Config::from_lookup(lookup(&[("BASE_DISTANCE_KM", "three")])).unwrap_err();
    assert!(err.message.contains("BASE_DISTANCE_KM"));

    let config = Config::from_lookup(lookup(&[("BASE_DISTANCE_KM", "-3")])).unwrap();
    assert!(config.fare_schedule().is_err());
}

#[test]
fn relay_mode_needs_no_key() {
    let config = Config::from_lookup(lookup(&[
        ("ROUTING_MODE", "relay"),
        ("RELAY_URL", "http://relay.local:5000"),
    ]))
    .unwrap();

    assert_eq!(
        config.routing,
        RoutingMode::Relay {
            url: "http://relay.local:5000".into()
        }
    );
    assert!(config.route_api().is_ok());

    assert!(Config::from_lookup(lookup(&[("ROUTING_MODE", "carrier-pigeon")])).is_err());
}

#[test]
fn home_policy_and_position() {
    let config = Config::from_lookup(lookup(&[
        ("RESET_POLICY", "home"),
        ("HOME_LATITUDE", "14.1122"),
        ("HOME_LONGITUDE", "122.9553"),
    ]))
    .unwrap();

    assert_eq!(config.reset_policy, ResetPolicy::Home);
    assert_eq!(config.home, Some(Coordinates::new(14.1122, 122.9553).unwrap()));

    assert!(Config::from_lookup(lookup(&[("HOME_LATITUDE", "14.1")])).is_err());
    assert!(Config::from_lookup(lookup(&[
        ("HOME_LATITUDE", "140"),
        ("HOME_LONGITUDE", "122.9553")
    ]))
    .is_err());
}
