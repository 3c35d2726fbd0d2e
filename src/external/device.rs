use async_trait::async_trait;

use crate::{
    api::LocationAPI,
    entities::Coordinates,
    error::{location_unavailable_error, Error},
};

/// Device position known ahead of time, e.g. from configuration.
#[derive(Clone, Copy, Debug, Default)]
pub struct StaticLocation {
    position: Option<Coordinates>,
}

impl StaticLocation {
    pub fn new(position: Option<Coordinates>) -> Self {
        Self { position }
    }
}

#[async_trait]
impl LocationAPI for StaticLocation {
    async fn current_location(&self) -> Result<Coordinates, Error> {
        self.position.ok_or_else(location_unavailable_error)
    }
}

#[tokio::test]
async fn unknown_position_is_an_error() {
    let here = Coordinates::new(14.1122, 122.9553).unwrap();

    assert_eq!(StaticLocation::new(Some(here)).current_location().await.unwrap(), here);
    assert!(StaticLocation::default().current_location().await.is_err());
}
