pub mod device;
pub mod openrouteservice;
pub mod relay;
