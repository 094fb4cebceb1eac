//! External data sources for air-quality readings.
//!
//! One provider is wired in today:
//!
//! - [`waqi`]: the World Air Quality Index project — per-station AQI and
//!   pollutant readings, queryable by geographic coordinates or keyword.

pub mod waqi;

pub use waqi::WaqiClient;
