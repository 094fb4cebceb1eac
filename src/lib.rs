//! Aircast - an air-quality monitoring backend with history-driven forecasts.
//!
//! # Overview
//!
//! Aircast proxies the WAQI upstream provider for current air-quality
//! readings, persists every successful reading as a historical sample, and
//! derives simple trend forecasts from that history: a direction
//! (rising/falling/stable), a bounded confidence score, and a one-step
//! projection. It also serves aggregate health statistics — the share of
//! time spent in each AQI severity band and daily rolling averages.
//!
//! The forecast is a deliberately simple heuristic over a linear fit, not a
//! statistical model: good enough to say "this neighborhood's air has been
//! getting worse all morning", and honest about its confidence when the
//! history is short or noisy.
//!
//! # Modules
//!
//! - [`model`]: samples, severity banding, trend and response types
//! - [`trend`]: pure trend analysis over a series of samples
//! - [`forecast`]: orchestration between the store and the analyzer
//! - [`stats`]: health statistics over the full store
//! - [`storage`]: SQLite sample store
//! - [`data_sources`]: upstream provider clients
//! - [`api`]: HTTP API handlers

pub mod api;
pub mod data_sources;
pub mod forecast;
pub mod model;
pub mod stats;
pub mod storage;
pub mod trend;
