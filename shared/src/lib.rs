// lib.rs - Bookwatch listing tracker core

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod executor;
#[cfg(feature = "http")]
pub mod http;
pub mod metrics;
pub mod model;
pub mod session;
pub mod tracker;

pub use api::ListingApi;
pub use cache::{ListingCache, ResultsView, ViewFilters};
pub use config::TrackerConfig;
pub use error::{ApiError, ErrorKind, TrackerError, TrackerResult, ValidationError};
pub use executor::{MutationOutcome, ViewUpdate};
#[cfg(feature = "http")]
pub use http::HttpListingApi;
pub use metrics::{MetricsSnapshot, TrackerMetrics};
pub use model::{
    parse_results, ControlDisplay, DetailId, Field, InterestControl, InterestState, Listing,
    ListingGroup,
};
pub use tracker::Tracker;
