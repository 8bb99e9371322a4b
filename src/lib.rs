pub mod api;
pub mod config;
pub mod engine;
pub mod notifier;
pub mod poller;
pub mod types;

/// CIX host (market data API and team pages).
pub const CIX_HOST: &str = "https://caseinsensitive.org";

/// Path of the NCAA API below the host.
pub const CIX_API_PATH: &str = "ncaa/api";
