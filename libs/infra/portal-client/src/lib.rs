//! Portal client (C2 auth, C3 scrape/parse): talks to the upstream threat
//! portal and turns its responses into [`blacklist_domain_models::RawRecord`]s.

pub mod auth;
pub mod errors;
pub mod parse;
pub mod scrape;

pub use auth::PortalAuthClient;
pub use errors::PortalError;
pub use parse::parse_records;
pub use scrape::{sweep, DateRange, SweepStrategy, DEFAULT_MAX_PAGES};
