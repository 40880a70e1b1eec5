//! Entity types shared across the blacklist aggregation pipeline.
//!
//! Every type here is a plain data carrier — no I/O, no business rules
//! beyond the derivations called out on [`blocked_ip::BlockedIp`]. Behavior
//! lives in `blacklist-domain-normalizer` and `blacklist-infra-db`.

pub mod blocked_ip;
pub mod collection_run;
pub mod credential;
pub mod decision;
pub mod pull_log;
pub mod whitelist;

pub use blocked_ip::{BlockedIp, NormalizationReport, NormalizedRecord, RawRecord};
pub use collection_run::{CollectionOutcome, CollectionRange, CollectionRun};
pub use credential::{Credential, CredentialSettingsUpdate, PlaintextCredential};
pub use decision::{BlacklistStatistics, Decision, DecisionMetadata, SourceCount};
pub use pull_log::PullLog;
pub use whitelist::{WhitelistEntry, WhitelistSource};
