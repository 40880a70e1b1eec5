pub mod blocked_ips;
pub mod collection_runs;
pub mod credentials;
pub mod pull_logs;
pub mod whitelist;

pub use blocked_ips::{BlockedIpRepository, UpsertOutcome, BATCH_SIZE};
pub use collection_runs::CollectionRunRepository;
pub use credentials::CredentialRepository;
pub use pull_logs::PullLogRepository;
pub use whitelist::WhitelistRepository;
