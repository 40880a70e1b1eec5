//! Append-only audit trail for perimeter-firewall pulls.

use libsql::params;
use tracing::instrument;

use crate::client::DbClient;
use crate::errors::DbError;

pub struct PullLogRepository {
    client: DbClient,
}

impl PullLogRepository {
    pub fn new(client: DbClient) -> Self {
        Self { client }
    }

    #[allow(clippy::too_many_arguments)]
    #[instrument(skip(self))]
    pub async fn record(
        &self,
        device_ip: Option<&str>,
        user_agent: Option<&str>,
        request_path: &str,
        ip_count: i64,
        response_time_ms: i64,
        response_status: i32,
    ) -> Result<(), DbError> {
        let conn = self.client.get_connection().await?;
        conn.execute(
            r#"
            INSERT INTO pull_logs (device_ip, user_agent, request_path, ip_count, response_time_ms, response_status)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                device_ip.map(str::to_string),
                user_agent.map(str::to_string),
                request_path.to_string(),
                ip_count,
                response_time_ms,
                response_status,
            ],
        )
        .await?;
        Ok(())
    }
}
