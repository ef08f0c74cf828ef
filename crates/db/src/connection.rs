use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;

pub type DbPool = sqlx::SqlitePool;

/// Opens a pool with foreign keys enforced and WAL journaling.
///
/// In-memory databases are private to a connection, so their pool is capped
/// at one connection.
pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    let url = normalize_url(database_url);
    let max_connections = if is_in_memory(url) { 1 } else { max_connections.max(1) };
    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(url)
        .await
}

fn is_in_memory(url: &str) -> bool {
    url.starts_with("sqlite::memory:") || url.contains("mode=memory")
}

fn normalize_url(database_url: &str) -> &str {
    match database_url.trim() {
        ":memory:" => "sqlite::memory:",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::{connect_with_settings, is_in_memory, normalize_url};

    #[test]
    fn bare_memory_alias_maps_to_sqlite_url() {
        assert_eq!(normalize_url(":memory:"), "sqlite::memory:");
        assert_eq!(normalize_url("sqlite://vestry.db"), "sqlite://vestry.db");
        assert!(is_in_memory(normalize_url(":memory:")));
        assert!(!is_in_memory("sqlite://vestry.db"));
    }

    #[tokio::test]
    async fn in_memory_pool_keeps_a_single_connection() {
        let pool = connect_with_settings("sqlite::memory:", 8, 5).await.expect("connect");
        assert_eq!(pool.options().get_max_connections(), 1);
    }

    #[tokio::test]
    async fn pool_enforces_foreign_keys() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
        let enabled: i64 =
            sqlx::query_scalar("PRAGMA foreign_keys").fetch_one(&pool).await.expect("pragma");
        assert_eq!(enabled, 1);
    }
}
