//! Test support: throwaway migrated databases.

use std::sync::Arc;

use tempfile::TempDir;

use crate::db::Database;
use crate::db::libsql::LibSqlBackend;

/// Route tracing output through the test harness when `RUST_LOG` is set.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Fresh file-backed database with migrations applied. Keep the returned
/// `TempDir` alive for as long as the database is in use.
pub(crate) async fn test_db() -> (Arc<dyn Database>, TempDir) {
    init_tracing();
    let tmp = tempfile::tempdir().expect("create temp dir");
    let backend = LibSqlBackend::new_local(tmp.path().join("office.db"))
        .await
        .expect("open test database");
    let db: Arc<dyn Database> = Arc::new(backend);
    db.run_migrations().await.expect("run migrations");
    (db, tmp)
}
