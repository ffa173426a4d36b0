//! Named monotonically increasing counters.

use intake_shared::Result;
use libsql::params;

use crate::{Storage, db_err, scalar};

/// Counter bumped once per contact submission.
pub const VISITOR_COUNTER: &str = "visitors";

impl Storage {
    /// Increment a counter (creating it at 1) and return the new value.
    pub async fn increment_counter(&self, name: &str) -> Result<i64> {
        self.check_writable()?;
        let rows = self
            .conn
            .query(
                "INSERT INTO counters (name, count) VALUES (?1, 1)
                 ON CONFLICT(name) DO UPDATE SET count = count + 1
                 RETURNING count",
                params![name],
            )
            .await
            .map_err(db_err)?;
        scalar(rows).await
    }

    /// Current value of a counter, 0 if it was never incremented.
    pub async fn get_counter(&self, name: &str) -> Result<i64> {
        let rows = self
            .conn
            .query("SELECT count FROM counters WHERE name = ?1", params![name])
            .await
            .map_err(db_err)?;
        scalar(rows).await
    }
}
