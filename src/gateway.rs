// 💾 Remote Store Gateway - batch insert with token uniqueness
// The store owns one constraint this crate relies on: a submission token can
// be accepted at most once. A retried batch after a transient failure reuses
// its token and is rejected as a duplicate instead of double-inserting.

use crate::assemble::{batch_fingerprint, FlatRecord};
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

// ============================================================================
// GATEWAY ERRORS
// ============================================================================

/// Store-side failure of a batch insert. Both variants are recoverable: the
/// session is kept intact so the user can correct and retry.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// The token was already accepted: this entry was likely saved by an
    /// earlier attempt. `same_content` reports whether the stored batch
    /// fingerprints identically to the rejected one.
    DuplicateToken { token: String, same_content: bool },

    /// Network, auth, or schema failure on the store side
    Other(String),
}

impl GatewayError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, GatewayError::DuplicateToken { .. })
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::DuplicateToken {
                token,
                same_content,
            } => {
                if *same_content {
                    write!(
                        f,
                        "Submission {} was already saved with identical content",
                        token
                    )
                } else {
                    write!(
                        f,
                        "Submission token {} was already used for a different batch",
                        token
                    )
                }
            }
            GatewayError::Other(message) => write!(f, "Store error: {}", message),
        }
    }
}

impl std::error::Error for GatewayError {}

// ============================================================================
// GATEWAY TRAIT
// ============================================================================

/// Seam to the remote datastore. The pipeline only depends on this trait;
/// tests drive it with a scripted fake.
pub trait StoreGateway {
    fn insert_batch(&mut self, records: &[FlatRecord]) -> Result<(), GatewayError>;
}

// ============================================================================
// SQLITE GATEWAY
// ============================================================================

/// SQLite-backed store: one `submissions` row per accepted batch (token is
/// UNIQUE there) plus one `sales_records` row per flat record.
pub struct SqliteGateway {
    conn: Connection,
}

impl SqliteGateway {
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database at {:?}", db_path))?;
        Self::setup(&conn)?;
        Ok(SqliteGateway { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::setup(&conn)?;
        Ok(SqliteGateway { conn })
    }

    fn setup(conn: &Connection) -> Result<()> {
        // WAL mode for crash recovery
        conn.pragma_update(None, "journal_mode", "WAL")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS submissions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                token TEXT UNIQUE NOT NULL,
                fingerprint TEXT NOT NULL,
                record_count INTEGER NOT NULL,
                submitted_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS sales_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                transaction_id TEXT NOT NULL,
                schema_version INTEGER NOT NULL,
                date TEXT NOT NULL,
                executive_id TEXT NOT NULL,
                route_name TEXT NOT NULL,
                cash_sales_deposited REAL NOT NULL,
                previous_collection_deposited REAL NOT NULL,
                total_deposited REAL NOT NULL,
                cheque_deposited REAL NOT NULL,
                cash_not_deposited REAL NOT NULL,
                total_expense REAL NOT NULL,
                deposit_type TEXT NOT NULL,
                shop_id INTEGER NOT NULL,
                amount REAL NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_records_token ON sales_records(transaction_id)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_records_route ON sales_records(route_name)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_records_date ON sales_records(date)",
            [],
        )?;

        Ok(())
    }

    /// Fingerprint stored for a token, if that token was ever accepted
    fn stored_fingerprint(&self, token: &str) -> Option<String> {
        self.conn
            .query_row(
                "SELECT fingerprint FROM submissions WHERE token = ?1",
                params![token],
                |row| row.get(0),
            )
            .ok()
    }

    pub fn submission_count(&self) -> Result<i64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM submissions", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn record_count(&self) -> Result<i64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM sales_records", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn all_records(&self) -> Result<Vec<FlatRecord>> {
        self.query_records(
            "SELECT transaction_id, schema_version, date, executive_id, route_name,
                    cash_sales_deposited, previous_collection_deposited, total_deposited,
                    cheque_deposited, cash_not_deposited, total_expense,
                    deposit_type, shop_id, amount
             FROM sales_records
             ORDER BY date DESC, id",
            params![],
        )
    }

    pub fn records_by_route(&self, route_name: &str) -> Result<Vec<FlatRecord>> {
        self.query_records(
            "SELECT transaction_id, schema_version, date, executive_id, route_name,
                    cash_sales_deposited, previous_collection_deposited, total_deposited,
                    cheque_deposited, cash_not_deposited, total_expense,
                    deposit_type, shop_id, amount
             FROM sales_records
             WHERE route_name = ?1
             ORDER BY date DESC, id",
            params![route_name],
        )
    }

    fn query_records(
        &self,
        sql: &str,
        query_params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<FlatRecord>> {
        let mut stmt = self.conn.prepare(sql)?;

        let records = stmt
            .query_map(query_params, |row| {
                Ok(FlatRecord {
                    transaction_id: row.get(0)?,
                    schema_version: row.get(1)?,
                    date: row.get(2)?,
                    executive_id: row.get(3)?,
                    route_name: row.get(4)?,
                    cash_sales_deposited: row.get(5)?,
                    previous_collection_deposited: row.get(6)?,
                    total_deposited: row.get(7)?,
                    cheque_deposited: row.get(8)?,
                    cash_not_deposited: row.get(9)?,
                    total_expense: row.get(10)?,
                    deposit_type: row.get(11)?,
                    shop_id: row.get(12)?,
                    amount: row.get(13)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Totals for the CLI/API inspection views
    pub fn stats(&self) -> Result<StoreStats> {
        let (submissions, records) = (self.submission_count()?, self.record_count()?);

        let (total_amount, previous_collection, cheque, cash_not_deposited): (
            f64,
            f64,
            f64,
            f64,
        ) = self.conn.query_row(
            "SELECT
                COALESCE(SUM(amount), 0),
                COALESCE(SUM(CASE WHEN deposit_type = 'previous_collection' THEN amount ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN deposit_type = 'cheque' THEN amount ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN deposit_type = 'cash_not_deposited' THEN amount ELSE 0 END), 0)
             FROM sales_records",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;

        let mut stmt = self.conn.prepare(
            "SELECT route_name, COUNT(*), SUM(amount)
             FROM sales_records
             GROUP BY route_name
             ORDER BY route_name",
        )?;
        let by_route = stmt
            .query_map([], |row| {
                Ok(RouteStat {
                    route_name: row.get(0)?,
                    record_count: row.get(1)?,
                    total_amount: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(StoreStats {
            submissions,
            records,
            total_amount,
            previous_collection,
            cheque,
            cash_not_deposited,
            by_route,
        })
    }
}

impl StoreGateway for SqliteGateway {
    /// Insert one submission batch atomically.
    ///
    /// The UNIQUE token column on `submissions` is the idempotency guard:
    /// a constraint violation there means the batch (or a prior attempt at
    /// it) was already accepted, and nothing is written.
    fn insert_batch(&mut self, records: &[FlatRecord]) -> Result<(), GatewayError> {
        let token = match records.first() {
            Some(record) => record.transaction_id.clone(),
            None => return Err(GatewayError::Other("Empty batch".to_string())),
        };
        let fingerprint = batch_fingerprint(records);

        let tx = self
            .conn
            .transaction()
            .map_err(|e| GatewayError::Other(e.to_string()))?;

        let submission = tx.execute(
            "INSERT INTO submissions (token, fingerprint, record_count, submitted_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                token,
                fingerprint,
                records.len() as i64,
                Utc::now().to_rfc3339()
            ],
        );

        match submission {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                drop(tx);
                let same_content = self
                    .stored_fingerprint(&token)
                    .map(|stored| stored == fingerprint)
                    .unwrap_or(false);
                return Err(GatewayError::DuplicateToken {
                    token,
                    same_content,
                });
            }
            Err(e) => return Err(GatewayError::Other(e.to_string())),
        }

        for record in records {
            tx.execute(
                "INSERT INTO sales_records (
                    transaction_id, schema_version, date, executive_id, route_name,
                    cash_sales_deposited, previous_collection_deposited, total_deposited,
                    cheque_deposited, cash_not_deposited, total_expense,
                    deposit_type, shop_id, amount
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    record.transaction_id,
                    record.schema_version,
                    record.date,
                    record.executive_id,
                    record.route_name,
                    record.cash_sales_deposited,
                    record.previous_collection_deposited,
                    record.total_deposited,
                    record.cheque_deposited,
                    record.cash_not_deposited,
                    record.total_expense,
                    record.deposit_type,
                    record.shop_id,
                    record.amount,
                ],
            )
            .map_err(|e| GatewayError::Other(e.to_string()))?;
        }

        tx.commit().map_err(|e| GatewayError::Other(e.to_string()))
    }
}

// ============================================================================
// STORE STATS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub submissions: i64,
    pub records: i64,
    pub total_amount: f64,
    pub previous_collection: f64,
    pub cheque: f64,
    pub cash_not_deposited: f64,
    pub by_route: Vec<RouteStat>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteStat {
    pub route_name: String,
    pub record_count: i64,
    pub total_amount: f64,
}

// ============================================================================
// TESTS
// ============================================================================
