// 📦 Submission Assembler - session snapshot → flat record batch
// Flattens header fields plus per-category breakdown rows into the wire shape
// the store inserts, every record stamped with the session's token.

use crate::pipeline::ValidationError;
use crate::reconciliation::ReconciliationEngine;
use crate::session::{BreakdownCategory, EntrySession};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Version tag of the flat record schema. Bump when categories or fields
/// change, so stored batches remain interpretable.
pub const SCHEMA_VERSION: u32 = 1;

// ============================================================================
// FLAT RECORD
// ============================================================================

/// One stored row: the full header repeated, plus one breakdown line.
/// This shape is the wire contract with the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatRecord {
    /// Idempotency token, identical across one submission batch
    pub transaction_id: String,

    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    pub date: String,
    pub executive_id: String,
    pub route_name: String,

    pub cash_sales_deposited: f64,
    pub previous_collection_deposited: f64,
    pub total_deposited: f64,
    pub cheque_deposited: f64,
    pub cash_not_deposited: f64,
    pub total_expense: f64,

    /// Which breakdown table this line came from
    pub deposit_type: String,
    pub shop_id: u32,
    pub amount: f64,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

// ============================================================================
// ASSEMBLY
// ============================================================================

/// Flatten a session into its submission batch.
///
/// Pure transformation: the session is not mutated, and identical snapshots
/// yield identical batches. Incomplete rows are dropped first; a category
/// with a positive declared amount but no surviving rows fails with a
/// collected validation error rather than an empty insert. Callers are
/// expected to have checked reconciliation verdicts already.
pub fn assemble(
    session: &EntrySession,
    engine: &ReconciliationEngine,
) -> Result<Vec<FlatRecord>, Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut records = Vec::new();

    for category in BreakdownCategory::ALL {
        let declared = session.declared_for(category);
        let complete: Vec<(u32, f64)> = session
            .rows_for(category)
            .iter()
            .filter_map(|item| item.complete())
            .collect();

        if complete.is_empty() && engine.requires_rows(declared) {
            errors.push(ValidationError {
                field: category.tag().to_string(),
                message: format!(
                    "{} breakdown is empty but its declared total is {:.2}",
                    category.label(),
                    declared
                ),
                context: "Assembly".to_string(),
            });
            continue;
        }

        for (shop_id, amount) in complete {
            records.push(FlatRecord {
                transaction_id: session.token.clone(),
                schema_version: SCHEMA_VERSION,
                date: session.date.to_string(),
                executive_id: session.executive_id.clone(),
                route_name: session.route_name.clone(),
                cash_sales_deposited: session.cash_sales_deposited,
                previous_collection_deposited: session
                    .declared_for(BreakdownCategory::PreviousCollection),
                total_deposited: session.total_deposited(),
                cheque_deposited: session.declared_for(BreakdownCategory::Cheque),
                cash_not_deposited: session.declared_for(BreakdownCategory::CashNotDeposited),
                total_expense: session.total_expense,
                deposit_type: category.tag().to_string(),
                shop_id,
                amount,
            });
        }
    }

    if errors.is_empty() {
        Ok(records)
    } else {
        Err(errors)
    }
}

/// SHA-256 fingerprint of a batch's content, token excluded.
///
/// Two submissions of the same session content fingerprint identically even
/// after a token rotation, which lets the store report whether a duplicate
/// token also carried duplicate content.
pub fn batch_fingerprint(records: &[FlatRecord]) -> String {
    let mut hasher = Sha256::new();

    for record in records {
        hasher.update(format!(
            "{}|{}|{}|{}|{}|{:.2}|{:.2}|{:.2}|{:.2}|{:.2}|{:.2}\n",
            record.date,
            record.executive_id,
            record.route_name,
            record.deposit_type,
            record.shop_id,
            record.amount,
            record.cash_sales_deposited,
            record.previous_collection_deposited,
            record.cheque_deposited,
            record.cash_not_deposited,
            record.total_expense,
        ));
    }

    format!("{:x}", hasher.finalize())
}

// ============================================================================
// TESTS
// ============================================================================
