// 📋 Entry Session - form state for one daily collection entry
// Header fields + per-category breakdown rows, retained across interaction
// cycles and reset only after a confirmed successful submission.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ============================================================================
// LINE ITEMS
// ============================================================================

/// One breakdown row as entered in the grid.
/// Either field may still be blank while the user is editing; a row only
/// counts once both are filled in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(alias = "Shop ID")]
    pub shop_id: Option<u32>,

    #[serde(alias = "Amount", alias = "Amount Deposited")]
    pub amount: Option<f64>,
}

impl LineItem {
    pub fn new(shop_id: u32, amount: f64) -> Self {
        LineItem {
            shop_id: Some(shop_id),
            amount: Some(amount),
        }
    }

    pub fn blank() -> Self {
        LineItem {
            shop_id: None,
            amount: None,
        }
    }

    /// Both fields present, shop id positive, amount non-negative.
    /// Anything else is dropped before reconciliation and assembly.
    pub fn complete(&self) -> Option<(u32, f64)> {
        match (self.shop_id, self.amount) {
            (Some(shop), Some(amount)) if shop >= 1 && amount >= 0.0 => Some((shop, amount)),
            _ => None,
        }
    }
}

/// Load breakdown rows from a CSV file (spreadsheet export with
/// `shop_id,amount` columns). Blank cells deserialize as missing fields and
/// are kept in place so row order is preserved.
pub fn load_items_csv(csv_path: &Path) -> Result<Vec<LineItem>> {
    let mut rdr = csv::Reader::from_path(csv_path).context("Failed to open line-item CSV")?;

    let mut items = Vec::new();
    for result in rdr.deserialize() {
        let item: LineItem = result.context("Failed to deserialize line item")?;
        items.push(item);
    }

    Ok(items)
}

// ============================================================================
// BREAKDOWN CATEGORIES
// ============================================================================

/// Named bucket of line items that must reconcile against one declared total
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BreakdownCategory {
    PreviousCollection,
    Cheque,
    CashNotDeposited,
}

impl BreakdownCategory {
    /// Fixed ordering used for assembly and display
    pub const ALL: [BreakdownCategory; 3] = [
        BreakdownCategory::PreviousCollection,
        BreakdownCategory::Cheque,
        BreakdownCategory::CashNotDeposited,
    ];

    /// Wire tag stored on every flat record
    pub fn tag(&self) -> &'static str {
        match self {
            BreakdownCategory::PreviousCollection => "previous_collection",
            BreakdownCategory::Cheque => "cheque",
            BreakdownCategory::CashNotDeposited => "cash_not_deposited",
        }
    }

    /// Human-readable name for messages
    pub fn label(&self) -> &'static str {
        match self {
            BreakdownCategory::PreviousCollection => "Previous Collection",
            BreakdownCategory::Cheque => "Cheque Deposited",
            BreakdownCategory::CashNotDeposited => "Cash Not Deposited",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.tag() == tag)
    }
}

// ============================================================================
// ENTRY SESSION
// ============================================================================

/// Form state for one in-progress entry.
///
/// Owned by the interaction it belongs to, never a process-wide singleton, so
/// independent sessions stay isolated. Created with a freshly minted token,
/// mutated freely while editing, reset (with a new token) only after the store
/// confirms the submission. A failed submission leaves it untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntrySession {
    /// Idempotency token attached to every record of this session's batch
    pub token: String,

    pub date: NaiveDate,
    pub executive_id: String,
    pub route_name: String,

    /// Cash sales handed off on the day (no breakdown table)
    #[serde(default)]
    pub cash_sales_deposited: f64,

    /// Expenses claimed for the day (no breakdown table)
    #[serde(default)]
    pub total_expense: f64,

    /// Declared total per breakdown category
    #[serde(default)]
    pub declared: BTreeMap<BreakdownCategory, f64>,

    /// Ordered breakdown rows per category
    #[serde(default)]
    pub rows: BTreeMap<BreakdownCategory, Vec<LineItem>>,
}

impl EntrySession {
    /// Start a blank session dated today, carrying the given token
    pub fn new(token: String) -> Self {
        EntrySession {
            token,
            date: chrono::Local::now().date_naive(),
            executive_id: String::new(),
            route_name: String::new(),
            cash_sales_deposited: 0.0,
            total_expense: 0.0,
            declared: BTreeMap::new(),
            rows: BTreeMap::new(),
        }
    }

    pub fn declared_for(&self, category: BreakdownCategory) -> f64 {
        self.declared.get(&category).copied().unwrap_or(0.0)
    }

    pub fn rows_for(&self, category: BreakdownCategory) -> &[LineItem] {
        self.rows.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn set_declared(&mut self, category: BreakdownCategory, amount: f64) {
        self.declared.insert(category, amount);
    }

    pub fn push_row(&mut self, category: BreakdownCategory, item: LineItem) {
        self.rows.entry(category).or_default().push(item);
    }

    pub fn set_rows(&mut self, category: BreakdownCategory, items: Vec<LineItem>) {
        self.rows.insert(category, items);
    }

    pub fn clear_rows(&mut self) {
        self.rows.clear();
    }

    /// Derived header metric shown on the form: cash handed off plus the
    /// previous-collection deposit
    pub fn total_deposited(&self) -> f64 {
        self.cash_sales_deposited + self.declared_for(BreakdownCategory::PreviousCollection)
    }

    /// Wipe rows and declared amounts and install a fresh token.
    /// With `retain_header` the date/executive/route survive so the worker can
    /// enter the next batch for the same route without re-selecting.
    pub fn reset(&mut self, new_token: String, retain_header: bool) {
        self.token = new_token;
        self.declared.clear();
        self.rows.clear();
        self.cash_sales_deposited = 0.0;
        self.total_expense = 0.0;

        if !retain_header {
            self.date = chrono::Local::now().date_naive();
            self.executive_id.clear();
            self.route_name.clear();
        }
    }

    /// Load a session from a JSON entry file (the CLI input format)
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).context("Failed to read entry JSON file")?;
        let session: EntrySession =
            serde_json::from_str(&contents).context("Failed to parse entry JSON")?;
        Ok(session)
    }
}
