// Daily Sales Collection - Core Library
// Reconciliation & submission controller for daily cash/credit collection
// entries, exposed for use in the CLI, the API server, and tests.

pub mod assemble;
pub mod gateway;
pub mod pipeline;
pub mod reconciliation;
pub mod reference;
pub mod session;
pub mod token;

// Re-export commonly used types
pub use assemble::{assemble, batch_fingerprint, FlatRecord, SCHEMA_VERSION};
pub use gateway::{GatewayError, RouteStat, SqliteGateway, StoreGateway, StoreStats};
pub use pipeline::{
    ControllerConfig, EntryState, SubmissionController, SubmitOutcome, ValidationError,
    ValidationOutcome,
};
pub use reconciliation::{
    ReconciliationEngine, ReconciliationReport, Verdict, ZeroDeclaredPolicy,
};
pub use reference::{ReferenceData, ReferenceList};
pub use session::{load_items_csv, BreakdownCategory, EntrySession, LineItem};
pub use token::TokenManager;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
