// ✅ Validation & Submission Pipeline
// Orchestrates one entry session through
//   Editing -> Validating -> Invalid | (Submitting -> Saved | Failed)
// Every violated check is collected and surfaced together so one corrective
// pass can fix everything; nothing here is fatal.

use crate::assemble::assemble;
use crate::gateway::{GatewayError, StoreGateway};
use crate::reconciliation::{ReconciliationEngine, ReconciliationReport, ZeroDeclaredPolicy};
use crate::reference::ReferenceData;
use crate::session::{BreakdownCategory, EntrySession};
use crate::token::TokenManager;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// VALIDATION ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub context: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.context, self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationOutcome = Result<(), Vec<ValidationError>>;

fn header_error(field: &str, message: String) -> ValidationError {
    ValidationError {
        field: field.to_string(),
        message,
        context: "Header".to_string(),
    }
}

// ============================================================================
// CONTROLLER CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Keep date/executive/route after a successful submission so the same
    /// worker can enter the next batch without re-selecting
    pub retain_header_on_success: bool,

    pub tolerance: f64,
    pub zero_policy: ZeroDeclaredPolicy,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            retain_header_on_success: true,
            tolerance: 0.01,
            zero_policy: ZeroDeclaredPolicy::SkipWhenZero,
        }
    }
}

// ============================================================================
// STATES & OUTCOMES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// User freely mutates the session; reconciliation is recomputed on read
    Editing,

    /// A batch insert is pending; re-entrant submits are refused
    Submitting,
}

#[derive(Debug)]
pub enum SubmitOutcome {
    /// Store accepted the batch: token rotated, session reset
    Saved { token: String, records: usize },

    /// Validation failed; session untouched, all violations listed
    Invalid(Vec<ValidationError>),

    /// Store rejected the batch; session AND token retained verbatim so a
    /// retry reuses the same idempotency key
    Failed(GatewayError),

    /// A submission was already in flight for this session
    AlreadyInFlight,
}

// ============================================================================
// SUBMISSION CONTROLLER
// ============================================================================

/// Owns one entry session end to end: edit-phase mutation, interactive
/// reconciliation feedback, submit-time validation, and the token lifecycle.
/// Owned by the interaction it serves, never shared between sessions.
pub struct SubmissionController {
    session: EntrySession,
    tokens: TokenManager,
    engine: ReconciliationEngine,
    reference: ReferenceData,
    config: ControllerConfig,
    state: EntryState,
}

impl SubmissionController {
    pub fn new(reference: ReferenceData, config: ControllerConfig) -> Self {
        let tokens = TokenManager::new();
        let session = EntrySession::new(tokens.current().to_string());

        let engine = ReconciliationEngine {
            tolerance: config.tolerance,
            zero_policy: config.zero_policy,
        };

        SubmissionController {
            session,
            tokens,
            engine,
            reference,
            config,
            state: EntryState::Editing,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ReferenceData::builtin(), ControllerConfig::default())
    }

    /// Start the controller on an already-filled session (a loaded entry
    /// file). The session keeps its own token if it carries one.
    pub fn resume(
        mut session: EntrySession,
        reference: ReferenceData,
        config: ControllerConfig,
    ) -> Self {
        let mut controller = Self::new(reference, config);
        if session.token.is_empty() {
            session.token = controller.tokens.current().to_string();
        }
        controller.session = session;
        controller
    }

    pub fn session(&self) -> &EntrySession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut EntrySession {
        &mut self.session
    }

    pub fn state(&self) -> EntryState {
        self.state
    }

    pub fn current_token(&self) -> &str {
        &self.session.token
    }

    /// Live reconciliation verdicts for the current snapshot. Pure and
    /// uncached: recomputed on every call so the form always shows the
    /// current status.
    pub fn report(&self) -> ReconciliationReport {
        self.engine.reconcile_session(&self.session)
    }

    /// Run every submit-time check and collect all violations together
    pub fn validate(&self) -> ValidationOutcome {
        let mut errors = Vec::new();

        // Header completeness
        if self
            .reference
            .executives
            .is_placeholder(&self.session.executive_id)
        {
            errors.push(header_error(
                "executive_id",
                "Select a valid Executive ID".to_string(),
            ));
        } else if !self.reference.executives.contains(&self.session.executive_id) {
            errors.push(header_error(
                "executive_id",
                format!("Unknown executive id '{}'", self.session.executive_id),
            ));
        }

        if self.reference.routes.is_placeholder(&self.session.route_name) {
            errors.push(header_error(
                "route_name",
                "Select a valid Route Name".to_string(),
            ));
        } else if !self.reference.routes.contains(&self.session.route_name) {
            errors.push(header_error(
                "route_name",
                format!("Unknown route name '{}'", self.session.route_name),
            ));
        }

        if self.session.cash_sales_deposited < 0.0 {
            errors.push(header_error(
                "cash_sales_deposited",
                "Amount cannot be negative".to_string(),
            ));
        }
        if self.session.total_expense < 0.0 {
            errors.push(header_error(
                "total_expense",
                "Amount cannot be negative".to_string(),
            ));
        }
        for category in BreakdownCategory::ALL {
            if self.session.declared_for(category) < 0.0 {
                errors.push(header_error(
                    category.tag(),
                    "Declared amount cannot be negative".to_string(),
                ));
            }
        }

        // Per-category reconciliation
        let report = self.report();
        for (category, verdict) in &report.verdicts {
            if !verdict.matched {
                errors.push(ValidationError {
                    field: category.tag().to_string(),
                    message: format!(
                        "Table sum is {:.2}, but declared total is {:.2} (difference {:+.2})",
                        verdict.actual_sum,
                        self.session.declared_for(*category),
                        verdict.difference,
                    ),
                    context: "Reconciliation".to_string(),
                });
            }
        }

        // Empty-required-category checks and overall non-empty batch
        match assemble(&self.session, &self.engine) {
            Ok(records) if records.is_empty() => {
                errors.push(ValidationError {
                    field: "rows".to_string(),
                    message: "Enter at least one breakdown row".to_string(),
                    context: "Assembly".to_string(),
                });
            }
            Ok(_) => {}
            Err(mut assembly_errors) => errors.append(&mut assembly_errors),
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate, assemble, and push the batch through the gateway.
    ///
    /// On success the token rotates and the session resets (header per
    /// config). On any failure the session and token are left untouched:
    /// rotating on a failure path would give the retry a fresh key and
    /// defeat the store's duplicate protection.
    pub fn submit(&mut self, gateway: &mut dyn StoreGateway) -> SubmitOutcome {
        if self.state == EntryState::Submitting {
            return SubmitOutcome::AlreadyInFlight;
        }

        if let Err(errors) = self.validate() {
            return SubmitOutcome::Invalid(errors);
        }

        let records = match assemble(&self.session, &self.engine) {
            Ok(records) => records,
            Err(errors) => return SubmitOutcome::Invalid(errors),
        };

        self.state = EntryState::Submitting;
        let result = gateway.insert_batch(&records);
        self.state = EntryState::Editing;

        match result {
            Ok(()) => {
                let used_token = self.session.token.clone();
                let fresh = self.tokens.rotate().to_string();
                self.session.reset(fresh, self.config.retain_header_on_success);

                SubmitOutcome::Saved {
                    token: used_token,
                    records: records.len(),
                }
            }
            Err(error) => SubmitOutcome::Failed(error),
        }
    }

    /// User confirmed a duplicate-token rejection meant the entry was indeed
    /// already saved: discard the session content and start fresh. This is
    /// the only failure path that rotates the token, and only because the
    /// user explicitly asked for it.
    pub fn acknowledge_duplicate(&mut self) {
        let fresh = self.tokens.rotate().to_string();
        self.session.reset(fresh, self.config.retain_header_on_success);
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::FlatRecord;
    use crate::gateway::SqliteGateway;
    use crate::session::LineItem;

    /// Scripted gateway fake: records every batch, fails on demand
    struct FakeGateway {
        batches: Vec<Vec<FlatRecord>>,
        fail_with: Option<GatewayError>,
    }

    impl FakeGateway {
        fn accepting() -> Self {
            FakeGateway {
                batches: Vec::new(),
                fail_with: None,
            }
        }

        fn failing(error: GatewayError) -> Self {
            FakeGateway {
                batches: Vec::new(),
                fail_with: Some(error),
            }
        }
    }

    impl StoreGateway for FakeGateway {
        fn insert_batch(&mut self, records: &[FlatRecord]) -> Result<(), GatewayError> {
            self.batches.push(records.to_vec());
            match &self.fail_with {
                Some(error) => Err(error.clone()),
                None => Ok(()),
            }
        }
    }

    fn filled_controller() -> SubmissionController {
        let mut controller = SubmissionController::with_defaults();
        let session = controller.session_mut();
        session.executive_id = "660373-Ajith K".to_string();
        session.route_name = "KV64-Kasaragod Route".to_string();
        session.cash_sales_deposited = 1000.0;
        session.set_declared(BreakdownCategory::PreviousCollection, 500.0);
        session.set_rows(
            BreakdownCategory::PreviousCollection,
            vec![LineItem::new(1, 300.0), LineItem::new(2, 200.0)],
        );
        controller
    }

    #[test]
    fn test_valid_session_passes_validation() {
        let controller = filled_controller();
        assert!(controller.validate().is_ok());
    }

    #[test]
    fn test_invalid_collects_every_violation_at_once() {
        let mut controller = SubmissionController::with_defaults();
        let session = controller.session_mut();
        session.executive_id = "Select Executive ID".to_string();
        session.route_name = "Select Route Name".to_string();
        // Mismatched cheque table
        session.set_declared(BreakdownCategory::Cheque, 500.0);
        session.set_rows(BreakdownCategory::Cheque, vec![LineItem::new(1, 300.0)]);
        // Declared amount with no rows at all
        session.set_declared(BreakdownCategory::PreviousCollection, 250.0);

        let errors = controller.validate().unwrap_err();

        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"executive_id"));
        assert!(fields.contains(&"route_name"));
        assert!(fields.contains(&"cheque"));
        assert!(fields.contains(&"previous_collection"));
        assert!(errors.len() >= 4, "All violations surface together");
    }

    #[test]
    fn test_unknown_reference_values_are_flagged() {
        let mut controller = filled_controller();
        controller.session_mut().executive_id = "999999-Nobody".to_string();

        let errors = controller.validate().unwrap_err();

        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("999999-Nobody"));
    }

    #[test]
    fn test_negative_amounts_are_flagged() {
        let mut controller = filled_controller();
        controller.session_mut().total_expense = -10.0;

        let errors = controller.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.field == "total_expense"));
    }

    #[test]
    fn test_invalid_submit_leaves_session_untouched() {
        let mut controller = SubmissionController::with_defaults();
        controller.session_mut().set_declared(BreakdownCategory::Cheque, 500.0);
        let token_before = controller.current_token().to_string();
        let session_before = controller.session().clone();

        let mut gateway = FakeGateway::accepting();
        let outcome = controller.submit(&mut gateway);

        assert!(matches!(outcome, SubmitOutcome::Invalid(_)));
        assert!(gateway.batches.is_empty(), "Nothing reaches the store");
        assert_eq!(controller.current_token(), token_before);
        assert_eq!(controller.session(), &session_before);
    }

    #[test]
    fn test_saved_rotates_token_and_resets_rows() {
        let mut controller = filled_controller();
        let token_before = controller.current_token().to_string();

        let mut gateway = FakeGateway::accepting();
        let outcome = controller.submit(&mut gateway);

        match outcome {
            SubmitOutcome::Saved { token, records } => {
                assert_eq!(token, token_before, "Batch carried the session token");
                assert_eq!(records, 2);
            }
            other => panic!("Expected Saved, got {:?}", other),
        }

        assert_ne!(controller.current_token(), token_before);
        assert!(controller.session().rows.is_empty());
        assert!(controller.session().declared.is_empty());
        // Header retained per default config
        assert_eq!(controller.session().executive_id, "660373-Ajith K");
        assert_eq!(controller.state(), EntryState::Editing);
    }

    #[test]
    fn test_saved_can_clear_header() {
        let config = ControllerConfig {
            retain_header_on_success: false,
            ..ControllerConfig::default()
        };
        let mut controller =
            SubmissionController::new(ReferenceData::builtin(), config);
        let session = controller.session_mut();
        session.executive_id = "660373-Ajith K".to_string();
        session.route_name = "KV64-Kasaragod Route".to_string();
        session.set_declared(BreakdownCategory::Cheque, 100.0);
        session.set_rows(BreakdownCategory::Cheque, vec![LineItem::new(5, 100.0)]);

        let mut gateway = FakeGateway::accepting();
        let outcome = controller.submit(&mut gateway);

        assert!(matches!(outcome, SubmitOutcome::Saved { .. }));
        assert!(controller.session().executive_id.is_empty());
        assert!(controller.session().route_name.is_empty());
    }

    #[test]
    fn test_failed_retains_session_and_token_for_retry() {
        let mut controller = filled_controller();
        let token_before = controller.current_token().to_string();
        let session_before = controller.session().clone();

        let mut failing =
            FakeGateway::failing(GatewayError::Other("connection reset".to_string()));
        let outcome = controller.submit(&mut failing);

        assert!(matches!(outcome, SubmitOutcome::Failed(GatewayError::Other(_))));
        assert_eq!(controller.current_token(), token_before);
        assert_eq!(controller.session(), &session_before);
        assert_eq!(controller.state(), EntryState::Editing);

        // The retry reuses the identical idempotency key
        let mut accepting = FakeGateway::accepting();
        let outcome = controller.submit(&mut accepting);
        match outcome {
            SubmitOutcome::Saved { token, .. } => assert_eq!(token, token_before),
            other => panic!("Expected Saved, got {:?}", other),
        }
        assert_eq!(
            accepting.batches[0][0].transaction_id, token_before,
            "Retried batch carried the original token"
        );
    }

    #[test]
    fn test_duplicate_rejection_does_not_rotate() {
        let mut controller = filled_controller();
        let token_before = controller.current_token().to_string();

        let mut gateway = FakeGateway::failing(GatewayError::DuplicateToken {
            token: token_before.clone(),
            same_content: true,
        });
        let outcome = controller.submit(&mut gateway);

        match outcome {
            SubmitOutcome::Failed(error) => assert!(error.is_duplicate()),
            other => panic!("Expected Failed, got {:?}", other),
        }
        assert_eq!(
            controller.current_token(),
            token_before,
            "Token rotates only after user confirmation"
        );
    }

    #[test]
    fn test_acknowledge_duplicate_rotates_and_resets() {
        let mut controller = filled_controller();
        let token_before = controller.current_token().to_string();

        controller.acknowledge_duplicate();

        assert_ne!(controller.current_token(), token_before);
        assert!(controller.session().rows.is_empty());
    }

    #[test]
    fn test_end_to_end_against_sqlite() {
        let mut gateway = SqliteGateway::open_in_memory().unwrap();

        let mut controller = filled_controller();
        let first_token = controller.current_token().to_string();

        let outcome = controller.submit(&mut gateway);
        assert!(matches!(outcome, SubmitOutcome::Saved { .. }));
        assert_eq!(gateway.record_count().unwrap(), 2);

        // Next entry gets its own token and lands as a second submission
        let session = controller.session_mut();
        session.set_declared(BreakdownCategory::Cheque, 75.0);
        session.set_rows(BreakdownCategory::Cheque, vec![LineItem::new(9, 75.0)]);

        let outcome = controller.submit(&mut gateway);
        match outcome {
            SubmitOutcome::Saved { token, .. } => assert_ne!(token, first_token),
            other => panic!("Expected Saved, got {:?}", other),
        }
        assert_eq!(gateway.submission_count().unwrap(), 2);
        assert_eq!(gateway.record_count().unwrap(), 3);
    }

    #[test]
    fn test_report_reflects_live_edits() {
        let mut controller = filled_controller();
        assert!(controller.report().all_matched());

        controller
            .session_mut()
            .set_declared(BreakdownCategory::PreviousCollection, 600.0);

        let report = controller.report();
        assert!(!report.all_matched());
        let verdict = report
            .verdict(BreakdownCategory::PreviousCollection)
            .unwrap();
        assert_eq!(verdict.difference, 100.0);
    }

    #[test]
    fn test_resume_keeps_loaded_token() {
        let mut session = EntrySession::new("loaded-token".to_string());
        session.executive_id = "660373-Ajith K".to_string();

        let controller = SubmissionController::resume(
            session,
            ReferenceData::builtin(),
            ControllerConfig::default(),
        );

        assert_eq!(controller.current_token(), "loaded-token");
    }

    #[test]
    fn test_resume_mints_for_blank_token() {
        let session = EntrySession::new(String::new());

        let controller = SubmissionController::resume(
            session,
            ReferenceData::builtin(),
            ControllerConfig::default(),
        );

        assert!(!controller.current_token().is_empty());
    }
}
