// ⚖️ Reconciliation Engine - declared totals vs itemized sums
// A breakdown table reconciles when the sum of its complete rows equals the
// declared header amount within a fixed tolerance (0.01, inclusive).
//
// Pure functions of their inputs: cheap enough to re-run on every row or
// declared-amount edit so the form always shows the current verdict.

use crate::session::{BreakdownCategory, EntrySession, LineItem};
use serde::{Deserialize, Serialize};

// ============================================================================
// VERDICT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Declared and itemized totals agree within tolerance
    pub matched: bool,

    /// Sum of complete rows (incomplete rows never contribute)
    pub actual_sum: f64,

    /// declared - actual_sum, sign preserved for display
    pub difference: f64,
}

impl Verdict {
    fn auto_match() -> Self {
        Verdict {
            matched: true,
            actual_sum: 0.0,
            difference: 0.0,
        }
    }
}

// ============================================================================
// ZERO-DECLARED POLICY
// ============================================================================

/// What to do when a category's declared amount is zero and its rows sum to
/// zero. The source form variants disagreed, so it is an explicit choice
/// rather than an implicit special case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroDeclaredPolicy {
    /// declared == 0 and sum == 0 short-circuits to an automatic match and
    /// exempts the category from the non-empty-rows requirement
    SkipWhenZero,

    /// Always run the tolerance formula; the non-empty-rows requirement
    /// applies whenever declared > 0
    AlwaysEvaluate,
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

pub struct ReconciliationEngine {
    /// Tolerance for declared-vs-sum comparison, inclusive (default 0.01)
    pub tolerance: f64,

    pub zero_policy: ZeroDeclaredPolicy,
}

/// Round a currency amount to integer cents. Comparisons happen in cents so
/// the tolerance boundary is inclusive without float-representation noise
/// (150.55 - 150.54 is slightly more than 0.01 in f64).
fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        ReconciliationEngine {
            tolerance: 0.01,
            zero_policy: ZeroDeclaredPolicy::SkipWhenZero,
        }
    }

    pub fn with_tolerance(tolerance: f64) -> Self {
        ReconciliationEngine {
            tolerance,
            zero_policy: ZeroDeclaredPolicy::SkipWhenZero,
        }
    }

    pub fn with_policy(zero_policy: ZeroDeclaredPolicy) -> Self {
        ReconciliationEngine {
            tolerance: 0.01,
            zero_policy,
        }
    }

    /// Compare a declared total against a table of line items.
    ///
    /// Rows missing either field are excluded before summing. `matched` is
    /// `|declared - sum| <= tolerance` at cent precision; `difference` keeps
    /// its sign so the user can see which side to correct.
    pub fn reconcile(&self, declared: f64, items: &[LineItem]) -> Verdict {
        let actual_sum: f64 = items
            .iter()
            .filter_map(|item| item.complete())
            .map(|(_, amount)| amount)
            .sum();

        if self.zero_policy == ZeroDeclaredPolicy::SkipWhenZero
            && to_cents(declared) == 0
            && to_cents(actual_sum) == 0
        {
            return Verdict::auto_match();
        }

        let difference = declared - actual_sum;
        let matched =
            (to_cents(declared) - to_cents(actual_sum)).abs() <= to_cents(self.tolerance);

        Verdict {
            matched,
            actual_sum,
            difference,
        }
    }

    /// Whether a category with this declared amount must have at least one
    /// complete row to be submittable
    pub fn requires_rows(&self, declared: f64) -> bool {
        to_cents(declared) > 0
    }

    /// Reconcile every breakdown category of a session
    pub fn reconcile_session(&self, session: &EntrySession) -> ReconciliationReport {
        let verdicts = BreakdownCategory::ALL
            .into_iter()
            .map(|category| {
                let verdict =
                    self.reconcile(session.declared_for(category), session.rows_for(category));
                (category, verdict)
            })
            .collect();

        ReconciliationReport { verdicts }
    }
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// RECONCILIATION REPORT
// ============================================================================

/// Per-category verdicts for one session snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub verdicts: Vec<(BreakdownCategory, Verdict)>,
}

impl ReconciliationReport {
    pub fn all_matched(&self) -> bool {
        self.verdicts.iter().all(|(_, v)| v.matched)
    }

    pub fn verdict(&self, category: BreakdownCategory) -> Option<&Verdict> {
        self.verdicts
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, v)| v)
    }

    /// Discrepancy messages for every mismatched category, declared total
    /// alongside the table sum so either side can be corrected
    pub fn discrepancies(&self, session: &EntrySession) -> Vec<String> {
        self.verdicts
            .iter()
            .filter(|(_, v)| !v.matched)
            .map(|(category, v)| {
                format!(
                    "{}: table sum is {:.2}, but declared total is {:.2} (difference {:+.2})",
                    category.label(),
                    v.actual_sum,
                    session.declared_for(*category),
                    v.difference,
                )
            })
            .collect()
    }

    pub fn summary(&self) -> String {
        let mismatched = self.verdicts.iter().filter(|(_, v)| !v.matched).count();
        if mismatched == 0 {
            format!("All {} categories reconciled", self.verdicts.len())
        } else {
            format!(
                "{} of {} categories do not reconcile",
                mismatched,
                self.verdicts.len()
            )
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_breakdown() {
        let engine = ReconciliationEngine::new();
        let items = vec![LineItem::new(1, 300.0), LineItem::new(2, 200.0)];

        let verdict = engine.reconcile(500.0, &items);

        assert!(verdict.matched);
        assert_eq!(verdict.actual_sum, 500.0);
        assert_eq!(verdict.difference, 0.0);
    }

    #[test]
    fn test_short_breakdown_preserves_sign() {
        let engine = ReconciliationEngine::new();
        let items = vec![LineItem::new(1, 300.0)];

        let verdict = engine.reconcile(500.0, &items);

        assert!(!verdict.matched);
        assert_eq!(verdict.actual_sum, 300.0);
        assert_eq!(verdict.difference, 200.0);
    }

    #[test]
    fn test_over_declared_difference_is_negative() {
        let engine = ReconciliationEngine::new();
        let items = vec![LineItem::new(1, 700.0)];

        let verdict = engine.reconcile(500.0, &items);

        assert!(!verdict.matched);
        assert_eq!(verdict.difference, -200.0);
    }

    #[test]
    fn test_tolerance_boundary_is_inclusive() {
        // 150.55 - 150.54 lands a hair above 0.01 in f64; cent precision
        // keeps the one-cent boundary a match
        let engine = ReconciliationEngine::new();
        let items = vec![LineItem::new(1, 150.54)];

        let verdict = engine.reconcile(150.55, &items);

        assert!(verdict.matched, "one-cent difference is within tolerance");
    }

    #[test]
    fn test_two_cents_off_is_a_mismatch() {
        let engine = ReconciliationEngine::new();
        let items = vec![LineItem::new(1, 150.53)];

        let verdict = engine.reconcile(150.55, &items);

        assert!(!verdict.matched);
    }

    #[test]
    fn test_incomplete_rows_do_not_contribute() {
        let engine = ReconciliationEngine::new();
        let items = vec![
            LineItem::new(1, 300.0),
            LineItem {
                shop_id: Some(2),
                amount: None,
            },
            LineItem {
                shop_id: None,
                amount: Some(999.0),
            },
            LineItem::new(3, 200.0),
        ];

        let verdict = engine.reconcile(500.0, &items);

        assert!(verdict.matched);
        assert_eq!(verdict.actual_sum, 500.0);
    }

    #[test]
    fn test_zero_declared_skip_policy_auto_matches() {
        let engine = ReconciliationEngine::with_policy(ZeroDeclaredPolicy::SkipWhenZero);

        let verdict = engine.reconcile(0.0, &[]);

        assert!(verdict.matched);
        assert_eq!(verdict.actual_sum, 0.0);
        assert_eq!(verdict.difference, 0.0);
    }

    #[test]
    fn test_zero_declared_evaluate_policy_also_matches_on_empty() {
        // Same observable verdict, but reached through the formula rather
        // than the short-circuit
        let engine = ReconciliationEngine::with_policy(ZeroDeclaredPolicy::AlwaysEvaluate);

        let verdict = engine.reconcile(0.0, &[]);

        assert!(verdict.matched);
    }

    #[test]
    fn test_zero_declared_with_nonzero_rows_is_a_mismatch_under_both_policies() {
        let items = vec![LineItem::new(1, 50.0)];

        for policy in [
            ZeroDeclaredPolicy::SkipWhenZero,
            ZeroDeclaredPolicy::AlwaysEvaluate,
        ] {
            let engine = ReconciliationEngine::with_policy(policy);
            let verdict = engine.reconcile(0.0, &items);
            assert!(!verdict.matched, "policy {:?} must flag stray rows", policy);
            assert_eq!(verdict.difference, -50.0);
        }
    }

    #[test]
    fn test_requires_rows_only_for_positive_declared() {
        let engine = ReconciliationEngine::new();

        assert!(engine.requires_rows(500.0));
        assert!(engine.requires_rows(0.01));
        assert!(!engine.requires_rows(0.0));
        assert!(!engine.requires_rows(0.004)); // rounds to zero cents
    }

    #[test]
    fn test_session_report() {
        let mut session = EntrySession::new("tok".to_string());
        session.set_declared(BreakdownCategory::PreviousCollection, 500.0);
        session.set_rows(
            BreakdownCategory::PreviousCollection,
            vec![LineItem::new(1, 300.0), LineItem::new(2, 200.0)],
        );
        session.set_declared(BreakdownCategory::Cheque, 150.0);
        session.set_rows(BreakdownCategory::Cheque, vec![LineItem::new(3, 100.0)]);

        let engine = ReconciliationEngine::new();
        let report = engine.reconcile_session(&session);

        assert!(!report.all_matched());
        assert!(report
            .verdict(BreakdownCategory::PreviousCollection)
            .unwrap()
            .matched);
        assert!(!report.verdict(BreakdownCategory::Cheque).unwrap().matched);
        // CashNotDeposited: declared 0, no rows -> auto match
        assert!(report
            .verdict(BreakdownCategory::CashNotDeposited)
            .unwrap()
            .matched);

        let messages = report.discrepancies(&session);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Cheque Deposited"));
        assert!(messages[0].contains("100.00"));
        assert!(messages[0].contains("150.00"));
    }
}
