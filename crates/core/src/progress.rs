// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operation progress and the parent/child aggregation algorithm (§4.3).

use serde::{Deserialize, Serialize};

/// Progress of a single operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationProgress {
    /// 0.0-100.0, monotonic non-decreasing within one run.
    pub percentage: f64,
    pub current_step: Option<String>,
    pub steps_completed: Option<u64>,
    pub steps_total: Option<u64>,
    pub items_processed: Option<u64>,
    pub items_total: Option<u64>,
    pub current_item: Option<String>,
}

impl OperationProgress {
    pub fn at(percentage: f64) -> Self {
        Self { percentage, ..Default::default() }
    }

    pub fn complete() -> Self {
        Self::at(100.0)
    }

    /// Enforces the monotonicity invariant: never accepts a percentage lower
    /// than the current one. Other fields (step label, item counters) always
    /// update to the latest report.
    pub fn apply_update(&mut self, update: OperationProgress) {
        if update.percentage >= self.percentage {
            self.percentage = update.percentage;
        }
        if update.current_step.is_some() {
            self.current_step = update.current_step;
        }
        if update.steps_completed.is_some() {
            self.steps_completed = update.steps_completed;
        }
        if update.steps_total.is_some() {
            self.steps_total = update.steps_total;
        }
        if update.items_processed.is_some() {
            self.items_processed = update.items_processed;
        }
        if update.items_total.is_some() {
            self.items_total = update.items_total;
        }
        if update.current_item.is_some() {
            self.current_item = update.current_item;
        }
    }
}

/// Result of aggregating a parent's progress from its children (§4.3).
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedProgress {
    pub percentage: f64,
    pub phase_label: Option<String>,
}

impl AggregatedProgress {
    pub fn empty() -> Self {
        Self { percentage: 0.0, phase_label: None }
    }
}

/// One child's contribution to progress aggregation: its window and whether
/// it has finished, is the active (earliest non-terminal) phase, or hasn't
/// started. Kept decoupled from `OperationInfo` so the pure math is testable
/// without constructing full operation records.
#[derive(Debug, Clone, Copy)]
pub struct ChildContribution {
    pub window: crate::operation_type::PhaseWindow,
    pub is_terminal: bool,
    pub percentage: f64,
}

/// Computes the piecewise-linear aggregated progress described in §4.3:
/// completed children contribute their full window; the earliest
/// non-terminal child contributes its window scaled by its own percentage;
/// children after it (not yet reached) contribute nothing; children whose
/// window lies entirely before the active phase but are still non-terminal
/// (shouldn't normally happen, but conversion is total) are treated as not
/// yet reached.
///
/// `children` must already be in creation order.
pub fn aggregate(children: &[ChildContribution]) -> AggregatedProgress {
    if children.is_empty() {
        return AggregatedProgress::empty();
    }

    let mut percentage = 0.0;
    let mut phase_label = None;
    let mut active_found = false;

    for child in children {
        if active_found {
            // A later child only contributes once an earlier one is active;
            // until then it hasn't started.
            continue;
        }
        if child.is_terminal {
            percentage += child.window.span();
        } else {
            percentage += child.window.span() * (child.percentage / 100.0);
            phase_label = Some(child.window.label.to_string());
            active_found = true;
        }
    }

    AggregatedProgress { percentage, phase_label }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation_type::OperationType;

    #[test]
    fn monotonic_update_ignores_regressions() {
        let mut p = OperationProgress::at(50.0);
        p.apply_update(OperationProgress::at(30.0));
        assert_eq!(p.percentage, 50.0);
        p.apply_update(OperationProgress::at(60.0));
        assert_eq!(p.percentage, 60.0);
    }

    #[test]
    fn training_phase_example_from_spec() {
        // Design child completed, training child at 40% -> 5 + 75*0.4 = 35.0
        let design = ChildContribution {
            window: OperationType::AgentDesign.phase_window().unwrap(),
            is_terminal: true,
            percentage: 100.0,
        };
        let training = ChildContribution {
            window: OperationType::Training.phase_window().unwrap(),
            is_terminal: false,
            percentage: 40.0,
        };
        let result = aggregate(&[design, training]);
        assert!((result.percentage - 35.0).abs() < 1e-9);
        assert_eq!(result.phase_label.as_deref(), Some("Training"));
    }

    #[test]
    fn no_children_yields_zero() {
        assert_eq!(aggregate(&[]), AggregatedProgress::empty());
    }

    #[test]
    fn all_children_completed_yields_full_window_sum() {
        let design = ChildContribution {
            window: OperationType::AgentDesign.phase_window().unwrap(),
            is_terminal: true,
            percentage: 100.0,
        };
        let training = ChildContribution {
            window: OperationType::Training.phase_window().unwrap(),
            is_terminal: true,
            percentage: 100.0,
        };
        let backtest = ChildContribution {
            window: OperationType::Backtesting.phase_window().unwrap(),
            is_terminal: true,
            percentage: 100.0,
        };
        let result = aggregate(&[design, training, backtest]);
        assert!((result.percentage - 100.0).abs() < 1e-9);
    }
}
