//! Rebalance planning: diff current holdings against the selected set.

use crate::domain::factor::Candidate;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebalanceAction {
    Close,
    Resize,
    Open,
}

/// One target-weight transition for the execution collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct RebalanceInstruction {
    pub order_book_id: String,
    pub action: RebalanceAction,
    pub target_weight: f64,
}

/// Compute the transitions that move `current` holdings to the candidate set.
///
/// Emits closes first (freeing capital before anything is opened), then
/// resizes for positions that stay, then opens, the latter two in candidate
/// rank order. Held-but-unselected positions go to weight zero; everything
/// selected targets an equal `1/top` slice.
pub fn plan(
    current: &BTreeSet<String>,
    candidates: &[Candidate],
    top: usize,
) -> Vec<RebalanceInstruction> {
    let slice = 1.0 / top as f64;
    let selected: BTreeSet<&str> = candidates
        .iter()
        .map(|c| c.order_book_id.as_str())
        .collect();

    let mut instructions = Vec::new();

    for held in current {
        if !selected.contains(held.as_str()) {
            instructions.push(RebalanceInstruction {
                order_book_id: held.clone(),
                action: RebalanceAction::Close,
                target_weight: 0.0,
            });
        }
    }

    for candidate in candidates {
        if current.contains(&candidate.order_book_id) {
            instructions.push(RebalanceInstruction {
                order_book_id: candidate.order_book_id.clone(),
                action: RebalanceAction::Resize,
                target_weight: slice,
            });
        }
    }

    for candidate in candidates {
        if !current.contains(&candidate.order_book_id) {
            instructions.push(RebalanceInstruction {
                order_book_id: candidate.order_book_id.clone(),
                action: RebalanceAction::Open,
                target_weight: slice,
            });
        }
    }

    instructions
}
