//! Point accrual.

use tracing::{debug, warn};

use crate::models::receipt::Subtotal;
use crate::models::state::RewardState;

/// Applies accepted subtotals to a [`RewardState`].
///
/// One point per whole currency unit; the fractional part earns nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct RewardLedger;

impl RewardLedger {
    pub fn new() -> Self {
        Self
    }

    /// Points earned for a single subtotal.
    pub fn points_for(&self, amount: &Subtotal) -> u64 {
        amount.whole_units()
    }

    /// Fold one extraction result into the state. `None` leaves it untouched,
    /// as does an amount the state has no room left for.
    pub fn apply(&self, state: RewardState, amount: Option<&Subtotal>) -> RewardState {
        let Some(amount) = amount else {
            return state;
        };

        self.checked_apply(state, amount).unwrap_or_else(|| {
            warn!("Reward totals cannot absorb {}, state unchanged", amount);
            state
        })
    }

    /// The state after accruing `amount`, or `None` if either total would overflow.
    pub fn checked_apply(&self, state: RewardState, amount: &Subtotal) -> Option<RewardState> {
        let points = self.points_for(amount);
        let next = RewardState {
            cumulative_amount: state.cumulative_amount.checked_add(amount.value())?,
            point_balance: state.point_balance.checked_add(points)?,
        };

        debug!(
            "Accrued {} points for {} (balance {} -> {})",
            points, amount, state.point_balance, next.point_balance
        );

        Some(next)
    }
}
