use crate::domain::prediction::round2;
use crate::domain::recommendation::Action;

/// How a HOLD call is judged.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum HoldPolicy {
    /// HOLD never counts as correct.
    #[default]
    AlwaysIncorrect,
    /// HOLD is correct while the price stays within `tolerance_pct` percent of
    /// the recorded snapshot.
    Band { tolerance_pct: f64 },
}

impl HoldPolicy {
    pub fn from_tolerance(tolerance_pct: Option<f64>) -> Self {
        match tolerance_pct {
            Some(tolerance_pct) => HoldPolicy::Band { tolerance_pct },
            None => HoldPolicy::AlwaysIncorrect,
        }
    }
}

/// BUY is right when the price rose, SELL when it fell. Everything else
/// (unknown actions, and HOLD unless a band is configured) is wrong.
pub fn is_correct(action: &Action, recorded: f64, current: f64, hold: HoldPolicy) -> bool {
    match action {
        Action::Buy => current > recorded,
        Action::Sell => current < recorded,
        Action::Hold => match hold {
            HoldPolicy::AlwaysIncorrect => false,
            HoldPolicy::Band { tolerance_pct } => {
                recorded > 0.0 && (current - recorded).abs() / recorded * 100.0 <= tolerance_pct
            }
        },
        Action::Summary | Action::Other(_) => false,
    }
}

/// Percentage of correct calls, rounded to two decimals; `0.0` when nothing was scored.
pub fn accuracy_pct(correct: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round2(100.0 * correct as f64 / total as f64)
}
