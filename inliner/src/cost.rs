//! Cost verdicts produced by the external cost model.
//!
//! The inliner never computes costs itself; it consumes verdicts and the
//! constants the cost model exposes.

/// The cost the model charges for a call instruction itself. Erasing the
/// call refunds this amount.
pub const CALL_PENALTY: i32 = 25;

/// The bonus the cost model applies to the last remaining call of a local
/// function, in anticipation of the definition being removed entirely.
/// Bonuses lower the cost, hence the negative value.
pub const LAST_CALL_TO_STATIC_BONUS: i32 = -15_000;

/// The verdict of the cost model for a single call site.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum InlineCost {
    /// The call must be inlined regardless of cost.
    Always,

    /// The call must never be inlined.
    Never,

    /// Inlining costs `cost` against a budget of `threshold`.
    Cost { cost: i32, threshold: i32 },
}

impl InlineCost {
    pub fn is_always(self) -> bool {
        matches!(self, InlineCost::Always)
    }

    pub fn is_never(self) -> bool {
        matches!(self, InlineCost::Never)
    }

    /// True when inlining is worth it: the cost is under the threshold.
    pub fn is_profitable(self) -> bool {
        match self {
            InlineCost::Always => true,
            InlineCost::Never => false,
            InlineCost::Cost { cost, threshold } => cost < threshold,
        }
    }

    pub fn cost(self) -> i32 {
        match self {
            InlineCost::Cost { cost, .. } => cost,
            _ => panic!("only numeric verdicts have a cost"),
        }
    }

    pub fn threshold(self) -> i32 {
        match self {
            InlineCost::Cost { threshold, .. } => threshold,
            _ => panic!("only numeric verdicts have a threshold"),
        }
    }

    /// How much budget is left after paying the cost.
    pub fn cost_delta(self) -> i32 {
        self.threshold() - self.cost()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_cost_profitability() {
        assert!(InlineCost::Always.is_profitable());
        assert!(!InlineCost::Never.is_profitable());
        assert!(InlineCost::Cost { cost: 10, threshold: 50 }.is_profitable());
        assert!(
            !InlineCost::Cost { cost: 50, threshold: 50 }.is_profitable()
        );
        assert!(
            !InlineCost::Cost { cost: 60, threshold: 50 }.is_profitable()
        );
    }

    #[test]
    fn test_inline_cost_delta() {
        assert_eq!(
            InlineCost::Cost { cost: 10, threshold: 50 }.cost_delta(),
            40
        );
        assert_eq!(
            InlineCost::Cost { cost: 60, threshold: 50 }.cost_delta(),
            -10
        );
    }
}
