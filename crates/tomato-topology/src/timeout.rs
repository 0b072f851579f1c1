use serde::{Deserialize, Serialize};
use std::fmt;

/// The escalation the reaper walks a topology through once its deadline
/// passes, numbered to match the reference ordering
/// `Initial < Warned < Stopped < Destroyed` with gaps left for any
/// intermediate step a future escalation might need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum TimeoutStep {
    Initial = 0,
    Warned = 9,
    Stopped = 10,
    Destroyed = 20,
}

impl TimeoutStep {
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for TimeoutStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimeoutStep::Initial => "initial",
            TimeoutStep::Warned => "warned",
            TimeoutStep::Stopped => "stopped",
            TimeoutStep::Destroyed => "destroyed",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_order_by_escalation() {
        assert!(TimeoutStep::Initial < TimeoutStep::Warned);
        assert!(TimeoutStep::Warned < TimeoutStep::Stopped);
        assert!(TimeoutStep::Stopped < TimeoutStep::Destroyed);
    }
}
