//! Request status and the transition rules that gate direct status changes.
//!
//! Only edges listed in [`Status::allowed_targets`] may be taken through a
//! validated status change. Two other paths move a request without going
//! through here: consolidation into a purchase (`selected -> ordered`) and the
//! authoritative overrides applied by purchase propagation and fulfillment
//! reconciliation.
use crate::error::{EngineError, Result};
use std::fmt;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    #[n(0)]
    #[default]
    Pending,
    #[n(1)]
    Selected,
    #[n(2)]
    Ordered,
    #[n(3)]
    InDelivery,
    #[n(4)]
    Delivered,
    #[n(5)]
    Declined,
}

impl Status {
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Selected,
        Self::Ordered,
        Self::InDelivery,
        Self::Delivered,
        Self::Declined,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Selected => "selected",
            Self::Ordered => "ordered",
            Self::InDelivery => "in_delivery",
            Self::Delivered => "delivered",
            Self::Declined => "declined",
        }
    }

    /// States reachable from `self` through a validated status change.
    pub const fn allowed_targets(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Selected, Self::Declined],
            Self::Selected => &[Self::Pending, Self::Declined],
            Self::Ordered => &[Self::InDelivery],
            Self::InDelivery => &[Self::Ordered, Self::Delivered],
            Self::Delivered => &[],
            Self::Declined => &[Self::Pending],
        }
    }

    pub fn can_transition_to(self, target: Self) -> bool {
        self.allowed_targets().contains(&target)
    }

    /// `delivered` has no way out. `declined` can still be restored to `pending`.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts or rejects a direct status change.
pub fn validate_transition(from: Status, to: Status) -> Result<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(EngineError::InvalidTransition { from, to })
    }
}
