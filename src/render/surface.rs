//! Drawable surface lifecycle.

use serde::{Deserialize, Serialize};

use crate::core::error::RenderError;

/// Lifecycle of the surface the render loop draws into.
///
/// `Uninitialized → Created → {Sized ⇄ Created} → Destroyed`. `Destroyed` is
/// terminal; every other state may jump to it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceState {
    /// No GPU context yet.
    #[default]
    Uninitialized,
    /// Context and surface exist; no size applied since the last (re)creation.
    Created,
    /// A size has been applied.
    Sized,
    /// Released for good.
    Destroyed,
}

impl SurfaceState {
    /// Whether GPU calls are legal in this state.
    #[must_use]
    pub const fn can_issue_gpu_calls(self) -> bool {
        matches!(self, Self::Created | Self::Sized)
    }

    /// Whether this is the terminal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Destroyed)
    }

    /// Whether `self → to` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Uninitialized | Self::Created | Self::Sized, Self::Created)
                | (Self::Created | Self::Sized, Self::Sized)
                | (_, Self::Destroyed)
        )
    }

    /// Move to `to`.
    ///
    /// # Errors
    ///
    /// [`RenderError::SurfaceTransition`] if the transition is illegal.
    pub fn transition(self, to: Self) -> Result<Self, RenderError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(RenderError::SurfaceTransition { from: self, to })
        }
    }
}
