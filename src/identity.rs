//! Ownership scoping: resolves who is calling.
//!
//! Identity-scoped collections capture the identity once at construction
//! time, not per operation. A collection built while signed in keeps
//! operating under that identity even if the owner signs out afterwards.

use crate::types::OwnerId;
use parking_lot::RwLock;

/// Tracks the currently signed-in owner.
#[derive(Debug)]
pub struct IdentityProvider {
    current: RwLock<Option<OwnerId>>,
}

impl IdentityProvider {
    /// Create a provider with no resolved identity.
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
        }
    }

    /// Resolve the current identity.
    pub fn current_identity(&self) -> Option<OwnerId> {
        self.current.read().clone()
    }

    /// Sign an owner in, replacing any previous identity.
    pub fn sign_in(&self, owner: impl Into<OwnerId>) {
        *self.current.write() = Some(owner.into());
    }

    /// Clear the resolved identity.
    pub fn sign_out(&self) {
        *self.current.write() = None;
    }
}

impl Default for IdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}
