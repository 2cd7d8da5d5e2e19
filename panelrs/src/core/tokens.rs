//! In-flight markers enforcing one live operation per (target, kind).
//!
//! Enable and disable share a single radio slot per subsystem, so the two
//! can never race on the same radio.

use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::api::models::{OperationKind, OperationPhase, OperationRequest, Subsystem};
use crate::{PanelError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TokenKey {
    subsystem: Subsystem,
    target: String,
    slot: OperationKind,
}

/// A live token's actual kind and its phase.
#[derive(Debug, Clone, Copy)]
struct Held {
    kind: OperationKind,
    phase: OperationPhase,
}

/// An operation currently holding a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlight {
    /// Subsystem of the target
    pub subsystem: Subsystem,
    /// Target identifier (the subsystem name for radio operations)
    pub identifier: String,
    /// What is being done
    pub kind: OperationKind,
    /// How far the operation has got
    pub phase: OperationPhase,
}

/// Registry of live tokens, shared between the scheduler and its tasks.
#[derive(Debug, Clone, Default)]
pub(crate) struct TokenRegistry {
    live: Arc<Mutex<HashMap<TokenKey, Held>>>,
}

impl TokenRegistry {
    fn lock(&self) -> MutexGuard<'_, HashMap<TokenKey, Held>> {
        // A poisoned map is still consistent: entries are only inserted or removed.
        self.live.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Takes the token for `request`, failing with [`PanelError::Busy`] when
    /// an operation of the same kind (or any radio toggle, for radio
    /// requests) already holds it.
    pub(crate) fn acquire(&self, request: &OperationRequest) -> Result<OperationToken> {
        let key = TokenKey {
            subsystem: request.subsystem,
            target: request.token_target(),
            slot: request.token_slot(),
        };

        let mut live = self.lock();
        if let Some(held) = live.get(&key) {
            debug!(
                "Rejecting {} for '{}': {} holds the token",
                request.kind, key.target, held.kind
            );
            return Err(PanelError::Busy {
                identifier: key.target,
                kind: request.kind,
            });
        }
        live.insert(
            key.clone(),
            Held {
                kind: request.kind,
                phase: OperationPhase::Idle,
            },
        );

        Ok(OperationToken {
            registry: self.clone(),
            key,
        })
    }

    /// Copies out every live token and its phase.
    pub(crate) fn snapshot(&self) -> Vec<InFlight> {
        self.lock()
            .iter()
            .map(|(key, held)| InFlight {
                subsystem: key.subsystem,
                identifier: key.target.clone(),
                kind: held.kind,
                phase: held.phase,
            })
            .collect()
    }
}

/// Proof that an operation owns its (target, kind) pair.
///
/// The pair is released when the token is dropped.
#[derive(Debug)]
pub(crate) struct OperationToken {
    registry: TokenRegistry,
    key: TokenKey,
}

impl OperationToken {
    /// Records the phase the operation has entered.
    pub(crate) fn advance(&self, phase: OperationPhase) {
        if let Some(held) = self.registry.lock().get_mut(&self.key) {
            held.phase = phase;
        }
    }
}

impl Drop for OperationToken {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.key);
    }
}
