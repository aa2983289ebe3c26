//! Operation context
//!
//! Who is acting, why, and from which source of change. Always an explicit
//! first parameter of engine operations - never ambient state - and threaded
//! through to audit and event construction.

use serde::{Deserialize, Serialize};

use super::domain::ChangeSource;
use super::identity::ActorId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpContext {
    pub actor: ActorId,
    pub reason: Option<String>,
    pub source: ChangeSource,
}

impl OpContext {
    /// Context for mutations pushed by the system of record.
    pub fn legacy(actor: ActorId) -> Self {
        Self {
            actor,
            reason: None,
            source: ChangeSource::Legacy,
        }
    }

    /// Context for locally authored actions.
    pub fn local(actor: ActorId) -> Self {
        Self {
            actor,
            reason: None,
            source: ChangeSource::Local,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}
