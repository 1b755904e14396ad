/*
 * Copyright (c) 2021 gematik GmbH
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *    http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 *
 */

use std::collections::hash_map::{Entry as MapEntry, HashMap};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;

use chrono::Utc;
use log::info;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

use resources::{
    audit_event::{Action, Agent, AuditEvent, Outcome},
    misc::PrescriptionId,
    prescription::Status,
    primitives::{second_precision, Id},
};

use crate::audit::AuditTrail;

/// Lifecycle state machine. Holds one entry per known prescription; each
/// entry carries its own mutex, so transitions on different prescriptions
/// never contend. The registry lock is only held while looking entries up.
pub struct StateMachine {
    registry: RwLock<HashMap<PrescriptionId, Arc<Mutex<Status>>>>,
    audit: Arc<AuditTrail>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Event {
    Retrieve,
    Dispense,
    Cancel,
    Invalidate,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Not Found: {0}!")]
    NotFound(PrescriptionId),

    #[error("Conflict: {0}!")]
    Conflict(PrescriptionId),

    #[error("Invalid Transition: {event} in state {from}!")]
    InvalidTransition { from: Status, event: Event },
}

impl StateMachine {
    pub fn new(audit: Arc<AuditTrail>) -> Self {
        Self {
            registry: RwLock::new(HashMap::new()),
            audit,
        }
    }

    /// Registers a freshly submitted prescription. The audit event is
    /// recorded before the registry lock is released, so a concurrent
    /// observer never sees the entry without its submit event.
    pub async fn register(&self, id: &PrescriptionId, agent: Agent) -> Result<(), Error> {
        let mut registry = self.registry.write().await;

        match registry.entry(id.clone()) {
            MapEntry::Occupied(_) => Err(Error::Conflict(id.clone())),
            MapEntry::Vacant(entry) => {
                entry.insert(Arc::new(Mutex::new(Status::Submitted)));

                self.audit
                    .record(audit_event(id, agent, Action::Submit, None))
                    .await;

                info!("Prescription {} registered", id);

                Ok(())
            }
        }
    }

    /// Applies `event` to the prescription. Exactly one of two outcomes:
    /// the state advances and one audit event is appended, or nothing
    /// changes at all.
    pub async fn transition(
        &self,
        id: &PrescriptionId,
        event: Event,
        agent: Agent,
        metadata: Option<String>,
    ) -> Result<Status, Error> {
        let entry = {
            let registry = self.registry.read().await;

            registry
                .get(id)
                .cloned()
                .ok_or_else(|| Error::NotFound(id.clone()))?
        };

        let mut status = entry.lock().await;

        let next = next_status(*status, event).ok_or(Error::InvalidTransition {
            from: *status,
            event,
        })?;

        self.audit
            .record(audit_event(id, agent, event.action(), metadata))
            .await;

        *status = next;

        info!("Prescription {} moved to {}", id, next);

        Ok(next)
    }

    pub async fn status(&self, id: &PrescriptionId) -> Result<Status, Error> {
        let entry = {
            let registry = self.registry.read().await;

            registry
                .get(id)
                .cloned()
                .ok_or_else(|| Error::NotFound(id.clone()))?
        };

        let status = entry.lock().await;

        Ok(*status)
    }

    /// Rolls back a registration whose follow-up persistence failed.
    pub(crate) async fn remove(&self, id: &PrescriptionId) {
        self.registry.write().await.remove(id);
    }
}

fn next_status(current: Status, event: Event) -> Option<Status> {
    match (current, event) {
        (_, Event::Invalidate) => Some(Status::Error),
        (Status::Submitted, Event::Retrieve) => Some(Status::Retrieved),
        (Status::Submitted, Event::Cancel) => Some(Status::Cancelled),
        // re-retrieval before dispense is allowed and idempotent
        (Status::Retrieved, Event::Retrieve) => Some(Status::Retrieved),
        (Status::Retrieved, Event::Dispense) => Some(Status::Dispensed),
        (Status::Retrieved, Event::Cancel) => Some(Status::Cancelled),
        _ => None,
    }
}

fn audit_event(
    id: &PrescriptionId,
    agent: Agent,
    action: Action,
    metadata: Option<String>,
) -> AuditEvent {
    AuditEvent {
        id: Id::generate(),
        prescription_id: id.clone(),
        agent,
        action,
        outcome: Outcome::Success,
        outcome_description: None,
        recorded: second_precision(Utc::now()),
        metadata,
    }
}

impl Event {
    pub fn action(&self) -> Action {
        match self {
            Self::Retrieve => Action::Retrieve,
            Self::Dispense => Action::Dispense,
            Self::Cancel => Action::Cancel,
            Self::Invalidate => Action::Invalidate,
        }
    }
}

impl Display for Event {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let s = match self {
            Self::Retrieve => "retrieve",
            Self::Dispense => "dispense",
            Self::Cancel => "cancel",
            Self::Invalidate => "invalidate",
        };

        write!(f, "{}", s)
    }
}
