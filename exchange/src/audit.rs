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

use tokio::sync::Mutex;

use resources::{audit_event::AuditEvent, misc::PrescriptionId};

/// Append-only audit log. Insertion order is the canonical history; events
/// are never updated or removed.
#[derive(Default)]
pub struct AuditTrail {
    events: Mutex<Vec<AuditEvent>>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, event: AuditEvent) {
        self.events.lock().await.push(event);
    }

    /// All events for one prescription, oldest first.
    pub async fn history(&self, prescription_id: &PrescriptionId) -> Vec<AuditEvent> {
        self.events
            .lock()
            .await
            .iter()
            .filter(|event| &event.prescription_id == prescription_id)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.events.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.lock().await.is_empty()
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    use chrono::Utc;

    use resources::{
        audit_event::{Action, ActorRole, Agent, Outcome},
        primitives::Id,
    };

    pub fn test_event(prescription_id: &str, action: Action) -> AuditEvent {
        AuditEvent {
            id: Id::generate(),
            prescription_id: prescription_id.parse().unwrap(),
            agent: Agent {
                id: "27503150267898".into(),
                name: "Dr. Selim".into(),
                role: ActorRole::Doctor,
            },
            action,
            outcome: Outcome::Success,
            outcome_description: None,
            recorded: Utc::now(),
            metadata: None,
        }
    }

    #[tokio::test]
    async fn history_preserves_insertion_order() {
        let trail = AuditTrail::new();

        trail
            .record(test_event("RX-2025-ABC123", Action::Submit))
            .await;
        trail
            .record(test_event("RX-2025-ZZZ999", Action::Submit))
            .await;
        trail
            .record(test_event("RX-2025-ABC123", Action::Retrieve))
            .await;

        let history = trail.history(&"RX-2025-ABC123".parse().unwrap()).await;

        assert_eq!(history.len(), 2);
        assert_eq!(history[0].action, Action::Submit);
        assert_eq!(history[1].action, Action::Retrieve);

        assert_eq!(trail.len().await, 3);
    }
}
