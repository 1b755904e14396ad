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

use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};

use resources::{
    audit_event::Agent,
    dispensation::DispensationRecord,
    misc::PrescriptionId,
    prescription::Prescription,
    types::MessageStandard,
};

use crate::{
    audit::AuditTrail,
    codec::codec_for,
    error::Error,
    state::{Event, StateMachine},
    store::{QueryFilter, Store},
};

pub struct Options {
    /// Oldest prescription issue year still accepted on submit.
    pub epoch_year: i32,
}

impl Default for Options {
    fn default() -> Self {
        Self { epoch_year: 2020 }
    }
}

/// Central message exchange. Ties codecs, validation, lifecycle and
/// persistence together; all four wire operations enter here.
pub struct Exchange {
    store: Arc<dyn Store>,
    machine: StateMachine,
    audit: Arc<AuditTrail>,
    options: Options,
}

impl Exchange {
    pub fn new(store: Arc<dyn Store>, options: Options) -> Self {
        let audit = Arc::new(AuditTrail::new());
        let machine = StateMachine::new(audit.clone());

        Self {
            store,
            machine,
            audit,
            options,
        }
    }

    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    pub async fn status(&self, id: &PrescriptionId) -> Result<resources::Status, Error> {
        Ok(self.machine.status(id).await?)
    }

    /// Accepts an inbound prescription document. Decode, validate, register
    /// at `Submitted` and persist; a persistence failure rolls the
    /// registration back so the submit can be retried.
    pub async fn submit(
        &self,
        standard: MessageStandard,
        data: &[u8],
        agent: Agent,
    ) -> Result<PrescriptionId, Error> {
        let prescription = codec_for(standard).decode(data)?;

        prescription.validate(self.options.epoch_year, Utc::now())?;

        let id = prescription.prescription_number.clone();

        self.machine.register(&id, agent).await?;

        if let Err(err) = self.store.put(prescription).await {
            warn!("Prescription {} could not be stored: {}", id, err);

            self.machine.remove(&id).await;

            return Err(err.into());
        }

        info!("Prescription {} submitted as {}", id, standard);

        Ok(id)
    }

    /// Hands the prescription out to a pharmacy in the requested standard.
    /// An encode failure after the state already moved invalidates the
    /// prescription instead of leaving it half-retrieved.
    pub async fn retrieve(
        &self,
        id: &PrescriptionId,
        standard: MessageStandard,
        agent: Agent,
    ) -> Result<Vec<u8>, Error> {
        let status = self
            .machine
            .transition(id, Event::Retrieve, agent.clone(), None)
            .await?;

        let mut prescription = match self.store.get(id).await {
            Ok(Some(prescription)) => prescription,
            Ok(None) => {
                self.invalidate(id, agent, "missing from store").await;

                return Err(Error::NotStored(id.clone()));
            }
            Err(err) => {
                self.invalidate(id, agent, &err.to_string()).await;

                return Err(err.into());
            }
        };
        prescription.status = status;

        match codec_for(standard).encode(&prescription) {
            Ok(data) => {
                info!("Prescription {} retrieved as {}", id, standard);

                Ok(data)
            }
            Err(err) => {
                self.invalidate(id, agent, &err.to_string()).await;

                Err(err.into())
            }
        }
    }

    /// Books a completed hand-out against the prescription.
    pub async fn dispense(&self, record: DispensationRecord, agent: Agent) -> Result<(), Error> {
        record.validate()?;

        let id = record.prescription_number.clone();

        let prescription = self
            .store
            .get(&id)
            .await?
            .ok_or_else(|| Error::NotStored(id.clone()))?;

        if prescription.pharmacy.id != record.pharmacy_id {
            return Err(Error::PharmacyMismatch {
                expected: prescription.pharmacy.id,
                actual: record.pharmacy_id,
            });
        }

        let metadata = Some(format!("dispense_id={}", record.dispense_id));
        self.machine
            .transition(&id, Event::Dispense, agent.clone(), metadata)
            .await?;

        if let Err(err) = self.store.put_dispensation(record).await {
            warn!("Dispensation for {} could not be stored: {}", id, err);

            self.invalidate(&id, agent, &err.to_string()).await;

            return Err(err.into());
        }

        info!("Prescription {} dispensed", id);

        Ok(())
    }

    /// Regulator-facing read of the booked dispensation, if any.
    pub async fn dispensation(
        &self,
        id: &PrescriptionId,
    ) -> Result<Option<DispensationRecord>, Error> {
        Ok(self.store.get_dispensation(id).await?)
    }

    pub async fn cancel(&self, id: &PrescriptionId, agent: Agent) -> Result<(), Error> {
        self.machine.transition(id, Event::Cancel, agent, None).await?;

        info!("Prescription {} cancelled", id);

        Ok(())
    }

    /// Read-only search. Statuses are refreshed from the state machine, so
    /// the store never has to chase lifecycle updates.
    pub async fn query(&self, filter: &QueryFilter) -> Result<Vec<Prescription>, Error> {
        let mut store_filter = filter.clone();
        store_filter.status = None;

        let mut prescriptions = self.store.list(&store_filter).await?;

        for prescription in &mut prescriptions {
            if let Ok(status) = self.machine.status(&prescription.prescription_number).await {
                prescription.status = status;
            }
        }

        if let Some(status) = filter.status {
            prescriptions.retain(|prescription| prescription.status == status);
        }

        Ok(prescriptions)
    }

    async fn invalidate(&self, id: &PrescriptionId, agent: Agent, reason: &str) {
        warn!("Prescription {} invalidated: {}", id, reason);

        let _ = self
            .machine
            .transition(id, Event::Invalidate, agent, Some(reason.to_owned()))
            .await;
    }
}
