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

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use resources::{
    dispensation::DispensationRecord,
    misc::{NationalId, PharmacyId, PrescriptionId},
    prescription::{Prescription, Status},
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Storage Unavailable: {0}!")]
    Unavailable(String),
}

/// Search criteria for stored prescriptions. Empty filter matches all.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryFilter {
    pub patient: Option<NationalId>,
    pub prescriber: Option<NationalId>,
    pub pharmacy: Option<PharmacyId>,
    pub status: Option<Status>,
}

impl QueryFilter {
    pub fn matches(&self, prescription: &Prescription) -> bool {
        if let Some(patient) = &self.patient {
            if &prescription.patient != patient {
                return false;
            }
        }

        if let Some(prescriber) = &self.prescriber {
            if &prescription.prescriber.national_id != prescriber {
                return false;
            }
        }

        if let Some(pharmacy) = &self.pharmacy {
            if &prescription.pharmacy.id != pharmacy {
                return false;
            }
        }

        if let Some(status) = &self.status {
            if &prescription.status != status {
                return false;
            }
        }

        true
    }
}

/// Persistence seam of the exchange. The in-memory implementation below is
/// the default; deployments can plug a database-backed one in behind the
/// same trait.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, id: &PrescriptionId) -> Result<Option<Prescription>, Error>;

    async fn put(&self, prescription: Prescription) -> Result<(), Error>;

    async fn list(&self, filter: &QueryFilter) -> Result<Vec<Prescription>, Error>;

    async fn put_dispensation(&self, record: DispensationRecord) -> Result<(), Error>;

    async fn get_dispensation(
        &self,
        id: &PrescriptionId,
    ) -> Result<Option<DispensationRecord>, Error>;
}

#[derive(Default)]
pub struct MemStore {
    prescriptions: RwLock<HashMap<PrescriptionId, Prescription>>,
    dispensations: RwLock<HashMap<PrescriptionId, DispensationRecord>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemStore {
    async fn get(&self, id: &PrescriptionId) -> Result<Option<Prescription>, Error> {
        Ok(self.prescriptions.read().await.get(id).cloned())
    }

    async fn put(&self, prescription: Prescription) -> Result<(), Error> {
        self.prescriptions
            .write()
            .await
            .insert(prescription.prescription_number.clone(), prescription);

        Ok(())
    }

    async fn list(&self, filter: &QueryFilter) -> Result<Vec<Prescription>, Error> {
        let mut ret = self
            .prescriptions
            .read()
            .await
            .values()
            .filter(|prescription| filter.matches(prescription))
            .cloned()
            .collect::<Vec<_>>();

        ret.sort_by(|a, b| a.prescription_number.cmp(&b.prescription_number));

        Ok(ret)
    }

    async fn put_dispensation(&self, record: DispensationRecord) -> Result<(), Error> {
        self.dispensations
            .write()
            .await
            .insert(record.prescription_number.clone(), record);

        Ok(())
    }

    async fn get_dispensation(
        &self,
        id: &PrescriptionId,
    ) -> Result<Option<DispensationRecord>, Error> {
        Ok(self.dispensations.read().await.get(id).cloned())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    use crate::codec::tests::sample_prescription as test_prescription;

    #[tokio::test]
    async fn put_and_get() {
        let store = MemStore::new();
        let prescription = test_prescription();
        let id = prescription.prescription_number.clone();

        store.put(prescription.clone()).await.unwrap();

        assert_eq!(store.get(&id).await.unwrap(), Some(prescription));
        assert_eq!(
            store.get(&"RX-2025-ZZZ999".parse().unwrap()).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn dispensation_is_stored_per_prescription() {
        use chrono::{TimeZone, Utc};
        use resources::primitives::Id;

        let store = MemStore::new();
        let prescription = test_prescription();
        let id = prescription.prescription_number.clone();

        assert_eq!(store.get_dispensation(&id).await.unwrap(), None);

        let record = DispensationRecord {
            dispense_id: Id::generate(),
            prescription_number: id.clone(),
            pharmacy_id: prescription.pharmacy.id.clone(),
            pharmacist_id: "30102031211111".parse().unwrap(),
            pharmacist_license: "EPS-54321".parse().unwrap(),
            medications: prescription.medications.clone(),
            total_amount: 150.0,
            patient_paid: 50.0,
            insurance_covered: 100.0,
            dispensed_at: Utc.ymd(2025, 2, 2).and_hms(14, 30, 0),
            notes: None,
            notes_ar: None,
        };

        store.put_dispensation(record.clone()).await.unwrap();

        assert_eq!(store.get_dispensation(&id).await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn list_filters_by_patient_and_pharmacy() {
        let store = MemStore::new();

        let first = test_prescription();
        let mut second = test_prescription();
        second.prescription_number = "RX-2025-DEF456".parse().unwrap();
        second.patient = "30102031211111".parse().unwrap();

        store.put(first.clone()).await.unwrap();
        store.put(second.clone()).await.unwrap();

        let all = store.list(&QueryFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);

        let filter = QueryFilter {
            patient: Some(first.patient.clone()),
            ..QueryFilter::default()
        };
        let matched = store.list(&filter).await.unwrap();
        assert_eq!(matched, vec![first.clone()]);

        let filter = QueryFilter {
            pharmacy: Some(first.pharmacy.id.clone()),
            ..QueryFilter::default()
        };
        let matched = store.list(&filter).await.unwrap();
        assert_eq!(matched.len(), 2);
    }
}
