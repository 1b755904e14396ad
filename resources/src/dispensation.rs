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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::misc::{LicenseId, LicenseKind, NationalId, PharmacyId, PrescriptionId};
use super::prescription::MedicationLine;
use super::primitives::Id;

/// Record of a completed hand-out, including the financial breakdown in EGP.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DispensationRecord {
    pub dispense_id: Id,
    pub prescription_number: PrescriptionId,
    pub pharmacy_id: PharmacyId,
    pub pharmacist_id: NationalId,
    pub pharmacist_license: LicenseId,
    pub medications: Vec<MedicationLine>,
    pub total_amount: f64,
    pub patient_paid: f64,
    pub insurance_covered: f64,
    pub dispensed_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub notes_ar: Option<String>,
}

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Dispensed medication list must not be empty!")]
    EmptyMedicationList,

    #[error("Amounts must not be negative!")]
    NegativeAmount,

    #[error("Breakdown does not sum to total: {total} != {patient_paid} + {insurance_covered}!")]
    FinancialMismatch {
        total: f64,
        patient_paid: f64,
        insurance_covered: f64,
    },

    #[error("Pharmacist license must be issued by the pharmacist syndicate!")]
    WrongLicenseKind,
}

/// Half a piastre. Amounts are compared after rounding to whole piastres.
const ROUNDING_TOLERANCE: f64 = 0.005;

impl DispensationRecord {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.pharmacist_license.kind() != LicenseKind::PharmacistSyndicate {
            return Err(ValidationError::WrongLicenseKind);
        }

        if self.medications.is_empty() {
            return Err(ValidationError::EmptyMedicationList);
        }

        if self.total_amount < 0.0 || self.patient_paid < 0.0 || self.insurance_covered < 0.0 {
            return Err(ValidationError::NegativeAmount);
        }

        let diff = self.total_amount - (self.patient_paid + self.insurance_covered);
        if diff.abs() > ROUNDING_TOLERANCE {
            return Err(ValidationError::FinancialMismatch {
                total: self.total_amount,
                patient_paid: self.patient_paid,
                insurance_covered: self.insurance_covered,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    use chrono::TimeZone;

    pub fn test_dispensation() -> DispensationRecord {
        DispensationRecord {
            dispense_id: Id::generate(),
            prescription_number: "RX-2025-ABC123".parse().unwrap(),
            pharmacy_id: "PH123456".parse().unwrap(),
            pharmacist_id: "30102031211111".parse().unwrap(),
            pharmacist_license: "EPS-54321".parse().unwrap(),
            medications: vec![MedicationLine {
                registration_code: "EDA-REG-001122".into(),
                name: "Amlodipine 5mg".into(),
                name_ar: None,
                dosage: crate::prescription::Dosage {
                    dose_amount: 1,
                    dose_unit: "tablet".into(),
                    frequency_per_day: 1,
                    duration_days: 30,
                },
                quantity: 30,
                refills: 0,
                instructions: "After breakfast".into(),
            }],
            total_amount: 150.0,
            patient_paid: 50.0,
            insurance_covered: 100.0,
            dispensed_at: Utc.ymd(2025, 2, 2).and_hms(14, 30, 0),
            notes: None,
            notes_ar: None,
        }
    }

    #[test]
    fn accept_balanced_breakdown() {
        assert!(test_dispensation().validate().is_ok());
    }

    #[test]
    fn reject_unbalanced_breakdown() {
        let mut record = test_dispensation();
        record.patient_paid = 40.0;

        assert_eq!(
            record.validate(),
            Err(ValidationError::FinancialMismatch {
                total: 150.0,
                patient_paid: 40.0,
                insurance_covered: 100.0,
            })
        );
    }

    #[test]
    fn accept_rounding_noise() {
        let mut record = test_dispensation();
        record.total_amount = 150.004;

        assert!(record.validate().is_ok());
    }

    #[test]
    fn reject_negative_amount() {
        let mut record = test_dispensation();
        record.patient_paid = -50.0;

        assert_eq!(record.validate(), Err(ValidationError::NegativeAmount));
    }

    #[test]
    fn reject_wrong_license_kind() {
        let mut record = test_dispensation();
        record.pharmacist_license = "EMS-12345".parse().unwrap();

        assert_eq!(record.validate(), Err(ValidationError::WrongLicenseKind));
    }

    #[test]
    fn reject_empty_medications() {
        let mut record = test_dispensation();
        record.medications.clear();

        assert_eq!(record.validate(), Err(ValidationError::EmptyMedicationList));
    }
}
