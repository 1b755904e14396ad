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

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::misc::{LicenseId, NationalId, PharmacyId, PrescriptionId};

/// Canonical prescription. Every wire standard decodes into this model and
/// encodes from it without loss.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prescription {
    pub prescription_number: PrescriptionId,
    pub patient: NationalId,
    pub prescriber: Prescriber,
    pub pharmacy: Pharmacy,
    pub medications: Vec<MedicationLine>,
    pub diagnosis: String,
    pub diagnosis_ar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub status: Status,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prescriber {
    pub national_id: NationalId,
    pub licenses: Vec<LicenseId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pharmacy {
    pub id: PharmacyId,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MedicationLine {
    pub registration_code: String,
    pub name: String,
    pub name_ar: Option<String>,
    pub dosage: Dosage,
    pub quantity: u32,
    pub refills: u32,
    pub instructions: String,
}

/// Structured dosage. Integer fields so every codec carries them
/// positionally and round trips are exact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dosage {
    pub dose_amount: u32,
    pub dose_unit: String,
    pub frequency_per_day: u32,
    pub duration_days: u32,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum Status {
    Submitted,
    Retrieved,
    Dispensed,
    Cancelled,
    Error,
}

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Medication list must not be empty!")]
    EmptyMedicationList,

    #[error("Prescriber must carry at least one license!")]
    EmptyLicenses,

    #[error("Medication must carry a registration code and a name!")]
    UnidentifiedMedication,

    #[error("Invalid quantity for medication {0}!")]
    InvalidQuantity(String),

    #[error("Invalid dosage for medication {0}!")]
    InvalidDosage(String),

    #[error("Prescription year out of range: {0}!")]
    YearOutOfRange(i32),
}

impl Prescription {
    /// Semantic checks beyond what the typed fields already guarantee.
    pub fn validate(&self, epoch_year: i32, now: DateTime<Utc>) -> Result<(), ValidationError> {
        if self.prescriber.licenses.is_empty() {
            return Err(ValidationError::EmptyLicenses);
        }

        if self.medications.is_empty() {
            return Err(ValidationError::EmptyMedicationList);
        }

        for line in &self.medications {
            if line.registration_code.is_empty() || line.name.is_empty() {
                return Err(ValidationError::UnidentifiedMedication);
            }

            if line.quantity == 0 {
                return Err(ValidationError::InvalidQuantity(
                    line.registration_code.clone(),
                ));
            }

            let dosage = &line.dosage;
            if dosage.dose_amount == 0 || dosage.frequency_per_day == 0 || dosage.duration_days == 0
            {
                return Err(ValidationError::InvalidDosage(line.registration_code.clone()));
            }
        }

        self.prescription_number
            .verify_year_range(epoch_year, now)
            .map_err(|_| ValidationError::YearOutOfRange(self.prescription_number.year()))?;

        Ok(())
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let s = match self {
            Self::Submitted => "submitted",
            Self::Retrieved => "retrieved",
            Self::Dispensed => "dispensed",
            Self::Cancelled => "cancelled",
            Self::Error => "error",
        };

        write!(f, "{}", s)
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(Self::Submitted),
            "retrieved" => Ok(Self::Retrieved),
            "dispensed" => Ok(Self::Dispensed),
            "cancelled" => Ok(Self::Cancelled),
            "error" => Ok(Self::Error),
            _ => Err(format!("Invalid status: {}", s)),
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    use chrono::TimeZone;

    pub fn test_prescription() -> Prescription {
        Prescription {
            prescription_number: "RX-2025-ABC123".parse().unwrap(),
            patient: "29001010123458".parse().unwrap(),
            prescriber: Prescriber {
                national_id: "27503150267898".parse().unwrap(),
                licenses: vec!["EMS-12345".parse().unwrap()],
            },
            pharmacy: Pharmacy {
                id: "PH123456".parse().unwrap(),
                name: "Misr Pharmacy".into(),
            },
            medications: vec![MedicationLine {
                registration_code: "EDA-REG-001122".into(),
                name: "Amlodipine 5mg".into(),
                name_ar: None,
                dosage: Dosage {
                    dose_amount: 1,
                    dose_unit: "tablet".into(),
                    frequency_per_day: 1,
                    duration_days: 30,
                },
                quantity: 30,
                refills: 2,
                instructions: "After breakfast".into(),
            }],
            diagnosis: "Essential hypertension".into(),
            diagnosis_ar: None,
            created_at: Utc.ymd(2025, 1, 30).and_hms(10, 15, 0),
            status: Status::Submitted,
        }
    }

    #[test]
    fn accept_valid() {
        let prescription = test_prescription();
        let now = Utc.ymd(2026, 6, 1).and_hms(0, 0, 0);

        assert!(prescription.validate(2020, now).is_ok());
    }

    #[test]
    fn reject_empty_medications() {
        let mut prescription = test_prescription();
        prescription.medications.clear();

        let now = Utc.ymd(2026, 6, 1).and_hms(0, 0, 0);

        assert_eq!(
            prescription.validate(2020, now),
            Err(ValidationError::EmptyMedicationList)
        );
    }

    #[test]
    fn reject_empty_licenses() {
        let mut prescription = test_prescription();
        prescription.prescriber.licenses.clear();

        let now = Utc.ymd(2026, 6, 1).and_hms(0, 0, 0);

        assert_eq!(
            prescription.validate(2020, now),
            Err(ValidationError::EmptyLicenses)
        );
    }

    #[test]
    fn reject_unidentified_medication() {
        let mut prescription = test_prescription();
        prescription.medications[0].name = String::new();

        let now = Utc.ymd(2026, 6, 1).and_hms(0, 0, 0);

        assert_eq!(
            prescription.validate(2020, now),
            Err(ValidationError::UnidentifiedMedication)
        );
    }

    #[test]
    fn reject_zero_quantity() {
        let mut prescription = test_prescription();
        prescription.medications[0].quantity = 0;

        let now = Utc.ymd(2026, 6, 1).and_hms(0, 0, 0);

        assert_eq!(
            prescription.validate(2020, now),
            Err(ValidationError::InvalidQuantity("EDA-REG-001122".into()))
        );
    }

    #[test]
    fn reject_year_out_of_range() {
        let prescription = test_prescription();
        let now = Utc.ymd(2026, 6, 1).and_hms(0, 0, 0);

        assert_eq!(
            prescription.validate(2026, now),
            Err(ValidationError::YearOutOfRange(2025))
        );
    }
}
