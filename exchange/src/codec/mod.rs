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

mod fhir;
mod hl7;
mod ncpdp;

pub use fhir::FhirCodec;
pub use hl7::{AckCode, Acknowledgment, Hl7Codec};
pub use ncpdp::NcpdpScriptCodec;

use std::str::Utf8Error;

use chrono::ParseError as ChronoError;
use quick_xml::DeError as XmlError;
use serde_json::Error as JsonError;
use thiserror::Error;

use resources::{prescription::Prescription, types::MessageStandard};

/// One wire standard. Implementations are stateless and lossless: a decoded
/// message re-encodes to an equivalent document.
pub trait Codec: Send + Sync {
    fn encode(&self, prescription: &Prescription) -> Result<Vec<u8>, Error>;

    fn decode(&self, data: &[u8]) -> Result<Prescription, Error>;
}

pub fn codec_for(standard: MessageStandard) -> &'static dyn Codec {
    match standard {
        MessageStandard::NcpdpScript => &NcpdpScriptCodec,
        MessageStandard::Hl7V2 => &Hl7Codec,
        MessageStandard::FhirR4 => &FhirCodec,
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Missing Field: {0}!")]
    MissingField(&'static str),

    #[error("Unknown Segment: {0}!")]
    UnknownSegment(String),

    #[error("Unresolved Reference: {0}!")]
    UnresolvedReference(String),

    #[error("Invalid Value in {field}: {reason}!")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },

    #[error("XML Error: {0}")]
    XmlError(XmlError),

    #[error("Json Error: {0}")]
    JsonError(JsonError),

    #[error("Chrono Error: {0}")]
    ChronoError(ChronoError),

    #[error("Encoding Error: {0}")]
    EncodingError(Utf8Error),
}

impl Error {
    fn invalid<T: ToString>(field: &'static str, reason: T) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.to_string(),
        }
    }
}

impl From<XmlError> for Error {
    fn from(v: XmlError) -> Self {
        Self::XmlError(v)
    }
}

impl From<JsonError> for Error {
    fn from(v: JsonError) -> Self {
        Self::JsonError(v)
    }
}

impl From<ChronoError> for Error {
    fn from(v: ChronoError) -> Self {
        Self::ChronoError(v)
    }
}

impl From<Utf8Error> for Error {
    fn from(v: Utf8Error) -> Self {
        Self::EncodingError(v)
    }
}

#[cfg(test)]
pub mod tests {
    use chrono::TimeZone;
    use chrono::Utc;

    use resources::prescription::{
        Dosage, MedicationLine, Pharmacy, Prescriber, Prescription, Status,
    };

    /// Two medication lines, bilingual text and characters that need
    /// escaping in both XML and ER7.
    pub fn sample_prescription() -> Prescription {
        Prescription {
            prescription_number: "RX-2025-ABC123".parse().unwrap(),
            patient: "29001010123458".parse().unwrap(),
            prescriber: Prescriber {
                national_id: "27503150267898".parse().unwrap(),
                licenses: vec!["EMS-12345".parse().unwrap(), "EDA-654321".parse().unwrap()],
            },
            pharmacy: Pharmacy {
                id: "PH123456".parse().unwrap(),
                name: "El Ezaby & Co | Branch <Cairo>".into(),
            },
            medications: vec![
                MedicationLine {
                    registration_code: "EDA-REG-001122".into(),
                    name: "Amlodipine 5mg".into(),
                    name_ar: Some("أملوديبين ٥ مجم".into()),
                    dosage: Dosage {
                        dose_amount: 1,
                        dose_unit: "tablet".into(),
                        frequency_per_day: 1,
                        duration_days: 30,
                    },
                    quantity: 30,
                    refills: 2,
                    instructions: "Morning ^ evening | with water & food".into(),
                },
                MedicationLine {
                    registration_code: "EDA-REG-334455".into(),
                    name: "Metformin 850mg".into(),
                    name_ar: None,
                    dosage: Dosage {
                        dose_amount: 2,
                        dose_unit: "tablet".into(),
                        frequency_per_day: 2,
                        duration_days: 90,
                    },
                    quantity: 180,
                    refills: 0,
                    instructions: "With meals".into(),
                },
            ],
            diagnosis: "Essential hypertension".into(),
            diagnosis_ar: Some("ارتفاع ضغط الدم".into()),
            created_at: Utc.ymd(2025, 1, 30).and_hms(10, 15, 0),
            status: Status::Submitted,
        }
    }
}
