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

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{from_slice, to_vec};

use resources::{
    misc::PrescriptionId,
    prescription::{Dosage, MedicationLine, Pharmacy, Prescriber, Prescription, Status},
    primitives::second_precision,
};

use super::{Codec, Error};

/// FHIR R4 collection bundle in JSON.
///
/// One MedicationRequest per medication line, grouped by `groupIdentifier`,
/// plus the referenced Patient, Practitioner and Organization resources.
/// Arabic variants ride in `extension` arrays.
pub struct FhirCodec;

const BUNDLE_TYPE: &str = "collection";
const MR_STATUS: &str = "active";
const MR_INTENT: &str = "order";

const SYSTEM_PRESCRIPTION: &str = "http://moh.example/fhir/sid/prescription-number";
const SYSTEM_NATIONAL_ID: &str = "http://moh.example/fhir/sid/national-id";
const SYSTEM_REGISTRATION: &str = "http://eda.example/fhir/sid/registration";
const SYSTEM_LICENSE: &str = "http://moh.example/fhir/sid/license";
const EXTENSION_ARABIC: &str = "http://moh.example/fhir/StructureDefinition/arabic-text";

impl Codec for FhirCodec {
    fn encode(&self, prescription: &Prescription) -> Result<Vec<u8>, Error> {
        let rx = prescription.prescription_number.to_string();
        let patient_ref = format!("Patient/{}", prescription.patient);
        let practitioner_ref = format!("Practitioner/{}", prescription.prescriber.national_id);
        let organization_ref = format!("Organization/{}", prescription.pharmacy.id);
        let authored_on = prescription
            .created_at
            .to_rfc3339_opts(SecondsFormat::Secs, true);

        let mut entries = vec![
            EntryJson {
                resource: ResourceJson::Patient(PatientJson {
                    id: prescription.patient.to_string(),
                    identifier: vec![IdentifierJson {
                        system: Some(SYSTEM_NATIONAL_ID.into()),
                        value: prescription.patient.to_string(),
                    }],
                }),
            },
            EntryJson {
                resource: ResourceJson::Practitioner(PractitionerJson {
                    id: prescription.prescriber.national_id.to_string(),
                    identifier: vec![IdentifierJson {
                        system: Some(SYSTEM_NATIONAL_ID.into()),
                        value: prescription.prescriber.national_id.to_string(),
                    }],
                    qualification: prescription
                        .prescriber
                        .licenses
                        .iter()
                        .map(|license| QualificationJson {
                            identifier: vec![IdentifierJson {
                                system: Some(SYSTEM_LICENSE.into()),
                                value: license.to_string(),
                            }],
                        })
                        .collect(),
                }),
            },
            EntryJson {
                resource: ResourceJson::Organization(OrganizationJson {
                    id: prescription.pharmacy.id.to_string(),
                    name: prescription.pharmacy.name.clone(),
                }),
            },
        ];

        for (index, line) in prescription.medications.iter().enumerate() {
            entries.push(EntryJson {
                resource: ResourceJson::MedicationRequest(MedicationRequestJson {
                    id: format!("{}-{}", rx, index + 1),
                    status: MR_STATUS.into(),
                    intent: MR_INTENT.into(),
                    group_identifier: IdentifierJson {
                        system: Some(SYSTEM_PRESCRIPTION.into()),
                        value: rx.clone(),
                    },
                    medication_codeable_concept: CodeableConceptJson {
                        coding: vec![CodingJson {
                            system: SYSTEM_REGISTRATION.into(),
                            code: line.registration_code.clone(),
                            display: Some(line.name.clone()),
                        }],
                        text: Some(line.name.clone()),
                        extension: arabic_extension(line.name_ar.as_deref()),
                    },
                    subject: ReferenceJson {
                        reference: patient_ref.clone(),
                    },
                    requester: ReferenceJson {
                        reference: practitioner_ref.clone(),
                    },
                    performer: ReferenceJson {
                        reference: organization_ref.clone(),
                    },
                    authored_on: authored_on.clone(),
                    reason_code: vec![CodeableConceptJson {
                        coding: Vec::new(),
                        text: Some(prescription.diagnosis.clone()),
                        extension: arabic_extension(prescription.diagnosis_ar.as_deref()),
                    }],
                    dosage_instruction: vec![DosageInstructionJson {
                        text: line.instructions.clone(),
                        timing: TimingJson {
                            repeat: RepeatJson {
                                frequency: line.dosage.frequency_per_day,
                                period: 1,
                                period_unit: "d".into(),
                                bounds_duration: QuantityJson {
                                    value: line.dosage.duration_days,
                                    unit: "d".into(),
                                },
                            },
                        },
                        dose_and_rate: vec![DoseAndRateJson {
                            dose_quantity: QuantityJson {
                                value: line.dosage.dose_amount,
                                unit: line.dosage.dose_unit.clone(),
                            },
                        }],
                    }],
                    dispense_request: DispenseRequestJson {
                        quantity: QuantityJson {
                            value: line.quantity,
                            unit: line.dosage.dose_unit.clone(),
                        },
                        number_of_repeats_allowed: line.refills,
                    },
                }),
            });
        }

        let bundle = BundleJson {
            resource_type: "Bundle".into(),
            type_: BUNDLE_TYPE.into(),
            timestamp: authored_on,
            entry: entries,
        };

        Ok(to_vec(&bundle)?)
    }

    fn decode(&self, data: &[u8]) -> Result<Prescription, Error> {
        let bundle: BundleJson = from_slice(data)?;

        if bundle.resource_type != "Bundle" {
            return Err(Error::invalid("resourceType", &bundle.resource_type));
        }

        if bundle.type_ != BUNDLE_TYPE {
            return Err(Error::invalid("Bundle.type", &bundle.type_));
        }

        let mut patients = HashMap::new();
        let mut practitioners = HashMap::new();
        let mut organizations = HashMap::new();
        let mut requests = Vec::new();

        for entry in bundle.entry {
            match entry.resource {
                ResourceJson::Patient(patient) => {
                    patients.insert(format!("Patient/{}", patient.id), patient);
                }
                ResourceJson::Practitioner(practitioner) => {
                    practitioners.insert(format!("Practitioner/{}", practitioner.id), practitioner);
                }
                ResourceJson::Organization(organization) => {
                    organizations.insert(format!("Organization/{}", organization.id), organization);
                }
                ResourceJson::MedicationRequest(request) => requests.push(request),
            }
        }

        let first = requests
            .first()
            .ok_or(Error::MissingField("MedicationRequest"))?;

        let prescription_number: PrescriptionId = first
            .group_identifier
            .value
            .parse()
            .map_err(|err| Error::invalid("groupIdentifier", err))?;
        // the canonical model is second-precision, drop sub-second noise
        let created_at =
            second_precision(DateTime::parse_from_rfc3339(&first.authored_on)?.with_timezone(&Utc));

        let subject = first.subject.reference.clone();
        let requester = first.requester.reference.clone();
        let performer = first.performer.reference.clone();

        let reason = first
            .reason_code
            .first()
            .ok_or(Error::MissingField("reasonCode"))?;
        let diagnosis = reason
            .text
            .clone()
            .ok_or(Error::MissingField("reasonCode.text"))?;
        let diagnosis_ar = arabic_text(&reason.extension);

        let mut medications = Vec::new();
        for request in &requests {
            if request.group_identifier.value != first.group_identifier.value {
                return Err(Error::invalid(
                    "groupIdentifier",
                    &request.group_identifier.value,
                ));
            }

            for reference in &[&request.subject, &request.requester, &request.performer] {
                let reference = reference.reference.as_str();
                let resolved = patients.contains_key(reference)
                    || practitioners.contains_key(reference)
                    || organizations.contains_key(reference);

                if !resolved {
                    return Err(Error::UnresolvedReference(reference.into()));
                }
            }

            medications.push(decode_request(request)?);
        }

        let patient = patients
            .get(&subject)
            .ok_or_else(|| Error::UnresolvedReference(subject.clone()))?;
        let practitioner = practitioners
            .get(&requester)
            .ok_or_else(|| Error::UnresolvedReference(requester.clone()))?;
        let organization = organizations
            .get(&performer)
            .ok_or_else(|| Error::UnresolvedReference(performer.clone()))?;

        let patient = patient
            .identifier
            .first()
            .ok_or(Error::MissingField("Patient.identifier"))?
            .value
            .parse()
            .map_err(|err| Error::invalid("Patient.identifier", err))?;

        let prescriber_id = practitioner
            .identifier
            .first()
            .ok_or(Error::MissingField("Practitioner.identifier"))?
            .value
            .parse()
            .map_err(|err| Error::invalid("Practitioner.identifier", err))?;
        let licenses = practitioner
            .qualification
            .iter()
            .flat_map(|qualification| &qualification.identifier)
            .map(|identifier| {
                identifier
                    .value
                    .parse()
                    .map_err(|err| Error::invalid("Practitioner.qualification", err))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let pharmacy_id = organization
            .id
            .parse()
            .map_err(|err| Error::invalid("Organization.id", err))?;

        Ok(Prescription {
            prescription_number,
            patient,
            prescriber: Prescriber {
                national_id: prescriber_id,
                licenses,
            },
            pharmacy: Pharmacy {
                id: pharmacy_id,
                name: organization.name.clone(),
            },
            medications,
            diagnosis,
            diagnosis_ar,
            created_at,
            status: Status::Submitted,
        })
    }
}

fn decode_request(request: &MedicationRequestJson) -> Result<MedicationLine, Error> {
    let concept = &request.medication_codeable_concept;
    let coding = concept
        .coding
        .first()
        .ok_or(Error::MissingField("medicationCodeableConcept.coding"))?;

    let name = concept
        .text
        .clone()
        .or_else(|| coding.display.clone())
        .ok_or(Error::MissingField("medicationCodeableConcept.text"))?;

    let instruction = request
        .dosage_instruction
        .first()
        .ok_or(Error::MissingField("dosageInstruction"))?;
    let dose = instruction
        .dose_and_rate
        .first()
        .ok_or(Error::MissingField("doseAndRate"))?;

    Ok(MedicationLine {
        registration_code: coding.code.clone(),
        name,
        name_ar: arabic_text(&concept.extension),
        dosage: Dosage {
            dose_amount: dose.dose_quantity.value,
            dose_unit: dose.dose_quantity.unit.clone(),
            frequency_per_day: instruction.timing.repeat.frequency,
            duration_days: instruction.timing.repeat.bounds_duration.value,
        },
        quantity: request.dispense_request.quantity.value,
        refills: request.dispense_request.number_of_repeats_allowed,
        instructions: instruction.text.clone(),
    })
}

fn arabic_extension(text: Option<&str>) -> Vec<ExtensionJson> {
    match text {
        Some(text) => vec![ExtensionJson {
            url: EXTENSION_ARABIC.into(),
            value_string: text.into(),
        }],
        None => Vec::new(),
    }
}

fn arabic_text(extensions: &[ExtensionJson]) -> Option<String> {
    extensions
        .iter()
        .find(|extension| extension.url == EXTENSION_ARABIC)
        .map(|extension| extension.value_string.clone())
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BundleJson {
    resource_type: String,

    #[serde(rename = "type")]
    type_: String,

    timestamp: String,

    #[serde(default)]
    entry: Vec<EntryJson>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EntryJson {
    resource: ResourceJson,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "resourceType")]
enum ResourceJson {
    MedicationRequest(MedicationRequestJson),
    Patient(PatientJson),
    Practitioner(PractitionerJson),
    Organization(OrganizationJson),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MedicationRequestJson {
    id: String,
    status: String,
    intent: String,
    group_identifier: IdentifierJson,
    medication_codeable_concept: CodeableConceptJson,
    subject: ReferenceJson,
    requester: ReferenceJson,
    performer: ReferenceJson,
    authored_on: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    reason_code: Vec<CodeableConceptJson>,

    dosage_instruction: Vec<DosageInstructionJson>,
    dispense_request: DispenseRequestJson,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PatientJson {
    id: String,

    #[serde(default)]
    identifier: Vec<IdentifierJson>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PractitionerJson {
    id: String,

    #[serde(default)]
    identifier: Vec<IdentifierJson>,

    #[serde(default)]
    qualification: Vec<QualificationJson>,
}

#[derive(Debug, Serialize, Deserialize)]
struct QualificationJson {
    #[serde(default)]
    identifier: Vec<IdentifierJson>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrganizationJson {
    id: String,
    name: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct IdentifierJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    system: Option<String>,

    value: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ReferenceJson {
    reference: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct CodeableConceptJson {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    coding: Vec<CodingJson>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    extension: Vec<ExtensionJson>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CodingJson {
    system: String,
    code: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    display: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtensionJson {
    url: String,
    value_string: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DosageInstructionJson {
    text: String,
    timing: TimingJson,
    dose_and_rate: Vec<DoseAndRateJson>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TimingJson {
    repeat: RepeatJson,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepeatJson {
    frequency: u32,
    period: u32,
    period_unit: String,
    bounds_duration: QuantityJson,
}

#[derive(Debug, Serialize, Deserialize)]
struct QuantityJson {
    value: u32,
    unit: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DoseAndRateJson {
    dose_quantity: QuantityJson,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DispenseRequestJson {
    quantity: QuantityJson,
    number_of_repeats_allowed: u32,
}

#[cfg(test)]
pub mod tests {
    use super::*;

    use serde_json::{from_slice, json, to_vec, Value};

    use super::super::tests::sample_prescription;

    #[test]
    fn round_trip() {
        let expected = sample_prescription();

        let encoded = FhirCodec.encode(&expected).unwrap();
        let actual = FhirCodec.decode(&encoded).unwrap();

        assert_eq!(actual, expected);
    }

    #[test]
    fn subsecond_timestamp_is_truncated() {
        use chrono::TimeZone;

        let prescription = sample_prescription();

        let encoded = FhirCodec.encode(&prescription).unwrap();
        let mut value: Value = from_slice(&encoded).unwrap();

        for entry in value["entry"].as_array_mut().unwrap() {
            if entry["resource"]["resourceType"] == "MedicationRequest" {
                entry["resource"]["authoredOn"] = json!("2025-01-30T10:15:00.250Z");
            }
        }

        let data = to_vec(&value).unwrap();
        let actual = FhirCodec.decode(&data).unwrap();

        assert_eq!(actual.created_at, Utc.ymd(2025, 1, 30).and_hms(10, 15, 0));
    }

    #[test]
    fn one_request_per_medication_line() {
        let prescription = sample_prescription();

        let encoded = FhirCodec.encode(&prescription).unwrap();
        let value: Value = from_slice(&encoded).unwrap();

        let requests = value["entry"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|entry| entry["resource"]["resourceType"] == "MedicationRequest")
            .count();

        assert_eq!(requests, prescription.medications.len());
    }

    #[test]
    fn unresolved_reference_is_rejected() {
        let prescription = sample_prescription();

        let encoded = FhirCodec.encode(&prescription).unwrap();
        let mut value: Value = from_slice(&encoded).unwrap();

        // drop the Patient resource, keep the reference
        let entries = value["entry"].as_array_mut().unwrap();
        entries.retain(|entry| entry["resource"]["resourceType"] != "Patient");

        let data = to_vec(&value).unwrap();

        match FhirCodec.decode(&data) {
            Err(Error::UnresolvedReference(reference)) => {
                assert_eq!(reference, "Patient/29001010123458");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn mismatched_group_identifier_is_rejected() {
        let prescription = sample_prescription();

        let encoded = FhirCodec.encode(&prescription).unwrap();
        let mut value: Value = from_slice(&encoded).unwrap();

        let entries = value["entry"].as_array_mut().unwrap();
        let last = entries.len() - 1;
        entries[last]["resource"]["groupIdentifier"]["value"] = json!("RX-2025-ZZZZZZ");

        let data = to_vec(&value).unwrap();

        match FhirCodec.decode(&data) {
            Err(Error::InvalidValue {
                field: "groupIdentifier",
                ..
            }) => (),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn empty_bundle_is_rejected() {
        let data = to_vec(&json!({
            "resourceType": "Bundle",
            "type": "collection",
            "timestamp": "2025-01-30T10:15:00Z",
            "entry": [],
        }))
        .unwrap();

        match FhirCodec.decode(&data) {
            Err(Error::MissingField("MedicationRequest")) => (),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn wrong_bundle_type_is_rejected() {
        let data = to_vec(&json!({
            "resourceType": "Bundle",
            "type": "batch",
            "timestamp": "2025-01-30T10:15:00Z",
            "entry": [],
        }))
        .unwrap();

        match FhirCodec.decode(&data) {
            Err(Error::InvalidValue {
                field: "Bundle.type",
                ..
            }) => (),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
