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

use std::str::{from_utf8, FromStr};

use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::de::from_str as xml_from_str;
use serde::Deserialize;

use resources::prescription::{Dosage, MedicationLine, Pharmacy, Prescriber, Prescription, Status};
use resources::primitives::second_precision;

use super::{Codec, Error};

/// NCPDP-SCRIPT style XML rendering.
///
/// Element-only hierarchy: `Message` wraps `Header`, `Patient`, `Prescriber`,
/// `Pharmacy`, `MedicationList` and the diagnosis pair. Every section is
/// mandatory except the Arabic variants.
pub struct NcpdpScriptCodec;

impl Codec for NcpdpScriptCodec {
    fn encode(&self, prescription: &Prescription) -> Result<Vec<u8>, Error> {
        let mut xml = XmlBuilder::default();

        xml.open("Message");

        xml.open("Header");
        xml.element(
            "PrescriptionNumber",
            &prescription.prescription_number.to_string(),
        );
        xml.element(
            "WrittenDate",
            &prescription
                .created_at
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        xml.close("Header");

        xml.open("Patient");
        xml.element("NationalId", prescription.patient.as_str());
        xml.close("Patient");

        xml.open("Prescriber");
        xml.element("NationalId", prescription.prescriber.national_id.as_str());
        xml.open("Licenses");
        for license in &prescription.prescriber.licenses {
            xml.element("License", &license.to_string());
        }
        xml.close("Licenses");
        xml.close("Prescriber");

        xml.open("Pharmacy");
        xml.element("Id", &prescription.pharmacy.id);
        xml.element("Name", &prescription.pharmacy.name);
        xml.close("Pharmacy");

        xml.open("MedicationList");
        for line in &prescription.medications {
            xml.open("Medication");
            xml.element("RegistrationCode", &line.registration_code);
            xml.element("Name", &line.name);
            if let Some(name_ar) = &line.name_ar {
                xml.element("NameAr", name_ar);
            }
            xml.element("DoseAmount", &line.dosage.dose_amount.to_string());
            xml.element("DoseUnit", &line.dosage.dose_unit);
            xml.element("FrequencyPerDay", &line.dosage.frequency_per_day.to_string());
            xml.element("DurationDays", &line.dosage.duration_days.to_string());
            xml.element("Quantity", &line.quantity.to_string());
            xml.element("Refills", &line.refills.to_string());
            xml.element("Instructions", &line.instructions);
            xml.close("Medication");
        }
        xml.close("MedicationList");

        xml.element("Diagnosis", &prescription.diagnosis);
        if let Some(diagnosis_ar) = &prescription.diagnosis_ar {
            xml.element("DiagnosisAr", diagnosis_ar);
        }

        xml.close("Message");

        Ok(xml.into_bytes())
    }

    fn decode(&self, data: &[u8]) -> Result<Prescription, Error> {
        let text = from_utf8(data)?;
        let message: MessageXml = xml_from_str(text)?;

        let header = message.header.ok_or(Error::MissingField("Header"))?;
        let patient = message.patient.ok_or(Error::MissingField("Patient"))?;
        let prescriber = message.prescriber.ok_or(Error::MissingField("Prescriber"))?;
        let pharmacy = message.pharmacy.ok_or(Error::MissingField("Pharmacy"))?;
        let medication_list = message
            .medication_list
            .ok_or(Error::MissingField("MedicationList"))?;

        let prescription_number = header
            .prescription_number
            .ok_or(Error::MissingField("PrescriptionNumber"))?
            .parse()
            .map_err(|err| Error::invalid("PrescriptionNumber", err))?;

        let written_date = header
            .written_date
            .ok_or(Error::MissingField("WrittenDate"))?;
        // the canonical model is second-precision, drop sub-second noise
        let created_at =
            second_precision(DateTime::parse_from_rfc3339(&written_date)?.with_timezone(&Utc));

        let patient = patient
            .national_id
            .ok_or(Error::MissingField("Patient.NationalId"))?
            .parse()
            .map_err(|err| Error::invalid("Patient.NationalId", err))?;

        let prescriber_id = prescriber
            .national_id
            .ok_or(Error::MissingField("Prescriber.NationalId"))?
            .parse()
            .map_err(|err| Error::invalid("Prescriber.NationalId", err))?;
        let licenses = prescriber
            .licenses
            .ok_or(Error::MissingField("Licenses"))?
            .license
            .iter()
            .map(|s| s.parse().map_err(|err| Error::invalid("License", err)))
            .collect::<Result<Vec<_>, _>>()?;

        let pharmacy_id = pharmacy
            .id
            .ok_or(Error::MissingField("Pharmacy.Id"))?
            .parse()
            .map_err(|err| Error::invalid("Pharmacy.Id", err))?;
        let pharmacy_name = pharmacy.name.ok_or(Error::MissingField("Pharmacy.Name"))?;

        if medication_list.medication.is_empty() {
            return Err(Error::MissingField("Medication"));
        }

        let medications = medication_list
            .medication
            .into_iter()
            .map(decode_medication)
            .collect::<Result<Vec<_>, _>>()?;

        let diagnosis = message.diagnosis.ok_or(Error::MissingField("Diagnosis"))?;

        Ok(Prescription {
            prescription_number,
            patient,
            prescriber: Prescriber {
                national_id: prescriber_id,
                licenses,
            },
            pharmacy: Pharmacy {
                id: pharmacy_id,
                name: pharmacy_name,
            },
            medications,
            diagnosis,
            diagnosis_ar: message.diagnosis_ar.filter(|s| !s.is_empty()),
            created_at,
            status: Status::Submitted,
        })
    }
}

fn decode_medication(medication: MedicationXml) -> Result<MedicationLine, Error> {
    Ok(MedicationLine {
        registration_code: medication
            .registration_code
            .ok_or(Error::MissingField("RegistrationCode"))?,
        name: medication.name.ok_or(Error::MissingField("Name"))?,
        name_ar: medication.name_ar.filter(|s| !s.is_empty()),
        dosage: Dosage {
            dose_amount: parse_number("DoseAmount", medication.dose_amount)?,
            dose_unit: medication.dose_unit.ok_or(Error::MissingField("DoseUnit"))?,
            frequency_per_day: parse_number("FrequencyPerDay", medication.frequency_per_day)?,
            duration_days: parse_number("DurationDays", medication.duration_days)?,
        },
        quantity: parse_number("Quantity", medication.quantity)?,
        refills: parse_number("Refills", medication.refills)?,
        instructions: medication
            .instructions
            .ok_or(Error::MissingField("Instructions"))?,
    })
}

fn parse_number<T>(field: &'static str, value: Option<String>) -> Result<T, Error>
where
    T: FromStr,
    T::Err: ToString,
{
    value
        .ok_or(Error::MissingField(field))?
        .parse()
        .map_err(|err: T::Err| Error::invalid(field, err.to_string()))
}

#[derive(Default)]
struct XmlBuilder {
    buffer: String,
}

impl XmlBuilder {
    fn open(&mut self, name: &str) {
        self.buffer += "<";
        self.buffer += name;
        self.buffer += ">";
    }

    fn close(&mut self, name: &str) {
        self.buffer += "</";
        self.buffer += name;
        self.buffer += ">";
    }

    fn element(&mut self, name: &str, value: &str) {
        self.open(name);
        self.buffer += &escape_str(value);
        self.close(name);
    }

    fn into_bytes(self) -> Vec<u8> {
        let mut ret = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
        ret += &self.buffer;

        ret.into_bytes()
    }
}

fn escape_str(s: &str) -> String {
    let mut ret = String::new();

    for c in s.chars() {
        match c {
            '<' => ret += "&lt;",
            '>' => ret += "&gt;",
            '&' => ret += "&amp;",
            '"' => ret += "&quot;",
            '\'' => ret += "&apos;",
            c => ret.push(c),
        }
    }

    ret
}

#[derive(Debug, Deserialize)]
struct MessageXml {
    #[serde(rename = "Header")]
    header: Option<HeaderXml>,

    #[serde(rename = "Patient")]
    patient: Option<PatientXml>,

    #[serde(rename = "Prescriber")]
    prescriber: Option<PrescriberXml>,

    #[serde(rename = "Pharmacy")]
    pharmacy: Option<PharmacyXml>,

    #[serde(rename = "MedicationList")]
    medication_list: Option<MedicationListXml>,

    #[serde(rename = "Diagnosis")]
    diagnosis: Option<String>,

    #[serde(rename = "DiagnosisAr")]
    diagnosis_ar: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HeaderXml {
    #[serde(rename = "PrescriptionNumber")]
    prescription_number: Option<String>,

    #[serde(rename = "WrittenDate")]
    written_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PatientXml {
    #[serde(rename = "NationalId")]
    national_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PrescriberXml {
    #[serde(rename = "NationalId")]
    national_id: Option<String>,

    #[serde(rename = "Licenses")]
    licenses: Option<LicensesXml>,
}

#[derive(Debug, Deserialize)]
struct LicensesXml {
    #[serde(rename = "License", default)]
    license: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PharmacyXml {
    #[serde(rename = "Id")]
    id: Option<String>,

    #[serde(rename = "Name")]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MedicationListXml {
    #[serde(rename = "Medication", default)]
    medication: Vec<MedicationXml>,
}

#[derive(Debug, Deserialize)]
struct MedicationXml {
    #[serde(rename = "RegistrationCode")]
    registration_code: Option<String>,

    #[serde(rename = "Name")]
    name: Option<String>,

    #[serde(rename = "NameAr")]
    name_ar: Option<String>,

    #[serde(rename = "DoseAmount")]
    dose_amount: Option<String>,

    #[serde(rename = "DoseUnit")]
    dose_unit: Option<String>,

    #[serde(rename = "FrequencyPerDay")]
    frequency_per_day: Option<String>,

    #[serde(rename = "DurationDays")]
    duration_days: Option<String>,

    #[serde(rename = "Quantity")]
    quantity: Option<String>,

    #[serde(rename = "Refills")]
    refills: Option<String>,

    #[serde(rename = "Instructions")]
    instructions: Option<String>,
}
