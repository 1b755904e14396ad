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
use std::str::{from_utf8, FromStr};

use chrono::{DateTime, NaiveDateTime, Utc};

use resources::{
    misc::PrescriptionId,
    prescription::{Dosage, MedicationLine, Pharmacy, Prescriber, Prescription, Status},
};

use super::{Codec, Error};

/// HL7 v2.5 pharmacy order (RDE^O11) in ER7 text encoding.
///
/// Segment layout: MSH, then PID, ORC, one RXE per medication line and DG1
/// in any order. The prescription number rides in MSH-10 and ORC-2, the
/// prescriber in ORC-12/13, the pharmacy in ORC-21/22.
pub struct Hl7Codec;

const SEGMENT_SEP: &str = "\r";
const ENCODING_CHARS: &str = r#"^~\&"#;

const SENDING_APP: &str = "EXCHANGE";
const SENDING_FACILITY: &str = "CENTRAL";
const RECEIVING_APP: &str = "PHARMACY";
const RECEIVING_FACILITY: &str = "RETAIL";

const MESSAGE_TYPE: &str = "RDE^O11";
const ACK_TYPE: &str = "ACK^O11";
const PROCESSING_ID: &str = "P";
const VERSION: &str = "2.5";

const TS_FORMAT: &str = "%Y%m%d%H%M%S";

const ORC_FIELD_COUNT: usize = 22;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AckCode {
    Accept,
    Error,
    Reject,
}

/// Parsed MSA response, paired with the echoed MSH-10 of the original
/// message so callers can correlate it.
#[derive(Clone, Debug, PartialEq)]
pub struct Acknowledgment {
    pub control_id: String,
    pub code: AckCode,
    pub echoed_control_id: String,
    pub text: Option<String>,
}

impl Codec for Hl7Codec {
    fn encode(&self, prescription: &Prescription) -> Result<Vec<u8>, Error> {
        let control_id = prescription.prescription_number.to_string();
        let timestamp = prescription.created_at.format(TS_FORMAT).to_string();

        let mut segments = vec![msh_segment(MESSAGE_TYPE, &timestamp, &control_id)];

        segments.push(join_fields(&[
            "PID".into(),
            "1".into(),
            String::new(),
            escape(prescription.patient.as_str()),
        ]));

        let licenses = prescription
            .prescriber
            .licenses
            .iter()
            .map(|license| escape(&license.to_string()))
            .collect::<Vec<_>>()
            .join("~");

        let mut orc = vec![String::new(); ORC_FIELD_COUNT + 1];
        orc[0] = "ORC".into();
        orc[1] = "NW".into();
        orc[2] = escape(&control_id);
        orc[12] = escape(prescription.prescriber.national_id.as_str());
        orc[13] = licenses;
        orc[21] = escape(&prescription.pharmacy.name);
        orc[22] = escape(&prescription.pharmacy.id);
        segments.push(join_fields(&orc));

        for (index, line) in prescription.medications.iter().enumerate() {
            segments.push(rxe_segment(index + 1, line));
        }

        let diagnosis = join_components(&[
            escape(&prescription.diagnosis),
            escape(prescription.diagnosis_ar.as_deref().unwrap_or("")),
        ]);
        segments.push(join_fields(&[
            "DG1".into(),
            "1".into(),
            String::new(),
            diagnosis,
        ]));

        Ok(segments.join(SEGMENT_SEP).into_bytes())
    }

    fn decode(&self, data: &[u8]) -> Result<Prescription, Error> {
        let text = from_utf8(data)?;

        let mut segments = text
            .split(|c| c == '\r' || c == '\n')
            .filter(|s| !s.is_empty());

        let msh = segments.next().filter(|s| s.starts_with("MSH|"));
        let msh = msh.ok_or(Error::MissingField("MSH"))?;
        let msh = msh.split('|').collect::<Vec<_>>();

        let message_type = field(&msh, 8, "MSH.9")?;
        if !message_type.starts_with("RDE") {
            return Err(Error::invalid("MSH.9", message_type));
        }

        let control_id = field(&msh, 9, "MSH.10")?;
        let prescription_number: PrescriptionId = control_id
            .parse()
            .map_err(|err| Error::invalid("MSH.10", err))?;

        let timestamp = field(&msh, 6, "MSH.7")?;
        let created_at = NaiveDateTime::parse_from_str(timestamp, TS_FORMAT)?;
        let created_at = DateTime::<Utc>::from_utc(created_at, Utc);

        let mut pid = None;
        let mut orc = None;
        let mut rxe = Vec::new();
        let mut dg1 = None;

        for segment in segments {
            let fields = segment.split('|').collect::<Vec<_>>();

            match fields[0] {
                "PID" => pid = Some(fields),
                "ORC" => orc = Some(fields),
                "RXE" => rxe.push(fields),
                "DG1" => dg1 = Some(fields),
                other => return Err(Error::UnknownSegment(other.into())),
            }
        }

        let pid = pid.ok_or(Error::MissingField("PID"))?;
        let orc = orc.ok_or(Error::MissingField("ORC"))?;
        let dg1 = dg1.ok_or(Error::MissingField("DG1"))?;
        if rxe.is_empty() {
            return Err(Error::MissingField("RXE"));
        }

        let patient = unescape(field(&pid, 3, "PID.3")?)?
            .parse()
            .map_err(|err| Error::invalid("PID.3", err))?;

        let placer_order = field(&orc, 2, "ORC.2")?;
        if unescape(placer_order)? != control_id {
            return Err(Error::invalid("ORC.2", "control id mismatch"));
        }

        let prescriber_id = unescape(field(&orc, 12, "ORC.12")?)?
            .parse()
            .map_err(|err| Error::invalid("ORC.12", err))?;
        let licenses = field(&orc, 13, "ORC.13")?
            .split('~')
            .map(|s| {
                unescape(s)?
                    .parse()
                    .map_err(|err| Error::invalid("ORC.13", err))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let pharmacy_name = unescape(text_field(&orc, 21))?;
        let pharmacy_id = unescape(field(&orc, 22, "ORC.22")?)?
            .parse()
            .map_err(|err| Error::invalid("ORC.22", err))?;

        let mut lines = rxe
            .iter()
            .map(|fields| decode_rxe(fields))
            .collect::<Result<Vec<_>, _>>()?;
        lines.sort_by_key(|(seq, _)| *seq);
        let medications = lines.into_iter().map(|(_, line)| line).collect();

        let diagnosis = components(text_field(&dg1, 3))?;
        let diagnosis_ar = diagnosis.get(1).cloned().flatten_empty();
        let diagnosis = diagnosis.get(0).cloned().unwrap_or_default();

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
            diagnosis_ar,
            created_at,
            status: Status::Submitted,
        })
    }
}

impl Hl7Codec {
    /// Builds the MSA response for a processed order. MSA-2 echoes the
    /// MSH-10 control id of the original message.
    pub fn encode_ack(
        control_id: &str,
        code: AckCode,
        text: Option<&str>,
        now: DateTime<Utc>,
    ) -> Vec<u8> {
        let ack_id = format!("ACK-{}", control_id);
        let timestamp = now.format(TS_FORMAT).to_string();

        let msh = msh_segment(ACK_TYPE, &timestamp, &ack_id);
        let msa = join_fields(&[
            "MSA".into(),
            code.as_str().into(),
            escape(control_id),
            escape(text.unwrap_or("")),
        ]);

        [msh, msa].join(SEGMENT_SEP).into_bytes()
    }

    pub fn decode_ack(data: &[u8]) -> Result<Acknowledgment, Error> {
        let text = from_utf8(data)?;

        let mut segments = text
            .split(|c| c == '\r' || c == '\n')
            .filter(|s| !s.is_empty());

        let msh = segments.next().filter(|s| s.starts_with("MSH|"));
        let msh = msh.ok_or(Error::MissingField("MSH"))?;
        let msh = msh.split('|').collect::<Vec<_>>();
        let control_id = unescape(field(&msh, 9, "MSH.10")?)?;

        let msa = segments
            .find(|s| s.starts_with("MSA|"))
            .ok_or(Error::MissingField("MSA"))?;
        let msa = msa.split('|').collect::<Vec<_>>();

        let code = field(&msa, 1, "MSA.1")?.parse()?;
        let echoed_control_id = unescape(field(&msa, 2, "MSA.2")?)?;
        let text = match msa.get(3) {
            Some(v) if !v.is_empty() => Some(unescape(v)?),
            _ => None,
        };

        Ok(Acknowledgment {
            control_id,
            code,
            echoed_control_id,
            text,
        })
    }
}

impl AckCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accept => "AA",
            Self::Error => "AE",
            Self::Reject => "AR",
        }
    }
}

impl FromStr for AckCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AA" => Ok(Self::Accept),
            "AE" => Ok(Self::Error),
            "AR" => Ok(Self::Reject),
            other => Err(Error::invalid("MSA.1", other)),
        }
    }
}

impl Display for AckCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

fn msh_segment(message_type: &str, timestamp: &str, control_id: &str) -> String {
    join_fields(&[
        "MSH".into(),
        ENCODING_CHARS.into(),
        SENDING_APP.into(),
        SENDING_FACILITY.into(),
        RECEIVING_APP.into(),
        RECEIVING_FACILITY.into(),
        timestamp.into(),
        String::new(),
        message_type.into(),
        escape(control_id),
        PROCESSING_ID.into(),
        VERSION.into(),
    ])
}

fn rxe_segment(sequence: usize, line: &MedicationLine) -> String {
    let give_code = join_components(&[
        escape(&line.registration_code),
        escape(&line.name),
        escape(line.name_ar.as_deref().unwrap_or("")),
    ]);

    join_fields(&[
        "RXE".into(),
        sequence.to_string(),
        give_code,
        line.dosage.dose_amount.to_string(),
        escape(&line.dosage.dose_unit),
        line.dosage.frequency_per_day.to_string(),
        line.dosage.duration_days.to_string(),
        line.quantity.to_string(),
        line.refills.to_string(),
        escape(&line.instructions),
    ])
}

fn decode_rxe(fields: &[&str]) -> Result<(u32, MedicationLine), Error> {
    let sequence = field(fields, 1, "RXE.1")?
        .parse()
        .map_err(|err| Error::invalid("RXE.1", err))?;

    let give_code = components(field(fields, 2, "RXE.2")?)?;
    let registration_code = give_code
        .get(0)
        .cloned()
        .filter(|s| !s.is_empty())
        .ok_or(Error::MissingField("RXE.2"))?;
    let name = give_code
        .get(1)
        .cloned()
        .filter(|s| !s.is_empty())
        .ok_or(Error::MissingField("RXE.2"))?;
    let name_ar = give_code.get(2).cloned().flatten_empty();

    let line = MedicationLine {
        registration_code,
        name,
        name_ar,
        dosage: Dosage {
            dose_amount: parse_field(fields, 3, "RXE.3")?,
            dose_unit: unescape(text_field(fields, 4))?,
            frequency_per_day: parse_field(fields, 5, "RXE.5")?,
            duration_days: parse_field(fields, 6, "RXE.6")?,
        },
        quantity: parse_field(fields, 7, "RXE.7")?,
        refills: parse_field(fields, 8, "RXE.8")?,
        instructions: unescape(text_field(fields, 9))?,
    };

    Ok((sequence, line))
}

/// Strict accessor for identifiers and numerics, where an empty field is as
/// wrong as a missing one.
fn field<'a>(fields: &[&'a str], index: usize, name: &'static str) -> Result<&'a str, Error> {
    match fields.get(index) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(Error::MissingField(name)),
    }
}

/// Accessor for free-text fields. Present-but-empty and absent both decode
/// to the empty string, so empty text survives the wire.
fn text_field<'a>(fields: &[&'a str], index: usize) -> &'a str {
    fields.get(index).copied().unwrap_or("")
}

fn parse_field<T>(fields: &[&str], index: usize, name: &'static str) -> Result<T, Error>
where
    T: FromStr,
    T::Err: ToString,
{
    field(fields, index, name)?
        .parse()
        .map_err(|err: T::Err| Error::invalid(name, err.to_string()))
}

fn join_fields(fields: &[String]) -> String {
    fields.join("|")
}

fn join_components(components: &[String]) -> String {
    // trailing empty components are dropped, leading ones are kept
    let last = components
        .iter()
        .rposition(|c| !c.is_empty())
        .map(|p| p + 1)
        .unwrap_or(0);

    components[..last].join("^")
}

fn components(field: &str) -> Result<Vec<String>, Error> {
    field.split('^').map(unescape).collect()
}

fn escape(s: &str) -> String {
    let mut ret = String::new();

    for c in s.chars() {
        match c {
            '|' => ret += r#"\F\"#,
            '^' => ret += r#"\S\"#,
            '&' => ret += r#"\T\"#,
            '~' => ret += r#"\R\"#,
            '\\' => ret += r#"\E\"#,
            // CR/LF would break segment framing, ride as hex escapes
            '\r' => ret += r#"\X0D\"#,
            '\n' => ret += r#"\X0A\"#,
            c => ret.push(c),
        }
    }

    ret
}

fn unescape(s: &str) -> Result<String, Error> {
    let mut ret = String::new();
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            ret.push(c);
            continue;
        }

        let mut seq = String::new();
        loop {
            match chars.next() {
                Some('\\') => break,
                Some(c) => seq.push(c),
                None => return Err(Error::invalid("escape sequence", s)),
            }
        }

        match seq.as_str() {
            "F" => ret.push('|'),
            "S" => ret.push('^'),
            "T" => ret.push('&'),
            "R" => ret.push('~'),
            "E" => ret.push('\\'),
            hex if hex.starts_with('X') && hex.len() > 1 => {
                let digits = &hex[1..];
                if digits.len() % 2 != 0 {
                    return Err(Error::invalid("escape sequence", s));
                }

                for i in (0..digits.len()).step_by(2) {
                    let byte = u8::from_str_radix(&digits[i..i + 2], 16)
                        .map_err(|_| Error::invalid("escape sequence", s))?;
                    ret.push(byte as char);
                }
            }
            _ => return Err(Error::invalid("escape sequence", s)),
        }
    }

    Ok(ret)
}

trait FlattenEmpty {
    fn flatten_empty(self) -> Option<String>;
}

impl FlattenEmpty for Option<String> {
    fn flatten_empty(self) -> Option<String> {
        self.filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    use chrono::TimeZone;

    use super::super::tests::sample_prescription;

    #[test]
    fn round_trip() {
        let expected = sample_prescription();

        let encoded = Hl7Codec.encode(&expected).unwrap();
        let actual = Hl7Codec.decode(&encoded).unwrap();

        assert_eq!(actual, expected);
    }

    #[test]
    fn escapes_delimiters_in_text() {
        let prescription = sample_prescription();

        let encoded = Hl7Codec.encode(&prescription).unwrap();
        let text = from_utf8(&encoded).unwrap();

        assert!(text.contains(r#"El Ezaby \T\ Co \F\ Branch <Cairo>"#));
        assert!(text.contains(r#"Morning \S\ evening \F\ with water \T\ food"#));
    }

    #[test]
    fn empty_free_text_round_trips() {
        let mut expected = sample_prescription();
        expected.pharmacy.name = String::new();
        expected.diagnosis = String::new();
        expected.medications[1].instructions = String::new();
        expected.medications[1].dosage.dose_unit = String::new();

        let encoded = Hl7Codec.encode(&expected).unwrap();
        let actual = Hl7Codec.decode(&encoded).unwrap();

        assert_eq!(actual, expected);
    }

    #[test]
    fn line_breaks_in_text_round_trip() {
        let mut expected = sample_prescription();
        expected.medications[0].instructions = "Take with food\rthen rest\nfor an hour".into();

        let encoded = Hl7Codec.encode(&expected).unwrap();
        let text = from_utf8(&encoded).unwrap();
        assert!(text.contains(r#"Take with food\X0D\then rest\X0A\for an hour"#));

        let actual = Hl7Codec.decode(&encoded).unwrap();

        assert_eq!(actual, expected);
    }

    #[test]
    fn malformed_escape_in_component_is_rejected() {
        let prescription = sample_prescription();

        let encoded = Hl7Codec.encode(&prescription).unwrap();
        let text = from_utf8(&encoded).unwrap();
        let text = text.replace("Amlodipine 5mg", r#"Amlo\Q\dipine"#);

        match Hl7Codec.decode(text.as_bytes()) {
            Err(Error::InvalidValue {
                field: "escape sequence",
                ..
            }) => (),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn segment_order_is_tolerated() {
        let prescription = sample_prescription();

        let encoded = Hl7Codec.encode(&prescription).unwrap();
        let text = from_utf8(&encoded).unwrap();

        let mut segments = text.split('\r').collect::<Vec<_>>();
        segments[1..].reverse();
        let reordered = segments.join("\r");

        let actual = Hl7Codec.decode(reordered.as_bytes()).unwrap();

        assert_eq!(actual, prescription);
    }

    #[test]
    fn unknown_segment_is_rejected() {
        let prescription = sample_prescription();

        let encoded = Hl7Codec.encode(&prescription).unwrap();
        let text = from_utf8(&encoded).unwrap();
        let text = format!("{}\rZZZ|1|custom", text);

        match Hl7Codec.decode(text.as_bytes()) {
            Err(Error::UnknownSegment(id)) => assert_eq!(id, "ZZZ"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn missing_pid_is_rejected() {
        let prescription = sample_prescription();

        let encoded = Hl7Codec.encode(&prescription).unwrap();
        let text = from_utf8(&encoded).unwrap();
        let text = text
            .split('\r')
            .filter(|s| !s.starts_with("PID"))
            .collect::<Vec<_>>()
            .join("\r");

        match Hl7Codec.decode(text.as_bytes()) {
            Err(Error::MissingField("PID")) => (),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn ack_echoes_control_id() {
        let now = Utc.ymd(2025, 1, 30).and_hms(10, 20, 0);

        let encoded = Hl7Codec::encode_ack("RX-2025-ABC123", AckCode::Accept, None, now);
        let ack = Hl7Codec::decode_ack(&encoded).unwrap();

        assert_eq!(ack.code, AckCode::Accept);
        assert_eq!(ack.control_id, "ACK-RX-2025-ABC123");
        assert_eq!(ack.echoed_control_id, "RX-2025-ABC123");
        assert_eq!(ack.text, None);
    }

    #[test]
    fn ack_carries_error_text() {
        let now = Utc.ymd(2025, 1, 30).and_hms(10, 20, 0);

        let encoded = Hl7Codec::encode_ack(
            "RX-2025-ABC123",
            AckCode::Reject,
            Some("duplicate order"),
            now,
        );
        let ack = Hl7Codec::decode_ack(&encoded).unwrap();

        assert_eq!(ack.code, AckCode::Reject);
        assert_eq!(ack.text.as_deref(), Some("duplicate order"));
    }
}
