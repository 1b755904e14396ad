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

use serde::{Deserialize, Serialize};

/// Wire standards a prescription can be exchanged in.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum MessageStandard {
    NcpdpScript,
    Hl7V2,
    FhirR4,
}

impl FromStr for MessageStandard {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ncpdp_script" => Ok(Self::NcpdpScript),
            "hl7_v2" => Ok(Self::Hl7V2),
            "fhir_r4" => Ok(Self::FhirR4),
            _ => Err(format!("Invalid message standard: {}", s)),
        }
    }
}

impl Display for MessageStandard {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let s = match self {
            Self::NcpdpScript => "ncpdp_script",
            Self::Hl7V2 => "hl7_v2",
            Self::FhirR4 => "fhir_r4",
        };

        write!(f, "{}", s)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        for standard in &[
            MessageStandard::NcpdpScript,
            MessageStandard::Hl7V2,
            MessageStandard::FhirR4,
        ] {
            let parsed: MessageStandard = standard.to_string().parse().unwrap();

            assert_eq!(parsed, *standard);
        }
    }
}
