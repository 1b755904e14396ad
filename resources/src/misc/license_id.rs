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

use serde::{de::Error as DeError, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Professional license registers. The prefix identifies the issuing body,
/// so the kind is always recoverable from the rendered string.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub enum LicenseKind {
    MedicalSyndicate,
    DrugAuthority,
    PharmacistSyndicate,
}

#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct LicenseId {
    kind: LicenseKind,
    number: String,
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum FromStrError {
    #[error("Unknown Prefix")]
    UnknownPrefix,

    #[error("Invalid Digit Count: expected {0}")]
    InvalidDigitCount(usize),

    #[error("Invalid Digit")]
    InvalidDigit,

    #[error("Kind Mismatch")]
    KindMismatch,
}

const LICENSE_KINDS: &[LicenseKind] = &[
    LicenseKind::MedicalSyndicate,
    LicenseKind::DrugAuthority,
    LicenseKind::PharmacistSyndicate,
];

impl LicenseKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::MedicalSyndicate => "EMS-",
            Self::DrugAuthority => "EDA-",
            Self::PharmacistSyndicate => "EPS-",
        }
    }

    pub fn digit_count(&self) -> usize {
        match self {
            Self::MedicalSyndicate => 5,
            Self::DrugAuthority => 6,
            Self::PharmacistSyndicate => 5,
        }
    }
}

impl LicenseId {
    pub fn kind(&self) -> LicenseKind {
        self.kind
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    /// Parses a license string that is required to belong to `kind`.
    pub fn parse_as(kind: LicenseKind, s: &str) -> Result<Self, FromStrError> {
        let id: Self = s.parse()?;

        if id.kind != kind {
            return Err(FromStrError::KindMismatch);
        }

        Ok(id)
    }
}

impl FromStr for LicenseId {
    type Err = FromStrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = *LICENSE_KINDS
            .iter()
            .find(|kind| s.starts_with(kind.prefix()))
            .ok_or(FromStrError::UnknownPrefix)?;

        let number = &s[kind.prefix().len()..];

        if number.len() != kind.digit_count() {
            return Err(FromStrError::InvalidDigitCount(kind.digit_count()));
        }

        if !number.bytes().all(|b| b.is_ascii_digit()) {
            return Err(FromStrError::InvalidDigit);
        }

        Ok(Self {
            kind,
            number: number.to_owned(),
        })
    }
}

impl Display for LicenseId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}{}", self.kind.prefix(), self.number)
    }
}

impl Serialize for LicenseId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let s = format!("{}", self);

        serializer.serialize_str(&s)
    }
}

impl<'de> Deserialize<'de> for LicenseId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;

        Self::from_str(&s).map_err(|err| D::Error::custom(format!("Invalid License ID: {}", err)))
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn round_trip_each_kind() {
        for (s, kind) in &[
            ("EMS-12345", LicenseKind::MedicalSyndicate),
            ("EDA-654321", LicenseKind::DrugAuthority),
            ("EPS-54321", LicenseKind::PharmacistSyndicate),
        ] {
            let id: LicenseId = s.parse().unwrap();

            assert_eq!(id.kind(), *kind);
            assert_eq!(id.to_string(), *s);
        }
    }

    #[test]
    fn reject_unknown_prefix() {
        assert_eq!(
            "XXX-12345".parse::<LicenseId>(),
            Err(FromStrError::UnknownPrefix)
        );
    }

    #[test]
    fn reject_wrong_digit_count() {
        assert_eq!(
            "EMS-123456".parse::<LicenseId>(),
            Err(FromStrError::InvalidDigitCount(5))
        );
        assert_eq!(
            "EDA-12345".parse::<LicenseId>(),
            Err(FromStrError::InvalidDigitCount(6))
        );
    }

    #[test]
    fn reject_non_digit() {
        assert_eq!(
            "EPS-12a45".parse::<LicenseId>(),
            Err(FromStrError::InvalidDigit)
        );
    }

    #[test]
    fn parse_as_checks_kind() {
        assert!(LicenseId::parse_as(LicenseKind::MedicalSyndicate, "EMS-12345").is_ok());
        assert_eq!(
            LicenseId::parse_as(LicenseKind::PharmacistSyndicate, "EMS-12345"),
            Err(FromStrError::KindMismatch)
        );
    }
}
