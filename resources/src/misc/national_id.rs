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

use chrono::NaiveDate;
use serde::{de::Error as DeError, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Egyptian national identity number.
///
/// Fourteen digits: century digit (2 = 1900s, 3 = 2000s), birth date as
/// YYMMDD, two-digit governorate code, four-digit serial and a Luhn check
/// digit over the first thirteen digits.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct NationalId(String);

#[derive(Debug, Error, Eq, PartialEq)]
pub enum FromStrError {
    #[error("Invalid Length")]
    InvalidLength,

    #[error("Invalid Digit")]
    InvalidDigit,

    #[error("Invalid Century")]
    InvalidCentury,

    #[error("Invalid Birth Date")]
    InvalidBirthDate,

    #[error("Invalid Governorate")]
    InvalidGovernorate,

    #[error("Invalid Checksum")]
    InvalidChecksum,
}

const NATIONAL_ID_LEN: usize = 14;

const GOVERNORATE_CODES: &[u32] = &[
    1, 2, 3, 4, 11, 12, 13, 14, 15, 16, 17, 18, 19, 21, 22, 23, 24, 25, 26, 27, 28, 29, 31, 32,
    33, 34, 35,
];

impl NationalId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn birth_date(&self) -> NaiveDate {
        let digits = digits(&self.0);

        birth_date(&digits).unwrap()
    }

    pub fn governorate(&self) -> u32 {
        let digits = digits(&self.0);

        digits[7] * 10 + digits[8]
    }
}

impl FromStr for NationalId {
    type Err = FromStrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != NATIONAL_ID_LEN {
            return Err(FromStrError::InvalidLength);
        }

        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(FromStrError::InvalidDigit);
        }

        let digits = digits(s);

        if digits[0] != 2 && digits[0] != 3 {
            return Err(FromStrError::InvalidCentury);
        }

        if birth_date(&digits).is_none() {
            return Err(FromStrError::InvalidBirthDate);
        }

        let governorate = digits[7] * 10 + digits[8];
        if !GOVERNORATE_CODES.contains(&governorate) {
            return Err(FromStrError::InvalidGovernorate);
        }

        if luhn_check_digit(&digits[..13]) != digits[13] {
            return Err(FromStrError::InvalidChecksum);
        }

        Ok(Self(s.to_owned()))
    }
}

impl Display for NationalId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

impl From<NationalId> for String {
    fn from(v: NationalId) -> Self {
        v.0
    }
}

impl Serialize for NationalId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for NationalId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;

        Self::from_str(&s).map_err(|err| D::Error::custom(format!("Invalid National ID: {}", err)))
    }
}

fn digits(s: &str) -> Vec<u32> {
    s.chars().filter_map(|c| c.to_digit(10)).collect()
}

fn birth_date(digits: &[u32]) -> Option<NaiveDate> {
    let century = match digits[0] {
        2 => 1900,
        3 => 2000,
        _ => return None,
    };

    let year = century + (digits[1] * 10 + digits[2]) as i32;
    let month = digits[3] * 10 + digits[4];
    let day = digits[5] * 10 + digits[6];

    NaiveDate::from_ymd_opt(year, month, day)
}

/// Standard Luhn: double every second digit starting from the rightmost
/// payload digit, subtract nine from two-digit products, sum, complement.
fn luhn_check_digit(payload: &[u32]) -> u32 {
    let sum: u32 = payload
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            let mut v = d;
            if i % 2 == 0 {
                v *= 2;
                if v > 9 {
                    v -= 9;
                }
            }
            v
        })
        .sum();

    (10 - sum % 10) % 10
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn accept_valid_ids() {
        for s in &[
            "29001010123458",
            "27503150267898",
            "30102031211111",
            "28506202112342",
            "30205110110078",
        ] {
            let id: NationalId = s.parse().unwrap();

            assert_eq!(id.as_str(), *s);
        }
    }

    #[test]
    fn birth_date_and_governorate() {
        let id: NationalId = "27503150267898".parse().unwrap();

        assert_eq!(id.birth_date(), NaiveDate::from_ymd(1975, 3, 15));
        assert_eq!(id.governorate(), 26);
    }

    #[test]
    fn reject_invalid_length() {
        assert_eq!(
            "2900101012345".parse::<NationalId>(),
            Err(FromStrError::InvalidLength)
        );
    }

    #[test]
    fn reject_non_digit() {
        assert_eq!(
            "2900101012345X".parse::<NationalId>(),
            Err(FromStrError::InvalidDigit)
        );
    }

    #[test]
    fn reject_invalid_century() {
        assert_eq!(
            "19001010123458".parse::<NationalId>(),
            Err(FromStrError::InvalidCentury)
        );
    }

    #[test]
    fn reject_invalid_birth_date() {
        // month 13
        assert_eq!(
            "29013010123458".parse::<NationalId>(),
            Err(FromStrError::InvalidBirthDate)
        );

        // 1990 is not a leap year
        assert_eq!(
            "29002290123458".parse::<NationalId>(),
            Err(FromStrError::InvalidBirthDate)
        );
    }

    #[test]
    fn reject_invalid_governorate() {
        assert_eq!(
            "29001010523458".parse::<NationalId>(),
            Err(FromStrError::InvalidGovernorate)
        );
    }

    #[test]
    fn reject_invalid_checksum() {
        assert_eq!(
            "29001010123459".parse::<NationalId>(),
            Err(FromStrError::InvalidChecksum)
        );
    }
}
