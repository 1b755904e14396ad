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

use chrono::{DateTime, Datelike, Utc};
use rand::{thread_rng, Rng};
use regex::Regex;
use serde::{de::Error as DeError, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Prescription number: `RX-<year>-<serial>` with a four-digit issue year
/// and a six-character upper-case alphanumeric serial.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct PrescriptionId {
    year: i32,
    serial: String,
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum FromStrError {
    #[error("Invalid Format")]
    InvalidFormat,

    #[error("Year Out Of Range: {0}")]
    YearOutOfRange(i32),
}

const SERIAL_LEN: usize = 6;
const SERIAL_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

impl PrescriptionId {
    pub fn new(year: i32, serial: String) -> Self {
        Self { year, serial }
    }

    pub fn generate(now: DateTime<Utc>) -> Self {
        let mut rng = thread_rng();
        let serial = (0..SERIAL_LEN)
            .map(|_| SERIAL_CHARS[rng.gen_range(0, SERIAL_CHARS.len())] as char)
            .collect();

        Self::new(now.year(), serial)
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Checks the issue year against the accepted window: no older than the
    /// configured epoch and at most one year ahead of the clock.
    pub fn verify_year_range(&self, epoch_year: i32, now: DateTime<Utc>) -> Result<(), FromStrError> {
        if self.year < epoch_year || self.year > now.year() + 1 {
            return Err(FromStrError::YearOutOfRange(self.year));
        }

        Ok(())
    }
}

impl FromStr for PrescriptionId {
    type Err = FromStrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lazy_static! {
            static ref RX: Regex = Regex::new(r#"^RX-([0-9]{4})-([A-Z0-9]{6})$"#).unwrap();
        }

        let caps = match RX.captures(s) {
            Some(caps) => caps,
            None => return Err(FromStrError::InvalidFormat),
        };

        let year = caps[1].parse().map_err(|_| FromStrError::InvalidFormat)?;
        let serial = caps[2].to_owned();

        Ok(Self::new(year, serial))
    }
}

impl Display for PrescriptionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "RX-{:04}-{}", self.year, self.serial)
    }
}

impl Serialize for PrescriptionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let s = format!("{}", self);

        serializer.serialize_str(&s)
    }
}

impl<'de> Deserialize<'de> for PrescriptionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;

        Self::from_str(&s)
            .map_err(|err| D::Error::custom(format!("Invalid Prescription ID: {}", err)))
    }
}
