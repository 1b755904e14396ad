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
use std::ops::Deref;
use std::str::FromStr;

use regex::Regex;
use serde::{de::Error as DeError, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Pharmacy registration number: `PH` followed by six digits.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct PharmacyId(String);

#[derive(Debug, Error, Eq, PartialEq)]
pub enum FromStrError {
    #[error("Invalid Format")]
    InvalidFormat,
}

impl FromStr for PharmacyId {
    type Err = FromStrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lazy_static! {
            static ref RX: Regex = Regex::new(r#"^PH[0-9]{6}$"#).unwrap();
        }

        if RX.is_match(s) {
            Ok(Self(s.to_owned()))
        } else {
            Err(FromStrError::InvalidFormat)
        }
    }
}

impl Deref for PharmacyId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<PharmacyId> for String {
    fn from(v: PharmacyId) -> Self {
        v.0
    }
}

impl Display for PharmacyId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

impl Serialize for PharmacyId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PharmacyId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;

        Self::from_str(&s).map_err(|err| D::Error::custom(format!("Invalid Pharmacy ID: {}", err)))
    }
}
