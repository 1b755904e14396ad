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

use super::misc::PrescriptionId;
use super::primitives::Id;

/// Immutable record of one lifecycle action. Events are only ever appended,
/// never updated or removed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Id,
    pub prescription_id: PrescriptionId,
    pub agent: Agent,
    pub action: Action,
    pub outcome: Outcome,
    pub outcome_description: Option<String>,
    pub recorded: DateTime<Utc>,
    pub metadata: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub role: ActorRole,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ActorRole {
    Doctor,
    Pharmacy,
    Regulator,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Action {
    Submit,
    Retrieve,
    Dispense,
    Cancel,
    Invalidate,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    Success,
    Failure,
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let s = match self {
            Self::Submit => "submit",
            Self::Retrieve => "retrieve",
            Self::Dispense => "dispense",
            Self::Cancel => "cancel",
            Self::Invalidate => "invalidate",
        };

        write!(f, "{}", s)
    }
}

impl FromStr for ActorRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "doctor" => Ok(Self::Doctor),
            "pharmacy" => Ok(Self::Pharmacy),
            "regulator" => Ok(Self::Regulator),
            _ => Err(format!("Invalid actor role: {}", s)),
        }
    }
}

impl Display for ActorRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let s = match self {
            Self::Doctor => "doctor",
            Self::Pharmacy => "pharmacy",
            Self::Regulator => "regulator",
        };

        write!(f, "{}", s)
    }
}
