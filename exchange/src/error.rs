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

use log::SetLoggerError;
use log4rs::config::Errors as Log4RsError;
use thiserror::Error;

use resources::dispensation::ValidationError as DispensationError;
use resources::misc::{PharmacyId, PrescriptionId};
use resources::prescription::ValidationError;

use crate::{codec::Error as CodecError, state::Error as LifecycleError, store::Error as StoreError};

#[derive(Error, Debug)]
pub enum Error {
    #[error("Generic Error: {0}")]
    Generic(String),

    #[error("Validation Error: {0}")]
    Validation(ValidationError),

    #[error("Dispensation Error: {0}")]
    Dispensation(DispensationError),

    #[error("Codec Error: {0}")]
    Codec(CodecError),

    #[error("Lifecycle Error: {0}")]
    Lifecycle(LifecycleError),

    #[error("Store Error: {0}")]
    Store(StoreError),

    #[error("Prescription {0} is not stored!")]
    NotStored(PrescriptionId),

    #[error("Dispensation pharmacy {actual} does not match prescription pharmacy {expected}!")]
    PharmacyMismatch {
        expected: PharmacyId,
        actual: PharmacyId,
    },

    #[error("Unable to set logger: {0}")]
    SetLoggerError(SetLoggerError),

    #[error("Unable to setup log4rs: {0}")]
    Log4RsError(Log4RsError),
}

impl From<String> for Error {
    fn from(v: String) -> Self {
        Self::Generic(v)
    }
}

impl From<ValidationError> for Error {
    fn from(v: ValidationError) -> Self {
        Self::Validation(v)
    }
}

impl From<DispensationError> for Error {
    fn from(v: DispensationError) -> Self {
        Self::Dispensation(v)
    }
}

impl From<CodecError> for Error {
    fn from(v: CodecError) -> Self {
        Self::Codec(v)
    }
}

impl From<LifecycleError> for Error {
    fn from(v: LifecycleError) -> Self {
        Self::Lifecycle(v)
    }
}

impl From<StoreError> for Error {
    fn from(v: StoreError) -> Self {
        Self::Store(v)
    }
}

impl From<SetLoggerError> for Error {
    fn from(v: SetLoggerError) -> Self {
        Self::SetLoggerError(v)
    }
}

impl From<Log4RsError> for Error {
    fn from(v: Log4RsError) -> Self {
        Self::Log4RsError(v)
    }
}
