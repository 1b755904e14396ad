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

#[macro_use]
extern crate lazy_static;

pub mod audit_event;
pub mod dispensation;
pub mod misc;
pub mod prescription;
pub mod primitives;
pub mod types;

pub use audit_event::AuditEvent;
pub use dispensation::DispensationRecord;
pub use prescription::{Prescription, Status};
pub use types::MessageStandard;
