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

mod license_id;
mod national_id;
mod pharmacy_id;
mod prescription_id;

pub use license_id::{FromStrError as LicenseIdError, LicenseId, LicenseKind};
pub use national_id::{FromStrError as NationalIdError, NationalId};
pub use pharmacy_id::{FromStrError as PharmacyIdError, PharmacyId};
pub use prescription_id::{FromStrError as PrescriptionIdError, PrescriptionId};
