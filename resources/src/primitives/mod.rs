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

mod id;

pub use id::Id;

use chrono::{DateTime, TimeZone, Utc};

/// Truncates a timestamp to whole seconds. All canonical timestamps are
/// stored with second precision so every wire format can carry them exactly.
pub fn second_precision(ts: DateTime<Utc>) -> DateTime<Utc> {
    Utc.timestamp(ts.timestamp(), 0)
}
