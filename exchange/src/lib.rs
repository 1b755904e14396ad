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

pub mod audit;
pub mod codec;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod state;
pub mod store;

pub use audit::AuditTrail;
pub use codec::{codec_for, Codec};
pub use error::Error;
pub use logging::init_logger;
pub use orchestrator::{Exchange, Options};
pub use state::StateMachine;
pub use store::{MemStore, QueryFilter, Store};
