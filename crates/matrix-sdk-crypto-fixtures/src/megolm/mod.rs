// Copyright 2023 The Matrix.org Foundation C.I.C.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The megolm session export format and the room event encryption built on
//! top of it.

mod event;
mod export;
mod message;

pub use event::{decrypt_event, encrypt_event};
pub use export::{
    ExportedSessionKey, EXPORTED_SESSION_KEY_SIZE, RATCHET_PART_SIZE, RATCHET_SIZE,
    SESSION_EXPORT_VERSION,
};
pub use message::{MegolmMessage, MESSAGE_VERSION, SIGNATURE_SIZE};
