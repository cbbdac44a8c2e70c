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

use ruma::{EventEncryptionAlgorithm, OwnedDeviceId, OwnedRoomId, OwnedUserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The event type of encrypted room events.
pub const ROOM_ENCRYPTED: &str = "m.room.encrypted";

/// A room event before encryption.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ClearEvent {
    /// The type of the event, e.g. `m.room.message`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// The room the event belongs to.
    pub room_id: OwnedRoomId,
    /// The sender of the event.
    pub sender: OwnedUserId,
    /// The content of the event.
    pub content: Value,
}

impl ClearEvent {
    /// The part of the event that gets encrypted.
    pub fn payload(&self) -> EventPayload {
        EventPayload {
            room_id: self.room_id.clone(),
            event_type: self.event_type.clone(),
            content: self.content.clone(),
        }
    }
}

/// The plaintext of a megolm encrypted room event.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EventPayload {
    /// The room the event belongs to, bound into the ciphertext so it can't
    /// be replayed in a different room.
    pub room_id: OwnedRoomId,
    /// The type of the decrypted event.
    #[serde(rename = "type")]
    pub event_type: String,
    /// The content of the decrypted event.
    pub content: Value,
}

/// The content of an `m.room.encrypted` event using the
/// `m.megolm.v1.aes-sha2` algorithm.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MegolmV1EncryptedContent {
    /// The encryption algorithm, always `m.megolm.v1.aes-sha2`.
    pub algorithm: EventEncryptionAlgorithm,
    /// The Curve25519 key of the sender.
    pub sender_key: String,
    /// The base64 encoded megolm message.
    pub ciphertext: String,
    /// The ID of the megolm session.
    pub session_id: String,
    /// The ID of the sending device.
    pub device_id: OwnedDeviceId,
}

/// An encrypted room event, in the shape the server delivers it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EncryptedEvent {
    /// The type of the event, always [`ROOM_ENCRYPTED`].
    #[serde(rename = "type")]
    pub event_type: String,
    /// The room the event belongs to.
    pub room_id: OwnedRoomId,
    /// The sender of the event.
    pub sender: OwnedUserId,
    /// The encrypted content.
    pub content: MegolmV1EncryptedContent,
    /// The ID of the event.
    pub event_id: String,
    /// The timestamp of the event, in milliseconds since the unix epoch.
    pub origin_server_ts: u64,
}
