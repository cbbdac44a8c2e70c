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

use std::collections::BTreeMap;

use ruma::{DeviceKeyAlgorithm, EventEncryptionAlgorithm, OwnedRoomId};
use serde::{Deserialize, Serialize};
use vodozemac::{Curve25519PublicKey, Ed25519PublicKey};

use crate::{error::MalformedExportError, megolm::ExportedSessionKey};

/// An exported room key, in the format of a room key export, also used as
/// the plaintext of a backed up room key.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct MegolmSessionData {
    /// The encryption algorithm that the session uses.
    pub algorithm: EventEncryptionAlgorithm,

    /// The room where the session is used.
    pub room_id: OwnedRoomId,

    /// The Curve25519 key of the device which initiated the session originally.
    pub sender_key: String,

    /// The ID of the session that the key is for.
    pub session_id: String,

    /// The key for the session.
    pub session_key: ExportedSessionKey,

    /// The Ed25519 key of the device which initiated the session originally.
    #[serde(default)]
    pub sender_claimed_keys: BTreeMap<DeviceKeyAlgorithm, String>,

    /// Chain of Curve25519 keys through which this session was forwarded, via
    /// m.forwarded_room_key events.
    #[serde(default)]
    pub forwarding_curve25519_key_chain: Vec<String>,
}

impl MegolmSessionData {
    /// Create the export of a session that was never forwarded.
    pub fn new(
        room_id: OwnedRoomId,
        sender_key: Curve25519PublicKey,
        session_key: ExportedSessionKey,
        claimed_ed25519_key: Ed25519PublicKey,
    ) -> Self {
        Self {
            algorithm: EventEncryptionAlgorithm::MegolmV1AesSha2,
            room_id,
            sender_key: sender_key.to_base64(),
            session_id: session_key.session_id(),
            session_key,
            sender_claimed_keys: BTreeMap::from([(
                DeviceKeyAlgorithm::Ed25519,
                claimed_ed25519_key.to_base64(),
            )]),
            forwarding_curve25519_key_chain: Vec::new(),
        }
    }

    /// The message index the session key is at.
    pub fn first_known_index(&self) -> u32 {
        self.session_key.index()
    }

    /// Export the same session advanced by one ratchet step.
    ///
    /// The room, sender and claimed keys are carried over, the forwarding
    /// chain starts out empty.
    pub fn ratchet_step(&self) -> Result<Self, MalformedExportError> {
        Ok(Self {
            algorithm: self.algorithm.clone(),
            room_id: self.room_id.clone(),
            sender_key: self.sender_key.clone(),
            session_id: self.session_id.clone(),
            session_key: self.session_key.ratchet_step()?,
            sender_claimed_keys: self.sender_claimed_keys.clone(),
            forwarding_curve25519_key_chain: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use ruma::room_id;
    use serde_json::json;

    use super::MegolmSessionData;
    use crate::{
        keys::{ExchangeKey, SigningKey},
        megolm::{ExportedSessionKey, RATCHET_SIZE},
        signing::canonicalize_serializable,
    };

    fn session() -> MegolmSessionData {
        let signing_key = SigningKey::from_seed(b"megolmmegolmmegolmmegolmmegolmme");
        let mut ratchet = [0u8; RATCHET_SIZE];
        ratchet.iter_mut().enumerate().for_each(|(i, b)| *b = i as u8);

        MegolmSessionData::new(
            room_id!("!room:id").to_owned(),
            ExchangeKey::from_bytes(b"deadmuledeadmuledeadmuledeadmule").public_key(),
            ExportedSessionKey::new(0, &ratchet, &signing_key.public_key()),
            SigningKey::from_seed(b"deadbeefdeadbeefdeadbeefdeadbeef").public_key(),
        )
    }

    #[test]
    fn serialization() {
        let session = session();
        let json = serde_json::to_value(&session).unwrap();

        assert_eq!(
            json,
            json!({
                "algorithm": "m.megolm.v1.aes-sha2",
                "room_id": "!room:id",
                "sender_key": "WimPd2udAU/1S/+YBpPbmr9L+0H5H+BnAVHSwDxlPGc",
                "session_id": "cPU/w40H+c3PTVKKLAARNKJBIu3LZnwMN+JvoTM5SO4",
                "session_key": session.session_key.to_base64(),
                "sender_claimed_keys": {
                    "ed25519": "YI/7vbGVLpGdYtuceQR8MSsKB/QjgfMXM1xqnn+0NWU",
                },
                "forwarding_curve25519_key_chain": [],
            })
        );

        let deserialized: MegolmSessionData = serde_json::from_value(json).unwrap();
        assert_eq!(deserialized, session);
    }

    #[test]
    fn canonical_form_is_sorted() {
        let canonical = canonicalize_serializable(&session()).unwrap();
        let canonical = String::from_utf8(canonical).unwrap();

        assert!(canonical.starts_with(r#"{"algorithm":"m.megolm.v1.aes-sha2","forwarding_curve25519_key_chain":[],"room_id":"!room:id""#));
    }

    #[test]
    fn ratchet_step_carries_over_the_identity() {
        let mut session = session();
        session.forwarding_curve25519_key_chain.push("forwarder".to_owned());

        let ratcheted = session.ratchet_step().unwrap();

        assert_eq!(ratcheted.first_known_index(), 1);
        assert_eq!(ratcheted.session_id, session.session_id);
        assert_eq!(ratcheted.sender_key, session.sender_key);
        assert_eq!(ratcheted.sender_claimed_keys, session.sender_claimed_keys);
        assert_eq!(ratcheted.room_id, session.room_id);
        assert!(ratcheted.forwarding_curve25519_key_chain.is_empty());
        assert_eq!(
            ratcheted.session_key.to_base64(),
            "AQAAAAEAAQIDBAUGBwgJCgsMDQ4PEBESExQVFhcYGRobHB0eHyAhIiMkJSYnKCkqKywtLi8wMTIzNDU2Nzg5Ojs8PT4/QEFCQ0RFRkdISUpLTE1OT1BRUlNUVVZXWFlaW1xdXl8CWPDUTCLrX0PMV+Ja/8Ms1tgeqtl5cI08OXuRoiqSPXD1P8ONB/nNz01SiiwAETSiQSLty2Z8DDfib6EzOUju"
        );
    }
}
