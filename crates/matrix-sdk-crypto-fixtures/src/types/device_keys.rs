// Copyright 2020 The Matrix.org Foundation C.I.C.
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

use ruma::{EventEncryptionAlgorithm, OwnedDeviceId, OwnedUserId};
use serde::{Deserialize, Serialize};
use vodozemac::{Curve25519PublicKey, Ed25519PublicKey};

use super::Signatures;
use crate::signing::ed25519_key_id;

/// Identity keys for a device, as returned by `/keys/query`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DeviceKeys {
    /// The ID of the user the device belongs to.
    ///
    /// Must match the user ID used when logging in.
    pub user_id: OwnedUserId,

    /// The ID of the device these keys belong to.
    ///
    /// Must match the device ID used when logging in.
    pub device_id: OwnedDeviceId,

    /// The encryption algorithms supported by this device.
    pub algorithms: Vec<EventEncryptionAlgorithm>,

    /// Public identity keys, keyed by `<algorithm>:<device_id>`.
    pub keys: BTreeMap<String, String>,

    /// Signatures for the device key object.
    #[serde(default)]
    pub signatures: Signatures,
}

impl DeviceKeys {
    /// Create the unsigned identity keys of a device supporting the Olm and
    /// Megolm algorithms.
    pub fn new(
        user_id: OwnedUserId,
        device_id: OwnedDeviceId,
        curve25519_key: Curve25519PublicKey,
        ed25519_key: Ed25519PublicKey,
    ) -> Self {
        let keys = BTreeMap::from([
            (format!("curve25519:{device_id}"), curve25519_key.to_base64()),
            (ed25519_key_id(device_id.as_str()), ed25519_key.to_base64()),
        ]);

        Self {
            user_id,
            device_id,
            algorithms: vec![
                EventEncryptionAlgorithm::OlmV1Curve25519AesSha2,
                EventEncryptionAlgorithm::MegolmV1AesSha2,
            ],
            keys,
            signatures: Signatures::new(),
        }
    }

    /// The base64 encoded Ed25519 key of the device.
    pub fn ed25519_key(&self) -> Option<&str> {
        self.keys.get(&ed25519_key_id(self.device_id.as_str())).map(String::as_str)
    }
}
