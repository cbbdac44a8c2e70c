// Copyright 2021 The Matrix.org Foundation C.I.C.
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

use ruma::{encryption::KeyUsage, OwnedUserId};
use serde::{Deserialize, Serialize};
use vodozemac::Ed25519PublicKey;

use super::Signatures;
use crate::signing::ed25519_key_id;

/// A cross signing key.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CrossSigningKey {
    /// The ID of the user the key belongs to.
    pub user_id: OwnedUserId,

    /// What the key is used for.
    pub usage: Vec<KeyUsage>,

    /// The public key, keyed by `ed25519:<public key>`.
    ///
    /// The object must have exactly one property.
    pub keys: BTreeMap<String, String>,

    /// Signatures of the key.
    ///
    /// Only optional for master key.
    #[serde(default, skip_serializing_if = "Signatures::is_empty")]
    pub signatures: Signatures,
}

impl CrossSigningKey {
    /// Creates a new, unsigned, `CrossSigningKey` for the given user, usage and
    /// public key.
    pub fn new(user_id: OwnedUserId, usage: KeyUsage, public_key: Ed25519PublicKey) -> Self {
        let public_key = public_key.to_base64();
        let keys = BTreeMap::from([(ed25519_key_id(&public_key), public_key)]);

        Self { user_id, usage: vec![usage], keys, signatures: Signatures::new() }
    }

    /// The base64 encoded public key, if the key has exactly one Ed25519 key.
    pub fn public_key(&self) -> Option<&str> {
        match self.keys.values().collect::<Vec<_>>().as_slice() {
            [key] => Some(key.as_str()),
            _ => None,
        }
    }
}

/// The three cross-signing keys of a user, in the shape of a `/keys/query`
/// response.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CrossSigningKeys {
    /// The master keys, keyed by user ID.
    pub master_keys: BTreeMap<OwnedUserId, CrossSigningKey>,
    /// The self-signing keys, keyed by user ID.
    pub self_signing_keys: BTreeMap<OwnedUserId, CrossSigningKey>,
    /// The user-signing keys, keyed by user ID.
    pub user_signing_keys: BTreeMap<OwnedUserId, CrossSigningKey>,
}
