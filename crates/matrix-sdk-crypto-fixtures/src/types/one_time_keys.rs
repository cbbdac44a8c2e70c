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

use ruma::{OwnedDeviceId, OwnedUserId};
use serde::{Deserialize, Serialize};

use super::Signatures;

/// The key ID prefix of signed Curve25519 one-time keys.
pub const SIGNED_CURVE25519: &str = "signed_curve25519";

/// One-time keys as returned by `POST /keys/claim`, keyed by user, device
/// and key ID.
pub type ClaimedOneTimeKeys =
    BTreeMap<OwnedUserId, BTreeMap<OwnedDeviceId, BTreeMap<String, SignedKey>>>;

/// A key for the SignedCurve25519 algorithm
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignedKey {
    /// The unpadded base64 encoded Curve25519 key.
    pub key: String,

    /// Signatures for the key object.
    #[serde(default)]
    pub signatures: Signatures,
}

impl SignedKey {
    /// Create a new, unsigned, key object.
    pub fn new(key: String) -> Self {
        Self { key, signatures: Signatures::new() }
    }
}
