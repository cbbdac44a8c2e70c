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

use serde::{Deserialize, Serialize};
use vodozemac::Curve25519PublicKey;

use super::{deserialize_curve_key, serialize_curve_key, Signatures};

/// The name of the only backup algorithm this crate knows about.
pub const MEGOLM_BACKUP_V1_CURVE25519_AES_SHA2: &str = "m.megolm_backup.v1.curve25519-aes-sha2";

/// Auth data for the `m.megolm_backup.v1.curve25519-aes-sha2` backup algorithm
/// as defined in the [Matrix specification].
///
/// [Matrix specification]: https://spec.matrix.org/unstable/client-server-api/#backup-algorithm-mmegolm_backupv1curve25519-aes-sha2
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MegolmV1AuthData {
    ///The Curve25519 public key used to encrypt the backups.
    #[serde(deserialize_with = "deserialize_curve_key", serialize_with = "serialize_curve_key")]
    pub public_key: Curve25519PublicKey,
    /// *Optional.* Signatures of the auth_data, as Signed JSON.
    #[serde(default)]
    pub signatures: Signatures,
}

impl MegolmV1AuthData {
    /// Create new, unsigned, auth data for the given backup key.
    pub fn new(public_key: Curve25519PublicKey) -> Self {
        Self { public_key, signatures: Signatures::new() }
    }
}

/// Information pertaining to a room key backup version, as returned by
/// `GET /_matrix/client/v3/room_keys/version`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RoomKeyBackupInfo {
    /// The algorithm used for the backup, always
    /// [`MEGOLM_BACKUP_V1_CURVE25519_AES_SHA2`].
    pub algorithm: String,
    /// The backup version.
    pub version: String,
    /// The algorithm specific data of the backup.
    pub auth_data: MegolmV1AuthData,
}

impl RoomKeyBackupInfo {
    /// Create the info of a `m.megolm_backup.v1.curve25519-aes-sha2` backup.
    pub fn new(version: impl Into<String>, auth_data: MegolmV1AuthData) -> Self {
        Self {
            algorithm: MEGOLM_BACKUP_V1_CURVE25519_AES_SHA2.to_owned(),
            version: version.into(),
            auth_data,
        }
    }
}

/// The encrypted part of a backed up room key.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncryptedSessionData {
    /// Unpadded base64 encoded public half of the ephemeral key.
    pub ephemeral: String,
    /// Ciphertext, encrypted using AES-CBC-256 with PKCS#7 padding, encoded in
    /// base64.
    pub ciphertext: String,
    /// First 8 bytes of MAC key, encoded in base64.
    pub mac: String,
}

/// A backed up room key, as stored on the server.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyBackupData {
    /// The index of the first message in the session that the key can
    /// decrypt.
    pub first_message_index: u32,
    /// The number of times this key has been forwarded via key-sharing
    /// between devices.
    pub forwarded_count: u32,
    /// Whether the device backing up the key verified the device that the key
    /// is from.
    pub is_verified: bool,
    /// Encrypted data about the session.
    pub session_data: EncryptedSessionData,
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use vodozemac::Curve25519PublicKey;

    use super::{MegolmV1AuthData, RoomKeyBackupInfo};

    #[test]
    fn backup_info_serialization() {
        let public_key =
            Curve25519PublicKey::from_base64("hSDwCYkwp1R0i33ctD73Wg2/Og0mOBr066SpjqqbTmo")
                .unwrap();
        let info = RoomKeyBackupInfo::new("1", MegolmV1AuthData::new(public_key));

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(
            json,
            json!({
                "algorithm": "m.megolm_backup.v1.curve25519-aes-sha2",
                "version": "1",
                "auth_data": {
                    "public_key": "hSDwCYkwp1R0i33ctD73Wg2/Og0mOBr066SpjqqbTmo",
                    "signatures": {},
                },
            })
        );

        let deserialized: RoomKeyBackupInfo = serde_json::from_value(json).unwrap();
        assert_eq!(deserialized, info);
    }
}
