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

//! Builders for the complete set of crypto fixtures of a test user.
//!
//! A fixture set is a pure function of a [`UserData`] configuration and the
//! [`FixtureSettings`]: all the randomness comes from a
//! [`ChaCha20Rng`] seeded with [`FixtureSettings::seed`], so the same inputs
//! always produce byte-identical keys, exports and ciphertexts.

use std::collections::BTreeMap;

use rand::{CryptoRng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use ruma::{
    device_id, encryption::KeyUsage, room_id, user_id, OwnedDeviceId, OwnedRoomId, OwnedUserId,
    RoomId,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::json;
use tracing::{debug, instrument};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{
    backups::{BackupDecryptionKey, BackupMacScope},
    error::{FixtureError, KeyError},
    keys::{ExchangeKey, KeyMaterial, SigningKey, KEY_SIZE},
    megolm::{encrypt_event, ExportedSessionKey},
    signing::{ed25519_key_id, sign_serializable},
    types::{
        ClaimedOneTimeKeys, ClearEvent, CrossSigningKey, CrossSigningKeys, DeviceKeys,
        EncryptedEvent, KeyBackupData, MegolmSessionData, RoomKeyBackupInfo, SignedKey,
        ROOM_ENCRYPTED, SIGNED_CURVE25519,
    },
    utilities,
};

/// The key ID of the signed one-time key in the `/keys/claim` response.
const ONE_TIME_KEY_ID: &str = "AAAAHQ";

/// 32 bytes of private key material, serialized as unpadded base64.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct KeySeed([u8; KEY_SIZE]);

impl KeySeed {
    /// Wrap the given bytes.
    pub const fn new(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// The raw bytes of the seed.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// The unpadded base64 form of the seed.
    pub fn to_base64(&self) -> String {
        utilities::encode(self.0)
    }

    /// Decode a seed from base64, padded or not.
    pub fn from_base64(seed: &str) -> Result<Self, KeyError> {
        let decoded = zeroize::Zeroizing::new(utilities::decode(seed)?);

        let bytes: [u8; KEY_SIZE] = decoded
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::Length { expected: KEY_SIZE, got: decoded.len() })?;

        Ok(Self(bytes))
    }
}

#[cfg(not(tarpaulin_include))]
impl std::fmt::Debug for KeySeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("KeySeed").field(&"*****").finish()
    }
}

impl Serialize for KeySeed {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for KeySeed {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let seed = zeroize::Zeroizing::new(String::deserialize(deserializer)?);
        Self::from_base64(&seed).map_err(serde::de::Error::custom)
    }
}

/// The identity of a test user and all the private keys their fixtures are
/// derived from.
///
/// Can be loaded from JSON, the seeds are unpadded base64.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserData {
    /// The ID of the user.
    pub user_id: OwnedUserId,
    /// The ID of the user's device.
    pub device_id: OwnedDeviceId,
    /// The room the encrypted event and the room keys belong to.
    pub room_id: OwnedRoomId,
    /// Seed of the device's Ed25519 key.
    pub device_ed25519_seed: KeySeed,
    /// The device's Curve25519 private key.
    pub device_curve25519_key: KeySeed,
    /// Seed of the master cross-signing key.
    pub master_key_seed: KeySeed,
    /// Seed of the self-signing cross-signing key.
    pub self_signing_key_seed: KeySeed,
    /// Seed of the user-signing cross-signing key.
    pub user_signing_key_seed: KeySeed,
    /// Seed of a second master key, signing the same sub-keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_master_key_seed: Option<KeySeed>,
    /// The base64 encoded backup decryption key.
    pub backup_decryption_key: String,
    /// The Curve25519 one-time key that gets signed by the device.
    pub one_time_key: String,
}

impl UserData {
    /// The configuration of `@alice:localhost`.
    pub fn alice() -> Self {
        Self {
            user_id: user_id!("@alice:localhost").to_owned(),
            device_id: device_id!("test_device").to_owned(),
            room_id: room_id!("!room:id").to_owned(),
            device_ed25519_seed: KeySeed::new(*b"deadbeefdeadbeefdeadbeefdeadbeef"),
            device_curve25519_key: KeySeed::new(*b"deadmuledeadmuledeadmuledeadmule"),
            master_key_seed: KeySeed::new(*b"doyouspeakwhaaaaaaaaaaaaaaaaaale"),
            self_signing_key_seed: KeySeed::new(*b"selfselfselfselfselfselfselfself"),
            user_signing_key_seed: KeySeed::new(*b"useruseruseruseruseruseruseruser"),
            alt_master_key_seed: None,
            backup_decryption_key: "dwdtCnMYpX08FsFyUbJmRd9ML4frwJkqsXf7pR25LCo=".to_owned(),
            one_time_key: "j3fR3HemM16M7CWhoI4Sk5ZsdmdfQHsKL1xuSft6MSw".to_owned(),
        }
    }

    /// The configuration of `@bob:xyz`, who also has an alternate master key.
    pub fn bob() -> Self {
        Self {
            user_id: user_id!("@bob:xyz").to_owned(),
            device_id: device_id!("bob_device").to_owned(),
            room_id: room_id!("!room:id").to_owned(),
            device_ed25519_seed: KeySeed::new(*b"Deadbeefdeadbeefdeadbeefdeadbeef"),
            device_curve25519_key: KeySeed::new(*b"Deadmuledeadmuledeadmuledeadmule"),
            master_key_seed: KeySeed::new(*b"Doyouspeakwhaaaaaaaaaaaaaaaaaale"),
            self_signing_key_seed: KeySeed::new(*b"Selfselfselfselfselfselfselfself"),
            user_signing_key_seed: KeySeed::new(*b"Useruseruseruseruseruseruseruser"),
            alt_master_key_seed: Some(KeySeed::new(*b"DoYouSpeakWhaaaaaaaaaaaaaaaaaale")),
            backup_decryption_key: "DwdtCnMYpX08FsFyUbJmRd9ML4frwJkqsXf7pR25LCo=".to_owned(),
            one_time_key: "j3fR3HemM16M7CWhoI4Sk5ZsdmdfQHsKL1xuSft6MSw".to_owned(),
        }
    }

    /// The Ed25519 key of the device.
    pub fn device_signing_key(&self) -> SigningKey {
        SigningKey::from_seed(self.device_ed25519_seed.as_bytes())
    }

    /// The Curve25519 key of the device.
    pub fn device_exchange_key(&self) -> ExchangeKey {
        ExchangeKey::from_bytes(self.device_curve25519_key.as_bytes())
    }

    /// The backup decryption key.
    pub fn backup_key(&self) -> Result<BackupDecryptionKey, KeyError> {
        BackupDecryptionKey::from_base64(&self.backup_decryption_key)
    }
}

/// Knobs of the fixture generation that don't belong to a user.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FixtureSettings {
    /// Seed of the random source the room keys and ephemeral keys are drawn
    /// from.
    pub seed: u64,
    /// The input of the MAC of the backed up room key.
    pub backup_mac_scope: BackupMacScope,
    /// The backup version the signed backup info advertises.
    pub backup_version: String,
    /// The ID of the encrypted event.
    pub event_id: String,
    /// The timestamp of the encrypted event.
    pub origin_server_ts: u64,
}

impl Default for FixtureSettings {
    fn default() -> Self {
        Self {
            seed: 10,
            backup_mac_scope: BackupMacScope::default(),
            backup_version: "1".to_owned(),
            event_id: "$event1".to_owned(),
            origin_server_ts: 1_507_753_886_000,
        }
    }
}

/// The complete fixture set of a test user.
#[derive(Clone, Debug, Serialize)]
pub struct TestData {
    /// The ID of the user.
    pub user_id: OwnedUserId,
    /// The ID of the user's device.
    pub device_id: OwnedDeviceId,
    /// The room of the room keys and the encrypted event.
    pub room_id: OwnedRoomId,
    /// The base64 encoded public Ed25519 key of the device.
    pub device_public_ed25519_key: String,
    /// Signed device keys, as returned by `/keys/query`.
    pub signed_device_data: DeviceKeys,
    /// The base64 encoded public master key.
    pub master_cross_signing_public_key: String,
    /// The base64 encoded private master key.
    pub master_cross_signing_private_key: String,
    /// The base64 encoded public self-signing key.
    pub self_cross_signing_public_key: String,
    /// The base64 encoded private self-signing key.
    pub self_cross_signing_private_key: String,
    /// The base64 encoded public user-signing key.
    pub user_cross_signing_public_key: String,
    /// The base64 encoded private user-signing key.
    pub user_cross_signing_private_key: String,
    /// Signed cross-signing keys, as returned by `/keys/query`.
    pub signed_cross_signing_keys: CrossSigningKeys,
    /// The cross-signing keys signed by the alternate master key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_signed_cross_signing_keys: Option<CrossSigningKeys>,
    /// Signed one-time keys, as returned by `POST /keys/claim`.
    pub one_time_keys: ClaimedOneTimeKeys,
    /// The base64 encoded backup decryption key.
    pub backup_decryption_key_base64: String,
    /// The backup decryption key as a recovery key.
    pub backup_decryption_key_base58: String,
    /// Signed backup info, as returned by `GET /room_keys/version`.
    pub signed_backup_data: RoomKeyBackupInfo,
    /// A set of room key exports.
    pub megolm_session_data_array: Vec<MegolmSessionData>,
    /// A room key export.
    pub megolm_session_data: MegolmSessionData,
    /// The room key export, advanced by one ratchet step.
    pub ratcheted_megolm_session_data: MegolmSessionData,
    /// The room key export, encrypted for the backup.
    pub curve25519_key_backup_data: KeyBackupData,
    /// A room event in the clear.
    pub clear_event: ClearEvent,
    /// The clear event, encrypted with the room key export.
    pub encrypted_event: EncryptedEvent,
}

/// Create the signed device keys of the user's device.
pub fn sign_device_keys(user: &UserData) -> Result<DeviceKeys, FixtureError> {
    let signing_key = user.device_signing_key();

    let mut device_keys = DeviceKeys::new(
        user.user_id.clone(),
        user.device_id.clone(),
        user.device_exchange_key().public_key(),
        signing_key.public_key(),
    );

    let signature = sign_serializable(&device_keys, &signing_key)?;
    device_keys.signatures.add_signature(
        user.user_id.clone(),
        ed25519_key_id(user.device_id.as_str()),
        signature,
    );

    Ok(device_keys)
}

/// Create the cross-signing keys of the user, with the self-signing and
/// user-signing keys signed by the given master key.
pub fn build_cross_signing_keys(
    user: &UserData,
    master_key_seed: &KeySeed,
) -> Result<CrossSigningKeys, FixtureError> {
    let master_key = SigningKey::from_seed(master_key_seed.as_bytes());
    let master_key_id = ed25519_key_id(&master_key.public_key_base64());

    let master =
        CrossSigningKey::new(user.user_id.clone(), KeyUsage::Master, master_key.public_key());

    let sub_key = |usage: KeyUsage, seed: &KeySeed| -> Result<CrossSigningKey, FixtureError> {
        let key = SigningKey::from_seed(seed.as_bytes());
        let mut cross_signing_key =
            CrossSigningKey::new(user.user_id.clone(), usage, key.public_key());

        let signature = sign_serializable(&cross_signing_key, &master_key)?;
        cross_signing_key.signatures.add_signature(
            user.user_id.clone(),
            master_key_id.clone(),
            signature,
        );

        Ok(cross_signing_key)
    };

    let self_signing = sub_key(KeyUsage::SelfSigning, &user.self_signing_key_seed)?;
    let user_signing = sub_key(KeyUsage::UserSigning, &user.user_signing_key_seed)?;

    Ok(CrossSigningKeys {
        master_keys: BTreeMap::from([(user.user_id.clone(), master)]),
        self_signing_keys: BTreeMap::from([(user.user_id.clone(), self_signing)]),
        user_signing_keys: BTreeMap::from([(user.user_id.clone(), user_signing)]),
    })
}

/// Sign the user's one-time key with the device key and put it into the
/// shape of a `/keys/claim` response.
pub fn sign_one_time_key(user: &UserData) -> Result<ClaimedOneTimeKeys, FixtureError> {
    let mut key = SignedKey::new(user.one_time_key.clone());

    let signature = sign_serializable(&key, &user.device_signing_key())?;
    key.signatures.add_signature(
        user.user_id.clone(),
        ed25519_key_id(user.device_id.as_str()),
        signature,
    );

    let key_id = format!("{SIGNED_CURVE25519}:{ONE_TIME_KEY_ID}");

    Ok(BTreeMap::from([(
        user.user_id.clone(),
        BTreeMap::from([(user.device_id.clone(), BTreeMap::from([(key_id, key)]))]),
    )]))
}

/// Create the backup info of the user's backup key, with the auth data
/// signed by the device key.
pub fn sign_backup_info(
    user: &UserData,
    backup_key: &BackupDecryptionKey,
    version: &str,
) -> Result<RoomKeyBackupInfo, FixtureError> {
    let mut auth_data = backup_key.megolm_v1_public_key().auth_data();

    let signature = sign_serializable(&auth_data, &user.device_signing_key())?;
    auth_data.signatures.add_signature(
        user.user_id.clone(),
        ed25519_key_id(user.device_id.as_str()),
        signature,
    );

    Ok(RoomKeyBackupInfo::new(version, auth_data))
}

/// Create a new room key export at index 0.
///
/// The session signing key, the ratchet and the claimed Ed25519 key of the
/// sender are drawn from the random source, in that order. Returns the export
/// and the private session signing key, which is needed to encrypt events.
pub fn build_exported_megolm_key<R: RngCore + CryptoRng>(
    rng: &mut R,
    room_id: &RoomId,
    sender_key: &ExchangeKey,
) -> (MegolmSessionData, SigningKey) {
    let session_signing_key = SigningKey::generate(rng);
    let session_key = ExportedSessionKey::generate(rng, &session_signing_key.public_key());
    let claimed_key = SigningKey::generate(rng);

    let session = MegolmSessionData::new(
        room_id.to_owned(),
        sender_key.public_key(),
        session_key,
        claimed_key.public_key(),
    );

    (session, session_signing_key)
}

/// The `m.room.message` event the fixtures encrypt.
pub fn clear_event(user: &UserData) -> ClearEvent {
    ClearEvent {
        event_type: "m.room.message".to_owned(),
        room_id: user.room_id.clone(),
        sender: user.user_id.clone(),
        content: json!({
            "msgtype": "m.text",
            "body": "Hello world",
        }),
    }
}

/// Generate the complete fixture set of the given user.
#[instrument(skip_all, fields(user_id = %user.user_id, seed = settings.seed))]
pub fn generate_test_data(
    user: &UserData,
    settings: &FixtureSettings,
) -> Result<TestData, FixtureError> {
    let mut rng = ChaCha20Rng::seed_from_u64(settings.seed);

    let device_key = user.device_signing_key();
    let device_curve_key = user.device_exchange_key();
    let backup_key = user.backup_key()?.with_mac_scope(settings.backup_mac_scope);

    let megolm_session_data_array = (0..2)
        .map(|_| build_exported_megolm_key(&mut rng, &user.room_id, &device_curve_key).0)
        .collect();

    let (megolm_session_data, session_signing_key) =
        build_exported_megolm_key(&mut rng, &user.room_id, &device_curve_key);
    let ratcheted_megolm_session_data = megolm_session_data.ratchet_step()?;

    let curve25519_key_backup_data =
        backup_key.megolm_v1_public_key().encrypt_session(&megolm_session_data, &mut rng)?;

    let clear_event = clear_event(user);
    let content =
        encrypt_event(&clear_event, &megolm_session_data, &session_signing_key, &user.device_id)?;

    let encrypted_event = EncryptedEvent {
        event_type: ROOM_ENCRYPTED.to_owned(),
        room_id: clear_event.room_id.clone(),
        sender: clear_event.sender.clone(),
        content,
        event_id: settings.event_id.clone(),
        origin_server_ts: settings.origin_server_ts,
    };

    let alt_signed_cross_signing_keys = user
        .alt_master_key_seed
        .as_ref()
        .map(|seed| build_cross_signing_keys(user, seed))
        .transpose()?;

    let test_data = TestData {
        user_id: user.user_id.clone(),
        device_id: user.device_id.clone(),
        room_id: user.room_id.clone(),
        device_public_ed25519_key: device_key.public_key_base64(),
        signed_device_data: sign_device_keys(user)?,
        master_cross_signing_public_key: SigningKey::from_seed(user.master_key_seed.as_bytes())
            .public_key_base64(),
        master_cross_signing_private_key: user.master_key_seed.to_base64(),
        self_cross_signing_public_key: SigningKey::from_seed(
            user.self_signing_key_seed.as_bytes(),
        )
        .public_key_base64(),
        self_cross_signing_private_key: user.self_signing_key_seed.to_base64(),
        user_cross_signing_public_key: SigningKey::from_seed(
            user.user_signing_key_seed.as_bytes(),
        )
        .public_key_base64(),
        user_cross_signing_private_key: user.user_signing_key_seed.to_base64(),
        signed_cross_signing_keys: build_cross_signing_keys(user, &user.master_key_seed)?,
        alt_signed_cross_signing_keys,
        one_time_keys: sign_one_time_key(user)?,
        backup_decryption_key_base64: user.backup_decryption_key.clone(),
        backup_decryption_key_base58: backup_key.to_recovery_key().to_string(),
        signed_backup_data: sign_backup_info(user, &backup_key, &settings.backup_version)?,
        megolm_session_data_array,
        megolm_session_data,
        ratcheted_megolm_session_data,
        curve25519_key_backup_data,
        clear_event,
        encrypted_event,
    };

    debug!("Generated the crypto fixtures");

    Ok(test_data)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use ruma::user_id;
    use serde_json::json;
    use similar_asserts::assert_eq;
    use vodozemac::Ed25519PublicKey;

    use super::{
        build_cross_signing_keys, generate_test_data, sign_backup_info, sign_device_keys,
        sign_one_time_key, FixtureSettings, KeySeed, UserData,
    };
    use crate::{
        backups::BackupMacScope,
        error::EventDecryptionError,
        megolm::decrypt_event,
        signing::verify_json,
    };

    const MASTER_KEY: &str = "J+5An10v1vzZpAXTYFokD1/PEVccFnLC61EfRXit0UY";
    const SELF_SIGNING_KEY: &str = "aU2+2CyXQTCuDcmWW0EL2bhJ6PdjFW2LbAsbHqf02AY";
    const USER_SIGNING_KEY: &str = "g5TC/zjQXyZYuDLZv7a41z5fFVrXpYPypG//AFQj8hY";

    #[test]
    fn signed_device_keys() {
        let user = UserData::alice();
        let device_keys = sign_device_keys(&user).unwrap();

        assert_eq!(
            serde_json::to_value(&device_keys).unwrap(),
            json!({
                "algorithms": ["m.olm.v1.curve25519-aes-sha2", "m.megolm.v1.aes-sha2"],
                "device_id": "test_device",
                "keys": {
                    "curve25519:test_device": "WimPd2udAU/1S/+YBpPbmr9L+0H5H+BnAVHSwDxlPGc",
                    "ed25519:test_device": "YI/7vbGVLpGdYtuceQR8MSsKB/QjgfMXM1xqnn+0NWU",
                },
                "signatures": {
                    "@alice:localhost": {
                        "ed25519:test_device": "qeyILdmh4S4VBAUxUw2O5nARglo68RPaCkzT6C10luyKHV8YZuxmfggMFIanc8GExSLY/jqiiBbKZK2sES2tAA",
                    },
                },
                "user_id": "@alice:localhost",
            })
        );
    }

    #[test]
    fn signed_cross_signing_keys() {
        let user = UserData::alice();
        let keys = build_cross_signing_keys(&user, &user.master_key_seed).unwrap();
        let user_id = user_id!("@alice:localhost");

        let master = &keys.master_keys[user_id];
        assert_eq!(master.public_key(), Some(MASTER_KEY));
        assert!(master.signatures.is_empty());

        let master_key_id = format!("ed25519:{MASTER_KEY}");

        let self_signing = &keys.self_signing_keys[user_id];
        assert_eq!(self_signing.public_key(), Some(SELF_SIGNING_KEY));
        assert_eq!(
            self_signing.signatures.get_signature(user_id, &master_key_id).unwrap().to_base64(),
            "XfhYEhZmOs8BJdb3viatILBZ/bElsHXEW28V4tIaY5CxrBR0YOym3yZHWmRmypXessHZAKOhZn3yBMXzdajyCw"
        );

        let user_signing = &keys.user_signing_keys[user_id];
        assert_eq!(user_signing.public_key(), Some(USER_SIGNING_KEY));
        assert_eq!(
            user_signing.signatures.get_signature(user_id, &master_key_id).unwrap().to_base64(),
            "6AkD1XM2H0/ebgP9oBdMKNeft7uxsrb0XN1CsjjHgeZCvCTMmv3BHlLiT/Hzy4fe8H+S1tr484dcXN/PIdnfDA"
        );

        let json = serde_json::to_value(&keys).unwrap();
        assert_eq!(json["self_signing_keys"]["@alice:localhost"]["usage"], json!(["self_signing"]));
        assert_eq!(
            json["master_keys"]["@alice:localhost"],
            json!({
                "keys": { master_key_id.clone(): MASTER_KEY },
                "user_id": "@alice:localhost",
                "usage": ["master"],
            })
        );

        let master_public_key = Ed25519PublicKey::from_base64(MASTER_KEY).unwrap();
        verify_json(
            &json["user_signing_keys"]["@alice:localhost"],
            user_id,
            MASTER_KEY,
            &master_public_key,
        )
        .unwrap();
    }

    #[test]
    fn alternate_master_key() {
        let user = UserData::alice();
        let alt_master = KeySeed::new(*b"DoYouSpeakWhaaaaaaaaaaaaaaaaaale");
        let keys = build_cross_signing_keys(&user, &alt_master).unwrap();
        let user_id = user_id!("@alice:localhost");

        let alt_master_key = keys.master_keys[user_id].public_key().unwrap().to_owned();
        assert_ne!(alt_master_key, MASTER_KEY);

        let self_signing = &keys.self_signing_keys[user_id];
        assert_eq!(self_signing.public_key(), Some(SELF_SIGNING_KEY));
        assert_eq!(
            self_signing
                .signatures
                .get_signature(user_id, &format!("ed25519:{alt_master_key}"))
                .unwrap()
                .to_base64(),
            "GaCz0siQ//vRvFiBFWe7x6w7XWYfwz0Y77pxawmi8hLaCrqr+SBo4umnfoE3ktb5xsE6M4HFwSN7PmNNiqVbDw"
        );
    }

    #[test]
    fn signed_one_time_key() {
        let user = UserData::alice();
        let one_time_keys = sign_one_time_key(&user).unwrap();

        assert_eq!(
            serde_json::to_value(one_time_keys).unwrap(),
            json!({
                "@alice:localhost": {
                    "test_device": {
                        "signed_curve25519:AAAAHQ": {
                            "key": "j3fR3HemM16M7CWhoI4Sk5ZsdmdfQHsKL1xuSft6MSw",
                            "signatures": {
                                "@alice:localhost": {
                                    "ed25519:test_device": "25djC6Rk6gIgFBMVawY9X9LnY8XMMziey6lKqL8Q5Bbp7T1vw9uk0RE7eKO2a/jNLcYroO2xRztGhBrKz5sOCQ",
                                },
                            },
                        },
                    },
                },
            })
        );
    }

    #[test]
    fn signed_backup_info() {
        let user = UserData::alice();
        let info = sign_backup_info(&user, &user.backup_key().unwrap(), "1").unwrap();

        assert_eq!(
            serde_json::to_value(info).unwrap(),
            json!({
                "algorithm": "m.megolm_backup.v1.curve25519-aes-sha2",
                "version": "1",
                "auth_data": {
                    "public_key": "hSDwCYkwp1R0i33ctD73Wg2/Og0mOBr066SpjqqbTmo",
                    "signatures": {
                        "@alice:localhost": {
                            "ed25519:test_device": "KDSNeumirTsd8piI0oVfv/wzg4J4HlEc7rs5XhODFcJ/YAcUdg65ajsZG+rLI0TQOSSGjorJqcrSiSB1HRSCAA",
                        },
                    },
                },
            })
        );
    }

    #[test]
    fn generation_is_deterministic() {
        let user = UserData::alice();
        let settings = FixtureSettings::default();

        let first = serde_json::to_value(generate_test_data(&user, &settings).unwrap()).unwrap();
        let second = serde_json::to_value(generate_test_data(&user, &settings).unwrap()).unwrap();
        assert_eq!(first, second);

        let other_seed = FixtureSettings { seed: 11, ..Default::default() };
        let third = serde_json::to_value(generate_test_data(&user, &other_seed).unwrap()).unwrap();

        assert_eq!(first["signed_device_data"], third["signed_device_data"]);
        assert_ne!(first["megolm_session_data"], third["megolm_session_data"]);
    }

    #[test]
    fn generated_fixtures_are_consistent() {
        let user = UserData::alice();
        let test_data = generate_test_data(&user, &FixtureSettings::default()).unwrap();

        assert_eq!(test_data.device_public_ed25519_key, "YI/7vbGVLpGdYtuceQR8MSsKB/QjgfMXM1xqnn+0NWU");
        assert_eq!(test_data.master_cross_signing_public_key, MASTER_KEY);
        assert_eq!(test_data.self_cross_signing_public_key, SELF_SIGNING_KEY);
        assert_eq!(test_data.user_cross_signing_public_key, USER_SIGNING_KEY);
        assert_eq!(
            test_data.backup_decryption_key_base58,
            "EsTc LW2K PGiF wKEA 3As5 g5c4 BXwk qeeJ ZJV8 Q9fu gUMN UE4d"
        );
        assert!(test_data.alt_signed_cross_signing_keys.is_none());

        assert_eq!(test_data.megolm_session_data_array.len(), 2);
        assert_ne!(
            test_data.megolm_session_data_array[0].session_id,
            test_data.megolm_session_data_array[1].session_id
        );

        let session = &test_data.megolm_session_data;
        let ratcheted = &test_data.ratcheted_megolm_session_data;
        assert_eq!(session.first_known_index(), 0);
        assert_eq!(ratcheted.first_known_index(), 1);
        assert_eq!(ratcheted.session_id, session.session_id);
        assert_eq!(session.sender_key, "WimPd2udAU/1S/+YBpPbmr9L+0H5H+BnAVHSwDxlPGc");

        let backup_key = user.backup_key().unwrap();
        let backed_up = &test_data.curve25519_key_backup_data;
        assert_eq!(backed_up.first_message_index, 0);
        assert_eq!(&backup_key.decrypt_session_data(&backed_up.session_data).unwrap(), session);

        let event = &test_data.encrypted_event;
        assert_eq!(event.event_type, "m.room.encrypted");
        assert_eq!(event.event_id, "$event1");
        assert_eq!(event.origin_server_ts, 1_507_753_886_000);
        assert_eq!(event.content.device_id, user.device_id);

        let payload = decrypt_event(&event.content, session).unwrap();
        assert_eq!(payload, test_data.clear_event.payload());

        assert_matches!(
            decrypt_event(&event.content, ratcheted),
            Err(EventDecryptionError::UnknownMessageIndex { expected: 1, got: 0 })
        );
    }

    #[test]
    fn legacy_backup_mac() {
        let user = UserData::bob();
        let settings =
            FixtureSettings { backup_mac_scope: BackupMacScope::LegacyEmpty, ..Default::default() };
        let test_data = generate_test_data(&user, &settings).unwrap();

        let backup_key = user.backup_key().unwrap();
        let session_data = &test_data.curve25519_key_backup_data.session_data;

        assert!(backup_key.decrypt_session_data(session_data).is_err());
        assert_eq!(
            backup_key
                .with_mac_scope(BackupMacScope::LegacyEmpty)
                .decrypt_session_data(session_data)
                .unwrap(),
            test_data.megolm_session_data
        );
    }

    #[test]
    fn bob_has_an_alternate_cross_signing_set() {
        let test_data = generate_test_data(&UserData::bob(), &FixtureSettings::default()).unwrap();

        assert_eq!(
            test_data.backup_decryption_key_base58,
            "EsT5 Sd5m mEXs NQYE ibRe 3q9E 4aXW rHih 5f9J 6rU6 AfwY mASR"
        );

        let alt = test_data.alt_signed_cross_signing_keys.as_ref().unwrap();
        let user_id = user_id!("@bob:xyz");
        assert_ne!(
            alt.master_keys[user_id].public_key(),
            test_data.signed_cross_signing_keys.master_keys[user_id].public_key()
        );
        assert_eq!(
            alt.self_signing_keys[user_id].public_key(),
            test_data.signed_cross_signing_keys.self_signing_keys[user_id].public_key()
        );

        let json = serde_json::to_value(&test_data).unwrap();
        assert!(json.get("alt_signed_cross_signing_keys").is_some());
        assert!(
            serde_json::to_value(
                generate_test_data(&UserData::alice(), &FixtureSettings::default()).unwrap()
            )
            .unwrap()
            .get("alt_signed_cross_signing_keys")
            .is_none()
        );
    }

    #[test]
    fn user_data_from_json() {
        let json = serde_json::to_value(UserData::bob()).unwrap();
        assert_eq!(json["device_ed25519_seed"], "RGVhZGJlZWZkZWFkYmVlZmRlYWRiZWVmZGVhZGJlZWY");

        let user: UserData = serde_json::from_value(json).unwrap();
        assert_eq!(user.device_ed25519_seed, UserData::bob().device_ed25519_seed);
        assert_eq!(user.alt_master_key_seed, UserData::bob().alt_master_key_seed);

        let settings: FixtureSettings = serde_json::from_value(json!({ "seed": 3 })).unwrap();
        assert_eq!(settings, FixtureSettings { seed: 3, ..Default::default() });

        let invalid = json!({ "seed": "AAAA" });
        assert!(serde_json::from_value::<FixtureSettings>(invalid).is_err());
        assert!(serde_json::from_value::<KeySeed>(json!("AAAA")).is_err());
    }

    #[test]
    fn vodozemac_imports_the_exports() {
        use vodozemac::megolm::{ExportedSessionKey, InboundGroupSession, SessionConfig};

        let test_data =
            generate_test_data(&UserData::alice(), &FixtureSettings::default()).unwrap();

        for session in test_data
            .megolm_session_data_array
            .iter()
            .chain([&test_data.megolm_session_data, &test_data.ratcheted_megolm_session_data])
        {
            let export = ExportedSessionKey::from_base64(&session.session_key.to_base64()).unwrap();
            let inbound = InboundGroupSession::import(&export, SessionConfig::version_1());

            assert_eq!(inbound.session_id(), session.session_id);
            assert_eq!(inbound.first_known_index(), session.first_known_index());
        }
    }
}
