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

use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use vodozemac::Curve25519PublicKey;
use zeroize::Zeroizing;

use super::RecoveryKey;
use crate::{
    ciphers::TRUNCATED_MAC_SIZE,
    error::{BackupDecryptionError, EnvelopeError, KeyError},
    kdf::{expand_aes_hmac_keys, BACKUP_KEYS_INFO},
    keys::{ExchangeKey, KeyMaterial},
    signing::canonicalize_serializable,
    types::{
        EncryptedSessionData, KeyBackupData, MegolmSessionData, MegolmV1AuthData,
        MEGOLM_BACKUP_V1_CURVE25519_AES_SHA2,
    },
    utilities,
};

/// The input of the MAC of a backed up room key.
///
/// The Matrix specification says that the MAC is calculated over the raw
/// ciphertext. libolm, and every backup created with it, calculates the MAC
/// over an empty input instead. Both flavours can be produced and checked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupMacScope {
    /// The MAC covers the raw ciphertext.
    #[default]
    Ciphertext,
    /// The MAC is calculated over an empty message, as libolm does.
    LegacyEmpty,
}

impl BackupMacScope {
    fn mac_input<'a>(&self, ciphertext: &'a [u8]) -> &'a [u8] {
        match self {
            BackupMacScope::Ciphertext => ciphertext,
            BackupMacScope::LegacyEmpty => &[],
        }
    }
}

/// The public part of a backup key.
#[derive(Clone, PartialEq)]
pub struct MegolmV1BackupKey {
    key: Curve25519PublicKey,
    mac_scope: BackupMacScope,
}

#[cfg(not(tarpaulin_include))]
impl std::fmt::Debug for MegolmV1BackupKey {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("MegolmV1BackupKey")
            .field("key", &self.to_base64())
            .field("mac_scope", &self.mac_scope)
            .finish()
    }
}

impl MegolmV1BackupKey {
    /// Create a backup key from a Curve25519 public key.
    pub fn new(key: Curve25519PublicKey) -> Self {
        Self { key, mac_scope: BackupMacScope::default() }
    }

    /// Pick the MAC input of the room keys this key encrypts.
    pub fn with_mac_scope(mut self, mac_scope: BackupMacScope) -> Self {
        self.mac_scope = mac_scope;
        self
    }

    /// Get the full name of the backup algorithm this backup key supports.
    pub fn backup_algorithm(&self) -> &str {
        MEGOLM_BACKUP_V1_CURVE25519_AES_SHA2
    }

    /// Try to create a new `MegolmV1BackupKey` from a base 64 encoded string.
    pub fn from_base64(public_key: &str) -> Result<Self, KeyError> {
        Ok(Self::new(Curve25519PublicKey::from_base64(public_key)?))
    }

    /// Convert the [`MegolmV1BackupKey`] to a base 64 encoded string.
    pub fn to_base64(&self) -> String {
        self.key.to_base64()
    }

    /// The Curve25519 public key.
    pub fn public_key(&self) -> Curve25519PublicKey {
        self.key
    }

    /// The MAC input of the room keys this key encrypts.
    pub fn mac_scope(&self) -> BackupMacScope {
        self.mac_scope
    }

    /// The unsigned auth data of a backup version using this key.
    pub fn auth_data(&self) -> MegolmV1AuthData {
        MegolmV1AuthData::new(self.key)
    }

    /// Encrypt a room key for the backup, using an ephemeral key drawn from
    /// the given random source.
    pub fn encrypt_session<R: RngCore + CryptoRng>(
        &self,
        session: &MegolmSessionData,
        rng: &mut R,
    ) -> Result<KeyBackupData, EnvelopeError> {
        let ephemeral = ExchangeKey::generate(rng);
        self.encrypt_session_with_ephemeral(session, &ephemeral)
    }

    /// Encrypt a room key for the backup, using the given ephemeral key.
    ///
    /// The envelope is a pure function of the room key, the backup key and
    /// the ephemeral key.
    #[instrument(skip_all, fields(session_id = %session.session_id, mac_scope = ?self.mac_scope))]
    pub fn encrypt_session_with_ephemeral(
        &self,
        session: &MegolmSessionData,
        ephemeral: &ExchangeKey,
    ) -> Result<KeyBackupData, EnvelopeError> {
        let shared_secret = ephemeral.diffie_hellman(&self.key);
        let keys = expand_aes_hmac_keys(shared_secret.as_slice(), BACKUP_KEYS_INFO)?;

        let plaintext = Zeroizing::new(canonicalize_serializable(session)?);
        let ciphertext = keys.encrypt(&plaintext);
        let mac = keys.create_mac_tag(self.mac_scope.mac_input(&ciphertext)).truncated();

        debug!(ciphertext_length = ciphertext.len(), "Encrypted a room key for the backup");

        Ok(KeyBackupData {
            first_message_index: session.first_known_index(),
            forwarded_count: 0,
            is_verified: false,
            session_data: EncryptedSessionData {
                ephemeral: ephemeral.public_key_base64(),
                ciphertext: utilities::encode(ciphertext),
                mac: utilities::encode(mac),
            },
        })
    }
}

/// The private part of a backup key, able to decrypt backed up room keys.
#[derive(Clone, PartialEq)]
pub struct BackupDecryptionKey {
    key: ExchangeKey,
    mac_scope: BackupMacScope,
}

#[cfg(not(tarpaulin_include))]
impl std::fmt::Debug for BackupDecryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupDecryptionKey")
            .field("public_key", &self.key.public_key_base64())
            .field("mac_scope", &self.mac_scope)
            .finish_non_exhaustive()
    }
}

impl BackupDecryptionKey {
    /// Create a decryption key from the given Curve25519 key pair.
    pub fn new(key: ExchangeKey) -> Self {
        Self { key, mac_scope: BackupMacScope::default() }
    }

    /// Create a decryption key from the raw private key bytes.
    pub fn from_bytes(key: &[u8; 32]) -> Self {
        Self::new(ExchangeKey::from_bytes(key))
    }

    /// Create a decryption key from a base64 encoded private key, padded or
    /// not.
    pub fn from_base64(key: &str) -> Result<Self, KeyError> {
        Ok(Self::new(ExchangeKey::from_base64(key)?))
    }

    /// Create a new random decryption key.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self::new(ExchangeKey::generate(rng))
    }

    /// Pick the MAC input that is expected when decrypting room keys.
    pub fn with_mac_scope(mut self, mac_scope: BackupMacScope) -> Self {
        self.mac_scope = mac_scope;
        self
    }

    /// The unpadded base64 encoded private key.
    pub fn to_base64(&self) -> String {
        self.key.to_base64()
    }

    /// The raw bytes of the private key.
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.key.raw_bytes()
    }

    /// The public half of the key, which encrypts room keys for the backup.
    pub fn megolm_v1_public_key(&self) -> MegolmV1BackupKey {
        MegolmV1BackupKey::new(self.key.public_key()).with_mac_scope(self.mac_scope)
    }

    /// The form of this key that is presented to users.
    pub fn to_recovery_key(&self) -> RecoveryKey {
        RecoveryKey::from_bytes(self.key.raw_bytes())
    }

    /// Decrypt a backed up room key.
    ///
    /// The MAC is checked before any decryption takes place.
    #[instrument(skip_all, fields(mac_scope = ?self.mac_scope))]
    pub fn decrypt_session_data(
        &self,
        session_data: &EncryptedSessionData,
    ) -> Result<MegolmSessionData, BackupDecryptionError> {
        let ephemeral =
            Curve25519PublicKey::from_base64(&session_data.ephemeral).map_err(KeyError::from)?;
        let ciphertext = utilities::decode(&session_data.ciphertext)?;
        let mac = utilities::decode(&session_data.mac)?;

        let shared_secret = self.key.diffie_hellman(&ephemeral);
        let keys = expand_aes_hmac_keys(shared_secret.as_slice(), BACKUP_KEYS_INFO)?;

        if mac.len() != TRUNCATED_MAC_SIZE
            || keys.verify_truncated_mac(self.mac_scope.mac_input(&ciphertext), &mac).is_err()
        {
            warn!("The MAC of the backed up room key didn't match");
            return Err(BackupDecryptionError::Authentication);
        }

        let plaintext = Zeroizing::new(
            keys.decrypt(&ciphertext).map_err(|_| BackupDecryptionError::Padding)?,
        );

        Ok(serde_json::from_slice(&plaintext)?)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use ruma::room_id;

    use super::{BackupDecryptionKey, BackupMacScope, MegolmV1BackupKey};
    use crate::{
        error::BackupDecryptionError,
        keys::{ExchangeKey, SigningKey},
        megolm::{ExportedSessionKey, RATCHET_SIZE},
        types::MegolmSessionData,
        utilities,
    };

    const BACKUP_KEY: &str = "dwdtCnMYpX08FsFyUbJmRd9ML4frwJkqsXf7pR25LCo=";
    const BACKUP_CIPHERTEXT: &str = concat!(
        "5ojUVXEGVaQ2DZsKQs+hW7Hz7WBFfk9j20Fu1aSDesXHLYejEK5BKneGR0cmwUpeLuYqupLIfeaAky2szFA6",
        "7FJc0oJfCv0gKcTGNEKIDQaMPjNtN2YItzChkY12HqaKIO9T5PRkRH8PGFAwcpFCZ+7jAcu8It2M/oqXckbd",
        "4i+EYExC8TlY8IjqRQZ4h8xKqP0a/QdtSjUzsoq3sL4SMo/NluauOzzR2xIphGqmQJCn03OaZiaMG8PoDrcc",
        "84l9/rAdd5VHhEIMSntroQ5q7MW421uymbqRXUbP5UpxuaAijxqKxXKJALSYMyhzHTLW6SXTbwjJvC49EFH+",
        "lsK9SHuIb11qISBwfcScu5PztxCX3eUZOHwGH5M49wdyAV9VrKX5/FmM2XZQDxvR3dMNwGez8GuC7eibp7SC",
        "Cf5om1lsvhqrOcPTWozwqJm6VeVuAp/CkpSYPHkqJsI3OE64rLlRfs5XulAZof1h5ubS3ZojSkvc/IxqCNR5",
        "4U0yglpWeRWR+5flclMzlQ06V9lzwnBCngYZHA4s5wdTxHAMPZTrYfFGVTBtsK3sIM7L2GewtXeuhmb2Ffri",
        "dQLrDFzaBi9XK+h4Zx/K4XSGv7X3bJsocNmwfyZJ3EQ8XJ9wi6LvgDfJPAT8JKDQ/rS8YqsARO7DItaHEZW8",
        "+2u6UIATYVhM87ou7lYbbCyGA6Wv8k1VPVPJ6h7OtltVUL/y6ezTPg",
    );

    fn session() -> MegolmSessionData {
        let mut ratchet = [0u8; RATCHET_SIZE];
        ratchet.iter_mut().enumerate().for_each(|(i, b)| *b = i as u8);
        let signing_key = SigningKey::from_seed(b"megolmmegolmmegolmmegolmmegolmme");

        MegolmSessionData::new(
            room_id!("!room:id").to_owned(),
            ExchangeKey::from_bytes(b"deadmuledeadmuledeadmuledeadmule").public_key(),
            ExportedSessionKey::new(0, &ratchet, &signing_key.public_key()),
            SigningKey::from_seed(b"deadbeefdeadbeefdeadbeefdeadbeef").public_key(),
        )
    }

    fn ephemeral() -> ExchangeKey {
        ExchangeKey::from_bytes(b"ephemeralephemeralephemeralephem")
    }

    #[test]
    fn golden_backup_envelope() {
        let decryption_key = BackupDecryptionKey::from_base64(BACKUP_KEY).unwrap();
        let backup_key = decryption_key.megolm_v1_public_key();

        assert_eq!(backup_key.to_base64(), "hSDwCYkwp1R0i33ctD73Wg2/Og0mOBr066SpjqqbTmo");

        let backed_up =
            backup_key.encrypt_session_with_ephemeral(&session(), &ephemeral()).unwrap();

        assert_eq!(backed_up.first_message_index, 0);
        assert_eq!(backed_up.forwarded_count, 0);
        assert!(!backed_up.is_verified);
        assert_eq!(
            backed_up.session_data.ephemeral,
            "0lri6EC4JpyVqrtkTkAYSsNPGtvC68ahg5Yb8BOLmFY"
        );
        assert_eq!(backed_up.session_data.ciphertext, BACKUP_CIPHERTEXT);
        assert_eq!(backed_up.session_data.mac, "2XTm0k/zBPc");

        let decrypted = decryption_key.decrypt_session_data(&backed_up.session_data).unwrap();
        assert_eq!(decrypted, session());
    }

    #[test]
    fn golden_legacy_backup_envelope() {
        let decryption_key = BackupDecryptionKey::from_base64(BACKUP_KEY)
            .unwrap()
            .with_mac_scope(BackupMacScope::LegacyEmpty);
        let backup_key = decryption_key.megolm_v1_public_key();

        let backed_up =
            backup_key.encrypt_session_with_ephemeral(&session(), &ephemeral()).unwrap();

        assert_eq!(backed_up.session_data.ciphertext, BACKUP_CIPHERTEXT);
        assert_eq!(backed_up.session_data.mac, "/d7cYL93h2k");
        assert_eq!(
            decryption_key.decrypt_session_data(&backed_up.session_data).unwrap(),
            session()
        );

        // A key expecting the MAC over the ciphertext rejects the legacy MAC.
        let strict = BackupDecryptionKey::from_base64(BACKUP_KEY).unwrap();
        assert_matches!(
            strict.decrypt_session_data(&backed_up.session_data),
            Err(BackupDecryptionError::Authentication)
        );
    }

    #[test]
    fn ratcheted_sessions_have_a_later_first_index() {
        let backup_key =
            BackupDecryptionKey::from_base64(BACKUP_KEY).unwrap().megolm_v1_public_key();
        let ratcheted = session().ratchet_step().unwrap();

        let backed_up = backup_key
            .encrypt_session(&ratcheted, &mut ChaCha20Rng::seed_from_u64(10))
            .unwrap();

        assert_eq!(backed_up.first_message_index, 1);
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let mut rng = ChaCha20Rng::seed_from_u64(10);
        let backup_key =
            BackupDecryptionKey::from_base64(BACKUP_KEY).unwrap().megolm_v1_public_key();
        let backed_up = backup_key.encrypt_session(&session(), &mut rng).unwrap();

        let other = BackupDecryptionKey::generate(&mut rng);

        assert_matches!(
            other.decrypt_session_data(&backed_up.session_data),
            Err(BackupDecryptionError::Authentication)
        );
    }

    #[test]
    fn malformed_envelopes() {
        let decryption_key = BackupDecryptionKey::from_base64(BACKUP_KEY).unwrap();
        let backed_up = decryption_key
            .megolm_v1_public_key()
            .encrypt_session_with_ephemeral(&session(), &ephemeral())
            .unwrap();

        let mut bad_ephemeral = backed_up.session_data.clone();
        bad_ephemeral.ephemeral = "AAAA".to_owned();
        assert_matches!(
            decryption_key.decrypt_session_data(&bad_ephemeral),
            Err(BackupDecryptionError::Key(_))
        );

        let mut bad_ciphertext = backed_up.session_data.clone();
        bad_ciphertext.ciphertext = "not base64!".to_owned();
        assert_matches!(
            decryption_key.decrypt_session_data(&bad_ciphertext),
            Err(BackupDecryptionError::Base64(_))
        );

        let mut empty_mac = backed_up.session_data;
        empty_mac.mac = String::new();
        assert_matches!(
            decryption_key.decrypt_session_data(&empty_mac),
            Err(BackupDecryptionError::Authentication)
        );
    }

    #[test]
    fn backup_key_from_base64() {
        let key = MegolmV1BackupKey::from_base64("hSDwCYkwp1R0i33ctD73Wg2/Og0mOBr066SpjqqbTmo")
            .unwrap();

        assert_eq!(key.backup_algorithm(), "m.megolm_backup.v1.curve25519-aes-sha2");
        assert_eq!(key.mac_scope(), BackupMacScope::Ciphertext);
        assert!(MegolmV1BackupKey::from_base64("AAAA").is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn decryption_inverts_encryption(seed in any::<u64>()) {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let decryption_key = BackupDecryptionKey::generate(&mut rng);
            let backup_key = decryption_key.megolm_v1_public_key();

            let backed_up = backup_key.encrypt_session(&session(), &mut rng).unwrap();
            let decrypted = decryption_key.decrypt_session_data(&backed_up.session_data).unwrap();

            prop_assert_eq!(decrypted, session());
        }

        #[test]
        fn flipped_bits_fail_authentication(
            bit in 0usize..(8 * 8 + 8 * 400),
            use_mac in any::<bool>(),
        ) {
            let decryption_key = BackupDecryptionKey::from_base64(BACKUP_KEY).unwrap();
            let backed_up = decryption_key
                .megolm_v1_public_key()
                .encrypt_session_with_ephemeral(&session(), &ephemeral())
                .unwrap();

            let mut session_data = backed_up.session_data;
            let field = if use_mac { &mut session_data.mac } else { &mut session_data.ciphertext };

            let mut bytes = utilities::decode(&*field).unwrap();
            let bit = bit % (bytes.len() * 8);
            bytes[bit / 8] ^= 1 << (bit % 8);
            *field = utilities::encode(bytes);

            let result = decryption_key.decrypt_session_data(&session_data);
            prop_assert!(matches!(result, Err(BackupDecryptionError::Authentication)));
        }
    }
}
