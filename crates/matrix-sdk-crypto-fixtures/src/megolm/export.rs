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

use byteorder::{BigEndian, ByteOrder};
use hmac::{Hmac, Mac as _};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::Sha256;
use tracing::trace;
use vodozemac::Ed25519PublicKey;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::{
    error::{KeyError, MalformedExportError},
    utilities,
};

/// The version byte of the session export format.
pub const SESSION_EXPORT_VERSION: u8 = 1;

/// The size of one of the four parts of the megolm ratchet.
pub const RATCHET_PART_SIZE: usize = 32;

/// The size of the whole megolm ratchet, R0 to R3.
pub const RATCHET_SIZE: usize = RATCHET_PART_SIZE * 4;

/// The size of a decoded session export.
pub const EXPORTED_SESSION_KEY_SIZE: usize = 1 + 4 + RATCHET_SIZE + 32;

/// The HMAC input that advances the last part of the ratchet by one step.
const ADVANCE_LAST_PART: [u8; 2] = [0x78, 0x03];

const INDEX_RANGE: std::ops::Range<usize> = 1..5;
const RATCHET_RANGE: std::ops::Range<usize> = 5..5 + RATCHET_SIZE;
const SIGNING_KEY_RANGE: std::ops::Range<usize> = 5 + RATCHET_SIZE..EXPORTED_SESSION_KEY_SIZE;

/// A megolm session in the [session export format].
///
/// The export contains the state of the ratchet at a given message index and
/// the public Ed25519 key that signs the messages of the session, it allows
/// decryption of every message from the index onwards.
///
/// [session export format]: https://gitlab.matrix.org/matrix-org/olm/blob/master/docs/megolm.md#session-export-format
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ExportedSessionKey {
    index: u32,
    ratchet: Box<[u8; RATCHET_SIZE]>,
    signing_key: [u8; 32],
}

impl ExportedSessionKey {
    /// Create an export from a ratchet state at the given index and the
    /// public signing key of the session.
    pub fn new(index: u32, ratchet: &[u8; RATCHET_SIZE], signing_key: &Ed25519PublicKey) -> Self {
        Self { index, ratchet: Box::new(*ratchet), signing_key: *signing_key.as_bytes() }
    }

    /// Create an export at index 0 with a ratchet state drawn from the given
    /// random source.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R, signing_key: &Ed25519PublicKey) -> Self {
        let mut ratchet = Zeroizing::new([0u8; RATCHET_SIZE]);
        rng.fill_bytes(ratchet.as_mut_slice());

        Self::new(0, &ratchet, signing_key)
    }

    /// The message index the ratchet is at.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The full ratchet state, R0 to R3.
    pub fn ratchet(&self) -> &[u8; RATCHET_SIZE] {
        &self.ratchet
    }

    /// The ratchet state split into its four parts.
    pub fn ratchet_parts(&self) -> [&[u8]; 4] {
        let r = self.ratchet.as_slice();
        [&r[0..32], &r[32..64], &r[64..96], &r[96..128]]
    }

    /// The raw bytes of the public signing key of the session.
    pub fn signing_key_bytes(&self) -> &[u8; 32] {
        &self.signing_key
    }

    /// The public signing key of the session.
    ///
    /// Fails if the bytes in the export aren't a valid Ed25519 point.
    pub fn signing_key(&self) -> Result<Ed25519PublicKey, KeyError> {
        Ok(Ed25519PublicKey::from_slice(&self.signing_key)?)
    }

    /// The ID of the session, the unpadded base64 form of the signing key.
    pub fn session_id(&self) -> String {
        utilities::encode(self.signing_key)
    }

    /// Encode the export into its 165 byte binary form.
    pub fn encode(&self) -> Zeroizing<Vec<u8>> {
        let mut bytes = Zeroizing::new(vec![0u8; EXPORTED_SESSION_KEY_SIZE]);

        bytes[0] = SESSION_EXPORT_VERSION;
        BigEndian::write_u32(&mut bytes[INDEX_RANGE], self.index);
        bytes[RATCHET_RANGE].copy_from_slice(self.ratchet.as_slice());
        bytes[SIGNING_KEY_RANGE].copy_from_slice(&self.signing_key);

        bytes
    }

    /// Decode an export from its binary form.
    pub fn decode(bytes: &[u8]) -> Result<Self, MalformedExportError> {
        if bytes.len() != EXPORTED_SESSION_KEY_SIZE {
            return Err(MalformedExportError::Length {
                expected: EXPORTED_SESSION_KEY_SIZE,
                got: bytes.len(),
            });
        }

        if bytes[0] != SESSION_EXPORT_VERSION {
            return Err(MalformedExportError::Version {
                expected: SESSION_EXPORT_VERSION,
                got: bytes[0],
            });
        }

        let index = BigEndian::read_u32(&bytes[INDEX_RANGE]);

        let mut ratchet = Box::new([0u8; RATCHET_SIZE]);
        ratchet.copy_from_slice(&bytes[RATCHET_RANGE]);

        let mut signing_key = [0u8; 32];
        signing_key.copy_from_slice(&bytes[SIGNING_KEY_RANGE]);

        Ok(Self { index, ratchet, signing_key })
    }

    /// Encode the export as unpadded base64, the form used in the
    /// `session_key` field of a room key export.
    pub fn to_base64(&self) -> String {
        utilities::encode(self.encode().as_slice())
    }

    /// Decode an export from its base64 form.
    pub fn from_base64(session_key: &str) -> Result<Self, MalformedExportError> {
        let bytes = Zeroizing::new(utilities::decode(session_key)?);
        Self::decode(&bytes)
    }

    /// Advance the ratchet by a single step.
    ///
    /// Only the last part of the ratchet moves, `R3' = HMAC-SHA-256(R3,
    /// [0x78, 0x03])`, R0 to R2 and the signing key are carried over and the
    /// index is incremented. The export this is called on stays untouched.
    pub fn ratchet_step(&self) -> Result<Self, MalformedExportError> {
        let index =
            self.index.checked_add(1).ok_or(MalformedExportError::IndexOverflow(self.index))?;

        let [_, _, _, last_part] = self.ratchet_parts();

        let mut hmac = Hmac::<Sha256>::new_from_slice(last_part)
            .expect("We should be able to create a new HMAC object from a 32 byte ratchet part");
        hmac.update(&ADVANCE_LAST_PART);
        let advanced = hmac.finalize().into_bytes();

        let mut ratchet = self.ratchet.clone();
        ratchet[RATCHET_PART_SIZE * 3..].copy_from_slice(&advanced);

        trace!(from = self.index, to = index, "Advanced the megolm ratchet");

        Ok(Self { index, ratchet, signing_key: self.signing_key })
    }
}

impl Serialize for ExportedSessionKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut encoded = self.to_base64();
        let result = serializer.serialize_str(&encoded);
        encoded.zeroize();

        result
    }
}

impl<'de> Deserialize<'de> for ExportedSessionKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut encoded = String::deserialize(deserializer)?;
        let result = Self::from_base64(&encoded).map_err(serde::de::Error::custom);
        encoded.zeroize();

        result
    }
}

#[cfg(not(tarpaulin_include))]
impl std::fmt::Debug for ExportedSessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportedSessionKey")
            .field("index", &self.index)
            .field("session_id", &self.session_id())
            .finish_non_exhaustive()
    }
}
