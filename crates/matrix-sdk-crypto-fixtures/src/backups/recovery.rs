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

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::BackupDecryptionKey;
use crate::{error::InvalidRecoveryKeyError, utilities};

/// A backup decryption key in the [recovery key] format that is shown to
/// users.
///
/// [recovery key]: https://spec.matrix.org/v1.8/client-server-api/#recovery-key
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct RecoveryKey {
    key: [u8; RecoveryKey::KEY_SIZE],
}

impl TryFrom<String> for RecoveryKey {
    type Error = InvalidRecoveryKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_base58(&value)
    }
}

impl std::fmt::Display for RecoveryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let string = Zeroizing::new(self.to_base58());

        let string = Zeroizing::new(
            string
                .chars()
                .collect::<Vec<char>>()
                .chunks(Self::DISPLAY_CHUNK_SIZE)
                .map(|c| c.iter().collect::<String>())
                .collect::<Vec<_>>()
                .join(" "),
        );

        write!(f, "{}", string.as_str())
    }
}

#[cfg(not(tarpaulin_include))]
impl std::fmt::Debug for RecoveryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryKey").finish_non_exhaustive()
    }
}

impl RecoveryKey {
    const KEY_SIZE: usize = 32;
    const PREFIX: [u8; 2] = [0x8b, 0x01];
    const PREFIX_PARITY: u8 = Self::PREFIX[0] ^ Self::PREFIX[1];
    const DECODED_SIZE: usize = Self::PREFIX.len() + Self::KEY_SIZE + 1;
    const DISPLAY_CHUNK_SIZE: usize = 4;

    fn parity_byte(bytes: &[u8]) -> u8 {
        bytes.iter().fold(Self::PREFIX_PARITY, |acc, x| acc ^ x)
    }

    /// Wrap the given raw private key.
    pub fn from_bytes(key: &[u8; Self::KEY_SIZE]) -> Self {
        Self { key: *key }
    }

    /// The raw private key.
    pub fn as_bytes(&self) -> &[u8; Self::KEY_SIZE] {
        &self.key
    }

    /// The unpadded base64 encoded private key.
    pub fn to_base64(&self) -> String {
        utilities::encode(self.key)
    }

    /// Import a recovery key.
    ///
    /// White space anywhere in the string is ignored, the decoded bytes must
    /// carry the right prefix and parity byte.
    pub fn from_base58(value: &str) -> Result<Self, InvalidRecoveryKeyError> {
        // Remove any whitespace we might have
        let value: Zeroizing<String> =
            Zeroizing::new(value.chars().filter(|c| !c.is_whitespace()).collect());

        let decoded = Zeroizing::new(
            bs58::decode(value.as_str()).with_alphabet(bs58::Alphabet::BITCOIN).into_vec()?,
        );

        if decoded.len() != Self::DECODED_SIZE {
            return Err(InvalidRecoveryKeyError::Length(Self::DECODED_SIZE, decoded.len()));
        }

        let mut prefix = [0u8; 2];
        prefix.copy_from_slice(&decoded[..2]);

        let mut key = [0u8; Self::KEY_SIZE];
        key.copy_from_slice(&decoded[2..2 + Self::KEY_SIZE]);

        let expected_parity = decoded[Self::DECODED_SIZE - 1];
        let parity = Self::parity_byte(key.as_ref());

        let recovery_key = Self { key };
        key.zeroize();

        if prefix != Self::PREFIX {
            Err(InvalidRecoveryKeyError::Prefix(Self::PREFIX, prefix))
        } else if expected_parity != parity {
            Err(InvalidRecoveryKeyError::Parity(expected_parity, parity))
        } else {
            Ok(recovery_key)
        }
    }

    /// Encode the key as base58, without the grouping the [`Display`]
    /// implementation adds.
    ///
    /// [`Display`]: std::fmt::Display
    pub fn to_base58(&self) -> String {
        let bytes = Zeroizing::new(
            [
                Self::PREFIX.as_ref(),
                self.key.as_ref(),
                [Self::parity_byte(self.key.as_ref())].as_ref(),
            ]
            .concat(),
        );

        bs58::encode(bytes.as_slice()).with_alphabet(bs58::Alphabet::BITCOIN).into_string()
    }

    /// The backup decryption key this recovery key encodes.
    pub fn decryption_key(&self) -> BackupDecryptionKey {
        BackupDecryptionKey::from_bytes(&self.key)
    }
}
