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

use aes::{
    cipher::{
        block_padding::{Pkcs7, UnpadError},
        generic_array::GenericArray,
        BlockDecryptMut, BlockEncryptMut, KeyIvInit,
    },
    Aes256,
};
use hmac::{digest::MacError, Hmac, Mac as _};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub(crate) const KEY_SIZE: usize = 32;
pub(crate) const IV_SIZE: usize = 16;
pub(crate) const MAC_SIZE: usize = 32;

/// The number of MAC bytes that the key backup and megolm messages keep.
pub(crate) const TRUNCATED_MAC_SIZE: usize = 8;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// An authentication tag for the HMAC-SHA-256 message authentication algorithm.
#[derive(Debug)]
pub(crate) struct HmacSha256Mac([u8; MAC_SIZE]);

impl HmacSha256Mac {
    /// The first 8 bytes of the tag, the part that ends up on the wire.
    pub(crate) fn truncated(&self) -> [u8; TRUNCATED_MAC_SIZE] {
        let mut truncated = [0u8; TRUNCATED_MAC_SIZE];
        truncated.copy_from_slice(&self.0[..TRUNCATED_MAC_SIZE]);

        truncated
    }
}

/// Keys used for our combination of AES-CBC-256 and HMAC-SHA-256.
///
/// ⚠️  This struct provides low-level cryptographic primitives.
///
/// The keys are always expanded from a shared secret using HKDF, the 80 bytes
/// of output are split into the AES key, the MAC key and the initialization
/// vector. This combination is used in the following places:
///
/// 1. Megolm messages[1]
/// 2. The `m.megolm_backup.v1.curve25519-aes-sha2` key backup[2]
///
/// [1]: https://gitlab.matrix.org/matrix-org/olm/blob/master/docs/megolm.md#encryption
/// [2]: https://spec.matrix.org/v1.8/client-server-api/#backup-algorithm-mmegolm_backupv1curve25519-aes-sha2
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct AesHmacSha2CbcKey {
    aes_key: Box<[u8; KEY_SIZE]>,
    mac_key: Box<[u8; KEY_SIZE]>,
    iv: Box<[u8; IV_SIZE]>,
}

impl AesHmacSha2CbcKey {
    /// Split 80 bytes of key material into an AES key, a MAC key and an IV,
    /// in that order.
    pub(crate) fn from_key_material(key_material: &[u8; KEY_SIZE * 2 + IV_SIZE]) -> Self {
        let mut aes_key = Box::new([0u8; KEY_SIZE]);
        let mut mac_key = Box::new([0u8; KEY_SIZE]);
        let mut iv = Box::new([0u8; IV_SIZE]);

        aes_key.copy_from_slice(&key_material[0..32]);
        mac_key.copy_from_slice(&key_material[32..64]);
        iv.copy_from_slice(&key_material[64..80]);

        Self { aes_key, mac_key, iv }
    }

    /// Encrypt the given plaintext using AES-256 in CBC mode with PKCS#7
    /// padding.
    ///
    /// ⚠️  This method is a low-level cryptographic primitive.
    ///
    /// The method does not provide authenticity. You *must* call the
    /// [`AesHmacSha2CbcKey::create_mac_tag()`] method after the encryption
    /// step to create a authentication tag.
    pub(crate) fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        let cipher = Aes256CbcEnc::new(self.aes_key(), self.iv());
        cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext)
    }

    /// Create an authentication tag for the given message.
    pub(crate) fn create_mac_tag(&self, message: &[u8]) -> HmacSha256Mac {
        let mut hmac = self.hmac();
        hmac.update(message);

        HmacSha256Mac(hmac.finalize().into_bytes().into())
    }

    /// Verify a truncated authentication tag for the given message.
    ///
    /// The comparison is done in constant time. An empty tag never verifies.
    ///
    /// This method *must* be called before a call to
    /// [`AesHmacSha2CbcKey::decrypt()`].
    pub(crate) fn verify_truncated_mac(&self, message: &[u8], tag: &[u8]) -> Result<(), MacError> {
        let mut hmac = self.hmac();
        hmac.update(message);
        hmac.verify_truncated_left(tag)
    }

    /// Decrypt the given ciphertext and strip the padding.
    ///
    /// The method does not provide authenticity. You *must* call the
    /// [`AesHmacSha2CbcKey::verify_truncated_mac()`] method before the
    /// decryption step.
    pub(crate) fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, UnpadError> {
        let cipher = Aes256CbcDec::new(self.aes_key(), self.iv());
        cipher.decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
    }

    fn hmac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(self.mac_key.as_slice())
            .expect("We should be able to create a new HMAC object from our 32 byte MAC key")
    }

    fn aes_key(&self) -> &GenericArray<u8, <Aes256CbcEnc as aes::cipher::KeySizeUser>::KeySize> {
        GenericArray::from_slice(self.aes_key.as_slice())
    }

    fn iv(&self) -> &GenericArray<u8, <Aes256CbcEnc as aes::cipher::IvSizeUser>::IvSize> {
        GenericArray::from_slice(self.iv.as_slice())
    }
}

impl std::fmt::Debug for AesHmacSha2CbcKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesHmacSha2CbcKey").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> AesHmacSha2CbcKey {
        let mut material = [0u8; 80];
        material.iter_mut().enumerate().for_each(|(i, b)| *b = i as u8);

        AesHmacSha2CbcKey::from_key_material(&material)
    }

    #[test]
    fn encryption_roundtrip() {
        let plaintext = "It's a secret to everybody";
        let key = key();

        let ciphertext = key.encrypt(plaintext.as_bytes());
        assert_eq!(ciphertext.len() % 16, 0, "The ciphertext should be padded to the block size");

        let mac = key.create_mac_tag(&ciphertext);
        key.verify_truncated_mac(&ciphertext, &mac.truncated())
            .expect("The MAC tag should be successfully verified");

        let decrypted = key.decrypt(&ciphertext).unwrap();
        assert_eq!(
            plaintext.as_bytes(),
            decrypted,
            "An encryption roundtrip should produce the same plaintext"
        );
    }

    #[test]
    fn full_block_gets_an_extra_padding_block() {
        let ciphertext = key().encrypt(&[0u8; 16]);
        assert_eq!(ciphertext.len(), 32);
    }

    #[test]
    fn mac_mismatch() {
        let key = key();
        let mac = key.create_mac_tag(b"message").truncated();

        key.verify_truncated_mac(b"message", &mac).unwrap();
        key.verify_truncated_mac(b"massage", &mac).unwrap_err();
        key.verify_truncated_mac(b"message", &[]).unwrap_err();
    }
}
