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

//! HKDF-SHA-256 key derivation and the parameters the Matrix protocols use
//! it with.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::{ciphers::AesHmacSha2CbcKey, error::DerivationError};

/// The largest output HKDF-SHA-256 can produce, 255 times the hash length.
pub const MAX_OUTPUT_LENGTH: usize = 255 * 32;

/// The salt both the key backup and megolm use, 32 zero bytes.
pub const ZERO_SALT: [u8; 32] = [0u8; 32];

/// The HKDF info used to derive the keys of a megolm message.
pub const MEGOLM_KEYS_INFO: &[u8] = b"MEGOLM_KEYS";

/// The HKDF info used to derive the keys of a backed up room key.
pub const BACKUP_KEYS_INFO: &[u8] = b"";

/// The number of bytes needed for an AES-256 key, a HMAC-SHA-256 key and an
/// AES initialization vector.
pub const AES_HMAC_KEY_MATERIAL_LENGTH: usize = 80;

/// Run HKDF-SHA-256 over the given secret and produce `length` bytes of key
/// material.
pub fn hkdf_sha256(
    secret: &[u8],
    salt: &[u8],
    info: &[u8],
    length: usize,
) -> Result<Zeroizing<Vec<u8>>, DerivationError> {
    let error = || DerivationError { requested: length, maximum: MAX_OUTPUT_LENGTH };

    if length > MAX_OUTPUT_LENGTH {
        return Err(error());
    }

    let hkdf = Hkdf::<Sha256>::new(Some(salt), secret);
    let mut output = Zeroizing::new(vec![0u8; length]);

    hkdf.expand(info, &mut output).map_err(|_| error())?;

    Ok(output)
}

/// Expand the given secret into an AES-256 key, a HMAC-SHA-256 key and an
/// initialization vector.
///
/// The salt is always [`ZERO_SALT`], the `info` picks the protocol the keys
/// are used for.
pub(crate) fn expand_aes_hmac_keys(
    secret: &[u8],
    info: &[u8],
) -> Result<AesHmacSha2CbcKey, DerivationError> {
    let expanded = hkdf_sha256(secret, &ZERO_SALT, info, AES_HMAC_KEY_MATERIAL_LENGTH)?;

    let mut key_material = Zeroizing::new([0u8; AES_HMAC_KEY_MATERIAL_LENGTH]);
    key_material.copy_from_slice(&expanded);

    Ok(AesHmacSha2CbcKey::from_key_material(&key_material))
}
