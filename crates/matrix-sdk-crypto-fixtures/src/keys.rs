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

//! The two kinds of private keys the fixtures are built from.
//!
//! Every private key in a fixture set is a plain 32 byte value: Ed25519 keys
//! are created from a seed, Curve25519 keys from the scalar bytes. Both key
//! types implement [`KeyMaterial`], which is all the codecs need to know about
//! a key besides its algorithm specific operation.

use rand::{CryptoRng, RngCore};
use vodozemac::{Curve25519PublicKey, Ed25519PublicKey, Ed25519SecretKey, Ed25519Signature};
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::{error::KeyError, utilities};

/// The size of every private key this crate deals with.
pub const KEY_SIZE: usize = 32;

/// The capabilities shared by the private key types.
pub trait KeyMaterial {
    /// The public half of the key.
    type PublicKey;

    /// The raw bytes of the private key.
    fn raw_bytes(&self) -> &[u8; KEY_SIZE];

    /// Derive the public half of the key.
    fn derive_public(&self) -> Self::PublicKey;

    /// The public half of the key, encoded as unpadded base64.
    fn public_key_base64(&self) -> String;

    /// The private key, encoded as unpadded base64.
    fn to_base64(&self) -> String {
        utilities::encode(self.raw_bytes())
    }
}

fn key_from_base64(input: &str) -> Result<Zeroizing<[u8; KEY_SIZE]>, KeyError> {
    let decoded = Zeroizing::new(utilities::decode(input)?);

    if decoded.len() != KEY_SIZE {
        Err(KeyError::Length { expected: KEY_SIZE, got: decoded.len() })
    } else {
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        key.copy_from_slice(&decoded);

        Ok(key)
    }
}

fn random_key<R: RngCore + CryptoRng>(rng: &mut R) -> Zeroizing<[u8; KEY_SIZE]> {
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    rng.fill_bytes(key.as_mut_slice());

    key
}

/// An Ed25519 key pair, created from a 32 byte seed.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SigningKey {
    seed: Box<[u8; KEY_SIZE]>,
    #[zeroize(skip)]
    secret_key: Ed25519SecretKey,
    #[zeroize(skip)]
    public_key: Ed25519PublicKey,
}

impl SigningKey {
    /// Create a signing key from the given seed.
    ///
    /// Any 32 byte string is a valid Ed25519 seed.
    pub fn from_seed(seed: &[u8; KEY_SIZE]) -> Self {
        let secret_key = Ed25519SecretKey::from_slice(seed);
        let public_key = secret_key.public_key();

        Self { seed: Box::new(*seed), secret_key, public_key }
    }

    /// Create a signing key from a base64 encoded seed.
    pub fn from_base64(seed: &str) -> Result<Self, KeyError> {
        let seed = key_from_base64(seed)?;
        Ok(Self::from_seed(&seed))
    }

    /// Create a signing key from a seed drawn from the given random source.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self::from_seed(&random_key(rng))
    }

    /// The public half of this key pair.
    pub fn public_key(&self) -> Ed25519PublicKey {
        self.public_key
    }

    /// Sign the given message.
    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        self.secret_key.sign(message)
    }
}

impl KeyMaterial for SigningKey {
    type PublicKey = Ed25519PublicKey;

    fn raw_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.seed
    }

    fn derive_public(&self) -> Ed25519PublicKey {
        self.public_key
    }

    fn public_key_base64(&self) -> String {
        self.public_key.to_base64()
    }
}

impl Clone for SigningKey {
    fn clone(&self) -> Self {
        Self::from_seed(&self.seed)
    }
}

impl PartialEq for SigningKey {
    fn eq(&self, other: &Self) -> bool {
        self.public_key == other.public_key
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey").field("public_key", &self.public_key.to_base64()).finish()
    }
}

/// A Curve25519 key pair used for Diffie-Hellman key agreement.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ExchangeKey {
    secret: Box<[u8; KEY_SIZE]>,
    #[zeroize(skip)]
    secret_key: StaticSecret,
    #[zeroize(skip)]
    public_key: Curve25519PublicKey,
}

impl ExchangeKey {
    /// Create a key pair from the given private key bytes.
    ///
    /// Any 32 byte string is a valid Curve25519 private key, the clamping
    /// happens when the key is used.
    pub fn from_bytes(secret: &[u8; KEY_SIZE]) -> Self {
        let secret_key = StaticSecret::from(*secret);
        let public_key = X25519PublicKey::from(&secret_key);
        let public_key = Curve25519PublicKey::from_bytes(public_key.to_bytes());

        Self { secret: Box::new(*secret), secret_key, public_key }
    }

    /// Create a key pair from a base64 encoded private key, padded or not.
    pub fn from_base64(secret: &str) -> Result<Self, KeyError> {
        let secret = key_from_base64(secret)?;
        Ok(Self::from_bytes(&secret))
    }

    /// Create a key pair from private key bytes drawn from the given random
    /// source.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self::from_bytes(&random_key(rng))
    }

    /// The public half of this key pair.
    pub fn public_key(&self) -> Curve25519PublicKey {
        self.public_key
    }

    /// Perform an ECDH key agreement with the given public key.
    pub fn diffie_hellman(&self, their_key: &Curve25519PublicKey) -> Zeroizing<[u8; KEY_SIZE]> {
        let their_key = X25519PublicKey::from(their_key.to_bytes());
        let shared_secret = self.secret_key.diffie_hellman(&their_key);

        Zeroizing::new(shared_secret.to_bytes())
    }
}

impl KeyMaterial for ExchangeKey {
    type PublicKey = Curve25519PublicKey;

    fn raw_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.secret
    }

    fn derive_public(&self) -> Curve25519PublicKey {
        self.public_key
    }

    fn public_key_base64(&self) -> String {
        self.public_key.to_base64()
    }
}

impl Clone for ExchangeKey {
    fn clone(&self) -> Self {
        Self::from_bytes(&self.secret)
    }
}

impl PartialEq for ExchangeKey {
    fn eq(&self, other: &Self) -> bool {
        self.public_key == other.public_key
    }
}

impl std::fmt::Debug for ExchangeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeKey").field("public_key", &self.public_key.to_base64()).finish()
    }
}
