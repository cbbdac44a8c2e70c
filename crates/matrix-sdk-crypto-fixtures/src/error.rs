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

use ruma::CanonicalJsonError;
use serde_json::Error as SerdeError;
use thiserror::Error;

/// Error type describing a JSON value that can't be turned into canonical
/// JSON.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// The provided JSON value isn't an object.
    #[error("the provided JSON value isn't an object")]
    NotAnObject,

    /// The object contains a value that has no canonical form, for example a
    /// floating point number or an integer outside of the allowed range.
    #[error(transparent)]
    Value(#[from] CanonicalJsonError),

    /// The value couldn't be serialized into JSON in the first place.
    #[error(transparent)]
    Json(#[from] SerdeError),
}

/// Error type for the verification of signed JSON objects.
#[derive(Error, Debug)]
pub enum SignatureError {
    /// The signed object couldn't be canonicalized.
    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),

    /// The `signatures` object doesn't contain a signature for the given user
    /// and key ID.
    #[error("the signing key is missing from the object that signed the message")]
    NoSignatureFound,

    /// The signature couldn't be decoded.
    #[error("the signature couldn't be decoded: {0}")]
    InvalidSignature(#[from] vodozemac::SignatureError),

    /// The signature didn't match the canonical form of the object.
    #[error("the signature didn't match the provided key")]
    VerificationError,
}

/// Error type for keys that couldn't be decoded from their transport format.
#[derive(Error, Debug)]
pub enum KeyError {
    /// The key wasn't valid base64.
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),

    /// The key had an invalid length.
    #[error("the key has an invalid length: expected {expected}, got {got}")]
    Length {
        /// The expected length of the key.
        expected: usize,
        /// The length of the key that was provided.
        got: usize,
    },

    /// The bytes don't form a valid public key.
    #[error(transparent)]
    Invalid(#[from] vodozemac::KeyError),
}

/// HKDF was asked to produce more output than it is able to.
#[derive(Error, Debug, PartialEq, Eq)]
#[error("HKDF-SHA-256 can't expand to {requested} bytes, the maximum is {maximum}")]
pub struct DerivationError {
    /// The number of bytes that were requested.
    pub requested: usize,
    /// The maximal number of bytes HKDF-SHA-256 can produce.
    pub maximum: usize,
}

/// Error type for exported megolm session keys that couldn't be decoded.
#[derive(Error, Debug)]
pub enum MalformedExportError {
    /// The session key wasn't valid base64.
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),

    /// The session key had an invalid length.
    #[error("the exported session key has an invalid length: expected {expected}, got {got}")]
    Length {
        /// The expected length of the export.
        expected: usize,
        /// The length of the export that was provided.
        got: usize,
    },

    /// The session key has an unsupported version.
    #[error("the exported session key has an unsupported version: expected {expected}, got {got}")]
    Version {
        /// The version this codec understands.
        expected: u8,
        /// The version byte that was found.
        got: u8,
    },

    /// The ratchet can't be advanced any further.
    #[error("the ratchet index {0} can't be advanced any further")]
    IndexOverflow(u32),
}

/// Error type for the encryption of a room key for the key backup.
#[derive(Error, Debug)]
pub enum EnvelopeError {
    /// The room key couldn't be converted into canonical JSON.
    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),

    /// The encryption keys couldn't be derived.
    #[error(transparent)]
    Derivation(#[from] DerivationError),
}

/// Error type for the decryption of a backed up room key.
#[derive(Error, Debug)]
pub enum BackupDecryptionError {
    /// One of the base64 encoded fields of the backup couldn't be decoded.
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),

    /// The ephemeral key of the backup isn't a valid Curve25519 key.
    #[error(transparent)]
    Key(#[from] KeyError),

    /// The encryption keys couldn't be derived.
    #[error(transparent)]
    Derivation(#[from] DerivationError),

    /// The MAC of the backed up room key didn't match.
    #[error("the MAC of the backed up room key didn't match")]
    Authentication,

    /// The ciphertext had invalid padding after decryption.
    #[error("the decrypted room key had invalid padding")]
    Padding,

    /// The decrypted room key isn't a valid session export.
    #[error(transparent)]
    Json(#[from] SerdeError),
}

/// Error type for the encryption of a room event.
#[derive(Error, Debug)]
pub enum EventEncryptionError {
    /// The event payload couldn't be converted into canonical JSON.
    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),

    /// The encryption keys couldn't be derived.
    #[error(transparent)]
    Derivation(#[from] DerivationError),

    /// The signing key doesn't belong to the exported session.
    #[error("the signing key {0} doesn't belong to the exported session")]
    SigningKeyMismatch(String),
}

/// The check that failed when an encrypted event was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TamperedPart {
    /// The Ed25519 signature of the message.
    Signature,
    /// The truncated HMAC of the message.
    Mac,
}

/// Error type for the decryption of a room event.
#[derive(Error, Debug)]
pub enum EventDecryptionError {
    /// The ciphertext wasn't valid base64.
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),

    /// The encrypted message has an invalid structure.
    #[error("the encrypted message is malformed: {0}")]
    Malformed(&'static str),

    /// The encrypted message has an unsupported version.
    #[error("the encrypted message has an unsupported version: {0}")]
    Version(u8),

    /// The encryption keys couldn't be derived.
    #[error(transparent)]
    Derivation(#[from] DerivationError),

    /// The event wasn't encrypted by the sender and session we know about.
    #[error("the event was encrypted by an unknown sender {sender_key} with session {session_id}")]
    UnknownSender {
        /// The Curve25519 key of the sender, as found in the event.
        sender_key: String,
        /// The megolm session ID, as found in the event.
        session_id: String,
    },

    /// The signature or the MAC of the message didn't verify.
    #[error("the encrypted message has been tampered with, the {0:?} check failed")]
    TamperedCiphertext(TamperedPart),

    /// The message was encrypted at a different ratchet index than the one
    /// of our room key.
    #[error("the message was encrypted at index {got}, our room key is at index {expected}")]
    UnknownMessageIndex {
        /// The index of the room key we have.
        expected: u32,
        /// The index the message was encrypted at.
        got: u32,
    },

    /// The decrypted plaintext had invalid padding.
    #[error("the decrypted message had invalid padding")]
    Padding,

    /// The decrypted plaintext isn't a valid event payload.
    #[error(transparent)]
    Json(#[from] SerdeError),
}

/// Error type describing why a recovery key couldn't be imported.
#[derive(Error, Debug)]
pub enum InvalidRecoveryKeyError {
    /// The decoded recovery key has an invalid prefix.
    #[error("the decoded recovery key has an invalid prefix: expected {0:?}, got {1:?}")]
    Prefix([u8; 2], [u8; 2]),

    /// The parity byte doesn't match the rest of the key.
    #[error("the parity byte of the recovery key doesn't match: expected {0:?}, got {1:?}")]
    Parity(u8, u8),

    /// The decoded recovery key has an invalid length.
    #[error("the decoded recovery key has an invalid length: expected {0}, got {1}")]
    Length(usize, usize),

    /// The recovery key isn't valid base58.
    #[error(transparent)]
    Base58(#[from] bs58::decode::Error),
}

/// Error type for the assembly of a fixture set.
#[derive(Error, Debug)]
pub enum FixtureError {
    /// One of the configured keys is invalid.
    #[error(transparent)]
    Key(#[from] KeyError),

    /// An object couldn't be signed.
    #[error(transparent)]
    Signature(#[from] SignatureError),

    /// An object couldn't be canonicalized.
    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),

    /// A session export couldn't be created or ratcheted.
    #[error(transparent)]
    Export(#[from] MalformedExportError),

    /// The backup envelope couldn't be created.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    /// The room event couldn't be encrypted.
    #[error(transparent)]
    Event(#[from] EventEncryptionError),

    /// A fixture couldn't be converted into JSON.
    #[error(transparent)]
    Json(#[from] SerdeError),
}
