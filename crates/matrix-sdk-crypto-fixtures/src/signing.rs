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

//! Signing and verification of JSON objects following the Matrix [signing
//! algorithm].
//!
//! The `signatures` and `unsigned` fields of an object are not covered by
//! signatures. Instead of removing them from the caller's object and putting
//! them back afterwards, all the functions here work on a copy, the object
//! that gets passed in is never observed in a partially stripped state.
//!
//! [signing algorithm]: https://spec.matrix.org/v1.8/appendices/#signing-details

use ruma::{CanonicalJsonValue, UserId};
use serde::Serialize;
use serde_json::{Map, Value};
use vodozemac::{Ed25519PublicKey, Ed25519Signature};

use crate::{
    error::{CanonicalizationError, SignatureError},
    keys::SigningKey,
};

/// The algorithm prefix of the key IDs used for Ed25519 signatures.
pub const ED25519: &str = "ed25519";

/// Fields that don't take part in the signature of an object.
const UNSIGNED_FIELDS: [&str; 2] = ["signatures", "unsigned"];

/// Create the key ID of an Ed25519 key, e.g. `ed25519:DEVICEID`.
pub fn ed25519_key_id(key_name: &str) -> String {
    format!("{ED25519}:{key_name}")
}

/// Convert the given JSON object into its canonical form.
///
/// The `signatures` and `unsigned` fields are left out of the result. Keys
/// are sorted lexicographically and no insignificant white space is emitted.
pub fn canonicalize(value: &Value) -> Result<Vec<u8>, CanonicalizationError> {
    let object = value.as_object().ok_or(CanonicalizationError::NotAnObject)?;

    let signable: Map<String, Value> = object
        .iter()
        .filter(|(key, _)| !UNSIGNED_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let canonical_json = CanonicalJsonValue::try_from(Value::Object(signable))?;

    Ok(canonical_json.to_string().into_bytes())
}

/// Serialize the given value and convert it into canonical JSON.
pub fn canonicalize_serializable<T: Serialize>(
    value: &T,
) -> Result<Vec<u8>, CanonicalizationError> {
    canonicalize(&serde_json::to_value(value)?)
}

/// Sign the canonical JSON form of a serializable object.
///
/// Used for the typed objects in [`crate::types`], which keep their
/// signatures in a [`crate::types::Signatures`] map.
pub fn sign_serializable<T: Serialize>(
    value: &T,
    signing_key: &SigningKey,
) -> Result<Ed25519Signature, CanonicalizationError> {
    let canonical_json = canonicalize_serializable(value)?;
    Ok(signing_key.sign(&canonical_json))
}

/// Sign the canonical form of the given JSON object.
///
/// Returns the unpadded base64 encoded Ed25519 signature. The caller is
/// responsible for attaching the signature to the object, see
/// [`add_signature()`].
pub fn sign(value: &Value, signing_key: &SigningKey) -> Result<String, CanonicalizationError> {
    let canonical_json = canonicalize(value)?;
    Ok(signing_key.sign(&canonical_json).to_base64())
}

/// Attach a signature to the given JSON object under
/// `signatures[user_id]["ed25519:" + key_name]`.
pub fn add_signature(
    value: &mut Value,
    user_id: &UserId,
    key_name: &str,
    signature: String,
) -> Result<(), CanonicalizationError> {
    let object = value.as_object_mut().ok_or(CanonicalizationError::NotAnObject)?;

    let signatures = object
        .entry("signatures")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or(CanonicalizationError::NotAnObject)?;

    let user_signatures = signatures
        .entry(user_id.as_str())
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or(CanonicalizationError::NotAnObject)?;

    user_signatures.insert(ed25519_key_id(key_name), Value::String(signature));

    Ok(())
}

/// Sign the given JSON object and attach the signature to it.
pub fn sign_json(
    value: &mut Value,
    signing_key: &SigningKey,
    user_id: &UserId,
    key_name: &str,
) -> Result<(), CanonicalizationError> {
    let signature = sign(value, signing_key)?;
    add_signature(value, user_id, key_name, signature)
}

/// Check a detached signature of the given JSON object.
///
/// The object may already carry `signatures` and `unsigned` fields, they are
/// ignored. Returns `false` if the signature doesn't decode, doesn't match or
/// if the object has no canonical form.
pub fn verify(value: &Value, public_key: &Ed25519PublicKey, signature: &str) -> bool {
    let Ok(signature) = Ed25519Signature::from_base64(signature) else {
        return false;
    };

    canonicalize(value)
        .map(|canonical_json| public_key.verify(&canonical_json, &signature).is_ok())
        .unwrap_or(false)
}

/// Verify a signed JSON object.
///
/// The object must have a `signatures` field associated with an object of
/// the form `user_id: {key_id: signature}`.
///
/// # Arguments
///
/// * `user_id` - The user who signed the JSON object.
///
/// * `key_name` - The name of the key that signed the object, the part of the
///   key ID after the `ed25519:` prefix.
///
/// * `public_key` - The public Ed25519 key which was used to sign the object.
///
/// * `value` - The JSON object that should be verified.
pub fn verify_json(
    value: &Value,
    user_id: &UserId,
    key_name: &str,
    public_key: &Ed25519PublicKey,
) -> Result<(), SignatureError> {
    let object = value.as_object().ok_or(CanonicalizationError::NotAnObject)?;

    let signature = object
        .get("signatures")
        .and_then(|s| s.get(user_id.as_str()))
        .and_then(|s| s.get(ed25519_key_id(key_name)))
        .and_then(Value::as_str)
        .ok_or(SignatureError::NoSignatureFound)?;

    let signature = Ed25519Signature::from_base64(signature)?;
    let canonical_json = canonicalize(value)?;

    public_key
        .verify(&canonical_json, &signature)
        .map_err(|_| SignatureError::VerificationError)
}
