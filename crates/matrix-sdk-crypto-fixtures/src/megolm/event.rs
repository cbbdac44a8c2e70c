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

//! Encryption and decryption of room events with an exported megolm session.
//!
//! The message keys are derived from the complete ratchet state of the
//! export, so a message can only be produced and read at the exact index the
//! export is at.

use ruma::{DeviceId, EventEncryptionAlgorithm};
use tracing::{debug, instrument, trace, warn};
use vodozemac::Ed25519Signature;

use super::MegolmMessage;
use crate::{
    error::{EventDecryptionError, EventEncryptionError, TamperedPart},
    kdf::{expand_aes_hmac_keys, MEGOLM_KEYS_INFO},
    keys::SigningKey,
    signing::canonicalize_serializable,
    types::{ClearEvent, EventPayload, MegolmSessionData, MegolmV1EncryptedContent},
};

/// Encrypt the given event at the current index of the exported session.
///
/// The `signing_key` must be the private half of the session signing key
/// stored in the export.
#[instrument(
    skip_all,
    fields(
        session_id = %session.session_id,
        message_index = session.first_known_index(),
    )
)]
pub fn encrypt_event(
    event: &ClearEvent,
    session: &MegolmSessionData,
    signing_key: &SigningKey,
    device_id: &DeviceId,
) -> Result<MegolmV1EncryptedContent, EventEncryptionError> {
    let export = &session.session_key;

    if signing_key.public_key().as_bytes() != export.signing_key_bytes() {
        return Err(EventEncryptionError::SigningKeyMismatch(signing_key.public_key().to_base64()));
    }

    let plaintext = canonicalize_serializable(&event.payload())?;
    let keys = expand_aes_hmac_keys(export.ratchet(), MEGOLM_KEYS_INFO)?;

    let ciphertext = keys.encrypt(&plaintext);
    let frame = MegolmMessage::encode_frame(export.index(), &ciphertext);
    let mac = keys.create_mac_tag(&frame).truncated();

    let mut signed_part = frame;
    signed_part.extend_from_slice(&mac);
    let signature = signing_key.sign(&signed_part);

    let message = MegolmMessage::new(export.index(), ciphertext, mac, signature.to_bytes());

    debug!(ciphertext_length = message.ciphertext().len(), "Encrypted a room event");

    Ok(MegolmV1EncryptedContent {
        algorithm: EventEncryptionAlgorithm::MegolmV1AesSha2,
        sender_key: session.sender_key.clone(),
        ciphertext: message.to_base64(),
        session_id: session.session_id.clone(),
        device_id: device_id.to_owned(),
    })
}

/// Decrypt the content of an encrypted event with the given exported
/// session.
///
/// The checks run in a fixed order and the first failing one ends the
/// decryption: the session has to match the sender of the event, then the
/// signature of the message has to verify, the message has to be at the index
/// of the export and finally the MAC has to match. Only then is the
/// ciphertext decrypted.
#[instrument(
    skip_all,
    fields(
        session_id = %content.session_id,
        sender_key = %content.sender_key,
    )
)]
pub fn decrypt_event(
    content: &MegolmV1EncryptedContent,
    session: &MegolmSessionData,
) -> Result<EventPayload, EventDecryptionError> {
    let export = &session.session_key;

    let unknown_sender = || EventDecryptionError::UnknownSender {
        sender_key: content.sender_key.clone(),
        session_id: content.session_id.clone(),
    };

    if content.session_id != session.session_id
        || content.sender_key != session.sender_key
        || export.session_id() != session.session_id
    {
        return Err(unknown_sender());
    }

    let session_signing_key = export.signing_key().map_err(|_| unknown_sender())?;

    let message = MegolmMessage::from_base64(&content.ciphertext)?;

    let signature = Ed25519Signature::from_slice(message.signature())
        .map_err(|_| EventDecryptionError::TamperedCiphertext(TamperedPart::Signature))?;

    if session_signing_key.verify(&message.signed_part(), &signature).is_err() {
        warn!("The signature of the megolm message didn't verify");
        return Err(EventDecryptionError::TamperedCiphertext(TamperedPart::Signature));
    }

    let keys = expand_aes_hmac_keys(export.ratchet(), MEGOLM_KEYS_INFO)?;

    if keys.verify_truncated_mac(&message.frame(), message.mac()).is_err() {
        warn!("The MAC of the megolm message didn't match");
        return Err(EventDecryptionError::TamperedCiphertext(TamperedPart::Mac));
    }

    if message.index() != export.index() {
        return Err(EventDecryptionError::UnknownMessageIndex {
            expected: export.index(),
            got: message.index(),
        });
    }

    let plaintext =
        keys.decrypt(message.ciphertext()).map_err(|_| EventDecryptionError::Padding)?;

    trace!(message_index = message.index(), "Decrypted a room event");

    Ok(serde_json::from_slice(&plaintext)?)
}
