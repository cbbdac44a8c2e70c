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

//! The binary framing of a megolm message.
//!
//! ```text
//! +---------+------+--------------+------+-------------+------------+-----+-----------+
//! | version | 0x08 | varint index | 0x12 | varint len  | ciphertext | MAC | signature |
//! | 1 byte  |      |              |      |             | len bytes  | 8   | 64        |
//! +---------+------+--------------+------+-------------+------------+-----+-----------+
//! ```
//!
//! The two tagged fields are protobuf fields, an integer field with number 1
//! and a length delimited field with number 2. The MAC covers everything
//! before it, the signature covers everything before it including the MAC.

use crate::{ciphers::TRUNCATED_MAC_SIZE, error::EventDecryptionError, utilities};

/// The version byte of the megolm message format.
pub const MESSAGE_VERSION: u8 = 3;

/// The size of the Ed25519 signature at the end of a message.
pub const SIGNATURE_SIZE: usize = 64;

const INDEX_TAG: u8 = 0x08;
const CIPHERTEXT_TAG: u8 = 0x12;

/// Append `value` as a protobuf varint.
pub(crate) fn encode_varint(mut value: u64, output: &mut Vec<u8>) {
    while value >= 0x80 {
        output.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }

    output.push(value as u8);
}

/// Read a protobuf varint from the start of `input`, returning the value and
/// the number of bytes it occupied.
pub(crate) fn decode_varint(input: &[u8]) -> Option<(u64, usize)> {
    let mut value = 0u64;

    for (i, byte) in input.iter().enumerate().take(10) {
        value |= u64::from(byte & 0x7f) << (7 * i);

        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }

    None
}

/// A parsed megolm message.
#[derive(Clone, PartialEq, Eq)]
pub struct MegolmMessage {
    index: u32,
    ciphertext: Vec<u8>,
    mac: [u8; TRUNCATED_MAC_SIZE],
    signature: [u8; SIGNATURE_SIZE],
}

impl MegolmMessage {
    /// Encode the part of a message that the MAC authenticates.
    pub fn encode_frame(index: u32, ciphertext: &[u8]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(ciphertext.len() + 12);

        frame.push(MESSAGE_VERSION);
        frame.push(INDEX_TAG);
        encode_varint(index.into(), &mut frame);
        frame.push(CIPHERTEXT_TAG);
        encode_varint(ciphertext.len() as u64, &mut frame);
        frame.extend_from_slice(ciphertext);

        frame
    }

    /// Put a message together from its parts.
    pub fn new(
        index: u32,
        ciphertext: Vec<u8>,
        mac: [u8; TRUNCATED_MAC_SIZE],
        signature: [u8; SIGNATURE_SIZE],
    ) -> Self {
        Self { index, ciphertext, mac, signature }
    }

    /// The ratchet index the message was encrypted at.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The AES-256-CBC ciphertext of the message.
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// The truncated MAC of the message.
    pub fn mac(&self) -> &[u8; TRUNCATED_MAC_SIZE] {
        &self.mac
    }

    /// The raw Ed25519 signature of the message.
    pub fn signature(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.signature
    }

    /// The bytes the MAC is calculated over.
    pub fn frame(&self) -> Vec<u8> {
        Self::encode_frame(self.index, &self.ciphertext)
    }

    /// The bytes the signature is calculated over, the frame followed by the
    /// MAC.
    pub fn signed_part(&self) -> Vec<u8> {
        let mut bytes = self.frame();
        bytes.extend_from_slice(&self.mac);

        bytes
    }

    /// Encode the complete message.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.signed_part();
        bytes.extend_from_slice(&self.signature);

        bytes
    }

    /// Encode the complete message as unpadded base64.
    pub fn to_base64(&self) -> String {
        utilities::encode(self.to_bytes())
    }

    /// Parse a message from its binary form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EventDecryptionError> {
        let (&version, rest) =
            bytes.split_first().ok_or(EventDecryptionError::Malformed("the message is empty"))?;

        if version != MESSAGE_VERSION {
            return Err(EventDecryptionError::Version(version));
        }

        let trailer_size = TRUNCATED_MAC_SIZE + SIGNATURE_SIZE;

        if rest.len() < trailer_size {
            return Err(EventDecryptionError::Malformed("the message is too short"));
        }

        let (body, trailer) = rest.split_at(rest.len() - trailer_size);

        let body = expect_tag(body, INDEX_TAG)?;
        let (index, used) =
            decode_varint(body).ok_or(EventDecryptionError::Malformed("invalid message index"))?;
        let index = u32::try_from(index)
            .map_err(|_| EventDecryptionError::Malformed("the message index is too large"))?;

        let body = expect_tag(&body[used..], CIPHERTEXT_TAG)?;
        let (length, used) = decode_varint(body)
            .ok_or(EventDecryptionError::Malformed("invalid ciphertext length"))?;

        let ciphertext = &body[used..];

        if u64::try_from(ciphertext.len()).ok() != Some(length) {
            return Err(EventDecryptionError::Malformed(
                "the ciphertext length doesn't match the length prefix",
            ));
        }

        let (mac, signature) = trailer.split_at(TRUNCATED_MAC_SIZE);

        let mut message = Self {
            index,
            ciphertext: ciphertext.to_vec(),
            mac: [0u8; TRUNCATED_MAC_SIZE],
            signature: [0u8; SIGNATURE_SIZE],
        };
        message.mac.copy_from_slice(mac);
        message.signature.copy_from_slice(signature);

        Ok(message)
    }

    /// Parse a message from its base64 form.
    pub fn from_base64(message: &str) -> Result<Self, EventDecryptionError> {
        Self::from_bytes(&utilities::decode(message)?)
    }
}

fn expect_tag(input: &[u8], tag: u8) -> Result<&[u8], EventDecryptionError> {
    match input.split_first() {
        Some((&found, rest)) if found == tag => Ok(rest),
        Some(_) => Err(EventDecryptionError::Malformed("unexpected field tag")),
        None => Err(EventDecryptionError::Malformed("missing message field")),
    }
}

impl std::fmt::Debug for MegolmMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MegolmMessage")
            .field("index", &self.index)
            .field("ciphertext_length", &self.ciphertext.len())
            .finish_non_exhaustive()
    }
}
