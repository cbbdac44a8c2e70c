// Copyright 2021, 2022 The Matrix.org Foundation C.I.C.
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

//! Server-side backup support for room keys
//!
//! This module implements the envelope of the
//! `m.megolm_backup.v1.curve25519-aes-sha2` backup algorithm and the recovery
//! key format of the backup decryption key.
//!
//! A room key is encrypted for the backup in the following way:
//!
//! 1. An ephemeral Curve25519 key is generated and a shared secret is
//!    calculated with the public backup key.
//! 2. HKDF-SHA-256, with a salt of 32 zero bytes and an empty info, expands
//!    the shared secret into an AES key, a MAC key and an IV.
//! 3. The canonical JSON form of the room key is encrypted using AES-CBC-256
//!    with PKCS#7 padding.
//! 4. HMAC-SHA-256 is calculated with the MAC key, the first 8 bytes are the
//!    MAC of the envelope. See [`BackupMacScope`] for the input of the MAC.

mod keys;
mod recovery;

pub use keys::{BackupDecryptionKey, BackupMacScope, MegolmV1BackupKey};
pub use recovery::RecoveryKey;
