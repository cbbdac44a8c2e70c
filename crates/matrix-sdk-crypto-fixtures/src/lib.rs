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

#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![warn(missing_docs, missing_debug_implementations)]

pub mod backups;
mod ciphers;
mod error;
pub mod fixtures;
pub mod kdf;
pub mod keys;
pub mod megolm;
pub mod signing;
pub mod types;
pub mod utilities;

pub use error::{
    BackupDecryptionError, CanonicalizationError, DerivationError, EnvelopeError,
    EventDecryptionError, EventEncryptionError, FixtureError, InvalidRecoveryKeyError, KeyError,
    MalformedExportError, SignatureError, TamperedPart,
};
pub use fixtures::{generate_test_data, FixtureSettings, KeySeed, TestData, UserData};
pub use keys::{ExchangeKey, KeyMaterial, SigningKey};

// Enable tracing for tests in this crate
#[cfg(test)]
#[ctor::ctor]
fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .init();
}
