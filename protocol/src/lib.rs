// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Banklink Protocol Engine
//!
//! Baltic banks still move a surprising share of e-commerce money through
//! "banklinks": the merchant redirects the shopper's browser to the bank with
//! a signed form, and the bank redirects back (and usually pings the merchant
//! server directly) with a signed answer. Nothing travels server-to-server
//! on the way out, so every guarantee lives in the signatures.
//!
//! This crate is the part that has to be exactly right:
//!
//! - **codec**: canonical field orders and the `<3-digit length><value>`
//!   digest the signatures cover, plus form-body decoding per bank charset.
//! - **crypto**: RSA PKCS#1 v1.5 / SHA-1 signatures (IPizza), keyed MD5
//!   MACs (Nordea), PEM key loading and a key cache.
//! - **checksum**: the 7-3-1 reference number check digit.
//! - **registry**: immutable per-bank configuration.
//! - **record**: transaction and authentication records and their lifecycle.
//! - **storage**: store ports with atomic compare-and-set, in-memory and sled.
//! - **notify**: subscriber port for started/succeeded/failed events.
//! - **request**: builders for signed payment and authentication redirects.
//! - **callback**: validation and at-most-once handling of bank responses.
//! - **gateway**: the context object tying all of the above together.
//! - **simulator**: a bank-side signer for tests, demos and local hosts.
//!
//! ## Ground rules
//!
//! 1. A response that fails verification never touches persisted state.
//! 2. A record leaves `Pending` at most once, whatever the bank retries.
//! 3. Digest bytes are a wire format. Field order, padding and charset are
//!    fixed by the banks, not by us.

pub mod callback;
pub mod checksum;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod gateway;
pub mod notify;
pub mod record;
pub mod registry;
pub mod request;
pub mod simulator;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_support;

pub use callback::{AuthOutcome, CallbackReply, PaymentCallback, ProtocolMessage};
pub use codec::{Encoding, FieldMap, LengthMode, MessageType};
pub use error::{BanklinkError, Result};
pub use gateway::Gateway;
pub use notify::{BanklinkEvent, NotificationHub, Notifier};
pub use record::{Authentication, RecordKind, Status, Transaction};
pub use registry::{BankConfig, BankConfigRegistry, Protocol};
pub use request::{AuthRequest, AuthRequestBuilder, Language, PaymentRequest, PaymentRequestBuilder, RedirectForm};
