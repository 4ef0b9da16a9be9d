//! Mining-side core of the Bitcoin getblocktemplate protocol (BIP22/23/9).
//!
//! This crate provides:
//! - Request building: the JSON-RPC body a miner sends to solicit a block
//!   template, encoding its capabilities and supported soft-fork rules
//! - Template ingestion: strict parsing and validation of the server's JSON
//!   response into a strongly-typed [`BlockTemplate`], including mutation
//!   permissions, BIP9 version-bits state and long-poll descriptors
//! - Transaction entities with a minimal raw-transaction structural decoder
//!
//! Transport, proof-of-work search and solved-block submission are out of
//! scope; the caller moves JSON in and out of this crate.

pub mod capabilities;
pub mod error;
pub mod hash;
mod ingest;
pub mod request;
pub mod rules;
pub mod template;
pub mod transaction;

pub use capabilities::{mutation_flags, Capabilities, LONGEST_CAPABILITY_NAME};
pub use error::{TemplateError, TransactionError};
pub use hash::double_sha256;
pub use request::{request, request_with_rules, MAX_BLOCK_VERSION};
pub use rules::SUPPORTED_RULES;
pub use template::{BlockTemplate, LongPoll, VersionBit};
pub use transaction::{decode_transaction, DecodedTransaction, Transaction};
