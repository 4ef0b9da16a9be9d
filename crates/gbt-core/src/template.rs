//! The in-memory block template model and its lifecycle.

use crate::capabilities::Capabilities;
use crate::transaction::Transaction;

/// A BIP9 deployment advertised through `vbavailable`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionBit {
    /// Rule name as served, any `!` marker preserved.
    pub name: String,
    /// Bit position within the block version field (0..=28).
    pub bit: u8,
}

/// A BIP22 long-poll descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongPoll {
    /// Opaque server-assigned long-poll id.
    pub id: String,
    /// Endpoint to poll; absent means the original request's endpoint.
    pub uri: Option<String>,
}

/// A getblocktemplate response, parsed and validated.
///
/// Created empty via [`BlockTemplate::new`], populated by
/// [`BlockTemplate::ingest`], and owned exclusively by one caller. Dropping
/// it releases every owned buffer, including after a failed or partial
/// ingestion.
#[derive(Debug, Clone)]
pub struct BlockTemplate {
    /// Block version field.
    pub version: u32,
    /// Height of the block being built.
    pub height: u32,
    /// Current server time.
    pub curtime: u32,
    /// Compact difficulty target in little-endian wire byte order.
    pub diffbits: [u8; 4],
    /// Previous block hash as 8 little-endian words in consensus byte order.
    /// Only the low 7 words are meaningful; word 7 is always zero.
    pub prev_block_hash: [u32; 8],
    /// Coinbase reward available, in satoshis.
    pub coinbase_value: u64,

    /// Maximum signature operations permitted in the block.
    pub sigop_limit: u32,
    /// Maximum block size in bytes.
    pub size_limit: u32,

    /// Seconds the template stays valid after receipt.
    pub expires: u32,
    /// Earliest acceptable block time.
    pub mintime: u32,
    /// Latest acceptable block time.
    pub maxtime: u32,
    /// Largest permitted negative offset from `curtime`.
    pub mintimeoff: i32,
    /// Largest permitted positive offset from `curtime`.
    pub maxtimeoff: i32,

    /// Non-coinbase transactions, in server (dependency) order.
    pub transactions: Vec<Transaction>,
    /// Server-provided coinbase transaction, if any.
    pub coinbase_txn: Option<Transaction>,
    /// Coinbase auxiliary buffers, insertion order preserved.
    pub aux_data: Vec<(String, Vec<u8>)>,
    /// Opaque server work id, echoed back on submission.
    pub workid: Option<String>,

    /// BIP23 proposal-mode target, 8 big-endian words in display order.
    /// Present only when the server supplied `target`.
    pub target: Option<[u32; 8]>,
    /// Mutations the server permits.
    pub mutations: Capabilities,

    /// Rule names declared active, server order, `!` markers preserved.
    /// `None` exactly when the server omitted the field.
    pub rules: Option<Vec<String>>,
    /// First declared rule (marker stripped) this client does not support.
    pub unsupported_rule: Option<String>,
    /// BIP9 deployments available for signaling, insertion order preserved.
    pub version_bits_available: Option<Vec<VersionBit>>,
    /// BIP9 version bits the server requires set.
    pub version_bits_required: u32,

    /// Whether work on the old template may still be submitted during a
    /// long poll. True unless the server explicitly said otherwise.
    pub submit_old: bool,
    /// Long-poll descriptor, if the server offered one.
    pub long_poll: Option<LongPoll>,

    /// Capabilities this client advertises when requesting templates.
    pub capabilities: Capabilities,
    /// Caller-supplied wall-clock timestamp recorded at ingestion.
    pub time_received: u64,
}

impl BlockTemplate {
    /// Consensus minimum sigop allowance assumed when the server is silent.
    pub const DEFAULT_SIGOP_LIMIT: u32 = 20_000;
    /// Consensus minimum block size assumed when the server is silent.
    pub const DEFAULT_SIZE_LIMIT: u32 = 1_000_000;
    /// Template validity window assumed when the server is silent, seconds.
    pub const DEFAULT_EXPIRES: u32 = 0x7fff;
    /// Time offset bound assumed when the server is silent, seconds.
    pub const DEFAULT_TIME_OFFSET: i32 = 0x7fff;

    /// A zero-valued template with sane limits and the default capability set.
    ///
    /// The limit and time-window defaults are applied eagerly, so a template
    /// that is never ingested still reports a usable validity window.
    pub fn new() -> Self {
        BlockTemplate {
            version: 0,
            height: 0,
            curtime: 0,
            diffbits: [0; 4],
            prev_block_hash: [0; 8],
            coinbase_value: 0,
            sigop_limit: Self::DEFAULT_SIGOP_LIMIT,
            size_limit: Self::DEFAULT_SIZE_LIMIT,
            expires: Self::DEFAULT_EXPIRES,
            mintime: 0,
            maxtime: u32::MAX,
            mintimeoff: -Self::DEFAULT_TIME_OFFSET,
            maxtimeoff: Self::DEFAULT_TIME_OFFSET,
            transactions: Vec::new(),
            coinbase_txn: None,
            aux_data: Vec::new(),
            workid: None,
            target: None,
            mutations: Capabilities::NONE,
            rules: None,
            unsupported_rule: None,
            version_bits_available: None,
            version_bits_required: 0,
            submit_old: true,
            long_poll: None,
            capabilities: Capabilities::DEFAULT_SUPPORT,
            time_received: 0,
        }
    }

    /// Number of non-coinbase transactions.
    pub fn txn_count(&self) -> usize {
        self.transactions.len()
    }

    /// Total serialized size of the non-coinbase transactions.
    pub fn txns_size(&self) -> usize {
        self.transactions.iter().map(|txn| txn.size()).sum()
    }

    /// Sum of the server-declared sigop counts, where declared.
    pub fn txns_sigops(&self) -> i64 {
        self.transactions
            .iter()
            .filter_map(|txn| txn.sigops)
            .map(i64::from)
            .sum()
    }

    /// Sum of the server-declared fees, where declared.
    pub fn txns_fees(&self) -> i64 {
        self.transactions.iter().filter_map(|txn| txn.fee).sum()
    }
}

impl Default for BlockTemplate {
    fn default() -> Self {
        Self::new()
    }
}
