//! Capability and mutation bit flags for the getblocktemplate protocol.
//!
//! BIP22/BIP23 identify client capabilities and template mutation permissions
//! by name on the wire. Both share a single bit table here, so one mask can
//! carry either "what the client advertises" or "what the server permits".
//! Bit positions are fixed; they are part of the wire-compatibility surface
//! exercised by tests.

use core::ops::{BitAnd, BitOr, BitOrAssign};

/// A set of getblocktemplate capability/mutation bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities(u32);

/// Length of the longest registered capability name ("transactions/add").
///
/// Callers sizing fixed name buffers may rely on this bound.
pub const LONGEST_CAPABILITY_NAME: usize = 16;

impl Capabilities {
    /// The empty set.
    pub const NONE: Capabilities = Capabilities(0);

    /// Server may serve a `coinbasetxn` instead of `coinbasevalue`.
    pub const CBTXN: Capabilities = Capabilities(1 << 0);
    /// Server-assigned work ids are echoed back on submission.
    pub const WORKID: Capabilities = Capabilities(1 << 1);
    /// Long polling (BIP22).
    pub const LONGPOLL: Capabilities = Capabilities(1 << 2);
    /// Coinbase scriptSig may be appended to.
    pub const CBAPPEND: Capabilities = Capabilities(1 << 3);
    /// Coinbase transaction may be replaced outright.
    pub const CBSET: Capabilities = Capabilities(1 << 4);
    /// Generation (coinbase outputs) may be modified.
    pub const GENERATE: Capabilities = Capabilities(1 << 5);
    /// Block time may be incremented.
    pub const TIMEINC: Capabilities = Capabilities(1 << 6);
    /// Block time may be decremented.
    pub const TIMEDEC: Capabilities = Capabilities(1 << 7);
    /// Transactions may be added to the block.
    pub const TXNADD: Capabilities = Capabilities(1 << 8);
    /// The previous-block hash may be changed (new blocks reuse the template).
    pub const PREVBLOCK: Capabilities = Capabilities(1 << 9);
    /// Block proposals (BIP23).
    pub const PROPOSAL: Capabilities = Capabilities(1 << 10);
    /// Logical service discovery (BIP23).
    pub const SERVICE: Capabilities = Capabilities(1 << 11);
    /// Block version may be forced even outside the understood range.
    pub const VERFORCE: Capabilities = Capabilities(1 << 12);
    /// Block version may be reduced to one the client understands.
    pub const VERDROP: Capabilities = Capabilities(1 << 13);
    /// Solved blocks may be submitted as just the header and txid list.
    pub const SUBMIT_HASH: Capabilities = Capabilities(1 << 14);
    /// Solved blocks may be submitted as the header and coinbase alone.
    pub const SUBMIT_COINBASE: Capabilities = Capabilities(1 << 15);
    /// Solved-block submissions may truncate unchanged trailing data.
    pub const SUBMIT_TRUNCATE: Capabilities = Capabilities(1 << 16);

    /// Capabilities a freshly created template advertises as supported.
    pub const DEFAULT_SUPPORT: Capabilities = Capabilities(
        Self::CBTXN.0
            | Self::WORKID.0
            | Self::TIMEINC.0
            | Self::CBAPPEND.0
            | Self::VERFORCE.0
            | Self::VERDROP.0
            | Self::SUBMIT_COINBASE.0
            | Self::SUBMIT_TRUNCATE.0,
    );

    /// Construct from a raw bit mask.
    pub const fn from_bits(bits: u32) -> Capabilities {
        Capabilities(bits)
    }

    /// The raw bit mask.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether no bits are set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether every bit of `other` is set in `self`.
    pub const fn contains(self, other: Capabilities) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set every bit of `other`.
    pub fn insert(&mut self, other: Capabilities) {
        self.0 |= other.0;
    }

    /// The canonical protocol name for exactly one set bit.
    ///
    /// Returns `None` for unknown/reserved bits and for masks with zero or
    /// more than one bit set.
    pub fn name(self) -> Option<&'static str> {
        NAMES
            .iter()
            .find(|(bit, _)| bit.0 == self.0)
            .map(|(_, name)| *name)
    }

    /// The bit for a capability name; exact inverse of [`Capabilities::name`].
    pub fn from_name(name: &str) -> Option<Capabilities> {
        NAMES
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(bit, _)| *bit)
    }

    /// Names of all registered bits set in this mask, in bit order.
    ///
    /// Bits without a registered name are skipped.
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        NAMES
            .iter()
            .filter(move |(bit, _)| self.contains(*bit))
            .map(|(_, name)| *name)
    }
}

impl BitOr for Capabilities {
    type Output = Capabilities;

    fn bitor(self, rhs: Capabilities) -> Capabilities {
        Capabilities(self.0 | rhs.0)
    }
}

impl BitOrAssign for Capabilities {
    fn bitor_assign(&mut self, rhs: Capabilities) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Capabilities {
    type Output = Capabilities;

    fn bitand(self, rhs: Capabilities) -> Capabilities {
        Capabilities(self.0 & rhs.0)
    }
}

/// Registered bit/name pairs, in bit order.
const NAMES: &[(Capabilities, &str)] = &[
    (Capabilities::CBTXN, "coinbasetxn"),
    (Capabilities::WORKID, "workid"),
    (Capabilities::LONGPOLL, "longpoll"),
    (Capabilities::CBAPPEND, "coinbase/append"),
    (Capabilities::CBSET, "coinbase"),
    (Capabilities::GENERATE, "generation"),
    (Capabilities::TIMEINC, "time/increment"),
    (Capabilities::TIMEDEC, "time/decrement"),
    (Capabilities::TXNADD, "transactions/add"),
    (Capabilities::PREVBLOCK, "prevblock"),
    (Capabilities::PROPOSAL, "proposal"),
    (Capabilities::SERVICE, "serverlist"),
    (Capabilities::VERFORCE, "version/force"),
    (Capabilities::VERDROP, "version/reduce"),
    (Capabilities::SUBMIT_HASH, "submit/hash"),
    (Capabilities::SUBMIT_COINBASE, "submit/coinbase"),
    (Capabilities::SUBMIT_TRUNCATE, "submit/truncate"),
];

/// Expand a `mutable` array token into its mutation bits.
///
/// Most tokens are registry names mapping to their own bit; a few shorthand
/// tokens expand to a combination. Only the listed bits are set; implied
/// permissions are deliberately not derived.
pub fn mutation_flags(token: &str) -> Option<Capabilities> {
    match token {
        "time" => Some(Capabilities::TIMEINC | Capabilities::TIMEDEC),
        "transactions" => Some(Capabilities::TXNADD),
        _ => Capabilities::from_name(token),
    }
}
