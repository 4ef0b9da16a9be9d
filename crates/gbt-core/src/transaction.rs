//! Template transaction entities and raw-transaction decoding.

use core::ops::Range;

use crate::error::TransactionError;
use crate::hash::double_sha256;

/// One transaction slot of a block template.
///
/// `data` holds the exact bytes the server supplied. Declared metadata is kept
/// as served; `None` means the server said nothing, which is distinct from an
/// explicit zero or an empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    /// Raw serialized transaction bytes.
    pub data: Vec<u8>,
    /// Server-supplied txid in internal byte order (reversed from display hex).
    pub hash: Option<[u8; 32]>,
    /// 1-based indices of template transactions this one spends from.
    /// `None` means dependencies are unknown, not that there are none.
    pub depends: Option<Vec<u32>>,
    /// Fee in satoshis, if the server declared it.
    pub fee: Option<i64>,
    /// Signature-operation count, if the server declared it.
    pub sigops: Option<i32>,
    /// Whether the server requires this transaction to stay in the block.
    pub required: bool,
}

impl Transaction {
    /// The transaction id, in the byte order double-SHA256 produces
    /// (reversed relative to display hex).
    ///
    /// Uses the server-supplied hash when present, otherwise hashes `data`.
    pub fn txid(&self) -> [u8; 32] {
        match self.hash {
            Some(hash) => hash,
            None => double_sha256(&self.data),
        }
    }

    /// Serialized size in bytes, as served.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Structural summary of a decoded raw transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTransaction {
    /// Transaction version.
    pub version: u32,
    /// Number of inputs.
    pub input_count: u64,
    /// Number of outputs.
    pub output_count: u64,
    /// Byte range of the first input's scriptSig within the raw data.
    ///
    /// For a coinbase transaction this is the span a miner may edit.
    pub script_sig_range: Range<usize>,
    /// Whether the transaction carries segwit marker/flag and witness data.
    pub has_witness: bool,
    /// Lock time.
    pub lock_time: u32,
    /// Total serialized size in bytes.
    pub size: usize,
}

/// Walk a serialized transaction and validate its structure.
///
/// This checks framing only: field lengths, CompactSize canonicality, segwit
/// marker/flag pairing and the absence of trailing bytes. Script contents are
/// not interpreted.
pub fn decode_transaction(data: &[u8]) -> Result<DecodedTransaction, TransactionError> {
    let mut cur = Cursor::new(data);

    let version = cur.read_u32_le()?;

    let mut input_count = cur.read_compact_size()?;
    let mut has_witness = false;
    if input_count == 0 {
        // BIP144: zero input count is the segwit marker, followed by the flag
        if cur.read_u8()? != 0x01 {
            return Err(TransactionError::InvalidMarker);
        }
        has_witness = true;
        input_count = cur.read_compact_size()?;
    }

    let mut script_sig_range = 0..0;
    for i in 0..input_count {
        cur.skip(36)?; // previous outpoint
        let script_len = cur.read_compact_size()? as usize;
        let script_start = cur.pos;
        cur.skip(script_len)?;
        if i == 0 {
            script_sig_range = script_start..cur.pos;
        }
        cur.skip(4)?; // sequence
    }

    let output_count = cur.read_compact_size()?;
    for _ in 0..output_count {
        cur.skip(8)?; // value
        let script_len = cur.read_compact_size()? as usize;
        cur.skip(script_len)?;
    }

    if has_witness {
        for _ in 0..input_count {
            let stack_items = cur.read_compact_size()?;
            for _ in 0..stack_items {
                let item_len = cur.read_compact_size()? as usize;
                cur.skip(item_len)?;
            }
        }
    }

    let lock_time = cur.read_u32_le()?;

    let remaining = data.len() - cur.pos;
    if remaining > 0 {
        return Err(TransactionError::TrailingBytes(remaining));
    }

    Ok(DecodedTransaction {
        version,
        input_count,
        output_count,
        script_sig_range,
        has_witness,
        lock_time,
        size: data.len(),
    })
}

/// Byte reader over a transaction buffer.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Cursor { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], TransactionError> {
        if self.data.len() - self.pos < n {
            return Err(TransactionError::Truncated(self.pos));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn skip(&mut self, n: usize) -> Result<(), TransactionError> {
        self.take(n).map(|_| ())
    }

    fn read_u8(&mut self) -> Result<u8, TransactionError> {
        Ok(self.take(1)?[0])
    }

    fn read_u32_le(&mut self) -> Result<u32, TransactionError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a CompactSize, rejecting non-minimal encodings.
    fn read_compact_size(&mut self) -> Result<u64, TransactionError> {
        let start = self.pos;
        let first = self.read_u8()?;
        let value = match first {
            0..=0xfc => u64::from(first),
            0xfd => {
                let bytes = self.take(2)?;
                let v = u64::from(u16::from_le_bytes([bytes[0], bytes[1]]));
                if v < 0xfd {
                    return Err(TransactionError::NonCanonicalVarint(start));
                }
                v
            }
            0xfe => {
                let bytes = self.take(4)?;
                let v = u64::from(u32::from_le_bytes([
                    bytes[0], bytes[1], bytes[2], bytes[3],
                ]));
                if v <= u64::from(u16::MAX) {
                    return Err(TransactionError::NonCanonicalVarint(start));
                }
                v
            }
            0xff => {
                let bytes = self.take(8)?;
                let v = u64::from_le_bytes([
                    bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6],
                    bytes[7],
                ]);
                if v <= u64::from(u32::MAX) {
                    return Err(TransactionError::NonCanonicalVarint(start));
                }
                v
            }
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::reverse_bytes;

    // The genesis block's coinbase transaction.
    const GENESIS_COINBASE: &str = "01000000010000000000000000000000000000000000000000000000000000000000000000ffffffff4d04ffff001d0104455468652054696d65732030332f4a616e2f32303039204368616e63656c6c6f72206f6e206272696e6b206f66207365636f6e64206261696c6f757420666f722062616e6b73ffffffff0100f2052a01000000434104678afdb0fe5548271967f1a67130b7105cd6a828e03909a67962e0ea1f61deb649f6bc3f4cef38c4f35504e51ec112de5c384df7ba0b8d578a4c702b6bf11d5fac00000000";

    #[test]
    fn test_decode_genesis_coinbase() {
        let data = hex::decode(GENESIS_COINBASE).unwrap();
        let decoded = decode_transaction(&data).unwrap();

        assert_eq!(decoded.version, 1);
        assert_eq!(decoded.input_count, 1);
        assert_eq!(decoded.output_count, 1);
        assert!(!decoded.has_witness);
        assert_eq!(decoded.lock_time, 0);
        assert_eq!(decoded.size, data.len());
        // scriptSig starts after version(4) + count(1) + outpoint(36) + len(1)
        assert_eq!(decoded.script_sig_range, 42..42 + 0x4d);
    }

    #[test]
    fn test_txid_computed_from_data() {
        let data = hex::decode(GENESIS_COINBASE).unwrap();
        let txn = Transaction {
            data,
            ..Default::default()
        };

        let display = reverse_bytes(&txn.txid());
        assert_eq!(
            hex::encode(display),
            "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b"
        );
    }

    #[test]
    fn test_txid_prefers_server_hash() {
        let txn = Transaction {
            data: vec![1, 2, 3],
            hash: Some([0xab; 32]),
            ..Default::default()
        };
        assert_eq!(txn.txid(), [0xab; 32]);
    }

    #[test]
    fn test_decode_segwit_transaction() {
        let mut data = Vec::new();
        data.extend_from_slice(&1u32.to_le_bytes()); // version
        data.extend_from_slice(&[0x00, 0x01]); // marker + flag
        data.push(0x01); // one input
        data.extend_from_slice(&[0u8; 36]); // outpoint
        data.push(0x00); // empty scriptSig
        data.extend_from_slice(&[0xff; 4]); // sequence
        data.push(0x01); // one output
        data.extend_from_slice(&50u64.to_le_bytes()); // value
        data.extend_from_slice(&[0x01, 0x51]); // scriptPubKey: OP_TRUE
        data.extend_from_slice(&[0x01, 0x01, 0xab]); // one witness item
        data.extend_from_slice(&0u32.to_le_bytes()); // lock time

        let decoded = decode_transaction(&data).unwrap();
        assert!(decoded.has_witness);
        assert_eq!(decoded.input_count, 1);
        assert_eq!(decoded.output_count, 1);
        // version(4) + marker/flag(2) + count(1) + outpoint(36) + len(1)
        assert_eq!(decoded.script_sig_range, 44..44);
    }

    #[test]
    fn test_decode_bad_marker_flag() {
        let mut data = Vec::new();
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&[0x00, 0x02]); // flag must be 0x01
        assert_eq!(
            decode_transaction(&data),
            Err(TransactionError::InvalidMarker)
        );
    }

    #[test]
    fn test_decode_truncated() {
        let data = hex::decode(GENESIS_COINBASE).unwrap();
        let err = decode_transaction(&data[..data.len() - 1]).unwrap_err();
        assert!(matches!(err, TransactionError::Truncated(_)));
    }

    #[test]
    fn test_decode_trailing_bytes() {
        let mut data = hex::decode(GENESIS_COINBASE).unwrap();
        data.push(0x00);
        assert_eq!(
            decode_transaction(&data),
            Err(TransactionError::TrailingBytes(1))
        );
    }

    #[test]
    fn test_non_canonical_compact_size() {
        let mut data = Vec::new();
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&[0xfd, 0x01, 0x00]); // 1 encoded in 3 bytes
        assert_eq!(
            decode_transaction(&data),
            Err(TransactionError::NonCanonicalVarint(4))
        );
    }

    #[test]
    fn test_default_transaction_is_inert() {
        // Teardown of a never-populated value must be safe; ingestion error
        // paths drop partially built transactions.
        let txn = Transaction::default();
        assert!(txn.data.is_empty());
        assert_eq!(txn.hash, None);
        assert_eq!(txn.depends, None);
        assert_eq!(txn.fee, None);
        assert_eq!(txn.sigops, None);
        assert!(!txn.required);
        drop(txn);
    }
}
