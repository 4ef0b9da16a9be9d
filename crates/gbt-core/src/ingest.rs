//! Ingestion of getblocktemplate JSON responses (BIP22/23/9).
//!
//! This is a strict structural validator over adversarial input: every field
//! constraint is enforced and the first violation aborts ingestion. It does
//! no semantic block validation (no proof-of-work or merkle checks).

use log::{debug, warn};
use serde_json::{Map, Value};

use crate::capabilities::mutation_flags;
use crate::error::TemplateError;
use crate::hash::reverse_bytes;
use crate::rules::rule_supported;
use crate::template::{BlockTemplate, LongPoll, VersionBit};
use crate::transaction::Transaction;

impl BlockTemplate {
    /// Populate this template from a getblocktemplate JSON response.
    ///
    /// `time_received` is the caller's wall-clock timestamp for the response;
    /// it is recorded, not interpreted. On error the template's state is
    /// unspecified and it must be discarded.
    pub fn ingest(&mut self, json: &Value, time_received: u64) -> Result<(), TemplateError> {
        let obj = json
            .as_object()
            .ok_or_else(|| TemplateError::invalid("template", "response is not a JSON object"))?;

        self.version = require_u32(obj, "version")?;
        self.height = require_u32(obj, "height")?;
        self.diffbits = decode_bits(obj)?;
        self.curtime = require_u32(obj, "curtime")?;
        self.prev_block_hash = decode_prev_block_hash(obj)?;
        self.coinbase_value = require_u64(obj, "coinbasevalue")?;

        if let Some(v) = optional_u32(obj, "sigoplimit")? {
            self.sigop_limit = v;
        }
        if let Some(v) = optional_u32(obj, "sizelimit")? {
            self.size_limit = v;
        }
        if let Some(v) = optional_u32(obj, "expires")? {
            self.expires = v;
        }
        if let Some(v) = optional_u32(obj, "maxtime")? {
            self.maxtime = v;
        }
        if let Some(v) = optional_u32(obj, "mintime")? {
            self.mintime = v;
        }
        if let Some(v) = optional_i32(obj, "maxtimeoff")? {
            self.maxtimeoff = v;
        }
        if let Some(v) = optional_i32(obj, "mintimeoff")? {
            self.mintimeoff = v;
        }
        if let Some(v) = obj.get("workid") {
            self.workid = Some(string_value(v, "workid")?.to_owned());
        }
        if let Some(v) = obj.get("target") {
            self.target = Some(decode_target(v)?);
        }
        // Only an explicit false clears the flag
        if let Some(Value::Bool(false)) = obj.get("submitold") {
            self.submit_old = false;
        }

        if let Some(v) = obj.get("transactions") {
            let entries = v
                .as_array()
                .ok_or_else(|| TemplateError::invalid("transactions", "not an array"))?;
            self.transactions.reserve(entries.len());
            for (position, entry) in entries.iter().enumerate() {
                let txn = parse_transaction(entry, "transactions", position)?;
                self.transactions.push(txn);
            }
        }

        if let Some(v) = obj.get("coinbasetxn") {
            // The coinbase precedes every template transaction, so it may
            // not declare dependencies
            self.coinbase_txn = Some(parse_transaction(v, "coinbasetxn", 0)?);
        }

        if let Some(v) = obj.get("coinbaseaux") {
            let entries = v
                .as_object()
                .ok_or_else(|| TemplateError::invalid("coinbaseaux", "not an object"))?;
            for (name, value) in entries {
                let data = hex_value(value, "coinbaseaux")?;
                self.aux_data.push((name.clone(), data));
            }
        }

        if let Some(v) = obj.get("mutable") {
            let tokens = v
                .as_array()
                .ok_or_else(|| TemplateError::invalid("mutable", "not an array"))?;
            for token in tokens {
                let token = string_value(token, "mutable")?;
                match mutation_flags(token) {
                    Some(flags) => self.mutations |= flags,
                    None => debug!("ignoring unknown mutation token '{}'", token),
                }
            }
        }

        if let Some(v) = obj.get("rules") {
            self.ingest_rules(v)?;
        }

        if let Some(v) = obj.get("vbavailable") {
            self.version_bits_available = Some(parse_version_bits(v)?);
        }

        if let Some(v) = obj.get("vbrequired") {
            let bits = v
                .as_u64()
                .ok_or_else(|| TemplateError::invalid("vbrequired", "not an unsigned integer"))?;
            let bits = u32::try_from(bits).map_err(|_| TemplateError::OutOfRange {
                field: "vbrequired",
                value: bits as i64,
            })?;
            self.version_bits_required |= bits;
        }

        if let Some(v) = obj.get("longpollid") {
            let id = string_value(v, "longpollid")?.to_owned();
            let uri = match obj.get("longpolluri") {
                Some(u) => Some(string_value(u, "longpolluri")?.to_owned()),
                None => None,
            };
            self.long_poll = Some(LongPoll { id, uri });
        }

        self.time_received = time_received;
        Ok(())
    }

    fn ingest_rules(&mut self, value: &Value) -> Result<(), TemplateError> {
        let entries = value
            .as_array()
            .ok_or_else(|| TemplateError::invalid("rules", "not an array"))?;
        let mut rules = Vec::with_capacity(entries.len());
        for entry in entries {
            let rule = string_value(entry, "rules")?;
            let (mandatory, name) = match rule.strip_prefix('!') {
                Some(stripped) => (true, stripped),
                None => (false, rule),
            };
            if !rule_supported(name) {
                if mandatory {
                    return Err(TemplateError::UnsupportedRule(rule.to_owned()));
                }
                if self.unsupported_rule.is_none() {
                    warn!("server declares unsupported rule '{}'", name);
                    self.unsupported_rule = Some(name.to_owned());
                }
            }
            rules.push(rule.to_owned());
        }
        self.rules = Some(rules);
        Ok(())
    }
}

/// Parse one `transactions`/`coinbasetxn` entry.
///
/// `position` is the entry's 0-based index in the transaction list; `depends`
/// entries are 1-based references restricted to strictly earlier entries.
fn parse_transaction(
    value: &Value,
    field: &'static str,
    position: usize,
) -> Result<Transaction, TemplateError> {
    let obj = value
        .as_object()
        .ok_or_else(|| TemplateError::invalid(field, "entry is not an object"))?;

    let data = hex_value(
        obj.get("data")
            .ok_or(TemplateError::MissingField("data"))?,
        "data",
    )?;
    let mut txn = Transaction {
        data,
        ..Default::default()
    };

    if let Some(v) = obj.get("hash") {
        let raw = fixed_hex_value(v, "hash", 32)?;
        let mut display = [0u8; 32];
        display.copy_from_slice(&raw);
        txn.hash = Some(reverse_bytes(&display));
    }

    if let Some(v) = obj.get("depends") {
        let entries = v
            .as_array()
            .ok_or_else(|| TemplateError::invalid("depends", "not an array"))?;
        let mut depends = Vec::with_capacity(entries.len());
        let mut previous = 0u64;
        for entry in entries {
            let index = entry
                .as_u64()
                .ok_or_else(|| TemplateError::invalid("depends", "index is not an unsigned integer"))?;
            // 1-based, strictly increasing, referencing an earlier entry only
            if index <= previous || index > position as u64 {
                return Err(TemplateError::OutOfRange {
                    field: "depends",
                    value: index as i64,
                });
            }
            previous = index;
            depends.push(index as u32);
        }
        txn.depends = Some(depends);
    }

    if let Some(v) = obj.get("fee") {
        let fee = v
            .as_i64()
            .ok_or_else(|| TemplateError::invalid("fee", "not an integer"))?;
        txn.fee = Some(fee);
    }

    if let Some(v) = obj.get("sigops") {
        let sigops = v
            .as_i64()
            .ok_or_else(|| TemplateError::invalid("sigops", "not an integer"))?;
        let sigops = i32::try_from(sigops).map_err(|_| TemplateError::OutOfRange {
            field: "sigops",
            value: sigops,
        })?;
        txn.sigops = Some(sigops);
    }

    if let Some(v) = obj.get("required") {
        txn.required = v
            .as_bool()
            .ok_or_else(|| TemplateError::invalid("required", "not a boolean"))?;
    }

    Ok(txn)
}

/// Decode `bits` into the 4-byte little-endian compact-target wire form.
fn decode_bits(obj: &Map<String, Value>) -> Result<[u8; 4], TemplateError> {
    let value = obj.get("bits").ok_or(TemplateError::MissingField("bits"))?;
    let raw = fixed_hex_value(value, "bits", 4)?;
    Ok([raw[3], raw[2], raw[1], raw[0]])
}

/// Decode `previousblockhash` from display-order hex into 8 little-endian
/// words in consensus byte order.
///
/// Only the low 28 bytes carry hash data in this encoding; word 7 is forced
/// to zero. This is a wire-compatibility contract, preserved exactly.
fn decode_prev_block_hash(obj: &Map<String, Value>) -> Result<[u32; 8], TemplateError> {
    let value = obj
        .get("previousblockhash")
        .ok_or(TemplateError::MissingField("previousblockhash"))?;
    let raw = fixed_hex_value(value, "previousblockhash", 32)?;
    let mut display = [0u8; 32];
    display.copy_from_slice(&raw);
    let internal = reverse_bytes(&display);

    let mut words = [0u32; 8];
    for (word, chunk) in words.iter_mut().zip(internal[..28].chunks_exact(4)) {
        *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    Ok(words)
}

/// Decode a BIP23 `target` as 8 big-endian words in display order.
fn decode_target(value: &Value) -> Result<[u32; 8], TemplateError> {
    let raw = fixed_hex_value(value, "target", 32)?;
    let mut words = [0u32; 8];
    for (word, chunk) in words.iter_mut().zip(raw.chunks_exact(4)) {
        *word = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    Ok(words)
}

fn parse_version_bits(value: &Value) -> Result<Vec<VersionBit>, TemplateError> {
    let entries = value
        .as_object()
        .ok_or_else(|| TemplateError::invalid("vbavailable", "not an object"))?;
    let mut bits = Vec::with_capacity(entries.len());
    for (name, bit) in entries {
        let bit = bit
            .as_u64()
            .ok_or_else(|| TemplateError::invalid("vbavailable", "bit is not an unsigned integer"))?;
        if bit > 28 {
            return Err(TemplateError::OutOfRange {
                field: "vbavailable",
                value: bit as i64,
            });
        }
        bits.push(VersionBit {
            name: name.clone(),
            bit: bit as u8,
        });
    }
    Ok(bits)
}

fn string_value<'a>(value: &'a Value, field: &'static str) -> Result<&'a str, TemplateError> {
    value
        .as_str()
        .ok_or_else(|| TemplateError::invalid(field, "not a string"))
}

/// Hex-decode a string field of any length.
fn hex_value(value: &Value, field: &'static str) -> Result<Vec<u8>, TemplateError> {
    let text = string_value(value, field)?;
    hex::decode(text).map_err(|err| TemplateError::invalid(field, err.to_string()))
}

/// Hex-decode a string field that must produce exactly `len` bytes.
fn fixed_hex_value(
    value: &Value,
    field: &'static str,
    len: usize,
) -> Result<Vec<u8>, TemplateError> {
    let raw = hex_value(value, field)?;
    if raw.len() != len {
        return Err(TemplateError::invalid(
            field,
            format!("expected {} bytes, got {}", len, raw.len()),
        ));
    }
    Ok(raw)
}

fn require_u64(obj: &Map<String, Value>, field: &'static str) -> Result<u64, TemplateError> {
    obj.get(field)
        .ok_or(TemplateError::MissingField(field))?
        .as_u64()
        .ok_or_else(|| TemplateError::invalid(field, "not an unsigned integer"))
}

fn require_u32(obj: &Map<String, Value>, field: &'static str) -> Result<u32, TemplateError> {
    let value = require_u64(obj, field)?;
    u32::try_from(value).map_err(|_| TemplateError::OutOfRange {
        field,
        value: value as i64,
    })
}

fn optional_u32(
    obj: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<u32>, TemplateError> {
    let value = match obj.get(field) {
        Some(value) => value,
        None => return Ok(None),
    };
    let value = value
        .as_u64()
        .ok_or_else(|| TemplateError::invalid(field, "not an unsigned integer"))?;
    let value = u32::try_from(value).map_err(|_| TemplateError::OutOfRange {
        field,
        value: value as i64,
    })?;
    Ok(Some(value))
}

fn optional_i32(
    obj: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<i32>, TemplateError> {
    let value = match obj.get(field) {
        Some(value) => value,
        None => return Ok(None),
    };
    let value = value
        .as_i64()
        .ok_or_else(|| TemplateError::invalid(field, "not an integer"))?;
    let value = i32::try_from(value).map_err(|_| TemplateError::OutOfRange { field, value })?;
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> Value {
        json!({
            "version": 2,
            "height": 3,
            "bits": "1d00ffff",
            "curtime": 777,
            "previousblockhash": "0000000077777777777777777777777777777777777777777777777777777777",
            "coinbasevalue": 512,
        })
    }

    fn ingest(json: &Value) -> Result<BlockTemplate, TemplateError> {
        let mut tmpl = BlockTemplate::new();
        tmpl.ingest(json, 0x777)?;
        Ok(tmpl)
    }

    #[test]
    fn test_each_required_field_missing_fails() {
        for field in [
            "version",
            "height",
            "bits",
            "curtime",
            "previousblockhash",
            "coinbasevalue",
        ] {
            let mut json = minimal();
            json.as_object_mut().unwrap().remove(field);
            let err = ingest(&json).unwrap_err();
            assert_eq!(err, TemplateError::MissingField(field), "field {}", field);
        }
    }

    #[test]
    fn test_non_object_response_fails() {
        assert!(ingest(&json!([1, 2, 3])).is_err());
        assert!(ingest(&json!("template")).is_err());
    }

    #[test]
    fn test_bits_must_be_four_bytes_of_hex() {
        let mut json = minimal();
        json["bits"] = json!("1d00ff");
        assert!(matches!(
            ingest(&json).unwrap_err(),
            TemplateError::InvalidField { field: "bits", .. }
        ));

        json["bits"] = json!("zz00ffff");
        assert!(matches!(
            ingest(&json).unwrap_err(),
            TemplateError::InvalidField { field: "bits", .. }
        ));
    }

    #[test]
    fn test_prev_block_hash_must_be_32_bytes() {
        let mut json = minimal();
        json["previousblockhash"] = json!("00000000777777777777");
        assert!(matches!(
            ingest(&json).unwrap_err(),
            TemplateError::InvalidField {
                field: "previousblockhash",
                ..
            }
        ));
    }

    #[test]
    fn test_version_out_of_u32_range() {
        let mut json = minimal();
        json["version"] = json!(0x1_0000_0000u64);
        assert_eq!(
            ingest(&json).unwrap_err(),
            TemplateError::OutOfRange {
                field: "version",
                value: 0x1_0000_0000,
            }
        );
    }

    #[test]
    fn test_vbavailable_bit_out_of_range() {
        let mut json = minimal();
        json["vbavailable"] = json!({"toolarge": 29});
        assert_eq!(
            ingest(&json).unwrap_err(),
            TemplateError::OutOfRange {
                field: "vbavailable",
                value: 29,
            }
        );
    }

    #[test]
    fn test_depends_may_not_reference_self_or_later() {
        // The first transaction has nothing earlier to depend on
        let mut json = minimal();
        json["transactions"] = json!([{"data": "00", "depends": [1]}]);
        assert!(matches!(
            ingest(&json).unwrap_err(),
            TemplateError::OutOfRange {
                field: "depends",
                ..
            }
        ));

        // The second transaction may not reference itself
        json["transactions"] = json!([{"data": "00"}, {"data": "00", "depends": [2]}]);
        assert!(ingest(&json).is_err());
    }

    #[test]
    fn test_depends_must_be_strictly_increasing() {
        let mut json = minimal();
        json["transactions"] = json!([
            {"data": "00"},
            {"data": "00"},
            {"data": "00", "depends": [2, 1]},
        ]);
        assert!(ingest(&json).is_err());

        json["transactions"] = json!([
            {"data": "00"},
            {"data": "00"},
            {"data": "00", "depends": [1, 1]},
        ]);
        assert!(ingest(&json).is_err());

        json["transactions"] = json!([
            {"data": "00"},
            {"data": "00"},
            {"data": "00", "depends": [1, 2]},
        ]);
        assert!(ingest(&json).is_ok());
    }

    #[test]
    fn test_coinbasetxn_may_not_declare_depends() {
        let mut json = minimal();
        json["coinbasetxn"] = json!({"data": "00", "depends": [1]});
        assert!(ingest(&json).is_err());
    }

    #[test]
    fn test_transaction_data_required() {
        let mut json = minimal();
        json["transactions"] = json!([{"fee": 1}]);
        assert_eq!(
            ingest(&json).unwrap_err(),
            TemplateError::MissingField("data")
        );
    }

    #[test]
    fn test_coinbaseaux_bad_hex_fails() {
        let mut json = minimal();
        json["coinbaseaux"] = json!({"dummy": "xyz"});
        assert!(matches!(
            ingest(&json).unwrap_err(),
            TemplateError::InvalidField {
                field: "coinbaseaux",
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_fields_and_mutation_tokens_ignored() {
        let mut json = minimal();
        json["noncerange"] = json!("01000000f0000000");
        json["mutable"] = json!(["version/force", "frobnicate"]);
        let tmpl = ingest(&json).unwrap();
        assert_eq!(tmpl.mutations, crate::capabilities::Capabilities::VERFORCE);
    }

    #[test]
    fn test_submitold_only_explicit_false_clears() {
        let mut json = minimal();
        json["submitold"] = json!(true);
        assert!(ingest(&json).unwrap().submit_old);

        json["submitold"] = json!("false");
        assert!(ingest(&json).unwrap().submit_old);

        json["submitold"] = json!(false);
        assert!(!ingest(&json).unwrap().submit_old);
    }

    #[test]
    fn test_time_received_recorded() {
        let mut tmpl = BlockTemplate::new();
        tmpl.ingest(&minimal(), 0x1234).unwrap();
        assert_eq!(tmpl.time_received, 0x1234);
    }
}
