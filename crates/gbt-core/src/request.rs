//! Building getblocktemplate JSON-RPC requests.

use serde_json::{json, Value};

use crate::capabilities::Capabilities;
use crate::rules::SUPPORTED_RULES;

/// Highest base block version this client understands (the BIP9
/// version-bits base). Advertised as `maxversion` in every request.
pub const MAX_BLOCK_VERSION: u32 = 0x2000_0000;

/// Build a getblocktemplate request advertising `caps`, using the client's
/// built-in [`SUPPORTED_RULES`] list.
///
/// Produces exactly the same JSON as [`request_with_rules`] given the default
/// list; callers may switch between the two freely.
pub fn request(caps: Capabilities, longpoll_id: Option<&str>) -> Value {
    request_with_rules(caps, longpoll_id, SUPPORTED_RULES)
}

/// Build a getblocktemplate request with an explicit rule list.
///
/// Capability bits without a registered name are dropped silently;
/// capabilities are advisory hints, not required fields. `rules` is emitted
/// verbatim, in order.
pub fn request_with_rules(caps: Capabilities, longpoll_id: Option<&str>, rules: &[&str]) -> Value {
    let capability_names: Vec<&str> = caps.names().collect();

    let mut params = json!({
        "capabilities": capability_names,
        "maxversion": MAX_BLOCK_VERSION,
        "rules": rules,
    });
    if let Some(id) = longpoll_id {
        params["longpollid"] = Value::from(id);
    }

    json!({
        "id": 0,
        "method": "getblocktemplate",
        "params": [params],
    })
}
