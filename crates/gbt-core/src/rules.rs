//! Soft-fork rules this client understands.

/// BIP9 rule names this implementation knows how to mine under.
///
/// Shared between request building (advertised to the server) and ingestion
/// (servers declaring a mandatory rule outside this list are rejected).
pub const SUPPORTED_RULES: &[&str] = &["csv", "segwit"];

/// Whether `rule` (without any `!` marker) is in [`SUPPORTED_RULES`].
pub fn rule_supported(rule: &str) -> bool {
    SUPPORTED_RULES.contains(&rule)
}
