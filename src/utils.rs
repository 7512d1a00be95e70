//! Identifier helpers

use bech32::Bech32m;
use uuid7::uuid7;

// construct a unique, time ordered id then encode using bech32m
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// Checks that `prefix` can be used as the human readable part of an id.
pub fn is_valid_prefix(prefix: &str) -> bool {
    bech32::Hrp::parse(prefix).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_carry_their_prefix() {
        let id = new_uuid_to_bech32("req_").unwrap();
        assert!(id.starts_with("req_1"));
    }

    #[test]
    fn empty_prefix_is_rejected() {
        assert!(new_uuid_to_bech32("").is_err());
        assert!(!is_valid_prefix(""));
    }
}
