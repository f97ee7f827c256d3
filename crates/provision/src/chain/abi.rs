//! ABI encoding for the vault calls.
//!
//! All vault arguments are static types, so every argument is exactly one
//! 32-byte word and no offsets are involved.

use alloy_core::primitives::{Address, B256, Bytes, U256, keccak256};

/// Canonical signature of the provider setter.
pub const SET_AAVE_PROVIDER_SIGNATURE: &str = "setAaveProvider(address)";
/// Canonical signature of the asset listing call.
pub const LIST_ASSET_SIGNATURE: &str = "listAsset(address,uint256,bool)";

/// First four bytes of the keccak256 hash of a function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

fn address_word(address: Address) -> B256 {
    address.into_word()
}

fn uint_word(value: U256) -> B256 {
    B256::from(value.to_be_bytes::<32>())
}

fn bool_word(value: bool) -> B256 {
    uint_word(U256::from(value as u8))
}

fn encode_call(signature: &str, words: &[B256]) -> Bytes {
    let mut data = Vec::with_capacity(4 + 32 * words.len());
    data.extend_from_slice(&selector(signature));
    for word in words {
        data.extend_from_slice(word.as_slice());
    }
    data.into()
}

/// Encode `setAaveProvider(provider)`.
pub fn encode_set_aave_provider(provider: Address) -> Bytes {
    encode_call(SET_AAVE_PROVIDER_SIGNATURE, &[address_word(provider)])
}

/// Encode `listAsset(asset, minimum, enabled)`.
pub fn encode_list_asset(asset: Address, minimum: U256, enabled: bool) -> Bytes {
    encode_call(
        LIST_ASSET_SIGNATURE,
        &[address_word(asset), uint_word(minimum), bool_word(enabled)],
    )
}

/// Deploy payload: creation bytecode followed by the encoded `(admin, dao)`
/// constructor arguments.
pub fn encode_deploy(bytecode: &Bytes, admin: Address, treasury: Address) -> Bytes {
    let mut data = Vec::with_capacity(bytecode.len() + 64);
    data.extend_from_slice(bytecode);
    data.extend_from_slice(address_word(admin).as_slice());
    data.extend_from_slice(address_word(treasury).as_slice());
    data.into()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    const ASSET: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

    #[test]
    fn test_selector_matches_known_value() {
        // transfer(address,uint256) is the canonical ERC-20 selector.
        assert_eq!(
            hex::encode(selector("transfer(address,uint256)")),
            "a9059cbb"
        );
    }

    #[test]
    fn test_encode_set_aave_provider() {
        let provider = Address::from_str(ASSET).unwrap();
        let calldata = encode_set_aave_provider(provider);

        // selector + 1 word
        assert_eq!(calldata.len(), 4 + 32);
        assert_eq!(calldata[..4], selector(SET_AAVE_PROVIDER_SIGNATURE));
        assert_eq!(
            hex::encode(&calldata[4..]),
            "00000000000000000000000070997970c51812dc3a010c7d01b50e0d17dc79c8"
        );
    }

    #[test]
    fn test_encode_list_asset() {
        let asset = Address::from_str(ASSET).unwrap();
        let calldata = encode_list_asset(asset, U256::from(3_000_000u64), true);

        assert_eq!(calldata.len(), 4 + 3 * 32);
        assert_eq!(calldata[..4], selector(LIST_ASSET_SIGNATURE));
        assert_eq!(
            hex::encode(&calldata[36..68]),
            "00000000000000000000000000000000000000000000000000000000002dc6c0"
        );
        assert_eq!(calldata[99], 1);
        assert!(calldata[68..99].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_encode_list_asset_disabled() {
        let asset = Address::from_str(ASSET).unwrap();
        let calldata = encode_list_asset(asset, U256::ZERO, false);
        assert!(calldata[36..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_encode_deploy_appends_constructor_args() {
        let bytecode = Bytes::from(vec![0x60, 0x80, 0x60, 0x40]);
        let admin = Address::from_str(ASSET).unwrap();
        let treasury = Address::ZERO;

        let data = encode_deploy(&bytecode, admin, treasury);

        assert_eq!(data.len(), 4 + 64);
        assert_eq!(data[..4], bytecode[..]);
        assert_eq!(data[4 + 12..4 + 32], admin.as_slice()[..]);
        assert!(data[36..].iter().all(|b| *b == 0));
    }
}
