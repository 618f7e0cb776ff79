/*!
 * MemeScan Utils
 *
 * Utilitários comuns usados em toda a workspace MemeScan
 */

use ethereum_types::{Address, H256, U256};
use std::str::FromStr;
use tiny_keccak::{Hasher, Keccak};

/// Converte uma string hexadecimal para Address
pub fn hex_to_address(hex: &str) -> Option<Address> {
    let hex_str = if hex.starts_with("0x") { &hex[2..] } else { hex };
    Address::from_str(hex_str).ok()
}

/// Converte uma string hexadecimal para H256
pub fn hex_to_h256(hex: &str) -> Option<H256> {
    let hex_str = if hex.starts_with("0x") { &hex[2..] } else { hex };
    H256::from_str(hex_str).ok()
}

/// Formata um Address para exibição (hexadecimal minúsculo com prefixo 0x)
pub fn format_address(address: &Address) -> String {
    format!("0x{:x}", address)
}

/// Formata um U256 para exibição
pub fn format_u256(value: &U256) -> String {
    value.to_string()
}

/// Calcula o hash Keccak-256 de dados
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut result = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut result);
    result
}

/// Extrai o Address contido em um topic indexado
///
/// Parâmetros `address` indexados ocupam os últimos 20 bytes da palavra
/// de 32 bytes, alinhados à direita.
pub fn topic_to_address(topic: &H256) -> Address {
    Address::from_slice(&topic.as_bytes()[12..32])
}

/// Extrai o Address contido em uma palavra de 32 bytes do campo `data`
///
/// Retorna None se a fatia não tiver exatamente 32 bytes.
pub fn word_to_address(word: &[u8]) -> Option<Address> {
    if word.len() != 32 {
        return None;
    }
    Some(Address::from_slice(&word[12..32]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keccak_matches_known_event_signature() {
        // PairCreated(address,address,address,uint256) do Uniswap V2 Factory
        let hash = keccak256(b"PairCreated(address,address,address,uint256)");
        assert_eq!(
            H256::from(hash),
            hex_to_h256("0x0d3648bd0f6ba80134a33ba9275ac585d9d315f0ad8355cddefde31afa28d0e9")
                .unwrap()
        );
    }

    #[test]
    fn topic_carries_right_aligned_address() {
        let mut bytes = [0u8; 32];
        bytes[12..32].copy_from_slice(Address::repeat_byte(0xab).as_bytes());
        let topic = H256::from(bytes);
        assert_eq!(topic_to_address(&topic), Address::repeat_byte(0xab));
    }

    #[test]
    fn word_to_address_rejects_wrong_length() {
        assert!(word_to_address(&[0u8; 20]).is_none());
        assert!(word_to_address(&[0u8; 32]).is_some());
    }

    #[test]
    fn format_address_is_lowercase() {
        let address = hex_to_address("0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2").unwrap();
        assert_eq!(
            format_address(&address),
            "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"
        );
    }
}
