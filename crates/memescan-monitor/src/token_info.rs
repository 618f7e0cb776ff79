use std::sync::Arc;

use ethereum_types::{Address, U256};
use memescan_core::{traits::RpcProvider, types::Token, utils::word_to_address};

use crate::logger::log_debug;

// Seletores das funções de metadados do ERC-20
const NAME_SELECTOR: [u8; 4] = [0x06, 0xfd, 0xde, 0x03]; // name()
const SYMBOL_SELECTOR: [u8; 4] = [0x95, 0xd8, 0x9b, 0x41]; // symbol()
const DECIMALS_SELECTOR: [u8; 4] = [0x31, 0x3c, 0xe5, 0x67]; // decimals()
const TOTAL_SUPPLY_SELECTOR: [u8; 4] = [0x18, 0x16, 0x0d, 0xdd]; // totalSupply()
const OWNER_SELECTOR: [u8; 4] = [0x8d, 0xa5, 0xcb, 0x5b]; // owner()

/// Serviço de coleta de metadados ERC-20 on-chain
///
/// Preenche os campos opcionais do Token chamando as funções padrão do
/// contrato. Cada chamada que falhar deixa o campo correspondente vazio;
/// muitos contratos não implementam owner() ou devolvem string em bytes32.
pub struct TokenInfoService<P> {
    provider: Arc<P>,
}

impl<P: RpcProvider> TokenInfoService<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }

    /// Busca os metadados do token e devolve um Token enriquecido
    pub async fn fetch_metadata(&self, address: Address, pair_address: Address) -> Token {
        let mut token = Token::new(address, pair_address);

        match self.provider.call(address, NAME_SELECTOR.to_vec()).await {
            Ok(data) => token.name = decode_string_return(&data),
            Err(e) => log_debug(&format!("name() indisponível: {}", e)).await,
        }

        match self.provider.call(address, SYMBOL_SELECTOR.to_vec()).await {
            Ok(data) => token.symbol = decode_string_return(&data),
            Err(e) => log_debug(&format!("symbol() indisponível: {}", e)).await,
        }

        match self.provider.call(address, DECIMALS_SELECTOR.to_vec()).await {
            Ok(data) => {
                token.decimals = decode_uint_return(&data)
                    .filter(|v| *v <= U256::from(u8::MAX))
                    .map(|v| v.as_u32() as u8)
            }
            Err(e) => log_debug(&format!("decimals() indisponível: {}", e)).await,
        }

        match self
            .provider
            .call(address, TOTAL_SUPPLY_SELECTOR.to_vec())
            .await
        {
            Ok(data) => token.total_supply = decode_uint_return(&data),
            Err(e) => log_debug(&format!("totalSupply() indisponível: {}", e)).await,
        }

        match self.provider.call(address, OWNER_SELECTOR.to_vec()).await {
            Ok(data) if data.len() >= 32 => token.deployer = word_to_address(&data[0..32]),
            Ok(_) => {}
            Err(e) => log_debug(&format!("owner() indisponível: {}", e)).await,
        }

        token
    }
}

/// Decodifica o retorno de uma função que devolve uint
fn decode_uint_return(data: &[u8]) -> Option<U256> {
    if data.len() < 32 {
        return None;
    }
    Some(U256::from_big_endian(&data[0..32]))
}

/// Decodifica o retorno de uma função que devolve string
///
/// Aceita a forma dinâmica padrão (offset + tamanho + bytes) e, como
/// fallback, a forma bytes32 usada por tokens antigos.
fn decode_string_return(data: &[u8]) -> Option<String> {
    if data.len() >= 64 {
        let offset = U256::from_big_endian(&data[0..32]);
        if offset < U256::from(data.len()) {
            let offset = offset.as_usize();
            if offset + 32 <= data.len() {
                let len = U256::from_big_endian(&data[offset..offset + 32]);
                if len <= U256::from(data.len()) {
                    let len = len.as_usize();
                    if offset + 32 + len <= data.len() {
                        return clean_utf8(&data[offset + 32..offset + 32 + len]);
                    }
                }
            }
        }
    }

    if data.len() == 32 {
        return clean_utf8(data);
    }

    None
}

fn clean_utf8(bytes: &[u8]) -> Option<String> {
    let text = String::from_utf8(bytes.to_vec()).ok()?;
    let trimmed = text.trim_matches('\0').trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ethereum_types::H256;
    use memescan_core::error::{Error, Result};
    use memescan_core::types::LogEntry;
    use std::collections::HashMap;

    fn encode_string(text: &str) -> Vec<u8> {
        let mut out = vec![0u8; 64];
        out[31] = 0x20; // offset
        out[63] = text.len() as u8;
        out.extend_from_slice(text.as_bytes());
        // padding até múltiplo de 32
        while out.len() % 32 != 0 {
            out.push(0);
        }
        out
    }

    fn encode_uint(value: u64) -> Vec<u8> {
        let mut word = [0u8; 32];
        U256::from(value).to_big_endian(&mut word);
        word.to_vec()
    }

    #[test]
    fn decodes_dynamic_string() {
        assert_eq!(
            decode_string_return(&encode_string("Pepe")),
            Some("Pepe".to_string())
        );
    }

    #[test]
    fn decodes_bytes32_string() {
        let mut word = [0u8; 32];
        word[0..3].copy_from_slice(b"MKR");
        assert_eq!(decode_string_return(&word), Some("MKR".to_string()));
    }

    #[test]
    fn rejects_garbage_string() {
        assert_eq!(decode_string_return(&[0xff; 16]), None);
        // offset apontando para fora do buffer
        let mut data = vec![0u8; 64];
        data[31] = 0xf0;
        assert_eq!(decode_string_return(&data), None);
    }

    #[test]
    fn decodes_uint_word() {
        assert_eq!(
            decode_uint_return(&encode_uint(18)),
            Some(U256::from(18u64))
        );
        assert_eq!(decode_uint_return(&[0u8; 8]), None);
    }

    /// Provedor falso que responde por seletor
    struct SelectorProvider {
        responses: HashMap<[u8; 4], Vec<u8>>,
    }

    #[async_trait]
    impl RpcProvider for SelectorProvider {
        async fn get_block_number(&self) -> Result<u64> {
            Ok(0)
        }

        async fn get_logs(
            &self,
            _from_block: u64,
            _to_block: u64,
            _address: Address,
            _topic0: H256,
        ) -> Result<Vec<LogEntry>> {
            Ok(Vec::new())
        }

        async fn call(&self, _to: Address, data: Vec<u8>) -> Result<Vec<u8>> {
            let selector: [u8; 4] = data[0..4].try_into().unwrap();
            self.responses
                .get(&selector)
                .cloned()
                .ok_or_else(|| Error::RpcError("execution reverted".to_string()))
        }

        async fn get_code(&self, _address: Address) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn fetch_metadata_fills_available_fields() {
        let mut responses = HashMap::new();
        responses.insert(NAME_SELECTOR, encode_string("Pepe Coin"));
        responses.insert(SYMBOL_SELECTOR, encode_string("PEPE"));
        responses.insert(DECIMALS_SELECTOR, encode_uint(18));
        responses.insert(TOTAL_SUPPLY_SELECTOR, encode_uint(1_000_000));
        // owner() ausente: contrato sem a função

        let service = TokenInfoService::new(Arc::new(SelectorProvider { responses }));
        let token = service
            .fetch_metadata(Address::repeat_byte(0x01), Address::repeat_byte(0x02))
            .await;

        assert_eq!(token.name.as_deref(), Some("Pepe Coin"));
        assert_eq!(token.symbol.as_deref(), Some("PEPE"));
        assert_eq!(token.decimals, Some(18));
        assert_eq!(token.total_supply, Some(U256::from(1_000_000u64)));
        assert_eq!(token.deployer, None);
        assert_eq!(token.address, Address::repeat_byte(0x01));
    }
}
