/*!
 * MemeScan RPC
 *
 * Cliente RPC para interação com nodes Ethereum
 */

use ethereum_types::{Address, H256};
use memescan_core::{error::Result, types::LogEntry, Error};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use web3::{
    transports::{Http, WebSocket},
    types::{BlockNumber, Bytes, FilterBuilder, H160, H256 as Web3H256, U64},
    Web3,
};

/// Configuração do cliente RPC
#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub endpoint: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub use_cache: bool,
    pub cache_ttl: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8545".to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
            use_cache: true,
            cache_ttl: Duration::from_secs(60),
        }
    }
}

/// Enum para diferentes tipos de transporte
pub enum TransportType {
    Http(Web3<Http>),
    WebSocket(Web3<WebSocket>),
}

/// Cliente RPC para Ethereum
pub struct MemescanRpcClient {
    transport: TransportType,
    config: RpcConfig,
    cache: Arc<RwLock<HashMap<String, (Vec<u8>, std::time::Instant)>>>,
}

impl MemescanRpcClient {
    /// Cria um novo cliente RPC HTTP
    pub async fn new_http(config: RpcConfig) -> Result<Self> {
        let transport = Http::new(&config.endpoint)
            .map_err(|e| Error::RpcError(format!("Falha ao conectar via HTTP: {}", e)))?;

        let web3 = Web3::new(transport);

        // Verifica a conexão
        web3.eth()
            .block_number()
            .await
            .map_err(|e| Error::RpcError(format!("Falha ao conectar ao node Ethereum: {}", e)))?;

        Ok(Self {
            transport: TransportType::Http(web3),
            config,
            cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Cria um novo cliente RPC WebSocket
    pub async fn new_websocket(config: RpcConfig) -> Result<Self> {
        let transport = WebSocket::new(&config.endpoint)
            .await
            .map_err(|e| Error::RpcError(format!("Falha ao conectar via WebSocket: {}", e)))?;

        let web3 = Web3::new(transport);

        // Verifica a conexão
        web3.eth()
            .block_number()
            .await
            .map_err(|e| Error::RpcError(format!("Falha ao conectar ao node Ethereum: {}", e)))?;

        Ok(Self {
            transport: TransportType::WebSocket(web3),
            config,
            cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Cria um novo cliente baseado na URL
    pub async fn new(config: RpcConfig) -> Result<Self> {
        if config.endpoint.starts_with("ws") {
            Self::new_websocket(config).await
        } else {
            Self::new_http(config).await
        }
    }

    /// Obtém o número do bloco atual
    pub async fn get_block_number(&self) -> Result<u64> {
        let block_number = match &self.transport {
            TransportType::Http(web3) => web3
                .eth()
                .block_number()
                .await
                .map_err(|e| Error::RpcError(format!("Falha ao obter número do bloco: {}", e)))?,
            TransportType::WebSocket(web3) => web3
                .eth()
                .block_number()
                .await
                .map_err(|e| Error::RpcError(format!("Falha ao obter número do bloco: {}", e)))?,
        };

        Ok(block_number.as_u64())
    }

    /// Obtém os logs de um contrato filtrados por topic0 no intervalo `[from_block, to_block]`
    pub async fn get_logs(
        &self,
        from_block: u64,
        to_block: u64,
        address: Address,
        topic0: H256,
    ) -> Result<Vec<LogEntry>> {
        let filter = FilterBuilder::default()
            .from_block(BlockNumber::Number(U64::from(from_block)))
            .to_block(BlockNumber::Number(U64::from(to_block)))
            .address(vec![H160::from_slice(address.as_bytes())])
            .topics(
                Some(vec![Web3H256::from_slice(topic0.as_bytes())]),
                None,
                None,
                None,
            )
            .build();

        let logs = match &self.transport {
            TransportType::Http(web3) => web3
                .eth()
                .logs(filter)
                .await
                .map_err(|e| Error::RpcError(format!("Falha ao obter logs: {}", e)))?,
            TransportType::WebSocket(web3) => web3
                .eth()
                .logs(filter)
                .await
                .map_err(|e| Error::RpcError(format!("Falha ao obter logs: {}", e)))?,
        };

        Ok(logs.into_iter().map(to_log_entry).collect())
    }

    /// Obtém o código de um contrato
    pub async fn get_code(&self, address: Address) -> Result<Vec<u8>> {
        let cache_key = format!("code_{:x}", address);

        // Verifica o cache
        if self.config.use_cache {
            let cache = self.cache.read();
            if let Some((data, timestamp)) = cache.get(&cache_key) {
                if timestamp.elapsed() < self.config.cache_ttl {
                    return Ok(data.clone());
                }
            }
        }

        let result = match &self.transport {
            TransportType::Http(web3) => web3
                .eth()
                .code(H160::from_slice(address.as_bytes()), None)
                .await
                .map_err(|e| Error::RpcError(format!("Falha ao obter código do contrato: {}", e)))?,
            TransportType::WebSocket(web3) => web3
                .eth()
                .code(H160::from_slice(address.as_bytes()), None)
                .await
                .map_err(|e| Error::RpcError(format!("Falha ao obter código do contrato: {}", e)))?,
        };

        // Atualiza o cache
        if self.config.use_cache {
            let mut cache = self.cache.write();
            cache.insert(cache_key, (result.0.clone(), std::time::Instant::now()));
        }

        Ok(result.0)
    }

    /// Limpa o cache
    pub fn clear_cache(&self) {
        let mut cache = self.cache.write();
        cache.clear();
    }
}

/// Converte um log do web3 para o tipo neutro da workspace
fn to_log_entry(log: web3::types::Log) -> LogEntry {
    LogEntry {
        address: Address::from_slice(log.address.as_bytes()),
        topics: log
            .topics
            .iter()
            .map(|t| H256::from_slice(t.as_bytes()))
            .collect(),
        data: log.data.0,
        block_number: log.block_number.map(|n| n.as_u64()).unwrap_or(0),
        log_index: log.log_index.map(|i| i.as_u64()).unwrap_or(0),
    }
}

/// Implementação da trait RpcProvider do memescan-core
#[async_trait::async_trait]
impl memescan_core::traits::RpcProvider for MemescanRpcClient {
    async fn get_block_number(&self) -> Result<u64> {
        self.get_block_number().await
    }

    async fn get_logs(
        &self,
        from_block: u64,
        to_block: u64,
        address: Address,
        topic0: H256,
    ) -> Result<Vec<LogEntry>> {
        self.get_logs(from_block, to_block, address, topic0).await
    }

    async fn call(&self, to: Address, data: Vec<u8>) -> Result<Vec<u8>> {
        let call_request = web3::types::CallRequest {
            from: None,
            to: Some(H160::from_slice(to.as_bytes())),
            gas: None,
            gas_price: None,
            value: None,
            data: Some(Bytes(data)),
            transaction_type: None,
            access_list: None,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
        };

        let result = match &self.transport {
            TransportType::Http(web3) => web3
                .eth()
                .call(call_request, None)
                .await
                .map_err(|e| Error::RpcError(format!("Falha na chamada RPC: {}", e)))?,
            TransportType::WebSocket(web3) => web3
                .eth()
                .call(call_request, None)
                .await
                .map_err(|e| Error::RpcError(format!("Falha na chamada RPC: {}", e)))?,
        };

        Ok(result.0)
    }

    async fn get_code(&self, address: Address) -> Result<Vec<u8>> {
        self.get_code(address).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_conversion_preserves_fields() {
        let log = web3::types::Log {
            address: H160::repeat_byte(0x11),
            topics: vec![Web3H256::repeat_byte(0x22)],
            data: Bytes(vec![0xde, 0xad]),
            block_hash: None,
            block_number: Some(U64::from(42u64)),
            transaction_hash: None,
            transaction_index: None,
            log_index: Some(web3::types::U256::from(7u64)),
            transaction_log_index: None,
            log_type: None,
            removed: None,
        };

        let entry = to_log_entry(log);
        assert_eq!(entry.address, Address::repeat_byte(0x11));
        assert_eq!(entry.topics, vec![H256::repeat_byte(0x22)]);
        assert_eq!(entry.data, vec![0xde, 0xad]);
        assert_eq!(entry.block_number, 42);
        assert_eq!(entry.log_index, 7);
    }

    #[tokio::test]
    async fn connection_failure_is_reported() {
        let config = RpcConfig {
            endpoint: "http://127.0.0.1:1".to_string(),
            ..Default::default()
        };
        // Não há node escutando nessa porta; a verificação de conexão deve falhar
        let result = MemescanRpcClient::new(config).await;
        assert!(result.is_err());
    }
}
