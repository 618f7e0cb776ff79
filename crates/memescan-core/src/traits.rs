/*!
 * MemeScan Traits
 *
 * Traits comuns usados em toda a workspace MemeScan
 */

use crate::error::Result;
use crate::types::LogEntry;
use async_trait::async_trait;
use ethereum_types::{Address, H256};

/// Trait para provedores RPC
#[async_trait]
pub trait RpcProvider: Send + Sync {
    /// Obtém o número do bloco atual
    async fn get_block_number(&self) -> Result<u64>;

    /// Obtém os logs emitidos por `address` com o `topic0` informado
    /// no intervalo fechado de blocos `[from_block, to_block]`
    async fn get_logs(
        &self,
        from_block: u64,
        to_block: u64,
        address: Address,
        topic0: H256,
    ) -> Result<Vec<LogEntry>>;

    /// Chama um método de contrato (somente leitura)
    async fn call(&self, to: Address, data: Vec<u8>) -> Result<Vec<u8>>;

    /// Obtém o código de um contrato
    async fn get_code(&self, address: Address) -> Result<Vec<u8>>;
}
