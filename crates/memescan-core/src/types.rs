/*!
 * MemeScan Types
 *
 * Tipos comuns usados em toda a workspace MemeScan
 */

use chrono::{DateTime, Utc};
use ethereum_types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

/// Token ERC-20 recém-descoberto em um par de liquidez
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Endereço do contrato do token
    pub address: Address,
    /// Endereço do par de liquidez na DEX
    pub pair_address: Address,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: Option<u8>,
    pub total_supply: Option<U256>,
    /// Endereço do deployer/owner do contrato, quando conhecido
    pub deployer: Option<Address>,
    pub created_at: DateTime<Utc>,
}

impl Token {
    /// Cria um token apenas com os endereços conhecidos no momento da descoberta
    pub fn new(address: Address, pair_address: Address) -> Self {
        Self {
            address,
            pair_address,
            name: None,
            symbol: None,
            decimals: None,
            total_supply: None,
            deployer: None,
            created_at: Utc::now(),
        }
    }
}

/// Campos acumulados durante as etapas da simulação
#[derive(Debug, Clone, Default)]
pub struct SimulationDraft {
    pub can_buy: bool,
    pub can_sell: bool,
    pub buy_tax_pct: f64,
    pub sell_tax_pct: f64,
    pub buy_gas: u64,
    pub sell_gas: u64,
    pub revert_reason: Option<String>,
    pub error_message: Option<String>,
}

impl SimulationDraft {
    /// Finaliza o rascunho aplicando os invariantes do resultado:
    /// taxas restritas a [0, 100] e veredito de honeypot derivado
    pub fn finish(self, token_address: Address) -> SimulationResult {
        SimulationResult {
            token_address,
            can_buy: self.can_buy,
            can_sell: self.can_sell,
            buy_tax_pct: self.buy_tax_pct.clamp(0.0, 100.0),
            sell_tax_pct: self.sell_tax_pct.clamp(0.0, 100.0),
            buy_gas: self.buy_gas,
            sell_gas: self.sell_gas,
            is_honeypot: self.can_buy && !self.can_sell,
            revert_reason: self.revert_reason,
            error_message: self.error_message,
            simulated_at: Utc::now(),
        }
    }
}

/// Resultado da simulação de compra/venda em um fork
///
/// Produzido exatamente uma vez por execução e nunca mutado depois.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub token_address: Address,
    pub can_buy: bool,
    pub can_sell: bool,
    pub buy_tax_pct: f64,
    pub sell_tax_pct: f64,
    pub buy_gas: u64,
    pub sell_gas: u64,
    pub is_honeypot: bool,
    pub revert_reason: Option<String>,
    pub error_message: Option<String>,
    pub simulated_at: DateTime<Utc>,
}

/// Log decodificado, independente do transporte RPC utilizado
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Vec<u8>,
    pub block_number: u64,
    pub log_index: u64,
}
