/*! Orquestração da simulação de compra e venda.
 *
 * Cada simulação sobe um fork anvil dedicado, executa a sequência de sondas
 * compra → aprovação → venda via cast e derruba o fork antes de devolver o
 * resultado. O fork usa porta fixa, então as execuções são serializadas por
 * um semáforo de permissão única.
 */

use std::time::Duration;

use ethereum_types::{Address, U256};
use tokio::sync::Semaphore;

use memescan_core::types::{SimulationDraft, SimulationResult, Token};
use memescan_core::utils::{format_address, hex_to_address};

use crate::cast::{CastRunner, TransactionRunner};
use crate::errors::{Result, SandboxError};
use crate::logger::{log_info, log_warn};
use crate::parse::{parse_uint, parse_uint_array};
use crate::process::{AnvilConfig, AnvilProcess};

/// Primeira conta determinística do anvil, pré-carregada com 10000 ETH
pub const DEFAULT_SENDER: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
pub const DEFAULT_PRIVATE_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Deadline fixo no futuro distante para os swaps da sonda
const SWAP_DEADLINE: &str = "9999999999";

const GET_AMOUNTS_OUT: &str = "getAmountsOut(uint256,address[])(uint256[])";
const SWAP_ETH_FOR_TOKENS: &str = "swapExactETHForTokens(uint256,address[],address,uint256)";
const SWAP_TOKENS_FOR_ETH: &str =
    "swapExactTokensForETH(uint256,uint256,address[],address,uint256)";

/// Configuração do sandbox de simulação
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub anvil: AnvilConfig,
    /// Nome do binário cast, resolvido pelo PATH do ambiente
    pub cast_bin: String,
    /// Router V2 da DEX usado nos swaps da sonda
    pub router: Address,
    pub weth: Address,
    pub sender: Address,
    pub private_key: String,
    /// Valor em wei gasto na compra da sonda
    pub buy_amount_wei: U256,
    /// Tempo limite de cada invocação individual do cast
    pub step_timeout: Duration,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            anvil: AnvilConfig::default(),
            cast_bin: "cast".to_string(),
            // Uniswap V2 Router02 na mainnet
            router: hex_to_address("0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D")
                .expect("endereço constante do router é válido"),
            weth: hex_to_address("0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2")
                .expect("endereço constante do WETH é válido"),
            sender: hex_to_address(DEFAULT_SENDER)
                .expect("endereço constante da conta de simulação é válido"),
            private_key: DEFAULT_PRIVATE_KEY.to_string(),
            // 0.1 ETH
            buy_amount_wei: U256::from_dec_str("100000000000000000")
                .expect("valor constante de compra é válido"),
            step_timeout: Duration::from_secs(30),
        }
    }
}

/// Sandbox de simulação em fork local
///
/// O semáforo interno garante no máximo um fork vivo por vez: o node usa
/// porta fixa e duas instâncias simultâneas colidiriam no bind.
pub struct SimulationSandbox {
    config: SandboxConfig,
    gate: Semaphore,
}

impl SimulationSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            config,
            gate: Semaphore::new(1),
        }
    }

    /// Simula o ciclo completo de compra e venda do token em um fork novo
    ///
    /// Erros de ambiente (binário ausente, fork que não sobe) são propagados;
    /// falhas das sondas viram veredito dentro do resultado.
    pub async fn simulate(&self, token: &Token) -> Result<SimulationResult> {
        let _permit = self
            .gate
            .acquire()
            .await
            .expect("o semáforo do sandbox nunca é fechado");

        log_info(&format!(
            "simulando token {}",
            format_address(&token.address)
        ))
        .await;

        let mut node = AnvilProcess::spawn(&self.config.anvil).await?;
        let runner = CastRunner::new(
            self.config.cast_bin.as_str(),
            node.endpoint(),
            self.config.step_timeout,
        );

        let draft = run_probe(&runner, &self.config, token).await;
        node.shutdown().await;

        if let Some(message) = &draft.error_message {
            log_warn(&format!(
                "simulação de {} abortada: {}",
                format_address(&token.address),
                message
            ))
            .await;
        }

        Ok(draft.finish(token.address))
    }
}

/// Executa a sequência de sondas e acumula o rascunho do resultado
///
/// Toda falha de infraestrutura no meio da sequência vira `error_message`;
/// reverts das transações da sonda viram veredito (`can_buy`/`can_sell`).
pub(crate) async fn run_probe<R: TransactionRunner + ?Sized>(
    runner: &R,
    config: &SandboxConfig,
    token: &Token,
) -> SimulationDraft {
    let mut draft = SimulationDraft::default();
    if let Err(e) = probe_steps(runner, config, token, &mut draft).await {
        draft.error_message = Some(e.to_string());
    }
    draft
}

async fn probe_steps<R: TransactionRunner + ?Sized>(
    runner: &R,
    config: &SandboxConfig,
    token: &Token,
    draft: &mut SimulationDraft,
) -> Result<()> {
    let sender = format_address(&config.sender);
    let router = format_address(&config.router);
    let weth = format_address(&config.weth);
    let token_addr = format_address(&token.address);
    let buy_amount = config.buy_amount_wei.to_string();
    let buy_path = format!("[{},{}]", weth, token_addr);
    let sell_path = format!("[{},{}]", token_addr, weth);

    // Cotação da compra: quanto o router entregaria sem taxas do token
    let quote = runner
        .call(&router, GET_AMOUNTS_OUT, &[buy_amount.clone(), buy_path.clone()])
        .await?;
    let expected_tokens = last_amount(&quote)?;

    let buy = runner
        .send(
            &config.private_key,
            &router,
            SWAP_ETH_FOR_TOKENS,
            &[
                "0".to_string(),
                buy_path,
                sender.clone(),
                SWAP_DEADLINE.to_string(),
            ],
            Some(&buy_amount),
        )
        .await?;
    draft.buy_gas = buy.gas_used;
    if !buy.success {
        draft.revert_reason = buy.revert_reason;
        return Ok(());
    }
    draft.can_buy = true;

    let held_raw = runner
        .call(&token_addr, "balanceOf(address)(uint256)", &[sender.clone()])
        .await?;
    let held = parse_uint(&held_raw)?;
    if held.is_zero() {
        // Swap confirmado mas nenhum token creditado: retenção total
        draft.buy_tax_pct = 100.0;
        draft.revert_reason = Some("compra confirmada sem crédito de tokens".to_string());
        return Ok(());
    }
    draft.buy_tax_pct = tax_pct(expected_tokens, held);

    let approve = runner
        .send(
            &config.private_key,
            &token_addr,
            "approve(address,uint256)",
            &[router.clone(), U256::MAX.to_string()],
            None,
        )
        .await?;
    if !approve.success {
        draft.revert_reason = approve.revert_reason;
        return Ok(());
    }

    let quote = runner
        .call(
            &router,
            GET_AMOUNTS_OUT,
            &[held.to_string(), sell_path.clone()],
        )
        .await?;
    let expected_eth = last_amount(&quote)?;

    let before = runner.balance(&sender).await?;

    let sell = runner
        .send(
            &config.private_key,
            &router,
            SWAP_TOKENS_FOR_ETH,
            &[
                held.to_string(),
                "0".to_string(),
                sell_path,
                sender.clone(),
                SWAP_DEADLINE.to_string(),
            ],
            None,
        )
        .await?;
    draft.sell_gas = sell.gas_used;
    if !sell.success {
        draft.revert_reason = sell.revert_reason;
        return Ok(());
    }
    draft.can_sell = true;

    let after = runner.balance(&sender).await?;
    let received = after.saturating_sub(before);
    draft.sell_tax_pct = tax_pct(expected_eth, received);

    Ok(())
}

/// Último valor de um uint256[] devolvido por getAmountsOut
fn last_amount(quote: &str) -> Result<U256> {
    parse_uint_array(quote)?
        .last()
        .copied()
        .ok_or_else(|| SandboxError::Parse("cotação sem valores".to_string()))
}

/// Percentual retido entre o valor cotado e o valor efetivamente recebido
///
/// Calculado em basis points sobre U256 para evitar perda de precisão em
/// quantias de 18 decimais, só convertendo para f64 no fim.
pub fn tax_pct(expected: U256, actual: U256) -> f64 {
    if expected.is_zero() || actual >= expected {
        return 0.0;
    }
    let shortfall = expected - actual;
    let bps = shortfall.saturating_mul(U256::from(10_000u64)) / expected;
    bps.min(U256::from(10_000u64)).as_u64() as f64 / 100.0
}
