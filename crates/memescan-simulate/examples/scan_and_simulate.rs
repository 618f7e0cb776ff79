use std::env;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use memescan_core::{error::Result, types::Token, utils::format_address};
use memescan_monitor::{MonitorConfig, NewPairHandler, PairMonitor};
use memescan_rpc::{MemescanRpcClient, RpcConfig};
use memescan_simulate::{AnvilConfig, SandboxConfig, SimulationSandbox};
use tracing::{info, warn};

/// Handler que simula cada par descoberto assim que ele aparece
///
/// O sandbox serializa as simulações internamente, então descobertas em
/// rajada apenas enfileiram no semáforo.
struct SimulatingHandler {
    sandbox: Arc<SimulationSandbox>,
}

#[async_trait]
impl NewPairHandler for SimulatingHandler {
    async fn on_new_pair(&self, token: Token) -> Result<()> {
        info!("novo par descoberto: {}", format_address(&token.address));

        match self.sandbox.simulate(&token).await {
            Ok(result) => {
                if result.is_honeypot {
                    warn!(
                        "HONEYPOT: {} (motivo: {})",
                        format_address(&token.address),
                        result.revert_reason.as_deref().unwrap_or("desconhecido"),
                    );
                } else {
                    info!(
                        "{}: compra {:.2}% / venda {:.2}%",
                        format_address(&token.address),
                        result.buy_tax_pct,
                        result.sell_tax_pct,
                    );
                }
            }
            Err(e) => warn!(
                "simulação de {} falhou: {}",
                format_address(&token.address),
                e
            ),
        }

        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Uso: {} <RPC_ENDPOINT>", args[0]);
        std::process::exit(1);
    }

    let provider = Arc::new(
        MemescanRpcClient::new(RpcConfig {
            endpoint: args[1].clone(),
            ..Default::default()
        })
        .await
        .context("falha ao conectar ao node")?,
    );

    let sandbox = Arc::new(SimulationSandbox::new(SandboxConfig {
        anvil: AnvilConfig {
            fork_url: args[1].clone(),
            ..Default::default()
        },
        ..Default::default()
    }));

    let handler = Arc::new(SimulatingHandler { sandbox });
    let monitor = Arc::new(PairMonitor::new(
        MonitorConfig::default(),
        provider,
        handler,
    ));

    {
        let monitor = monitor.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("encerrando");
            monitor.stop();
        });
    }

    info!("monitorando e simulando novos pares; Ctrl+C para sair");
    monitor.start().await;
    Ok(())
}
