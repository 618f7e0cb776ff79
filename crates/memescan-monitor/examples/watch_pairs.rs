use std::env;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use memescan_core::{error::Result, traits::RpcProvider, types::Token, utils::format_address};
use memescan_monitor::{MonitorConfig, NewPairHandler, PairMonitor, TokenInfoService};
use memescan_rpc::{MemescanRpcClient, RpcConfig};
use tracing::info;

/// Handler que apenas registra os pares descobertos, enriquecidos com metadados
struct LoggingHandler<P> {
    token_info: TokenInfoService<P>,
}

#[async_trait]
impl<P: RpcProvider> NewPairHandler for LoggingHandler<P> {
    async fn on_new_pair(&self, token: Token) -> Result<()> {
        let enriched = self
            .token_info
            .fetch_metadata(token.address, token.pair_address)
            .await;
        info!(
            "novo par: token {} ({}) par {}",
            format_address(&enriched.address),
            enriched.symbol.as_deref().unwrap_or("???"),
            format_address(&enriched.pair_address),
        );
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

    let rpc_config = RpcConfig {
        endpoint: args[1].clone(),
        ..Default::default()
    };
    let provider = Arc::new(
        MemescanRpcClient::new(rpc_config)
            .await
            .context("falha ao conectar ao node")?,
    );

    let handler = Arc::new(LoggingHandler {
        token_info: TokenInfoService::new(provider.clone()),
    });
    let monitor = Arc::new(PairMonitor::new(
        MonitorConfig::default(),
        provider,
        handler,
    ));

    // Ctrl+C encerra o loop de polling de forma ordenada
    {
        let monitor = monitor.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("encerrando o monitor");
            monitor.stop();
        });
    }

    info!("monitorando eventos PairCreated; Ctrl+C para sair");
    monitor.start().await;
    Ok(())
}
