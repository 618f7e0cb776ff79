use std::env;

use anyhow::Context;
use ethereum_types::Address;
use memescan_core::{types::Token, utils::hex_to_address};
use memescan_simulate::{AnvilConfig, SandboxConfig, SimulationSandbox};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Uso: {} <FORK_RPC_URL> <TOKEN_ADDRESS>", args[0]);
        std::process::exit(1);
    }

    let token_address = hex_to_address(&args[2]).context("endereço de token inválido")?;

    let config = SandboxConfig {
        anvil: AnvilConfig {
            fork_url: args[1].clone(),
            ..Default::default()
        },
        ..Default::default()
    };
    let sandbox = SimulationSandbox::new(config);

    // O par não é consultado pela sonda; um placeholder basta
    let token = Token::new(token_address, Address::zero());
    let result = sandbox.simulate(&token).await?;

    println!("Token:      {:#x}", result.token_address);
    println!("Comprável:  {}", result.can_buy);
    println!("Vendável:   {}", result.can_sell);
    println!("Taxa compra: {:.2}%", result.buy_tax_pct);
    println!("Taxa venda:  {:.2}%", result.sell_tax_pct);
    println!("Gás compra:  {}", result.buy_gas);
    println!("Gás venda:   {}", result.sell_gas);
    println!("Honeypot:   {}", result.is_honeypot);
    if let Some(reason) = &result.revert_reason {
        println!("Revert:     {}", reason);
    }
    if let Some(message) = &result.error_message {
        println!("Erro:       {}", message);
    }

    Ok(())
}
