use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};

use crate::errors::{Result, SandboxError};
use crate::logger::{log_error, log_info, log_warn};

/// Configuração do node de fork local
#[derive(Debug, Clone)]
pub struct AnvilConfig {
    /// Nome do binário, resolvido pelo PATH do ambiente
    pub anvil_bin: String,
    /// Endpoint RPC remoto de onde o fork parte
    pub fork_url: String,
    pub port: u16,
    /// Bloco fixo de partida; None usa o bloco mais recente
    pub fork_block: Option<u64>,
    /// Espera fixa para o node abrir a porta
    pub settle_delay: Duration,
    /// Espera máxima pelo encerramento gracioso antes do SIGKILL
    pub shutdown_timeout: Duration,
}

impl Default for AnvilConfig {
    fn default() -> Self {
        Self {
            anvil_bin: "anvil".to_string(),
            fork_url: "https://eth-mainnet.g.alchemy.com/v2/YOUR_KEY".to_string(),
            port: 8545,
            fork_block: None,
            settle_delay: Duration::from_secs(2),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

/// Processo anvil supervisionado
///
/// O dono tem exclusividade sobre o node enquanto ele viver. `shutdown`
/// garante o término em toda saída; como rede de segurança, o drop do Child
/// envia kill caso o supervisor seja descartado sem encerramento explícito.
pub struct AnvilProcess {
    child: Child,
    port: u16,
    shutdown_timeout: Duration,
    terminated: bool,
}

impl AnvilProcess {
    /// Inicia um node anvil forkando o RPC remoto configurado
    pub async fn spawn(config: &AnvilConfig) -> Result<Self> {
        let mut cmd = Command::new(&config.anvil_bin);
        cmd.args(fork_args(config));

        let process = Self::spawn_with(
            cmd,
            &config.anvil_bin,
            config.port,
            config.settle_delay,
            config.shutdown_timeout,
        )
        .await?;
        log_info(&format!("anvil forkado na porta {}", config.port)).await;
        Ok(process)
    }

    async fn spawn_with(
        mut cmd: Command,
        bin: &str,
        port: u16,
        settle_delay: Duration,
        shutdown_timeout: Duration,
    ) -> Result<Self> {
        cmd.stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SandboxError::BinaryNotFound(bin.to_string()),
            _ => SandboxError::Spawn(e.to_string()),
        })?;

        // Espera fixa para o node aceitar conexões
        tokio::time::sleep(settle_delay).await;

        if let Ok(Some(status)) = child.try_wait() {
            let mut stderr_text = String::new();
            if let Some(mut stderr) = child.stderr.take() {
                let _ = stderr.read_to_string(&mut stderr_text).await;
            }
            let detail = format!("{}: {}", status, stderr_text.trim());
            log_error(&format!("anvil encerrou imediatamente ({})", detail)).await;
            return Err(SandboxError::NodeExited(detail));
        }

        Ok(Self {
            child,
            port,
            shutdown_timeout,
            terminated: false,
        })
    }

    /// Endpoint RPC local do fork
    pub fn endpoint(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Verifica se o node ainda está em execução
    pub fn is_running(&mut self) -> bool {
        !self.terminated && matches!(self.child.try_wait(), Ok(None))
    }

    /// Encerra o node: SIGTERM com espera limitada, SIGKILL se não sair a tempo
    ///
    /// Idempotente; seguro de chamar em qualquer caminho de saída.
    pub async fn shutdown(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;

        if let Some(pid) = self.child.id() {
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGTERM);
            }
        }

        match tokio::time::timeout(self.shutdown_timeout, self.child.wait()).await {
            Ok(_) => log_info("anvil encerrado graciosamente").await,
            Err(_) => {
                log_warn("anvil não saiu a tempo; forçando o término").await;
                let _ = self.child.kill().await;
            }
        }
    }
}

/// Argumentos de linha de comando do node de fork
///
/// A mineração automática fica habilitada: com `--no-mining` as transações
/// das sondas nunca entram em bloco e o cast send trava esperando recibo.
/// A base fee e o preço de gás são zerados para que o delta de saldo medido
/// na venda reflita apenas o swap, sem desconto de gás.
fn fork_args(config: &AnvilConfig) -> Vec<String> {
    let mut args = vec![
        "--fork-url".to_string(),
        config.fork_url.clone(),
        "--port".to_string(),
        config.port.to_string(),
        "--base-fee".to_string(),
        "0".to_string(),
        "--gas-price".to_string(),
        "0".to_string(),
        "--silent".to_string(),
    ];
    if let Some(block) = config.fork_block {
        args.push("--fork-block-number".to_string());
        args.push(block.to_string());
    }
    args
}
