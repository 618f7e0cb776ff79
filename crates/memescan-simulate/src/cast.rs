use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use ethereum_types::U256;
use tokio::process::Command;

use crate::errors::{Result, SandboxError};
use crate::parse::{extract_revert_reason, parse_hex_u64, parse_uint, truncate};

/// Limite de caracteres ao reportar um stderr sem marcador de revert
const RAW_ERROR_LIMIT: usize = 256;

/// Resultado de uma transação enviada ao fork
#[derive(Debug, Clone, PartialEq)]
pub struct SendOutcome {
    pub success: bool,
    pub gas_used: u64,
    pub revert_reason: Option<String>,
}

/// Executor de sondas contra o fork
///
/// Uma sonda de leitura devolve o resultado decodificado de uma chamada sem
/// alterar o estado. Uma sonda mutadora envia uma transação assinada e espera
/// a inclusão (o fork minera automaticamente); o sucesso deriva do campo de
/// status do recibo, nunca apenas do exit code do processo.
#[async_trait]
pub trait TransactionRunner: Send + Sync {
    async fn call(&self, to: &str, sig: &str, args: &[String]) -> Result<String>;

    async fn balance(&self, account: &str) -> Result<U256>;

    async fn send(
        &self,
        private_key: &str,
        to: &str,
        sig: &str,
        args: &[String],
        value: Option<&str>,
    ) -> Result<SendOutcome>;
}

/// Implementação do TransactionRunner sobre o CLI `cast` do Foundry
pub struct CastRunner {
    cast_bin: String,
    rpc_url: String,
    timeout: Duration,
}

impl CastRunner {
    pub fn new(cast_bin: impl Into<String>, rpc_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            cast_bin: cast_bin.into(),
            rpc_url: rpc_url.into(),
            timeout,
        }
    }

    /// Executa o cast com timeout por invocação
    ///
    /// Um timeout é falha dura da etapa, sem retry: uma sonda pendurada quase
    /// sempre indica fork ou RPC upstream doente.
    async fn run(&self, args: &[String]) -> Result<std::process::Output> {
        let mut cmd = Command::new(&self.cast_bin);
        cmd.args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SandboxError::BinaryNotFound(self.cast_bin.clone()))
            }
            Ok(Err(e)) => Err(SandboxError::Spawn(e.to_string())),
            Err(_) => Err(SandboxError::StepTimeout(self.timeout)),
        }
    }
}

#[async_trait]
impl TransactionRunner for CastRunner {
    async fn call(&self, to: &str, sig: &str, args: &[String]) -> Result<String> {
        let mut cmd_args: Vec<String> = vec![
            "call".to_string(),
            "--rpc-url".to_string(),
            self.rpc_url.clone(),
            to.to_string(),
            sig.to_string(),
        ];
        cmd_args.extend_from_slice(args);

        let output = self.run(&cmd_args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = extract_revert_reason(&stderr)
                .unwrap_or_else(|| truncate(&stderr, RAW_ERROR_LIMIT));
            return Err(SandboxError::CastFailed(reason));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn balance(&self, account: &str) -> Result<U256> {
        let cmd_args: Vec<String> = vec![
            "balance".to_string(),
            "--rpc-url".to_string(),
            self.rpc_url.clone(),
            account.to_string(),
        ];

        let output = self.run(&cmd_args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = extract_revert_reason(&stderr)
                .unwrap_or_else(|| truncate(&stderr, RAW_ERROR_LIMIT));
            return Err(SandboxError::CastFailed(reason));
        }

        parse_uint(&String::from_utf8_lossy(&output.stdout))
    }

    async fn send(
        &self,
        private_key: &str,
        to: &str,
        sig: &str,
        args: &[String],
        value: Option<&str>,
    ) -> Result<SendOutcome> {
        let mut cmd_args: Vec<String> = vec![
            "send".to_string(),
            "--rpc-url".to_string(),
            self.rpc_url.clone(),
            "--private-key".to_string(),
            private_key.to_string(),
            "--json".to_string(),
        ];
        if let Some(value) = value {
            cmd_args.push("--value".to_string());
            cmd_args.push(value.to_string());
        }
        cmd_args.push(to.to_string());
        cmd_args.push(sig.to_string());
        cmd_args.extend_from_slice(args);

        let output = match self.run(&cmd_args).await {
            Ok(output) => output,
            Err(SandboxError::StepTimeout(limit)) => {
                return Ok(SendOutcome {
                    success: false,
                    gas_used: 0,
                    revert_reason: Some(format!("timeout de {:?} excedido", limit)),
                });
            }
            Err(e) => return Err(e),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = extract_revert_reason(&stderr)
                .unwrap_or_else(|| truncate(&stderr, RAW_ERROR_LIMIT));
            return Ok(SendOutcome {
                success: false,
                gas_used: 0,
                revert_reason: Some(reason),
            });
        }

        parse_receipt(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Interpreta o recibo JSON emitido por `cast send --json`
///
/// `status` é "0x1" em caso de sucesso; `gasUsed` vem em hexadecimal. Um
/// status de falha vale mesmo com exit code zero do processo. Saída que não é
/// JSON é erro de interpretação: sem recibo legível não há como afirmar que a
/// transação foi incluída com sucesso.
pub fn parse_receipt(stdout: &str) -> Result<SendOutcome> {
    let value: serde_json::Value = serde_json::from_str(stdout.trim()).map_err(|_| {
        SandboxError::Parse(format!(
            "recibo ilegível do cast send: '{}'",
            truncate(stdout, RAW_ERROR_LIMIT)
        ))
    })?;

    let status_ok = match &value["status"] {
        serde_json::Value::String(s) => s == "0x1" || s == "1",
        serde_json::Value::Number(n) => n.as_u64() == Some(1),
        _ => false,
    };

    let gas_used = match &value["gasUsed"] {
        serde_json::Value::String(s) => parse_hex_u64(s)
            .or_else(|| s.parse().ok())
            .unwrap_or(0),
        serde_json::Value::Number(n) => n.as_u64().unwrap_or(0),
        _ => 0,
    };

    Ok(SendOutcome {
        success: status_ok,
        gas_used,
        revert_reason: if status_ok {
            None
        } else {
            Some("transação incluída com status de falha".to_string())
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipt_success_with_hex_gas() {
        let outcome = parse_receipt(r#"{"status":"0x1","gasUsed":"0x1e240"}"#).unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.gas_used, 123456);
        assert_eq!(outcome.revert_reason, None);
    }

    #[test]
    fn receipt_failure_status_overrides_exit_code() {
        let outcome = parse_receipt(r#"{"status":"0x0","gasUsed":"0x5208"}"#).unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.gas_used, 21000);
        assert!(outcome.revert_reason.is_some());
    }

    #[test]
    fn garbled_receipt_is_a_parse_error() {
        // Exit code zero sem recibo legível não pode virar veredito de sucesso
        let result = parse_receipt("transactionHash 0xabc");
        assert!(matches!(result, Err(SandboxError::Parse(_))));
    }

    #[tokio::test]
    async fn missing_cast_binary_is_reported() {
        let runner = CastRunner::new(
            "memescan-cast-inexistente",
            "http://127.0.0.1:1",
            Duration::from_secs(1),
        );
        let result = runner
            .call("0x0", "name()(string)", &[])
            .await;
        assert!(matches!(result, Err(SandboxError::BinaryNotFound(_))));
    }

    #[tokio::test]
    async fn hung_invocation_times_out() {
        // `sleep` faz as vezes de um cast pendurado
        let runner = CastRunner::new("sleep", "30", Duration::from_millis(100));
        let result = runner.balance("ignorado").await;
        assert!(matches!(result, Err(SandboxError::StepTimeout(_))));
    }
}
