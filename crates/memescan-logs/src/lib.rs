use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;

/// Tipo de erro retornado pelo logger.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("erro ao enviar log: {0}")]
    Request(#[from] reqwest::Error),
}

/// Severidade de um registro de log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Estrutura de log enviada para o Elasticsearch.
#[derive(Serialize)]
struct LogEntry<'a> {
    level: LogLevel,
    message: &'a str,
    crate_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a str>,
    timestamp: DateTime<Utc>,
}

/// Cliente simples para envio de logs ao Elasticsearch.
pub struct MemescanLogger {
    endpoint: String,
    client: Client,
}

impl MemescanLogger {
    /// Cria uma nova instância apontando para a `endpoint` do Elasticsearch.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: Client::new(),
        }
    }

    /// Envia um log para o Elasticsearch.
    pub async fn log(
        &self,
        level: LogLevel,
        message: &str,
        crate_name: &str,
    ) -> Result<(), LogError> {
        self.log_with_context(level, message, crate_name, None).await
    }

    /// Envia um log com contexto adicional (ex.: endereço do token em análise).
    pub async fn log_with_context(
        &self,
        level: LogLevel,
        message: &str,
        crate_name: &str,
        context: Option<&str>,
    ) -> Result<(), LogError> {
        let entry = LogEntry {
            level,
            message,
            crate_name,
            context,
            timestamp: Utc::now(),
        };
        self.client
            .post(&self.endpoint)
            .json(&entry)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
