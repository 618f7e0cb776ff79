use std::time::Duration;
use thiserror::Error;

/// Erros que podem ocorrer durante a simulação
#[derive(Debug, Error)]
pub enum SandboxError {
    /// Binário não encontrado no PATH
    #[error("binário '{0}' não encontrado no PATH; instale o Foundry: https://getfoundry.sh")]
    BinaryNotFound(String),

    /// Falha ao iniciar um processo auxiliar
    #[error("falha ao iniciar processo: {0}")]
    Spawn(String),

    /// Node de fork encerrou imediatamente após o início
    #[error("anvil encerrou imediatamente: {0}")]
    NodeExited(String),

    /// Invocação do cast excedeu o tempo limite da etapa
    #[error("timeout de {0:?} excedido na invocação do cast")]
    StepTimeout(Duration),

    /// Invocação do cast falhou
    #[error("cast falhou: {0}")]
    CastFailed(String),

    /// Saída do cast não pôde ser interpretada
    #[error("saída numérica inválida: {0}")]
    Parse(String),
}

/// Resultado padrão da crate
pub type Result<T> = std::result::Result<T, SandboxError>;
