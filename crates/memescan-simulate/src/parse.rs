/*! Interpretação da saída textual do cast.
 *
 * Valores numéricos podem vir anotados: notação científica entre colchetes
 * ("1000000 [1e6]") ou separadores de milhar. As funções abaixo extraem
 * apenas o literal inteiro inicial.
 */

use ethereum_types::U256;

use crate::errors::{Result, SandboxError};

/// Interpreta um inteiro sem sinal, decimal ou hexadecimal, ignorando anotações
pub fn parse_uint(text: &str) -> Result<U256> {
    let first = text
        .trim()
        .split_whitespace()
        .next()
        .ok_or_else(|| SandboxError::Parse("saída vazia".to_string()))?;

    // Descarta a anotação entre colchetes e os separadores de milhar
    let first = first.split('[').next().unwrap_or(first);
    let cleaned: String = first.chars().filter(|c| *c != ',' && *c != '_').collect();

    let parsed = if let Some(hex) = cleaned.strip_prefix("0x") {
        U256::from_str_radix(hex, 16).ok()
    } else {
        U256::from_dec_str(&cleaned).ok()
    };

    parsed.ok_or_else(|| SandboxError::Parse(format!("inteiro inválido: '{}'", text.trim())))
}

/// Interpreta a representação textual de um uint256[] devolvido pelo cast
pub fn parse_uint_array(text: &str) -> Result<Vec<U256>> {
    let inner = text
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim();

    if inner.is_empty() {
        return Ok(Vec::new());
    }

    inner
        .split(',')
        .map(|part| parse_uint(part))
        .collect::<Result<Vec<_>>>()
}

/// Interpreta um u64 hexadecimal ("0x52ab") como o gasUsed do recibo
pub fn parse_hex_u64(text: &str) -> Option<u64> {
    let trimmed = text.trim().trim_start_matches("0x");
    u64::from_str_radix(trimmed, 16).ok()
}

/// Extrai a primeira linha do stderr que mencione um revert ou erro
pub fn extract_revert_reason(stderr: &str) -> Option<String> {
    for line in stderr.lines() {
        let lower = line.to_lowercase();
        if lower.contains("revert") || lower.contains("error") {
            return Some(line.trim().to_string());
        }
    }
    None
}

/// Trunca uma mensagem de diagnóstico preservando limites de caractere
pub fn truncate(text: &str, max_chars: usize) -> String {
    text.trim().chars().take(max_chars).collect()
}
