/*! memescan-monitor
 *
 * Crate para descoberta contínua de novos pares de liquidez via eth_getLogs.
 * Observa o evento PairCreated de uma factory Uniswap V2 e despacha cada
 * token negociável contra o ativo nativo embrulhado para um handler.
 */

mod logger;
pub mod monitor;
pub mod token_info;

pub use monitor::*;
pub use token_info::*;
