/*! memescan-simulate
 *
 * Crate para simulação de compra e venda de tokens em forks Ethereum.
 * Usa o Anvil como backend de fork local e o cast como executor das sondas
 * de leitura e das transações assinadas.
 */

pub mod cast;
pub mod errors;
mod logger;
pub mod parse;
pub mod process;
pub mod sandbox;

pub use cast::*;
pub use errors::*;
pub use process::*;
pub use sandbox::*;
