use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ethereum_types::{Address, H256};
use once_cell::sync::Lazy;
use tokio::sync::{mpsc, Notify};

use memescan_core::{
    error::{Error, Result},
    traits::RpcProvider,
    types::{LogEntry, Token},
    utils::{format_address, hex_to_address, keccak256, topic_to_address, word_to_address},
};

use crate::logger::{log_debug, log_error, log_info, log_warn};

/// Topic0 do evento PairCreated(address,address,address,uint256) do Uniswap V2 Factory
pub static PAIR_CREATED_TOPIC: Lazy<H256> =
    Lazy::new(|| H256::from(keccak256(b"PairCreated(address,address,address,uint256)")));

/// Teto do atraso de reconexão exponencial
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);

/// Configuração do monitor de pares
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Endereço da factory observada
    pub factory: Address,
    /// Endereço do ativo nativo embrulhado (WETH na mainnet)
    pub weth: Address,
    pub poll_interval: Duration,
    /// Limite de blocos por consulta de logs (provedores gratuitos limitam
    /// eth_getLogs a janelas pequenas, ex.: 10 blocos na Alchemy)
    pub max_block_range: u64,
    pub max_reconnect_attempts: u32,
    pub reconnect_base_delay: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            factory: hex_to_address("0x5C69bEe701ef814a2B6a3EDD4B1652CB9cc5aA6f")
                .expect("endereço constante da factory"),
            weth: hex_to_address("0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2")
                .expect("endereço constante do WETH"),
            poll_interval: Duration::from_secs(2),
            max_block_range: 10,
            max_reconnect_attempts: 10,
            reconnect_base_delay: Duration::from_secs(1),
        }
    }
}

/// Decisão tomada após uma falha de transporte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectAction {
    /// Aguardar o atraso indicado e tentar novamente a mesma janela
    Retry(Duration),
    /// Teto de tentativas excedido; o monitor deve se encerrar
    GiveUp,
}

/// Contador de tentativas de reconexão com backoff exponencial
#[derive(Debug, Default)]
pub struct ReconnectState {
    attempts: u32,
}

impl ReconnectState {
    /// Registra uma falha consecutiva e devolve a ação correspondente
    pub fn record_failure(&mut self, base_delay: Duration, max_attempts: u32) -> ReconnectAction {
        self.attempts += 1;
        if self.attempts > max_attempts {
            return ReconnectAction::GiveUp;
        }
        let factor = 2u32.saturating_pow(self.attempts - 1);
        let delay = base_delay.saturating_mul(factor).min(MAX_RECONNECT_DELAY);
        ReconnectAction::Retry(delay)
    }

    /// Zera o contador após um ciclo bem-sucedido
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Trait para consumidores de novos pares
///
/// Erros retornados pelo handler são registrados e descartados: a falha de um
/// token não pode derrubar o loop de descoberta.
#[async_trait]
pub trait NewPairHandler: Send + Sync {
    async fn on_new_pair(&self, token: Token) -> Result<()>;
}

/// Adaptador que publica os tokens descobertos em um canal mpsc
///
/// Desacopla a latência de descoberta da latência de simulação: o monitor
/// produz e uma task consumidora drena no seu próprio ritmo.
pub struct PairSender {
    tx: mpsc::Sender<Token>,
}

impl PairSender {
    pub fn new(tx: mpsc::Sender<Token>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl NewPairHandler for PairSender {
    async fn on_new_pair(&self, token: Token) -> Result<()> {
        self.tx
            .send(token)
            .await
            .map_err(|_| Error::Other("consumidor de pares encerrado".to_string()))
    }
}

/// Monitor assíncrono de eventos PairCreated
///
/// Uso:
/// ```ignore
/// let monitor = Arc::new(PairMonitor::new(config, provider, handler));
/// monitor.start().await; // bloqueia até stop()
/// ```
pub struct PairMonitor<P> {
    config: MonitorConfig,
    provider: Arc<P>,
    handler: Arc<dyn NewPairHandler>,
    shutdown: AtomicBool,
    wakeup: Notify,
    last_block: AtomicU64,
}

impl<P: RpcProvider> PairMonitor<P> {
    pub fn new(config: MonitorConfig, provider: Arc<P>, handler: Arc<dyn NewPairHandler>) -> Self {
        Self {
            config,
            provider,
            handler,
            shutdown: AtomicBool::new(false),
            wakeup: Notify::new(),
            last_block: AtomicU64::new(0),
        }
    }

    /// Último bloco cujos logs já foram integralmente despachados
    pub fn last_processed_block(&self) -> u64 {
        self.last_block.load(Ordering::SeqCst)
    }

    /// Inicia o loop de polling; bloqueia a task até `stop()` ser chamado
    pub async fn start(&self) {
        log_info(&format!(
            "monitor iniciado: factory {} intervalo {:?}",
            format_address(&self.config.factory),
            self.config.poll_interval
        ))
        .await;

        // Inicializa o cursor a partir do topo atual da chain
        match self.provider.get_block_number().await {
            Ok(head) => self.last_block.store(head, Ordering::SeqCst),
            Err(e) => {
                log_error(&format!("falha ao obter bloco inicial: {}", e)).await;
                self.last_block.store(0, Ordering::SeqCst);
            }
        }

        let mut reconnect = ReconnectState::default();

        while !self.shutdown_requested() {
            match self.poll_once().await {
                Ok(()) => reconnect.reset(),
                Err(e) => {
                    match reconnect.record_failure(
                        self.config.reconnect_base_delay,
                        self.config.max_reconnect_attempts,
                    ) {
                        ReconnectAction::Retry(delay) => {
                            log_warn(&format!(
                                "erro de RPC (tentativa {}/{}): {}. nova tentativa em {:?}",
                                reconnect.attempts(),
                                self.config.max_reconnect_attempts,
                                e,
                                delay
                            ))
                            .await;
                            self.interruptible_sleep(delay).await;
                        }
                        ReconnectAction::GiveUp => {
                            log_error(&format!(
                                "número máximo de reconexões ({}) excedido; encerrando o monitor",
                                self.config.max_reconnect_attempts
                            ))
                            .await;
                            self.stop();
                            break;
                        }
                    }
                }
            }

            self.interruptible_sleep(self.config.poll_interval).await;
        }

        log_info("monitor encerrado").await;
    }

    /// Sinaliza o encerramento do loop de polling; idempotente
    ///
    /// Não cancela um fetch ou um handler em andamento: ambos rodam até o fim.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.wakeup.notify_waiters();
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Um ciclo de polling: busca a janela pendente, decodifica e despacha
    ///
    /// O cursor só avança depois que todos os logs da janela foram despachados,
    /// garantindo entrega at-least-once em caso de falha no meio da janela.
    async fn poll_once(&self) -> Result<()> {
        let head = self.provider.get_block_number().await?;
        let cursor = self.last_block.load(Ordering::SeqCst);
        if head <= cursor {
            return Ok(());
        }

        let from_block = cursor + 1;
        let to_block = head.min(from_block + self.config.max_block_range - 1);

        let logs = self
            .provider
            .get_logs(from_block, to_block, self.config.factory, *PAIR_CREATED_TOPIC)
            .await?;

        let total = logs.len();
        for log in &logs {
            self.dispatch_log(log).await;
        }

        self.last_block.store(to_block, Ordering::SeqCst);
        if total > 0 {
            log_info(&format!(
                "{} logs processados na janela {}-{}",
                total, from_block, to_block
            ))
            .await;
        }
        Ok(())
    }

    async fn dispatch_log(&self, log: &LogEntry) {
        let token = match decode_pair_created(log, self.config.weth) {
            Ok(Some(token)) => token,
            Ok(None) => {
                log_debug("par sem WETH ignorado").await;
                return;
            }
            Err(e) => {
                log_warn(&format!("falha ao decodificar log PairCreated: {}", e)).await;
                return;
            }
        };

        log_info(&format!(
            "novo par WETH detectado: token {} par {}",
            format_address(&token.address),
            format_address(&token.pair_address)
        ))
        .await;

        if let Err(e) = self.handler.on_new_pair(token).await {
            log_warn(&format!("handler falhou para o novo par: {}", e)).await;
        }
    }

    /// Dorme pelo período indicado, acordando cedo se `stop()` for chamado
    async fn interruptible_sleep(&self, duration: Duration) {
        if self.shutdown_requested() {
            return;
        }
        tokio::select! {
            _ = self.wakeup.notified() => {}
            _ = tokio::time::sleep(duration) => {}
        }
    }
}

/// Decodifica um log PairCreated em um Token
///
/// Os dois topics indexados carregam os endereços dos tokens do par; a primeira
/// palavra do campo `data` carrega o endereço do par. O lado que não é o WETH
/// é o token de interesse. Retorna Ok(None) quando nenhum dos lados é o WETH e
/// Err quando o log está malformado.
pub fn decode_pair_created(log: &LogEntry, weth: Address) -> Result<Option<Token>> {
    if log.topics.len() < 3 {
        return Err(Error::DecodeError(format!(
            "PairCreated requer 3 topics, log tem {}",
            log.topics.len()
        )));
    }
    if log.data.len() < 32 {
        return Err(Error::DecodeError(format!(
            "data de PairCreated com {} bytes, esperado no mínimo 32",
            log.data.len()
        )));
    }

    let token0 = topic_to_address(&log.topics[1]);
    let token1 = topic_to_address(&log.topics[2]);
    let pair = word_to_address(&log.data[0..32])
        .ok_or_else(|| Error::DecodeError("palavra do endereço do par inválida".to_string()))?;

    let subject = if token0 == weth {
        token1
    } else if token1 == weth {
        token0
    } else {
        return Ok(None);
    };

    Ok(Some(Token::new(subject, pair)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    fn topic_for(address: Address) -> H256 {
        let mut bytes = [0u8; 32];
        bytes[12..32].copy_from_slice(address.as_bytes());
        H256::from(bytes)
    }

    fn pair_created_log(token0: Address, token1: Address, pair: Address, block: u64) -> LogEntry {
        let mut data = [0u8; 32];
        data[12..32].copy_from_slice(pair.as_bytes());
        LogEntry {
            address: addr(0xfa),
            topics: vec![*PAIR_CREATED_TOPIC, topic_for(token0), topic_for(token1)],
            data: data.to_vec(),
            block_number: block,
            log_index: 0,
        }
    }

    /// Provedor falso com respostas roteirizadas por janela de blocos
    struct FakeProvider {
        heads: Mutex<VecDeque<Result<u64>>>,
        last_head: Mutex<u64>,
        logs: Mutex<Vec<LogEntry>>,
        queries: Mutex<Vec<(u64, u64)>>,
        head_calls: AtomicUsize,
    }

    impl FakeProvider {
        fn new(heads: Vec<Result<u64>>, logs: Vec<LogEntry>) -> Self {
            Self {
                heads: Mutex::new(heads.into_iter().collect()),
                last_head: Mutex::new(0),
                logs: Mutex::new(logs),
                queries: Mutex::new(Vec::new()),
                head_calls: AtomicUsize::new(0),
            }
        }

        fn queries(&self) -> Vec<(u64, u64)> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RpcProvider for FakeProvider {
        async fn get_block_number(&self) -> Result<u64> {
            self.head_calls.fetch_add(1, Ordering::SeqCst);
            let next = self.heads.lock().unwrap().pop_front();
            match next {
                Some(Ok(head)) => {
                    *self.last_head.lock().unwrap() = head;
                    Ok(head)
                }
                Some(Err(e)) => Err(e),
                // Roteiro esgotado: repete o último topo conhecido
                None => Ok(*self.last_head.lock().unwrap()),
            }
        }

        async fn get_logs(
            &self,
            from_block: u64,
            to_block: u64,
            _address: Address,
            _topic0: H256,
        ) -> Result<Vec<LogEntry>> {
            self.queries.lock().unwrap().push((from_block, to_block));
            let logs = self.logs.lock().unwrap();
            Ok(logs
                .iter()
                .filter(|l| l.block_number >= from_block && l.block_number <= to_block)
                .cloned()
                .collect())
        }

        async fn call(&self, _to: Address, _data: Vec<u8>) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }

        async fn get_code(&self, _address: Address) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    /// Handler que grava os tokens recebidos, na ordem de chegada
    struct Recorder {
        seen: Mutex<Vec<Address>>,
        fail: bool,
    }

    impl Recorder {
        fn new() -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        fn seen(&self) -> Vec<Address> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NewPairHandler for Recorder {
        async fn on_new_pair(&self, token: Token) -> Result<()> {
            self.seen.lock().unwrap().push(token.address);
            if self.fail {
                return Err(Error::Other("handler com defeito".to_string()));
            }
            Ok(())
        }
    }

    fn test_config() -> MonitorConfig {
        MonitorConfig {
            poll_interval: Duration::from_millis(5),
            reconnect_base_delay: Duration::from_millis(1),
            ..Default::default()
        }
    }

    async fn wait_until<F: Fn() -> bool>(condition: F) {
        for _ in 0..400 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condição não satisfeita dentro do tempo limite");
    }

    #[tokio::test]
    async fn dispatches_tokens_in_block_and_log_order() {
        let weth = MonitorConfig::default().weth;
        let logs = vec![
            pair_created_log(weth, addr(0x01), addr(0xa1), 101),
            pair_created_log(addr(0x02), weth, addr(0xa2), 102),
        ];
        let provider = Arc::new(FakeProvider::new(vec![Ok(100), Ok(102)], logs));
        let handler = Arc::new(Recorder::new());
        let monitor = Arc::new(PairMonitor::new(test_config(), provider.clone(), handler.clone()));

        let task = {
            let monitor = monitor.clone();
            tokio::spawn(async move { monitor.start().await })
        };

        wait_until(|| handler.seen().len() == 2).await;
        monitor.stop();
        task.await.unwrap();

        assert_eq!(handler.seen(), vec![addr(0x01), addr(0x02)]);
        assert_eq!(monitor.last_processed_block(), 102);
        assert_eq!(provider.queries(), vec![(101, 102)]);
    }

    #[tokio::test]
    async fn window_never_exceeds_max_block_range() {
        let provider = Arc::new(FakeProvider::new(vec![Ok(100), Ok(500)], Vec::new()));
        let handler = Arc::new(Recorder::new());
        let monitor = Arc::new(PairMonitor::new(test_config(), provider.clone(), handler));

        let task = {
            let monitor = monitor.clone();
            tokio::spawn(async move { monitor.start().await })
        };

        wait_until(|| !provider.queries().is_empty()).await;
        monitor.stop();
        task.await.unwrap();

        let queries = provider.queries();
        assert_eq!(queries[0], (101, 110));
        for (from, to) in queries {
            assert!(to - from + 1 <= 10);
        }
    }

    #[tokio::test]
    async fn no_log_query_when_head_equals_cursor() {
        let provider = Arc::new(FakeProvider::new(vec![Ok(100)], Vec::new()));
        let handler = Arc::new(Recorder::new());
        let monitor = Arc::new(PairMonitor::new(test_config(), provider.clone(), handler));

        let task = {
            let monitor = monitor.clone();
            tokio::spawn(async move { monitor.start().await })
        };

        // Vários ciclos com o topo parado no cursor
        wait_until(|| provider.head_calls.load(Ordering::SeqCst) >= 4).await;
        monitor.stop();
        task.await.unwrap();

        assert!(provider.queries().is_empty());
        assert_eq!(monitor.last_processed_block(), 100);
    }

    #[tokio::test]
    async fn handler_error_does_not_stall_cursor() {
        let weth = MonitorConfig::default().weth;
        let logs = vec![pair_created_log(weth, addr(0x05), addr(0xa5), 101)];
        let provider = Arc::new(FakeProvider::new(vec![Ok(100), Ok(101)], logs));
        let handler = Arc::new(Recorder::failing());
        let monitor = Arc::new(PairMonitor::new(test_config(), provider, handler.clone()));

        let task = {
            let monitor = monitor.clone();
            tokio::spawn(async move { monitor.start().await })
        };

        wait_until(|| monitor.last_processed_block() == 101).await;
        monitor.stop();
        task.await.unwrap();

        assert_eq!(handler.seen(), vec![addr(0x05)]);
    }

    #[tokio::test]
    async fn monitor_stops_after_reconnect_ceiling() {
        let mut config = test_config();
        config.max_reconnect_attempts = 2;

        let heads: Vec<Result<u64>> = vec![
            Ok(100),
            Err(Error::RpcError("indisponível".to_string())),
            Err(Error::RpcError("indisponível".to_string())),
            Err(Error::RpcError("indisponível".to_string())),
        ];
        let provider = Arc::new(FakeProvider::new(heads, Vec::new()));
        // Depois do roteiro o provedor voltaria a responder; o monitor não
        // pode chegar lá se respeitar o teto de tentativas
        let handler = Arc::new(Recorder::new());
        let monitor = Arc::new(PairMonitor::new(config, provider.clone(), handler));

        let task = {
            let monitor = monitor.clone();
            tokio::spawn(async move { monitor.start().await })
        };

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("o monitor deve se encerrar sozinho")
            .unwrap();

        // 1 chamada inicial + exatamente max_reconnect_attempts + 1 falhas
        assert_eq!(provider.head_calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn reconnect_backoff_grows_exponentially_and_caps() {
        let mut state = ReconnectState::default();
        let base = Duration::from_secs(1);

        assert_eq!(
            state.record_failure(base, 10),
            ReconnectAction::Retry(Duration::from_secs(1))
        );
        assert_eq!(
            state.record_failure(base, 10),
            ReconnectAction::Retry(Duration::from_secs(2))
        );
        assert_eq!(
            state.record_failure(base, 10),
            ReconnectAction::Retry(Duration::from_secs(4))
        );

        // Atrasos longos ficam limitados ao teto de 60s
        for _ in 0..5 {
            state.record_failure(base, 100);
        }
        assert_eq!(
            state.record_failure(base, 100),
            ReconnectAction::Retry(Duration::from_secs(60))
        );

        state.reset();
        assert_eq!(state.attempts(), 0);
    }

    #[test]
    fn reconnect_gives_up_past_ceiling() {
        let mut state = ReconnectState::default();
        let base = Duration::from_millis(1);

        for _ in 0..3 {
            assert!(matches!(
                state.record_failure(base, 3),
                ReconnectAction::Retry(_)
            ));
        }
        assert_eq!(state.record_failure(base, 3), ReconnectAction::GiveUp);
    }

    #[tokio::test]
    async fn pair_sender_forwards_tokens_in_order() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = PairSender::new(tx);

        sender
            .on_new_pair(Token::new(addr(0x01), addr(0xa1)))
            .await
            .unwrap();
        sender
            .on_new_pair(Token::new(addr(0x02), addr(0xa2)))
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().address, addr(0x01));
        assert_eq!(rx.recv().await.unwrap().address, addr(0x02));
    }

    #[tokio::test]
    async fn pair_sender_reports_closed_consumer() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let sender = PairSender::new(tx);
        let result = sender.on_new_pair(Token::new(addr(0x03), addr(0xa3))).await;
        assert!(result.is_err());
    }

    #[test]
    fn decode_identifies_non_weth_side() {
        let weth = MonitorConfig::default().weth;

        let log = pair_created_log(weth, addr(0x01), addr(0xaa), 10);
        let token = decode_pair_created(&log, weth).unwrap().unwrap();
        assert_eq!(token.address, addr(0x01));
        assert_eq!(token.pair_address, addr(0xaa));

        let log = pair_created_log(addr(0x02), weth, addr(0xbb), 11);
        let token = decode_pair_created(&log, weth).unwrap().unwrap();
        assert_eq!(token.address, addr(0x02));
    }

    #[test]
    fn decode_skips_pairs_without_weth() {
        let weth = MonitorConfig::default().weth;
        let log = pair_created_log(addr(0x01), addr(0x02), addr(0xcc), 12);
        assert!(decode_pair_created(&log, weth).unwrap().is_none());
    }

    #[test]
    fn decode_rejects_malformed_logs() {
        let weth = MonitorConfig::default().weth;

        let mut log = pair_created_log(weth, addr(0x01), addr(0xaa), 13);
        log.topics.truncate(2);
        assert!(decode_pair_created(&log, weth).is_err());

        let mut log = pair_created_log(weth, addr(0x01), addr(0xaa), 14);
        log.data.truncate(8);
        assert!(decode_pair_created(&log, weth).is_err());
    }
}
