//! The indexer loop.
//!
//! Each iteration persists the lower bound, checks for cancellation, asks the
//! node for its head, fetches logs for one window and feeds them through the
//! [`EventProcessor`]. Head and checkpoint failures stall the iteration in
//! place; a failed log fetch skips the window.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::IndexerSettings;
use super::range::next_range;
use crate::chain::ChainClient;
use crate::decoder::EventProcessor;
use crate::error::AppError;
use crate::notify::Notifier;
use crate::persistence::CheckpointStore;

/// How the loop ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The cancellation token fired.
    Cancelled,
    /// The checkpoint timestamp is not in the past; nothing was processed.
    CheckpointNotReady,
}

/// One indexer loop for a single chain/contract pair.
#[derive(Debug)]
pub struct IndexerLoop {
    chain: Arc<dyn ChainClient>,
    checkpoints: Arc<dyn CheckpointStore>,
    processor: EventProcessor,
    notifier: Notifier,
    settings: IndexerSettings,
    cancel: CancellationToken,
}

impl IndexerLoop {
    /// Wires a loop together. Nothing runs until [`Self::run`] or
    /// [`Self::start`].
    #[must_use]
    pub fn new(
        chain: Arc<dyn ChainClient>,
        checkpoints: Arc<dyn CheckpointStore>,
        processor: EventProcessor,
        notifier: Notifier,
        settings: IndexerSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            chain,
            checkpoints,
            processor,
            notifier,
            settings,
            cancel,
        }
    }

    /// Spawns the loop on the Tokio runtime.
    pub fn start(self) -> JoinHandle<Result<LoopExit, AppError>> {
        tokio::spawn(self.run())
    }

    /// Runs until cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::CheckpointMissing`] when no checkpoint is seeded,
    /// the store error if the checkpoint cannot be read, and
    /// [`AppError::RetriesExhausted`] once a bounded retry policy gives up.
    pub async fn run(self) -> Result<LoopExit, AppError> {
        let chain_id = self.settings.chain_id;
        let checkpoint = self
            .checkpoints
            .load(chain_id)
            .await?
            .ok_or(AppError::CheckpointMissing(chain_id))?;

        let now = chrono::Utc::now().timestamp();
        if !checkpoint.is_ready(now) {
            warn!(
                chain_id,
                last_indexed_time = checkpoint.last_indexed_time,
                now,
                "checkpoint timestamp is not in the past, indexer not started"
            );
            return Ok(LoopExit::CheckpointNotReady);
        }

        info!(
            chain_id,
            contract = %self.settings.contract,
            from = checkpoint.last_indexed_block,
            window = self.settings.window,
            "indexer started"
        );

        let mut lower = checkpoint.last_indexed_block;
        let mut failures: u32 = 0;

        loop {
            if let Err(e) = self.checkpoints.save_block(chain_id, lower).await {
                error!(chain_id, block = lower, error = %e, "failed to persist checkpoint");
                if self.back_off(&mut failures, "checkpoint write").await? {
                    return Ok(LoopExit::Cancelled);
                }
                continue;
            }

            if self.cancel.is_cancelled() {
                info!(chain_id, block = lower, "indexer cancelled");
                return Ok(LoopExit::Cancelled);
            }

            let head = match self.chain.block_number().await {
                Ok(head) => head,
                Err(e) => {
                    error!(chain_id, error = %e, "failed to query chain head");
                    if self.back_off(&mut failures, "block height query").await? {
                        return Ok(LoopExit::Cancelled);
                    }
                    continue;
                }
            };
            failures = 0;

            let Some(range) = next_range(lower, head, self.settings.window) else {
                debug!(chain_id, head, lower, "no new blocks");
                if self.pause(self.settings.retry.pause()).await {
                    return Ok(LoopExit::Cancelled);
                }
                continue;
            };

            match self
                .chain
                .filter_logs(range.from, range.to, self.settings.contract)
                .await
            {
                Ok(logs) => {
                    if !logs.is_empty() {
                        debug!(
                            chain_id,
                            from = range.from,
                            to = range.to,
                            count = logs.len(),
                            "processing logs"
                        );
                    }
                    for log in &logs {
                        self.processor.process(log).await;
                        self.notifier.signal().await;
                    }
                }
                Err(e) => {
                    error!(
                        chain_id,
                        from = range.from,
                        to = range.to,
                        error = %e,
                        "log fetch failed, skipping range"
                    );
                    if self.pause(self.settings.retry.pause()).await {
                        return Ok(LoopExit::Cancelled);
                    }
                }
            }

            lower = range.next_lower();
        }
    }

    /// Records a failure and sleeps per the retry policy. Returns `true` if
    /// cancelled while waiting.
    async fn back_off(
        &self,
        failures: &mut u32,
        operation: &'static str,
    ) -> Result<bool, AppError> {
        *failures = failures.saturating_add(1);
        let Some(delay) = self.settings.retry.delay_for(*failures) else {
            return Err(AppError::RetriesExhausted {
                operation,
                attempts: *failures,
            });
        };
        Ok(self.pause(delay).await)
    }

    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => true,
            () = tokio::time::sleep(delay) => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::sync::Mutex;

    use alloy::primitives::{Address, B256, U256};
    use alloy::sol_types::SolEvent;
    use async_trait::async_trait;

    use super::*;
    use crate::chain::RawLog;
    use crate::decoder::events::StatusChanged;
    use crate::domain::{Checkpoint, TokenTypeMap};
    use crate::indexer::RetryPolicy;
    use crate::persistence::{
        MemoryCheckpointStore, MemoryQueue, MemorySnapshotStore, NotificationQueue, SnapshotStore,
    };

    const CHAIN: i64 = 8453;

    /// Chain double with a scripted head sequence. Once the script runs out
    /// it keeps returning the last head and cancels the loop after
    /// `idle_heads` further queries.
    #[derive(Debug)]
    struct ScriptedChain {
        heads: Mutex<VecDeque<Result<u64, AppError>>>,
        last_head: Mutex<u64>,
        idle_heads: Mutex<u32>,
        logs: HashMap<u64, Vec<RawLog>>,
        failing_from: HashSet<u64>,
        ranges: Mutex<Vec<(u64, u64)>>,
        cancel: CancellationToken,
    }

    impl ScriptedChain {
        fn new(heads: Vec<Result<u64, AppError>>, cancel: CancellationToken) -> Self {
            Self {
                heads: Mutex::new(heads.into()),
                last_head: Mutex::new(0),
                idle_heads: Mutex::new(2),
                logs: HashMap::new(),
                failing_from: HashSet::new(),
                ranges: Mutex::new(Vec::new()),
                cancel,
            }
        }

        fn with_logs(mut self, block: u64, logs: Vec<RawLog>) -> Self {
            self.logs.insert(block, logs);
            self
        }

        fn failing_at(mut self, from: u64) -> Self {
            self.failing_from.insert(from);
            self
        }

        fn ranges(&self) -> Vec<(u64, u64)> {
            self.ranges.lock().map(|r| r.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl ChainClient for ScriptedChain {
        async fn block_number(&self) -> Result<u64, AppError> {
            let next = self
                .heads
                .lock()
                .map_err(|_| AppError::Internal("poisoned".into()))?
                .pop_front();
            let mut last = self
                .last_head
                .lock()
                .map_err(|_| AppError::Internal("poisoned".into()))?;
            match next {
                Some(Ok(head)) => {
                    *last = head;
                    Ok(head)
                }
                Some(Err(e)) => Err(e),
                None => {
                    let mut idle = self
                        .idle_heads
                        .lock()
                        .map_err(|_| AppError::Internal("poisoned".into()))?;
                    *idle = idle.saturating_sub(1);
                    if *idle == 0 {
                        self.cancel.cancel();
                    }
                    Ok(*last)
                }
            }
        }

        async fn filter_logs(
            &self,
            from: u64,
            to: u64,
            _contract: Address,
        ) -> Result<Vec<RawLog>, AppError> {
            if let Ok(mut ranges) = self.ranges.lock() {
                ranges.push((from, to));
            }
            if self.failing_from.contains(&from) {
                return Err(AppError::Chain("range too large".into()));
            }
            Ok((from..=to)
                .filter_map(|b| self.logs.get(&b))
                .flatten()
                .cloned()
                .collect())
        }
    }

    fn status_log(block: u64) -> RawLog {
        let data = StatusChanged {
            utilizationRate: U256::from(500),
            totalBorrow: U256::from(1_000u64),
            totalDeposits: U256::from(2_000u64),
            interestRate: U256::from(300),
        }
        .encode_log_data();
        RawLog {
            address: Address::repeat_byte(0xaa),
            topics: data.topics().to_vec(),
            data: data.data,
            tx_hash: B256::repeat_byte(0x01),
            block_number: block,
            log_index: 0,
        }
    }

    struct Harness {
        chain: Arc<ScriptedChain>,
        checkpoints: Arc<MemoryCheckpointStore>,
        snapshots: Arc<MemorySnapshotStore>,
        queue: Arc<MemoryQueue>,
        indexer: IndexerLoop,
    }

    fn harness(
        chain: ScriptedChain,
        checkpoints: MemoryCheckpointStore,
        retry: RetryPolicy,
    ) -> Harness {
        let cancel = chain.cancel.clone();
        let chain = Arc::new(chain);
        let checkpoints = Arc::new(checkpoints);
        let snapshots = Arc::new(MemorySnapshotStore::new());
        let queue = Arc::new(MemoryQueue::new());
        let processor = EventProcessor::new(
            Arc::clone(&snapshots) as Arc<dyn SnapshotStore>,
            TokenTypeMap::default(),
        );
        let notifier = Notifier::new(Arc::clone(&queue) as Arc<dyn NotificationQueue>, "q");
        let indexer = IndexerLoop::new(
            Arc::clone(&chain) as Arc<dyn ChainClient>,
            Arc::clone(&checkpoints) as Arc<dyn CheckpointStore>,
            processor,
            notifier,
            IndexerSettings {
                chain_id: CHAIN,
                contract: Address::repeat_byte(0xaa),
                window: 5,
                retry,
            },
            cancel,
        );
        Harness {
            chain,
            checkpoints,
            snapshots,
            queue,
            indexer,
        }
    }

    fn seeded(block: u64) -> MemoryCheckpointStore {
        MemoryCheckpointStore::seeded(Checkpoint::new(CHAIN, block, 0))
    }

    #[tokio::test(start_paused = true)]
    async fn walks_windows_up_to_head() {
        let chain = ScriptedChain::new(vec![Ok(100), Ok(100)], CancellationToken::new())
            .with_logs(92, vec![status_log(92)]);
        let h = harness(chain, seeded(90), RetryPolicy::default());

        let result = h.indexer.run().await;

        assert!(matches!(result, Ok(LoopExit::Cancelled)));
        assert_eq!(h.chain.ranges(), vec![(90, 95), (96, 100)]);
        assert_eq!(h.checkpoints.get(CHAIN).map(|c| c.last_indexed_block), Some(101));
        assert_eq!(h.snapshots.lend_rows().len(), 1);
        assert_eq!(h.queue.len("q"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_window_writes_nothing() {
        let chain = ScriptedChain::new(vec![Ok(104)], CancellationToken::new());
        let h = harness(chain, seeded(100), RetryPolicy::default());

        let result = h.indexer.run().await;

        assert!(matches!(result, Ok(LoopExit::Cancelled)));
        assert_eq!(h.chain.ranges(), vec![(100, 104)]);
        assert!(h.snapshots.lend_rows().is_empty());
        assert_eq!(h.queue.len("q"), 0);
        assert_eq!(h.checkpoints.get(CHAIN).map(|c| c.last_indexed_block), Some(105));
    }

    #[tokio::test(start_paused = true)]
    async fn one_notification_per_log_even_without_a_write() {
        let mut unknown = status_log(91);
        unknown.topics = vec![B256::repeat_byte(0x33)];
        let chain = ScriptedChain::new(vec![Ok(95)], CancellationToken::new())
            .with_logs(91, vec![unknown, status_log(91)]);
        let h = harness(chain, seeded(90), RetryPolicy::default());

        let _ = h.indexer.run().await;

        assert_eq!(h.snapshots.lend_rows().len(), 1);
        assert_eq!(h.queue.len("q"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetch_skips_range() {
        let chain = ScriptedChain::new(vec![Ok(100), Ok(100)], CancellationToken::new())
            .with_logs(92, vec![status_log(92)])
            .failing_at(90);
        let h = harness(chain, seeded(90), RetryPolicy::default());

        let _ = h.indexer.run().await;

        assert_eq!(h.chain.ranges(), vec![(90, 95), (96, 100)]);
        assert!(h.snapshots.lend_rows().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn head_failure_retries_same_range() {
        let chain = ScriptedChain::new(
            vec![Err(AppError::Chain("timeout".into())), Ok(95)],
            CancellationToken::new(),
        );
        let h = harness(chain, seeded(90), RetryPolicy::default());

        let result = h.indexer.run().await;

        assert!(matches!(result, Ok(LoopExit::Cancelled)));
        assert_eq!(h.chain.ranges(), vec![(90, 95)]);
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_policy_gives_up() {
        let chain = ScriptedChain::new(
            vec![
                Err(AppError::Chain("down".into())),
                Err(AppError::Chain("down".into())),
            ],
            CancellationToken::new(),
        );
        let retry = RetryPolicy {
            max_attempts: 2,
            ..RetryPolicy::fixed(Duration::from_secs(1))
        };
        let h = harness(chain, seeded(90), retry);

        let result = h.indexer.run().await;

        assert!(matches!(
            result,
            Err(AppError::RetriesExhausted { attempts: 2, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn checkpoint_write_failure_blocks_progress_then_recovers() {
        let checkpoints = seeded(90);
        checkpoints.fail_next_writes(3);
        let chain = ScriptedChain::new(vec![Ok(95)], CancellationToken::new());
        let h = harness(chain, checkpoints, RetryPolicy::default());

        let result = h.indexer.run().await;

        assert!(matches!(result, Ok(LoopExit::Cancelled)));
        assert_eq!(h.chain.ranges(), vec![(90, 95)]);
        assert_eq!(h.checkpoints.get(CHAIN).map(|c| c.last_indexed_block), Some(96));
    }

    #[tokio::test]
    async fn missing_checkpoint_is_fatal() {
        let chain = ScriptedChain::new(vec![], CancellationToken::new());
        let h = harness(chain, MemoryCheckpointStore::new(), RetryPolicy::default());

        let result = h.indexer.run().await;

        assert!(matches!(result, Err(AppError::CheckpointMissing(CHAIN))));
        assert!(h.chain.ranges().is_empty());
    }

    #[tokio::test]
    async fn future_checkpoint_time_exits_without_processing() {
        let future = chrono::Utc::now().timestamp() + 3_600;
        let checkpoints = MemoryCheckpointStore::seeded(Checkpoint::new(CHAIN, 90, future));
        let chain = ScriptedChain::new(vec![Ok(100)], CancellationToken::new());
        let h = harness(chain, checkpoints, RetryPolicy::default());

        let result = h.indexer.run().await;

        assert!(matches!(result, Ok(LoopExit::CheckpointNotReady)));
        assert!(h.chain.ranges().is_empty());
    }

    #[tokio::test]
    async fn pre_cancelled_loop_persists_then_exits() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let chain = ScriptedChain::new(vec![Ok(100)], cancel);
        let h = harness(chain, seeded(90), RetryPolicy::default());

        let result = h.indexer.run().await;

        assert!(matches!(result, Ok(LoopExit::Cancelled)));
        assert!(h.chain.ranges().is_empty());
        assert_eq!(h.checkpoints.get(CHAIN).map(|c| c.last_indexed_block), Some(90));
    }
}
