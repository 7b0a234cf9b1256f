//! Search driver
//!
//! Ties the explorer, a miner and a storage together. One batch is:
//!
//! 1. `next_batch` emits coordinates, advancing only the in-memory cursor
//! 2. the miner fills digests and rarity flags
//! 3. `store_batch` makes every result durable with one group commit
//! 4. `flush` makes the cursor durable
//!
//! A crash between 3 and 4 re-emits the same batch on restart, which the
//! idempotent store absorbs. A failure at any step rewinds the explorer to
//! its durable cursor, so the next attempt retries the same coordinates.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::config::{ConfigError, SearchConfig};
use crate::crash_point::{maybe_crash, points};
use crate::errors::{ErrorKind, Severity};
use crate::explorer::{ExplorerCursor, ExplorerError, SpiralExplorer};
use crate::miner::{create_miner, Coordinate, Miner, MinerError, WorkItem};
use crate::observability::{
    log_event_with_fields, Event, MetricsRegistry, MetricsSnapshot, Timer,
};
use crate::storage::{Storage, StorageError};

pub type DriverResult<T> = Result<T, DriverError>;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Explorer(#[from] ExplorerError),

    #[error(transparent)]
    Miner(#[from] MinerError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl DriverError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DriverError::Config(e) => e.kind(),
            DriverError::Explorer(e) => e.kind(),
            DriverError::Miner(e) => e.kind(),
            DriverError::Storage(e) => e.kind(),
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            DriverError::Explorer(e) => e.severity(),
            DriverError::Storage(e) => e.severity(),
            _ => self.kind().severity(),
        }
    }
}

/// A rare coordinate and its digest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RareFind {
    pub coordinate: Coordinate,
    pub digest: String,
}

/// Outcome of one batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub first: Coordinate,
    pub items: usize,
    pub rare: Vec<RareFind>,
    /// Cells emitted over the search's lifetime after this batch
    pub emitted: String,
}

/// Outcome of a run of several batches
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub backend: &'static str,
    pub batches: u64,
    pub rare: Vec<RareFind>,
    pub cursor: ExplorerCursor,
    pub elapsed_ms: u64,
    pub hashes_per_sec: f64,
    pub metrics: MetricsSnapshot,
}

/// Drives a search over a storage it owns.
pub struct Driver<S: Storage> {
    config: SearchConfig,
    storage: S,
    explorer: SpiralExplorer,
    miner: Box<dyn Miner>,
    metrics: MetricsRegistry,
    run_id: Uuid,
}

impl<S: Storage> Driver<S> {
    /// Validates `config`, selects the miner and resumes the explorer.
    ///
    /// When the configured backend is unavailable and `fallback_to_cpu` is
    /// set, the CPU backend is used instead and a warning is logged.
    pub fn new(config: SearchConfig, storage: S) -> DriverResult<Self> {
        config.validate()?;
        let metrics = MetricsRegistry::new();
        let miner = match create_miner(&config.miner_config()) {
            Ok(miner) => miner,
            Err(e) => match config.fallback_miner_config() {
                Some(fallback) if e.allows_fallback() => {
                    log_fallback(&e, "init");
                    metrics.increment_backend_fallbacks();
                    create_miner(&fallback)?
                }
                _ => return Err(e.into()),
            },
        };
        Self::assemble(config, storage, miner, metrics)
    }

    /// Like `new` with an explicit miner.
    pub fn with_miner(
        config: SearchConfig,
        storage: S,
        miner: Box<dyn Miner>,
    ) -> DriverResult<Self> {
        config.validate()?;
        Self::assemble(config, storage, miner, MetricsRegistry::new())
    }

    fn assemble(
        config: SearchConfig,
        storage: S,
        miner: Box<dyn Miner>,
        metrics: MetricsRegistry,
    ) -> DriverResult<Self> {
        let explorer = SpiralExplorer::open(&storage, config.origin)?;
        let run_id = Uuid::new_v4();
        log_event_with_fields(
            Event::BackendSelected,
            &[("backend", miner.name()), ("run_id", &run_id.to_string())],
        );
        Ok(Self {
            config,
            storage,
            explorer,
            miner,
            metrics,
            run_id,
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn explorer(&self) -> &SpiralExplorer {
        &self.explorer
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    pub fn backend(&self) -> &'static str {
        self.miner.name()
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    /// Mines, stores and commits one batch.
    pub fn run_batch(&mut self) -> DriverResult<BatchReport> {
        let result = self.try_batch();
        if result.is_err() {
            self.explorer.rewind();
        }
        result
    }

    fn try_batch(&mut self) -> DriverResult<BatchReport> {
        let coordinates = self.explorer.next_batch(self.config.batch_size);
        let first = coordinates[0];
        let items = self.mine(&coordinates)?;

        let rare: Vec<RareFind> = items
            .iter()
            .filter(|item| item.is_rare())
            .filter_map(|item| {
                item.digest().map(|digest| RareFind {
                    coordinate: item.coordinate(),
                    digest: digest.to_hex(),
                })
            })
            .collect();
        self.metrics
            .record_batch(items.len() as u64, rare.len() as u64);
        log_event_with_fields(
            Event::BatchMined,
            &[
                ("backend", self.miner.name()),
                ("first", &first.to_string()),
                ("items", &items.len().to_string()),
                ("rare", &rare.len().to_string()),
            ],
        );

        self.storage.store_batch(&items)?;
        self.metrics.add_records_stored(items.len() as u64);
        log_event_with_fields(Event::BatchStored, &[("items", &items.len().to_string())]);

        maybe_crash(points::DRIVER_AFTER_STORE);

        self.explorer.flush(&mut self.storage)?;
        self.metrics.increment_cursor_flushes();

        for find in &rare {
            log_event_with_fields(
                Event::RareFound,
                &[
                    ("x", &find.coordinate.x.to_string()),
                    ("y", &find.coordinate.y.to_string()),
                    ("digest", &find.digest),
                ],
            );
        }

        Ok(BatchReport {
            first,
            items: items.len(),
            rare,
            emitted: self.explorer.emitted().to_string(),
        })
    }

    fn mine(&mut self, coordinates: &[Coordinate]) -> DriverResult<Vec<WorkItem>> {
        let mut items: Vec<WorkItem> = coordinates.iter().copied().map(WorkItem::new).collect();
        let (rarity, key) = (self.config.rarity, self.config.key);

        match self.miner.mine_batch(&mut items, rarity, key) {
            Ok(()) => Ok(items),
            Err(e) => {
                let fallback = match self.config.fallback_miner_config() {
                    Some(fallback) if e.allows_fallback() && self.miner.name() != "cpu" => {
                        fallback
                    }
                    _ => return Err(e.into()),
                };
                log_fallback(&e, "mine_batch");
                self.metrics.increment_backend_fallbacks();
                self.miner = create_miner(&fallback)?;

                let mut items: Vec<WorkItem> =
                    coordinates.iter().copied().map(WorkItem::new).collect();
                self.miner.mine_batch(&mut items, rarity, key)?;
                Ok(items)
            }
        }
    }

    /// Runs `batches` batches and reports throughput and rare finds.
    pub fn run(&mut self, batches: u64) -> DriverResult<RunReport> {
        let timer = Timer::new();
        let run_id = self.run_id.to_string();
        log_event_with_fields(
            Event::RunStart,
            &[
                ("run_id", &run_id),
                ("batches", &batches.to_string()),
                ("batch_size", &self.config.batch_size.to_string()),
                ("backend", self.miner.name()),
            ],
        );

        let mut rare = Vec::new();
        for _ in 0..batches {
            rare.extend(self.run_batch()?.rare);
        }

        let metrics = self.metrics.snapshot();
        let elapsed = timer.elapsed_secs();
        let hashes_per_sec = if elapsed > 0.0 {
            metrics.hashes_mined as f64 / elapsed
        } else {
            0.0
        };
        let elapsed_ms = timer.elapsed_millis();
        log_event_with_fields(
            Event::RunComplete,
            &[
                ("run_id", &run_id),
                ("hashes", &metrics.hashes_mined.to_string()),
                ("rare", &metrics.rare_found.to_string()),
                ("elapsed_ms", &elapsed_ms.to_string()),
                ("hashes_per_sec", &format!("{:.0}", hashes_per_sec)),
            ],
        );

        Ok(RunReport {
            run_id: self.run_id,
            backend: self.miner.name(),
            batches,
            rare,
            cursor: self.explorer.persisted_cursor(),
            elapsed_ms,
            hashes_per_sec,
            metrics,
        })
    }
}

fn log_fallback(error: &MinerError, during: &str) {
    log_event_with_fields(
        Event::BackendFallback,
        &[
            ("during", during),
            ("error", &error.to_string()),
            ("fallback", "cpu"),
        ],
    );
}
