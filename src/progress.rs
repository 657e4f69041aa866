//! Checkpointed batch progress with atomic file writes.
//!
//! A full-universe scan can take hours, so completed work must survive
//! a crash or interruption. The checkpoint records which pairs are done
//! and the surviving results per batch; on restart the manager loads it
//! and hands back only the remaining pairs.
//!
//! # Safety
//! - Uses atomic file writes (write to temp, fsync, rename) so a crash
//!   mid-save leaves either the old checkpoint or the new one, never a
//!   torn file
//! - A corrupt or unreadable checkpoint is discarded, not propagated
//! - The checkpoint carries a configuration fingerprint; resuming under
//!   changed analytic parameters discards the stale file

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::ProgressConfig;
use crate::error::ScanError;
use crate::types::{Pair, PairRecord};

/// Lifecycle of a scan task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStatus {
    New,
    Running,
    Completed,
}

/// Results of one completed batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRecord {
    pub batch_index: usize,
    /// Pairs processed in this batch (including ones that failed gates)
    pub batch_size: usize,
    /// Pairs from this batch that survived every gate
    pub results: Vec<PairRecord>,
    pub completed_at: DateTime<Utc>,
}

/// On-disk checkpoint state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub status: CheckpointStatus,
    pub config_fingerprint: u64,
    pub total_pairs: usize,
    pub total_batches: usize,
    pub current_batch: usize,
    pub completed_pairs: HashSet<Pair>,
    pub batch_results: Vec<BatchRecord>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Checkpoint {
    fn new(fingerprint: u64) -> Self {
        let now = Utc::now();
        Self {
            status: CheckpointStatus::New,
            config_fingerprint: fingerprint,
            total_pairs: 0,
            total_batches: 0,
            current_batch: 0,
            completed_pairs: HashSet::new(),
            batch_results: Vec::new(),
            started_at: now,
            updated_at: now,
            finished_at: None,
        }
    }
}

/// Snapshot of scan progress for logging and reporting.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    pub status: CheckpointStatus,
    pub completed_pairs: usize,
    pub total_pairs: usize,
    pub completed_batches: usize,
    pub total_batches: usize,
    pub progress_pct: f64,
    pub surviving_pairs: usize,
}

/// Manages batching, checkpoint persistence and resume.
#[derive(Debug)]
pub struct ProgressManager {
    config: ProgressConfig,
    path: PathBuf,
    checkpoint: Checkpoint,
    /// Batches completed since the last flush
    unsaved_batches: usize,
}

impl ProgressManager {
    /// Load the checkpoint at the configured path, or start fresh when
    /// it is missing, unreadable, or was written under a different
    /// analytic configuration.
    pub fn load(config: ProgressConfig, fingerprint: u64) -> Self {
        let path = PathBuf::from(&config.checkpoint_path);

        let checkpoint = match fs::read_to_string(&path) {
            Ok(data) => match serde_json::from_str::<Checkpoint>(&data) {
                Ok(cp) if cp.config_fingerprint == fingerprint => {
                    info!(
                        path = %path.display(),
                        completed = cp.completed_pairs.len(),
                        status = ?cp.status,
                        "Loaded checkpoint"
                    );
                    cp
                }
                Ok(cp) => {
                    warn!(
                        path = %path.display(),
                        old = cp.config_fingerprint,
                        new = fingerprint,
                        "Checkpoint was written under a different configuration, starting fresh"
                    );
                    Checkpoint::new(fingerprint)
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Corrupt checkpoint, starting fresh");
                    Checkpoint::new(fingerprint)
                }
            },
            Err(_) => {
                debug!(path = %path.display(), "No checkpoint found, starting fresh");
                Checkpoint::new(fingerprint)
            }
        };

        Self {
            config,
            path,
            checkpoint,
            unsaved_batches: 0,
        }
    }

    /// Persist the checkpoint atomically: write to a temp file beside
    /// the target, fsync, then rename into place.
    pub fn save(&self) -> Result<(), ScanError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(&self.checkpoint)?;
        let temp_path = self.path.with_extension("json.tmp");

        let mut file = fs::File::create(&temp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;

        // Atomic on the same filesystem: a crash leaves old or new,
        // never a partial file
        fs::rename(&temp_path, &self.path)?;

        debug!(path = %self.path.display(), "Checkpoint saved");
        Ok(())
    }

    /// Begin (or resume) a task over the given total pair count.
    ///
    /// A completed checkpoint for a different universe size, or a fresh
    /// one, resets the state; a running checkpoint over the same count
    /// resumes where it left off.
    pub fn initialize_task(&mut self, total_pairs: usize) -> Result<(), ScanError> {
        let resumable = self.checkpoint.status == CheckpointStatus::Running
            && self.checkpoint.total_pairs == total_pairs;

        if !resumable {
            if self.checkpoint.status == CheckpointStatus::Running {
                warn!(
                    old = self.checkpoint.total_pairs,
                    new = total_pairs,
                    "Universe size changed mid-task, restarting scan"
                );
            }
            self.checkpoint = Checkpoint::new(self.checkpoint.config_fingerprint);
            self.checkpoint.total_pairs = total_pairs;
            self.checkpoint.total_batches = total_pairs.div_ceil(self.config.batch_size);
        }

        self.checkpoint.status = CheckpointStatus::Running;
        self.checkpoint.updated_at = Utc::now();
        self.save()?;

        info!(
            total_pairs,
            total_batches = self.checkpoint.total_batches,
            already_done = self.checkpoint.completed_pairs.len(),
            "Task initialized"
        );
        Ok(())
    }

    /// Filter out pairs already completed in a previous run, preserving
    /// input order.
    pub fn get_remaining_pairs(&self, pairs: &[Pair]) -> Vec<Pair> {
        pairs
            .iter()
            .filter(|p| !self.checkpoint.completed_pairs.contains(*p))
            .cloned()
            .collect()
    }

    /// Split pairs into batches of the configured size.
    pub fn create_batches(&self, pairs: Vec<Pair>) -> Vec<Vec<Pair>> {
        pairs
            .chunks(self.config.batch_size)
            .map(|chunk| chunk.to_vec())
            .collect()
    }

    /// Record a completed batch. The checkpoint is flushed to disk every
    /// `save_interval` batches; intermediate batches stay in memory.
    pub fn mark_batch_completed(
        &mut self,
        batch: &[Pair],
        results: Vec<PairRecord>,
    ) -> Result<(), ScanError> {
        self.checkpoint.current_batch += 1;
        self.checkpoint
            .completed_pairs
            .extend(batch.iter().cloned());
        self.checkpoint.batch_results.push(BatchRecord {
            batch_index: self.checkpoint.current_batch,
            batch_size: batch.len(),
            results,
            completed_at: Utc::now(),
        });
        self.checkpoint.updated_at = Utc::now();

        self.unsaved_batches += 1;
        if self.unsaved_batches >= self.config.save_interval {
            self.save()?;
            self.unsaved_batches = 0;
        }
        Ok(())
    }

    /// Mark the task completed and flush a final checkpoint.
    pub fn finalize(&mut self) -> Result<(), ScanError> {
        self.checkpoint.status = CheckpointStatus::Completed;
        let now = Utc::now();
        self.checkpoint.updated_at = now;
        self.checkpoint.finished_at = Some(now);
        self.save()?;
        self.unsaved_batches = 0;

        info!(
            surviving = self.surviving_count(),
            completed = self.checkpoint.completed_pairs.len(),
            "Task finalized"
        );
        Ok(())
    }

    /// All surviving results accumulated across batches, including ones
    /// restored from a resumed checkpoint.
    pub fn get_all_results(&self) -> Vec<PairRecord> {
        self.checkpoint
            .batch_results
            .iter()
            .flat_map(|b| b.results.iter().cloned())
            .collect()
    }

    /// Current progress snapshot.
    pub fn progress_info(&self) -> ProgressInfo {
        let total = self.checkpoint.total_pairs;
        let done = self.checkpoint.completed_pairs.len();
        ProgressInfo {
            status: self.checkpoint.status,
            completed_pairs: done,
            total_pairs: total,
            completed_batches: self.checkpoint.current_batch,
            total_batches: self.checkpoint.total_batches,
            progress_pct: if total == 0 {
                0.0
            } else {
                done as f64 / total as f64 * 100.0
            },
            surviving_pairs: self.surviving_count(),
        }
    }

    /// Delete the checkpoint file and reset in-memory state.
    pub fn reset(&mut self) -> Result<(), ScanError> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
            info!(path = %self.path.display(), "Checkpoint deleted");
        }
        self.checkpoint = Checkpoint::new(self.checkpoint.config_fingerprint);
        self.unsaved_batches = 0;
        Ok(())
    }

    pub fn status(&self) -> CheckpointStatus {
        self.checkpoint.status
    }

    pub fn checkpoint_path(&self) -> &Path {
        &self.path
    }

    fn surviving_count(&self) -> usize {
        self.checkpoint
            .batch_results
            .iter()
            .map(|b| b.results.len())
            .sum()
    }
}
