/*!
 * Reconciliation engine
 *
 * Brings the server's mirror into agreement with the watched directory in
 * two phases: a parallel initial walk that probes every entry and uploads
 * what the server is missing, then a periodic single-threaded scan that
 * diffs the live filesystem against the path index and propagates local
 * deletions, creations, and modifications.
 */

pub mod index;
pub mod queue;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime};

use walkdir::WalkDir;

use crate::error::{Result, VigilError};
use crate::protocol::{Outcome, Remote};
use index::PathIndex;
use queue::JobQueue;

/// Pause before each reconnection attempt
const RECONNECT_PAUSE: Duration = Duration::from_secs(30);

/// Continuous one-way mirror of a local directory tree.
pub struct Watcher<R> {
    remote: R,
    root: PathBuf,
    delay: Duration,
    budget: u32,
    retries_left: u32,
    index: PathIndex,
}

impl<R: Remote + Sync> Watcher<R> {
    pub fn new(remote: R, root: PathBuf, delay: Duration, retry_budget: u32) -> Self {
        Self {
            remote,
            root,
            delay,
            budget: retry_budget,
            retries_left: retry_budget,
            index: PathIndex::new(),
        }
    }

    /// Observed paths and their recorded mtimes.
    pub fn index(&self) -> &PathIndex {
        &self.index
    }

    pub fn remote_mut(&mut self) -> &mut R {
        &mut self.remote
    }

    /// Run forever: initialize, then scan periodically. Returns only when
    /// the reconnection budget is exhausted.
    pub fn run(&mut self) -> Result<()> {
        if let Err(e) = self.initialize() {
            tracing::warn!("initialization failed: {}", e);
            self.reconnect()?;
        }
        tracing::info!("watching {}", self.root.display());

        loop {
            std::thread::sleep(self.delay);
            if let Err(e) = self.tick() {
                tracing::warn!("scan failed: {}", e);
                self.reconnect()?;
            }
        }
    }

    /// Initial reconciliation: walk the tree with a worker pool, probing
    /// every directory and file and uploading whatever the server lacks.
    ///
    /// A FIFO queue feeds directories to the workers. The leaf counter
    /// tracks directory branches still being explored; the worker whose
    /// decrement takes it to zero has confirmed the last open branch is a
    /// leaf, and closes the queue.
    pub fn initialize(&self) -> Result<()> {
        let jobs = JobQueue::new();
        let leaves = AtomicI64::new(0);

        self.index.clear();
        jobs.put(self.root.clone());
        leaves.fetch_add(1, Ordering::SeqCst);

        let workers = num_cpus::get().max(1);
        std::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(workers);
            for _ in 0..workers {
                handles.push(scope.spawn(|| self.drain_queue(&jobs, &leaves)));
            }

            let mut outcome = Ok(());
            for handle in handles {
                let result = handle
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
                if outcome.is_ok() {
                    outcome = result;
                }
            }
            outcome
        })
    }

    fn drain_queue(&self, jobs: &JobQueue<PathBuf>, leaves: &AtomicI64) -> Result<()> {
        while let Some(dir) = jobs.get() {
            if let Err(e) = self.reconcile_directory(&dir, jobs, leaves) {
                // Let the other workers wind down; the first error wins.
                jobs.ended();
                return Err(e);
            }
        }
        Ok(())
    }

    fn reconcile_directory(
        &self,
        dir: &Path,
        jobs: &JobQueue<PathBuf>,
        leaves: &AtomicI64,
    ) -> Result<()> {
        if self.remote.probe_folder(dir)? == Outcome::Missing {
            tracing::debug!("creating folder {}", dir.display());
            self.remote.backup_folder(dir)?;
        }
        self.index.record(dir.to_path_buf(), mtime_of(dir)?);

        let mut subdirs = 0;
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let path = entry.path();

            if file_type.is_file() {
                if self.remote.probe_file(&path)? == Outcome::Missing {
                    tracing::debug!("uploading {}", path.display());
                    self.remote.backup_file(&path)?;
                }
                self.index.record(path.clone(), mtime_of(&path)?);
            } else if file_type.is_dir() {
                subdirs += 1;
                // The branch being continued reuses this directory's slot;
                // every further subdirectory opens a new one.
                if subdirs >= 2 {
                    leaves.fetch_add(1, Ordering::SeqCst);
                }
                jobs.put(path);
            }
        }

        if subdirs == 0 && leaves.fetch_sub(1, Ordering::SeqCst) == 1 {
            // This decrement closed the last open branch: the tree has
            // been fully explored.
            jobs.ended();
        }
        Ok(())
    }

    /// One steady-state pass: propagate deletions first, then creations
    /// and modifications, so a rename never reaches the server new-first.
    pub fn tick(&self) -> Result<()> {
        self.deletion_pass()?;
        self.creation_pass()
    }

    fn deletion_pass(&self) -> Result<()> {
        for (path, _) in self.index.snapshot() {
            if path.exists() {
                continue;
            }
            tracing::debug!("deleted locally: {}", path.display());
            self.remote.delete_path(&path)?;

            // Removing a child updates the parent directory's mtime on
            // disk; refresh it here so the modification pass stays quiet.
            if let Some(parent) = path.parent() {
                if parent.exists() {
                    self.index.record(parent.to_path_buf(), mtime_of(parent)?);
                }
            }
            self.index.remove(&path);
        }
        Ok(())
    }

    fn creation_pass(&self) -> Result<()> {
        for entry in WalkDir::new(&self.root).min_depth(1) {
            let entry = entry.map_err(std::io::Error::from)?;
            let path = entry.path();
            if !entry.file_type().is_dir() && !entry.file_type().is_file() {
                continue;
            }
            let mtime = mtime_of(path)?;

            match self.index.mtime(path) {
                None => {
                    if entry.file_type().is_dir() {
                        tracing::debug!("created locally: {}/", path.display());
                        self.remote.backup_folder(path)?;
                    } else {
                        tracing::debug!("created locally: {}", path.display());
                        self.remote.backup_file(path)?;
                    }
                    self.index.record(path.to_path_buf(), mtime);
                }
                Some(recorded) if recorded != mtime => {
                    // Directory mtime changes are expressed through their
                    // children; only regular files are re-uploaded.
                    if entry.file_type().is_file() {
                        tracing::debug!("modified locally: {}", path.display());
                        self.remote.delete_path(path)?;
                        self.remote.backup_file(path)?;
                    }
                    self.index.record(path.to_path_buf(), mtime);
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Sleep-and-retry until initialization succeeds again. HTTP-class
    /// failures consume the budget; transport failures retry for free.
    fn reconnect(&mut self) -> Result<()> {
        while self.retries_left > 0 {
            std::thread::sleep(RECONNECT_PAUSE);
            match self.initialize() {
                Ok(()) => {
                    tracing::info!("connection is back");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("reconnection attempt failed: {}", e);
                    if e.is_http() {
                        self.retries_left -= 1;
                    }
                }
            }
        }
        Err(VigilError::RetriesExhausted {
            attempts: self.budget,
        })
    }
}

fn mtime_of(path: &Path) -> Result<SystemTime> {
    Ok(std::fs::metadata(path)?.modified()?)
}
