//! The session store itself: in-memory registry + JSON persistence.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::errors::{StoreError, StoreResult};
use crate::model::{
    DiffSummary, PendingRun, Run, RunMetrics, RunStatus, RunSummary, RunType, TaskErrorKind,
    TaskFailure, TaskMetrics, TaskName, TaskRecord, TaskStatus, TriggerType, make_run_id,
};

/// Version stamp of the persisted document.
pub const SCHEMA_VERSION: u32 = 1;

/// Rolling window (number of terminal runs) for the success-rate metric.
const SUCCESS_RATE_WINDOW: usize = 50;

/// Tuning for persistence behavior.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path of the JSON document.
    pub path: PathBuf,
    /// Flush after this many buffered mutations.
    pub flush_after_mutations: u32,
    /// ...or after this much time since the last flush, whichever first.
    pub flush_interval: Duration,
    /// Runs still non-terminal and older than this at startup are swept.
    pub startup_grace: Duration,
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            flush_after_mutations: 8,
            flush_interval: Duration::from_secs(2),
            startup_grace: Duration::from_secs(60),
        }
    }
}

/// On-disk document shape.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedState {
    schema_version: u32,
    runs: Vec<Run>,
}

#[derive(Debug)]
struct StoreState {
    runs: Vec<Run>,
    index: HashMap<String, usize>,
    dirty: u32,
    seq: u64,
    last_flush: Instant,
}

/// Durable authoritative record of runs.
///
/// All operations are atomic with respect to concurrent orchestrators in
/// the same process. The lock is never held across file I/O: mutations
/// serialize a snapshot inside the critical section and write it outside.
#[derive(Debug)]
pub struct SessionStore {
    cfg: StoreConfig,
    inner: tokio::sync::Mutex<StoreState>,
    io: tokio::sync::Mutex<()>,
    last_written_seq: AtomicU64,
}

/// Aggregate counters for the dashboard metrics endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StoreMetrics {
    pub runs_total: u64,
    pub runs_by_status: BTreeMap<RunStatus, u64>,
    pub prompt_tokens_total: u64,
    pub completion_tokens_total: u64,
    pub estimated_cost_usd_total: f64,
    /// Share of fully-successful runs among the most recent terminal,
    /// non-skipped runs.
    pub success_rate: f64,
}

impl SessionStore {
    /// Opens the store, rehydrating from disk when the document exists.
    ///
    /// Any run still `pending`/`running` and older than the startup grace
    /// interval is marked `failed` with error kind `interrupted`.
    ///
    /// # Errors
    /// - [`StoreError::Io`] when the document exists but cannot be read
    /// - [`StoreError::Serde`] on a corrupt document
    /// - [`StoreError::SchemaVersion`] on a version mismatch
    pub async fn open(cfg: StoreConfig) -> StoreResult<Self> {
        let mut runs = match tokio::fs::read(&cfg.path).await {
            Ok(bytes) => {
                let doc: PersistedState = serde_json::from_slice(&bytes)?;
                if doc.schema_version != SCHEMA_VERSION {
                    return Err(StoreError::SchemaVersion {
                        found: doc.schema_version,
                        expected: SCHEMA_VERSION,
                    });
                }
                doc.runs
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let swept = sweep_interrupted(&mut runs, cfg.startup_grace);
        if swept > 0 {
            warn!(swept, "marked interrupted runs as failed during startup");
        }
        info!(path = %cfg.path.display(), runs = runs.len(), "session store rehydrated");

        let index = runs
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();

        let store = Self {
            inner: tokio::sync::Mutex::new(StoreState {
                runs,
                index,
                dirty: 0,
                seq: 0,
                last_flush: Instant::now(),
            }),
            io: tokio::sync::Mutex::new(()),
            last_written_seq: AtomicU64::new(0),
            cfg,
        };
        if swept > 0 {
            store.flush().await?;
        }
        Ok(store)
    }

    /* --------------------------- creation --------------------------- */

    /// Creates a `pending` run and returns its id.
    ///
    /// Ids stay unique even when the same commit is accepted twice inside
    /// one millisecond (fast retries): the timestamp component is bumped
    /// until the id is free.
    pub async fn create_pending(&self, p: PendingRun) -> StoreResult<String> {
        let (id, snapshot) = {
            let mut st = self.inner.lock().await;

            let mut now = Utc::now();
            let mut id = make_run_id(&p.commit_sha, now);
            while st.index.contains_key(&id) {
                now = now + chrono::Duration::milliseconds(1);
                id = make_run_id(&p.commit_sha, now);
            }

            let run = Run {
                id: id.clone(),
                commit_sha: p.commit_sha,
                branch: p.branch,
                pr_number: p.pr_number,
                trigger_type: None,
                run_type: None,
                status: RunStatus::Pending,
                started_at: now,
                finished_at: None,
                skip_reason: None,
                diff_summary: None,
                tasks: BTreeMap::new(),
                metrics: RunMetrics::default(),
                failed_tasks: Vec::new(),
                task_errors: BTreeMap::new(),
                run_error: None,
                automation_pr: None,
                dedup_key: p.dedup_key,
            };
            let idx = st.runs.len();
            st.index.insert(id.clone(), idx);
            st.runs.push(run);
            (id, self.snapshot_if_due(&mut st, false)?)
        };
        self.write_snapshot(snapshot).await?;
        debug!(run_id = %id, "run created (pending)");
        Ok(id)
    }

    /// Returns the id of a non-terminal run with the given dedup key whose
    /// start is within `window` of now, if one exists.
    pub async fn find_recent_by_dedup_key(
        &self,
        key: &str,
        window: Duration,
    ) -> Option<String> {
        let st = self.inner.lock().await;
        let cutoff = Utc::now()
            - chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::zero());
        st.runs
            .iter()
            .rev()
            .find(|r| {
                !r.status.is_terminal()
                    && r.dedup_key.as_deref() == Some(key)
                    && r.started_at >= cutoff
            })
            .map(|r| r.id.clone())
    }

    /* ------------------------- run transitions ------------------------- */

    /// Transitions a pending run to `running` and registers its planned
    /// tasks as `pending` records.
    pub async fn start_run(
        &self,
        run_id: &str,
        trigger_type: TriggerType,
        run_type: RunType,
        diff_summary: DiffSummary,
        planned: &[TaskName],
    ) -> StoreResult<()> {
        self.mutate_run(run_id, false, |run| {
            if run.status != RunStatus::Pending {
                return Err(StoreError::InvalidTransition {
                    subject: format!("run {}", run.id),
                    from: format!("{:?}", run.status),
                    to: "Running".into(),
                });
            }
            run.status = RunStatus::Running;
            run.trigger_type = Some(trigger_type);
            run.run_type = Some(run_type);
            run.diff_summary = Some(diff_summary);
            for name in planned {
                run.tasks.insert(*name, TaskRecord::pending(*name));
            }
            Ok(())
        })
        .await
    }

    /// Terminal transition from `pending`/`running` with no tasks attempted.
    pub async fn skip_run(&self, run_id: &str, reason: &str, run_type: RunType) -> StoreResult<()> {
        self.mutate_run(run_id, true, |run| {
            run.status = RunStatus::Skipped;
            run.run_type = Some(run_type);
            run.skip_reason = Some(reason.to_string());
            run.finished_at = Some(Utc::now());
            Ok(())
        })
        .await
    }

    /// Records the trigger type on a run that is being skipped before task
    /// planning (the classification is still worth keeping).
    pub async fn set_trigger_type(&self, run_id: &str, t: TriggerType) -> StoreResult<()> {
        self.mutate_run(run_id, false, |run| {
            run.trigger_type = Some(t);
            Ok(())
        })
        .await
    }

    /// Computes the terminal status from task outcomes.
    ///
    /// `completed` iff every attempted task succeeded and composition did
    /// not fail; `completed_with_issues` when at least one task succeeded;
    /// `failed` when none did. Calling on an already-terminal run is a
    /// no-op returning the current status.
    pub async fn finalize_run(&self, run_id: &str) -> StoreResult<RunStatus> {
        let mut out = RunStatus::Running;
        let snapshot = {
            let mut st = self.inner.lock().await;
            let idx = *st
                .index
                .get(run_id)
                .ok_or_else(|| StoreError::RunNotFound(run_id.to_string()))?;
            let run = &mut st.runs[idx];

            if run.status.is_terminal() {
                // Double finalize is a no-op.
                return Ok(run.status);
            }

            let succeeded = run
                .tasks
                .values()
                .filter(|t| t.status == TaskStatus::Success)
                .count();
            let failed = run
                .tasks
                .values()
                .filter(|t| t.status == TaskStatus::Failed)
                .count();

            run.status = if failed == 0 {
                if run.run_error.is_some() {
                    RunStatus::CompletedWithIssues
                } else {
                    RunStatus::Completed
                }
            } else if succeeded > 0 {
                RunStatus::CompletedWithIssues
            } else {
                RunStatus::Failed
            };
            let now = Utc::now();
            run.finished_at = Some(now);
            run.metrics.wall_ms = (now - run.started_at).num_milliseconds().max(0) as u64;
            out = run.status;

            self.snapshot_if_due(&mut st, true)?
        };
        self.write_snapshot(snapshot).await?;
        info!(run_id = %run_id, status = ?out, "run finalized");
        Ok(out)
    }

    /// Records the grouped automation PR number. Set at most once.
    pub async fn record_automation_pr(&self, run_id: &str, pr_number: u64) -> StoreResult<()> {
        self.mutate_run(run_id, true, |run| {
            if run.automation_pr.is_some() {
                return Err(StoreError::InvalidTransition {
                    subject: format!("run {} automation_pr", run.id),
                    from: "set".into(),
                    to: "set again".into(),
                });
            }
            run.automation_pr = Some(pr_number);
            Ok(())
        })
        .await
    }

    /// Terminal transition for a run that failed before (or outside) task
    /// execution - e.g. the diff could not be fetched. The cause lands in
    /// `run_error` so the dashboard can surface it.
    pub async fn fail_run(
        &self,
        run_id: &str,
        kind: TaskErrorKind,
        message: &str,
    ) -> StoreResult<()> {
        self.mutate_run(run_id, true, |run| {
            for t in run.tasks.values_mut() {
                if matches!(t.status, TaskStatus::Pending | TaskStatus::Running) {
                    t.status = TaskStatus::Failed;
                    t.finished_at = Some(Utc::now());
                    t.error_kind = Some(kind);
                    t.error_message = Some(message.to_string());
                }
            }
            run.status = RunStatus::Failed;
            run.finished_at = Some(Utc::now());
            run.run_error = Some(TaskFailure {
                kind,
                message: message.to_string(),
            });
            Ok(())
        })
        .await
    }

    /// Records a grouped-PR composition failure on the run.
    pub async fn record_run_issue(
        &self,
        run_id: &str,
        kind: TaskErrorKind,
        message: &str,
    ) -> StoreResult<()> {
        self.mutate_run(run_id, true, |run| {
            run.run_error = Some(TaskFailure {
                kind,
                message: message.to_string(),
            });
            Ok(())
        })
        .await
    }

    /* ------------------------- task transitions ------------------------- */

    pub async fn mark_task_running(&self, run_id: &str, task: TaskName) -> StoreResult<()> {
        self.mutate_task(run_id, task, |t| {
            require_task_transition(t, TaskStatus::Running)?;
            t.status = TaskStatus::Running;
            t.started_at = Some(Utc::now());
            Ok(())
        })
        .await
    }

    pub async fn mark_task_success(
        &self,
        run_id: &str,
        task: TaskName,
        summary: &str,
        metrics: TaskMetrics,
    ) -> StoreResult<()> {
        self.mutate_run(run_id, false, |run| {
            let t = run.tasks.get_mut(&task).ok_or_else(|| StoreError::TaskNotFound {
                run_id: run_id.to_string(),
                task: task.to_string(),
            })?;
            require_task_transition(t, TaskStatus::Success)?;
            t.status = TaskStatus::Success;
            t.finished_at = Some(Utc::now());
            t.summary = Some(summary.to_string());
            t.metrics = metrics;
            add_metrics(&mut run.metrics, metrics);
            Ok(())
        })
        .await
    }

    pub async fn mark_task_skipped(
        &self,
        run_id: &str,
        task: TaskName,
        reason: &str,
    ) -> StoreResult<()> {
        self.mutate_task(run_id, task, |t| {
            require_task_transition(t, TaskStatus::Skipped)?;
            t.status = TaskStatus::Skipped;
            t.finished_at = Some(Utc::now());
            t.summary = Some(format!("skipped: {reason}"));
            Ok(())
        })
        .await
    }

    pub async fn mark_task_failed(
        &self,
        run_id: &str,
        task: TaskName,
        kind: TaskErrorKind,
        message: &str,
        metrics: TaskMetrics,
    ) -> StoreResult<()> {
        self.mutate_run(run_id, false, |run| {
            let t = run.tasks.get_mut(&task).ok_or_else(|| StoreError::TaskNotFound {
                run_id: run_id.to_string(),
                task: task.to_string(),
            })?;
            require_task_transition(t, TaskStatus::Failed)?;
            t.status = TaskStatus::Failed;
            t.finished_at = Some(Utc::now());
            t.error_kind = Some(kind);
            t.error_message = Some(message.to_string());
            t.metrics = metrics;
            add_metrics(&mut run.metrics, metrics);
            if !run.failed_tasks.contains(&task) {
                run.failed_tasks.push(task);
            }
            run.task_errors.insert(
                task,
                TaskFailure {
                    kind,
                    message: message.to_string(),
                },
            );
            Ok(())
        })
        .await
    }

    /* ----------------------------- queries ----------------------------- */

    pub async fn get_run(&self, run_id: &str) -> Option<Run> {
        let st = self.inner.lock().await;
        st.index.get(run_id).map(|&i| st.runs[i].clone())
    }

    /// Run summaries newest first, optionally bounded by a start time.
    pub async fn list_runs(
        &self,
        limit: usize,
        since: Option<DateTime<Utc>>,
    ) -> Vec<RunSummary> {
        let st = self.inner.lock().await;
        st.runs
            .iter()
            .rev()
            .filter(|r| since.is_none_or(|s| r.started_at >= s))
            .take(limit)
            .map(RunSummary::from)
            .collect()
    }

    pub async fn list_by_pr(&self, pr_number: u64) -> Vec<RunSummary> {
        let st = self.inner.lock().await;
        st.runs
            .iter()
            .rev()
            .filter(|r| r.pr_number == Some(pr_number))
            .map(RunSummary::from)
            .collect()
    }

    pub async fn list_skipped(&self) -> Vec<RunSummary> {
        let st = self.inner.lock().await;
        st.runs
            .iter()
            .rev()
            .filter(|r| r.status == RunStatus::Skipped)
            .map(RunSummary::from)
            .collect()
    }

    pub async fn aggregate_metrics(&self) -> StoreMetrics {
        let st = self.inner.lock().await;
        let mut by_status: BTreeMap<RunStatus, u64> = BTreeMap::new();
        let mut prompt = 0u64;
        let mut completion = 0u64;
        let mut cost = 0f64;
        for r in &st.runs {
            *by_status.entry(r.status).or_default() += 1;
            prompt += r.metrics.prompt_tokens;
            completion += r.metrics.completion_tokens;
            cost += r.metrics.estimated_cost_usd;
        }

        let recent_terminal: Vec<_> = st
            .runs
            .iter()
            .rev()
            .filter(|r| r.status.is_terminal() && r.status != RunStatus::Skipped)
            .take(SUCCESS_RATE_WINDOW)
            .collect();
        let success_rate = if recent_terminal.is_empty() {
            1.0
        } else {
            let ok = recent_terminal
                .iter()
                .filter(|r| r.status == RunStatus::Completed)
                .count();
            ok as f64 / recent_terminal.len() as f64
        };

        StoreMetrics {
            runs_total: st.runs.len() as u64,
            runs_by_status: by_status,
            prompt_tokens_total: prompt,
            completion_tokens_total: completion,
            estimated_cost_usd_total: cost,
            success_rate,
        }
    }

    /// Forces a flush of the current state to disk.
    pub async fn flush(&self) -> StoreResult<()> {
        let snapshot = {
            let mut st = self.inner.lock().await;
            self.snapshot_if_due(&mut st, true)?
        };
        self.write_snapshot(snapshot).await
    }

    /* --------------------------- internals --------------------------- */

    async fn mutate_run<F>(&self, run_id: &str, force_flush: bool, f: F) -> StoreResult<()>
    where
        F: FnOnce(&mut Run) -> StoreResult<()>,
    {
        let snapshot = {
            let mut st = self.inner.lock().await;
            let idx = *st
                .index
                .get(run_id)
                .ok_or_else(|| StoreError::RunNotFound(run_id.to_string()))?;
            let run = &mut st.runs[idx];
            if run.status.is_terminal() {
                return Err(StoreError::TerminalRun(run_id.to_string()));
            }
            f(run)?;
            self.snapshot_if_due(&mut st, force_flush)?
        };
        self.write_snapshot(snapshot).await
    }

    async fn mutate_task<F>(&self, run_id: &str, task: TaskName, f: F) -> StoreResult<()>
    where
        F: FnOnce(&mut TaskRecord) -> StoreResult<()>,
    {
        let run_id_owned = run_id.to_string();
        self.mutate_run(run_id, false, move |run| {
            let t = run.tasks.get_mut(&task).ok_or(StoreError::TaskNotFound {
                run_id: run_id_owned,
                task: task.to_string(),
            })?;
            f(t)
        })
        .await
    }

    /// Serializes a snapshot when the flush policy says so. Must be called
    /// with the state lock held; performs no I/O.
    fn snapshot_if_due(
        &self,
        st: &mut StoreState,
        force: bool,
    ) -> StoreResult<Option<(u64, Vec<u8>)>> {
        st.dirty += 1;
        st.seq += 1;
        let due = force
            || st.dirty >= self.cfg.flush_after_mutations
            || st.last_flush.elapsed() >= self.cfg.flush_interval;
        if !due {
            return Ok(None);
        }
        let doc = PersistedState {
            schema_version: SCHEMA_VERSION,
            runs: st.runs.clone(),
        };
        let bytes = serde_json::to_vec(&doc)?;
        st.dirty = 0;
        st.last_flush = Instant::now();
        Ok(Some((st.seq, bytes)))
    }

    /// Atomic write: temp file + fsync + rename. Serialized through the io
    /// lock; stale snapshots (an older seq racing a newer one) are dropped.
    async fn write_snapshot(&self, snapshot: Option<(u64, Vec<u8>)>) -> StoreResult<()> {
        let Some((seq, bytes)) = snapshot else {
            return Ok(());
        };
        let _io = self.io.lock().await;
        if seq <= self.last_written_seq.load(Ordering::Acquire) {
            return Ok(());
        }

        if let Some(dir) = self.cfg.path.parent() {
            if !dir.as_os_str().is_empty() {
                tokio::fs::create_dir_all(dir).await?;
            }
        }
        let tmp = self.cfg.path.with_extension("json.tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, &self.cfg.path).await?;

        self.last_written_seq.store(seq, Ordering::Release);
        debug!(bytes = bytes.len(), seq, "session store flushed");
        Ok(())
    }
}

fn add_metrics(run: &mut RunMetrics, task: TaskMetrics) {
    run.prompt_tokens += task.prompt_tokens;
    run.completion_tokens += task.completion_tokens;
    run.estimated_cost_usd += task.estimated_cost_usd;
}

fn require_task_transition(t: &TaskRecord, to: TaskStatus) -> StoreResult<()> {
    let ok = match to {
        TaskStatus::Running => t.status == TaskStatus::Pending,
        TaskStatus::Success | TaskStatus::Failed => t.status == TaskStatus::Running,
        // A planned task may be skipped before it ever starts.
        TaskStatus::Skipped => matches!(t.status, TaskStatus::Pending | TaskStatus::Running),
        TaskStatus::Pending => false,
    };
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidTransition {
            subject: format!("task {}", t.name),
            from: format!("{:?}", t.status),
            to: format!("{to:?}"),
        })
    }
}

/// Marks stale in-flight runs as failed with kind `interrupted`.
/// Returns how many runs were swept.
fn sweep_interrupted(runs: &mut [Run], grace: Duration) -> usize {
    let cutoff =
        Utc::now() - chrono::Duration::from_std(grace).unwrap_or_else(|_| chrono::Duration::zero());
    let mut swept = 0;
    for run in runs.iter_mut() {
        if run.status.is_terminal() || run.started_at > cutoff {
            continue;
        }
        for t in run.tasks.values_mut() {
            if matches!(t.status, TaskStatus::Pending | TaskStatus::Running) {
                t.status = TaskStatus::Failed;
                t.finished_at = Some(Utc::now());
                t.error_kind = Some(TaskErrorKind::Interrupted);
                t.error_message = Some("process restarted mid-run".to_string());
                if !run.failed_tasks.contains(&t.name) {
                    run.failed_tasks.push(t.name);
                }
                run.task_errors.insert(
                    t.name,
                    TaskFailure {
                        kind: TaskErrorKind::Interrupted,
                        message: "process restarted mid-run".to_string(),
                    },
                );
            }
        }
        run.status = RunStatus::Failed;
        run.finished_at = Some(Utc::now());
        swept += 1;
    }
    swept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(commit: &str) -> PendingRun {
        PendingRun {
            commit_sha: commit.to_string(),
            branch: "main".to_string(),
            pr_number: Some(67),
            dedup_key: Some(format!("{commit}:synchronize")),
        }
    }

    async fn store_in(dir: &tempfile::TempDir) -> SessionStore {
        SessionStore::open(StoreConfig::new(dir.path().join("sessions.json")))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn full_lifecycle_all_success_is_completed() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;

        let id = store.create_pending(pending("abcdef1234567890")).await.unwrap();
        store
            .start_run(
                &id,
                TriggerType::PrSynchronized,
                RunType::FullAutomation,
                DiffSummary::default(),
                &[TaskName::CodeReview, TaskName::ReadmeUpdate],
            )
            .await
            .unwrap();

        for task in [TaskName::CodeReview, TaskName::ReadmeUpdate] {
            store.mark_task_running(&id, task).await.unwrap();
            store
                .mark_task_success(&id, task, "done", TaskMetrics::default())
                .await
                .unwrap();
        }

        assert_eq!(store.finalize_run(&id).await.unwrap(), RunStatus::Completed);
        let run = store.get_run(&id).await.unwrap();
        assert!(run.finished_at.unwrap() >= run.started_at);
    }

    #[tokio::test]
    async fn mixed_outcomes_are_completed_with_issues() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;

        let id = store.create_pending(pending("1111111111111111")).await.unwrap();
        store
            .start_run(
                &id,
                TriggerType::PrOpened,
                RunType::FullAutomation,
                DiffSummary::default(),
                &[TaskName::CodeReview, TaskName::SpecUpdate],
            )
            .await
            .unwrap();

        store.mark_task_running(&id, TaskName::CodeReview).await.unwrap();
        store
            .mark_task_failed(
                &id,
                TaskName::CodeReview,
                TaskErrorKind::PostSideEffectFailed,
                "404 posting comment",
                TaskMetrics::default(),
            )
            .await
            .unwrap();
        store.mark_task_running(&id, TaskName::SpecUpdate).await.unwrap();
        store
            .mark_task_success(&id, TaskName::SpecUpdate, "updated", TaskMetrics::default())
            .await
            .unwrap();

        assert_eq!(
            store.finalize_run(&id).await.unwrap(),
            RunStatus::CompletedWithIssues
        );
        let run = store.get_run(&id).await.unwrap();
        assert_eq!(run.failed_tasks, vec![TaskName::CodeReview]);
        assert_eq!(
            run.task_errors[&TaskName::CodeReview].kind,
            TaskErrorKind::PostSideEffectFailed
        );
    }

    #[tokio::test]
    async fn all_failed_is_failed_and_double_finalize_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;

        let id = store.create_pending(pending("2222222222222222")).await.unwrap();
        store
            .start_run(
                &id,
                TriggerType::PushWithoutPr,
                RunType::FullAutomation,
                DiffSummary::default(),
                &[TaskName::CodeReview],
            )
            .await
            .unwrap();
        store.mark_task_running(&id, TaskName::CodeReview).await.unwrap();
        store
            .mark_task_failed(
                &id,
                TaskName::CodeReview,
                TaskErrorKind::LlmError,
                "upstream 500",
                TaskMetrics::default(),
            )
            .await
            .unwrap();

        assert_eq!(store.finalize_run(&id).await.unwrap(), RunStatus::Failed);
        assert_eq!(store.finalize_run(&id).await.unwrap(), RunStatus::Failed);
    }

    #[tokio::test]
    async fn terminal_runs_reject_writes() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;

        let id = store.create_pending(pending("3333333333333333")).await.unwrap();
        store
            .skip_run(&id, "Trivial change: 3 docs lines", RunType::SkippedTrivialChange)
            .await
            .unwrap();

        let err = store
            .start_run(
                &id,
                TriggerType::PushWithoutPr,
                RunType::FullAutomation,
                DiffSummary::default(),
                &[],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::TerminalRun(_)));
    }

    #[tokio::test]
    async fn automation_pr_is_set_at_most_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;

        let id = store.create_pending(pending("4444444444444444")).await.unwrap();
        store
            .start_run(
                &id,
                TriggerType::PrOpened,
                RunType::FullAutomation,
                DiffSummary::default(),
                &[TaskName::ReadmeUpdate],
            )
            .await
            .unwrap();
        store.record_automation_pr(&id, 101).await.unwrap();
        assert!(store.record_automation_pr(&id, 102).await.is_err());
    }

    #[tokio::test]
    async fn composer_failure_downgrades_completed() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;

        let id = store.create_pending(pending("5555555555555555")).await.unwrap();
        store
            .start_run(
                &id,
                TriggerType::PrOpened,
                RunType::FullAutomation,
                DiffSummary::default(),
                &[TaskName::ReadmeUpdate],
            )
            .await
            .unwrap();
        store.mark_task_running(&id, TaskName::ReadmeUpdate).await.unwrap();
        store
            .mark_task_success(&id, TaskName::ReadmeUpdate, "ok", TaskMetrics::default())
            .await
            .unwrap();
        store
            .record_run_issue(&id, TaskErrorKind::HostApiError, "422 creating PR")
            .await
            .unwrap();

        assert_eq!(
            store.finalize_run(&id).await.unwrap(),
            RunStatus::CompletedWithIssues
        );
    }

    #[tokio::test]
    async fn rehydrates_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");

        let id = {
            let store = SessionStore::open(StoreConfig::new(&path)).await.unwrap();
            let id = store.create_pending(pending("6666666666666666")).await.unwrap();
            store
                .skip_run(&id, "Empty diff", RunType::SkippedTrivialChange)
                .await
                .unwrap();
            id
        };

        let store = SessionStore::open(StoreConfig::new(&path)).await.unwrap();
        let run = store.get_run(&id).await.unwrap();
        assert_eq!(run.status, RunStatus::Skipped);
        assert_eq!(run.skip_reason.as_deref(), Some("Empty diff"));
    }

    #[tokio::test]
    async fn startup_sweep_marks_stale_running_runs_interrupted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");

        // Craft a document with a running run older than any grace window.
        let mut tasks = BTreeMap::new();
        let mut rec = TaskRecord::pending(TaskName::CodeReview);
        rec.status = TaskStatus::Running;
        tasks.insert(TaskName::CodeReview, rec);
        let stale = Run {
            id: "deadbeef-0".to_string(),
            commit_sha: "deadbeef00000000".to_string(),
            branch: "main".to_string(),
            pr_number: None,
            trigger_type: Some(TriggerType::PushWithoutPr),
            run_type: Some(RunType::FullAutomation),
            status: RunStatus::Running,
            started_at: Utc::now() - chrono::Duration::hours(1),
            finished_at: None,
            skip_reason: None,
            diff_summary: None,
            tasks,
            metrics: RunMetrics::default(),
            failed_tasks: Vec::new(),
            task_errors: BTreeMap::new(),
            run_error: None,
            automation_pr: None,
            dedup_key: None,
        };
        let doc = PersistedState {
            schema_version: SCHEMA_VERSION,
            runs: vec![stale],
        };
        std::fs::write(&path, serde_json::to_vec(&doc).unwrap()).unwrap();

        let store = SessionStore::open(StoreConfig::new(&path)).await.unwrap();
        let run = store.get_run("deadbeef-0").await.unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(
            run.task_errors[&TaskName::CodeReview].kind,
            TaskErrorKind::Interrupted
        );
    }

    #[tokio::test]
    async fn rejects_unknown_schema_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        std::fs::write(&path, br#"{"schema_version":99,"runs":[]}"#).unwrap();

        let err = SessionStore::open(StoreConfig::new(&path)).await.unwrap_err();
        assert!(matches!(err, StoreError::SchemaVersion { found: 99, .. }));
    }

    #[tokio::test]
    async fn dedup_key_lookup_honors_terminal_status_and_window() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;

        let id = store.create_pending(pending("7777777777777777")).await.unwrap();
        let key = "7777777777777777:synchronize";
        assert_eq!(
            store
                .find_recent_by_dedup_key(key, Duration::from_secs(600))
                .await,
            Some(id.clone())
        );

        store
            .skip_run(&id, "Trivial change", RunType::SkippedTrivialChange)
            .await
            .unwrap();
        assert_eq!(
            store
                .find_recent_by_dedup_key(key, Duration::from_secs(600))
                .await,
            None
        );
    }

    #[tokio::test]
    async fn listing_is_newest_first_and_filters_work() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;

        let a = store.create_pending(pending("aaaaaaaaaaaaaaaa")).await.unwrap();
        let b = store
            .create_pending(PendingRun {
                pr_number: Some(99),
                ..pending("bbbbbbbbbbbbbbbb")
            })
            .await
            .unwrap();
        store
            .skip_run(&a, "Empty diff", RunType::SkippedTrivialChange)
            .await
            .unwrap();

        let all = store.list_runs(10, None).await;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, b);

        let for_pr = store.list_by_pr(99).await;
        assert_eq!(for_pr.len(), 1);
        assert_eq!(for_pr[0].id, b);

        let skipped = store.list_skipped().await;
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].id, a);
    }
}
