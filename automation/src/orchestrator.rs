//! End-to-end run choreography.
//!
//! `accept` is the fast path the ingress awaits: dedup check + pending
//! record, no network. Everything else happens detached in `process`,
//! which classifies the event, fans workers out, composes the grouped PR,
//! and finalizes the run. A worker failure never cancels its peers; every
//! outcome is recorded in the session store before the run finalizes.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use host_client::{HostClient, PullRequestInfo};
use llm_gateway::LlmGateway;
use session_store::{
    PendingRun, RunType, SessionStore, TaskErrorKind, TaskName,
};

use crate::errors::{AutomationError, AutomationResult, classify_error, classify_host_error};
use crate::settings::AutomationSettings;
use crate::trigger::{
    Classification, EventKind, RepoEvent, TriggerContext, analyze_diff, classify, truncate_diff,
};
use crate::workers::{
    OutcomeKind, TaskOutcome, WorkerDeps, execute, execute_review_log, plan,
};
use crate::composer;

/// Response of the accept step; the ingress echoes the run id in its 202.
#[derive(Debug, Clone)]
pub struct AcceptedRun {
    pub run_id: String,
    /// True when an in-flight run already covered this delivery.
    pub deduplicated: bool,
}

/// The run orchestrator. Collaborators are explicit constructor inputs so
/// tests can assemble it against scratch stores.
pub struct Orchestrator {
    host: Arc<HostClient>,
    gateway: Arc<LlmGateway>,
    store: Arc<SessionStore>,
    settings: Arc<AutomationSettings>,
}

impl Orchestrator {
    pub fn new(
        host: Arc<HostClient>,
        gateway: Arc<LlmGateway>,
        store: Arc<SessionStore>,
        settings: AutomationSettings,
    ) -> Self {
        Self {
            host,
            gateway,
            store,
            settings: Arc::new(settings),
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn host(&self) -> &Arc<HostClient> {
        &self.host
    }

    pub fn settings(&self) -> &AutomationSettings {
        &self.settings
    }

    /// Accepts one event: dedup check, pending record, detached execution.
    ///
    /// Re-delivering the same event (same commit id, same action) inside
    /// the dedup window returns the existing run id without starting a
    /// second run.
    pub async fn accept(self: Arc<Self>, event: RepoEvent) -> AutomationResult<AcceptedRun> {
        let key = event.dedup_key();
        if let Some(existing) = self
            .store
            .find_recent_by_dedup_key(&key, self.settings.dedup_window)
            .await
        {
            info!(run_id = %existing, dedup_key = %key, "duplicate delivery; reusing run");
            return Ok(AcceptedRun {
                run_id: existing,
                deduplicated: true,
            });
        }

        let run_id = self
            .store
            .create_pending(PendingRun {
                commit_sha: event.commit_sha.clone(),
                branch: event.branch.clone(),
                pr_number: event.pr_number,
                dedup_key: Some(key),
            })
            .await?;

        let this = Arc::clone(&self);
        let id = run_id.clone();
        tokio::spawn(async move {
            this.process(id, event).await;
        });

        Ok(AcceptedRun {
            run_id,
            deduplicated: false,
        })
    }

    /// Detached run body; all faults are recorded, never propagated.
    async fn process(&self, run_id: String, event: RepoEvent) {
        if let Err(e) = self.process_inner(&run_id, event).await {
            error!(run_id = %run_id, error = %e, "run processing failed");
            let kind = classify_error(&e);
            if let Err(store_err) = self.store.fail_run(&run_id, kind, &e.to_string()).await {
                warn!(run_id = %run_id, error = %store_err, "could not record run failure");
            }
        }
    }

    async fn process_inner(&self, run_id: &str, event: RepoEvent) -> AutomationResult<()> {
        // 1) Resolve the containing PR (cheap metadata; push events may not
        //    have one).
        let (event, pr) = self.resolve_pr(event).await?;
        let trigger_type = event.trigger_type(pr.is_some());
        self.store.set_trigger_type(run_id, trigger_type).await?;

        // 2) Fetch the diff: PR diff for PR events, commit diff for pushes.
        let raw_diff = match event.kind {
            EventKind::PullRequest => {
                let number = event.pr_number.ok_or_else(|| {
                    AutomationError::Validation("pull_request event without a number".into())
                })?;
                self.host.get_pr_diff(number).await?
            }
            EventKind::Push => self.host.get_commit_diff(&event.commit_sha).await?,
        };
        let analysis = analyze_diff(&raw_diff);
        debug!(
            run_id = %run_id,
            files = analysis.files_changed,
            total = analysis.total_changed,
            code = analysis.code_lines,
            docs = analysis.doc_lines,
            "diff analyzed"
        );

        // 3) Classify; skips are terminal here.
        let run_type = match classify(&event, &analysis, &self.settings) {
            Classification::Skip { run_type, reason } => {
                info!(run_id = %run_id, ?run_type, %reason, "run skipped");
                self.store.skip_run(run_id, &reason, run_type).await?;
                return Ok(());
            }
            Classification::Run { run_type } => run_type,
        };

        // 4) Build the immutable context and select workers.
        let mut ctx = TriggerContext {
            diff_text: truncate_diff(&raw_diff, self.settings.diff_max_bytes),
            event,
            trigger_type,
            run_type,
            analysis,
            pr,
            planned: Vec::new(),
        };

        let mut planned: Vec<TaskName> = Vec::new();
        for name in [TaskName::CodeReview, TaskName::ReadmeUpdate, TaskName::SpecUpdate] {
            if plan(name, &ctx) {
                planned.push(name);
            }
        }
        let review_planned = planned.contains(&TaskName::CodeReview);
        if review_planned {
            planned.push(TaskName::ReviewLog);
        }
        // A full run whose review was vetoed pre-execution is only partial.
        let run_type = if run_type == RunType::FullAutomation && !review_planned {
            RunType::Partial
        } else {
            run_type
        };
        ctx.run_type = run_type;
        ctx.planned = planned.clone();

        self.store
            .start_run(run_id, trigger_type, run_type, ctx.analysis.summary(), &planned)
            .await?;
        info!(run_id = %run_id, ?run_type, tasks = planned.len(), "run started");

        // 5) Fan out the independent workers; the join point collects every
        //    outcome, so one failure never cancels a peer.
        let deps = WorkerDeps {
            host: Arc::clone(&self.host),
            gateway: Arc::clone(&self.gateway),
            settings: Arc::clone(&self.settings),
        };
        let independent: Vec<TaskName> = planned
            .iter()
            .copied()
            .filter(|n| *n != TaskName::ReviewLog)
            .collect();
        let mut outcomes: Vec<TaskOutcome> = join_all(
            independent
                .iter()
                .map(|name| self.run_task(run_id, *name, &deps, &ctx)),
        )
        .await;

        // 6) The review log trails a successful review.
        if planned.contains(&TaskName::ReviewLog) {
            let review_text = outcomes
                .iter()
                .find(|o| o.name == TaskName::CodeReview && o.succeeded())
                .and_then(|o| o.output_text.clone());
            match review_text {
                Some(review) => {
                    let outcome = self
                        .run_named(run_id, TaskName::ReviewLog, || {
                            execute_review_log(&deps, &ctx, &review)
                        })
                        .await;
                    outcomes.push(outcome);
                }
                None => {
                    self.store
                        .mark_task_skipped(run_id, TaskName::ReviewLog, "code review did not succeed")
                        .await?;
                }
            }
        }

        // 7) Grouped automation PR, gated on readme_update or spec_update
        //    having produced content. Every proposed blob (the review log
        //    included) is committed once the gate passes.
        if self.settings.group_automation_updates && composer::should_compose(&outcomes) {
            let files: Vec<_> = outcomes.iter().filter_map(|o| o.proposed.clone()).collect();
            match composer::compose(&self.host, &ctx, files).await {
                Ok(number) => self.store.record_automation_pr(run_id, number).await?,
                Err(e) => {
                    warn!(run_id = %run_id, error = %e, "grouped PR composition failed");
                    self.store
                        .record_run_issue(
                            run_id,
                            classify_host_error(&e),
                            &format!("grouped PR composition failed: {e}"),
                        )
                        .await?;
                }
            }
        }

        // 8) Terminal status from the union of task outcomes.
        self.store.finalize_run(run_id).await?;
        Ok(())
    }

    /// Runs one independent worker under the per-task deadline, recording
    /// the transition and the outcome in the store.
    async fn run_task(
        &self,
        run_id: &str,
        name: TaskName,
        deps: &WorkerDeps,
        ctx: &TriggerContext,
    ) -> TaskOutcome {
        self.run_named(run_id, name, || execute(name, deps, ctx)).await
    }

    async fn run_named<F, Fut>(&self, run_id: &str, name: TaskName, f: F) -> TaskOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = TaskOutcome>,
    {
        if let Err(e) = self.store.mark_task_running(run_id, name).await {
            warn!(run_id = %run_id, task = %name, error = %e, "could not mark task running");
        }

        let outcome = match tokio::time::timeout(self.settings.task_timeout, f()).await {
            Ok(outcome) => outcome,
            Err(_) => TaskOutcome::failed(
                name,
                TaskErrorKind::Cancelled,
                format!(
                    "task exceeded its {}s deadline and was cancelled",
                    self.settings.task_timeout.as_secs()
                ),
            ),
        };

        self.record_outcome(run_id, &outcome).await;
        outcome
    }

    async fn record_outcome(&self, run_id: &str, outcome: &TaskOutcome) {
        let result = match &outcome.outcome {
            OutcomeKind::Success { summary } => {
                self.store
                    .mark_task_success(run_id, outcome.name, summary, outcome.metrics)
                    .await
            }
            OutcomeKind::Skipped { reason } => {
                self.store
                    .mark_task_skipped(run_id, outcome.name, reason)
                    .await
            }
            OutcomeKind::Failed { kind, message } => {
                self.store
                    .mark_task_failed(run_id, outcome.name, *kind, message, outcome.metrics)
                    .await
            }
        };
        if let Err(e) = result {
            warn!(
                run_id = %run_id,
                task = %outcome.name,
                error = %e,
                "could not record task outcome"
            );
        }
        info!(
            run_id = %run_id,
            task = %outcome.name,
            result = outcome.outcome.label(),
            "task finished"
        );
    }

    /// Resolves PR metadata. For PR events this is authoritative; for
    /// pushes it is best-effort enrichment and failures downgrade to
    /// "no PR" instead of failing the run.
    async fn resolve_pr(
        &self,
        mut event: RepoEvent,
    ) -> AutomationResult<(RepoEvent, Option<PullRequestInfo>)> {
        match event.kind {
            EventKind::PullRequest => {
                let number = event.pr_number.ok_or_else(|| {
                    AutomationError::Validation("pull_request event without a number".into())
                })?;
                let pr = self.host.get_pr(number).await?;
                Ok((event, Some(pr)))
            }
            EventKind::Push => match self.host.find_pr_for_commit(&event.commit_sha).await {
                Ok(found) => {
                    if let Some(pr) = &found {
                        event.pr_number = Some(pr.number);
                    }
                    Ok((event, found))
                }
                Err(e) => {
                    warn!(error = %e, "could not resolve containing PR; continuing without");
                    Ok((event, None))
                }
            },
        }
    }
}
