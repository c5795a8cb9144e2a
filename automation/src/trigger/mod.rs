//! Trigger filter: decides whether an event triggers any work, and what
//! kind. Pure function of (event, configured mode, diff analysis), so the
//! classification is deterministic and unit-testable.

pub mod diff_analysis;

pub use diff_analysis::{DiffAnalysis, analyze_diff, changed_paths, is_doc_path};

use host_client::PullRequestInfo;
use session_store::{RunType, TaskName, TriggerType};

use crate::settings::{AutomationSettings, TriggerMode};

/// Kind of repository event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Push,
    PullRequest,
}

/// Pull-request lifecycle action carried by the event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrAction {
    Opened,
    Synchronize,
    Reopened,
    Other(String),
}

impl PrAction {
    pub fn parse(s: &str) -> Self {
        match s {
            "opened" => PrAction::Opened,
            "synchronize" => PrAction::Synchronize,
            "reopened" => PrAction::Reopened,
            other => PrAction::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PrAction::Opened => "opened",
            PrAction::Synchronize => "synchronize",
            PrAction::Reopened => "reopened",
            PrAction::Other(s) => s,
        }
    }

    fn is_automated(&self) -> bool {
        !matches!(self, PrAction::Other(_))
    }
}

/// One observed repository event, normalized by the ingress.
#[derive(Debug, Clone)]
pub struct RepoEvent {
    pub kind: EventKind,
    /// Present for pull-request events.
    pub action: Option<PrAction>,
    pub commit_sha: String,
    pub branch: String,
    /// Known for PR events; resolved lazily for pushes.
    pub pr_number: Option<u64>,
}

impl RepoEvent {
    /// Idempotency key for webhook re-delivery: same commit + same action.
    pub fn dedup_key(&self) -> String {
        let action = match (&self.kind, &self.action) {
            (EventKind::Push, _) => "push",
            (EventKind::PullRequest, Some(a)) => a.as_str(),
            (EventKind::PullRequest, None) => "pull_request",
        };
        format!("{}:{}", self.commit_sha, action)
    }

    /// Trigger type once PR containment is known.
    pub fn trigger_type(&self, has_pr: bool) -> TriggerType {
        match (&self.kind, &self.action) {
            (EventKind::Push, _) if has_pr => TriggerType::PushWithPr,
            (EventKind::Push, _) => TriggerType::PushWithoutPr,
            (EventKind::PullRequest, Some(PrAction::Opened)) => TriggerType::PrOpened,
            (EventKind::PullRequest, Some(PrAction::Reopened)) => TriggerType::PrReopened,
            (EventKind::PullRequest, _) => TriggerType::PrSynchronized,
        }
    }
}

/// Outcome of classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Skip { run_type: RunType, reason: String },
    Run { run_type: RunType },
}

/// Classifies an event against the configured mode and the diff analysis.
///
/// Skip checks in order: trigger-mode exclusion, unsupported PR action,
/// trivial diff (when the filter is enabled), doc-only diff.
pub fn classify(
    event: &RepoEvent,
    analysis: &DiffAnalysis,
    settings: &AutomationSettings,
) -> Classification {
    let mode_excludes = match settings.trigger_mode {
        TriggerMode::Both => false,
        TriggerMode::Pr => event.kind == EventKind::Push,
        TriggerMode::Push => event.kind == EventKind::PullRequest,
    };
    if mode_excludes {
        return Classification::Skip {
            run_type: RunType::SkippedByTriggerMode,
            reason: format!(
                "Trigger mode {:?} excludes this event kind",
                settings.trigger_mode
            ),
        };
    }

    if event.kind == EventKind::PullRequest {
        let automated = event.action.as_ref().is_some_and(PrAction::is_automated);
        if !automated {
            let action = event
                .action
                .as_ref()
                .map_or("<none>", PrAction::as_str)
                .to_string();
            return Classification::Skip {
                run_type: RunType::SkippedByTriggerMode,
                reason: format!("PR action {action:?} is not automated"),
            };
        }
    }

    if settings.trivial_filter_enabled {
        if let Some(reason) = analysis.trivial_reason(settings.trivial_max_lines) {
            return Classification::Skip {
                run_type: RunType::SkippedTrivialChange,
                reason,
            };
        }
    }

    if analysis.docs_only {
        if settings.docs_only_lightweight {
            return Classification::Run {
                run_type: RunType::LightweightOnly,
            };
        }
        return Classification::Skip {
            run_type: RunType::SkippedDocsOnly,
            reason: "Documentation-only change".to_string(),
        };
    }

    Classification::Run {
        run_type: RunType::FullAutomation,
    }
}

/// Immutable classification + diff snapshot for a run.
///
/// Computed once by the orchestrator; workers only ever read it.
#[derive(Debug, Clone)]
pub struct TriggerContext {
    pub event: RepoEvent,
    pub trigger_type: TriggerType,
    pub run_type: RunType,
    /// Diff text truncated to the configured byte cap.
    pub diff_text: String,
    pub analysis: DiffAnalysis,
    /// Present when the event is tied to a pull request.
    pub pr: Option<PullRequestInfo>,
    /// Tasks the orchestrator decided to run.
    pub planned: Vec<TaskName>,
}

impl TriggerContext {
    /// Branch key for grouped automation artifacts: the source PR number,
    /// or the short commit id for PR-less pushes.
    pub fn automation_key(&self) -> String {
        match self.event.pr_number {
            Some(n) => n.to_string(),
            None => self.event.commit_sha.chars().take(8).collect(),
        }
    }
}

/// Truncates diff text to a byte budget on a char boundary.
pub fn truncate_diff(diff: &str, max_bytes: usize) -> String {
    if diff.len() <= max_bytes {
        return diff.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !diff.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = diff[..end].to_string();
    out.push_str("\n… diff truncated …\n");
    out
}

#[cfg(test)]
mod tests {
    use super::diff_analysis::analyze_diff;
    use super::*;

    fn push_event() -> RepoEvent {
        RepoEvent {
            kind: EventKind::Push,
            action: None,
            commit_sha: "abc1234567890def".into(),
            branch: "main".into(),
            pr_number: None,
        }
    }

    fn pr_event(action: PrAction) -> RepoEvent {
        RepoEvent {
            kind: EventKind::PullRequest,
            action: Some(action),
            commit_sha: "abc1234567890def".into(),
            branch: "feature/x".into(),
            pr_number: Some(67),
        }
    }

    fn code_analysis(lines: usize) -> DiffAnalysis {
        let mut s = String::from("diff --git a/src/a.rs b/src/a.rs\n--- a/src/a.rs\n+++ b/src/a.rs\n");
        for i in 0..lines {
            s.push_str(&format!("+line{i}();\n"));
        }
        analyze_diff(&s)
    }

    fn doc_analysis(lines: usize) -> DiffAnalysis {
        let mut s = String::from("diff --git a/README.md b/README.md\n--- a/README.md\n+++ b/README.md\n");
        for i in 0..lines {
            s.push_str(&format!("+line{i}\n"));
        }
        analyze_diff(&s)
    }

    #[test]
    fn substantial_pr_sync_is_full_automation() {
        let c = classify(
            &pr_event(PrAction::Synchronize),
            &code_analysis(200),
            &AutomationSettings::default(),
        );
        assert_eq!(
            c,
            Classification::Run {
                run_type: RunType::FullAutomation
            }
        );
    }

    #[test]
    fn push_under_pr_mode_is_skipped_by_trigger_mode() {
        let settings = AutomationSettings {
            trigger_mode: TriggerMode::Pr,
            ..Default::default()
        };
        let c = classify(&push_event(), &code_analysis(50), &settings);
        assert!(matches!(
            c,
            Classification::Skip {
                run_type: RunType::SkippedByTriggerMode,
                ..
            }
        ));
    }

    #[test]
    fn unsupported_pr_action_is_skipped() {
        let c = classify(
            &pr_event(PrAction::Other("labeled".into())),
            &code_analysis(50),
            &AutomationSettings::default(),
        );
        assert!(matches!(c, Classification::Skip { .. }));
    }

    #[test]
    fn trivial_doc_typo_is_skipped_with_trivial_reason() {
        let c = classify(
            &push_event(),
            &doc_analysis(3),
            &AutomationSettings::default(),
        );
        match c {
            Classification::Skip { run_type, reason } => {
                assert_eq!(run_type, RunType::SkippedTrivialChange);
                assert!(reason.contains("Trivial change"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn trivial_filter_can_be_disabled() {
        let settings = AutomationSettings {
            trivial_filter_enabled: false,
            docs_only_lightweight: true,
            ..Default::default()
        };
        let c = classify(&push_event(), &doc_analysis(3), &settings);
        assert_eq!(
            c,
            Classification::Run {
                run_type: RunType::LightweightOnly
            }
        );
    }

    #[test]
    fn docs_only_skips_by_default_and_runs_lightweight_when_enabled() {
        let default = AutomationSettings::default();
        let c = classify(&pr_event(PrAction::Opened), &doc_analysis(80), &default);
        assert!(matches!(
            c,
            Classification::Skip {
                run_type: RunType::SkippedDocsOnly,
                ..
            }
        ));

        let lightweight = AutomationSettings {
            docs_only_lightweight: true,
            ..Default::default()
        };
        let c = classify(&pr_event(PrAction::Opened), &doc_analysis(80), &lightweight);
        assert_eq!(
            c,
            Classification::Run {
                run_type: RunType::LightweightOnly
            }
        );
    }

    #[test]
    fn dedup_key_distinguishes_actions() {
        assert_eq!(push_event().dedup_key(), "abc1234567890def:push");
        assert_eq!(
            pr_event(PrAction::Synchronize).dedup_key(),
            "abc1234567890def:synchronize"
        );
    }

    #[test]
    fn trigger_types_cover_the_matrix() {
        assert_eq!(
            push_event().trigger_type(false),
            TriggerType::PushWithoutPr
        );
        assert_eq!(push_event().trigger_type(true), TriggerType::PushWithPr);
        assert_eq!(
            pr_event(PrAction::Opened).trigger_type(true),
            TriggerType::PrOpened
        );
        assert_eq!(
            pr_event(PrAction::Synchronize).trigger_type(true),
            TriggerType::PrSynchronized
        );
        assert_eq!(
            pr_event(PrAction::Reopened).trigger_type(true),
            TriggerType::PrReopened
        );
    }

    #[test]
    fn diff_truncation_is_bounded_and_marked() {
        let diff = "x".repeat(1000);
        let out = truncate_diff(&diff, 100);
        assert!(out.len() < 200);
        assert!(out.contains("truncated"));
        assert_eq!(truncate_diff("short", 100), "short");
    }
}
