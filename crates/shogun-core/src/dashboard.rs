//! `dashboard.md` rendering (§4.C: "dashboard.md contract").
//!
//! The dashboard is the only non-YAML artifact the core produces. Headings
//! are stable across every render so downstream tooling (and humans) can
//! grep for them; every section prints `- (none)` when it has nothing to
//! show rather than omitting itself.

use crate::decision::Decision;
use crate::state::State;

/// Render `dashboard.md` from folded state and the current set of open
/// decisions.
#[must_use]
pub fn render(state: &State, open_decisions: &[Decision]) -> String {
    let mut out = String::new();
    out.push_str("# Agentic-SDD Ops Dashboard\n\n");
    out.push_str(&format!("Updated: {}\n\n", state.updated_at));

    out.push_str("## Summary\n\n");
    if state.issues.is_empty() {
        out.push_str("- (none)\n");
    } else {
        for (issue, s) in &state.issues {
            let assigned = s.assigned_to.as_deref().unwrap_or("unassigned");
            out.push_str(&format!(
                "- #{issue} {} — {} {}% ({assigned})\n",
                s.title, s.phase, s.progress_percent
            ));
        }
    }
    out.push('\n');

    out.push_str("## Action Required\n\n");
    if state.action_required.is_empty() {
        out.push_str("- (none)\n");
    } else {
        for item in &state.action_required {
            out.push_str(&format!("- {item}\n"));
        }
    }
    out.push('\n');

    out.push_str("## Skill Candidates (Approval Pending)\n\n");
    let skill_candidates: Vec<&Decision> = open_decisions
        .iter()
        .filter(|d| d.kind == crate::decision::DecisionKind::SkillCandidate)
        .collect();
    if skill_candidates.is_empty() {
        out.push_str("- (none)\n");
    } else {
        for d in skill_candidates {
            let name = d.request_str("name").unwrap_or("?");
            let summary = d.request_str("summary").unwrap_or("");
            out.push_str(&format!("- {name}: {summary}\n"));
        }
    }
    out.push('\n');

    out.push_str("## Blocked / Needs Decision\n\n");
    if state.blocked.is_empty() {
        out.push_str("- (none)\n");
    } else {
        for b in &state.blocked {
            out.push_str(&format!("- #{}: {}\n", b.issue, b.reason));
        }
    }
    out.push('\n');

    out.push_str("## Recent Check-ins\n\n");
    if state.recent_checkins.is_empty() {
        out.push_str("- (none)\n");
    } else {
        for c in &state.recent_checkins {
            out.push_str(&format!("- #{} [{}] {}: {}\n", c.issue, c.at, c.worker, c.summary));
        }
    }

    out
}

/// Describe one open decision as a single line, used both for
/// `state.action_required` and for diagnostic printouts.
#[must_use]
pub fn describe_decision(d: &Decision) -> String {
    match d.issue {
        Some(issue) => format!("{} for #{issue}", d.kind),
        None => d.kind.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkin::Phase;
    use crate::config::ImplMode;
    use crate::state::{IssueState, RecentCheckin};

    #[test]
    fn empty_state_shows_none_placeholders() {
        let mut state = State::default();
        state.updated_at = "2026-01-29T12:00:00Z".to_owned();
        let md = render(&state, &[]);
        assert!(md.starts_with("# Agentic-SDD Ops Dashboard\n"));
        assert!(md.contains("Updated: 2026-01-29T12:00:00Z"));
        assert!(md.contains("## Summary\n\n- (none)"));
        assert!(md.contains("## Action Required\n\n- (none)"));
        assert!(md.contains("## Skill Candidates (Approval Pending)\n\n- (none)"));
        assert!(md.contains("## Blocked / Needs Decision\n\n- (none)"));
        assert!(md.contains("## Recent Check-ins\n\n- (none)"));
    }

    #[test]
    fn summary_lists_issues_with_assignment() {
        let mut state = State::default();
        state.issues.insert(
            "18".to_owned(),
            IssueState {
                title: "fix login".to_owned(),
                phase: Phase::Implementing,
                progress_percent: 40,
                assigned_to: Some("alice".to_owned()),
                impl_mode: ImplMode::Impl,
                last_checkin: None,
                contract: None,
            },
        );
        let md = render(&state, &[]);
        assert!(md.contains("#18 fix login"));
        assert!(md.contains("40%"));
        assert!(md.contains("(alice)"));
    }

    #[test]
    fn recent_checkins_render_in_order() {
        let mut state = State::default();
        state.push_recent_checkin(RecentCheckin {
            issue: 18,
            worker: "alice".to_owned(),
            at: "20260129T121501Z".to_owned(),
            summary: "progress".to_owned(),
        });
        let md = render(&state, &[]);
        assert!(md.contains("#18"));
        assert!(md.contains("progress"));
    }

    #[test]
    fn skill_candidates_rendered_from_open_decisions() {
        let state = State::default();
        let decision = Decision::skill_candidate(
            "2026-01-29T12:00:00Z",
            "retry-logic",
            "captures the retry pattern",
            &[],
            &[],
        );
        let md = render(&state, &[decision]);
        assert!(md.contains("retry-logic: captures the retry pattern"));
    }

    #[test]
    fn describe_decision_includes_issue_when_present() {
        let d = Decision::blocker("2026-01-29T12:00:00Z", 18, "stuck");
        assert_eq!(describe_decision(&d), "blocker for #18");
    }
}
