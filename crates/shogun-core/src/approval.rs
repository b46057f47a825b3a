//! The Approval Pipeline (Component E): turn an approved `skill_candidate`
//! decision into a scaffolded skill document (§4.E).

use std::path::{Path, PathBuf};

use crate::decision::{Decision, DecisionKind};
use crate::error::OpsError;
use crate::layout::Layout;

/// Fixed section order every scaffolded skill document carries (§4.E step
/// 2). Headings are written empty; a human fills them in.
const SECTIONS: &[&str] = &[
    "Overview",
    "Principles",
    "Patterns",
    "Checklist",
    "Anti-patterns",
    "Related",
];

/// Approve a pending `skill_candidate` decision: scaffold `skills/<name>.md`
/// in the repository working tree, append an alphabetically-ordered entry
/// to `skills/README.md`, and archive the decision.
///
/// Returns the path to the scaffolded skill document.
///
/// # Errors
/// Returns [`OpsError::DecisionNotFound`] if `decision_id` does not name a
/// file in the decision queue, [`OpsError::InvalidField`] if that file is
/// not a `skill_candidate` decision, and [`OpsError::SkillExists`] if the
/// target skill document already exists.
pub fn approve_skill(
    layout: &Layout,
    repo_root: &Path,
    decision_id: &str,
) -> Result<PathBuf, OpsError> {
    let decision_path = layout.decision_queue_dir().join(format!("{decision_id}.yaml"));
    let raw = std::fs::read_to_string(&decision_path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            OpsError::DecisionNotFound {
                id: decision_id.to_owned(),
            }
        } else {
            OpsError::Io(e)
        }
    })?;
    let decision: Decision = serde_yaml::from_str(&raw).map_err(|e| OpsError::CorruptFile {
        path: decision_path.clone(),
        detail: e.to_string(),
    })?;
    if decision.kind != DecisionKind::SkillCandidate {
        return Err(OpsError::InvalidField {
            path: decision_path,
            field: "type",
            value: decision.kind.to_string(),
            reason: "decision is not a skill_candidate".to_owned(),
        });
    }
    let name = decision.request_str("name").ok_or_else(|| OpsError::InvalidField {
        path: decision_path.clone(),
        field: "request.name",
        value: String::new(),
        reason: "missing".to_owned(),
    })?;
    let summary = decision.request_str("summary").unwrap_or_default();

    let skills_dir = repo_root.join("skills");
    let skill_path = skills_dir.join(format!("{name}.md"));
    if skill_path.exists() {
        return Err(OpsError::SkillExists {
            name: name.to_owned(),
        });
    }
    std::fs::create_dir_all(&skills_dir)?;
    std::fs::write(&skill_path, render_skill_document(name, summary))?;
    append_readme_entry(&skills_dir.join("README.md"), name, summary)?;

    let archive_dest = layout
        .decision_archive_dir()
        .join(format!("{decision_id}.yaml"));
    crate::atomic::rename_with_collision_suffix(&decision_path, &archive_dest)?;

    Ok(skill_path)
}

fn render_skill_document(name: &str, summary: &str) -> String {
    let mut doc = format!("# {name}\n\n## Overview\n{summary}\n");
    for section in &SECTIONS[1..] {
        doc.push_str(&format!("\n## {section}\n"));
    }
    doc
}

/// The heading whose immediately-following bullets constitute the skill
/// list (§4.E step 4: "under the Skill list block").
const SKILL_LIST_HEADING: &str = "## Skill list";

/// Insert a `- [name](name.md) — summary` bullet into `skills/README.md`
/// under the `## Skill list` heading, keeping that block's bullets
/// alphabetically ordered by skill name (§4.E step 3). Creates the file
/// with a minimal skeleton if it does not exist yet.
fn append_readme_entry(readme_path: &Path, name: &str, summary: &str) -> Result<(), OpsError> {
    let existing = std::fs::read_to_string(readme_path).unwrap_or_default();
    let new_line = format!("- [{name}.md](./{name}.md): {summary}");
    let mut lines: Vec<String> = existing.lines().map(str::to_owned).collect();

    let heading_at = match lines.iter().position(|l| l.trim() == SKILL_LIST_HEADING) {
        Some(idx) => idx,
        None => {
            if !lines.is_empty() && !lines.last().is_some_and(|l| l.trim().is_empty()) {
                lines.push(String::new());
            }
            lines.push(SKILL_LIST_HEADING.to_owned());
            lines.push(String::new());
            lines.len() - 2
        }
    };

    let block_start = heading_at + 1;
    let block_end = lines[block_start..]
        .iter()
        .position(|l| l.starts_with("##") || (bullet_name(l).is_none() && !l.trim().is_empty()))
        .map_or(lines.len(), |offset| block_start + offset);

    let insert_at = lines[block_start..block_end]
        .iter()
        .position(|line| bullet_name(line).is_some_and(|n| n > name))
        .map_or(block_end, |offset| block_start + offset);
    lines.insert(insert_at, new_line);

    let mut rendered = lines.join("\n");
    rendered.push('\n');
    std::fs::write(readme_path, rendered)?;
    Ok(())
}

/// Extract the skill name from a bullet written by [`append_readme_entry`],
/// stripping the trailing `.md`.
fn bullet_name(line: &str) -> Option<&str> {
    let start = line.find("- [")? + 3;
    let end = line[start..].find(']')? + start;
    line[start..end].strip_suffix(".md")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, Layout) {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout {
            root: dir.path().join("ops"),
        };
        std::fs::create_dir_all(layout.decision_queue_dir()).unwrap();
        std::fs::create_dir_all(layout.decision_archive_dir()).unwrap();
        (dir, layout)
    }

    fn write_skill_candidate_decision(layout: &Layout, id: &str, name: &str, summary: &str) {
        let decision = Decision::skill_candidate(
            "20260129T120000Z",
            name,
            summary,
            &["alice".to_owned()],
            &["alice".to_owned()],
        );
        let path = layout.decision_queue_dir().join(format!("{id}.yaml"));
        std::fs::write(&path, serde_yaml::to_string(&decision).unwrap()).unwrap();
    }

    #[test]
    fn approve_skill_scaffolds_document_with_fixed_sections() {
        let (dir, layout) = setup();
        write_skill_candidate_decision(&layout, "DEC-SC-1", "retry-logic", "backoff strategy");

        let skill_path = approve_skill(&layout, dir.path(), "DEC-SC-1").unwrap();
        let contents = std::fs::read_to_string(&skill_path).unwrap();
        assert!(contents.starts_with("# retry-logic\n"));
        for section in SECTIONS {
            assert!(contents.contains(&format!("## {section}")), "missing {section}");
        }
    }

    #[test]
    fn approve_skill_archives_decision() {
        let (dir, layout) = setup();
        write_skill_candidate_decision(&layout, "DEC-SC-1", "retry-logic", "backoff strategy");

        approve_skill(&layout, dir.path(), "DEC-SC-1").unwrap();
        assert!(!layout.decision_queue_dir().join("DEC-SC-1.yaml").exists());
        assert!(layout
            .decision_archive_dir()
            .join("DEC-SC-1.yaml")
            .exists());
    }

    #[test]
    fn approve_skill_fails_fast_when_decision_missing() {
        let (dir, layout) = setup();
        let result = approve_skill(&layout, dir.path(), "DEC-SC-nope");
        assert!(matches!(result, Err(OpsError::DecisionNotFound { .. })));
    }

    #[test]
    fn approve_skill_fails_fast_on_wrong_decision_type() {
        let (dir, layout) = setup();
        let decision = Decision::blocker("20260129T120000Z", 1, "stuck");
        std::fs::write(
            layout.decision_queue_dir().join("DEC-BL-1.yaml"),
            serde_yaml::to_string(&decision).unwrap(),
        )
        .unwrap();

        let result = approve_skill(&layout, dir.path(), "DEC-BL-1");
        assert!(matches!(result, Err(OpsError::InvalidField { .. })));
    }

    #[test]
    fn approve_skill_fails_fast_when_skill_already_exists() {
        let (dir, layout) = setup();
        write_skill_candidate_decision(&layout, "DEC-SC-1", "retry-logic", "backoff strategy");
        std::fs::create_dir_all(dir.path().join("skills")).unwrap();
        std::fs::write(dir.path().join("skills/retry-logic.md"), "already here").unwrap();

        let result = approve_skill(&layout, dir.path(), "DEC-SC-1");
        assert!(matches!(result, Err(OpsError::SkillExists { .. })));
    }

    #[test]
    fn readme_entries_stay_alphabetically_ordered() {
        let (dir, layout) = setup();
        write_skill_candidate_decision(&layout, "DEC-SC-1", "zeta-pattern", "z summary");
        write_skill_candidate_decision(&layout, "DEC-SC-2", "alpha-pattern", "a summary");

        approve_skill(&layout, dir.path(), "DEC-SC-1").unwrap();
        approve_skill(&layout, dir.path(), "DEC-SC-2").unwrap();

        let readme = std::fs::read_to_string(dir.path().join("skills/README.md")).unwrap();
        let alpha_pos = readme.find("alpha-pattern").unwrap();
        let zeta_pos = readme.find("zeta-pattern").unwrap();
        assert!(alpha_pos < zeta_pos);
    }
}
