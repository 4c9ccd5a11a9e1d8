// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

fn strategy_with_journal(lines: &str, stale_after: Duration) -> (TempDir, StopRecordStrategy, PathBuf) {
    let temp = TempDir::new().unwrap();
    let strategy = StopRecordStrategy::new(temp.path()).with_stale_after(stale_after);
    let worktree = PathBuf::from("/state/tree/feature/auth/repo");
    std::fs::write(strategy.journal_path(&worktree), lines).unwrap();
    (temp, strategy, worktree)
}

// stale_after of zero makes every journal "stale" so tests exercise the
// record logic without sleeping
const ALWAYS_STALE: Duration = Duration::ZERO;
const NEVER_STALE: Duration = Duration::from_secs(3600);

#[test]
fn journal_path_slugs_the_worktree() {
    let strategy = StopRecordStrategy::new("/journals");
    let path = strategy.journal_path(Path::new("/state/tree/feature/auth/repo"));
    assert_eq!(path, PathBuf::from("/journals/-state-tree-feature-auth-repo.jsonl"));
}

#[test]
fn missing_journal_is_active() {
    let temp = TempDir::new().unwrap();
    let strategy = StopRecordStrategy::new(temp.path()).with_stale_after(ALWAYS_STALE);
    assert_eq!(strategy.classify(Path::new("/nowhere")), JournalVerdict::Active);
}

#[test]
fn stale_end_turn_without_tools_is_idle_done() {
    let (_temp, strategy, worktree) = strategy_with_journal(
        r#"{"type":"turn","stop_reason":"tool_use","tool_use":true}
{"type":"turn","stop_reason":"end_turn","tool_use":false}
"#,
        ALWAYS_STALE,
    );
    assert_eq!(strategy.classify(&worktree), JournalVerdict::IdleDone);
}

#[test]
fn fresh_end_turn_is_left_alone() {
    let (_temp, strategy, worktree) = strategy_with_journal(
        r#"{"type":"turn","stop_reason":"end_turn","tool_use":false}"#,
        NEVER_STALE,
    );
    assert_eq!(strategy.classify(&worktree), JournalVerdict::Active);
}

#[test]
fn end_turn_with_tool_use_is_active() {
    let (_temp, strategy, worktree) = strategy_with_journal(
        r#"{"type":"turn","stop_reason":"end_turn","tool_use":true}"#,
        ALWAYS_STALE,
    );
    assert_eq!(strategy.classify(&worktree), JournalVerdict::Active);
}

#[test]
fn error_field_is_surfaced() {
    let (_temp, strategy, worktree) = strategy_with_journal(
        r#"{"type":"turn","error":"credit balance too low"}"#,
        NEVER_STALE,
    );
    assert_eq!(
        strategy.classify(&worktree),
        JournalVerdict::Errored("credit balance too low".to_string())
    );
}

#[test]
fn error_typed_record_is_surfaced() {
    let (_temp, strategy, worktree) =
        strategy_with_journal(r#"{"type":"error"}"#, NEVER_STALE);
    assert!(matches!(strategy.classify(&worktree), JournalVerdict::Errored(_)));
}

#[test]
fn unparseable_last_line_is_active() {
    let (_temp, strategy, worktree) = strategy_with_journal("not json at all\n", ALWAYS_STALE);
    assert_eq!(strategy.classify(&worktree), JournalVerdict::Active);
}

#[test]
fn trailing_blank_lines_are_skipped() {
    let (_temp, strategy, worktree) = strategy_with_journal(
        "{\"type\":\"turn\",\"stop_reason\":\"end_turn\",\"tool_use\":false}\n\n\n",
        ALWAYS_STALE,
    );
    assert_eq!(strategy.classify(&worktree), JournalVerdict::IdleDone);
}
