//! Integration tests for session accounting: additivity, truncation,
//! edit/delete recomputation and index guards.

use std::sync::Arc;

use tally_cost::{
    ChatSession, ModelProfile, ModelTable, Role, TiktokenTokenizer, TurnId, UsageError,
    WordTokenizer, calculate_cost, recompute_snapshot,
};

/// Text that the word tokenizer counts as `n` tokens.
fn words(n: usize) -> String {
    vec!["tok"; n].join(" ")
}

/// Session over the word tokenizer with one user turn per count.
fn session_with(counts: &[usize], limit: usize) -> ChatSession {
    let mut session = ChatSession::new(
        ModelProfile::new("word-model", 0.03, 0.06, limit),
        Arc::new(WordTokenizer::new()),
    );
    for &n in counts {
        session.append_turn(Role::User, words(n)).unwrap();
    }
    session
}

#[test]
fn test_total_equals_sum_of_individual_counts() {
    let session = session_with(&[3, 0, 12, 7, 1], 1000);
    let tokenizer = WordTokenizer::new();

    let individual: usize = session
        .turns()
        .iter()
        .map(|t| {
            use tally_cost::Tokenizer;
            tokenizer.count_tokens(&t.text, "word-model").unwrap()
        })
        .sum();

    assert_eq!(session.snapshot().total_tokens, individual);
    assert_eq!(session.snapshot().total_tokens, 23);
}

#[test]
fn test_recompute_twice_is_identical() {
    let session = session_with(&[5, 9, 2], 10);
    let tokenizer = WordTokenizer::new();

    let first = recompute_snapshot(session.turns(), session.profile(), &tokenizer).unwrap();
    let second = recompute_snapshot(session.turns(), session.profile(), &tokenizer).unwrap();

    assert_eq!(first, second);
    assert_eq!(&first, session.snapshot());
}

#[test]
fn test_truncation_boundary() {
    // a = 4, b = 3, c = 2, L = 5: a <= L < a + b
    let session = session_with(&[4, 3, 2], 5);
    let snapshot = session.snapshot();

    assert!(!snapshot.is_truncated(0));
    assert!(snapshot.is_truncated(1));
    assert!(snapshot.is_truncated(2));
    assert_eq!(snapshot.truncated_tokens, 3 + 2);
    assert!(snapshot.context_exceeded());
}

#[test]
fn test_truncated_turns_stay_in_history() {
    let session = session_with(&[4, 3, 2], 5);
    assert_eq!(session.len(), 3);
    assert_eq!(session.turns()[2].text, words(2));
}

#[test]
fn test_edit_first_turn_changes_only_its_count() {
    let mut session = session_with(&[4, 6, 8], 1000);
    let before = session.snapshot().clone();

    let after = session.edit_turn(0, words(9)).unwrap().clone();

    assert_eq!(after.per_turn_tokens[0], 9);
    assert_eq!(after.per_turn_tokens[1..], before.per_turn_tokens[1..]);
    assert_eq!(after.total_tokens as i64 - before.total_tokens as i64, 9 - 4);
}

#[test]
fn test_edit_can_bring_conversation_back_inside_window() {
    let mut session = session_with(&[4, 3, 2], 5);
    assert_eq!(session.snapshot().truncated_tokens, 5);

    session.edit_turn(0, words(0)).unwrap();
    assert_eq!(session.snapshot().truncated_tokens, 0);
    assert!(!session.snapshot().context_exceeded());
}

#[test]
fn test_delete_middle_turn() {
    let mut session = session_with(&[2, 5, 7], 1000);
    let t0 = session.turns()[0].clone();
    let t2 = session.turns()[2].clone();

    session.delete_turn(1).unwrap();

    assert_eq!(session.turns(), &[t0, t2]);
    assert_eq!(session.snapshot().total_tokens, 2 + 7);
    assert_eq!(session.snapshot().per_turn_tokens, vec![2, 7]);
}

#[test]
fn test_out_of_range_index_leaves_list_unchanged() {
    let mut session = session_with(&[1, 2, 3], 1000);
    let turns_before = session.turns().to_vec();
    let snapshot_before = session.snapshot().clone();

    let len = session.len();
    assert_eq!(
        session.edit_turn(len, "changed").unwrap_err(),
        UsageError::IndexOutOfRange { index: 3, len: 3 }
    );
    assert_eq!(
        session.delete_turn(len).unwrap_err(),
        UsageError::IndexOutOfRange { index: 3, len: 3 }
    );
    assert!(session.delete_turn(usize::MAX).is_err());

    assert_eq!(session.turns(), turns_before.as_slice());
    assert_eq!(session.snapshot(), &snapshot_before);
}

#[test]
fn test_edit_on_empty_session_fails() {
    let mut session = session_with(&[], 1000);
    assert!(matches!(
        session.edit_turn(0, "x"),
        Err(UsageError::IndexOutOfRange { index: 0, len: 0 })
    ));
}

#[test]
fn test_stale_position_vs_stable_id_after_delete() {
    let mut session = session_with(&[1, 2, 3], 1000);
    let third = session.turns()[2].id;

    session.delete_turn(0).unwrap();

    // Position 2 no longer exists, but the id still finds the same turn
    assert!(session.edit_turn(2, "x").is_err());
    session.edit_turn_by_id(third, words(10)).unwrap();
    assert_eq!(session.turn(third).unwrap().text, words(10));
    assert_eq!(session.index_of(third), Some(1));
}

#[test]
fn test_deleted_id_is_not_found() {
    let mut session = session_with(&[1, 2], 1000);
    let first = session.turns()[0].id;

    session.delete_turn_by_id(first).unwrap();

    assert_eq!(
        session.delete_turn_by_id(first).unwrap_err(),
        UsageError::TurnNotFound(first)
    );
    assert_eq!(
        session.edit_turn_by_id(TurnId(999), "x").unwrap_err(),
        UsageError::TurnNotFound(TurnId(999))
    );
}

#[test]
fn test_builtin_gpt4_cost_example() {
    let table = ModelTable::builtin();
    let gpt4 = table.get("gpt-4").unwrap();
    let cost = calculate_cost(1000, 500, gpt4);
    assert!((cost - 0.06).abs() < 1e-9);
}

#[test]
fn test_builtin_cached_model_double_counts_by_default() {
    let table = ModelTable::builtin();
    let o1 = table.get("o1-preview").unwrap();
    // 1k input at 0.015 + 1k output at 0.06 + 1k input at cached 0.0075
    let cost = calculate_cost(1000, 1000, o1);
    assert!((cost - 0.0825).abs() < 1e-9);
}

#[test]
fn test_tiktoken_session_end_to_end() {
    let table = ModelTable::builtin();
    let mut session = ChatSession::new(
        table.get("gpt-3.5-turbo").unwrap().clone(),
        Arc::new(TiktokenTokenizer::new()),
    );

    let outcome = session.record_exchange("hello world", "hello world").unwrap();
    assert_eq!(outcome.prompt_tokens, 2);
    assert_eq!(outcome.response_tokens, 2);
    assert_eq!(session.snapshot().total_tokens, 4);
    assert!(!outcome.context_exceeded);

    session.delete_turn(1).unwrap();
    assert_eq!(session.snapshot().total_tokens, 2);
}

#[test]
fn test_unknown_model_tokenizer_fails_without_mutation() {
    let mut session = ChatSession::new(
        ModelProfile::new("not-a-real-model", 0.0, 0.0, 100),
        Arc::new(TiktokenTokenizer::new()),
    );

    let err = session.record_exchange("hi", "there").unwrap_err();
    assert!(err.is_fatal_for_session());
    assert!(session.is_empty());
    assert_eq!(session.spent_usd(), 0.0);
}
