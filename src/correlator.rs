//! Matching a requested release against an application's release history.
//!
//! All scans walk the page in backend order and keep the *last* match, so
//! when several entries qualify the one furthest down the page wins.

use crate::error::{MonitorError, Result};
use crate::models::release::ReleaseRecord;
use crate::models::rollout::CORRELATION_LABEL;

/// Release whose revision equals `commit_sha`.
pub fn find_by_commit<'a>(records: &'a [ReleaseRecord], commit_sha: &str) -> Option<&'a ReleaseRecord> {
    records.iter().rfind(|record| record.revision == commit_sha)
}

/// Pull the multi-cluster rollout id out of a release's commit message.
///
/// The last line mentioning the key wins; its value is the text after the
/// first `:` up to the next `:` (if any), trimmed.
pub fn extract_correlation_token(record: &ReleaseRecord) -> Result<String> {
    let line = record
        .commit_message
        .lines()
        .rfind(|line| line.contains(CORRELATION_LABEL))
        .ok_or_else(|| MonitorError::CorrelationTokenMissing {
            revision: record.revision.clone(),
        })?;

    match line.split(':').nth(1) {
        Some(value) => Ok(value.trim().to_string()),
        None => Err(MonitorError::CorrelationTokenMissing {
            revision: record.revision.clone(),
        }),
    }
}

/// Release whose embedded correlation token equals `token`.
///
/// A record without a token line aborts the scan: malformed history is
/// not something a retry can fix.
pub fn find_by_correlation_token<'a>(
    records: &'a [ReleaseRecord],
    token: &str,
) -> Result<Option<&'a ReleaseRecord>> {
    let mut found = None;
    for record in records {
        let candidate = extract_correlation_token(record)?;
        tracing::debug!(revision = %record.revision, token = %candidate, "release correlation token");
        if candidate == token {
            found = Some(record);
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(revision: &str, message: &str) -> ReleaseRecord {
        ReleaseRecord {
            revision: revision.to_string(),
            commit_message: message.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn find_by_commit_exact() {
        let page = vec![release("aaa", ""), release("bbb", ""), release("ccc", "")];
        assert_eq!(find_by_commit(&page, "bbb").unwrap().revision, "bbb");
        assert!(find_by_commit(&page, "bb").is_none());
        assert!(find_by_commit(&page, "zzz").is_none());
        assert!(find_by_commit(&[], "aaa").is_none());
    }

    #[test]
    fn find_by_commit_last_match_wins() {
        let page = vec![
            release("aaa", "first"),
            release("bbb", "other"),
            release("aaa", "second"),
        ];
        assert_eq!(find_by_commit(&page, "aaa").unwrap().commit_message, "second");
    }

    #[test]
    fn extract_token_single_line() {
        let r = release("aaa", "multiClusterRolloutId: abc123");
        assert_eq!(extract_correlation_token(&r).unwrap(), "abc123");
    }

    #[test]
    fn extract_token_among_other_lines() {
        let r = release(
            "aaa",
            "Bump checkout to 1.4.2\n\nmultiClusterRolloutId:   abc123  \nSigned-off-by: ci",
        );
        assert_eq!(extract_correlation_token(&r).unwrap(), "abc123");
    }

    #[test]
    fn extract_token_uses_last_line() {
        let r = release(
            "aaa",
            "multiClusterRolloutId: old-one\nrevert\nmultiClusterRolloutId: new-one",
        );
        assert_eq!(extract_correlation_token(&r).unwrap(), "new-one");
    }

    #[test]
    fn extract_token_missing() {
        let r = release("aaa", "Bump checkout to 1.4.2\nno id here");
        match extract_correlation_token(&r) {
            Err(MonitorError::CorrelationTokenMissing { revision }) => assert_eq!(revision, "aaa"),
            other => panic!("expected CorrelationTokenMissing, got {other:?}"),
        }
        assert!(extract_correlation_token(&release("bbb", "")).is_err());
    }

    #[test]
    fn find_by_token() {
        let page = vec![
            release("aaa", "multiClusterRolloutId: one"),
            release("bbb", "deploy\nmultiClusterRolloutId: two"),
            release("ccc", "multiClusterRolloutId: two"),
        ];
        let found = find_by_correlation_token(&page, "two").unwrap().unwrap();
        assert_eq!(found.revision, "ccc");
        assert!(find_by_correlation_token(&page, "three").unwrap().is_none());
    }

    #[test]
    fn find_by_token_fails_on_malformed_history() {
        let page = vec![
            release("aaa", "multiClusterRolloutId: one"),
            release("bbb", "hotfix without id"),
        ];
        assert!(matches!(
            find_by_correlation_token(&page, "one"),
            Err(MonitorError::CorrelationTokenMissing { .. })
        ));
    }
}
