//! Append-only version log
//!
//! A [`VersionLog`] is an arena of immutable artifact snapshots indexed by
//! version number. Version 0 is the artifact the node was created with;
//! each refinement appends one entry. Entries are never mutated or removed,
//! so superseded versions stay readable for audit.

use crate::artifact::{ArtifactError, TraceArtifact};
use crate::hash::ContentHash;
use crate::node_type::Stage;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One immutable snapshot in a version log
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactVersion {
    number: usize,
    artifact: TraceArtifact,
    stage: Stage,
    score_before: Option<f64>,
    score_after: Option<f64>,
    hash: ContentHash,
    recorded_at: DateTime<Utc>,
}

impl ArtifactVersion {
    /// Position in the log (0 for the initial artifact)
    #[inline]
    #[must_use]
    pub fn number(&self) -> usize {
        self.number
    }

    #[inline]
    #[must_use]
    pub fn artifact(&self) -> &TraceArtifact {
        &self.artifact
    }

    /// Stage that produced this snapshot
    #[inline]
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Quality score of the previous version when this one was recorded
    #[inline]
    #[must_use]
    pub fn score_before(&self) -> Option<f64> {
        self.score_before
    }

    /// Quality score of this version when it was recorded
    #[inline]
    #[must_use]
    pub fn score_after(&self) -> Option<f64> {
        self.score_after
    }

    #[inline]
    #[must_use]
    pub fn hash(&self) -> &ContentHash {
        &self.hash
    }

    #[inline]
    #[must_use]
    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }
}

/// Append-only arena of artifact snapshots
///
/// # Invariants
/// - Never empty: construction requires the initial artifact
/// - Entry `n` has `number() == n`
/// - Entries are immutable once appended
#[derive(Debug, Clone, Serialize)]
pub struct VersionLog {
    entries: Vec<ArtifactVersion>,
}

impl VersionLog {
    /// Start a log from the initial artifact
    #[must_use]
    pub fn new(initial: TraceArtifact) -> Self {
        let hash = initial.fingerprint();
        Self {
            entries: vec![ArtifactVersion {
                number: 0,
                artifact: initial,
                stage: Stage::Draft,
                score_before: None,
                score_after: None,
                hash,
                recorded_at: Utc::now(),
            }],
        }
    }

    /// Append a new snapshot and return it
    pub fn append(
        &mut self,
        artifact: TraceArtifact,
        stage: Stage,
        score_before: f64,
        score_after: f64,
    ) -> &ArtifactVersion {
        let number = self.entries.len();
        let hash = artifact.fingerprint();
        self.entries.push(ArtifactVersion {
            number,
            artifact,
            stage,
            score_before: Some(score_before),
            score_after: Some(score_after),
            hash,
            recorded_at: Utc::now(),
        });
        &self.entries[number]
    }

    /// Most recent snapshot
    #[inline]
    #[must_use]
    pub fn current(&self) -> &ArtifactVersion {
        // Non-empty by construction
        &self.entries[self.entries.len() - 1]
    }

    /// Index of the most recent snapshot
    #[inline]
    #[must_use]
    pub fn current_index(&self) -> usize {
        self.entries.len() - 1
    }

    /// Snapshot by version number
    ///
    /// # Errors
    /// Returns [`ArtifactError::VersionOutOfRange`] for unknown numbers
    pub fn get(&self, number: usize) -> Result<&ArtifactVersion, ArtifactError> {
        self.entries
            .get(number)
            .ok_or(ArtifactError::VersionOutOfRange {
                requested: number,
                len: self.entries.len(),
            })
    }

    /// The initial snapshot
    #[inline]
    #[must_use]
    pub fn original(&self) -> &ArtifactVersion {
        &self.entries[0]
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; present for API symmetry with `len`
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArtifactVersion> {
        self.entries.iter()
    }

    /// Whether the latest snapshot differs in content from its predecessor
    #[must_use]
    pub fn latest_changed(&self) -> bool {
        match self.entries.len() {
            0 | 1 => false,
            n => self.entries[n - 1].hash != self.entries[n - 2].hash,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Requirement;
    use pretty_assertions::assert_eq;

    fn req(description: &str) -> TraceArtifact {
        Requirement::new("REQ-1", "Login", description).into()
    }

    #[test]
    fn new_log_holds_initial_version() {
        let log = VersionLog::new(req("first"));
        assert_eq!(log.len(), 1);
        assert_eq!(log.current_index(), 0);
        assert_eq!(log.current().stage(), Stage::Draft);
        assert_eq!(log.current().score_before(), None);
        assert!(!log.latest_changed());
    }

    #[test]
    fn append_advances_current_and_keeps_history() {
        let mut log = VersionLog::new(req("first"));
        let appended = log.append(req("second"), Stage::Improve, 0.3, 0.6);
        assert_eq!(appended.number(), 1);
        assert_eq!(log.current().artifact().description(), "second");
        assert_eq!(log.original().artifact().description(), "first");
        assert!(log.latest_changed());
    }

    #[test]
    fn identical_content_is_detected() {
        let mut log = VersionLog::new(req("same"));
        log.append(req("same"), Stage::Debug, 0.2, 0.2);
        assert!(!log.latest_changed());
        assert_eq!(log.get(1).unwrap().hash(), log.get(0).unwrap().hash());
    }

    #[test]
    fn get_out_of_range_errors() {
        let log = VersionLog::new(req("x"));
        assert!(matches!(
            log.get(3),
            Err(ArtifactError::VersionOutOfRange { requested: 3, len: 1 })
        ));
    }
}
