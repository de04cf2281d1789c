use serde::{Deserialize, Serialize};
use sotrace_config::MissingPolicy;
use sotrace_core::{BlockId, PostId, PostLineage, RevisionId};

use crate::AnalysisError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    #[default]
    None,
    Code,
    Text,
    Both,
}

impl ChangeKind {
    pub fn from_flags(code_changed: bool, text_changed: bool) -> Self {
        match (code_changed, text_changed) {
            (true, true) => Self::Both,
            (true, false) => Self::Code,
            (false, true) => Self::Text,
            (false, false) => Self::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Code => "code",
            Self::Text => "text",
            Self::Both => "both",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostChange {
    pub post_id: PostId,
    pub kind: ChangeKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeTally {
    pub code: usize,
    pub text: usize,
    pub both: usize,
    pub unchanged: usize,
}

impl ChangeTally {
    pub fn record(&mut self, kind: ChangeKind) {
        match kind {
            ChangeKind::Code => self.code += 1,
            ChangeKind::Text => self.text += 1,
            ChangeKind::Both => self.both += 1,
            ChangeKind::None => self.unchanged += 1,
        }
    }
}

/// Decides whether a post's current blocks still equal their origins.
pub struct ChangeClassifier {
    policy: MissingPolicy,
}

impl ChangeClassifier {
    pub fn new(policy: MissingPolicy) -> Self {
        Self { policy }
    }

    /// Classifies the post by the blocks of its newest revision. A post without
    /// revisions has no changes.
    pub fn classify(&self, lineage: &PostLineage) -> Result<PostChange, AnalysisError> {
        let mut code_changed = false;
        let mut text_changed = false;

        if let Some(newest) = lineage.newest() {
            for block in newest.blocks() {
                if self.is_unchanged_from_origin(lineage, newest.id(), block.id)? {
                    continue;
                }
                if block.is_code() {
                    code_changed = true;
                } else {
                    text_changed = true;
                }
                if code_changed && text_changed {
                    break;
                }
            }
        }

        Ok(PostChange {
            post_id: lineage.post_id(),
            kind: ChangeKind::from_flags(code_changed, text_changed),
        })
    }

    /// True when every version from `block_id` back to its origin is flagged
    /// equal to its predecessor.
    pub fn is_unchanged_from_origin(
        &self,
        lineage: &PostLineage,
        revision_id: RevisionId,
        block_id: BlockId,
    ) -> Result<bool, AnalysisError> {
        let post_id = lineage.post_id();
        let max_steps: usize = lineage.revisions().iter().map(|r| r.blocks().len()).sum();
        let mut current = (revision_id, block_id);

        for _ in 0..=max_steps {
            let (revision_id, block_id) = current;
            let Some(revision) = lineage.revision(revision_id) else {
                return self.on_missing(AnalysisError::MissingRevision {
                    post_id,
                    revision_id,
                });
            };
            let Some(block) = revision.block(block_id) else {
                return self.on_missing(AnalysisError::MissingBlock {
                    post_id,
                    revision_id,
                    block_id,
                });
            };

            if !block.is_equal_to_predecessor {
                return Ok(false);
            }
            if !block.has_predecessor() {
                return Ok(true);
            }
            current = (block.preceding_revision_id, block.preceding_block_id);
        }

        Err(AnalysisError::CyclicChain { post_id, block_id })
    }

    fn on_missing(&self, err: AnalysisError) -> Result<bool, AnalysisError> {
        match self.policy {
            MissingPolicy::TreatAsUnchanged => {
                tracing::debug!(error = %err, "missing predecessor treated as unchanged");
                Ok(true)
            }
            MissingPolicy::Fail => Err(err),
        }
    }
}
