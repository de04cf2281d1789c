use serde::{Deserialize, Serialize};
use sotrace_core::{BlockId, PostId, PostLineage, RevisionId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionSummary {
    pub revision_id: RevisionId,
    pub previous_revision_id: RevisionId,
    pub is_most_recent: bool,
    pub block_ids: Vec<BlockId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageSummary {
    pub post_id: PostId,
    pub revision_count: usize,
    pub revisions: Vec<RevisionSummary>,
}

impl From<&PostLineage> for LineageSummary {
    fn from(lineage: &PostLineage) -> Self {
        let revisions = lineage
            .revisions()
            .iter()
            .map(|revision| RevisionSummary {
                revision_id: revision.id(),
                previous_revision_id: revision.previous_revision_id(),
                is_most_recent: revision.is_most_recent(),
                block_ids: revision.blocks().iter().map(|block| block.id).collect(),
            })
            .collect::<Vec<_>>();

        Self {
            post_id: lineage.post_id(),
            revision_count: revisions.len(),
            revisions,
        }
    }
}

/// `post(N):rev[b1,b2]->rev[b3]`, newest revision first.
pub fn render_lineage_summary(lineage: &PostLineage) -> String {
    let revisions = lineage
        .revisions()
        .iter()
        .map(|revision| {
            let blocks = revision
                .blocks()
                .iter()
                .map(|block| block.id.to_string())
                .collect::<Vec<_>>()
                .join(",");
            format!("{}[{blocks}]", revision.id())
        })
        .collect::<Vec<_>>()
        .join("->");

    format!("{}({}):{revisions}", lineage.post_id(), lineage.len())
}
