use sotrace_core::{BlockId, PostId, RevisionId};
use sotrace_store::StoreError;
use thiserror::Error;

mod builder;
mod changes;
mod diff;
mod similarity;
mod summary;
mod walker;

#[cfg(test)]
mod testing;

pub use builder::{LineageBuilder, ProgressTracker, build_post_lineage};
pub use changes::{ChangeClassifier, ChangeKind, ChangeTally, PostChange};
pub use diff::{
    DiffDocument, DiffEmitter, DiffKey, DiffSink, DirectoryDiffSink, render_diff_rows,
};
pub use similarity::{
    BlockSimilarityRecord, ChainStatistics, SimilarityAggregator, SimilarityBand,
    SimilaritySummary, chain_statistics,
};
pub use summary::{LineageSummary, RevisionSummary, render_lineage_summary};
pub use walker::{ChainWalker, VisitedBlocks};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("post {post_id}: revision {revision_id} is referenced but not part of the lineage")]
    MissingRevision {
        post_id: PostId,
        revision_id: RevisionId,
    },
    #[error("post {post_id}: block {block_id} not found in revision {revision_id}")]
    MissingBlock {
        post_id: PostId,
        revision_id: RevisionId,
        block_id: BlockId,
    },
    #[error("post {post_id}: predecessor chain starting at block {block_id} does not terminate")]
    CyclicChain { post_id: PostId, block_id: BlockId },
    #[error("invalid similarity band [{min}, {max}]")]
    InvalidBand { min: f64, max: f64 },
}
