use serde::{Deserialize, Serialize};
use sotrace_config::{DEFAULT_MAX_SIMILARITY, DEFAULT_MIN_SIMILARITY, SimilarityConfig};
use sotrace_core::{BlockId, BlockType, BlockVersion, PostId, PostLineage};

use crate::AnalysisError;
use crate::walker::{ChainWalker, VisitedBlocks};

/// Closed acceptance interval for a chain's average similarity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityBand {
    min: f64,
    max: f64,
}

impl SimilarityBand {
    pub fn new(min: f64, max: f64) -> Result<Self, AnalysisError> {
        let valid = (0.0..=1.0).contains(&min) && (0.0..=1.0).contains(&max) && min <= max;
        if !valid {
            return Err(AnalysisError::InvalidBand { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn from_config(config: &SimilarityConfig) -> Result<Self, AnalysisError> {
        Self::new(config.min, config.max)
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

impl Default for SimilarityBand {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN_SIMILARITY,
            max: DEFAULT_MAX_SIMILARITY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainStatistics {
    pub revisions: usize,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

/// Min/max/avg over a walked chain, leaving out its last entry (the origin's
/// placeholder score). `None` for an empty walk; a one-entry walk has zero
/// revisions and an average of 0.
pub fn chain_statistics(walked: &[f64]) -> Option<ChainStatistics> {
    let (_, included) = walked.split_last()?;

    let mut min = 1.0_f64;
    let mut max = 0.0_f64;
    let mut sum = 0.0_f64;
    for &value in included {
        if value < min {
            min = value;
        }
        if value > max {
            max = value;
        }
        sum += value;
    }

    let revisions = included.len();
    let avg = if revisions == 0 {
        0.0
    } else {
        sum / revisions as f64
    };

    Some(ChainStatistics {
        revisions,
        min,
        max,
        avg,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSimilarityRecord {
    pub post_id: PostId,
    pub block_id: BlockId,
    pub block_type: BlockType,
    pub revisions: usize,
    pub min_similarity: f64,
    pub max_similarity: f64,
    pub avg_similarity: f64,
}

impl BlockSimilarityRecord {
    pub fn zeroed(post_id: PostId, block: &BlockVersion) -> Self {
        Self {
            post_id,
            block_id: block.id,
            block_type: block.block_type,
            revisions: 0,
            min_similarity: 0.0,
            max_similarity: 0.0,
            avg_similarity: 0.0,
        }
    }

    pub fn is_zeroed(&self) -> bool {
        self.revisions == 0
    }
}

pub struct SimilarityAggregator {
    band: SimilarityBand,
}

impl SimilarityAggregator {
    pub fn new(band: SimilarityBand) -> Self {
        Self { band }
    }

    pub fn record_for_chain(
        &self,
        post_id: PostId,
        block: &BlockVersion,
        walked: &[f64],
    ) -> Option<BlockSimilarityRecord> {
        let stats = chain_statistics(walked)?;
        if stats.revisions == 0 || !self.band.contains(stats.avg) {
            return Some(BlockSimilarityRecord::zeroed(post_id, block));
        }

        Some(BlockSimilarityRecord {
            post_id,
            block_id: block.id,
            block_type: block.block_type,
            revisions: stats.revisions,
            min_similarity: stats.min,
            max_similarity: stats.max,
            avg_similarity: stats.avg,
        })
    }

    /// One record per block whose walk is non-empty, newest revision first and
    /// ascending local id within a revision.
    pub fn aggregate_post(
        &self,
        lineage: &PostLineage,
    ) -> Result<Vec<BlockSimilarityRecord>, AnalysisError> {
        let walker = ChainWalker::new(lineage);
        let mut visited = VisitedBlocks::new();
        let mut records = Vec::new();

        for revision in lineage.revisions() {
            for block in revision.blocks() {
                let walked = walker.walk_similarities(revision.id(), block, &mut visited)?;
                if let Some(record) = self.record_for_chain(lineage.post_id(), block, &walked) {
                    if !record.is_zeroed() {
                        tracing::debug!(
                            post_id = record.post_id,
                            block_id = record.block_id,
                            avg = record.avg_similarity,
                            "average similarity within band"
                        );
                    }
                    records.push(record);
                }
            }
        }

        Ok(records)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SimilaritySummary {
    pub posts: usize,
    pub records: usize,
    pub in_band: usize,
}

impl SimilaritySummary {
    pub fn add_post(&mut self, records: &[BlockSimilarityRecord]) {
        self.posts += 1;
        self.records += records.len();
        self.in_band += records.iter().filter(|record| !record.is_zeroed()).count();
    }
}
