use std::collections::HashSet;

use sotrace_core::{BlockId, BlockVersion, PostLineage, RevisionId, RevisionNode};

use crate::AnalysisError;

/// Block ids already accounted for within one post. Never share across posts.
#[derive(Debug, Default, Clone)]
pub struct VisitedBlocks {
    seen: HashSet<BlockId>,
}

impl VisitedBlocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, block_id: BlockId) -> bool {
        self.seen.contains(&block_id)
    }

    /// Returns true if the id was not seen before.
    pub fn insert(&mut self, block_id: BlockId) -> bool {
        self.seen.insert(block_id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

pub struct ChainWalker<'a> {
    lineage: &'a PostLineage,
    max_steps: usize,
}

impl<'a> ChainWalker<'a> {
    pub fn new(lineage: &'a PostLineage) -> Self {
        let max_steps = lineage
            .revisions()
            .iter()
            .map(|revision| revision.blocks().len())
            .sum();
        Self { lineage, max_steps }
    }

    /// Follows predecessor pointers from `start` back to the origin and calls
    /// `visit` for every block not yet in `visited`, newest first. A start
    /// block without a predecessor is not walked at all.
    pub fn walk_blocks<E, F>(
        &self,
        start_revision: RevisionId,
        start: &BlockVersion,
        visited: &mut VisitedBlocks,
        mut visit: F,
    ) -> Result<(), E>
    where
        E: From<AnalysisError>,
        F: FnMut(&'a RevisionNode, &'a BlockVersion) -> Result<(), E>,
    {
        if !start.has_predecessor() {
            return Ok(());
        }

        let mut current_revision_id = start_revision;
        let mut current_block_id = start.id;
        let mut steps = 0usize;

        loop {
            let (revision, block) = self.resolve(current_revision_id, current_block_id)?;

            if visited.insert(block.id) {
                visit(revision, block)?;
            }

            if !block.has_predecessor() {
                return Ok(());
            }

            steps += 1;
            if steps > self.max_steps {
                return Err(AnalysisError::CyclicChain {
                    post_id: self.lineage.post_id(),
                    block_id: start.id,
                }
                .into());
            }

            current_revision_id = block.preceding_revision_id;
            current_block_id = block.preceding_block_id;
        }
    }

    /// Similarity scores of the newly visited blocks along the chain, the
    /// origin's own (placeholder) score last.
    pub fn walk_similarities(
        &self,
        start_revision: RevisionId,
        start: &BlockVersion,
        visited: &mut VisitedBlocks,
    ) -> Result<Vec<f64>, AnalysisError> {
        let mut similarities = Vec::new();
        self.walk_blocks(start_revision, start, visited, |_, block| {
            similarities.push(block.preceding_similarity);
            Ok::<(), AnalysisError>(())
        })?;
        Ok(similarities)
    }

    pub fn resolve(
        &self,
        revision_id: RevisionId,
        block_id: BlockId,
    ) -> Result<(&'a RevisionNode, &'a BlockVersion), AnalysisError> {
        let post_id = self.lineage.post_id();
        let revision = self
            .lineage
            .revision(revision_id)
            .ok_or(AnalysisError::MissingRevision {
                post_id,
                revision_id,
            })?;
        let block = revision.block(block_id).ok_or(AnalysisError::MissingBlock {
            post_id,
            revision_id,
            block_id,
        })?;
        Ok((revision, block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_post_lineage;
    use crate::testing::{MemorySource, origin, successor};

    fn lineage_from(source: &MemorySource, post_id: i64) -> PostLineage {
        build_post_lineage(source, post_id).expect("build lineage")
    }

    /// r3 -> r2 -> r1, with block 31 -> 21 -> 11 and block 32 -> 21 sharing the same ancestry.
    fn shared_history_source() -> MemorySource {
        let mut source = MemorySource::default();
        source
            .add(9, 1, false, origin(11, 1))
            .add(9, 2, false, successor(21, 1, (1, 11), 0.9))
            .add(9, 3, true, successor(31, 1, (2, 21), 0.8))
            .add(9, 3, true, successor(32, 2, (2, 21), 0.6));
        source
    }

    #[test]
    fn origin_start_produces_empty_walk() {
        let source = shared_history_source();
        let lineage = lineage_from(&source, 9);
        let walker = ChainWalker::new(&lineage);
        let mut visited = VisitedBlocks::new();

        let start = lineage.block(1, 11).expect("origin block");
        let walked = walker
            .walk_similarities(1, start, &mut visited)
            .expect("walk origin");

        assert!(walked.is_empty());
        assert!(visited.is_empty());
    }

    #[test]
    fn walk_crosses_revisions_and_ends_with_origin_placeholder() {
        let source = shared_history_source();
        let lineage = lineage_from(&source, 9);
        let walker = ChainWalker::new(&lineage);
        let mut visited = VisitedBlocks::new();

        let start = lineage.block(3, 31).expect("start block");
        let walked = walker
            .walk_similarities(3, start, &mut visited)
            .expect("walk chain");

        assert_eq!(walked, vec![0.8, 0.9, 0.0]);
        assert_eq!(visited.len(), 3);
        assert!(visited.contains(11));
    }

    #[test]
    fn shared_ancestors_contribute_once_per_post() {
        let source = shared_history_source();
        let lineage = lineage_from(&source, 9);
        let walker = ChainWalker::new(&lineage);
        let mut visited = VisitedBlocks::new();

        let mut total = 0;
        for revision in lineage.revisions() {
            for block in revision.blocks() {
                total += walker
                    .walk_similarities(revision.id(), block, &mut visited)
                    .expect("walk")
                    .len();
            }
        }

        assert_eq!(total, 4);
        assert_eq!(visited.len(), 4);

        let second = lineage.block(3, 32).expect("second start");
        let again = walker
            .walk_similarities(3, second, &mut visited)
            .expect("walk again");
        assert!(again.is_empty());

        let mut fresh = VisitedBlocks::new();
        let fresh_walk = walker
            .walk_similarities(3, second, &mut fresh)
            .expect("walk with fresh set");
        assert_eq!(fresh_walk, vec![0.6, 0.9, 0.0]);
    }

    #[test]
    fn dangling_predecessor_is_an_invariant_violation() {
        let mut source = MemorySource::default();
        source
            .add(4, 1, false, origin(10, 1))
            .add(4, 2, true, successor(20, 1, (1, 99), 0.7))
            .add(4, 2, true, successor(21, 2, (5, 10), 0.7));
        let lineage = lineage_from(&source, 4);
        let walker = ChainWalker::new(&lineage);
        let mut visited = VisitedBlocks::new();

        let missing_block = lineage.block(2, 20).expect("block 20");
        let err = walker
            .walk_similarities(2, missing_block, &mut visited)
            .expect_err("missing block");
        assert!(matches!(
            err,
            AnalysisError::MissingBlock {
                post_id: 4,
                revision_id: 1,
                block_id: 99
            }
        ));

        let missing_revision = lineage.block(2, 21).expect("block 21");
        let err = walker
            .walk_similarities(2, missing_revision, &mut visited)
            .expect_err("missing revision");
        assert!(matches!(
            err,
            AnalysisError::MissingRevision {
                post_id: 4,
                revision_id: 5
            }
        ));
    }

    #[test]
    fn cyclic_pointers_are_rejected() {
        let mut source = MemorySource::default();
        source
            .add(6, 1, false, successor(10, 1, (2, 20), 0.5))
            .add(6, 2, true, successor(20, 1, (1, 10), 0.5));
        let lineage = lineage_from(&source, 6);
        let walker = ChainWalker::new(&lineage);
        let mut visited = VisitedBlocks::new();

        let start = lineage.block(2, 20).expect("start");
        let err = walker
            .walk_similarities(2, start, &mut visited)
            .expect_err("cycle");
        assert!(matches!(err, AnalysisError::CyclicChain { post_id: 6, .. }));
    }
}
