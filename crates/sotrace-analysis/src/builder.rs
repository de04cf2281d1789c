use sotrace_core::{PostId, PostLineage, RevisionNode};
use sotrace_store::LineageSource;

use crate::AnalysisError;

/// Queries one post's revisions (newest first) and their blocks into a lineage.
pub fn build_post_lineage<S: LineageSource + ?Sized>(
    source: &S,
    post_id: PostId,
) -> Result<PostLineage, AnalysisError> {
    let mut lineage = PostLineage::new(post_id);

    for row in source.revisions_for_post(post_id)? {
        let mut revision = RevisionNode::new(row.revision_id, row.is_most_recent);
        for block in source.block_versions_for_revision(row.revision_id)? {
            revision.push_block(block);
        }
        lineage.push_revision(revision);
    }

    tracing::debug!(post_id, revisions = lineage.len(), "built post lineage");
    Ok(lineage)
}

#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total: usize,
    processed: usize,
    interval: u64,
}

impl ProgressTracker {
    /// An interval of 0 disables the periodic log line.
    pub fn new(total: usize, interval: u64) -> Self {
        Self {
            total,
            processed: 0,
            interval,
        }
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.processed)
    }

    /// Returns true when this step crossed a reporting boundary.
    pub fn record(&mut self) -> bool {
        self.processed += 1;
        if self.interval == 0 || self.processed as u64 % self.interval != 0 {
            return false;
        }

        tracing::info!(
            processed = self.processed,
            remaining = self.remaining(),
            "{} posts processed, {} left",
            self.processed,
            self.remaining()
        );
        true
    }
}

pub struct LineageBuilder<S> {
    source: S,
    progress_interval: u64,
}

impl<S: LineageSource> LineageBuilder<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            progress_interval: 0,
        }
    }

    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn build_post(&self, post_id: PostId) -> Result<PostLineage, AnalysisError> {
        build_post_lineage(&self.source, post_id)
    }

    #[cfg(test)]
    pub fn build_all(&self, post_ids: &[PostId]) -> Result<Vec<PostLineage>, AnalysisError> {
        let mut lineages = Vec::with_capacity(post_ids.len());
        self.for_each_post(post_ids, |lineage| {
            lineages.push(lineage);
            Ok::<(), AnalysisError>(())
        })?;
        Ok(lineages)
    }

    /// Builds and hands over one post at a time, in input order. The first
    /// error from either the store or the callback stops the batch.
    pub fn for_each_post<E, F>(&self, post_ids: &[PostId], mut handle: F) -> Result<(), E>
    where
        E: From<AnalysisError>,
        F: FnMut(PostLineage) -> Result<(), E>,
    {
        let mut progress = ProgressTracker::new(post_ids.len(), self.progress_interval);

        for &post_id in post_ids {
            let lineage = self.build_post(post_id)?;
            handle(lineage)?;
            progress.record();
        }

        tracing::info!(posts = progress.processed(), "finished importing post lineages");
        Ok(())
    }
}
