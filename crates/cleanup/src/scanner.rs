//! Paged scan over canvases matching the retention predicate.

use tessera_metadata::models::CanvasRow;
use tessera_metadata::repos::CanvasCursor;
use tessera_metadata::{MetadataResult, MetadataStore};
use time::OffsetDateTime;

/// Pages through eligible canvases on a keyset cursor over the
/// immutable `(created_at, canvas_id)` sort key. Deleting rows behind
/// the cursor cannot shift the rows still ahead of it, so a run visits
/// every canvas that was eligible when it started exactly once.
pub(crate) struct EligibilityScanner<'a> {
    metadata: &'a dyn MetadataStore,
    cutoff: OffsetDateTime,
    page_size: u32,
    cursor: Option<CanvasCursor>,
}

impl<'a> EligibilityScanner<'a> {
    pub(crate) fn new(
        metadata: &'a dyn MetadataStore,
        cutoff: OffsetDateTime,
        page_size: u32,
    ) -> Self {
        Self {
            metadata,
            cutoff,
            page_size,
            cursor: None,
        }
    }

    /// Fetch the next page. An empty page means the scan is exhausted.
    pub(crate) async fn next_page(&mut self) -> MetadataResult<Vec<CanvasRow>> {
        let page = self
            .metadata
            .list_expired_canvases(self.cutoff, self.cursor.clone(), self.page_size)
            .await?;
        if let Some(last) = page.last() {
            self.cursor = Some(CanvasCursor::from(last));
        }
        Ok(page)
    }
}
