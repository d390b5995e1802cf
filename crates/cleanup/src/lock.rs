//! Singleton run lock.
//!
//! At most one cleanup run may be active. The lock is a single
//! constrained row in the metadata store; acquisition races are settled
//! by the atomicity of the insert. A lock older than the staleness
//! threshold is presumed abandoned by a crashed run and taken over.

use tessera_metadata::models::LockRow;
use tessera_metadata::{MetadataResult, MetadataStore};
use time::{Duration, OffsetDateTime};

/// Outcome of an acquisition attempt.
#[derive(Debug)]
pub(crate) enum Acquisition {
    Acquired,
    Held {
        holder: String,
        held_at: OffsetDateTime,
    },
}

pub(crate) async fn acquire(
    metadata: &dyn MetadataStore,
    holder: &str,
    stale_after: Duration,
) -> MetadataResult<Acquisition> {
    let now = OffsetDateTime::now_utc();
    let lock = LockRow {
        lock_id: 1,
        holder: holder.to_string(),
        held_at: now,
    };

    if metadata.try_insert_lock(&lock).await? {
        return Ok(Acquisition::Acquired);
    }

    let Some(existing) = metadata.get_lock().await? else {
        // Holder released between our insert attempt and the read.
        if metadata.try_insert_lock(&lock).await? {
            return Ok(Acquisition::Acquired);
        }
        // Lost that race too; yield to whoever won.
        return Ok(Acquisition::Held {
            holder: "unknown".to_string(),
            held_at: now,
        });
    };

    let age = now - existing.held_at;
    if age <= stale_after {
        return Ok(Acquisition::Held {
            holder: existing.holder,
            held_at: existing.held_at,
        });
    }

    tracing::warn!(
        holder = %existing.holder,
        held_at = %existing.held_at,
        age_minutes = age.whole_minutes(),
        "forcing release of stale cleanup lock"
    );
    metadata.delete_lock().await?;
    if metadata.try_insert_lock(&lock).await? {
        return Ok(Acquisition::Acquired);
    }

    // Another process won the takeover between our delete and insert.
    match metadata.get_lock().await? {
        Some(winner) => Ok(Acquisition::Held {
            holder: winner.holder,
            held_at: winner.held_at,
        }),
        None => Ok(Acquisition::Held {
            holder: "unknown".to_string(),
            held_at: now,
        }),
    }
}

/// Best-effort release. A failure here is logged, never escalated: the
/// staleness threshold guarantees the next run can proceed regardless.
pub(crate) async fn release(metadata: &dyn MetadataStore) {
    if let Err(e) = metadata.delete_lock().await {
        tracing::warn!(
            error = %e,
            "failed to release cleanup lock; the next run will take it over as stale"
        );
    }
}
