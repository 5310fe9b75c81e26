use crate::error::relay::RelayError;
use crate::relay::{SessionEntry, SessionTable};

use common::RedactedStreamKey;
use models::SessionId;

use std::net::SocketAddr;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

fn session_id(key: &str) -> SessionId {
    SessionId::from_stream_key(&RedactedStreamKey::new(key))
}

fn entry(connection_id: Uuid) -> SessionEntry {
    SessionEntry {
        connection_id,
        peer: SocketAddr::from(([127, 0, 0, 1], 40000)),
        started_at: Instant::now(),
        cancel: CancellationToken::new(),
    }
}

/// **VALUE**: Verifies a key can hold only one live session.
///
/// **WHY THIS MATTERS**: Two transcoders pushing the same key to one ingest endpoint fight
/// over the stream and both get dropped.
///
/// **BUG THIS CATCHES**: Would catch the duplicate check being skipped or racing.
#[tokio::test]
async fn given_live_key_when_inserted_again_then_setup_error() {
    // GIVEN: A table with abc123 live
    let table = SessionTable::new(8);
    table
        .insert(session_id("abc123"), entry(Uuid::new_v4()))
        .await
        .unwrap();

    // WHEN: A second connection claims the same key
    let result = table.insert(session_id("abc123"), entry(Uuid::new_v4())).await;

    // THEN: Rejected, first session untouched
    assert!(matches!(result, Err(RelayError::Setup { .. })));
    assert_eq!(table.len().await, 1);
}

/// **VALUE**: Verifies capacity is enforced.
#[tokio::test]
async fn given_full_table_when_inserted_then_setup_error() {
    // GIVEN: A table of one, already full
    let table = SessionTable::new(1);
    table
        .insert(session_id("first"), entry(Uuid::new_v4()))
        .await
        .unwrap();

    // WHEN: Another key arrives
    let result = table.insert(session_id("second"), entry(Uuid::new_v4())).await;

    // THEN: Rejected
    assert!(matches!(result, Err(RelayError::Setup { .. })));
    assert!(!table.contains(&session_id("second")).await);
}

/// **VALUE**: Verifies removal only applies to the connection that owns the entry.
///
/// **BUG THIS CATCHES**: Would catch a rejected duplicate's teardown evicting the live session.
#[tokio::test]
async fn given_other_connection_when_removed_then_entry_kept() {
    // GIVEN: abc123 owned by one connection
    let table = SessionTable::new(8);
    let owner = Uuid::new_v4();
    table
        .insert(session_id("abc123"), entry(owner))
        .await
        .unwrap();

    // WHEN: A different connection removes it, then the owner does
    table
        .remove(session_id("abc123"), Uuid::new_v4())
        .await
        .unwrap();
    flush_actor(&table, "barrier-1").await;
    let kept = table.contains(&session_id("abc123")).await;

    table.remove(session_id("abc123"), owner).await.unwrap();
    flush_actor(&table, "barrier-2").await;
    let removed = !table.contains(&session_id("abc123")).await;

    // THEN: Only the owner's removal took effect
    assert!(kept, "Foreign removal must not evict the session");
    assert!(removed, "Owner removal must evict the session");
}

/// Round-trip an insert through the actor so earlier removals have been applied.
async fn flush_actor(table: &SessionTable, key: &str) {
    table
        .insert(session_id(key), entry(Uuid::new_v4()))
        .await
        .unwrap();
}
