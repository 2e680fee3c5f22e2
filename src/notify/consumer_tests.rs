//! Tests for consumer groups and the consumer handle protocol:
//! competing-consumer delivery, single-in-flight discipline, redelivery on
//! failure, and resource release on close

use crate::notify::api::{ChannelKind, NotificationManager, ServiceConfig};
use crate::notify::error::NotifyError;
use crate::notify::test_support::{register_stub, RecordingBackend};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const POLL: Duration = Duration::from_millis(200);
const SHORT: Duration = Duration::from_millis(30);

async fn running_memory_service() -> Arc<NotificationManager> {
    let manager = NotificationManager::initialize(ServiceConfig::embedded("memory")).unwrap();
    manager.start_service().await.unwrap();
    manager
}

async fn send_all(manager: &Arc<NotificationManager>, channel: ChannelKind, payloads: &[&str]) {
    let producer = manager.create_producer().unwrap();
    let batch: Vec<Vec<u8>> = payloads.iter().map(|p| p.as_bytes().to_vec()).collect();
    producer.send(channel, &batch).await.unwrap();
}

#[tokio::test]
async fn test_create_consumers_returns_exactly_count_handles() {
    let manager = running_memory_service().await;
    let handles = manager.create_consumers(ChannelKind::Hook, 3).await.unwrap();
    assert_eq!(handles.len(), 3);
    for handle in &handles {
        assert_eq!(handle.channel(), ChannelKind::Hook);
        assert_eq!(handle.group(), "metabus");
    }
}

#[tokio::test]
async fn test_zero_consumers_is_a_configuration_error() {
    let manager = running_memory_service().await;
    match manager.create_consumers(ChannelKind::Hook, 0).await {
        Err(NotifyError::Configuration { message }) => {
            assert!(message.contains("positive"));
        }
        Err(other) => panic!("expected Configuration error, got {:?}", other),
        Ok(_) => panic!("expected Configuration error, got consumer handles"),
    }
}

#[tokio::test]
async fn test_unprovisioned_channel_is_a_configuration_error() {
    register_stub("unprovisioned", RecordingBackend::unprovisioned());
    let manager =
        NotificationManager::initialize(ServiceConfig::external("unprovisioned")).unwrap();
    manager.start_service().await.unwrap();

    assert!(matches!(
        manager.create_consumers(ChannelKind::Entities, 1).await,
        Err(NotifyError::Configuration { .. })
    ));
}

#[tokio::test]
async fn test_double_poll_violates_the_protocol() {
    let manager = running_memory_service().await;
    send_all(&manager, ChannelKind::Hook, &["one", "two"]).await;

    let mut handles = manager.create_consumers(ChannelKind::Hook, 1).await.unwrap();
    let handle = &mut handles[0];

    assert!(handle.poll(POLL).await.unwrap().is_some());
    match handle.poll(POLL).await {
        Err(NotifyError::ProtocolViolation { message }) => {
            assert!(message.contains("outstanding"));
        }
        other => panic!("expected ProtocolViolation, got {:?}", other),
    }

    // After disposing the outstanding message, polling works again.
    handle.commit().await.unwrap();
    assert!(handle.poll(POLL).await.unwrap().is_some());
}

#[tokio::test]
async fn test_commit_and_fail_require_an_outstanding_delivery() {
    let manager = running_memory_service().await;
    let mut handles = manager.create_consumers(ChannelKind::Types, 1).await.unwrap();

    assert!(matches!(
        handles[0].commit().await,
        Err(NotifyError::ProtocolViolation { .. })
    ));
    assert!(matches!(
        handles[0].fail("nothing to fail").await,
        Err(NotifyError::ProtocolViolation { .. })
    ));
}

#[tokio::test]
async fn test_competing_consumers_split_the_stream_without_duplicates() {
    let manager = running_memory_service().await;
    send_all(&manager, ChannelKind::Entities, &["a", "b", "c", "d", "e", "f"]).await;

    let mut handles = manager
        .create_consumers(ChannelKind::Entities, 2)
        .await
        .unwrap();

    let mut seen: Vec<String> = Vec::new();
    loop {
        let mut delivered = false;
        for handle in handles.iter_mut() {
            if let Some(message) = handle.poll(SHORT).await.unwrap() {
                seen.push(String::from_utf8(message.into_payload()).unwrap());
                handle.commit().await.unwrap();
                delivered = true;
            }
        }
        if !delivered {
            break;
        }
    }

    // Every message delivered to exactly one member of the group.
    assert_eq!(seen.len(), 6);
    let unique: HashSet<&String> = seen.iter().collect();
    assert_eq!(unique.len(), 6);
}

#[tokio::test]
async fn test_order_is_preserved_within_a_single_handle() {
    let manager = running_memory_service().await;
    send_all(&manager, ChannelKind::Hook, &["1", "2", "3", "4", "5"]).await;

    let mut handles = manager.create_consumers(ChannelKind::Hook, 1).await.unwrap();
    let mut last_sequence = 0;
    for expected in ["1", "2", "3", "4", "5"] {
        let message = handles[0].poll(POLL).await.unwrap().unwrap();
        assert_eq!(message.payload(), expected.as_bytes());
        assert!(message.sequence() > last_sequence);
        last_sequence = message.sequence();
        handles[0].commit().await.unwrap();
    }
}

#[tokio::test]
async fn test_failed_message_is_redelivered_to_the_group() {
    let manager = running_memory_service().await;
    send_all(&manager, ChannelKind::Hook, &["poison"]).await;

    let mut handles = manager.create_consumers(ChannelKind::Hook, 2).await.unwrap();

    let message = handles[0].poll(POLL).await.unwrap().unwrap();
    assert_eq!(message.payload(), b"poison");
    handles[0].fail("graph mutation rejected").await.unwrap();

    // Eligible again for this or a sibling handle.
    let redelivered = handles[1].poll(POLL).await.unwrap().unwrap();
    assert_eq!(redelivered.payload(), b"poison");
    handles[1].commit().await.unwrap();

    assert!(handles[0].poll(SHORT).await.unwrap().is_none());
}

#[tokio::test]
async fn test_closing_with_an_outstanding_delivery_releases_it() {
    let manager = running_memory_service().await;
    send_all(&manager, ChannelKind::Entities, &["orphan"]).await;

    let mut handles = manager
        .create_consumers(ChannelKind::Entities, 2)
        .await
        .unwrap();

    assert!(handles[0].poll(POLL).await.unwrap().is_some());
    handles[0].close();
    assert!(handles[0].is_closed());

    // The abandoned message does not stay stuck behind a lease.
    let rescued = handles[1].poll(POLL).await.unwrap().unwrap();
    assert_eq!(rescued.payload(), b"orphan");
    handles[1].commit().await.unwrap();
}

#[tokio::test]
async fn test_dropping_a_handle_releases_its_delivery() {
    let manager = running_memory_service().await;
    send_all(&manager, ChannelKind::Types, &["abandoned"]).await;

    let mut handles = manager.create_consumers(ChannelKind::Types, 2).await.unwrap();
    let mut doomed = handles.remove(0);
    assert!(doomed.poll(POLL).await.unwrap().is_some());
    drop(doomed);

    let rescued = handles[0].poll(POLL).await.unwrap().unwrap();
    assert_eq!(rescued.payload(), b"abandoned");
    handles[0].commit().await.unwrap();
}

#[tokio::test]
async fn test_operations_on_a_closed_handle_are_rejected() {
    let manager = running_memory_service().await;
    let mut handles = manager.create_consumers(ChannelKind::Hook, 1).await.unwrap();

    handles[0].close();
    assert!(matches!(
        handles[0].poll(SHORT).await,
        Err(NotifyError::ProtocolViolation { .. })
    ));
    // Close stays idempotent.
    handles[0].close();
}

#[tokio::test]
async fn test_channels_never_cross_deliver() {
    let manager = running_memory_service().await;
    send_all(&manager, ChannelKind::Hook, &["hook-only"]).await;

    let mut entities = manager
        .create_consumers(ChannelKind::Entities, 1)
        .await
        .unwrap();
    let mut types = manager.create_consumers(ChannelKind::Types, 1).await.unwrap();

    assert!(entities[0].poll(SHORT).await.unwrap().is_none());
    assert!(types[0].poll(SHORT).await.unwrap().is_none());

    let mut hook = manager.create_consumers(ChannelKind::Hook, 1).await.unwrap();
    let message = hook[0].poll(POLL).await.unwrap().unwrap();
    assert_eq!(message.payload(), b"hook-only");
    hook[0].commit().await.unwrap();
}

#[tokio::test]
async fn test_messages_sent_before_group_creation_are_delivered() {
    let manager = running_memory_service().await;
    send_all(&manager, ChannelKind::Hook, &["early"]).await;

    // The group did not exist when the message was sent.
    let mut handles = manager.create_consumers(ChannelKind::Hook, 1).await.unwrap();
    let message = handles[0].poll(POLL).await.unwrap().unwrap();
    assert_eq!(message.payload(), b"early");
    handles[0].commit().await.unwrap();
}
