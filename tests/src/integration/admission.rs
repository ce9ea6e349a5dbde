//! # Admission Control and Deadlines
//!
//! The client bounds its own in-flight calls and enforces per-call
//! deadlines; the pending table must stay clean through rejections,
//! timeouts and late responses.

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use fl_bus::ChannelPublisher;
    use fl_rpc::{Payload, RpcError, RpcSettings};

    use crate::integration::harness::{settings, start_rig};

    fn small_ceiling() -> RpcSettings {
        // Handlers run sequentially per worker, so the second slow call waits
        // out the first before its own second of work; the deadline must
        // cover both.
        RpcSettings {
            max_in_flight: 2,
            rpc_timeout: Duration::from_secs(10),
            ..settings()
        }
    }

    async fn wait_for_in_flight(client: &fl_rpc::EngineRpcClient, want: usize) {
        for _ in 0..100 {
            if client.in_flight() == want {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("in_flight never reached {want}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_ceiling_rejects_excess_calls_before_publish() {
        let rig = start_rig(small_ceiling()).await;
        let client = Arc::new(rig.client);

        // Fill both slots with calls the worker answers slowly.
        let mut slow_calls = Vec::new();
        for _ in 0..2 {
            let client = Arc::clone(&client);
            slow_calls.push(tokio::spawn(async move {
                client.call("slow", Payload::new()).await
            }));
        }
        wait_for_in_flight(&client, 2).await;

        // Third call is rejected locally; nothing reaches the wire.
        let published_before = rig.bus.messages_published();
        let err = client.call("echo", Payload::new()).await.unwrap_err();
        assert!(matches!(err, RpcError::Overloaded { pending: 2, limit: 2 }));
        assert_eq!(rig.bus.messages_published(), published_before);

        // The slot-holders still resolve normally.
        for call in slow_calls {
            assert!(call.await.unwrap().is_ok());
        }
        assert_eq!(client.in_flight(), 0);

        // Capacity is available again.
        assert!(client.call("echo", Payload::new()).await.is_ok());

        client.stop().await;
        rig.worker.stop().await;
    }

    #[tokio::test]
    async fn test_timeout_purges_pending_and_late_response_is_orphaned() {
        let rig = start_rig(settings()).await;

        // The slow handler takes 1s; give up after 50ms.
        let err = rig
            .client
            .call_with_timeout("slow", Payload::new(), Duration::from_millis(50))
            .await
            .unwrap_err();
        match err {
            RpcError::Timeout { action, .. } => assert_eq!(action, "slow"),
            other => panic!("expected Timeout, got {other:?}"),
        }
        assert_eq!(rig.client.in_flight(), 0);

        // Let the worker's late response arrive; it has no pending entry to
        // resolve and must be dropped without disturbing anything.
        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert_eq!(rig.client.in_flight(), 0);

        let data = rig
            .client
            .call("domain", {
                let mut p = Payload::new();
                p.insert("expr".into(), json!("1/x"));
                p
            })
            .await
            .unwrap();
        assert_eq!(data["raw"], json!("Reals \\ {0}"));

        rig.shutdown().await;
    }

    #[tokio::test]
    async fn test_stats_track_completion_and_cancellation() {
        let rig = start_rig(settings()).await;

        rig.client.call("echo", Payload::new()).await.unwrap();
        let _ = rig
            .client
            .call_with_timeout("slow", Payload::new(), Duration::from_millis(20))
            .await;

        let stats = rig.client.pending().stats();
        assert_eq!(stats.registered.load(Ordering::Relaxed), 2);
        assert_eq!(stats.completed.load(Ordering::Relaxed), 1);
        assert_eq!(stats.cancelled.load(Ordering::Relaxed), 1);

        rig.shutdown().await;
    }
}
