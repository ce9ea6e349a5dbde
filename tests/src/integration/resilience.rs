//! # Hostile-Traffic Resilience
//!
//! Both consume loops must survive whatever lands on their topics:
//! malformed bytes, responses with no pending caller, duplicates, and
//! requests with a missing reply channel.

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use serde_json::json;

    use fl_bus::ChannelPublisher;
    use fl_rpc::{
        encode_response, CorrelationId, Payload, RequestEnvelope, ResponseEnvelope, RpcError,
    };

    use crate::integration::harness::{settings, start_rig};

    #[tokio::test]
    async fn test_listener_survives_garbage_on_response_topic() {
        let rig = start_rig(settings()).await;

        rig.bus
            .publish("fl.response", Bytes::from_static(b"\x00\x01 not json"))
            .await
            .unwrap();
        rig.bus
            .publish("fl.response", Bytes::from_static(b"{\"ok\":"))
            .await
            .unwrap();

        // The listener logged and moved on; a real call still resolves.
        let data = rig.client.call("echo", Payload::new()).await.unwrap();
        assert!(data.is_empty());

        rig.shutdown().await;
    }

    #[tokio::test]
    async fn test_orphan_response_is_dropped() {
        let rig = start_rig(settings()).await;

        // A response nobody asked for.
        let orphan = ResponseEnvelope::success(CorrelationId::new(), Payload::new());
        rig.bus
            .publish("fl.response", encode_response(&orphan).unwrap())
            .await
            .unwrap();

        let data = rig.client.call("echo", Payload::new()).await.unwrap();
        assert!(data.is_empty());
        assert_eq!(rig.client.in_flight(), 0);

        rig.shutdown().await;
    }

    #[tokio::test]
    async fn test_duplicate_response_keeps_first_result() {
        let rig = start_rig(settings()).await;

        // Hand-register a pending entry and feed the live listener two
        // responses for the same id.
        let id = CorrelationId::new();
        let rx = rig
            .client
            .pending()
            .register(id, "domain", std::time::Duration::from_secs(5));

        let mut first = Payload::new();
        first.insert("n".into(), json!(1));
        rig.bus
            .publish(
                "fl.response",
                encode_response(&ResponseEnvelope::success(id, first)).unwrap(),
            )
            .await
            .unwrap();
        rig.bus
            .publish(
                "fl.response",
                encode_response(&ResponseEnvelope::failure(id, "dup")).unwrap(),
            )
            .await
            .unwrap();

        let response = rx.await.unwrap();
        assert!(response.ok);
        assert_eq!(response.data.unwrap()["n"], json!(1));
        assert_eq!(rig.client.in_flight(), 0);

        rig.shutdown().await;
    }

    #[tokio::test]
    async fn test_dispatcher_survives_garbage_on_request_topic() {
        let rig = start_rig(settings()).await;

        rig.bus
            .publish("fl.request", Bytes::from_static(b"\xff\xfe"))
            .await
            .unwrap();
        rig.bus
            .publish("fl.request", Bytes::from_static(b"[1,2,3]"))
            .await
            .unwrap();

        let data = rig.client.call("echo", Payload::new()).await.unwrap();
        assert!(data.is_empty());

        rig.shutdown().await;
    }

    #[tokio::test]
    async fn test_request_with_blank_reply_to_cannot_be_built() {
        let err = RequestEnvelope::build("domain", Payload::new(), "", None).unwrap_err();
        assert!(err.to_string().contains("reply_to"));
    }

    #[tokio::test]
    async fn test_worker_error_text_never_includes_internals() {
        let rig = start_rig(settings()).await;

        let err = rig.client.call("boom", Payload::new()).await.unwrap_err();
        let RpcError::Call(message) = err else {
            panic!("expected Call error");
        };

        // Only the handler's own message crosses the wire.
        assert_eq!(message, "input is not a valid expression");
        assert!(!message.contains("backtrace"));
        assert!(!message.contains("src/"));

        rig.shutdown().await;
    }
}
