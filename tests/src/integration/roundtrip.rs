//! # End-to-End Call Flows
//!
//! Full request/response cycles over the in-memory broker: a client calls,
//! the worker dispatches, and the response lands back on the right pending
//! entry.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rand::Rng;
    use serde_json::json;

    use fl_rpc::{
        AnalyzePipeline, EngineRpcClient, Payload, RegistryBuilder, RpcError, WorkerRuntime,
        ANALYZE_AND_PRESENT,
    };
    use fl_runtime::{run_worker, RunOptions, PING_ACTION};

    use crate::integration::harness::{math_registry, settings, start_rig};

    #[tokio::test]
    async fn test_domain_call_returns_handler_result() {
        let rig = start_rig(settings()).await;

        let mut payload = Payload::new();
        payload.insert("expr".into(), json!("1/x"));
        let data = rig.client.call("domain", payload).await.unwrap();

        assert_eq!(data["raw"], json!("Reals \\ {0}"));
        rig.shutdown().await;
    }

    #[tokio::test]
    async fn test_unsupported_action_surfaces_as_call_error() {
        let rig = start_rig(settings()).await;

        let err = rig.client.call("foo", Payload::new()).await.unwrap_err();
        match err {
            RpcError::Call(message) => assert_eq!(message, "unsupported action 'foo'"),
            other => panic!("expected Call error, got {other:?}"),
        }

        rig.shutdown().await;
    }

    #[tokio::test]
    async fn test_handler_failure_funnels_into_call_error() {
        let rig = start_rig(settings()).await;

        let err = rig.client.call("boom", Payload::new()).await.unwrap_err();
        match err {
            RpcError::Call(message) => {
                assert_eq!(message, "input is not a valid expression");
            }
            other => panic!("expected Call error, got {other:?}"),
        }

        // The worker loop survives the failure.
        let data = rig.client.call("echo", Payload::new()).await.unwrap();
        assert!(data.is_empty());

        rig.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_calls_resolve_to_their_own_callers() {
        let rig = start_rig(settings()).await;
        let client = Arc::new(rig.client);

        let mut rng = rand::thread_rng();
        let mut tasks = Vec::new();
        for call_no in 0..64u64 {
            let marker: u64 = rng.gen();
            let client = Arc::clone(&client);
            tasks.push(tokio::spawn(async move {
                let mut payload = Payload::new();
                payload.insert("call_no".into(), json!(call_no));
                payload.insert("marker".into(), json!(marker));
                let data = client.call("echo", payload).await.unwrap();
                (call_no, marker, data)
            }));
        }

        for task in tasks {
            let (call_no, marker, data) = task.await.unwrap();
            assert_eq!(data["call_no"], json!(call_no));
            assert_eq!(data["marker"], json!(marker));
        }

        assert_eq!(client.in_flight(), 0);
        client.stop().await;
        rig.worker.stop().await;
    }

    #[tokio::test]
    async fn test_meta_action_dispatches_inner_handler() {
        let rig = start_rig(settings()).await;

        let mut payload = Payload::new();
        payload.insert("raw".into(), json!("1/x"));
        payload.insert("action".into(), json!("domain"));
        let data = rig
            .client
            .call(ANALYZE_AND_PRESENT, payload)
            .await
            .unwrap();

        assert_eq!(data["action"], json!("domain"));
        assert_eq!(data["present"], json!("Domain: Reals \\ {0}"));
        rig.shutdown().await;
    }

    #[tokio::test]
    async fn test_runtime_worker_answers_ping_and_math() {
        let bus = Arc::new(fl_bus::InMemoryBroker::new());
        let handlers = RegistryBuilder::new().register("echo", |payload: Payload| async move {
            Ok(payload)
        });
        let options = RunOptions {
            required_actions: vec!["echo".to_string()],
        };
        let runtime = run_worker(Arc::clone(&bus), handlers, settings(), options).unwrap();

        let client = EngineRpcClient::new(Arc::clone(&bus), settings());
        client.start().await;

        let pong = client.call(PING_ACTION, Payload::new()).await.unwrap();
        assert_eq!(pong["pong"], json!(true));

        let mut payload = Payload::new();
        payload.insert("k".into(), json!("v"));
        let data = client.call("echo", payload).await.unwrap();
        assert_eq!(data["k"], json!("v"));

        client.stop().await;
        runtime.stop().await;
    }

    #[tokio::test]
    async fn test_two_workers_in_one_group_split_the_load() {
        let bus = Arc::new(fl_bus::InMemoryBroker::new());
        let registry = Arc::new(math_registry());
        let worker_a = WorkerRuntime::start(
            Arc::clone(&bus),
            Arc::clone(&registry),
            AnalyzePipeline::default(),
            settings(),
        )
        .unwrap();
        let worker_b = WorkerRuntime::start(
            Arc::clone(&bus),
            Arc::clone(&registry),
            AnalyzePipeline::default(),
            settings(),
        )
        .unwrap();

        let client = EngineRpcClient::new(Arc::clone(&bus), settings());
        client.start().await;

        // Each request is handled by exactly one group member, so every call
        // resolves exactly once regardless of which worker consumed it.
        for call_no in 0..16u64 {
            let mut payload = Payload::new();
            payload.insert("call_no".into(), json!(call_no));
            let data = client.call("echo", payload).await.unwrap();
            assert_eq!(data["call_no"], json!(call_no));
        }

        client.stop().await;
        worker_a.stop().await;
        worker_b.stop().await;
    }
}
