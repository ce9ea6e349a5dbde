//! Cross-crate integration tests: client, broker and dispatcher together.

pub mod admission;
pub mod resilience;
pub mod roundtrip;

#[cfg(test)]
pub(crate) mod harness {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use fl_bus::InMemoryBroker;
    use fl_rpc::{
        AnalyzePipeline, EngineRpcClient, HandlerRegistry, Payload, RegistryBuilder, RpcSettings,
        WorkerRuntime,
    };

    /// A started client/worker pair over one in-memory broker.
    pub struct Rig {
        pub bus: Arc<InMemoryBroker>,
        pub client: EngineRpcClient,
        pub worker: WorkerRuntime,
    }

    impl Rig {
        pub async fn shutdown(self) {
            self.client.stop().await;
            self.worker.stop().await;
        }
    }

    pub fn settings() -> RpcSettings {
        RpcSettings {
            rpc_timeout: Duration::from_secs(2),
            ..RpcSettings::default()
        }
    }

    /// Registry with the handlers the test scenarios rely on.
    pub fn math_registry() -> HandlerRegistry {
        RegistryBuilder::new()
            .register("domain", |payload: Payload| async move {
                let expr = payload
                    .get("expr")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                let mut report = Payload::new();
                let raw = if expr == "1/x" { "Reals \\ {0}" } else { "Reals" };
                report.insert("raw".into(), json!(raw));
                Ok(report)
            })
            .register("echo", |payload: Payload| async move { Ok(payload) })
            .register("boom", |_payload: Payload| async move {
                anyhow::bail!("input is not a valid expression")
            })
            .register("slow", |payload: Payload| async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(payload)
            })
            .build()
    }

    /// Start a worker with [`math_registry`] and a client, both on a fresh
    /// broker.
    pub async fn start_rig(settings: RpcSettings) -> Rig {
        let bus = Arc::new(InMemoryBroker::new());
        let worker = WorkerRuntime::start(
            Arc::clone(&bus),
            Arc::new(math_registry()),
            AnalyzePipeline::default(),
            settings.clone(),
        )
        .expect("worker should start");

        let client = EngineRpcClient::new(Arc::clone(&bus), settings);
        client.start().await;

        Rig {
            bus,
            client,
            worker,
        }
    }
}
