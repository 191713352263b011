//! Integration tests for the host lifecycle

use coral_config::{ConfigBuilder, HostConfig};
use coral_core::Error;
use coral_plugins::PluginDescriptor;
use coral_runtime::{Host, HostPhase};
use coral_store::{
    CollectionSpec, ConnectionState, IndexSpec, MemoryConnection, MemoryStore, StoreConnection,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

type SharedLog = Arc<Mutex<Vec<String>>>;

fn unbound_config() -> HostConfig {
    ConfigBuilder::new()
        .unbound()
        .handle_signals(false)
        .build()
        .unwrap()
}

fn memory_host(config: HostConfig) -> Host {
    Host::new(config, Arc::new(MemoryStore::new())).unwrap()
}

fn logging_startup_plugin(name: &'static str, delay_ms: u64, log: &SharedLog) -> PluginDescriptor {
    let log = Arc::clone(log);
    PluginDescriptor::builder(name)
        .startup(format!("{name}Startup"), move |_ctx| {
            let log = Arc::clone(&log);
            async move {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                log.lock().unwrap().push(name.to_string());
                Ok(())
            }
        })
        .build()
}

#[tokio::test]
async fn startup_hooks_run_in_registration_order() {
    let log: SharedLog = Arc::default();
    let host = memory_host(unbound_config());

    // The earliest-registered hook is the slowest; order must not change.
    host.register_plugin(logging_startup_plugin("alpha", 30, &log))
        .unwrap();
    host.register_plugin(logging_startup_plugin("beta", 10, &log))
        .unwrap();
    host.register_plugin(logging_startup_plugin("gamma", 0, &log))
        .unwrap();

    host.start().await.unwrap();
    assert_eq!(host.phase(), HostPhase::Started);
    assert_eq!(*log.lock().unwrap(), vec!["alpha", "beta", "gamma"]);

    host.stop().await.unwrap();
    assert_eq!(host.phase(), HostPhase::Stopped);
}

#[tokio::test]
async fn failing_startup_hook_aborts_remaining_hooks() {
    let log: SharedLog = Arc::default();
    let host = memory_host(unbound_config());

    host.register_plugin(logging_startup_plugin("alpha", 0, &log))
        .unwrap();
    host.register_plugin(
        PluginDescriptor::builder("beta")
            .startup("betaStartup", |_ctx| async {
                anyhow::bail!("beta cannot start")
            })
            .build(),
    )
    .unwrap();
    host.register_plugin(logging_startup_plugin("gamma", 0, &log))
        .unwrap();

    let err = host.start().await.unwrap_err();
    assert!(matches!(err, Error::Hook { .. }));
    assert!(err.to_string().contains("beta"));
    assert_eq!(*log.lock().unwrap(), vec!["alpha"]);
}

#[tokio::test]
async fn failing_shutdown_hook_does_not_prevent_disconnect() {
    let log: SharedLog = Arc::default();
    let host = memory_host(unbound_config());

    host.register_plugin(
        PluginDescriptor::builder("fragile")
            .shutdown("fragileShutdown", |_ctx| async {
                anyhow::bail!("shutdown always fails")
            })
            .build(),
    )
    .unwrap();
    {
        let log = Arc::clone(&log);
        host.register_plugin(
            PluginDescriptor::builder("sturdy")
                .shutdown("sturdyShutdown", move |_ctx| {
                    let log = Arc::clone(&log);
                    async move {
                        log.lock().unwrap().push("sturdy".to_string());
                        Ok(())
                    }
                })
                .build(),
        )
        .unwrap();
    }

    host.start().await.unwrap();
    host.stop().await.unwrap();

    // The failing hook neither stopped the later hook nor the disconnect.
    assert_eq!(*log.lock().unwrap(), vec!["sturdy"]);
    assert_eq!(host.connection_state(), ConnectionState::Disconnected);
    assert!(host.events().is_stopped());
}

#[tokio::test]
async fn migration_gate_blocks_old_marker() {
    let conn = Arc::new(MemoryConnection::new());
    conn.insert_one("Migrations", json!({ "_id": "control", "version": 50 }))
        .await
        .unwrap();

    let log: SharedLog = Arc::default();
    let host = Host::new(unbound_config(), Arc::new(MemoryStore::with_connection(conn))).unwrap();
    host.register_plugin(logging_startup_plugin("alpha", 0, &log))
        .unwrap();
    host.register_plugin(
        PluginDescriptor::builder("shops")
            .collection("Shops", CollectionSpec::new("Shops"))
            .build(),
    )
    .unwrap();

    let err = host.start().await.unwrap_err();
    assert!(matches!(err, Error::MigrationGate(_)));

    // The gate fired before hooks ran or the context was assembled.
    assert!(log.lock().unwrap().is_empty());
    assert!(host.context().is_none());
}

#[tokio::test]
async fn migration_gate_passes_recent_marker() {
    let conn = Arc::new(MemoryConnection::new());
    conn.insert_one("Migrations", json!({ "_id": "control", "version": 80 }))
        .await
        .unwrap();

    let host = Host::new(unbound_config(), Arc::new(MemoryStore::with_connection(conn))).unwrap();
    host.start().await.unwrap();
    assert_eq!(host.phase(), HostPhase::Started);
    host.stop().await.unwrap();
}

#[tokio::test]
async fn collections_are_available_to_startup_hooks() {
    let host = memory_host(unbound_config());

    host.register_plugin(
        PluginDescriptor::builder("shops")
            .collection(
                "Shops",
                CollectionSpec::new("Shops").index(IndexSpec::ascending("slug").unique()),
            )
            .startup("seedPrimaryShop", |ctx| async move {
                let shops = ctx
                    .collection("Shops")
                    .ok_or_else(|| anyhow::anyhow!("Shops collection missing"))?;
                shops
                    .insert_one(json!({ "_id": "primary", "slug": "main" }))
                    .await?;
                Ok(())
            })
            .build(),
    )
    .unwrap();

    host.start().await.unwrap();

    let ctx = host.context().unwrap();
    let shops = ctx.collection("Shops").unwrap();
    let doc = shops
        .find_one(&json!({ "slug": "main" }))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc["_id"], "primary");
    assert_eq!(shops.list_indexes().await.unwrap().len(), 1);

    host.stop().await.unwrap();
}

#[tokio::test]
async fn plugin_handlers_see_every_descriptor() {
    let seen: SharedLog = Arc::default();
    let host = memory_host(unbound_config());

    host.register_plugin(PluginDescriptor::builder("alpha").build())
        .unwrap();
    {
        let seen = Arc::clone(&seen);
        host.register_plugin(
            PluginDescriptor::builder("inspector")
                .plugin_handler("collectNames", move |descriptor| {
                    seen.lock().unwrap().push(descriptor.name.clone());
                })
                .build(),
        )
        .unwrap();
    }

    host.start().await.unwrap();
    assert_eq!(*seen.lock().unwrap(), vec!["alpha", "inspector"]);
    host.stop().await.unwrap();
}

#[tokio::test]
async fn register_after_start_fails() {
    let host = memory_host(unbound_config());
    host.register_plugin(PluginDescriptor::builder("alpha").build())
        .unwrap();
    host.start().await.unwrap();

    let err = host
        .register_plugin(PluginDescriptor::builder("late").build())
        .unwrap_err();
    assert!(matches!(err, Error::Registration(_)));

    host.stop().await.unwrap();
}

#[tokio::test]
async fn unbound_host_never_listens() {
    let host = memory_host(unbound_config());
    host.start().await.unwrap();
    assert_eq!(host.phase(), HostPhase::Started);
    assert!(host.server_addr().is_none());
    host.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn listen_retries_until_the_port_frees() {
    let blocker = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
    let port = blocker.local_addr().unwrap().port();

    let config = ConfigBuilder::new()
        .port(port)
        .listen_retry_delay(Duration::from_millis(50))
        .handle_signals(false)
        .build()
        .unwrap();
    let host = memory_host(config);

    let release = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(130)).await;
        drop(blocker);
    });

    // start() keeps retrying and eventually binds, exactly once.
    host.start().await.unwrap();
    assert_eq!(host.server_addr().unwrap().port(), port);

    release.await.unwrap();
    host.stop().await.unwrap();
    assert!(host.server_addr().is_none());
}

#[tokio::test]
async fn stop_twice_is_a_noop() {
    let config = ConfigBuilder::new()
        .port(0)
        .handle_signals(false)
        .build()
        .unwrap();
    let host = memory_host(config);

    host.start().await.unwrap();
    assert!(host.server_addr().is_some());

    host.stop().await.unwrap();
    assert!(host.server_addr().is_none());
    host.stop().await.unwrap();
    assert_eq!(host.phase(), HostPhase::Stopped);
}

async fn http_request(addr: SocketAddr, method: &str, path: &str, body: &str) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "{method} {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\n\
         Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn api_dispatches_queries_through_the_context() {
    let config = ConfigBuilder::new()
        .port(0)
        .handle_signals(false)
        .build()
        .unwrap();
    let host = memory_host(config);

    host.register_plugin(
        PluginDescriptor::builder("ping")
            .query("ping", |_ctx, _args| async { Ok(json!("pong")) })
            .build(),
    )
    .unwrap();

    host.start().await.unwrap();
    let addr = host.server_addr().unwrap();
    let addr = SocketAddr::from(([127, 0, 0, 1], addr.port()));

    let ok = http_request(
        addr,
        "POST",
        "/api",
        r#"{"operation":"query","name":"ping","args":{}}"#,
    )
    .await;
    assert!(ok.contains("200 OK"), "{ok}");
    assert!(ok.contains(r#""data":"pong""#), "{ok}");

    let missing = http_request(
        addr,
        "POST",
        "/api",
        r#"{"operation":"query","name":"nope"}"#,
    )
    .await;
    assert!(missing.contains("404"), "{missing}");

    host.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn plugin_middleware_wraps_requests_in_order() {
    use async_trait::async_trait;
    use coral_core::{Body, Middleware, Next};
    use http::{Request, Response};

    #[derive(Debug)]
    struct HealthCheck;

    #[async_trait]
    impl Middleware for HealthCheck {
        async fn call(
            &self,
            req: Request<Body>,
            next: Next,
        ) -> coral_core::Result<Response<Body>> {
            if req.uri().path() == "/healthz" {
                return Ok(Response::new(Body::from("ok")));
            }
            next.run(req).await
        }
    }

    let config = ConfigBuilder::new()
        .port(0)
        .handle_signals(false)
        .build()
        .unwrap();
    let host = memory_host(config);

    host.register_plugin(
        PluginDescriptor::builder("health")
            .middleware("healthCheck", Arc::new(HealthCheck))
            .build(),
    )
    .unwrap();

    host.start().await.unwrap();
    let addr = host.server_addr().unwrap();
    let addr = SocketAddr::from(([127, 0, 0, 1], addr.port()));

    let health = http_request(addr, "GET", "/healthz", "").await;
    assert!(health.contains("200 OK"), "{health}");
    assert!(health.ends_with("ok"), "{health}");

    let other = http_request(addr, "GET", "/nothing-here", "").await;
    assert!(other.contains("404"), "{other}");

    host.stop().await.unwrap();
}
