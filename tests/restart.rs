use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

use conduit::{
    AdminServer, ConfigTemplate, GracefulShutdown, HaproxyConfig, Listener, RedbStore,
    ShutdownReason, SyncService,
};

fn haproxy_in(dir: &Path, reload: &str) -> HaproxyConfig {
    HaproxyConfig::new(
        dir.join("haproxy.cfg"),
        ConfigTemplate::default(),
        reload,
        Duration::from_secs(10),
    )
}

#[tokio::test]
async fn test_next_cycle_serves_after_forced_drain() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(RedbStore::open(dir.path().join("db")).unwrap());

    // First cycle: a reload that outlives the drain timeout
    let service = Arc::new(SyncService::with_shared_store(
        store.clone(),
        haproxy_in(dir.path(), "sleep 5"),
    ));
    let shutdown = Arc::new(GracefulShutdown::with_timeout(Duration::from_millis(200)));
    let server = AdminServer::new(0, service, shutdown.clone(), None);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let serving = tokio::spawn(server.serve(listener));

    let mut client = TcpStream::connect(addr).await.unwrap();
    client
        .write_all(b"GET /haproxy/reload HTTP/1.1\r\nhost: localhost\r\n\r\n")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    shutdown.trigger_shutdown(ShutdownReason::Restart);
    let reason = tokio::time::timeout(Duration::from_secs(3), serving)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(reason, ShutdownReason::Restart);

    // The abandoned request still holds the first cycle's state
    assert!(Arc::strong_count(&store) > 1);
    assert!(RedbStore::open(dir.path().join("db")).is_err());

    // Second cycle on the same handle
    let service = SyncService::with_shared_store(store.clone(), haproxy_in(dir.path(), "true"));
    let saved = service.save(Listener::new("web").bind("*:80")).await.unwrap();
    assert!(saved.created);
    assert_eq!(service.get_all::<Listener>().unwrap().len(), 1);

    drop(client);
}
