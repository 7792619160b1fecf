use std::path::Path;
use std::time::Duration;

use conduit::ports::EntityStore;
use conduit::{
    BackendPool, ConfigTemplate, ErrorKind, HaproxyConfig, Listener, Member, RedbStore,
    SyncService,
};

type Service = SyncService<RedbStore, HaproxyConfig>;

fn service_in(dir: &Path, reload: &str) -> Service {
    let store = RedbStore::open(dir.join("db")).unwrap();
    let haproxy = HaproxyConfig::new(
        dir.join("haproxy.cfg"),
        ConfigTemplate::default(),
        reload,
        Duration::from_secs(5),
    );
    SyncService::new(store, haproxy)
}

// Reload fails while the marker file exists
fn switchable_reload(dir: &Path) -> String {
    format!("test ! -e {}", dir.join("fail-reload").display())
}

#[tokio::test]
async fn test_listener_and_pool_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(dir.path(), "true");

    let saved = service
        .save(Listener::new("L1").bind("*:80").default_backend("P1"))
        .await
        .unwrap();
    assert!(saved.created);

    service
        .save(BackendPool::new("P1").member(Member::new("P1_node1", "10.0.0.1", 8080)))
        .await
        .unwrap();

    let text = service.read_config().await.unwrap();
    assert!(text.contains("  frontend L1\n    bind *:80\n    default_backend P1\n"));
    assert!(text.contains("  backend P1\n    server P1_node1 10.0.0.1:8080 check inter 2000\n"));
    assert_eq!(text.matches("    server ").count(), 1);

    // No referential check: the listener keeps pointing at the removed pool
    service.delete::<BackendPool>("P1").await.unwrap();

    let text = service.read_config().await.unwrap();
    assert!(!text.contains("  backend P1"));
    assert!(!text.contains("10.0.0.1"));
    assert!(text.contains("    default_backend P1\n"));
    assert!(service.get::<Listener>("L1").unwrap().is_some());
}

#[tokio::test]
async fn test_store_round_trip_is_value_equal() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(dir.path(), "true");

    let mut member = Member::new("api_1", "10.1.0.5", 9000);
    member.version = "2.4.1".to_string();
    member.last_known = Some(chrono::Utc::now());
    let mut pool = BackendPool::new("api")
        .version("2.4.1")
        .balance("leastconn")
        .mode("http")
        .member(member);
    pool.metadata.insert("team".to_string(), "payments".to_string());

    service.save(pool.clone()).await.unwrap();
    assert_eq!(service.get::<BackendPool>("api").unwrap(), Some(pool));
}

#[tokio::test]
async fn test_names_are_normalized() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(dir.path(), "true");

    let saved = service.save(Listener::new("a b").bind(":80")).await.unwrap();
    assert_eq!(saved.entity.name, "a_b");

    assert!(service.get::<Listener>("a_b").unwrap().is_some());
    assert!(service.get::<Listener>("a b").unwrap().is_none());
    assert!(service.read_config().await.unwrap().contains("frontend a_b\n"));
}

#[tokio::test]
async fn test_failed_reload_restores_previous_state() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(dir.path(), &switchable_reload(dir.path()));

    service
        .save(BackendPool::new("app").balance("roundrobin"))
        .await
        .unwrap();

    std::fs::write(dir.path().join("fail-reload"), "").unwrap();

    let err = service
        .save(BackendPool::new("app").balance("leastconn"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Sync);

    let stored = service.get::<BackendPool>("app").unwrap().unwrap();
    assert_eq!(stored.balance, "roundrobin");

    // The file is rebuilt from the reverted store
    let text = service.read_config().await.unwrap();
    assert!(text.contains("balance roundrobin"));
    assert!(!text.contains("leastconn"));

    // A rejected create leaves nothing behind
    let err = service.save(Listener::new("new")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Sync);
    assert!(service.get::<Listener>("new").unwrap().is_none());

    // A rejected delete puts the entity back
    let err = service.delete::<BackendPool>("app").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Sync);
    assert!(service.get::<BackendPool>("app").unwrap().is_some());

    std::fs::remove_file(dir.path().join("fail-reload")).unwrap();
    service.delete::<BackendPool>("app").await.unwrap();
    assert!(service.get_all::<BackendPool>().unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_missing_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(dir.path(), "true");

    let err = service.delete::<Listener>("ghost").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(!dir.path().join("haproxy.cfg").exists());
}

#[tokio::test]
async fn test_rendering_same_set_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(dir.path(), "true");

    service.save(Listener::new("web").bind("*:80")).await.unwrap();
    service
        .save(BackendPool::new("app").member(Member::new("n1", "10.0.0.1", 80)))
        .await
        .unwrap();
    let first = service.read_config().await.unwrap();

    service.reload_proxy().await.unwrap();
    service.save(Listener::new("web").bind("*:80")).await.unwrap();
    assert_eq!(service.read_config().await.unwrap(), first);
}

#[tokio::test]
async fn test_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(dir.path(), "true");
    service.save(Listener::new("web").bind("*:443")).await.unwrap();

    drop(service);

    let service = service_in(dir.path(), "true");
    let listeners = service.get_all::<Listener>().unwrap();
    assert_eq!(listeners, vec![Listener::new("web").bind("*:443")]);
}

#[tokio::test]
async fn test_import_existing_config() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("haproxy.cfg"),
        "global\n  maxconn 256\n\n  frontend www\n    bind *:80\n    default_backend app\n\n  backend app\n    balance roundrobin\n    server app_1 10.0.0.1:8080 check inter 2000\n    server app_2 10.0.0.2:8080 check inter 2000\n",
    )
    .unwrap();
    let service = service_in(dir.path(), "true");
    // Already stored names are kept as they are
    service.store().save(&Listener::new("www").bind("*:8080")).unwrap();

    let summary = service.import_config().await.unwrap();
    assert_eq!(summary.listeners, 0);
    assert_eq!(summary.pools, 1);
    assert_eq!(summary.skipped, 1);

    assert_eq!(service.get::<Listener>("www").unwrap().unwrap().bind, "*:8080");
    let pool = service.get::<BackendPool>("app").unwrap().unwrap();
    assert_eq!(pool.members.len(), 2);
    assert_eq!(service.members("app").unwrap()[1].host, "10.0.0.2");
}
