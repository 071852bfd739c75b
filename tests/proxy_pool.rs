use std::collections::HashSet;
use std::fs;

use listing_monitor::ProxyPool;

#[test]
fn loads_and_normalizes_mixed_source_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("proxies.txt");
    fs::write(
        &path,
        "1.2.3.4:8080:user:pass\n\
         2001:db8::1:8080:user:pass\n\
         http://u:p@gate.example:7777\n\
         not-a-proxy\n\
         \n",
    )
    .unwrap();

    let pool = ProxyPool::load(&path);
    assert_eq!(pool.len(), 3);

    let hosts: HashSet<&str> = pool.endpoints().iter().map(|endpoint| endpoint.host()).collect();
    assert!(hosts.contains("1.2.3.4"));
    assert!(hosts.contains("[2001:db8::1]"));
    assert!(hosts.contains("gate.example"));
}

#[test]
fn missing_source_file_gives_empty_pool() {
    let dir = tempfile::tempdir().unwrap();
    let pool = ProxyPool::load(dir.path().join("proxies.txt"));
    assert!(pool.is_empty());
    assert!(pool.acquire().is_none());
}

#[test]
fn reload_only_happens_when_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("proxies.txt");

    let mut pool = ProxyPool::load(&path);
    assert!(!pool.reload_if_empty(&path));

    fs::write(&path, "1.2.3.4:8080:user:pass\n").unwrap();
    assert!(pool.reload_if_empty(&path));
    assert_eq!(pool.len(), 1);

    fs::write(&path, "1.2.3.4:8080:user:pass\n5.6.7.8:8080:user:pass\n").unwrap();
    assert!(pool.reload_if_empty(&path));
    assert_eq!(pool.len(), 1);
}

#[test]
fn selection_eventually_covers_every_endpoint() {
    let pool = ProxyPool::parse("1.1.1.1:1:a:b\n2.2.2.2:2:a:b\n3.3.3.3:3:a:b\n");
    let mut seen = HashSet::new();
    for _ in 0..500 {
        seen.insert(pool.acquire().unwrap().as_str().to_string());
    }
    assert_eq!(seen.len(), 3);
}
