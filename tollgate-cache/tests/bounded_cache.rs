use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use tollgate_cache::{BoundedCache, CacheError, CacheSettings};
use tollgate_core::{ConfigError, TollgateConfig};

#[test]
fn test_cache_hit() {
    let cache = BoundedCache::with_capacity(8).unwrap();
    cache.save("key", "value");
    assert_eq!(cache.get(&"key"), Some("value"));
    assert!(cache.exists(&"key"));
}

#[test]
fn test_cache_miss() {
    let cache: BoundedCache<&str, &str> = BoundedCache::with_capacity(8).unwrap();
    assert_eq!(cache.get(&"missing"), None);
    assert!(!cache.exists(&"missing"));
}

#[test]
fn test_overwrite_returns_last_value() {
    let cache = BoundedCache::with_capacity(2).unwrap();
    cache.save("key", 1);
    cache.save("key", 2);
    cache.save("key", 3);
    assert_eq!(cache.get(&"key"), Some(3));
    assert_eq!(cache.size(), 1);
}

#[test]
fn test_zero_capacity_is_rejected() {
    let result: Result<BoundedCache<u32, u32>, _> = BoundedCache::with_capacity(0);
    assert!(matches!(result, Err(CacheError::Misconfigured(_))));

    let zero_ttl = CacheSettings::new(4).with_expire_after_access(Duration::ZERO);
    assert!(BoundedCache::<u32, u32>::new(zero_ttl).is_err());
}

#[test]
fn test_evicts_least_recently_inserted_without_reads() {
    let cache = BoundedCache::with_capacity(3).unwrap();
    cache.save(1, "a");
    cache.save(2, "b");
    cache.save(3, "c");
    cache.save(4, "d");

    assert_eq!(cache.size(), 3);
    assert!(!cache.exists(&1));
    assert!(cache.exists(&2));
    assert!(cache.exists(&3));
    assert!(cache.exists(&4));
}

#[test]
fn test_read_protects_entry_from_eviction() {
    let cache = BoundedCache::with_capacity(3).unwrap();
    cache.save(1, "a");
    cache.save(2, "b");
    cache.save(3, "c");
    assert_eq!(cache.get(&1), Some("a"));
    cache.save(4, "d");

    assert!(cache.exists(&1));
    assert!(!cache.exists(&2));
}

#[test]
fn test_large_cache_evicts_in_access_order() {
    let cache = BoundedCache::with_capacity(10_000).unwrap();
    for i in 0..10_000u32 {
        cache.save(i, i);
    }
    // Reading the even keys leaves the odd ones oldest.
    for i in (0..10_000u32).step_by(2) {
        assert_eq!(cache.get(&i), Some(i));
    }
    for i in 10_000..15_000u32 {
        cache.save(i, i);
    }

    assert_eq!(cache.size(), 10_000);
    assert!((1..10_000u32).step_by(2).all(|i| !cache.exists(&i)));
    assert!((0..10_000u32).step_by(2).all(|i| cache.exists(&i)));

    // The evens are next in line, in the order they were read.
    cache.save(15_000, 0);
    assert!(!cache.exists(&0));
    assert!(cache.exists(&2));
}

#[test]
fn test_removed_entries_do_not_block_eviction() {
    let cache = BoundedCache::with_capacity(3).unwrap();
    cache.save(1, "a");
    cache.save(2, "b");
    cache.save(3, "c");
    assert_eq!(cache.remove(&1), Some("a"));
    cache.save(4, "d");
    assert_eq!(cache.size(), 3);
    assert!(cache.exists(&2));

    cache.save(5, "e");
    assert_eq!(cache.size(), 3);
    assert!(!cache.exists(&2));

    cache.clear();
    for key in 6..10 {
        cache.save(key, "f");
    }
    assert_eq!(cache.size(), 3);
    assert!(!cache.exists(&6));
    assert!(cache.exists(&9));
}

#[test]
fn test_overwrite_at_capacity_does_not_evict() {
    let cache = BoundedCache::with_capacity(2).unwrap();
    cache.save(1, "a");
    cache.save(2, "b");
    cache.save(1, "a2");
    assert_eq!(cache.size(), 2);
    assert_eq!(cache.get(&2), Some("b"));
}

#[test]
fn test_idle_entry_expires() {
    let settings = CacheSettings::new(8).with_expire_after_access(Duration::from_millis(50));
    let cache = BoundedCache::new(settings).unwrap();
    cache.save("key", "value");
    assert_eq!(cache.get(&"key"), Some("value"));
    sleep(Duration::from_millis(70));
    assert!(!cache.exists(&"key"));
    assert_eq!(cache.get(&"key"), None);
    assert_eq!(cache.size(), 0);
}

#[test]
fn test_access_resets_idle_timer() {
    let settings = CacheSettings::new(8).with_expire_after_access(Duration::from_millis(120));
    let cache = BoundedCache::new(settings).unwrap();
    cache.save("key", "value");
    for _ in 0..4 {
        sleep(Duration::from_millis(50));
        assert_eq!(cache.get(&"key"), Some("value"));
    }
}

#[test]
fn test_evict_expired_sweeps_eagerly() {
    let settings = CacheSettings::new(8).with_expire_after_access(Duration::from_millis(30));
    let cache = BoundedCache::new(settings).unwrap();
    cache.save(1, "a");
    cache.save(2, "b");
    sleep(Duration::from_millis(50));
    cache.save(3, "c");
    assert_eq!(cache.evict_expired(), 2);
    assert_eq!(cache.size(), 1);
}

#[test]
fn test_remove_and_clear() {
    let cache = BoundedCache::with_capacity(4).unwrap();
    cache.save("a", 1);
    cache.save("b", 2);
    assert_eq!(cache.remove(&"a"), Some(1));
    assert_eq!(cache.remove(&"a"), None);
    cache.clear();
    assert_eq!(cache.size(), 0);
}

#[test]
fn test_value_scan_and_reverse_lookup() {
    let cache = BoundedCache::with_capacity(4).unwrap();
    cache.save("token-a".to_string(), 10u64);
    cache.save("token-b".to_string(), 20u64);

    assert!(cache.exists_value(&20));
    assert!(!cache.exists_value(&30));
    assert_eq!(cache.find_key(|v| *v == 10), Some("token-a".to_string()));
    assert_eq!(cache.find_key(|v| *v > 100), None);

    cache.save("token-c".to_string(), 10u64);
    let mut keys = cache.find_keys(|v| *v == 10);
    keys.sort();
    assert_eq!(keys, vec!["token-a".to_string(), "token-c".to_string()]);
}

#[test]
fn test_concurrent_inserts_respect_bound() {
    let cache = BoundedCache::with_capacity(64).unwrap();
    let threads: Vec<_> = (0..8)
        .map(|t| {
            let cache = cache.clone();
            std::thread::spawn(move || {
                for i in 0..500u32 {
                    cache.save(t * 1_000 + i, i);
                    let _ = cache.get(&(t * 1_000 + i / 2));
                }
            })
        })
        .collect();
    for handle in threads {
        handle.join().unwrap();
    }
    assert!(cache.size() <= 64);
}

#[test]
fn test_settings_from_config() {
    let yaml = r#"
tollgate:
  cache:
    url_matcher:
      max_size: 256
      expire_after_access_secs: 600
    users:
      max_size: 0
"#;
    let config = TollgateConfig::from_yaml_str(yaml, "test").unwrap();
    let settings = CacheSettings::from_config(&config, "url_matcher").unwrap();
    assert_eq!(settings.max_size, 256);
    assert_eq!(settings.expire_after_access, Some(Duration::from_secs(600)));

    assert!(matches!(
        CacheSettings::from_config(&config, "users"),
        Err(ConfigError::Invalid { .. })
    ));
    assert!(matches!(
        CacheSettings::from_config(&config, "missing"),
        Err(ConfigError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_background_sweeper() {
    let settings = CacheSettings::new(8).with_expire_after_access(Duration::from_millis(20));
    let cache: BoundedCache<u32, Arc<str>> = BoundedCache::new(settings).unwrap();
    cache.save(1, Arc::from("a"));
    let sweeper = cache.spawn_sweeper(Duration::from_millis(10));

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(cache.size(), 0);

    drop(cache);
    tokio::time::timeout(Duration::from_secs(1), sweeper)
        .await
        .expect("sweeper should stop once the cache is dropped")
        .unwrap();
}
