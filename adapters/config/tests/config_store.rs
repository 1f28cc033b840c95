use std::fs;

use mob_limiter_config::{ConfigError, ConfigStore};
use mob_limiter_core::{EntityKind, Feature, PolicyConfig};

#[test]
fn opening_a_missing_file_writes_defaults() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("nested").join("config.toml");

    let (store, warnings) = ConfigStore::open(&path).expect("store opens");

    assert!(warnings.is_empty());
    assert!(path.exists());
    assert_eq!(store.snapshot(), &PolicyConfig::default());
    assert_eq!(store.path(), path.as_path());
}

#[test]
fn reload_picks_up_edits_and_reports_warnings() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("config.toml");
    let (mut store, _) = ConfigStore::open(&path).expect("store opens");

    fs::write(
        &path,
        r#"
        global-hostile-limit = 12
        spawn-delay-chance = 4.0

        [mob-limits]
        PHANTOM = 2
        "#,
    )
    .expect("config written");
    let warnings = store.reload().expect("reload succeeds");

    assert_eq!(store.snapshot().global_ceiling, 12);
    assert_eq!(
        store.snapshot().throttle_chance,
        PolicyConfig::DEFAULT_THROTTLE_CHANCE
    );
    assert_eq!(store.snapshot().category_ceiling(EntityKind::Phantom), Some(2));
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].key, "spawn-delay-chance");
}

#[test]
fn failed_reload_keeps_previous_snapshot() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("config.toml");
    fs::write(&path, "global-hostile-limit = 33\n").expect("config written");
    let (mut store, _) = ConfigStore::open(&path).expect("store opens");

    fs::write(&path, "global-hostile-limit = [").expect("config written");
    let error = store.reload().expect_err("malformed toml is rejected");

    assert!(matches!(error, ConfigError::Parse(_)));
    assert_eq!(store.snapshot().global_ceiling, 33);
}

#[test]
fn toggle_persists_every_flag_and_keeps_other_keys() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
        global-hostile-limit = 40

        [mob-limits]
        ZOMBIE = 9
        "#,
    )
    .expect("config written");
    let (mut store, _) = ConfigStore::open(&path).expect("store opens");

    store
        .toggle(Feature::ProximityThrottle, false)
        .expect("toggle persists");

    assert!(!store.snapshot().proximity_throttle_enabled);
    let on_disk = fs::read_to_string(&path).expect("config readable");
    let table: toml::Table = on_disk.parse().expect("valid toml");
    assert_eq!(table["low-health-delay-enabled"].as_bool(), Some(false));
    assert_eq!(table["global-limit-enabled"].as_bool(), Some(true));
    assert_eq!(table["logging-enabled"].as_bool(), Some(true));
    assert_eq!(table["global-hostile-limit"].as_integer(), Some(40));

    let (reopened, _) = ConfigStore::open(&path).expect("store reopens");
    assert_eq!(reopened.snapshot(), store.snapshot());
    assert_eq!(reopened.snapshot().category_ceiling(EntityKind::Zombie), Some(9));
}

#[test]
fn disabling_mob_limits_drops_ceilings_until_reenabled() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("config.toml");
    fs::write(&path, "[mob-limits]\nSLIME = 3\n").expect("config written");
    let (mut store, _) = ConfigStore::open(&path).expect("store opens");

    store
        .toggle(Feature::CategoryLimits, false)
        .expect("toggle persists");
    let _ = store.reload().expect("reload succeeds");
    assert!(store.snapshot().category_ceilings.is_empty());

    store
        .toggle(Feature::CategoryLimits, true)
        .expect("toggle persists");
    let _ = store.reload().expect("reload succeeds");
    assert_eq!(store.snapshot().category_ceiling(EntityKind::Slime), Some(3));
}
