use super::load::{default_config_path, resolve_config_path};
use super::schema::*;
use std::sync::{Mutex, OnceLock};

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap()
}

struct EnvGuard {
    key: &'static str,
    old: Option<std::ffi::OsString>,
}

impl EnvGuard {
    fn set(key: &'static str, val: &str) -> Self {
        let old = std::env::var_os(key);
        unsafe {
            std::env::set_var(key, val);
        }
        Self { key, old }
    }

    fn remove(key: &'static str) -> Self {
        let old = std::env::var_os(key);
        unsafe {
            std::env::remove_var(key);
        }
        Self { key, old }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match self.old.take() {
            Some(v) => unsafe {
                std::env::set_var(self.key, v);
            },
            None => unsafe {
                std::env::remove_var(self.key);
            },
        }
    }
}

#[test]
fn resolve_config_path_prefers_staccato_config_path() {
    let _lock = env_lock();
    let _g1 = EnvGuard::set("STACCATO_CONFIG_PATH", "/tmp/staccato-test-config.toml");
    assert_eq!(
        resolve_config_path().unwrap(),
        std::path::PathBuf::from("/tmp/staccato-test-config.toml")
    );
}

#[test]
fn default_config_path_prefers_xdg_config_home() {
    let _lock = env_lock();
    let _g1 = EnvGuard::set("XDG_CONFIG_HOME", "/tmp/xdg-config-home");
    let _g2 = EnvGuard::set("HOME", "/tmp/home-should-not-win");

    let p = default_config_path().unwrap();
    assert_eq!(
        p,
        std::path::PathBuf::from("/tmp/xdg-config-home")
            .join("staccato")
            .join("config.toml")
    );
}

#[test]
fn defaults_match_the_fixed_slicing_scheme() {
    let s = Settings::default();
    assert_eq!(s.slicer.slice_secs, 30.0);
    assert_eq!(s.slicer.fade_secs(), 15.0);
    assert_eq!(s.slicer.min_spacing_secs(), 45.0);
    assert_eq!(s.slicer.bitrate_kbps, 192);
    assert_eq!(s.sequence.music_lead_secs, 15.0);
    assert_eq!(s.sequence.min_blocks_per_channel, 3);
    assert_eq!(s.library.catalog_file, "blocks_list.toml");
    assert!(s.validate().is_ok());
}

#[test]
fn settings_load_from_config_file() {
    let _lock = env_lock();

    let dir = tempfile::tempdir().unwrap();
    let cfg_path = dir.path().join("config.toml");
    std::fs::write(
        &cfg_path,
        r#"
[slicer]
slice_secs = 20.0
spacing_factor = 2.0
bitrate_kbps = 128

[sequence]
music_lead_secs = 10.0
min_blocks_per_channel = 2

[library]
extensions = ["mp3"]
catalog_file = "catalog.toml"
"#,
    )
    .unwrap();

    let _g1 = EnvGuard::set("STACCATO_CONFIG_PATH", cfg_path.to_str().unwrap());
    let _g2 = EnvGuard::remove("STACCATO__SLICER__SLICE_SECS");

    let s = Settings::load().unwrap();
    assert_eq!(s.slicer.slice_secs, 20.0);
    assert_eq!(s.slicer.fade_secs(), 10.0);
    assert_eq!(s.slicer.min_spacing_secs(), 40.0);
    assert_eq!(s.slicer.bitrate_kbps, 128);
    assert_eq!(s.sequence.music_lead_secs, 10.0);
    assert_eq!(s.sequence.min_blocks_per_channel, 2);
    assert_eq!(s.library.extensions, vec!["mp3".to_string()]);
    assert_eq!(s.library.catalog_file, "catalog.toml");
}

#[test]
fn settings_env_overrides_config_file() {
    let _lock = env_lock();

    let dir = tempfile::tempdir().unwrap();
    let cfg_path = dir.path().join("config.toml");
    std::fs::write(
        &cfg_path,
        r#"
[slicer]
bitrate_kbps = 192
"#,
    )
    .unwrap();

    let _g1 = EnvGuard::set("STACCATO_CONFIG_PATH", cfg_path.to_str().unwrap());
    let _g2 = EnvGuard::set("STACCATO__SLICER__BITRATE_KBPS", "96");

    let s = Settings::load().unwrap();
    assert_eq!(s.slicer.bitrate_kbps, 96);
}

#[test]
fn validate_rejects_nonsense_values() {
    let mut s = Settings::default();
    s.slicer.slice_secs = 0.0;
    assert!(s.validate().is_err());

    let mut s = Settings::default();
    s.slicer.spacing_factor = 0.5;
    assert!(s.validate().is_err());

    let mut s = Settings::default();
    s.sequence.min_blocks_per_channel = 0;
    assert!(s.validate().is_err());
}
