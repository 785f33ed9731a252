use super::*;

use std::{
    collections::HashMap,
    env,
    time::{SystemTime, UNIX_EPOCH},
};

fn temp_root(label: &str) -> PathBuf {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    env::temp_dir().join(format!("quotes_desktop_{label}_{suffix}"))
}

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        normalize_database_url("./data/test.db"),
        "sqlite://./data/test.db"
    );
}

#[test]
fn keeps_memory_and_explicit_urls() {
    assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
    assert_eq!(
        normalize_database_url("sqlite://./x.db?mode=rwc"),
        "sqlite://./x.db?mode=rwc"
    );
    assert_eq!(
        normalize_database_url("  "),
        Settings::default().database_url
    );
}

#[test]
fn keeps_windows_absolute_path_with_single_sqlite_colon() {
    assert_eq!(
        normalize_database_url("sqlite:C:\\Users\\alice\\quotes.db"),
        "sqlite:C:/Users/alice/quotes.db"
    );
}

#[test]
fn normalizes_windows_plain_path_with_single_sqlite_colon() {
    assert_eq!(
        normalize_database_url("C:\\Users\\alice\\quotes.db"),
        "sqlite:C:/Users/alice/quotes.db"
    );
}

#[test]
fn converts_sqlite_double_slash_windows_path() {
    assert_eq!(
        normalize_database_url("sqlite://C:/Users/alice/quotes.db"),
        "sqlite:C:/Users/alice/quotes.db"
    );
}

#[tokio::test]
async fn normalized_plain_path_opens_in_missing_directory() {
    let root = temp_root("open");
    let db_path = root.join("nested").join("quotes.db");

    let normalized = normalize_database_url(db_path.to_string_lossy().as_ref());
    assert!(normalized.starts_with("sqlite:"));
    let store = storage::SqliteKvStore::new(&normalized)
        .await
        .expect("open sqlite");
    drop(store);

    assert!(
        db_path.exists(),
        "database file should be created: {}",
        db_path.display()
    );

    fs::remove_dir_all(root).expect("cleanup");
}

#[test]
fn defaults_apply_without_file_or_env() {
    let settings = load_settings_from(Path::new("/nonexistent/quotes.toml"), |_| None);
    assert_eq!(settings, Settings::default());
    assert_eq!(settings.rotation_secs, 10);
    assert_eq!(settings.reactions_key, "quotes_reactions");
}

#[test]
fn file_then_env_override_defaults() {
    let root = temp_root("layers");
    fs::create_dir_all(&root).expect("root");
    let path = root.join("quotes.toml");
    fs::write(
        &path,
        "database_url = \"sqlite://./from-file.db\"\nrotation_secs = 30\nreactions_key = \"my_reactions\"\n",
    )
    .expect("write settings");

    let env_vars: HashMap<&str, &str> = [
        ("APP__ROTATION_SECS", "5"),
        ("APP__POLL_MILLIS", "not-a-number"),
        ("APP__QUOTES_PATH", "/srv/quotes.json"),
    ]
    .into_iter()
    .collect();
    let settings = load_settings_from(&path, |name| env_vars.get(name).map(|v| v.to_string()));

    assert_eq!(settings.database_url, "sqlite://./from-file.db");
    assert_eq!(settings.reactions_key, "my_reactions");
    assert_eq!(settings.rotation_secs, 5);
    assert_eq!(settings.poll_millis, 500);
    assert_eq!(settings.quotes_path, Some(PathBuf::from("/srv/quotes.json")));

    fs::remove_dir_all(root).expect("cleanup");
}

#[test]
fn malformed_settings_file_is_ignored() {
    let root = temp_root("malformed");
    fs::create_dir_all(&root).expect("root");
    let path = root.join("quotes.toml");
    fs::write(&path, "rotation_secs = \"soon\"").expect("write settings");

    let settings = load_settings_from(&path, |_| None);
    assert_eq!(settings, Settings::default());

    fs::remove_dir_all(root).expect("cleanup");
}
