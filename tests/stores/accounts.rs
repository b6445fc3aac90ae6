use cells_legacy::LegacyStores;
use cells_legacy::core::config::MigrateConfig;
use cells_legacy::core::db;
use cells_legacy::core::error::LegacyError;
use cells_legacy::core::migration::{ACCOUNTS_PLAN, WATCHES_PLAN};
use cells_legacy::core::model::{NodeDescriptor, WatchInfo, WatchKey};
use cells_legacy::core::password::LegacyCipher;
use cells_legacy::core::record_codec::{self, account_id};
use cells_legacy::core::token::{Token, encode_token};
use cells_legacy::stores::snapshot::LegacySnapshot;
use rusqlite::{Connection, params};
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::tempdir;

const SERVER: &str = "https://files.example.com";

fn test_config(root: &Path) -> MigrateConfig {
    MigrateConfig {
        kdf_iterations: 8,
        ..MigrateConfig::for_data_dir(root)
    }
}

/// Creates the accounts file the way the v2 client left it and returns a raw connection.
fn seed_accounts_db(config: &MigrateConfig) -> Connection {
    let path = config.accounts_db_path();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let conn = Connection::open(&path).unwrap();
    db::create_tables(&conn, ACCOUNTS_PLAN.tables).unwrap();
    db::set_user_version(&conn, ACCOUNTS_PLAN.version).unwrap();
    conn
}

fn insert_session(conn: &Connection, id: &str, content: &[u8]) {
    conn.execute(
        "INSERT INTO sessions (session_id, content) VALUES (?1, ?2)",
        params![id, content],
    )
    .unwrap();
}

fn insert_token(conn: &Connection, id: &str, jwt: &str) {
    conn.execute(
        "INSERT INTO tokens (session_id, jwt) VALUES (?1, ?2)",
        params![id, jwt],
    )
    .unwrap();
}

fn insert_password(conn: &Connection, user: &str, password: Option<&str>) {
    conn.execute(
        "INSERT INTO cookies (user, password) VALUES (?1, ?2)",
        params![user, password],
    )
    .unwrap();
}

fn account_json(username: &str, legacy: bool) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "accountID": account_id(username, SERVER),
        "username": username,
        "serverUrl": SERVER,
        "legacy": legacy,
        "serverLabel": "Example",
    }))
    .unwrap()
}

fn token_for(subject: &str) -> Token {
    Token {
        subject: subject.to_string(),
        value: format!("access-{}", subject),
        id_token: None,
        token_type: Some("bearer".to_string()),
        expires_in: Some(600),
        expiration_time: Some(1_700_000_600),
        refresh_token: Some("r".to_string()),
        scope: None,
    }
}

fn open_stores(config: MigrateConfig) -> LegacyStores {
    let stores = LegacyStores::new(config);
    stores.init().expect("init");
    stores
}

#[test]
fn malformed_account_row_is_skipped() {
    let tmp = tempdir().unwrap();
    let config = test_config(tmp.path());
    let conn = seed_accounts_db(&config);
    insert_session(&conn, "broken", b"{\"accountID\": \"half");
    insert_session(&conn, &account_id("admin", SERVER), &account_json("admin", false));
    drop(conn);

    let stores = open_stores(config);
    let accounts = stores.accounts().unwrap().list_accounts().unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].username, "admin");
}

#[test]
fn accounts_keep_store_order() {
    let tmp = tempdir().unwrap();
    let config = test_config(tmp.path());
    let conn = seed_accounts_db(&config);
    for user in ["zoe", "adam", "mia"] {
        insert_session(&conn, &account_id(user, SERVER), &account_json(user, false));
    }
    drop(conn);

    let stores = open_stores(config);
    let names: Vec<String> = stores
        .accounts()
        .unwrap()
        .list_accounts()
        .unwrap()
        .into_iter()
        .map(|r| r.username)
        .collect();
    assert_eq!(names, vec!["zoe", "adam", "mia"]);
}

#[test]
fn marked_and_current_conventions_decode_alike() {
    let id = account_id("admin", SERVER);
    let marked = serde_json::json!({
        "accountID": id,
        "username": "admin",
        "mUrl": SERVER,
        "mLabel": "Example",
        "mWelcomeMessage": "Welcome home",
        "mLegacy": false,
        "mSSLUnverified": true,
        "mHost": "files.example.com",
        "mScheme": "https",
        "mPort": 443,
        "mPath": "/",
        "mVersion": "4.0.0",
        "mVersionName": "Cells Home",
        "mIconURL": "https://files.example.com/icon.png",
    });
    let current = serde_json::json!({
        "accountID": id,
        "username": "admin",
        "serverUrl": SERVER,
        "serverLabel": "Example",
        "welcomeMessage": "Welcome home",
        "legacy": false,
        "skipVerify": true,
        "host": "files.example.com",
        "scheme": "https",
        "port": 443,
        "path": "/",
        "version": "4.0.0",
        "versionName": "Cells Home",
        "iconURL": "https://files.example.com/icon.png",
    });

    let tmp = tempdir().unwrap();
    let config = test_config(tmp.path());
    let conn = seed_accounts_db(&config);
    insert_session(&conn, &id, marked.to_string().as_bytes());
    insert_session(&conn, &id, current.to_string().as_bytes());
    drop(conn);

    let stores = open_stores(config);
    let records = stores.accounts().unwrap().list_accounts().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0], records[1]);
    assert!(records[0].skip_verify);
    assert_eq!(records[0].server.port, Some(443));
    assert_eq!(records[0].server.version_name.as_deref(), Some("Cells Home"));

    // the current encoding decodes back to the same record
    let encoded = record_codec::encode_account(&records[0]).unwrap();
    assert_eq!(record_codec::decode_account(&encoded).unwrap(), records[0]);
}

#[test]
fn account_content_stored_as_text_is_accepted() {
    let tmp = tempdir().unwrap();
    let config = test_config(tmp.path());
    let conn = seed_accounts_db(&config);
    let body = String::from_utf8(account_json("text", false)).unwrap();
    conn.execute(
        "INSERT INTO sessions (session_id, content) VALUES ('t', ?1)",
        [body],
    )
    .unwrap();
    drop(conn);

    let stores = open_stores(config);
    assert_eq!(stores.accounts().unwrap().list_accounts().unwrap().len(), 1);
}

#[test]
fn tokens_skip_bad_rows_and_last_write_wins() {
    let tmp = tempdir().unwrap();
    let config = test_config(tmp.path());
    let conn = seed_accounts_db(&config);
    let first = token_for("admin");
    let mut second = token_for("admin");
    second.value = "newer".to_string();
    insert_token(&conn, "acc-1", &encode_token(&first).unwrap());
    insert_token(&conn, "acc-2", "garbage");
    insert_token(&conn, "acc-1", &encode_token(&second).unwrap());
    drop(conn);

    let stores = open_stores(config);
    let accounts = stores.accounts().unwrap();
    let tokens = accounts.list_tokens().unwrap();
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens["acc-1"].value, "newer");

    assert_eq!(accounts.get_token("acc-1").unwrap().unwrap().value, "newer");
    assert_eq!(accounts.get_token("acc-2").unwrap(), None);
    assert_eq!(accounts.get_token("missing").unwrap(), None);
}

#[test]
fn token_lookup_falls_back_past_a_corrupt_newer_row() {
    let tmp = tempdir().unwrap();
    let config = test_config(tmp.path());
    let conn = seed_accounts_db(&config);
    let valid = token_for("admin");
    insert_token(&conn, "acc-1", &encode_token(&valid).unwrap());
    insert_token(&conn, "acc-1", "garbage");
    drop(conn);

    let stores = open_stores(config);
    let accounts = stores.accounts().unwrap();
    let listed = accounts.list_tokens().unwrap();
    assert_eq!(listed["acc-1"], valid);
    assert_eq!(accounts.get_token("acc-1").unwrap(), Some(valid));
}

#[test]
fn passwords_listed_raw_and_resolved_on_lookup() {
    let tmp = tempdir().unwrap();
    let config = test_config(tmp.path());
    let cipher = LegacyCipher::from_config(&config);
    let sealed = cipher.encrypt("p8-secret").unwrap();

    let conn = seed_accounts_db(&config);
    insert_password(&conn, "sealed", Some(&sealed));
    insert_password(&conn, "plain", Some("clear-text"));
    insert_password(&conn, "corrupt", Some("$AJXP_ENC$bm90IGEgcmVhbCBjaXBoZXJ0ZXh0IGF0IGFsbCE="));
    insert_password(&conn, "null", None);
    drop(conn);

    let stores = open_stores(config);
    let accounts = stores.accounts().unwrap();

    let raw = accounts.list_passwords().unwrap();
    assert_eq!(raw.len(), 3);
    assert_eq!(raw["sealed"], sealed);
    assert_eq!(raw["plain"], "clear-text");

    assert_eq!(accounts.get_password("sealed").unwrap().as_deref(), Some("p8-secret"));
    assert_eq!(accounts.get_password("plain").unwrap().as_deref(), Some("clear-text"));
    assert_eq!(accounts.get_password("corrupt").unwrap(), None);
    assert_eq!(accounts.get_password("null").unwrap(), None);
    assert_eq!(accounts.get_password("nobody").unwrap(), None);
}

#[test]
fn stores_require_init() {
    let tmp = tempdir().unwrap();
    let stores = LegacyStores::new(test_config(tmp.path()));
    assert!(matches!(
        stores.accounts(),
        Err(LegacyError::NotInitialized("accounts"))
    ));
    assert!(matches!(
        stores.watches(),
        Err(LegacyError::NotInitialized("watches"))
    ));
}

#[test]
fn second_init_is_a_noop() {
    let tmp = tempdir().unwrap();
    let stores = LegacyStores::new(test_config(tmp.path()));
    let first = stores.init_accounts().unwrap() as *const _;
    let second = stores.init_accounts().unwrap() as *const _;
    assert_eq!(first, second);
    assert!(std::ptr::eq(first, stores.accounts().unwrap()));
}

#[test]
fn concurrent_first_init_yields_one_instance() {
    let tmp = tempdir().unwrap();
    let stores = Arc::new(LegacyStores::new(test_config(tmp.path())));
    let barrier = Arc::new(Barrier::new(6));
    let handles: Vec<_> = (0..6)
        .map(|_| {
            let stores = Arc::clone(&stores);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                stores.init_watches().unwrap() as *const _ as usize
            })
        })
        .collect();
    let addrs: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(addrs.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn snapshot_pairs_credentials_and_offline_roots() {
    let tmp = tempdir().unwrap();
    let config = test_config(tmp.path());
    let cipher = LegacyCipher::from_config(&config);
    let cells_id = account_id("admin", SERVER);
    let p8_id = account_id("old", SERVER);
    let orphan_id = account_id("ghost", SERVER);

    let conn = seed_accounts_db(&config);
    insert_session(&conn, &cells_id, &account_json("admin", false));
    insert_session(&conn, &p8_id, &account_json("old", true));
    insert_session(&conn, &orphan_id, &account_json("ghost", false));
    insert_token(&conn, &cells_id, &encode_token(&token_for(&cells_id)).unwrap());
    insert_password(&conn, &p8_id, Some(&cipher.encrypt("pw").unwrap()));
    drop(conn);

    let stores = open_stores(config);
    let watches = stores.watches().unwrap();
    for path in ["/docs", "/photos"] {
        let info = WatchInfo::new(
            WatchKey::new(&cells_id, "common-files", path),
            "Common Files",
            NodeDescriptor::default(),
            1_700_000_000,
        );
        watches.add_watch(&info).unwrap();
    }

    let snapshot = LegacySnapshot::collect(&stores).unwrap();
    assert_eq!(snapshot.accounts.len(), 3);
    assert_eq!(snapshot.offline_roots, 2);
    assert_eq!(snapshot.without_credentials, 1);

    let cells = &snapshot.accounts[0];
    assert!(cells.token.is_some());
    assert_eq!(cells.watches.len(), 2);

    let p8 = &snapshot.accounts[1];
    assert_eq!(p8.password.as_deref(), Some("pw"));
    assert!(p8.watches.is_empty());

    let redacted = snapshot.redacted();
    assert_ne!(redacted.accounts[1].password.as_deref(), Some("pw"));
    assert_ne!(
        redacted.accounts[0].token.as_ref().unwrap().value,
        cells.token.as_ref().unwrap().value
    );
}

#[test]
fn snapshot_of_empty_store_is_empty() {
    let tmp = tempdir().unwrap();
    let stores = open_stores(test_config(tmp.path()));
    let snapshot = LegacySnapshot::collect(&stores).unwrap();
    assert!(snapshot.accounts.is_empty());
    assert_eq!(snapshot.offline_roots, 0);
}

#[test]
fn accounts_store_is_at_current_schema_after_open() {
    let tmp = tempdir().unwrap();
    let config = test_config(tmp.path());
    let stores = open_stores(config.clone());
    drop(stores);
    let conn = Connection::open(config.accounts_db_path()).unwrap();
    assert_eq!(db::user_version(&conn).unwrap(), ACCOUNTS_PLAN.version);
    assert!(db::table_exists(&conn, "cookies").unwrap());
    let conn = Connection::open(config.watches_db_path()).unwrap();
    assert_eq!(db::user_version(&conn).unwrap(), WATCHES_PLAN.version);
}
