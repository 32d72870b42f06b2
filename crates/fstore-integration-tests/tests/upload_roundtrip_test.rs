//! End-to-end tests: a real server on an ephemeral port, driven by the real
//! client over HTTP.
//!
//! Each test gets its own storage root and its own server instance.

use std::path::{Path, PathBuf};

use fstore_client::{ClientConfig, ClientError, StoreClient};
use fstore_core::protocol::{FileHashPair, TryWithSha256Request, TryWithSha256Response};
use fstore_core::sha256_bytes;
use fstore_server::{AppState, ServerConfig};
use tempfile::TempDir;
use tokio::net::TcpListener;

struct Harness {
    root: TempDir,
    local: TempDir,
    base_url: String,
    client: StoreClient,
}

impl Harness {
    async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    async fn start_with(configure: impl FnOnce(&mut ServerConfig)) -> Self {
        let root = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::with_root(root.path());
        configure(&mut config);
        let store = config.prepare_storage_root().unwrap();
        let state = AppState::new(config, store);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = fstore_server::serve(listener, state).await;
        });

        let base_url = format!("http://{addr}");
        let client = StoreClient::new(ClientConfig::for_url(&base_url).unwrap()).unwrap();
        Self {
            root,
            local: tempfile::tempdir().unwrap(),
            base_url,
            client,
        }
    }

    fn seed(&self, name: &str, content: &str) {
        std::fs::write(self.root.path().join(name), content).unwrap();
    }

    fn local_file(&self, rel: &str, content: &str) -> PathBuf {
        let p = self.local.path().join(rel);
        if let Some(parent) = p.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&p, content).unwrap();
        p
    }

    fn stored(&self, name: &str) -> Option<String> {
        std::fs::read_to_string(self.root.path().join(name)).ok()
    }

    fn root_entries(&self) -> Vec<String> {
        entries(self.root.path())
    }

    async fn negotiate_raw(&self, pairs: Vec<FileHashPair>) -> TryWithSha256Response {
        reqwest::Client::new()
            .post(format!("{}/files?action=try_with_sha256", self.base_url))
            .json(&TryWithSha256Request {
                file_sha256_pairs: pairs,
            })
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }
}

fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn pair(name: &str, content: &[u8]) -> FileHashPair {
    FileHashPair {
        file_name: name.into(),
        file_hash: sha256_bytes(content).to_hex(),
    }
}

// ── negotiation scenarios ───────────────────────────────────────────

#[tokio::test]
async fn resident_content_is_copied_under_new_name() {
    let h = Harness::start().await;
    h.seed("a.txt", "hello");

    let resp = h.negotiate_raw(vec![pair("report.txt", b"hello")]).await;
    assert!(resp.unsuccessful_file_names.is_empty());
    assert_eq!(h.stored("report.txt").as_deref(), Some("hello"));
    assert_eq!(h.stored("a.txt").as_deref(), Some("hello"));
}

#[tokio::test]
async fn unknown_content_is_unresolved_on_empty_root() {
    let h = Harness::start().await;
    let offered = pair("new.txt", b"never seen");

    let resp = h.negotiate_raw(vec![offered.clone()]).await;
    assert_eq!(resp.unsuccessful_file_names, vec![offered]);
    assert!(h.root_entries().is_empty());
}

#[tokio::test]
async fn same_name_same_content_is_a_no_op() {
    let h = Harness::start().await;
    h.seed("a.txt", "hello");
    let before = std::fs::metadata(h.root.path().join("a.txt"))
        .unwrap()
        .modified()
        .unwrap();

    let resp = h.negotiate_raw(vec![pair("a.txt", b"hello")]).await;
    assert!(resp.unsuccessful_file_names.is_empty());
    assert_eq!(h.root_entries(), vec!["a.txt"]);
    let after = std::fs::metadata(h.root.path().join("a.txt"))
        .unwrap()
        .modified()
        .unwrap();
    assert_eq!(before, after);
}

// ── client upload flow ──────────────────────────────────────────────

#[tokio::test]
async fn upload_transfers_new_files_and_dedups_known_ones() {
    let h = Harness::start().await;
    h.seed("original.txt", "shared content");
    let copy = h.local_file("copy.txt", "shared content");
    let fresh = h.local_file("fresh.txt", "only local");

    let outcome = h
        .client
        .upload_files(&[copy.clone(), fresh.clone()])
        .await
        .unwrap();

    assert_eq!(outcome.negotiation.resolved, vec![copy]);
    assert_eq!(outcome.negotiation.pending, vec![fresh.clone()]);
    assert_eq!(outcome.transfer.unwrap().uploaded, vec![fresh]);
    assert_eq!(h.stored("copy.txt").as_deref(), Some("shared content"));
    assert_eq!(h.stored("fresh.txt").as_deref(), Some("only local"));
}

#[tokio::test]
async fn every_candidate_ends_up_stored() {
    let h = Harness::start().await;
    h.seed("x.txt", "one");
    let paths = vec![
        h.local_file("d1/a.txt", "one"),
        h.local_file("d2/b.txt", "two"),
        h.local_file("c.txt", "two"),
        h.local_file("x.txt", "one"),
    ];

    let outcome = h.client.upload_files(&paths).await.unwrap();
    let n = &outcome.negotiation;
    assert_eq!(n.resolved.len() + n.pending.len(), paths.len());
    assert!(outcome.failures().is_empty());

    assert_eq!(h.root_entries(), vec!["a.txt", "b.txt", "c.txt", "x.txt"]);
    assert_eq!(h.stored("a.txt").as_deref(), Some("one"));
    assert_eq!(h.stored("b.txt").as_deref(), Some("two"));
    assert_eq!(h.stored("c.txt").as_deref(), Some("two"));
}

#[tokio::test]
async fn update_replaces_existing_content() {
    let h = Harness::start().await;
    h.seed("notes.txt", "old");
    let local = h.local_file("notes.txt", "new and improved");

    h.client.upload_files(&[local]).await.unwrap();
    assert_eq!(h.stored("notes.txt").as_deref(), Some("new and improved"));
}

#[tokio::test]
async fn same_base_name_in_one_batch_does_not_reject_the_batch() {
    let h = Harness::start().await;
    let paths = vec![
        h.local_file("d1/a.txt", "first"),
        h.local_file("d2/a.txt", "second"),
        h.local_file("other.txt", "unrelated"),
    ];

    let outcome = h.client.upload_files(&paths).await.unwrap();
    assert!(outcome.failures().is_empty());
    assert_eq!(h.root_entries(), vec!["a.txt", "other.txt"]);
    assert_eq!(h.stored("a.txt").as_deref(), Some("second"));
    assert_eq!(h.stored("other.txt").as_deref(), Some("unrelated"));
}

#[tokio::test]
async fn unreachable_server_fails_upload_but_not_negotiation() {
    let local = tempfile::tempdir().unwrap();
    let path = local.path().join("a.txt");
    std::fs::write(&path, "a").unwrap();
    let client = StoreClient::new(ClientConfig::for_url("http://127.0.0.1:1").unwrap()).unwrap();

    let report = client.negotiate(&[path.clone()]).await;
    assert!(report.fell_back);
    assert_eq!(report.pending, vec![path.clone()]);

    let err = client.upload_files(&[path]).await.unwrap_err();
    assert!(matches!(err, ClientError::Http { .. }));
}

// ── catalog ─────────────────────────────────────────────────────────

#[tokio::test]
async fn list_delete_and_stats_round_trip() {
    let h = Harness::start().await;
    let paths = vec![
        h.local_file("b.txt", "the quick fox"),
        h.local_file("a.txt", "the lazy dog the end"),
    ];
    h.client.upload_files(&paths).await.unwrap();

    assert_eq!(h.client.list().await.unwrap(), vec!["a.txt", "b.txt"]);
    assert_eq!(h.client.word_count().await.unwrap(), 8);

    let words = h.client.frequent_words().await.unwrap();
    assert_eq!(words[0].word, "the");
    assert_eq!(words[0].count, 3);

    let failed = h
        .client
        .delete(&["a.txt".to_string(), "missing.txt".to_string()])
        .await
        .unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].file_name, "missing.txt");
    assert_eq!(h.client.list().await.unwrap(), vec!["b.txt"]);
}

#[tokio::test]
async fn empty_store_reports_zero_words() {
    let h = Harness::start().await;
    assert!(h.client.list().await.unwrap().is_empty());
    assert_eq!(h.client.word_count().await.unwrap(), 0);
    assert!(h.client.frequent_words().await.unwrap().is_empty());
}

#[tokio::test]
async fn uploads_leave_no_staging_files_behind() {
    let h = Harness::start_with(|c| c.metrics_enabled = false).await;
    let paths = vec![
        h.local_file("a.txt", "alpha"),
        h.local_file("b.txt", "beta"),
    ];
    h.client.upload_files(&paths).await.unwrap();

    assert_eq!(h.root_entries(), vec!["a.txt", "b.txt"]);
}
