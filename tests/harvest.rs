use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use mockito::Matcher;
use receiptor::{
    analyzer::Analyzer,
    config::{OpenAiConfig, PortalConfig},
    fetcher::Fetcher,
    lister::Lister,
    llm::{OpenAiExtractor, ReceiptExtractor},
    pacing::NoDelay,
    portal::PortalClient,
    store::Store,
};

macro_rules! aw {
    ($e:expr) => {
        tokio_test::block_on($e)
    };
}

fn portal_config(base_url: &str) -> PortalConfig {
    PortalConfig {
        cookie: "session=test".into(),
        base_url: base_url.into(),
        country: "BG".into(),
        language: "bg-BG".into(),
    }
}

fn no_signal() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(false))
}

fn listing_matcher(page: &str) -> Matcher {
    Matcher::AllOf(vec![
        Matcher::UrlEncoded("country".into(), "BG".into()),
        Matcher::UrlEncoded("page".into(), page.into()),
    ])
}

#[test]
fn lister_logs_ids_in_discovery_order() {
    aw!(async {
        let mut server = mockito::Server::new_async().await;
        let page1 = server
            .mock("GET", "/tickets")
            .match_query(listing_matcher("1"))
            .with_header("content-type", "application/json")
            .with_body(r#"{"items":[{"id":"a"},{"id":"b"}],"totalCount":3}"#)
            .create_async()
            .await;
        let page2 = server
            .mock("GET", "/tickets")
            .match_query(listing_matcher("2"))
            .with_header("content-type", "application/json")
            .with_body(r#"{"items":[{"id":"c"}],"totalCount":3}"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        let portal = PortalClient::new(&portal_config(&server.url()));

        Lister::new(&portal, &store, &NoDelay, no_signal())
            .run()
            .await
            .unwrap();

        page1.assert_async().await;
        page2.assert_async().await;
        assert_eq!(store.read_ids().unwrap(), vec!["a", "b", "c"]);
    });
}

#[test]
fn lister_halts_on_failed_page_without_logging_it() {
    aw!(async {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/tickets")
            .match_query(listing_matcher("1"))
            .with_header("content-type", "application/json")
            .with_body(r#"{"items":[{"id":"a"},{"id":"b"}],"totalCount":4}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/tickets")
            .match_query(listing_matcher("2"))
            .with_status(500)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        let portal = PortalClient::new(&portal_config(&server.url()));

        let res = Lister::new(&portal, &store, &NoDelay, no_signal()).run().await;

        assert!(res.is_err());
        assert_eq!(store.read_ids().unwrap(), vec!["a", "b"]);
    });
}

#[test]
fn empty_listing_makes_exactly_one_request() {
    aw!(async {
        let mut server = mockito::Server::new_async().await;
        let page1 = server
            .mock("GET", "/tickets")
            .match_query(listing_matcher("1"))
            .with_header("content-type", "application/json")
            .with_body(r#"{"items":[],"totalCount":0}"#)
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        let portal = PortalClient::new(&portal_config(&server.url()));

        Lister::new(&portal, &store, &NoDelay, no_signal())
            .run()
            .await
            .unwrap();

        page1.assert_async().await;
        assert!(store.read_ids().unwrap_or_default().is_empty());
    });
}

#[test]
fn fetcher_writes_missing_and_skips_existing() {
    aw!(async {
        let mut server = mockito::Server::new_async().await;
        let detail = server
            .mock("GET", "/tickets/b")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("country".into(), "BG".into()),
                Matcher::UrlEncoded("languageCode".into(), "bg-BG".into()),
            ]))
            .with_header("content-type", "application/json")
            .with_body(r#"{"ticket":{"htmlPrintedReceipt":"<html>b</html>"}}"#)
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        store.append_id("a").unwrap();
        store.append_id("b").unwrap();
        store.write_raw("a", "cached").unwrap();

        let portal = PortalClient::new(&portal_config(&server.url()));
        Fetcher::new(&portal, &store, &NoDelay, no_signal())
            .run()
            .await
            .unwrap();

        detail.assert_async().await;
        assert_eq!(store.read_raw("a").unwrap(), "cached");
        assert_eq!(store.read_raw("b").unwrap(), "<html>b</html>");
    });
}

#[test]
fn fetcher_with_complete_outputs_makes_no_requests() {
    aw!(async {
        let mut server = mockito::Server::new_async().await;
        let any = server
            .mock("GET", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        for id in ["a", "b"] {
            store.append_id(id).unwrap();
            store.write_raw(id, "<html></html>").unwrap();
        }

        let portal = PortalClient::new(&portal_config(&server.url()));
        Fetcher::new(&portal, &store, &NoDelay, no_signal())
            .run()
            .await
            .unwrap();

        any.assert_async().await;
    });
}

#[test]
fn fetcher_halts_on_first_error() {
    aw!(async {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/tickets/x")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;
        let after = server
            .mock("GET", "/tickets/y")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        store.append_id("x").unwrap();
        store.append_id("y").unwrap();

        let portal = PortalClient::new(&portal_config(&server.url()));
        let res = Fetcher::new(&portal, &store, &NoDelay, no_signal()).run().await;

        assert!(res.is_err());
        assert!(!store.has_raw("x"));
        after.assert_async().await;
    });
}

#[derive(Clone, Default)]
struct ProbeExtractor {
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    fail_marker: Option<String>,
}

#[async_trait]
impl ReceiptExtractor for ProbeExtractor {
    async fn extract(&self, fragment: &str) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(marker) = &self.fail_marker {
            if fragment.contains(marker.as_str()) {
                anyhow::bail!("probe failure");
            }
        }
        Ok(r#"{"items":[]}"#.to_string())
    }
}

fn seed_receipts(store: &Store, ids: &[&str]) {
    for id in ids {
        store.append_id(id).unwrap();
        store
            .write_raw(
                id,
                &format!(
                    r#"<html><body><div class="article">receipt {}</div></body></html>"#,
                    id
                ),
            )
            .unwrap();
    }
}

#[test]
fn analyzer_caps_concurrent_tasks() {
    aw!(async {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        let ids: Vec<String> = (0..10).map(|i| format!("r{}", i)).collect();
        let id_refs: Vec<&str> = ids.iter().map(|s| s.as_str()).collect();
        seed_receipts(&store, &id_refs);

        let probe = ProbeExtractor::default();
        Analyzer::new(store.clone(), probe.clone(), 3, no_signal())
            .run()
            .await
            .unwrap();

        assert_eq!(probe.calls.load(Ordering::SeqCst), 10);
        assert!(probe.max_in_flight.load(Ordering::SeqCst) <= 3);
        for id in &ids {
            assert!(store.has_analysis(id));
        }
    });
}

#[test]
fn analyzer_zero_concurrency_runs_sequentially() {
    aw!(async {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        seed_receipts(&store, &["r0", "r1", "r2", "r3"]);

        let probe = ProbeExtractor::default();
        Analyzer::new(store.clone(), probe.clone(), 0, no_signal())
            .run()
            .await
            .unwrap();

        assert_eq!(probe.calls.load(Ordering::SeqCst), 4);
        assert_eq!(probe.max_in_flight.load(Ordering::SeqCst), 1);
    });
}

#[test]
fn analyzer_failure_does_not_stop_siblings() {
    aw!(async {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        seed_receipts(&store, &["good1", "bad", "good2"]);

        let probe = ProbeExtractor {
            fail_marker: Some("receipt bad".into()),
            ..ProbeExtractor::default()
        };
        Analyzer::new(store.clone(), probe.clone(), 3, no_signal())
            .run()
            .await
            .unwrap();

        assert!(store.has_analysis("good1"));
        assert!(store.has_analysis("good2"));
        assert!(!store.has_analysis("bad"));
        assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
    });
}

#[test]
fn analyzer_skips_already_analyzed_receipts() {
    aw!(async {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        seed_receipts(&store, &["a", "b"]);
        store.write_analysis("a", "{}").unwrap();
        store.write_analysis("b", "{}").unwrap();

        let probe = ProbeExtractor::default();
        Analyzer::new(store.clone(), probe.clone(), 3, no_signal())
            .run()
            .await
            .unwrap();

        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    });
}

#[test]
fn openai_extractor_posts_and_collects_output_text() {
    aw!(async {
        let mut server = mockito::Server::new_async().await;
        let inference = server
            .mock("POST", "/v1/responses")
            .match_header("authorization", "Bearer test-key")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "model": "test-model",
                "reasoning": { "effort": "low" },
            })))
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"output":[{"type":"message","content":[{"type":"output_text","text":"{\"total\":\"3.98\"}"}]}]}"#,
            )
            .create_async()
            .await;

        let config = OpenAiConfig {
            api_key: "test-key".into(),
            model: "test-model".into(),
            base_url: server.url(),
        };
        let extractor = OpenAiExtractor::new(&config);
        let out = extractor.extract("<div>receipt</div>").await.unwrap();

        inference.assert_async().await;
        assert_eq!(out, r#"{"total":"3.98"}"#);
    });
}
