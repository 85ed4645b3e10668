//! End-to-end behaviour against a scripted upstream serving recorded pages.

use std::sync::Arc;

use futures::StreamExt;
use jdb_catalog::error::ErrorKind;
use jdb_catalog::{Catalog, CatalogConfig, ListingSource, MemorySink};
use jdb_session::{Cancel, MockResponse, MockTransport, RetryPolicy, SessionConfig, SessionManager};
use jdb_taxonomy::{TagCategory, TaxonomyIndex};
use rstest::{fixture, rstest};

const DETAIL: &str = include_str!("../../extract/fixtures/detail_YwG8Ve.html");
const ACTOR_P1: &str = include_str!("../../extract/fixtures/actor_0R1n3_p1.html");
const ACTOR_P2: &str = include_str!("../../extract/fixtures/actor_0R1n3_p2.html");
const EMPTY: &str = include_str!("../../extract/fixtures/listing_empty.html");
const DRIFT: &str = include_str!("../../extract/fixtures/listing_drift.html");
const SEARCH_CODE: &str = include_str!("../../extract/fixtures/search_MIDA-583.html");
const SEARCH_ACTOR: &str = include_str!("../../extract/fixtures/search_actor.html");
const SNAPSHOT: &str = include_str!("../../taxonomy/fixtures/snapshot.json");

const MAINTENANCE: &str = "<html><body><p>maintenance</p></body></html>";

fn quick_retries() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay_ms: 100,
        factor: 2.0,
        max_delay_ms: 1_000,
        rate_limit_multiplier: 3.0,
    }
}

fn catalog_with(transport: MockTransport, config: CatalogConfig) -> Catalog<MockTransport> {
    let session = SessionManager::new(
        transport,
        SessionConfig {
            retry: quick_retries(),
            ..SessionConfig::default()
        },
    )
    .unwrap();
    let taxonomy = TaxonomyIndex::load(SNAPSHOT).unwrap();
    let config = CatalogConfig {
        parse_retry: quick_retries().with_max_attempts(2),
        ..config
    };
    Catalog::new(Arc::new(session), Arc::new(taxonomy), config)
}

fn catalog(transport: MockTransport) -> Catalog<MockTransport> {
    catalog_with(transport, CatalogConfig::default())
}

/// The upstream as recorded: one actor with two pages of works.
#[fixture]
fn upstream() -> MockTransport {
    MockTransport::new()
        .route("/v/YwG8Ve", [MockResponse::ok(DETAIL)])
        .route("/actors/0R1n3", [MockResponse::ok(ACTOR_P1)])
        .route("/actors/0R1n3?page=2", [MockResponse::ok(ACTOR_P2)])
        .route("/actors/0R1n3?page=3", [MockResponse::ok(EMPTY)])
        .route("/search?q=MIDA-583", [MockResponse::ok(SEARCH_CODE)])
}

fn encoded(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn detail_record_from_fixture(upstream: MockTransport) {
    let catalog = catalog(upstream);
    let record = catalog.get_detail("YwG8Ve", false, &Cancel::new()).await.unwrap();
    assert_eq!(record.code.as_str(), "MIDA-583");
    assert!(record.title.contains("エッチ覚醒4本番"));
    assert!(record.actors.iter().any(|actor| actor.name == "井上もも"));
    assert!(record.tags.iter().any(|tag| tag == "美少女電影"));
    assert!(record.magnets.iter().any(|magnet| magnet.name == "MIDA-583"));

    let again = catalog.get_detail("YwG8Ve", false, &Cancel::new()).await.unwrap();
    assert_eq!(record, again);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn lookup_by_code_equals_direct_lookup(upstream: MockTransport) {
    let catalog = catalog(upstream);
    let direct = catalog.get_detail("YwG8Ve", false, &Cancel::new()).await.unwrap();
    let by_code = catalog.get_by_code("mida-583", &Cancel::new()).await.unwrap();
    assert_eq!(by_code, direct);
    // The older release with the same code and the near-miss MIDA-5830 are
    // never opened.
    assert_eq!(catalog.session().transport().count("/v/Qa1Old"), 0);
    assert_eq!(catalog.session().transport().count("/v/Zr5Np1"), 0);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn lookup_by_unknown_code(upstream: MockTransport) {
    upstream.push("/search?q=ZZZ-999", [MockResponse::ok(EMPTY)]);
    let catalog = catalog(upstream);
    let err = catalog.get_by_code("ZZZ-999", &Cancel::new()).await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::NotFound(_)));
    let err = catalog.get_by_code("not a code", &Cancel::new()).await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::InvalidQuery(_)));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn actor_works_pages(upstream: MockTransport) {
    let catalog = catalog(upstream);
    let first = catalog.search_actor_works("0R1n3", 1, &Cancel::new()).await.unwrap();
    assert_eq!(first.page, 1);
    assert!(first.has_next);
    assert_eq!(first.items[0].code.as_ref().map(|code| code.as_str()), Some("MIDA-583"));

    let second = catalog.search_actor_works("0R1n3", 2, &Cancel::new()).await.unwrap();
    assert!(!second.has_next);
    assert_eq!(second.items.len(), 2);

    // No next link on page 2, and page 3 really is empty.
    let third = catalog.search_actor_works("0R1n3", 3, &Cancel::new()).await.unwrap();
    assert!(third.items.is_empty() && !third.has_next);

    let err = catalog.search_actor_works("0R1n3", 0, &Cancel::new()).await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::InvalidQuery(_)));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn traversal_stops_at_the_last_page(upstream: MockTransport) {
    let catalog = catalog(upstream);
    let cancel = Cancel::new();
    let pages: Vec<_> = catalog.traverse(ListingSource::actor_works("0R1n3"), &cancel).collect().await;
    let pages: Vec<_> = pages.into_iter().map(Result::unwrap).collect();
    assert_eq!(pages.iter().map(|page| page.page).collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(pages.iter().map(|page| page.items.len()).sum::<usize>(), 5);
    assert_eq!(catalog.session().transport().requests().len(), 2);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn full_last_page_is_cross_checked(upstream: MockTransport) {
    let catalog = catalog_with(
        upstream,
        CatalogConfig {
            page_size: 2,
            ..CatalogConfig::default()
        },
    );
    let cancel = Cancel::new();
    let pages: Vec<_> = catalog.traverse(ListingSource::actor_works("0R1n3"), &cancel).collect().await;
    // Page 2 holds exactly a page's worth, so page 3 is fetched too; it's empty
    // and isn't yielded.
    assert_eq!(pages.len(), 2);
    assert_eq!(catalog.session().transport().count("/actors/0R1n3?page=3"), 1);
    assert_eq!(catalog.session().transport().requests().len(), 3);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn traversal_is_bounded_by_max_pages(upstream: MockTransport) {
    let catalog = catalog_with(
        upstream,
        CatalogConfig {
            max_pages: 1,
            ..CatalogConfig::default()
        },
    );
    let cancel = Cancel::new();
    let pages: Vec<_> = catalog.traverse(ListingSource::actor_works("0R1n3"), &cancel).collect().await;
    assert_eq!(pages.len(), 1);
    assert!(pages[0].as_ref().unwrap().has_next);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn tag_search(upstream: MockTransport) {
    upstream.push("/tags?c1=4&c4=17", [MockResponse::ok(ACTOR_P1)]);
    let catalog = catalog(upstream);
    let page = catalog
        .search_by_tags([(TagCategory::Build, vec![17]), (TagCategory::Theme, vec![4])], 1, &Cancel::new())
        .await
        .unwrap();
    assert_eq!(page.items.len(), 3);

    let err = catalog
        .search_by_tags([(TagCategory::Build, vec![9_999])], 1, &Cancel::new())
        .await
        .unwrap_err();
    assert!(matches!(&*err, ErrorKind::InvalidQuery(_)));
    assert_eq!(catalog.session().transport().requests().len(), 1);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn actor_search_keeps_exact_matches(upstream: MockTransport) {
    upstream.push(&format!("/search?q={}&f=actor", encoded("井上もも")), [MockResponse::ok(SEARCH_ACTOR)]);
    let catalog = catalog(upstream);
    let actors = catalog.search_actor("井上もも", &Cancel::new()).await.unwrap();
    assert_eq!(actors.len(), 1);
    assert_eq!(actors[0].id, "0R1n3");
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn upgrade_records_partial_failures(upstream: MockTransport) {
    // Pq7Lm2 is unscripted (404); Hn4Rt8 serves a page with no record on it.
    upstream.push("/v/Hn4Rt8", [MockResponse::ok(MAINTENANCE)]);
    let catalog = catalog(upstream);
    let page = catalog.search_actor_works_full("0R1n3", 1, false, &Cancel::new()).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id, "YwG8Ve");
    assert!(page.has_next);

    let failed: Vec<_> = page.failures.iter().map(|failure| failure.identifier.as_str()).collect();
    assert_eq!(failed, vec!["Pq7Lm2", "Hn4Rt8"]);
    assert!(matches!(page.failures[0].error, ErrorKind::NotFound(_)));
    assert!(matches!(page.failures[1].error, ErrorKind::Parse { .. }));
    // Not found is final; a parse failure gets one more look.
    assert_eq!(catalog.session().transport().count("/v/Pq7Lm2"), 1);
    assert_eq!(catalog.session().transport().count("/v/Hn4Rt8"), 2);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn images_are_materialized_and_placeholders_rejected(upstream: MockTransport) {
    let upstream = upstream
        .route("/samples/yw/YwG8Ve_l_0.jpg", [MockResponse::ok(vec![0xFF; 20_000])])
        .route("/samples/yw/YwG8Ve_l_1.jpg", [MockResponse::ok(vec![0xFF; 512])])
        .route("/samples/yw/YwG8Ve_l_2.jpg", [MockResponse::ok(vec![0xFF; 15_000])]);
    let sink = Arc::new(MemorySink::new());
    let catalog = catalog(upstream).with_sink(sink.clone());
    let record = catalog.get_detail("YwG8Ve", false, &Cancel::new()).await.unwrap();

    let report = catalog.materialize_images(&record, &Cancel::new()).await.unwrap();
    assert_eq!(report.saved, vec!["MIDA-583/00001.jpg", "MIDA-583/00003.jpg"]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].identifier, "MIDA-583/00002.jpg");
    assert!(matches!(report.failures[0].error, ErrorKind::Rejected(_)));
    assert_eq!(sink.names().await, report.saved);
    assert_eq!(sink.get("MIDA-583/00003.jpg").await.map(|bytes| bytes.len()), Some(15_000));

    let requests = catalog.session().transport().requests();
    let image_request = requests.iter().find(|request| request.target() == "/samples/yw/YwG8Ve_l_0.jpg").unwrap();
    assert_eq!(image_request.url.host_str(), Some("c0.jdbstatic.com"));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn materializing_without_a_sink(upstream: MockTransport) {
    let catalog = catalog(upstream);
    let err = catalog.get_detail("YwG8Ve", true, &Cancel::new()).await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::Sink(_)));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn drifted_listing_is_a_parse_error(upstream: MockTransport) {
    upstream.push("/actors/Dr1ft", [MockResponse::ok(DRIFT)]);
    let catalog = catalog(upstream);
    let err = catalog.search_actor_works("Dr1ft", 1, &Cancel::new()).await.unwrap_err();
    let ErrorKind::Parse { field, fragment } = &*err else {
        panic!("expected a parse error, got {err:?}");
    };
    assert_eq!(field, "listing items");
    assert!(!fragment.is_empty());
    assert_eq!(catalog.session().transport().count("/actors/Dr1ft"), 2);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn empty_page_with_a_next_link_is_an_anomaly(upstream: MockTransport) {
    let contradictory = r#"<html><body><div class="empty-message">暫無內容</div>
        <nav class="pagination"><a rel="next" href="/actors/Od0Ly?page=2">下一頁</a></nav></body></html>"#;
    upstream.push("/actors/Od0Ly", [MockResponse::ok(contradictory)]);
    let catalog = catalog(upstream);
    let err = catalog.search_actor_works("Od0Ly", 1, &Cancel::new()).await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::Parse { .. }));
    assert_eq!(catalog.session().transport().count("/actors/Od0Ly"), 2);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn transient_challenges_are_absorbed_by_the_session() {
    let transport = MockTransport::new().route(
        "/v/YwG8Ve",
        [MockResponse::status(503), MockResponse::status(503), MockResponse::ok(DETAIL)],
    );
    let catalog = catalog(transport);
    let record = catalog.get_detail("YwG8Ve", false, &Cancel::new()).await.unwrap();
    assert_eq!(record.code.as_str(), "MIDA-583");
    let requests = catalog.session().transport().requests();
    assert!(requests[2].at - requests[1].at > requests[1].at - requests[0].at);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn cancellation_fails_the_whole_operation(upstream: MockTransport) {
    let catalog = catalog(upstream);
    let cancel = Cancel::new();
    cancel.cancel();
    let err = catalog.search_actor_works_full("0R1n3", 1, false, &cancel).await.unwrap_err();
    assert_eq!(*err, ErrorKind::Cancelled);
    assert!(catalog.session().transport().requests().is_empty());
}
