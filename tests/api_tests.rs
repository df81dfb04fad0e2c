use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use bookfinder::api::create_router;
use bookfinder::error::SearchError;
use bookfinder::extraction::{ExtractionSchema, SchemaSpec};
use bookfinder::filter::{DEFAULT_MARKETPLACE_TOKENS, RelevanceMode};
use bookfinder::service::{Limits, SearchService};
use bookfinder::target::SearchTarget;

mod test_helpers {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use bookfinder::browser::{BrowserSession, SessionLauncher};
    use bookfinder::data_models::RenderedPage;
    use bookfinder::error::ExtractionError;
    use url::Url;

    /// What a mock browser does once asked to render.
    #[derive(Clone)]
    pub enum Behaviour {
        Page(String),
        SlowPage(Duration, String),
        Hang,
        NavigationFails,
        LaunchFails,
    }

    #[derive(Clone, Default)]
    pub struct Counters {
        launched: Arc<AtomicUsize>,
        released: Arc<AtomicUsize>,
        visited: Arc<std::sync::Mutex<Vec<String>>>,
    }

    impl Counters {
        pub fn launched(&self) -> usize {
            self.launched.load(Ordering::SeqCst)
        }

        pub fn released(&self) -> usize {
            self.released.load(Ordering::SeqCst)
        }

        pub fn visited(&self) -> Vec<String> {
            self.visited.lock().unwrap().clone()
        }
    }

    pub struct MockLauncher {
        behaviour: Behaviour,
        pub counters: Counters,
    }

    impl MockLauncher {
        pub fn new(behaviour: Behaviour) -> MockLauncher {
            MockLauncher {
                behaviour,
                counters: Counters::default(),
            }
        }
    }

    impl SessionLauncher for MockLauncher {
        type Session = MockSession;

        async fn launch(&self) -> Result<MockSession, ExtractionError> {
            if let Behaviour::LaunchFails = self.behaviour {
                return Err(ExtractionError::Launch("no chrome here".to_string()));
            }
            self.counters.launched.fetch_add(1, Ordering::SeqCst);
            Ok(MockSession {
                behaviour: self.behaviour.clone(),
                counters: self.counters.clone(),
            })
        }
    }

    pub struct MockSession {
        behaviour: Behaviour,
        counters: Counters,
    }

    impl BrowserSession for MockSession {
        async fn render(&mut self, url: &Url) -> Result<RenderedPage, ExtractionError> {
            self.counters.visited.lock().unwrap().push(url.to_string());
            match &self.behaviour {
                Behaviour::Page(html) => Ok(RenderedPage::new(url.clone(), html.clone())),
                Behaviour::SlowPage(delay, html) => {
                    tokio::time::sleep(*delay).await;
                    Ok(RenderedPage::new(url.clone(), html.clone()))
                }
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(RenderedPage::new(url.clone(), ""))
                }
                Behaviour::NavigationFails | Behaviour::LaunchFails => {
                    Err(ExtractionError::Navigation {
                        url: url.to_string(),
                        reason: "net::ERR_NAME_NOT_RESOLVED".to_string(),
                    })
                }
            }
        }

        async fn release(self) {}
    }

    impl Drop for MockSession {
        fn drop(&mut self) {
            self.counters.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn results_page() -> String {
        r#"<html><body><div id="search">
            <div class="tF2Cxc"><div class="yuRUbf"><a href="https://store.example/dune"><h3 class="DKV0Md">Dune</h3></a></div></div>
            <div class="tF2Cxc"><div class="yuRUbf"><a href="https://news.example/x"><h3 class="DKV0Md">Unrelated</h3></a></div></div>
        </div></body></html>"#
            .to_string()
    }
}

use test_helpers::*;

fn quick_limits() -> Limits {
    Limits {
        navigation_timeout: Duration::from_millis(100),
        max_sessions: 4,
        queue_timeout: Duration::from_millis(100),
    }
}

fn service_with(behaviour: Behaviour, limits: Limits) -> Arc<SearchService<MockLauncher>> {
    Arc::new(SearchService::new(
        MockLauncher::new(behaviour),
        SearchTarget::new("https://www.google.com/search?q={query}+buy+book").unwrap(),
        ExtractionSchema::compile_all(&[SchemaSpec::google()]).unwrap(),
        RelevanceMode::Either.build(&DEFAULT_MARKETPLACE_TOKENS.map(String::from)),
        limits,
    ))
}

fn router(service: &Arc<SearchService<MockLauncher>>) -> Router {
    create_router(service.clone(), "static")
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_search_returns_relevant_listings() {
    let service = service_with(Behaviour::Page(results_page()), quick_limits());

    let (status, body) = get(router(&service), "/api/search?bookName=Dune").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([{ "title": "Dune", "link": "https://store.example/dune" }])
    );
    assert_eq!(service.launcher().counters.launched(), 1);
    assert_eq!(service.launcher().counters.released(), 1);
}

#[tokio::test]
async fn test_query_is_encoded_into_target_url() {
    let service = service_with(Behaviour::Page(results_page()), quick_limits());

    let (status, _) = get(router(&service), "/api/search?bookName=%20Dune%20%26%20Co%20").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        service.launcher().counters.visited(),
        vec!["https://www.google.com/search?q=Dune+%26+Co+buy+book"]
    );
}

#[tokio::test]
async fn test_missing_or_empty_book_name_is_rejected_without_browser() {
    let service = service_with(Behaviour::Page(results_page()), quick_limits());

    for uri in [
        "/api/search",
        "/api/search?bookName=",
        "/api/search?bookName=%20%20",
        "/api/search?other=Dune",
    ] {
        let (status, body) = get(router(&service), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "uri: {uri}");
        assert_eq!(body, json!({ "error": "Book name is required" }));
    }

    assert_eq!(service.launcher().counters.launched(), 0);
}

#[tokio::test]
async fn test_no_matching_cards_is_empty_success() {
    let html = "<html><body><p>No results for your query.</p></body></html>".to_string();
    let service = service_with(Behaviour::Page(html), quick_limits());

    let (status, body) = get(router(&service), "/api/search?bookName=Dune").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
    assert_eq!(service.launcher().counters.released(), 1);
}

#[tokio::test]
async fn test_navigation_timeout_is_server_error_and_releases_session() {
    let service = service_with(Behaviour::Hang, quick_limits());

    let (status, body) = get(router(&service), "/api/search?bookName=Dune").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Error occurred while searching" }));
    assert_eq!(service.launcher().counters.launched(), 1);
    assert_eq!(service.launcher().counters.released(), 1);
}

#[tokio::test]
async fn test_navigation_failure_releases_session() {
    let service = service_with(Behaviour::NavigationFails, quick_limits());

    let (status, body) = get(router(&service), "/api/search?bookName=Dune").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Error occurred while searching" }));
    assert_eq!(service.launcher().counters.launched(), 1);
    assert_eq!(service.launcher().counters.released(), 1);
}

#[tokio::test]
async fn test_blank_page_is_server_error() {
    let service = service_with(
        Behaviour::Page("<html><body></body></html>".to_string()),
        quick_limits(),
    );

    let (status, body) = get(router(&service), "/api/search?bookName=Dune").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Error occurred while searching" }));
    assert_eq!(service.launcher().counters.released(), 1);
}

#[tokio::test]
async fn test_launch_failure_is_server_error() {
    let service = service_with(Behaviour::LaunchFails, quick_limits());

    let (status, body) = get(router(&service), "/api/search?bookName=Dune").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Error occurred while searching" }));
    assert_eq!(service.launcher().counters.launched(), 0);
    assert_eq!(service.launcher().counters.released(), 0);
}

#[tokio::test]
async fn test_cancelled_search_releases_session() {
    let limits = Limits {
        navigation_timeout: Duration::from_secs(60),
        ..quick_limits()
    };
    let service = service_with(Behaviour::Hang, limits);

    let outcome =
        tokio::time::timeout(Duration::from_millis(50), service.search(Some("Dune"))).await;

    assert!(outcome.is_err());
    assert_eq!(service.launcher().counters.launched(), 1);
    assert_eq!(service.launcher().counters.released(), 1);
}

#[tokio::test]
async fn test_excess_searches_are_turned_away() {
    let limits = Limits {
        navigation_timeout: Duration::from_secs(5),
        max_sessions: 1,
        queue_timeout: Duration::from_millis(50),
    };
    let service = service_with(
        Behaviour::SlowPage(Duration::from_millis(500), results_page()),
        limits,
    );

    let (first, second) = tokio::join!(service.search(Some("Dune")), service.search(Some("Dune")));

    assert_eq!(first.unwrap().len(), 1);
    assert!(matches!(second, Err(SearchError::Busy)));
    assert_eq!(service.launcher().counters.launched(), 1);
}

#[tokio::test]
async fn test_busy_maps_to_service_unavailable() {
    let limits = Limits {
        navigation_timeout: Duration::from_secs(5),
        max_sessions: 1,
        queue_timeout: Duration::from_millis(50),
    };
    let service = service_with(
        Behaviour::SlowPage(Duration::from_millis(500), results_page()),
        limits,
    );

    let (_, (status, body)) = tokio::join!(
        service.search(Some("Dune")),
        get(router(&service), "/api/search?bookName=Dune")
    );

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        body,
        json!({ "error": "Too many searches in progress, try again later" })
    );
}

#[tokio::test]
async fn test_queued_searches_run_once_a_slot_frees() {
    let limits = Limits {
        navigation_timeout: Duration::from_secs(5),
        max_sessions: 1,
        queue_timeout: Duration::from_secs(5),
    };
    let service = service_with(
        Behaviour::SlowPage(Duration::from_millis(20), results_page()),
        limits,
    );

    let (first, second) = tokio::join!(service.search(Some("Dune")), service.search(Some("Dune")));

    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(service.launcher().counters.launched(), 2);
    assert_eq!(service.launcher().counters.released(), 2);
}

#[tokio::test]
async fn test_health() {
    let service = service_with(Behaviour::Page(results_page()), quick_limits());

    let (status, body) = get(router(&service), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_repeated_and_malformed_params_still_answer_json() {
    let service = service_with(Behaviour::Page(results_page()), quick_limits());
    let relevant = json!([{ "title": "Dune", "link": "https://store.example/dune" }]);
    let required = json!({ "error": "Book name is required" });

    let cases = [
        ("/api/search?bookName=Dune&bookName=Dune", StatusCode::OK, &relevant),
        ("/api/search?bookName=Dune&bookName=", StatusCode::OK, &relevant),
        ("/api/search?bookName=&bookName=Dune", StatusCode::BAD_REQUEST, &required),
        ("/api/search?&&=x&bookName=Dune&junk", StatusCode::OK, &relevant),
        ("/api/search?bookName=%ZZDune", StatusCode::OK, &relevant),
        ("/api/search?bookName", StatusCode::BAD_REQUEST, &required),
        ("/api/search?=&&", StatusCode::BAD_REQUEST, &required),
    ];

    for (uri, expected_status, expected_body) in cases {
        let (status, body) = get(router(&service), uri).await;
        assert_eq!(status, expected_status, "uri: {uri}");
        assert_eq!(&body, expected_body, "uri: {uri}");
    }
}
