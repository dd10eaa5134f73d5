//! Integration tests for the harvester
//!
//! These tests use wiremock to stand up a fake gallery site (login form,
//! browse pages, detail pages, image files) and run the full harvest
//! end-to-end against it.

use std::sync::Arc;
use stillharvest::config::{
    AuthConfig, Config, DownloadConfig, HarvesterConfig, RateLimitConfig, SelectorConfig,
    SourceConfig, StorageConfig, UserAgentConfig,
};
use stillharvest::crawler::stop_channel;
use stillharvest::{open_store, Orchestrator};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LOGGED_IN: &str = r#"<div class="user-menu">user@example.com</div>"#;

/// Creates a test configuration pointed at the mock server
fn create_test_config(base_url: &str, work_dir: &TempDir) -> Config {
    let db_path = work_dir.path().join("records.db");
    let assets_dir = work_dir.path().join("assets");

    Config {
        source: SourceConfig {
            base_url: base_url.to_string(),
            browse_path: "/browse/stills".to_string(),
            login_path: "/welcome/login".to_string(),
            detail_path_template: "/stills/{id}".to_string(),
        },
        selectors: SelectorConfig {
            record_container: ".still-card".to_string(),
            record_link: "a.gallerythumb".to_string(),
            record_image: "img.still".to_string(),
            record_title: ".title".to_string(),
            record_description: ".description".to_string(),
            record_tag: ".tag".to_string(),
            detail_group: ".detail-group".to_string(),
            detail_label: "p.detail-type".to_string(),
            detail_value: "div.details".to_string(),
            detail_image: ".main-image img".to_string(),
            logged_in_marker: ".user-menu".to_string(),
            login_error: ".login-error".to_string(),
            next_page: ".pagination .next".to_string(),
            total_pages: Some(".page-info".to_string()),
        },
        auth: AuthConfig {
            email: "user@example.com".to_string(),
            password: "hunter2".to_string(),
        },
        harvester: HarvesterConfig {
            pool_size: 1,
            pages_per_session: 1,
            request_delay_ms: 0,
            max_consecutive_failures: 5,
            max_pages: Some(5), // Safety net against pagination bugs
        },
        rate_limit: RateLimitConfig {
            max_requests_per_minute: 60_000, // Effectively unthrottled for tests
            backoff_factor: 2.0,
        },
        downloads: DownloadConfig {
            enabled: true,
            directory: assets_dir.to_string_lossy().to_string(),
            concurrent_downloads: 4,
            retry_attempts: 2,
        },
        storage: StorageConfig {
            database_url: format!("sqlite:{}", db_path.display()),
        },
        user_agent: UserAgentConfig {
            agent: "stillharvest-test/0.3".to_string(),
        },
    }
}

/// Mounts a working login flow on the mock server
async fn mount_login(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/welcome/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<form></form>"))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/welcome/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGGED_IN))
        .mount(server)
        .await;
}

/// Renders a browse page with one card per record id
fn browse_page(ids: &[&str], page: u32, total: u32) -> String {
    let cards: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<div class="still-card">
                     <a class="gallerythumb" href="/stills/{id}"></a>
                     <img class="still" src="/img/{id}_thumb.jpg" alt="Still {id}">
                     <span class="title">Still {id}</span>
                   </div>"#
            )
        })
        .collect();
    let next = if page < total {
        r#"<div class="pagination"><a class="next">Next</a></div>"#
    } else {
        ""
    };
    format!(
        r#"<html><body>{LOGGED_IN}{cards}{next}
           <span class="page-info">Page {page} of {total}</span></body></html>"#
    )
}

/// Renders a detail page carrying metadata and the full-size image
fn detail_page(id: &str) -> String {
    format!(
        r#"<html><body>{LOGGED_IN}
           <div class="detail-group">
             <p class="detail-type">Director:</p>
             <div class="details"><a>J. Doe</a></div>
           </div>
           <div class="detail-group">
             <p class="detail-type">Year:</p>
             <div class="details"><span>1987</span></div>
           </div>
           <div class="main-image"><img src="/img/{id}_full.jpg"></div>
           </body></html>"#
    )
}

async fn mount_detail(server: &MockServer, id: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/stills/{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_page(id)))
        .mount(server)
        .await;
}

async fn mount_image(server: &MockServer, id: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/img/{}_full.jpg", id)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(format!("image-{}", id).into_bytes()))
        .mount(server)
        .await;
}

async fn run_harvest(config: Config) -> Result<(), stillharvest::HarvestError> {
    let store = open_store(&config.storage.database_url).expect("Failed to open store");
    let (_stop_handle, stop) = stop_channel();
    let mut orchestrator =
        Orchestrator::new(Arc::new(config), store, stop).expect("Failed to build orchestrator");
    orchestrator.run().await
}

#[tokio::test]
async fn test_full_harvest_end_to_end() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    // Two browse pages: the second, more specific mock first
    Mock::given(method("GET"))
        .and(path("/browse/stills"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(browse_page(&["c3"], 2, 2)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/browse/stills"))
        .respond_with(ResponseTemplate::new(200).set_body_string(browse_page(&["a1", "b2"], 1, 2)))
        .mount(&server)
        .await;

    for id in ["a1", "b2", "c3"] {
        mount_detail(&server, id).await;
        mount_image(&server, id).await;
    }

    let work_dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), &work_dir);
    let database_url = config.storage.database_url.clone();
    let assets_dir = config.downloads.directory.clone();

    run_harvest(config).await.expect("Harvest failed");

    // All three records persisted and marked downloaded
    let store = open_store(&database_url).expect("Failed to reopen store");
    let stats = store.stats().expect("Failed to read stats");
    assert_eq!(stats.total, 3);
    assert_eq!(stats.downloaded, 3);

    // Asset files landed on disk, named by record id
    let files: Vec<String> = std::fs::read_dir(&assets_dir)
        .expect("Assets directory missing")
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(files.len(), 3);
    for id in ["a1", "b2", "c3"] {
        assert!(
            files.iter().any(|f| f.starts_with(&format!("{}_", id))),
            "No asset file for {}, got {:?}",
            id,
            files
        );
    }
}

#[tokio::test]
async fn test_duplicate_records_across_pages_harvested_once() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    // a1 appears on both pages; its detail page may only be hit once
    Mock::given(method("GET"))
        .and(path("/browse/stills"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(browse_page(&["a1", "b2"], 2, 2)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/browse/stills"))
        .respond_with(ResponseTemplate::new(200).set_body_string(browse_page(&["a1"], 1, 2)))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/stills/a1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_page("a1")))
        .expect(1)
        .mount(&server)
        .await;
    mount_detail(&server, "b2").await;
    mount_image(&server, "a1").await;
    mount_image(&server, "b2").await;

    let work_dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), &work_dir);
    let database_url = config.storage.database_url.clone();

    run_harvest(config).await.expect("Harvest failed");

    let store = open_store(&database_url).expect("Failed to reopen store");
    assert_eq!(store.stats().expect("Failed to read stats").total, 2);
}

#[tokio::test]
async fn test_second_run_skips_known_records_and_files() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/browse/stills"))
        .respond_with(ResponseTemplate::new(200).set_body_string(browse_page(&["a1"], 1, 1)))
        .mount(&server)
        .await;

    // Detail and image must each be fetched exactly once across both runs
    Mock::given(method("GET"))
        .and(path("/stills/a1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_page("a1")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/a1_full.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"image-a1".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let work_dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), &work_dir);
    let database_url = config.storage.database_url.clone();

    run_harvest(config.clone()).await.expect("First run failed");
    run_harvest(config).await.expect("Second run failed");

    let store = open_store(&database_url).expect("Failed to reopen store");
    let stats = store.stats().expect("Failed to read stats");
    assert_eq!(stats.total, 1);
    assert_eq!(stats.downloaded, 1);
}

#[tokio::test]
async fn test_partial_download_failure_leaves_other_records_downloaded() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/browse/stills"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(browse_page(&["a1", "b2", "c3"], 1, 1)),
        )
        .mount(&server)
        .await;

    for id in ["a1", "b2", "c3"] {
        mount_detail(&server, id).await;
    }
    mount_image(&server, "a1").await;
    mount_image(&server, "c3").await;
    // b2's asset is persistently broken
    Mock::given(method("GET"))
        .and(path("/img/b2_full.jpg"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2) // retry-attempts from the test config
        .mount(&server)
        .await;

    let work_dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), &work_dir);
    let database_url = config.storage.database_url.clone();

    // A failed download is not a failed harvest
    run_harvest(config).await.expect("Harvest failed");

    let store = open_store(&database_url).expect("Failed to reopen store");
    let stats = store.stats().expect("Failed to read stats");
    assert_eq!(stats.total, 3);
    assert_eq!(stats.downloaded, 2);
}

#[tokio::test]
async fn test_dropped_session_triggers_relogin() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    // First fetch of the browse page comes back logged out; after the
    // re-login the real page is served.
    Mock::given(method("GET"))
        .and(path("/browse/stills"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<html><body><div class="still-card"><a class="gallerythumb" href="/stills/a1"></a><img class="still" src="/img/a1_thumb.jpg"></div></body></html>"#),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/browse/stills"))
        .respond_with(ResponseTemplate::new(200).set_body_string(browse_page(&["a1"], 1, 1)))
        .mount(&server)
        .await;

    mount_detail(&server, "a1").await;
    mount_image(&server, "a1").await;

    let work_dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), &work_dir);
    let database_url = config.storage.database_url.clone();

    run_harvest(config).await.expect("Harvest failed");

    let store = open_store(&database_url).expect("Failed to reopen store");
    let stats = store.stats().expect("Failed to read stats");
    assert_eq!(stats.total, 1);
    assert_eq!(stats.downloaded, 1);

    // Login must have run twice: once at startup, once after the drop
    let requests = server.received_requests().await.unwrap();
    let logins = requests
        .iter()
        .filter(|r| r.method.to_string() == "POST" && r.url.path() == "/welcome/login")
        .count();
    assert_eq!(logins, 2);
}
