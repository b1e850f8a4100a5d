//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl and consolidation cycle end-to-end.

use part_sweep::config::{parse_config, Config};
use part_sweep::crawler::{crawl, crawl_site};
use part_sweep::output::{consolidate, DuplicateCount};
use part_sweep::storage::read_records;
use part_sweep::{ConfigError, RunPhase};
use std::path::PathBuf;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds a configuration whose directories live in `dir`
fn create_test_config(dir: &TempDir, sites: &str) -> Config {
    let text = format!(
        r#"
        [run]
        period = "Jan_2026"
        data-dir = "{data}"
        final-dir = "{fin}"
        log-dir = "{logs}"
        max-parallel-sites = 2

        [http]
        timeout-secs = 5
        connect-timeout-secs = 2

        {sites}
        "#,
        data = dir.path().join("data").display(),
        fin = dir.path().join("final_data").display(),
        logs = dir.path().join("logs").display(),
        sites = sites
    );
    parse_config(&text).expect("test config should be valid")
}

/// Listing site paginated with `/shop/page/{page}/`
fn shop_site(base_url: &str, batch_size: usize) -> String {
    format!(
        r#"
        [[site]]
        code = "SHOP"
        name = "test_shop"
        batch-size = {batch_size}
        workers = 3
        max-pages = 10
        item-link-selector = "ul.products a.product-link"

        [[site.category]]
        url = "{base_url}/shop/page/{{page}}/"

        [[site.field]]
        column = "Title"
        selector = "h1.product_title"

        [[site.field]]
        column = "Price"
        selector = "p.price"

        [[site.constant]]
        column = "Currency"
        value = "USD"
        "#
    )
}

fn listing_page(links: &[String]) -> String {
    let items: String = links
        .iter()
        .map(|l| format!(r#"<li><a class="product-link" href="{}">item</a></li>"#, l))
        .collect();
    format!(
        r#"<html><body><ul class="products">{}</ul></body></html>"#,
        items
    )
}

fn item_page(title: &str, price: &str) -> String {
    format!(
        r#"<html><body><h1 class="product_title">{}</h1><p class="price">{}</p></body></html>"#,
        title, price
    )
}

async fn mount_html(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

fn batch_names(dir: PathBuf) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

#[tokio::test]
async fn test_full_crawl_single_site() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&temp_dir, &shop_site(&base_url, 2));

    // Page 1 lists three items (one of them twice), page 2 lists one more
    mount_html(
        &mock_server,
        "/shop/page/1/",
        listing_page(&[
            "/product/a".to_string(),
            "/product/b".to_string(),
            format!("{}/product/a", base_url),
            "/product/c".to_string(),
        ]),
    )
    .await;
    mount_html(
        &mock_server,
        "/shop/page/2/",
        listing_page(&["/product/d".to_string()]),
    )
    .await;
    mount_html(&mock_server, "/shop/page/3/", listing_page(&[])).await;

    mount_html(&mock_server, "/product/a", item_page("Engine A", "$100.00")).await;
    mount_html(&mock_server, "/product/b", item_page("Engine B", "")).await;
    mount_html(&mock_server, "/product/c", item_page("Engine C", "$300.00")).await;
    mount_html(&mock_server, "/product/d", item_page("Engine D", "$400.00")).await;

    let reports = crawl(&config, &["shop".to_string()])
        .await
        .expect("crawl should start");
    assert_eq!(reports.len(), 1);
    let report = &reports[0];

    assert!(report.succeeded(), "crawl failed: {:?}", report.error);
    assert_eq!(report.phase, RunPhase::Finalize);
    assert_eq!(report.counts.pages_fetched, 3);
    assert_eq!(report.counts.items_dispatched, 4);
    assert_eq!(report.records_written, 4);
    assert_eq!(report.batches_written, 2);

    let batch_dir = config.run.batch_dir("test_shop");
    assert_eq!(batch_names(batch_dir.clone()), vec!["batch_2.csv", "batch_4.csv"]);

    let mut urls = Vec::new();
    for name in ["batch_2.csv", "batch_4.csv"] {
        let (header, records) = read_records(&batch_dir.join(name)).unwrap();
        assert_eq!(
            header,
            vec!["Page URL", "Item URL", "Title", "Price", "Currency"]
        );
        assert!(records.len() <= 2);
        for record in records {
            assert_eq!(record.get("Currency"), Some("USD"));
            urls.push(record.get("Item URL").unwrap_or_default().to_string());
        }
    }
    urls.sort();
    assert_eq!(
        urls,
        vec![
            format!("{}/product/a", base_url),
            format!("{}/product/b", base_url),
            format!("{}/product/c", base_url),
            format!("{}/product/d", base_url),
        ]
    );
}

#[tokio::test]
async fn test_zero_items_writes_no_batches() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(&temp_dir, &shop_site(&base_url, 12));

    mount_html(&mock_server, "/shop/page/1/", listing_page(&[])).await;

    let report = crawl_site(&config, &config.sites[0]).await;

    assert!(report.succeeded());
    assert_eq!(report.counts.pages_fetched, 1);
    assert_eq!(report.records_written, 0);
    assert_eq!(report.batches_written, 0);
    assert!(batch_names(config.run.batch_dir("test_shop")).is_empty());
}

#[tokio::test]
async fn test_failing_items_are_skipped() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(&temp_dir, &shop_site(&base_url, 10));

    mount_html(
        &mock_server,
        "/shop/page/1/",
        listing_page(&[
            "/product/ok".to_string(),
            "/product/broken".to_string(),
            "/product/gone".to_string(),
        ]),
    )
    .await;
    mount_html(&mock_server, "/product/ok", item_page("Turbo", "$950.00")).await;
    Mock::given(method("GET"))
        .and(path("/product/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;
    // /product/gone and /shop/page/2/ are not mounted: wiremock answers 404

    let report = crawl_site(&config, &config.sites[0]).await;

    assert!(report.succeeded(), "{:?}", report.error);
    assert_eq!(report.counts.items_dispatched, 3);
    assert_eq!(report.counts.items_recorded, 1);
    assert_eq!(report.counts.skipped_fetch, 2);
    assert_eq!(report.records_written, 1);
    assert_eq!(
        batch_names(config.run.batch_dir("test_shop")),
        vec!["batch_1.csv"]
    );
}

#[tokio::test]
async fn test_listing_server_error_aborts_site_but_finalizes() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(&temp_dir, &shop_site(&base_url, 10));

    mount_html(
        &mock_server,
        "/shop/page/1/",
        listing_page(&["/product/a".to_string()]),
    )
    .await;
    mount_html(&mock_server, "/product/a", item_page("Engine A", "$1")).await;
    Mock::given(method("GET"))
        .and(path("/shop/page/2/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let report = crawl_site(&config, &config.sites[0]).await;

    assert!(!report.succeeded());
    assert_eq!(report.phase, RunPhase::Finalize);
    assert_eq!(report.records_written, 1);
    assert_eq!(
        batch_names(config.run.batch_dir("test_shop")),
        vec!["batch_1.csv"]
    );
}

#[tokio::test]
async fn test_manifest_site() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let temp_dir = TempDir::new().unwrap();

    let manifest_path = temp_dir.path().join("urls.csv");
    std::fs::write(
        &manifest_path,
        format!(
            "item_url\n{0}/part/1\n\n{0}/part/2\n{0}/part/3\n",
            base_url
        ),
    )
    .unwrap();

    let config = create_test_config(
        &temp_dir,
        &format!(
            r#"
            [[site]]
            code = "FINDIT"
            name = "find_it"
            batch-size = 2
            workers = 2

            [site.manifest]
            path = "{}"

            [[site.field]]
            column = "Price"
            selector = "p.price"
            "#,
            manifest_path.display()
        ),
    );

    for n in 1..=3 {
        mount_html(
            &mock_server,
            &format!("/part/{}", n),
            item_page("Filter", &format!("${}", n)),
        )
        .await;
    }

    let report = crawl_site(&config, &config.sites[0]).await;

    assert!(report.succeeded(), "{:?}", report.error);
    assert_eq!(report.counts.pages_fetched, 0);
    assert_eq!(report.records_written, 3);
    assert_eq!(
        batch_names(config.run.batch_dir("find_it")),
        vec!["batch_2.csv", "batch_3.csv"]
    );

    let (_, records) = read_records(&config.run.batch_dir("find_it").join("batch_3.csv")).unwrap();
    assert_eq!(
        records[0].get("Page URL"),
        Some(manifest_path.display().to_string().as_str())
    );
}

#[tokio::test]
async fn test_unknown_site_rejected_before_work() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(&temp_dir, &shop_site(&mock_server.uri(), 2));

    let result = crawl(&config, &["SHOP".to_string(), "MISSING".to_string()]).await;

    assert!(matches!(result, Err(ConfigError::UnknownSites(ref codes)) if codes == &["MISSING"]));
    assert!(mock_server.received_requests().await.unwrap_or_default().is_empty());
    assert!(!config.run.batch_dir("test_shop").exists());
}

#[tokio::test]
async fn test_crawl_then_consolidate() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(&temp_dir, &shop_site(&base_url, 2));

    // The same product is listed on both pages
    mount_html(
        &mock_server,
        "/shop/page/1/",
        listing_page(&["/product/a".to_string(), "/product/b".to_string()]),
    )
    .await;
    mount_html(
        &mock_server,
        "/shop/page/2/",
        listing_page(&["/product/a".to_string(), "/product/c".to_string()]),
    )
    .await;
    mount_html(&mock_server, "/product/a", item_page("A", "$1")).await;
    mount_html(&mock_server, "/product/b", item_page("B", " ")).await;
    mount_html(&mock_server, "/product/c", item_page("C", "$3")).await;

    let reports = crawl(&config, &["SHOP".to_string()]).await.unwrap();
    assert_eq!(reports[0].records_written, 4);

    let summaries = consolidate(&config, &[]).unwrap();
    assert_eq!(summaries.len(), 1);
    let summary = &summaries[0];
    assert_eq!(summary.site, "test_shop");
    assert_eq!(summary.raw_total, 4);
    assert_eq!(summary.duplicates, DuplicateCount::Count(1));
    assert_eq!(summary.unique_total, 3);
    assert_eq!(summary.with_price, 2);

    let (_, records) = read_records(&config.run.consolidated_path("test_shop")).unwrap();
    assert_eq!(records.len(), 3);

    // Running it again gives the same answer
    let again = consolidate(&config, &["shop".to_string()]).unwrap();
    assert_eq!(&again[0], summary);
}
