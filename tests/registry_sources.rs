use std::sync::Arc;
use std::time::Duration;

use clash_speedtest::dialer::DirectAdapter;
use clash_speedtest::registry::{RegistryBuilder, RegistryError, RegistryOptions, SourceLocator};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn options(sources: Vec<SourceLocator>) -> RegistryOptions {
    RegistryOptions {
        sources,
        fetch_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

async fn serve(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn url_source_with_http_providers() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/sub",
        format!(
            "proxies:\n  - {{name: HK, type: ss, server: 1.1.1.1, cipher: aes-128-gcm}}\nproxy-providers:\n  airport:\n    url: {uri}/provider\n  broken:\n    url: {uri}/missing\n",
            uri = server.uri()
        ),
    )
    .await;
    serve(
        &server,
        "/provider",
        "proxies:\n  - {name: JP, type: vmess, server: 2.2.2.2}\n  - {name: HK, type: trojan, server: 3.3.3.3}\n"
            .to_string(),
    )
    .await;

    let sub = SourceLocator::parse(&format!("{}/sub", server.uri()));
    let registry = RegistryBuilder::new(options(vec![sub]), Arc::new(DirectAdapter))
        .load()
        .await
        .unwrap();

    let names: Vec<_> = registry.names().collect();
    assert_eq!(names, vec!["HK", "[airport] HK", "[airport] JP"]);
}

#[tokio::test]
async fn same_source_twice_keeps_both_copies() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/sub",
        "proxies:\n  - {name: SG, type: http, server: 4.4.4.4}\n".to_string(),
    )
    .await;

    let sources = SourceLocator::parse_list(&format!("{0}/sub,{0}/sub", server.uri()));
    let registry = RegistryBuilder::new(options(sources), Arc::new(DirectAdapter))
        .load()
        .await
        .unwrap();

    let names: Vec<_> = registry.names().collect();
    assert_eq!(names, vec!["SG", "SG-重名1"]);
}

#[tokio::test]
async fn unreachable_sources_end_in_no_proxies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let sources = vec![SourceLocator::parse(&format!("{}/gone", server.uri()))];
    let err = RegistryBuilder::new(options(sources), Arc::new(DirectAdapter))
        .load()
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::NoProxiesLoaded));
}
