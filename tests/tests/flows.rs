#![expect(clippy::unwrap_used, clippy::panic, reason = "test")]

use {
    chrono::{Duration as TimeDelta, Utc},
    keepsake_sdk::{
        Error,
        link::ShareableLink,
        orchestrator::{Acceptance, OpenedSite, Retrieval, RetrieveOptions},
        protocol::endpoints::HealthStatus,
        record::PlaintextRecord,
    },
    keepsake_server::storage::Lookup,
    keepsake_tests::{PUBLIC_BASE_URL, TestServer},
    std::time::Duration,
    tempfile::TempDir,
};

fn record() -> PlaintextRecord {
    PlaintextRecord {
        creator_name: "Alex".into(),
        partner_name: "Sam".into(),
        love_message: "Will you be my valentine?".into(),
        how_we_met: Some("At the library".into()),
        reasons: Some(vec!["your laugh".into(), "your patience".into()]),
        pet_name: Some("Bean".into()),
        ..PlaintextRecord::default()
    }
}

fn opened(retrieval: Retrieval) -> OpenedSite {
    match retrieval {
        Retrieval::Displaying(opened) => opened,
        other => panic!("expected page to open, got {other:?}"),
    }
}

/// Views are recorded in the background; poll until the count reaches `expected`.
async fn wait_for_views(server: &TestServer, link: &ShareableLink, expected: u64) -> u64 {
    let client = server.client().unwrap();
    let mut view_count = 0;
    for _ in 0..100 {
        view_count = client.fetch_site(link.id()).await.unwrap().view_count;
        if view_count >= expected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    view_count
}

#[tokio::test(flavor = "multi_thread")]
async fn create_then_open() {
    let server = TestServer::start().await.unwrap();
    let orchestrator = server.orchestrator().unwrap();

    let link = orchestrator.create(&record()).await.unwrap();
    assert!(link.page_url().as_str().starts_with(PUBLIC_BASE_URL));
    assert!(link.page_url().path().starts_with("/v/"));
    assert!(link.key().is_some());

    let shared = ShareableLink::parse(&link.to_unmasked_string()).unwrap();
    let site = opened(orchestrator.retrieve(&shared).await);
    assert_eq!(site.record, record());
    assert_eq!(site.record.display_name(), "Bean");
    assert_eq!(site.view_count, 0);
    assert!(!site.accepted);

    assert_eq!(wait_for_views(&server, &link, 1).await, 1);
    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn server_stores_only_ciphertext() {
    let server = TestServer::start().await.unwrap();
    let link = server
        .orchestrator()
        .unwrap()
        .create(&record())
        .await
        .unwrap();
    let token = link.key().unwrap().as_unmasked_str().to_owned();

    let sites = server.storage().unwrap().list().unwrap();
    assert_eq!(sites.len(), 1);
    let raw = serde_json::to_string(&sites).unwrap();
    for secret in ["Alex", "Sam", "valentine", "library", token.as_str()] {
        assert!(!raw.contains(secret), "{secret:?} leaked into storage");
    }
    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn incomplete_links() {
    let server = TestServer::start().await.unwrap();
    let orchestrator = server.orchestrator().unwrap();
    let link = orchestrator.create(&record()).await.unwrap();

    let without_key = ShareableLink::parse(link.page_url().as_str()).unwrap();
    assert_eq!(orchestrator.retrieve(&without_key).await, Retrieval::NoKey);

    let other = orchestrator.create(&record()).await.unwrap();
    let wrong_key = ShareableLink::parse(&format!(
        "{}#{}",
        link.page_url(),
        other.key().unwrap().as_unmasked_str()
    ))
    .unwrap();
    assert_eq!(orchestrator.retrieve(&wrong_key).await, Retrieval::NotFound);

    let unknown = ShareableLink::parse(&format!(
        "{PUBLIC_BASE_URL}v/unknown1#{}",
        link.key().unwrap().as_unmasked_str()
    ))
    .unwrap();
    assert_eq!(orchestrator.retrieve(&unknown).await, Retrieval::NotFound);

    assert_eq!(wait_for_views(&server, &link, 0).await, 0);
    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn expired_pages() {
    let server = TestServer::start_with(|config| {
        config.expires_at = Some(Utc::now() - TimeDelta::seconds(1));
    })
    .await
    .unwrap();
    let orchestrator = server.orchestrator().unwrap();
    let link = orchestrator.create(&record()).await.unwrap();

    assert_eq!(orchestrator.retrieve(&link).await, Retrieval::Expired);
    assert!(matches!(
        orchestrator.accept(link.id()).await,
        Acceptance::Unconfirmed(Error::AcceptFailed(_))
    ));

    let storage = server.storage().unwrap();
    assert_eq!(storage.remove_expired(Utc::now()).unwrap(), 1);
    assert_eq!(
        storage.get(link.id(), Utc::now()).unwrap(),
        Lookup::Missing
    );
    assert_eq!(orchestrator.retrieve(&link).await, Retrieval::NotFound);
    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn accept_is_recorded_once() {
    let server = TestServer::start().await.unwrap();
    let orchestrator = server.orchestrator().unwrap();
    let link = orchestrator.create(&record()).await.unwrap();

    for _ in 0..2 {
        assert!(matches!(
            orchestrator.accept(link.id()).await,
            Acceptance::Confirmed
        ));
    }
    let options = RetrieveOptions { preview: true };
    let site = opened(orchestrator.retrieve_with(&link, options, |_| {}).await);
    assert!(site.accepted);

    let unknown = "unknown1".parse().unwrap();
    assert!(matches!(
        orchestrator.accept(&unknown).await,
        Acceptance::Unconfirmed(_)
    ));
    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn preview_does_not_count() {
    let server = TestServer::start().await.unwrap();
    let orchestrator = server.orchestrator().unwrap();
    let link = orchestrator.create(&record()).await.unwrap();

    let options = RetrieveOptions { preview: true };
    for _ in 0..3 {
        opened(orchestrator.retrieve_with(&link, options, |_| {}).await);
    }
    tokio::time::sleep(Duration::from_millis(200)).await;
    let site = opened(orchestrator.retrieve_with(&link, options, |_| {}).await);
    assert_eq!(site.view_count, 0);

    opened(orchestrator.retrieve(&link).await);
    assert_eq!(wait_for_views(&server, &link, 1).await, 1);
    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn creation_is_rate_limited() {
    let server = TestServer::start_with(|config| config.rate_limit_per_hour = 2)
        .await
        .unwrap();
    let orchestrator = server.orchestrator().unwrap();
    orchestrator.create(&record()).await.unwrap();
    orchestrator.create(&record()).await.unwrap();
    let err = orchestrator.create(&record()).await.unwrap_err();
    assert!(
        matches!(&err, Error::CreationFailed(message) if message.contains("Rate limit")),
        "{err}"
    );
    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn record_file_from_cli() {
    let server = TestServer::start().await.unwrap();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("record.json5");
    fs_err::write(
        &path,
        r#"{
            // comments are fine in record files
            creatorName: "Alex",
            partnerName: "Sam",
            loveMessage: "Will you be my valentine?",
            howWeMet: "At the library",
            reasons: ["your laugh", "your patience"],
            petName: "Bean",
        }"#,
    )
    .unwrap();

    let record = keepsake::read_record(&path).unwrap();
    assert_eq!(record, self::record());
    let orchestrator = server.orchestrator().unwrap();
    let link = orchestrator.create(&record).await.unwrap();
    let site = opened(orchestrator.retrieve(&link).await);
    assert_eq!(site.record, record);
    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn health() {
    let server = TestServer::start().await.unwrap();
    let url = server.url().unwrap().join("api/health").unwrap();
    let health: HealthStatus = reqwest::get(url).await.unwrap().json().await.unwrap();
    assert_eq!(health.status, "ok");
    assert!(health.storage);
    assert!(server.storage_path().join("tmp").is_dir());
    server.stop().await.unwrap();
}
