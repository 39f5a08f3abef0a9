//! Tests against a real listener, driven over TCP with reqwest.

use std::net::SocketAddr;
use std::time::Duration;

use greenlight::config::ApiConfig;
use greenlight::lifecycle::Shutdown;

mod common;

use common::Stores;

async fn start(addr: SocketAddr, config: ApiConfig, stores: &Stores) -> (Shutdown, tokio::task::JoinHandle<()>) {
    let shutdown = Shutdown::new();
    let server = common::server(config, stores);
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    let receiver = shutdown.subscribe();

    let handle = tokio::spawn(async move {
        let _ = server.run(listener, receiver).await;
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    (shutdown, handle)
}

#[tokio::test]
async fn test_panic_does_not_take_the_server_down() {
    let addr: SocketAddr = "127.0.0.1:28401".parse().unwrap();
    let stores = Stores::seeded();
    let (shutdown, _handle) = start(addr, common::config(), &stores).await;
    let client = common::client();

    let res = client.get(format!("http://{addr}/v1/panic")).send().await.expect("Server unreachable");
    assert_eq!(res.status(), 500);
    assert_eq!(res.headers()["connection"], "close");
    assert_eq!(res.headers()["vary"], "Authorization");
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(
        body["error"],
        "the server encountered a problem and could not process your request"
    );

    for _ in 0..3 {
        let res = client
            .get(format!("http://{addr}/v1/healthcheck"))
            .send()
            .await
            .expect("Server stopped after panic");
        assert_eq!(res.status(), 200);
    }

    shutdown.trigger();
}

#[tokio::test]
async fn test_rate_limit_burst_then_refill() {
    let addr: SocketAddr = "127.0.0.1:28402".parse().unwrap();
    let stores = Stores::seeded();
    let mut config = common::config();
    config.rate_limit.enabled = true;
    config.rate_limit.requests_per_second = 2.0;
    config.rate_limit.burst_size = 4;
    let (shutdown, _handle) = start(addr, config, &stores).await;
    let client = common::client();

    let mut statuses = Vec::new();
    for _ in 0..5 {
        let res = client.get(format!("http://{addr}/v1/healthcheck")).send().await.unwrap();
        statuses.push(res.status().as_u16());
    }
    assert_eq!(statuses, vec![200, 200, 200, 200, 429]);

    tokio::time::sleep(Duration::from_millis(550)).await;
    let res = client.get(format!("http://{addr}/v1/healthcheck")).send().await.unwrap();
    assert_eq!(res.status(), 200);

    shutdown.trigger();
}

#[tokio::test]
async fn test_bearer_token_round_trip() {
    let addr: SocketAddr = "127.0.0.1:28403".parse().unwrap();
    let stores = Stores::seeded();
    let (shutdown, _handle) = start(addr, common::config(), &stores).await;
    let client = common::client();

    let res = client
        .post(format!("http://{addr}/v1/movies"))
        .bearer_auth(common::WRITER)
        .json(&serde_json::json!({
            "title": "Black Panther",
            "year": 2018,
            "runtime": 134,
            "genres": ["action", "adventure"],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
    assert_eq!(res.headers()["vary"], "Authorization");
    assert!(res.headers().contains_key("x-request-id"));

    let res = client
        .get(format!("http://{addr}/v1/movies/1"))
        .bearer_auth(common::READER)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let text = res.text().await.unwrap();
    assert!(text.ends_with('\n'));
    assert!(text.contains("\t\"movie\": {"));

    shutdown.trigger();
}

#[tokio::test]
async fn test_graceful_shutdown() {
    let addr: SocketAddr = "127.0.0.1:28404".parse().unwrap();
    let stores = Stores::seeded();
    let mut config = common::config();
    config.rate_limit.enabled = true;
    let (shutdown, handle) = start(addr, config, &stores).await;

    let res = common::client().get(format!("http://{addr}/v1/healthcheck")).send().await.unwrap();
    assert_eq!(res.status(), 200);

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not stop")
        .unwrap();

    assert!(tokio::net::TcpStream::connect(addr).await.is_err());

    // The eviction sweep exits on the same signal.
    for _ in 0..100 {
        if shutdown.receiver_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(shutdown.receiver_count(), 0);
}
