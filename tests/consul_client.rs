// tests/consul_client.rs

use std::error::Error;
use std::time::Duration;

use base64::prelude::{BASE64_STANDARD, Engine as _};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use envconsul::errors::EnvconsulError;
use envconsul::store::{ConsulClient, ConsulClientConfig, Prefix, ReadOptions, StoreClient};
use envconsul_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

/// Serve exactly one HTTP response and hand back the raw request head.
async fn serve_once(
    status: &'static str,
    headers: Vec<(&'static str, String)>,
    body: String,
) -> Result<(String, JoinHandle<String>), Box<dyn Error>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?.to_string();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.expect("read request");
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }

        let mut response = format!("HTTP/1.1 {status}\r\nContent-Length: {}\r\n", body.len());
        for (name, value) in &headers {
            response.push_str(&format!("{name}: {value}\r\n"));
        }
        response.push_str("Connection: close\r\n\r\n");
        response.push_str(&body);
        socket.write_all(response.as_bytes()).await.expect("write response");
        socket.shutdown().await.ok();

        String::from_utf8_lossy(&request).to_string()
    });

    Ok((address, handle))
}

fn client(address: String, token: Option<&str>) -> Result<ConsulClient, EnvconsulError> {
    ConsulClient::new(ConsulClientConfig {
        address,
        token: token.map(str::to_string),
        ..ConsulClientConfig::default()
    })
}

fn read_options(index: u64, stale: bool) -> ReadOptions {
    ReadOptions {
        since_index: index,
        allow_stale: stale,
        wait: Duration::from_secs(1),
    }
}

#[tokio::test]
async fn decodes_values_and_index() -> TestResult {
    init_tracing();
    let body = format!(
        r#"[{{"Key":"config/app/","Value":null}},{{"Key":"config/app/db/host","Value":"{}"}},{{"Key":"config/app/empty","Value":null}}]"#,
        BASE64_STANDARD.encode("localhost")
    );
    let (address, server) =
        serve_once("200 OK", vec![("X-Consul-Index", "42".to_string())], body).await?;

    let consul = client(address, Some("tok"))?;
    let prefix: Prefix = "config/app@dc2".parse()?;
    let snap = with_timeout(consul.blocking_read(&prefix, read_options(7, true))).await?;

    assert_eq!(snap.index, 42);
    assert_eq!(snap.pairs.get("db/host").map(Vec::as_slice), Some(&b"localhost"[..]));
    assert_eq!(snap.pairs.get("empty").map(Vec::len), Some(0));
    assert_eq!(snap.pairs.len(), 2);

    let request = server.await?;
    let head = request.lines().next().unwrap_or_default().to_string();
    assert!(head.starts_with("GET /v1/kv/config/app/?"), "{head}");
    assert!(head.contains("recurse"));
    assert!(head.contains("index=7"));
    assert!(head.contains("wait=1000ms"));
    assert!(head.contains("stale"));
    assert!(head.contains("dc=dc2"));
    assert!(request.to_ascii_lowercase().contains("x-consul-token: tok"));
    Ok(())
}

#[tokio::test]
async fn missing_prefix_is_an_empty_snapshot() -> TestResult {
    init_tracing();
    let (address, _server) = serve_once(
        "404 Not Found",
        vec![("X-Consul-Index", "9".to_string())],
        String::new(),
    )
    .await?;

    let consul = client(address, None)?;
    let prefix: Prefix = "nothing/here".parse()?;
    let snap = with_timeout(consul.blocking_read(&prefix, read_options(0, false))).await?;

    assert_eq!(snap.index, 9);
    assert!(snap.is_empty());
    Ok(())
}

#[tokio::test]
async fn server_error_is_a_store_error() -> TestResult {
    init_tracing();
    let (address, _server) = serve_once(
        "500 Internal Server Error",
        vec![("X-Consul-Index", "1".to_string())],
        "boom".to_string(),
    )
    .await?;

    let consul = client(address, None)?;
    let prefix: Prefix = "app".parse()?;
    let result = with_timeout(consul.blocking_read(&prefix, read_options(0, false))).await;

    match result {
        Err(e @ EnvconsulError::StoreError(_)) => assert!(e.to_string().contains("500")),
        other => panic!("expected store error, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn missing_index_header_is_a_store_error() -> TestResult {
    init_tracing();
    let (address, _server) = serve_once("200 OK", Vec::new(), "[]".to_string()).await?;

    let consul = client(address, None)?;
    let prefix: Prefix = "app".parse()?;
    let result = with_timeout(consul.blocking_read(&prefix, read_options(0, false))).await;

    assert!(matches!(result, Err(EnvconsulError::StoreError(_))));
    Ok(())
}
