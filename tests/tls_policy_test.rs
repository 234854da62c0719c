use anyhow::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use page_enhance::{EnhancementClient, EnhancementSettings, PageMetadata, TransportPolicy};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

/// 啟動一個使用自簽憑證的 HTTPS 伺服器，對任何請求都回傳固定的 JSON。
/// 憑證的主機名稱是 `enhancer.invalid`，而客戶端連的是 127.0.0.1，
/// 所以憑證鏈與主機名稱兩項檢查都會失敗。
async fn start_self_signed_server(body: String) -> Result<SocketAddr> {
    let key_pair = rcgen::KeyPair::generate()?;
    let params = rcgen::CertificateParams::new(vec!["enhancer.invalid".to_string()])?;
    let cert = params.self_signed(&key_pair)?;

    let cert_der: CertificateDer<'static> = cert.der().clone();
    let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));

    let config = rustls::ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()?
    .with_no_client_auth()
    .with_single_cert(vec![cert_der], key_der)?;

    let acceptor = TlsAcceptor::from(Arc::new(config));
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let acceptor = acceptor.clone();
            let body = body.clone();

            tokio::spawn(async move {
                // 驗證失敗的客戶端會在這裡中斷握手
                let Ok(mut tls) = acceptor.accept(stream).await else {
                    return;
                };
                if read_http_request(&mut tls).await.is_err() {
                    return;
                }

                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = tls.write_all(response.as_bytes()).await;
                let _ = tls.shutdown().await;
            });
        }
    });

    Ok(addr)
}

/// 讀完 header 與 Content-Length 指定長度的 body
async fn read_http_request<S: AsyncRead + Unpin>(stream: &mut S) -> std::io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        if let Some(header_end) = find_header_end(&buffer) {
            let headers = String::from_utf8_lossy(&buffer[..header_end]).to_ascii_lowercase();
            let content_length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);

            if buffer.len() >= header_end + 4 + content_length {
                return Ok(buffer);
            }
        }

        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        buffer.extend_from_slice(&chunk[..read]);
    }
}

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|window| window == b"\r\n\r\n")
}

fn settings(addr: SocketAddr) -> EnhancementSettings {
    EnhancementSettings {
        enabled: true,
        base_url: format!("https://{}", addr),
        ..EnhancementSettings::default()
    }
}

fn metadata() -> PageMetadata {
    PageMetadata {
        image_name: Some("0".to_string()),
        title: "7".to_string(),
        chapter_label: "Oneshot".to_string(),
        ..PageMetadata::default()
    }
}

fn enhanced_body() -> String {
    serde_json::json!({ "colorImgData": STANDARD.encode(b"colored page") }).to_string()
}

#[tokio::test]
async fn test_trust_all_accepts_self_signed_certificate() -> Result<()> {
    let addr = start_self_signed_server(enhanced_body()).await?;

    let client = EnhancementClient::new(TransportPolicy::trust_all())?;
    let result = client.try_enhance(&metadata(), b"page", &settings(addr)).await?;

    assert_eq!(result.image_data, b"colored page");
    Ok(())
}

#[tokio::test]
async fn test_strict_policy_fails_closed() -> Result<()> {
    let addr = start_self_signed_server(enhanced_body()).await?;

    let client = EnhancementClient::new(TransportPolicy::default())?;
    let err = client
        .try_enhance(&metadata(), b"page", &settings(addr))
        .await
        .unwrap_err();
    assert!(matches!(err, page_enhance::EnhanceError::ApiError(_)));

    assert!(client.enhance(&metadata(), b"page", &settings(addr)).await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_trust_all_is_scoped_to_enhancement_client() -> Result<()> {
    let addr = start_self_signed_server(enhanced_body()).await?;

    // 增強客戶端開啟 trust-all 後，應用程式其他地方用的預設客戶端仍然驗證憑證
    let enhancement_client = EnhancementClient::new(TransportPolicy::trust_all())?;
    assert!(enhancement_client.policy().accept_invalid_certs);

    let app_client = TransportPolicy::default().build_client()?;
    let app_result = app_client
        .get(format!("https://{}/health", addr))
        .send()
        .await;
    assert!(app_result.is_err());

    let enhanced = enhancement_client
        .enhance(&metadata(), b"page", &settings(addr))
        .await;
    assert_eq!(enhanced.map(|r| r.image_data), Some(b"colored page".to_vec()));

    let app_result = reqwest::Client::new()
        .get(format!("https://{}/health", addr))
        .send()
        .await;
    assert!(app_result.is_err());
    Ok(())
}

#[tokio::test]
async fn test_injected_builder_is_strict_unless_policy_opts_in() -> Result<()> {
    let addr = start_self_signed_server(enhanced_body()).await?;

    let strict = EnhancementClient::with_builder(reqwest::Client::builder(), TransportPolicy::default())?;
    let err = strict
        .try_enhance(&metadata(), b"page", &settings(addr))
        .await
        .unwrap_err();
    assert!(matches!(err, page_enhance::EnhanceError::ApiError(_)));

    let trusting = EnhancementClient::with_builder(
        reqwest::Client::builder().pool_max_idle_per_host(1),
        TransportPolicy::trust_all(),
    )?;
    let result = trusting.try_enhance(&metadata(), b"page", &settings(addr)).await?;
    assert_eq!(result.image_data, b"colored page");
    Ok(())
}
