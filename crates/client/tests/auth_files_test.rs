// JWT token exchange and file lookups against a mock Box API

use std::path::PathBuf;

use boxwatch_client::{resolve_token, Client, ClientConfig, ClientError, JwtCustomClaims};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn jwt_config(server: &MockServer) -> ClientConfig {
    ClientConfig {
        url_base: server.uri(),
        token_url: format!("{}/oauth2/token", server.uri()),
        client_id: "cid".to_string(),
        client_secret: "secret".to_string(),
        private_key_path: Some(fixture("test_key.pem")),
        jwt_custom_claims: JwtCustomClaims {
            iss: "cid".to_string(),
            sub: "98765".to_string(),
            sub_type: "enterprise".to_string(),
            key_id: "k1".to_string(),
            ..Default::default()
        },
        ..Default::default()
    }
}

async fn mount_file(server: &MockServer, token: &str) {
    Mock::given(method("GET"))
        .and(path("/files/12345"))
        .and(header("Authorization", format!("Bearer {}", token).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "type": "file",
            "id": "12345",
            "sha1": "85136c79cbf9fe36bb9d05d0639c70c265c18d37",
            "name": "Contract.pdf",
            "size": 629644
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_connect_exchanges_jwt_for_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains(
            "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer",
        ))
        .and(body_string_contains("client_id=cid"))
        .and(body_string_contains("client_secret=secret"))
        .and(body_string_contains("assertion=ey"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-token",
            "expires_in": 3600,
            "token_type": "bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_file(&server, "fresh-token").await;

    let client = Client::connect(&jwt_config(&server)).await.unwrap();
    let sha1 = client.files().get_file_hash("12345").await.unwrap();
    assert_eq!(sha1, "85136c79cbf9fe36bb9d05d0639c70c265c18d37");
}

#[tokio::test]
async fn test_static_token_skips_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let config = ClientConfig {
        token: "static".to_string(),
        ..jwt_config(&server)
    };
    assert_eq!(resolve_token(&config).await.unwrap(), "static");
}

#[tokio::test]
async fn test_rejected_exchange_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Please check the 'sub' claim."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = resolve_token(&jwt_config(&server)).await.unwrap_err();
    match err {
        ClientError::Auth(msg) => assert!(msg.contains("invalid_grant")),
        other => panic!("expected Auth, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_credentials_is_configuration_error() {
    let config = ClientConfig::new("", "https://api.box.com/2.0");
    let err = resolve_token(&config).await.unwrap_err();
    assert!(matches!(err, ClientError::Configuration(_)));
}

#[tokio::test]
async fn test_get_file() {
    let server = MockServer::start().await;
    mount_file(&server, "test-token").await;

    let client = Client::new(&ClientConfig::new("test-token", server.uri())).unwrap();
    let file = client.files().get_file("12345").await.unwrap();

    assert_eq!(file.name, "Contract.pdf");
    assert_eq!(file.size, 629644);
    assert!(file.shared_link.is_none());
}

#[tokio::test]
async fn test_get_file_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/999"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not_found"))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::new(&ClientConfig::new("test-token", server.uri())).unwrap();
    let err = client.files().get_file_hash("999").await.unwrap_err();
    assert_eq!(err.status(), Some(404));
}
