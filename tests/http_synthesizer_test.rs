use serde_json::json;
use std::time::Duration;
use tts_relay::config::{Config, Voice};
use tts_relay::error::RemoteError;
use tts_relay::synthesis::{HttpSynthesizer, Synthesizer};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY: &str = "test-key-0123456789";

async fn synthesizer_for(server: &MockServer, timeout: Duration) -> HttpSynthesizer {
    let endpoint = format!("{}/v1/audio/speech", server.uri());
    let config = Config::new(&endpoint, KEY)
        .unwrap()
        .with_request_timeout(timeout);
    HttpSynthesizer::new(&config).unwrap()
}

#[tokio::test]
async fn test_posts_json_with_auth_and_returns_audio() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .and(header("authorization", format!("Bearer {}", KEY).as_str()))
        .and(header("api-key", KEY))
        .and(body_json(json!({
            "model": "gpt-4o-mini-tts",
            "input": "Hello there.",
            "voice": "fable",
            "response_format": "mp3"
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "audio/mpeg")
                .set_body_bytes(vec![0xFF, 0xFB, 0x90, 0x00]),
        )
        .expect(1)
        .mount(&server)
        .await;

    let synth = synthesizer_for(&server, Duration::from_secs(5)).await;
    let audio = synth.synthesize("Hello there.", Voice::Fable).await.unwrap();

    assert_eq!(audio.as_ref(), &[0xFF, 0xFB, 0x90, 0x00]);
}

#[tokio::test]
async fn test_rate_limit_maps_to_status_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"code": "429", "message": "Requests to the deployment have exceeded the rate limit"}
        })))
        .mount(&server)
        .await;

    let synth = synthesizer_for(&server, Duration::from_secs(5)).await;
    let err = synth.synthesize("Hi", Voice::Alloy).await.unwrap_err();

    assert!(err.is_rate_limited());
    assert_eq!(
        err,
        RemoteError::Status {
            status: 429,
            message: "Requests to the deployment have exceeded the rate limit".to_string(),
        }
    );
}

#[tokio::test]
async fn test_unauthorized_is_an_auth_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Access denied"))
        .mount(&server)
        .await;

    let synth = synthesizer_for(&server, Duration::from_secs(5)).await;
    let err = synth.synthesize("Hi", Voice::Alloy).await.unwrap_err();

    assert!(err.is_auth_failure());
    assert!(err.to_string().contains("Access denied"));
}

#[tokio::test]
async fn test_empty_body_is_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let synth = synthesizer_for(&server, Duration::from_secs(5)).await;
    let err = synth.synthesize("Hi", Voice::Alloy).await.unwrap_err();

    assert_eq!(err, RemoteError::EmptyPayload);
}

#[tokio::test]
async fn test_json_instead_of_audio_is_malformed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "queued"})))
        .mount(&server)
        .await;

    let synth = synthesizer_for(&server, Duration::from_secs(5)).await;
    let err = synth.synthesize("Hi", Voice::Alloy).await.unwrap_err();

    assert!(matches!(err, RemoteError::MalformedPayload(ref m) if m.contains("queued")));
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![1, 2, 3])
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let synth = synthesizer_for(&server, Duration::from_millis(200)).await;
    let err = synth.synthesize("Hi", Voice::Alloy).await.unwrap_err();

    assert_eq!(err, RemoteError::Timeout);
}

#[tokio::test]
async fn test_unreachable_endpoint_is_a_network_error() {
    // Nothing listens on port 9 (discard) on test machines
    let config = Config::new("http://127.0.0.1:9/v1/audio/speech", KEY).unwrap();
    let synth = HttpSynthesizer::new(&config).unwrap();

    let err = synth.synthesize("Hi", Voice::Alloy).await.unwrap_err();

    assert!(matches!(err, RemoteError::Network(_)));
}
