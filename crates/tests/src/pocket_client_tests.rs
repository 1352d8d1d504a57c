//! The HTTP pocket client against a mockito full node and servicer.

use gateway_core::{
    pocket::{
        BlockHeightProvider, HttpPocketClient, PocketDispatcher, PocketError, PocketRelayer,
        PocketSdkError,
    },
    qos::{ErrorBucket, ErrorClassifier},
    types::{
        ApplicationSigner, GetSessionRequest, Node, Payload, PocketSession, RelayRequest,
        SessionHeader,
    },
};
use mockito::{Matcher, Server};
use serde_json::json;
use std::{sync::Arc, time::Duration};

fn client(host: &str) -> HttpPocketClient {
    HttpPocketClient::new(host, Duration::from_secs(2)).expect("valid test client")
}

fn signer() -> Arc<ApplicationSigner> {
    Arc::new(ApplicationSigner { public_key: "app1".to_string(), address: "addr1".to_string() })
}

fn session_json(service_url: &str) -> serde_json::Value {
    json!({
        "session": {
            "nodes": [
                { "service_url": service_url, "public_key": "node-a" },
                { "service_url": service_url, "public_key": "node-b" }
            ],
            "header": { "app_public_key": "app1", "chain": "0021", "session_height": 9 }
        }
    })
}

#[tokio::test]
async fn test_dispatch_session() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/client/dispatch")
        .match_body(Matcher::PartialJson(json!({ "app_public_key": "app1", "chain": "0021" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(session_json("https://servicer.example").to_string())
        .create_async()
        .await;

    let response =
        client(&server.url()).get_session(&GetSessionRequest::new("app1", "0021")).await.unwrap();

    assert_eq!(response.session.session_height(), 9);
    assert_eq!(response.session.nodes.len(), 2);
    assert_eq!(response.session.chain(), "0021");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_latest_block_height() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/v1/query/height")
        .with_status(200)
        .with_body(r#"{"height":12345}"#)
        .create_async()
        .await;

    let height = client(&server.url()).get_latest_block_height().await.unwrap();

    assert_eq!(height, 12_345);
}

#[tokio::test]
async fn test_relay_to_pinned_servicer() {
    let mut servicer = Server::new_async().await;
    let mock = servicer
        .mock("POST", "/v1/client/relay")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#""servicer_pub_key":"node-b""#.to_string()),
            Matcher::Regex(r#""meta":\{"block_height":9\}"#.to_string()),
            Matcher::Regex(r#""blockchain":"0021""#.to_string()),
        ]))
        .with_status(200)
        .with_body(r#"{"response":"{\"result\":\"0x1\"}"}"#)
        .create_async()
        .await;

    let session = PocketSession {
        nodes: vec![
            Node { service_url: servicer.url(), public_key: "node-a".to_string() },
            Node { service_url: servicer.url(), public_key: "node-b".to_string() },
        ],
        header: SessionHeader {
            app_public_key: "app1".to_string(),
            chain: "0021".to_string(),
            session_height: 9,
        },
    };
    let request = RelayRequest {
        signer: Some(signer()),
        session: Some(Arc::new(session)),
        selected_node_pub_key: Some("node-b".to_string()),
        ..RelayRequest::new("0021", Payload::post(r#"{"method":"eth_chainId"}"#, ""))
    };

    let response = client("http://full-node.invalid").send_relay(&request).await.unwrap();

    assert_eq!(response.response, r#"{"result":"0x1"}"#);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_relay_dispatches_missing_session() {
    let mut server = Server::new_async().await;
    let url = server.url();
    let dispatch = server
        .mock("POST", "/v1/client/dispatch")
        .with_status(200)
        .with_body(session_json(&url).to_string())
        .create_async()
        .await;
    let relay = server
        .mock("POST", "/v1/client/relay")
        .with_status(200)
        .with_body(r#"{"response":"ok"}"#)
        .create_async()
        .await;

    let request = RelayRequest {
        signer: Some(signer()),
        ..RelayRequest::new("0021", Payload::post("{}", ""))
    };
    let response = client(&url).send_relay(&request).await.unwrap();

    assert_eq!(response.response, "ok");
    dispatch.assert_async().await;
    relay.assert_async().await;
}

#[tokio::test]
async fn test_relay_requires_signer() {
    let request = RelayRequest::new("0021", Payload::post("{}", ""));

    let result = client("http://full-node.invalid").send_relay(&request).await;

    assert!(matches!(result, Err(PocketError::MalformedRelayRequest)));
}

#[tokio::test]
async fn test_servicer_sdk_error_is_decoded_and_kickable() {
    let mut servicer = Server::new_async().await;
    servicer
        .mock("POST", "/v1/client/relay")
        .with_status(400)
        .with_body(
            json!({
                "code": 400,
                "message": "the relay was rejected: ERROR:\nCodespace: pocketcore\nCode: 71\nMessage: \"the max number of relays serviced for this node is exceeded\"",
            })
            .to_string(),
        )
        .create_async()
        .await;

    let session = PocketSession {
        nodes: vec![Node { service_url: servicer.url(), public_key: "node-a".to_string() }],
        header: SessionHeader {
            chain: "0021".to_string(),
            session_height: 9,
            ..Default::default()
        },
    };
    let request = RelayRequest {
        signer: Some(signer()),
        session: Some(Arc::new(session)),
        ..RelayRequest::new("0021", Payload::post("{}", ""))
    };

    let error = client("http://full-node.invalid").send_relay(&request).await.unwrap_err();

    assert!(matches!(&error, PocketError::Rpc(rpc) if rpc.code == 400));
    assert_eq!(error.sdk_error(), Some(PocketSdkError::over_service()));
    assert_eq!(ErrorClassifier::v1().classify(&error), Some(ErrorBucket::Kickable));
}

#[tokio::test]
async fn test_non_json_error_body_keeps_status() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/v1/query/height")
        .with_status(503)
        .with_body("upstream unavailable")
        .create_async()
        .await;

    let error = client(&server.url()).get_latest_block_height().await.unwrap_err();

    match error {
        PocketError::Rpc(rpc) => {
            assert_eq!(rpc.code, 503);
            assert_eq!(rpc.message, "upstream unavailable");
        }
        other => panic!("expected an rpc error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_success_body() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/v1/query/height")
        .with_status(200)
        .with_body("not json")
        .create_async()
        .await;

    let error = client(&server.url()).get_latest_block_height().await.unwrap_err();

    assert!(matches!(error, PocketError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_unreachable_full_node() {
    let error = client("http://127.0.0.1:1").get_latest_block_height().await.unwrap_err();

    assert!(matches!(error, PocketError::ConnectionFailed(_)));
    assert!(error.is_transient());
}
