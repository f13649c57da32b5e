// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protocol unit tests

use super::*;
use serde_json::json;

#[test]
fn requests_are_tagged_by_type() {
    let encoded = encode(&Request::Cancel {
        run_id: Some("r1".to_string()),
    })
    .expect("encode failed");
    let value: serde_json::Value = serde_json::from_slice(&encoded).unwrap();
    assert_eq!(value, json!({"type": "Cancel", "run_id": "r1"}));
}

#[test]
fn optional_request_fields_default() {
    let history: Request = decode(br#"{"type":"History"}"#).expect("decode failed");
    assert_eq!(history, Request::History { days: 7, limit: 20 });

    let trigger: Request = decode(br#"{"type":"Trigger"}"#).expect("decode failed");
    assert_eq!(
        trigger,
        Request::Trigger {
            phases: None,
            skip_market_check: false,
            universe: None,
        }
    );
}

#[test]
fn trigger_phases_use_stage_names() {
    let request: Request =
        decode(br#"{"type":"Trigger","phases":["import","indicators"],"universe":"sp500"}"#)
            .expect("decode failed");
    assert_eq!(
        request,
        Request::Trigger {
            phases: Some(vec![Stage::Import, Stage::Indicators]),
            skip_market_check: false,
            universe: Some("sp500".to_string()),
        }
    );
}

#[test]
fn retry_requires_run_id() {
    assert!(decode::<Request>(br#"{"type":"Retry"}"#).is_err());
}

#[test]
fn unknown_request_type_is_rejected() {
    assert!(matches!(
        decode::<Request>(br#"{"type":"Launch"}"#),
        Err(ProtocolError::Json(_))
    ));
}

#[test]
fn status_response_keeps_engine_fields() {
    let status = StatusSnapshot {
        available: true,
        source: ts_engine::StatusSource::Live,
        message: None,
        status: json!({"run_id": "r1", "is_running": true})
            .as_object()
            .cloned()
            .unwrap(),
    };
    let response = Response::Status { status };

    let encoded = encode(&response).expect("encode failed");
    let value: serde_json::Value = serde_json::from_slice(&encoded).unwrap();
    assert_eq!(value["type"], "Status");
    assert_eq!(value["status"]["source"], "live");
    assert_eq!(value["status"]["run_id"], "r1");

    let decoded: Response = decode(&encoded).expect("decode failed");
    assert_eq!(decoded, response);
}

#[test]
fn encode_returns_json_without_length_prefix() {
    let encoded = encode(&Response::Pong).expect("encode failed");

    let json_str = std::str::from_utf8(&encoded).expect("should be valid UTF-8");
    assert_eq!(json_str, r#"{"type":"Pong"}"#);
}

#[tokio::test]
async fn read_write_message_roundtrip() {
    let original = b"hello world";

    let mut buffer = Vec::new();
    write_message(&mut buffer, original)
        .await
        .expect("write failed");

    // write_message adds 4-byte length prefix
    assert_eq!(buffer.len(), 4 + original.len());

    let mut cursor = std::io::Cursor::new(buffer);
    let read_back = read_message(&mut cursor).await.expect("read failed");

    assert_eq!(read_back, original);
}

#[tokio::test]
async fn write_message_adds_big_endian_length_prefix() {
    let data = b"test data";

    let mut buffer = Vec::new();
    write_message(&mut buffer, data)
        .await
        .expect("write failed");

    assert_eq!(&buffer[..4], &(data.len() as u32).to_be_bytes());
    assert_eq!(&buffer[4..], data);
}

#[tokio::test]
async fn empty_stream_is_connection_closed() {
    let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
    assert!(matches!(
        read_message(&mut cursor).await,
        Err(ProtocolError::ConnectionClosed)
    ));
}

#[tokio::test]
async fn oversized_frame_is_rejected() {
    let mut frame = ((MAX_MESSAGE_SIZE + 1) as u32).to_be_bytes().to_vec();
    frame.extend_from_slice(b"{}");
    let mut cursor = std::io::Cursor::new(frame);
    assert!(matches!(
        read_message(&mut cursor).await,
        Err(ProtocolError::MessageTooLarge(n)) if n == MAX_MESSAGE_SIZE + 1
    ));
}

#[tokio::test]
async fn read_request_decodes_frame() {
    let mut buffer = Vec::new();
    let data = encode(&Request::Summary { days: 3 }).unwrap();
    write_message(&mut buffer, &data).await.unwrap();

    let mut cursor = std::io::Cursor::new(buffer);
    let request = read_request(&mut cursor, DEFAULT_TIMEOUT)
        .await
        .expect("read failed");
    assert_eq!(request, Request::Summary { days: 3 });
}

#[tokio::test]
async fn read_request_times_out_on_silent_peer() {
    let (_client, server) = tokio::io::duplex(64);
    let mut server = server;
    let result = read_request(&mut server, Duration::from_millis(20)).await;
    assert!(matches!(result, Err(ProtocolError::Timeout)));
}
