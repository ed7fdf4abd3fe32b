use super::*;

fn receive_message_frame() -> Frame {
    Frame::invocation(
        None,
        "ReceiveMessage",
        vec![
            serde_json::json!("bob"),
            serde_json::json!("hi there"),
            serde_json::json!("2025-03-01T10:15:00Z"),
        ],
    )
}

#[test]
fn kind_numeric_mapping_matches_wire_enum() {
    assert_eq!(FrameKind::Handshake.as_i32(), 0);
    assert_eq!(FrameKind::Invocation.as_i32(), 1);
    assert_eq!(FrameKind::Completion.as_i32(), 2);
    assert_eq!(FrameKind::Ping.as_i32(), 3);
    assert_eq!(FrameKind::Close.as_i32(), 4);
}

#[test]
fn kind_from_wire_rejects_out_of_range_value() {
    let err = FrameKind::from_i32(42).expect_err("kind should be invalid");
    assert!(matches!(err, CodecError::InvalidKind(42)));
}

#[test]
fn binary_codec_preserves_invocation() {
    let frame = receive_message_frame();
    let decoded = decode_frame(&encode_frame(&frame)).expect("decode should succeed");
    assert_eq!(decoded, frame);
}

#[test]
fn binary_codec_preserves_null_argument() {
    let frame = Frame::invocation(
        Some("inv-1".to_owned()),
        "ReceiveMessage",
        vec![serde_json::json!("bob"), serde_json::json!("hi"), Value::Null],
    );
    let decoded = decode_frame(&encode_frame(&frame)).expect("decode");
    assert_eq!(decoded.arguments[2], Value::Null);
    assert_eq!(decoded.invocation_id.as_deref(), Some("inv-1"));
}

#[test]
fn decode_frame_rejects_malformed_bytes() {
    let err = decode_frame(&[0xff, 0x00, 0x01]).expect_err("bytes should fail");
    assert!(matches!(err, CodecError::Decode(_)));
}

#[test]
fn decode_frame_rejects_invalid_wire_kind() {
    let wire = WireFrame {
        kind: 77,
        invocation_id: None,
        target: None,
        arguments: Vec::new(),
        error: None,
        allow_reconnect: false,
    };
    let mut bytes = Vec::new();
    wire.encode(&mut bytes).expect("encode");

    let err = decode_frame(&bytes).expect_err("kind should fail");
    assert!(matches!(err, CodecError::InvalidKind(77)));
}

#[test]
fn decode_frame_converts_missing_value_kind_to_null() {
    let wire = WireFrame {
        kind: FrameKind::Invocation.as_i32(),
        invocation_id: None,
        target: Some("ReceiveMessage".to_owned()),
        arguments: vec![prost_types::Value { kind: None }],
        error: None,
        allow_reconnect: false,
    };
    let mut bytes = Vec::new();
    wire.encode(&mut bytes).expect("encode");

    let frame = decode_frame(&bytes).expect("decode");
    assert_eq!(frame.arguments, vec![Value::Null]);
}

#[test]
fn integer_arguments_are_normalized_to_float_numbers() {
    let frame = Frame::invocation(None, "Count", vec![serde_json::json!(2)]);
    let decoded = decode_frame(&encode_frame(&frame)).expect("decode");
    assert_eq!(decoded.arguments[0], serde_json::json!(2.0));
}

#[test]
fn close_frame_carries_reconnect_flag_over_binary() {
    let frame = Frame::close(Some("server shutting down".to_owned()), true);
    let decoded = decode_frame(&encode_frame(&frame)).expect("decode");
    assert!(decoded.allow_reconnect);
    assert_eq!(decoded.error.as_deref(), Some("server shutting down"));
}

#[test]
fn json_codec_uses_camel_case_fields() {
    let frame = Frame::completion("inv-9", None);
    let text = encode_json(&frame).expect("encode");
    assert!(text.contains("\"invocationId\":\"inv-9\""));
    assert!(text.contains("\"kind\":\"completion\""));
    assert!(!text.contains("arguments"));
}

#[test]
fn json_codec_preserves_invocation() {
    let frame = receive_message_frame();
    let decoded = decode_json(&encode_json(&frame).expect("encode")).expect("decode");
    assert_eq!(decoded, frame);
}

#[test]
fn json_decode_defaults_optional_fields() {
    let frame = decode_json(r#"{"kind":"ping"}"#).expect("decode");
    assert_eq!(frame, Frame::ping());
}

#[test]
fn json_decode_rejects_unknown_kind() {
    let err = decode_json(r#"{"kind":"Ping"}"#).expect_err("kind is case sensitive");
    assert!(matches!(err, CodecError::Json(_)));
}

#[test]
fn handshake_constructors_fill_expected_fields() {
    let hello = Frame::handshake(PROTOCOL);
    assert_eq!(hello.kind, FrameKind::Handshake);
    assert_eq!(hello.target.as_deref(), Some(PROTOCOL));
    assert!(hello.error.is_none());

    let rejected = Frame::handshake_reply(Some("unsupported protocol".to_owned()));
    assert_eq!(rejected.kind, FrameKind::Handshake);
    assert!(rejected.target.is_none());
    assert_eq!(rejected.error.as_deref(), Some("unsupported protocol"));
}
