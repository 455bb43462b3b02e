// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn request_parses_the_documented_wire_shape() {
    let json = r#"{"action":"start","target":"app.js","options":{"name":"api","watch":true,"env":["PORT=3000"]}}"#;
    let request: Request = serde_json::from_str(json).unwrap();

    assert_eq!(request.action, "start");
    assert_eq!(request.target.as_deref(), Some("app.js"));
    assert_eq!(request.options.name.as_deref(), Some("api"));
    assert!(request.options.watch);
    assert_eq!(request.options.env, vec!["PORT=3000".to_string()]);
}

#[test]
fn bare_request_needs_only_an_action() {
    let request: Request = serde_json::from_str(r#"{"action":"ping"}"#).unwrap();
    assert_eq!(request.action, "ping");
    assert_eq!(request.target, None);
    assert_eq!(request.options, RequestOptions::default());
}

#[test]
fn reply_omits_missing_data() {
    let reply = Reply::ok("pong");
    let json = serde_json::to_string(&reply).unwrap();
    assert!(!json.contains("data"));

    let reply = Reply::ok_with("here", serde_json::json!({"n": 1}));
    let json = serde_json::to_string(&reply).unwrap();
    assert!(json.contains("\"data\""));
}

#[tokio::test]
async fn frames_round_trip_over_a_stream() {
    let (client, server) = tokio::io::duplex(4096);
    let (server_read, _keep) = tokio::io::split(server);
    let (_keep2, mut client_write) = tokio::io::split(client);

    let request = Request {
        action: "logs".to_string(),
        target: Some("api".to_string()),
        options: RequestOptions {
            lines: Some(50),
            ..Default::default()
        },
    };
    write_frame(&mut client_write, &request).await.unwrap();

    let mut reader = tokio::io::BufReader::new(server_read);
    let parsed: Request = read_frame(&mut reader).await.unwrap().unwrap();
    assert_eq!(parsed, request);
}

#[tokio::test]
async fn pipelined_frames_arrive_in_order() {
    let (client, server) = tokio::io::duplex(4096);
    let (server_read, _keep) = tokio::io::split(server);
    let (_keep2, mut client_write) = tokio::io::split(client);

    for action in ["ping", "status", "save"] {
        let request = Request {
            action: action.to_string(),
            target: None,
            options: RequestOptions::default(),
        };
        write_frame(&mut client_write, &request).await.unwrap();
    }
    drop(client_write);

    let mut reader = tokio::io::BufReader::new(server_read);
    let mut actions = Vec::new();
    while let Some(request) = read_frame::<_, Request>(&mut reader).await.unwrap() {
        actions.push(request.action);
    }
    assert_eq!(actions, vec!["ping", "status", "save"]);
}

#[tokio::test]
async fn eof_between_frames_is_clean() {
    let (client, server) = tokio::io::duplex(64);
    drop(client);
    let (server_read, _w) = tokio::io::split(server);
    let mut reader = tokio::io::BufReader::new(server_read);
    let frame: Option<Request> = read_frame(&mut reader).await.unwrap();
    assert!(frame.is_none());
}

#[tokio::test]
async fn garbage_frame_is_a_json_error() {
    let (client, server) = tokio::io::duplex(4096);
    let (server_read, _keep) = tokio::io::split(server);
    let (_keep2, mut client_write) = tokio::io::split(client);

    client_write.write_all(b"this is not json\n").await.unwrap();
    client_write.flush().await.unwrap();

    let mut reader = tokio::io::BufReader::new(server_read);
    let result: Result<Option<Request>, ProtocolError> = read_frame(&mut reader).await;
    assert!(matches!(result, Err(ProtocolError::Json(_))));
}

#[tokio::test]
async fn blank_lines_between_frames_are_skipped() {
    let (client, server) = tokio::io::duplex(4096);
    let (server_read, _keep) = tokio::io::split(server);
    let (_keep2, mut client_write) = tokio::io::split(client);

    client_write
        .write_all(b"\n\n{\"action\":\"ping\"}\n")
        .await
        .unwrap();
    client_write.flush().await.unwrap();

    let mut reader = tokio::io::BufReader::new(server_read);
    let request: Request = read_frame(&mut reader).await.unwrap().unwrap();
    assert_eq!(request.action, "ping");
}
