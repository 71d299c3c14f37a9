//! Integration tests for the qvd-core public API.
//!
//! These tests exercise the pieces a session uses together: a list body is
//! streamed into a `ResponseBuffer` in arbitrary chunks, parsed into a
//! `VmCatalog`, and the connect URL for the default candidate is built from
//! the endpoint.

use qvd_core::{
    build_auth_header, parse_vm_list, BrokerEndpoint, CatalogError, ConnectOverrides, Geometry,
    ResponseBuffer, VmId,
};

const TWO_VMS: &[u8] = br#"[
  {"id": 1, "name": "desktop-a", "state": "running", "blocked": 0},
  {"id": 2, "name": "desktop-b", "state": "stopped", "blocked": 1}
]"#;

/// Feeds `body` into a fresh buffer using chunks of `chunk` bytes.
fn stream(body: &[u8], chunk: usize) -> ResponseBuffer {
    let mut buf = ResponseBuffer::with_capacity(4);
    for part in body.chunks(chunk) {
        buf.append(part).expect("append must succeed");
    }
    buf
}

#[test]
fn test_streamed_list_parses_identically_for_every_chunk_size() {
    for chunk in 1..=TWO_VMS.len() {
        // Act
        let buf = stream(TWO_VMS, chunk);
        let catalog = parse_vm_list(buf.as_bytes()).expect("parse");

        // Assert
        let names: Vec<&str> = catalog.iter().map(|vm| vm.name.as_str()).collect();
        assert_eq!(names, ["desktop-a", "desktop-b"], "chunk size {chunk}");
    }
}

#[test]
fn test_many_records_keep_broker_order() {
    // Arrange: 500 records with descending ids
    let records: Vec<String> = (1..=500u32)
        .rev()
        .map(|i| format!(r#"{{"id":{i},"name":"vm-{i}","state":"running","blocked":0}}"#))
        .collect();
    let body = format!("[{}]", records.join(","));

    // Act
    let catalog = parse_vm_list(stream(body.as_bytes(), 1000).as_bytes()).unwrap();

    // Assert
    assert_eq!(catalog.len(), 500);
    assert_eq!(catalog.first().unwrap().id.get(), 500);
    assert_eq!(catalog.as_slice()[499].id.get(), 1);
    assert_eq!(
        catalog.get(VmId::new(250).unwrap()).unwrap().name,
        "vm-250"
    );
}

#[test]
fn test_buffer_reuse_between_list_and_connect_bodies() {
    // Arrange
    let mut buf = ResponseBuffer::new();
    buf.append(TWO_VMS).unwrap();
    let catalog = parse_vm_list(buf.as_bytes()).unwrap();

    // Act: reuse for the next request
    buf.reset();
    buf.append(br#"{"link":"nx:localhost:40"}"#).unwrap();

    // Assert
    assert_eq!(catalog.len(), 2);
    let params = qvd_core::ConnectionParams::parse(buf.as_bytes()).unwrap();
    assert_eq!(params.link, "nx:localhost:40");
}

#[test]
fn test_connect_url_for_default_candidate() {
    // Arrange
    let endpoint = BrokerEndpoint::new("qvd.example.com", 8443).unwrap();
    let catalog = parse_vm_list(TWO_VMS).unwrap();
    let overrides = ConnectOverrides {
        geometry: Some("1024x768".parse::<Geometry>().unwrap()),
        fullscreen: true,
        ..Default::default()
    };

    // Act
    let url = endpoint.connect_to_vm_url(catalog.first().unwrap().id, &overrides);

    // Assert
    assert_eq!(
        url.as_str(),
        "https://qvd.example.com:8443/qvd/connect_to_vm?id=1&qvd.client.geometry=1024x768&qvd.client.fullscreen=1"
    );
}

#[test]
fn test_truncated_stream_is_a_parse_error_not_a_partial_catalog() {
    let truncated = &TWO_VMS[..TWO_VMS.len() / 2];
    assert!(matches!(
        parse_vm_list(stream(truncated, 3).as_bytes()),
        Err(CatalogError::Malformed(_))
    ));
}

#[test]
fn test_auth_header_for_scenario_user() {
    let header = build_auth_header("alice", "secret").unwrap();
    assert_eq!(header.as_str(), "Basic YWxpY2U6c2VjcmV0");
}
