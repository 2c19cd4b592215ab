use rfcproto::AbapMessage;
use rfcproto::ErrorGroup;
use rfcproto::RemoteError;
use rfcproto::ReturnCode;

use crate::*;

fn demo_params() -> ConnectionParameters {
    ConnectionParameters::from_pairs([
        ("ASHOST", "10.0.0.1"),
        ("SysNr", "00"),
        ("client", "001"),
        ("user", "DEMO"),
        ("passwd", "welcome"),
        ("trace", "3"),
    ])
    .unwrap()
}

// ============================================================================
//  CONFIG
// ============================================================================

#[test]
fn test_from_pairs_ignores_key_case() {
    let params = demo_params();
    assert_eq!(params.ashost.as_deref(), Some("10.0.0.1"));
    assert_eq!(params.sysnr.as_deref(), Some("00"));
    assert_eq!(params.extras.get("trace").map(String::as_str), Some("3"));
}

#[test]
fn test_from_pairs_rejects_non_numeric_timeout() {
    let err = ConnectionParameters::from_pairs([("timeout", "soon")]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalRuntime);
    assert_eq!(err.code(), Some(20));
}

#[test]
fn test_deserialize_from_json() {
    let json = r#"{"mshost": "ms.example", "sysid": "PRD", "group": "PUBLIC", "timeout": 5, "trace": "1"}"#;
    let params: ConnectionParameters = serde_json::from_str(json).unwrap();
    assert_eq!(params.timeout(), Some(std::time::Duration::from_secs(5)));
    assert_eq!(params.extras.get("trace").map(String::as_str), Some("1"));
    assert_eq!(
        params.route().unwrap(),
        Route::MessageServer {
            host: "ms.example".into(),
            service: None,
            sysid: "PRD".into(),
            group: "PUBLIC".into(),
        }
    );
}

#[test]
fn test_debug_redacts_password() {
    let rendered = format!("{:?}", demo_params());
    assert!(!rendered.contains("welcome"));
    assert!(rendered.contains("***"));
    assert!(rendered.contains("DEMO"));
}

#[test]
fn test_empty_parameters_are_a_usage_error() {
    let err = ConnectionParameters::new().route().unwrap_err();
    assert_eq!(err, Error::Rfc(RfcError::ParametersMissing));
    assert_eq!(err.message(), "Connection parameters missing");
    assert_eq!(err.code(), None);
}

#[test]
fn test_missing_routing_group() {
    let params = ConnectionParameters::from_pairs([("client", "001"), ("user", "DEMO")]).unwrap();
    let err = params.route().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalRuntime);
    assert_eq!(err.code(), Some(20));
    assert_eq!(err.key(), Some("RFC_INVALID_PARAMETER"));
    assert_eq!(err.message(), "Parameter ASHOST, GWHOST, MSHOST or SERVER_PORT is missing.");
}

#[test]
fn test_incomplete_routing_groups_name_missing_fields() {
    let cases = [
        (vec![("ashost", "h")], "Parameter SYSNR is missing."),
        (vec![("mshost", "h")], "Parameter SYSID, GROUP is missing."),
        (vec![("mshost", "h"), ("sysid", "PRD")], "Parameter GROUP is missing."),
        (vec![("gwhost", "h")], "Parameter GWSERV is missing."),
    ];
    for (pairs, expected) in cases {
        let err = ConnectionParameters::from_pairs(pairs).unwrap().route().unwrap_err();
        assert_eq!(err.code(), Some(20));
        assert_eq!(err.message(), expected);
    }
}

#[test]
fn test_application_server_takes_precedence() {
    let params = demo_params().with("gwhost", "gw").unwrap().with("gwserv", "sapgw01").unwrap();
    assert_eq!(
        params.route().unwrap(),
        Route::Application { host: "10.0.0.1".into(), sysnr: "00".into() }
    );
}

#[test]
fn test_logon_fields_are_upper_case_without_transport_settings() {
    let params = demo_params().with("timeout", "3").unwrap();
    let fields = params.logon_fields();
    assert!(fields.contains(&("USER".to_string(), "DEMO".to_string())));
    assert!(fields.contains(&("TRACE".to_string(), "3".to_string())));
    assert!(fields.iter().all(|(k, _)| k != "TIMEOUT"));
}

// ============================================================================
//  TCP ENDPOINTS
// ============================================================================

#[test]
fn test_endpoint_ports() {
    let params = demo_params();
    let route = params.route().unwrap();
    assert_eq!(TcpConnector::endpoint(&route, &params).unwrap(), ("10.0.0.1".into(), 3300));

    let gateway = Route::Gateway { host: "gw".into(), service: "sapgw07".into() };
    assert_eq!(TcpConnector::endpoint(&gateway, &params).unwrap().1, 3307);

    let numeric = Route::Gateway { host: "gw".into(), service: "4711".into() };
    assert_eq!(TcpConnector::endpoint(&numeric, &params).unwrap().1, 4711);

    let pinned = params.clone().with("server_port", "9999").unwrap();
    assert_eq!(TcpConnector::endpoint(&route, &pinned).unwrap().1, 9999);

    let bogus = Route::Gateway { host: "gw".into(), service: "gateway".into() };
    assert!(TcpConnector::endpoint(&bogus, &params).is_err());
}

// ============================================================================
//  CLASSIFICATION
// ============================================================================

#[test]
fn test_groups_map_to_kinds() {
    let cases = [
        (ErrorGroup::AbapApplicationFailure, ErrorKind::AbapApplication),
        (ErrorGroup::LogonFailure, ErrorKind::Logon),
        (ErrorGroup::CommunicationFailure, ErrorKind::Communication),
        (ErrorGroup::ExternalRuntimeFailure, ErrorKind::ExternalRuntime),
        (ErrorGroup::AbapRuntimeFailure, ErrorKind::Rfc),
        (ErrorGroup::ExternalApplicationFailure, ErrorKind::Rfc),
        (ErrorGroup::ExternalAuthorizationFailure, ErrorKind::Rfc),
        (ErrorGroup::Other(99), ErrorKind::Rfc),
    ];
    for (group, kind) in cases {
        let err = Error::from(RemoteError::new(group, ReturnCode::UnknownError, "boom"));
        assert_eq!(err.kind(), kind, "group {:?}", group);
        assert_eq!(err.code(), Some(28));
        assert_eq!(err.key(), Some("RFC_UNKNOWN_ERROR"));
        assert!(!err.is_usage());
    }
}

#[test]
fn test_unclassified_keeps_remote_record() {
    let abap = AbapMessage::new("ZZ", "E", "001");
    let remote = RemoteError::new(ErrorGroup::Other(42), ReturnCode::ExternalFailure, "partner said no")
        .with_key("Z_REFUSED")
        .with_abap(abap.clone());
    match Error::from(remote) {
        Error::Rfc(RfcError::Unclassified { group, info }) => {
            assert_eq!(group, ErrorGroup::Other(42));
            assert_eq!(info.code, 15);
            assert_eq!(info.key, "Z_REFUSED");
            assert_eq!(info.message, vec!["partner said no".to_string()]);
            assert_eq!(info.abap, Some(abap));
        }
        other => panic!("Expected unclassified error, got {:?}", other),
    }
}

#[test]
fn test_transport_failures_are_communication_errors() {
    let err = Error::from(TransportError::Unreachable("refused".into()));
    assert_eq!(err.kind(), ErrorKind::Communication);
    assert_eq!(err.key(), Some("RFC_COMMUNICATION_FAILURE"));

    let err = Error::from(TransportError::Timeout(std::time::Duration::from_secs(1)));
    assert_eq!(err.kind(), ErrorKind::Communication);
    assert_eq!(err.code(), Some(8));
}

#[test]
fn test_invalid_function_name_payload() {
    let err = Error::Rfc(RfcError::InvalidFunctionName { value: Value::from(1) });
    assert!(err.is_usage());
    match &err {
        Error::Rfc(rfc) => assert_eq!(
            rfc.args(),
            vec![
                "Remote function module name must be unicode string, received:".to_string(),
                "1".to_string(),
                "int".to_string(),
            ]
        ),
        other => panic!("Expected usage error, got {:?}", other),
    }
}
