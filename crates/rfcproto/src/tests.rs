use std::sync::Arc;

use chrono::NaiveDate;
use chrono::NaiveTime;
use rand::Rng;
use rust_decimal::Decimal;

use rfcpack::Decoder;
use rfcpack::Encoder;

use crate::*;

// ============================================================================
//  FIXTURES
// ============================================================================

fn rfctest() -> Arc<TypeDesc> {
    Arc::new(
        TypeDesc::new("RFCTEST")
            .field("RFCFLOAT", FieldType::Float)
            .field("RFCCHAR1", FieldType::Char { length: 1 })
            .field("RFCINT4", FieldType::Int)
            .field("RFCCHAR2", FieldType::Char { length: 2 })
            .field("RFCCHAR4", FieldType::Char { length: 4 })
            .field("RFCDATE", FieldType::Date)
            .field("RFCTIME", FieldType::Time)
            .field("RFCAMOUNT", FieldType::Decimal { digits: 15, decimals: 2 }),
    )
}

fn stfc_structure() -> FunctionSignature {
    FunctionSignature::new("STFC_STRUCTURE")
        .param("IMPORTSTRUCT", Direction::Import, FieldType::Structure(rfctest()))
        .param("ECHOSTRUCT", Direction::Export, FieldType::Structure(rfctest()))
        .param("RESPTEXT", Direction::Export, FieldType::Char { length: 255 })
        .optional("RFCTABLE", Direction::Tables, FieldType::Table(rfctest()))
}

fn bad_struct() -> Structure {
    Structure::new()
        .with("XRFCCHAR1", "A")
        .with("RFCCHAR2", "BC")
        .with("RFCCHAR4", "DEFG")
}

// ============================================================================
//  1. ROUND TRIPS
// ============================================================================

#[test]
fn test_declared_fields_roundtrip() -> Result<()> {
    let row = Structure::new()
        .with("RFCCHAR4", "DEFG")
        .with("RFCAMOUNT", Decimal::new(123_456_789, 2))
        .with("RFCINT4", 42)
        .with("RFCDATE", NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    let params = Structure::new()
        .with("IMPORTSTRUCT", row.clone())
        .with("RFCTABLE", vec![row.clone(), row]);

    let bytes = encode_parameters(&params, &stfc_structure())?;
    assert_eq!(decode_parameters(&bytes)?, params);
    Ok(())
}

#[test]
fn test_time_and_float_roundtrip() -> Result<()> {
    let row = Structure::new()
        .with("RFCTIME", NaiveTime::from_hms_opt(23, 59, 1).unwrap())
        .with("RFCFLOAT", 1.5);
    let params = Structure::new().with("IMPORTSTRUCT", row);

    let bytes = encode_parameters(&params, &stfc_structure())?;
    assert_eq!(decode_parameters(&bytes)?, params);
    Ok(())
}

#[test]
fn test_random_decimals_stay_exact() -> Result<()> {
    let sig = FunctionSignature::new("Z_AMOUNT")
        .param("AMOUNT", Direction::Import, FieldType::Decimal { digits: 31, decimals: 14 });
    let mut rng = rand::thread_rng();

    for _ in 0..200 {
        let mantissa: i64 = rng.gen_range(-1_000_000_000_000..1_000_000_000_000);
        let scale: u32 = rng.gen_range(0..=14);
        let amount = Decimal::new(mantissa, scale);
        let params = Structure::new().with("AMOUNT", amount);

        let decoded = decode_parameters(&encode_parameters(&params, &sig)?)?;
        let back = decoded.get("AMOUNT").and_then(Value::as_decimal).unwrap();
        assert_eq!(back, amount);
        assert_eq!(back.scale(), amount.scale());
    }
    Ok(())
}

#[test]
fn test_int_widens_into_decimal() -> Result<()> {
    let sig = FunctionSignature::new("Z_AMOUNT")
        .param("AMOUNT", Direction::Import, FieldType::Decimal { digits: 15, decimals: 2 });
    let params = Structure::new().with("AMOUNT", 7);

    let decoded = decode_parameters(&encode_parameters(&params, &sig)?)?;
    assert_eq!(decoded.get("AMOUNT"), Some(&Value::from(Decimal::from(7))));
    Ok(())
}

// ============================================================================
//  2. NAME VALIDATION
// ============================================================================

#[test]
fn test_unknown_parameter() {
    let sig = FunctionSignature::new("STFC_CONNECTION")
        .param("REQUTEXT", Direction::Import, FieldType::Char { length: 255 });
    let params = Structure::new().with("undefined", 0);

    let err = encode_parameters(&params, &sig).unwrap_err();
    assert_eq!(err, Error::FieldNotFound("undefined".into()));

    let remote = err.to_remote();
    assert_eq!(remote.code, 20);
    assert_eq!(remote.key, "RFC_INVALID_PARAMETER");
    assert_eq!(remote.group, ErrorGroup::ExternalRuntimeFailure);
    assert_eq!(remote.message, vec!["field 'undefined' not found".to_string()]);
}

#[test]
fn test_unknown_field_in_structure() {
    let params = Structure::new().with("IMPORTSTRUCT", bad_struct());
    let err = encode_parameters(&params, &stfc_structure()).unwrap_err();
    assert_eq!(err, Error::FieldNotFound("XRFCCHAR1".into()));
}

#[test]
fn test_unknown_field_in_first_table_row() {
    let params = Structure::new().with("RFCTABLE", vec![bad_struct()]);
    let err = encode_parameters(&params, &stfc_structure()).unwrap_err();
    assert_eq!(err, Error::FieldNotFound("XRFCCHAR1".into()));
}

#[test]
fn test_first_invalid_field_wins_across_rows() {
    let good = Structure::new().with("RFCCHAR1", "A");
    let second = Structure::new().with("RFCCHAR1", "B").with("NOPE2", "x").with("NOPE3", "y");
    let third = Structure::new().with("NOPE1", "z");
    let params = Structure::new().with("RFCTABLE", vec![good, second, third]);

    let err = encode_parameters(&params, &stfc_structure()).unwrap_err();
    assert_eq!(err, Error::FieldNotFound("NOPE2".into()));
}

#[test]
fn test_input_order_not_alphabetical() {
    let row = Structure::new().with("ZZZ", "1").with("AAA", "2");
    let params = Structure::new().with("IMPORTSTRUCT", row);
    let err = encode_parameters(&params, &stfc_structure()).unwrap_err();
    assert_eq!(err, Error::FieldNotFound("ZZZ".into()));
}

// ============================================================================
//  3. TYPE VALIDATION
// ============================================================================

#[test]
fn test_text_into_int_field() {
    let params = Structure::new().with("IMPORTSTRUCT", Structure::new().with("RFCINT4", "abc"));
    let err = encode_parameters(&params, &stfc_structure()).unwrap_err();
    assert!(matches!(&err, Error::Conversion { field, found: "str", .. } if field == "RFCINT4"));
    assert_eq!(err.to_remote().code, 22);
    assert_eq!(err.to_remote().key, "RFC_CONVERSION_FAILURE");
}

#[test]
fn test_decimal_scale_is_not_rounded() {
    let row = Structure::new().with("RFCAMOUNT", Decimal::new(1234, 3));
    let params = Structure::new().with("IMPORTSTRUCT", row);
    let err = encode_parameters(&params, &stfc_structure()).unwrap_err();
    assert!(matches!(err, Error::Conversion { .. }));
}

#[test]
fn test_decimal_precision_is_enforced() -> Result<()> {
    let sig = FunctionSignature::new("Z_AMOUNT")
        .param("AMOUNT", Direction::Import, FieldType::Decimal { digits: 5, decimals: 2 });

    let fits = Structure::new().with("AMOUNT", Decimal::new(99_999, 2));
    encode_parameters(&fits, &sig)?;

    let wide = Structure::new().with("AMOUNT", Decimal::new(100_000, 2));
    let err = encode_parameters(&wide, &sig).unwrap_err();
    assert!(matches!(&err, Error::Conversion { field, .. } if field == "AMOUNT"));
    assert_eq!(err.to_remote().code, 22);

    let err = encode_parameters(&Structure::new().with("AMOUNT", 1000), &sig).unwrap_err();
    assert!(matches!(err, Error::Conversion { .. }));
    Ok(())
}

#[test]
fn test_table_where_structure_declared() {
    let params = Structure::new().with("IMPORTSTRUCT", vec![Structure::new()]);
    let err = encode_parameters(&params, &stfc_structure()).unwrap_err();
    assert!(matches!(&err, Error::Conversion { field, found: "table", .. } if field == "IMPORTSTRUCT"));
}

#[test]
fn test_numc_requires_digits() {
    let sig = FunctionSignature::new("Z_NUMC")
        .param("DOCNO", Direction::Import, FieldType::Numc { length: 10 });
    assert!(encode_parameters(&Structure::new().with("DOCNO", "0000012345"), &sig).is_ok());
    assert!(encode_parameters(&Structure::new().with("DOCNO", 12345), &sig).is_ok());
    assert!(encode_parameters(&Structure::new().with("DOCNO", "12A"), &sig).is_err());
}

// ============================================================================
//  4. SIGNATURES
// ============================================================================

#[test]
fn test_signature_wire_roundtrip() -> Result<()> {
    let sig = stfc_structure();
    let mut enc = Encoder::new();
    sig.encode(&mut enc)?;
    let bytes = enc.into_bytes()?;

    let decoded = FunctionSignature::decode(&mut Decoder::new(&bytes))?;
    assert_eq!(decoded, sig);
    assert!(decoded.get("RFCTABLE").unwrap().optional);
    assert!(!decoded.get("ECHOSTRUCT").unwrap().direction.is_input());
    Ok(())
}

// ============================================================================
//  5. FRAMES
// ============================================================================

#[test]
fn test_call_request_roundtrip() -> Result<()> {
    let params = [1u8, 2, 3];
    let bytes = Request::Call { seq: 7, function: "STFC_CONNECTION", params: &params }.to_bytes()?;

    let decoded = Request::decode(&mut Decoder::new(&bytes))?;
    assert_eq!(decoded, Request::Call { seq: 7, function: "STFC_CONNECTION", params: &params });
    assert_eq!(decode_seq(&bytes)?, 7);
    Ok(())
}

#[test]
fn test_logon_request_keeps_fields() -> Result<()> {
    let fields = vec![("USER", "DEMO"), ("CLIENT", "001")];
    let bytes = Request::Logon { seq: 1, fields: fields.clone() }.to_bytes()?;

    match Request::decode(&mut Decoder::new(&bytes))? {
        Request::Logon { seq, fields: decoded } => {
            assert_eq!(seq, 1);
            assert_eq!(decoded, fields);
        }
        other => panic!("Expected Logon, got {:?}", other),
    }
    Ok(())
}

#[test]
fn test_reply_error_roundtrip() -> Result<()> {
    let abap = AbapMessage::new("FL", "E", "046").with_vars(&["undefined"]);
    let error = RemoteError::new(ErrorGroup::AbapApplicationFailure, ReturnCode::AbapException, abap.summary())
        .with_key("FU_NOT_FOUND")
        .with_abap(abap);
    let bytes = ReplyErrEncoder::new(9, &error).to_bytes()?;

    let reply = ReplyDecoder::decode(&mut Decoder::new(&bytes))?;
    assert_eq!(reply.seq, 9);
    let decoded = reply.status.unwrap_err();
    assert_eq!(decoded, error);
    assert_eq!(decoded.message[0], "ID:FL Type:E Number:046 undefined");
    assert_eq!(decode_seq(&bytes)?, 9);
    Ok(())
}

#[test]
fn test_reply_ok_carries_body() -> Result<()> {
    let bytes = ReplyOkEncoder::new(3, b"payload").to_bytes()?;
    let reply = ReplyDecoder::decode(&mut Decoder::new(&bytes))?;
    assert_eq!(reply.seq, 3);
    assert_eq!(reply.status, Ok(&b"payload"[..]));
    Ok(())
}

#[test]
fn test_reply_decoder_rejects_requests() -> Result<()> {
    let bytes = Request::Ping { seq: 1 }.to_bytes()?;
    let err = ReplyDecoder::decode(&mut Decoder::new(&bytes)).err().unwrap();
    assert!(matches!(err, Error::UnknownVariant(_)));
    Ok(())
}

#[test]
fn test_unknown_request_tag() {
    let mut enc = Encoder::new();
    enc.field_begin("Launch").unwrap();
    enc.structure_begin().unwrap();
    enc.field_begin("seq").unwrap();
    enc.int(1).unwrap();
    enc.field_end().unwrap();
    enc.structure_end().unwrap();
    enc.field_end().unwrap();
    let bytes = enc.into_bytes().unwrap();

    let err = Request::decode(&mut Decoder::new(&bytes)).unwrap_err();
    assert!(matches!(err, Error::UnknownVariant(_)));
}
