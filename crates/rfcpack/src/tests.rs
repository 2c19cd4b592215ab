use crate::*;

// ============================================================================
//  SCALARS
// ============================================================================

#[test]
fn test_bool_and_int() -> Result<()> {
    let mut enc = Encoder::new();
    enc.bool(true)?;
    enc.bool(false)?;
    enc.int(i64::MIN)?;
    enc.int(42)?;

    let bytes = enc.into_bytes()?;
    let mut dec = Decoder::new(&bytes);

    assert!(dec.bool()?);
    assert!(!dec.bool()?);
    assert_eq!(dec.int()?, i64::MIN);
    assert_eq!(dec.int()?, 42);
    assert_eq!(dec.remaining(), 0);
    Ok(())
}

#[test]
fn test_decimal_keeps_mantissa_and_scale() -> Result<()> {
    let mut enc = Encoder::new();
    // 1234567890123456789.0123456789
    enc.decimal(12345678901234567890123456789, 10)?;
    enc.decimal(-5, 0)?;

    let bytes = enc.into_bytes()?;
    let mut dec = Decoder::new(&bytes);

    assert_eq!(dec.decimal()?, (12345678901234567890123456789, 10));
    assert_eq!(dec.decimal()?, (-5, 0));
    Ok(())
}

#[test]
fn test_calendar_scalars() -> Result<()> {
    let mut enc = Encoder::new();
    enc.date(2024_02_29)?;
    enc.time(23 * 3600 + 59 * 60 + 59)?;

    let bytes = enc.into_bytes()?;
    let mut dec = Decoder::new(&bytes);

    assert_eq!(dec.date()?, 2024_02_29);
    assert_eq!(dec.time()?, 86_399);
    Ok(())
}

#[test]
fn test_calendar_out_of_range() {
    let mut enc = Encoder::new();
    assert_eq!(enc.time(86_400), Err(Error::InvalidCalendar(86_400)));
    assert_eq!(enc.date(1_0000_01_01), Err(Error::InvalidCalendar(1_0000_01_01)));
}

#[test]
fn test_text_and_bytes() -> Result<()> {
    let mut enc = Encoder::new();
    enc.text("Grüße 🦀")?;
    enc.text("")?;
    enc.bytes(&[0xDE, 0xAD, 0xBE])?;

    let bytes = enc.into_bytes()?;
    let mut dec = Decoder::new(&bytes);

    assert_eq!(dec.text()?, "Grüße 🦀");
    assert_eq!(dec.text()?, "");
    assert_eq!(dec.bytes()?, &[0xDE, 0xAD, 0xBE]);
    Ok(())
}

// ============================================================================
//  CONTAINERS
// ============================================================================

#[test]
fn test_structure_preserves_field_order() -> Result<()> {
    let mut enc = Encoder::new();
    enc.structure_begin()?;
    for (name, v) in [("ZETA", 1), ("ALPHA", 2), ("MID", 3)] {
        enc.field_begin(name)?;
        enc.int(v)?;
        enc.field_end()?;
    }
    enc.structure_end()?;

    let bytes = enc.into_bytes()?;
    let mut dec = Decoder::new(&bytes);
    let mut fields = dec.structure()?;

    let mut seen = Vec::new();
    while let Some((name, mut val)) = fields.next()? {
        seen.push((name, val.int()?));
    }
    assert_eq!(seen, vec![("ZETA", 1), ("ALPHA", 2), ("MID", 3)]);
    Ok(())
}

#[test]
fn test_table_of_structures() -> Result<()> {
    let mut enc = Encoder::new();
    enc.list_begin()?;
    for row in ["A", "B"] {
        enc.structure_begin()?;
        enc.field_begin("RFCCHAR1")?;
        enc.text(row)?;
        enc.field_end()?;
        enc.structure_end()?;
    }
    enc.list_end()?;

    let bytes = enc.into_bytes()?;
    let mut dec = Decoder::new(&bytes);
    let mut rows = dec.list()?;

    let mut values = Vec::new();
    while let Some(mut row) = rows.next()? {
        let mut fields = row.structure()?;
        let (name, mut val) = fields.next()?.expect("one field");
        assert_eq!(name, "RFCCHAR1");
        values.push(val.text()?.to_string());
        assert!(fields.next()?.is_none());
    }
    assert_eq!(values, vec!["A", "B"]);
    Ok(())
}

#[test]
fn test_result_sides() -> Result<()> {
    let mut enc = Encoder::new();
    enc.result_ok_begin()?;
    enc.int(1)?;
    enc.result_ok_end()?;
    enc.result_err_begin()?;
    enc.text("boom")?;
    enc.result_err_end()?;

    let bytes = enc.into_bytes()?;
    let mut dec = Decoder::new(&bytes);

    match dec.result()? {
        Ok(mut ok) => assert_eq!(ok.int()?, 1),
        Err(_) => panic!("Expected Ok"),
    }
    match dec.result()? {
        Err(mut err) => assert_eq!(err.text()?, "boom"),
        Ok(_) => panic!("Expected Err"),
    }
    Ok(())
}

#[test]
fn test_skip_nested() -> Result<()> {
    let mut enc = Encoder::new();
    enc.structure_begin()?;
    enc.field_begin("T")?;
    enc.list_begin()?;
    enc.decimal(1, 1)?;
    enc.date(2000_01_01)?;
    enc.list_end()?;
    enc.field_end()?;
    enc.structure_end()?;
    enc.int(7)?;

    let bytes = enc.into_bytes()?;
    let mut dec = Decoder::new(&bytes);
    dec.skip()?;
    assert_eq!(dec.int()?, 7);
    Ok(())
}

// ============================================================================
//  ENCODER STRICTNESS
// ============================================================================

#[test]
fn test_structure_rejects_bare_scalar() {
    let mut enc = Encoder::new();
    enc.structure_begin().unwrap();
    assert_eq!(enc.int(1), Err(Error::InvalidStructureEntry));
}

#[test]
fn test_field_requires_payload() {
    let mut enc = Encoder::new();
    enc.field_begin("EMPTY").unwrap();
    assert_eq!(enc.field_end(), Err(Error::EmptyScope(Scope::Field)));
}

#[test]
fn test_field_rejects_second_payload() {
    let mut enc = Encoder::new();
    enc.field_begin("F").unwrap();
    enc.int(1).unwrap();
    assert_eq!(enc.int(2), Err(Error::TooManyItems(Scope::Field)));
}

#[test]
fn test_scope_mismatch_and_underflow() {
    let mut enc = Encoder::new();
    assert_eq!(enc.list_end(), Err(Error::ScopeUnderflow));
    enc.list_begin().unwrap();
    assert_eq!(
        enc.structure_end(),
        Err(Error::ScopeMismatch { expected: Scope::Structure, actual: Scope::List })
    );
    // the list is still open after the failed close
    assert!(matches!(enc.into_bytes(), Err(Error::ScopeStillOpen)));
}

// ============================================================================
//  DECODER FAILURE MODES
// ============================================================================

#[test]
fn test_truncated_body() {
    let mut enc = Encoder::new();
    enc.text("hello").unwrap();
    let bytes = enc.into_bytes().unwrap();

    let mut dec = Decoder::new(&bytes[..bytes.len() - 2]);
    assert_eq!(dec.text(), Err(Error::UnexpectedEnd));
}

#[test]
fn test_invalid_tag_byte() {
    let mut dec = Decoder::new(&[0xFF]);
    assert_eq!(dec.peek_tag(), Err(Error::InvalidTag(0xFF)));
}

#[test]
fn test_wrong_tag_is_reported() {
    let mut enc = Encoder::new();
    enc.int(3).unwrap();
    let bytes = enc.into_bytes().unwrap();

    let mut dec = Decoder::new(&bytes);
    assert_eq!(
        dec.text(),
        Err(Error::UnexpectedTag { expected: Tag::Text, found: Tag::Int })
    );
}

#[test]
fn test_invalid_utf8_text() {
    // Text tag, length 2, invalid sequence
    let bytes = [0x10, 2, 0, 0, 0, 0xC3, 0x28];
    let mut dec = Decoder::new(&bytes);
    assert_eq!(dec.text(), Err(Error::InvalidUtf8));
}
