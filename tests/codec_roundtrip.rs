use sheet_mend::codec::{self, RowSet};

fn sample() -> RowSet {
    RowSet::new(
        vec!["id".into(), "name".into(), "curp".into()],
        vec![
            vec!["1".into(), "Ana Luisa".into(), "AAAA000101".into()],
            vec!["2".into(), "comma, inside".into(), "BBBB990230".into()],
            vec!["3".into(), "\"quoted\"".into(), "CCCC850615".into()],
        ],
    )
}

#[test]
fn csv_round_trip_preserves_everything() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("rows.csv");

    let original = sample();
    codec::encode(&original, &path).unwrap();
    let decoded = codec::decode(&path).unwrap();

    assert_eq!(decoded, original);
}

#[test]
fn xlsx_round_trip_preserves_everything() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("rows.xlsx");

    let original = sample();
    codec::encode(&original, &path).unwrap();
    let decoded = codec::decode(&path).unwrap();

    assert_eq!(decoded, original);
}

#[test]
fn column_order_is_stable() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("cols.csv");

    let original = RowSet::new(
        vec!["zeta".into(), "alpha".into(), "mid".into()],
        vec![vec!["3".into(), "1".into(), "2".into()]],
    );
    codec::encode(&original, &path).unwrap();
    let decoded = codec::decode(&path).unwrap();

    assert_eq!(decoded.headers, vec!["zeta", "alpha", "mid"]);
    assert_eq!(decoded.rows[0], vec!["3", "1", "2"]);
}

#[test]
fn decode_missing_file_errors() {
    let tmp = tempfile::tempdir().unwrap();
    assert!(codec::decode(&tmp.path().join("absent.csv")).is_err());
    assert!(codec::decode(&tmp.path().join("absent.xlsx")).is_err());
}

#[test]
fn decode_garbage_spreadsheet_errors() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("garbage.xlsx");
    std::fs::write(&path, b"this is not a workbook").unwrap();
    assert!(codec::decode(&path).is_err());
}

#[test]
fn unsupported_encode_extension_errors() {
    let tmp = tempfile::tempdir().unwrap();
    assert!(codec::encode(&sample(), &tmp.path().join("rows.parquet")).is_err());
}
