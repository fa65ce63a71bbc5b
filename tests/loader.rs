mod common;

use std::path::Path;

use common::{TestWorkspace, csv_text};
use encoding_rs::Encoding;
use key_matcher::{
    loader::{self, FileLoader, LoadError, LoadOptions, TableLoader},
    table::Cell,
};

#[test]
fn csv_header_defines_column_order() {
    let ws = TestWorkspace::new();
    let path = ws.write(
        "orders.csv",
        &csv_text(&[&["order_id", "customer", "amount"], &["1", "ACME", "9.5"], &["2", "", "3"]]),
    );

    let table = loader::load(&path, &LoadOptions::default()).expect("load csv");

    assert_eq!(table.column_names(), vec!["order_id", "customer", "amount"]);
    assert_eq!(table.column_names(), table.column_names());
    assert_eq!(table.row_count(), 2);
    assert!(table.has_column("customer"));
    assert!(!table.has_column("Customer"));
    let customer = table.column("customer").unwrap();
    assert_eq!(customer.cells, vec![Cell::Text("ACME".into()), Cell::Missing]);
    assert_eq!(table.column("amount").unwrap().cells[0], Cell::Number(9.5));
}

#[test]
fn uppercase_extension_is_recognized() {
    let ws = TestWorkspace::new();
    let path = ws.write("LEGACY.CSV", "id\n1\n");
    let table = loader::load(&path, &LoadOptions::default()).expect("load uppercase csv");
    assert_eq!(table.column_names(), vec!["id"]);
}

#[test]
fn txt_extension_is_unsupported_even_if_file_is_missing() {
    let err = loader::load(Path::new("/definitely/not/here.txt"), &LoadOptions::default())
        .expect_err("txt should be rejected");
    match err {
        LoadError::UnsupportedFormat { extension, .. } => assert_eq!(extension, "txt"),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn ragged_csv_fails_without_partial_table() {
    let ws = TestWorkspace::new();
    let path = ws.write("ragged.csv", "a,b\n1,2\n3\n");
    let err = loader::load(&path, &LoadOptions::default()).expect_err("ragged rows");
    match err {
        LoadError::LoadFailure { message, .. } => assert!(message.contains("Row 3"), "{message}"),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn empty_csv_is_a_load_failure() {
    let ws = TestWorkspace::new();
    let path = ws.write("empty.csv", "");
    assert!(matches!(
        loader::load(&path, &LoadOptions::default()),
        Err(LoadError::LoadFailure { .. })
    ));
}

#[test]
fn missing_csv_is_a_load_failure() {
    let ws = TestWorkspace::new();
    let path = ws.path().join("absent.csv");
    assert!(matches!(
        loader::load(&path, &LoadOptions::default()),
        Err(LoadError::LoadFailure { .. })
    ));
}

#[test]
fn custom_delimiter_and_encoding_are_honoured() {
    let ws = TestWorkspace::new();
    let mut bytes = b"name;city\n".to_vec();
    bytes.extend_from_slice(&[b'Z', b'o', 0xeb, b';', b'P', b'a', b'r', b'i', b's', b'\n']);
    let path = ws.write_bytes("latin.csv", &bytes);
    let options = LoadOptions {
        delimiter: b';',
        encoding: Encoding::for_label(b"latin1").unwrap(),
    };

    let table = loader::load(&path, &options).expect("load latin1");

    assert_eq!(table.column_names(), vec!["name", "city"]);
    assert_eq!(table.column("name").unwrap().cells[0], Cell::Text("Zoë".into()));
}

#[test]
fn xlsx_first_sheet_is_loaded() {
    let ws = TestWorkspace::new();
    let path = ws.write_xlsx(
        "customers.xlsx",
        &[
            &["customer_id", "name", "region"],
            &["100", "Ann & Co", "north"],
            &["101", "", "south"],
            &["102", "Bea", ""],
        ],
    );

    let table = loader::load(&path, &LoadOptions::default()).expect("load xlsx");

    assert_eq!(table.column_names(), vec!["customer_id", "name", "region"]);
    assert_eq!(table.row_count(), 3);
    let ids = &table.column("customer_id").unwrap().cells;
    assert_eq!(ids, &vec![Cell::Number(100.0), Cell::Number(101.0), Cell::Number(102.0)]);
    let names = &table.column("name").unwrap().cells;
    assert_eq!(names[0], Cell::Text("Ann & Co".into()));
    assert_eq!(names[1], Cell::Missing);
    assert_eq!(table.column("region").unwrap().cells[2], Cell::Missing);
}

#[test]
fn corrupt_xlsx_reports_parse_error_text() {
    let ws = TestWorkspace::new();
    let path = ws.write("broken.xlsx", "this is not a zip archive");
    match loader::load(&path, &LoadOptions::default()) {
        Err(LoadError::LoadFailure { message, .. }) => assert!(!message.is_empty()),
        other => panic!("unexpected result {other:?}"),
    }
}

#[test]
fn file_loader_resolves_relative_identifiers() {
    let ws = TestWorkspace::new();
    ws.write("a.csv", "k\nx\n");
    let loader = FileLoader::default().with_base_dir(ws.path());
    let table = loader.load_table("a.csv").expect("load via base dir");
    assert_eq!(table.column_names(), vec!["k"]);
    assert!(loader.load_table("b.csv").is_err());
}

#[test]
fn xlsx_cell_reference_beyond_sheet_limits_is_a_load_failure() {
    let ws = TestWorkspace::new();
    let path = ws.write_xlsx_sheet(
        "hostile.xlsx",
        r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>id</t></is></c></row><row r="2"><c r="A900000000000"><v>1</v></c></row></sheetData></worksheet>"#,
    );

    match loader::load(&path, &LoadOptions::default()) {
        Err(LoadError::LoadFailure { message, .. }) => {
            assert!(message.contains("A900000000000"), "{message}")
        }
        other => panic!("unexpected result {other:?}"),
    }
}

#[test]
fn xlsx_data_under_blank_header_is_kept() {
    let ws = TestWorkspace::new();
    let path = ws.write_xlsx("headless.xlsx", &[&["id"], &["1", "x"], &["2", "y"]]);

    let table = loader::load(&path, &LoadOptions::default()).expect("load xlsx");

    assert_eq!(table.column_names(), vec!["id", "Unnamed: 1"]);
    assert_eq!(
        table.column("Unnamed: 1").unwrap().cells,
        vec![Cell::Text("x".into()), Cell::Text("y".into())]
    );
}
