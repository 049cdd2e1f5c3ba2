//! Integration Tests
//!
//! 表データの読み込みから文書生成、一括変換までの一連の流れをテストします。
//! PDF変換はLibreOfficeを使わず、`.docx`を`.pdf`という名前で複製する変換器で代用します。

use chrono::{NaiveDate, NaiveDateTime};
use docxmerge::{
    resolve_row, FieldMapping, GeneratorBuilder, MergeError, MergeSession, Selector,
    SessionState, SheetSelector,
};
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

mod fixtures {
    use rust_xlsxwriter::{Workbook, XlsxError};
    use std::io::{Cursor, Write};
    use zip::write::{FileOptions, ZipWriter};
    use zip::CompressionMethod;

    /// 顧客一覧のワークブック（"Customers"シートと"Archive"シート）
    pub fn customers_xlsx() -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();

        let archive = workbook.add_worksheet();
        archive.set_name("Archive")?;
        archive.write_string(0, 0, "Name")?;
        archive.write_string(1, 0, "Old Corp")?;

        let sheet = workbook.add_worksheet();
        sheet.set_name("Customers")?;
        sheet.write_string(0, 0, "Name")?;
        sheet.write_string(0, 1, "Amount")?;
        sheet.write_string(0, 2, "City")?;

        sheet.write_string(1, 0, "Acme")?;
        sheet.write_number(1, 1, 100.0)?;
        sheet.write_string(1, 2, "Berlin")?;

        sheet.write_string(2, 0, "Globex")?;
        sheet.write_number(2, 1, 250.5)?;
        sheet.write_string(2, 2, "Paris")?;

        // 使用禁止文字を含む名前、都市は空
        sheet.write_string(3, 0, "Initech/Co")?;
        sheet.write_number(3, 1, 7.0)?;

        Ok(workbook.save_to_buffer()?)
    }

    /// 本文に複合フィールドと単純フィールド、ヘッダーに単純フィールドを持つテンプレート
    pub fn contract_docx() -> Vec<u8> {
        let document = concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#,
            r#"<w:p><w:r><w:t xml:space="preserve">Contract for </w:t></w:r>"#,
            r#"<w:r><w:fldChar w:fldCharType="begin"/></w:r>"#,
            r#"<w:r><w:instrText xml:space="preserve"> MERGEFIELD Customer \* MERGEFORMAT </w:instrText></w:r>"#,
            r#"<w:r><w:fldChar w:fldCharType="separate"/></w:r>"#,
            r#"<w:r><w:rPr><w:b/></w:rPr><w:t>«Customer»</w:t></w:r>"#,
            r#"<w:r><w:fldChar w:fldCharType="end"/></w:r></w:p>"#,
            r#"<w:p><w:fldSimple w:instr=" MERGEFIELD Amount "><w:r><w:t>«Amount»</w:t></w:r></w:fldSimple>"#,
            r#"<w:r><w:t xml:space="preserve"> EUR, </w:t></w:r>"#,
            r#"<w:fldSimple w:instr=" MERGEFIELD City "><w:r><w:t>«City»</w:t></w:r></w:fldSimple></w:p>"#,
            r#"<w:p><w:fldSimple w:instr=" MERGEFIELD Note "><w:r><w:t>«Note»</w:t></w:r></w:fldSimple></w:p>"#,
            r#"<w:p><w:fldSimple w:instr=" MERGEFIELD Date "><w:r><w:t>«Date»</w:t></w:r></w:fldSimple></w:p>"#,
            r#"<w:sectPr/></w:body></w:document>"#,
        );
        let header = concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<w:hdr xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
            r#"<w:p><w:fldSimple w:instr=" MERGEFIELD Customer "><w:r><w:t>«Customer»</w:t></w:r></w:fldSimple></w:p>"#,
            r#"</w:hdr>"#,
        );
        let settings = concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<w:settings xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
            r#"<w:mailMerge><w:mainDocumentType w:val="formLetters"/></w:mailMerge>"#,
            r#"<w:zoom w:percent="100"/></w:settings>"#,
        );

        let mut zip_data = Vec::new();
        {
            let mut zip = ZipWriter::new(Cursor::new(&mut zip_data));
            let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
            for (name, content) in [
                ("[Content_Types].xml", "<Types/>"),
                ("word/document.xml", document),
                ("word/header1.xml", header),
                ("word/settings.xml", settings),
            ] {
                zip.start_file(name, options).unwrap();
                zip.write_all(content.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        zip_data
    }
}

fn fixed_clock() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// `.docx`を`.pdf`という名前で複製する変換器
fn copy_converter(source: &Path, dest: &Path) -> Result<(), MergeError> {
    for entry in fs::read_dir(source)? {
        let path = entry?.path();
        let target = dest.join(path.file_name().unwrap()).with_extension("pdf");
        fs::copy(&path, target)?;
    }
    Ok(())
}

fn failing_converter(_source: &Path, _dest: &Path) -> Result<(), MergeError> {
    Err(MergeError::Conversion("soffice exited with 1".to_string()))
}

/// ZIP内のパートを文字列として読み出す
fn read_part(docx: &Path, name: &str) -> String {
    let bytes = fs::read(docx).unwrap();
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut text = String::new();
    archive.by_name(name).unwrap().read_to_string(&mut text).unwrap();
    text
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// 入力ファイルを一時ディレクトリに書き出し、読み込み済みのセッションを返す
fn loaded_session() -> (TempDir, PathBuf, MergeSession) {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("contract.docx");
    let data = dir.path().join("customers.xlsx");
    let output = dir.path().join("out");
    fs::write(&template, fixtures::contract_docx()).unwrap();
    fs::File::create(&data)
        .unwrap()
        .write_all(&fixtures::customers_xlsx().unwrap())
        .unwrap();
    fs::create_dir(&output).unwrap();

    let mut session = MergeSession::new();
    session
        .select_template(&template)
        .select_dataset(&data)
        .select_output_dir(&output)
        .select_sheet(SheetSelector::Name("Customers".to_string()));
    session.load().unwrap();
    (dir, output, session)
}

#[test]
fn test_load_discovers_fields_and_defaults() {
    let (_dir, _output, session) = loaded_session();

    assert_eq!(session.state(), SessionState::Loaded);
    let template = session.template().unwrap();
    assert_eq!(
        template.merge_fields(),
        &["Amount", "City", "Customer", "Date", "Note"]
    );

    let dataset = session.dataset().unwrap();
    assert_eq!(dataset.len(), 3);
    assert_eq!(dataset.source_name(), "customers.xlsx");

    // 一致する列があればその列、"Date"は現在日付、それ以外は先頭の列
    let mapping = session.mapping();
    assert_eq!(mapping.get("Amount"), Some(&Selector::Column("Amount".into())));
    assert_eq!(mapping.get("City"), Some(&Selector::Column("City".into())));
    assert_eq!(mapping.get("Customer"), Some(&Selector::Column("Name".into())));
    assert_eq!(mapping.get("Date"), Some(&Selector::CurrentDate));
    assert_eq!(mapping.get("Note"), Some(&Selector::Column("Name".into())));
}

#[test]
fn test_generate_with_filename_template() {
    let (_dir, output, mut session) = loaded_session();
    session.set_selector("Note", Selector::LeaveEmpty).unwrap();

    let mut ticks: Vec<(usize, usize, String)> = Vec::new();
    let report = {
        let mut sink = |value: usize, max: usize, label: &str| {
            ticks.push((value, max, label.to_string()));
        };
        let builder = GeneratorBuilder::new()
            .with_filename_template("{Name} contract")
            .with_clock(fixed_clock);
        session.generate(builder, &copy_converter, &mut sink).unwrap()
    };

    assert_eq!(session.state(), SessionState::Done);
    assert_eq!(report.rows, 3);

    let expected = vec![
        "250101 - Acme contract - 0000000000000.pdf",
        "250101 - Globex contract - 0000000000001.pdf",
        "250101 - InitechCo contract - 0000000000002.pdf",
    ];
    let reported: Vec<String> = report
        .files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(reported, expected);
    assert!(report.files.iter().all(|p| p.parent() == Some(output.as_path())));

    // 一時ディレクトリは削除されている
    assert_eq!(file_names(&output), expected);
    assert!(!output.join(".temp").exists());

    // 進捗は1から2N+1まで
    assert_eq!(ticks.len(), 7);
    for (i, (value, max, _)) in ticks.iter().enumerate() {
        assert_eq!(*value, i + 1);
        assert_eq!(*max, 7);
    }
    assert_eq!(
        ticks[0].2,
        "Starting to create Word File for 250101 - Acme contract - 0000000000000.docx..."
    );
    assert_eq!(
        ticks[1].2,
        "Created Word File for 250101 - Acme contract - 0000000000000.docx..."
    );
    assert_eq!(ticks[6].2, "PDF Files created Successfully");
}

#[test]
fn test_generated_documents_contain_row_values() {
    let (_dir, output, mut session) = loaded_session();
    session.set_selector("Note", Selector::LeaveEmpty).unwrap();

    let builder = GeneratorBuilder::new()
        .with_filename_template("{Name}")
        .with_clock(fixed_clock);
    let report = session.generate(builder, &copy_converter, &mut ()).unwrap();

    let first = read_part(&report.files[0], "word/document.xml");
    assert!(first.contains("Acme"));
    assert!(first.contains(">100<"));
    assert!(first.contains("Berlin"));
    assert!(first.contains("01/01/2025"));
    assert!(!first.contains("MERGEFIELD"));
    assert!(!first.contains('«'));
    // 書式（太字）は保持される
    assert!(first.contains("<w:b/>"));

    let header = read_part(&report.files[0], "word/header1.xml");
    assert!(header.contains("Acme"));
    assert!(!header.contains("MERGEFIELD"));

    let settings = read_part(&report.files[0], "word/settings.xml");
    assert!(!settings.contains("mailMerge"));
    assert!(settings.contains("w:zoom"));

    let second = read_part(&report.files[1], "word/document.xml");
    assert!(second.contains("Globex"));
    assert!(second.contains("250.5"));
    assert!(!second.contains("Acme"));

    // 空のセルは空文字列になる
    let third = read_part(&report.files[2], "word/document.xml");
    assert!(third.contains("Initech/Co"));
    assert!(!third.contains("Berlin"));
    assert!(!third.contains("Paris"));

    assert_eq!(file_names(&output).len(), 3);
}

#[test]
fn test_generate_with_default_filenames() {
    let (_dir, output, mut session) = loaded_session();

    let builder = GeneratorBuilder::new().with_clock(fixed_clock);
    let report = session.generate(builder, &copy_converter, &mut ()).unwrap();

    assert_eq!(
        file_names(&output),
        vec![
            "250101 - Autocreation for customers.xlsx - 0000000000000.pdf",
            "250101 - Autocreation for customers.xlsx - 0000000000001.pdf",
            "250101 - Autocreation for customers.xlsx - 0000000000002.pdf",
        ]
    );
    assert_eq!(report.files.len(), 3);
}

#[test]
fn test_unknown_column_writes_nothing() {
    let (_dir, output, mut session) = loaded_session();

    let mut ticks = 0;
    let result = {
        let mut sink = |_: usize, _: usize, _: &str| ticks += 1;
        let builder = GeneratorBuilder::new().with_filename_template("{Unknown} - {Name}");
        session.generate(builder, &copy_converter, &mut sink)
    };

    match result {
        Err(MergeError::Validation(msg)) => {
            assert!(msg.starts_with("Unknown column: {Unknown}\n"));
            assert!(msg.ends_with("\n\n See Help for more information."));
        }
        other => panic!("Expected Validation error, got {:?}", other),
    }
    assert_eq!(ticks, 0);
    assert!(file_names(&output).is_empty());
    assert_eq!(session.state(), SessionState::Loaded);
}

#[test]
fn test_leave_empty_resolves_every_row_to_empty() {
    let (_dir, _output, mut session) = loaded_session();
    session.set_selector("City", Selector::LeaveEmpty).unwrap();

    let dataset = session.dataset().unwrap();
    for row in 0..dataset.len() {
        let values = resolve_row(row, session.mapping(), dataset, "01/01/2025");
        assert_eq!(values["City"], "");
        assert_eq!(values["Date"], "01/01/2025");
    }
}

#[test]
fn test_conversion_failure_keeps_scratch_dir() {
    let (_dir, output, mut session) = loaded_session();

    let builder = GeneratorBuilder::new()
        .with_filename_template("{Name}")
        .with_clock(fixed_clock);
    match session.generate(builder, &failing_converter, &mut ()) {
        Err(MergeError::Conversion(msg)) => assert!(msg.contains("exited")),
        other => panic!("Expected Conversion error, got {:?}", other),
    }

    assert_eq!(session.state(), SessionState::Loaded);
    let scratch = output.join(".temp");
    assert_eq!(file_names(&scratch).len(), 3);
    assert_eq!(file_names(&output), vec![".temp"]);

    // 状態が戻っているので再実行できる
    let builder = GeneratorBuilder::new()
        .with_filename_template("{Name}")
        .with_clock(fixed_clock);
    session.generate(builder, &copy_converter, &mut ()).unwrap();
    assert!(!scratch.exists());
    assert_eq!(session.state(), SessionState::Done);
}

#[test]
fn test_timezone_date_format_is_rejected_before_writing() {
    let (_dir, output, mut session) = loaded_session();

    let builder = GeneratorBuilder::new().with_field_date_format("%d/%m/%Y %z");
    match session.generate(builder, &copy_converter, &mut ()) {
        Err(MergeError::Config(msg)) => assert!(msg.contains("%z")),
        other => panic!("Expected Config error, got {:?}", other),
    }
    assert!(file_names(&output).is_empty());
    assert_eq!(session.state(), SessionState::Loaded);
}

#[test]
fn test_existing_scratch_dir_is_reused_and_removed() {
    let (_dir, output, mut session) = loaded_session();
    let scratch = output.join(".temp");
    fs::create_dir(&scratch).unwrap();
    fs::write(scratch.join("leftover.docx"), fixtures::contract_docx()).unwrap();

    let builder = GeneratorBuilder::new()
        .with_filename_template("{Name}")
        .with_clock(fixed_clock);
    let report = session.generate(builder, &copy_converter, &mut ()).unwrap();

    // 残っていた文書も変換される（報告には含まれない）
    assert_eq!(report.files.len(), 3);
    assert!(output.join("leftover.pdf").exists());
    assert_eq!(file_names(&output).len(), 4);
    assert!(!scratch.exists());
}

#[test]
fn test_custom_scratch_dir_and_date_formats() {
    let (_dir, output, mut session) = loaded_session();

    let builder = GeneratorBuilder::new()
        .with_filename_template("{Name}")
        .with_scratch_dir_name("work")
        .with_field_date_format("%Y-%m-%d")
        .with_file_date_format("%Y%m%d")
        .with_clock(fixed_clock);
    let report = session.generate(builder, &copy_converter, &mut ()).unwrap();

    assert_eq!(
        report.files[0].file_name().unwrap(),
        "20250101 - Acme - 0000000000000.pdf"
    );
    assert!(read_part(&report.files[0], "word/document.xml").contains("2025-01-01"));
    assert!(!output.join("work").exists());
}

#[test]
fn test_missing_inputs() {
    let mut session = MergeSession::new();
    match session.load() {
        Err(MergeError::MissingInput(msg)) => assert_eq!(msg, "Please select Word and Excel files!"),
        other => panic!("Expected MissingInput error, got {:?}", other),
    }

    let (_dir, _output, mut loaded) = loaded_session();
    let template = loaded.template_path().unwrap().to_path_buf();
    let data = loaded.dataset_path().unwrap().to_path_buf();

    let mut session = MergeSession::new();
    session.select_template(template).select_dataset(data);
    session.select_sheet(SheetSelector::Name("Customers".into()));
    session.load().unwrap();
    match session.generate(GeneratorBuilder::new(), &copy_converter, &mut ()) {
        Err(MergeError::MissingInput(msg)) => assert_eq!(msg, "Please select an output directory!"),
        other => panic!("Expected MissingInput error, got {:?}", other),
    }

    // 未知のフィールドや取得元は拒否される
    assert!(matches!(
        loaded.set_selector("Nope", Selector::LeaveEmpty),
        Err(MergeError::Validation(_))
    ));
    assert!(matches!(
        loaded.set_selector("Note", Selector::Column("Nope".into())),
        Err(MergeError::Validation(_))
    ));
}

#[test]
fn test_mapping_json_round_trip() {
    let (_dir, _output, mut session) = loaded_session();
    session.set_selector("Note", Selector::LeaveEmpty).unwrap();

    let json = serde_json::to_string(session.mapping()).unwrap();
    let restored: FieldMapping = serde_json::from_str(&json).unwrap();
    assert_eq!(&restored, session.mapping());

    let mapping: FieldMapping =
        serde_json::from_str(r#"{"Customer": {"column": "City"}, "Note": "current_date"}"#).unwrap();
    for (field, selector) in mapping.iter() {
        session.set_selector(field, selector.clone()).unwrap();
    }
    assert_eq!(session.mapping().get("Customer"), Some(&Selector::Column("City".into())));
    assert_eq!(session.mapping().get("Note"), Some(&Selector::CurrentDate));
}
