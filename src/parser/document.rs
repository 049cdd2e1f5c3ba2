//! DOCX Template Module
//!
//! Word文書（DOCX、ZIPアーカイブ）内の差し込みフィールド（MERGEFIELD）を
//! 検出し、値を差し込んだ文書を書き出すモジュール。
//!
//! 対象パートは`word/document.xml`、ヘッダー、フッターです。
//! 単純フィールド（`w:fldSimple`）と複合フィールド
//! （`w:fldChar` begin / `w:instrText` / separate / end）の両方に対応します。

use log::debug;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::{self, File};
use std::io::{Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::MergeError;
use crate::security::{validate_zip_path, SecurityConfig};

const DOCUMENT_PART: &str = "word/document.xml";
const SETTINGS_PART: &str = "word/settings.xml";

type Events<'a> = Vec<Event<'a>>;

fn xml_error<E: fmt::Display>(e: E) -> MergeError {
    MergeError::Template(format!("XML error: {}", e))
}

fn zip_error(e: zip::result::ZipError) -> MergeError {
    MergeError::Zip(e.to_string())
}

/// 差し込みフィールドを含み得るパートかどうか
fn is_field_part(name: &str) -> bool {
    if name == DOCUMENT_PART {
        return true;
    }
    name.strip_prefix("word/")
        .map(|rest| {
            (rest.starts_with("header") || rest.starts_with("footer"))
                && rest.ends_with(".xml")
                && !rest.contains('/')
        })
        .unwrap_or(false)
}

/// フィールド命令（例: ` MERGEFIELD  Name \* MERGEFORMAT `）からフィールド名を取り出す
fn parse_merge_field(instr: &str) -> Option<String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)^\s*MERGEFIELD\s+(?:"([^"]*)"|([^\s"\\]+))"#)
            .expect("merge field pattern is valid")
    });

    let caps = pattern.captures(instr)?;
    let name = caps.get(1).or_else(|| caps.get(2))?.as_str().trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// 属性値を取得する
fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, MergeError> {
    for attr in e.attributes() {
        let attr = attr.map_err(xml_error)?;
        if attr.key.as_ref() == key {
            let raw = std::str::from_utf8(&attr.value).map_err(xml_error)?;
            return Ok(Some(unescape(raw).map_err(xml_error)?.into_owned()));
        }
    }
    Ok(None)
}

/// ZIPアーカイブ内の1エントリ
struct ArchiveEntry {
    name: String,
    data: Vec<u8>,
    is_dir: bool,
}

impl ArchiveEntry {
    fn text(&self) -> Result<&str, MergeError> {
        let text = std::str::from_utf8(&self.data)
            .map_err(|e| MergeError::Template(format!("'{}' is not UTF-8: {}", self.name, e)))?;
        Ok(text.trim_start_matches('\u{feff}'))
    }
}

/// 差し込み印刷用のWordテンプレート
///
/// 読み込み時にアーカイブ全体をメモリに保持し、差し込みフィールドの一覧を確定します。
/// 以降の差し込みはテンプレートファイルを再度開かずに行えます。
///
/// # 使用例
///
/// ```rust,no_run
/// use docxmerge::DocxTemplate;
/// use std::collections::BTreeMap;
/// use std::path::Path;
///
/// # fn main() -> Result<(), docxmerge::MergeError> {
/// let template = DocxTemplate::open("contract.docx")?;
/// println!("fields: {:?}", template.merge_fields());
///
/// let mut values = BTreeMap::new();
/// values.insert("Name".to_string(), "Acme".to_string());
/// template.write_merged(&values, Path::new("Acme.docx"))?;
/// # Ok(())
/// # }
/// ```
pub struct DocxTemplate {
    path: PathBuf,
    entries: Vec<ArchiveEntry>,
    fields: Vec<String>,
}

impl fmt::Debug for DocxTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocxTemplate")
            .field("path", &self.path)
            .field("entries", &self.entries.len())
            .field("fields", &self.fields)
            .finish()
    }
}

impl DocxTemplate {
    /// テンプレートファイルを開く
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MergeError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Self::from_reader(file, path)
    }

    /// リーダーからテンプレートを読み込む
    ///
    /// # 引数
    ///
    /// * `reader` - DOCXファイルのリーダー
    /// * `path` - 表示用のパス
    ///
    /// # 戻り値
    ///
    /// * `Ok(DocxTemplate)` - 読み込みに成功した場合
    /// * `Err(MergeError::SecurityViolation)` - サイズやエントリ数の上限、不正なパスを検出した場合
    /// * `Err(MergeError::Zip)` - ZIPアーカイブとして読めない場合
    /// * `Err(MergeError::Template)` - `word/document.xml`がない、またはXMLが不正な場合
    pub fn from_reader<R: Read + Seek>(
        mut reader: R,
        path: impl Into<PathBuf>,
    ) -> Result<Self, MergeError> {
        let security_config = SecurityConfig::default();

        let mut buffer = Vec::new();
        let bytes_read = reader.read_to_end(&mut buffer)?;
        if bytes_read as u64 > security_config.max_input_file_size {
            return Err(MergeError::SecurityViolation(format!(
                "Input file size exceeds maximum: {} bytes (max: {} bytes)",
                bytes_read, security_config.max_input_file_size
            )));
        }

        let mut archive = ZipArchive::new(Cursor::new(buffer)).map_err(zip_error)?;

        if archive.len() > security_config.max_file_count {
            return Err(MergeError::SecurityViolation(format!(
                "ZIP archive contains too many files: {} (max: {})",
                archive.len(),
                security_config.max_file_count
            )));
        }

        let mut entries = Vec::with_capacity(archive.len());
        let mut total_decompressed_size = 0u64;
        for i in 0..archive.len() {
            let mut file = archive.by_index(i).map_err(zip_error)?;
            let name = file.name().to_string();

            validate_zip_path(&name).map_err(|e| {
                MergeError::SecurityViolation(format!("Invalid ZIP path: {}", e))
            })?;
            total_decompressed_size = security_config
                .account_entry(&name, file.size(), total_decompressed_size)
                .map_err(MergeError::SecurityViolation)?;

            let mut data = Vec::new();
            file.read_to_end(&mut data)?;
            entries.push(ArchiveEntry {
                name,
                data,
                is_dir: file.is_dir(),
            });
        }

        if !entries.iter().any(|entry| entry.name == DOCUMENT_PART) {
            return Err(MergeError::Template(format!(
                "'{}' not found; not a Word document",
                DOCUMENT_PART
            )));
        }

        let mut found = Vec::new();
        let no_values = BTreeMap::new();
        for entry in entries.iter().filter(|e| !e.is_dir && is_field_part(&e.name)) {
            merge_part(entry.text()?, &no_values, &mut found)?;
        }
        let fields: Vec<String> = found.into_iter().collect::<BTreeSet<_>>().into_iter().collect();

        let path = path.into();
        debug!("Template {} has merge fields {:?}", path.display(), fields);

        Ok(Self {
            path,
            entries,
            fields,
        })
    }

    /// テンプレートのパス
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 差し込みフィールド名の一覧（重複なし、昇順）
    pub fn merge_fields(&self) -> &[String] {
        &self.fields
    }

    /// 値を差し込んだDOCXをバイト列として生成する
    ///
    /// `values`に含まれないフィールドはそのまま残ります。
    /// `word/settings.xml`の差し込み印刷設定（`w:mailMerge`）は除去されます。
    pub fn merge(&self, values: &BTreeMap<String, String>) -> Result<Vec<u8>, MergeError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        for entry in &self.entries {
            if entry.is_dir {
                zip.add_directory(entry.name.clone(), options)
                    .map_err(zip_error)?;
                continue;
            }

            zip.start_file(entry.name.clone(), options)
                .map_err(zip_error)?;

            if is_field_part(&entry.name) {
                let mut found = Vec::new();
                zip.write_all(&merge_part(entry.text()?, values, &mut found)?)?;
            } else if entry.name == SETTINGS_PART {
                zip.write_all(&strip_mail_merge(entry.text()?)?)?;
            } else {
                zip.write_all(&entry.data)?;
            }
        }

        let cursor = zip.finish().map_err(zip_error)?;
        Ok(cursor.into_inner())
    }

    /// 値を差し込んだDOCXをファイルに書き出す
    pub fn write_merged(
        &self,
        values: &BTreeMap<String, String>,
        dest: &Path,
    ) -> Result<(), MergeError> {
        let bytes = self.merge(values)?;
        fs::write(dest, bytes)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventKind {
    Start,
    Empty,
    End,
    Other,
}

/// 処理の対象になる要素
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    FldSimple,
    Run,
    Paragraph,
    MailMerge,
}

fn classify(event: &Event<'_>) -> (EventKind, Option<Tag>) {
    let (kind, name) = match event {
        Event::Start(e) => (EventKind::Start, e.name()),
        Event::Empty(e) => (EventKind::Empty, e.name()),
        Event::End(e) => (EventKind::End, e.name()),
        _ => return (EventKind::Other, None),
    };
    let tag = match name.as_ref() {
        b"w:fldSimple" => Some(Tag::FldSimple),
        b"w:r" => Some(Tag::Run),
        b"w:p" => Some(Tag::Paragraph),
        b"w:mailMerge" => Some(Tag::MailMerge),
        _ => None,
    };
    (kind, tag)
}

/// 同名要素の入れ子を数えながら、要素1つ分のイベントを蓄積するバッファ
struct ElementBuffer<'a> {
    tag: &'static [u8],
    depth: usize,
    events: Events<'a>,
}

impl<'a> ElementBuffer<'a> {
    fn start(tag: &'static [u8], event: Event<'a>) -> Self {
        Self {
            tag,
            depth: 1,
            events: vec![event],
        }
    }

    /// イベントを追加し、要素が閉じたら`true`を返す
    fn push(&mut self, event: Event<'a>) -> bool {
        match &event {
            Event::Start(e) if e.name().as_ref() == self.tag => self.depth += 1,
            Event::End(e) if e.name().as_ref() == self.tag => {
                self.depth = self.depth.saturating_sub(1)
            }
            _ => {}
        }
        self.events.push(event);
        self.depth == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldChar {
    Begin,
    Separate,
    End,
}

/// ラン内の複合フィールド要素（出現順）
#[derive(Debug, PartialEq)]
enum RunItem {
    Char(FieldChar),
    Instr(String),
}

struct RunInfo<'a> {
    items: Vec<RunItem>,
    rpr: Option<Events<'a>>,
}

fn field_char(e: &BytesStart<'_>) -> Result<Option<FieldChar>, MergeError> {
    Ok(match attr_value(e, b"w:fldCharType")?.as_deref() {
        Some("begin") => Some(FieldChar::Begin),
        Some("separate") => Some(FieldChar::Separate),
        Some("end") => Some(FieldChar::End),
        _ => None,
    })
}

/// `w:r`要素1つ分のイベントを解析する（直下の子要素のみ）
fn analyze_run<'a>(run: &[Event<'a>]) -> Result<RunInfo<'a>, MergeError> {
    let mut items = Vec::new();
    let mut rpr: Option<Events<'a>> = None;
    let mut rpr_buf: Option<Events<'a>> = None;
    let mut in_instr = false;
    let mut depth = 0usize;

    for event in run {
        if let Some(buf) = rpr_buf.as_mut() {
            buf.push(event.clone());
        }

        match event {
            Event::Start(e) => {
                depth += 1;
                if depth == 2 {
                    match e.name().as_ref() {
                        b"w:rPr" if rpr.is_none() && rpr_buf.is_none() => {
                            rpr_buf = Some(vec![event.clone()]);
                        }
                        b"w:instrText" => {
                            in_instr = true;
                            items.push(RunItem::Instr(String::new()));
                        }
                        b"w:fldChar" => {
                            if let Some(c) = field_char(e)? {
                                items.push(RunItem::Char(c));
                            }
                        }
                        _ => {}
                    }
                }
            }
            Event::Empty(e) if depth == 1 => match e.name().as_ref() {
                b"w:rPr" if rpr.is_none() => rpr = Some(vec![event.clone()]),
                b"w:fldChar" => {
                    if let Some(c) = field_char(e)? {
                        items.push(RunItem::Char(c));
                    }
                }
                _ => {}
            },
            Event::Text(t) if in_instr => {
                if let Some(RunItem::Instr(text)) = items.last_mut() {
                    text.push_str(&t.unescape().map_err(xml_error)?);
                }
            }
            Event::End(e) => {
                if depth == 2 {
                    match e.name().as_ref() {
                        b"w:rPr" => {
                            if let Some(buf) = rpr_buf.take() {
                                rpr = Some(buf);
                            }
                        }
                        b"w:instrText" => in_instr = false,
                        _ => {}
                    }
                }
                depth = depth.saturating_sub(1);
            }
            _ => {}
        }
    }

    Ok(RunInfo { items, rpr })
}

/// 最初に現れる`w:rPr`要素のイベントを取り出す
fn first_rpr<'a>(events: &[Event<'a>]) -> Option<Events<'a>> {
    let mut buffer: Option<ElementBuffer<'a>> = None;
    for event in events {
        match buffer.as_mut() {
            Some(buf) => {
                if buf.push(event.clone()) {
                    return buffer.map(|b| b.events);
                }
            }
            None => match event {
                Event::Start(e) if e.name().as_ref() == b"w:rPr" => {
                    buffer = Some(ElementBuffer::start(b"w:rPr", event.clone()));
                }
                Event::Empty(e) if e.name().as_ref() == b"w:rPr" => {
                    return Some(vec![event.clone()]);
                }
                _ => {}
            },
        }
    }
    None
}

/// 差し込み値を表示するランを生成する（改行は`w:br`に変換）
fn value_run<'a>(rpr: Option<&[Event<'a>]>, value: &str) -> Events<'a> {
    let mut events = vec![Event::Start(BytesStart::new("w:r"))];
    if let Some(rpr) = rpr {
        events.extend(rpr.iter().cloned());
    }

    for (i, line) in value.split('\n').enumerate() {
        if i > 0 {
            events.push(Event::Empty(BytesStart::new("w:br")));
        }
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        let mut text = BytesStart::new("w:t");
        text.push_attribute(("xml:space", "preserve"));
        events.push(Event::Start(text));
        events.push(Event::Text(BytesText::new(line).into_owned()));
        events.push(Event::End(BytesEnd::new("w:t")));
    }

    events.push(Event::End(BytesEnd::new("w:r")));
    events
}

/// 処理中の複合フィールド
#[derive(Default)]
struct ComplexField<'a> {
    events: Events<'a>,
    instr: String,
    nesting: usize,
    in_result: bool,
    begin_rpr: Option<Events<'a>>,
    result_rpr: Option<Events<'a>>,
}

/// 1パート分の差し込み処理
struct PartMerger<'a, 'v> {
    writer: Writer<Vec<u8>>,
    field: Option<ComplexField<'a>>,
    values: &'v BTreeMap<String, String>,
    found: &'v mut Vec<String>,
}

impl<'a, 'v> PartMerger<'a, 'v> {
    fn write(&mut self, event: Event<'a>) -> Result<(), MergeError> {
        self.writer.write_event(event).map_err(xml_error)
    }

    /// 複合フィールドの処理中はそのバッファへ、それ以外は出力へ送る
    fn emit(&mut self, event: Event<'a>) -> Result<(), MergeError> {
        match self.field.as_mut() {
            Some(field) => {
                field.events.push(event);
                Ok(())
            }
            None => self.write(event),
        }
    }

    fn emit_all(&mut self, events: Events<'a>) -> Result<(), MergeError> {
        events.into_iter().try_for_each(|event| self.emit(event))
    }

    /// 複合フィールドを差し込まずにそのまま出力する
    fn abandon_field(&mut self) -> Result<(), MergeError> {
        if let Some(field) = self.field.take() {
            for event in field.events {
                self.write(event)?;
            }
        }
        Ok(())
    }

    fn finish_simple(&mut self, events: Events<'a>) -> Result<(), MergeError> {
        let instr = match events.first() {
            Some(Event::Start(e)) | Some(Event::Empty(e)) => attr_value(e, b"w:instr")?,
            _ => None,
        };

        if let Some(name) = instr.as_deref().and_then(parse_merge_field) {
            let replacement = self
                .values
                .get(&name)
                .map(|value| value_run(first_rpr(&events).as_deref(), value));
            self.found.push(name);
            if let Some(run) = replacement {
                return self.emit_all(run);
            }
        }
        self.emit_all(events)
    }

    fn handle_run(&mut self, events: Events<'a>) -> Result<(), MergeError> {
        let info = analyze_run(&events)?;
        let starts_field = matches!(info.items.iter().find(|i| matches!(i, RunItem::Char(_))),
            Some(RunItem::Char(FieldChar::Begin)));

        if self.field.is_none() && !starts_field {
            return self.emit_all(events);
        }

        let mut field = self.field.take().unwrap_or_default();
        let has_chars = info.items.iter().any(|i| matches!(i, RunItem::Char(_)));
        if !has_chars && field.nesting == 1 && field.in_result && field.result_rpr.is_none() {
            field.result_rpr = info.rpr.clone();
        }

        let mut completed = false;
        for item in &info.items {
            match item {
                RunItem::Char(FieldChar::Begin) => {
                    field.nesting += 1;
                    if field.nesting == 1 {
                        field.begin_rpr = info.rpr.clone();
                    }
                }
                RunItem::Char(FieldChar::Separate) => {
                    if field.nesting == 1 {
                        field.in_result = true;
                    }
                }
                RunItem::Char(FieldChar::End) => {
                    field.nesting = field.nesting.saturating_sub(1);
                    if field.nesting == 0 {
                        completed = true;
                        break;
                    }
                }
                RunItem::Instr(text) => {
                    if field.nesting == 1 && !field.in_result {
                        field.instr.push_str(text);
                    }
                }
            }
        }
        field.events.extend(events);

        if completed {
            self.finish_field(field)
        } else {
            self.field = Some(field);
            Ok(())
        }
    }

    fn finish_field(&mut self, field: ComplexField<'a>) -> Result<(), MergeError> {
        if let Some(name) = parse_merge_field(&field.instr) {
            let replacement = self.values.get(&name).map(|value| {
                let rpr = field.result_rpr.as_deref().or(field.begin_rpr.as_deref());
                value_run(rpr, value)
            });
            self.found.push(name);
            if let Some(run) = replacement {
                return run.into_iter().try_for_each(|event| self.write(event));
            }
        }
        field.events.into_iter().try_for_each(|event| self.write(event))
    }
}

/// パートXMLの差し込みフィールドに値を差し込む
///
/// 検出したフィールド名（差し込みの有無によらない）を`found`に追加します。
fn merge_part(
    xml: &str,
    values: &BTreeMap<String, String>,
    found: &mut Vec<String>,
) -> Result<Vec<u8>, MergeError> {
    let mut reader = Reader::from_str(xml);
    let mut merger = PartMerger {
        writer: Writer::new(Vec::with_capacity(xml.len())),
        field: None,
        values,
        found,
    };
    let mut simple: Option<ElementBuffer<'_>> = None;
    let mut run: Option<ElementBuffer<'_>> = None;

    loop {
        let event = reader.read_event().map_err(xml_error)?;
        if matches!(event, Event::Eof) {
            break;
        }

        if let Some(mut buffer) = simple.take() {
            if buffer.push(event) {
                merger.finish_simple(buffer.events)?;
            } else {
                simple = Some(buffer);
            }
            continue;
        }

        if let Some(mut buffer) = run.take() {
            if buffer.push(event) {
                merger.handle_run(buffer.events)?;
            } else {
                run = Some(buffer);
            }
            continue;
        }

        match classify(&event) {
            (EventKind::Start, Some(Tag::FldSimple)) => {
                simple = Some(ElementBuffer::start(b"w:fldSimple", event));
            }
            (EventKind::Empty, Some(Tag::FldSimple)) => merger.finish_simple(vec![event])?,
            (EventKind::Start, Some(Tag::Run)) => {
                run = Some(ElementBuffer::start(b"w:r", event));
            }
            // 段落をまたぐ複合フィールドは差し込まない
            (EventKind::End, Some(Tag::Paragraph)) if merger.field.is_some() => {
                merger.abandon_field()?;
                merger.write(event)?;
            }
            _ => merger.emit(event)?,
        }
    }

    for buffer in [simple, run].into_iter().flatten() {
        merger.emit_all(buffer.events)?;
    }
    merger.abandon_field()?;

    Ok(merger.writer.into_inner())
}

/// `word/settings.xml`から`w:mailMerge`要素を除去する
///
/// 差し込み済みの文書を開いたときにデータソースの再接続を求められないようにします。
fn strip_mail_merge(xml: &str) -> Result<Vec<u8>, MergeError> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut skipping: Option<ElementBuffer<'_>> = None;

    loop {
        let event = reader.read_event().map_err(xml_error)?;
        if matches!(event, Event::Eof) {
            break;
        }

        if let Some(mut buffer) = skipping.take() {
            if !buffer.push(event) {
                skipping = Some(buffer);
            }
            continue;
        }

        match classify(&event) {
            (EventKind::Start, Some(Tag::MailMerge)) => {
                skipping = Some(ElementBuffer::start(b"w:mailMerge", event));
            }
            (EventKind::Empty, Some(Tag::MailMerge)) => {}
            _ => writer.write_event(event).map_err(xml_error)?,
        }
    }

    Ok(writer.into_inner())
}
