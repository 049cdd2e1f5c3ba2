//! Filename Generator Module
//!
//! 行ごとの出力ファイル名の生成と、ファイル名テンプレートの事前検証を行うモジュール。

use chrono::NaiveDateTime;

use crate::api::{DEFAULT_FILE_DATE_FORMAT, FILENAME_DEFAULT_TEXT, ILLEGAL_CHARACTERS};
use crate::error::MergeError;
use crate::placeholder::{substitute, unknown_columns};
use crate::sanitize::{detect_illegal_chars, join_chars};
use crate::types::Dataset;

/// ファイル名テンプレートが未設定（空または既定テキスト）かどうか
pub fn is_default_template(template: &str) -> bool {
    template.is_empty() || template == FILENAME_DEFAULT_TEXT
}

/// 行ごとのファイル名生成器
#[derive(Debug, Clone)]
pub(crate) struct FilenameGenerator {
    template: String,
    date_format: String,
}

impl FilenameGenerator {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            date_format: DEFAULT_FILE_DATE_FORMAT.to_string(),
        }
    }

    /// 先頭の日付の形式を変更する（`GeneratorBuilder::build()`で検証済みであること）
    pub fn with_date_format(mut self, date_format: impl Into<String>) -> Self {
        self.date_format = date_format.into();
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// 行のファイル名を生成する
    ///
    /// `{日付} - {本体} - {ID}.docx`の形式で、IDは`now`の時分秒とマイクロ秒に
    /// 行番号を連結したものです。使用禁止文字の除去は呼び出し側で行います。
    pub fn generate(&self, row: usize, dataset: &Dataset, now: &NaiveDateTime) -> String {
        let id = format!("{}{}", now.format("%H%M%S%6f"), row);
        let date = now.format(&self.date_format);

        if is_default_template(&self.template) {
            return format!(
                "{} - Autocreation for {} - {}.docx",
                date,
                dataset.source_name(),
                id
            );
        }

        let body = substitute(&self.template, |name| {
            dataset.cell(row, name).map(|cell| cell.as_text())
        });
        format!("{} - {} - {}.docx", date, body, id)
    }
}

/// 行のファイル名を生成する
///
/// テンプレートが空または既定テキストの場合は
/// `"{yymmdd} - Autocreation for {読み込み元ファイル名} - {ID}.docx"`、
/// それ以外は`{列名}`を行の値で置換して`"{yymmdd} - {置換後} - {ID}.docx"`を返します。
/// 列に一致しないプレースホルダーはそのまま残ります。
///
/// 戻り値には使用禁止文字が含まれ得るため、ファイルパスとして使う前に
/// [`clean_filename`](crate::clean_filename)を適用してください。
///
/// # 使用例
///
/// ```rust
/// use chrono::NaiveDate;
/// use docxmerge::{generate_filename, Cell, Dataset};
///
/// let dataset = Dataset::new(
///     "data/customers.xlsx",
///     vec![Some("Name".to_string())],
///     vec![vec![Cell::from("Acme")]],
/// );
/// let now = NaiveDate::from_ymd_opt(2025, 3, 1)
///     .unwrap()
///     .and_hms_micro_opt(9, 5, 7, 42)
///     .unwrap();
///
/// assert_eq!(
///     generate_filename(0, "{Name} contract", &dataset, &now),
///     "250301 - Acme contract - 0905070000420.docx"
/// );
/// ```
pub fn generate_filename(
    row: usize,
    template: &str,
    dataset: &Dataset,
    now: &NaiveDateTime,
) -> String {
    FilenameGenerator::new(template).generate(row, dataset, now)
}

/// ファイル名テンプレートの検証メッセージを返す
///
/// 未知の列ごとに`Unknown column: {名前}`、使用禁止文字ごとに
/// `Illegal character found in filename: c`を並べます。
/// 空文字列であれば生成を開始できます。
/// テンプレートが既定テキストの場合、未知の列の検査は行いません。
pub fn validation_message(template: &str, dataset: &Dataset) -> String {
    let mut message = String::new();

    if template != FILENAME_DEFAULT_TEXT {
        for name in unknown_columns(template, dataset.column_names()) {
            message.push_str(&format!("Unknown column: {{{}}}\n", name));
        }
    }

    for c in detect_illegal_chars(template) {
        message.push_str(&format!("\nIllegal character found in filename: {}", c));
    }

    if !message.is_empty() {
        message.push_str("\n\n See Help for more information.");
    }
    message
}

/// ファイル名テンプレートを検証する
///
/// # 戻り値
///
/// * `Ok(())` - 生成を開始できる場合
/// * `Err(MergeError::Validation)` - 未知の列または使用禁止文字がある場合（メッセージは`validation_message`）
pub fn validate_template(template: &str, dataset: &Dataset) -> Result<(), MergeError> {
    let message = validation_message(template, dataset);
    if message.is_empty() {
        Ok(())
    } else {
        Err(MergeError::Validation(message))
    }
}

/// ファイル名テンプレートで使用できる列と使用禁止文字の一覧
pub fn help_text(dataset: Option<&Dataset>) -> String {
    let mut help = String::from("Currently available Fields:\n ");

    if let Some(dataset) = dataset {
        for column in dataset.column_names() {
            help.push_str(&format!("\n {{{}}}", column));
            let illegal = detect_illegal_chars(column);
            if !illegal.is_empty() {
                help.push_str(&format!(
                    " <= Cannot be used due to illegal characters: {}",
                    join_chars(&illegal)
                ));
            }
        }
    }

    let no_columns = dataset.map_or(true, |d| d.is_empty() || d.headers().is_empty());
    if no_columns {
        help.push_str("\n No Columns loaded/found!");
    }

    help.push_str(&format!(
        "\n\n\n These characters cannot be used in the filename:\n {} ",
        join_chars(&ILLEGAL_CHARACTERS)
    ));
    help
}
