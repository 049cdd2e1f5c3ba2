//! Builder Module
//!
//! Fluent Builder APIを提供し、`Generator`インスタンスを段階的に構築する。

use chrono::format::{Item, StrftimeItems};
use chrono::{Local, NaiveDateTime};
use log::{debug, info, warn};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::api::{
    DEFAULT_FIELD_DATE_FORMAT, DEFAULT_FILE_DATE_FORMAT, FILENAME_DEFAULT_TEXT, TEMP_DIR_NAME,
};
use crate::error::MergeError;
use crate::filename::{validate_template, FilenameGenerator};
use crate::mapper::resolve_row;
use crate::output::FormatConverter;
use crate::parser::DocxTemplate;
use crate::progress::ProgressSink;
use crate::resolver::FieldMapping;
use crate::sanitize::{clean_filename, contains_illegal_chars};
use crate::types::{BatchReport, Dataset};

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// 生成処理の設定を保持する内部構造体
#[derive(Debug, Clone)]
pub(crate) struct GenerationConfig {
    /// 出力フォルダ
    pub output_dir: Option<PathBuf>,

    /// ファイル名テンプレート
    pub filename_template: String,

    /// 出力フォルダ直下に作る一時ディレクトリの名前
    pub scratch_dir_name: String,

    /// 差し込みフィールドに挿入する日付の形式
    pub field_date_format: String,

    /// ファイル名の先頭に付ける日付の形式
    pub file_date_format: String,

    /// 現在時刻の取得元
    pub clock: fn() -> NaiveDateTime,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            filename_template: FILENAME_DEFAULT_TEXT.to_string(),
            scratch_dir_name: TEMP_DIR_NAME.to_string(),
            field_date_format: DEFAULT_FIELD_DATE_FORMAT.to_string(),
            file_date_format: DEFAULT_FILE_DATE_FORMAT.to_string(),
            clock: local_now,
        }
    }
}

/// Fluent Builder APIを提供する構造体
///
/// すべての設定項目（出力フォルダを除く）にデフォルト値が設定されており、
/// 必要な設定のみをオーバーライドできます。
///
/// # 使用例
///
/// ```rust,no_run
/// use docxmerge::GeneratorBuilder;
///
/// # fn main() -> Result<(), docxmerge::MergeError> {
/// let generator = GeneratorBuilder::new()
///     .with_output_dir("out")
///     .with_filename_template("{Name} contract")
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct GeneratorBuilder {
    /// 内部設定（構築中）
    config: GenerationConfig,
}

impl GeneratorBuilder {
    /// デフォルト設定を持つビルダーインスタンスを生成する
    ///
    /// # デフォルト設定
    ///
    /// - ファイル名テンプレート: 既定テキスト（自動生成のファイル名）
    /// - 一時ディレクトリ: `.temp`
    /// - フィールドの日付形式: `%d/%m/%Y`
    /// - ファイル名の日付形式: `%y%m%d`
    pub fn new() -> Self {
        Self::default()
    }

    /// 出力フォルダを指定する（必須）
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = Some(dir.into());
        self
    }

    /// ファイル名テンプレートを指定する
    ///
    /// `{列名}`は行の値で置換されます。空文字列は既定テキストと同じ扱いです。
    pub fn with_filename_template(mut self, template: impl Into<String>) -> Self {
        self.config.filename_template = template.into();
        self
    }

    /// 一時ディレクトリの名前を指定する
    pub fn with_scratch_dir_name(mut self, name: impl Into<String>) -> Self {
        self.config.scratch_dir_name = name.into();
        self
    }

    /// 差し込みフィールドに挿入する日付の形式を指定する（chronoの書式）
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use docxmerge::GeneratorBuilder;
    ///
    /// let builder = GeneratorBuilder::new()
    ///     .with_field_date_format("%Y年%m月%d日");
    /// ```
    pub fn with_field_date_format(mut self, format: impl Into<String>) -> Self {
        self.config.field_date_format = format.into();
        self
    }

    /// ファイル名の先頭に付ける日付の形式を指定する（chronoの書式）
    pub fn with_file_date_format(mut self, format: impl Into<String>) -> Self {
        self.config.file_date_format = format.into();
        self
    }

    /// 現在時刻の取得元を差し替える
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.config.clock = clock;
        self
    }

    /// 設定を検証し、`Generator`インスタンスを生成する
    ///
    /// # 戻り値
    ///
    /// * `Ok(Generator)`: 設定が有効な場合
    /// * `Err(MergeError::MissingInput)`: 出力フォルダが指定されていない場合
    /// * `Err(MergeError::Config)`: 設定が無効な場合
    ///
    /// # 発生し得るエラー
    ///
    /// * `MergeError::Config(String)`: 設定の検証に失敗した場合
    ///   * 日付形式が空、または不正な書式文字列
    ///   * 一時ディレクトリ名が空、パス区切りや使用禁止文字を含む
    pub fn build(self) -> Result<Generator, MergeError> {
        // 1. 出力フォルダ
        let output_dir = self
            .config
            .output_dir
            .clone()
            .filter(|dir| !dir.as_os_str().is_empty())
            .ok_or_else(|| {
                MergeError::MissingInput("Please select an output directory!".to_string())
            })?;

        // 2. 日付形式の検証
        validate_date_format("field", &self.config.field_date_format)?;
        validate_date_format("file", &self.config.file_date_format)?;

        // 3. 一時ディレクトリ名の検証
        let scratch = &self.config.scratch_dir_name;
        if scratch.is_empty()
            || scratch == "."
            || scratch == ".."
            || contains_illegal_chars(scratch)
        {
            return Err(MergeError::Config(format!(
                "Invalid scratch directory name: '{}'",
                scratch
            )));
        }

        // 4. Generatorインスタンス生成
        Ok(Generator::new(output_dir, self.config))
    }
}

/// 日付形式を検証する
///
/// 解析できても`NaiveDateTime`では書式化できない指定子（`%z`、`%Z`など）も拒否します。
fn validate_date_format(kind: &str, format: &str) -> Result<(), MergeError> {
    let parses =
        !format.is_empty() && !StrftimeItems::new(format).any(|item| matches!(item, Item::Error));
    let renders = parses && {
        let mut rendered = String::new();
        write!(rendered, "{}", NaiveDateTime::default().format(format)).is_ok()
    };
    if !renders {
        return Err(MergeError::Config(format!(
            "Invalid {} date format string: '{}'",
            kind, format
        )));
    }
    Ok(())
}

/// 進捗カウンター
struct Ticker<'p> {
    sink: &'p mut dyn ProgressSink,
    value: usize,
    max: usize,
}

impl Ticker<'_> {
    fn tick(&mut self, label: &str) {
        self.value += 1;
        debug!("{}", label);
        self.sink.tick(self.value, self.max, label);
    }
}

/// バッチ生成のファサード
///
/// 表データの各行をテンプレートに差し込んで一時ディレクトリに書き出し、
/// 一括変換した後に一時ディレクトリを削除します。
///
/// # 使用例
///
/// ```rust,no_run
/// use docxmerge::{
///     Dataset, DocxTemplate, FieldMapping, GeneratorBuilder, LogProgress, SofficeConverter,
/// };
///
/// # fn run(dataset: &Dataset, mapping: &FieldMapping) -> Result<(), docxmerge::MergeError> {
/// let template = DocxTemplate::open("contract.docx")?;
/// let generator = GeneratorBuilder::new().with_output_dir("out").build()?;
/// let report = generator.run(
///     dataset,
///     &template,
///     mapping,
///     &SofficeConverter::new(),
///     &mut LogProgress,
/// )?;
/// println!("{}", report.summary());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Generator {
    /// 生成設定
    config: GenerationConfig,

    /// 出力フォルダ
    output_dir: PathBuf,

    /// ファイル名生成器
    filenames: FilenameGenerator,
}

impl Generator {
    pub(crate) fn new(output_dir: PathBuf, config: GenerationConfig) -> Self {
        let filenames = FilenameGenerator::new(config.filename_template.clone())
            .with_date_format(config.file_date_format.clone());
        Self {
            config,
            output_dir,
            filenames,
        }
    }

    /// 出力フォルダ
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// 一時ディレクトリのパス
    pub fn scratch_dir(&self) -> PathBuf {
        self.output_dir.join(&self.config.scratch_dir_name)
    }

    /// ファイル名テンプレート
    pub fn filename_template(&self) -> &str {
        self.filenames.template()
    }

    /// すべての行について文書を生成し、一括変換する
    ///
    /// # 引数
    ///
    /// * `dataset` - 表データ
    /// * `template` - Wordテンプレート
    /// * `mapping` - 差し込みフィールドの取得元
    /// * `converter` - 一括変換の実装
    /// * `progress` - 進捗の通知先
    ///
    /// # 戻り値
    ///
    /// * `Ok(BatchReport)` - 生成と変換に成功した場合
    /// * `Err(MergeError::Validation)` - ファイル名テンプレートやマッピングが不正、または行がない場合（ファイルは作成されない）
    /// * `Err(MergeError)` - 書き込みや変換に失敗した場合（一時ディレクトリは残る）
    ///
    /// # 処理フロー
    ///
    /// 1. ファイル名テンプレート、マッピング、行数の検証
    /// 2. 各行について（ループ）
    ///    - フィールド値の解決
    ///    - ファイル名の生成と使用禁止文字の除去
    ///    - 一時ディレクトリへの書き出し
    /// 3. 一括変換
    /// 4. 一時ディレクトリの削除
    pub fn run(
        &self,
        dataset: &Dataset,
        template: &DocxTemplate,
        mapping: &FieldMapping,
        converter: &dyn FormatConverter,
        progress: &mut dyn ProgressSink,
    ) -> Result<BatchReport, MergeError> {
        // 1. 検証（ファイル操作の前に行う）
        validate_template(self.filenames.template(), dataset)?;
        mapping.ensure_covers(template.merge_fields().iter().map(String::as_str))?;
        if dataset.is_empty() {
            return Err(MergeError::Validation(format!(
                "No data rows found in {}",
                dataset.source_name()
            )));
        }

        let started = Instant::now();
        let rows = dataset.len();
        let scratch = self.scratch_dir();
        let mut ticker = Ticker {
            sink: progress,
            value: 0,
            max: rows * 2 + 1,
        };

        info!(
            "Generating {} document(s) from {} into {}",
            rows,
            template.path().display(),
            self.output_dir.display()
        );

        let files = self
            .write_and_convert(dataset, template, mapping, converter, &scratch, &mut ticker)
            .map_err(|e| {
                if scratch.exists() {
                    warn!("Scratch directory left behind: {}", scratch.display());
                }
                e
            })?;

        ticker.tick("PDF Files created Successfully");

        let report = BatchReport {
            rows,
            files,
            elapsed: started.elapsed(),
        };
        info!("{}", report.summary().trim_end());
        Ok(report)
    }

    fn write_and_convert(
        &self,
        dataset: &Dataset,
        template: &DocxTemplate,
        mapping: &FieldMapping,
        converter: &dyn FormatConverter,
        scratch: &Path,
        ticker: &mut Ticker<'_>,
    ) -> Result<Vec<PathBuf>, MergeError> {
        let mut files = Vec::with_capacity(dataset.len());
        if scratch.exists() {
            warn!(
                "Scratch directory already exists, its contents will be converted too: {}",
                scratch.display()
            );
        }

        // 2. 行ごとの書き出し
        for row in 0..dataset.len() {
            let now = (self.config.clock)();
            let today = now.format(&self.config.field_date_format).to_string();
            let values = resolve_row(row, mapping, dataset, &today);
            let filename = clean_filename(&self.filenames.generate(row, dataset, &now));

            ticker.tick(&format!("Starting to create Word File for {}...", filename));
            fs::create_dir_all(scratch)?;
            template.write_merged(&values, &scratch.join(&filename))?;
            ticker.tick(&format!("Created Word File for {}...", filename));

            files.push(self.output_dir.join(&filename).with_extension("pdf"));
        }

        // 3. 一括変換
        converter.convert_dir(scratch, &self.output_dir)?;

        // 4. 一時ディレクトリの削除
        fs::remove_dir_all(scratch)?;

        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn fixed_clock() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_generator_builder_new() {
        let builder = GeneratorBuilder::new();
        assert!(builder.config.output_dir.is_none());
        assert_eq!(builder.config.filename_template, FILENAME_DEFAULT_TEXT);
        assert_eq!(builder.config.scratch_dir_name, ".temp");
        assert_eq!(builder.config.field_date_format, "%d/%m/%Y");
        assert_eq!(builder.config.file_date_format, "%y%m%d");
    }

    #[test]
    fn test_builder_method_chaining() {
        let builder = GeneratorBuilder::new()
            .with_output_dir("out")
            .with_filename_template("{Name}")
            .with_scratch_dir_name("work")
            .with_field_date_format("%Y-%m-%d")
            .with_file_date_format("%Y%m%d")
            .with_clock(fixed_clock);

        assert_eq!(builder.config.output_dir, Some(PathBuf::from("out")));
        assert_eq!(builder.config.filename_template, "{Name}");
        assert_eq!(builder.config.scratch_dir_name, "work");
        assert_eq!(builder.config.field_date_format, "%Y-%m-%d");
        assert_eq!(builder.config.file_date_format, "%Y%m%d");
        assert_eq!((builder.config.clock)(), fixed_clock());
    }

    #[test]
    fn test_build_success() {
        let generator = GeneratorBuilder::new()
            .with_output_dir("out")
            .with_filename_template("{Name}")
            .build()
            .unwrap();
        assert_eq!(generator.output_dir(), Path::new("out"));
        assert_eq!(generator.scratch_dir(), Path::new("out").join(".temp"));
        assert_eq!(generator.filename_template(), "{Name}");
    }

    #[test]
    fn test_build_without_output_dir() {
        for builder in [GeneratorBuilder::new(), GeneratorBuilder::new().with_output_dir("")] {
            match builder.build() {
                Err(MergeError::MissingInput(msg)) => {
                    assert_eq!(msg, "Please select an output directory!")
                }
                other => panic!("Expected MissingInput error, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_build_with_invalid_date_format() {
        for format in ["", "%Q"] {
            let result = GeneratorBuilder::new()
                .with_output_dir("out")
                .with_field_date_format(format)
                .build();
            match result {
                Err(MergeError::Config(msg)) => assert!(msg.contains("Invalid field date format")),
                other => panic!("Expected Config error, got {:?}", other),
            }
        }

        let result = GeneratorBuilder::new()
            .with_output_dir("out")
            .with_file_date_format("%")
            .build();
        assert!(matches!(result, Err(MergeError::Config(_))));
    }

    #[test]
    fn test_build_rejects_timezone_specifiers() {
        for format in ["%d/%m/%Y %z", "%Z", "%:z"] {
            let result = GeneratorBuilder::new()
                .with_output_dir("out")
                .with_field_date_format(format)
                .build();
            match result {
                Err(MergeError::Config(msg)) => assert!(msg.contains(format)),
                other => panic!("Expected Config error for {}, got {:?}", format, other),
            }
        }

        let result = GeneratorBuilder::new()
            .with_output_dir("out")
            .with_file_date_format("%y%m%d%z")
            .build();
        match result {
            Err(MergeError::Config(msg)) => assert!(msg.contains("Invalid file date format")),
            other => panic!("Expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_build_with_valid_custom_date_format() {
        let result = GeneratorBuilder::new()
            .with_output_dir("out")
            .with_field_date_format("%Y年%m月%d日")
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn test_build_with_invalid_scratch_dir_name() {
        for name in ["", ".", "..", "a/b", "a\\b", "tmp?"] {
            let result = GeneratorBuilder::new()
                .with_output_dir("out")
                .with_scratch_dir_name(name)
                .build();
            match result {
                Err(MergeError::Config(msg)) => assert!(msg.contains("scratch directory")),
                other => panic!("Expected Config error for {:?}, got {:?}", name, other),
            }
        }
    }
}
