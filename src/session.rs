//! Session Module
//!
//! 選択中のファイル、読み込んだデータ、フィールドマッピング、処理状態を
//! 1つのセッションとして保持し、読み込みから生成までの状態遷移を管理するモジュール。

use chrono::Local;
use log::info;
use std::path::{Path, PathBuf};

use crate::api::{Selector, SheetSelector, DEFAULT_FIELD_DATE_FORMAT};
use crate::builder::GeneratorBuilder;
use crate::error::MergeError;
use crate::filename::help_text;
use crate::output::FormatConverter;
use crate::parser::{load_dataset, DocxTemplate};
use crate::progress::ProgressSink;
use crate::resolver::FieldMapping;
use crate::types::{BatchReport, Dataset};

/// セッションの状態
///
/// ```text
/// Idle --load--> Loaded --generate--> Generating --> Done
///                  ^                      |           |
///                  +------- error --------+           |
///                  +------------- load ---------------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// 未読み込み
    #[default]
    Idle,

    /// テンプレートと表データを読み込み済み
    Loaded,

    /// 生成中
    Generating,

    /// 生成完了（再度の生成も可能）
    Done,
}

/// 差し込み印刷のセッション
///
/// # 使用例
///
/// ```rust,no_run
/// use docxmerge::{GeneratorBuilder, LogProgress, MergeSession, Selector, SofficeConverter};
///
/// # fn main() -> Result<(), docxmerge::MergeError> {
/// let mut session = MergeSession::new();
/// session
///     .select_template("contract.docx")
///     .select_dataset("customers.xlsx")
///     .select_output_dir("out");
/// session.load()?;
/// session.set_selector("Note", Selector::LeaveEmpty)?;
///
/// let builder = GeneratorBuilder::new().with_filename_template("{Name} contract");
/// let report = session.generate(builder, &SofficeConverter::new(), &mut LogProgress)?;
/// println!("{}", report.summary());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MergeSession {
    template_path: Option<PathBuf>,
    dataset_path: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    sheet: SheetSelector,
    loaded: Option<(Dataset, DocxTemplate)>,
    mapping: FieldMapping,
    state: SessionState,
}

impl MergeSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wordテンプレートを選択する
    pub fn select_template(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.template_path = Some(path.into());
        self
    }

    /// 表データ（XLSX/XLS/ODS）を選択する
    pub fn select_dataset(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.dataset_path = Some(path.into());
        self
    }

    /// 出力フォルダを選択する
    pub fn select_output_dir(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.output_dir = Some(path.into());
        self
    }

    /// 読み込むシートを選択する（既定は先頭のシート）
    pub fn select_sheet(&mut self, sheet: SheetSelector) -> &mut Self {
        self.sheet = sheet;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn template_path(&self) -> Option<&Path> {
        self.template_path.as_deref()
    }

    pub fn dataset_path(&self) -> Option<&Path> {
        self.dataset_path.as_deref()
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    /// 読み込み済みの表データ
    pub fn dataset(&self) -> Option<&Dataset> {
        self.loaded.as_ref().map(|(dataset, _)| dataset)
    }

    /// 読み込み済みのテンプレート
    pub fn template(&self) -> Option<&DocxTemplate> {
        self.loaded.as_ref().map(|(_, template)| template)
    }

    /// 現在のフィールドマッピング
    pub fn mapping(&self) -> &FieldMapping {
        &self.mapping
    }

    /// マッピングの選択肢（未読み込みの場合は空）
    pub fn choices(&self) -> Vec<Selector> {
        self.dataset().map(Dataset::choices).unwrap_or_default()
    }

    /// ファイル名テンプレートのヘルプ
    pub fn help_text(&self) -> String {
        help_text(self.dataset())
    }

    /// 選択中のテンプレートと表データを読み込む
    ///
    /// 以前のマッピングは破棄され、各差し込みフィールドに既定の取得元が設定されます。
    ///
    /// # 戻り値
    ///
    /// * `Ok(())` - 読み込みに成功した場合（状態は`Loaded`）
    /// * `Err(MergeError::MissingInput)` - テンプレートまたは表データが選択されていない場合
    /// * `Err(MergeError)` - 読み込みに失敗した場合（状態は`Idle`）
    pub fn load(&mut self) -> Result<(), MergeError> {
        let (template_path, dataset_path) = match (&self.template_path, &self.dataset_path) {
            (Some(template), Some(dataset)) => (template.clone(), dataset.clone()),
            _ => {
                return Err(MergeError::MissingInput(
                    "Please select Word and Excel files!".to_string(),
                ))
            }
        };
        self.ensure_not_generating()?;
        self.reset();

        let template = DocxTemplate::open(&template_path)?;
        let dataset = load_dataset(&dataset_path, &self.sheet)?;
        self.load_with(template, dataset)
    }

    /// 読み込み済みのテンプレートと表データをセッションに設定する
    pub fn load_with(&mut self, template: DocxTemplate, dataset: Dataset) -> Result<(), MergeError> {
        self.ensure_not_generating()?;
        self.reset();

        let today = Local::now().format(DEFAULT_FIELD_DATE_FORMAT).to_string();
        self.mapping = FieldMapping::with_defaults(
            template.merge_fields().iter().map(String::as_str),
            &dataset.choices(),
            &today,
        );

        info!(
            "Loaded {} merge field(s) from {} and {} row(s) from {}",
            template.merge_fields().len(),
            template.path().display(),
            dataset.len(),
            dataset.source().display()
        );

        self.loaded = Some((dataset, template));
        self.state = SessionState::Loaded;
        Ok(())
    }

    /// 差し込みフィールドの取得元を変更する
    ///
    /// # 戻り値
    ///
    /// * `Ok(Option<Selector>)` - 変更前の取得元
    /// * `Err(MergeError::InvalidState)` - 未読み込みの場合
    /// * `Err(MergeError::Validation)` - フィールドまたは取得元が存在しない場合
    pub fn set_selector(
        &mut self,
        field: &str,
        selector: Selector,
    ) -> Result<Option<Selector>, MergeError> {
        let (dataset, template) = self.loaded.as_ref().ok_or_else(|| {
            MergeError::InvalidState("Load a template and a dataset first".to_string())
        })?;

        if !template.merge_fields().iter().any(|f| f == field) {
            return Err(MergeError::Validation(format!("Unknown merge field: {}", field)));
        }
        if !dataset.choices().contains(&selector) {
            return Err(MergeError::Validation(format!(
                "Unknown data source: {}",
                selector
            )));
        }

        Ok(self.mapping.insert(field, selector))
    }

    /// すべての行について文書を生成する
    ///
    /// 出力フォルダはセッションで選択したものが使われます（`builder`の指定は上書きされます）。
    ///
    /// # 戻り値
    ///
    /// * `Ok(BatchReport)` - 成功した場合（状態は`Done`）
    /// * `Err(MergeError::MissingInput)` - 出力フォルダが選択されていない場合
    /// * `Err(MergeError::InvalidState)` - 未読み込み、または生成中の場合
    /// * `Err(MergeError)` - 生成に失敗した場合（状態は`Loaded`に戻る）
    pub fn generate(
        &mut self,
        builder: GeneratorBuilder,
        converter: &dyn FormatConverter,
        progress: &mut dyn ProgressSink,
    ) -> Result<BatchReport, MergeError> {
        let output_dir = self.output_dir.clone().ok_or_else(|| {
            MergeError::MissingInput("Please select an output directory!".to_string())
        })?;

        if !matches!(self.state, SessionState::Loaded | SessionState::Done) {
            return Err(MergeError::InvalidState(format!(
                "Cannot generate in state {:?}",
                self.state
            )));
        }
        let (dataset, template) = self.loaded.as_ref().ok_or_else(|| {
            MergeError::InvalidState("Load a template and a dataset first".to_string())
        })?;

        let generator = builder.with_output_dir(output_dir).build()?;

        self.state = SessionState::Generating;
        let result = generator.run(dataset, template, &self.mapping, converter, progress);
        self.state = if result.is_ok() {
            SessionState::Done
        } else {
            SessionState::Loaded
        };
        result
    }

    fn ensure_not_generating(&self) -> Result<(), MergeError> {
        if self.state == SessionState::Generating {
            return Err(MergeError::InvalidState(
                "Generation is in progress".to_string(),
            ));
        }
        Ok(())
    }

    /// 読み込み結果とマッピングを破棄する
    fn reset(&mut self) {
        self.loaded = None;
        self.mapping = FieldMapping::new();
        self.state = SessionState::Idle;
    }
}
