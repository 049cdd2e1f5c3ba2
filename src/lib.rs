//! docxmerge - Pure-Rust mail merge from spreadsheets into Word templates
//!
//! This crate fills the MERGEFIELDs of a DOCX template with the rows of a spreadsheet
//! (XLSX/XLS/ODS), writes one document per row and bulk-converts them to PDF.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use docxmerge::{GeneratorBuilder, LogProgress, MergeSession, SofficeConverter};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut session = MergeSession::new();
//!     session
//!         .select_template("contract.docx")
//!         .select_dataset("customers.xlsx")
//!         .select_output_dir("out");
//!
//!     // Load both files; every merge field gets a default data source
//!     session.load()?;
//!
//!     // One PDF per row, named after the "Name" column
//!     let builder = GeneratorBuilder::new().with_filename_template("{Name} contract");
//!     let report = session.generate(builder, &SofficeConverter::new(), &mut LogProgress)?;
//!     println!("{}", report.summary());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Choosing data sources
//!
//! Each merge field is mapped to a [`Selector`]: a spreadsheet column, an empty value or the
//! current date.
//!
//! ```rust,no_run
//! use docxmerge::{MergeSession, Selector};
//!
//! # fn main() -> Result<(), docxmerge::MergeError> {
//! let mut session = MergeSession::new();
//! session.select_template("contract.docx").select_dataset("customers.xlsx");
//! session.load()?;
//!
//! session.set_selector("Customer", Selector::Column("Company".to_string()))?;
//! session.set_selector("Remarks", Selector::LeaveEmpty)?;
//! session.set_selector("Date", Selector::CurrentDate)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Filenames
//!
//! ```rust
//! use docxmerge::{clean_filename, extract_placeholders, Cell, Dataset, validation_message};
//!
//! let dataset = Dataset::new("customers.xlsx", vec![Some("Name".to_string())], vec![vec![Cell::from("Acme")]]);
//!
//! assert_eq!(extract_placeholders("{ Name } contract"), vec!["Name"]);
//! assert!(validation_message("{Name} contract", &dataset).is_empty());
//! assert!(validation_message("{Nope}", &dataset).starts_with("Unknown column: {Nope}"));
//! assert_eq!(clean_filename("a/b?.docx"), "ab.docx");
//! ```

mod api;
mod builder;
mod error;
mod filename;
mod formatter;
mod mapper;
mod output;
mod parser;
mod placeholder;
mod progress;
mod resolver;
mod sanitize;
mod security;
mod session;
mod types;

// 公開API
pub use api::{
    Selector, SheetSelector, DEFAULT_FIELD_DATE_FORMAT, DEFAULT_FILE_DATE_FORMAT,
    FILENAME_DEFAULT_TEXT, ILLEGAL_CHARACTERS, TEMP_DIR_NAME,
};
pub use builder::{Generator, GeneratorBuilder};
pub use error::MergeError;
pub use filename::{
    generate_filename, help_text, is_default_template, validate_template, validation_message,
};
pub use mapper::resolve_row;
pub use output::{FormatConverter, SofficeConverter};
pub use parser::DocxTemplate;
pub use placeholder::{extract_placeholders, unknown_columns};
pub use progress::{LogProgress, ProgressSink};
pub use resolver::{default_for, FieldMapping};
pub use sanitize::{clean_filename, contains_illegal_chars, detect_illegal_chars};
pub use session::{MergeSession, SessionState};
pub use types::{BatchReport, Cell, Dataset};

/// 表データファイルを読み込む
///
/// # 引数
///
/// * `path` - XLSX/XLS/ODSファイルのパス
/// * `sheet` - 読み込むシート
pub fn load_dataset(
    path: impl AsRef<std::path::Path>,
    sheet: &SheetSelector,
) -> Result<Dataset, MergeError> {
    parser::load_dataset(path.as_ref(), sheet)
}
