//! docxmerge command-line tool
//!
//! Fills a Word template with the rows of a spreadsheet and converts the results to PDF.
//!
//! # Usage
//!
//! List the merge fields of a template:
//! ```sh
//! docxmerge fields --template contract.docx
//! ```
//!
//! Show the columns usable in filenames:
//! ```sh
//! docxmerge columns --data customers.xlsx
//! ```
//!
//! Generate one PDF per row:
//! ```sh
//! docxmerge generate --template contract.docx --data customers.xlsx --output out \
//!     --filename "{Name} contract" \
//!     --map Customer=Name --map Remarks=@empty --map Date=@date
//! ```

use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use log::info;
use std::fs;
use std::path::PathBuf;
use std::process;

use docxmerge::{
    help_text, load_dataset, DocxTemplate, FieldMapping, GeneratorBuilder, LogProgress,
    MergeError, MergeSession, Selector, SheetSelector, SofficeConverter,
    DEFAULT_FIELD_DATE_FORMAT, DEFAULT_FILE_DATE_FORMAT, TEMP_DIR_NAME,
};

/// Mail merge from spreadsheets into Word templates, with bulk PDF conversion
#[derive(Parser, Debug)]
#[command(name = "docxmerge", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the merge fields of a Word template
    Fields {
        /// Word template (.docx)
        #[arg(short, long, value_name = "DOCX")]
        template: PathBuf,
    },

    /// Show the columns of a spreadsheet that can be used in filenames
    Columns {
        /// Spreadsheet (.xlsx, .xls, .ods)
        #[arg(short, long, value_name = "SPREADSHEET")]
        data: PathBuf,

        #[command(flatten)]
        sheet: SheetArgs,
    },

    /// Generate one document per row and convert them to PDF
    Generate(GenerateArgs),
}

#[derive(Args, Debug)]
struct SheetArgs {
    /// Worksheet name (default: first sheet)
    #[arg(long, value_name = "NAME", conflicts_with = "sheet_index")]
    sheet: Option<String>,

    /// Worksheet index, 0-based
    #[arg(long, value_name = "N")]
    sheet_index: Option<usize>,
}

impl SheetArgs {
    fn selector(&self) -> SheetSelector {
        match (&self.sheet, self.sheet_index) {
            (Some(name), _) => SheetSelector::Name(name.clone()),
            (None, Some(index)) => SheetSelector::Index(index),
            (None, None) => SheetSelector::First,
        }
    }
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Word template (.docx)
    #[arg(short, long, value_name = "DOCX")]
    template: PathBuf,

    /// Spreadsheet (.xlsx, .xls, .ods)
    #[arg(short, long, value_name = "SPREADSHEET")]
    data: PathBuf,

    /// Output folder
    #[arg(short, long, value_name = "DIR")]
    output: PathBuf,

    /// Filename template; {column} is replaced by the row's value
    #[arg(short, long, value_name = "TEMPLATE", default_value = "")]
    filename: String,

    /// Data source of a merge field: FIELD=COLUMN, FIELD=@empty or FIELD=@date
    ///
    /// Fields not given here keep their default (closest matching column).
    #[arg(short, long = "map", value_name = "FIELD=SOURCE", value_parser = parse_map)]
    map: Vec<(String, Selector)>,

    /// JSON file with the field mapping, e.g. {"Customer": {"column": "Name"}, "Note": "leave_empty"}
    #[arg(long, value_name = "JSON")]
    mapping: Option<PathBuf>,

    #[command(flatten)]
    sheet: SheetArgs,

    /// LibreOffice executable used for the PDF conversion
    #[arg(long, value_name = "PROGRAM", default_value = "soffice")]
    soffice: String,

    /// Name of the scratch folder created inside the output folder
    #[arg(long, value_name = "NAME", default_value = TEMP_DIR_NAME)]
    scratch_dir: String,

    /// Date format inserted for @date fields
    #[arg(long, value_name = "FORMAT", default_value = DEFAULT_FIELD_DATE_FORMAT)]
    field_date_format: String,

    /// Date format prefixed to filenames
    #[arg(long, value_name = "FORMAT", default_value = DEFAULT_FILE_DATE_FORMAT)]
    file_date_format: String,
}

/// `FIELD=SOURCE`を解析する
fn parse_map(arg: &str) -> Result<(String, Selector), String> {
    let (field, source) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=SOURCE, got '{}'", arg))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("missing field name in '{}'", arg));
    }

    let selector = match source {
        "@empty" => Selector::LeaveEmpty,
        "@date" => Selector::CurrentDate,
        column => Selector::Column(column.to_string()),
    };
    Ok((field.to_string(), selector))
}

fn main() {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Fields { template } => list_fields(template),
        Commands::Columns { data, sheet } => list_columns(data, &sheet.selector()),
        Commands::Generate(args) => generate(args),
    };

    if let Err(e) = result {
        handle_error(e);
        process::exit(1);
    }
}

fn list_fields(template: PathBuf) -> Result<(), MergeError> {
    let template = DocxTemplate::open(template)?;
    for field in template.merge_fields() {
        println!("{}", field);
    }
    Ok(())
}

fn list_columns(data: PathBuf, sheet: &SheetSelector) -> Result<(), MergeError> {
    let dataset = load_dataset(&data, sheet)?;
    println!("{}", help_text(Some(&dataset)));
    println!("\n{} data row(s)", dataset.len());
    Ok(())
}

fn generate(args: GenerateArgs) -> Result<(), MergeError> {
    let mut session = MergeSession::new();
    session
        .select_template(&args.template)
        .select_dataset(&args.data)
        .select_output_dir(&args.output)
        .select_sheet(args.sheet.selector());
    session.load()?;

    if let Some(path) = &args.mapping {
        let text = fs::read_to_string(path)?;
        let mapping: FieldMapping = serde_json::from_str(&text).map_err(|e| {
            MergeError::Config(format!("Invalid mapping file {}: {}", path.display(), e))
        })?;
        for (field, selector) in mapping.iter() {
            session.set_selector(field, selector.clone())?;
        }
    }
    for (field, selector) in &args.map {
        session.set_selector(field, selector.clone())?;
    }

    for (field, selector) in session.mapping().iter() {
        info!("{} <= {}", field, selector);
    }

    let builder = GeneratorBuilder::new()
        .with_filename_template(args.filename)
        .with_scratch_dir_name(args.scratch_dir)
        .with_field_date_format(args.field_date_format)
        .with_file_date_format(args.file_date_format);
    let converter = SofficeConverter::new().with_program(args.soffice);

    let report = session.generate(builder, &converter, &mut LogProgress)?;
    println!("{}", report.summary());
    Ok(())
}

fn handle_error(error: MergeError) {
    match error {
        MergeError::MissingInput(msg) | MergeError::Validation(msg) => {
            eprintln!("Error: {}", msg);
        }
        MergeError::Io(io_err) => {
            eprintln!("I/O Error: {}", io_err);
            eprintln!("Please check that the file exists and you have permission to access it.");
        }
        MergeError::Spreadsheet(err) => {
            eprintln!("Spreadsheet Error: {}", err);
            eprintln!("The file may not be a valid spreadsheet or may be corrupted.");
        }
        MergeError::Zip(msg) => {
            eprintln!("ZIP Archive Error: {}", msg);
            eprintln!("The template may be corrupted or not a valid .docx file.");
        }
        MergeError::Template(msg) => {
            eprintln!("Template Error: {}", msg);
        }
        MergeError::Config(msg) => {
            eprintln!("Configuration Error: {}", msg);
            eprintln!("Please check the date formats, scratch folder name and mapping file.");
        }
        MergeError::Conversion(msg) => {
            eprintln!("Conversion Error: {}", msg);
            eprintln!("Please check that LibreOffice is installed (see --soffice).");
        }
        MergeError::SecurityViolation(msg) => {
            eprintln!("Security Violation: {}", msg);
            eprintln!("The template violates security constraints (e.g., file size limit).");
        }
        MergeError::InvalidState(msg) => {
            eprintln!("Error: {}", msg);
        }
    }
}
