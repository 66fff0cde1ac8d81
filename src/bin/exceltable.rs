use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::ValueEnum;
use exceltable::spreadsheet::open_spreadsheet;
use exceltable::table::range::Selection;
use exceltable::table::request::parse_widths;
use exceltable::table::request::HeaderSpec;
use exceltable::ExtractRequest;
use exceltable::SheetSelector;
use exceltable::Source;
use exceltable::Table;
use std::io::Write;

#[derive(Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(about = "Extract a cell range from an XLSX/XLSB/XLS/ODS workbook as a styled table.")]
struct Args {
    /// Workbook path, `file://` or `http(s)://` URL, or `-` for standard input.
    file: String,

    /// Cell range such as `A1:C4`, `B2:` or `1,1:3,4`. Either end may be left open.
    #[arg(long, default_value = ":")]
    selection: String,

    /// Sheet index (zero-based) or sheet name.
    #[arg(long, default_value = "0")]
    sheet: String,

    /// Number of header rows, or comma separated column names.
    #[arg(long, default_value = "0")]
    header: String,

    /// Comma separated column widths, one per selected column.
    #[arg(long, default_value = "")]
    widths: String,

    /// Name used to detect the format when reading standard input.
    #[arg(long, default_value = "stdin.xlsx")]
    stdin_name: String,

    /// List the sheet names instead of extracting a range.
    #[arg(long)]
    list_sheets: bool,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let source = read_source(&args)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    if args.list_sheets {
        let spreadsheet = open_spreadsheet(&source).with_context(|| format!("open {}", source))?;
        for (index, name) in spreadsheet.sheet_names().iter().enumerate() {
            writeln!(out, "{index}\t{name}")?;
        }
        return Ok(());
    }

    let request = ExtractRequest {
        source: Some(source),
        sheet: SheetSelector::parse(&args.sheet),
        widths: parse_widths(&args.widths)?,
        ..ExtractRequest::default()
    }
    .selection(Selection::parse(&args.selection))
    .header(HeaderSpec::parse(&args.header));

    let table = exceltable::extract(&request)
        .with_context(|| format!("extract {} from {}", args.selection, args.file))?;

    match args.format {
        OutputFormat::Json if args.pretty => serde_json::to_writer_pretty(&mut out, &table)?,
        OutputFormat::Json => serde_json::to_writer(&mut out, &table)?,
        OutputFormat::Text => write_text(&mut out, &table)?,
    }
    if matches!(args.format, OutputFormat::Json) {
        writeln!(out)?;
    }
    Ok(())
}

fn read_source(args: &Args) -> Result<Source> {
    if args.file == "-" {
        let stdin = std::io::stdin();
        return Source::from_reader(&args.stdin_name, stdin.lock()).context("read standard input");
    }
    Source::parse(&args.file).with_context(|| format!("invalid workbook location {}", args.file))
}

fn write_text(out: &mut impl Write, table: &Table) -> Result<()> {
    let percents = table.relative_widths();
    writeln!(
        out,
        "# {}:{} widths {}",
        table.range.from,
        table.range.to.map(|to| to.to_string()).unwrap_or_default(),
        percents
            .iter()
            .map(|percent| format!("{percent}%"))
            .collect::<Vec<_>>()
            .join(" ")
    )?;
    for (index, row) in table.all_rows().enumerate() {
        let texts: Vec<String> = row.iter().map(|cell| cell.text()).collect();
        writeln!(out, "{}", texts.join("\t"))?;
        if index + 1 == table.headers.len() {
            let rule: Vec<String> = row.iter().map(|cell| "-".repeat(cell.text().chars().count().max(3))).collect();
            writeln!(out, "{}", rule.join("\t"))?;
        }
    }
    Ok(())
}
