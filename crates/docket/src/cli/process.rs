//! The `docket process` command for the linear pipeline.
//!
//! Walks one document through OCR → classify → confirm → extract →
//! review and writes the session result JSON. Field confirmation is
//! interactive on a TTY; `--fields` and `--yes` cover scripted runs.

use anyhow::Context;
use clap::Args;
use console::Style;
use dialoguer::{Input, MultiSelect};
use docket_core::{
    Classifier, Config, Document, DocumentSession, Extractor, OcrEngineFactory, Reviewer,
    ReviewStatus, SessionResult,
};
use indicatif::ProgressBar;
use std::path::PathBuf;
use std::time::Duration;

use super::theme;

/// Arguments for the `process` command.
#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Document image to process
    #[arg(required = true)]
    pub input: PathBuf,

    /// Output file for the session result JSON (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Confirm these fields instead of prompting (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    pub fields: Option<Vec<String>>,

    /// Accept the classifier's suggested fields without prompting
    #[arg(short, long)]
    pub yes: bool,

    /// OCR engine override (tesseract, http, mock)
    #[arg(long)]
    pub ocr: Option<String>,

    /// Don't attach the document image to LLM calls
    #[arg(long)]
    pub no_image: bool,

    /// Emit compact JSON instead of pretty-printed
    #[arg(long)]
    pub compact: bool,
}

/// Execute the process command.
pub async fn execute(args: ProcessArgs, mut config: Config) -> anyhow::Result<()> {
    if let Some(engine) = &args.ocr {
        config.ocr.engine = engine.clone();
    }

    let bytes = std::fs::read(&args.input)
        .with_context(|| format!("failed to read document {:?}", args.input))?;
    let file_name = args
        .input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.input.display().to_string());

    // Build every stage up front so config problems surface before any
    // network call is made
    let engine = OcrEngineFactory::create(&config.ocr)?;
    let classifier = Classifier::from_config(&config)?;
    let extractor = Extractor::from_config(&config)?;
    let reviewer = Reviewer::from_config(&config)?;

    let mut session = DocumentSession::new(Document::new(file_name, bytes));
    session.set_attach_image(!args.no_image);

    // ── OCR ────────────────────────────────────────────────────────────
    let spinner = stage_spinner(format!("Running OCR ({})...", engine.name()));
    let ocr_result = session.run_ocr(engine.as_ref()).await;
    spinner.finish_and_clear();
    let ocr_chars = ocr_result?.len();
    eprintln!("  {} OCR extracted {ocr_chars} character(s)", ok_mark());

    // ── Classification ─────────────────────────────────────────────────
    let spinner = stage_spinner("Classifying document...".to_string());
    let classify_result = session.classify(&classifier).await;
    spinner.finish_and_clear();
    let suggested = classify_result?.clone();
    eprintln!(
        "  {} Detected type: {} ({} suggested field(s))",
        ok_mark(),
        Style::new().for_stderr().cyan().apply_to(&suggested.label),
        suggested.fields.len()
    );

    // ── Field confirmation ─────────────────────────────────────────────
    let confirmed = match &args.fields {
        Some(fields) => fields.clone(),
        None if args.yes => suggested.fields.clone(),
        None => confirm_fields_interactive(&suggested.fields)?,
    };
    session.confirm_fields(confirmed)?;

    // ── Extraction ─────────────────────────────────────────────────────
    let spinner = stage_spinner("Extracting fields...".to_string());
    let extract_result = session.extract(&extractor).await;
    spinner.finish_and_clear();
    let found = extract_result?.values().filter(|v| v.is_some()).count();
    eprintln!("  {} Extraction complete ({found} value(s) found)", ok_mark());

    // ── Review ─────────────────────────────────────────────────────────
    let spinner = stage_spinner("Reviewing extraction...".to_string());
    let review_result = session.review(&reviewer).await;
    spinner.finish_and_clear();
    review_result?;
    eprintln!("  {} Review complete", ok_mark());

    let result = session.finalize()?;
    print_summary(&result);
    write_result(&result, &args, &config)
}

/// Interactive field confirmation: preselected suggestions plus a free
/// text entry for fields the classifier missed.
fn confirm_fields_interactive(suggested: &[String]) -> anyhow::Result<Vec<String>> {
    if !console::user_attended_stderr() {
        tracing::warn!("No TTY available, accepting suggested fields");
        return Ok(suggested.to_vec());
    }

    let theme = theme::docket_theme();

    let mut confirmed: Vec<String> = if suggested.is_empty() {
        Vec::new()
    } else {
        let selection = handle_interrupt(
            MultiSelect::with_theme(&theme)
                .with_prompt("Select/confirm fields for extraction")
                .items(suggested)
                .defaults(&vec![true; suggested.len()])
                .interact(),
        )?
        .ok_or_else(|| anyhow::anyhow!("field confirmation cancelled"))?;
        selection.into_iter().map(|i| suggested[i].clone()).collect()
    };

    let extra = handle_interrupt(
        Input::<String>::with_theme(&theme)
            .with_prompt("Add custom fields (comma-separated, empty to skip)")
            .allow_empty(true)
            .interact_text(),
    )?
    .ok_or_else(|| anyhow::anyhow!("field confirmation cancelled"))?;

    confirmed.extend(
        extra
            .split(',')
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty()),
    );

    Ok(confirmed)
}

/// Convert a dialoguer result into `Ok(Some(value))` on success, `Ok(None)` on
/// interrupt (Ctrl+C / terminal disconnect), and `Err` for other I/O failures.
fn handle_interrupt<T>(result: dialoguer::Result<T>) -> anyhow::Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(dialoguer::Error::IO(e)) if e.kind() == std::io::ErrorKind::Interrupted => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Per-field summary table on stderr.
fn print_summary(result: &SessionResult) {
    let label = Style::new().for_stderr().bold();
    let pass = Style::new().for_stderr().green();
    let fail = Style::new().for_stderr().red();
    let dim = Style::new().for_stderr().dim();

    eprintln!();
    eprintln!(
        "  {} {}",
        label.apply_to("Document type:"),
        result.document_type.label
    );
    for field in &result.document_type.fields {
        let value = result
            .extraction
            .get(field)
            .and_then(|v| v.as_deref())
            .unwrap_or("—");
        let (mark, feedback) = match result.review.get(field) {
            Some(review) if review.status == ReviewStatus::Pass => {
                (pass.apply_to("✓").to_string(), review.feedback.clone())
            }
            Some(review) => (fail.apply_to("✗").to_string(), review.feedback.clone()),
            None => (dim.apply_to("?").to_string(), String::new()),
        };
        if feedback.is_empty() {
            eprintln!("    {mark} {:<24} {value}", format!("{field}:"));
        } else {
            eprintln!(
                "    {mark} {:<24} {value} {}",
                format!("{field}:"),
                dim.apply_to(format!("({feedback})"))
            );
        }
    }
    eprintln!();
}

/// Write the session result to the output file or stdout.
fn write_result(result: &SessionResult, args: &ProcessArgs, config: &Config) -> anyhow::Result<()> {
    let pretty = config.output.pretty && !args.compact;
    if let Some(path) = &args.output {
        docket_core::output::write_to_file(path, result, pretty)?;
        tracing::info!("Session result written to {:?}", path);
    } else {
        println!("{}", docket_core::output::to_json(result, pretty)?);
    }
    Ok(())
}

/// Spinner shown while a pipeline stage is in flight.
fn stage_spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn ok_mark() -> String {
    Style::new().for_stderr().green().apply_to("✓").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_flag_splits_on_commas() {
        use clap::Parser;

        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            args: ProcessArgs,
        }

        let parsed =
            Wrapper::parse_from(["test", "scan.png", "--fields", "invoice_number,date,total"]);
        assert_eq!(
            parsed.args.fields,
            Some(vec![
                "invoice_number".to_string(),
                "date".to_string(),
                "total".to_string()
            ])
        );
    }

    #[test]
    fn defaults_are_interactive_pretty_output() {
        use clap::Parser;

        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            args: ProcessArgs,
        }

        let parsed = Wrapper::parse_from(["test", "scan.png"]);
        assert!(!parsed.args.yes);
        assert!(!parsed.args.compact);
        assert!(!parsed.args.no_image);
        assert!(parsed.args.fields.is_none());
        assert!(parsed.args.output.is_none());
    }
}
