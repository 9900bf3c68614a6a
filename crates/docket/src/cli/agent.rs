//! The `docket agent` command for the agentic pipeline variant.
//!
//! OCR runs first (the tools need the text), then an LLM with
//! `extractor_ai` and `reviewer_ai` tools decides the call order. The
//! output JSON combines each field's extracted value with its review
//! verdict.

use anyhow::Context;
use clap::Args;
use docket_core::{Config, Document, DocumentAgent, ImageInput, OcrEngineFactory};
use indicatif::ProgressBar;
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;

/// Arguments for the `agent` command.
#[derive(Args, Debug)]
pub struct AgentArgs {
    /// Document image to process
    #[arg(required = true)]
    pub input: PathBuf,

    /// Fields to extract (comma-separated)
    #[arg(short, long, required = true, value_delimiter = ',')]
    pub fields: Vec<String>,

    /// Output file for the combined JSON (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

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

/// Execute the agent command.
pub async fn execute(args: AgentArgs, mut config: Config) -> anyhow::Result<()> {
    if let Some(engine) = &args.ocr {
        config.ocr.engine = engine.clone();
    }

    let bytes = std::fs::read(&args.input)
        .with_context(|| format!("failed to read document {:?}", args.input))?;
    let document = Document::new(
        args.input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| args.input.display().to_string()),
        bytes,
    );

    let engine = OcrEngineFactory::create(&config.ocr)?;
    let agent = DocumentAgent::from_config(&config)?;

    let spinner = stage_spinner(format!("Running OCR ({})...", engine.name()));
    let ocr_text = docket_core::ocr::extract_text(engine.as_ref(), &document.bytes).await;
    spinner.finish_and_clear();
    let ocr_text = ocr_text?;
    tracing::info!("OCR extracted {} character(s)", ocr_text.len());

    let image = (!args.no_image).then(|| ImageInput::from_document(&document));

    let spinner = stage_spinner("Agent working (extract + review)...".to_string());
    let outcome = agent.run(&args.fields, &ocr_text, image.as_ref()).await;
    spinner.finish_and_clear();
    let outcome = outcome?;
    tracing::info!("Agent finished in {} step(s)", outcome.steps);

    // Combine value + verdict per field, the agent's output contract
    let combined: serde_json::Map<String, serde_json::Value> = outcome
        .extraction
        .iter()
        .map(|(field, value)| {
            let review = outcome.review.get(field);
            (
                field.clone(),
                json!({
                    "value": value,
                    "status": review.map(|r| r.status),
                    "feedback": review.map(|r| r.feedback.as_str()).unwrap_or(""),
                }),
            )
        })
        .collect();

    let pretty = config.output.pretty && !args.compact;
    let rendered = docket_core::output::to_json(&combined, pretty)?;
    if let Some(path) = &args.output {
        std::fs::write(path, format!("{rendered}\n"))
            .with_context(|| format!("failed to write {:?}", path))?;
        tracing::info!("Agent result written to {:?}", path);
    } else {
        println!("{rendered}");
    }

    Ok(())
}

fn stage_spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_are_required_and_split() {
        use clap::Parser;

        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            args: AgentArgs,
        }

        let parsed = Wrapper::parse_from([
            "test",
            "scan.png",
            "--fields",
            "invoice_number,total",
        ]);
        assert_eq!(
            parsed.args.fields,
            vec!["invoice_number".to_string(), "total".to_string()]
        );

        assert!(Wrapper::try_parse_from(["test", "scan.png"]).is_err());
    }
}
