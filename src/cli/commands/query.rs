//! Query command - retrieve passages and citations for a question.

use console::style;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

use super::backends;
use crate::citation::CitationBuilder;
use crate::cli::ModeArg;
use crate::config::Settings;
use crate::retrieval::{
    FallbackNotice, QueryResponse, RetrievalEngine, RetrievalQuery, build_context,
};

pub struct QueryArgs {
    pub text: String,
    pub mode: ModeArg,
    pub selection: Option<String>,
    pub anchor: Option<String>,
    pub language: Option<String>,
    pub json: bool,
    pub context: bool,
}

pub async fn run(args: QueryArgs, settings: &Settings) -> anyhow::Result<ExitCode> {
    settings.validate().map_err(anyhow::Error::msg)?;
    let (embedder, store) = backends(settings)?;

    let engine = RetrievalEngine::from_settings(settings, embedder, store);
    let citations = CitationBuilder::from_config(&settings.citations);

    let query = RetrievalQuery {
        mode: args.mode.into(),
        query_text: args.text,
        selection_text: args.selection,
        anchor_document_path: args.anchor,
        requested_language: args.language,
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let outcome = match engine.retrieve_with_cancel(&query, &cancel).await {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("{} {e}", style("Retrieval failed:").red().bold());
            return Ok(ExitCode::FAILURE);
        }
    };
    let response = QueryResponse::new(&outcome, citations.build(&outcome.chunks));

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(ExitCode::SUCCESS);
    }

    for notice in &outcome.notices {
        let line = match notice {
            FallbackNotice::AnchorNotFound { reason, .. } => {
                format!("Selection not anchored ({reason}); searched the whole book")
            }
            FallbackNotice::LanguageUnsupported { requested, used } => {
                format!("Language '{requested}' is not available; showing '{used}'")
            }
            FallbackNotice::LanguageFilled {
                requested,
                used,
                requested_hits,
            } => format!("Only {requested_hits} '{requested}' results; filled with '{used}'"),
        };
        eprintln!("{} {line}", style("Note:").yellow().bold());
    }

    if response.chunks.is_empty() {
        eprintln!("No results found. Has the corpus been indexed?");
        return Ok(ExitCode::SUCCESS);
    }

    for (i, chunk) in response.chunks.iter().enumerate() {
        println!(
            "\n{}. {} (score: {:.3})",
            i + 1,
            style(&chunk.document_path).bold(),
            chunk.score
        );
        if !chunk.heading_path.is_empty() {
            println!("   Section: {}", chunk.heading_path);
        }
    }

    println!("\n{}", style("Citations:").cyan().bold());
    for citation in &response.citations {
        println!(
            "  - {} ({})\n    {}",
            citation.heading_path,
            citation.document_path,
            style(&citation.snippet).dim()
        );
    }

    if args.context {
        println!("\n{}", style("Context:").cyan().bold());
        println!("{}", build_context(&outcome, query.selection_text.as_deref()));
    }

    Ok(ExitCode::SUCCESS)
}
