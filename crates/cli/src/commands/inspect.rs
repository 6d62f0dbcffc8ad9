use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};
use serde_json::json;
use smart_query_core::EMBEDDING_DIMENSION;
use smart_query_service::{audit_catalog, MatchOutcome, PipelineConfig, VerifiedQueryMatcher};

use super::{llm_client, load_embedder, open_library};

pub(crate) async fn run_match(catalog: Option<&Path>, question: &str) -> Result<()> {
    let llm = llm_client()?;
    let config = PipelineConfig::from_env();
    let embedder = load_embedder().await?;
    let library = open_library(catalog, Some(Arc::clone(&embedder))).await?;
    let matcher = VerifiedQueryMatcher::new(
        llm,
        embedder,
        library.clone(),
        library,
        config.top_k,
        config.match_max_distance,
    );

    let candidates = matcher.candidates(question).await?;
    let outcome = matcher.select(question, &candidates).await?;

    let listed: Vec<_> = candidates
        .iter()
        .map(|c| {
            json!({
                "id": c.query.id,
                "name": c.query.name,
                "matched_question": c.matched_question,
                "distance": c.distance,
            })
        })
        .collect();
    let selection = match outcome {
        MatchOutcome::Matched(m) => json!({
            "id": m.query.id,
            "confidence": m.confidence,
            "reasoning": m.reasoning,
        }),
        MatchOutcome::NoMatch { reasoning } => json!({ "id": null, "reasoning": reasoning }),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "candidates": listed, "selection": selection }))?
    );
    Ok(())
}

/// Audits the library as stored; a JSON catalog is checked without re-embedding.
pub(crate) async fn run_check(catalog: Option<&Path>) -> Result<()> {
    let library = open_library(catalog, None).await?;
    let report = audit_catalog(library.as_ref(), EMBEDDING_DIMENSION).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.is_clean() {
        bail!(
            "catalog has {} dangling follow-up(s), {} example(s) without embedding, {} with wrong dimension",
            report.dangling_follow_ups.len(),
            report.missing_embeddings.len(),
            report.wrong_dimension.len()
        );
    }
    Ok(())
}
