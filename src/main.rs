//! Council doctrine engine CLI.
//!
//! Two entry commands (§6): `counsel` and `outcome`. `ingest-book` is
//! the ambient helper that makes the ingestion pipeline in §4.1
//! reachable at all.

use anyhow::{anyhow, Result};
use counsel_engine::calibration::calibrate;
use counsel_engine::context::Context;
use counsel_engine::debate::conduct_debate;
use counsel_engine::domain::Domain;
use counsel_engine::ingest::progress::ProgressLedger;
use counsel_engine::ingest::IngestPipeline;
use counsel_engine::patterns::detect_patterns;
use counsel_engine::retriever::{retrieve_for_minister, RetrievedSet};
use counsel_engine::router::{route, DecisionContext, RoutedMode};
use counsel_engine::synthesizer::synthesize;
use counsel_engine::types::*;
use counsel_engine::war::{book_retrieval_bias, constraint_gate, select_council, speech_filter, WarGoal};
use std::collections::{BTreeSet, HashSet};
use std::io::{self, BufRead, Write};
use uuid::Uuid;

const RETRIEVAL_K: usize = 5;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();
    let code = match args.get(1).map(|s| s.as_str()) {
        Some("counsel") => run_counsel(&args[2..]).await,
        Some("outcome") => run_outcome(&args[2..]).await,
        Some("ingest-book") => run_ingest_book(&args[2..]).await,
        _ => {
            eprintln!("Usage:");
            eprintln!("  counsel <quick|normal|war> --domain D [--stakes S] [--urgency F] [--emotional-load F] [--reversibility R] [--constraints C1,C2] [--analyze-patterns] [--log-memory]");
            eprintln!("  outcome <event_id> --mode {{quick|normal|war}}");
            eprintln!("  ingest-book <pdf_text_path> <book_id> [--version N]");
            Ok(2)
        }
    };

    match code {
        Ok(c) => std::process::exit(c),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(2);
        }
    }
}

fn flag_value<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

fn has_flag(args: &[String], name: &str) -> bool {
    args.iter().any(|a| a == name)
}

fn parse_mode(s: &str) -> Result<Mode> {
    match s {
        "quick" => Ok(Mode::Quick),
        "normal" => Ok(Mode::Normal),
        "war" => Ok(Mode::War),
        other => Err(anyhow!("unknown mode '{other}', expected quick|normal|war")),
    }
}

fn parse_reversibility(s: &str) -> Result<Reversibility> {
    match s {
        "reversible" => Ok(Reversibility::Reversible),
        "partially_reversible" => Ok(Reversibility::PartiallyReversible),
        "irreversible" => Ok(Reversibility::Irreversible),
        other => Err(anyhow!("unknown reversibility '{other}'")),
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// `counsel <mode> ...` (§6): prompts for a free-text situation,
/// prints a structured verdict. Exit 0 on success, 2 on invalid
/// arguments, 3 if war mode's constraint gate blocks the goal.
async fn run_counsel(args: &[String]) -> Result<i32> {
    let mode_str = match args.first() {
        Some(m) => m.clone(),
        None => return Err(anyhow!("counsel requires a mode: quick|normal|war")),
    };
    let mode = parse_mode(&mode_str)?;

    let domain_str = flag_value(args, "--domain").ok_or_else(|| anyhow!("--domain is required"))?;
    let domain = Domain::parse(domain_str).ok_or_else(|| anyhow!("unknown domain '{domain_str}'"))?;

    let stakes = flag_value(args, "--stakes").map(String::from);
    let urgency: f64 = flag_value(args, "--urgency").and_then(|v| v.parse().ok()).unwrap_or(0.3);
    let emotional_load: f64 = flag_value(args, "--emotional-load").and_then(|v| v.parse().ok()).unwrap_or(0.3);
    let reversibility = match flag_value(args, "--reversibility") {
        Some(r) => Some(parse_reversibility(r)?),
        None => None,
    };
    let constraints_flag: Vec<String> = flag_value(args, "--constraints")
        .map(|s| s.split(',').map(|c| c.trim().to_string()).filter(|c| !c.is_empty()).collect())
        .unwrap_or_default();
    let analyze_patterns = has_flag(args, "--analyze-patterns");
    let log_memory = has_flag(args, "--log-memory");

    let situation = prompt("Describe the situation")?;
    if situation.is_empty() {
        return Err(anyhow!("a situation description is required"));
    }

    let config = counsel_engine::config::Config::from_env();
    std::fs::create_dir_all(&config.data_dir)?;
    let ctx = Context::bootstrap(config)?;

    // Quick's risk score is the mean of urgency and emotional load
    // (§9 open question: not otherwise defined); see DESIGN.md.
    let risk_score = (urgency + emotional_load) / 2.0;
    let routed = route(&DecisionContext { requested_mode: mode, risk_score, reversibility });

    if matches!(routed, RoutedMode::Normal) && matches!(mode, Mode::Quick) {
        println!("(quick escalated to normal: risk score {risk_score:.2} exceeded the threshold)");
    }

    if matches!(mode, Mode::War) {
        let goal = WarGoal {
            goal: situation.clone(),
            domain,
            reversibility: reversibility.unwrap_or(Reversibility::PartiallyReversible),
            urgency,
            emotional_load,
        };
        let gate = constraint_gate(&goal);
        if let counsel_engine::war::Feasibility::Blocked { matched_signal } = &gate.feasibility {
            println!("BLOCKED: forbidden-intent signal matched: '{matched_signal}'");
            println!("Recommended posture: {}", gate.recommended_posture);
            return Ok(3);
        }
    }

    let mut domain_tags = BTreeSet::new();
    domain_tags.insert(domain);

    let ministers: Vec<MinisterId> = if matches!(mode, Mode::War) {
        select_council(&domain_tags).selected
    } else {
        MinisterId::ALL
            .into_iter()
            .filter(|m| ctx.ministers.binding(*m).allowed_domains.contains(&domain))
            .collect()
    };

    let book_filter: Option<HashSet<BookId>> = if matches!(mode, Mode::War) {
        let books: Vec<BookMetadata> = ctx.books.all_books().into_iter().cloned().collect();
        let scored = book_retrieval_bias(&books);
        Some(scored.into_iter().map(|b| b.book_id).collect())
    } else {
        None
    };

    let mut positions = Vec::with_capacity(ministers.len());
    for minister in &ministers {
        let retrieved: RetrievedSet = retrieve_for_minister(
            &ctx.ministers,
            ctx.embedder.as_ref(),
            ctx.store.as_ref(),
            *minister,
            &situation,
            RETRIEVAL_K,
            mode,
            book_filter.as_ref(),
        )
        .await?;
        let position = synthesize(ctx.llm.as_ref(), *minister, &situation, &retrieved).await?;
        positions.push(position);
    }

    let mut proceedings = conduct_debate(positions);
    if !constraints_flag.is_empty() {
        if let Some(verdict) = proceedings.tribunal_verdict.as_mut() {
            verdict.constraints.extend(constraints_flag.iter().cloned());
        }
    }

    println!("\n=== COUNCIL VERDICT ({}) ===", mode.as_str());
    println!("Domain: {domain}");
    for position in &proceedings.positions {
        let justification = if matches!(mode, Mode::War) {
            speech_filter(position.minister, &position.justification).filtered
        } else {
            position.justification.clone()
        };
        println!(
            "  [{}] {} (confidence {:.0}%): {}",
            position.stance.as_str(),
            position.minister,
            position.confidence * 100.0,
            justification
        );
    }
    if !proceedings.conflicts.is_empty() {
        println!("Conflicts:");
        for conflict in &proceedings.conflicts {
            println!("  {:?} [{:?}]: {}", conflict.kind, conflict.severity, conflict.reason);
        }
    }
    if let Some(verdict) = &proceedings.tribunal_verdict {
        println!("Tribunal: {:?} — {}", verdict.decision, verdict.reasoning);
    }
    if !proceedings.flagged_low_confidence.is_empty() {
        println!(
            "Not authoritative (confidence below threshold): {}",
            proceedings
                .flagged_low_confidence
                .iter()
                .map(|m| m.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    println!("Final verdict: {}", proceedings.final_verdict);

    let illusions_detected: Vec<String> = proceedings
        .positions
        .iter()
        .flat_map(|p| p.violations.clone())
        .collect();
    let tribunal_decision = proceedings.tribunal_verdict.as_ref().map(|v| v.decision);

    let event = DecisionEvent {
        event_id: Uuid::new_v4(),
        timestamp: chrono::Utc::now(),
        domain,
        stakes,
        emotional_load,
        urgency,
        ministers_called: ministers,
        verdict_summary: proceedings.final_verdict.clone(),
        posture: format!("{tribunal_decision:?}"),
        illusions_detected,
        contradictions_found: proceedings.conflicts.len() as u32,
        mode,
        sovereign_action: None,
        action_followed_counsel: None,
        override_reason: None,
    };
    ctx.ledger.append_event(&event)?;

    if log_memory {
        println!("event_id: {}", event.event_id);
    }

    if analyze_patterns {
        let events = ctx.ledger.all_events()?;
        let outcomes = ctx.ledger.all_outcomes()?;
        let patterns = detect_patterns(&events, &outcomes);
        println!("\n=== PATTERNS ({}) ===", patterns.len());
        for pattern in &patterns {
            println!("  {:?}: {} (x{})", pattern.kind, pattern.description, pattern.frequency);
        }
    }

    Ok(0)
}

/// `outcome <event_id> --mode M` (§6): prompts for result/damage/
/// benefit/lessons, appends an Outcome, recomputes patterns and
/// calibration, prints a learning summary.
async fn run_outcome(args: &[String]) -> Result<i32> {
    let event_id_str = match args.first() {
        Some(id) => id,
        None => return Err(anyhow!("outcome requires an event_id")),
    };
    let event_id = Uuid::parse_str(event_id_str)?;
    let mode_str = flag_value(args, "--mode").ok_or_else(|| anyhow!("--mode is required"))?;
    let mode = parse_mode(mode_str)?;

    let ctx = Context::bootstrap(counsel_engine::config::Config::from_env())?;
    let event = ctx
        .ledger
        .get_event(event_id)?
        .ok_or_else(|| anyhow!("no ledger event with id {event_id}"))?;
    if event.mode != mode {
        return Err(anyhow!(
            "event {event_id} was counseled in {:?} mode, not {:?}",
            event.mode,
            mode
        ));
    }

    let result_str = prompt("Result (success|partial|failure)")?;
    let result = match result_str.as_str() {
        "success" => OutcomeResult::Success,
        "partial" => OutcomeResult::Partial,
        "failure" => OutcomeResult::Failure,
        other => return Err(anyhow!("unknown result '{other}'")),
    };
    let damage: f64 = prompt("Damage (0.0-1.0)")?.parse().unwrap_or(0.0);
    let benefit: f64 = prompt("Benefit (0.0-1.0)")?.parse().unwrap_or(0.0);
    let lessons_str = prompt("Lessons (comma-separated)")?;
    let lessons: Vec<String> = lessons_str
        .split(',')
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();

    let outcome = Outcome {
        event_id,
        resolved_at: chrono::Utc::now(),
        result,
        damage: damage.clamp(0.0, 1.0),
        benefit: benefit.clamp(0.0, 1.0),
        lessons,
    };
    ctx.ledger.append_outcome(&outcome)?;

    let events = ctx.ledger.all_events()?;
    let outcomes = ctx.ledger.all_outcomes()?;
    let patterns = detect_patterns(&events, &outcomes);
    ctx.ledger.replace_patterns(&patterns)?;

    let prior = ctx
        .ledger
        .get_calibration("n", Some(event.domain))?
        .unwrap_or_else(|| Calibration::baseline("n", Some(event.domain)));
    let next = calibrate(&prior, &patterns);
    ctx.ledger.upsert_calibration(&next)?;

    println!("\n=== LEARNING SUMMARY ===");
    println!("Outcome recorded: {result_str} (damage {damage:.2}, benefit {benefit:.2})");
    println!("Patterns detected: {}", patterns.len());
    for pattern in &patterns {
        println!("  {:?}: {}", pattern.kind, pattern.description);
    }
    println!(
        "Calibration for {}: caution {:.2} -> {:.2}, urgency_threshold {:.2} -> {:.2}, bluntness {:.2} -> {:.2}",
        event.domain, prior.caution, next.caution, prior.urgency_threshold, next.urgency_threshold, prior.bluntness, next.bluntness
    );

    Ok(0)
}

/// `ingest-book <pdf_text_path> <book_id> [--version N]`: the
/// ambient helper command that makes §4.1 reachable from the CLI.
async fn run_ingest_book(args: &[String]) -> Result<i32> {
    let path = args.first().ok_or_else(|| anyhow!("ingest-book requires a text file path"))?;
    let book_id = args.get(1).ok_or_else(|| anyhow!("ingest-book requires a book_id"))?;
    let version: u32 = flag_value(args, "--version").and_then(|v| v.parse().ok()).unwrap_or(1);

    let book_text = std::fs::read_to_string(path)?;
    let config = counsel_engine::config::Config::from_env();
    std::fs::create_dir_all(config.state_dir())?;
    std::fs::create_dir_all(config.vector_store_dir())?;

    let ctx = Context::bootstrap(config.clone())?;
    let progress = ProgressLedger::load(&config.progress_ledger_path())?;
    let pipeline = IngestPipeline::new(
        ctx.llm.clone(),
        ctx.embedder.clone(),
        ctx.store.clone(),
        progress,
        config.embed_concurrency,
    );

    let outcome = pipeline.ingest_book(&config, book_id, &book_text, version).await?;
    println!(
        "ingested {book_id}: {} chunks total, {} inserted, {} skipped (duplicate)",
        outcome.total, outcome.inserted, outcome.skipped_duplicate
    );
    if !outcome.unresolved_chapters.is_empty() {
        println!("unresolved chapters (retry on next run): {:?}", outcome.unresolved_chapters);
        // §4.1 Failure Model / §7: exit non-zero at phase end if any
        // unit is unresolved, rather than reporting success.
        return Ok(1);
    }

    Ok(0)
}
