//! Gateway commands: evaluate a candidate, dry-run admission, record
//! feedback, show budget status.

use std::io::Read;

use chrono::Utc;
use clap::Subcommand;
use serde_json::json;

use nudgegate_core::enrich::{enrich_context, should_auto_suggest, AutoSuggestGate};
use nudgegate_core::gateway::max_action_cost;
use nudgegate_core::model::{Action, Context, DecisionRecord};

use crate::common::{open_services, parse_mode, reason_text, CliResult};

#[derive(Subcommand)]
pub enum GateAction {
    /// Evaluate a candidate action JSON (from --candidate or stdin)
    Decide {
        /// Candidate action as JSON; reads stdin when omitted
        #[arg(long)]
        candidate: Option<String>,
        /// Interruption mode: SILENT, LIGHT or ACTIVE
        #[arg(long, default_value = "LIGHT")]
        mode: String,
        /// User text accompanying the request; empty means an
        /// auto-suggestion attempt
        #[arg(long, default_value = "")]
        text: String,
    },
    /// Dry-run admission check without spending budget
    DryRun {
        #[arg(long, default_value = "LIGHT")]
        mode: String,
        /// Hypothetical action cost; defaults to the most expensive one
        #[arg(long)]
        cost: Option<f64>,
    },
    /// Record user feedback for a past decision
    Feedback {
        request_id: String,
        /// Feedback payload, e.g. LIKE, DISLIKE, "DISLIKE: too pushy"
        feedback: String,
    },
    /// Show budgets, usage counters and cooldown state
    Status,
}

pub fn run(action: GateAction) -> CliResult {
    match action {
        GateAction::Decide {
            candidate,
            mode,
            text,
        } => decide(candidate, &mode, text),
        GateAction::DryRun { mode, cost } => dry_run(&mode, cost),
        GateAction::Feedback {
            request_id,
            feedback,
        } => record_feedback(&request_id, &feedback),
        GateAction::Status => status(),
    }
}

fn decide(candidate: Option<String>, mode: &str, text: String) -> CliResult {
    let services = open_services()?;
    let started = std::time::Instant::now();

    let mut ctx = Context {
        user_text: text,
        timestamp_ms: Utc::now().timestamp_millis(),
        mode: parse_mode(mode)?,
        ..Context::default()
    };
    enrich_context(&mut ctx, &services.db, &services.monitor, &services.memory)?;

    if ctx.is_auto_suggestion() {
        match should_auto_suggest(&services.db, &services.gateway, &ctx, Utc::now())? {
            AutoSuggestGate::Proceed => {}
            AutoSuggestGate::Throttled => {
                println!("auto-suggestion throttled: one per window");
                return Ok(());
            }
            AutoSuggestGate::Blocked(reason) => {
                println!("auto-suggestion blocked: {}", reason_text(reason));
                return Ok(());
            }
        }
    } else {
        // An active conversation is never throttled by cooldown.
        services.gateway.clear_cooldown();
    }

    let raw: Action = match candidate {
        Some(json) => serde_json::from_str(&json)?,
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            serde_json::from_str(&buffer)?
        }
    };

    let (final_action, decision) = services.gateway.evaluate(&ctx, raw.clone());
    let request_id = uuid::Uuid::new_v4().to_string();

    services.db.insert_decision(&DecisionRecord {
        request_id: request_id.clone(),
        context: ctx,
        raw_action: raw,
        final_action: final_action.clone(),
        decision: decision.clone(),
        policy_version: "policy_v0".into(),
        latency_ms: started.elapsed().as_millis() as i64,
        created_at_ms: Utc::now().timestamp_millis(),
        user_feedback: None,
    })?;

    let output = json!({
        "request_id": request_id,
        "final_action": final_action,
        "decision": decision,
        "explanation": reason_text(decision.reason),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn dry_run(mode: &str, cost: Option<f64>) -> CliResult {
    let services = open_services()?;
    let ctx = Context {
        mode: parse_mode(mode)?,
        timestamp_ms: Utc::now().timestamp_millis(),
        ..Context::default()
    };
    let cost = cost.unwrap_or_else(max_action_cost);
    let (allowed, reason) = services.gateway.can_intervene(&ctx, cost);
    if allowed {
        println!("allowed (cost {cost})");
    } else {
        println!("not allowed: {}", reason_text(reason));
    }
    Ok(())
}

fn record_feedback(request_id: &str, feedback: &str) -> CliResult {
    let services = open_services()?;
    services.db.record_feedback(request_id, feedback)?;
    services.memory.process_feedback(request_id, feedback)?;
    // Feedback is engagement: lift the cooldown for the follow-up.
    services.gateway.clear_cooldown();
    println!("feedback recorded for {request_id}");
    Ok(())
}

fn status() -> CliResult {
    let services = open_services()?;
    let status = services.gateway.status();
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
