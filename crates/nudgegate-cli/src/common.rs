//! Shared service wiring and boundary text for the CLI commands.

use std::sync::Arc;

use nudgegate_core::settings::{keys, QuietHours};
use nudgegate_core::{Database, FocusMonitor, Gateway, MemoryService, Mode, ReasonCode};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

pub struct Services {
    pub db: Arc<Database>,
    pub gateway: Gateway,
    pub monitor: FocusMonitor,
    pub memory: MemoryService,
}

/// Opens the shared database and builds the three core services.
///
/// No frontmost-app provider is wired in here: hosts with OS
/// integration inject one; everywhere else the monitor reports itself
/// disabled and enrichment falls back to stored focus events.
pub fn open_services() -> Result<Services, Box<dyn std::error::Error>> {
    let db = Arc::new(Database::open()?);

    let night_window = db
        .get_setting(keys::QUIET_HOURS)?
        .and_then(|raw| QuietHours::parse(&raw))
        .unwrap_or_default();

    Ok(Services {
        gateway: Gateway::new(db.clone()),
        monitor: FocusMonitor::new(db.clone(), None),
        memory: MemoryService::with_night_window(db.clone(), night_window),
        db,
    })
}

pub fn parse_mode(raw: &str) -> Result<Mode, Box<dyn std::error::Error>> {
    match raw.trim().to_uppercase().as_str() {
        "SILENT" => Ok(Mode::Silent),
        "LIGHT" => Ok(Mode::Light),
        "ACTIVE" => Ok(Mode::Active),
        other => Err(format!("unknown mode '{other}' (expected SILENT, LIGHT or ACTIVE)").into()),
    }
}

/// User-facing text for a decision reason. This is the only place
/// reason codes become prose.
pub fn reason_text(reason: ReasonCode) -> &'static str {
    match reason {
        ReasonCode::Allow => "allowed",
        ReasonCode::InvalidActionType => "the suggested action type was not recognized",
        ReasonCode::InvalidRiskLevel => "the suggested risk level was not recognized",
        ReasonCode::InvalidConfidence => "the suggestion carried an invalid confidence",
        ReasonCode::HighRiskBlocked => "a high-risk action was blocked by the safety gateway",
        ReasonCode::LowQualityAction => "the suggestion was judged too low-quality to show",
        ReasonCode::ModeSilentOverride => "silent mode allows no interventions",
        ReasonCode::CooldownActive => "a recent intervention is still cooling down",
        ReasonCode::BudgetExhausted => "the intervention budget is exhausted",
    }
}
