//! Shared domain types: actions, contexts, decisions, and focus records.
//!
//! Everything the generator, the gateway, and the stores exchange lives
//! here. Action payloads arrive from an untrusted external generator, so
//! the enums carry an `Unknown` catch-all variant: malformed input decodes
//! cleanly and is rejected by the gateway's validation rules instead of
//! failing the request.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// User-selected interruption tolerance. Each mode has its own budget
/// ceiling in the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    Silent,
    #[default]
    Light,
    Active,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Silent => "SILENT",
            Mode::Light => "LIGHT",
            Mode::Active => "ACTIVE",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of intervention proposed by the generator.
///
/// `DoNotDisturb` is the safe no-op every rejection degrades to.
/// Deserialization goes through the string form so an unrecognized or
/// missing value decodes to `Unknown` instead of failing the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", from = "String")]
pub enum ActionType {
    DoNotDisturb,
    Encourage,
    TaskBreakdown,
    RestReminder,
    Reframe,
    /// Catch-all for unrecognized generator output.
    #[default]
    Unknown,
}

impl From<String> for ActionType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "DO_NOT_DISTURB" => ActionType::DoNotDisturb,
            "ENCOURAGE" => ActionType::Encourage,
            "TASK_BREAKDOWN" => ActionType::TaskBreakdown,
            "REST_REMINDER" => ActionType::RestReminder,
            "REFRAME" => ActionType::Reframe,
            _ => ActionType::Unknown,
        }
    }
}

impl ActionType {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::DoNotDisturb => "DO_NOT_DISTURB",
            ActionType::Encourage => "ENCOURAGE",
            ActionType::TaskBreakdown => "TASK_BREAKDOWN",
            ActionType::RestReminder => "REST_REMINDER",
            ActionType::Reframe => "REFRAME",
            ActionType::Unknown => "UNKNOWN",
        }
    }

    /// True for every action that would actually interrupt the user.
    pub fn is_intervention(self) -> bool {
        !matches!(self, ActionType::DoNotDisturb)
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generator-declared risk of showing an action. Unrecognized or
/// missing values decode to `Unknown` and are rejected by validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", from = "String")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    /// Catch-all for unrecognized generator output.
    #[default]
    Unknown,
}

impl From<String> for RiskLevel {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "LOW" => RiskLevel::Low,
            "MEDIUM" => RiskLevel::Medium,
            "HIGH" => RiskLevel::High,
            _ => RiskLevel::Unknown,
        }
    }
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Unknown => "UNKNOWN",
        }
    }
}

/// A candidate intervention produced by the external generator.
///
/// Untrusted input to the gateway. The `cost` field is whatever the
/// generator claims; admission control always prices actions from its own
/// lookup table instead.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Action {
    #[serde(default)]
    pub action_type: ActionType,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub risk_level: RiskLevel,
}

impl Action {
    /// The safe no-op action used whenever a candidate is rejected.
    pub fn do_not_disturb(message: impl Into<String>) -> Self {
        Self {
            action_type: ActionType::DoNotDisturb,
            message: message.into(),
            confidence: 1.0,
            cost: 0.0,
            risk_level: RiskLevel::Low,
        }
    }
}

/// Per-request context, owned by the caller and immutable once built.
///
/// An empty `user_text` marks an auto-suggestion request. Focus signals
/// and memory summaries are merged in by [`crate::enrich`] before the
/// generator is invoked; the gateway only reads `mode` and `timestamp_ms`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Context {
    #[serde(default)]
    pub user_text: String,
    #[serde(default)]
    pub timestamp_ms: i64,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub signals: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_state: Option<FocusState>,
    #[serde(default)]
    pub switch_count: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub profile_summary: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub memory_summary: String,
}

impl Context {
    /// True when no user text accompanied the request, i.e. the system is
    /// considering an unsolicited suggestion.
    pub fn is_auto_suggestion(&self) -> bool {
        self.user_text.trim().is_empty()
    }
}

/// Final verdict category for an evaluated candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionOutcome {
    Allow,
    Deny,
    Override,
}

impl DecisionOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            DecisionOutcome::Allow => "ALLOW",
            DecisionOutcome::Deny => "DENY",
            DecisionOutcome::Override => "OVERRIDE",
        }
    }
}

/// Machine-readable reason attached to every gateway decision.
///
/// Closed set; user-facing text is mapped at the presentation boundary,
/// never inside the admission algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    Allow,
    InvalidActionType,
    InvalidRiskLevel,
    InvalidConfidence,
    HighRiskBlocked,
    LowQualityAction,
    ModeSilentOverride,
    CooldownActive,
    BudgetExhausted,
}

impl ReasonCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ReasonCode::Allow => "allow",
            ReasonCode::InvalidActionType => "invalid_action_type",
            ReasonCode::InvalidRiskLevel => "invalid_risk_level",
            ReasonCode::InvalidConfidence => "invalid_confidence",
            ReasonCode::HighRiskBlocked => "high_risk_blocked",
            ReasonCode::LowQualityAction => "low_quality_action",
            ReasonCode::ModeSilentOverride => "mode_silent_override",
            ReasonCode::CooldownActive => "cooldown_active",
            ReasonCode::BudgetExhausted => "budget_exhausted",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One auditable admission-control verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayDecision {
    pub outcome: DecisionOutcome,
    pub reason: ReasonCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overridden_action_type: Option<ActionType>,
}

impl GatewayDecision {
    pub fn allow() -> Self {
        Self {
            outcome: DecisionOutcome::Allow,
            reason: ReasonCode::Allow,
            overridden_action_type: None,
        }
    }
}

/// Durable audit row for one evaluated request: the raw candidate, what
/// actually went out, and why. Preference memory reads these back when
/// feedback arrives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub request_id: String,
    pub context: Context,
    pub raw_action: Action,
    pub final_action: Action,
    pub decision: GatewayDecision,
    pub policy_version: String,
    pub latency_ms: i64,
    pub created_at_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_feedback: Option<String>,
}

/// Persisted hourly/daily spending counters with their calendar bucket
/// keys. Counters are only valid against a matching bucket key.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct BudgetUsage {
    pub daily_used: f64,
    pub daily_day: String,
    pub hourly_used: f64,
    pub hourly_hour: String,
}

/// User feedback on a surfaced decision, parsed from the raw payload
/// via [`parse_feedback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackType {
    Like,
    Dislike,
    Adopted,
    Ignored,
    Closed,
    OpenPanel,
    Unknown,
}

impl FeedbackType {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackType::Like => "LIKE",
            FeedbackType::Dislike => "DISLIKE",
            FeedbackType::Adopted => "ADOPTED",
            FeedbackType::Ignored => "IGNORED",
            FeedbackType::Closed => "CLOSED",
            FeedbackType::OpenPanel => "OPEN_PANEL",
            FeedbackType::Unknown => "UNKNOWN",
        }
    }

    pub fn is_positive(self) -> bool {
        matches!(
            self,
            FeedbackType::Like | FeedbackType::Adopted | FeedbackType::OpenPanel
        )
    }

    pub fn is_negative(self) -> bool {
        matches!(
            self,
            FeedbackType::Dislike | FeedbackType::Ignored | FeedbackType::Closed
        )
    }

    /// Passive signals the user never typed: tagged `implicit_feedback`
    /// in the memory event log.
    pub fn is_implicit(self) -> bool {
        matches!(
            self,
            FeedbackType::Ignored | FeedbackType::Closed | FeedbackType::OpenPanel
        )
    }

    fn from_token(token: &str) -> Self {
        match token {
            "LIKE" => FeedbackType::Like,
            "DISLIKE" => FeedbackType::Dislike,
            "ADOPTED" => FeedbackType::Adopted,
            "IGNORED" => FeedbackType::Ignored,
            "CLOSED" => FeedbackType::Closed,
            "OPEN_PANEL" => FeedbackType::OpenPanel,
            _ => FeedbackType::Unknown,
        }
    }
}

/// Splits a raw feedback payload of the form `"TYPE"` or `"TYPE: text"`
/// into its kind and optional free text.
pub fn parse_feedback(raw: &str) -> (FeedbackType, String) {
    let mut parts = raw.splitn(2, ':');
    let token = parts.next().unwrap_or("").trim().to_uppercase();
    let text = parts.next().unwrap_or("").trim().to_string();
    (FeedbackType::from_token(&token), text)
}

/// Enrichment label derived from app-switch and title-change history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FocusState {
    NoProgress,
    Distracted,
    Focused,
    Light,
}

impl FocusState {
    pub fn as_str(self) -> &'static str {
        match self {
            FocusState::NoProgress => "NO_PROGRESS",
            FocusState::Distracted => "DISTRACTED",
            FocusState::Focused => "FOCUSED",
            FocusState::Light => "LIGHT",
        }
    }
}

impl fmt::Display for FocusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One polled observation of the frontmost application.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FocusSnapshot {
    pub ts_ms: i64,
    pub app_name: String,
    #[serde(default)]
    pub bundle_id: String,
    #[serde(default)]
    pub pid: i32,
    #[serde(default)]
    pub window_title: String,
}

/// Durable record of one contiguous stretch in a single application.
/// `duration_ms == 0` marks the event still open.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FocusEvent {
    pub id: i64,
    pub ts_ms: i64,
    pub app_name: String,
    #[serde(default)]
    pub bundle_id: String,
    #[serde(default)]
    pub pid: i32,
    pub duration_ms: i64,
    #[serde(default)]
    pub window_title: String,
}

/// Snapshot of the currently-focused application with its accumulated
/// session length, as exposed by the monitor.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FocusCurrent {
    pub ts_ms: i64,
    pub app_name: String,
    #[serde(default)]
    pub bundle_id: String,
    #[serde(default)]
    pub pid: i32,
    #[serde(default)]
    pub window_title: String,
    pub focus_minutes: f64,
}

/// Historical row capturing the derived focus state at enrichment time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FocusStateSnapshot {
    pub ts_ms: i64,
    pub focus_state: FocusState,
    pub switch_count: u32,
    pub no_progress_ms: i64,
    pub focus_minutes: f64,
    #[serde(default)]
    pub app_name: String,
    #[serde(default)]
    pub window_title: String,
}

/// Aggregate switch/duration metrics over a trailing window, computed
/// from stored focus events when the live monitor is unavailable.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FocusMetrics {
    pub window_ms: i64,
    pub switch_count: u32,
    pub focus_minutes: f64,
}

/// A learned, confidence-weighted user preference fact. Stored
/// confidence is never decayed in place; decay is a read-time projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub key: String,
    pub value: String,
    pub confidence: f64,
    pub updated_at_ms: i64,
}

/// Append-only memory log entry describing something that happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEvent {
    pub event_type: String,
    pub summary: String,
    pub importance: f64,
    pub created_at_ms: i64,
}

/// One row of the user settings table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingItem {
    pub key: String,
    pub value: String,
    pub updated_at_ms: i64,
}
