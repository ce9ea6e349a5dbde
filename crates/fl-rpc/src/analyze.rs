//! # Analyze-and-Present Meta-Action
//!
//! `analyze_and_present` is not an ordinary registry key: its payload embeds
//! the true domain action as a nested `action` field. The dispatcher
//! special-cases it and runs this pipeline - normalize the raw input, invoke
//! the inner handler against the same registry, then format the result for
//! presentation - a second, inner dispatch level rather than a flattened
//! registry namespace.
//!
//! Normalization and presentation are seams ([`InputNormalizer`],
//! [`ResultPresenter`]): the LLM-backed agents live outside this crate, and
//! the defaults here ([`CaretNormalizer`], [`TemplatePresenter`]) are the
//! deterministic fallbacks the pipeline also uses when an external seam
//! fails. A seam failure degrades the result with a recorded warning; it
//! never fails the call.

use crate::envelope::Payload;
use crate::registry::HandlerRegistry;
use anyhow::{bail, Context};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, warn};

/// Name of the meta-action on the outer envelope.
pub const ANALYZE_AND_PRESENT: &str = "analyze_and_present";

/// The closed set of domain actions the meta-action may dispatch to.
pub const MATH_ACTIONS: [&str; 6] = [
    "domain",
    "derivative",
    "asymptotes_and_holes",
    "x_intercepts",
    "y_intercepts",
    "extrema_and_monotonic",
];

/// Payload of an `analyze_and_present` request.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeRequest {
    /// Raw user input, e.g. `"1/x"` or free-form text.
    pub raw: String,
    /// Analysis variable.
    #[serde(default = "default_var")]
    pub var: String,
    /// Inner domain action to dispatch to.
    #[serde(default)]
    pub action: String,
    /// Optional interval restriction.
    #[serde(default)]
    pub interval: Option<(f64, f64)>,
    /// Interval endpoint closedness, paired with `interval`.
    #[serde(default)]
    pub closed: Option<(bool, bool)>,
}

/// Result of the pipeline, returned as the meta-action's data mapping.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeResponse {
    /// Inner action that was dispatched.
    pub action: String,
    /// Normalized expression the analysis ran on.
    pub expr: String,
    /// Analysis variable.
    pub var: String,
    /// Human-readable presentation of the result. Never empty.
    pub present: String,
    /// Non-fatal degradations encountered along the way.
    pub warnings: Vec<String>,
    /// Errors encountered along the way.
    pub errors: Vec<String>,
}

/// Normalized expression input.
#[derive(Debug, Clone)]
pub struct NormalizedInput {
    /// Machine-parsable expression.
    pub expr: String,
    /// Analysis variable.
    pub var: String,
}

/// Turns raw user input into a machine-parsable expression.
#[async_trait]
pub trait InputNormalizer: Send + Sync {
    /// Normalize `raw` for analysis in `var`.
    async fn normalize(&self, raw: &str, var: &str) -> anyhow::Result<NormalizedInput>;
}

/// Formats an inner handler's report for human consumption.
#[async_trait]
pub trait ResultPresenter: Send + Sync {
    /// Produce presentation text for `report` of `action`.
    async fn present(&self, action: &str, report: &Payload) -> anyhow::Result<String>;
}

/// Deterministic normalizer: rewrites caret exponentiation and passes the
/// variable through.
pub struct CaretNormalizer;

#[async_trait]
impl InputNormalizer for CaretNormalizer {
    async fn normalize(&self, raw: &str, var: &str) -> anyhow::Result<NormalizedInput> {
        Ok(NormalizedInput {
            expr: raw.trim().replace('^', "**"),
            var: var.to_string(),
        })
    }
}

/// Deterministic presenter: per-action template text over the report fields.
pub struct TemplatePresenter;

#[async_trait]
impl ResultPresenter for TemplatePresenter {
    async fn present(&self, action: &str, report: &Payload) -> anyhow::Result<String> {
        Ok(fallback_present(action, report))
    }
}

/// The normalize -> inner dispatch -> present pipeline.
pub struct AnalyzePipeline {
    normalizer: Arc<dyn InputNormalizer>,
    presenter: Arc<dyn ResultPresenter>,
}

impl Default for AnalyzePipeline {
    fn default() -> Self {
        Self::new(Arc::new(CaretNormalizer), Arc::new(TemplatePresenter))
    }
}

impl AnalyzePipeline {
    /// Create a pipeline with explicit seam implementations.
    #[must_use]
    pub fn new(normalizer: Arc<dyn InputNormalizer>, presenter: Arc<dyn ResultPresenter>) -> Self {
        Self {
            normalizer,
            presenter,
        }
    }

    /// Run the pipeline for one meta-action payload.
    ///
    /// # Errors
    ///
    /// Fails only on contract violations - unparsable payload, missing or
    /// unsupported inner action. Seam failures and inner-handler failures
    /// degrade the response instead (recorded in `warnings`/`errors`).
    pub async fn run(
        &self,
        registry: &HandlerRegistry,
        payload: Payload,
    ) -> anyhow::Result<Payload> {
        let request: AnalyzeRequest = serde_json::from_value(Value::Object(payload))
            .context("invalid analyze_and_present payload")?;

        if request.action.is_empty() {
            bail!("payload missing 'action' field");
        }
        if !MATH_ACTIONS.contains(&request.action.as_str()) {
            bail!("unsupported action '{}'", request.action);
        }
        let Some(handler) = registry.get(&request.action) else {
            bail!("unsupported action '{}'", request.action);
        };

        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        // Step 1: normalize the raw input.
        let (expr, var) = match self
            .normalizer
            .normalize(&request.raw, &request.var)
            .await
        {
            Ok(normalized) => (normalized.expr, normalized.var),
            Err(exc) => {
                warn!(error = ?exc, "Input normalization failed");
                errors.push(format!("Input normalization failed: {exc}"));
                warnings.push("Used raw input without normalization".to_string());
                (request.raw.replace('^', "**"), request.var.clone())
            }
        };

        // Step 2: inner dispatch against the same registry.
        let mut handler_payload = Payload::new();
        handler_payload.insert("expr".into(), Value::String(expr.clone()));
        handler_payload.insert("var".into(), Value::String(var.clone()));
        if let Some(interval) = request.interval {
            handler_payload.insert("interval".into(), serde_json::json!(interval));
        }
        if let Some(closed) = request.closed {
            handler_payload.insert("closed".into(), serde_json::json!(closed));
        }

        let report = match handler(handler_payload).await {
            Ok(report) => report,
            Err(exc) => {
                error!(action = %request.action, error = ?exc, "Analysis handler failed");
                errors.push(format!("Calculus analysis failed: {exc}"));
                return to_payload(AnalyzeResponse {
                    action: request.action,
                    expr,
                    var,
                    present: "Unable to generate explanation due to analysis error.".to_string(),
                    warnings,
                    errors,
                });
            }
        };

        // Step 3: presentation, degrading to the template fallback.
        let mut present = match self.presenter.present(&request.action, &report).await {
            Ok(text) if text.trim().is_empty() => {
                warnings.push("Presenter returned empty result".to_string());
                "No presentable results were produced.".to_string()
            }
            Ok(text) => text,
            Err(exc) => {
                warn!(error = ?exc, "Presenter failed; using template fallback");
                warnings.push(format!("Presenter failed: {exc}"));
                fallback_present(&request.action, &report)
            }
        };
        if present.trim().is_empty() {
            present = "Unable to generate explanation.".to_string();
        }

        to_payload(AnalyzeResponse {
            action: request.action,
            expr,
            var,
            present: present.trim().to_string(),
            warnings,
            errors,
        })
    }
}

/// Template presentation text per action, built from the report fields.
fn fallback_present(action: &str, report: &Payload) -> String {
    match action {
        "domain" => match non_empty_str(report, "raw") {
            Some(raw) => format!("Domain: {raw}"),
            None => "Domain: Unable to determine".to_string(),
        },
        "derivative" => match non_empty_str(report, "raw") {
            Some(raw) => format!("Derivative: {raw}"),
            None => "Derivative: Unable to compute".to_string(),
        },
        "x_intercepts" => match non_empty_list(report, "points") {
            Some(points) => format!("X-intercepts: {}", points.join(", ")),
            None => "X-intercepts: None".to_string(),
        },
        "y_intercepts" => match report.get("point").filter(|v| !v.is_null()) {
            Some(point) => format!("Y-intercept: {}", fmt_value(point)),
            None => "Y-intercept: None".to_string(),
        },
        "asymptotes_and_holes" => {
            let mut parts = Vec::new();
            if let Some(vertical) = non_empty_list(report, "vertical") {
                parts.push(format!("Vertical asymptotes: {}", vertical.join(", ")));
            }
            if let Some(horizontal) = report.get("horizontal").filter(|v| is_truthy(v)) {
                parts.push(format!("Horizontal asymptotes: {}", fmt_value(horizontal)));
            }
            if let Some(holes) = non_empty_list(report, "holes") {
                parts.push(format!("Holes: {}", holes.join(", ")));
            }
            if parts.is_empty() {
                "Asymptotes and holes: None".to_string()
            } else {
                parts.join("; ")
            }
        }
        "extrema_and_monotonic" => {
            let mut parts = Vec::new();
            if let Some(monotonic) = report.get("monotonic").filter(|v| is_truthy(v)) {
                parts.push(format!("Monotonicity: {}", fmt_value(monotonic)));
            }
            if let Some(extrema) = non_empty_list(report, "extrema") {
                parts.push(format!("Extrema: {}", extrema.join(", ")));
            }
            if parts.is_empty() {
                "Extrema and monotonicity: Unable to determine".to_string()
            } else {
                parts.join("; ")
            }
        }
        _ => "Analysis completed, but unable to generate explanation.".to_string(),
    }
}

/// Whether a report field carries presentable content.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

fn non_empty_str<'a>(report: &'a Payload, key: &str) -> Option<&'a str> {
    report
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn non_empty_list(report: &Payload, key: &str) -> Option<Vec<String>> {
    let items = report.get(key)?.as_array()?;
    if items.is_empty() {
        return None;
    }
    Some(items.iter().map(fmt_value).collect())
}

/// Render a JSON value for presentation text: bare strings, compact JSON for
/// everything else.
fn fmt_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn to_payload(response: AnalyzeResponse) -> anyhow::Result<Payload> {
    match serde_json::to_value(&response)? {
        Value::Object(map) => Ok(map),
        _ => unreachable!("AnalyzeResponse serializes to an object"),
    }
}

fn default_var() -> String {
    "x".to_string()
}
