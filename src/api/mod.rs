use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Json, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use crate::core::{
    BracketTable, DashboardSummary, Edit, ExtraPaymentSolution, Payoff, PeriodKey,
    ProjectionPoint, Snapshot, TaxBracket, TaxEstimate, TaxSettings, apply_all, debt_projection,
    estimate_tax, export_rows, extra_payment_for_target_years, monthly_payment, months_to_payoff,
    total_interest,
};
use crate::error::{Error, Result};
use crate::settings::EngineSettings;

type SharedSettings = Arc<EngineSettings>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DashboardPayload {
    #[serde(default)]
    snapshot: Snapshot,
    period: Option<String>,
    today: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EditPayload {
    #[serde(default)]
    snapshot: Snapshot,
    #[serde(default)]
    edits: Vec<Edit>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct LoanPayload {
    balance: Option<f64>,
    annual_rate: Option<f64>,
    monthly_payment: Option<f64>,
    extra_monthly: Option<f64>,
    term_months: Option<i64>,
    target_years: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct TaxPayload {
    gross_income: Option<f64>,
    withheld: Option<f64>,
    coefficient: Option<f64>,
    deductions: Option<f64>,
    social_security_rate: Option<f64>,
    brackets: Option<Vec<TaxBracket>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct LoanRequest {
    balance: f64,
    annual_rate: f64,
    monthly_payment: f64,
    extra_monthly: f64,
    term_months: Option<i64>,
    target_years: Option<f64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoanResponse {
    balance: f64,
    annual_rate: f64,
    monthly_payment: f64,
    extra_monthly: f64,
    scheduled_payment: Option<f64>,
    months_to_payoff: u32,
    months_to_payoff_with_extra: u32,
    payoff: Payoff,
    payoff_with_extra: Payoff,
    total_interest: f64,
    total_interest_with_extra: f64,
    interest_saved: f64,
    projection: Vec<ProjectionPoint>,
    extra_payment: Option<ExtraPaymentSolution>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn router(settings: SharedSettings) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/dashboard", post(dashboard_handler))
        .route("/api/edit", post(edit_handler))
        .route("/api/export", post(export_handler))
        .route("/api/loan", get(loan_get_handler).post(loan_post_handler))
        .route("/api/tax", get(tax_get_handler).post(tax_post_handler))
        .fallback(not_found_handler)
        .with_state(settings)
}

pub async fn run_http_server(port: u16, settings: EngineSettings) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(Arc::new(settings));

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("hearth HTTP API listening on http://{addr}");
    tracing::info!("Local access: http://127.0.0.1:{port}/api/health");

    axum::serve(listener, app).await
}

/// Dashboard for one snapshot file, as pretty JSON.
pub fn summary_json(
    snapshot_path: &Path,
    period: Option<&str>,
    settings: &EngineSettings,
) -> Result<String> {
    let raw = std::fs::read_to_string(snapshot_path)?;
    let snapshot: Snapshot = serde_json::from_str(&raw)?;
    let today = Local::now().date_naive();
    let period = resolve_period(period, today)?;
    let summary = DashboardSummary::compute(&snapshot, period, today, settings);
    Ok(serde_json::to_string_pretty(&summary)?)
}

async fn health_handler() -> Response {
    json_response(
        StatusCode::OK,
        HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        },
    )
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn dashboard_handler(
    State(settings): State<SharedSettings>,
    Json(payload): Json<DashboardPayload>,
) -> Response {
    match build_dashboard(payload, &settings) {
        Ok(summary) => json_response(StatusCode::OK, summary),
        Err(e) => error_from(e),
    }
}

async fn export_handler(
    State(settings): State<SharedSettings>,
    Json(payload): Json<DashboardPayload>,
) -> Response {
    match build_dashboard(payload, &settings) {
        Ok(summary) => json_response(StatusCode::OK, export_rows(&summary)),
        Err(e) => error_from(e),
    }
}

async fn edit_handler(Json(payload): Json<EditPayload>) -> Response {
    let count = payload.edits.len();
    let next = apply_all(&payload.snapshot, payload.edits);
    tracing::debug!(edits = count, "applied edits");
    json_response(StatusCode::OK, next)
}

async fn loan_get_handler(Query(payload): Query<LoanPayload>) -> Response {
    loan_handler_impl(payload)
}

async fn loan_post_handler(Json(payload): Json<LoanPayload>) -> Response {
    loan_handler_impl(payload)
}

fn loan_handler_impl(payload: LoanPayload) -> Response {
    match loan_request_from_payload(payload) {
        Ok(request) => json_response(StatusCode::OK, build_loan_response(request)),
        Err(e) => error_from(e),
    }
}

async fn tax_get_handler(
    State(settings): State<SharedSettings>,
    Query(payload): Query<TaxPayload>,
) -> Response {
    tax_handler_impl(payload, &settings)
}

async fn tax_post_handler(
    State(settings): State<SharedSettings>,
    Json(payload): Json<TaxPayload>,
) -> Response {
    tax_handler_impl(payload, &settings)
}

fn tax_handler_impl(payload: TaxPayload, settings: &EngineSettings) -> Response {
    match build_tax_estimate(payload, &settings.tax) {
        Ok(estimate) => json_response(StatusCode::OK, estimate),
        Err(e) => error_from(e),
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

fn error_from(err: Error) -> Response {
    if err.is_client_error() {
        error_response(StatusCode::BAD_REQUEST, &err.to_string())
    } else {
        tracing::error!(error = %err, "request failed");
        error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
    }
}

fn resolve_period(raw: Option<&str>, today: NaiveDate) -> Result<PeriodKey> {
    match raw {
        Some(raw) => Ok(raw.parse::<PeriodKey>()?),
        None => Ok(PeriodKey::from(today)),
    }
}

fn build_dashboard(payload: DashboardPayload, settings: &EngineSettings) -> Result<DashboardSummary> {
    let today = payload.today.unwrap_or_else(|| Local::now().date_naive());
    let period = resolve_period(payload.period.as_deref(), today)?;
    Ok(DashboardSummary::compute(
        &payload.snapshot,
        period,
        today,
        settings,
    ))
}

fn require(value: Option<f64>, name: &str) -> Result<f64> {
    match value {
        Some(v) if v.is_finite() => Ok(v),
        Some(_) => Err(Error::InvalidRequest(format!("{name} must be a finite number"))),
        None => Err(Error::InvalidRequest(format!("{name} is required"))),
    }
}

fn loan_request_from_payload(payload: LoanPayload) -> Result<LoanRequest> {
    let request = LoanRequest {
        balance: require(payload.balance, "balance")?,
        annual_rate: require(payload.annual_rate, "annualRate")?,
        monthly_payment: require(payload.monthly_payment, "monthlyPayment")?,
        extra_monthly: require(payload.extra_monthly.or(Some(0.0)), "extraMonthly")?,
        term_months: payload.term_months,
        target_years: payload.target_years,
    };

    if request.balance < 0.0 {
        return Err(Error::InvalidRequest("balance must be >= 0".to_string()));
    }
    if request.annual_rate < 0.0 {
        return Err(Error::InvalidRequest("annualRate must be >= 0".to_string()));
    }
    if request.monthly_payment < 0.0 || request.extra_monthly < 0.0 {
        return Err(Error::InvalidRequest(
            "monthlyPayment and extraMonthly must be >= 0".to_string(),
        ));
    }
    if let Some(years) = request.target_years {
        if !years.is_finite() || years <= 0.0 {
            return Err(Error::InvalidRequest("targetYears must be > 0".to_string()));
        }
    }
    Ok(request)
}

fn build_loan_response(request: LoanRequest) -> LoanResponse {
    let LoanRequest {
        balance,
        annual_rate,
        monthly_payment: fixed,
        extra_monthly,
        term_months,
        target_years,
    } = request;

    let base_months = months_to_payoff(balance, annual_rate, fixed, 0.0);
    let extra_months = months_to_payoff(balance, annual_rate, fixed, extra_monthly);
    let interest = total_interest(balance, annual_rate, fixed, 0.0);
    let interest_with_extra = total_interest(balance, annual_rate, fixed, extra_monthly);

    LoanResponse {
        balance,
        annual_rate,
        monthly_payment: fixed,
        extra_monthly,
        scheduled_payment: term_months.map(|n| monthly_payment(balance, annual_rate, n)),
        months_to_payoff: base_months,
        months_to_payoff_with_extra: extra_months,
        payoff: Payoff::from_months(base_months),
        payoff_with_extra: Payoff::from_months(extra_months),
        total_interest: interest,
        total_interest_with_extra: interest_with_extra,
        interest_saved: (interest - interest_with_extra).max(0.0),
        projection: debt_projection(balance, annual_rate, fixed, extra_monthly, base_months)
            .iter()
            .collect(),
        extra_payment: target_years
            .map(|years| extra_payment_for_target_years(balance, annual_rate, fixed, years)),
    }
}

fn build_tax_estimate(payload: TaxPayload, defaults: &TaxSettings) -> Result<TaxEstimate> {
    let mut settings = defaults.clone();
    if let Some(v) = payload.coefficient {
        settings.coefficient = v;
    }
    if let Some(v) = payload.deductions {
        settings.deductions = v;
    }
    if let Some(v) = payload.social_security_rate {
        settings.social_security_rate = v;
    }
    if let Some(brackets) = payload.brackets {
        settings.brackets = BracketTable::new(brackets)?;
    }

    if !(0.0..=1.0).contains(&settings.coefficient) {
        return Err(Error::InvalidRequest(
            "coefficient must be between 0 and 1".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&settings.social_security_rate) {
        return Err(Error::InvalidRequest(
            "socialSecurityRate must be between 0 and 1".to_string(),
        ));
    }

    let gross = require(payload.gross_income, "grossIncome")?;
    let withheld = require(payload.withheld.or(Some(0.0)), "withheld")?;
    Ok(estimate_tax(gross, withheld, &settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ExportRow;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn loan_request_from_json(json: &str) -> Result<LoanRequest> {
        let payload = serde_json::from_str::<LoanPayload>(json)?;
        loan_request_from_payload(payload)
    }

    #[test]
    fn loan_request_parses_web_keys() {
        let request = loan_request_from_json(
            r#"{"balance": 229693.43, "annualRate": 2.0, "monthlyPayment": 971, "targetYears": 15}"#,
        )
        .expect("valid request");
        assert_approx(request.balance, 229_693.43);
        assert_approx(request.extra_monthly, 0.0);
        assert_eq!(request.target_years, Some(15.0));
    }

    #[test]
    fn loan_request_requires_balance() {
        let err = loan_request_from_json(r#"{"annualRate": 2.0, "monthlyPayment": 971}"#)
            .expect_err("balance is required");
        assert!(err.to_string().contains("balance"));
        assert!(err.is_client_error());
    }

    #[test]
    fn loan_request_rejects_negative_rate() {
        let err = loan_request_from_json(
            r#"{"balance": 1000, "annualRate": -1, "monthlyPayment": 10}"#,
        )
        .expect_err("negative rate");
        assert!(err.to_string().contains("annualRate"));
    }

    #[test]
    fn loan_response_serialization_contains_expected_fields() {
        let request = loan_request_from_json(
            r#"{"balance": 12000, "annualRate": 0, "monthlyPayment": 100, "extraMonthly": 100, "termMonths": 120, "targetYears": 5}"#,
        )
        .expect("valid request");
        let response = build_loan_response(request);
        assert_eq!(response.months_to_payoff, 120);
        assert_eq!(response.months_to_payoff_with_extra, 60);
        assert_approx(response.scheduled_payment.expect("term given"), 100.0);

        let json = serde_json::to_string(&response).expect("response should serialize");
        assert!(json.contains("\"monthsToPayoff\""));
        assert!(json.contains("\"payoffWithExtra\""));
        assert!(json.contains("\"interestSaved\""));
        assert!(json.contains("\"projection\""));
        assert!(json.contains("\"extraPayment\""));
    }

    #[test]
    fn tax_payload_overrides_settings() {
        let payload: TaxPayload = serde_json::from_str(
            r#"{"grossIncome": 20000, "coefficient": 1.0, "deductions": 0, "socialSecurityRate": 0, "brackets": [{"upTo": null, "rate": 0.2}]}"#,
        )
        .expect("valid payload");
        let estimate =
            build_tax_estimate(payload, &TaxSettings::default()).expect("valid estimate");
        assert_approx(estimate.total_liability, 4_000.0);
        assert_approx(estimate.reconciliation, -4_000.0);
    }

    #[test]
    fn tax_payload_rejects_bad_brackets() {
        let payload: TaxPayload = serde_json::from_str(
            r#"{"grossIncome": 20000, "brackets": []}"#,
        )
        .expect("valid payload");
        let err = build_tax_estimate(payload, &TaxSettings::default()).expect_err("empty table");
        assert!(matches!(err, Error::Brackets(_)));
    }

    #[test]
    fn dashboard_defaults_period_to_today() {
        let payload: DashboardPayload = serde_json::from_str(r#"{"today": "2024-07-09"}"#)
            .expect("valid payload");
        let summary =
            build_dashboard(payload, &EngineSettings::default()).expect("valid dashboard");
        assert_eq!(summary.period, PeriodKey::new(2024, 7).expect("valid period"));
    }

    #[test]
    fn dashboard_rejects_unreadable_period() {
        let payload: DashboardPayload =
            serde_json::from_str(r#"{"period": "2024-13"}"#).expect("valid payload");
        let err = build_dashboard(payload, &EngineSettings::default()).expect_err("bad period");
        assert!(matches!(err, Error::InvalidPeriod(_)));
    }

    #[test]
    fn edit_payload_applies_edits_in_order() {
        let payload: EditPayload = serde_json::from_str(
            r##"{"edits": [
                {"type": "addClient", "name": "Acme", "color": "#111"},
                {"type": "setRate", "rate": "tax", "value": 30}
            ]}"##,
        )
        .expect("valid payload");
        let next = apply_all(&payload.snapshot, payload.edits);
        assert_eq!(next.config.clients[0].name, "Acme");
        assert_eq!(next.config.tax_rate, 30.0);
        assert_eq!(next.config.next_id, 2);
    }

    #[test]
    fn export_rows_from_dashboard_payload() {
        let payload: DashboardPayload = serde_json::from_str(
            r#"{"period": "2024-3", "today": "2024-03-01", "snapshot": {"months": {"2024-3": {"taxedIncome": [{"amount": 1000}]}}}}"#,
        )
        .expect("valid payload");
        let summary =
            build_dashboard(payload, &EngineSettings::default()).expect("valid dashboard");
        let rows: Vec<ExportRow> = export_rows(&summary);
        let taxed = rows
            .iter()
            .find(|r| r.section == "income" && r.label == "taxed")
            .expect("taxed income row");
        assert_approx(taxed.value, 1_000.0);
    }

    #[test]
    fn period_parse_errors_map_to_bad_request() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");
        let err = resolve_period(Some("nope"), today).expect_err("bad period");
        assert!(err.is_client_error());
    }
}
