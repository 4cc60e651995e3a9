//! Lead intake endpoint.
//!
//! Validates the submission, prices it, persists the lead, then runs the
//! charge cascade. The featured email broadcast (and, when enabled, the SMS
//! blast) fan out afterwards regardless of the cascade's outcome. The
//! submitter only ever learns `routed` vs `unserved`; payment-decline detail
//! stays provider-facing.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::common::LeadId;
use crate::domains::dispatch::DispatchOutcome;
use crate::domains::leads::{price_for, CreateLead, Lead, Urgency};
use crate::domains::providers::Provider;
use crate::server::app::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitLeadRequest {
    pub full_name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address1: Option<String>,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub urgency: Urgency,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitLeadResponse {
    pub ok: bool,
    pub lead_id: LeadId,
    pub status: &'static str,
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct ValidationErrorResponse {
    pub ok: bool,
    pub error: &'static str,
    pub details: Vec<FieldError>,
}

#[derive(Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

/// `NNNNN` or `NNNNN-NNNN`.
fn is_valid_zip(zip: &str) -> bool {
    let zip = zip.trim();
    if !zip.is_ascii() {
        return false;
    }
    let (head, tail) = zip.split_at(zip.len().min(5));
    if head.len() != 5 || !head.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    match tail.strip_prefix('-') {
        None => tail.is_empty(),
        Some(plus4) => plus4.len() == 4 && plus4.chars().all(|c| c.is_ascii_digit()),
    }
}

fn validate(payload: &SubmitLeadRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if payload.full_name.trim().chars().count() < 2 {
        errors.push(FieldError {
            field: "fullName",
            message: "Name must be at least 2 characters",
        });
    }
    if payload.phone.trim().len() < 7 {
        errors.push(FieldError {
            field: "phone",
            message: "Phone number is required",
        });
    }
    if let Some(email) = payload.email.as_deref() {
        if !email.is_empty() && !email.contains('@') {
            errors.push(FieldError {
                field: "email",
                message: "Invalid email address",
            });
        }
    }
    if payload.city.trim().is_empty() {
        errors.push(FieldError {
            field: "city",
            message: "City is required",
        });
    }
    if payload.state.trim().len() != 2 {
        errors.push(FieldError {
            field: "state",
            message: "State must be 2 characters",
        });
    }
    if !is_valid_zip(&payload.zip) {
        errors.push(FieldError {
            field: "zip",
            message: "ZIP code must be 5 digits",
        });
    }

    errors
}

pub async fn submit_lead_handler(
    Extension(state): Extension<AppState>,
    Json(payload): Json<SubmitLeadRequest>,
) -> impl IntoResponse {
    let errors = validate(&payload);
    if !errors.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ValidationErrorResponse {
                ok: false,
                error: "Validation error",
                details: errors,
            }),
        )
            .into_response();
    }

    let price_cents = price_for(payload.urgency);
    let email = payload.email.filter(|e| !e.is_empty());

    let lead = match Lead::create(
        CreateLead {
            full_name: payload.full_name,
            phone: payload.phone,
            email,
            address1: payload.address1,
            city: payload.city,
            state: payload.state,
            zip: payload.zip.trim().to_string(),
            urgency: payload.urgency,
            notes: payload.notes,
            price_cents,
            source: "web_form".to_string(),
        },
        &state.db_pool,
    )
    .await
    {
        Ok(lead) => lead,
        Err(err) => {
            error!(error = %err, "Failed to create lead");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    info!(lead_id = %lead.id, zip = %lead.zip, urgency = %lead.urgency, "Lead created");

    // Charge cascade
    let outcome = match Provider::find_charge_candidates(&state.db_pool).await {
        Ok(roster) => match state.dispatch.dispatch_lead(&lead, &roster).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(lead_id = %lead.id, error = %err, "Lead dispatch failed");
                DispatchOutcome::Unserved
            }
        },
        Err(err) => {
            error!(lead_id = %lead.id, error = %err, "Failed to load charge candidates");
            DispatchOutcome::Unserved
        }
    };

    // Featured pilot fan-out, independent of the cascade's outcome
    match Provider::find_featured_notifiable(&state.db_pool).await {
        Ok(roster) => {
            if let Err(err) = state.broadcast.notify_featured_providers(&lead, &roster).await {
                error!(lead_id = %lead.id, error = %err, "Featured broadcast failed");
            }
        }
        Err(err) => error!(lead_id = %lead.id, error = %err, "Failed to load featured roster"),
    }

    // Claim-flow SMS blast, when the pilot flag is on
    if state.sms_blast_enabled {
        match Provider::find_sms_eligible(&state.db_pool).await {
            Ok(roster) => {
                if let Err(err) = state.broadcast.sms_blast(&lead, &roster).await {
                    error!(lead_id = %lead.id, error = %err, "SMS blast failed");
                }
            }
            Err(err) => error!(lead_id = %lead.id, error = %err, "Failed to load SMS roster"),
        }
    }

    let response = match outcome {
        DispatchOutcome::Delivered { .. } => SubmitLeadResponse {
            ok: true,
            lead_id: lead.id,
            status: "routed",
            message: "Lead successfully delivered to provider",
        },
        DispatchOutcome::Unserved => SubmitLeadResponse {
            ok: true,
            lead_id: lead.id,
            status: "unserved",
            message: "Lead created but no eligible provider found",
        },
    };

    Json(response).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(zip: &str, state: &str) -> SubmitLeadRequest {
        SubmitLeadRequest {
            full_name: "Jane Doe".into(),
            phone: "+15551234567".into(),
            email: None,
            address1: None,
            city: "Springfield".into(),
            state: state.into(),
            zip: zip.into(),
            urgency: Urgency::Standard,
            notes: None,
        }
    }

    #[test]
    fn zip_validation_accepts_five_and_nine_digit_forms() {
        assert!(is_valid_zip("90210"));
        assert!(is_valid_zip("90210-1234"));
        assert!(!is_valid_zip("9021"));
        assert!(!is_valid_zip("90210-12"));
        assert!(!is_valid_zip("9021O"));
        assert!(!is_valid_zip(""));
    }

    #[test]
    fn valid_submission_passes() {
        assert!(validate(&request("90210", "CA")).is_empty());
    }

    #[test]
    fn malformed_location_is_rejected_before_dispatch() {
        let errors = validate(&request("902", "California"));
        let fields: Vec<&str> = errors.iter().map(|e| e.field).collect();
        assert!(fields.contains(&"zip"));
        assert!(fields.contains(&"state"));
    }
}
