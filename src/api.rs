//! HTTP API handlers for Pettag.
//!
//! The transport layer stays thin: handlers deserialize inputs, call the
//! core operations and translate the structural error taxonomy into status
//! codes. Channel outcomes are returned as data, never as HTTP failures.
//!
//! Ownership checks for owner-facing routes (update, lost/found, verify,
//! reunite, deactivate) belong to the upstream auth collaborator; these
//! handlers trust the ids they are given.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::dispatch::Dispatcher;
use crate::error::Error;
use crate::model::{
    AddVaccinationRequest, Coordinates, FinderInfo, LocationReport, NotificationAttempt, Pet,
    PetUpdate, PublicPetView, RegisterPetRequest, ReportRequest, RequesterMeta, ScanHistory,
    ScanRequest, Sighting, VaccinationRecord,
};
use crate::sighting;
use crate::storage::{NewOwner, Storage};
use crate::{lookup, token};

/// How many fresh codes registration draws before giving up on a
/// uniqueness violation.
const MAX_CODE_ATTEMPTS: u32 = 3;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub storage: Storage,
    pub dispatcher: Dispatcher,
    /// Public base URL embedded in lookup URLs and visual tokens.
    pub base_url: String,
}

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::NotFound => StatusCode::NOT_FOUND,
        Error::InvalidTransition { .. } => StatusCode::CONFLICT,
        Error::DuplicateCode => StatusCode::CONFLICT,
        Error::Generation(_) | Error::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn requester_meta(headers: &HeaderMap) -> RequesterMeta {
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    RequesterMeta {
        ip_address: header_str("x-forwarded-for")
            .map(|v| v.split(',').next().unwrap_or("unknown").trim().to_string())
            .unwrap_or_else(|| "unknown".to_string()),
        user_agent: header_str("user-agent").unwrap_or_else(|| "unknown".to_string()),
    }
}

// ============================================================================
// Owner provisioning (storage seam for the account collaborator)
// ============================================================================

#[derive(Debug, Serialize)]
pub struct OwnerCreated {
    pub owner_id: i64,
}

/// POST /owners - Provision an owner contact record.
#[instrument(skip(state, request))]
pub async fn post_owner(
    State(state): State<AppState>,
    Json(request): Json<NewOwner>,
) -> Result<(StatusCode, Json<OwnerCreated>), StatusCode> {
    match state.storage.insert_owner(&request).await {
        Ok(owner_id) => {
            info!(owner_id, "Owner contact record created");
            Ok((StatusCode::CREATED, Json(OwnerCreated { owner_id })))
        }
        Err(e) => {
            warn!(error = %e, "Failed to create owner record");
            Err(status_for(&e))
        }
    }
}

// ============================================================================
// Pet registration and owner-facing management
// ============================================================================

#[derive(Debug, Serialize)]
pub struct RegisteredPet {
    pub pet_id: i64,
    pub pet_code: String,
    /// The visual token as an embeddable data URI.
    pub qr_code: String,
    pub pet_url: String,
}

/// POST /pets - Register a pet and issue its identity.
///
/// Issues a public code plus visual token, retrying with a fresh draw if the
/// persistence layer reports a code collision.
#[instrument(skip(state, request), fields(owner_id = request.owner_id))]
pub async fn register_pet(
    State(state): State<AppState>,
    Json(request): Json<RegisterPetRequest>,
) -> Result<(StatusCode, Json<RegisteredPet>), StatusCode> {
    // The owner record must exist before a pet can reference it.
    if let Err(e) = state.storage.get_owner(request.owner_id).await {
        warn!(owner_id = request.owner_id, error = %e, "Unknown owner on registration");
        return Err(status_for(&e));
    }

    for attempt in 1..=MAX_CODE_ATTEMPTS {
        let issued = token::issue(&state.base_url, &mut rand::thread_rng());
        let (pet_code, qr_code) = match issued {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "Visual token generation failed");
                return Err(status_for(&e));
            }
        };

        match state.storage.insert_pet(&request, &pet_code, &qr_code).await {
            Ok(pet_id) => {
                info!(pet_id, pet_code = %pet_code, "Pet registered");
                return Ok((
                    StatusCode::CREATED,
                    Json(RegisteredPet {
                        pet_id,
                        pet_url: token::lookup_url(&state.base_url, &pet_code),
                        pet_code,
                        qr_code,
                    }),
                ));
            }
            Err(Error::DuplicateCode) => {
                warn!(attempt, "Public code collision, retrying with a new draw");
            }
            Err(e) => {
                warn!(error = %e, "Failed to persist pet");
                return Err(status_for(&e));
            }
        }
    }

    warn!("Exhausted code draws during registration");
    Err(StatusCode::CONFLICT)
}

/// GET /pets/{id} - The owner-facing pet record, identity fields included.
#[instrument(skip(state))]
pub async fn get_pet(
    State(state): State<AppState>,
    Path(pet_id): Path<i64>,
) -> Result<Json<Pet>, StatusCode> {
    match state.storage.get_pet(pet_id).await {
        Ok(pet) => Ok(Json(pet)),
        Err(e) => Err(status_for(&e)),
    }
}

/// PUT /pets/{id} - Apply the allow-listed update to a pet.
#[instrument(skip(state, update))]
pub async fn update_pet(
    State(state): State<AppState>,
    Path(pet_id): Path<i64>,
    Json(update): Json<PetUpdate>,
) -> Result<Json<Pet>, StatusCode> {
    if let Err(e) = state.storage.update_pet(pet_id, &update).await {
        warn!(pet_id, error = %e, "Pet update failed");
        return Err(status_for(&e));
    }

    match state.storage.get_pet(pet_id).await {
        Ok(pet) => {
            info!(pet_id, "Pet updated");
            Ok(Json(pet))
        }
        Err(e) => Err(status_for(&e)),
    }
}

#[derive(Debug, Serialize)]
pub struct RegeneratedToken {
    pub qr_code: String,
}

/// POST /pets/{id}/qr - Rebuild the visual token from the immutable code.
#[instrument(skip(state))]
pub async fn regenerate_qr(
    State(state): State<AppState>,
    Path(pet_id): Path<i64>,
) -> Result<Json<RegeneratedToken>, StatusCode> {
    let pet = match state.storage.get_pet(pet_id).await {
        Ok(pet) => pet,
        Err(e) => return Err(status_for(&e)),
    };

    let qr_code = match token::regenerate(&state.base_url, &pet.pet_code) {
        Ok(token) => token,
        Err(e) => {
            warn!(pet_id, error = %e, "Token regeneration failed");
            return Err(status_for(&e));
        }
    };

    if let Err(e) = state.storage.set_qr_code(pet_id, &qr_code).await {
        return Err(status_for(&e));
    }

    info!(pet_id, "Visual token regenerated");
    Ok(Json(RegeneratedToken { qr_code }))
}

/// POST /pets/{id}/lost - Flag a pet as lost.
#[instrument(skip(state))]
pub async fn mark_lost(
    State(state): State<AppState>,
    Path(pet_id): Path<i64>,
) -> Result<StatusCode, StatusCode> {
    match state.storage.set_lost_flag(pet_id, true).await {
        Ok(()) => {
            info!(pet_id, "Pet flagged lost");
            Ok(StatusCode::OK)
        }
        Err(e) => Err(status_for(&e)),
    }
}

/// POST /pets/{id}/found - Clear the lost flag.
#[instrument(skip(state))]
pub async fn mark_found(
    State(state): State<AppState>,
    Path(pet_id): Path<i64>,
) -> Result<StatusCode, StatusCode> {
    match state.storage.set_lost_flag(pet_id, false).await {
        Ok(()) => {
            info!(pet_id, "Pet flagged found");
            Ok(StatusCode::OK)
        }
        Err(e) => Err(status_for(&e)),
    }
}

/// DELETE /pets/{id} - Soft-deactivate a pet.
///
/// The code stops resolving publicly; unknown and deactivated codes are
/// indistinguishable to finders from then on.
#[instrument(skip(state))]
pub async fn delete_pet(
    State(state): State<AppState>,
    Path(pet_id): Path<i64>,
) -> Result<StatusCode, StatusCode> {
    match state.storage.deactivate_pet(pet_id).await {
        Ok(()) => {
            info!(pet_id, "Pet deactivated");
            Ok(StatusCode::NO_CONTENT)
        }
        Err(e) => Err(status_for(&e)),
    }
}

/// GET /pets/{id}/scans - Scan statistics and recent history for a pet.
#[instrument(skip(state))]
pub async fn get_pet_scans(
    State(state): State<AppState>,
    Path(pet_id): Path<i64>,
) -> Result<Json<ScanHistory>, StatusCode> {
    if let Err(e) = state.storage.get_pet(pet_id).await {
        return Err(status_for(&e));
    }

    let stats = state
        .storage
        .scan_stats(pet_id)
        .await
        .map_err(|e| status_for(&e))?;
    let recent_scans = state
        .storage
        .recent_scans(pet_id)
        .await
        .map_err(|e| status_for(&e))?;

    Ok(Json(ScanHistory {
        stats,
        recent_scans,
    }))
}

/// POST /pets/{id}/vaccination - Append to a pet's vaccination history.
#[instrument(skip(state, request))]
pub async fn add_vaccination(
    State(state): State<AppState>,
    Path(pet_id): Path<i64>,
    Json(request): Json<AddVaccinationRequest>,
) -> Result<(StatusCode, Json<VaccinationRecord>), StatusCode> {
    if let Err(e) = state.storage.get_pet(pet_id).await {
        return Err(status_for(&e));
    }

    match state.storage.insert_vaccination(pet_id, &request).await {
        Ok(record) => {
            info!(pet_id, vaccine = %record.vaccine_name, "Vaccination recorded");
            Ok((StatusCode::CREATED, Json(record)))
        }
        Err(e) => {
            warn!(pet_id, error = %e, "Failed to record vaccination");
            Err(status_for(&e))
        }
    }
}

/// GET /pets/{id}/vaccinations - Vaccination history, most recent first.
#[instrument(skip(state))]
pub async fn get_vaccinations(
    State(state): State<AppState>,
    Path(pet_id): Path<i64>,
) -> Result<Json<Vec<VaccinationRecord>>, StatusCode> {
    if let Err(e) = state.storage.get_pet(pet_id).await {
        return Err(status_for(&e));
    }

    state
        .storage
        .vaccinations_for_pet(pet_id)
        .await
        .map(Json)
        .map_err(|e| status_for(&e))
}

// ============================================================================
// Public, anonymous surface
// ============================================================================

/// GET /pet/{code} - Public lookup of a pet by its code.
///
/// Returns the redacted finder view, records a scan and dispatches owner
/// notifications. The finder gets the view even when notification dispatch
/// fails.
#[instrument(skip(state, headers))]
pub async fn get_public_pet(
    State(state): State<AppState>,
    Path(pet_code): Path<String>,
    Query(query): Query<ScanRequest>,
    headers: HeaderMap,
) -> Result<Json<PublicPetView>, StatusCode> {
    let meta = requester_meta(&headers);
    let coordinates = Coordinates::from_parts(query.latitude, query.longitude);

    match lookup::resolve_public(&state.storage, &state.dispatcher, &pet_code, &meta, coordinates)
        .await
    {
        Ok(view) => {
            info!(pet_code = %pet_code, "Public lookup served");
            Ok(Json(view))
        }
        Err(e) => {
            warn!(pet_code = %pet_code, error = %e, "Public lookup failed");
            Err(status_for(&e))
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ScanRecorded {
    pub scan_id: i64,
    pub attempts: Vec<NotificationAttempt>,
}

/// POST /pet/{code}/scan - Record a scan with optional coordinates.
#[instrument(skip(state, headers, request))]
pub async fn post_scan(
    State(state): State<AppState>,
    Path(pet_code): Path<String>,
    headers: HeaderMap,
    Json(request): Json<ScanRequest>,
) -> Result<(StatusCode, Json<ScanRecorded>), StatusCode> {
    let meta = requester_meta(&headers);
    let coordinates = Coordinates::from_parts(request.latitude, request.longitude);

    let (pet, scan) = sighting::record_scan(&state.storage, &pet_code, &meta, coordinates)
        .await
        .map_err(|e| {
            warn!(pet_code = %pet_code, error = %e, "Scan recording failed");
            status_for(&e)
        })?;

    let attempts = notify(&state, &pet, Sighting::Scan(scan.clone())).await;

    Ok((
        StatusCode::CREATED,
        Json(ScanRecorded {
            scan_id: scan.id,
            attempts,
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct ReportRecorded {
    pub report: LocationReport,
    pub attempts: Vec<NotificationAttempt>,
}

/// POST /pet/{code}/report - Record a finder's location report.
#[instrument(skip(state, request))]
pub async fn post_report(
    State(state): State<AppState>,
    Path(pet_code): Path<String>,
    Json(request): Json<ReportRequest>,
) -> Result<(StatusCode, Json<ReportRecorded>), StatusCode> {
    if request.finder_phone.trim().is_empty() {
        warn!(pet_code = %pet_code, "Report rejected: finder phone missing");
        return Err(StatusCode::BAD_REQUEST);
    }

    let finder = FinderInfo {
        name: request.finder_name,
        phone: request.finder_phone,
        email: request.finder_email,
    };
    let coordinates = Coordinates::from_parts(request.latitude, request.longitude);

    let (pet, report) = sighting::record_report(
        &state.storage,
        &pet_code,
        &finder,
        request.message.as_deref(),
        coordinates,
        &request.photo_refs,
    )
    .await
    .map_err(|e| {
        warn!(pet_code = %pet_code, error = %e, "Report recording failed");
        status_for(&e)
    })?;

    let attempts = notify(&state, &pet, Sighting::Report(report.clone())).await;

    Ok((
        StatusCode::CREATED,
        Json(ReportRecorded { report, attempts }),
    ))
}

// ============================================================================
// Report lifecycle (owner-authorized upstream)
// ============================================================================

/// POST /reports/{id}/verify - Owner confirms a report.
#[instrument(skip(state))]
pub async fn verify_report(
    State(state): State<AppState>,
    Path(report_id): Path<i64>,
) -> Result<Json<LocationReport>, StatusCode> {
    match sighting::verify(&state.storage, report_id).await {
        Ok(report) => {
            info!(report_id, status = %report.status, "Report verified");
            Ok(Json(report))
        }
        Err(e) => {
            warn!(report_id, error = %e, "Report verification failed");
            Err(status_for(&e))
        }
    }
}

/// POST /reports/{id}/reunited - Owner marks the pet reunited.
#[instrument(skip(state))]
pub async fn reunite_report(
    State(state): State<AppState>,
    Path(report_id): Path<i64>,
) -> Result<Json<LocationReport>, StatusCode> {
    match sighting::mark_reunited(&state.storage, report_id).await {
        Ok(report) => {
            info!(report_id, status = %report.status, "Report reunited");
            Ok(Json(report))
        }
        Err(e) => {
            warn!(report_id, error = %e, "Reunite failed");
            Err(status_for(&e))
        }
    }
}

/// GET /health - Simple health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Resolve the owner and run the dispatcher for a fresh sighting.
///
/// Infallible from the caller's perspective; an owner lookup failure yields
/// an empty attempt list and a log line.
async fn notify(state: &AppState, pet: &Pet, sighting: Sighting) -> Vec<NotificationAttempt> {
    match state.storage.get_owner(pet.owner_id).await {
        Ok(owner) => {
            state
                .dispatcher
                .dispatch(&state.storage, pet, &owner, &sighting)
                .await
        }
        Err(e) => {
            warn!(pet_id = pet.id, error = %e, "Owner lookup failed before dispatch");
            Vec::new()
        }
    }
}
