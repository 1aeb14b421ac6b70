//! Sighting recorder: passive scans, finder reports and the report lifecycle.
//!
//! Scans and reports are open to anonymous callers; `verify` and
//! `mark_reunited` assume the caller already holds an authorized owner id
//! (the auth collaborator's job). Every operation resolves the pet through
//! its public code or id and fails uniformly when the pet is unknown or
//! deactivated.

use tracing::info;

use crate::error::{Error, Result};
use crate::model::{
    Coordinates, FinderInfo, LocationReport, Pet, ReportStatus, RequesterMeta, ScanEvent,
};
use crate::storage::Storage;

/// Record a passive QR scan against the pet behind `pet_code`.
///
/// Every scan is a distinct event; repeated scans within the same second are
/// all kept. Returns the pet alongside the scan so the caller can hand both
/// to the dispatcher without a second lookup.
pub async fn record_scan(
    storage: &Storage,
    pet_code: &str,
    meta: &RequesterMeta,
    coordinates: Option<Coordinates>,
) -> Result<(Pet, ScanEvent)> {
    let pet = storage.get_pet_by_code(pet_code).await?;
    let scan = storage.insert_scan(pet.id, meta, coordinates).await?;

    info!(
        pet_id = pet.id,
        scan_id = scan.id,
        has_coordinates = scan.coordinates.is_some(),
        "Scan recorded"
    );

    Ok((pet, scan))
}

/// Record an active finder report.
///
/// The finder's phone is mandatory (validated at the boundary); name and
/// email are optional. Photos arrive as opaque references from the external
/// file store and commit together with the report.
pub async fn record_report(
    storage: &Storage,
    pet_code: &str,
    finder: &FinderInfo,
    message: Option<&str>,
    coordinates: Option<Coordinates>,
    photo_refs: &[String],
) -> Result<(Pet, LocationReport)> {
    let pet = storage.get_pet_by_code(pet_code).await?;
    let report = storage
        .insert_report(pet.id, finder, message, coordinates, photo_refs)
        .await?;

    info!(
        pet_id = pet.id,
        report_id = report.id,
        photo_count = report.photo_refs.len(),
        "Location report recorded"
    );

    Ok((pet, report))
}

/// Transition a report `reported → verified`.
///
/// Verifying an already-verified report is a no-op refresh; a reunited
/// report can no longer be verified.
pub async fn verify(storage: &Storage, report_id: i64) -> Result<LocationReport> {
    let report = storage.get_report(report_id).await?;

    match report.status {
        ReportStatus::Reunited => Err(Error::InvalidTransition {
            from: ReportStatus::Reunited,
            to: ReportStatus::Verified,
        }),
        ReportStatus::Verified => Ok(report),
        ReportStatus::Reported => {
            let moved = storage
                .transition_report(report_id, ReportStatus::Reported, ReportStatus::Verified)
                .await?;

            if !moved {
                // Lost a race with a concurrent transition; re-read and
                // re-evaluate against the fresh status.
                let current = storage.get_report(report_id).await?;
                if current.status == ReportStatus::Reunited {
                    return Err(Error::InvalidTransition {
                        from: ReportStatus::Reunited,
                        to: ReportStatus::Verified,
                    });
                }
                return Ok(current);
            }

            info!(report_id, "Report verified");
            storage.get_report(report_id).await
        }
    }
}

/// Transition a report to `reunited` and clear the pet's lost flag.
///
/// Idempotent: re-invoking on an already-reunited report returns it
/// unchanged and produces no further side effects. Reunited is reachable
/// from every other status, so the transition is retried from the fresh
/// status whenever a concurrent writer moves the row first; the call only
/// returns once the report is reunited.
pub async fn mark_reunited(storage: &Storage, report_id: i64) -> Result<LocationReport> {
    loop {
        let report = storage.get_report(report_id).await?;

        if report.status == ReportStatus::Reunited {
            return Ok(report);
        }

        let moved = storage
            .transition_report(report_id, report.status, ReportStatus::Reunited)
            .await?;

        if moved {
            storage.set_lost_flag(report.pet_id, false).await?;
            info!(
                report_id,
                pet_id = report.pet_id,
                "Report marked reunited, lost flag cleared"
            );
            return storage.get_report(report_id).await;
        }

        // Lost a race with a concurrent transition; re-read and try again
        // from whatever status the row is in now.
    }
}
