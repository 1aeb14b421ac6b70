//! Data models for Pettag.
//!
//! # Redaction Guarantees
//!
//! Public-facing types in this module are **redacted by construction**. The
//! view returned to an anonymous finder ([`PublicPetView`]) carries only what
//! a finder needs to get the animal home:
//!
//! - No owner address or account identifier
//! - No authentication data of any kind
//! - No internal row ids
//!
//! Whether a code was never issued or belongs to a deactivated pet is equally
//! invisible to anonymous callers: both produce the same not-found response.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A latitude/longitude pair attached to a sighting.
///
/// Coordinates are only considered present when **both** components were
/// provided; a lone latitude or longitude is discarded at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Combine optional components into coordinates, requiring both.
    pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Some(Self {
                latitude,
                longitude,
            }),
            _ => None,
        }
    }

    /// A shareable map link for this position.
    pub fn maps_link(&self) -> String {
        format!(
            "https://www.google.com/maps?q={},{}",
            self.latitude, self.longitude
        )
    }
}

/// Metadata about the anonymous requester that triggered a scan.
///
/// Captured for the owner's audit trail only; never shown to other finders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequesterMeta {
    /// Requester IP address, or "unknown" when the transport cannot supply one.
    pub ip_address: String,

    /// Requester user agent, or "unknown".
    pub user_agent: String,
}

impl RequesterMeta {
    pub fn unknown() -> Self {
        Self {
            ip_address: "unknown".to_string(),
            user_agent: "unknown".to_string(),
        }
    }
}

/// Lifecycle status of a finder's location report.
///
/// Status only moves forward: `reported → verified → reunited`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    /// A finder submitted the report; nothing confirmed yet.
    Reported,

    /// The owner confirmed the report looks genuine.
    Verified,

    /// The pet is back with its owner. Terminal.
    Reunited,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Reported => "reported",
            ReportStatus::Verified => "verified",
            ReportStatus::Reunited => "reunited",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reported" => Some(ReportStatus::Reported),
            "verified" => Some(ReportStatus::Verified),
            "reunited" => Some(ReportStatus::Reunited),
            _ => None,
        }
    }

    fn rank(self) -> u8 {
        match self {
            ReportStatus::Reported => 0,
            ReportStatus::Verified => 1,
            ReportStatus::Reunited => 2,
        }
    }

    /// Whether a transition to `next` respects the forward-only rule.
    ///
    /// Re-asserting the current status is allowed (idempotent no-op);
    /// moving backwards or out of `reunited` is not.
    pub fn allows(self, next: ReportStatus) -> bool {
        next.rank() >= self.rank()
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A passive QR scan of a pet's tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanEvent {
    pub id: i64,
    pub pet_id: i64,
    pub scanned_at: DateTime<Utc>,
    pub ip_address: String,
    pub user_agent: String,
    pub coordinates: Option<Coordinates>,
}

/// Contact details of the person who found a pet.
///
/// Phone is the one mandatory field; it is the owner's way back to the finder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinderInfo {
    pub name: Option<String>,
    pub phone: String,
    pub email: Option<String>,
}

/// An active finder-submitted location report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationReport {
    pub id: i64,
    pub pet_id: i64,
    pub finder: FinderInfo,
    pub message: Option<String>,
    pub coordinates: Option<Coordinates>,
    /// Opaque references into the external photo store.
    pub photo_refs: Vec<String>,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
}

/// Which kind of sighting a notification attempt refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SightingKind {
    Scan,
    Report,
}

impl SightingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SightingKind::Scan => "scan",
            SightingKind::Report => "report",
        }
    }
}

/// A sighting handed to the notification dispatcher.
#[derive(Debug, Clone)]
pub enum Sighting {
    Scan(ScanEvent),
    Report(LocationReport),
}

impl Sighting {
    pub fn kind(&self) -> SightingKind {
        match self {
            Sighting::Scan(_) => SightingKind::Scan,
            Sighting::Report(_) => SightingKind::Report,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Sighting::Scan(scan) => scan.id,
            Sighting::Report(report) => report.id,
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            Sighting::Scan(scan) => scan.scanned_at,
            Sighting::Report(report) => report.created_at,
        }
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        match self {
            Sighting::Scan(scan) => scan.coordinates,
            Sighting::Report(report) => report.coordinates,
        }
    }
}

/// A distinct notification transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Channel {
    Email,
    MessagingText,
    MessagingLocation,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::MessagingText => "messaging-text",
            Channel::MessagingLocation => "messaging-location",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "email" => Some(Channel::Email),
            "messaging-text" => Some(Channel::MessagingText),
            "messaging-location" => Some(Channel::MessagingLocation),
            _ => None,
        }
    }
}

/// Outcome of a single delivery attempt on one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttemptOutcome {
    /// The transport accepted the message and returned a provider reference.
    Delivered,

    /// The channel has no credential configured; nothing was sent.
    SkippedUnconfigured,

    /// The transport rejected the message or timed out.
    Failed,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Delivered => "delivered",
            AttemptOutcome::SkippedUnconfigured => "skipped-unconfigured",
            AttemptOutcome::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "delivered" => Some(AttemptOutcome::Delivered),
            "skipped-unconfigured" => Some(AttemptOutcome::SkippedUnconfigured),
            "failed" => Some(AttemptOutcome::Failed),
            _ => None,
        }
    }
}

/// One entry of the per-sighting notification audit trail.
///
/// Attempts are append-only: once recorded they are never mutated, even if a
/// later channel on the same sighting fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationAttempt {
    pub channel: Channel,
    pub outcome: AttemptOutcome,
    /// Opaque delivery id returned by the provider, when delivered.
    pub provider_ref: Option<String>,
    /// Provider error text, when failed.
    pub error: Option<String>,
}

impl NotificationAttempt {
    pub fn delivered(channel: Channel, provider_ref: String) -> Self {
        Self {
            channel,
            outcome: AttemptOutcome::Delivered,
            provider_ref: Some(provider_ref),
            error: None,
        }
    }

    pub fn skipped(channel: Channel) -> Self {
        Self {
            channel,
            outcome: AttemptOutcome::SkippedUnconfigured,
            provider_ref: None,
            error: None,
        }
    }

    pub fn failed(channel: Channel, error: String) -> Self {
        Self {
            channel,
            outcome: AttemptOutcome::Failed,
            provider_ref: None,
            error: Some(error),
        }
    }
}

/// Owner contact details used for alerting and the public view.
///
/// This struct deliberately omits the owner's street address and any account
/// or credential fields; code that only holds an `OwnerContact` cannot leak
/// them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerContact {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: String,
    /// Messaging (WhatsApp) handle, when the owner opted in.
    pub whatsapp: Option<String>,
    pub city: Option<String>,
    /// BCP 47 tag used to format alert timestamps (e.g. "es-BO").
    pub locale: String,
}

impl OwnerContact {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A pet row as seen by its owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pet {
    pub id: i64,
    pub owner_id: i64,
    /// Immutable unique public code embedded in the tag.
    pub pet_code: String,
    pub name: String,
    pub species: String,
    pub breed: Option<String>,
    pub sex: Option<String>,
    pub color: Option<String>,
    pub allergies: Option<String>,
    pub medical_conditions: Option<String>,
    pub medications: Option<String>,
    pub special_care: Option<String>,
    pub blood_type: Option<String>,
    pub veterinarian_name: Option<String>,
    pub veterinarian_phone: Option<String>,
    /// Regenerable visual token (data URI).
    pub qr_code: String,
    pub is_lost: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Owner fields safe to show an anonymous finder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicOwnerView {
    pub name: String,
    pub city: Option<String>,
    pub phone: String,
    pub whatsapp: Option<String>,
}

/// The redacted view returned by the public lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicPetView {
    pub name: String,
    pub species: String,
    pub breed: Option<String>,
    pub sex: Option<String>,
    pub color: Option<String>,
    pub is_lost: bool,
    // Emergency medical fields: a finder or a vet may need these immediately.
    pub allergies: Option<String>,
    pub medical_conditions: Option<String>,
    pub medications: Option<String>,
    pub special_care: Option<String>,
    pub blood_type: Option<String>,
    pub veterinarian_name: Option<String>,
    pub veterinarian_phone: Option<String>,
    pub owner: PublicOwnerView,
}

/// Request body for POST /pets.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterPetRequest {
    pub owner_id: i64,
    pub name: String,
    pub species: String,
    pub breed: Option<String>,
    pub sex: Option<String>,
    pub color: Option<String>,
    pub allergies: Option<String>,
    pub medical_conditions: Option<String>,
    pub medications: Option<String>,
    pub special_care: Option<String>,
    pub blood_type: Option<String>,
    pub veterinarian_name: Option<String>,
    pub veterinarian_phone: Option<String>,
}

/// Allow-listed field set for PUT /pets/{id}.
///
/// Identity and audit fields (`pet_code`, `qr_code`, `is_lost`, `is_active`)
/// are intentionally absent; updates can never touch them.
#[derive(Debug, Clone, Deserialize)]
pub struct PetUpdate {
    pub name: String,
    pub species: String,
    pub breed: Option<String>,
    pub sex: Option<String>,
    pub color: Option<String>,
    pub allergies: Option<String>,
    pub medical_conditions: Option<String>,
    pub medications: Option<String>,
    pub special_care: Option<String>,
    pub blood_type: Option<String>,
    pub veterinarian_name: Option<String>,
    pub veterinarian_phone: Option<String>,
}

/// Request body for scan endpoints (coordinates optional).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanRequest {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Request body for POST /pet/{code}/report.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportRequest {
    pub finder_name: Option<String>,
    pub finder_phone: String,
    pub finder_email: Option<String>,
    pub message: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Opaque references produced by the external file-storage collaborator.
    #[serde(default)]
    pub photo_refs: Vec<String>,
}

/// One entry in a pet's vaccination history.
///
/// The vaccine is free text; the history is the owner's own record, not a
/// certified registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaccinationRecord {
    pub id: i64,
    pub pet_id: i64,
    pub vaccine_name: String,
    pub vaccination_date: NaiveDate,
    pub next_dose_date: Option<NaiveDate>,
    pub dose_number: i64,
    pub batch_number: Option<String>,
    pub veterinarian_name: Option<String>,
    pub clinic_name: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Request body for POST /pets/{id}/vaccination.
#[derive(Debug, Clone, Deserialize)]
pub struct AddVaccinationRequest {
    pub vaccine_name: String,
    pub vaccination_date: NaiveDate,
    pub next_dose_date: Option<NaiveDate>,
    #[serde(default = "default_dose_number")]
    pub dose_number: i64,
    pub batch_number: Option<String>,
    pub veterinarian_name: Option<String>,
    pub clinic_name: Option<String>,
    pub notes: Option<String>,
}

fn default_dose_number() -> i64 {
    1
}

/// Aggregate scan statistics for a pet.
#[derive(Debug, Clone, Serialize)]
pub struct ScanStats {
    pub total_scans: i64,
    pub unique_days: i64,
    pub last_scan: Option<DateTime<Utc>>,
}

/// Response for GET /pets/{id}/scans.
#[derive(Debug, Clone, Serialize)]
pub struct ScanHistory {
    pub stats: ScanStats,
    pub recent_scans: Vec<ScanEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_require_both_parts() {
        assert!(Coordinates::from_parts(Some(-16.5), Some(-68.15)).is_some());
        assert!(Coordinates::from_parts(Some(-16.5), None).is_none());
        assert!(Coordinates::from_parts(None, Some(-68.15)).is_none());
        assert!(Coordinates::from_parts(None, None).is_none());
    }

    #[test]
    fn maps_link_embeds_both_coordinates() {
        let coords = Coordinates {
            latitude: -16.5,
            longitude: -68.15,
        };
        assert_eq!(
            coords.maps_link(),
            "https://www.google.com/maps?q=-16.5,-68.15"
        );
    }

    #[test]
    fn report_status_round_trips() {
        for status in [
            ReportStatus::Reported,
            ReportStatus::Verified,
            ReportStatus::Reunited,
        ] {
            assert_eq!(ReportStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ReportStatus::parse("lost"), None);
    }

    #[test]
    fn report_status_only_moves_forward() {
        assert!(ReportStatus::Reported.allows(ReportStatus::Verified));
        assert!(ReportStatus::Reported.allows(ReportStatus::Reunited));
        assert!(ReportStatus::Verified.allows(ReportStatus::Reunited));
        assert!(!ReportStatus::Verified.allows(ReportStatus::Reported));
        assert!(!ReportStatus::Reunited.allows(ReportStatus::Verified));
        // Re-asserting the current status is always allowed
        assert!(ReportStatus::Reunited.allows(ReportStatus::Reunited));
    }

    #[test]
    fn channel_names_are_stable() {
        assert_eq!(Channel::Email.as_str(), "email");
        assert_eq!(Channel::MessagingText.as_str(), "messaging-text");
        assert_eq!(Channel::MessagingLocation.as_str(), "messaging-location");
        for channel in [
            Channel::Email,
            Channel::MessagingText,
            Channel::MessagingLocation,
        ] {
            assert_eq!(Channel::parse(channel.as_str()), Some(channel));
        }
    }

    #[test]
    fn attempt_constructors_set_outcome_fields() {
        let ok = NotificationAttempt::delivered(Channel::Email, "msg-1".to_string());
        assert_eq!(ok.outcome, AttemptOutcome::Delivered);
        assert_eq!(ok.provider_ref.as_deref(), Some("msg-1"));
        assert!(ok.error.is_none());

        let skipped = NotificationAttempt::skipped(Channel::MessagingText);
        assert_eq!(skipped.outcome, AttemptOutcome::SkippedUnconfigured);
        assert!(skipped.provider_ref.is_none());

        let failed = NotificationAttempt::failed(Channel::MessagingText, "timeout".to_string());
        assert_eq!(failed.outcome, AttemptOutcome::Failed);
        assert_eq!(failed.error.as_deref(), Some("timeout"));
    }
}
