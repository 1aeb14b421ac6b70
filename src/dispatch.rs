//! Notification dispatcher: best-effort fan-out across owner alert channels.
//!
//! Given a sighting and the owning pet/owner, the dispatcher attempts
//! delivery on every configured channel and returns one
//! [`NotificationAttempt`] per channel actually attempted or skipped.
//!
//! The contract callers rely on:
//!
//! - A missing or broken channel never prevents delivery on the other channel.
//! - `dispatch` never returns an error; failures become `failed` attempts.
//! - Channels settle independently (`tokio::join!`) and no storage handle is
//!   held while a channel call is in flight.
//! - Each channel request has a bounded timeout, so a hung provider shows up
//!   as a `failed` attempt instead of a hung dispatch.

use chrono::Locale;
use tracing::{info, warn};

use crate::channels::{EmailClient, MessagingClient};
use crate::model::{
    Channel, Coordinates, NotificationAttempt, OwnerContact, Pet, Sighting, SightingKind,
};
use crate::storage::Storage;

/// Channel-agnostic alert content, built once per sighting.
#[derive(Debug, Clone)]
pub struct AlertPayload {
    pet_name: String,
    /// Event time already rendered in the owner's locale.
    event_time: String,
    coordinates: Option<Coordinates>,
    kind: SightingKind,
    finder_name: Option<String>,
    finder_phone: Option<String>,
    message: Option<String>,
    dashboard_url: String,
}

fn locale_for(tag: &str) -> Locale {
    // The pilot deployment is Bolivian; anything Spanish maps to es_BO and
    // everything else falls back to US English.
    if tag.starts_with("es") {
        Locale::es_BO
    } else {
        Locale::en_US
    }
}

impl AlertPayload {
    pub fn build(base_url: &str, pet: &Pet, owner: &OwnerContact, sighting: &Sighting) -> Self {
        let event_time = sighting
            .occurred_at()
            .format_localized("%e de %B de %Y, %H:%M", locale_for(&owner.locale))
            .to_string();

        let (finder_name, finder_phone, message) = match sighting {
            Sighting::Scan(_) => (None, None, None),
            Sighting::Report(report) => (
                report.finder.name.clone(),
                Some(report.finder.phone.clone()),
                report.message.clone(),
            ),
        };

        Self {
            pet_name: pet.name.clone(),
            event_time,
            coordinates: sighting.coordinates(),
            kind: sighting.kind(),
            finder_name,
            finder_phone,
            message,
            dashboard_url: format!(
                "{}/dashboard?pet={}",
                base_url.trim_end_matches('/'),
                urlencoding::encode(&pet.name)
            ),
        }
    }

    pub fn map_link(&self) -> Option<String> {
        self.coordinates.map(|c| c.maps_link())
    }

    fn finder_display(&self) -> &str {
        self.finder_name.as_deref().unwrap_or("Alguien")
    }

    pub fn email_subject(&self) -> String {
        match self.kind {
            SightingKind::Scan => format!("Alguien escaneó el código de {}", self.pet_name),
            SightingKind::Report => {
                format!("{} encontró a {}", self.finder_display(), self.pet_name)
            }
        }
    }

    pub fn email_html(&self) -> String {
        let headline = match self.kind {
            SightingKind::Scan => format!(
                "Alguien acaba de escanear el código QR de <strong>{}</strong>.",
                self.pet_name
            ),
            SightingKind::Report => format!(
                "<strong>{}</strong> reportó haber encontrado a <strong>{}</strong>.",
                self.finder_display(),
                self.pet_name
            ),
        };

        let mut details = format!(
            "<p><strong>Mascota:</strong> {}</p>\
             <p><strong>Fecha y hora:</strong> {}</p>",
            self.pet_name, self.event_time
        );
        if let Some(phone) = &self.finder_phone {
            details.push_str(&format!(
                "<p><strong>Teléfono:</strong> <a href=\"tel:{phone}\">{phone}</a></p>"
            ));
        }
        if let Some(message) = &self.message {
            details.push_str(&format!("<p><strong>Mensaje:</strong> {}</p>", message));
        }
        if let Some(link) = self.map_link() {
            details.push_str(&format!(
                "<p><strong>Ubicación:</strong> <a href=\"{link}\">Ver en Google Maps</a></p>"
            ));
        }

        format!(
            "<!DOCTYPE html><html><body>\
             <h1>Alerta de Pettag</h1>\
             <p>{headline}</p>\
             <div>{details}</div>\
             <p><a href=\"{dashboard}\">Ver panel</a></p>\
             </body></html>",
            headline = headline,
            details = details,
            dashboard = self.dashboard_url
        )
    }

    pub fn text_body(&self) -> String {
        let mut body = match self.kind {
            SightingKind::Scan => format!(
                "Pettag: alguien acaba de escanear el código QR de *{}*.\n\nFecha: {}",
                self.pet_name, self.event_time
            ),
            SightingKind::Report => format!(
                "Pettag: *{}* reportó haber encontrado a *{}*.\n\nTeléfono: {}\nFecha: {}",
                self.finder_display(),
                self.pet_name,
                self.finder_phone.as_deref().unwrap_or("No proporcionado"),
                self.event_time
            ),
        };

        if let Some(message) = &self.message {
            body.push_str(&format!("\nMensaje: {}", message));
        }
        body.push_str(&format!("\n\nVer panel: {}", self.dashboard_url));
        body
    }

    pub fn location_name(&self) -> String {
        format!("{} fue vista aquí", self.pet_name)
    }

    pub fn location_address(&self) -> &'static str {
        "Ubicación reportada del avistamiento"
    }
}

/// Process-scoped dispatcher holding the (optional) channel clients.
///
/// Constructed once at startup and shared through application state.
#[derive(Clone)]
pub struct Dispatcher {
    base_url: String,
    email: Option<EmailClient>,
    messaging: Option<MessagingClient>,
}

impl Dispatcher {
    pub fn new(
        base_url: &str,
        email: Option<EmailClient>,
        messaging: Option<MessagingClient>,
    ) -> Self {
        Self {
            base_url: base_url.to_string(),
            email,
            messaging,
        }
    }

    /// Fan an owner alert out across all channels.
    ///
    /// Returns the full attempt list and appends it to the notification
    /// audit trail. Infallible by design: channel failures and even audit
    /// persistence failures are logged, never raised.
    pub async fn dispatch(
        &self,
        storage: &Storage,
        pet: &Pet,
        owner: &OwnerContact,
        sighting: &Sighting,
    ) -> Vec<NotificationAttempt> {
        let payload = AlertPayload::build(&self.base_url, pet, owner, sighting);

        let (email_attempt, messaging_attempts) = tokio::join!(
            self.attempt_email(owner, &payload),
            self.attempt_messaging(owner, &payload),
        );

        let mut attempts = vec![email_attempt];
        attempts.extend(messaging_attempts);

        if let Err(e) = storage
            .insert_attempts(pet.id, sighting.kind(), sighting.id(), &attempts)
            .await
        {
            warn!(
                pet_id = pet.id,
                sighting_id = sighting.id(),
                error = %e,
                "Failed to persist notification attempts"
            );
        }

        info!(
            pet_id = pet.id,
            sighting_kind = sighting.kind().as_str(),
            sighting_id = sighting.id(),
            attempt_count = attempts.len(),
            "Notification dispatch finished"
        );

        attempts
    }

    async fn attempt_email(&self, owner: &OwnerContact, payload: &AlertPayload) -> NotificationAttempt {
        let Some(client) = &self.email else {
            return NotificationAttempt::skipped(Channel::Email);
        };
        let Some(to) = &owner.email else {
            return NotificationAttempt::skipped(Channel::Email);
        };

        match client
            .send(to, &payload.email_subject(), &payload.email_html())
            .await
        {
            Ok(id) => {
                info!(provider_ref = %id, "Email alert delivered");
                NotificationAttempt::delivered(Channel::Email, id)
            }
            Err(e) => {
                warn!(error = %e, "Email alert failed");
                NotificationAttempt::failed(Channel::Email, e.to_string())
            }
        }
    }

    async fn attempt_messaging(
        &self,
        owner: &OwnerContact,
        payload: &AlertPayload,
    ) -> Vec<NotificationAttempt> {
        let Some(client) = &self.messaging else {
            return vec![NotificationAttempt::skipped(Channel::MessagingText)];
        };
        let Some(to) = &owner.whatsapp else {
            return vec![NotificationAttempt::skipped(Channel::MessagingText)];
        };

        let text_attempt = match client.send_text(to, &payload.text_body()).await {
            Ok(id) => {
                info!(provider_ref = %id, "Messaging text alert delivered");
                NotificationAttempt::delivered(Channel::MessagingText, id)
            }
            Err(e) => {
                warn!(error = %e, "Messaging text alert failed");
                NotificationAttempt::failed(Channel::MessagingText, e.to_string())
            }
        };

        let mut attempts = vec![text_attempt];

        // A location message is a second, independent attempt: its outcome
        // never rewrites the text attempt's.
        if let Some(coords) = payload.coordinates {
            let location_attempt = match client
                .send_location(
                    to,
                    coords.latitude,
                    coords.longitude,
                    &payload.location_name(),
                    payload.location_address(),
                )
                .await
            {
                Ok(id) => {
                    info!(provider_ref = %id, "Messaging location alert delivered");
                    NotificationAttempt::delivered(Channel::MessagingLocation, id)
                }
                Err(e) => {
                    warn!(error = %e, "Messaging location alert failed");
                    NotificationAttempt::failed(Channel::MessagingLocation, e.to_string())
                }
            };
            attempts.push(location_attempt);
        }

        attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AttemptOutcome, FinderInfo, LocationReport, RegisterPetRequest, ReportStatus, ScanEvent,
    };
    use crate::storage::NewOwner;
    use chrono::{TimeZone, Utc};

    fn pet_fixture() -> Pet {
        Pet {
            id: 1,
            owner_id: 1,
            pet_code: "PET_TESTCODE1".to_string(),
            name: "Max".to_string(),
            species: "Perro".to_string(),
            breed: None,
            sex: None,
            color: None,
            allergies: None,
            medical_conditions: None,
            medications: None,
            special_care: None,
            blood_type: None,
            veterinarian_name: None,
            veterinarian_phone: None,
            qr_code: "data:image/svg+xml;base64,AAAA".to_string(),
            is_lost: true,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn owner_fixture() -> OwnerContact {
        OwnerContact {
            id: 1,
            first_name: "Maria".to_string(),
            last_name: "Quispe".to_string(),
            email: Some("maria@example.com".to_string()),
            phone: "59170000000".to_string(),
            whatsapp: Some("+591 71234567".to_string()),
            city: Some("La Paz".to_string()),
            locale: "es-BO".to_string(),
        }
    }

    fn scan_sighting(coords: Option<Coordinates>) -> Sighting {
        Sighting::Scan(ScanEvent {
            id: 10,
            pet_id: 1,
            scanned_at: Utc.with_ymd_and_hms(2026, 8, 30, 14, 5, 0).unwrap(),
            ip_address: "203.0.113.7".to_string(),
            user_agent: "test".to_string(),
            coordinates: coords,
        })
    }

    fn report_sighting() -> Sighting {
        Sighting::Report(LocationReport {
            id: 20,
            pet_id: 1,
            finder: FinderInfo {
                name: Some("Carlos".to_string()),
                phone: "59171234567".to_string(),
                email: None,
            },
            message: Some("found near the park".to_string()),
            coordinates: Some(Coordinates {
                latitude: -16.5,
                longitude: -68.15,
            }),
            photo_refs: vec![],
            status: ReportStatus::Reported,
            created_at: Utc.with_ymd_and_hms(2026, 8, 30, 14, 5, 0).unwrap(),
        })
    }

    #[test]
    fn payload_formats_time_in_owner_locale() {
        let payload = AlertPayload::build(
            "https://pettag.example",
            &pet_fixture(),
            &owner_fixture(),
            &scan_sighting(None),
        );
        assert!(payload.event_time.contains("agosto"));

        let mut english_owner = owner_fixture();
        english_owner.locale = "en-US".to_string();
        let payload = AlertPayload::build(
            "https://pettag.example",
            &pet_fixture(),
            &english_owner,
            &scan_sighting(None),
        );
        assert!(payload.event_time.contains("August"));
    }

    #[test]
    fn map_link_requires_coordinates() {
        let without = AlertPayload::build(
            "https://pettag.example",
            &pet_fixture(),
            &owner_fixture(),
            &scan_sighting(None),
        );
        assert!(without.map_link().is_none());

        let with = AlertPayload::build(
            "https://pettag.example",
            &pet_fixture(),
            &owner_fixture(),
            &scan_sighting(Some(Coordinates {
                latitude: -16.5,
                longitude: -68.15,
            })),
        );
        assert_eq!(
            with.map_link().as_deref(),
            Some("https://www.google.com/maps?q=-16.5,-68.15")
        );
    }

    #[test]
    fn report_payload_carries_finder_contact() {
        let payload = AlertPayload::build(
            "https://pettag.example",
            &pet_fixture(),
            &owner_fixture(),
            &report_sighting(),
        );

        let text = payload.text_body();
        assert!(text.contains("Carlos"));
        assert!(text.contains("59171234567"));
        assert!(text.contains("Max"));

        let html = payload.email_html();
        assert!(html.contains("tel:59171234567"));
        assert!(html.contains("found near the park"));
        assert!(html.contains("Ver en Google Maps"));
    }

    async fn audit_storage() -> (Storage, Pet) {
        let storage = Storage::new("sqlite::memory:").await.unwrap();
        let owner = owner_fixture();
        let owner_id = storage
            .insert_owner(&NewOwner {
                first_name: owner.first_name,
                last_name: owner.last_name,
                email: owner.email,
                phone: owner.phone,
                whatsapp: owner.whatsapp,
                city: owner.city,
                address: None,
                locale: owner.locale,
            })
            .await
            .unwrap();

        let request = RegisterPetRequest {
            owner_id,
            name: "Max".to_string(),
            species: "Perro".to_string(),
            breed: None,
            sex: None,
            color: None,
            allergies: None,
            medical_conditions: None,
            medications: None,
            special_care: None,
            blood_type: None,
            veterinarian_name: None,
            veterinarian_phone: None,
        };
        let pet_id = storage
            .insert_pet(&request, "PET_TESTCODE1", "data:image/svg+xml;base64,AAAA")
            .await
            .unwrap();
        let pet = storage.get_pet(pet_id).await.unwrap();
        (storage, pet)
    }

    #[tokio::test]
    async fn unconfigured_channels_yield_two_skipped_attempts() {
        let (storage, pet) = audit_storage().await;
        let owner = storage.get_owner(pet.owner_id).await.unwrap();
        let sighting = scan_sighting(None);

        let dispatcher = Dispatcher::new("https://pettag.example", None, None);
        let attempts = dispatcher.dispatch(&storage, &pet, &owner, &sighting).await;

        assert_eq!(attempts.len(), 2);
        assert!(
            attempts
                .iter()
                .all(|a| a.outcome == AttemptOutcome::SkippedUnconfigured)
        );
        assert_eq!(attempts[0].channel, Channel::Email);
        assert_eq!(attempts[1].channel, Channel::MessagingText);

        // Audit trail persisted even for skipped channels
        let stored = storage
            .attempts_for_sighting(SightingKind::Scan, sighting.id())
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn owner_without_handles_skips_configured_channels() {
        let (storage, pet) = audit_storage().await;
        let mut owner = storage.get_owner(pet.owner_id).await.unwrap();
        owner.email = None;
        owner.whatsapp = None;

        let dispatcher = Dispatcher::new(
            "https://pettag.example",
            Some(crate::channels::EmailClient::new("token", "Pettag <alerts@pettag.example>")),
            Some(crate::channels::MessagingClient::new("12345", "token")),
        );
        let attempts = dispatcher
            .dispatch(&storage, &pet, &owner, &scan_sighting(None))
            .await;

        assert_eq!(attempts.len(), 2);
        assert!(
            attempts
                .iter()
                .all(|a| a.outcome == AttemptOutcome::SkippedUnconfigured)
        );
    }
}
