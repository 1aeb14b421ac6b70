//! Integration tests for notification dispatch against stub providers.
//!
//! A tiny axum server stands in for the email and messaging APIs so the
//! dispatcher's channel-isolation contract can be exercised end to end:
//! one broken channel never blocks the other, and every attempt lands in
//! the audit trail.

use std::time::Duration;

use axum::{Json, Router, http::StatusCode, routing::post};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use pettag::channels::{EmailClient, MessagingClient};
use pettag::dispatch::Dispatcher;
use pettag::model::{
    AttemptOutcome, Channel, Coordinates, Pet, RegisterPetRequest, RequesterMeta, Sighting,
    SightingKind,
};
use pettag::storage::{NewOwner, Storage};

const PHONE_NUMBER_ID: &str = "10000001";

/// Stub provider: email always delivers; messaging fails text sends with a
/// 500 but delivers location sends.
async fn stub_email(Json(_body): Json<Value>) -> Json<Value> {
    Json(json!({ "id": "email-ref-1" }))
}

async fn stub_messages(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["type"] == "text" {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "provider outage" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({ "messages": [{ "id": "wamid.location-1" }] })),
    )
}

/// Spin the stub provider on an ephemeral port, returning its base URL.
async fn start_stub_provider() -> String {
    let app = Router::new()
        .route("/emails", post(stub_email))
        .route(&format!("/{PHONE_NUMBER_ID}/messages"), post(stub_messages));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}")
}

async fn seed_pet(storage: &Storage) -> Pet {
    let owner_id = storage
        .insert_owner(&NewOwner {
            first_name: "Maria".to_string(),
            last_name: "Quispe".to_string(),
            email: Some("maria@example.com".to_string()),
            phone: "59170000000".to_string(),
            whatsapp: Some("+591 71234567".to_string()),
            city: Some("La Paz".to_string()),
            address: None,
            locale: "es-BO".to_string(),
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
        .insert_pet(&request, "PET_DISPATCH1", "data:image/svg+xml;base64,AAAA")
        .await
        .unwrap();
    storage.get_pet(pet_id).await.unwrap()
}

#[tokio::test]
async fn broken_text_channel_does_not_block_email_or_location() {
    let base = start_stub_provider().await;
    let storage = Storage::new("sqlite::memory:").await.unwrap();
    let pet = seed_pet(&storage).await;
    let owner = storage.get_owner(pet.owner_id).await.unwrap();

    let scan = storage
        .insert_scan(
            pet.id,
            &RequesterMeta::unknown(),
            Some(Coordinates {
                latitude: -16.5,
                longitude: -68.15,
            }),
        )
        .await
        .unwrap();
    let sighting = Sighting::Scan(scan);

    let dispatcher = Dispatcher::new(
        "https://pettag.example",
        Some(EmailClient::with_base_url(&base, "token", "Pettag <alerts@pettag.example>")),
        Some(MessagingClient::with_base_url(&base, PHONE_NUMBER_ID, "token")),
    );

    let attempts = dispatcher.dispatch(&storage, &pet, &owner, &sighting).await;

    assert_eq!(attempts.len(), 3);

    let email = &attempts[0];
    assert_eq!(email.channel, Channel::Email);
    assert_eq!(email.outcome, AttemptOutcome::Delivered);
    assert_eq!(email.provider_ref.as_deref(), Some("email-ref-1"));

    let text = &attempts[1];
    assert_eq!(text.channel, Channel::MessagingText);
    assert_eq!(text.outcome, AttemptOutcome::Failed);
    assert!(text.error.is_some());

    // The location message is attempted and delivered despite the text failure
    let location = &attempts[2];
    assert_eq!(location.channel, Channel::MessagingLocation);
    assert_eq!(location.outcome, AttemptOutcome::Delivered);
    assert_eq!(location.provider_ref.as_deref(), Some("wamid.location-1"));

    // Every attempt is in the audit trail
    let stored = storage
        .attempts_for_sighting(SightingKind::Scan, sighting.id())
        .await
        .unwrap();
    assert_eq!(stored.len(), 3);
    assert_eq!(stored[1].outcome, AttemptOutcome::Failed);
}

#[tokio::test]
async fn unreachable_providers_produce_failed_attempts() {
    // Grab a port and release it so connections are refused
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let storage = Storage::new("sqlite::memory:").await.unwrap();
    let pet = seed_pet(&storage).await;
    let owner = storage.get_owner(pet.owner_id).await.unwrap();

    let scan = storage
        .insert_scan(pet.id, &RequesterMeta::unknown(), None)
        .await
        .unwrap();
    let sighting = Sighting::Scan(scan);

    let dispatcher = Dispatcher::new(
        "https://pettag.example",
        Some(EmailClient::with_base_url(&base, "token", "Pettag <alerts@pettag.example>")),
        Some(MessagingClient::with_base_url(&base, PHONE_NUMBER_ID, "token")),
    );

    let attempts = dispatcher.dispatch(&storage, &pet, &owner, &sighting).await;

    // No coordinates, so no location attempt
    assert_eq!(attempts.len(), 2);
    for attempt in &attempts {
        assert_eq!(attempt.outcome, AttemptOutcome::Failed);
        assert!(attempt.error.is_some());
        assert!(attempt.provider_ref.is_none());
    }

    let stored = storage
        .attempts_for_sighting(SightingKind::Scan, sighting.id())
        .await
        .unwrap();
    assert_eq!(stored.len(), 2);
}

#[tokio::test]
async fn hung_provider_times_out_into_failed_attempt() {
    // Stub where the email endpoint hangs well past the client timeout and
    // messaging answers promptly.
    let app = Router::new()
        .route(
            "/emails",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({ "id": "too-late" }))
            }),
        )
        .route(
            &format!("/{PHONE_NUMBER_ID}/messages"),
            post(|| async { Json(json!({ "messages": [{ "id": "wamid.fast-1" }] })) }),
        );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let storage = Storage::new("sqlite::memory:").await.unwrap();
    let pet = seed_pet(&storage).await;
    let owner = storage.get_owner(pet.owner_id).await.unwrap();

    let scan = storage
        .insert_scan(pet.id, &RequesterMeta::unknown(), None)
        .await
        .unwrap();
    let sighting = Sighting::Scan(scan);

    let dispatcher = Dispatcher::new(
        "https://pettag.example",
        Some(
            EmailClient::with_base_url(&base, "token", "Pettag <alerts@pettag.example>")
                .with_timeout(Duration::from_millis(100)),
        ),
        Some(MessagingClient::with_base_url(&base, PHONE_NUMBER_ID, "token")),
    );

    let attempts = dispatcher.dispatch(&storage, &pet, &owner, &sighting).await;

    // The hung email channel records a failure; the prompt channel is
    // unaffected by the stall.
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].channel, Channel::Email);
    assert_eq!(attempts[0].outcome, AttemptOutcome::Failed);
    assert!(attempts[0].error.is_some());
    assert_eq!(attempts[1].channel, Channel::MessagingText);
    assert_eq!(attempts[1].outcome, AttemptOutcome::Delivered);
    assert_eq!(attempts[1].provider_ref.as_deref(), Some("wamid.fast-1"));
}

#[tokio::test]
async fn delivered_attempts_carry_provider_refs_per_channel() {
    let base = start_stub_provider().await;
    let storage = Storage::new("sqlite::memory:").await.unwrap();
    let pet = seed_pet(&storage).await;
    let owner = storage.get_owner(pet.owner_id).await.unwrap();

    // A report without coordinates: email delivers, text fails, no location
    let report = storage
        .insert_report(
            pet.id,
            &pettag::model::FinderInfo {
                name: Some("Carlos".to_string()),
                phone: "59171234567".to_string(),
                email: None,
            },
            Some("found near the park"),
            None,
            &[],
        )
        .await
        .unwrap();
    let sighting = Sighting::Report(report);

    let dispatcher = Dispatcher::new(
        "https://pettag.example",
        Some(EmailClient::with_base_url(&base, "token", "Pettag <alerts@pettag.example>")),
        Some(MessagingClient::with_base_url(&base, PHONE_NUMBER_ID, "token")),
    );

    let attempts = dispatcher.dispatch(&storage, &pet, &owner, &sighting).await;

    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].channel, Channel::Email);
    assert_eq!(attempts[0].outcome, AttemptOutcome::Delivered);
    assert_eq!(attempts[1].channel, Channel::MessagingText);
    assert_eq!(attempts[1].outcome, AttemptOutcome::Failed);

    // Report attempts are keyed separately from scan attempts
    let stored = storage
        .attempts_for_sighting(SightingKind::Report, sighting.id())
        .await
        .unwrap();
    assert_eq!(stored.len(), 2);
}
