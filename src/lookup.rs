//! Public lookup resolver.
//!
//! Resolves a public code to the redacted finder-facing view, recording a
//! scan and dispatching owner notifications as side effects. The anonymous
//! finder always gets the view if the code resolves; side-effect failures
//! are logged, never surfaced.

use tracing::warn;

use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::model::{Coordinates, PublicPetView, RequesterMeta, Sighting};
use crate::sighting;
use crate::storage::Storage;

/// Resolve a public code for an anonymous finder.
///
/// Unknown and deactivated codes produce the same `NotFound`, so a finder
/// cannot distinguish a retired tag from one that never existed.
pub async fn resolve_public(
    storage: &Storage,
    dispatcher: &Dispatcher,
    pet_code: &str,
    meta: &RequesterMeta,
    coordinates: Option<Coordinates>,
) -> Result<PublicPetView> {
    let view = storage.get_public_view(pet_code).await?;

    // Side effects run after the view is secured; nothing below may fail the
    // finder's request.
    match sighting::record_scan(storage, pet_code, meta, coordinates).await {
        Ok((pet, scan)) => match storage.get_owner(pet.owner_id).await {
            Ok(owner) => {
                dispatcher
                    .dispatch(storage, &pet, &owner, &Sighting::Scan(scan))
                    .await;
            }
            Err(e) => {
                warn!(pet_id = pet.id, error = %e, "Owner lookup failed during public lookup");
            }
        },
        Err(e) => {
            warn!(pet_code, error = %e, "Failed to record scan during public lookup");
        }
    }

    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::model::RegisterPetRequest;
    use crate::storage::NewOwner;

    async fn setup() -> (Storage, Dispatcher, i64, String) {
        let storage = Storage::new("sqlite::memory:").await.unwrap();
        let owner_id = storage
            .insert_owner(&NewOwner {
                first_name: "Maria".to_string(),
                last_name: "Quispe".to_string(),
                email: None,
                phone: "59170000000".to_string(),
                whatsapp: None,
                city: Some("La Paz".to_string()),
                address: Some("Av. Arce 2132".to_string()),
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
            .insert_pet(&request, "PET_MAXCODE01", "data:image/svg+xml;base64,AAAA")
            .await
            .unwrap();

        let dispatcher = Dispatcher::new("https://pettag.example", None, None);
        (storage, dispatcher, pet_id, "PET_MAXCODE01".to_string())
    }

    #[tokio::test]
    async fn lookup_returns_redacted_view_and_records_one_scan() {
        let (storage, dispatcher, pet_id, code) = setup().await;

        let view = resolve_public(&storage, &dispatcher, &code, &RequesterMeta::unknown(), None)
            .await
            .unwrap();

        assert_eq!(view.name, "Max");
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("address"));
        assert!(!json.contains("Av. Arce"));

        let stats = storage.scan_stats(pet_id).await.unwrap();
        assert_eq!(stats.total_scans, 1);
    }

    #[tokio::test]
    async fn deactivated_pet_is_uniformly_not_found() {
        let (storage, dispatcher, pet_id, code) = setup().await;
        storage.deactivate_pet(pet_id).await.unwrap();

        let err = resolve_public(&storage, &dispatcher, &code, &RequesterMeta::unknown(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound));

        let err = resolve_public(
            &storage,
            &dispatcher,
            "PET_NEVERWAS",
            &RequesterMeta::unknown(),
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::NotFound));

        // No scan recorded for a code that does not resolve
        let stats = storage.scan_stats(pet_id).await.unwrap();
        assert_eq!(stats.total_scans, 0);
    }
}
