//! SQLite storage layer for Pettag.
//!
//! All persistence goes through [`Storage`]. Writes are atomic at the
//! single-entity granularity: sightings are appended with their generated id
//! in one statement, report status moves through status-conditioned updates,
//! and a report plus its photo references commit in one transaction.
//!
//! Uniqueness and not-found conditions surface as the distinguishable
//! [`Error`](crate::error::Error) variants the core's callers translate.

use chrono::{NaiveDate, TimeZone, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};

use crate::error::{Error, Result};
use crate::model::{
    AddVaccinationRequest, AttemptOutcome, Channel, Coordinates, FinderInfo, LocationReport,
    NotificationAttempt, OwnerContact, Pet, PetUpdate, PublicOwnerView, PublicPetView,
    RegisterPetRequest, ReportStatus, RequesterMeta, ScanEvent, ScanStats, SightingKind,
    VaccinationRecord,
};

/// How many recent scans the history endpoint returns.
const RECENT_SCAN_LIMIT: i64 = 10;

/// Fields accepted when provisioning an owner contact record.
///
/// The account/auth collaborator owns everything else about an account; this
/// is only the contact surface the recovery core needs.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewOwner {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: String,
    pub whatsapp: Option<String>,
    pub city: Option<String>,
    /// Street address; stored for the owner's own use, never exposed publicly.
    pub address: Option<String>,
    #[serde(default = "default_locale")]
    pub locale: String,
}

fn default_locale() -> String {
    "es-BO".to_string()
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    /// Create a new storage instance and initialize the schema.
    ///
    /// # Arguments
    ///
    /// * `database_url` - SQLite connection string (e.g., "sqlite:pettag.db" or "sqlite::memory:")
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        let storage = Self { pool };
        storage.initialize_schema().await?;

        Ok(storage)
    }

    async fn initialize_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS owners (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                email TEXT,
                phone TEXT NOT NULL,
                whatsapp TEXT,
                city TEXT,
                address TEXT,
                locale TEXT NOT NULL DEFAULT 'es-BO',
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id INTEGER NOT NULL REFERENCES owners(id) ON DELETE CASCADE,
                pet_code TEXT UNIQUE NOT NULL,
                name TEXT NOT NULL,
                species TEXT NOT NULL,
                breed TEXT,
                sex TEXT,
                color TEXT,
                allergies TEXT,
                medical_conditions TEXT,
                medications TEXT,
                special_care TEXT,
                blood_type TEXT,
                veterinarian_name TEXT,
                veterinarian_phone TEXT,
                qr_code TEXT NOT NULL,
                is_lost INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS qr_scans (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                pet_id INTEGER NOT NULL REFERENCES pets(id) ON DELETE CASCADE,
                ip_address TEXT NOT NULL,
                user_agent TEXT NOT NULL,
                latitude REAL,
                longitude REAL,
                scanned_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS location_reports (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                pet_id INTEGER NOT NULL REFERENCES pets(id) ON DELETE CASCADE,
                finder_name TEXT,
                finder_phone TEXT NOT NULL,
                finder_email TEXT,
                message TEXT,
                latitude REAL,
                longitude REAL,
                status TEXT NOT NULL DEFAULT 'reported'
                    CHECK(status IN ('reported', 'verified', 'reunited')),
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS report_photos (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                report_id INTEGER NOT NULL REFERENCES location_reports(id) ON DELETE CASCADE,
                photo_ref TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS vaccination_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                pet_id INTEGER NOT NULL REFERENCES pets(id) ON DELETE CASCADE,
                vaccine_name TEXT NOT NULL,
                vaccination_date TEXT NOT NULL,
                next_dose_date TEXT,
                dose_number INTEGER NOT NULL DEFAULT 1,
                batch_number TEXT,
                veterinarian_name TEXT,
                clinic_name TEXT,
                notes TEXT,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS notification_attempts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                pet_id INTEGER NOT NULL REFERENCES pets(id) ON DELETE CASCADE,
                sighting_kind TEXT NOT NULL,
                sighting_id INTEGER NOT NULL,
                channel TEXT NOT NULL,
                outcome TEXT NOT NULL,
                provider_ref TEXT,
                error TEXT,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        for index in [
            "CREATE INDEX IF NOT EXISTS idx_pets_code ON pets(pet_code)",
            "CREATE INDEX IF NOT EXISTS idx_scans_pet ON qr_scans(pet_id, scanned_at)",
            "CREATE INDEX IF NOT EXISTS idx_reports_pet ON location_reports(pet_id)",
            "CREATE INDEX IF NOT EXISTS idx_vaccinations_pet ON vaccination_records(pet_id)",
            "CREATE INDEX IF NOT EXISTS idx_attempts_sighting \
             ON notification_attempts(sighting_kind, sighting_id)",
        ] {
            sqlx::query(index).execute(&self.pool).await?;
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Owners
    // ------------------------------------------------------------------

    /// Provision an owner contact record, returning its id.
    pub async fn insert_owner(&self, owner: &NewOwner) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO owners (first_name, last_name, email, phone, whatsapp, city, address, locale, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&owner.first_name)
        .bind(&owner.last_name)
        .bind(&owner.email)
        .bind(&owner.phone)
        .bind(&owner.whatsapp)
        .bind(&owner.city)
        .bind(&owner.address)
        .bind(&owner.locale)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Fetch the contact surface of an owner. The street address column is
    /// never selected into [`OwnerContact`].
    pub async fn get_owner(&self, owner_id: i64) -> Result<OwnerContact> {
        let row = sqlx::query(
            r#"
            SELECT id, first_name, last_name, email, phone, whatsapp, city, locale
            FROM owners
            WHERE id = ?
            "#,
        )
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::NotFound)?;

        Ok(OwnerContact {
            id: row.get("id"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            email: row.get("email"),
            phone: row.get("phone"),
            whatsapp: row.get("whatsapp"),
            city: row.get("city"),
            locale: row.get("locale"),
        })
    }

    // ------------------------------------------------------------------
    // Pets
    // ------------------------------------------------------------------

    /// Insert a newly registered pet.
    ///
    /// A uniqueness violation on `pet_code` maps to [`Error::DuplicateCode`]
    /// so the registration flow can retry with a fresh code.
    pub async fn insert_pet(
        &self,
        request: &RegisterPetRequest,
        pet_code: &str,
        qr_code: &str,
    ) -> Result<i64> {
        let now = Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO pets (
                owner_id, pet_code, name, species, breed, sex, color,
                allergies, medical_conditions, medications, special_care, blood_type,
                veterinarian_name, veterinarian_phone, qr_code,
                is_lost, is_active, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 1, ?, ?)
            "#,
        )
        .bind(request.owner_id)
        .bind(pet_code)
        .bind(&request.name)
        .bind(&request.species)
        .bind(&request.breed)
        .bind(&request.sex)
        .bind(&request.color)
        .bind(&request.allergies)
        .bind(&request.medical_conditions)
        .bind(&request.medications)
        .bind(&request.special_care)
        .bind(&request.blood_type)
        .bind(&request.veterinarian_name)
        .bind(&request.veterinarian_phone)
        .bind(qr_code)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => Error::DuplicateCode,
            _ => Error::Database(e),
        })?;

        Ok(result.last_insert_rowid())
    }

    /// Point lookup by pet id, regardless of active flag (owner-facing).
    pub async fn get_pet(&self, pet_id: i64) -> Result<Pet> {
        let row = sqlx::query("SELECT * FROM pets WHERE id = ?")
            .bind(pet_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(Error::NotFound)?;

        Ok(pet_from_row(&row))
    }

    /// Resolve a public code to an active pet.
    ///
    /// Unknown codes and deactivated pets are indistinguishable here: both
    /// are [`Error::NotFound`].
    pub async fn get_pet_by_code(&self, pet_code: &str) -> Result<Pet> {
        let row = sqlx::query("SELECT * FROM pets WHERE pet_code = ? AND is_active = 1")
            .bind(pet_code)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(Error::NotFound)?;

        Ok(pet_from_row(&row))
    }

    /// The redacted finder-facing view for an active pet.
    pub async fn get_public_view(&self, pet_code: &str) -> Result<PublicPetView> {
        let row = sqlx::query(
            r#"
            SELECT
                p.name, p.species, p.breed, p.sex, p.color, p.is_lost,
                p.allergies, p.medical_conditions, p.medications, p.special_care, p.blood_type,
                p.veterinarian_name, p.veterinarian_phone,
                o.first_name AS owner_first_name,
                o.last_name AS owner_last_name,
                o.phone AS owner_phone,
                o.whatsapp AS owner_whatsapp,
                o.city AS owner_city
            FROM pets p
            JOIN owners o ON p.owner_id = o.id
            WHERE p.pet_code = ? AND p.is_active = 1
            "#,
        )
        .bind(pet_code)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::NotFound)?;

        let first: String = row.get("owner_first_name");
        let last: String = row.get("owner_last_name");

        Ok(PublicPetView {
            name: row.get("name"),
            species: row.get("species"),
            breed: row.get("breed"),
            sex: row.get("sex"),
            color: row.get("color"),
            is_lost: row.get::<i64, _>("is_lost") != 0,
            allergies: row.get("allergies"),
            medical_conditions: row.get("medical_conditions"),
            medications: row.get("medications"),
            special_care: row.get("special_care"),
            blood_type: row.get("blood_type"),
            veterinarian_name: row.get("veterinarian_name"),
            veterinarian_phone: row.get("veterinarian_phone"),
            owner: PublicOwnerView {
                name: format!("{} {}", first, last),
                city: row.get("owner_city"),
                phone: row.get("owner_phone"),
                whatsapp: row.get("owner_whatsapp"),
            },
        })
    }

    /// Apply the allow-listed update to an active pet.
    ///
    /// `pet_code`, `qr_code`, `is_lost` and `is_active` cannot be reached
    /// through this statement.
    pub async fn update_pet(&self, pet_id: i64, update: &PetUpdate) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE pets SET
                name = ?, species = ?, breed = ?, sex = ?, color = ?,
                allergies = ?, medical_conditions = ?, medications = ?,
                special_care = ?, blood_type = ?,
                veterinarian_name = ?, veterinarian_phone = ?,
                updated_at = ?
            WHERE id = ? AND is_active = 1
            "#,
        )
        .bind(&update.name)
        .bind(&update.species)
        .bind(&update.breed)
        .bind(&update.sex)
        .bind(&update.color)
        .bind(&update.allergies)
        .bind(&update.medical_conditions)
        .bind(&update.medications)
        .bind(&update.special_care)
        .bind(&update.blood_type)
        .bind(&update.veterinarian_name)
        .bind(&update.veterinarian_phone)
        .bind(Utc::now().timestamp())
        .bind(pet_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    /// Replace the stored visual token after a regeneration.
    pub async fn set_qr_code(&self, pet_id: i64, qr_code: &str) -> Result<()> {
        let result = sqlx::query("UPDATE pets SET qr_code = ?, updated_at = ? WHERE id = ?")
            .bind(qr_code)
            .bind(Utc::now().timestamp())
            .bind(pet_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    pub async fn set_lost_flag(&self, pet_id: i64, is_lost: bool) -> Result<()> {
        let result = sqlx::query("UPDATE pets SET is_lost = ?, updated_at = ? WHERE id = ?")
            .bind(is_lost as i64)
            .bind(Utc::now().timestamp())
            .bind(pet_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    /// Soft-delete: the pet disappears from every public-code lookup.
    pub async fn deactivate_pet(&self, pet_id: i64) -> Result<()> {
        let result = sqlx::query("UPDATE pets SET is_active = 0, updated_at = ? WHERE id = ?")
            .bind(Utc::now().timestamp())
            .bind(pet_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Scans
    // ------------------------------------------------------------------

    /// Append a scan event; the returned value carries its generated id.
    pub async fn insert_scan(
        &self,
        pet_id: i64,
        meta: &RequesterMeta,
        coordinates: Option<Coordinates>,
    ) -> Result<ScanEvent> {
        let scanned_at = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO qr_scans (pet_id, ip_address, user_agent, latitude, longitude, scanned_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(pet_id)
        .bind(&meta.ip_address)
        .bind(&meta.user_agent)
        .bind(coordinates.map(|c| c.latitude))
        .bind(coordinates.map(|c| c.longitude))
        .bind(scanned_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(ScanEvent {
            id: result.last_insert_rowid(),
            pet_id,
            scanned_at,
            ip_address: meta.ip_address.clone(),
            user_agent: meta.user_agent.clone(),
            coordinates,
        })
    }

    pub async fn scan_stats(&self, pet_id: i64) -> Result<ScanStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total_scans,
                COUNT(DISTINCT DATE(scanned_at, 'unixepoch')) AS unique_days,
                MAX(scanned_at) AS last_scan
            FROM qr_scans
            WHERE pet_id = ?
            "#,
        )
        .bind(pet_id)
        .fetch_one(&self.pool)
        .await?;

        let last_scan: Option<i64> = row.get("last_scan");

        Ok(ScanStats {
            total_scans: row.get("total_scans"),
            unique_days: row.get("unique_days"),
            last_scan: last_scan.map(|ts| Utc.timestamp_opt(ts, 0).unwrap()),
        })
    }

    pub async fn recent_scans(&self, pet_id: i64) -> Result<Vec<ScanEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT id, pet_id, ip_address, user_agent, latitude, longitude, scanned_at
            FROM qr_scans
            WHERE pet_id = ?
            ORDER BY scanned_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(pet_id)
        .bind(RECENT_SCAN_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(scan_from_row).collect())
    }

    // ------------------------------------------------------------------
    // Reports
    // ------------------------------------------------------------------

    /// Append a location report together with its photo references.
    ///
    /// The report row and photo rows commit in a single transaction so a
    /// report is never visible without its photos.
    pub async fn insert_report(
        &self,
        pet_id: i64,
        finder: &FinderInfo,
        message: Option<&str>,
        coordinates: Option<Coordinates>,
        photo_refs: &[String],
    ) -> Result<LocationReport> {
        let created_at = Utc::now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO location_reports (
                pet_id, finder_name, finder_phone, finder_email,
                message, latitude, longitude, status, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, 'reported', ?)
            "#,
        )
        .bind(pet_id)
        .bind(&finder.name)
        .bind(&finder.phone)
        .bind(&finder.email)
        .bind(message)
        .bind(coordinates.map(|c| c.latitude))
        .bind(coordinates.map(|c| c.longitude))
        .bind(created_at.timestamp())
        .execute(&mut *tx)
        .await?;

        let report_id = result.last_insert_rowid();

        for photo_ref in photo_refs {
            sqlx::query(
                "INSERT INTO report_photos (report_id, photo_ref, created_at) VALUES (?, ?, ?)",
            )
            .bind(report_id)
            .bind(photo_ref)
            .bind(created_at.timestamp())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(LocationReport {
            id: report_id,
            pet_id,
            finder: finder.clone(),
            message: message.map(str::to_string),
            coordinates,
            photo_refs: photo_refs.to_vec(),
            status: ReportStatus::Reported,
            created_at,
        })
    }

    pub async fn get_report(&self, report_id: i64) -> Result<LocationReport> {
        let row = sqlx::query("SELECT * FROM location_reports WHERE id = ?")
            .bind(report_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(Error::NotFound)?;

        let photo_rows = sqlx::query(
            "SELECT photo_ref FROM report_photos WHERE report_id = ? ORDER BY id",
        )
        .bind(report_id)
        .fetch_all(&self.pool)
        .await?;

        let status: String = row.get("status");

        Ok(LocationReport {
            id: row.get("id"),
            pet_id: row.get("pet_id"),
            finder: FinderInfo {
                name: row.get("finder_name"),
                phone: row.get("finder_phone"),
                email: row.get("finder_email"),
            },
            message: row.get("message"),
            coordinates: Coordinates::from_parts(row.get("latitude"), row.get("longitude")),
            photo_refs: photo_rows.iter().map(|r| r.get("photo_ref")).collect(),
            status: ReportStatus::parse(&status).unwrap_or(ReportStatus::Reported),
            created_at: Utc.timestamp_opt(row.get("created_at"), 0).unwrap(),
        })
    }

    /// Status-conditioned transition. Returns `true` when the row moved,
    /// `false` when it was no longer in `from` (the caller re-reads and
    /// decides). Single statement, so concurrent transitions cannot
    /// interleave a stale status.
    pub async fn transition_report(
        &self,
        report_id: i64,
        from: ReportStatus,
        to: ReportStatus,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE location_reports SET status = ? WHERE id = ? AND status = ?")
            .bind(to.as_str())
            .bind(report_id)
            .bind(from.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // ------------------------------------------------------------------
    // Vaccinations
    // ------------------------------------------------------------------

    /// Append an entry to a pet's vaccination history.
    pub async fn insert_vaccination(
        &self,
        pet_id: i64,
        request: &AddVaccinationRequest,
    ) -> Result<VaccinationRecord> {
        let created_at = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO vaccination_records (
                pet_id, vaccine_name, vaccination_date, next_dose_date,
                dose_number, batch_number, veterinarian_name, clinic_name, notes, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(pet_id)
        .bind(&request.vaccine_name)
        .bind(request.vaccination_date.to_string())
        .bind(request.next_dose_date.map(|d| d.to_string()))
        .bind(request.dose_number)
        .bind(&request.batch_number)
        .bind(&request.veterinarian_name)
        .bind(&request.clinic_name)
        .bind(&request.notes)
        .bind(created_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(VaccinationRecord {
            id: result.last_insert_rowid(),
            pet_id,
            vaccine_name: request.vaccine_name.clone(),
            vaccination_date: request.vaccination_date,
            next_dose_date: request.next_dose_date,
            dose_number: request.dose_number,
            batch_number: request.batch_number.clone(),
            veterinarian_name: request.veterinarian_name.clone(),
            clinic_name: request.clinic_name.clone(),
            notes: request.notes.clone(),
            created_at,
        })
    }

    /// Full vaccination history for a pet, most recent application first.
    pub async fn vaccinations_for_pet(&self, pet_id: i64) -> Result<Vec<VaccinationRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, pet_id, vaccine_name, vaccination_date, next_dose_date,
                   dose_number, batch_number, veterinarian_name, clinic_name, notes, created_at
            FROM vaccination_records
            WHERE pet_id = ?
            ORDER BY vaccination_date DESC, id DESC
            "#,
        )
        .bind(pet_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let applied: String = row.get("vaccination_date");
                let next: Option<String> = row.get("next_dose_date");
                VaccinationRecord {
                    id: row.get("id"),
                    pet_id: row.get("pet_id"),
                    vaccine_name: row.get("vaccine_name"),
                    vaccination_date: parse_stored_date(&applied),
                    next_dose_date: next.as_deref().map(parse_stored_date),
                    dose_number: row.get("dose_number"),
                    batch_number: row.get("batch_number"),
                    veterinarian_name: row.get("veterinarian_name"),
                    clinic_name: row.get("clinic_name"),
                    notes: row.get("notes"),
                    created_at: Utc.timestamp_opt(row.get("created_at"), 0).unwrap(),
                }
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // Notification attempts
    // ------------------------------------------------------------------

    /// Append the audit trail for one sighting. Rows are never updated.
    pub async fn insert_attempts(
        &self,
        pet_id: i64,
        kind: SightingKind,
        sighting_id: i64,
        attempts: &[NotificationAttempt],
    ) -> Result<()> {
        let now = Utc::now().timestamp();

        for attempt in attempts {
            sqlx::query(
                r#"
                INSERT INTO notification_attempts (
                    pet_id, sighting_kind, sighting_id, channel, outcome, provider_ref, error, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(pet_id)
            .bind(kind.as_str())
            .bind(sighting_id)
            .bind(attempt.channel.as_str())
            .bind(attempt.outcome.as_str())
            .bind(&attempt.provider_ref)
            .bind(&attempt.error)
            .bind(now)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    pub async fn attempts_for_sighting(
        &self,
        kind: SightingKind,
        sighting_id: i64,
    ) -> Result<Vec<NotificationAttempt>> {
        let rows = sqlx::query(
            r#"
            SELECT channel, outcome, provider_ref, error
            FROM notification_attempts
            WHERE sighting_kind = ? AND sighting_id = ?
            ORDER BY id
            "#,
        )
        .bind(kind.as_str())
        .bind(sighting_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let channel: String = row.get("channel");
                let outcome: String = row.get("outcome");
                NotificationAttempt {
                    channel: Channel::parse(&channel).unwrap_or(Channel::Email),
                    outcome: AttemptOutcome::parse(&outcome).unwrap_or(AttemptOutcome::Failed),
                    provider_ref: row.get("provider_ref"),
                    error: row.get("error"),
                }
            })
            .collect())
    }
}

// Dates are written as ISO-8601 by this module; anything else in the column
// parses leniently like the other stored enums above.
fn parse_stored_date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap_or_default()
}

fn pet_from_row(row: &SqliteRow) -> Pet {
    Pet {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        pet_code: row.get("pet_code"),
        name: row.get("name"),
        species: row.get("species"),
        breed: row.get("breed"),
        sex: row.get("sex"),
        color: row.get("color"),
        allergies: row.get("allergies"),
        medical_conditions: row.get("medical_conditions"),
        medications: row.get("medications"),
        special_care: row.get("special_care"),
        blood_type: row.get("blood_type"),
        veterinarian_name: row.get("veterinarian_name"),
        veterinarian_phone: row.get("veterinarian_phone"),
        qr_code: row.get("qr_code"),
        is_lost: row.get::<i64, _>("is_lost") != 0,
        is_active: row.get::<i64, _>("is_active") != 0,
        created_at: Utc.timestamp_opt(row.get("created_at"), 0).unwrap(),
    }
}

fn scan_from_row(row: &SqliteRow) -> ScanEvent {
    ScanEvent {
        id: row.get("id"),
        pet_id: row.get("pet_id"),
        scanned_at: Utc.timestamp_opt(row.get("scanned_at"), 0).unwrap(),
        ip_address: row.get("ip_address"),
        user_agent: row.get("user_agent"),
        coordinates: Coordinates::from_parts(row.get("latitude"), row.get("longitude")),
    }
}
