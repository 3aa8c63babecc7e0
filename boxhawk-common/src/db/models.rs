//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::symbols::{GeneralSymbols, RecyclingSymbols};
use crate::{time, Error, Result};

/// Review workflow status of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Uploaded,
    InReview,
    Complete,
    Rejected,
}

impl SubmissionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionStatus::Uploaded => "uploaded",
            SubmissionStatus::InReview => "in_review",
            SubmissionStatus::Complete => "complete",
            SubmissionStatus::Rejected => "rejected",
        }
    }

    /// Complete and rejected rows leave the review queue
    pub fn is_terminal(self) -> bool {
        matches!(self, SubmissionStatus::Complete | SubmissionStatus::Rejected)
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmissionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "uploaded" => Ok(SubmissionStatus::Uploaded),
            "in_review" => Ok(SubmissionStatus::InReview),
            "complete" => Ok(SubmissionStatus::Complete),
            "rejected" => Ok(SubmissionStatus::Rejected),
            other => Err(Error::Validation(format!("Unknown submission status: {}", other))),
        }
    }
}

/// Image row status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageStatus {
    Active,
    Deleted,
}

impl ImageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageStatus::Active => "active",
            ImageStatus::Deleted => "deleted",
        }
    }
}

impl FromStr for ImageStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(ImageStatus::Active),
            "deleted" => Ok(ImageStatus::Deleted),
            other => Err(Error::Validation(format!("Unknown image status: {}", other))),
        }
    }
}

/// Audit log action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Upload,
    DeleteSoft,
    DeleteHard,
    Reassign,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Upload => "upload",
            AuditAction::DeleteSoft => "delete_soft",
            AuditAction::DeleteHard => "delete_hard",
            AuditAction::Reassign => "reassign",
        }
    }
}

impl FromStr for AuditAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "upload" => Ok(AuditAction::Upload),
            "delete_soft" => Ok(AuditAction::DeleteSoft),
            "delete_hard" => Ok(AuditAction::DeleteHard),
            "reassign" => Ok(AuditAction::Reassign),
            other => Err(Error::Validation(format!("Unknown audit action: {}", other))),
        }
    }
}

/// Descriptive payload of a submission
///
/// Opaque to the engine apart from the presence of `name` and `manufacturer`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionFields {
    pub name: String,
    pub manufacturer: String,
    pub barcode: Option<String>,
    pub size: Option<String>,
    pub date_of_manufacture: Option<String>,
    pub expiration: Option<String>,
    pub lot: Option<String>,
    #[serde(rename = "ref")]
    pub ref_number: Option<String>,
    pub quantity: Option<String>,
    pub labels: GeneralSymbols,
    pub recycling_symbol: RecyclingSymbols,
    pub manufacture_address: Option<String>,
    pub manufacture_site: Option<String>,
    pub sponsor: Option<String>,
    pub notes: Option<String>,
}

impl SubmissionFields {
    /// Fields with just the required pair set
    pub fn named(name: impl Into<String>, manufacturer: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            manufacturer: manufacturer.into(),
            ..Default::default()
        }
    }

    /// `name` and `manufacturer` must be non-empty after trimming
    pub fn validate_required(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.name.trim().is_empty() {
            missing.push("name");
        }
        if self.manufacturer.trim().is_empty() {
            missing.push("manufacturer");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(format!("{} required", missing.join(" and "))))
        }
    }

    /// Lowercased text the listing search matches against
    pub fn search_key(&self) -> String {
        search_key(&self.name, &self.manufacturer)
    }

    /// Trim the required pair and turn blank optional text into None
    pub fn normalized(mut self) -> Self {
        fn blank_to_none(value: Option<String>) -> Option<String> {
            value.and_then(|v| {
                let trimmed = v.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
        }

        self.name = self.name.trim().to_string();
        self.manufacturer = self.manufacturer.trim().to_string();
        self.barcode = blank_to_none(self.barcode);
        self.size = blank_to_none(self.size);
        self.date_of_manufacture = blank_to_none(self.date_of_manufacture);
        self.expiration = blank_to_none(self.expiration);
        self.lot = blank_to_none(self.lot);
        self.ref_number = blank_to_none(self.ref_number);
        self.quantity = blank_to_none(self.quantity);
        self.manufacture_address = blank_to_none(self.manufacture_address);
        self.manufacture_site = blank_to_none(self.manufacture_site);
        self.sponsor = blank_to_none(self.sponsor);
        self.notes = blank_to_none(self.notes);
        self
    }
}

/// Case-folded `name` and `manufacturer` for substring search
///
/// Folding happens here rather than in SQL because SQLite's `LOWER` and
/// `LIKE` only fold ASCII. The unit separator keeps a term from matching
/// across the two fields.
pub fn search_key(name: &str, manufacturer: &str) -> String {
    format!("{}\u{1f}{}", name.to_lowercase(), manufacturer.to_lowercase())
}

/// A logical item undergoing photo-based review
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Submission {
    pub id: Uuid,
    #[serde(flatten)]
    pub fields: SubmissionFields,
    pub status: SubmissionStatus,
    pub reviewed: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Column list matching [`Submission::from_row`]
pub const SUBMISSION_COLUMNS: &str = "id, name, manufacturer, barcode, size, date_of_manufacture, \
     expiration, lot, ref_number, quantity, labels, recycling_symbol, manufacture_address, \
     manufacture_site, sponsor, notes, status, reviewed, created_by, created_at, updated_at";

impl Submission {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let labels: Option<String> = row.try_get("labels")?;
        let recycling: Option<String> = row.try_get("recycling_symbol")?;
        let status: String = row.try_get("status")?;

        Ok(Submission {
            id: uuid_column(row, "id")?,
            fields: SubmissionFields {
                name: row.try_get("name")?,
                manufacturer: row.try_get("manufacturer")?,
                barcode: row.try_get("barcode")?,
                size: row.try_get("size")?,
                date_of_manufacture: row.try_get("date_of_manufacture")?,
                expiration: row.try_get("expiration")?,
                lot: row.try_get("lot")?,
                ref_number: row.try_get("ref_number")?,
                quantity: row.try_get("quantity")?,
                labels: GeneralSymbols::from_column(labels.as_deref()),
                recycling_symbol: RecyclingSymbols::from_column(recycling.as_deref()),
                manufacture_address: row.try_get("manufacture_address")?,
                manufacture_site: row.try_get("manufacture_site")?,
                sponsor: row.try_get("sponsor")?,
                notes: row.try_get("notes")?,
            },
            status: status.parse()?,
            reviewed: row.try_get::<i64, _>("reviewed")? != 0,
            created_by: row.try_get("created_by")?,
            created_at: time_column(row, "created_at")?,
            updated_at: time_column(row, "updated_at")?,
        })
    }
}

/// One photo row owned by a submission
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Image {
    pub id: Uuid,
    pub submission_id: Uuid,
    pub storage_path: String,
    pub status: ImageStatus,
    pub size_bytes: Option<i64>,
    pub mime_type: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Column list matching [`Image::from_row`]
pub const IMAGE_COLUMNS: &str =
    "id, submission_id, storage_path, status, size_bytes, mime_type, width, height, created_at";

impl Image {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let status: String = row.try_get("status")?;
        Ok(Image {
            id: uuid_column(row, "id")?,
            submission_id: uuid_column(row, "submission_id")?,
            storage_path: row.try_get("storage_path")?,
            status: status.parse()?,
            size_bytes: row.try_get("size_bytes")?,
            mime_type: row.try_get("mime_type")?,
            width: row.try_get("width")?,
            height: row.try_get("height")?,
            created_at: time_column(row, "created_at")?,
        })
    }
}

/// Append-only provenance record for one image state change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub id: i64,
    pub image_id: Uuid,
    pub action: AuditAction,
    pub from_submission_id: Option<Uuid>,
    pub to_submission_id: Option<Uuid>,
    pub actor: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let action: String = row.try_get("action")?;
        Ok(AuditEntry {
            id: row.try_get("id")?,
            image_id: uuid_column(row, "image_id")?,
            action: action.parse()?,
            from_submission_id: optional_uuid_column(row, "from_submission_id")?,
            to_submission_id: optional_uuid_column(row, "to_submission_id")?,
            actor: row.try_get("actor")?,
            created_at: time_column(row, "created_at")?,
        })
    }
}

fn uuid_column(row: &SqliteRow, column: &str) -> Result<Uuid> {
    let value: String = row.try_get(column)?;
    Uuid::parse_str(&value)
        .map_err(|e| Error::Internal(format!("Invalid UUID in {}: {} ({})", column, value, e)))
}

fn optional_uuid_column(row: &SqliteRow, column: &str) -> Result<Option<Uuid>> {
    let value: Option<String> = row.try_get(column)?;
    value
        .map(|v| {
            Uuid::parse_str(&v)
                .map_err(|e| Error::Internal(format!("Invalid UUID in {}: {} ({})", column, v, e)))
        })
        .transpose()
}

fn time_column(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>> {
    let value: String = row.try_get(column)?;
    time::from_db(&value)
}
