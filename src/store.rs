use crate::errors::AppError;
use crate::models::{
    CustomerRecord, EmailDraft, NotificationLogEntry, SimilarCompany,
};
use std::sync::RwLock;

/// Updatable columns of the customer table, addressed the way the external
/// sheet addresses them (by column, not by record identity).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordField {
    CompanyName,
    FullName,
    Title,
    Email,
    Phone,
    Address,
    Website,
    LastContact,
    StaffName,
    Industry,
    Trends,
    Challenges,
    Similar,
    DupAlert,
    Notes,
}

impl RecordField {
    /// Maps the camelCase field keys used by the API payloads.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "companyName" => Some(Self::CompanyName),
            "fullName" => Some(Self::FullName),
            "title" => Some(Self::Title),
            "email" => Some(Self::Email),
            "phone" => Some(Self::Phone),
            "address" => Some(Self::Address),
            "website" => Some(Self::Website),
            "lastContact" => Some(Self::LastContact),
            "staffName" => Some(Self::StaffName),
            "industry" => Some(Self::Industry),
            "trends" => Some(Self::Trends),
            "challenges" => Some(Self::Challenges),
            "similar" => Some(Self::Similar),
            "dupAlert" => Some(Self::DupAlert),
            "notes" => Some(Self::Notes),
            _ => None,
        }
    }
}

/// One record plus its current row position.
///
/// Row numbering matches the sheet: row 1 is the header, data starts at
/// row 2. Positions are not stable identifiers - an external deletion shifts
/// every row below it, so callers re-read before writing.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub row: usize,
    pub record: CustomerRecord,
}

/// A similar-company suggestion persisted with its base record.
#[derive(Debug, Clone)]
pub struct SimilarCompanyRow {
    pub base_company: String,
    pub company: SimilarCompany,
    pub generated_at: String,
}

/// The record-store collaborator.
///
/// Mirrors the external spreadsheet contract: read everything, append one
/// row, update one field by row position. The storage engine itself is
/// external to this service; `MemoryStore` is the in-process table used by
/// the server and tests.
pub trait RecordStore: Send + Sync {
    /// A consistent snapshot of all customer records.
    fn all(&self) -> Result<Vec<StoredRecord>, AppError>;
    /// Appends one record, returning its row position.
    fn append(&self, record: CustomerRecord) -> Result<usize, AppError>;
    /// Updates a single field of the record at `row`.
    fn update_field(&self, row: usize, field: RecordField, value: &str) -> Result<(), AppError>;
    /// Appends one dormant-revival email draft.
    fn append_draft(&self, draft: EmailDraft) -> Result<(), AppError>;
    /// Appends similar-company detail rows for a base record.
    fn append_similar(
        &self,
        base_company: &str,
        generated_at: &str,
        entries: &[SimilarCompany],
    ) -> Result<(), AppError>;
    /// Records an alert in the notification log.
    fn log_notification(&self, entry: NotificationLogEntry) -> Result<(), AppError>;
}

/// In-memory implementation of the record store.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Vec<CustomerRecord>>,
    drafts: RwLock<Vec<EmailDraft>>,
    similar: RwLock<Vec<SimilarCompanyRow>>,
    notifications: RwLock<Vec<NotificationLogEntry>>,
}

/// First data row; row 1 holds the header in the external sheet.
const FIRST_DATA_ROW: usize = 2;

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populates the table, mostly for tests.
    pub fn with_records(records: Vec<CustomerRecord>) -> Self {
        Self {
            records: RwLock::new(records),
            ..Self::default()
        }
    }

    pub fn drafts(&self) -> Vec<EmailDraft> {
        self.drafts
            .read()
            .map(|d| d.clone())
            .unwrap_or_default()
    }

    pub fn similar_rows(&self) -> Vec<SimilarCompanyRow> {
        self.similar
            .read()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn notifications(&self) -> Vec<NotificationLogEntry> {
        self.notifications
            .read()
            .map(|n| n.clone())
            .unwrap_or_default()
    }
}

fn poisoned() -> AppError {
    AppError::Internal("record store lock poisoned".to_string())
}

impl RecordStore for MemoryStore {
    fn all(&self) -> Result<Vec<StoredRecord>, AppError> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records
            .iter()
            .enumerate()
            .map(|(i, record)| StoredRecord {
                row: i + FIRST_DATA_ROW,
                record: record.clone(),
            })
            .collect())
    }

    fn append(&self, record: CustomerRecord) -> Result<usize, AppError> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        records.push(record);
        Ok(records.len() - 1 + FIRST_DATA_ROW)
    }

    fn update_field(&self, row: usize, field: RecordField, value: &str) -> Result<(), AppError> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        let index = row
            .checked_sub(FIRST_DATA_ROW)
            .filter(|i| *i < records.len())
            .ok_or_else(|| AppError::NotFound(format!("No record at row {}", row)))?;

        let record = &mut records[index];
        let slot = match field {
            RecordField::CompanyName => &mut record.company_name,
            RecordField::FullName => &mut record.full_name,
            RecordField::Title => &mut record.title,
            RecordField::Email => &mut record.email,
            RecordField::Phone => &mut record.phone,
            RecordField::Address => &mut record.address,
            RecordField::Website => &mut record.website,
            RecordField::LastContact => &mut record.last_contact,
            RecordField::StaffName => &mut record.staff_name,
            RecordField::Industry => &mut record.industry,
            RecordField::Trends => &mut record.trends,
            RecordField::Challenges => &mut record.challenges,
            RecordField::Similar => &mut record.similar,
            RecordField::DupAlert => &mut record.dup_alert,
            RecordField::Notes => &mut record.notes,
        };
        *slot = value.to_string();
        Ok(())
    }

    fn append_draft(&self, draft: EmailDraft) -> Result<(), AppError> {
        self.drafts.write().map_err(|_| poisoned())?.push(draft);
        Ok(())
    }

    fn append_similar(
        &self,
        base_company: &str,
        generated_at: &str,
        entries: &[SimilarCompany],
    ) -> Result<(), AppError> {
        let mut similar = self.similar.write().map_err(|_| poisoned())?;
        for entry in entries {
            similar.push(SimilarCompanyRow {
                base_company: base_company.to_string(),
                company: entry.clone(),
                generated_at: generated_at.to_string(),
            });
        }
        Ok(())
    }

    fn log_notification(&self, entry: NotificationLogEntry) -> Result<(), AppError> {
        self.notifications
            .write()
            .map_err(|_| poisoned())?
            .push(entry);
        Ok(())
    }
}
