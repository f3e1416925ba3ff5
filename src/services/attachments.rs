//! Uploaded files, stored as `<upload_dir>/<area>/<stored_name>` with a metadata row.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::attachment;
use crate::errors::ServiceError;

/// Directories uploads may live under
pub const AREAS: &[&str] = &["documents", "assets", "counterparties"];

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
const MAX_EXTENSION_LEN: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unknown upload area '{0}'")]
    UnknownArea(String),
    #[error("invalid file name '{0}'")]
    InvalidName(String),
    #[error("path escapes the upload directory")]
    Traversal,
    #[error("file is {size} bytes, the limit is {limit}")]
    TooLarge { size: usize, limit: usize },
    #[error("empty upload")]
    Empty,
    #[error("file not found")]
    Missing,
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::UnknownArea(_)
            | StorageError::InvalidName(_)
            | StorageError::Traversal
            | StorageError::Empty => ServiceError::ValidationError(err.to_string()),
            StorageError::TooLarge { .. } => ServiceError::PayloadTooLarge(err.to_string()),
            StorageError::Missing => ServiceError::NotFound(err.to_string()),
            StorageError::Io(e) => ServiceError::StorageError(e.to_string()),
        }
    }
}

pub fn check_area(area: &str) -> Result<(), StorageError> {
    if AREAS.contains(&area) {
        Ok(())
    } else {
        Err(StorageError::UnknownArea(area.to_string()))
    }
}

/// A stored name is one path component of `[A-Za-z0-9._-]`, not starting with a dot.
pub fn check_stored_name(name: &str) -> Result<(), StorageError> {
    let invalid = || StorageError::InvalidName(name.to_string());

    if name.is_empty() || name.starts_with('.') {
        return Err(invalid());
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(invalid());
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(invalid()),
    }
}

/// Lower-cased alphanumeric extension of the client's file name, if any.
pub fn sanitized_extension(original_name: &str) -> Option<String> {
    let (stem, ext) = original_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.len() > MAX_EXTENSION_LEN {
        return None;
    }
    if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn random_stored_name(original_name: &str) -> String {
    let stem = Uuid::new_v4().simple().to_string();
    match sanitized_extension(original_name) {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem,
    }
}

/// Keeps only the final component of a client-supplied name.
fn display_name(original_name: &str) -> String {
    let base = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if base.is_empty() {
        "upload".to_string()
    } else {
        base.to_string()
    }
}

/// Incoming upload
#[derive(Debug)]
pub struct NewUpload {
    pub area: String,
    pub owner_id: Option<Uuid>,
    pub original_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
    pub uploaded_by: Uuid,
}

#[derive(Clone)]
pub struct AttachmentService {
    db_pool: Arc<DbPool>,
    root: PathBuf,
    max_bytes: usize,
}

impl AttachmentService {
    pub fn new(db_pool: Arc<DbPool>, root: PathBuf, max_bytes: usize) -> Self {
        Self {
            db_pool,
            root,
            max_bytes,
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    fn area_dir(&self, area: &str) -> PathBuf {
        self.root.join(area)
    }

    #[instrument(skip(self, upload), fields(area = %upload.area, size = upload.data.len()))]
    pub async fn upload(&self, upload: NewUpload) -> Result<attachment::Model, ServiceError> {
        check_area(&upload.area)?;
        if upload.data.is_empty() {
            return Err(StorageError::Empty.into());
        }
        if upload.data.len() > self.max_bytes {
            return Err(StorageError::TooLarge {
                size: upload.data.len(),
                limit: self.max_bytes,
            }
            .into());
        }

        let dir = self.area_dir(&upload.area);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(StorageError::from)?;

        let original_name = display_name(&upload.original_name);
        let stored_name = random_stored_name(&original_name);
        let path = dir.join(&stored_name);
        tokio::fs::write(&path, &upload.data)
            .await
            .map_err(StorageError::from)?;

        let row = attachment::ActiveModel {
            id: Set(Uuid::new_v4()),
            area: Set(upload.area),
            owner_id: Set(upload.owner_id),
            original_name: Set(original_name),
            stored_name: Set(stored_name),
            content_type: Set(upload
                .content_type
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string())),
            size_bytes: Set(upload.data.len() as i64),
            uploaded_by: Set(upload.uploaded_by),
            created_at: Set(Utc::now()),
        }
        .insert(self.db_pool.as_ref())
        .await;

        match row {
            Ok(model) => {
                info!(attachment_id = %model.id, stored_name = %model.stored_name, "file stored");
                Ok(model)
            }
            Err(e) => {
                if let Err(io) = tokio::fs::remove_file(&path).await {
                    warn!(path = %path.display(), error = %io, "failed to remove orphaned upload");
                }
                Err(e.into())
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        area: Option<&str>,
        owner_id: Option<Uuid>,
    ) -> Result<Vec<attachment::Model>, ServiceError> {
        let mut select = attachment::Entity::find();
        if let Some(area) = area {
            check_area(area)?;
            select = select.filter(attachment::Column::Area.eq(area));
        }
        if let Some(owner_id) = owner_id {
            select = select.filter(attachment::Column::OwnerId.eq(owner_id));
        }
        Ok(select
            .order_by_desc(attachment::Column::CreatedAt)
            .all(self.db_pool.as_ref())
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<attachment::Model, ServiceError> {
        attachment::Entity::find_by_id(id)
            .one(self.db_pool.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Attachment {} not found", id)))
    }

    /// Maps a download request onto a file inside the upload directory.
    ///
    /// The name must be a plain stored name, the canonical path must stay under
    /// the canonical upload root, and a metadata row must exist for it.
    #[instrument(skip(self))]
    pub async fn resolve(
        &self,
        area: &str,
        name: &str,
    ) -> Result<(attachment::Model, PathBuf), ServiceError> {
        check_area(area)?;
        check_stored_name(name)?;

        let root = tokio::fs::canonicalize(&self.root)
            .await
            .map_err(|_| StorageError::Missing)?;
        let path = tokio::fs::canonicalize(self.area_dir(area).join(name))
            .await
            .map_err(|_| StorageError::Missing)?;
        if !path.starts_with(&root) {
            warn!(area, name, "blocked path outside upload directory");
            return Err(StorageError::Traversal.into());
        }

        let model = attachment::Entity::find()
            .filter(attachment::Column::Area.eq(area))
            .filter(attachment::Column::StoredName.eq(name))
            .one(self.db_pool.as_ref())
            .await?
            .ok_or(StorageError::Missing)?;

        Ok((model, path))
    }

    /// Removes the row, then the file. A file already gone is not an error.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<attachment::Model, ServiceError> {
        let model = self.get(id).await?;
        attachment::Entity::delete_by_id(id)
            .exec(self.db_pool.as_ref())
            .await?;

        let path = self.area_dir(&model.area).join(&model.stored_name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "attachment file already missing");
            }
            Err(e) => return Err(StorageError::from(e).into()),
        }

        info!(attachment_id = %id, "attachment deleted");
        Ok(model)
    }
}
