use super::model::{Album, Image, ImageUpload};
use crate::config::UploadConfig;
use crate::error::{Result, SdkError};
use crate::gateway::{decode_rows, echoed, DataGateway};
use crate::identity::IdentityProvider;
use crate::notify::{self, Notifier};
use lumen_gateway::{Filter, Order, RowQuery, StoredObject};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

pub(crate) const IMAGES_TABLE: &str = "images";
pub(crate) const ALBUMS_TABLE: &str = "albums";
const INSERT_IMAGE_RECORD: &str = "insert_image_record";

/// Uploads images to object storage and records them in `images`.
pub struct ImageUploadService {
    gateway: Arc<dyn DataGateway>,
    identity: Arc<dyn IdentityProvider>,
    notifier: Arc<dyn Notifier>,
    config: UploadConfig,
}

impl ImageUploadService {
    pub fn new(
        gateway: Arc<dyn DataGateway>,
        identity: Arc<dyn IdentityProvider>,
        notifier: Arc<dyn Notifier>,
        config: UploadConfig,
    ) -> Self {
        Self {
            gateway,
            identity,
            notifier,
            config,
        }
    }

    /// Reject empty, oversized or unsupported files before anything is sent
    pub fn validate(&self, upload: &ImageUpload) -> Result<()> {
        if upload.data.is_empty() {
            return Err(SdkError::validation("file", "file is empty"));
        }
        if upload.data.len() as u64 > self.config.max_bytes {
            return Err(SdkError::validation(
                "file",
                format!(
                    "file is {} bytes; the limit is {} bytes",
                    upload.data.len(),
                    self.config.max_bytes
                ),
            ));
        }
        let mime = upload.mime_type.to_ascii_lowercase();
        if !self.config.allowed_mime.iter().any(|m| m.eq_ignore_ascii_case(&mime)) {
            return Err(SdkError::validation(
                "file",
                format!("{} files are not supported", upload.mime_type),
            ));
        }
        Ok(())
    }

    /// Upload bytes, then record metadata.
    ///
    /// The row goes into `images` directly; if that is refused the
    /// `insert_image_record` procedure is tried. When both fail the uploaded
    /// object is removed again.
    pub async fn upload(&self, upload: ImageUpload) -> Result<Image> {
        self.validate(&upload)?;

        let owner = match self.identity.current().await {
            Ok(identity) => identity.user_id,
            Err(e) => return self.reported("upload image", Err(e)),
        };

        let path = format!("{}/{}.{}", owner, Uuid::new_v4(), upload.extension());
        let size = upload.data.len() as u64;
        let stored = match self
            .gateway
            .upload_object(&self.config.bucket, &path, upload.data, &upload.mime_type)
            .await
        {
            Ok(stored) => stored,
            Err(e) => {
                let err = SdkError::Storage(e.to_string());
                return self.reported("upload image", Err(err));
            }
        };
        tracing::debug!(path = %stored.path, size, "image object uploaded");

        let row = json!({
            "user_id": owner,
            "url": stored.public_url,
            "path": stored.path,
            "size": size,
            "mime_type": upload.mime_type,
            "file_name": upload.file_name,
            "album_id": upload.album_id,
        });

        match self.record(&row).await {
            Ok(image) => {
                tracing::info!(image_id = %image.id, path = %image.path, "image uploaded");
                Ok(image)
            }
            Err(e) => {
                self.discard_object(&stored).await;
                self.reported("upload image", Err(e))
            }
        }
    }

    async fn record(&self, row: &Value) -> Result<Image> {
        let direct = self.gateway.insert(IMAGES_TABLE, row.clone()).await;
        let err = match direct.and_then(decode_rows::<Image>) {
            Ok(mut images) if !images.is_empty() => return Ok(images.remove(0)),
            Ok(_) => SdkError::Storage("image row insert returned nothing".to_string()),
            Err(e) => e,
        };
        tracing::warn!(error = %err, "image row insert failed, trying {}", INSERT_IMAGE_RECORD);

        let args = json!({
            "p_user_id": row["user_id"],
            "p_url": row["url"],
            "p_path": row["path"],
            "p_size": row["size"],
            "p_mime_type": row["mime_type"],
            "p_file_name": row["file_name"],
            "p_album_id": row["album_id"],
        });
        let result = self.gateway.rpc(INSERT_IMAGE_RECORD, args).await?;

        let record = match &result {
            Value::Object(map) => map.get("data").unwrap_or(&result),
            Value::Array(rows) => rows.first().unwrap_or(&result),
            other => other,
        };
        if let Ok(image) = serde_json::from_value::<Image>(record.clone()) {
            return Ok(image);
        }

        // Procedure answered with an id only
        let id = echoed(&result, "id")
            .and_then(Value::as_str)
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .ok_or_else(|| SdkError::Rpc {
                name: INSERT_IMAGE_RECORD.to_string(),
                code: None,
                message: "no image id returned".to_string(),
            })?;
        let mut image: Image = serde_json::from_value(json!({
            "id": id,
            "url": row["url"],
            "path": row["path"],
        }))?;
        image.size = row["size"].as_u64().unwrap_or_default();
        image.mime_type = row["mime_type"].as_str().unwrap_or_default().to_string();
        image.file_name = row["file_name"].as_str().map(str::to_string);
        image.user_id = row["user_id"].as_str().and_then(|raw| Uuid::parse_str(raw).ok());
        image.album_id = row["album_id"].as_str().and_then(|raw| Uuid::parse_str(raw).ok());
        Ok(image)
    }

    async fn discard_object(&self, stored: &StoredObject) {
        if let Err(e) = self
            .gateway
            .remove_objects(&stored.bucket, &[stored.path.clone()])
            .await
        {
            tracing::error!(path = %stored.path, error = %e, "orphaned image object not removed");
        }
    }

    /// Delete the metadata row, then the object
    pub async fn delete(&self, image: &Image) -> Result<()> {
        if let Err(e) = self
            .gateway
            .delete(IMAGES_TABLE, &[Filter::eq("id", image.id)])
            .await
        {
            return self.reported("delete image", Err(e));
        }
        if let Err(e) = self
            .gateway
            .remove_objects(&self.config.bucket, &[image.path.clone()])
            .await
        {
            tracing::warn!(image_id = %image.id, error = %e, "image object not removed");
        }
        Ok(())
    }

    /// The owner's images, newest first
    pub async fn list_images(&self) -> Result<Vec<Image>> {
        let result = async {
            let owner = self.identity.current().await?.user_id;
            self.select_images(RowQuery::new().eq("user_id", owner)).await
        };
        self.reported("load images", result.await)
    }

    pub async fn list_album(&self, album_id: Uuid) -> Result<Vec<Image>> {
        let result = self.select_images(RowQuery::new().eq("album_id", album_id)).await;
        self.reported("load album", result)
    }

    async fn select_images(&self, query: RowQuery) -> Result<Vec<Image>> {
        let rows = self
            .gateway
            .select(IMAGES_TABLE, &query.order_by("created_at", Order::Desc))
            .await?;
        decode_rows(rows)
    }

    pub async fn create_album(&self, name: &str) -> Result<Album> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SdkError::validation("name", "album name is required"));
        }
        let result = async {
            let owner = self.identity.current().await?.user_id;
            let rows = self
                .gateway
                .insert(ALBUMS_TABLE, json!({"name": name, "user_id": owner}))
                .await?;
            decode_rows::<Album>(rows)?
                .pop()
                .ok_or_else(|| SdkError::Storage("album insert returned nothing".to_string()))
        };
        self.reported("create album", result.await)
    }

    pub async fn list_albums(&self) -> Result<Vec<Album>> {
        let result = async {
            let owner = self.identity.current().await?.user_id;
            let rows = self
                .gateway
                .select(
                    ALBUMS_TABLE,
                    &RowQuery::new().eq("user_id", owner).order_by("name", Order::Asc),
                )
                .await?;
            decode_rows::<Album>(rows)
        };
        self.reported("load albums", result.await)
    }

    fn reported<T>(&self, context: &str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            notify::report(self.notifier.as_ref(), context, e);
        }
        result
    }
}
