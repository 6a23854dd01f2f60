//! `POST /api/imports/upload`
//!
//! Streams the `file` field of a multipart body into storage while hashing
//! it. The bytes land in a temporary object first and are renamed to
//! `<owner>/<md5>.<ext>` once complete, so a source location always names
//! one immutable content.

use crate::error::ImportError;
use crate::pipeline::Pipeline;
use crate::services::owner::OwnerId;
use actix_multipart::Multipart;
use crate::storage::SourceStorage;
use actix_web::web::Bytes;
use actix_web::{web, HttpResponse};
use futures_util::{Stream, StreamExt};
use log::{info, warn};
use md5::Context;
use registry_common::model::import::SourceFormat;
use registry_common::requests::UploadResponse;
use std::io::Write;
use std::path::Path;

fn multipart_error(e: impl std::fmt::Display) -> ImportError {
    ImportError::InvalidRequest(format!("malformed multipart body: {}", e))
}

/// Lowercased extension of an uploaded file name, if it is a supported
/// registry format.
fn upload_extension(filename: &str) -> Result<String, ImportError> {
    SourceFormat::from_path(filename)
        .and_then(|_| Path::new(filename).extension())
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .ok_or_else(|| ImportError::UnsupportedFormat(filename.to_string()))
}

/// Copy the uploaded chunks into `writer`, hashing them on the way.
///
/// # Returns
/// The hex MD5 of the content and its length in bytes.
async fn copy_chunks<S, E, W>(chunks: S, writer: &mut W) -> Result<(String, u64), ImportError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::fmt::Display,
    W: Write + ?Sized,
{
    futures_util::pin_mut!(chunks);
    let mut hasher = Context::new();
    let mut bytes: u64 = 0;
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(multipart_error)?;
        hasher.consume(&chunk);
        bytes += chunk.len() as u64;
        writer.write_all(&chunk)?;
    }
    writer.flush()?;
    Ok((format!("{:x}", hasher.finalize()), bytes))
}

/// Store one uploaded file under the owner's prefix.
///
/// The content goes to a temporary object first. Any failure removes that
/// object again; a complete upload is renamed to `<owner>/<md5>.<ext>`.
///
/// # Arguments
/// * `storage` - Blob storage the file is written to.
/// * `owner` - Owner whose prefix receives the file.
/// * `filename` - Client-side file name, used for logging.
/// * `extension` - Validated lowercase extension of the stored object.
/// * `chunks` - Body of the multipart `file` field.
async fn store_upload<S, E>(
    storage: &dyn SourceStorage,
    owner: &str,
    filename: &str,
    extension: &str,
    chunks: S,
) -> Result<UploadResponse, ImportError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::fmt::Display,
{
    let temp_location = format!("{}/upload-{}.part", owner, uuid::Uuid::new_v4());
    let mut writer = storage.create(&temp_location)?;
    let copied = copy_chunks(chunks, &mut writer).await;
    drop(writer);

    let (md5, bytes) = match copied {
        Ok((_, 0)) => {
            discard(storage, &temp_location);
            return Err(ImportError::InvalidRequest("uploaded file is empty".to_string()));
        }
        Ok(copied) => copied,
        Err(e) => {
            discard(storage, &temp_location);
            return Err(e);
        }
    };

    let location = format!("{}/{}.{}", owner, md5, extension);
    if let Err(e) = storage.rename(&temp_location, &location) {
        discard(storage, &temp_location);
        return Err(e);
    }
    info!("Stored upload {} ({} bytes) as {}", filename, bytes, location);
    Ok(UploadResponse { location, md5, bytes })
}

fn discard(storage: &dyn SourceStorage, location: &str) {
    if let Err(e) = storage.remove(location) {
        warn!("Could not remove partial upload {}: {}", location, e);
    }
}

/// Handles `POST /api/imports/upload`.
///
/// # Arguments
/// * `owner` - Caller identity from the `X-Owner-Id` header.
/// * `payload` - Multipart body; only the `file` field is read.
/// * `pipeline` - Shared pipeline giving access to source storage.
///
/// # Returns
/// `UploadResponse` with the storage location, MD5 and size of the file.
pub(crate) async fn process(
    owner: OwnerId,
    mut payload: Multipart,
    pipeline: web::Data<Pipeline>,
) -> Result<HttpResponse, ImportError> {
    while let Some(item) = payload.next().await {
        let field = item.map_err(multipart_error)?;
        let name = field
            .content_disposition()
            .and_then(|cd| cd.get_name().map(|n| n.to_string()));
        if name.as_deref() != Some("file") {
            continue;
        }

        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename().map(|f| f.to_string()))
            .unwrap_or_default();
        let extension = upload_extension(&filename)?;

        let stored = store_upload(
            pipeline.storage(),
            owner.as_str(),
            &filename,
            &extension,
            field,
        )
        .await?;
        return Ok(HttpResponse::Ok().json(stored));
    }
    Err(ImportError::InvalidRequest(
        "multipart body has no `file` field".to_string(),
    ))
}
