use crate::{
    error::{MagicError, Result},
    preprocess::decode_data_url,
};
use std::path::{Path, PathBuf};

pub fn result_file_name() -> String {
    format!("christmas-magic-{}.png", chrono::Utc::now().timestamp_millis())
}

/// Write a task result to `dir`. Inline data URLs are decoded locally,
/// anything else is fetched.
pub async fn save_result(result: &str, dir: impl AsRef<Path>) -> Result<PathBuf> {
    let bytes = if result.starts_with("data:") {
        decode_data_url(result)
            .ok_or_else(|| MagicError::SerializationError("malformed data url".into()))?
    } else {
        download(result).await?
    };

    let dir = dir.as_ref();
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| MagicError::IoError(e.to_string()))?;

    let mut path = dir.join(result_file_name());
    let mut n = 1;
    // Results saved within the same millisecond would share a name.
    while tokio::fs::try_exists(&path).await.unwrap_or(false) {
        path = dir.join(format!(
            "christmas-magic-{}-{}.png",
            chrono::Utc::now().timestamp_millis(),
            n
        ));
        n += 1;
    }
    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| MagicError::IoError(e.to_string()))?;

    log::info!("Saved result to {}", path.display());
    Ok(path)
}

async fn download(url: &str) -> Result<Vec<u8>> {
    let response = reqwest::get(url)
        .await
        .map_err(|e| MagicError::RequestError(format!("download failed: {}", e)))?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(MagicError::RemoteHttp { status, body });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| MagicError::RequestError(format!("download failed: {}", e)))?;
    Ok(bytes.to_vec())
}
