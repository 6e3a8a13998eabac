//! Beta builder UI: asset roots and lazy download of the beta bundle.

use std::io;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;

use common::errors::{AppError, AppResult};

/// Directory of the stable builder under the top level path.
pub const BUILDER_DIR: &str = "builder";
/// Directory the beta builder bundle is unpacked into.
pub const NEW_DESIGN_UI_DIR: &str = "new_design_ui";

/// Asset root for the builder UI variant.
pub fn builder_root(top_level_path: &Path, beta_ui: bool) -> PathBuf {
    top_level_path.join(if beta_ui { NEW_DESIGN_UI_DIR } else { BUILDER_DIR })
}

/// Downloads and unpacks the beta bundle into `target` unless it already holds files.
///
/// Returns whether a download happened.
pub async fn ensure_beta_ui(
    client: &reqwest::Client,
    archive_url: &str,
    target: &Path,
) -> AppResult<bool> {
    if has_entries(target).await? {
        tracing::debug!(target = %target.display(), "beta UI already present");
        return Ok(false);
    }
    tokio::fs::create_dir_all(target)
        .await
        .map_err(|e| AppError::Internal(format!("create {}: {}", target.display(), e)))?;

    tracing::info!(url = %archive_url, target = %target.display(), "downloading beta UI");
    let response = client
        .get(archive_url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| AppError::ExternalService(format!("beta UI download failed: {}", e)))?;
    let bytes = response
        .bytes()
        .await
        .map_err(|e| AppError::ExternalService(format!("beta UI download failed: {}", e)))?;

    let target = target.to_path_buf();
    tokio::task::spawn_blocking(move || unpack_tarball(&bytes, &target))
        .await
        .map_err(|e| AppError::Internal(format!("unpack task failed: {}", e)))?
        .map_err(|e| AppError::Internal(format!("beta UI archive could not be unpacked: {}", e)))?;
    Ok(true)
}

/// Unpacks a gzip-compressed tar archive into `target`.
pub fn unpack_tarball(bytes: &[u8], target: &Path) -> io::Result<()> {
    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    archive.unpack(target)
}

async fn has_entries(dir: &Path) -> AppResult<bool> {
    match tokio::fs::read_dir(dir).await {
        Ok(mut entries) => entries
            .next_entry()
            .await
            .map(|entry| entry.is_some())
            .map_err(|e| AppError::Internal(e.to_string())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(AppError::Internal(format!("read {}: {}", dir.display(), e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    fn tarball(files: &[(&str, &str)]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (path, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, content.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn test_builder_root() {
        let top = Path::new("/srv/builder-top");
        assert_eq!(builder_root(top, false), top.join("builder"));
        assert_eq!(builder_root(top, true), top.join("new_design_ui"));
    }

    #[test]
    fn test_unpack_tarball() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = tarball(&[("index.html", "<html/>"), ("assets/app.js", "boot()")]);

        unpack_tarball(&bytes, dir.path()).unwrap();

        assert_eq!(std::fs::read_to_string(dir.path().join("index.html")).unwrap(), "<html/>");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("assets/app.js")).unwrap(),
            "boot()"
        );
    }

    #[tokio::test]
    async fn test_existing_bundle_is_not_downloaded_again() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "cached").unwrap();

        // an unreachable url proves no request is made
        let downloaded = ensure_beta_ui(&reqwest::Client::new(), "http://127.0.0.1:9/none.tar.gz", dir.path())
            .await
            .unwrap();
        assert!(!downloaded);
    }
}
