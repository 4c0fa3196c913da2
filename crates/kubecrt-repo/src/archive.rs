//! Chart archive (`.tgz`) verification and extraction

use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tar::Archive;

use crate::error::{RepoError, Result};

/// Compute the SHA256 digest of `data`, `sha256:<hex>` formatted
pub fn compute_digest(data: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(data)))
}

/// Compare digests regardless of case and `sha256:` prefix
pub fn digest_matches(expected: &str, actual: &str) -> bool {
    fn normalize(digest: &str) -> String {
        let digest = digest.trim().to_lowercase();
        digest
            .strip_prefix("sha256:")
            .or_else(|| digest.strip_prefix("sha256-"))
            .unwrap_or(&digest)
            .to_string()
    }

    normalize(expected) == normalize(actual)
}

/// Fail unless `data` has the expected digest
pub fn verify_digest(name: &str, data: &[u8], expected: &str) -> Result<()> {
    let actual = compute_digest(data);
    if digest_matches(expected, &actual) {
        Ok(())
    } else {
        Err(RepoError::IntegrityCheckFailed {
            name: name.to_string(),
            expected: expected.to_string(),
            actual,
        })
    }
}

/// Unpack a gzipped chart archive into `dest` and return the chart root
///
/// Chart archives hold a single top-level directory named after the chart;
/// when they don't, `dest` itself is the chart root.
pub fn extract_chart(data: &[u8], dest: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dest)?;

    let mut archive = Archive::new(GzDecoder::new(data));
    archive.unpack(dest).map_err(|e| RepoError::InvalidArchive {
        message: e.to_string(),
    })?;

    chart_root(dest)
}

/// Locate the chart inside an unpacked archive
pub fn chart_root(dir: &Path) -> Result<PathBuf> {
    if dir.join("Chart.yaml").is_file() {
        return Ok(dir.to_path_buf());
    }

    let mut dirs = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.join("Chart.yaml").is_file());

    match (dirs.next(), dirs.next()) {
        (Some(root), None) => Ok(root),
        _ => Err(RepoError::InvalidArchive {
            message: format!(
                "expected exactly one chart directory with a Chart.yaml in {}",
                dir.display()
            ),
        }),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use tempfile::TempDir;

    /// Build a `.tgz` holding `files` (path, content)
    pub(crate) fn make_archive(files: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
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
    fn test_compute_digest() {
        let digest = compute_digest(b"hello world");
        assert_eq!(
            digest,
            "sha256:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_digest_matches() {
        assert!(digest_matches("sha256:abc123", "sha256:ABC123"));
        assert!(digest_matches("sha256:abc123", "abc123"));
        assert!(digest_matches("sha256-abc123", "sha256:abc123"));
        assert!(!digest_matches("sha256:abc123", "sha256:xyz789"));
    }

    #[test]
    fn test_verify_digest() {
        let data = b"chart bytes";
        assert!(verify_digest("web", data, &compute_digest(data)).is_ok());
        assert!(matches!(
            verify_digest("web", data, "sha256:00").unwrap_err(),
            RepoError::IntegrityCheckFailed { .. }
        ));
    }

    #[test]
    fn test_extract_chart_with_top_level_dir() {
        let data = make_archive(&[
            ("web/Chart.yaml", "name: web\nversion: 1.0.0\n"),
            ("web/templates/svc.yaml", "kind: Service\n"),
        ]);
        let tmp = TempDir::new().unwrap();

        let root = extract_chart(&data, tmp.path()).unwrap();
        assert_eq!(root, tmp.path().join("web"));
        assert!(root.join("templates/svc.yaml").is_file());
    }

    #[test]
    fn test_extract_flat_chart() {
        let data = make_archive(&[("Chart.yaml", "name: web\nversion: 1.0.0\n")]);
        let tmp = TempDir::new().unwrap();

        assert_eq!(extract_chart(&data, tmp.path()).unwrap(), tmp.path());
    }

    #[test]
    fn test_extract_garbage() {
        let tmp = TempDir::new().unwrap();
        let err = extract_chart(b"not a tarball", tmp.path()).unwrap_err();
        assert!(matches!(err, RepoError::InvalidArchive { .. }));
    }
}
