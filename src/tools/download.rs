// src/tools/download.rs

//! Downloads with retries, SHA-384 verification and zip extraction

use crate::error::{Error, Result};
use crate::tree::path::sanitize_path;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;
use sha2::{Digest, Sha384};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Timeout for establishing a connection
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum attempts per download
const MAX_RETRIES: u32 = 3;

/// Base delay between attempts, multiplied by the attempt number
const RETRY_DELAY_MS: u64 = 1000;

/// Buffer size for streaming downloads and hashing (64 KB)
const STREAM_BUFFER_SIZE: usize = 64 * 1024;

/// HTTP downloader with bounded retries
pub struct Downloader {
    client: Client,
    max_retries: u32,
}

impl Downloader {
    pub fn new() -> Result<Self> {
        // no overall timeout: the reference package is large
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(None)
            .build()
            .map_err(|e| Error::Download(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_retries: MAX_RETRIES,
        })
    }

    /// Download `url` to `dest`, verifying `sha384` when given
    ///
    /// A file that fails verification is deleted before the error returns.
    pub fn download(&self, url: &str, dest: &Path, sha384: Option<&str>) -> Result<()> {
        info!("Downloading {} to {}", url, dest.display());

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io_at(parent, e))?;
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_download(url, dest) {
                Ok(bytes) => {
                    info!("Downloaded {} bytes", bytes);
                    break;
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::Download(format!(
                            "Failed to download {url} after {attempt} attempts: {e}"
                        )));
                    }
                    warn!(
                        "Failed to download {}, retrying ({}/{}): {}",
                        url, attempt, self.max_retries, e
                    );
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }

        if let Some(expected) = sha384 {
            verify_sha384(dest, expected, url)?;
        }
        Ok(())
    }

    fn try_download(&self, url: &str, dest: &Path) -> Result<u64> {
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::Download(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Download(format!(
                "Unexpected response code {} for {}",
                response.status(),
                url
            )));
        }

        let total_size = response.content_length().unwrap_or(0);
        let name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| url.to_string());
        let pb = create_progress_bar(total_size, &name);

        let temp_path = dest.with_extension("part");
        let downloaded = stream_to_part(&mut response, &temp_path, &pb)?;
        pb.finish_with_message(format!("{} [done]", name));

        fs::rename(&temp_path, dest).map_err(|e| Error::io_at(dest, e))?;
        Ok(downloaded)
    }
}

/// Stream `reader` into `temp_path`; the partial file is removed on failure
fn stream_to_part(reader: &mut impl Read, temp_path: &Path, pb: &ProgressBar) -> Result<u64> {
    let result = write_stream(reader, temp_path, pb);
    if result.is_err()
        && temp_path.exists()
        && let Err(e) = fs::remove_file(temp_path)
    {
        warn!("Failed to remove partial download {}: {}", temp_path.display(), e);
    }
    result
}

fn write_stream(reader: &mut impl Read, temp_path: &Path, pb: &ProgressBar) -> Result<u64> {
    let mut file = File::create(temp_path).map_err(|e| Error::io_at(temp_path, e))?;
    let mut downloaded: u64 = 0;
    let mut buffer = vec![0u8; STREAM_BUFFER_SIZE];
    loop {
        let read = reader
            .read(&mut buffer)
            .map_err(|e| Error::Download(format!("Failed to read response: {e}")))?;
        if read == 0 {
            break;
        }
        file.write_all(&buffer[..read])
            .map_err(|e| Error::io_at(temp_path, e))?;
        downloaded += read as u64;
        pb.set_position(downloaded);
    }
    file.flush().map_err(|e| Error::io_at(temp_path, e))?;
    Ok(downloaded)
}

fn create_progress_bar(size: u64, name: &str) -> ProgressBar {
    let pb = if size > 0 {
        ProgressBar::new(size)
    } else {
        ProgressBar::new_spinner()
    };
    if let Ok(style) = ProgressStyle::default_bar().template(
        "{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}",
    ) {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(name.to_string());
    pb
}

/// Lowercase hex SHA-384 of a file
pub fn sha384_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| Error::io_at(path, e))?;
    let mut hasher = Sha384::new();
    let mut buffer = vec![0u8; STREAM_BUFFER_SIZE];
    loop {
        let read = file.read(&mut buffer).map_err(|e| Error::io_at(path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Check a downloaded file, deleting it on mismatch
pub fn verify_sha384(path: &Path, expected: &str, url: &str) -> Result<()> {
    debug!("Verifying checksum for {}", path.display());
    let actual = sha384_file(path)?;
    if !actual.eq_ignore_ascii_case(expected) {
        if let Err(e) = fs::remove_file(path) {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
        return Err(Error::ChecksumMismatch {
            url: url.to_string(),
            expected: expected.to_lowercase(),
            actual,
        });
    }
    Ok(())
}

/// Extract a zip archive into `out_dir`, replacing its previous contents
///
/// Entries that would land outside `out_dir` abort the extraction. Unix
/// permission bits stored in the archive are restored.
pub fn extract_zip(archive: &Path, out_dir: &Path) -> Result<usize> {
    if out_dir.exists() {
        fs::remove_dir_all(out_dir).map_err(|e| Error::io_at(out_dir, e))?;
    }
    fs::create_dir_all(out_dir).map_err(|e| Error::io_at(out_dir, e))?;

    let file = File::open(archive).map_err(|e| Error::io_at(archive, e))?;
    let mut zip = zip::ZipArchive::new(file)?;
    let mut extracted = 0;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let relative = sanitize_path(entry.name())
            .map_err(|_| Error::PathTraversal(format!("Entry with an illegal path: {}", entry.name())))?;
        let out_path = out_dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| Error::io_at(&out_path, e))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io_at(parent, e))?;
        }

        let mut out = File::create(&out_path).map_err(|e| Error::io_at(&out_path, e))?;
        io::copy(&mut entry, &mut out).map_err(|e| Error::io_at(&out_path, e))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode()
            && mode & 0o777 != 0
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&out_path, fs::Permissions::from_mode(mode & 0o777))
                .map_err(|e| Error::io_at(&out_path, e))?;
        }

        extracted += 1;
    }

    debug!("Extracted {} files from {}", extracted, archive.display());
    Ok(extracted)
}

/// Mark a file executable for its owner
#[cfg(unix)]
pub fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path).map_err(|e| Error::io_at(path, e))?.permissions();
    perms.set_mode(perms.mode() | 0o700);
    fs::set_permissions(path, perms).map_err(|e| Error::io_at(path, e))
}

#[cfg(not(unix))]
pub fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
