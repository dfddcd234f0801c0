//! HTTP release check for the OTA trigger task.
//!
//! Each check fetches a small JSON manifest from a URL built into the
//! firmware:
//!
//! ```text
//! { "version": "0.2.0", "url": "https://host/diag-bridge-0.2.0.bin", "size": 1048576 }
//! ```
//!
//! A manifest naming a version other than the running one starts a
//! download on the `ota_download` thread, which streams the image into the
//! inactive OTA slot, marks it bootable and restarts.  The check returns
//! as soon as the download is started, so the trigger task never blocks on
//! the image transfer.

use core::fmt;

use serde::Deserialize;

/// Largest image accepted: one OTA slot.
pub const MAX_IMAGE_SIZE: usize = 4 * 1024 * 1024;

/// Manifests are a few hundred bytes; anything larger is not one.
pub const MAX_MANIFEST_SIZE: usize = 1024;

/// Version string the manifest is compared against.
pub const RUNNING_VERSION: &str = env!("CARGO_PKG_VERSION");

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseError {
    /// HTTP connection or read failed (ESP-IDF error code).
    Transport(i32),
    HttpStatus(u16),
    BadManifest,
    ImageSize(usize),
    SizeMismatch { expected: usize, received: usize },
    /// The OTA partition rejected a begin, write or finalize.
    Flash(i32),
    /// The download thread could not be started.
    Spawn,
}

impl ReleaseError {
    /// Status code reported through `OtaCheckError::Failed`.  Always
    /// negative, like the SDK's `fota_start()` failures.
    pub fn code(self) -> i32 {
        match self {
            Self::Transport(e) | Self::Flash(e) => -e.saturating_abs().max(1),
            Self::HttpStatus(status) => -i32::from(status),
            Self::BadManifest => -1,
            Self::ImageSize(_) => -2,
            Self::SizeMismatch { .. } => -3,
            Self::Spawn => -4,
        }
    }
}

impl fmt::Display for ReleaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "HTTP transport error {e}"),
            Self::HttpStatus(status) => write!(f, "unexpected HTTP status {status}"),
            Self::BadManifest => write!(f, "release manifest is malformed"),
            Self::ImageSize(size) => {
                write!(f, "image size {size} outside 1..={MAX_IMAGE_SIZE}")
            }
            Self::SizeMismatch { expected, received } => {
                write!(f, "image is {received} bytes, manifest says {expected}")
            }
            Self::Flash(e) => write!(f, "OTA partition error {e}"),
            Self::Spawn => write!(f, "download thread could not be started"),
        }
    }
}

impl std::error::Error for ReleaseError {}

// ── Manifest ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseManifest {
    pub version: String,
    pub url: String,
    pub size: usize,
}

impl ReleaseManifest {
    pub fn parse(body: &[u8]) -> Result<Self, ReleaseError> {
        if body.len() > MAX_MANIFEST_SIZE {
            return Err(ReleaseError::BadManifest);
        }
        let manifest: Self =
            serde_json::from_slice(body).map_err(|_| ReleaseError::BadManifest)?;
        if manifest.version.is_empty() || manifest.url.is_empty() {
            return Err(ReleaseError::BadManifest);
        }
        if manifest.size == 0 || manifest.size > MAX_IMAGE_SIZE {
            return Err(ReleaseError::ImageSize(manifest.size));
        }
        Ok(manifest)
    }

    /// Any version other than the running one is installed, so a
    /// rollback is published the same way as an upgrade.
    pub fn is_update_for(&self, running: &str) -> bool {
        self.version != running
    }
}

/// Stream exactly `expected` bytes from `read` into `write` through `buf`.
///
/// `read` returning 0 ends the stream.  Returns the byte count.
pub fn copy_image(
    expected: usize,
    buf: &mut [u8],
    mut read: impl FnMut(&mut [u8]) -> Result<usize, ReleaseError>,
    mut write: impl FnMut(&[u8]) -> Result<(), ReleaseError>,
) -> Result<usize, ReleaseError> {
    let mut received = 0usize;
    loop {
        let n = read(buf)?;
        if n == 0 {
            break;
        }
        received += n;
        if received > expected {
            return Err(ReleaseError::SizeMismatch { expected, received });
        }
        write(&buf[..n])?;
    }
    if received != expected {
        return Err(ReleaseError::SizeMismatch { expected, received });
    }
    Ok(received)
}

// ── ESP-IDF client ────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use device::HttpOtaClient;

#[cfg(target_os = "espidf")]
mod device {
    use core::time::Duration;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use embedded_svc::http::client::{Client, Response};
    use embedded_svc::io::Read;
    use esp_idf_svc::http::client::{Configuration as HttpConfig, EspHttpConnection};
    use esp_idf_svc::io::EspIOError;
    use esp_idf_svc::ota::EspOta;
    use esp_idf_svc::sys::EspError;
    use log::{debug, error, info, warn};

    use super::{copy_image, ReleaseError, ReleaseManifest, RUNNING_VERSION};
    use crate::app::ports::{OtaCheckError, OtaCheckOutcome, OtaCheckPort};
    use crate::drivers::task_pin::{self, Core};
    use crate::scheduler::TriggerContext;

    const HTTP_BUFFER_SIZE: usize = 4096;
    const DOWNLOAD_CHUNK: usize = 4096;
    const MANIFEST_TIMEOUT: Duration = Duration::from_secs(15);
    const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

    // TLS handshake plus the HTTP client frames.
    const DOWNLOAD_STACK_KB: usize = 12;
    const DOWNLOAD_PRIORITY: u8 = 2;

    impl From<EspError> for ReleaseError {
        fn from(e: EspError) -> Self {
            Self::Transport(e.code())
        }
    }

    impl From<EspIOError> for ReleaseError {
        fn from(e: EspIOError) -> Self {
            Self::Transport(e.0.code())
        }
    }

    fn flash_error(stage: &'static str) -> impl FnOnce(EspError) -> ReleaseError {
        move |e| {
            warn!("OTA: {} failed: {}", stage, e);
            ReleaseError::Flash(e.code())
        }
    }

    /// Release check against a manifest URL.
    pub struct HttpOtaClient {
        manifest_url: &'static str,
        downloading: Arc<AtomicBool>,
    }

    impl HttpOtaClient {
        pub fn new(manifest_url: &'static str) -> Self {
            Self {
                manifest_url,
                downloading: Arc::new(AtomicBool::new(false)),
            }
        }

        fn check(&mut self) -> Result<OtaCheckOutcome, ReleaseError> {
            if self.downloading.load(Ordering::SeqCst) {
                info!("OTA: download already in progress");
                return Ok(OtaCheckOutcome::NoUpdateAvailable);
            }

            let manifest = fetch_manifest(self.manifest_url)?;
            if !manifest.is_update_for(RUNNING_VERSION) {
                debug!("OTA: running {} matches the published release", RUNNING_VERSION);
                return Ok(OtaCheckOutcome::NoUpdateAvailable);
            }
            info!(
                "OTA: release {} available (running {}, {} bytes)",
                manifest.version, RUNNING_VERSION, manifest.size
            );

            self.downloading.store(true, Ordering::SeqCst);
            let downloading = Arc::clone(&self.downloading);
            let spawned = task_pin::spawn_on_core(
                Core::Pro,
                DOWNLOAD_PRIORITY,
                DOWNLOAD_STACK_KB,
                "ota_download\0",
                move || match download_and_install(&manifest) {
                    Ok(()) => {
                        info!("OTA: {} installed, restarting", manifest.version);
                        esp_idf_svc::hal::reset::restart();
                    }
                    Err(e) => {
                        error!("OTA: download of {} failed: {}", manifest.version, e);
                        downloading.store(false, Ordering::SeqCst);
                    }
                },
            );
            if let Err(e) = spawned {
                warn!("OTA: {}", e);
                self.downloading.store(false, Ordering::SeqCst);
                return Err(ReleaseError::Spawn);
            }
            Ok(OtaCheckOutcome::DownloadStarted)
        }
    }

    impl OtaCheckPort for HttpOtaClient {
        fn check_for_update(
            &mut self,
            context: TriggerContext,
        ) -> Result<OtaCheckOutcome, OtaCheckError> {
            debug!("OTA: release check ({})", context);
            self.check().map_err(|e| {
                warn!("OTA: release check failed: {}", e);
                OtaCheckError::Failed(e.code())
            })
        }
    }

    fn http_client(timeout: Duration) -> Result<Client<EspHttpConnection>, ReleaseError> {
        let config = HttpConfig {
            buffer_size: Some(HTTP_BUFFER_SIZE),
            timeout: Some(timeout),
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        };
        Ok(Client::wrap(EspHttpConnection::new(&config)?))
    }

    fn open<'a>(
        client: &'a mut Client<EspHttpConnection>,
        url: &'a str,
    ) -> Result<Response<&'a mut EspHttpConnection>, ReleaseError> {
        let response = client.get(url)?.submit()?;
        match response.status() {
            200 => Ok(response),
            status => Err(ReleaseError::HttpStatus(status)),
        }
    }

    fn fetch_manifest(url: &str) -> Result<ReleaseManifest, ReleaseError> {
        let mut client = http_client(MANIFEST_TIMEOUT)?;
        let mut response = open(&mut client, url)?;

        let mut body = Vec::new();
        let mut buf = [0u8; 256];
        loop {
            let n = response.read(&mut buf)?;
            if n == 0 {
                break;
            }
            if body.len() + n > super::MAX_MANIFEST_SIZE {
                return Err(ReleaseError::BadManifest);
            }
            body.extend_from_slice(&buf[..n]);
        }
        ReleaseManifest::parse(&body)
    }

    fn download_and_install(manifest: &ReleaseManifest) -> crate::error::Result<()> {
        let mut client = http_client(DOWNLOAD_TIMEOUT)?;
        let mut response = open(&mut client, &manifest.url)?;

        let mut ota = EspOta::new().map_err(flash_error("open"))?;
        let mut update = ota.initiate_update().map_err(flash_error("begin"))?;

        let mut buf = vec![0u8; DOWNLOAD_CHUNK];
        let copied = copy_image(
            manifest.size,
            &mut buf,
            |chunk| response.read(chunk).map_err(ReleaseError::from),
            |chunk| update.write(chunk).map_err(flash_error("write")),
        );
        let written = match copied {
            Ok(n) => n,
            Err(e) => {
                if let Err(abort) = update.abort() {
                    warn!("OTA: abort failed: {}", abort);
                }
                return Err(e.into());
            }
        };

        update.complete().map_err(flash_error("finalize"))?;
        info!("OTA: wrote {} bytes to the inactive slot", written);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_manifest() {
        let body = br#"{"version":"0.2.0","url":"https://example.com/fw.bin","size":4096}"#;
        let m = ReleaseManifest::parse(body).unwrap();
        assert_eq!(m.version, "0.2.0");
        assert_eq!(m.size, 4096);
        assert!(m.is_update_for("0.1.0"));
        assert!(!m.is_update_for("0.2.0"));
    }

    #[test]
    fn rejects_malformed_manifests() {
        assert_eq!(ReleaseManifest::parse(b"not json"), Err(ReleaseError::BadManifest));
        assert_eq!(
            ReleaseManifest::parse(br#"{"version":"","url":"u","size":1}"#),
            Err(ReleaseError::BadManifest)
        );
        assert_eq!(
            ReleaseManifest::parse(&[b' '; MAX_MANIFEST_SIZE + 1]),
            Err(ReleaseError::BadManifest)
        );
    }

    #[test]
    fn rejects_impossible_image_sizes() {
        assert_eq!(
            ReleaseManifest::parse(br#"{"version":"1","url":"u","size":0}"#),
            Err(ReleaseError::ImageSize(0))
        );
        let huge = format!(r#"{{"version":"1","url":"u","size":{}}}"#, MAX_IMAGE_SIZE + 1);
        assert_eq!(
            ReleaseManifest::parse(huge.as_bytes()),
            Err(ReleaseError::ImageSize(MAX_IMAGE_SIZE + 1))
        );
    }

    /// Feeds `image` to `copy_image` in `step`-sized reads.
    fn copy_from(image: &[u8], expected: usize, step: usize) -> (Result<usize, ReleaseError>, Vec<u8>) {
        let mut pos = 0;
        let mut out = Vec::new();
        let mut buf = [0u8; 64];
        let result = copy_image(
            expected,
            &mut buf,
            |dst| {
                let n = step.min(dst.len()).min(image.len() - pos);
                dst[..n].copy_from_slice(&image[pos..pos + n]);
                pos += n;
                Ok(n)
            },
            |chunk| {
                out.extend_from_slice(chunk);
                Ok(())
            },
        );
        (result, out)
    }

    #[test]
    fn copies_the_whole_image() {
        let image: Vec<u8> = (0..200u8).collect();
        let (result, out) = copy_from(&image, image.len(), 37);
        assert_eq!(result, Ok(200));
        assert_eq!(out, image);
    }

    #[test]
    fn short_image_is_a_mismatch() {
        let image = [7u8; 50];
        let (result, _) = copy_from(&image, 80, 16);
        assert_eq!(
            result,
            Err(ReleaseError::SizeMismatch { expected: 80, received: 50 })
        );
    }

    #[test]
    fn long_image_stops_before_writing_the_excess() {
        let image = [7u8; 100];
        let (result, out) = copy_from(&image, 40, 32);
        assert_eq!(
            result,
            Err(ReleaseError::SizeMismatch { expected: 40, received: 64 })
        );
        assert_eq!(out.len(), 32);
    }

    #[test]
    fn write_failure_aborts_the_copy() {
        let mut buf = [0u8; 8];
        let result = copy_image(
            16,
            &mut buf,
            |dst| Ok(dst.len()),
            |_| Err(ReleaseError::Flash(0x1503)),
        );
        assert_eq!(result, Err(ReleaseError::Flash(0x1503)));
    }

    #[test]
    fn failure_codes_are_negative() {
        for e in [
            ReleaseError::Transport(0x7002),
            ReleaseError::Transport(-1),
            ReleaseError::Transport(0),
            ReleaseError::HttpStatus(404),
            ReleaseError::BadManifest,
            ReleaseError::ImageSize(0),
            ReleaseError::SizeMismatch { expected: 1, received: 0 },
            ReleaseError::Flash(0x1503),
            ReleaseError::Spawn,
        ] {
            assert!(e.code() < 0, "{e:?} -> {}", e.code());
        }
        assert_eq!(ReleaseError::HttpStatus(404).code(), -404);
    }
}
