//! Background photo decoding for the room gallery.
//!
//! Requests go to a single worker thread over a channel; decoded RGBA8 pixels
//! come back the same way. Every request carries a [`LoadToken`]. The worker
//! skips requests whose token died while queued, and [`PhotoLoader::poll`]
//! discards results whose token died while decoding, so a closed gallery or a
//! disposed viewer never receives stale pixels.
//!
//! Photos larger than the loader's side limit are downscaled before they leave
//! the worker, so the UI never uploads a texture the GPU cannot hold.

use crossbeam_channel::{Receiver, Sender};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to read photo {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode photo {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to start photo loader: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("photo loader has shut down")]
    Disconnected,
}

/// Shared liveness flag captured when a load starts.
#[derive(Debug, Clone)]
pub struct LoadToken(Arc<AtomicBool>);

impl LoadToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn cancel(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_live(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Default for LoadToken {
    fn default() -> Self {
        Self::new()
    }
}

struct PhotoRequest {
    photo: String,
    path: PathBuf,
    token: LoadToken,
}

#[derive(Debug, Clone)]
pub struct DecodedPhoto {
    pub size: [usize; 2],
    pub rgba: Vec<u8>,
}

#[derive(Debug)]
pub struct PhotoLoaded {
    /// The catalog photo path as requested.
    pub photo: String,
    pub result: Result<DecodedPhoto, AssetError>,
}

pub struct PhotoLoader {
    asset_root: PathBuf,
    requests: Option<Sender<PhotoRequest>>,
    results: Receiver<(LoadToken, PhotoLoaded)>,
    worker: Option<JoinHandle<()>>,
    tokens: Vec<LoadToken>,
}

impl PhotoLoader {
    pub fn spawn(asset_root: impl Into<PathBuf>, max_side: u32) -> Result<Self, AssetError> {
        let max_side = max_side.max(1);
        let (request_tx, request_rx) = crossbeam_channel::unbounded::<PhotoRequest>();
        let (result_tx, result_rx) = crossbeam_channel::unbounded();
        let worker = std::thread::Builder::new()
            .name("photo-loader".to_string())
            .spawn(move || {
                for request in request_rx {
                    if !request.token.is_live() {
                        log::trace!("Skipping cancelled photo {}", request.photo);
                        continue;
                    }
                    let result = decode_photo(&request.path, max_side);
                    let loaded = PhotoLoaded {
                        photo: request.photo,
                        result,
                    };
                    if result_tx.send((request.token, loaded)).is_err() {
                        break;
                    }
                }
            })
            .map_err(AssetError::Spawn)?;

        Ok(Self {
            asset_root: asset_root.into(),
            requests: Some(request_tx),
            results: result_rx,
            worker: Some(worker),
            tokens: Vec::new(),
        })
    }

    pub fn request(&mut self, photo: &str, token: &LoadToken) -> Result<(), AssetError> {
        let sender = self.requests.as_ref().ok_or(AssetError::Disconnected)?;
        self.tokens.retain(LoadToken::is_live);
        if !self.tokens.iter().any(|known| Arc::ptr_eq(&known.0, &token.0)) {
            self.tokens.push(token.clone());
        }
        sender
            .send(PhotoRequest {
                photo: photo.to_string(),
                path: self.asset_root.join(photo),
                token: token.clone(),
            })
            .map_err(|_| AssetError::Disconnected)
    }

    /// Finished loads whose token is still live.
    pub fn poll(&self) -> Vec<PhotoLoaded> {
        self.results
            .try_iter()
            .filter_map(|(token, loaded)| {
                if token.is_live() {
                    Some(loaded)
                } else {
                    log::debug!("Dropping stale photo {}", loaded.photo);
                    None
                }
            })
            .collect()
    }

    pub fn cancel_all(&mut self) {
        for token in self.tokens.drain(..) {
            token.cancel();
        }
    }

    /// Cancels outstanding loads and joins the worker.
    pub fn shutdown(&mut self) {
        self.cancel_all();
        self.requests = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("Photo loader thread panicked");
            }
        }
    }
}

impl Drop for PhotoLoader {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn decode_photo(path: &Path, max_side: u32) -> Result<DecodedPhoto, AssetError> {
    let display = path.display().to_string();
    let bytes = std::fs::read(path).map_err(|source| AssetError::Read {
        path: display.clone(),
        source,
    })?;
    let mut image = image::load_from_memory(&bytes).map_err(|source| AssetError::Decode {
        path: display.clone(),
        source,
    })?;
    if image.width() > max_side || image.height() > max_side {
        log::debug!(
            "Downscaling {display} from {}x{} to fit {max_side}",
            image.width(),
            image.height()
        );
        image = image.resize(max_side, max_side, image::imageops::FilterType::Triangle);
    }
    let image = image.to_rgba8();
    let size = [image.width() as usize, image.height() as usize];
    Ok(DecodedPhoto {
        size,
        rgba: image.into_raw(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn temp_dir(tag: &str) -> PathBuf {
        let nonce = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "dollhouse_photos_{}_{}_{}",
            tag,
            std::process::id(),
            nonce
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) {
        let image = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 10, 10, 255]));
        image.save(dir.join(name)).unwrap();
    }

    fn wait_for(loader: &PhotoLoader, count: usize) -> Vec<PhotoLoaded> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut done = Vec::new();
        while done.len() < count && Instant::now() < deadline {
            done.extend(loader.poll());
            std::thread::sleep(Duration::from_millis(5));
        }
        done
    }

    #[test]
    fn decodes_photos_on_worker() {
        let dir = temp_dir("decode");
        write_png(&dir, "room.png", 4, 3);
        let mut loader = PhotoLoader::spawn(&dir, 4096).unwrap();
        let token = LoadToken::new();
        loader.request("room.png", &token).unwrap();

        let done = wait_for(&loader, 1);
        assert_eq!(done.len(), 1);
        let photo = done[0].result.as_ref().unwrap();
        assert_eq!(photo.size, [4, 3]);
        assert_eq!(photo.rgba.len(), 4 * 3 * 4);
        assert_eq!(&photo.rgba[..4], &[200, 10, 10, 255]);

        loader.shutdown();
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn oversized_photos_are_downscaled_to_fit() {
        let dir = temp_dir("downscale");
        write_png(&dir, "aerial.png", 300, 100);
        write_png(&dir, "portrait.png", 40, 90);
        write_png(&dir, "small.png", 20, 10);

        let wide = decode_photo(&dir.join("aerial.png"), 64).unwrap();
        assert_eq!(wide.size[0], 64);
        assert!((21..=22).contains(&wide.size[1]), "{:?}", wide.size);
        assert_eq!(wide.rgba.len(), wide.size[0] * wide.size[1] * 4);

        let tall = decode_photo(&dir.join("portrait.png"), 64).unwrap();
        assert_eq!(tall.size[1], 64);
        assert!(tall.size[0] <= 64);

        let small = decode_photo(&dir.join("small.png"), 64).unwrap();
        assert_eq!(small.size, [20, 10]);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn missing_and_corrupt_photos_report_errors() {
        let dir = temp_dir("errors");
        std::fs::write(dir.join("broken.jpg"), b"not a jpeg").unwrap();
        let mut loader = PhotoLoader::spawn(&dir, 4096).unwrap();
        let token = LoadToken::new();
        loader.request("absent.jpg", &token).unwrap();
        loader.request("broken.jpg", &token).unwrap();

        let done = wait_for(&loader, 2);
        assert_eq!(done.len(), 2);
        assert!(matches!(done[0].result, Err(AssetError::Read { .. })));
        assert!(matches!(done[1].result, Err(AssetError::Decode { .. })));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn cancelled_tokens_never_deliver() {
        let dir = temp_dir("cancel");
        write_png(&dir, "a.png", 2, 2);
        write_png(&dir, "b.png", 2, 2);
        let mut loader = PhotoLoader::spawn(&dir, 4096).unwrap();

        let stale = LoadToken::new();
        stale.cancel();
        let live = LoadToken::new();
        loader.request("a.png", &stale).unwrap();
        loader.request("b.png", &live).unwrap();

        let done = wait_for(&loader, 1);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].photo, "b.png");
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn shutdown_cancels_outstanding_tokens() {
        let mut loader = PhotoLoader::spawn(std::env::temp_dir(), 4096).unwrap();
        let token = LoadToken::new();
        loader.request("whatever.png", &token).unwrap();
        loader.shutdown();
        assert!(!token.is_live());
        assert!(matches!(
            loader.request("later.png", &LoadToken::new()),
            Err(AssetError::Disconnected)
        ));
    }
}
