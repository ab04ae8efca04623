use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use futures::{FutureExt as _, future::BoxFuture};
use tokio::{io::AsyncReadExt as _, sync::oneshot};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::debug;

use crate::{
    assets::AssetDescriptor,
    error::{PreloadError, PreloadResult},
};

/// Bytes inspected before a file is considered to have usable data.
pub const HEADER_PROBE_BYTES: usize = 512;

pub const DEFAULT_READ_CHUNK: usize = 256 * 1024;

/// A one-shot signal emitted by a loading resource.
///
/// A listener that will never fire stays pending forever; it must not resolve.
pub type Listener<T> = BoxFuture<'static, T>;

/// The signals a loading media resource can emit.
///
/// Dropping the listeners detaches them. Loaders are expected to stop any
/// background work once nobody listens anymore.
pub struct MediaListeners {
    /// Enough data is buffered to play to the end.
    pub can_play_through: Listener<()>,
    /// The first frame is available.
    pub loaded_data: Listener<()>,
    /// Loading failed; carries a human readable reason.
    pub error: Listener<String>,
}

impl MediaListeners {
    /// Listeners that never fire.
    pub fn pending() -> Self {
        Self {
            can_play_through: std::future::pending().boxed(),
            loaded_data: std::future::pending().boxed(),
            error: std::future::pending().boxed(),
        }
    }

    /// Listeners whose error signal fires immediately.
    pub fn failed(info: impl Into<String>) -> Self {
        let info = info.into();
        Self {
            error: async move { info }.boxed(),
            ..Self::pending()
        }
    }

    /// Builds listeners backed by one-shot channels.
    ///
    /// A closed channel (sender dropped without sending) keeps its listener
    /// pending. `guard` is released once all three listeners are gone.
    pub fn from_channels(
        loaded_data: oneshot::Receiver<()>,
        can_play_through: oneshot::Receiver<()>,
        error: oneshot::Receiver<String>,
        guard: Option<DropGuard>,
    ) -> Self {
        let guard = Arc::new(guard);
        Self {
            can_play_through: listen(can_play_through, Arc::clone(&guard)),
            loaded_data: listen(loaded_data, Arc::clone(&guard)),
            error: listen(error, guard),
        }
    }
}

fn listen<T: Send + 'static>(rx: oneshot::Receiver<T>, guard: Arc<Option<DropGuard>>) -> Listener<T> {
    async move {
        let _guard = guard;
        match rx.await {
            Ok(v) => v,
            Err(_) => std::future::pending().await,
        }
    }
    .boxed()
}

/// Capability that starts loading a resource and hands back its signals.
///
/// Calling [`MediaLoader::load`] is the "begin loading" action; each call must
/// start an independent load.
pub trait MediaLoader: Send + Sync {
    fn load(&self, asset: &AssetDescriptor) -> MediaListeners;
}

impl<L: MediaLoader + ?Sized> MediaLoader for Arc<L> {
    fn load(&self, asset: &AssetDescriptor) -> MediaListeners {
        (**self).load(asset)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerFormat {
    Mp4,
    Matroska, // MKV/WebM
    TransportStream,
    Ogg,
    Unknown,
}

/// Detects a video container from the first bytes of a file.
pub fn detect_container(header: &[u8]) -> ContainerFormat {
    // MP4/MOV: box type "ftyp" right after the first size field
    if header.len() >= 8 && &header[4..8] == b"ftyp" {
        return ContainerFormat::Mp4;
    }
    if header.len() >= 4 && header[0..4] == [0x1A, 0x45, 0xDF, 0xA3] {
        return ContainerFormat::Matroska;
    }
    if header.len() >= 4 && &header[0..4] == b"OggS" {
        return ContainerFormat::Ogg;
    }
    // MPEG-TS: sync byte on two consecutive 188-byte packets
    if header.len() > 188 && header[0] == 0x47 && header[188] == 0x47 {
        return ContainerFormat::TransportStream;
    }
    ContainerFormat::Unknown
}

/// Maps a site-root path such as `/videos/a.mp4?v=2` to a relative file path.
pub fn normalize_source(source: &str) -> PreloadResult<String> {
    let s = source.trim().replace('\\', "/");
    let s = s.split(['?', '#']).next().unwrap_or_default();
    if s.is_empty() {
        return Err(PreloadError::validation("asset source must be non-empty"));
    }
    if s.contains("://") {
        return Err(PreloadError::validation(format!(
            "asset source '{s}' is a URL; only site-root paths are supported"
        )));
    }

    let mut out = Vec::<&str>::new();
    for part in s.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return Err(PreloadError::validation(
                "asset sources must not contain '..'",
            ));
        }
        out.push(part);
    }

    if out.is_empty() {
        return Err(PreloadError::validation(
            "asset source must contain a file name",
        ));
    }

    Ok(out.join("/"))
}

/// Loads media files from a directory standing in for the site root.
///
/// `loaded_data` fires once the container header is recognised and
/// `can_play_through` once the whole file has been read.
#[derive(Clone, Debug)]
pub struct FsMediaLoader {
    root: PathBuf,
    chunk_size: usize,
}

impl FsMediaLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            chunk_size: DEFAULT_READ_CHUNK,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, source: &str) -> PreloadResult<PathBuf> {
        Ok(self.root.join(normalize_source(source)?))
    }
}

impl MediaLoader for FsMediaLoader {
    fn load(&self, asset: &AssetDescriptor) -> MediaListeners {
        let path = match self.resolve(&asset.source) {
            Ok(p) => p,
            Err(e) => return MediaListeners::failed(e.to_string()),
        };

        let (loaded_tx, loaded_rx) = oneshot::channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let (error_tx, error_rx) = oneshot::channel();
        let token = CancellationToken::new();
        let task_token = token.clone();
        let chunk_size = self.chunk_size;

        tokio::spawn(async move {
            tokio::select! {
                _ = task_token.cancelled() => {
                    debug!("stopped reading '{}': listeners detached", path.display());
                }
                res = read_media(&path, chunk_size, loaded_tx) => match res {
                    Ok(()) => {
                        let _ = ready_tx.send(());
                    }
                    Err(e) => {
                        let _ = error_tx.send(e.to_string());
                    }
                },
            }
        });

        MediaListeners::from_channels(loaded_rx, ready_rx, error_rx, Some(token.drop_guard()))
    }
}

async fn read_media(
    path: &Path,
    chunk_size: usize,
    loaded_tx: oneshot::Sender<()>,
) -> PreloadResult<()> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| PreloadError::media(format!("open '{}': {e}", path.display())))?;

    let mut buf = vec![0u8; chunk_size];
    let mut header = Vec::with_capacity(HEADER_PROBE_BYTES);
    let mut loaded_tx = Some(loaded_tx);

    loop {
        let n = file
            .read(&mut buf)
            .await
            .map_err(|e| PreloadError::media(format!("read '{}': {e}", path.display())))?;
        if n == 0 {
            break;
        }
        if loaded_tx.is_some() {
            let want = HEADER_PROBE_BYTES - header.len();
            header.extend_from_slice(&buf[..n.min(want)]);
            if header.len() >= HEADER_PROBE_BYTES {
                check_header(path, &header)?;
                if let Some(tx) = loaded_tx.take() {
                    let _ = tx.send(());
                }
            }
        }
    }

    // Short files never filled the probe window.
    if let Some(tx) = loaded_tx.take() {
        if header.is_empty() {
            return Err(PreloadError::media(format!(
                "'{}' is empty",
                path.display()
            )));
        }
        check_header(path, &header)?;
        let _ = tx.send(());
    }
    Ok(())
}

fn check_header(path: &Path, header: &[u8]) -> PreloadResult<()> {
    match detect_container(header) {
        ContainerFormat::Unknown => Err(PreloadError::media(format!(
            "'{}' is not a recognised video container",
            path.display()
        ))),
        format => {
            debug!(?format, "detected container for '{}'", path.display());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_common_containers() {
        let mut mp4 = vec![0u8; 16];
        mp4[0..4].copy_from_slice(&16u32.to_be_bytes());
        mp4[4..8].copy_from_slice(b"ftyp");
        assert_eq!(detect_container(&mp4), ContainerFormat::Mp4);

        assert_eq!(
            detect_container(&[0x1A, 0x45, 0xDF, 0xA3, 0x00]),
            ContainerFormat::Matroska
        );
        assert_eq!(detect_container(b"OggS\0\0"), ContainerFormat::Ogg);

        let mut ts = vec![0u8; 200];
        ts[0] = 0x47;
        ts[188] = 0x47;
        assert_eq!(detect_container(&ts), ContainerFormat::TransportStream);

        assert_eq!(detect_container(b"<html>"), ContainerFormat::Unknown);
    }

    #[test]
    fn normalize_strips_root_and_query() {
        assert_eq!(
            normalize_source("/videos/output.mp4").unwrap(),
            "videos/output.mp4"
        );
        assert_eq!(
            normalize_source("videos\\./hero.webm?v=3#t=1").unwrap(),
            "videos/hero.webm"
        );
    }

    #[test]
    fn normalize_rejects_escapes_and_urls() {
        assert!(normalize_source("/videos/../secret.mp4").is_err());
        assert!(normalize_source("https://cdn.example/a.mp4").is_err());
        assert!(normalize_source("/").is_err());
        assert!(normalize_source("  ").is_err());
    }

    #[tokio::test]
    async fn failed_listeners_fire_error_only() {
        let listeners = MediaListeners::failed("bad");
        assert_eq!(listeners.error.await, "bad");
    }

    #[tokio::test(start_paused = true)]
    async fn closed_channel_keeps_listener_pending() {
        let (tx, rx) = oneshot::channel::<()>();
        drop(tx);
        let (_l_tx, l_rx) = oneshot::channel::<()>();
        let (_e_tx, e_rx) = oneshot::channel::<String>();
        let listeners = MediaListeners::from_channels(l_rx, rx, e_rx, None);
        let res = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            listeners.can_play_through,
        )
        .await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn dropping_listeners_cancels_guard() {
        let token = CancellationToken::new();
        let (_a, a) = oneshot::channel::<()>();
        let (_b, b) = oneshot::channel::<()>();
        let (_c, c) = oneshot::channel::<String>();
        let listeners = MediaListeners::from_channels(a, b, c, Some(token.clone().drop_guard()));
        assert!(!token.is_cancelled());
        drop(listeners);
        assert!(token.is_cancelled());
    }
}
