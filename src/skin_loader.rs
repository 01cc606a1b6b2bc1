//! Fetching and decoding located skins.
//!
//! The renderer hands every located skin to a [`SkinLoader`] together with a
//! [`SkinCompletion`]. The loader decodes the asset on whatever thread it
//! likes and calls [`SkinCompletion::complete`]; the renderer applies finished
//! loads in `poll_skin_loads`.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::mpsc;

use crate::drawable::DrawableId;
use crate::error::SkinError;
use crate::skin::{DecodedImage, SkinEncoding, SkinToken};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkinRequest {
    pub location: String,
    pub encoding: SkinEncoding,
}

/// A finished load, as delivered to the renderer.
#[derive(Debug)]
pub struct SkinLoadResult {
    pub drawable: DrawableId,
    pub token: SkinToken,
    pub encoding: SkinEncoding,
    pub location: String,
    pub result: Result<DecodedImage, SkinError>,
}

/// One-shot completion handle. Dropping it without completing reports
/// [`SkinError::Abandoned`].
#[derive(Debug)]
pub struct SkinCompletion {
    drawable: DrawableId,
    token: SkinToken,
    encoding: SkinEncoding,
    location: String,
    sender: Option<mpsc::Sender<SkinLoadResult>>,
}

impl SkinCompletion {
    pub(crate) fn new(
        drawable: DrawableId,
        token: SkinToken,
        request: &SkinRequest,
        sender: mpsc::Sender<SkinLoadResult>,
    ) -> Self {
        Self {
            drawable,
            token,
            encoding: request.encoding,
            location: request.location.clone(),
            sender: Some(sender),
        }
    }

    pub fn drawable(&self) -> DrawableId {
        self.drawable
    }

    pub fn token(&self) -> SkinToken {
        self.token
    }

    pub fn complete(mut self, result: Result<DecodedImage, SkinError>) {
        self.send(result);
    }

    fn send(&mut self, result: Result<DecodedImage, SkinError>) {
        let Some(sender) = self.sender.take() else {
            return;
        };
        let message = SkinLoadResult {
            drawable: self.drawable,
            token: self.token,
            encoding: self.encoding,
            location: std::mem::take(&mut self.location),
            result,
        };
        if sender.send(message).is_err() {
            log::debug!("renderer dropped before skin load for {} finished", self.drawable);
        }
    }
}

impl Drop for SkinCompletion {
    fn drop(&mut self) {
        if self.sender.is_some() {
            let location = self.location.clone();
            self.send(Err(SkinError::Abandoned(location)));
        }
    }
}

pub trait SkinLoader {
    /// Starts loading `request`. Must eventually call `completion.complete`
    /// exactly once; doing so before returning is allowed.
    fn load(&self, request: SkinRequest, completion: SkinCompletion);
}

/// Loads skins from files below a root directory, synchronously.
#[derive(Debug, Clone)]
pub struct FileSkinLoader {
    root: PathBuf,
}

impl FileSkinLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a location to a file, dropping a trailing `/get/` asset-server suffix.
    /// Locations that would leave the root are rejected.
    pub fn asset_path(&self, location: &str) -> Result<PathBuf, SkinError> {
        let trimmed = location.trim_end_matches('/');
        let trimmed = trimmed.strip_suffix("/get").unwrap_or(trimmed);
        let relative = Path::new(trimmed.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(SkinError::OutsideRoot(location.to_string()));
        }
        Ok(self.root.join(relative))
    }

    pub fn decode(&self, request: &SkinRequest) -> Result<DecodedImage, SkinError> {
        let path = self.asset_path(&request.location)?;
        let bytes = fs::read(&path).map_err(|source| SkinError::Io {
            location: request.location.clone(),
            source,
        })?;
        match request.encoding {
            SkinEncoding::Vector => DecodedImage::from_svg(&bytes),
            SkinEncoding::Bitmap => DecodedImage::from_encoded(&bytes),
        }
    }
}

impl SkinLoader for FileSkinLoader {
    fn load(&self, request: SkinRequest, completion: SkinCompletion) {
        completion.complete(self.decode(&request));
    }
}
