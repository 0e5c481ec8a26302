use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::{self, LocalBoxFuture, Shared};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, TrackError};
use crate::gpx_types::{LakeId, Track};
use crate::load_track;
use crate::options::EngineOptions;

/// A media row as returned by `GET /media?lakeId=..&type=..`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRecord {
    #[serde(default)]
    pub id: Option<i64>,
    pub url: String,
    #[serde(rename = "type")]
    pub media_type: String,
    pub name: String,
    #[serde(default)]
    pub lake_id: Option<LakeId>,
}

/// Body of `POST /media`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMedia {
    pub url: String,
    #[serde(rename = "type")]
    pub media_type: String,
    pub name: String,
    pub lake_id: Option<LakeId>,
}

/// The lakes/media REST API as seen by the engine.
#[allow(async_fn_in_trait)]
pub trait MediaClient {
    async fn find_media(&self, lake_id: LakeId, media_type: &str) -> Result<Vec<MediaRecord>>;

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>>;

    async fn create_media(&self, media: &NewMedia) -> Result<MediaRecord>;
}

/// Object storage: takes a file, hands back its public URL.
#[allow(async_fn_in_trait)]
pub trait ObjectStore {
    async fn upload(&self, file_name: &str, media_type: &str, bytes: &[u8]) -> Result<String>;
}

/// MIME type for an uploaded file, falling back on the file extension.
pub fn media_type_for(file_name: &str, declared: &str) -> String {
    if !declared.is_empty() {
        return declared.to_string();
    }
    if file_name.to_ascii_lowercase().ends_with(".gpx") {
        "application/gpx+xml".to_string()
    } else {
        "application/octet-stream".to_string()
    }
}

type PendingTrack = Shared<LocalBoxFuture<'static, Option<Track>>>;
type PendingVideo = Shared<LocalBoxFuture<'static, Option<String>>>;

struct StoreInner<C> {
    client: C,
    gpx_media_type: String,
    video_media_type: String,
    tracks: RefCell<HashMap<LakeId, Track>>,
    videos: RefCell<HashMap<LakeId, String>>,
    pending_tracks: RefCell<HashMap<LakeId, PendingTrack>>,
    pending_videos: RefCell<HashMap<LakeId, PendingVideo>>,
}

/// Memoised per-lake tracks and companion video URLs.
///
/// At most one load per lake id is in flight: concurrent callers for the
/// same id share the pending load. Failures are logged and leave the id
/// unmapped. Nothing is evicted unless [`TrackStore::evict`] or
/// [`TrackStore::clear`] is called.
pub struct TrackStore<C> {
    inner: Rc<StoreInner<C>>,
}

impl<C> Clone for TrackStore<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<C: MediaClient + 'static> TrackStore<C> {
    pub fn new(client: C, opts: &EngineOptions) -> Self {
        Self {
            inner: Rc::new(StoreInner {
                client,
                gpx_media_type: opts.gpx_media_type.clone(),
                video_media_type: opts.video_media_type.clone(),
                tracks: RefCell::default(),
                videos: RefCell::default(),
                pending_tracks: RefCell::default(),
                pending_videos: RefCell::default(),
            }),
        }
    }

    pub fn client(&self) -> &C {
        &self.inner.client
    }

    pub fn cached(&self, lake_id: LakeId) -> Option<Track> {
        self.inner.tracks.borrow().get(&lake_id).cloned()
    }

    pub fn cached_video(&self, lake_id: LakeId) -> Option<String> {
        self.inner.videos.borrow().get(&lake_id).cloned()
    }

    pub fn is_loading(&self, lake_id: LakeId) -> bool {
        self.inner.pending_tracks.borrow().contains_key(&lake_id)
    }

    pub fn evict(&self, lake_id: LakeId) {
        self.inner.tracks.borrow_mut().remove(&lake_id);
        self.inner.videos.borrow_mut().remove(&lake_id);
    }

    pub fn clear(&self) {
        self.inner.tracks.borrow_mut().clear();
        self.inner.videos.borrow_mut().clear();
    }

    /// The track for `lake_id`, fetching and parsing it on first use.
    ///
    /// Resolves to `None` when the track is unavailable for any reason.
    /// The id counts as loading from this call until the load settles.
    pub fn get_or_load(&self, lake_id: LakeId) -> impl Future<Output = Option<Track>> + 'static {
        if let Some(track) = self.cached(lake_id) {
            debug!(lake_id, "track cache hit");
            return future::ready(Some(track)).left_future();
        }

        let mut pending = self.inner.pending_tracks.borrow_mut();
        if let Some(load) = pending.get(&lake_id) {
            debug!(lake_id, "joining in-flight track load");
            return load.clone().right_future();
        }

        let inner = Rc::clone(&self.inner);
        let load = async move {
            let result = fetch_track(&inner.client, &inner.gpx_media_type, lake_id).await;
            inner.pending_tracks.borrow_mut().remove(&lake_id);
            match result {
                Ok(track) => {
                    info!(lake_id, points = track.len(), "track loaded");
                    inner.tracks.borrow_mut().insert(lake_id, Rc::clone(&track));
                    Some(track)
                }
                Err(e) => {
                    warn!(lake_id, error = %e, "track unavailable");
                    None
                }
            }
        }
        .boxed_local()
        .shared();

        pending.insert(lake_id, load.clone());
        load.right_future()
    }

    /// URL of the first companion video for `lake_id`, looked up once.
    /// An empty lookup is not remembered.
    pub fn video_url(&self, lake_id: LakeId) -> impl Future<Output = Option<String>> + 'static {
        if let Some(url) = self.cached_video(lake_id) {
            return future::ready(Some(url)).left_future();
        }

        let mut pending = self.inner.pending_videos.borrow_mut();
        if let Some(lookup) = pending.get(&lake_id) {
            return lookup.clone().right_future();
        }

        let inner = Rc::clone(&self.inner);
        let lookup = async move {
            let result = first_media_url(&inner.client, lake_id, &inner.video_media_type).await;
            inner.pending_videos.borrow_mut().remove(&lake_id);
            match result {
                Ok(url) => {
                    inner.videos.borrow_mut().insert(lake_id, url.clone());
                    Some(url)
                }
                Err(e) => {
                    debug!(lake_id, error = %e, "no companion video");
                    None
                }
            }
        }
        .boxed_local()
        .shared();

        pending.insert(lake_id, lookup.clone());
        lookup.right_future()
    }
}

async fn first_media_url<C: MediaClient>(
    client: &C,
    lake_id: LakeId,
    media_type: &str,
) -> Result<String> {
    let records = client.find_media(lake_id, media_type).await?;
    records
        .into_iter()
        .map(|record| record.url)
        .find(|url| !url.is_empty())
        .ok_or_else(|| TrackError::NoMedia {
            lake_id,
            media_type: media_type.to_string(),
        })
}

async fn fetch_track<C: MediaClient>(
    client: &C,
    gpx_media_type: &str,
    lake_id: LakeId,
) -> Result<Track> {
    let url = first_media_url(client, lake_id, gpx_media_type).await?;
    let bytes = client.fetch_bytes(&url).await?;
    load_track(&bytes)
}

/// A file picked for upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub declared_type: String,
    pub bytes: Vec<u8>,
}

/// Result of a successful upload; `track` is set for GPX files.
#[derive(Debug, Clone)]
pub struct UploadedMedia {
    pub record: MediaRecord,
    pub track: Option<Track>,
}

/// Upload a file, record its metadata and parse it when it is a GPX track.
pub async fn upload_file<C, S>(client: &C, storage: &S, file: &UploadFile) -> Result<UploadedMedia>
where
    C: MediaClient,
    S: ObjectStore,
{
    let media_type = media_type_for(&file.name, &file.declared_type);
    let url = storage.upload(&file.name, &media_type, &file.bytes).await?;
    info!(name = %file.name, %url, "uploaded");

    let record = client
        .create_media(&NewMedia {
            url,
            media_type,
            name: file.name.clone(),
            lake_id: None,
        })
        .await?;

    let track = if file.name.to_ascii_lowercase().ends_with(".gpx") {
        Some(load_track(&file.bytes)?)
    } else {
        None
    };

    Ok(UploadedMedia { record, track })
}

/// Upload files one after another. A file that fails is logged and skipped.
pub async fn upload_all<C, S>(client: &C, storage: &S, files: &[UploadFile]) -> Vec<UploadedMedia>
where
    C: MediaClient,
    S: ObjectStore,
{
    let mut uploaded = Vec::with_capacity(files.len());
    for file in files {
        match upload_file(client, storage, file).await {
            Ok(media) => uploaded.push(media),
            Err(e) => warn!(name = %file.name, error = %e, "upload failed"),
        }
    }
    uploaded
}
