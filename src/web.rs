//! Browser side: HTTP collaborators, timers, the `<video>` source, console
//! logging and the `LakeTrackSession` class exported to JavaScript.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;
use std::time::Duration;

use gloo_net::http::{Request, Response};
use gloo_timers::callback::Interval;
use serde::Deserialize;
use tracing::{Level, Metadata, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::{Event, File, HtmlVideoElement};

use crate::error::{Result, TrackError};
use crate::gpx_types::LakeId;
use crate::playback::{MediaSource, Scheduler, Subscription};
use crate::preview::{Applied, PreviewChannel, PreviewResponse};
use crate::session::Session;
use crate::store::{MediaClient, MediaRecord, NewMedia, ObjectStore, UploadFile};
use crate::{parse_options, to_js};

/// Install the panic hook and route `tracing` output to the browser console.
///
/// `filter` takes `RUST_LOG` syntax and defaults to `info`. Calling this
/// more than once is harmless.
#[wasm_bindgen(js_name = initLogging)]
pub fn init(filter: Option<String>) {
    console_error_panic_hook::set_once();
    let filter = EnvFilter::try_new(filter.as_deref().unwrap_or("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .without_time()
        .with_writer(ConsoleMakeWriter)
        .try_init();
}

struct ConsoleMakeWriter;

impl<'a> MakeWriter<'a> for ConsoleMakeWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter::new(Level::INFO)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        ConsoleWriter::new(*meta.level())
    }
}

/// Buffers one formatted event and hands it to `console.*` when dropped.
struct ConsoleWriter {
    level: Level,
    buf: Vec<u8>,
}

impl ConsoleWriter {
    fn new(level: Level) -> Self {
        Self { level, buf: Vec::new() }
    }
}

impl io::Write for ConsoleWriter {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ConsoleWriter {
    fn drop(&mut self) {
        let line = String::from_utf8_lossy(&self.buf);
        let line = JsValue::from_str(line.trim_end());
        match self.level {
            Level::ERROR => web_sys::console::error_1(&line),
            Level::WARN => web_sys::console::warn_1(&line),
            Level::INFO => web_sys::console::info_1(&line),
            _ => web_sys::console::debug_1(&line),
        }
    }
}

fn ensure_ok(url: &str, response: &Response) -> Result<()> {
    if response.ok() {
        Ok(())
    } else {
        Err(TrackError::HttpStatus {
            url: url.to_string(),
            status: response.status(),
        })
    }
}

/// The lakes/media REST API over `fetch`.
#[derive(Debug, Clone)]
pub struct HttpMediaClient {
    api_base: String,
}

impl HttpMediaClient {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    fn media_url(&self) -> String {
        format!("{}/media", self.api_base)
    }
}

impl MediaClient for HttpMediaClient {
    async fn find_media(&self, lake_id: LakeId, media_type: &str) -> Result<Vec<MediaRecord>> {
        let url = self.media_url();
        let response = Request::get(&url)
            .query([("lakeId", lake_id.to_string()), ("type", media_type.to_string())])
            .send()
            .await
            .map_err(|e| TrackError::fetch(&url, e))?;
        ensure_ok(&url, &response)?;
        response.json().await.map_err(|e| TrackError::fetch(&url, e))
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = Request::get(url)
            .send()
            .await
            .map_err(|e| TrackError::fetch(url, e))?;
        ensure_ok(url, &response)?;
        response.binary().await.map_err(|e| TrackError::fetch(url, e))
    }

    async fn create_media(&self, media: &NewMedia) -> Result<MediaRecord> {
        let url = self.media_url();
        let response = Request::post(&url)
            .json(media)
            .map_err(|e| TrackError::fetch(&url, e))?
            .send()
            .await
            .map_err(|e| TrackError::fetch(&url, e))?;
        ensure_ok(&url, &response)?;
        response.json().await.map_err(|e| TrackError::fetch(&url, e))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadTicket {
    upload_url: String,
    file_name: String,
}

/// Object storage through presigned PUT URLs handed out by
/// `GET {api}/upload-url?fileType=..&ext=..`.
#[derive(Debug, Clone)]
pub struct PresignedUploader {
    api_base: String,
    bucket_base: String,
}

impl PresignedUploader {
    pub fn new(api_base: impl Into<String>, bucket_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            bucket_base: bucket_base.into().trim_end_matches('/').to_string(),
        }
    }
}

impl ObjectStore for PresignedUploader {
    async fn upload(&self, file_name: &str, media_type: &str, bytes: &[u8]) -> Result<String> {
        let ext = file_name.rsplit_once('.').map_or("bin", |(_, ext)| ext);
        let url = format!("{}/upload-url", self.api_base);
        let response = Request::get(&url)
            .query([("fileType", media_type), ("ext", ext)])
            .send()
            .await
            .map_err(|e| TrackError::fetch(&url, e))?;
        ensure_ok(&url, &response)?;
        let ticket: UploadTicket = response.json().await.map_err(|e| TrackError::fetch(&url, e))?;

        let put = Request::put(&ticket.upload_url)
            .header("Content-Type", media_type)
            .body(js_sys::Uint8Array::from(bytes))
            .map_err(|e| TrackError::Upload(e.to_string()))?
            .send()
            .await
            .map_err(|e| TrackError::Upload(e.to_string()))?;
        if !put.ok() {
            return Err(TrackError::Upload(format!(
                "storage rejected {file_name} with status {}",
                put.status()
            )));
        }
        Ok(format!("{}/{}", self.bucket_base, ticket.file_name))
    }
}

/// `setInterval` through `gloo-timers`; dropping the interval clears it.
pub struct IntervalScheduler;

impl Scheduler for IntervalScheduler {
    fn every(&self, period: Duration, mut tick: Box<dyn FnMut()>) -> Subscription {
        let millis = u32::try_from(period.as_millis()).unwrap_or(u32::MAX);
        let interval = Interval::new(millis, move || tick());
        Subscription::new(move || drop(interval))
    }
}

/// `timeupdate` events of a `<video>` element.
pub struct VideoElementSource(pub HtmlVideoElement);

impl MediaSource for VideoElementSource {
    fn on_time_update(&self, mut listener: Box<dyn FnMut(f64, f64)>) -> Subscription {
        let video = self.0.clone();
        let closure = {
            let video = video.clone();
            Closure::<dyn FnMut(Event)>::new(move |_: Event| {
                listener(video.current_time(), video.duration())
            })
        };
        let callback = closure.as_ref().unchecked_ref();
        if let Err(e) = video.add_event_listener_with_callback("timeupdate", callback) {
            warn!(error = ?e, "cannot listen for timeupdate");
        }
        Subscription::new(move || {
            let callback = closure.as_ref().unchecked_ref();
            let _ = video.remove_event_listener_with_callback("timeupdate", callback);
        })
    }
}

async fn read_file(file: &File) -> Result<UploadFile> {
    let buffer = JsFuture::from(file.array_buffer())
        .await
        .map_err(|e| TrackError::Upload(format!("cannot read {}: {e:?}", file.name())))?;
    Ok(UploadFile {
        name: file.name(),
        declared_type: file.type_(),
        bytes: js_sys::Uint8Array::new(&buffer).to_vec(),
    })
}

/// One map view: lake selection, playback and uploads.
#[wasm_bindgen]
pub struct LakeTrackSession {
    inner: Rc<RefCell<Session<HttpMediaClient>>>,
    uploader: PresignedUploader,
}

#[wasm_bindgen]
impl LakeTrackSession {
    /// `options` is an `EngineOptions` object or `undefined`; `bucketBase`
    /// is the public URL prefix of uploaded objects.
    #[wasm_bindgen(constructor)]
    pub fn new(
        options: JsValue,
        bucket_base: String,
    ) -> std::result::Result<LakeTrackSession, JsValue> {
        let opts = parse_options(options)?;
        let client = HttpMediaClient::new(opts.api_base.clone());
        let uploader = PresignedUploader::new(opts.api_base.clone(), bucket_base);
        Ok(Self {
            inner: Rc::new(RefCell::new(Session::new(client, opts))),
            uploader,
        })
    }

    /// Select a lake (or `undefined` to clear) and load its track and video.
    /// `onLoaded` runs once the load lands for the lake still selected.
    #[wasm_bindgen(js_name = selectLake)]
    pub fn select_lake(&self, lake_id: Option<i32>, on_loaded: Option<js_sys::Function>) {
        let load = {
            let mut session = self.inner.borrow_mut();
            if !session.select_lake(lake_id.map(LakeId::from)) {
                return;
            }
            session.load_selection()
        };
        let Some(load) = load else {
            return;
        };
        let inner = Rc::clone(&self.inner);
        spawn_local(async move {
            let loaded = load.await;
            let applied = inner.borrow_mut().apply_loaded(loaded);
            if let (true, Some(callback)) = (applied, on_loaded) {
                if let Err(e) = callback.call0(&JsValue::NULL) {
                    warn!(error = ?e, "onLoaded callback threw");
                }
            }
        });
    }

    #[wasm_bindgen(js_name = selectedLake)]
    pub fn selected_lake(&self) -> Option<f64> {
        self.inner.borrow().selected().map(|id| id as f64)
    }

    #[wasm_bindgen(js_name = isRouteLoading)]
    pub fn is_route_loading(&self) -> bool {
        self.inner.borrow().is_route_loading()
    }

    #[wasm_bindgen(js_name = videoUrl)]
    pub fn video_url(&self) -> Option<String> {
        self.inner.borrow().video_url().map(str::to_string)
    }

    #[wasm_bindgen(js_name = bindVideo)]
    pub fn bind_video(&self, video: HtmlVideoElement) {
        self.inner.borrow_mut().bind_video(&VideoElementSource(video));
    }

    #[wasm_bindgen(js_name = unbindVideo)]
    pub fn unbind_video(&self) {
        self.inner.borrow_mut().unbind_video();
    }

    pub fn play(&self) -> bool {
        self.inner.borrow_mut().play(&IntervalScheduler)
    }

    pub fn pause(&self) {
        self.inner.borrow_mut().pause();
    }

    #[wasm_bindgen(js_name = togglePlay)]
    pub fn toggle_play(&self) -> bool {
        self.inner.borrow_mut().toggle_play(&IntervalScheduler)
    }

    #[wasm_bindgen(js_name = isPlaying)]
    pub fn is_playing(&self) -> bool {
        self.inner.borrow().is_playing()
    }

    pub fn scrub(&self, index: usize) {
        self.inner.borrow_mut().scrub(index);
    }

    #[wasm_bindgen(js_name = seekTime)]
    pub fn seek_time(&self, seconds: f64) -> Option<usize> {
        self.inner.borrow_mut().seek_time(seconds)
    }

    pub fn progress(&self) -> f64 {
        self.inner.borrow().progress()
    }

    #[wasm_bindgen(js_name = currentIndex)]
    pub fn current_index(&self) -> usize {
        self.inner.borrow().current_index()
    }

    #[wasm_bindgen(js_name = pointCount)]
    pub fn point_count(&self) -> usize {
        self.inner.borrow().current_track().map_or(0, |track| track.len())
    }

    /// `{lat, lon, heading}` or `null` when there is nothing to show.
    pub fn position(&self) -> std::result::Result<JsValue, JsValue> {
        to_js(&self.inner.borrow().position())
    }

    #[wasm_bindgen(js_name = trailPoints)]
    pub fn trail_points(&self) -> std::result::Result<JsValue, JsValue> {
        to_js(&self.inner.borrow().trail_points())
    }

    #[wasm_bindgen(js_name = routeSummary)]
    pub fn route_summary(&self) -> std::result::Result<JsValue, JsValue> {
        to_js(&self.inner.borrow().route_summary())
    }

    /// GeoJSON FeatureCollection with every overlay for the current state.
    pub fn overlays(&self) -> std::result::Result<JsValue, JsValue> {
        to_js(&self.inner.borrow().overlays())
    }

    #[wasm_bindgen(js_name = playbackLabel)]
    pub fn playback_label(&self) -> String {
        self.inner.borrow().playback_label()
    }

    /// Upload `File`s, record them and show the last GPX among them when no
    /// lake track is on screen. `onDone` receives the number of new tracks.
    pub fn upload(&self, files: js_sys::Array, on_done: Option<js_sys::Function>) {
        let inner = Rc::clone(&self.inner);
        let uploader = self.uploader.clone();
        spawn_local(async move {
            let mut picked = Vec::new();
            for value in files.iter() {
                let Ok(file) = value.dyn_into::<File>() else {
                    warn!("skipping upload entry that is not a File");
                    continue;
                };
                match read_file(&file).await {
                    Ok(upload) => picked.push(upload),
                    Err(e) => warn!(error = %e, "skipping unreadable file"),
                }
            }

            let upload = inner.borrow().upload(uploader, picked);
            let uploaded = upload.await;
            let tracks = inner.borrow_mut().apply_uploads(&uploaded);
            if let Some(callback) = on_done {
                if let Err(e) = callback.call1(&JsValue::NULL, &JsValue::from(tracks as u32)) {
                    warn!(error = ?e, "onDone callback threw");
                }
            }
        });
    }
}

/// Main-thread bookkeeping for a preview Web Worker running
/// `previewWorkerHandle`.
#[wasm_bindgen]
#[derive(Default)]
pub struct PreviewTracker {
    channel: PreviewChannel,
}

#[wasm_bindgen]
impl PreviewTracker {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Id to post to the worker together with the file bytes.
    #[wasm_bindgen(js_name = nextId)]
    pub fn next_id(&mut self) -> f64 {
        self.channel.next_id() as f64
    }

    /// Apply a worker response. Returns true when it replaced the preview.
    pub fn apply(&mut self, response: JsValue) -> bool {
        let applied = match serde_wasm_bindgen::from_value::<PreviewResponse>(response) {
            Ok(response) => self.channel.apply(response),
            Err(e) => {
                warn!(error = %e, "malformed preview response");
                Applied::Malformed
            }
        };
        matches!(applied, Applied::Points(_))
    }

    pub fn points(&self) -> std::result::Result<JsValue, JsValue> {
        to_js(self.channel.points())
    }

    #[wasm_bindgen(js_name = lastError)]
    pub fn last_error(&self) -> Option<String> {
        self.channel.last_error().map(str::to_string)
    }
}
