//! The state of one map view: which lake is selected, which track is shown,
//! where playback is, and which driver is attached to the clock.
//!
//! All engine functions stay pure; the session only owns the state they are
//! called with.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use geojson::FeatureCollection;
use tracing::{debug, info};

use crate::converter::to_overlay_collection;
use crate::gpx_types::{EnrichedTrackPoint, LakeId, Position, Track};
use crate::interpolate::{closest_index_for_time, interpolate, trail};
use crate::metrics::{self, RouteSummary};
use crate::options::EngineOptions;
use crate::playback::{MediaSource, PlaybackClock, Scheduler, Subscription, bind_media, start_timer};
use crate::store::{MediaClient, ObjectStore, TrackStore, UploadFile, UploadedMedia, upload_all};

/// Outcome of loading a selection, to be handed back to
/// [`Session::apply_loaded`].
#[derive(Debug, Clone)]
pub struct LoadedSelection {
    pub lake_id: LakeId,
    pub track: Option<Track>,
    pub video_url: Option<String>,
}

pub struct Session<C> {
    options: EngineOptions,
    store: TrackStore<C>,
    clock: Rc<RefCell<PlaybackClock>>,
    selected: Option<LakeId>,
    fallback: Option<Track>,
    video_url: Option<String>,
    video_binding: Option<Subscription>,
    timer: Option<Subscription>,
}

impl<C: MediaClient + 'static> Session<C> {
    pub fn new(client: C, options: EngineOptions) -> Self {
        let store = TrackStore::new(client, &options);
        Self {
            options,
            store,
            clock: Rc::new(RefCell::new(PlaybackClock::new(0))),
            selected: None,
            fallback: None,
            video_url: None,
            video_binding: None,
            timer: None,
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn store(&self) -> &TrackStore<C> {
        &self.store
    }

    pub fn selected(&self) -> Option<LakeId> {
        self.selected
    }

    pub fn video_url(&self) -> Option<&str> {
        self.video_url.as_deref()
    }

    /// Change the selected lake. Stops any driver, rewinds playback and
    /// shows whatever is already cached for the new lake. Returns false
    /// when the selection did not change. Nothing is fetched until
    /// [`Session::load_selection`] is called.
    pub fn select_lake(&mut self, lake_id: Option<LakeId>) -> bool {
        if lake_id == self.selected {
            return false;
        }
        debug!(?lake_id, previous = ?self.selected, "lake selected");
        self.detach_drivers();
        self.selected = lake_id;
        self.video_url = lake_id.and_then(|id| self.store.cached_video(id));
        self.clock.borrow_mut().reset(self.point_count());
        true
    }

    /// Start fetching the selected lake's track and companion video
    /// together. `None` when nothing is selected.
    pub fn load_selection(&self) -> Option<impl Future<Output = LoadedSelection> + 'static> {
        let lake_id = self.selected?;
        let track = self.store.get_or_load(lake_id);
        let video = self.store.video_url(lake_id);
        Some(async move {
            let (track, video_url) = futures::join!(track, video);
            LoadedSelection {
                lake_id,
                track,
                video_url,
            }
        })
    }

    /// Show a finished load if it is for the lake still selected. A load for
    /// a lake that has since been deselected stays in the store only.
    pub fn apply_loaded(&mut self, loaded: LoadedSelection) -> bool {
        if self.selected != Some(loaded.lake_id) {
            debug!(lake_id = loaded.lake_id, "ignoring load for deselected lake");
            return false;
        }
        self.video_url = loaded.video_url;
        let count = self.point_count();
        self.clock.borrow_mut().set_point_count(count);
        true
    }

    /// The selected lake's track if loaded, else the last uploaded track.
    pub fn current_track(&self) -> Option<Track> {
        self.selected
            .and_then(|id| self.store.cached(id))
            .or_else(|| self.fallback.clone())
    }

    pub fn is_route_loading(&self) -> bool {
        self.selected.is_some_and(|id| self.store.is_loading(id))
    }

    pub fn progress(&self) -> f64 {
        self.clock.borrow().progress()
    }

    pub fn current_index(&self) -> usize {
        self.clock.borrow().current_index()
    }

    pub fn is_playing(&self) -> bool {
        self.clock.borrow().is_playing()
    }

    pub fn position(&self) -> Option<Position> {
        let track = self.current_track()?;
        interpolate(&track, self.progress())
    }

    pub fn trail_points(&self) -> Vec<EnrichedTrackPoint> {
        self.current_track()
            .map(|track| trail(&track, self.progress(), self.options.trail_span).to_vec())
            .unwrap_or_default()
    }

    pub fn route_summary(&self) -> RouteSummary {
        let track = self.current_track();
        RouteSummary::of(track.as_deref().unwrap_or_default(), self.options.reference_speed_mph)
    }

    pub fn overlays(&self) -> FeatureCollection {
        let track = self.current_track();
        to_overlay_collection(
            track.as_deref().unwrap_or_default(),
            Some(self.progress()),
            &self.options,
        )
    }

    pub fn playback_label(&self) -> String {
        let track = self.current_track();
        metrics::playback_label(track.as_deref().unwrap_or_default(), self.current_index())
    }

    /// Let a video drive playback. Replaces the timer and any earlier video.
    pub fn bind_video<M: MediaSource + ?Sized>(&mut self, source: &M) {
        self.timer = None;
        self.clock.borrow_mut().pause();
        self.video_binding = Some(bind_media(&self.clock, source));
    }

    pub fn unbind_video(&mut self) {
        self.video_binding = None;
    }

    /// Start the timer driver. Does nothing while a video is bound or when
    /// already at the last point.
    pub fn play<S: Scheduler + ?Sized>(&mut self, scheduler: &S) -> bool {
        if self.video_binding.is_some() {
            return false;
        }
        self.clock.borrow_mut().play();
        if !self.is_playing() {
            return false;
        }
        self.timer = Some(start_timer(&self.clock, scheduler, self.options.tick_interval()));
        true
    }

    pub fn pause(&mut self) {
        self.clock.borrow_mut().pause();
        self.timer = None;
    }

    pub fn toggle_play<S: Scheduler + ?Sized>(&mut self, scheduler: &S) -> bool {
        if self.is_playing() {
            self.pause();
            false
        } else {
            self.play(scheduler)
        }
    }

    pub fn scrub(&mut self, index: usize) {
        self.clock.borrow_mut().seek_index(index);
    }

    /// Move to the point recorded closest to `seconds` into the track.
    pub fn seek_time(&mut self, seconds: f64) -> Option<usize> {
        let track = self.current_track()?;
        let index = closest_index_for_time(&track, seconds)?;
        self.scrub(index);
        Some(index)
    }

    /// Upload files with this session's media client. The future does not
    /// borrow the session; pass its output to [`Session::apply_uploads`].
    pub fn upload<S>(
        &self,
        storage: S,
        files: Vec<UploadFile>,
    ) -> impl Future<Output = Vec<UploadedMedia>> + 'static
    where
        S: ObjectStore + 'static,
    {
        let store = self.store.clone();
        async move { upload_all(store.client(), &storage, &files).await }
    }

    /// Publish the last uploaded GPX track as the fallback track. Returns
    /// the number of uploaded tracks.
    pub fn apply_uploads(&mut self, uploaded: &[UploadedMedia]) -> usize {
        let tracks: Vec<&Track> = uploaded.iter().filter_map(|m| m.track.as_ref()).collect();
        let Some(&last) = tracks.last() else {
            return 0;
        };
        info!(points = last.len(), "uploaded track is the new fallback");
        let showing_fallback = self.selected.and_then(|id| self.store.cached(id)).is_none();
        self.fallback = Some(Rc::clone(last));
        if showing_fallback {
            self.detach_timer();
            self.clock.borrow_mut().reset(last.len());
        }
        tracks.len()
    }

    fn point_count(&self) -> usize {
        self.current_track().map_or(0, |track| track.len())
    }

    fn detach_timer(&mut self) {
        self.timer = None;
    }

    fn detach_drivers(&mut self) {
        self.detach_timer();
        self.video_binding = None;
    }
}
