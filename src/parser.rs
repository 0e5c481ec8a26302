use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

use crate::error::{Result, TrackError};
use crate::gpx_types::{PreviewPoint, RawTrackPoint};

/// Parse every `<trkpt>` of the first track into raw points, in document order.
///
/// All `<trkseg>`s of that track are concatenated. Points whose `lat`/`lon`
/// are missing or not finite numbers are skipped. Fails with
/// [`TrackError::NoTrackPoints`] when the document has no `<trkpt>` at all.
pub fn parse_track_points(gpx: &[u8]) -> Result<Vec<RawTrackPoint>> {
    scan_first_track(gpx, |_| true)
}

/// Preview profile: keep only every `stride`-th `<trkpt>` and drop time.
///
/// The stride counts `<trkpt>` elements, including ones later skipped for
/// bad coordinates, so the sampling grid does not shift around bad points.
/// Intended for quick map previews only; playback must use
/// [`parse_track_points`].
pub fn parse_preview_points(gpx: &[u8], stride: usize) -> Result<Vec<PreviewPoint>> {
    let stride = stride.max(1);
    let points = scan_first_track(gpx, |index| index % stride == 0)?;
    Ok(points
        .into_iter()
        .map(|pt| PreviewPoint {
            lat: pt.lat,
            lon: pt.lon,
            ele: pt.ele,
        })
        .collect())
}

/// Accumulates the points of one track; `keep` decides by `<trkpt>` index.
struct TrackScan<F> {
    keep: F,
    seen: usize,
    points: Vec<RawTrackPoint>,
}

impl<F: FnMut(usize) -> bool> TrackScan<F> {
    fn visit<'a>(&mut self, start: &BytesStart<'a>, reader: &mut Reader<&'a [u8]>) -> Result<()> {
        let index = self.next_index();
        if !(self.keep)(index) {
            reader.read_to_end(start.name())?;
            return Ok(());
        }
        match parse_point(start, reader)? {
            Some(pt) => self.points.push(pt),
            None => debug!(index, "skipping track point without finite lat/lon"),
        }
        Ok(())
    }

    fn visit_empty(&mut self, start: &BytesStart<'_>) -> Result<()> {
        let index = self.next_index();
        if !(self.keep)(index) {
            return Ok(());
        }
        match parse_lat_lon(start)? {
            Some((lat, lon)) => self.points.push(RawTrackPoint::new(lat, lon)),
            None => debug!(index, "skipping track point without finite lat/lon"),
        }
        Ok(())
    }

    fn next_index(&mut self) -> usize {
        let index = self.seen;
        self.seen += 1;
        index
    }
}

fn scan_first_track<F: FnMut(usize) -> bool>(gpx: &[u8], keep: F) -> Result<Vec<RawTrackPoint>> {
    let mut reader = Reader::from_reader(gpx);
    let mut scan = TrackScan {
        keep,
        seen: 0,
        points: Vec::new(),
    };

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"trk" => {
                if scan.seen > 0 {
                    // Only the first track with points is played back.
                    reader.read_to_end(e.name())?;
                } else {
                    parse_track(&mut reader, &mut scan)?;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(TrackError::Xml(e)),
            _ => {}
        }
    }

    if scan.seen == 0 {
        return Err(TrackError::NoTrackPoints);
    }
    Ok(scan.points)
}

/// Parse a `<trk>` element after its start tag.
fn parse_track<'a, F: FnMut(usize) -> bool>(
    reader: &mut Reader<&'a [u8]>,
    scan: &mut TrackScan<F>,
) -> Result<()> {
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"trkseg" => parse_segment(reader, scan)?,
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Ok(Event::End(e)) if e.local_name().as_ref() == b"trk" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(TrackError::Xml(e)),
            _ => {}
        }
    }
    Ok(())
}

/// Parse a `<trkseg>` element after its start tag.
fn parse_segment<'a, F: FnMut(usize) -> bool>(
    reader: &mut Reader<&'a [u8]>,
    scan: &mut TrackScan<F>,
) -> Result<()> {
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"trkpt" => scan.visit(&e, reader)?,
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"trkpt" {
                    scan.visit_empty(&e)?;
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"trkseg" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(TrackError::Xml(e)),
            _ => {}
        }
    }
    Ok(())
}

/// Read `lat`/`lon` from a point's start tag. `None` when either is missing
/// or is not a finite number.
fn parse_lat_lon(e: &BytesStart<'_>) -> Result<Option<(f64, f64)>> {
    let mut lat: Option<f64> = None;
    let mut lon: Option<f64> = None;

    for attr_result in e.attributes() {
        let attr = attr_result?;
        let val = std::str::from_utf8(&attr.value).unwrap_or_default();
        match attr.key.local_name().as_ref() {
            b"lat" => lat = parse_finite(val),
            b"lon" => lon = parse_finite(val),
            _ => {}
        }
    }

    Ok(lat.zip(lon))
}

fn parse_finite(val: &str) -> Option<f64> {
    val.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a `<trkpt>` and its children. Called after its start tag.
fn parse_point<'a>(
    start: &BytesStart<'a>,
    reader: &mut Reader<&'a [u8]>,
) -> Result<Option<RawTrackPoint>> {
    let Some((lat, lon)) = parse_lat_lon(start)? else {
        reader.read_to_end(start.name())?;
        return Ok(None);
    };

    let mut point = RawTrackPoint::new(lat, lon);
    let end_name = start.name().0.to_vec();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"ele" => point.ele = parse_finite(&read_text_owned(reader, &e)?),
                b"time" => point.time = parse_time(&read_text_owned(reader, &e)?),
                _ => {
                    // name, extensions, GPX 1.0 speed/course, ...
                    reader.read_to_end(e.name())?;
                }
            },
            Ok(Event::End(e)) if e.name().0 == end_name.as_slice() => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(TrackError::Xml(e)),
            _ => {}
        }
    }

    Ok(Some(point))
}

/// RFC 3339 timestamps; zone-less timestamps are taken as UTC.
fn parse_time(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Some(t.with_timezone(&Utc));
    }
    match NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(naive) => Some(naive.and_utc()),
        Err(_) => {
            debug!(time = text, "unparseable track point time");
            None
        }
    }
}

/// Read the text content of an element as an owned String.
fn read_text_owned<'a>(reader: &mut Reader<&'a [u8]>, start: &BytesStart<'_>) -> Result<String> {
    let end_name = start.name().0.to_vec();
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Text(e)) => {
                text.push_str(std::str::from_utf8(e.as_ref()).unwrap_or_default());
            }
            Ok(Event::CData(e)) => {
                text.push_str(std::str::from_utf8(e.as_ref()).unwrap_or_default());
            }
            Ok(Event::End(e)) if e.name().0 == end_name.as_slice() => break,
            Ok(Event::Start(e)) => {
                reader.read_to_end(e.name())?;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(TrackError::Xml(e)),
            _ => {}
        }
    }

    Ok(text)
}
