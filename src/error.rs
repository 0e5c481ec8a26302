use thiserror::Error;
use wasm_bindgen::JsValue;

use crate::gpx_types::LakeId;

pub type Result<T> = std::result::Result<T, TrackError>;

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("no track points found")]
    NoTrackPoints,
    #[error("request to {url} failed: {reason}")]
    Fetch { url: String, reason: String },
    #[error("request to {url} returned status {status}")]
    HttpStatus { url: String, status: u16 },
    #[error("no {media_type} media found for lake {lake_id}")]
    NoMedia { lake_id: LakeId, media_type: String },
    #[error("upload failed: {0}")]
    Upload(String),
    #[error("invalid options: {0}")]
    InvalidOptions(String),
}

impl TrackError {
    pub(crate) fn fetch(url: &str, reason: impl ToString) -> Self {
        Self::Fetch {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Parse failures as opposed to transport failures.
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Self::Xml(_) | Self::NoTrackPoints)
    }
}

impl From<quick_xml::events::attributes::AttrError> for TrackError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        Self::Xml(e.into())
    }
}

impl From<TrackError> for JsValue {
    fn from(e: TrackError) -> Self {
        JsValue::from_str(&e.to_string())
    }
}
