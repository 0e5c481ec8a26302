use serde::Deserialize;

use crate::error::{Result, TrackError};

/// Tunables for parsing, playback and map overlays.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineOptions {
    /// Keep every n-th `<trkpt>` in the preview profile (default: 10)
    #[serde(default = "default_preview_stride")]
    pub preview_stride: usize,

    /// Manual playback tick period in milliseconds (default: 100)
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u32,

    /// Constant speed used for the estimated traversal time (default: 3 mph)
    #[serde(default = "default_reference_speed_mph")]
    pub reference_speed_mph: f64,

    /// Number of points behind the marker kept in the trail (default: 10)
    #[serde(default = "default_trail_span")]
    pub trail_span: usize,

    /// Speed mapped to pure blue in segment colouring (default: 0 mph)
    #[serde(default)]
    pub speed_color_min: f64,

    /// Speed mapped to pure red in segment colouring (default: 5 mph)
    #[serde(default = "default_speed_color_max")]
    pub speed_color_max: f64,

    /// Emit a direction arrow every n-th point (default: 15)
    #[serde(default = "default_arrow_every")]
    pub arrow_every: usize,

    /// MIME type of GPX media records (default: "application/gpx+xml")
    #[serde(default = "default_gpx_media_type")]
    pub gpx_media_type: String,

    /// MIME type of companion video records (default: "video/mp4")
    #[serde(default = "default_video_media_type")]
    pub video_media_type: String,

    /// Prefix of the lakes/media REST API (default: "/api")
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            preview_stride: default_preview_stride(),
            tick_interval_ms: default_tick_interval_ms(),
            reference_speed_mph: default_reference_speed_mph(),
            trail_span: default_trail_span(),
            speed_color_min: 0.0,
            speed_color_max: default_speed_color_max(),
            arrow_every: default_arrow_every(),
            gpx_media_type: default_gpx_media_type(),
            video_media_type: default_video_media_type(),
            api_base: default_api_base(),
        }
    }
}

impl EngineOptions {
    pub fn validate(self) -> Result<Self> {
        if self.preview_stride == 0 {
            return Err(TrackError::InvalidOptions("previewStride must be > 0".into()));
        }
        if self.tick_interval_ms == 0 {
            return Err(TrackError::InvalidOptions("tickIntervalMs must be > 0".into()));
        }
        if self.arrow_every == 0 {
            return Err(TrackError::InvalidOptions("arrowEvery must be > 0".into()));
        }
        if !(self.reference_speed_mph > 0.0) {
            return Err(TrackError::InvalidOptions(
                "referenceSpeedMph must be positive".into(),
            ));
        }
        if !(self.speed_color_max > self.speed_color_min) {
            return Err(TrackError::InvalidOptions(
                "speedColorMax must exceed speedColorMin".into(),
            ));
        }
        Ok(self)
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(u64::from(self.tick_interval_ms))
    }
}

fn default_preview_stride() -> usize {
    10
}

fn default_tick_interval_ms() -> u32 {
    100
}

fn default_reference_speed_mph() -> f64 {
    3.0
}

fn default_trail_span() -> usize {
    10
}

fn default_speed_color_max() -> f64 {
    5.0
}

fn default_arrow_every() -> usize {
    15
}

fn default_gpx_media_type() -> String {
    "application/gpx+xml".to_string()
}

fn default_video_media_type() -> String {
    "video/mp4".to_string()
}

fn default_api_base() -> String {
    "/api".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_options_fill_defaults() {
        let opts: EngineOptions =
            serde_json::from_str(r#"{"previewStride": 5, "apiBase": "https://lakes.example"}"#)
                .unwrap();
        assert_eq!(opts.preview_stride, 5);
        assert_eq!(opts.api_base, "https://lakes.example");
        assert_eq!(opts.tick_interval_ms, 100);
        assert_eq!(opts.gpx_media_type, "application/gpx+xml");
        assert!((opts.speed_color_max - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_object_equals_default() {
        let opts: EngineOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(opts, EngineOptions::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_stride = EngineOptions {
            preview_stride: 0,
            ..Default::default()
        };
        assert!(matches!(
            zero_stride.validate(),
            Err(TrackError::InvalidOptions(_))
        ));

        let inverted_colors = EngineOptions {
            speed_color_min: 5.0,
            speed_color_max: 1.0,
            ..Default::default()
        };
        assert!(inverted_colors.validate().is_err());

        let nan_speed = EngineOptions {
            reference_speed_mph: f64::NAN,
            ..Default::default()
        };
        assert!(nan_speed.validate().is_err());
    }

    #[test]
    fn test_tick_interval() {
        assert_eq!(
            EngineOptions::default().tick_interval(),
            std::time::Duration::from_millis(100)
        );
    }
}
