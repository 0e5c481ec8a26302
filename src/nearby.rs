use serde::{Deserialize, Serialize};

use crate::geodesy::haversine_mi;
use crate::gpx_types::{GeoPoint, LakeId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lake {
    pub id: LakeId,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint for Lake {
    fn lat(&self) -> f64 {
        self.latitude
    }

    fn lon(&self) -> f64 {
        self.longitude
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LakeListing {
    pub lake: Lake,
    pub distance_mi: Option<f64>,
    pub distance_label: Option<String>,
    pub within_radius: bool,
}

/// Order lakes for the sidebar.
///
/// With a known user location the lakes are sorted nearest first and
/// flagged against `radius_mi`. Without one, every lake is listed as-is.
pub fn rank_lakes(lakes: &[Lake], origin: Option<(f64, f64)>, radius_mi: f64) -> Vec<LakeListing> {
    let usable = lakes
        .iter()
        .filter(|lake| lake.latitude.is_finite() && lake.longitude.is_finite());

    let Some(origin) = origin else {
        return usable
            .map(|lake| LakeListing {
                lake: lake.clone(),
                distance_mi: None,
                distance_label: None,
                within_radius: true,
            })
            .collect();
    };

    let mut listings: Vec<LakeListing> = usable
        .map(|lake| {
            let miles = haversine_mi(&origin, lake);
            LakeListing {
                lake: lake.clone(),
                distance_mi: Some(miles),
                distance_label: Some(format!("{miles:.1} mi")),
                within_radius: miles <= radius_mi,
            }
        })
        .collect();
    listings.sort_by(|a, b| {
        a.distance_mi
            .partial_cmp(&b.distance_mi)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    listings
}
