use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

const CHINA_LATITUDE: RangeInclusive<f64> = 18.0..=54.0;
const CHINA_LONGITUDE: RangeInclusive<f64> = 73.0..=135.0;

/// Coarse bounding box, not a border test. NaN is never inside.
pub fn is_in_china(latitude: f64, longitude: f64) -> bool {
    CHINA_LATITUDE.contains(&latitude) && CHINA_LONGITUDE.contains(&longitude)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapProvider {
    Amap,
    Mapbox,
}

impl MapProvider {
    pub fn for_point(latitude: f64, longitude: f64) -> Self {
        if is_in_china(latitude, longitude) {
            MapProvider::Amap
        } else {
            MapProvider::Mapbox
        }
    }

    /// AMap only when every marker is domestic. No markers defaults to AMap.
    pub fn for_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        if points
            .into_iter()
            .all(|(latitude, longitude)| is_in_china(latitude, longitude))
        {
            MapProvider::Amap
        } else {
            MapProvider::Mapbox
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_point() {
        assert_eq!(MapProvider::for_point(30.66, 104.06), MapProvider::Amap);
        assert_eq!(MapProvider::for_point(18.0, 135.0), MapProvider::Amap);
        assert_eq!(MapProvider::for_point(48.85, 2.35), MapProvider::Mapbox);
        assert_eq!(MapProvider::for_point(35.68, 139.69), MapProvider::Mapbox);
        assert_eq!(MapProvider::for_point(f64::NAN, 104.0), MapProvider::Mapbox);
    }

    #[test]
    fn test_for_points() {
        assert_eq!(MapProvider::for_points(Vec::new()), MapProvider::Amap);
        assert_eq!(
            MapProvider::for_points(vec![(30.6, 104.0), (39.9, 116.4)]),
            MapProvider::Amap
        );
        assert_eq!(
            MapProvider::for_points(vec![(30.6, 104.0), (37.56, 126.97)]),
            MapProvider::Mapbox
        );
    }
}
