//! Route file ingestion: JSON arrays or CSV rows → normalized track points.
//!
//! Whatever the source, the route builder receives `{latitude, longitude}` points
//! with incomplete rows already dropped.

use std::path::Path;

use serde::Deserialize;

use crate::route::{Coordinate, TrackPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFormat {
    Json,
    Csv,
}

impl UploadFormat {
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "application/json" => Some(Self::Json),
            "text/csv" | "application/vnd.ms-excel" => Some(Self::Csv),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("unsupported route file type: {0} (use JSON or CSV)")]
    Unsupported(String),

    #[error("malformed JSON track: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed CSV track: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV track has no {0} column")]
    MissingColumn(&'static str),
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(default, alias = "lat")]
    latitude: Option<String>,
    #[serde(default, alias = "lng")]
    longitude: Option<String>,
}

/// Parse an uploaded route file, keeping only points that carry both coordinates.
pub fn parse_track(format: UploadFormat, bytes: &[u8]) -> Result<Vec<TrackPoint>, IngestError> {
    let points = match format {
        UploadFormat::Json => serde_json::from_slice::<Vec<TrackPoint>>(bytes)?,
        UploadFormat::Csv => parse_csv(bytes)?,
    };
    Ok(points.into_iter().filter(TrackPoint::is_complete).collect())
}

fn parse_csv(bytes: &[u8]) -> Result<Vec<TrackPoint>, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(bytes);

    let headers = reader.headers()?.clone();
    let has = |names: &[&str]| headers.iter().any(|h| names.contains(&h));
    if !has(&["latitude", "lat"]) {
        return Err(IngestError::MissingColumn("latitude"));
    }
    if !has(&["longitude", "lng"]) {
        return Err(IngestError::MissingColumn("longitude"));
    }

    let mut points = Vec::new();
    for row in reader.deserialize::<CsvRow>() {
        let row = row?;
        points.push(TrackPoint {
            latitude: row.latitude.map(Coordinate::Text),
            longitude: row.longitude.map(Coordinate::Text),
        });
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::normalize_track;
    use fleet_types::LatLng;

    #[test]
    fn detects_format_from_mime_and_extension() {
        assert_eq!(UploadFormat::from_mime("application/json"), Some(UploadFormat::Json));
        assert_eq!(
            UploadFormat::from_mime("text/csv; charset=utf-8"),
            Some(UploadFormat::Csv)
        );
        assert_eq!(
            UploadFormat::from_mime("application/vnd.ms-excel"),
            Some(UploadFormat::Csv)
        );
        assert_eq!(UploadFormat::from_mime("image/png"), None);

        assert_eq!(UploadFormat::from_path(Path::new("route.JSON")), Some(UploadFormat::Json));
        assert_eq!(UploadFormat::from_path(Path::new("a/b/route.csv")), Some(UploadFormat::Csv));
        assert_eq!(UploadFormat::from_path(Path::new("route.gpx")), None);
        assert_eq!(UploadFormat::from_path(Path::new("route")), None);
    }

    #[test]
    fn json_track_normalizes_field_names() {
        let raw = br#"[
            {"lat": 13.0, "lng": 80.0},
            {"latitude": "13.1", "longitude": 80.1},
            {"latitude": 13.2},
            {"lng": 80.3}
        ]"#;
        let points = parse_track(UploadFormat::Json, raw).unwrap();
        assert_eq!(points.len(), 2);

        let path = normalize_track(&points).unwrap();
        assert_eq!(path, vec![LatLng::new(13.0, 80.0), LatLng::new(13.1, 80.1)]);
    }

    #[test]
    fn csv_track_drops_rows_missing_a_coordinate() {
        let raw = b"id, latitude, longitude, note\n\
                    1, 13.0, 80.0, start\n\
                    2, , 80.1, gap\n\
                    3, 13.2, 80.2, end\n";
        let points = parse_track(UploadFormat::Csv, raw).unwrap();
        let path = normalize_track(&points).unwrap();
        assert_eq!(path, vec![LatLng::new(13.0, 80.0), LatLng::new(13.2, 80.2)]);
    }

    #[test]
    fn csv_non_numeric_cell_surfaces_as_validation_error() {
        let raw = b"latitude,longitude\n13.0,80.0\nabc,80.1\n";
        let points = parse_track(UploadFormat::Csv, raw).unwrap();
        assert!(normalize_track(&points).is_err());
    }

    #[test]
    fn csv_without_coordinate_columns_is_rejected() {
        let raw = b"x,y\n1,2\n";
        let err = parse_track(UploadFormat::Csv, raw).unwrap_err();
        assert!(matches!(err, IngestError::MissingColumn("latitude")));
    }

    #[test]
    fn malformed_json_is_rejected() {
        let err = parse_track(UploadFormat::Json, b"{not json").unwrap_err();
        assert!(matches!(err, IngestError::Json(_)));
    }
}
