use mdtiler_server::core::dataset::CoordValue;
use mdtiler_server::{DatasetOpener, FileSystemOpener, TilerError};
use std::path::Path;
use tempfile::tempdir;

/// Write a consolidated metadata fixture and return its location
fn write_dataset(dir: &Path) -> String {
    let doc = serde_json::json!({
        "attributes": {"title": "test dataset"},
        "dimensions": {
            "time": {"values": [0, 1, 2], "units": "days since 2020-01-01"},
            "lat": {"values": [-45.0, 0.0, 45.0]},
            "lon": {"values": [0.0, 90.0, 180.0, 270.0]}
        },
        "variables": {
            "temperature": {
                "dtype": "float32",
                "dimensions": ["time", "lat", "lon"],
                "attributes": {"units": "K"},
                "chunks": [
                    {"path": "temperature/0.0.0", "index": [0, 0, 0]},
                    {"path": "temperature/1.0.0", "index": [1, 0, 0]},
                    {"path": "temperature/2.0.0", "index": [2, 0, 0]}
                ]
            },
            "precipitation": {
                "dimensions": ["lat", "lon"],
                "chunks": []
            }
        },
        "groups": {
            "surface": {
                "dimensions": {"x": {"values": [1.0, 2.0]}},
                "variables": {"elevation": {"dimensions": ["x"], "chunks": []}}
            }
        }
    });
    std::fs::write(dir.join("dataset.json"), doc.to_string()).unwrap();
    dir.to_string_lossy().to_string()
}

#[test]
fn test_open_lists_variables() {
    let dir = tempdir().unwrap();
    let location = write_dataset(dir.path());

    let handle = FileSystemOpener::new().open(&location, None, false).unwrap();
    assert_eq!(
        handle.list_variables(),
        vec!["precipitation".to_string(), "temperature".to_string()]
    );

    let array = handle.get_variable("temperature").unwrap();
    assert_eq!(array.dtype, "float32");
    assert_eq!(array.dims.len(), 3);
    assert_eq!(array.chunks.len(), 3);
    assert_eq!(array.attrs.get("units"), Some(&"K".to_string()));
}

#[test]
fn test_time_coordinates_left_raw_without_decoding() {
    let dir = tempdir().unwrap();
    let location = write_dataset(dir.path());

    let handle = FileSystemOpener::new().open(&location, None, false).unwrap();
    let time = handle
        .get_variable("temperature")
        .unwrap()
        .dimension("time")
        .unwrap()
        .clone();

    assert_eq!(time.values[0], CoordValue::Number(0.0));
}

#[test]
fn test_time_coordinates_decoded_on_request() {
    let dir = tempdir().unwrap();
    let location = write_dataset(dir.path());

    let handle = FileSystemOpener::new().open(&location, None, true).unwrap();
    let time = handle
        .get_variable("temperature")
        .unwrap()
        .dimension("time")
        .unwrap()
        .clone();

    assert_eq!(
        time.values[0],
        CoordValue::Time("2020-01-01T00:00:00".to_string())
    );
    assert_eq!(
        time.values[2],
        CoordValue::Time("2020-01-03T00:00:00".to_string())
    );
}

#[test]
fn test_group_selection() {
    let dir = tempdir().unwrap();
    let location = write_dataset(dir.path());

    let handle = FileSystemOpener::new()
        .open(&location, Some("surface"), false)
        .unwrap();
    assert_eq!(handle.list_variables(), vec!["elevation".to_string()]);
    assert_eq!(handle.group.as_deref(), Some("surface"));
}

#[test]
fn test_unknown_group_fails() {
    let dir = tempdir().unwrap();
    let location = write_dataset(dir.path());

    let err = FileSystemOpener::new().open(&location, Some("subsurface"), false);
    assert!(matches!(err, Err(TilerError::SourceOpenFailed(_))));
}

#[test]
fn test_missing_location_fails() {
    let err = FileSystemOpener::new().open("/nonexistent/data.zarr", None, false);
    assert!(matches!(err, Err(TilerError::SourceOpenFailed(_))));
}

#[test]
fn test_malformed_metadata_fails() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("dataset.json"), b"{broken").unwrap();

    let err = FileSystemOpener::new().open(&dir.path().to_string_lossy(), None, false);
    assert!(matches!(err, Err(TilerError::SourceOpenFailed(_))));
}
