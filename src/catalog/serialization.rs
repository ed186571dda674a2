use crate::catalog::{AerialDescriptor, CatalogError, RoomCatalog, RoomDescriptor};
use std::path::Path;

pub type Result<T> = std::result::Result<T, CatalogError>;

/// On-disk layout. Deserialized raw, then validated into a [`RoomCatalog`].
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct CatalogFile {
    #[serde(default)]
    rooms: Vec<RoomDescriptor>,
    aerial: AerialDescriptor,
}

pub fn save_catalog_to_file(catalog: &RoomCatalog, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(catalog)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn load_catalog_from_file(path: &Path) -> Result<RoomCatalog> {
    let json = std::fs::read_to_string(path)?;
    parse_catalog(&json)
}

pub fn parse_catalog(json: &str) -> Result<RoomCatalog> {
    let file: CatalogFile = serde_json::from_str(json)?;
    RoomCatalog::new(file.rooms, file.aerial)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{load_catalog, Floor, Rgb};

    fn temp_path(tag: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        let nonce = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        path.push(format!(
            "dollhouse_catalog_{}_{}_{}.json",
            tag,
            std::process::id(),
            nonce
        ));
        path
    }

    #[test]
    fn builtin_catalog_survives_file_reload() {
        let catalog = load_catalog().unwrap();
        let path = temp_path("reload");
        save_catalog_to_file(&catalog, &path).unwrap();
        let loaded = load_catalog_from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded, catalog);
    }

    #[test]
    fn colour_defaults_when_absent() {
        let json = r#"{
            "rooms": [
                {
                    "id": "den",
                    "name": "Den",
                    "floor": 1,
                    "footprint": { "x": 0.0, "z": 0.0, "width": 2.0, "depth": 2.0 },
                    "photos": ["den.jpg"]
                }
            ],
            "aerial": { "id": "aerial", "name": "Site", "photos": ["site.jpg"] }
        }"#;
        let catalog = parse_catalog(json).unwrap();
        let den = catalog.room("den").unwrap();
        assert_eq!(den.color, Rgb::DEFAULT_ROOM);
        assert_eq!(den.floor, Floor::GROUND);
    }

    #[test]
    fn invalid_file_contents_fail_validation() {
        let json = r#"{
            "rooms": [
                { "id": "a", "name": "A", "floor": 1,
                  "footprint": { "x": 0.0, "z": 0.0, "width": 1.0, "depth": 1.0 },
                  "photos": [] }
            ],
            "aerial": { "id": "aerial", "name": "Site", "photos": ["site.jpg"] }
        }"#;
        assert!(matches!(parse_catalog(json), Err(CatalogError::EmptyPhotos(_))));

        let bad_colour = json.replace(
            "\"photos\": []",
            "\"color\": \"teal\", \"photos\": [\"a.jpg\"]",
        );
        assert!(matches!(parse_catalog(&bad_colour), Err(CatalogError::Json(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let path = temp_path("missing");
        assert!(matches!(
            load_catalog_from_file(&path),
            Err(CatalogError::Io(_))
        ));
    }
}
