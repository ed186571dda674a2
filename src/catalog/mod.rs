//! Room catalog: the static, validated description of every room in the
//! property plus the aerial "site overview" photo set.
//!
//! A [`RoomCatalog`] can only be obtained through validation, so everything
//! downstream (scene builder, controller, modal) may rely on unique ids and
//! non-empty photo lists.

pub mod serialization;

use glam::Vec2;
use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;

const PHOTO_ROOT: &str = "property-tour";

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("duplicate room id '{0}'")]
    DuplicateId(String),
    #[error("room at index {index} has an empty id")]
    EmptyId { index: usize },
    #[error("room '{0}' has no photos")]
    EmptyPhotos(String),
    #[error("room '{id}' has an invalid footprint ({width} x {depth})")]
    InvalidFootprint { id: String, width: f32, depth: f32 },
    #[error("room '{0}' is on floor 0; floors start at 1")]
    InvalidFloor(String),
    #[error("site view '{0}' has no photos")]
    EmptyAerialPhotos(String),
    #[error("invalid colour '{0}', expected #rrggbb")]
    InvalidColor(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Stable room key. Used as a lookup key only; never owns scene data.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for RoomId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Building level, 1 = ground floor.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct Floor(pub u8);

impl Floor {
    pub const GROUND: Floor = Floor(1);
    pub const UPPER: Floor = Floor(2);

    /// Zero-based stacking index used for vertical offsets.
    pub fn index(self) -> f32 {
        f32::from(self.0.saturating_sub(1))
    }
}

impl fmt::Display for Floor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Floor {}", self.0)
    }
}

/// Axis-aligned footprint on the ground plane. `(x, z)` is the minimum corner.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Footprint {
    pub x: f32,
    pub z: f32,
    pub width: f32,
    pub depth: f32,
}

impl Footprint {
    pub fn new(x: f32, z: f32, width: f32, depth: f32) -> Self {
        Self { x, z, width, depth }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.width * 0.5, self.z + self.depth * 0.5)
    }

    pub fn min(&self) -> Vec2 {
        Vec2::new(self.x, self.z)
    }

    pub fn max(&self) -> Vec2 {
        Vec2::new(self.x + self.width, self.z + self.depth)
    }

    fn is_valid(&self) -> bool {
        [self.x, self.z, self.width, self.depth]
            .iter()
            .all(|value| value.is_finite())
            && self.width > 0.0
            && self.depth > 0.0
    }
}

/// sRGB tint, serialized as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    pub const DEFAULT_ROOM: Rgb = Rgb([0x4a, 0x55, 0x68]);

    pub fn from_hex(value: &str) -> Result<Self, CatalogError> {
        let digits = value.strip_prefix('#').unwrap_or(value);
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(CatalogError::InvalidColor(value.to_string()));
        }
        let mut rgb = [0u8; 3];
        for (index, channel) in rgb.iter_mut().enumerate() {
            *channel = u8::from_str_radix(&digits[index * 2..index * 2 + 2], 16)
                .map_err(|_| CatalogError::InvalidColor(value.to_string()))?;
        }
        Ok(Self(rgb))
    }

    /// Linear-space RGBA for the GPU.
    pub fn to_linear_rgba(self, alpha: f32) -> [f32; 4] {
        let [r, g, b] = self.0;
        [
            srgb_to_linear(r),
            srgb_to_linear(g),
            srgb_to_linear(b),
            alpha,
        ]
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::DEFAULT_ROOM
    }
}

impl TryFrom<String> for Rgb {
    type Error = CatalogError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        let [r, g, b] = value.0;
        format!("#{r:02x}{g:02x}{b:02x}")
    }
}

fn srgb_to_linear(channel: u8) -> f32 {
    let c = f32::from(channel) / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RoomDescriptor {
    pub id: RoomId,
    pub name: String,
    pub floor: Floor,
    pub footprint: Footprint,
    #[serde(default)]
    pub color: Rgb,
    pub photos: Vec<String>,
}

/// The wide establishing photo set. Has no footprint and never enters the scene.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AerialDescriptor {
    pub id: RoomId,
    pub name: String,
    pub photos: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RoomCatalog {
    rooms: Vec<RoomDescriptor>,
    aerial: AerialDescriptor,
}

impl RoomCatalog {
    pub fn new(
        rooms: Vec<RoomDescriptor>,
        aerial: AerialDescriptor,
    ) -> Result<Self, CatalogError> {
        validate(&rooms, &aerial)?;
        Ok(Self { rooms, aerial })
    }

    pub fn rooms(&self) -> &[RoomDescriptor] {
        &self.rooms
    }

    pub fn aerial(&self) -> &AerialDescriptor {
        &self.aerial
    }

    pub fn room(&self, id: &str) -> Option<&RoomDescriptor> {
        self.rooms.iter().find(|room| room.id.as_str() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.room(id).is_some()
    }

    #[cfg(test)]
    pub fn rooms_on_floor(&self, floor: Floor) -> impl Iterator<Item = &RoomDescriptor> {
        self.rooms.iter().filter(move |room| room.floor == floor)
    }

    /// Distinct floors present in the catalog, ascending.
    pub fn floors(&self) -> Vec<Floor> {
        let mut floors: Vec<Floor> = self.rooms.iter().map(|room| room.floor).collect();
        floors.sort_unstable();
        floors.dedup();
        floors
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }
}

fn validate(rooms: &[RoomDescriptor], aerial: &AerialDescriptor) -> Result<(), CatalogError> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(rooms.len() + 1);
    for (index, room) in rooms.iter().enumerate() {
        let id = room.id.as_str();
        if id.trim().is_empty() {
            return Err(CatalogError::EmptyId { index });
        }
        if !seen.insert(id) {
            return Err(CatalogError::DuplicateId(id.to_string()));
        }
        if room.floor.0 == 0 {
            return Err(CatalogError::InvalidFloor(id.to_string()));
        }
        if !room.footprint.is_valid() {
            return Err(CatalogError::InvalidFootprint {
                id: id.to_string(),
                width: room.footprint.width,
                depth: room.footprint.depth,
            });
        }
        if room.photos.is_empty() {
            return Err(CatalogError::EmptyPhotos(id.to_string()));
        }
    }
    if aerial.id.as_str().trim().is_empty() {
        return Err(CatalogError::EmptyId { index: rooms.len() });
    }
    if !seen.insert(aerial.id.as_str()) {
        return Err(CatalogError::DuplicateId(aerial.id.to_string()));
    }
    if aerial.photos.is_empty() {
        return Err(CatalogError::EmptyAerialPhotos(aerial.id.to_string()));
    }
    Ok(())
}

fn photo(hash: &str) -> String {
    format!("{PHOTO_ROOT}/{hash}.jpg")
}

fn room(
    id: &str,
    name: &str,
    floor: Floor,
    footprint: Footprint,
    color: [u8; 3],
    photos: &[&str],
) -> RoomDescriptor {
    RoomDescriptor {
        id: RoomId::from(id),
        name: name.to_string(),
        floor,
        footprint,
        color: Rgb(color),
        photos: photos.iter().map(|hash| photo(hash)).collect(),
    }
}

/// The built-in property catalog.
pub fn load_catalog() -> Result<RoomCatalog, CatalogError> {
    let rooms = vec![
        room(
            "living-dining",
            "Living / Dining",
            Floor::GROUND,
            Footprint::new(0.0, 0.0, 4.0, 5.0),
            [0x38, 0xa1, 0x69],
            &[
                "de6f8cfc2463cbe2a071a128904d9e49",
                "43631d3715527f5e9bd1eedb65a3d078",
            ],
        ),
        room(
            "kitchen",
            "Kitchen",
            Floor::GROUND,
            Footprint::new(4.5, 0.0, 3.0, 5.0),
            [0xdd, 0x6b, 0x20],
            &["27801c178b5e8bc52517d44018bc1833"],
        ),
        room(
            "entry-stairs",
            "Entry / Stairs",
            Floor::GROUND,
            Footprint::new(0.0, 5.5, 3.0, 2.5),
            [0x80, 0x5a, 0xd5],
            &[
                "4ad7b29b1c342128bd55966cdd00324b",
                "80f8a4991e283f0a67c0301f0bc4380f",
            ],
        ),
        room(
            "bedroom-a",
            "Bedroom A",
            Floor::UPPER,
            Footprint::new(0.0, 0.0, 3.0, 3.0),
            [0x4a, 0x55, 0x68],
            &["2ca88f1157eb5a63e89b0ee4d40c40c7"],
        ),
        room(
            "hall-bath",
            "Hall / Bath Entry",
            Floor::UPPER,
            Footprint::new(3.2, 0.0, 2.0, 2.0),
            [0x31, 0x97, 0x95],
            &["6d4f7b4524666238142221bf044b8f6f"],
        ),
        room(
            "bedroom-b",
            "Bedroom B / Flex",
            Floor::UPPER,
            Footprint::new(0.0, 3.2, 5.2, 3.0),
            [0x31, 0x82, 0xce],
            &[
                "36e6704cbd4f961f01f61f3854339131",
                "fb5b608c7e9d97d495e564dc63eab27e",
            ],
        ),
    ];
    let aerial = AerialDescriptor {
        id: RoomId::from("aerial"),
        name: "Site Overview".to_string(),
        photos: vec![photo("710830308c8bdcee9710a264e010fc13")],
    };
    RoomCatalog::new(rooms, aerial)
}
