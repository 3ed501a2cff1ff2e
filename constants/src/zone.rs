pub struct ZoneInfo {
    pub id: &'static str,
    pub name: &'static str,
}

/// Spatial area categories known to the backend.
pub const ZONE_MAP: &[ZoneInfo] = &[
    ZoneInfo {
        id: "buffer_zone",
        name: "buffer zone",
    },
    ZoneInfo {
        id: "water_source",
        name: "water source",
    },
    ZoneInfo {
        id: "building",
        name: "building",
    },
    ZoneInfo {
        id: "storage",
        name: "storage",
    },
    ZoneInfo {
        id: "access_road",
        name: "access road",
    },
    ZoneInfo {
        id: "protected_area",
        name: "protected area",
    },
    ZoneInfo {
        id: "other",
        name: "other",
    },
];

pub fn get_zone_name(id: &str) -> String {
    ZONE_MAP
        .iter()
        .find(|z| z.id == id)
        .map_or("unknown", |z| z.name)
        .to_string()
}
