use crate::geometry::{Feature, Geometry, RecordId};
use constants::zone::get_zone_name;
use serde::{Deserialize, Serialize};

/// Property keys the backend uses on feature collections.
pub mod keys {
    pub const NAME: &str = "name";
    pub const VARIETY: &str = "variety";
    pub const AREA: &str = "area";
    pub const COMPANY_ID: &str = "company_id";
    pub const COMPANY_NAME: &str = "company_name";
    pub const CATEGORY: &str = "category";
    pub const DESCRIPTION: &str = "description";
    pub const REFERENCE: &str = "reference";
    pub const RISK_LEVEL: &str = "risk_level";
    pub const LABEL: &str = "label";
}

pub type CompanyId = RecordId;

/// Owned, editable vineyard land-unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Parcel {
    pub id: RecordId,
    pub name: String,
    pub variety: Option<String>,
    pub area_hectares: Option<f64>,
    pub company_id: Option<CompanyId>,
    pub company_name: Option<String>,
    pub geometry: Geometry,
}

impl Parcel {
    pub fn from_feature(feature: &Feature) -> Option<Self> {
        let id = feature.record_id()?;
        Some(Self {
            name: feature
                .string_property(keys::NAME)
                .map_or_else(|| format!("Parcel {id}"), str::to_string),
            id,
            variety: feature.string_property(keys::VARIETY).map(str::to_string),
            area_hectares: feature.number_property(keys::AREA),
            company_id: company_of(feature),
            company_name: feature.string_property(keys::COMPANY_NAME).map(str::to_string),
            geometry: feature.geometry.clone(),
        })
    }
}

/// Zone categories of spatial areas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialAreaCategory {
    BufferZone,
    WaterSource,
    Building,
    Storage,
    AccessRoad,
    ProtectedArea,
    Other,
}

impl SpatialAreaCategory {
    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "buffer_zone" => Some(Self::BufferZone),
            "water_source" => Some(Self::WaterSource),
            "building" => Some(Self::Building),
            "storage" => Some(Self::Storage),
            "access_road" => Some(Self::AccessRoad),
            "protected_area" => Some(Self::ProtectedArea),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BufferZone => "buffer_zone",
            Self::WaterSource => "water_source",
            Self::Building => "building",
            Self::Storage => "storage",
            Self::AccessRoad => "access_road",
            Self::ProtectedArea => "protected_area",
            Self::Other => "other",
        }
    }

    pub fn display_name(&self) -> String {
        get_zone_name(self.as_str())
    }
}

/// Named zone polygon owned by a company.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialArea {
    pub id: RecordId,
    pub name: String,
    pub category: SpatialAreaCategory,
    pub description: Option<String>,
    pub company_id: Option<CompanyId>,
    pub geometry: Geometry,
}

impl SpatialArea {
    pub fn from_feature(feature: &Feature) -> Option<Self> {
        let id = feature.record_id()?;
        Some(Self {
            name: feature
                .string_property(keys::NAME)
                .map_or_else(|| format!("Area {id}"), str::to_string),
            id,
            category: feature
                .string_property(keys::CATEGORY)
                .and_then(SpatialAreaCategory::from_string)
                .unwrap_or(SpatialAreaCategory::Other),
            description: feature.string_property(keys::DESCRIPTION).map(str::to_string),
            company_id: company_of(feature),
            geometry: feature.geometry.clone(),
        })
    }
}

/// Third-party land record; only its assignment is managed here.
#[derive(Debug, Clone, PartialEq)]
pub struct LandRecord {
    pub id: RecordId,
    pub reference: String,
    pub company_id: Option<CompanyId>,
    pub company_name: Option<String>,
}

impl LandRecord {
    pub fn from_feature(feature: &Feature) -> Option<Self> {
        let id = feature.record_id()?;
        Some(Self {
            reference: feature
                .string_property(keys::REFERENCE)
                .map_or_else(|| id.to_string(), str::to_string),
            id,
            company_id: company_of(feature),
            company_name: feature.string_property(keys::COMPANY_NAME).map(str::to_string),
        })
    }

    pub fn is_assigned(&self) -> bool {
        self.company_id.is_some()
    }
}

/// Read-only risk marker.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskPoint {
    pub id: RecordId,
    pub label: String,
    pub level: Option<String>,
}

impl RiskPoint {
    pub fn from_feature(feature: &Feature) -> Option<Self> {
        let id = feature.record_id()?;
        Some(Self {
            label: feature
                .string_property(keys::LABEL)
                .map_or_else(|| format!("Risk {id}"), str::to_string),
            id,
            level: feature.string_property(keys::RISK_LEVEL).map(str::to_string),
        })
    }
}

fn company_of(feature: &Feature) -> Option<CompanyId> {
    feature
        .properties
        .get(keys::COMPANY_ID)
        .and_then(RecordId::from_value)
}

/// Attributes for a new parcel drawn on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParcelAttributes {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variety: Option<String>,
}

/// Attributes for a new spatial area drawn on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialAreaAttributes {
    pub name: String,
    pub category: SpatialAreaCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Assignment payload for a land record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandRecordAssignment {
    pub company_id: CompanyId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parcel_reads_properties_with_fallback_name() {
        let feature = Feature::new(Geometry::polygon(vec![]))
            .with_id(7_i64)
            .with_property(keys::AREA, "1.25")
            .with_property(keys::COMPANY_ID, 3);
        let parcel = Parcel::from_feature(&feature).unwrap();
        assert_eq!(parcel.name, "Parcel 7");
        assert_eq!(parcel.area_hectares, Some(1.25));
        assert_eq!(parcel.company_id, Some(RecordId::Number(3)));
    }

    #[test]
    fn unknown_category_falls_back_to_other() {
        let feature = Feature::new(Geometry::polygon(vec![]))
            .with_id("z1")
            .with_property(keys::CATEGORY, "volcano");
        let area = SpatialArea::from_feature(&feature).unwrap();
        assert_eq!(area.category, SpatialAreaCategory::Other);
        assert_eq!(SpatialAreaCategory::WaterSource.display_name(), "water source");
    }
}
