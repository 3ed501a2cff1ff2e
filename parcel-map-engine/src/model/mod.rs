//! Domain records read from layer features, and attribute payloads sent to the backend.

pub mod records;

pub use records::{
    CompanyId, LandRecord, LandRecordAssignment, Parcel, ParcelAttributes, RiskPoint,
    SpatialArea, SpatialAreaAttributes, SpatialAreaCategory,
};
