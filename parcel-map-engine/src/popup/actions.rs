use crate::engine::session::ViewerSession;
use crate::geometry::{Feature, Geometry, RecordId};
use crate::layers::ThematicLayer;
use crate::model::{CompanyId, LandRecord, Parcel, RiskPoint, SpatialArea};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PopupAction {
    EditDetails,
    Split,
    EditBoundary,
    Assign,
    Reassign,
    RemoveAssignment,
}

impl PopupAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PopupAction::EditDetails => "edit_details",
            PopupAction::Split => "split",
            PopupAction::EditBoundary => "edit_boundary",
            PopupAction::Assign => "assign",
            PopupAction::Reassign => "reassign",
            PopupAction::RemoveAssignment => "remove_assignment",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PopupAction::EditDetails => "Edit details",
            PopupAction::Split => "Split parcel",
            PopupAction::EditBoundary => "Edit boundary",
            PopupAction::Assign => "Assign to company",
            PopupAction::Reassign => "Reassign",
            PopupAction::RemoveAssignment => "Remove assignment",
        }
    }

    /// Actions that need the host to pick a company first.
    pub fn needs_company(&self) -> bool {
        matches!(self, PopupAction::Assign | PopupAction::Reassign)
    }
}

impl fmt::Display for PopupAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The record a popup was opened for.
#[derive(Debug, Clone, PartialEq)]
pub enum PopupTarget {
    Parcel(Parcel),
    SpatialArea(SpatialArea),
    LandRecord(LandRecord),
    RiskPoint(RiskPoint),
}

impl PopupTarget {
    pub fn from_feature(layer: ThematicLayer, feature: &Feature) -> Option<Self> {
        match layer {
            ThematicLayer::Parcels => Parcel::from_feature(feature).map(PopupTarget::Parcel),
            ThematicLayer::SpatialAreas => {
                SpatialArea::from_feature(feature).map(PopupTarget::SpatialArea)
            }
            ThematicLayer::LandRecords => {
                LandRecord::from_feature(feature).map(PopupTarget::LandRecord)
            }
            ThematicLayer::RiskPoints => RiskPoint::from_feature(feature).map(PopupTarget::RiskPoint),
        }
    }

    pub fn layer(&self) -> ThematicLayer {
        match self {
            PopupTarget::Parcel(_) => ThematicLayer::Parcels,
            PopupTarget::SpatialArea(_) => ThematicLayer::SpatialAreas,
            PopupTarget::LandRecord(_) => ThematicLayer::LandRecords,
            PopupTarget::RiskPoint(_) => ThematicLayer::RiskPoints,
        }
    }

    pub fn id(&self) -> &RecordId {
        match self {
            PopupTarget::Parcel(parcel) => &parcel.id,
            PopupTarget::SpatialArea(area) => &area.id,
            PopupTarget::LandRecord(record) => &record.id,
            PopupTarget::RiskPoint(point) => &point.id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            PopupTarget::Parcel(parcel) => &parcel.name,
            PopupTarget::SpatialArea(area) => &area.name,
            PopupTarget::LandRecord(record) => &record.reference,
            PopupTarget::RiskPoint(point) => &point.label,
        }
    }

    pub fn owner(&self) -> Option<&CompanyId> {
        match self {
            PopupTarget::Parcel(parcel) => parcel.company_id.as_ref(),
            PopupTarget::SpatialArea(area) => area.company_id.as_ref(),
            PopupTarget::LandRecord(record) => record.company_id.as_ref(),
            PopupTarget::RiskPoint(_) => None,
        }
    }

    /// Polygon geometry for boundary editing.
    pub fn geometry(&self) -> Option<&Geometry> {
        match self {
            PopupTarget::Parcel(parcel) => Some(&parcel.geometry),
            PopupTarget::SpatialArea(area) => Some(&area.geometry),
            PopupTarget::LandRecord(_) | PopupTarget::RiskPoint(_) => None,
        }
    }
}

/// Actions offered to `viewer` for `target`, in display order.
pub fn build_actions(viewer: &ViewerSession, target: &PopupTarget) -> Vec<PopupAction> {
    let owned = viewer.owns(target.owner());

    match target {
        PopupTarget::Parcel(_) if owned => vec![
            PopupAction::EditDetails,
            PopupAction::Split,
            PopupAction::EditBoundary,
        ],
        PopupTarget::SpatialArea(_) if owned => {
            vec![PopupAction::EditDetails, PopupAction::EditBoundary]
        }
        PopupTarget::Parcel(_) | PopupTarget::LandRecord(_) if viewer.is_admin() => {
            if target.owner().is_some() {
                vec![PopupAction::Reassign, PopupAction::RemoveAssignment]
            } else {
                vec![PopupAction::Assign]
            }
        }
        _ => Vec::new(),
    }
}
