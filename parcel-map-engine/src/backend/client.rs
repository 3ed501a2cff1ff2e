use super::error::BackendError;
use crate::geometry::{Bounds, Feature, Geometry, RecordId};
use crate::layers::ThematicLayer;
use crate::model::{CompanyId, LandRecordAssignment, ParcelAttributes, SpatialAreaAttributes};
use bevy::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

pub type RequestId = u64;

/// Backend operations the engine issues. The host performs the HTTP call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum BackendRequest {
    CreateParcel {
        attributes: ParcelAttributes,
        geometry: Geometry,
    },
    CreateSpatialArea {
        attributes: SpatialAreaAttributes,
        geometry: Geometry,
    },
    UpdateParcelGeometry {
        id: RecordId,
        geometry: Geometry,
    },
    UpdateSpatialAreaGeometry {
        id: RecordId,
        geometry: Geometry,
    },
    SplitParcel {
        id: RecordId,
        line: Feature,
    },
    AssignParcel {
        id: RecordId,
        company_id: CompanyId,
    },
    AssignLandRecord {
        id: RecordId,
        assignment: LandRecordAssignment,
    },
    RemoveAssignment {
        id: RecordId,
        company_id: CompanyId,
        layer: ThematicLayer,
    },
    ListParcels,
    ListSpatialAreas,
    ListRiskPoints,
    ListLandRecords {
        bounds: Bounds,
        min_zoom: f64,
    },
}

impl BackendRequest {
    /// Layer whose data a list request fetches.
    pub fn listed_layer(&self) -> Option<ThematicLayer> {
        match self {
            Self::ListParcels => Some(ThematicLayer::Parcels),
            Self::ListSpatialAreas => Some(ThematicLayer::SpatialAreas),
            Self::ListRiskPoints => Some(ThematicLayer::RiskPoints),
            Self::ListLandRecords { .. } => Some(ThematicLayer::LandRecords),
            _ => None,
        }
    }

    /// List request for a layer. Land records need the current viewport.
    pub fn list(layer: ThematicLayer, viewport: Option<(Bounds, f64)>) -> Option<Self> {
        match layer {
            ThematicLayer::Parcels => Some(Self::ListParcels),
            ThematicLayer::SpatialAreas => Some(Self::ListSpatialAreas),
            ThematicLayer::RiskPoints => Some(Self::ListRiskPoints),
            ThematicLayer::LandRecords => viewport
                .map(|(bounds, min_zoom)| Self::ListLandRecords { bounds, min_zoom }),
        }
    }

    pub fn operation(&self) -> &'static str {
        match self {
            Self::CreateParcel { .. } => "create_parcel",
            Self::CreateSpatialArea { .. } => "create_spatial_area",
            Self::UpdateParcelGeometry { .. } => "update_parcel_geometry",
            Self::UpdateSpatialAreaGeometry { .. } => "update_spatial_area_geometry",
            Self::SplitParcel { .. } => "split_parcel",
            Self::AssignParcel { .. } => "assign_parcel",
            Self::AssignLandRecord { .. } => "assign_land_record",
            Self::RemoveAssignment { .. } => "remove_assignment",
            Self::ListParcels => "list_parcels",
            Self::ListSpatialAreas => "list_spatial_areas",
            Self::ListRiskPoints => "list_risk_points",
            Self::ListLandRecords { .. } => "list_land_records",
        }
    }
}

/// Request as sent to the host in a `backend_request` notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutgoingRequest {
    pub request_id: RequestId,
    #[serde(flatten)]
    pub request: BackendRequest,
}

/// Correlates backend requests with the responses the host sends back.
#[derive(Resource, Debug, Default)]
pub struct BackendClient {
    next_id: RequestId,
    pending: HashMap<RequestId, BackendRequest>,
    outbox: Vec<OutgoingRequest>,
}

impl BackendClient {
    pub fn issue(&mut self, request: BackendRequest) -> RequestId {
        self.next_id += 1;
        let request_id = self.next_id;
        debug!("Backend request {} {}", request_id, request.operation());
        self.pending.insert(request_id, request.clone());
        self.outbox.push(OutgoingRequest {
            request_id,
            request,
        });
        request_id
    }

    /// Take the request a response belongs to; `None` for unknown or repeated ids.
    pub fn complete(&mut self, request_id: RequestId) -> Option<BackendRequest> {
        self.pending.remove(&request_id)
    }

    pub fn is_pending(&self, request_id: RequestId) -> bool {
        self.pending.contains_key(&request_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn drain_outbox(&mut self) -> Vec<OutgoingRequest> {
        std::mem::take(&mut self.outbox)
    }
}

/// Raw response relayed by the host.
#[derive(Event, Debug, Clone, PartialEq, Deserialize)]
pub struct BackendResponseEvent {
    pub request_id: RequestId,
    /// HTTP status; 0 when the request failed before a response arrived.
    pub status: u16,
    #[serde(default)]
    pub body: Value,
}

/// A response matched to the request that caused it.
#[derive(Event, Debug, Clone, PartialEq)]
pub struct BackendCompletion {
    pub request_id: RequestId,
    pub request: BackendRequest,
    pub result: Result<Value, BackendError>,
}

impl BackendCompletion {
    pub fn from_response(request: BackendRequest, response: &BackendResponseEvent) -> Self {
        let result = if (200..300).contains(&response.status) {
            Ok(response.body.clone())
        } else {
            Err(BackendError::from_status(response.status, &response.body))
        };
        Self {
            request_id: response.request_id,
            request,
            result,
        }
    }

    /// Decode the success body.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, BackendError> {
        let body = self.result.clone()?;
        serde_json::from_value(body).map_err(|e| BackendError::Malformed(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SplitResponse {
    #[serde(default)]
    pub new_parcels: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AssignResponse {
    #[serde(default)]
    pub company_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeometryUpdateResponse {
    #[serde(default)]
    pub area: Option<Value>,
}

impl GeometryUpdateResponse {
    /// Area in hectares; the backend sends it as a number or a decimal string.
    pub fn area_hectares(&self) -> Option<f64> {
        match self.area.as_ref()? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn outgoing_request_flattens_operation_tag() {
        let mut client = BackendClient::default();
        let id = client.issue(BackendRequest::SplitParcel {
            id: RecordId::Number(7),
            line: Feature::new(Geometry::line(vec![[8.0, 50.0], [8.1, 50.0]])),
        });
        let outbox = client.drain_outbox();
        let value = serde_json::to_value(&outbox[0]).unwrap();
        assert_eq!(value["request_id"], json!(id));
        assert_eq!(value["operation"], json!("split_parcel"));
        assert_eq!(value["id"], json!(7));
        assert!(client.drain_outbox().is_empty());
    }

    #[test]
    fn responses_complete_once() {
        let mut client = BackendClient::default();
        let id = client.issue(BackendRequest::ListParcels);
        assert_eq!(client.complete(id), Some(BackendRequest::ListParcels));
        assert_eq!(client.complete(id), None);
        assert_eq!(client.pending_count(), 0);
    }

    #[test]
    fn completion_parses_body_or_propagates_error() {
        let response = BackendResponseEvent {
            request_id: 1,
            status: 200,
            body: json!({"new_parcels": [{"id": 1}, {"id": 2}]}),
        };
        let completion = BackendCompletion::from_response(BackendRequest::ListParcels, &response);
        assert_eq!(completion.parse::<SplitResponse>().unwrap().new_parcels.len(), 2);

        let response = BackendResponseEvent {
            request_id: 2,
            status: 500,
            body: Value::Null,
        };
        let completion = BackendCompletion::from_response(BackendRequest::ListParcels, &response);
        assert!(matches!(
            completion.parse::<SplitResponse>(),
            Err(BackendError::Server { status: 500, .. })
        ));
    }
}
