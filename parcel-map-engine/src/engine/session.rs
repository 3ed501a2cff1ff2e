use crate::model::CompanyId;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Who is looking at the map, as asserted by the host page after sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ViewerRole {
    #[default]
    Guest,
    CompanyMember {
        company_id: CompanyId,
    },
    GlobalAdministrator {
        #[serde(default)]
        company_id: Option<CompanyId>,
    },
}

#[derive(Resource, Debug, Clone, Default, PartialEq)]
pub struct ViewerSession {
    pub role: ViewerRole,
}

impl ViewerSession {
    pub fn new(role: ViewerRole) -> Self {
        Self { role }
    }

    pub fn company_id(&self) -> Option<&CompanyId> {
        match &self.role {
            ViewerRole::Guest => None,
            ViewerRole::CompanyMember { company_id } => Some(company_id),
            ViewerRole::GlobalAdministrator { company_id } => company_id.as_ref(),
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.role, ViewerRole::GlobalAdministrator { .. })
    }

    pub fn is_guest(&self) -> bool {
        self.role == ViewerRole::Guest
    }

    /// Whether the viewer's company owns a record with `owner`.
    pub fn owns(&self, owner: Option<&CompanyId>) -> bool {
        match (self.company_id(), owner) {
            (Some(mine), Some(owner)) => mine == owner,
            _ => false,
        }
    }

    /// Guests only browse; drawing, splitting and editing need a company.
    pub fn can_edit(&self) -> bool {
        !self.is_guest()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::RecordId;

    #[test]
    fn role_deserializes_from_tagged_json() {
        let role: ViewerRole =
            serde_json::from_str(r#"{"role": "company_member", "company_id": 4}"#).unwrap();
        let session = ViewerSession::new(role);
        assert!(session.owns(Some(&RecordId::Number(4))));
        assert!(!session.owns(None));

        let role: ViewerRole =
            serde_json::from_str(r#"{"role": "global_administrator"}"#).unwrap();
        let session = ViewerSession::new(role);
        assert!(session.is_admin());
        assert!(!session.owns(Some(&RecordId::Number(4))));
    }
}
