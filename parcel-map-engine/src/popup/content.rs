use super::actions::{PopupAction, PopupTarget};
use std::fmt::Write;

/// Host-side global the popup buttons call with their command handle.
pub const INVOKE_FUNCTION: &str = "parcelMapInvoke";

/// HTML fragment for a popup: a summary of `target` and one button per action.
pub fn render_popup(target: &PopupTarget, actions: &[(PopupAction, String)]) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        "<div class=\"parcel-map-popup\" data-layer=\"{}\">",
        target.layer().source_id()
    );
    let _ = write!(html, "<h3>{}</h3>", escape(target.title()));

    html.push_str("<dl>");
    for (label, value) in summary_rows(target) {
        let _ = write!(html, "<dt>{}</dt><dd>{}</dd>", label, escape(&value));
    }
    html.push_str("</dl>");

    if !actions.is_empty() {
        html.push_str("<div class=\"parcel-map-popup-actions\">");
        for (action, handle) in actions {
            let _ = write!(
                html,
                "<button type=\"button\" data-action=\"{}\" onclick=\"window.{}('{}')\">{}</button>",
                action,
                INVOKE_FUNCTION,
                escape(handle),
                action.label()
            );
        }
        html.push_str("</div>");
    }

    html.push_str("</div>");
    html
}

fn summary_rows(target: &PopupTarget) -> Vec<(&'static str, String)> {
    let mut rows = Vec::new();
    match target {
        PopupTarget::Parcel(parcel) => {
            if let Some(variety) = &parcel.variety {
                rows.push(("Variety", variety.clone()));
            }
            if let Some(area) = parcel.area_hectares {
                rows.push(("Area", format!("{area:.2} ha")));
            }
            if let Some(company) = &parcel.company_name {
                rows.push(("Company", company.clone()));
            }
        }
        PopupTarget::SpatialArea(area) => {
            rows.push(("Category", area.category.display_name()));
            if let Some(description) = &area.description {
                rows.push(("Description", description.clone()));
            }
        }
        PopupTarget::LandRecord(record) => {
            let company = record
                .company_name
                .clone()
                .unwrap_or_else(|| "unassigned".to_string());
            rows.push(("Assigned to", company));
        }
        PopupTarget::RiskPoint(point) => {
            if let Some(level) = &point.level {
                rows.push(("Risk level", level.clone()));
            }
        }
    }
    rows
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Feature, Geometry};
    use crate::layers::ThematicLayer;
    use crate::model::records::keys;

    #[test]
    fn names_are_escaped_and_buttons_carry_handles() {
        let feature = Feature::new(Geometry::polygon(vec![]))
            .with_id(3_i64)
            .with_property(keys::NAME, "<b>Block 7</b>")
            .with_property(keys::AREA, 1.5);
        let target = PopupTarget::from_feature(ThematicLayer::Parcels, &feature).unwrap();
        let html = render_popup(&target, &[(PopupAction::Split, "split_x_1".to_string())]);

        assert!(html.contains("&lt;b&gt;Block 7&lt;/b&gt;"));
        assert!(html.contains("1.50 ha"));
        assert!(html.contains("window.parcelMapInvoke('split_x_1')"));
    }

    #[test]
    fn read_only_popups_have_no_buttons() {
        let feature = Feature::new(Geometry::polygon(vec![])).with_id(8_i64);
        let target = PopupTarget::from_feature(ThematicLayer::LandRecords, &feature).unwrap();
        let html = render_popup(&target, &[]);
        assert!(html.contains("unassigned"));
        assert!(!html.contains("<button"));
    }
}
