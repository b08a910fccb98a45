//! Wire types of the Admin API custom dimension and metric resources.

use serde::{Deserialize, Serialize};

/// `properties/{id}/customDimensions/{n}` resource.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomDimensionResource {
    /// Resource name; empty on create requests
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parameter_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// `EVENT`, `USER`, `ITEM` or `DIMENSION_SCOPE_UNSPECIFIED`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scope: String,
    #[serde(default)]
    pub disallow_ads_personalization: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCustomDimensionsResponse {
    #[serde(default)]
    pub custom_dimensions: Vec<CustomDimensionResource>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// `properties/{id}/customMetrics/{n}` resource.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomMetricResource {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parameter_name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub measurement_unit: String,
    #[serde(default)]
    pub scope: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCustomMetricsResponse {
    #[serde(default)]
    pub custom_metrics: Vec<CustomMetricResource>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_body_omits_empty_fields() {
        let resource = CustomDimensionResource {
            parameter_name: "button_name".to_string(),
            display_name: "Button Name".to_string(),
            scope: "EVENT".to_string(),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&resource).unwrap(),
            json!({
                "parameterName": "button_name",
                "displayName": "Button Name",
                "scope": "EVENT",
                "disallowAdsPersonalization": false
            })
        );
    }

    #[test]
    fn test_list_response_defaults() {
        let page: ListCustomDimensionsResponse = serde_json::from_value(json!({})).unwrap();
        assert!(page.custom_dimensions.is_empty());
        assert!(page.next_page_token.is_none());
    }
}
