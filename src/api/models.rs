use crate::api::{ModelInfo, ModelsResponse};
use crate::core::errors::ApiError;
use crate::utils::auth::add_auth_headers;
use crate::utils::url::construct_api_url;

pub async fn fetch_models(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
) -> Result<ModelsResponse, ApiError> {
    let models_url = construct_api_url(base_url, "models");
    let request = client
        .get(models_url)
        .header("Content-Type", "application/json");

    let response = add_auth_headers(request, api_key)
        .send()
        .await
        .map_err(|err| ApiError::transport(&err))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|err| ApiError::transport(&err))?;
    if !status.is_success() {
        return Err(ApiError::from_response(status, &body));
    }

    serde_json::from_str::<ModelsResponse>(&body)
        .map_err(|err| ApiError::malformed_stream(format!("invalid model list: {err}")))
}

pub fn sort_models(models: &mut [ModelInfo]) {
    // Newest first, then by ID for consistent display
    models.sort_by(|a, b| {
        // Handle both created (OpenAI-style) and created_at (ISO timestamp) fields
        let by_date = match (&a.created, &b.created, &a.created_at, &b.created_at) {
            (Some(a_created), Some(b_created), _, _) => b_created.cmp(a_created),
            (Some(_), None, _, _) => std::cmp::Ordering::Less,
            (None, Some(_), _, _) => std::cmp::Ordering::Greater,
            (None, None, Some(a_created_at), Some(b_created_at)) => b_created_at.cmp(a_created_at),
            (None, None, Some(_), None) => std::cmp::Ordering::Less,
            (None, None, None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None, None, None) => std::cmp::Ordering::Equal,
        };
        by_date.then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(id: &str, created: Option<u64>, created_at: Option<&str>) -> ModelInfo {
        ModelInfo {
            id: id.to_string(),
            created,
            created_at: created_at.map(str::to_string),
            owned_by: None,
            display_name: None,
        }
    }

    #[test]
    fn sort_models_newest_first_then_by_id() {
        let mut models = vec![
            model("zeta", None, None),
            model("old", Some(10), None),
            model("dated", None, Some("2024-05-01T00:00:00Z")),
            model("new", Some(20), None),
            model("alpha", None, None),
        ];

        sort_models(&mut models);

        let ids: Vec<_> = models.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old", "dated", "alpha", "zeta"]);
    }
}
