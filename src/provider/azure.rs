// src/provider/azure.rs — Azure OpenAI adapter
//
// Deployment-scoped URLs: {endpoint}/openai/deployments/{id}/chat/completions
// with an `api-version` query parameter and an `api-key` header.

use url::Url;

use super::adapter::{parse_json, ProviderAdapter};
use super::credentials::{ResolvedCredentials, DEFAULT_AZURE_API_VERSION};
use super::openai_compat::{chat_body, parse_chat_completion};
use super::transport::{HttpRequestSpec, HttpResponse};
use super::{ChatRequest, Completion, ErrorInfo};

pub struct AzureAdapter;

impl ProviderAdapter for AzureAdapter {
    fn build_request(
        &self,
        request: &ChatRequest,
        credentials: &ResolvedCredentials,
    ) -> Result<HttpRequestSpec, ErrorInfo> {
        let endpoint = credentials.endpoint.as_deref().ok_or_else(|| {
            ErrorInfo::not_configured(format!("No Azure endpoint for {}", request.model))
        })?;
        let deployment = credentials
            .deployment_id
            .as_deref()
            .unwrap_or_else(|| request.model.name());
        let api_version = credentials
            .api_version
            .as_deref()
            .unwrap_or(DEFAULT_AZURE_API_VERSION);

        let url = deployment_url(endpoint, deployment, api_version)?;
        let spec = HttpRequestSpec::post(url, chat_body(request)?)
            .header("api-key", credentials.api_key.clone());
        Ok(credentials
            .headers
            .iter()
            .fold(spec, |spec, (k, v)| spec.header(k.clone(), v.clone())))
    }

    fn parse_response(&self, response: &HttpResponse) -> Result<Completion, ErrorInfo> {
        parse_chat_completion(parse_json(response)?)
    }
}

/// Strip any query, then anything from `/openai/deployments/` onwards (people paste full
/// URLs into the endpoint variable) and re-append the canonical path.
pub fn deployment_url(
    endpoint: &str,
    deployment: &str,
    api_version: &str,
) -> Result<String, ErrorInfo> {
    let mut base = endpoint.trim();
    if let Some(idx) = base.find(|c: char| c == '?' || c == '#') {
        base = &base[..idx];
    }
    if let Some(idx) = base.find("/openai/deployments/") {
        base = &base[..idx];
    }
    let base = base.trim_end_matches('/');
    let base = base.strip_suffix("/openai").unwrap_or(base);

    let mut url = Url::parse(&format!(
        "{base}/openai/deployments/{deployment}/chat/completions"
    ))
    .map_err(|e| ErrorInfo::invalid_request(format!("Invalid Azure endpoint '{endpoint}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ErrorInfo::invalid_request(format!(
            "Invalid Azure endpoint '{endpoint}': unsupported scheme"
        )));
    }
    url.set_query(None);
    url.query_pairs_mut().append_pair("api-version", api_version);
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChatMessage, ErrorKind, ModelId};

    const EXPECTED: &str = "https://res.openai.azure.com/openai/deployments/gpt-4.1/chat/completions?api-version=2025-01-01-preview";

    #[test]
    fn test_deployment_url_plain_endpoint() {
        let url = deployment_url("https://res.openai.azure.com", "gpt-4.1", "2025-01-01-preview").unwrap();
        assert_eq!(url, EXPECTED);
    }

    #[test]
    fn test_deployment_url_trailing_slash() {
        let url = deployment_url("https://res.openai.azure.com/", "gpt-4.1", "2025-01-01-preview").unwrap();
        assert_eq!(url, EXPECTED);
    }

    #[test]
    fn test_deployment_url_strips_existing_deployment_path() {
        let url = deployment_url(
            "https://res.openai.azure.com/openai/deployments/old/chat/completions?api-version=2023-05-15",
            "gpt-4.1",
            "2025-01-01-preview",
        )
        .unwrap();
        assert_eq!(url, EXPECTED);
    }

    #[test]
    fn test_deployment_url_drops_query_on_bare_endpoint() {
        let url = deployment_url(
            "https://res.openai.azure.com/?api-version=old",
            "gpt-4.1",
            "2025-01-01-preview",
        )
        .unwrap();
        assert_eq!(url, EXPECTED);
    }

    #[test]
    fn test_deployment_url_strips_bare_openai_suffix() {
        let url = deployment_url("https://res.openai.azure.com/openai/", "gpt-4.1", "2025-01-01-preview").unwrap();
        assert_eq!(url, EXPECTED);
    }

    #[test]
    fn test_deployment_url_rejects_garbage() {
        let err = deployment_url("not a url", "gpt-4.1", "v").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_build_request() {
        let req = ChatRequest {
            model: ModelId::parse("azure/gpt-4.1").unwrap(),
            messages: vec![ChatMessage::user("Hi")],
            temperature: 0.2,
            max_tokens: Some(32),
            tools: vec![],
            tool_choice: None,
        };
        let mut creds = ResolvedCredentials::new("azkey");
        creds.endpoint = Some("https://res.openai.azure.com".into());
        creds.deployment_id = Some("gpt-4.1".into());
        creds.api_version = Some("2025-01-01-preview".into());

        let spec = AzureAdapter.build_request(&req, &creds).unwrap();
        assert_eq!(spec.url, EXPECTED);
        assert_eq!(spec.get_header("api-key"), Some("azkey"));
        assert!(spec.get_header("Authorization").is_none());
        assert!(spec.body.get("model").is_none());
        assert_eq!(spec.body["max_tokens"], 32);
    }

    #[test]
    fn test_build_request_without_endpoint() {
        let req = ChatRequest {
            model: ModelId::parse("azure/gpt-4.1").unwrap(),
            messages: vec![ChatMessage::user("Hi")],
            temperature: 0.2,
            max_tokens: None,
            tools: vec![],
            tool_choice: None,
        };
        let err = AzureAdapter
            .build_request(&req, &ResolvedCredentials::new("k"))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotConfigured);
    }
}
