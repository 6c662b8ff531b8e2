//! Jenkins-backed job source: a small REST client plus the [`JobSource`]
//! implementation that filters the server's job list by a name pattern and
//! fetches each matching job's `config.xml`.

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use regex::Regex;
use tracing::{debug, info};

use crate::source::{JobSource, SourceError};
use crate::tree::{parse_tree, JobTree};

/// Listing and fetching operations against a Jenkins server. Implemented by
/// [`JenkinsClient`] and by mocks in tests.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait JenkinsApi: Send + Sync {
    /// Lists all job names known to the server.
    async fn list_job_names(&self) -> Result<Vec<String>, SourceError>;

    /// Fetches one job's raw `config.xml`.
    async fn fetch_job_config(&self, name: &str) -> Result<String, SourceError>;
}

/// Minimal Jenkins REST client: list job names, fetch one job's XML.
#[derive(Debug)]
pub struct JenkinsClient {
    http: reqwest::Client,
    base_url: String,
    user: Option<String>,
    password: Option<String>,
}

impl JenkinsClient {
    pub fn new(
        base_url: impl Into<String>,
        user: Option<String>,
        password: Option<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
            user,
            password,
        }
    }

    /// Builds a URL under the base, percent-encoding each path segment. Job
    /// names may contain spaces or reserved characters.
    fn url(&self, segments: &[&str]) -> Result<reqwest::Url, SourceError> {
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|_| SourceError::Url {
            url: self.base_url.clone(),
        })?;
        url.path_segments_mut()
            .map_err(|_| SourceError::Url {
                url: self.base_url.clone(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn get(&self, url: reqwest::Url) -> reqwest::RequestBuilder {
        let mut request = self.http.get(url);
        if let Some(user) = &self.user {
            request = request.basic_auth(user, self.password.as_deref());
        }
        request
    }
}

#[async_trait]
impl JenkinsApi for JenkinsClient {
    async fn list_job_names(&self) -> Result<Vec<String>, SourceError> {
        let mut url = self.url(&["api", "json"])?;
        url.set_query(Some("tree=jobs[name]"));
        debug!(url = %url, "listing jobs");
        let response = self
            .get(url.clone())
            .send()
            .await
            .map_err(|e| SourceError::Http {
                url: url.to_string(),
                source: e,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: url.to_string(),
                status,
            });
        }
        let body: serde_json::Value =
            response.json().await.map_err(|e| SourceError::Http {
                url: url.to_string(),
                source: e,
            })?;
        parse_job_listing(url.as_str(), &body)
    }

    async fn fetch_job_config(&self, name: &str) -> Result<String, SourceError> {
        let url = self.url(&["job", name, "config.xml"])?;
        debug!(url = %url, "fetching job configuration");
        let response = self
            .get(url.clone())
            .send()
            .await
            .map_err(|e| SourceError::Http {
                url: url.to_string(),
                source: e,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: url.to_string(),
                status,
            });
        }
        response.text().await.map_err(|e| SourceError::Http {
            url: url.to_string(),
            source: e,
        })
    }
}

/// Extracts the job names from an `api/json?tree=jobs[name]` response body.
/// Entries without a `name` field are skipped.
fn parse_job_listing(url: &str, body: &serde_json::Value) -> Result<Vec<String>, SourceError> {
    let jobs = body
        .get("jobs")
        .and_then(|jobs| jobs.as_array())
        .ok_or_else(|| SourceError::Api {
            url: url.to_string(),
            detail: "missing `jobs` array".into(),
        })?;
    Ok(jobs
        .iter()
        .filter_map(|job| job.get("name").and_then(|name| name.as_str()))
        .map(str::to_owned)
        .collect())
}

/// [`JobSource`] over a live Jenkins server. Only job names matching the
/// pattern are listed, so unmatched jobs are never fetched.
#[derive(Debug)]
pub struct JenkinsSource<A = JenkinsClient> {
    api: A,
    pattern: Regex,
}

impl<A: JenkinsApi> JenkinsSource<A> {
    pub fn new(api: A, pattern: &str) -> Result<Self, SourceError> {
        let pattern = Regex::new(pattern).map_err(|e| SourceError::Pattern {
            pattern: pattern.into(),
            source: e,
        })?;
        Ok(Self { api, pattern })
    }
}

#[async_trait]
impl<A: JenkinsApi> JobSource for JenkinsSource<A> {
    async fn job_names(&self) -> Result<Vec<String>, SourceError> {
        let all = self.api.list_job_names().await?;
        let total = all.len();
        let matched: Vec<String> = all
            .into_iter()
            .filter(|name| self.pattern.is_match(name))
            .collect();
        info!(
            matched = matched.len(),
            total,
            pattern = %self.pattern,
            "filtered job list"
        );
        Ok(matched)
    }

    async fn job_tree(&self, name: &str) -> Result<JobTree, SourceError> {
        let xml = self.api.fetch_job_config(name).await?;
        parse_tree(&xml).map_err(|e| SourceError::Parse {
            name: name.into(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn trailing_slash_is_stripped_from_base_url() {
        let client = JenkinsClient::new("https://ci.example.org/", None, None);
        assert_eq!(client.base_url, "https://ci.example.org");
    }

    #[test]
    fn job_names_are_percent_encoded_in_the_config_url() {
        let client = JenkinsClient::new("https://ci.example.org", None, None);
        let url = client.url(&["job", "widget build?", "config.xml"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://ci.example.org/job/widget%20build%3F/config.xml"
        );
    }

    #[test]
    fn base_url_path_is_kept_when_building_urls() {
        let client = JenkinsClient::new("https://ci.example.org/jenkins/", None, None);
        let url = client.url(&["api", "json"]).unwrap();
        assert_eq!(url.as_str(), "https://ci.example.org/jenkins/api/json");
    }

    #[test]
    fn listing_extracts_names_and_skips_malformed_entries() {
        let body = json!({
            "jobs": [
                {"name": "widget-build"},
                {"color": "red"},
                {"name": "widget-deploy"},
            ]
        });
        assert_eq!(
            parse_job_listing("https://ci.example.org/api/json", &body).unwrap(),
            vec!["widget-build", "widget-deploy"]
        );
    }

    #[test]
    fn listing_without_jobs_array_is_an_api_error() {
        let body = json!({"mode": "NORMAL"});
        let err = parse_job_listing("https://ci.example.org/api/json", &body).unwrap_err();
        assert!(matches!(err, SourceError::Api { .. }));
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let client = JenkinsClient::new("https://ci.example.org", None, None);
        let err = JenkinsSource::new(client, "[unclosed").unwrap_err();
        assert!(matches!(err, SourceError::Pattern { .. }));
    }

    #[tokio::test]
    async fn pattern_filters_the_job_listing() {
        let mut api = MockJenkinsApi::new();
        api.expect_list_job_names().returning(|| {
            Ok(vec![
                "widget-build".to_string(),
                "gadget-build".to_string(),
                "widget-deploy".to_string(),
            ])
        });

        let source = JenkinsSource::new(api, "^widget-").unwrap();
        assert_eq!(
            source.job_names().await.unwrap(),
            vec!["widget-build", "widget-deploy"]
        );
    }

    #[tokio::test]
    async fn unmatched_jobs_are_never_fetched() {
        let mut api = MockJenkinsApi::new();
        api.expect_list_job_names().returning(|| {
            Ok(vec!["widget-build".to_string(), "gadget-build".to_string()])
        });
        api.expect_fetch_job_config()
            .withf(|name| name == "widget-build")
            .times(1)
            .returning(|_| Ok("<project><description>x</description></project>".to_string()));

        let source = JenkinsSource::new(api, "^widget-").unwrap();
        for name in source.job_names().await.unwrap() {
            let tree = source.job_tree(&name).await.unwrap();
            assert_eq!(tree.root_tag, "project");
        }
    }

    #[tokio::test]
    async fn unreachable_server_is_an_http_error() {
        let client = JenkinsClient::new("http://127.0.0.1:1", None, None);
        let err = client.list_job_names().await.unwrap_err();
        assert!(matches!(err, SourceError::Http { .. }));
    }
}
