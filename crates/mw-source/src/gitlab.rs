//! GitLab REST adapter (mirror).
//!
//! `base_url` includes the API prefix (e.g. `https://gitlab.example/api/v4`).
//! Branch listings embed `commit.committed_date`, so the per-commit lookup is
//! only used when a listing omits it.

use serde::Deserialize;

use crate::http::{Auth, HttpClient, RequestPolicy};
use crate::normalizer::TimestampFormat;
use crate::{
    require_credential, trim_base, RemoteBranch, RemoteProject, SourceAdapter, SourceError,
    Visibility,
};

#[derive(Debug, Clone)]
pub struct GitlabAdapter {
    name: String,
    base_url: String,
    client: HttpClient,
}

#[derive(Debug, Deserialize)]
struct Project {
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct Branch {
    name: String,
    commit: Commit,
}

#[derive(Debug, Deserialize)]
struct Commit {
    id: String,
    #[serde(default)]
    committed_date: Option<String>,
}

impl GitlabAdapter {
    pub fn new(
        name: impl Into<String>,
        base_url: &str,
        token: &str,
        policy: RequestPolicy,
    ) -> Result<Self, SourceError> {
        let name = name.into();
        require_credential(&name, "token", token)?;

        let client = HttpClient::new(
            Auth::Header {
                name: "PRIVATE-TOKEN".to_string(),
                value: token.trim().to_string(),
            },
            policy,
        )?;

        Ok(Self {
            name,
            base_url: trim_base(base_url),
            client,
        })
    }
}

#[async_trait::async_trait]
impl SourceAdapter for GitlabAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_projects(
        &self,
        _visibility: Visibility,
    ) -> Result<Vec<RemoteProject>, SourceError> {
        let url = format!("{}/projects?membership=true&per_page=100", self.base_url);
        let projects: Vec<Project> = self.client.get_all_pages(&url, "gitlab projects").await?;
        Ok(projects
            .into_iter()
            .map(|p| RemoteProject::new(p.name, p.id.to_string()))
            .collect())
    }

    async fn list_branches(
        &self,
        project: &RemoteProject,
        _visibility: Visibility,
    ) -> Result<Vec<RemoteBranch>, SourceError> {
        let url = format!(
            "{}/projects/{}/repository/branches?per_page=100",
            self.base_url, project.id
        );
        let branches: Vec<Branch> = self.client.get_all_pages(&url, "gitlab branches").await?;

        branches
            .into_iter()
            .map(|b| {
                let timestamp = match b.commit.committed_date.as_deref() {
                    Some(raw) => Some(TimestampFormat::IsoOffsetWithMillis.parse(raw)?),
                    None => None,
                };
                Ok(RemoteBranch {
                    name: b.name,
                    commit_id: b.commit.id,
                    timestamp,
                })
            })
            .collect()
    }

    async fn resolve_commit_timestamp(
        &self,
        project: &RemoteProject,
        commit_id: &str,
        _visibility: Visibility,
    ) -> Result<f64, SourceError> {
        let url = format!(
            "{}/projects/{}/repository/commits/{}",
            self.base_url, project.id, commit_id
        );
        let resp = self
            .client
            .get_json::<Commit>(&url, "gitlab commit")
            .await?;
        let raw = resp.body.committed_date.ok_or_else(|| {
            SourceError::parse(
                "gitlab commit",
                format!("{}: commit {commit_id} has no committed_date", project.name),
            )
        })?;
        TimestampFormat::IsoOffsetWithMillis.parse(&raw)
    }
}
