//! GitHub REST adapter (mirror).
//!
//! Repositories and branches paginate through the `Link` header. Branch
//! listings carry only the tip sha, so every branch costs one extra commit
//! lookup for its timestamp (`committer.date`, `…Z` format).

use serde::Deserialize;

use crate::http::{Auth, HttpClient, RequestPolicy};
use crate::normalizer::TimestampFormat;
use crate::{
    require_credential, trim_base, CommitPayload, RemoteBranch, RemoteProject, SourceAdapter,
    SourceError, Visibility,
};

#[derive(Debug, Clone)]
pub struct GithubAdapter {
    name: String,
    base_url: String,
    owner: String,
    client: HttpClient,
}

#[derive(Debug, Deserialize)]
struct Repo {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Branch {
    name: String,
    commit: BranchCommit,
}

#[derive(Debug, Deserialize)]
struct BranchCommit {
    sha: String,
}

impl GithubAdapter {
    pub fn new(
        name: impl Into<String>,
        base_url: &str,
        owner: &str,
        token: &str,
        policy: RequestPolicy,
    ) -> Result<Self, SourceError> {
        let name = name.into();
        require_credential(&name, "token", token)?;
        if owner.trim().is_empty() {
            return Err(SourceError::Config(format!("{name}: owner is required")));
        }

        let client = HttpClient::new(
            Auth::Header {
                name: "Authorization".to_string(),
                value: format!("token {}", token.trim()),
            },
            policy,
        )?;

        Ok(Self {
            name,
            base_url: trim_base(base_url),
            owner: owner.trim().to_string(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl SourceAdapter for GithubAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_projects(
        &self,
        _visibility: Visibility,
    ) -> Result<Vec<RemoteProject>, SourceError> {
        let url = format!("{}/users/{}/repos?per_page=100", self.base_url, self.owner);
        let repos: Vec<Repo> = self.client.get_all_pages(&url, "github repos").await?;
        Ok(repos
            .into_iter()
            .map(|r| RemoteProject::new(r.name.clone(), r.name))
            .collect())
    }

    async fn list_branches(
        &self,
        project: &RemoteProject,
        _visibility: Visibility,
    ) -> Result<Vec<RemoteBranch>, SourceError> {
        let url = format!(
            "{}/repos/{}/{}/branches?per_page=100",
            self.base_url, self.owner, project.id
        );
        let branches: Vec<Branch> = self.client.get_all_pages(&url, "github branches").await?;
        Ok(branches
            .into_iter()
            .map(|b| RemoteBranch {
                name: b.name,
                commit_id: b.commit.sha,
                timestamp: None,
            })
            .collect())
    }

    async fn resolve_commit_timestamp(
        &self,
        project: &RemoteProject,
        commit_id: &str,
        _visibility: Visibility,
    ) -> Result<f64, SourceError> {
        let url = format!(
            "{}/repos/{}/{}/git/commits/{}",
            self.base_url, self.owner, project.id, commit_id
        );
        let resp = self
            .client
            .get_json::<CommitPayload>(&url, "github commit")
            .await?;
        TimestampFormat::IsoZ.parse(&resp.body.committer.date)
    }
}
