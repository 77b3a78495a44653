//! Gerrit REST adapter (authoritative source).
//!
//! Gerrit answers with `)]}'`-guarded JSON. Project listing paginates via
//! `n`/`S` query parameters; the last entry of a truncated page carries
//! `"_more_projects": true`. Branch listing pages with `n`/`s` and carries no
//! marker, so a short page is the last one. Authenticated calls live under
//! `/a/` and see private projects; anonymous calls see only public ones, which
//! is what makes this the one provider with visibility partitions.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Deserialize;
use tracing::debug;

use crate::http::{Auth, HttpClient, RequestPolicy};
use crate::normalizer::{branch_key, TimestampFormat};
use crate::pagination::{collect_pages, Page};
use crate::{
    require_credential, trim_base, CommitPayload, RemoteBranch, RemoteProject, SourceAdapter,
    SourceError, Visibility,
};

pub const DEFAULT_PAGE_SIZE: usize = 500;

#[derive(Debug, Clone)]
pub struct GerritAdapter {
    name: String,
    base_url: String,
    authenticated: HttpClient,
    anonymous: HttpClient,
    page_size: usize,
}

#[derive(Debug, Deserialize)]
struct ProjectInfo {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "_more_projects", default)]
    more_projects: bool,
}

#[derive(Debug, Deserialize)]
struct BranchInfo {
    #[serde(rename = "ref")]
    reference: String,
    #[serde(default)]
    revision: Option<String>,
}

impl GerritAdapter {
    pub fn new(
        name: impl Into<String>,
        base_url: &str,
        username: &str,
        password: &str,
        policy: RequestPolicy,
    ) -> Result<Self, SourceError> {
        let name = name.into();
        require_credential(&name, "username", username)?;
        require_credential(&name, "password", password)?;

        let authenticated = HttpClient::new(
            Auth::Basic {
                username: username.to_string(),
                password: password.to_string(),
            },
            policy,
        )?;
        let anonymous = authenticated.anonymous();

        Ok(Self {
            name,
            base_url: trim_base(base_url),
            authenticated,
            anonymous,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn client(&self, visibility: Visibility) -> &HttpClient {
        match visibility {
            Visibility::All => &self.authenticated,
            Visibility::Public => &self.anonymous,
        }
    }

    fn api_url(&self, visibility: Visibility, path: &str) -> String {
        match visibility {
            Visibility::All => format!("{}/a/{}", self.base_url, path),
            Visibility::Public => format!("{}/{}", self.base_url, path),
        }
    }

    fn projects_url(&self, visibility: Visibility, skip: usize) -> String {
        self.api_url(
            visibility,
            &format!("projects/?n={}&S={}", self.page_size, skip),
        )
    }

    fn branches_url(&self, visibility: Visibility, project: &RemoteProject, skip: usize) -> String {
        self.api_url(
            visibility,
            &format!("projects/{}/branches/?n={}&s={}", project.id, self.page_size, skip),
        )
    }
}

/// Gerrit ids are URL-encoded names; fall back to encoding the name ourselves.
fn project_id(name: &str, info: &ProjectInfo) -> String {
    match &info.id {
        Some(id) if !id.is_empty() => id.clone(),
        _ => name.replace('/', "%2F"),
    }
}

#[async_trait::async_trait]
impl SourceAdapter for GerritAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_visibility_partitions(&self) -> bool {
        true
    }

    async fn list_projects(
        &self,
        visibility: Visibility,
    ) -> Result<Vec<RemoteProject>, SourceError> {
        let client = self.client(visibility);
        let offset = AtomicUsize::new(0);
        let offset = &offset;

        collect_pages(self.projects_url(visibility, 0), |url| async move {
            let resp = client
                .get_json::<BTreeMap<String, ProjectInfo>>(&url, "gerrit projects")
                .await?;

            let more = resp.body.values().any(|p| p.more_projects);
            let items: Vec<RemoteProject> = resp
                .body
                .iter()
                .map(|(name, info)| RemoteProject::new(name.clone(), project_id(name, info)))
                .collect();

            let seen = offset.fetch_add(items.len(), Ordering::SeqCst) + items.len();
            let next = if more && !items.is_empty() {
                Some(self.projects_url(visibility, seen))
            } else {
                None
            };
            debug!(source = %self.name, page = items.len(), more, "gerrit project page");
            Ok(Page { items, next })
        })
        .await
    }

    async fn list_branches(
        &self,
        project: &RemoteProject,
        visibility: Visibility,
    ) -> Result<Vec<RemoteBranch>, SourceError> {
        let client = self.client(visibility);
        let offset = AtomicUsize::new(0);
        let offset = &offset;

        let refs = collect_pages(self.branches_url(visibility, project, 0), |url| async move {
            let resp = client
                .get_json::<Vec<BranchInfo>>(&url, "gerrit branches")
                .await?;
            let seen = offset.fetch_add(resp.body.len(), Ordering::SeqCst) + resp.body.len();
            let next = if resp.body.len() >= self.page_size {
                Some(self.branches_url(visibility, project, seen))
            } else {
                None
            };
            Ok(Page {
                items: resp.body,
                next,
            })
        })
        .await?;

        let mut out = Vec::with_capacity(refs.len());
        for b in refs {
            let Some(name) = branch_key(&b.reference) else {
                continue;
            };
            let commit_id = b.revision.filter(|r| !r.is_empty()).ok_or_else(|| {
                SourceError::parse(
                    "gerrit branches",
                    format!("{}: ref {} has no revision", project.name, b.reference),
                )
            })?;
            out.push(RemoteBranch {
                name,
                commit_id,
                timestamp: None,
            });
        }
        Ok(out)
    }

    async fn resolve_commit_timestamp(
        &self,
        project: &RemoteProject,
        commit_id: &str,
        visibility: Visibility,
    ) -> Result<f64, SourceError> {
        let url = self.api_url(
            visibility,
            &format!("projects/{}/commits/{}", project.id, commit_id),
        );
        let resp = self
            .client(visibility)
            .get_json::<CommitPayload>(&url, "gerrit commit")
            .await?;
        TimestampFormat::SimpleUtc.parse(&resp.body.committer.date)
    }
}
