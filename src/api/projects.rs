//! Project board models (`/api/projects`) and client-side filtering.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProjectStatus {
    #[serde(rename = "To Do")]
    ToDo,
    #[serde(rename = "In Progress")]
    InProgress,
    Review,
    Done,
}

impl ProjectStatus {
    pub const ALL: [Self; 4] = [Self::ToDo, Self::InProgress, Self::Review, Self::Done];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ToDo => "To Do",
            Self::InProgress => "In Progress",
            Self::Review => "Review",
            Self::Done => "Done",
        }
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s.chars().filter(|c| c.is_alphanumeric()).collect();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().replace(' ', "").eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| format!("unknown project status: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brand {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectTask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: ProjectStatus,
    pub priority: Priority,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub assignees: Vec<TeamMember>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub brand: Option<Brand>,
    pub status: ProjectStatus,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub tokens_used: u64,
    #[serde(default)]
    pub tokens_limit: u64,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub team: Vec<TeamMember>,
    #[serde(default)]
    pub tasks: Vec<ProjectTask>,
}

impl Project {
    /// Tasks grouped into board columns. Every status has an entry, empty or not.
    #[must_use]
    pub fn tasks_by_status(&self) -> BTreeMap<ProjectStatus, Vec<&ProjectTask>> {
        let mut columns: BTreeMap<_, Vec<&ProjectTask>> =
            ProjectStatus::ALL.into_iter().map(|s| (s, Vec::new())).collect();
        for task in &self.tasks {
            columns.entry(task.status).or_default().push(task);
        }
        columns
    }
}

/// `GET /api/projects` answers with `{ "projects": [...] }`; older servers
/// send the bare array.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum ProjectsBody {
    Wrapped { projects: Vec<Project> },
    Bare(Vec<Project>),
}

impl ProjectsBody {
    pub(crate) fn into_projects(self) -> Vec<Project> {
        match self {
            Self::Wrapped { projects } | Self::Bare(projects) => projects,
        }
    }
}

// =============================================================================
// FILTER
// =============================================================================

/// Conjunctive project filter. Unset criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectFilter {
    /// Case-insensitive substring of title or description.
    pub search: Option<String>,
    pub brand_id: Option<String>,
    /// Matches projects whose team includes this user.
    pub user_id: Option<String>,
    pub status: Option<ProjectStatus>,
}

impl ProjectFilter {
    #[must_use]
    pub fn matches(&self, project: &Project) -> bool {
        let search_ok = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()).is_none_or(|term| {
            let term = term.to_lowercase();
            project.title.to_lowercase().contains(&term) || project.description.to_lowercase().contains(&term)
        });
        let brand_ok = self
            .brand_id
            .as_deref()
            .is_none_or(|id| project.brand.as_ref().is_some_and(|b| b.id == id));
        let user_ok = self
            .user_id
            .as_deref()
            .is_none_or(|id| project.team.iter().any(|m| m.id == id));
        let status_ok = self.status.is_none_or(|s| project.status == s);

        search_ok && brand_ok && user_ok && status_ok
    }

    #[must_use]
    pub fn apply(&self, projects: Vec<Project>) -> Vec<Project> {
        projects.into_iter().filter(|p| self.matches(p)).collect()
    }
}

#[cfg(test)]
#[path = "projects_test.rs"]
mod tests;
