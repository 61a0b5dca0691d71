use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The kinds of resource a user can share. Deserialized from the plural
/// path segment (`/api/sharing/projects/...`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ShareKind {
    #[serde(rename = "projects")]
    Project,
    #[serde(rename = "videos")]
    Video,
    #[serde(rename = "folders")]
    Folder,
}

impl ShareKind {
    pub fn resource_table(&self) -> &'static str {
        match self {
            ShareKind::Project => "projects",
            ShareKind::Video => "videos",
            ShareKind::Folder => "folders",
        }
    }

    pub fn share_table(&self) -> &'static str {
        match self {
            ShareKind::Project => "project_shares",
            ShareKind::Video => "video_shares",
            ShareKind::Folder => "folder_shares",
        }
    }

    /// Foreign-key column on the share table.
    pub fn resource_column(&self) -> &'static str {
        match self {
            ShareKind::Project => "project_id",
            ShareKind::Video => "video_id",
            ShareKind::Folder => "folder_id",
        }
    }

    /// Column shown as the resource's display title.
    pub fn title_column(&self) -> &'static str {
        match self {
            ShareKind::Video => "original_name",
            ShareKind::Project | ShareKind::Folder => "name",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ShareKind::Project => "Project",
            ShareKind::Video => "Video",
            ShareKind::Folder => "Folder",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ShareRole {
    Viewer,
    Editor,
}

impl ShareRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShareRole::Viewer => "VIEWER",
            ShareRole::Editor => "EDITOR",
        }
    }
}

impl FromStr for ShareRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VIEWER" => Ok(ShareRole::Viewer),
            "EDITOR" => Ok(ShareRole::Editor),
            other => Err(format!("Invalid role '{other}', expected VIEWER or EDITOR")),
        }
    }
}

impl fmt::Display for ShareRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an upsert created a new share or overwrote an existing role.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ShareOutcome {
    Created,
    Updated,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OwnerSummary {
    pub name: String,
    pub email: String,
}

/// A resource shared with the requesting user, annotated with the granted role.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SharedItem {
    pub id: Uuid,
    pub title: String,
    pub shared_role: ShareRole,
    pub owner: Option<OwnerSummary>,
    pub shared_at: DateTime<Utc>,
}

/// Row shape of the shared-with-me join, before the owner is folded in.
#[derive(Debug, Clone, FromRow)]
pub struct SharedItemRow {
    pub id: Uuid,
    pub title: String,
    pub role: String,
    pub shared_at: DateTime<Utc>,
    pub owner_name: Option<String>,
    pub owner_email: Option<String>,
}

impl TryFrom<SharedItemRow> for SharedItem {
    type Error = String;

    fn try_from(row: SharedItemRow) -> Result<Self, Self::Error> {
        let owner = match (row.owner_name, row.owner_email) {
            (Some(name), Some(email)) => Some(OwnerSummary { name, email }),
            _ => None,
        };
        Ok(SharedItem {
            id: row.id,
            title: row.title,
            shared_role: row.role.parse()?,
            owner,
            shared_at: row.shared_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Collaborator {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub role: ShareRole,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct CollaboratorRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<CollaboratorRow> for Collaborator {
    type Error = String;

    fn try_from(row: CollaboratorRow) -> Result<Self, Self::Error> {
        Ok(Collaborator {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            email: row.email,
            avatar_url: row.avatar_url,
            role: row.role.parse()?,
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_path_segment() {
        let kind: ShareKind = serde_json::from_str("\"videos\"").unwrap();
        assert_eq!(kind, ShareKind::Video);
        assert_eq!(kind.share_table(), "video_shares");
        assert_eq!(kind.resource_column(), "video_id");
        assert!(serde_json::from_str::<ShareKind>("\"scenes\"").is_err());
    }

    #[test]
    fn test_role_parse_rejects_unknown() {
        assert_eq!("EDITOR".parse::<ShareRole>().unwrap(), ShareRole::Editor);
        assert!("OWNER".parse::<ShareRole>().is_err());
    }

    #[test]
    fn test_shared_item_without_owner() {
        let row = SharedItemRow {
            id: Uuid::new_v4(),
            title: "Trailer cut".into(),
            role: "VIEWER".into(),
            shared_at: Utc::now(),
            owner_name: None,
            owner_email: None,
        };
        let item = SharedItem::try_from(row).unwrap();
        assert_eq!(item.shared_role, ShareRole::Viewer);
        assert!(item.owner.is_none());
    }
}
