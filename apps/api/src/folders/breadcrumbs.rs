use std::collections::HashSet;

use serde::Serialize;
use uuid::Uuid;

use crate::models::folder::FolderLink;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Breadcrumb {
    pub id: Option<Uuid>,
    pub name: String,
    pub path: String,
}

/// Builds a root-first breadcrumb trail from an ancestor chain ordered
/// root-most first, ending at the requested folder. The trail is followed
/// upward from the requested folder and stops at the first link that is not
/// the parent of the one before it or that repeats, so a truncated or
/// cyclic hierarchy still ends at the requested folder.
pub fn build_breadcrumbs(chain: &[FolderLink], root_path: &str) -> Vec<Breadcrumb> {
    let mut seen = HashSet::new();
    let mut trail: Vec<&FolderLink> = Vec::new();
    for link in chain.iter().rev() {
        if let Some(child) = trail.last() {
            if child.parent_id != Some(link.id) {
                break;
            }
        }
        if !seen.insert(link.id) {
            break;
        }
        trail.push(link);
    }

    let mut crumbs = vec![Breadcrumb {
        id: None,
        name: "Root".to_string(),
        path: root_path.to_string(),
    }];
    crumbs.extend(trail.into_iter().rev().map(|link| Breadcrumb {
        id: Some(link.id),
        name: link.name.clone(),
        path: link.path.clone(),
    }));
    crumbs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(id: Uuid, name: &str, parent_id: Option<Uuid>) -> FolderLink {
        FolderLink {
            id,
            name: name.to_string(),
            parent_id,
            path: format!("/storage/{name}"),
        }
    }

    #[test]
    fn test_root_only() {
        let crumbs = build_breadcrumbs(&[], "/storage");
        assert_eq!(crumbs.len(), 1);
        assert_eq!(crumbs[0].name, "Root");
        assert!(crumbs[0].id.is_none());
    }

    #[test]
    fn test_nested_chain_is_root_first() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let chain = vec![
            link(a, "Clients", None),
            link(b, "Acme", Some(a)),
            link(c, "Spring Campaign", Some(b)),
        ];
        let names: Vec<_> = build_breadcrumbs(&chain, "/storage")
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, ["Root", "Clients", "Acme", "Spring Campaign"]);
    }

    fn names(crumbs: Vec<Breadcrumb>) -> Vec<String> {
        crumbs.into_iter().map(|c| c.name).collect()
    }

    #[test]
    fn test_broken_chain_keeps_requested_folder() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let chain = vec![
            link(a, "Clients", None),
            link(b, "Orphan", Some(Uuid::new_v4())),
            link(c, "Takes", Some(b)),
        ];
        assert_eq!(
            names(build_breadcrumbs(&chain, "/storage")),
            ["Root", "Orphan", "Takes"]
        );
    }

    #[test]
    fn test_depth_limited_chain_keeps_tail() {
        let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        // The root-most folder was cut off, so the first link still has a parent.
        let chain = vec![
            link(ids[1], "L1", Some(ids[0])),
            link(ids[2], "L2", Some(ids[1])),
            link(ids[3], "L3", Some(ids[2])),
        ];
        let crumbs = build_breadcrumbs(&chain, "/storage");
        assert_eq!(names(crumbs.clone()), ["Root", "L1", "L2", "L3"]);
        assert_eq!(crumbs.last().unwrap().id, Some(ids[3]));
    }

    #[test]
    fn test_cycle_stops_at_repeat() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        // a and b point at each other; the recursive lookup repeats them.
        let chain = vec![
            link(b, "B", Some(a)),
            link(a, "A", Some(b)),
            link(b, "B", Some(a)),
            link(a, "A", Some(b)),
        ];
        assert_eq!(names(build_breadcrumbs(&chain, "/storage")), ["Root", "B", "A"]);
    }
}
