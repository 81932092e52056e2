//! Navigation menu tree and permission-based filtering.

use serde::{Deserialize, Serialize};

use crate::{Authorizer, Requirement, is_granted};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub key: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission: Option<Requirement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MenuItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
}

impl MenuItem {
    pub fn new(key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            icon: None,
            path: None,
            permission: None,
            children: Vec::new(),
            order: None,
        }
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn permission(mut self, requirement: impl Into<Requirement>) -> Self {
        self.permission = Some(requirement.into());
        self
    }

    pub fn children(mut self, children: Vec<MenuItem>) -> Self {
        self.children = children;
        self
    }

    pub fn order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }
}

/// Keep the nodes the caller may see.
///
/// A node survives when it has no requirement or the requirement is granted.
/// Surviving parents keep only surviving children; a parent whose children
/// were all removed stays as a leaf if it has a path of its own and is dropped
/// otherwise. Siblings are then stably sorted by `order` (absent = 0).
pub fn filter_menu<A: Authorizer + ?Sized>(items: &[MenuItem], authz: &A) -> Vec<MenuItem> {
    let mut kept: Vec<MenuItem> = items
        .iter()
        .filter(|item| match &item.permission {
            None => true,
            Some(req) => is_granted(authz, req),
        })
        .filter_map(|item| {
            if item.children.is_empty() {
                return Some(item.clone());
            }

            let children = filter_menu(&item.children, authz);
            if !children.is_empty() || item.path.is_some() {
                Some(MenuItem {
                    children,
                    ..item.clone()
                })
            } else {
                None
            }
        })
        .collect();

    kept.sort_by_key(|item| item.order.unwrap_or(0));
    kept
}

/// The client's built-in menu.
pub fn default_menu() -> Vec<MenuItem> {
    vec![
        MenuItem::new("dashboard", "Dashboard")
            .icon("DashboardOutlined")
            .path("/dashboard"),
        MenuItem::new("project-management", "Projects")
            .icon("ProjectOutlined")
            .permission("project:read")
            .children(vec![
                MenuItem::new("project", "Project list")
                    .path("/project")
                    .permission("project:read"),
                MenuItem::new("requirement", "Requirements")
                    .path("/requirement")
                    .permission("requirement:read"),
                MenuItem::new("task", "Tasks").path("/task").permission("task:read"),
                MenuItem::new("bug", "Bugs").path("/bug").permission("bug:read"),
                // versions, test cases and products ride on the project grant
                MenuItem::new("version", "Versions")
                    .path("/version")
                    .permission("project:read"),
                MenuItem::new("test-case", "Test cases")
                    .path("/test-case")
                    .permission("project:read"),
                MenuItem::new("product", "Products")
                    .path("/product")
                    .permission("project:read"),
            ]),
        MenuItem::new("resource-management", "Resources")
            .icon("TeamOutlined")
            .permission("resource:read")
            .children(vec![
                MenuItem::new("resource-statistics", "Resource statistics")
                    .path("/resource/statistics")
                    .permission("resource:read"),
            ]),
        MenuItem::new("system-management", "System")
            .icon("SettingOutlined")
            .permission(Requirement::any_of(["user:read", "department:read", "permission:manage"]))
            .children(vec![
                MenuItem::new("user", "Users").path("/user").permission("user:read"),
                MenuItem::new("department", "Departments")
                    .path("/department")
                    .permission("department:read"),
                MenuItem::new("permission", "Permissions")
                    .path("/permission")
                    .permission("permission:manage"),
                MenuItem::new("wechat-settings", "WeChat settings")
                    .path("/system/wechat-settings")
                    .permission("permission:manage"),
            ]),
    ]
}
