//! Route table, locations and route resolution.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;
use url::form_urlencoded;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("no route matches '{0}'")]
    NotFound(String),
}

/// Every named route of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RouteName {
    Init,
    InitCallback,
    Login,
    WeChatCallback,
    WeChatAddUserCallback,
    ChangePassword,
    Dashboard,
    User,
    Permission,
    Department,
    BoardList,
    Gantt,
    Progress,
    ProjectDetail,
    Project,
    RequirementDetail,
    Requirement,
    BugDetail,
    Bug,
    TaskDetail,
    Task,
    VersionDetail,
    Version,
    TestCase,
    Product,
    Board,
    ResourceStatistics,
    Report,
    WeChatSettings,
    BackupSettings,
    LogSettings,
    CreateDailyReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteDef {
    pub name: RouteName,
    /// `/`-separated; `:param` segments capture.
    pub pattern: &'static str,
    pub requires_auth: bool,
}

const fn public(name: RouteName, pattern: &'static str) -> RouteDef {
    RouteDef {
        name,
        pattern,
        requires_auth: false,
    }
}

const fn private(name: RouteName, pattern: &'static str) -> RouteDef {
    RouteDef {
        name,
        pattern,
        requires_auth: true,
    }
}

pub const ROUTES: &[RouteDef] = &[
    public(RouteName::Init, "/init"),
    public(RouteName::InitCallback, "/init/callback"),
    public(RouteName::Login, "/login"),
    public(RouteName::WeChatCallback, "/auth/wechat/callback"),
    public(RouteName::WeChatAddUserCallback, "/auth/wechat/add-user/callback"),
    private(RouteName::ChangePassword, "/auth/change-password"),
    private(RouteName::Dashboard, "/dashboard"),
    private(RouteName::User, "/user"),
    private(RouteName::Permission, "/permission"),
    private(RouteName::Department, "/department"),
    private(RouteName::BoardList, "/project/:id/boards"),
    private(RouteName::Gantt, "/project/:id/gantt"),
    private(RouteName::Progress, "/project/:id/progress"),
    private(RouteName::ProjectDetail, "/project/:id"),
    private(RouteName::Project, "/project"),
    private(RouteName::RequirementDetail, "/requirement/:id"),
    private(RouteName::Requirement, "/requirement"),
    private(RouteName::BugDetail, "/bug/:id"),
    private(RouteName::Bug, "/bug"),
    private(RouteName::TaskDetail, "/task/:id"),
    private(RouteName::Task, "/task"),
    private(RouteName::VersionDetail, "/version/:id"),
    private(RouteName::Version, "/version"),
    private(RouteName::TestCase, "/test-case"),
    private(RouteName::Product, "/product"),
    private(RouteName::Board, "/board/:id"),
    private(RouteName::ResourceStatistics, "/resource/statistics"),
    private(RouteName::Report, "/reports"),
    // reachable before sign-in during system setup
    public(RouteName::WeChatSettings, "/system/wechat-settings"),
    private(RouteName::BackupSettings, "/system/backup-settings"),
    private(RouteName::LogSettings, "/system/log-settings"),
    private(RouteName::CreateDailyReport, "/reports/daily/create"),
];

// `ROUTES` is indexed by discriminant; a reordered or missing row fails the build.
const _: () = {
    assert!(ROUTES.len() == RouteName::CreateDailyReport as usize + 1);
    let mut i = 0;
    while i < ROUTES.len() {
        assert!(ROUTES[i].name as usize == i, "route table out of declaration order");
        i += 1;
    }
};

impl RouteName {
    pub const fn def(self) -> &'static RouteDef {
        &ROUTES[self as usize]
    }

    pub fn requires_auth(self) -> bool {
        self.def().requires_auth
    }

    /// Path of a parameterless route.
    pub fn path(self) -> &'static str {
        self.def().pattern
    }
}

impl fmt::Display for RouteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A path plus decoded query pairs, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl Location {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: Vec::new(),
        }
    }

    /// `"/login?redirect=%2Ftask"` into its parts.
    pub fn parse(raw: &str) -> Self {
        let (path, query) = raw.split_once('?').unwrap_or((raw, ""));
        let path = if path.is_empty() { "/" } else { path };
        Self {
            path: path.to_string(),
            query: form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn init() -> Self {
        Self::new(RouteName::Init.path())
    }

    pub fn login() -> Self {
        Self::new(RouteName::Login.path())
    }

    /// Login, remembering where the user was headed.
    pub fn login_redirect(intended: &Location) -> Self {
        Self::login().with_query("redirect", intended.to_string())
    }

    pub fn dashboard() -> Self {
        Self::new(RouteName::Dashboard.path())
    }

    pub fn change_password() -> Self {
        Self::new(RouteName::ChangePassword.path())
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)?;
        if !self.query.is_empty() {
            let encoded = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(self.query.iter())
                .finish();
            write!(f, "?{encoded}")?;
        }
        Ok(())
    }
}

impl From<&str> for Location {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<String> for Location {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

/// A resolved route being entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationTarget {
    pub name: RouteName,
    pub location: Location,
    pub params: BTreeMap<String, String>,
}

impl NavigationTarget {
    pub fn requires_auth(&self) -> bool {
        self.name.requires_auth()
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn full_path(&self) -> String {
        self.location.to_string()
    }
}

fn match_pattern(pattern: &str, path: &str) -> Option<BTreeMap<String, String>> {
    let mut expected = pattern.split('/').filter(|s| !s.is_empty());
    let mut actual = path.split('/').filter(|s| !s.is_empty());
    let mut params = BTreeMap::new();

    loop {
        match (expected.next(), actual.next()) {
            (None, None) => return Some(params),
            (Some(p), Some(a)) => {
                if let Some(name) = p.strip_prefix(':') {
                    params.insert(name.to_string(), a.to_string());
                } else if p != a {
                    return None;
                }
            }
            _ => return None,
        }
    }
}

/// Match a location against [`ROUTES`]. `/` is an alias of the dashboard.
pub fn resolve(location: &Location) -> Result<NavigationTarget, RouteError> {
    let trimmed = location.path.trim_end_matches('/');

    if trimmed.is_empty() {
        return Ok(NavigationTarget {
            name: RouteName::Dashboard,
            location: Location {
                path: RouteName::Dashboard.path().to_string(),
                query: location.query.clone(),
            },
            params: BTreeMap::new(),
        });
    }

    ROUTES
        .iter()
        .find_map(|route| {
            match_pattern(route.pattern, trimmed).map(|params| NavigationTarget {
                name: route.name,
                location: Location {
                    path: trimmed.to_string(),
                    query: location.query.clone(),
                },
                params,
            })
        })
        .ok_or_else(|| RouteError::NotFound(location.path.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_name_has_exactly_one_entry() {
        for route in ROUTES {
            assert_eq!(ROUTES.iter().filter(|r| r.name == route.name).count(), 1);
            assert_eq!(route.name.def(), route);
        }
    }

    #[test]
    fn lookup_by_name_hits_its_own_row() {
        assert_eq!(RouteName::Init.path(), "/init");
        assert_eq!(RouteName::Gantt.def().pattern, "/project/:id/gantt");
        assert_eq!(RouteName::CreateDailyReport.path(), "/reports/daily/create");
        assert!(!RouteName::WeChatSettings.requires_auth());
        assert!(RouteName::LogSettings.requires_auth());
    }

    #[test]
    fn root_aliases_the_dashboard() {
        let target = resolve(&Location::parse("/")).unwrap();
        assert_eq!(target.name, RouteName::Dashboard);
        assert_eq!(target.full_path(), "/dashboard");
    }

    #[test]
    fn captures_path_parameters() {
        let target = resolve(&Location::parse("/project/42/gantt")).unwrap();
        assert_eq!(target.name, RouteName::Gantt);
        assert_eq!(target.param("id"), Some("42"));

        let target = resolve(&Location::parse("/project/42/")).unwrap();
        assert_eq!(target.name, RouteName::ProjectDetail);
        assert_eq!(target.location.path, "/project/42");
    }

    #[test]
    fn unknown_paths_are_not_found() {
        assert_eq!(
            resolve(&Location::parse("/nope/1")),
            Err(RouteError::NotFound("/nope/1".into()))
        );
    }

    #[test]
    fn auth_requirements_follow_the_table() {
        assert!(!RouteName::Login.requires_auth());
        assert!(!RouteName::WeChatSettings.requires_auth());
        assert!(RouteName::ChangePassword.requires_auth());
        assert!(RouteName::CreateDailyReport.requires_auth());
    }

    #[test]
    fn query_round_trips_with_encoding() {
        let intended = Location::parse("/task?status=open&q=a b");
        let login = Location::login_redirect(&intended);

        let rendered = login.to_string();
        assert_eq!(rendered, "/login?redirect=%2Ftask%3Fstatus%3Dopen%26q%3Da%2Bb");

        let parsed = Location::parse(&rendered);
        assert_eq!(parsed.query_value("redirect"), Some("/task?status=open&q=a+b"));
        assert_eq!(Location::parse("/x?from=init").query_value("from"), Some("init"));
    }
}
