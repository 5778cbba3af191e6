//! Static route table for the admin views and the side menu derived from it.

use std::collections::BTreeMap;

const MAX_REDIRECTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Layout,
    RequirementList,
    TestCaseList,
    Detail,
    Login,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteMeta {
    pub title: &'static str,
    pub icon: Option<&'static str>,
    pub hidden: bool,
}

impl RouteMeta {
    const NONE: RouteMeta = RouteMeta {
        title: "",
        icon: None,
        hidden: false,
    };
}

#[derive(Debug, PartialEq, Eq)]
pub struct Route {
    /// Absolute for top-level routes, relative to the parent for children.
    pub path: &'static str,
    pub name: Option<&'static str>,
    pub view: Option<View>,
    pub redirect: Option<&'static str>,
    pub meta: RouteMeta,
    pub children: &'static [Route],
}

pub static ROUTES: &[Route] = &[
    Route {
        path: "/",
        name: None,
        view: Some(View::Layout),
        redirect: Some("/requirements"),
        meta: RouteMeta::NONE,
        children: &[
            Route {
                path: "requirements",
                name: Some("RequirementList"),
                view: Some(View::RequirementList),
                redirect: None,
                meta: RouteMeta {
                    title: "Requirements",
                    icon: Some("Document"),
                    hidden: false,
                },
                children: &[],
            },
            Route {
                path: "cases",
                name: Some("TestCaseList"),
                view: Some(View::TestCaseList),
                redirect: None,
                meta: RouteMeta {
                    title: "Test Cases",
                    icon: Some("List"),
                    hidden: false,
                },
                children: &[],
            },
            Route {
                path: "detail/:id",
                name: None,
                view: Some(View::Detail),
                redirect: None,
                meta: RouteMeta {
                    title: "Detail",
                    icon: None,
                    hidden: true,
                },
                children: &[],
            },
        ],
    },
    Route {
        path: "/login",
        name: None,
        view: Some(View::Login),
        redirect: None,
        meta: RouteMeta {
            title: "",
            icon: None,
            hidden: true,
        },
        children: &[],
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    pub path: String,
    pub route: &'static Route,
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEntry {
    pub path: String,
    pub title: &'static str,
    pub icon: Option<&'static str>,
}

fn join(parent: &str, child: &str) -> String {
    if child.starts_with('/') {
        child.to_string()
    } else {
        format!("{}/{child}", parent.trim_end_matches('/'))
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn flatten(routes: &'static [Route], parent: &str, out: &mut Vec<(String, &'static Route)>) {
    for route in routes {
        let full = join(parent, route.path);
        out.push((full.clone(), route));
        flatten(route.children, &full, out);
    }
}

fn match_pattern(pattern: &str, path: &str) -> Option<BTreeMap<String, String>> {
    let pattern = segments(pattern);
    let path = segments(path);
    if pattern.len() != path.len() {
        return None;
    }

    let mut params = BTreeMap::new();
    for (expected, actual) in pattern.iter().zip(path.iter()) {
        match expected.strip_prefix(':') {
            Some(name) => {
                params.insert(name.to_string(), (*actual).to_string());
            }
            None if expected == actual => {}
            None => return None,
        }
    }
    Some(params)
}

/// Finds the route for `path`, following redirects. Query strings are ignored.
pub fn resolve(path: &str) -> Option<ResolvedRoute> {
    let mut table = Vec::new();
    flatten(ROUTES, "/", &mut table);

    let mut current = path.split('?').next().unwrap_or_default().to_string();
    for _ in 0..MAX_REDIRECTS {
        let (pattern, route, params) = table.iter().find_map(|(pattern, route)| {
            match_pattern(pattern, &current).map(|params| (pattern, *route, params))
        })?;

        match route.redirect {
            Some(target) => current = target.to_string(),
            None => {
                tracing::trace!(path, pattern = %pattern, "resolved route");
                return Some(ResolvedRoute {
                    path: current,
                    route,
                    params,
                });
            }
        }
    }

    tracing::warn!(path, "redirect limit reached while resolving route");
    None
}

/// Visible child routes of the layout, in declaration order.
pub fn menu() -> Vec<MenuEntry> {
    ROUTES
        .iter()
        .filter(|route| route.view == Some(View::Layout))
        .flat_map(|layout| {
            layout
                .children
                .iter()
                .filter(|child| !child.meta.hidden)
                .map(move |child| MenuEntry {
                    path: join(layout.path, child.path),
                    title: child.meta.title,
                    icon: child.meta.icon,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_redirects_to_requirements() {
        let resolved = resolve("/").expect("route");
        assert_eq!(resolved.path, "/requirements");
        assert_eq!(resolved.route.view, Some(View::RequirementList));
    }

    #[test]
    fn captures_detail_id() {
        let resolved = resolve("/detail/17?tab=cases").expect("route");
        assert_eq!(resolved.route.view, Some(View::Detail));
        assert_eq!(resolved.params.get("id").map(String::as_str), Some("17"));
    }

    #[test]
    fn trailing_slash_and_unknown_paths() {
        assert_eq!(
            resolve("/cases/").map(|r| r.route.name),
            Some(Some("TestCaseList"))
        );
        assert!(resolve("/detail").is_none());
        assert!(resolve("/nowhere").is_none());
    }

    #[test]
    fn menu_lists_visible_children_only() {
        let entries = menu();
        let paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["/requirements", "/cases"]);
        assert_eq!(entries[0].icon, Some("Document"));
    }
}
