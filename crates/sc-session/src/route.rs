//! Page access rules keyed on the connection marker.

pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    Redirect(&'static str),
}

/// Only `/` and `/login` are guarded; every other path passes through.
pub fn guard_route(path: &str, has_marker: bool) -> RouteDecision {
    match (path, has_marker) {
        (LOGIN_PATH, true) => RouteDecision::Redirect(HOME_PATH),
        (HOME_PATH, false) => RouteDecision::Redirect(LOGIN_PATH),
        _ => RouteDecision::Allow,
    }
}
