//! Screen resolution from session state

/// Requested destination, from the command line or a screen transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Root,
    SessionEntry,
    Dashboard,
    Unknown,
}

/// What actually renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    SessionEntry,
    Dashboard,
}

/// Pure routing rule, re-evaluated on every render. Holds no state of its
/// own; the session store is the only input.
pub fn resolve(route: Route, authenticated: bool) -> Screen {
    let destination = match route {
        // Unknown paths redirect to the root; the root is the dashboard.
        Route::Unknown | Route::Root => Route::Dashboard,
        other => other,
    };

    match destination {
        Route::SessionEntry if !authenticated => Screen::SessionEntry,
        // The entry screen hands an authenticated session onward; protected
        // screens bounce unauthenticated ones back.
        _ if authenticated => Screen::Dashboard,
        _ => Screen::SessionEntry,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::{SessionStore, SessionToken};
    use crate::store::memory::MemoryTokenStore;
    use std::sync::Arc;

    #[test]
    fn test_protected_screen_requires_a_session() {
        assert_eq!(resolve(Route::Dashboard, false), Screen::SessionEntry);
        assert_eq!(resolve(Route::Dashboard, true), Screen::Dashboard);
    }

    #[test]
    fn test_entry_screen_redirects_authenticated_sessions() {
        assert_eq!(resolve(Route::SessionEntry, true), Screen::Dashboard);
        assert_eq!(resolve(Route::SessionEntry, false), Screen::SessionEntry);
    }

    #[test]
    fn test_unknown_and_root_follow_the_dashboard_rule() {
        for route in [Route::Unknown, Route::Root] {
            assert_eq!(resolve(route, false), Screen::SessionEntry);
            assert_eq!(resolve(route, true), Screen::Dashboard);
        }
    }

    #[test]
    fn test_logout_and_relogin_drive_the_route() {
        let store = SessionStore::new(Arc::new(MemoryTokenStore::new()));

        store.login(SessionToken::new("tok")).unwrap();
        assert_eq!(
            resolve(Route::Dashboard, store.is_authenticated()),
            Screen::Dashboard
        );

        store.logout().unwrap();
        assert_eq!(
            resolve(Route::Dashboard, store.is_authenticated()),
            Screen::SessionEntry
        );

        store.login(SessionToken::new("tok-2")).unwrap();
        assert_eq!(
            resolve(Route::Dashboard, store.is_authenticated()),
            Screen::Dashboard
        );
    }
}
