//! Channel naming.
//!
//! Unscoped names are global. A scoped name is `"<scope>/<name>"`, where the
//! scope is a context uuid. Scoping is purely textual: nothing on the wire
//! distinguishes a scoped envelope other than its name.

/// Separator between a scope and the channel name it qualifies.
pub const SCOPE_SEPARATOR: char = '/';

/// Reserved global channel names.
pub mod global {
    /// Call, plugin -> host. Returns a boolean.
    pub const READY: &str = "ready";
    /// Event, host -> plugin. Args: uuid, action, initial config.
    pub const INIT_CONTEXT: &str = "initContext";
    /// Call, host -> plugin. Returns the exported global form.
    pub const CONFIG_FORM: &str = "configForm";
    /// Call, host -> plugin. Arg: action. Returns that action's exported form.
    pub const ACTION_CONFIG_FORM: &str = "actionConfigForm";
    /// Event, host -> plugin. Pushes updated global settings.
    pub const SETTINGS: &str = "settings";
}

/// Reserved per-context channel names (relative to the context scope).
pub mod scoped {
    /// Event, plugin -> host.
    pub const SET_TEXT: &str = "setText";
    /// Event, plugin -> host.
    pub const SET_IMAGE: &str = "setImage";
    /// Event, plugin -> host.
    pub const SET_COLOR: &str = "setColor";
    /// Event, plugin -> host. Arg: `{file}`.
    pub const PLAY_SOUND: &str = "playSound";
    /// Event, host -> plugin.
    pub const PRESS_DOWN: &str = "pressDown";
    /// Event, host -> plugin. Arg: `{pressDuration}`.
    pub const PRESS_UP: &str = "pressUp";
    /// Event, host -> plugin. Pushes updated per-context settings.
    pub const SETTINGS: &str = "settings";
    /// Call, either direction. Returns a boolean acknowledgement.
    pub const STOP: &str = "stop";
    /// Call, host -> plugin. Returns the exported per-context form.
    pub const CONFIG_FORM: &str = "configForm";
}

/// Qualify `name` with an optional scope.
pub fn scoped_name(scope: Option<&str>, name: &str) -> String {
    match scope {
        Some(scope) => format!("{scope}{SCOPE_SEPARATOR}{name}"),
        None => name.to_owned(),
    }
}

/// Strip `scope/` from `full`, returning the scope-relative name.
///
/// Returns `None` when `full` does not belong to the scope. With no scope
/// the name is returned unchanged.
pub fn strip_scope<'a>(scope: Option<&str>, full: &'a str) -> Option<&'a str> {
    match scope {
        Some(scope) => full
            .strip_prefix(scope)
            .and_then(|rest| rest.strip_prefix(SCOPE_SEPARATOR)),
        None => Some(full),
    }
}

/// Compose a nested scope: `outer/inner`.
pub fn join_scope(outer: Option<&str>, inner: &str) -> String {
    scoped_name(outer, inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_name_prefixes() {
        assert_eq!(scoped_name(Some("u1"), "setText"), "u1/setText");
        assert_eq!(scoped_name(None, "ready"), "ready");
    }

    #[test]
    fn strip_scope_requires_separator() {
        assert_eq!(strip_scope(Some("u1"), "u1/stop"), Some("stop"));
        assert_eq!(strip_scope(Some("u1"), "u10/stop"), None);
        assert_eq!(strip_scope(Some("u1"), "stop"), None);
        assert_eq!(strip_scope(None, "stop"), Some("stop"));
    }

    #[test]
    fn nested_scopes_compose() {
        let outer = join_scope(None, "a");
        assert_eq!(join_scope(Some(&outer), "b"), "a/b");
    }
}
