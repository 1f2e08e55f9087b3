use serde::Serialize;
use std::fmt;
use tracing::debug;

/// The four mutually exclusive top-level views.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Home,
    Result,
    Compare,
    History,
}

impl View {
    pub const ALL: [View; 4] = [View::Home, View::Result, View::Compare, View::History];

    pub fn name(self) -> &'static str {
        match self {
            View::Home => "home",
            View::Result => "result",
            View::Compare => "compare",
            View::History => "history",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Navigation controls. There is no `result` control.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NavControl {
    Home,
    Compare,
    History,
}

impl NavControl {
    pub const ALL: [NavControl; 3] = [NavControl::Home, NavControl::Compare, NavControl::History];

    pub fn id(self) -> &'static str {
        match self {
            NavControl::Home => "home",
            NavControl::Compare => "compare",
            NavControl::History => "history",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|control| control.id() == id)
    }

    /// `home` targets the Home view; every other control targets the view
    /// of the same name.
    pub fn target(self) -> View {
        match self {
            NavControl::Home => View::Home,
            NavControl::Compare => View::Compare,
            NavControl::History => View::History,
        }
    }
}

/// Outcome of a successful transition.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct Activation {
    pub view: View,
    pub control: NavControl,
    /// Set when the History view was just shown and its lists must be
    /// rebuilt from the store.
    pub refresh_history: bool,
}

#[derive(Debug, Clone)]
pub struct ViewController {
    active_view: View,
    active_control: NavControl,
}

impl Default for ViewController {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewController {
    pub fn new() -> Self {
        Self {
            active_view: View::Home,
            active_control: NavControl::Home,
        }
    }

    pub fn active_view(&self) -> View {
        self.active_view
    }

    pub fn active_control(&self) -> NavControl {
        self.active_control
    }

    pub fn is_visible(&self, view: View) -> bool {
        self.active_view == view
    }

    /// Activates the control with the given id. `None` or an id outside the
    /// navigation set leaves the state untouched and returns `None`.
    pub fn activate(&mut self, control_id: Option<&str>) -> Option<Activation> {
        let Some(control) = control_id.and_then(NavControl::from_id) else {
            debug!(?control_id, "ignoring unresolvable navigation control");
            return None;
        };
        Some(self.activate_control(control))
    }

    pub fn activate_control(&mut self, control: NavControl) -> Activation {
        self.set(control.target(), control)
    }

    /// Shows the Result view while the `home` control stays marked active.
    pub fn show_result(&mut self) -> Activation {
        self.set(View::Result, NavControl::Home)
    }

    fn set(&mut self, view: View, control: NavControl) -> Activation {
        self.active_control = control;
        self.active_view = view;
        debug!(view = %view, control = control.id(), "view activated");
        Activation {
            view,
            control,
            refresh_history: view == View::History,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_on_home() {
        let views = ViewController::new();
        assert_eq!(views.active_view(), View::Home);
        assert_eq!(views.active_control(), NavControl::Home);
    }

    #[test]
    fn null_or_unknown_control_is_a_no_op() {
        let mut views = ViewController::new();
        views.activate(Some("compare"));
        assert_eq!(views.activate(None), None);
        assert_eq!(views.activate(Some("result")), None);
        assert_eq!(views.activate(Some("settings")), None);
        assert_eq!(views.active_view(), View::Compare);
        assert_eq!(views.active_control(), NavControl::Compare);
    }

    #[test]
    fn history_activation_requests_refresh() {
        let mut views = ViewController::new();
        let activation = views.activate(Some("history")).unwrap();
        assert!(activation.refresh_history);
        assert_eq!(activation.view, View::History);
        let activation = views.activate(Some("home")).unwrap();
        assert!(!activation.refresh_history);
        assert_eq!(activation.view, View::Home);
    }

    #[test]
    fn result_view_keeps_home_control_active() {
        let mut views = ViewController::new();
        views.activate(Some("history"));
        let activation = views.show_result();
        assert_eq!(activation.view, View::Result);
        assert_eq!(activation.control, NavControl::Home);
        assert!(views.is_visible(View::Result));
        assert!(!views.is_visible(View::Home));
    }
}
