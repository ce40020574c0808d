use crate::model::{ResourceKind, Tab};

const HISTORY_LIMIT: usize = 64;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Location {
    Home(ResourceKind),
    Resources(ResourceKind),
    Cli,
    Yaml,
    Namespaces,
    Charts,
    Settings,
}

impl Location {
    pub fn tab(self) -> Tab {
        match self {
            Self::Home(_) => Tab::Home,
            Self::Resources(_) => Tab::Resources,
            Self::Cli => Tab::Cli,
            Self::Yaml => Tab::Yaml,
            Self::Namespaces => Tab::Namespaces,
            Self::Charts => Tab::Charts,
            Self::Settings => Tab::Settings,
        }
    }

    pub fn resource_kind(self) -> Option<ResourceKind> {
        match self {
            Self::Home(kind) | Self::Resources(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn for_tab(tab: Tab, kind: ResourceKind) -> Self {
        match tab {
            Tab::Home => Self::Home(kind),
            Tab::Resources => Self::Resources(kind),
            Tab::Cli => Self::Cli,
            Tab::Yaml => Self::Yaml,
            Tab::Namespaces => Self::Namespaces,
            Tab::Charts => Self::Charts,
            Tab::Settings => Self::Settings,
        }
    }

    pub fn with_kind(self, kind: ResourceKind) -> Self {
        match self {
            Self::Home(_) => Self::Home(kind),
            Self::Resources(_) => Self::Resources(kind),
            other => other,
        }
    }
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ViewMemory {
    pub search: String,
    pub status_filter: Option<String>,
    pub selected: usize,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum NavEffect {
    /// Fetch the kind's first page unless fresh data is held.
    EnsureFresh(ResourceKind),
    InitializeTab(Tab),
    /// Drop every dashboard kind's data after leaving a detail view.
    InvalidateDashboard,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Transition {
    pub location: Location,
    pub restore: Option<ViewMemory>,
    pub effects: Vec<NavEffect>,
}

#[derive(Debug, Clone)]
pub struct Navigator {
    current: Location,
    back: Vec<(Location, ViewMemory)>,
    forward: Vec<(Location, ViewMemory)>,
    detail_visited: bool,
}

impl Navigator {
    pub fn new(start: Location) -> Self {
        Self {
            current: start,
            back: Vec::new(),
            forward: Vec::new(),
            detail_visited: false,
        }
    }

    pub fn current(&self) -> Location {
        self.current
    }

    pub fn can_go_back(&self) -> bool {
        !self.back.is_empty()
    }

    pub fn can_go_forward(&self) -> bool {
        !self.forward.is_empty()
    }

    /// The effects a location needs without changing history; used for
    /// the initial activation.
    pub fn initial_effects(&mut self) -> Vec<NavEffect> {
        self.effects_for(self.current)
    }

    pub fn activate(&mut self, target: Location, current_view: ViewMemory) -> Option<Transition> {
        if target == self.current {
            return None;
        }
        self.back.push((self.current, current_view));
        if self.back.len() > HISTORY_LIMIT {
            self.back.remove(0);
        }
        self.forward.clear();
        self.current = target;

        Some(Transition {
            location: target,
            restore: None,
            effects: self.effects_for(target),
        })
    }

    pub fn back(&mut self, current_view: ViewMemory) -> Option<Transition> {
        let (location, memory) = self.back.pop()?;
        self.forward.push((self.current, current_view));
        self.current = location;

        Some(Transition {
            location,
            restore: Some(memory),
            effects: self.effects_for(location),
        })
    }

    pub fn forward(&mut self, current_view: ViewMemory) -> Option<Transition> {
        let (location, memory) = self.forward.pop()?;
        self.back.push((self.current, current_view));
        self.current = location;

        Some(Transition {
            location,
            restore: Some(memory),
            effects: self.effects_for(location),
        })
    }

    pub fn enter_detail(&mut self) {
        self.detail_visited = true;
    }

    pub fn leave_detail(&mut self) -> Vec<NavEffect> {
        self.effects_for(self.current)
    }

    fn effects_for(&mut self, location: Location) -> Vec<NavEffect> {
        let mut effects = Vec::new();
        if std::mem::take(&mut self.detail_visited) {
            effects.push(NavEffect::InvalidateDashboard);
        }

        match location {
            Location::Home(kind) | Location::Resources(kind) => {
                effects.push(NavEffect::EnsureFresh(kind));
            }
            Location::Namespaces | Location::Charts | Location::Settings => {
                effects.push(NavEffect::InitializeTab(location.tab()));
            }
            Location::Cli | Location::Yaml => {}
        }
        effects
    }
}

#[cfg(test)]
mod tests {
    use super::{Location, NavEffect, Navigator, ViewMemory};
    use crate::model::{ResourceKind, Tab};

    fn memory(search: &str, selected: usize) -> ViewMemory {
        ViewMemory {
            search: search.to_string(),
            status_filter: None,
            selected,
        }
    }

    #[test]
    fn entering_resource_tab_requests_fresh_data() {
        let mut nav = Navigator::new(Location::Home(ResourceKind::Pods));
        let transition = nav
            .activate(Location::Home(ResourceKind::Services), ViewMemory::default())
            .unwrap();
        assert_eq!(
            transition.effects,
            vec![NavEffect::EnsureFresh(ResourceKind::Services)]
        );

        let transition = nav
            .activate(Location::Charts, ViewMemory::default())
            .unwrap();
        assert_eq!(transition.effects, vec![NavEffect::InitializeTab(Tab::Charts)]);
        assert!(nav.activate(Location::Charts, ViewMemory::default()).is_none());
    }

    #[test]
    fn back_and_forward_restore_view_memory() {
        let mut nav = Navigator::new(Location::Home(ResourceKind::Pods));
        nav.activate(Location::Resources(ResourceKind::Secrets), memory("api", 4));
        nav.activate(Location::Namespaces, memory("tls", 1));

        let back = nav.back(memory("", 0)).unwrap();
        assert_eq!(back.location, Location::Resources(ResourceKind::Secrets));
        assert_eq!(back.restore, Some(memory("tls", 1)));

        let back = nav.back(memory("tls", 2)).unwrap();
        assert_eq!(back.location, Location::Home(ResourceKind::Pods));
        assert_eq!(back.restore, Some(memory("api", 4)));
        assert!(nav.back(ViewMemory::default()).is_none());

        let forward = nav.forward(memory("api", 4)).unwrap();
        assert_eq!(forward.location, Location::Resources(ResourceKind::Secrets));
        assert_eq!(forward.restore, Some(memory("tls", 2)));
    }

    #[test]
    fn new_activation_clears_forward_history() {
        let mut nav = Navigator::new(Location::Cli);
        nav.activate(Location::Yaml, ViewMemory::default());
        nav.back(ViewMemory::default());
        assert!(nav.can_go_forward());
        nav.activate(Location::Settings, ViewMemory::default());
        assert!(!nav.can_go_forward());
    }

    #[test]
    fn leaving_detail_view_invalidates_dashboard_once() {
        let mut nav = Navigator::new(Location::Home(ResourceKind::Pods));
        nav.enter_detail();
        assert_eq!(
            nav.leave_detail(),
            vec![
                NavEffect::InvalidateDashboard,
                NavEffect::EnsureFresh(ResourceKind::Pods)
            ]
        );
        assert_eq!(
            nav.leave_detail(),
            vec![NavEffect::EnsureFresh(ResourceKind::Pods)]
        );
    }
}
