// View state for the robot list and robot detail screens.

pub mod detail;
pub mod list;

pub use detail::{LinkState, Pane, RobotDetailView, StatusIndicator};
pub use list::{robot_href, robot_id_from_href, RobotCard, RobotListView};

/// Two-state online indicator shared by list cards and the detail view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Presence {
    Online,
    #[default]
    Offline,
}

impl Presence {
    pub fn from_online(online: bool) -> Self {
        if online {
            Presence::Online
        } else {
            Presence::Offline
        }
    }

    /// CSS-style class name of the dot.
    pub fn class(self) -> &'static str {
        match self {
            Presence::Online => "online",
            Presence::Offline => "offline",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Presence::Online => "Online",
            Presence::Offline => "Offline",
        }
    }

    pub fn dot(self) -> char {
        match self {
            Presence::Online => '●',
            Presence::Offline => '○',
        }
    }
}
