// Robot list: one link card per roster entry with a live online badge.

use futures::future::join_all;

use super::Presence;
use crate::api::HubClient;
use crate::error::HubResult;
use crate::model::{RobotSummary, DEFAULT_THUMBNAIL};

/// Link target of a robot's detail page, with the id URL-encoded.
pub fn robot_href(id: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("id", id)
        .finish();
    format!("/robot?{query}")
}

/// Recover the robot id from a detail page link (relative or absolute).
pub fn robot_id_from_href(href: &str) -> Option<String> {
    let query = href.split_once('?')?.1;
    let query = query.split('#').next().unwrap_or(query);
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == "id")
        .map(|(_, v)| v.into_owned())
}

#[derive(Debug, Clone, PartialEq)]
pub struct RobotCard {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub thumbnail: String,
    pub href: String,
    pub presence: Presence,
}

impl RobotCard {
    pub fn from_summary(robot: &RobotSummary) -> Self {
        Self {
            id: robot.id.clone(),
            name: robot.name.clone(),
            kind: robot.kind.clone(),
            thumbnail: robot
                .thumbnail
                .clone()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_THUMBNAIL.to_string()),
            href: robot_href(&robot.id),
            presence: Presence::Offline,
        }
    }
}

/// The roster grid.
#[derive(Debug, Clone, Default)]
pub struct RobotListView {
    cards: Vec<RobotCard>,
}

impl RobotListView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cards(&self) -> &[RobotCard] {
        &self.cards
    }

    /// Replace all cards with one per robot, in roster order, badges offline.
    pub fn populate(&mut self, robots: &[RobotSummary]) {
        self.cards.clear();
        self.cards.extend(robots.iter().map(RobotCard::from_summary));
    }

    /// Update the badge of every card for `id`.
    pub fn set_presence(&mut self, id: &str, presence: Presence) {
        for card in self.cards.iter_mut().filter(|c| c.id == id) {
            card.presence = presence;
        }
    }

    /// Fetch the roster and every robot's status.
    ///
    /// Only the roster fetch can fail; a robot whose status cannot be read is
    /// shown offline.
    pub async fn load(&mut self, client: &HubClient) -> HubResult<()> {
        let robots = client.list_robots().await?;
        self.populate(&robots);
        tracing::debug!("roster has {} robots", robots.len());

        let statuses = join_all(robots.iter().map(|r| async move {
            (r.id.as_str(), client.is_online(&r.id).await)
        }))
        .await;
        for (id, online) in statuses {
            self.set_presence(id, Presence::from_online(online));
        }
        Ok(())
    }

    /// Render the grid as terminal text.
    pub fn render(&self) -> String {
        if self.cards.is_empty() {
            return "No robots registered.\n".to_string();
        }
        let mut out = String::new();
        for card in &self.cards {
            out.push_str(&format!(
                "{} {:<24} [{}] {:<7}  {}\n",
                card.presence.dot(),
                card.name,
                card.kind,
                card.presence.label(),
                card.href
            ));
        }
        out
    }
}
