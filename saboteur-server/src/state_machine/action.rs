//! Button action tokens.
//!
//! Every button we send carries a short string token. Pressing it comes back
//! to us as that token, which is parsed here into an [`Action`].

use saboteur_core::{PlayerId, SabotageKind, SettingField, VoteTarget};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    // Lobby
    Ready,
    OpenSettings,
    AdjustSetting { field: SettingField, increase: bool },
    CloseSettings,
    // Round
    ViewTasks,
    ReportBody,
    EmergencyMeeting,
    ReportOwnDeath,
    ConfirmOwnDeath,
    KillMenu,
    Kill(PlayerId),
    SabotageMenu,
    Sabotage(SabotageKind),
    FixSabotage,
    // Meeting
    Vote(VoteTarget),
    /// Anything we could not parse. Kept so the sender can be told.
    Unknown(String),
}

impl Action {
    pub fn parse(token: &str) -> Self {
        let token = token.trim();
        match token {
            "ready" => return Action::Ready,
            "settings" => return Action::OpenSettings,
            "settings_back" => return Action::CloseSettings,
            "tasks" => return Action::ViewTasks,
            "report_body" => return Action::ReportBody,
            "emergency_meeting" => return Action::EmergencyMeeting,
            "killed" => return Action::ReportOwnDeath,
            "killed_confirm" => return Action::ConfirmOwnDeath,
            "kill" => return Action::KillMenu,
            "sabotage" => return Action::SabotageMenu,
            "fix_sabotage" => return Action::FixSabotage,
            "vote_skip" => return Action::Vote(VoteTarget::Skip),
            _ => {}
        }

        let parsed = if let Some(rest) = token.strip_prefix("settings_") {
            rest.rsplit_once('_').and_then(|(field, direction)| {
                let field = SettingField::from_token(field)?;
                let increase = match direction {
                    "plus" => true,
                    "minus" => false,
                    _ => return None,
                };
                Some(Action::AdjustSetting { field, increase })
            })
        } else if let Some(rest) = token.strip_prefix("kill_") {
            rest.parse().ok().map(|id| Action::Kill(PlayerId(id)))
        } else if let Some(rest) = token.strip_prefix("sabotage_") {
            SabotageKind::from_token(rest).map(Action::Sabotage)
        } else if let Some(rest) = token.strip_prefix("vote_") {
            rest.parse()
                .ok()
                .map(|id| Action::Vote(VoteTarget::Player(PlayerId(id))))
        } else {
            None
        };

        parsed.unwrap_or_else(|| Action::Unknown(token.to_string()))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Ready => write!(f, "ready"),
            Action::OpenSettings => write!(f, "settings"),
            Action::AdjustSetting { field, increase } => write!(
                f,
                "settings_{}_{}",
                field.token(),
                if *increase { "plus" } else { "minus" }
            ),
            Action::CloseSettings => write!(f, "settings_back"),
            Action::ViewTasks => write!(f, "tasks"),
            Action::ReportBody => write!(f, "report_body"),
            Action::EmergencyMeeting => write!(f, "emergency_meeting"),
            Action::ReportOwnDeath => write!(f, "killed"),
            Action::ConfirmOwnDeath => write!(f, "killed_confirm"),
            Action::KillMenu => write!(f, "kill"),
            Action::Kill(target) => write!(f, "kill_{}", target),
            Action::SabotageMenu => write!(f, "sabotage"),
            Action::Sabotage(kind) => write!(f, "sabotage_{}", kind.token()),
            Action::FixSabotage => write!(f, "fix_sabotage"),
            Action::Vote(VoteTarget::Skip) => write!(f, "vote_skip"),
            Action::Vote(VoteTarget::Player(id)) => write!(f, "vote_{}", id),
            Action::Unknown(token) => write!(f, "{}", token),
        }
    }
}
