use serde::{Deserialize, Serialize};

use crate::models::{NewPlayer, Team};

use super::submission::{check_duplicates, roster_players, TEAM_SIZE};

/// The ten name inputs of the booking dialog: team A 1-5, then team B 1-5.
///
/// Every edit re-runs the duplicate check so the dialog can block
/// submission while two inputs share a name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterForm {
    names: [String; TEAM_SIZE * 2],
    duplicate_error: Option<String>,
}

impl RosterForm {
    pub fn new() -> Self {
        Self::default()
    }

    fn index(team: Team, position: usize) -> Option<usize> {
        if position >= TEAM_SIZE {
            return None;
        }
        Some(match team {
            Team::A => position,
            Team::B => TEAM_SIZE + position,
        })
    }

    /// Sets the name at a 0-based position within a team. Returns false for
    /// positions past the team size.
    pub fn set_name(&mut self, team: Team, position: usize, value: impl Into<String>) -> bool {
        let Some(index) = Self::index(team, position) else {
            return false;
        };
        self.names[index] = value.into();
        self.duplicate_error = check_duplicates(&self.names).map(|n| format!("Duplicate player name: {n}"));
        true
    }

    /// Sets a field by its input name, `teamA1` through `teamB5`.
    pub fn set_input(&mut self, input: &str, value: impl Into<String>) -> bool {
        let parsed = input.strip_prefix("team").and_then(|rest| {
            let mut chars = rest.chars();
            let team = Team::parse(&chars.next()?.to_string())?;
            let position: usize = chars.as_str().parse().ok()?;
            Some((team, position.checked_sub(1)?))
        });
        match parsed {
            Some((team, position)) => self.set_name(team, position, value),
            None => false,
        }
    }

    pub fn name(&self, team: Team, position: usize) -> Option<&str> {
        Self::index(team, position).map(|i| self.names[i].as_str())
    }

    pub fn duplicate_error(&self) -> Option<&str> {
        self.duplicate_error.as_deref()
    }

    pub fn can_submit(&self) -> bool {
        self.duplicate_error.is_none()
    }

    pub fn players(&self) -> Vec<NewPlayer> {
        roster_players(&self.names[..TEAM_SIZE], &self.names[TEAM_SIZE..])
    }

    pub fn team_a(&self) -> &[String] {
        &self.names[..TEAM_SIZE]
    }

    pub fn team_b(&self) -> &[String] {
        &self.names[TEAM_SIZE..]
    }
}
