//! Short-term conversation context fed to clarification and recommendation prompts.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Facts about "now", the user and the previous turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub calendar: String,
    #[serde(default)]
    pub user_profile: Option<String>,
    #[serde(default)]
    pub prior_turn: Option<String>,
}

impl ConversationContext {
    #[must_use]
    pub fn for_date(today: NaiveDate) -> Self {
        Self { calendar: calendar_context(today), user_profile: None, prior_turn: None }
    }

    #[must_use]
    pub fn with_user_profile(mut self, profile: Option<String>) -> Self {
        self.user_profile = profile.filter(|p| !p.trim().is_empty());
        self
    }

    #[must_use]
    pub fn with_prior_turn(mut self, prior: Option<String>) -> Self {
        self.prior_turn = prior;
        self
    }

    /// Render as a block of lines for inclusion in a prompt.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = self.calendar.clone();
        if let Some(profile) = &self.user_profile {
            out.push_str("\nUser profile: ");
            out.push_str(profile);
        }
        if let Some(prior) = &self.prior_turn {
            out.push_str("\nPrevious turn: ");
            out.push_str(prior);
        }
        out
    }
}

/// Calendar facts used to resolve relative periods ("last month", "this quarter").
#[must_use]
pub fn calendar_context(today: NaiveDate) -> String {
    let year = today.year();
    let month = today.month();
    let quarter = (month - 1) / 3 + 1;
    let (prev_q_year, prev_q) = if quarter == 1 { (year - 1, 4) } else { (year, quarter - 1) };
    let (prev_m_year, prev_m) = if month == 1 { (year - 1, 12) } else { (year, month - 1) };

    format!(
        "Current date: {today}\n\
         Current year: {year}\n\
         Previous year: {prev_year}\n\
         Current quarter: {year} Q{quarter}\n\
         Previous quarter: {prev_q_year} Q{prev_q}\n\
         Current month: {year}-{month:02}\n\
         Previous month: {prev_m_year}-{prev_m:02}",
        today = today.format("%Y-%m-%d"),
        prev_year = year - 1,
    )
}
