use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Bid/ask quote for one team at one point in time.
///
/// Fields absent (or `null`) in the feed decode as zero, which is also the
/// line assumed for a team not present in the previous snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamLine {
    #[serde(default, deserialize_with = "zero_if_null")]
    pub bid: f64,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub bid_size: i64,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub ask: f64,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub ask_size: i64,
}

fn zero_if_null<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl TeamLine {
    pub fn price(&self, side: Side) -> f64 {
        match side {
            Side::Bid => self.bid,
            Side::Ask => self.ask,
        }
    }

    pub fn size(&self, side: Side) -> i64 {
        match side {
            Side::Bid => self.bid_size,
            Side::Ask => self.ask_size,
        }
    }
}

/// One side of a team's line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    pub fn label(self) -> &'static str {
        match self {
            Side::Bid => "Bid",
            Side::Ask => "Ask",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Flat,
    Up,
    Down,
}

/// Directional change of one side of a line between two consecutive snapshots.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineDelta {
    pub direction: Direction,
    /// Price on the new line.
    pub price: f64,
    /// Size on the new line.
    pub quantity: i64,
}

/// A notification-worthy change for one team within one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub team: String,
    pub bid_delta: LineDelta,
    pub ask_delta: LineDelta,
}

/// One poll's market data, keyed by the team identifiers the API returned.
#[derive(Debug, Clone)]
pub struct Snapshot {
    lines: HashMap<String, TeamLine>,
    pub fetched_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(lines: HashMap<String, TeamLine>) -> Self {
        Self::at(lines, Utc::now())
    }

    pub fn at(lines: HashMap<String, TeamLine>, fetched_at: DateTime<Utc>) -> Self {
        Self { lines, fetched_at }
    }

    /// Time between an earlier snapshot's fetch and this one's.
    pub fn elapsed_since(&self, earlier: &Snapshot) -> TimeDelta {
        self.fetched_at.signed_duration_since(earlier.fetched_at)
    }

    pub fn get(&self, team: &str) -> Option<&TeamLine> {
        self.lines.get(team)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TeamLine)> {
        self.lines.iter().map(|(team, line)| (team.as_str(), line))
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl FromIterator<(String, TeamLine)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, TeamLine)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
