// Fixed-table spaced repetition: a base interval that grows with the number of
// reviews, multiplied by a 1-5 strength score adjusted by each rating.

use std::str::FromStr;

use chrono::{DateTime, Days, Utc};

use crate::error::Error;

/// Base spacing in days, indexed by review count.
pub const INTERVALS: [u64; 5] = [1, 3, 7, 14, 30];

pub const MIN_STRENGTH: u8 = 1;
pub const MAX_STRENGTH: u8 = 5;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Numeric rating as typed in the terminal: 1=hard, 2=medium, 3=easy.
    pub fn from_u8(n: u8) -> Option<Difficulty> {
        match n {
            1 => Some(Difficulty::Hard),
            2 => Some(Difficulty::Medium),
            3 => Some(Difficulty::Easy),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    fn strength_delta(self) -> i16 {
        match self {
            Difficulty::Easy => 1,
            Difficulty::Medium => 0,
            Difficulty::Hard => -1,
        }
    }
}

impl FromStr for Difficulty {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "easy" | "e" => Ok(Difficulty::Easy),
            "medium" | "m" => Ok(Difficulty::Medium),
            "hard" | "h" => Ok(Difficulty::Hard),
            other => other
                .parse::<u8>()
                .ok()
                .and_then(Difficulty::from_u8)
                .ok_or_else(|| Error::UnknownDifficulty(s.to_string())),
        }
    }
}

pub struct ReviewOutcome {
    pub review_count: u32,
    pub strength: u8,
    pub next_review: DateTime<Utc>,
}

/// The classic schedule laid out when a task is first completed.
pub fn review_dates(completed_at: DateTime<Utc>) -> [DateTime<Utc>; 5] {
    INTERVALS.map(|days| completed_at + Days::new(days))
}

pub fn adjust_strength(strength: u8, difficulty: Difficulty) -> u8 {
    let adjusted = i16::from(strength) + difficulty.strength_delta();
    adjusted.clamp(i16::from(MIN_STRENGTH), i16::from(MAX_STRENGTH)) as u8
}

/// Clamps at the last table entry once the count runs past it.
pub fn base_interval(review_count: u32) -> u64 {
    let i = (review_count as usize).min(INTERVALS.len() - 1);
    INTERVALS[i]
}

pub fn interval_days(review_count: u32, strength: u8) -> u64 {
    base_interval(review_count) * u64::from(strength)
}

pub fn review(
    review_count: u32,
    strength: u8,
    difficulty: Difficulty,
    now: DateTime<Utc>,
) -> ReviewOutcome {
    let review_count = review_count.saturating_add(1);
    let strength = adjust_strength(strength, difficulty);
    let next_review = now + Days::new(interval_days(review_count, strength));
    ReviewOutcome {
        review_count,
        strength,
        next_review,
    }
}
