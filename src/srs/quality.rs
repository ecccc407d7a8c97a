use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::strategy::ReviewEvent;
use super::SrsError;

/// Ratings at or above this value count as a successful recall.
pub const PASS_THRESHOLD: u8 = 3;

/// A perfect answer slower than this is downgraded to "correct after hesitation".
const HESITATION_LATENCY: Duration = Duration::from_millis(5000);

/// Recall quality on the 0-5 SM-2 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub enum Quality {
    /// Complete blackout, nothing recalled.
    Blackout = 0,
    /// Wrong, but remembered on seeing the answer.
    Incorrect = 1,
    /// Wrong, but the answer felt familiar.
    IncorrectFamiliar = 2,
    /// Correct with significant effort.
    CorrectDifficult = 3,
    /// Correct after some hesitation.
    CorrectHesitation = 4,
    /// Perfect, immediate recall.
    Perfect = 5,
}

impl Quality {
    pub const ALL: [Quality; 6] = [
        Quality::Blackout,
        Quality::Incorrect,
        Quality::IncorrectFamiliar,
        Quality::CorrectDifficult,
        Quality::CorrectHesitation,
        Quality::Perfect,
    ];

    pub fn from_rating(rating: i64) -> Result<Self, SrsError> {
        match rating {
            0 => Ok(Self::Blackout),
            1 => Ok(Self::Incorrect),
            2 => Ok(Self::IncorrectFamiliar),
            3 => Ok(Self::CorrectDifficult),
            4 => Ok(Self::CorrectHesitation),
            5 => Ok(Self::Perfect),
            other => Err(SrsError::InvalidQuality(other)),
        }
    }

    /// Derives a rating from answer accuracy in `[0, 1]`.
    ///
    /// `round(accuracy * 5)` clamped to the scale; zero accuracy is always a
    /// blackout. A perfect score given after a long pause counts as hesitant.
    pub fn from_accuracy(accuracy: f64, latency: Option<Duration>) -> Result<Self, SrsError> {
        if !accuracy.is_finite() {
            return Err(SrsError::InvalidAccuracy(accuracy));
        }
        if accuracy == 0.0 {
            return Ok(Self::Blackout);
        }

        let rating = (accuracy * 5.0).round().clamp(0.0, 5.0) as i64;
        let quality = Self::from_rating(rating)?;

        match latency {
            Some(latency) if quality == Self::Perfect && latency > HESITATION_LATENCY => {
                Ok(Self::CorrectHesitation)
            }
            _ => Ok(quality),
        }
    }

    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn passed(self, threshold: u8) -> bool {
        self.value() >= threshold
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Blackout => "blackout",
            Self::Incorrect => "incorrect",
            Self::IncorrectFamiliar => "incorrect_familiar",
            Self::CorrectDifficult => "correct_difficult",
            Self::CorrectHesitation => "correct_hesitation",
            Self::Perfect => "perfect",
        }
    }
}

impl TryFrom<i64> for Quality {
    type Error = SrsError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::from_rating(value)
    }
}

impl From<Quality> for u8 {
    fn from(value: Quality) -> Self {
        value.value()
    }
}

/// Raw feedback as captured by a front-end, before normalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Feedback {
    Rating(i64),
    Accuracy {
        accuracy: f64,
        latency: Option<Duration>,
    },
    /// A topic repetition was worked through (ladder strategy).
    Completed,
}

impl Feedback {
    pub fn into_event(self) -> Result<ReviewEvent, SrsError> {
        match self {
            Feedback::Rating(rating) => Quality::from_rating(rating).map(ReviewEvent::Graded),
            Feedback::Accuracy { accuracy, latency } => {
                Quality::from_accuracy(accuracy, latency).map(ReviewEvent::Graded)
            }
            Feedback::Completed => Ok(ReviewEvent::Completed),
        }
    }
}
