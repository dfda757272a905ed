//! Score bounds for sorted-set range commands.

/// One end of a score range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreBound {
    NegInfinity,
    Inclusive(f64),
    Exclusive(f64),
    PosInfinity,
}

impl ScoreBound {
    /// Render the bound in the syntax accepted by `ZRANGEBYSCORE`.
    pub fn to_redis_arg(self) -> String {
        match self {
            Self::NegInfinity => "-inf".to_owned(),
            Self::Inclusive(score) => score.to_string(),
            Self::Exclusive(score) => format!("({score}"),
            Self::PosInfinity => "+inf".to_owned(),
        }
    }

    /// Whether `score` satisfies this bound used as a range minimum.
    #[inline]
    pub fn admits_from_below(self, score: f64) -> bool {
        match self {
            Self::NegInfinity => true,
            Self::Inclusive(min) => score >= min,
            Self::Exclusive(min) => score > min,
            Self::PosInfinity => false,
        }
    }

    /// Whether `score` satisfies this bound used as a range maximum.
    #[inline]
    pub fn admits_from_above(self, score: f64) -> bool {
        match self {
            Self::NegInfinity => false,
            Self::Inclusive(max) => score <= max,
            Self::Exclusive(max) => score < max,
            Self::PosInfinity => true,
        }
    }

    /// Whether `score` falls inside `[min, max]` with the bounds' exclusivity applied.
    #[inline]
    pub fn contains(min: Self, max: Self, score: f64) -> bool {
        min.admits_from_below(score) && max.admits_from_above(score)
    }
}
