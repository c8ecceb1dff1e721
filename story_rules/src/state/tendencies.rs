//! The three-axis tendency vector and the six named sub-axes that feed it.

use serde::{Deserialize, Serialize};

/// Tendency values always stay within `[-TENDENCY_LIMIT, TENDENCY_LIMIT]`.
pub const TENDENCY_LIMIT: i32 = 5;

/// Clamp a raw value into the tendency range.
pub fn clamp_tendency(value: i64) -> i32 {
    value.clamp(-(TENDENCY_LIMIT as i64), TENDENCY_LIMIT as i64) as i32
}

/// One signed tendency dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// Rational (+) vs emotional (-).
    Rational,
    /// Cooperative (+) vs confrontational (-).
    Cooperate,
    /// Exploratory (+) vs conservative (-).
    Explore,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::Rational, Axis::Cooperate, Axis::Explore];

    pub fn key(&self) -> &'static str {
        match self {
            Axis::Rational => "rational",
            Axis::Cooperate => "cooperate",
            Axis::Explore => "explore",
        }
    }
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// The named sub-axes used when authoring effects.
///
/// Each pair offsets the same [`Axis`] with opposite sign, so `logic = 1` and
/// `emotion = 1` cancel out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubAxis {
    Logic,
    Emotion,
    Coop,
    Oppose,
    Explore,
    Preserve,
}

impl SubAxis {
    pub const ALL: [SubAxis; 6] = [
        SubAxis::Logic,
        SubAxis::Emotion,
        SubAxis::Coop,
        SubAxis::Oppose,
        SubAxis::Explore,
        SubAxis::Preserve,
    ];

    /// The axis this sub-axis moves.
    pub fn axis(&self) -> Axis {
        match self {
            SubAxis::Logic | SubAxis::Emotion => Axis::Rational,
            SubAxis::Coop | SubAxis::Oppose => Axis::Cooperate,
            SubAxis::Explore | SubAxis::Preserve => Axis::Explore,
        }
    }

    /// +1 if a positive delta pushes the axis up, -1 otherwise.
    pub fn sign(&self) -> i32 {
        match self {
            SubAxis::Logic | SubAxis::Coop | SubAxis::Explore => 1,
            SubAxis::Emotion | SubAxis::Oppose | SubAxis::Preserve => -1,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            SubAxis::Logic => "logic",
            SubAxis::Emotion => "emotion",
            SubAxis::Coop => "coop",
            SubAxis::Oppose => "oppose",
            SubAxis::Explore => "explore",
            SubAxis::Preserve => "preserve",
        }
    }

    /// Parse an authored key such as `"coop"`.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|sub| sub.key() == key)
    }
}

/// Deltas over the six sub-axes, applied in the order they were authored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TendencyEffect(pub Vec<(SubAxis, i32)>);

impl TendencyEffect {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one step. Steps run in insertion order.
    pub fn with(mut self, sub: SubAxis, delta: i32) -> Self {
        self.0.push((sub, delta));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|(_, delta)| *delta == 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SubAxis, i32)> + '_ {
        self.0.iter().copied()
    }

    /// Collapse onto the three axes without clamping (used by balance analysis).
    pub fn as_vector(&self) -> Tendencies {
        let mut raw = [0i64; 3];
        for (sub, delta) in self.iter() {
            let slot = match sub.axis() {
                Axis::Rational => 0,
                Axis::Cooperate => 1,
                Axis::Explore => 2,
            };
            raw[slot] += (sub.sign() * delta) as i64;
        }
        Tendencies {
            rational: raw[0] as i32,
            cooperate: raw[1] as i32,
            explore: raw[2] as i32,
        }
    }
}

/// Accumulated narrative leaning of the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Tendencies {
    pub rational: i32,
    pub cooperate: i32,
    pub explore: i32,
}

impl Tendencies {
    pub fn new(rational: i32, cooperate: i32, explore: i32) -> Self {
        Self {
            rational,
            cooperate,
            explore,
        }
    }

    pub fn get(&self, axis: Axis) -> i32 {
        match axis {
            Axis::Rational => self.rational,
            Axis::Cooperate => self.cooperate,
            Axis::Explore => self.explore,
        }
    }

    fn slot_mut(&mut self, axis: Axis) -> &mut i32 {
        match axis {
            Axis::Rational => &mut self.rational,
            Axis::Cooperate => &mut self.cooperate,
            Axis::Explore => &mut self.explore,
        }
    }

    /// Move one axis by `delta`, clamping immediately.
    pub fn nudge(&mut self, axis: Axis, delta: i32) {
        let slot = self.slot_mut(axis);
        *slot = clamp_tendency(*slot as i64 + delta as i64);
    }

    /// Apply an authored effect one sub-axis at a time, clamping after each step.
    pub fn apply_effect(&mut self, effect: &TendencyEffect) {
        for (sub, delta) in effect.iter() {
            self.nudge(sub.axis(), sub.sign() * delta);
        }
    }

    /// Return a copy with every axis forced into range.
    pub fn clamped(self) -> Self {
        Self {
            rational: clamp_tendency(self.rational as i64),
            cooperate: clamp_tendency(self.cooperate as i64),
            explore: clamp_tendency(self.explore as i64),
        }
    }

    pub fn in_range(&self) -> bool {
        Axis::ALL
            .iter()
            .all(|axis| self.get(*axis).abs() <= TENDENCY_LIMIT)
    }

    /// Sum of absolute per-axis differences.
    pub fn manhattan(&self, other: &Tendencies) -> i32 {
        Axis::ALL
            .iter()
            .map(|axis| (self.get(*axis) - other.get(*axis)).abs())
            .sum()
    }

    /// Sum of absolute components.
    pub fn magnitude(&self) -> i32 {
        self.manhattan(&Tendencies::default())
    }
}

impl std::fmt::Display for Tendencies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.rational, self.cooperate, self.explore)
    }
}
