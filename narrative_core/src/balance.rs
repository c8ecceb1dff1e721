//! Balance report - how hard the authored choices push each tendency axis.
//!
//! Every choice effect is collapsed to its 3-axis vector; the report gives
//! per-axis aggregates, skew hints and the heaviest choices.

use std::fmt;

use story_rules::{Axis, Tendencies};

use crate::content::Story;

/// Mean beyond which an axis is flagged as leaning.
pub const MEAN_SKEW: f64 = 0.35;
/// Absolute total beyond which an axis is flagged.
pub const TOTAL_SKEW: i64 = 4;
/// A single step this large is called out.
pub const LARGE_STEP: i32 = 2;
/// Positive/negative count ratio that counts as one-sided.
pub const SIGN_RATIO_SKEW: f64 = 2.5;
/// Signed entries needed before the ratio is meaningful.
pub const MIN_SIGNED: usize = 4;
/// How many choices the top list shows.
pub const TOP_CHOICES: usize = 5;

/// One choice's contribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceVector {
    pub scene: String,
    pub choice: String,
    pub vector: Tendencies,
}

impl ChoiceVector {
    pub fn magnitude(&self) -> i32 {
        self.vector.magnitude()
    }
}

/// Aggregates over one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisStats {
    pub axis: Axis,
    pub total: i64,
    pub mean: f64,
    pub min: i32,
    pub max: i32,
    pub pos: usize,
    pub neg: usize,
    pub zero: usize,
}

impl AxisStats {
    fn collect(axis: Axis, values: &[i32]) -> Self {
        let total: i64 = values.iter().map(|v| i64::from(*v)).sum();
        let mean = if values.is_empty() {
            0.0
        } else {
            total as f64 / values.len() as f64
        };
        Self {
            axis,
            total,
            mean,
            min: values.iter().copied().min().unwrap_or(0),
            max: values.iter().copied().max().unwrap_or(0),
            pos: values.iter().filter(|v| **v > 0).count(),
            neg: values.iter().filter(|v| **v < 0).count(),
            zero: values.iter().filter(|v| **v == 0).count(),
        }
    }

    /// Reasons this axis looks unbalanced; empty when it does not.
    pub fn skew_hints(&self) -> Vec<String> {
        let name = self.axis.key();
        let mut hints = Vec::new();
        if self.mean.abs() >= MEAN_SKEW {
            hints.push(format!("{name}: mean {:+.2} per choice", self.mean));
        }
        if self.total.abs() >= TOTAL_SKEW {
            hints.push(format!("{name}: total {:+} across all choices", self.total));
        }
        let largest = self.min.abs().max(self.max.abs());
        if largest >= LARGE_STEP {
            hints.push(format!("{name}: a single choice moves it by {largest}"));
        }
        let signed = self.pos + self.neg;
        if signed >= MIN_SIGNED {
            let (hi, lo) = (self.pos.max(self.neg), self.pos.min(self.neg));
            if lo == 0 || hi as f64 / lo as f64 >= SIGN_RATIO_SKEW {
                let side = if self.pos > self.neg { "positive" } else { "negative" };
                hints.push(format!(
                    "{name}: {} of {} signed entries are {side}",
                    hi, signed
                ));
            }
        }
        hints
    }
}

/// The full report.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceReport {
    pub choices: Vec<ChoiceVector>,
    pub axes: [AxisStats; 3],
}

impl BalanceReport {
    pub fn from_story(story: &Story) -> Self {
        let mut choices = Vec::new();
        for id in story.graph.sorted_ids() {
            let Some(scene) = story.graph.get(id) else {
                continue;
            };
            for choice in scene.choices() {
                choices.push(ChoiceVector {
                    scene: scene.id.clone(),
                    choice: choice.text.clone(),
                    vector: choice.delta.effect.as_vector(),
                });
            }
        }
        Self::from_choices(choices)
    }

    pub fn from_choices(choices: Vec<ChoiceVector>) -> Self {
        let stats = |axis: Axis| {
            let values: Vec<i32> = choices.iter().map(|c| c.vector.get(axis)).collect();
            AxisStats::collect(axis, &values)
        };
        let axes = Axis::ALL.map(stats);
        Self { choices, axes }
    }

    pub fn skew_hints(&self) -> Vec<String> {
        self.axes.iter().flat_map(AxisStats::skew_hints).collect()
    }

    /// Heaviest choices by vector magnitude, ties in scene order.
    pub fn top_choices(&self) -> Vec<&ChoiceVector> {
        let mut ranked: Vec<&ChoiceVector> = self.choices.iter().collect();
        ranked.sort_by_key(|c| std::cmp::Reverse(c.magnitude()));
        ranked.truncate(TOP_CHOICES);
        ranked
    }
}

impl fmt::Display for BalanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Choice effect balance ({} choices)", self.choices.len())?;
        writeln!(
            f,
            "{:<10} {:>6} {:>7} {:>4} {:>4} {:>4} {:>4} {:>5}",
            "axis", "total", "mean", "min", "max", "pos", "neg", "zero"
        )?;
        for s in &self.axes {
            writeln!(
                f,
                "{:<10} {:>6} {:>7.2} {:>4} {:>4} {:>4} {:>4} {:>5}",
                s.axis.key(),
                s.total,
                s.mean,
                s.min,
                s.max,
                s.pos,
                s.neg,
                s.zero
            )?;
        }

        let hints = self.skew_hints();
        if hints.is_empty() {
            writeln!(f, "\nNo skew hints.")?;
        } else {
            writeln!(f, "\nSkew hints:")?;
            for hint in hints {
                writeln!(f, "- {hint}")?;
            }
        }

        writeln!(f, "\nTop {TOP_CHOICES} choices by magnitude:")?;
        for choice in self.top_choices() {
            writeln!(
                f,
                "{:>3}  {} \"{}\" ({})",
                choice.magnitude(),
                choice.scene,
                choice.choice,
                choice.vector
            )?;
        }
        Ok(())
    }
}
