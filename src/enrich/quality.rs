use crate::model::QualityBreakdown;

pub const LENGTH_WEIGHT: f64 = 0.30;
pub const LANGUAGE_WEIGHT: f64 = 0.25;
pub const DENSITY_WEIGHT: f64 = 0.25;
pub const STRUCTURE_WEIGHT: f64 = 0.20;

/// Word count at which the length component saturates.
pub const FULL_LENGTH_WORDS: usize = 500;
/// Section count at which the structure component saturates.
pub const FULL_STRUCTURE_SECTIONS: usize = 5;

#[derive(Debug, Clone, Copy)]
pub struct QualitySignals {
    pub word_count: usize,
    pub language_confidence: f64,
    pub body_chars: usize,
    pub raw_chars: usize,
    pub section_count: usize,
}

/// Weighted composite in [0, 1]. Components are kept alongside the score so
/// consumers can re-weight without re-extracting.
pub fn score(signals: &QualitySignals) -> QualityBreakdown {
    let length = (signals.word_count as f64 / FULL_LENGTH_WORDS as f64).min(1.0);
    let language = signals.language_confidence.clamp(0.0, 1.0);
    let density = if signals.raw_chars == 0 {
        0.0
    } else {
        (signals.body_chars as f64 / signals.raw_chars as f64).min(1.0)
    };
    let structure = (signals.section_count as f64 / FULL_STRUCTURE_SECTIONS as f64).min(1.0);

    let composite = LENGTH_WEIGHT * length
        + LANGUAGE_WEIGHT * language
        + DENSITY_WEIGHT * density
        + STRUCTURE_WEIGHT * structure;

    QualityBreakdown {
        length: round_to(length, 4),
        language: round_to(language, 4),
        density: round_to(density, 4),
        structure: round_to(structure, 4),
        score: round_to(composite.clamp(0.0, 1.0), 4),
    }
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals() -> QualitySignals {
        QualitySignals {
            word_count: 500,
            language_confidence: 1.0,
            body_chars: 1000,
            raw_chars: 1000,
            section_count: 5,
        }
    }

    #[test]
    fn perfect_document_scores_one() {
        assert_eq!(score(&signals()).score, 1.0);
    }

    #[test]
    fn components_saturate() {
        let q = score(&QualitySignals {
            word_count: 10_000,
            body_chars: 5000,
            raw_chars: 1000,
            section_count: 40,
            ..signals()
        });
        assert_eq!(q.length, 1.0);
        assert_eq!(q.density, 1.0);
        assert_eq!(q.structure, 1.0);
        assert_eq!(q.score, 1.0);
    }

    #[test]
    fn weighted_sum() {
        let q = score(&QualitySignals {
            word_count: 250,
            language_confidence: 0.8,
            body_chars: 100,
            raw_chars: 400,
            section_count: 1,
        });
        // 0.3*0.5 + 0.25*0.8 + 0.25*0.25 + 0.2*0.2
        assert_eq!(q.score, 0.4525);
        assert_eq!(q.density, 0.25);
    }

    #[test]
    fn zero_raw_chars_means_zero_density() {
        let q = score(&QualitySignals { raw_chars: 0, ..signals() });
        assert_eq!(q.density, 0.0);
        assert_eq!(q.score, 0.75);
    }

    #[test]
    fn score_stays_in_unit_interval() {
        let q = score(&QualitySignals {
            word_count: 0,
            language_confidence: -3.0,
            body_chars: 0,
            raw_chars: 10,
            section_count: 0,
        });
        assert_eq!(q.score, 0.0);
    }

    #[test]
    fn rounding() {
        assert_eq!(round_to(1.23456, 4), 1.2346);
        assert_eq!(round_to(2.0 / 238.0 * 100.0, 2), 0.84);
    }
}
