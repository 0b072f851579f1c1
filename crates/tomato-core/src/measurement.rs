use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The four metrics collected for every element, connection, and topology
/// (cputime, memory, diskspace, traffic).
///
/// `cputime` and `traffic` have cumulative semantics: a driver reports the
/// lifetime counter read from the host, and [`Measurement::update_continuous`]
/// turns that into a per-interval delta. `memory` and `diskspace` are
/// instantaneous — the latest sample simply wins.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Measurement {
    pub cputime: f64,
    pub memory: f64,
    pub diskspace: f64,
    pub traffic: f64,
}

impl Measurement {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Convert a cumulative counter reading into a per-interval delta,
    /// storing the raw value under `last_<name>` in `state` for next time.
    ///
    /// On the first call for a given `name` (no prior value in `state`)
    /// there is nothing to diff against, so this returns `0.0` — the sample
    /// establishes a baseline rather than contributing a delta, matching
    /// `Usage.updateContinuous` in the original accounting module.
    pub fn update_continuous(name: &str, value: f64, state: &mut Map<String, Value>) -> f64 {
        let last_key = format!("last_{name}");
        let delta = match state.get(&last_key).and_then(Value::as_f64) {
            Some(last) => {
                let diff = value - last;
                if diff < 0.0 {
                    // Counter reset (e.g. host reboot) — treat the new
                    // reading as the delta rather than going negative.
                    value
                } else {
                    diff
                }
            }
            None => 0.0,
        };
        state.insert(last_key, Value::from(value));
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_establishes_baseline_without_delta() {
        let mut state = Map::new();
        let delta = Measurement::update_continuous("cputime", 100.0, &mut state);
        assert_eq!(delta, 0.0);
        assert_eq!(state.get("last_cputime").unwrap().as_f64(), Some(100.0));
    }

    #[test]
    fn subsequent_sample_yields_positive_delta() {
        let mut state = Map::new();
        Measurement::update_continuous("cputime", 100.0, &mut state);
        let delta = Measurement::update_continuous("cputime", 130.0, &mut state);
        assert_eq!(delta, 30.0);
    }

    #[test]
    fn counter_reset_yields_raw_value() {
        let mut state = Map::new();
        Measurement::update_continuous("traffic", 1_000.0, &mut state);
        let delta = Measurement::update_continuous("traffic", 50.0, &mut state);
        assert_eq!(delta, 50.0);
    }
}
