use super::request::{Unit, UnitResult};
use crate::collector::{
    config::{GenerationConfig, OutputKind},
    error::{Error, Result},
};
use core::fmt::{self, Write};
use pfn_core::{DrawSource, ProvablyFairNumbers, U256};
use std::collections::HashSet;
use std::sync::Arc;

/// Computes one unit on behalf of a worker.
///
/// Shared by every worker in a pool. [`default_processor`] runs
/// [`process_unit`].
pub type UnitProcessor = Arc<dyn Fn(Unit, &GenerationConfig) -> Result<UnitResult> + Send + Sync>;

pub fn default_processor() -> UnitProcessor {
    Arc::new(process_unit)
}

/// An undivided draw, `raw × 2^256`, in either exact or floating form.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Undivided {
    Exact(U256),
    Approx(f64),
}

impl fmt::Display for Undivided {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(value) => write!(f, "{value}"),
            Self::Approx(value) => write!(f, "{value:e}"),
        }
    }
}

/// Everything drawn for a single index.
///
/// `scaled` holds distinct values in first-seen order. `unscaled` and
/// `undivided` are aligned with `scaled`; `raw` records every draw including
/// rejected duplicates. Sequences for disabled outputs stay empty.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DrawState {
    pub client_seed: String,
    pub server_seed: String,
    /// Nonce after the final draw, i.e. the number of draws made.
    pub nonce: u64,
    pub scaled: Vec<i64>,
    pub unscaled: Vec<f64>,
    pub undivided: Vec<Undivided>,
    pub raw: Vec<f64>,
}

impl DrawState {
    /// Renders the sequence for `kind` as one space-separated line.
    pub fn line(&self, kind: OutputKind, include_seeds: bool) -> String {
        match kind {
            OutputKind::Scaled => self.join(&self.scaled, include_seeds),
            OutputKind::Unscaled => self.join(&self.unscaled, include_seeds),
            OutputKind::Undivided => self.join(&self.undivided, include_seeds),
            OutputKind::Raw => self.join(&self.raw, include_seeds),
        }
    }

    fn join<T: fmt::Display>(&self, values: &[T], include_seeds: bool) -> String {
        let mut line = String::new();
        if include_seeds {
            line.push_str(&self.server_seed);
            line.push(' ');
            line.push_str(&self.client_seed);
        }
        for value in values {
            if !line.is_empty() {
                line.push(' ');
            }
            // Writing into a `String` cannot fail.
            let _ = write!(line, "{value}");
        }
        line
    }
}

/// Draws one index until its scaled set holds
/// [`GenerationConfig::target_size`] distinct values.
///
/// Each iteration takes the draw at the current nonce, scales it into
/// `[min, max]` and keeps it only if the integer has not been seen for this
/// index. The nonce advances once per draw whether or not the value is kept.
///
/// # Errors
///
/// Fails on an invalid range, or when a draw cannot be converted into its
/// undivided form.
pub fn draw_index<S: DrawSource>(
    source: &mut S,
    config: &GenerationConfig,
) -> pfn_core::Result<DrawState> {
    let target = config.target_size();
    let outputs = &config.outputs;
    let mut seen = HashSet::with_capacity(target);
    let mut state = DrawState {
        scaled: Vec::with_capacity(target),
        ..DrawState::default()
    };

    while state.scaled.len() < target {
        let raw = source.random();
        // Same draw `random_int` would scale, without hashing twice.
        let value = pfn_core::scale(raw, config.min, config.max)?;

        if seen.insert(value) {
            state.scaled.push(value);
            if outputs.unscaled {
                state.unscaled.push(raw);
            }
            if outputs.undivided {
                let undivided = if config.high_precision {
                    Undivided::Exact(pfn_core::undivided(raw)?)
                } else {
                    Undivided::Approx(pfn_core::undivided_approx(raw)?)
                };
                state.undivided.push(undivided);
            }
        }
        if outputs.raw {
            state.raw.push(raw);
        }

        source.advance();
    }

    state.client_seed = source.client_seed().to_owned();
    state.server_seed = source.server_seed().to_owned();
    state.nonce = source.nonce();
    Ok(state)
}

/// Computes a [`UnitResult`] for every index in `unit`, seeding each index with
/// its decimal string form.
///
/// This is pure computation and performs no I/O.
///
/// # Errors
///
/// Returns [`Error::Generation`] for the first index that fails; the rest of the
/// unit is abandoned.
pub fn process_unit(unit: Unit, config: &GenerationConfig) -> Result<UnitResult> {
    process_unit_with(unit, config, |index| {
        ProvablyFairNumbers::new(&index.to_string())
    })
}

/// Like [`process_unit`], with a caller-supplied draw source per index.
///
/// # Errors
///
/// See [`process_unit`].
pub fn process_unit_with<S, F>(
    unit: Unit,
    config: &GenerationConfig,
    mut source_for: F,
) -> Result<UnitResult>
where
    S: DrawSource,
    F: FnMut(u64) -> S,
{
    let capacity = usize::try_from(unit.len()).unwrap_or(0);
    let mut result = UnitResult::default();
    for kind in config.outputs.enabled() {
        result.lines_mut(kind).reserve(capacity);
    }

    for index in unit.indices() {
        let mut source = source_for(index);
        let state = draw_index(&mut source, config)
            .map_err(|err| Error::Generation { index, source: err })?;

        for kind in config.outputs.enabled() {
            result
                .lines_mut(kind)
                .push(state.line(kind, config.include_seeds));
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::config::OutputSelectors;

    fn config(size: usize, min: i64, max: i64) -> GenerationConfig {
        GenerationConfig {
            size,
            min,
            max,
            outputs: OutputSelectors::all(),
            ..GenerationConfig::default()
        }
    }

    /// Always returns the same draw, so every value after the first is a
    /// duplicate.
    struct StuckDraw {
        nonce: u64,
    }

    impl DrawSource for StuckDraw {
        fn random(&self) -> f64 {
            0.25
        }
        fn client_seed(&self) -> &str {
            "client"
        }
        fn server_seed(&self) -> &str {
            "server"
        }
        fn nonce(&self) -> u64 {
            self.nonce
        }
        fn set_nonce(&mut self, nonce: u64) {
            self.nonce = nonce;
        }
    }

    /// Replays `draws`, cycling.
    struct Scripted {
        draws: Vec<f64>,
        nonce: u64,
    }

    impl DrawSource for Scripted {
        fn random(&self) -> f64 {
            self.draws[usize::try_from(self.nonce).unwrap() % self.draws.len()]
        }
        fn client_seed(&self) -> &str {
            "c"
        }
        fn server_seed(&self) -> &str {
            "s"
        }
        fn nonce(&self) -> u64 {
            self.nonce
        }
        fn set_nonce(&mut self, nonce: u64) {
            self.nonce = nonce;
        }
    }

    #[test]
    fn scaled_set_is_distinct_and_full() {
        let config = config(90, 1, 90);
        for index in 0..20_u64 {
            let mut pfn = ProvablyFairNumbers::new(&index.to_string());
            let state = draw_index(&mut pfn, &config).unwrap();
            assert_eq!(state.scaled.len(), 90);
            let distinct: HashSet<_> = state.scaled.iter().copied().collect();
            assert_eq!(distinct.len(), 90);
            assert!(state.scaled.iter().all(|n| (1..=90).contains(n)));
            assert_eq!(state.unscaled.len(), 90);
            assert_eq!(state.undivided.len(), 90);
            assert_eq!(u64::try_from(state.raw.len()).unwrap(), state.nonce);
        }
    }

    #[test]
    fn drawing_is_deterministic() {
        let config = config(6, 1, 49);
        let a = draw_index(&mut ProvablyFairNumbers::new("1234"), &config).unwrap();
        let b = draw_index(&mut ProvablyFairNumbers::new("1234"), &config).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.server_seed, ProvablyFairNumbers::new("1234").server_seed());
    }

    #[test]
    fn duplicates_advance_the_nonce_and_land_in_raw_only() {
        // 0.1 → 1, 0.1 → 1 (dup), 0.9 → 5
        let mut source = Scripted {
            draws: vec![0.1, 0.1, 0.9],
            nonce: 0,
        };
        let state = draw_index(&mut source, &config(2, 1, 5)).unwrap();
        assert_eq!(state.scaled, [1, 5]);
        assert_eq!(state.unscaled, [0.1, 0.9]);
        assert_eq!(state.raw, [0.1, 0.1, 0.9]);
        assert_eq!(state.nonce, 3);
    }

    #[test]
    fn single_value_range_terminates() {
        let mut source = StuckDraw { nonce: 0 };
        let state = draw_index(&mut source, &config(90, 7, 7)).unwrap();
        assert_eq!(state.scaled, [7]);
        assert_eq!(state.nonce, 1);
    }

    #[test]
    fn disabled_outputs_are_not_collected() {
        let config = GenerationConfig {
            outputs: OutputSelectors {
                scaled: true,
                unscaled: false,
                undivided: false,
                raw: false,
            },
            ..config(5, 1, 10)
        };
        let state = draw_index(&mut ProvablyFairNumbers::new("3"), &config).unwrap();
        assert_eq!(state.scaled.len(), 5);
        assert!(state.unscaled.is_empty());
        assert!(state.undivided.is_empty());
        assert!(state.raw.is_empty());
    }

    #[test]
    fn lines_are_prefixed_with_server_then_client_seed() {
        let state = DrawState {
            client_seed: "cs".into(),
            server_seed: "ss".into(),
            scaled: vec![3, 1, 2],
            raw: vec![0.5, 0.25],
            ..DrawState::default()
        };
        assert_eq!(state.line(OutputKind::Scaled, true), "ss cs 3 1 2");
        assert_eq!(state.line(OutputKind::Scaled, false), "3 1 2");
        assert_eq!(state.line(OutputKind::Raw, false), "0.5 0.25");
        assert_eq!(state.line(OutputKind::Unscaled, true), "ss cs");
    }

    #[test]
    fn undivided_renders_exact_or_scientific() {
        let mut source = Scripted {
            draws: vec![0.5],
            nonce: 0,
        };
        let exact = GenerationConfig {
            high_precision: true,
            ..config(1, 1, 2)
        };
        let state = draw_index(&mut source, &exact).unwrap();
        assert_eq!(
            state.line(OutputKind::Undivided, false),
            (U256::from(1_u8) << 255_usize).to_string()
        );

        let mut source = Scripted {
            draws: vec![0.5],
            nonce: 0,
        };
        let state = draw_index(&mut source, &config(1, 1, 2)).unwrap();
        assert_eq!(
            state.line(OutputKind::Undivided, false),
            format!("{:e}", 2_f64.powi(255))
        );
    }

    #[test]
    fn unit_produces_one_aligned_line_per_index() {
        let config = GenerationConfig {
            include_seeds: true,
            ..config(2, 1, 5)
        };
        let result = process_unit(Unit::new(0, 1), &config).unwrap();
        for kind in OutputKind::ALL {
            assert_eq!(result.lines(kind).len(), 2, "{kind}");
        }

        for (offset, line) in result.scaled.iter().enumerate() {
            let index = offset.to_string();
            let pfn = ProvablyFairNumbers::new(&index);
            let tokens: Vec<_> = line.split(' ').collect();
            assert_eq!(tokens.len(), 4);
            assert_eq!(tokens[0], pfn.server_seed());
            assert_eq!(tokens[1], pfn.client_seed());
            let a: i64 = tokens[2].parse().unwrap();
            let b: i64 = tokens[3].parse().unwrap();
            assert_ne!(a, b);
            assert!((1..=5).contains(&a) && (1..=5).contains(&b));
        }
    }

    #[test]
    fn unit_is_reproducible() {
        let config = config(10, 1, 20);
        let unit = Unit::new(40, 49);
        assert_eq!(
            process_unit(unit, &config).unwrap(),
            process_unit(unit, &config).unwrap()
        );
    }

    #[test]
    fn generation_error_names_the_index() {
        let config = config(3, 1, 10);
        let err = process_unit_with(Unit::new(5, 7), &config, |index| Scripted {
            // Index 6 produces an out-of-range draw.
            draws: vec![if index == 6 { 1.5 } else { 0.5 }, 0.1, 0.9],
            nonce: 0,
        })
        .unwrap_err();
        match err {
            Error::Generation { index, source } => {
                assert_eq!(index, 6);
                assert_eq!(source, pfn_core::Error::DrawOutOfRange(1.5));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
