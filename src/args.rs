//! Polymorphic argument resolution for `later`/`debounce`/`throttle`.
//!
//! JS-style variadic argument lists resolved by arity and runtime type at
//! the call site don't translate directly — a Rust closure already binds
//! its own receiver and arguments — but the one genuinely polymorphic
//! piece that survives is the trailing `wait [, immediate]` tail, resolved
//! once at the entry boundary into a fixed record rather than threaded
//! raw inward. The string-method-name-on-target variant is dropped: it
//! requires runtime method lookup by name, which has no equivalent without
//! a registry the embedder would have to build anyway (see DESIGN.md).

use std::time::Duration;

/// Raw trailing argument to `later`, used by the handful of call sites that
/// build argument lists dynamically instead of calling the typed
/// `later`/`after` methods directly.
#[derive(Debug, Clone, Copy)]
pub enum LaterArg {
    WaitMs(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedLater {
    pub wait: Duration,
}

/// Arity rules, minus the method/target shape (callers already supply the
/// closure separately): 0 trailing args means wait=0; a single numeric arg
/// is the wait; anything else defaults to 0.
pub fn parse_later_args(args: &[LaterArg]) -> ParsedLater {
    match args {
        [] => ParsedLater { wait: Duration::ZERO },
        [LaterArg::WaitMs(ms)] => ParsedLater {
            wait: Duration::from_millis(*ms),
        },
        _ => ParsedLater { wait: Duration::ZERO },
    }
}

/// Raw trailing argument to `debounce`/`throttle`.
#[derive(Debug, Clone, Copy)]
pub enum RateArg {
    WaitMs(u64),
    Immediate(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedRate {
    pub wait: Duration,
    pub immediate: bool,
}

/// The last argument is either a coercable number (wait, with `immediate`
/// taking `default_immediate`) or a boolean `immediate` flag with the
/// preceding argument as `wait`.
pub fn parse_rate_args(args: &[RateArg], default_immediate: bool) -> ParsedRate {
    match args {
        [.., RateArg::WaitMs(ms), RateArg::Immediate(immediate)] => ParsedRate {
            wait: Duration::from_millis(*ms),
            immediate: *immediate,
        },
        [.., RateArg::WaitMs(ms)] => ParsedRate {
            wait: Duration::from_millis(*ms),
            immediate: default_immediate,
        },
        _ => ParsedRate {
            wait: Duration::ZERO,
            immediate: default_immediate,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_no_args_is_zero_wait() {
        assert_eq!(parse_later_args(&[]).wait, Duration::ZERO);
    }

    #[test]
    fn later_single_numeric_arg_is_wait() {
        assert_eq!(
            parse_later_args(&[LaterArg::WaitMs(10)]).wait,
            Duration::from_millis(10)
        );
    }

    #[test]
    fn rate_trailing_number_uses_default_immediate() {
        let throttle = parse_rate_args(&[RateArg::WaitMs(100)], true);
        assert_eq!(throttle, ParsedRate { wait: Duration::from_millis(100), immediate: true });

        let debounce = parse_rate_args(&[RateArg::WaitMs(100)], false);
        assert_eq!(debounce, ParsedRate { wait: Duration::from_millis(100), immediate: false });
    }

    #[test]
    fn rate_trailing_bool_overrides_default_immediate() {
        let parsed = parse_rate_args(&[RateArg::WaitMs(100), RateArg::Immediate(true)], false);
        assert_eq!(parsed, ParsedRate { wait: Duration::from_millis(100), immediate: true });
    }
}
