use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

static COMPONENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]+\.?[0-9]*|\.[0-9]+)(ns|us|\x{b5}s|\x{3bc}s|ms|s|m|h)").unwrap()
});

/// Slightly below `u64::MAX` nanoseconds.
const MAX_NANOS: f64 = 1.8e19;

/// The duration could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid duration '{0}'")]
pub struct InvalidDuration(String);

/// Parses a duration such as `300ms`, `1.5h` or `2h45m`.
///
/// A duration is a sequence of decimal numbers, each with an optional fraction and a unit
/// suffix. Valid units are `ns`, `us` (or `µs`), `ms`, `s`, `m` and `h`. A plain `0` is also
/// accepted. Negative durations are rejected.
pub fn parse_duration(text: &str) -> Result<Duration, InvalidDuration> {
    let invalid = || InvalidDuration(text.to_owned());
    let mut rest = text.strip_prefix('+').unwrap_or(text);
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut nanos = 0.0_f64;
    while !rest.is_empty() {
        let captures = COMPONENT.captures(rest).ok_or_else(invalid)?;
        let value: f64 = captures[1].parse().map_err(|_| invalid())?;
        let scale = match &captures[2] {
            "ns" => 1.0,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => 1e3,
        };
        nanos += value * scale;
        rest = &rest[captures[0].len()..];
    }

    if !nanos.is_finite() || nanos >= MAX_NANOS {
        return Err(invalid());
    }
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "Range checked above"
    )]
    let nanos = nanos.round() as u64;
    Ok(Duration::from_nanos(nanos))
}
