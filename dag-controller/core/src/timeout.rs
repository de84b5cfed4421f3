use std::{fmt, str::FromStr, time::Duration};

/// A timeout as configured by a user.
///
/// Distinguishes "leave it to the proxy" from an explicit duration and from an
/// explicitly disabled timeout.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Setting {
    /// Use the proxy's default timeout.
    #[default]
    Default,

    /// No timeout at all.
    Disabled,

    Duration(Duration),
}

/// Timeouts applied to a route.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct RouteTimeoutPolicy {
    /// How long the proxy waits for the upstream's complete response.
    pub response_timeout: Setting,

    /// How long a request stream may be idle.
    pub idle_timeout: Setting,
}

/// Timeouts applied to connections to an upstream cluster.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ClusterTimeoutPolicy {
    pub connect_timeout: Option<Duration>,
    pub idle_connection_timeout: Setting,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    #[error("empty duration")]
    Empty,

    #[error("negative durations are not permitted")]
    Negative,

    #[error("missing a unit: {}", EXPECTED_UNITS)]
    NoUnit,

    #[error("invalid unit {0:?}: {expected}", expected = EXPECTED_UNITS)]
    InvalidUnit(String),

    #[error("invalid number: {0:?}")]
    NotANumber(String),

    #[error("duration is too large")]
    Overflow,
}

const EXPECTED_UNITS: &str = "expected one of 'ns', 'us', '\u{00b5}s', 'ms', 's', 'm', or 'h'";

// === impl Setting ===

impl Setting {
    /// Parses a user supplied timeout.
    ///
    /// An empty string selects the proxy default, `infinity` or `infinite`
    /// disable the timeout, and anything else must be a Go-style duration. A
    /// zero duration disables the timeout.
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        match s.trim() {
            "" => Ok(Self::Default),
            "infinity" | "infinite" => Ok(Self::Disabled),
            s => {
                let d = parse_duration(s)?;
                if d.is_zero() {
                    return Ok(Self::Disabled);
                }
                Ok(Self::Duration(d))
            }
        }
    }

    #[inline]
    pub fn is_disabled(&self) -> bool {
        matches!(self, Self::Disabled)
    }

    #[inline]
    pub fn use_default(&self) -> bool {
        matches!(self, Self::Default)
    }

    #[inline]
    pub fn duration(&self) -> Option<Duration> {
        match self {
            Self::Duration(d) => Some(*d),
            _ => None,
        }
    }
}

impl From<Duration> for Setting {
    fn from(d: Duration) -> Self {
        Self::Duration(d)
    }
}

impl FromStr for Setting {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default"),
            Self::Disabled => f.write_str("infinity"),
            Self::Duration(d) => fmt::Debug::fmt(d, f),
        }
    }
}

/// Parses a duration in the format accepted by Go's `time.ParseDuration`,
/// e.g. `300ms`, `1.5h` or `2h45m`. Negative durations are rejected.
pub fn parse_duration(s: &str) -> Result<Duration, ParseError> {
    let mut rest = match s.as_bytes().first() {
        None => return Err(ParseError::Empty),
        Some(b'-') => return Err(ParseError::Negative),
        Some(b'+') => &s[1..],
        Some(_) => s,
    };

    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut total_nanos = 0u128;
    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or(ParseError::NoUnit)?;
        let (num, tail) = rest.split_at(num_end);
        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);

        let unit_nanos = unit_duration(unit)?.as_nanos();
        total_nanos = total_nanos
            .checked_add(scaled_nanos(num, unit_nanos)?)
            .ok_or(ParseError::Overflow)?;
        rest = tail;
    }

    let secs = u64::try_from(total_nanos / NANOS_PER_SEC).map_err(|_| ParseError::Overflow)?;
    Ok(Duration::new(secs, (total_nanos % NANOS_PER_SEC) as u32))
}

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Multiplies a decimal number by a unit using integer arithmetic, so that
/// values like `1.004s` are exact. Fractional digits beyond nanosecond
/// precision are truncated.
fn scaled_nanos(num: &str, unit_nanos: u128) -> Result<u128, ParseError> {
    let invalid = || ParseError::NotANumber(num.to_string());

    let (int, frac) = num.split_once('.').unwrap_or((num, ""));
    if int.is_empty() && frac.is_empty() {
        return Err(invalid());
    }

    let int = if int.is_empty() {
        0
    } else {
        int.parse::<u128>().map_err(|_| invalid())?
    };
    let mut nanos = int.checked_mul(unit_nanos).ok_or(ParseError::Overflow)?;

    let mut frac_value = 0u128;
    let mut scale = 1u128;
    for c in frac.chars() {
        let digit = c.to_digit(10).ok_or_else(invalid)?;
        // Anything past 18 fractional digits is below nanosecond precision.
        if scale < 1_000_000_000_000_000_000 {
            frac_value = frac_value * 10 + u128::from(digit);
            scale *= 10;
        }
    }
    nanos += frac_value * unit_nanos / scale;

    Ok(nanos)
}

fn unit_duration(unit: &str) -> Result<Duration, ParseError> {
    const MINUTE: Duration = Duration::from_secs(60);
    match unit {
        "ns" => Ok(Duration::from_nanos(1)),
        // U+00B5 is the micro sign, U+03BC is the Greek letter mu.
        "us" | "\u{00b5}s" | "\u{03bc}s" => Ok(Duration::from_micros(1)),
        "ms" => Ok(Duration::from_millis(1)),
        "s" => Ok(Duration::from_secs(1)),
        "m" => Ok(MINUTE),
        "h" => Ok(MINUTE * 60),
        "" => Err(ParseError::NoUnit),
        unit => Err(ParseError::InvalidUnit(unit.to_string())),
    }
}
