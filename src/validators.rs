//! Value validators.
//!
//! A closed set of predicates answering "is this value acceptable?", plus the
//! capability flags the sweep logic needs: is the validator numeric, and can
//! values be stepped (and in real or integer increments).
//!
//! Constructors check their bounds up front, so a malformed validator is a
//! configuration error at build time rather than a surprise at validate time.
//!
//! ```rust,ignore
//! use daq_param::validators::{MultiType, Numbers, Strings, Validator};
//!
//! let amplitude = Validator::from(MultiType::new(vec![
//!     Numbers::new(0.0, 1.0)?.into(),
//!     Strings::any().into(),
//! ])?);
//! assert!(amplitude.is_valid(&0.5.into()));
//! assert!(amplitude.is_valid(&"Off".into()));
//! ```

use std::fmt;

use crate::error::{DaqError, DaqResult};
use crate::value::Value;

/// How a numeric validator can be stepped during a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Any positive real step.
    Real,
    /// Positive integer steps only.
    Integer,
}

/// Render bounds the way validator descriptions show them.
fn range_str<T: PartialEq + fmt::Display>(min: Option<T>, max: Option<T>, name: &str) -> String {
    match (min, max) {
        (Some(lo), Some(hi)) if lo == hi => format!(" {}={}", name, lo),
        (Some(lo), Some(hi)) => format!(" {}<={}<={}", lo, name, hi),
        (None, Some(hi)) => format!(" {}<={}", name, hi),
        (Some(lo), None) => format!(" {}>={}", name, lo),
        (None, None) => String::new(),
    }
}

/// Real numbers (ints or floats) within inclusive bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct Numbers {
    min: f64,
    max: f64,
}

impl Numbers {
    /// `min <= value <= max`. Bounds must not be NaN and `max` must exceed `min`.
    pub fn new(min: f64, max: f64) -> DaqResult<Self> {
        if min.is_nan() || max.is_nan() {
            return Err(DaqError::Configuration(
                "Numbers bounds must be numbers, not NaN".to_string(),
            ));
        }
        if max <= min {
            return Err(DaqError::Configuration(format!(
                "Numbers max_value ({}) must be bigger than min_value ({})",
                max, min
            )));
        }
        Ok(Self { min, max })
    }

    /// Any finite or infinite real number.
    pub fn unbounded() -> Self {
        Self {
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
        }
    }

    /// Lower bound.
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Upper bound.
    pub fn max(&self) -> f64 {
        self.max
    }

    fn is_valid(&self, value: &Value) -> bool {
        match value.as_f64() {
            Some(v) => self.min <= v && v <= self.max,
            None => false,
        }
    }
}

impl Default for Numbers {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl fmt::Display for Numbers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lo = self.min.is_finite().then_some(self.min);
        let hi = self.max.is_finite().then_some(self.max);
        write!(f, "<Numbers{}>", range_str(lo, hi, "v"))
    }
}

/// Integers within inclusive bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ints {
    min: i64,
    max: i64,
}

impl Ints {
    /// `min <= value <= max` for integer values; `max` must exceed `min`.
    pub fn new(min: i64, max: i64) -> DaqResult<Self> {
        if max <= min {
            return Err(DaqError::Configuration(format!(
                "Ints max_value ({}) must be an integer bigger than min_value ({})",
                max, min
            )));
        }
        Ok(Self { min, max })
    }

    /// Any `i64`.
    pub fn unbounded() -> Self {
        Self {
            min: i64::MIN,
            max: i64::MAX,
        }
    }

    fn is_valid(&self, value: &Value) -> bool {
        match value {
            Value::Int(v) => self.min <= *v && *v <= self.max,
            _ => false,
        }
    }
}

impl Default for Ints {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl fmt::Display for Ints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lo = (self.min > i64::MIN).then_some(self.min);
        let hi = (self.max < i64::MAX).then_some(self.max);
        write!(f, "<Ints{}>", range_str(lo, hi, "v"))
    }
}

/// Strings with optional length bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Strings {
    min_length: usize,
    max_length: usize,
}

impl Strings {
    /// `min_length <= len(value) <= max_length`, with `max_length >= max(min_length, 1)`.
    pub fn new(min_length: usize, max_length: usize) -> DaqResult<Self> {
        if max_length < min_length.max(1) {
            return Err(DaqError::Configuration(format!(
                "Strings max_length ({}) must be a positive integer no smaller than min_length ({})",
                max_length, min_length
            )));
        }
        Ok(Self {
            min_length,
            max_length,
        })
    }

    /// Any string.
    pub fn any() -> Self {
        Self {
            min_length: 0,
            max_length: usize::MAX,
        }
    }

    fn is_valid(&self, value: &Value) -> bool {
        match value {
            Value::Str(s) => {
                let len = s.chars().count();
                self.min_length <= len && len <= self.max_length
            }
            _ => false,
        }
    }
}

impl Default for Strings {
    fn default() -> Self {
        Self::any()
    }
}

impl fmt::Display for Strings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lo = (self.min_length > 0).then_some(self.min_length);
        let hi = (self.max_length < usize::MAX).then_some(self.max_length);
        write!(f, "<Strings{}>", range_str(lo, hi, "len"))
    }
}

/// One of a fixed set of values.
#[derive(Debug, Clone, PartialEq)]
pub struct Enum {
    values: Vec<Value>,
}

impl Enum {
    /// Accept exactly the given values (at least one).
    pub fn new(values: Vec<Value>) -> DaqResult<Self> {
        if values.is_empty() {
            return Err(DaqError::Configuration(
                "Enum needs at least one value".to_string(),
            ));
        }
        let mut unique: Vec<Value> = Vec::with_capacity(values.len());
        for v in values {
            if !unique.contains(&v) {
                unique.push(v);
            }
        }
        Ok(Self { values: unique })
    }

    fn is_valid(&self, value: &Value) -> bool {
        self.values.contains(value)
    }
}

impl fmt::Display for Enum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.values.iter().map(|v| v.to_string()).collect();
        write!(f, "<Enum: {{{}}}>", parts.join(", "))
    }
}

/// Union of several validators: a value passes if any branch accepts it.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiType {
    validators: Vec<Validator>,
}

impl MultiType {
    /// Combine at least one validator.
    pub fn new(validators: Vec<Validator>) -> DaqResult<Self> {
        if validators.is_empty() {
            return Err(DaqError::Configuration(
                "MultiType needs at least one Validator".to_string(),
            ));
        }
        Ok(Self { validators })
    }

    /// The branches, in declaration order.
    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    fn numeric_branches(&self) -> impl Iterator<Item = &Validator> {
        self.validators.iter().filter(|v| v.is_numeric())
    }
}

impl fmt::Display for MultiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .validators
            .iter()
            .map(|v| {
                let s = v.to_string();
                s.trim_start_matches('<').trim_end_matches('>').to_string()
            })
            .collect();
        write!(f, "<MultiType: {}>", parts.join(", "))
    }
}

/// The closed set of validators a parameter or function argument can use.
#[derive(Debug, Clone, PartialEq)]
pub enum Validator {
    /// Accepts every value; numeric for sweeping purposes.
    Anything,
    /// Booleans only.
    Bool,
    /// See [`Strings`].
    Strings(Strings),
    /// See [`Numbers`].
    Numbers(Numbers),
    /// See [`Ints`].
    Ints(Ints),
    /// See [`Enum`].
    Enum(Enum),
    /// See [`MultiType`].
    MultiType(MultiType),
}

impl Validator {
    /// True if `value` is acceptable.
    pub fn is_valid(&self, value: &Value) -> bool {
        match self {
            Validator::Anything => true,
            Validator::Bool => matches!(value, Value::Bool(_)),
            Validator::Strings(v) => v.is_valid(value),
            Validator::Numbers(v) => v.is_valid(value),
            Validator::Ints(v) => v.is_valid(value),
            Validator::Enum(v) => v.is_valid(value),
            Validator::MultiType(v) => v.validators.iter().any(|b| b.is_valid(value)),
        }
    }

    /// `Ok(())` if acceptable, otherwise a [`DaqError::Validation`] naming `target`.
    pub fn validate(&self, value: &Value, target: &str) -> DaqResult<()> {
        if self.is_valid(value) {
            Ok(())
        } else {
            Err(DaqError::Validation {
                value: value.to_string(),
                target: target.to_string(),
                reason: self.to_string(),
            })
        }
    }

    /// Numeric validators can be swept. A `MultiType` is numeric if any branch is.
    pub fn is_numeric(&self) -> bool {
        match self {
            Validator::Anything | Validator::Numbers(_) | Validator::Ints(_) => true,
            Validator::MultiType(m) => m.numeric_branches().next().is_some(),
            _ => false,
        }
    }

    /// How values may be stepped, if at all.
    ///
    /// A `MultiType` only steps when exactly one branch is numeric.
    pub fn step_kind(&self) -> Option<StepKind> {
        match self {
            Validator::Anything | Validator::Numbers(_) => Some(StepKind::Real),
            Validator::Ints(_) => Some(StepKind::Integer),
            Validator::MultiType(_) => self.sweep_branch().and_then(|b| b.step_kind()),
            _ => None,
        }
    }

    /// The validator that governs stepping: `self` for plain numeric
    /// validators, the single numeric branch of a `MultiType`.
    pub fn sweep_branch(&self) -> Option<&Validator> {
        match self {
            Validator::MultiType(m) => {
                let mut numeric = m.numeric_branches();
                match (numeric.next(), numeric.next()) {
                    (Some(branch), None) => Some(branch),
                    _ => None,
                }
            }
            v if v.is_numeric() => Some(v),
            _ => None,
        }
    }

    /// True when a stepped sweep between `start` and `target` stays on the
    /// numeric path: both are numbers accepted by the sweep branch.
    pub fn can_step_between(&self, start: &Value, target: &Value) -> bool {
        match self.sweep_branch() {
            Some(branch) => {
                start.is_number()
                    && target.is_number()
                    && branch.is_valid(start)
                    && branch.is_valid(target)
            }
            None => false,
        }
    }
}

impl fmt::Display for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validator::Anything => write!(f, "<Anything>"),
            Validator::Bool => write!(f, "<Boolean>"),
            Validator::Strings(v) => v.fmt(f),
            Validator::Numbers(v) => v.fmt(f),
            Validator::Ints(v) => v.fmt(f),
            Validator::Enum(v) => v.fmt(f),
            Validator::MultiType(v) => v.fmt(f),
        }
    }
}

impl From<Numbers> for Validator {
    fn from(v: Numbers) -> Self {
        Validator::Numbers(v)
    }
}

impl From<Ints> for Validator {
    fn from(v: Ints) -> Self {
        Validator::Ints(v)
    }
}

impl From<Strings> for Validator {
    fn from(v: Strings) -> Self {
        Validator::Strings(v)
    }
}

impl From<Enum> for Validator {
    fn from(v: Enum) -> Self {
        Validator::Enum(v)
    }
}

impl From<MultiType> for Validator {
    fn from(v: MultiType) -> Self {
        Validator::MultiType(v)
    }
}
