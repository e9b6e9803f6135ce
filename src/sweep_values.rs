//! SweepValues - pre-validated value schedules bound to one parameter
//!
//! A [`SweepValues`] is an ordered, mutable list of values for an external
//! loop to drive a parameter through. It is created from a parameter with
//! [`Parameter::sweep`] or [`Parameter::sweep_keys`], validates every value
//! as soon as it enters the list, and captures the parameter's `set` and
//! `set_async` handles at creation time. It never reads the device and never
//! carries a getter.
//!
//! ```rust,ignore
//! let mut xs = chan0.sweep(Slice::new(0.0, 1.0, 0.25))?;   // 0, 0.25, 0.5, 0.75
//! xs.append(1.0)?;
//! xs.extend(vec![Value::from(2.0), Value::from(3.0)])?;
//! let back = xs.reversed();
//! for x in &xs {
//!     xs.set(x.clone())?;
//! }
//! ```
//!
//! The [`Sweep`] trait generalises "a sequence of points to set" so that
//! feedback-driven schedules such as [`AdaptiveSweep`] can be driven by the
//! same loop as fixed ones.

use std::ops::{Add, Index, Range, RangeFrom, RangeFull, RangeTo};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{DaqError, DaqResult};
use crate::parameter::{Parameter, ParameterCore};
use crate::ranges::permissive_range;
use crate::sync_async::{AsyncFn, SyncFn};
use crate::value::Value;

/// A `start:stop:step` range. Only complete slices can be expanded.
#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    /// First value.
    pub start: Option<Value>,
    /// Exclusive end.
    pub stop: Option<Value>,
    /// Increment.
    pub step: Option<Value>,
}

impl Slice {
    /// Complete slice.
    pub fn new(start: impl Into<Value>, stop: impl Into<Value>, step: impl Into<Value>) -> Self {
        Self {
            start: Some(start.into()),
            stop: Some(stop.into()),
            step: Some(step.into()),
        }
    }

    /// Possibly incomplete slice, as written with range syntax.
    pub fn partial(start: Option<Value>, stop: Option<Value>, step: Option<Value>) -> Self {
        Self { start, stop, step }
    }

    fn expand(&self) -> DaqResult<Vec<Value>> {
        match (&self.start, &self.stop, &self.step) {
            (Some(start), Some(stop), Some(step)) => {
                permissive_range(start, stop, step).map_err(|e| match e {
                    DaqError::Configuration(msg) => DaqError::TypeMismatch(msg),
                    other => other,
                })
            }
            _ => Err(DaqError::TypeMismatch(
                "sweep ranges need start, stop and step".to_string(),
            )),
        }
    }
}

/// One element of a sweep request.
#[derive(Debug, Clone, PartialEq)]
pub enum SweepKey {
    /// A single point.
    Value(Value),
    /// Explicit points, in order.
    Points(Vec<Value>),
    /// A range of points.
    Slice(Slice),
}

impl SweepKey {
    fn expand(&self) -> DaqResult<Vec<Value>> {
        match self {
            SweepKey::Value(v) => Ok(vec![v.clone()]),
            SweepKey::Points(vs) => Ok(vs.clone()),
            SweepKey::Slice(s) => s.expand(),
        }
    }
}

impl From<Value> for SweepKey {
    fn from(v: Value) -> Self {
        SweepKey::Value(v)
    }
}

impl From<f64> for SweepKey {
    fn from(v: f64) -> Self {
        SweepKey::Value(v.into())
    }
}

impl From<i64> for SweepKey {
    fn from(v: i64) -> Self {
        SweepKey::Value(v.into())
    }
}

impl From<&str> for SweepKey {
    fn from(v: &str) -> Self {
        SweepKey::Value(v.into())
    }
}

impl From<Vec<Value>> for SweepKey {
    fn from(v: Vec<Value>) -> Self {
        SweepKey::Points(v)
    }
}

impl From<Slice> for SweepKey {
    fn from(s: Slice) -> Self {
        SweepKey::Slice(s)
    }
}

impl From<Range<f64>> for SweepKey {
    fn from(r: Range<f64>) -> Self {
        SweepKey::Slice(Slice::partial(Some(r.start.into()), Some(r.end.into()), None))
    }
}

impl From<RangeFrom<f64>> for SweepKey {
    fn from(r: RangeFrom<f64>) -> Self {
        SweepKey::Slice(Slice::partial(Some(r.start.into()), None, None))
    }
}

impl From<RangeTo<f64>> for SweepKey {
    fn from(r: RangeTo<f64>) -> Self {
        SweepKey::Slice(Slice::partial(None, Some(r.end.into()), None))
    }
}

impl From<RangeFull> for SweepKey {
    fn from(_: RangeFull) -> Self {
        SweepKey::Slice(Slice::partial(None, None, None))
    }
}

/// Argument to [`SweepValues::append`] and [`SweepValues::extend`].
#[derive(Clone)]
pub enum SweepItem {
    /// A single value.
    Value(Value),
    /// A plain ordered list of values.
    Values(Vec<Value>),
    /// Another sweep.
    Sweep(SweepValues),
}

impl From<Value> for SweepItem {
    fn from(v: Value) -> Self {
        SweepItem::Value(v)
    }
}

impl From<f64> for SweepItem {
    fn from(v: f64) -> Self {
        SweepItem::Value(v.into())
    }
}

impl From<i64> for SweepItem {
    fn from(v: i64) -> Self {
        SweepItem::Value(v.into())
    }
}

impl From<&str> for SweepItem {
    fn from(v: &str) -> Self {
        SweepItem::Value(v.into())
    }
}

impl From<Vec<Value>> for SweepItem {
    fn from(v: Vec<Value>) -> Self {
        SweepItem::Values(v)
    }
}

impl From<SweepValues> for SweepItem {
    fn from(s: SweepValues) -> Self {
        SweepItem::Sweep(s)
    }
}

impl From<&SweepValues> for SweepItem {
    fn from(s: &SweepValues) -> Self {
        SweepItem::Sweep(s.clone())
    }
}

/// Ordered, validated values for one parameter.
///
/// There is no `+=`: a failed in-place concatenation has no way to report
/// its error, so use [`extend`](Self::extend) instead.
///
/// Cloning (or [`copy`](Self::copy)) gives an independent list with the same
/// parameter binding.
#[derive(Clone)]
pub struct SweepValues {
    core: Arc<ParameterCore>,
    name: String,
    values: Vec<Value>,
    set: Option<SyncFn<Value, ()>>,
    set_async: Option<AsyncFn<Value, ()>>,
}

impl std::fmt::Debug for SweepValues {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SweepValues")
            .field("parameter", &self.name)
            .field("values", &self.values)
            .field("has_set", &self.set.is_some())
            .field("has_set_async", &self.set_async.is_some())
            .finish()
    }
}

impl SweepValues {
    pub(crate) fn new(parameter: &Parameter, keys: Vec<SweepKey>) -> DaqResult<Self> {
        let core = Arc::clone(parameter.core());
        let mut values = Vec::new();
        for key in &keys {
            if let SweepKey::Slice(Slice {
                start: Some(start),
                stop: Some(stop),
                ..
            }) = key
            {
                // an infinite stop is only reachable if the validator allows it
                core.validate(start)?;
                if stop.as_f64().is_some_and(|x| !x.is_finite()) {
                    core.validate(stop)?;
                }
            }
            for value in key.expand()? {
                core.validate(&value)?;
                values.push(value);
            }
        }
        debug!(parameter = %parameter.name(), points = values.len(), "sweep values created");
        Ok(Self {
            core,
            name: parameter.name(),
            values,
            set: parameter.set_handle(),
            set_async: parameter.set_async_handle(),
        })
    }

    /// Name of the bound parameter.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True if this sweep was created from `parameter` (or a clone of it).
    pub fn is_bound_to(&self, parameter: &Parameter) -> bool {
        Arc::ptr_eq(&self.core, parameter.core())
    }

    fn same_parameter(&self, other: &SweepValues) -> DaqResult<()> {
        if Arc::ptr_eq(&self.core, &other.core) {
            Ok(())
        } else {
            Err(DaqError::TypeMismatch(format!(
                "cannot combine sweep values of {} and {}",
                self.name, other.name
            )))
        }
    }

    /// Validate and append a single value.
    pub fn append(&mut self, item: impl Into<SweepItem>) -> DaqResult<()> {
        match item.into() {
            SweepItem::Value(v) => {
                self.core.validate(&v)?;
                self.values.push(v);
                Ok(())
            }
            SweepItem::Values(_) | SweepItem::Sweep(_) => Err(DaqError::TypeMismatch(format!(
                "append takes a single value for {}, use extend for sequences",
                self.name
            ))),
        }
    }

    /// Append another sweep of the same parameter, or a plain list of values.
    ///
    /// A list is validated completely before anything is appended.
    pub fn extend(&mut self, item: impl Into<SweepItem>) -> DaqResult<()> {
        match item.into() {
            SweepItem::Sweep(other) => {
                self.same_parameter(&other)?;
                self.values.extend(other.values);
                Ok(())
            }
            SweepItem::Values(values) => {
                for v in &values {
                    self.core.validate(v)?;
                }
                self.values.extend(values);
                Ok(())
            }
            SweepItem::Value(v) => Err(DaqError::TypeMismatch(format!(
                "extend needs a sequence for {}, got {} {}",
                self.name,
                v.type_name(),
                v
            ))),
        }
    }

    /// New sweep holding these values followed by `other`'s.
    pub fn concat(&self, other: impl Into<SweepItem>) -> DaqResult<SweepValues> {
        let mut out = self.copy();
        out.extend(other)?;
        Ok(out)
    }

    /// Reverse in place.
    pub fn reverse(&mut self) {
        self.values.reverse();
    }

    /// Reversed copy.
    pub fn reversed(&self) -> SweepValues {
        let mut out = self.copy();
        out.reverse();
        out
    }

    /// Independent copy with the same binding.
    pub fn copy(&self) -> SweepValues {
        self.clone()
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if there are no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at `index`.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Membership, with numeric cross-type equality.
    pub fn contains(&self, value: &Value) -> bool {
        self.values.contains(value)
    }

    /// Iterate over the values.
    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.values.iter()
    }

    /// The values as a slice.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// True if a blocking setter was captured.
    pub fn has_set(&self) -> bool {
        self.set.is_some()
    }

    /// True if a suspendable setter was captured.
    pub fn has_set_async(&self) -> bool {
        self.set_async.is_some()
    }

    /// The captured blocking setter.
    pub fn setter(&self) -> DaqResult<SyncFn<Value, ()>> {
        self.set
            .clone()
            .ok_or_else(|| DaqError::capability_absent(&self.name, "set"))
    }

    /// The captured suspendable setter.
    pub fn async_setter(&self) -> DaqResult<AsyncFn<Value, ()>> {
        self.set_async
            .clone()
            .ok_or_else(|| DaqError::capability_absent(&self.name, "set_async"))
    }

    /// Set the bound parameter through the captured blocking setter.
    pub fn set(&self, value: Value) -> DaqResult<()> {
        (self.setter()?)(value)
    }

    /// Set the bound parameter through the captured suspendable setter.
    pub async fn set_async(&self, value: Value) -> DaqResult<()> {
        (self.async_setter()?)(value).await
    }

    /// Drive this schedule with a position cursor through the [`Sweep`] trait.
    pub fn into_sweep(self) -> FixedSweep {
        FixedSweep {
            values: self,
            position: 0,
        }
    }
}

impl Index<usize> for SweepValues {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        &self.values[index]
    }
}

impl IntoIterator for SweepValues {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl<'a> IntoIterator for &'a SweepValues {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

impl Add<SweepValues> for SweepValues {
    type Output = DaqResult<SweepValues>;

    fn add(self, rhs: SweepValues) -> Self::Output {
        self.concat(rhs)
    }
}

impl Add<&SweepValues> for &SweepValues {
    type Output = DaqResult<SweepValues>;

    fn add(self, rhs: &SweepValues) -> Self::Output {
        self.concat(rhs)
    }
}

impl Add<Vec<Value>> for SweepValues {
    type Output = DaqResult<SweepValues>;

    fn add(self, rhs: Vec<Value>) -> Self::Output {
        self.concat(rhs)
    }
}

/// A schedule of points that an external loop sets one at a time.
///
/// After setting each point and measuring, the loop reports the measurement
/// through [`feedback`](Sweep::feedback) so adaptive schedules can choose
/// the next point.
#[async_trait]
pub trait Sweep: Send {
    /// Name of the parameter being swept.
    fn name(&self) -> &str;

    /// Start (or restart) from the first point.
    fn restart(&mut self);

    /// The next point, or `None` when finished.
    fn next_point(&mut self) -> Option<Value>;

    /// Measurement taken at the last point.
    fn feedback(&mut self, _measured: &Value) -> DaqResult<()> {
        Ok(())
    }

    /// Set the parameter from a blocking caller.
    fn set(&self, value: Value) -> DaqResult<()>;

    /// Set the parameter from a suspended caller.
    async fn set_async(&self, value: Value) -> DaqResult<()>;
}

/// Set every point of `sweep` in order, measuring after each one.
///
/// Returns `(point, measurement)` pairs.
pub fn run_sweep<S, M>(sweep: &mut S, mut measure: M) -> DaqResult<Vec<(Value, Value)>>
where
    S: Sweep + ?Sized,
    M: FnMut(&Value) -> DaqResult<Value>,
{
    sweep.restart();
    let mut out = Vec::new();
    while let Some(point) = sweep.next_point() {
        sweep.set(point.clone())?;
        let measured = measure(&point)?;
        sweep.feedback(&measured)?;
        out.push((point, measured));
    }
    Ok(out)
}

/// [`SweepValues`] walked with a cursor.
#[derive(Debug, Clone)]
pub struct FixedSweep {
    values: SweepValues,
    position: usize,
}

#[async_trait]
impl Sweep for FixedSweep {
    fn name(&self) -> &str {
        self.values.name()
    }

    fn restart(&mut self) {
        self.position = 0;
    }

    fn next_point(&mut self) -> Option<Value> {
        let point = self.values.get(self.position).cloned()?;
        self.position += 1;
        Some(point)
    }

    fn set(&self, value: Value) -> DaqResult<()> {
        self.values.set(value)
    }

    async fn set_async(&self, value: Value) -> DaqResult<()> {
        self.values.set_async(value).await
    }
}

/// Sweep whose step size adapts to the measured response.
///
/// Each step aims for a change of `target_delta` in the measured value,
/// assuming the response is locally linear. Steps never grow by more than a
/// factor of three at once and stay within `[min_step, max_step]`. The last
/// point is exactly `end`.
#[derive(Clone)]
pub struct AdaptiveSweep {
    name: String,
    set: Option<SyncFn<Value, ()>>,
    set_async: Option<AsyncFn<Value, ()>>,
    start: f64,
    end: f64,
    direction: f64,
    target_delta: f64,
    max_step: f64,
    min_step: f64,
    setting: Option<f64>,
    step: Option<f64>,
    measured: Option<f64>,
    delta: Option<f64>,
    feedback_count: usize,
}

impl AdaptiveSweep {
    /// Adaptive sweep of `parameter` from `start` to `end`.
    ///
    /// `max_step` defaults to 1/100 of the span and `min_step` to 1/100 of
    /// `max_step`.
    pub fn new(
        parameter: &Parameter,
        start: f64,
        end: f64,
        target_delta: f64,
        max_step: Option<f64>,
        min_step: Option<f64>,
    ) -> DaqResult<Self> {
        parameter.validate(&start.into())?;
        parameter.validate(&end.into())?;
        if start == end {
            return Err(DaqError::Configuration(
                "adaptive sweep needs distinct start and end".to_string(),
            ));
        }
        if !(target_delta.is_finite() && target_delta > 0.0) {
            return Err(DaqError::Configuration(format!(
                "target_delta must be positive, got {}",
                target_delta
            )));
        }
        let max_step = max_step.unwrap_or((end - start).abs() / 100.0);
        let min_step = min_step.unwrap_or(max_step / 100.0);
        if !(min_step > 0.0 && max_step >= min_step) {
            return Err(DaqError::Configuration(format!(
                "need 0 < min_step <= max_step, got {} and {}",
                min_step, max_step
            )));
        }
        Ok(Self {
            name: parameter.name(),
            set: parameter.set_handle(),
            set_async: parameter.set_async_handle(),
            start,
            end,
            direction: if end > start { 1.0 } else { -1.0 },
            target_delta,
            max_step,
            min_step,
            setting: None,
            step: None,
            measured: None,
            delta: None,
            feedback_count: 0,
        })
    }
}

#[async_trait]
impl Sweep for AdaptiveSweep {
    fn name(&self) -> &str {
        &self.name
    }

    fn restart(&mut self) {
        self.setting = None;
        self.step = None;
        self.measured = None;
        self.delta = None;
        self.feedback_count = 0;
    }

    fn next_point(&mut self) -> Option<Value> {
        self.feedback_count = 0;
        let Some(setting) = self.setting else {
            self.setting = Some(self.start);
            return Some(Value::Float(self.start));
        };
        if setting == self.end {
            return None;
        }
        let step = match (self.step, self.delta) {
            (Some(prev), Some(delta)) if delta != 0.0 => {
                (prev * self.target_delta / delta).abs().min(prev * 3.0)
            }
            (Some(prev), Some(_)) => prev * 3.0,
            _ => self.min_step,
        };
        let step = step.clamp(self.min_step, self.max_step);
        let mut next = setting + self.direction * step;
        if next * self.direction > self.end * self.direction {
            next = self.end;
        }
        self.step = Some(step);
        self.setting = Some(next);
        Some(Value::Float(next))
    }

    fn feedback(&mut self, measured: &Value) -> DaqResult<()> {
        self.feedback_count += 1;
        if self.feedback_count > 1 {
            return Err(DaqError::Runtime(
                "adaptive sweep takes one measurement per point".to_string(),
            ));
        }
        let measured = measured.as_f64().ok_or_else(|| {
            DaqError::TypeMismatch(format!("adaptive sweep needs a numeric measurement, got {}", measured))
        })?;
        if let Some(prev) = self.measured {
            self.delta = Some(measured - prev);
        }
        self.measured = Some(measured);
        Ok(())
    }

    fn set(&self, value: Value) -> DaqResult<()> {
        match &self.set {
            Some(set) => set(value),
            None => Err(DaqError::capability_absent(&self.name, "set")),
        }
    }

    async fn set_async(&self, value: Value) -> DaqResult<()> {
        match &self.set_async {
            Some(set) => set(value).await,
            None => Err(DaqError::capability_absent(&self.name, "set_async")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::ParameterBuilder;
    use crate::validators::Numbers;
    use parking_lot::Mutex;

    fn param(name: &str) -> (Parameter, Arc<Mutex<Vec<Value>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let p = ParameterBuilder::new()
            .name(name)
            .vals(Numbers::new(-10.0, 10.0).unwrap())
            .connect_to_hardware_write(move |v| {
                sink.lock().push(v);
                Ok(())
            })
            .build()
            .unwrap();
        (p, log)
    }

    fn floats(xs: &SweepValues) -> Vec<f64> {
        xs.iter().filter_map(Value::as_f64).collect()
    }

    #[test]
    fn test_slice_and_points() {
        let (p, _) = param("c0");
        let xs = p
            .sweep_keys(vec![
                Slice::new(0.0, 1.0, 0.25).into(),
                5.0.into(),
                vec![Value::from(6.0), Value::from(7.0)].into(),
            ])
            .unwrap();
        assert_eq!(floats(&xs), vec![0.0, 0.25, 0.5, 0.75, 5.0, 6.0, 7.0]);
        assert!(xs.contains(&Value::Int(5)));
        assert_eq!(xs[1], Value::Float(0.25));
    }

    #[test]
    fn test_incomplete_slices_rejected() {
        let (p, _) = param("c0");
        assert!(matches!(p.sweep(0.0..1.0), Err(DaqError::TypeMismatch(_))));
        assert!(matches!(p.sweep(..), Err(DaqError::TypeMismatch(_))));
        assert!(matches!(p.sweep(1.0..), Err(DaqError::TypeMismatch(_))));
        assert!(matches!(p.sweep(..1.0), Err(DaqError::TypeMismatch(_))));
    }

    #[test]
    fn test_invalid_point_fails_eagerly() {
        let (p, log) = param("c0");
        let err = p.sweep(Slice::new(5.0, 20.0, 5.0)).unwrap_err();
        assert!(matches!(err, DaqError::Validation { .. }));
        let mut xs = p.sweep(1.0).unwrap();
        assert!(xs.append(11.0).is_err());
        assert!(xs.extend(vec![Value::from(2.0), Value::from(20.0)]).is_err());
        assert_eq!(xs.len(), 1);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_append_and_extend_shapes() {
        let (p, _) = param("c0");
        let mut xs = p.sweep(1.0).unwrap();
        let ys = p.sweep(2.0).unwrap();
        assert!(matches!(xs.append(&ys), Err(DaqError::TypeMismatch(_))));
        assert!(matches!(xs.extend(3.0), Err(DaqError::TypeMismatch(_))));
        xs.extend(&ys).unwrap();
        xs.append(4.0).unwrap();
        assert_eq!(floats(&xs), vec![1.0, 2.0, 4.0]);
    }

    #[test]
    fn test_combining_different_parameters_fails() {
        let (p, _) = param("c0");
        let (q, _) = param("c1");
        let xs = p.sweep(1.0).unwrap();
        let ys = q.sweep(1.0).unwrap();
        assert!(matches!(&xs + &ys, Err(DaqError::TypeMismatch(_))));
        let mut zs = xs.copy();
        assert!(zs.extend(&ys).is_err());
        assert!(xs.is_bound_to(&p));
        assert!(!ys.is_bound_to(&p));
    }

    #[test]
    fn test_reverse_copy_and_concat() {
        let (p, _) = param("c0");
        let xs = p.sweep(Slice::new(0.0, 3.0, 1.0)).unwrap();
        let ys = p.sweep(vec![Value::from(9.0)]).unwrap();

        let both = (&xs + &ys).unwrap();
        assert_eq!(floats(&both), vec![0.0, 1.0, 2.0, 9.0]);

        let mut twice = xs.reversed();
        assert_eq!(floats(&twice), vec![2.0, 1.0, 0.0]);
        twice.reverse();
        assert_eq!(twice.values(), xs.values());

        let mut copy = xs.copy();
        copy.append(5.0).unwrap();
        assert_eq!(xs.len(), 3);
        assert_eq!(copy.len(), 4);
    }

    #[test]
    fn test_set_through_captured_handles() {
        let (mut p, log) = param("c0");
        let xs = p.sweep(1.0).unwrap();
        p.remove_set();
        let ys = p.sweep(2.0).unwrap();

        assert!(xs.has_set());
        assert!(!xs.has_set_async());
        xs.set(Value::from(1.0)).unwrap();
        assert_eq!(log.lock().len(), 1);

        assert!(!ys.has_set());
        assert!(matches!(
            ys.set(Value::from(2.0)),
            Err(DaqError::CapabilityAbsent { .. })
        ));
        assert!(ys.setter().is_err());
        assert!(ys.async_setter().is_err());
    }

    #[test]
    fn test_fixed_sweep_runs_in_order() {
        let (p, log) = param("c0");
        let mut sweep = p.sweep(Slice::new(0.0, 2.0, 0.5)).unwrap().into_sweep();
        let results = run_sweep(&mut sweep, |x| Ok(Value::Float(x.as_f64().unwrap_or(0.0) * 2.0))).unwrap();
        assert_eq!(results.len(), 4);
        assert_eq!(log.lock().len(), 4);
        assert_eq!(results[3].1, Value::Float(3.0));
    }

    #[test]
    fn test_adaptive_sweep_reaches_end() {
        let (p, log) = param("c0");
        let mut sweep = AdaptiveSweep::new(&p, 0.0, 1.0, 0.05, Some(0.2), Some(0.01)).unwrap();
        let results = run_sweep(&mut sweep, |x| Ok(Value::Float(x.as_f64().unwrap_or(0.0)))).unwrap();
        let points: Vec<f64> = results.iter().filter_map(|(x, _)| x.as_f64()).collect();
        assert_eq!(points.first(), Some(&0.0));
        assert_eq!(points.last(), Some(&1.0));
        assert!(points.windows(2).all(|w| w[1] > w[0] && w[1] - w[0] <= 0.2 + 1e-12));
        assert_eq!(log.lock().len(), points.len());

        assert!(AdaptiveSweep::new(&p, 0.0, 20.0, 0.1, None, None).is_err());
        assert!(AdaptiveSweep::new(&p, 1.0, 1.0, 0.1, None, None).is_err());
    }

    #[test]
    fn test_adaptive_sweep_single_feedback_per_point() {
        let (p, _) = param("c0");
        let mut sweep = AdaptiveSweep::new(&p, 0.0, 1.0, 0.1, None, None).unwrap();
        sweep.next_point();
        sweep.feedback(&Value::Float(0.0)).unwrap();
        assert!(sweep.feedback(&Value::Float(0.0)).is_err());
    }
}
