//! Parameter - validated, cacheable, sweepable device quantities
//!
//! A [`Parameter`] wraps one device quantity behind a uniform get/set
//! interface. The getter and setter can be command templates sent through a
//! [`CommandDispatcher`], plain blocking closures, or closures returning
//! futures; the [`sync_async`](crate::sync_async) bridge makes each available
//! from both blocking and suspended call sites where possible.
//!
//! # Architecture
//!
//! `Parameter` is a thin handle over a shared `ParameterCore`:
//! - the core owns identity, shape, validator, sweep settings and the cache
//! - the handle owns four optional capability handles (`get`, `get_async`,
//!   `set`, `set_async`) that can be removed individually
//!
//! [`SweepValues`](crate::sweep_values::SweepValues) created from a parameter
//! hold the same core, which is how they recognise their parameter.
//!
//! # Stepped sweeps
//!
//! With `sweep_step` and `sweep_delay` configured, `set` walks from the last
//! known value to the target in increments no larger than `sweep_step`,
//! waiting `sweep_delay` after each intermediate write and finishing with a
//! write of the exact target. The baseline is the cached value when fresh,
//! otherwise a fresh query when the parameter is gettable. Without any
//! baseline, or when either endpoint is not numeric (a `MultiType` moving in
//! or out of a string sentinel), the target is written directly.
//!
//! # Example
//!
//! ```rust,ignore
//! use daq_param::parameter::ParameterBuilder;
//! use daq_param::validators::Numbers;
//!
//! let ampl = ParameterBuilder::new()
//!     .name("ampl")
//!     .get_cmd("ampl?")
//!     .set_cmd("ampl {value:.3}")
//!     .parser(ParserKind::Float)
//!     .vals(Numbers::new(0.0, 1.0)?)
//!     .sweep_step(0.1)
//!     .sweep_delay(0.005)
//!     .dispatcher(dispatcher)
//!     .build()?;
//!
//! ampl.set(0.5.into())?;
//! ampl.set_async(0.2.into()).await?;
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::command::{format_value, CommandDispatcher, ParseFn, ParserKind};
use crate::error::{DaqError, DaqResult};
use crate::ranges::permissive_range;
use crate::sweep_values::{SweepKey, SweepValues};
use crate::sync_async::{AsyncFn, SyncFn, Syncable};
use crate::validators::{StepKind, Validator};
use crate::value::Value;

/// Who a parameter is: one named quantity or several returned together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Identity {
    /// A single named quantity.
    Single {
        /// Name.
        name: String,
        /// Human readable label.
        label: String,
    },
    /// Several quantities read together.
    Multi {
        /// Names, in response order.
        names: Vec<String>,
        /// Labels, one per name.
        labels: Vec<String>,
    },
}

impl Identity {
    /// Display name; multiple names are joined with commas.
    pub fn name(&self) -> String {
        match self {
            Identity::Single { name, .. } => name.clone(),
            Identity::Multi { names, .. } => names.join(","),
        }
    }

    /// Display label.
    pub fn label(&self) -> String {
        match self {
            Identity::Single { label, .. } => label.clone(),
            Identity::Multi { labels, .. } => labels.join(","),
        }
    }
}

/// Scalar or array shape of the values a parameter holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Shape {
    /// One value.
    Scalar,
    /// One-dimensional array of this length.
    Sized(usize),
    /// Array with these dimensions.
    Array(Vec<usize>),
}

/// Descriptive setpoint metadata, stored as given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Setpoints {
    /// Setpoint arrays.
    pub setpoints: Option<serde_json::Value>,
    /// Setpoint names.
    pub setpoint_names: Option<serde_json::Value>,
    /// Setpoint labels.
    pub setpoint_labels: Option<serde_json::Value>,
}

/// Point-in-time summary of a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSnapshot {
    /// Parameter name.
    pub name: String,
    /// Parameter label.
    pub label: String,
    /// Last known value.
    pub value: Option<Value>,
    /// When `value` was obtained.
    pub ts: Option<DateTime<Utc>>,
    /// Validator description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vals: Option<String>,
}

#[derive(Debug, Clone)]
struct SweepConfig {
    step: Value,
    delay: Duration,
}

#[derive(Debug, Clone)]
struct Cached {
    value: Value,
    ts: DateTime<Utc>,
    at: Instant,
}

/// State shared by a parameter and every sweep created from it.
pub(crate) struct ParameterCore {
    identity: Identity,
    shape: Shape,
    vals: Option<Validator>,
    sweep: Option<SweepConfig>,
    max_val_age: Option<Duration>,
    cache_gets: bool,
    cache: Mutex<Option<Cached>>,
    getter: Syncable<(), Value>,
    setter: Syncable<Value, ()>,
    setpoints: Setpoints,
}

impl ParameterCore {
    fn name(&self) -> String {
        self.identity.name()
    }

    pub(crate) fn validate(&self, value: &Value) -> DaqResult<()> {
        match &self.vals {
            Some(vals) => vals.validate(value, &self.name()),
            None => Ok(()),
        }
    }

    fn store(&self, value: Value) {
        *self.cache.lock() = Some(Cached {
            value,
            ts: Utc::now(),
            at: Instant::now(),
        });
    }

    fn cached(&self) -> Option<Cached> {
        self.cache.lock().clone()
    }

    fn fresh_cached(&self) -> Option<Value> {
        let cached = self.cached()?;
        match self.max_val_age {
            None => Some(cached.value),
            Some(age) if age.is_zero() => None,
            Some(age) if cached.at.elapsed() <= age => Some(cached.value),
            Some(_) => None,
        }
    }

    fn query(&self) -> DaqResult<Value> {
        let value = self.getter.call(&self.name(), ())?;
        self.store(value.clone());
        Ok(value)
    }

    async fn query_async(&self) -> DaqResult<Value> {
        let value = self.getter.call_async(&self.name(), ()).await?;
        self.store(value.clone());
        Ok(value)
    }

    fn get(&self) -> DaqResult<Value> {
        if self.cache_gets {
            if let Some(value) = self.fresh_cached() {
                return Ok(value);
            }
        }
        self.query()
    }

    async fn get_async(&self) -> DaqResult<Value> {
        if self.cache_gets {
            if let Some(value) = self.fresh_cached() {
                return Ok(value);
            }
        }
        self.query_async().await
    }

    fn write(&self, value: Value) -> DaqResult<()> {
        self.setter.call(&self.name(), value.clone())?;
        self.store(value);
        Ok(())
    }

    async fn write_async(&self, value: Value) -> DaqResult<()> {
        self.setter.call_async(&self.name(), value.clone()).await?;
        self.store(value);
        Ok(())
    }

    /// Intermediate values for a stepped sweep from `start` to `target`,
    /// excluding both. Empty means "write the target directly".
    fn sweep_steps(&self, start: Option<Value>, target: &Value) -> DaqResult<Vec<Value>> {
        let (Some(sweep), Some(vals)) = (&self.sweep, &self.vals) else {
            return Ok(Vec::new());
        };
        let Some(start) = start else {
            return Ok(Vec::new());
        };
        let name = self.name();
        vals.validate(&start, &name)?;
        if !vals.can_step_between(&start, target) {
            warn!(
                parameter = %name,
                from = %start,
                to = %target,
                "not sweeping between non-numeric values, setting directly"
            );
            return Ok(Vec::new());
        }
        let mut steps = permissive_range(&start, target, &sweep.step)?;
        if !steps.is_empty() {
            steps.remove(0);
        }
        for step in &steps {
            vals.validate(step, &name)?;
        }
        Ok(steps)
    }

    fn sweep_baseline(&self) -> DaqResult<Option<Value>> {
        if let Some(value) = self.fresh_cached() {
            return Ok(Some(value));
        }
        if self.getter.is_defined() {
            return self.query().map(Some);
        }
        Ok(self.cached().map(|c| c.value))
    }

    async fn sweep_baseline_async(&self) -> DaqResult<Option<Value>> {
        if let Some(value) = self.fresh_cached() {
            return Ok(Some(value));
        }
        if self.getter.is_defined() {
            return self.query_async().await.map(Some);
        }
        Ok(self.cached().map(|c| c.value))
    }

    fn set(&self, value: Value) -> DaqResult<()> {
        self.validate(&value)?;
        let delay = match &self.sweep {
            Some(sweep) => sweep.delay,
            None => return self.write(value),
        };
        let start = self.sweep_baseline()?;
        let steps = self.sweep_steps(start, &value)?;
        let mut deadline = Instant::now();
        for step in steps {
            trace!(parameter = %self.name(), step = %step, "sweep step");
            self.write(step)?;
            deadline += delay;
            match deadline.checked_duration_since(Instant::now()) {
                Some(wait) => std::thread::sleep(wait),
                None => warn!(parameter = %self.name(), "negative delay in sweep, step took longer than sweep_delay"),
            }
        }
        self.write(value)
    }

    async fn set_async(&self, value: Value) -> DaqResult<()> {
        self.validate(&value)?;
        let delay = match &self.sweep {
            Some(sweep) => sweep.delay,
            None => return self.write_async(value).await,
        };
        let start = self.sweep_baseline_async().await?;
        let steps = self.sweep_steps(start, &value)?;
        let mut deadline = tokio::time::Instant::now();
        for step in steps {
            trace!(parameter = %self.name(), step = %step, "sweep step");
            self.write_async(step).await?;
            deadline += delay;
            if deadline < tokio::time::Instant::now() {
                warn!(parameter = %self.name(), "negative delay in sweep, step took longer than sweep_delay");
            }
            tokio::time::sleep_until(deadline).await;
        }
        self.write_async(value).await
    }
}

/// A named, validated, cacheable device quantity.
///
/// Cloning yields another handle to the same parameter state. Driving one
/// parameter from several call sites at once is not coordinated: writes from
/// overlapping sets interleave in an undefined order.
#[derive(Clone)]
pub struct Parameter {
    core: Arc<ParameterCore>,
    get: Option<SyncFn<(), Value>>,
    get_async: Option<AsyncFn<(), Value>>,
    set: Option<SyncFn<Value, ()>>,
    set_async: Option<AsyncFn<Value, ()>>,
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("identity", &self.core.identity)
            .field("shape", &self.core.shape)
            .field("vals", &self.core.vals)
            .field("has_get", &self.get.is_some())
            .field("has_get_async", &self.get_async.is_some())
            .field("has_set", &self.set.is_some())
            .field("has_set_async", &self.set_async.is_some())
            .finish()
    }
}

impl Parameter {
    fn from_core(core: ParameterCore) -> Self {
        let core = Arc::new(core);

        let get: Option<SyncFn<(), Value>> = core.getter.is_defined().then(|| {
            let c = Arc::clone(&core);
            Arc::new(move |()| c.get()) as SyncFn<(), Value>
        });
        let get_async: Option<AsyncFn<(), Value>> = core.getter.has_async().then(|| {
            let c = Arc::clone(&core);
            Arc::new(move |()| -> BoxFuture<'static, DaqResult<Value>> {
                let c = Arc::clone(&c);
                Box::pin(async move { c.get_async().await })
            }) as AsyncFn<(), Value>
        });
        let set: Option<SyncFn<Value, ()>> = core.setter.is_defined().then(|| {
            let c = Arc::clone(&core);
            Arc::new(move |value: Value| c.set(value)) as SyncFn<Value, ()>
        });
        let set_async: Option<AsyncFn<Value, ()>> = core.setter.has_async().then(|| {
            let c = Arc::clone(&core);
            Arc::new(move |value: Value| -> BoxFuture<'static, DaqResult<()>> {
                let c = Arc::clone(&c);
                Box::pin(async move { c.set_async(value).await })
            }) as AsyncFn<Value, ()>
        });

        Self {
            core,
            get,
            get_async,
            set,
            set_async,
        }
    }

    pub(crate) fn core(&self) -> &Arc<ParameterCore> {
        &self.core
    }

    /// Display name (comma-joined for multi-name parameters).
    pub fn name(&self) -> String {
        self.core.name()
    }

    /// Display label.
    pub fn label(&self) -> String {
        self.core.identity.label()
    }

    /// Name or names.
    pub fn identity(&self) -> &Identity {
        &self.core.identity
    }

    /// Scalar or array shape.
    pub fn shape(&self) -> &Shape {
        &self.core.shape
    }

    /// The validator, if any.
    pub fn vals(&self) -> Option<&Validator> {
        self.core.vals.as_ref()
    }

    /// Setpoint metadata, as configured.
    pub fn setpoints(&self) -> &Setpoints {
        &self.core.setpoints
    }

    fn missing(&self, capability: &str, defined: bool, what: &str) -> DaqError {
        if defined {
            DaqError::capability_absent(self.name(), capability)
        } else {
            DaqError::NotImplemented(format!("{} has no {}", self.name(), what))
        }
    }

    /// Read the value, querying the device unless a fresh cached value may
    /// be used.
    pub fn get(&self) -> DaqResult<Value> {
        match &self.get {
            Some(get) => get(()),
            None => Err(self.missing("get", self.core.getter.is_defined(), "get capability")),
        }
    }

    /// Suspendable [`get`](Self::get).
    pub async fn get_async(&self) -> DaqResult<Value> {
        match &self.get_async {
            Some(get) => get(()).await,
            None => Err(self.missing("get_async", self.core.getter.is_defined(), "get capability")),
        }
    }

    /// Validate and write `value`, stepping when a sweep is configured.
    pub fn set(&self, value: Value) -> DaqResult<()> {
        match &self.set {
            Some(set) => set(value),
            None => Err(self.missing("set", self.core.setter.is_defined(), "set capability")),
        }
    }

    /// Suspendable [`set`](Self::set).
    pub async fn set_async(&self, value: Value) -> DaqResult<()> {
        match &self.set_async {
            Some(set) => set(value).await,
            None => Err(self.missing("set_async", self.core.setter.is_defined(), "set capability")),
        }
    }

    /// Check `value` against the validator without touching the device.
    pub fn validate(&self, value: &Value) -> DaqResult<()> {
        self.core.validate(value)
    }

    /// Build a sweep from a single key: a value, a point list or a full slice.
    pub fn sweep(&self, key: impl Into<SweepKey>) -> DaqResult<SweepValues> {
        SweepValues::new(self, vec![key.into()])
    }

    /// Build a sweep from several keys, flattened in order.
    pub fn sweep_keys(&self, keys: Vec<SweepKey>) -> DaqResult<SweepValues> {
        SweepValues::new(self, keys)
    }

    /// True while a blocking get is attached.
    pub fn has_get(&self) -> bool {
        self.get.is_some()
    }

    /// True while a suspendable get is attached.
    pub fn has_get_async(&self) -> bool {
        self.get_async.is_some()
    }

    /// True while a blocking set is attached.
    pub fn has_set(&self) -> bool {
        self.set.is_some()
    }

    /// True while a suspendable set is attached.
    pub fn has_set_async(&self) -> bool {
        self.set_async.is_some()
    }

    /// Detach the blocking get.
    pub fn remove_get(&mut self) {
        self.get = None;
    }

    /// Detach the suspendable get.
    pub fn remove_get_async(&mut self) {
        self.get_async = None;
    }

    /// Detach the blocking set.
    pub fn remove_set(&mut self) {
        self.set = None;
    }

    /// Detach the suspendable set.
    pub fn remove_set_async(&mut self) {
        self.set_async = None;
    }

    pub(crate) fn set_handle(&self) -> Option<SyncFn<Value, ()>> {
        self.set.clone()
    }

    pub(crate) fn set_async_handle(&self) -> Option<AsyncFn<Value, ()>> {
        self.set_async.clone()
    }

    /// Last known value, fresh or not.
    pub fn cached(&self) -> Option<Value> {
        self.core.cached().map(|c| c.value)
    }

    /// Timestamp of the last known value.
    pub fn cached_at(&self) -> Option<DateTime<Utc>> {
        self.core.cached().map(|c| c.ts)
    }

    /// Forget the cached value.
    pub fn invalidate_cache(&self) {
        *self.core.cache.lock() = None;
    }

    /// Summary for an external serializer. With `update`, gettable
    /// parameters are queried first.
    pub fn snapshot(&self, update: bool) -> DaqResult<ParameterSnapshot> {
        if update && self.has_get() {
            self.get()?;
        }
        let cached = self.core.cached();
        Ok(ParameterSnapshot {
            name: self.name(),
            label: self.label(),
            value: cached.as_ref().map(|c| c.value.clone()),
            ts: cached.map(|c| c.ts),
            vals: self.core.vals.as_ref().map(|v| v.to_string()),
        })
    }
}

/// Fluent construction of a [`Parameter`].
///
/// Identity and shape are collected loosely and checked in
/// [`build`](Self::build), which rejects contradictory settings with
/// [`DaqError::Configuration`].
#[derive(Default)]
pub struct ParameterBuilder {
    name: Option<String>,
    names: Option<Vec<String>>,
    label: Option<String>,
    labels: Option<Vec<String>>,
    size: Option<usize>,
    sizes: Option<Vec<usize>>,
    get_cmd: Option<String>,
    set_cmd: Option<String>,
    get_fn: Option<SyncFn<(), Value>>,
    get_async_fn: Option<AsyncFn<(), Value>>,
    set_fn: Option<SyncFn<Value, ()>>,
    set_async_fn: Option<AsyncFn<Value, ()>>,
    parser: Option<ParseFn>,
    vals: Option<Validator>,
    sweep_step: Option<Value>,
    sweep_delay: Option<f64>,
    max_val_age: Option<f64>,
    cache_gets: Option<bool>,
    setpoints: Setpoints,
    dispatcher: Option<CommandDispatcher>,
}

impl ParameterBuilder {
    /// Empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Single name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Several names for a multi-valued parameter.
    pub fn names(mut self, names: Vec<String>) -> Self {
        self.names = Some(names);
        self
    }

    /// Label for a single-name parameter (defaults to the name).
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Labels for a multi-name parameter (default to the names).
    pub fn labels(mut self, labels: Vec<String>) -> Self {
        self.labels = Some(labels);
        self
    }

    /// One-dimensional array length.
    pub fn size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    /// Array dimensions.
    pub fn sizes(mut self, sizes: Vec<usize>) -> Self {
        self.sizes = Some(sizes);
        self
    }

    /// Query template.
    pub fn get_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.get_cmd = Some(cmd.into());
        self
    }

    /// Write template using `{value}`.
    pub fn set_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.set_cmd = Some(cmd.into());
        self
    }

    /// Blocking getter.
    pub fn connect_to_hardware_read(
        mut self,
        reader: impl Fn() -> DaqResult<Value> + Send + Sync + 'static,
    ) -> Self {
        self.get_fn = Some(Arc::new(move |()| reader()));
        self
    }

    /// Suspendable getter.
    pub fn connect_to_hardware_read_async<F, Fut>(mut self, reader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DaqResult<Value>> + Send + 'static,
    {
        self.get_async_fn = Some(Arc::new(
            move |()| -> BoxFuture<'static, DaqResult<Value>> { Box::pin(reader()) },
        ));
        self
    }

    /// Blocking setter.
    pub fn connect_to_hardware_write(
        mut self,
        writer: impl Fn(Value) -> DaqResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.set_fn = Some(Arc::new(writer));
        self
    }

    /// Suspendable setter.
    pub fn connect_to_hardware_write_async<F, Fut>(mut self, writer: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DaqResult<()>> + Send + 'static,
    {
        self.set_async_fn = Some(Arc::new(
            move |value: Value| -> BoxFuture<'static, DaqResult<()>> { Box::pin(writer(value)) },
        ));
        self
    }

    /// Response parser for `get_cmd`.
    pub fn parse_function(mut self, parser: ParseFn) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Built-in response parser for `get_cmd`.
    pub fn parser(self, kind: ParserKind) -> Self {
        self.parse_function(kind.into_fn())
    }

    /// Validator for sets and sweeps.
    pub fn vals(mut self, vals: impl Into<Validator>) -> Self {
        self.vals = Some(vals.into());
        self
    }

    /// Largest increment per sweep step.
    pub fn sweep_step(mut self, step: impl Into<Value>) -> Self {
        self.sweep_step = Some(step.into());
        self
    }

    /// Wait after each intermediate sweep write, in seconds.
    pub fn sweep_delay(mut self, seconds: f64) -> Self {
        self.sweep_delay = Some(seconds);
        self
    }

    /// Cache lifetime in seconds; `0` means always re-query.
    ///
    /// Giving an age also turns on [`cache_gets`](Self::cache_gets) unless
    /// that was set explicitly.
    pub fn max_val_age(mut self, seconds: f64) -> Self {
        self.max_val_age = Some(seconds);
        self
    }

    /// Let `get` answer from a fresh cache instead of always querying.
    pub fn cache_gets(mut self, enabled: bool) -> Self {
        self.cache_gets = Some(enabled);
        self
    }

    /// Opaque setpoint metadata.
    pub fn setpoints(
        mut self,
        setpoints: Option<serde_json::Value>,
        names: Option<serde_json::Value>,
        labels: Option<serde_json::Value>,
    ) -> Self {
        self.setpoints = Setpoints {
            setpoints,
            setpoint_names: names,
            setpoint_labels: labels,
        };
        self
    }

    /// Dispatcher for command templates.
    pub fn dispatcher(mut self, dispatcher: CommandDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub(crate) fn has_identity(&self) -> bool {
        self.name.is_some() || self.names.is_some()
    }

    pub(crate) fn has_dispatcher(&self) -> bool {
        self.dispatcher.is_some()
    }

    fn identity(&mut self) -> DaqResult<Identity> {
        match (self.name.take(), self.names.take()) {
            (Some(_), Some(_)) => Err(DaqError::Configuration(
                "only one of name and names may be given".to_string(),
            )),
            (None, None) => Err(DaqError::Configuration(
                "either name or names is required".to_string(),
            )),
            (Some(name), None) => {
                if self.labels.is_some() {
                    return Err(DaqError::Configuration(format!(
                        "{}: labels only apply to multi-name parameters",
                        name
                    )));
                }
                let label = self.label.take().unwrap_or_else(|| name.clone());
                Ok(Identity::Single { name, label })
            }
            (None, Some(names)) => {
                if names.is_empty() {
                    return Err(DaqError::Configuration("names must not be empty".to_string()));
                }
                let labels = self.labels.take().unwrap_or_else(|| names.clone());
                if labels.len() != names.len() {
                    return Err(DaqError::Configuration(format!(
                        "{} labels given for {} names",
                        labels.len(),
                        names.len()
                    )));
                }
                Ok(Identity::Multi { names, labels })
            }
        }
    }

    fn shape(&mut self, name: &str) -> DaqResult<Shape> {
        match (self.size.take(), self.sizes.take()) {
            (Some(_), Some(_)) => Err(DaqError::Configuration(format!(
                "{}: only one of size and sizes may be given",
                name
            ))),
            (Some(size), None) => Ok(Shape::Sized(size)),
            (None, Some(sizes)) => Ok(Shape::Array(sizes)),
            (None, None) => Ok(Shape::Scalar),
        }
    }

    fn getter(&mut self, name: &str) -> DaqResult<Syncable<(), Value>> {
        let closures = self.get_fn.is_some() || self.get_async_fn.is_some();
        match self.get_cmd.take() {
            Some(_) if closures => Err(DaqError::Configuration(format!(
                "{}: get_cmd and a get function are mutually exclusive",
                name
            ))),
            Some(cmd) => {
                let dispatcher = self.dispatcher.clone().ok_or_else(|| {
                    DaqError::Configuration(format!("{}: get_cmd needs a dispatcher", name))
                })?;
                Ok(query_syncable(dispatcher, cmd, self.parser.clone()))
            }
            None => Ok(Syncable::from_parts(
                self.get_fn.take(),
                self.get_async_fn.take(),
            )),
        }
    }

    fn setter(&mut self, name: &str) -> DaqResult<Syncable<Value, ()>> {
        let closures = self.set_fn.is_some() || self.set_async_fn.is_some();
        match self.set_cmd.take() {
            Some(_) if closures => Err(DaqError::Configuration(format!(
                "{}: set_cmd and a set function are mutually exclusive",
                name
            ))),
            Some(cmd) => {
                let dispatcher = self.dispatcher.clone().ok_or_else(|| {
                    DaqError::Configuration(format!("{}: set_cmd needs a dispatcher", name))
                })?;
                Ok(write_syncable(dispatcher, cmd))
            }
            None => Ok(Syncable::from_parts(
                self.set_fn.take(),
                self.set_async_fn.take(),
            )),
        }
    }

    fn sweep(&mut self, name: &str, settable: bool) -> DaqResult<Option<SweepConfig>> {
        let (step, delay) = match (self.sweep_step.take(), self.sweep_delay.take()) {
            (None, None) => return Ok(None),
            (Some(step), Some(delay)) => (step, delay),
            _ => {
                return Err(DaqError::Configuration(format!(
                    "{}: sweep_step and sweep_delay must be given together",
                    name
                )))
            }
        };
        if !settable {
            return Err(DaqError::Configuration(format!(
                "{}: sweep requires a set capability",
                name
            )));
        }
        let kind = self
            .vals
            .as_ref()
            .ok_or_else(|| DaqError::Configuration(format!("{}: sweep requires vals", name)))?
            .step_kind()
            .ok_or_else(|| {
                DaqError::Configuration(format!("{}: vals do not support stepping", name))
            })?;
        match step.as_f64() {
            Some(s) if s > 0.0 && s.is_finite() => {}
            _ => {
                return Err(DaqError::Configuration(format!(
                    "{}: sweep_step must be a positive number, got {}",
                    name, step
                )))
            }
        }
        if kind == StepKind::Integer && !matches!(step, Value::Int(_)) {
            return Err(DaqError::Configuration(format!(
                "{}: sweep_step must be an integer for integer vals, got {}",
                name, step
            )));
        }
        if !(delay.is_finite() && delay > 0.0) {
            return Err(DaqError::Configuration(format!(
                "{}: sweep_delay must be a positive number of seconds, got {}",
                name, delay
            )));
        }
        Ok(Some(SweepConfig {
            step,
            delay: Duration::from_secs_f64(delay),
        }))
    }

    /// Check the configuration and build the parameter.
    pub fn build(mut self) -> DaqResult<Parameter> {
        let identity = self.identity()?;
        let name = identity.name();
        let shape = self.shape(&name)?;
        let getter = self.getter(&name)?;
        let setter = self.setter(&name)?;

        if !getter.is_defined() && !setter.is_defined() {
            return Err(DaqError::Configuration(format!(
                "{}: needs at least a get or a set capability",
                name
            )));
        }
        if setter.is_defined() && self.vals.is_none() {
            return Err(DaqError::Configuration(format!(
                "{}: settable parameters need vals",
                name
            )));
        }
        let sweep = self.sweep(&name, setter.is_defined())?;

        let max_val_age = match self.max_val_age {
            None => None,
            Some(age) if age.is_finite() && age >= 0.0 => Some(Duration::from_secs_f64(age)),
            Some(age) => {
                return Err(DaqError::Configuration(format!(
                    "{}: max_val_age must be a non-negative number of seconds, got {}",
                    name, age
                )))
            }
        };

        Ok(Parameter::from_core(ParameterCore {
            identity,
            shape,
            vals: self.vals,
            sweep,
            max_val_age,
            cache_gets: self.cache_gets.unwrap_or(max_val_age.is_some()),
            cache: Mutex::new(None),
            getter,
            setter,
            setpoints: self.setpoints,
        }))
    }
}

fn query_syncable(
    dispatcher: CommandDispatcher,
    cmd: String,
    parser: Option<ParseFn>,
) -> Syncable<(), Value> {
    let (d, c, p) = (dispatcher.clone(), cmd.clone(), parser.clone());
    let sync: SyncFn<(), Value> = Arc::new(move |()| d.query(&c, p.as_ref()));
    let asynchronous: AsyncFn<(), Value> =
        Arc::new(move |()| -> BoxFuture<'static, DaqResult<Value>> {
            let (d, c, p) = (dispatcher.clone(), cmd.clone(), parser.clone());
            Box::pin(async move { d.query_async(&c, p.as_ref()).await })
        });
    Syncable::from_parts(Some(sync), Some(asynchronous))
}

fn write_syncable(dispatcher: CommandDispatcher, template: String) -> Syncable<Value, ()> {
    let (d, t) = (dispatcher.clone(), template.clone());
    let sync: SyncFn<Value, ()> = Arc::new(move |value: Value| {
        let cmd = format_value(&t, &value)?;
        d.execute(&cmd)
    });
    let asynchronous: AsyncFn<Value, ()> =
        Arc::new(move |value: Value| -> BoxFuture<'static, DaqResult<()>> {
            let (d, t) = (dispatcher.clone(), template.clone());
            Box::pin(async move {
                let cmd = format_value(&t, &value)?;
                d.execute_async(&cmd).await
            })
        });
    Syncable::from_parts(Some(sync), Some(asynchronous))
}
