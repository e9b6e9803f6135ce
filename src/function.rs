//! Function - fixed-arity remote calls with positional validation.
//!
//! A [`Function`] checks the argument count and each argument against its
//! positional validator before any device interaction, then formats its
//! command template with `{0}`, `{1}`, ... and dispatches it. With a return
//! parser the command is asked and the parsed response returned, otherwise
//! it is written.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::command::{format_args, ArgsFn, CommandDispatcher, ParseFn, ParserKind};
use crate::error::{DaqError, DaqResult};
use crate::sync_async::{AsyncFn, SyncFn, Syncable};
use crate::validators::Validator;
use crate::value::Value;

/// Blocking callable equivalent to [`Function::call`].
pub type CallFn = Arc<dyn Fn(&[Value]) -> DaqResult<Option<Value>> + Send + Sync>;

/// Introspection for an external serializer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSnapshot {
    /// Function name.
    pub name: String,
    /// Validator description per argument.
    pub args: Vec<String>,
}

/// A named remote call.
#[derive(Clone)]
pub struct Function {
    name: String,
    args: Vec<Validator>,
    parameter_parser: Option<ArgsFn>,
    call: Syncable<Vec<Value>, Option<Value>>,
}

impl std::fmt::Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("args", &self.args)
            .field("call", &self.call)
            .finish()
    }
}

impl Function {
    /// Function name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of arguments.
    pub fn arity(&self) -> usize {
        self.args.len()
    }

    /// Check argument count, then each argument, without dispatching.
    pub fn validate(&self, args: &[Value]) -> DaqResult<()> {
        if args.len() != self.args.len() {
            return Err(DaqError::Arity {
                name: self.name.clone(),
                expected: self.args.len(),
                got: args.len(),
            });
        }
        for (i, (vals, arg)) in self.args.iter().zip(args).enumerate() {
            vals.validate(arg, &format!("argument {} of {}", i, self.name))?;
        }
        Ok(())
    }

    fn prepare(&self, args: &[Value]) -> DaqResult<Vec<Value>> {
        self.validate(args)?;
        match &self.parameter_parser {
            Some(parse) => parse(args.to_vec()),
            None => Ok(args.to_vec()),
        }
    }

    /// Validate and dispatch from a blocking caller.
    pub fn call(&self, args: &[Value]) -> DaqResult<Option<Value>> {
        let args = self.prepare(args)?;
        self.call.call(&self.name, args)
    }

    /// Validate and dispatch from a suspended caller.
    ///
    /// Functions defined only as blocking closures have no suspendable form.
    pub async fn call_async(&self, args: &[Value]) -> DaqResult<Option<Value>> {
        if !self.call.has_async() {
            return Err(DaqError::capability_absent(&self.name, "call_async"));
        }
        let args = self.prepare(args)?;
        self.call.call_async(&self.name, args).await
    }

    /// True if [`call_async`](Self::call_async) is available.
    pub fn has_call_async(&self) -> bool {
        self.call.has_async()
    }

    /// A plain callable interchangeable with [`call`](Self::call).
    pub fn as_fn(&self) -> CallFn {
        let this = self.clone();
        Arc::new(move |args: &[Value]| this.call(args))
    }

    /// Name and argument validators.
    pub fn snapshot(&self) -> FunctionSnapshot {
        FunctionSnapshot {
            name: self.name.clone(),
            args: self.args.iter().map(|v| v.to_string()).collect(),
        }
    }
}

/// Fluent construction of a [`Function`].
#[derive(Default)]
pub struct FunctionBuilder {
    name: Option<String>,
    call_cmd: Option<String>,
    call_fn: Option<SyncFn<Vec<Value>, Option<Value>>>,
    call_async_fn: Option<AsyncFn<Vec<Value>, Option<Value>>>,
    args: Vec<Validator>,
    parameter_parser: Option<ArgsFn>,
    return_parser: Option<ParseFn>,
    dispatcher: Option<CommandDispatcher>,
}

impl FunctionBuilder {
    /// Empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Function name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Command template with positional placeholders.
    pub fn call_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.call_cmd = Some(cmd.into());
        self
    }

    /// Blocking implementation instead of a template.
    pub fn connect(
        mut self,
        f: impl Fn(Vec<Value>) -> DaqResult<Option<Value>> + Send + Sync + 'static,
    ) -> Self {
        self.call_fn = Some(Arc::new(f));
        self
    }

    /// Suspendable implementation instead of a template.
    pub fn connect_async<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DaqResult<Option<Value>>> + Send + 'static,
    {
        self.call_async_fn = Some(Arc::new(
            move |args: Vec<Value>| -> BoxFuture<'static, DaqResult<Option<Value>>> {
                Box::pin(f(args))
            },
        ));
        self
    }

    /// Positional argument validators; arity is their count.
    pub fn args(mut self, args: Vec<Validator>) -> Self {
        self.args = args;
        self
    }

    /// Transform validated arguments before formatting.
    pub fn parameter_parser(
        mut self,
        f: impl Fn(Vec<Value>) -> DaqResult<Vec<Value>> + Send + Sync + 'static,
    ) -> Self {
        self.parameter_parser = Some(Arc::new(f));
        self
    }

    /// Parse the response; makes a template call an ask instead of a write.
    pub fn return_parser(mut self, parser: ParseFn) -> Self {
        self.return_parser = Some(parser);
        self
    }

    /// Built-in return parser.
    pub fn returns(self, kind: ParserKind) -> Self {
        self.return_parser(kind.into_fn())
    }

    /// Dispatcher for the command template.
    pub fn dispatcher(mut self, dispatcher: CommandDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub(crate) fn has_dispatcher(&self) -> bool {
        self.dispatcher.is_some()
    }

    pub(crate) fn has_name(&self) -> bool {
        self.name.is_some()
    }

    /// Check the configuration and build the function.
    pub fn build(self) -> DaqResult<Function> {
        let name = self
            .name
            .ok_or_else(|| DaqError::Configuration("functions need a name".to_string()))?;
        let closures = self.call_fn.is_some() || self.call_async_fn.is_some();
        let call = match self.call_cmd {
            Some(_) if closures => {
                return Err(DaqError::Configuration(format!(
                    "{}: call_cmd and a call function are mutually exclusive",
                    name
                )))
            }
            Some(template) => {
                let dispatcher = self.dispatcher.ok_or_else(|| {
                    DaqError::Configuration(format!("{}: call_cmd needs a dispatcher", name))
                })?;
                command_syncable(dispatcher, template, self.return_parser)
            }
            None if closures => Syncable::from_parts(self.call_fn, self.call_async_fn),
            None => {
                return Err(DaqError::Configuration(format!(
                    "{}: call_cmd is required",
                    name
                )))
            }
        };
        Ok(Function {
            name,
            args: self.args,
            parameter_parser: self.parameter_parser,
            call,
        })
    }
}

fn command_syncable(
    dispatcher: CommandDispatcher,
    template: String,
    parser: Option<ParseFn>,
) -> Syncable<Vec<Value>, Option<Value>> {
    let (d, t, p) = (dispatcher.clone(), template.clone(), parser.clone());
    let sync: SyncFn<Vec<Value>, Option<Value>> = Arc::new(move |args: Vec<Value>| {
        let cmd = format_args(&t, &args)?;
        match &p {
            Some(parse) => d.query(&cmd, Some(parse)).map(Some),
            None => d.execute(&cmd).map(|()| None),
        }
    });
    let asynchronous: AsyncFn<Vec<Value>, Option<Value>> = Arc::new(
        move |args: Vec<Value>| -> BoxFuture<'static, DaqResult<Option<Value>>> {
            let (d, t, p) = (dispatcher.clone(), template.clone(), parser.clone());
            Box::pin(async move {
                let cmd = format_args(&t, &args)?;
                match &p {
                    Some(parse) => d.query_async(&cmd, Some(parse)).await.map(Some),
                    None => d.execute_async(&cmd).await.map(|()| None),
                }
            })
        },
    );
    Syncable::from_parts(Some(sync), Some(asynchronous))
}
