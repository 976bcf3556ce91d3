//! In-process model of the managed host runtime.
//!
//! Values are reference counted (see [`value::Value`]). Functions live in a
//! `Base` namespace populated at start-up; user bindings go to `Main`, which
//! shadows `Base` on lookup.

use std::{collections::BTreeMap, rc::Rc};

use crate::host::{
    error::HostError,
    value::{Function, NativeFn, Value},
};

pub mod builtins;
pub mod error;
pub mod eval;
pub mod types;
pub mod value;

pub struct Host {
    base: BTreeMap<String, Rc<Function>>,
    main: BTreeMap<String, Value>,
}

impl Default for Host {
    fn default() -> Self {
        Self::new()
    }
}

impl Host {
    pub fn new() -> Self {
        let mut host = Self {
            base: BTreeMap::new(),
            main: BTreeMap::new(),
        };
        for (name, body) in builtins::BASE_FUNCTIONS {
            host.base.insert(
                name.to_string(),
                Rc::new(Function {
                    name: Rc::from(*name),
                    body: *body,
                }),
            );
        }
        host
    }

    /// Binds a native function in `Main` and returns it.
    pub fn define_function(&mut self, name: &str, body: NativeFn) -> Rc<Function> {
        let function = Rc::new(Function {
            name: Rc::from(name),
            body,
        });
        self.main
            .insert(name.to_string(), Value::Function(Rc::clone(&function)));
        function
    }

    /// Looks a function up by name, `Main` first, then `Base`.
    pub fn get_function(&self, name: &str) -> Result<Rc<Function>, HostError> {
        match self.main.get(name) {
            Some(Value::Function(function)) => Ok(Rc::clone(function)),
            Some(other) => Err(HostError::ArgumentError(format!(
                "`{}` is bound to a {}, not a function",
                name,
                other.type_name()
            ))),
            None => self
                .base
                .get(name)
                .cloned()
                .ok_or_else(|| HostError::UndefVar(name.to_string())),
        }
    }

    pub fn call(&mut self, function: &Function, args: &[Value]) -> Result<Value, HostError> {
        (function.body)(self, args)
    }

    /// Calls the function bound to `name`.
    pub fn call_named(&mut self, name: &str, args: &[Value]) -> Result<Value, HostError> {
        let function = self.get_function(name)?;
        self.call(&function, args)
    }

    pub fn set_global(&mut self, name: &str, value: Value) {
        self.main.insert(name.to_string(), value);
    }

    /// Resolves a name in `Main`, falling back to `Base` functions.
    pub fn global(&self, name: &str) -> Option<Value> {
        self.main
            .get(name)
            .cloned()
            .or_else(|| self.base.get(name).map(|f| Value::Function(Rc::clone(f))))
    }

    /// Parses and evaluates `source` in `Main`.
    pub fn eval_string(&mut self, source: &str) -> Result<Value, HostError> {
        eval::eval_source(self, source)
    }
}
