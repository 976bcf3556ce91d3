//! Cross-runtime object bridge between the kernel and the host.
//!
//! [`Bridge::init`] registers the two wrapper types in a kernel, creates the
//! pinning arena, optionally redirects kernel errors into a capture buffer
//! and installs the exported entry points as kernel globals. The returned
//! [`Bridge`] is the host-side API over the same state.
//!
//! Both runtimes are single threaded and so is the bridge: it is built on
//! `Rc` and `RefCell` and is neither `Send` nor `Sync`.

use std::{
    cell::{Ref, RefCell, RefMut},
    fmt,
    rc::Rc,
};

use log::debug;
use serde::Deserialize;

use crate::{
    bridge::{
        call::MAX_CALL_ARITY,
        convert::{ConvertError, KernelType},
        errors::ErrorBridge,
        handles::{ForeignTypes, HOST_FUNCTION_TYPE, HOST_OBJECT_TYPE},
        pin::PinTable,
    },
    host::{Host, error::HostError, types::HostType, value::Value},
    kernel::{Kernel, error::KernelError, obj::Obj},
};

pub mod call;
pub mod convert;
pub mod errors;
pub mod exports;
pub mod handles;
pub mod low_level;
pub mod pin;

/// Bridge start-up options.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BridgeOptions {
    /// Redirect kernel errors into a buffer and re-raise them on the host.
    pub capture_errors: bool,
    /// Arena slots to reserve up front.
    pub pin_capacity: usize,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            capture_errors: true,
            pin_capacity: 0,
        }
    }
}

impl BridgeOptions {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// The kernel already has the wrapper types registered.
    AlreadyInitialized,
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::AlreadyInitialized => {
                write!(f, "the kernel already has a bridge ({} is registered)", HOST_OBJECT_TYPE)
            }
        }
    }
}

impl std::error::Error for BridgeError {}

/// State shared by the host-side API and the installed entry points.
pub(crate) struct BridgeCore {
    pub(crate) host: RefCell<Host>,
    pub(crate) types: ForeignTypes,
}

pub struct Bridge {
    core: Rc<BridgeCore>,
    errors: Option<ErrorBridge>,
}

impl Bridge {
    /// Connects `host` to `kernel`. Fails if `kernel` already has a bridge.
    pub fn init(
        kernel: &mut Kernel,
        host: Host,
        options: BridgeOptions,
    ) -> Result<Bridge, BridgeError> {
        if kernel.package_type(HOST_FUNCTION_TYPE).is_some()
            || kernel.package_type(HOST_OBJECT_TYPE).is_some()
        {
            return Err(BridgeError::AlreadyInitialized);
        }
        let pins = PinTable::with_capacity(options.pin_capacity);
        let types = ForeignTypes::register(kernel, pins)
            .map_err(|_| BridgeError::AlreadyInitialized)?;
        let errors = options.capture_errors.then(|| ErrorBridge::install(kernel));
        let core = Rc::new(BridgeCore {
            host: RefCell::new(host),
            types,
        });
        exports::install(kernel, &core);
        debug!(
            "bridge initialised: {} entry points, capture_errors={}",
            exports::EXPORTS.len(),
            options.capture_errors
        );
        Ok(Bridge { core, errors })
    }

    pub fn types(&self) -> &ForeignTypes {
        &self.core.types
    }

    pub fn pins(&self) -> &PinTable {
        self.core.types.pins()
    }

    pub fn host(&self) -> Ref<'_, Host> {
        self.core.host.borrow()
    }

    pub fn host_mut(&self) -> RefMut<'_, Host> {
        self.core.host.borrow_mut()
    }

    pub fn error_bridge(&self) -> Option<&ErrorBridge> {
        self.errors.as_ref()
    }

    /// Surfaces a kernel error on the host side.
    pub fn capture<T>(
        &self,
        kernel: &mut Kernel,
        result: Result<T, KernelError>,
    ) -> Result<T, HostError> {
        match &self.errors {
            Some(errors) => errors.capture(kernel, result),
            None => result.map_err(|error| HostError::ErrorException(error.message)),
        }
    }

    /// Returns a function handle for the host function `name`.
    pub fn function(&self, kernel: &mut Kernel, name: &str) -> Result<Obj, HostError> {
        let result =
            call::lookup_function(kernel, &self.core.host.borrow(), &self.core.types, name);
        self.capture(kernel, result)
    }

    /// Wraps `value` in a new value handle.
    pub fn wrap(&self, kernel: &mut Kernel, value: Value) -> Obj {
        self.core.types.new_value_handle(kernel, value)
    }

    /// Calls a function handle with up to three value handles.
    pub fn call(&self, kernel: &mut Kernel, func: Obj, args: &[Obj]) -> Result<Obj, HostError> {
        if args.len() > MAX_CALL_ARITY {
            return Err(HostError::ArgumentError(format!(
                "host calls take at most {} arguments (got {})",
                MAX_CALL_ARITY,
                args.len()
            )));
        }
        let result = call::call_function(
            kernel,
            &mut self.core.host.borrow_mut(),
            &self.core.types,
            func,
            args,
        );
        self.capture(kernel, result)
    }

    pub fn eval_string(&self, kernel: &mut Kernel, source: &str) -> Result<Option<Obj>, HostError> {
        let result = call::eval_string(
            kernel,
            &mut self.core.host.borrow_mut(),
            &self.core.types,
            source,
        );
        self.capture(kernel, result)
    }

    /// Low-level unbox of the value behind `handle`.
    pub fn unbox(&self, kernel: &mut Kernel, handle: Obj) -> Result<Obj, HostError> {
        let value = call::expect_value(kernel, &self.core.types, handle, "obj");
        let value = self.capture(kernel, value)?;
        Ok(low_level::unbox(kernel, &value))
    }

    /// Low-level box of `obj` into a value handle, `Fail` when unsupported.
    pub fn box_value(&self, kernel: &mut Kernel, obj: Obj) -> Obj {
        match low_level::box_obj(kernel, obj) {
            Some(value) => self.wrap(kernel, value),
            None => Obj::Fail,
        }
    }

    pub fn set_global(
        &self,
        kernel: &mut Kernel,
        name: &str,
        handle: Obj,
    ) -> Result<(), HostError> {
        let result = call::set_global(
            kernel,
            &mut self.core.host.borrow_mut(),
            &self.core.types,
            name,
            handle,
        );
        self.capture(kernel, result)
    }

    pub fn to_host(
        &self,
        kernel: &Kernel,
        obj: Obj,
        target: &HostType,
    ) -> Result<Value, ConvertError> {
        convert::to_host(kernel, &self.core.types, obj, target)
    }

    pub fn to_kernel(
        &self,
        kernel: &mut Kernel,
        value: &Value,
        target: &KernelType,
    ) -> Result<Obj, ConvertError> {
        convert::to_kernel(kernel, &self.core.types, value, target)
    }

    /// Calls the kernel function bound to the global `name`.
    ///
    /// Arguments and result go through undirected deep conversion; a
    /// function that returns no value yields `None`.
    pub fn call_kernel(
        &self,
        kernel: &mut Kernel,
        name: &str,
        args: &[Value],
    ) -> Result<Option<Value>, HostError> {
        let mut objs = Vec::with_capacity(args.len());
        for arg in args {
            objs.push(self.to_kernel(kernel, arg, &KernelType::Any)?);
        }
        let result = kernel.call_global(name, &objs);
        match self.capture(kernel, result)? {
            Some(obj) => Ok(Some(self.to_host(kernel, obj, &HostType::Any)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_json() {
        let options = BridgeOptions::from_json(r#"{ "pin_capacity": 128 }"#).unwrap();
        assert_eq!(
            options,
            BridgeOptions {
                capture_errors: true,
                pin_capacity: 128,
            }
        );
        assert!(BridgeOptions::from_json(r#"{ "capture_errors": "yes" }"#).is_err());
    }

    #[test]
    fn test_init_once_per_kernel() {
        let mut kernel = Kernel::new();
        let bridge = Bridge::init(&mut kernel, Host::new(), BridgeOptions::default());
        assert!(bridge.is_ok());
        assert_eq!(
            Bridge::init(&mut kernel, Host::new(), BridgeOptions::default()).err(),
            Some(BridgeError::AlreadyInitialized)
        );
        assert!(kernel.global("HostCallFunc2Arg").is_some());
    }

    #[test]
    fn test_call_arity_limit() {
        let mut kernel = Kernel::new();
        let bridge = Bridge::init(&mut kernel, Host::new(), BridgeOptions::default()).unwrap();
        let func = bridge.function(&mut kernel, "identity").unwrap();
        let arg = bridge.wrap(&mut kernel, Value::Nothing);
        assert!(matches!(
            bridge.call(&mut kernel, func, &[arg; 4]),
            Err(HostError::ArgumentError(_))
        ));
        let result = bridge.call(&mut kernel, func, &[arg]).unwrap();
        assert_eq!(bridge.types().value_of(&kernel, result), Some(Value::Nothing));
    }

    #[test]
    fn test_call_kernel_round_trip() {
        let mut kernel = Kernel::new();
        let bridge = Bridge::init(&mut kernel, Host::new(), BridgeOptions::default()).unwrap();
        let list = Value::array(HostType::Int64, vec![Value::Int64(1), Value::Int64(2)]);
        assert_eq!(
            bridge.call_kernel(&mut kernel, "Length", &[list]),
            Ok(Some(Value::Int64(2)))
        );
    }
}
