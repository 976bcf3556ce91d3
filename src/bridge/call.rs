//! Calls from the kernel into host functions.
//!
//! Every operation here reports failure the kernel's way: the message goes
//! through [`Kernel::raise`] and the caller gets a [`KernelError`]. Host
//! errors raised by a callee are re-raised with their host rendering as the
//! message.

use crate::{
    bridge::handles::ForeignTypes,
    host::{Host, error::HostError, value::Value},
    kernel::{Kernel, error::KernelError, obj::Obj},
};

/// Largest argument count the exported call entry points accept.
pub const MAX_CALL_ARITY: usize = 3;

fn raise_host_error(kernel: &mut Kernel, error: HostError) -> KernelError {
    kernel.raise(error.to_string())
}

/// Returns the host value wrapped by `obj`, raising when it is not a value
/// handle.
pub fn expect_value(
    kernel: &mut Kernel,
    types: &ForeignTypes,
    obj: Obj,
    what: &str,
) -> Result<Value, KernelError> {
    match types.value_of(kernel, obj) {
        Some(value) => Ok(value),
        None => {
            let kind = kernel.type_name(obj).to_string();
            Err(kernel.raise(format!(
                "HostObject: <{}> must be a host object (not a {})",
                what, kind
            )))
        }
    }
}

/// Reads a kernel string argument.
pub fn expect_string(kernel: &mut Kernel, obj: Obj, what: &str) -> Result<String, KernelError> {
    match kernel.string_value(obj) {
        Some(text) => Ok(text.to_string()),
        None => {
            let kind = kernel.type_name(obj).to_string();
            Err(kernel.raise(format!("<{}> must be a string (not a {})", what, kind)))
        }
    }
}

/// Looks a host function up by name and wraps it in a function handle.
pub fn lookup_function(
    kernel: &mut Kernel,
    host: &Host,
    types: &ForeignTypes,
    name: &str,
) -> Result<Obj, KernelError> {
    match host.get_function(name) {
        Ok(func) => Ok(types.new_function_handle(kernel, func)),
        Err(error) => Err(raise_host_error(kernel, error)),
    }
}

/// Calls the host function behind `func` with the values wrapped by `args`
/// and returns the result in a new value handle.
pub fn call_function(
    kernel: &mut Kernel,
    host: &mut Host,
    types: &ForeignTypes,
    func: Obj,
    args: &[Obj],
) -> Result<Obj, KernelError> {
    let Some(function) = types.function_of(kernel, func) else {
        let kind = kernel.type_name(func).to_string();
        return Err(kernel.raise(format!(
            "HostCallFunc: <func> must be a host function (not a {})",
            kind
        )));
    };
    let mut values = Vec::with_capacity(args.len());
    for (i, &arg) in args.iter().enumerate() {
        values.push(expect_value(kernel, types, arg, &format!("arg{}", i + 1))?);
    }
    match host.call(&function, &values) {
        Ok(result) => Ok(types.new_value_handle(kernel, result)),
        Err(error) => Err(raise_host_error(kernel, error)),
    }
}

pub fn call0(
    kernel: &mut Kernel,
    host: &mut Host,
    types: &ForeignTypes,
    func: Obj,
) -> Result<Obj, KernelError> {
    call_function(kernel, host, types, func, &[])
}

pub fn call1(
    kernel: &mut Kernel,
    host: &mut Host,
    types: &ForeignTypes,
    func: Obj,
    arg: Obj,
) -> Result<Obj, KernelError> {
    call_function(kernel, host, types, func, &[arg])
}

pub fn call2(
    kernel: &mut Kernel,
    host: &mut Host,
    types: &ForeignTypes,
    func: Obj,
    arg1: Obj,
    arg2: Obj,
) -> Result<Obj, KernelError> {
    call_function(kernel, host, types, func, &[arg1, arg2])
}

pub fn call3(
    kernel: &mut Kernel,
    host: &mut Host,
    types: &ForeignTypes,
    func: Obj,
    arg1: Obj,
    arg2: Obj,
    arg3: Obj,
) -> Result<Obj, KernelError> {
    call_function(kernel, host, types, func, &[arg1, arg2, arg3])
}

/// Evaluates host source and wraps the result; `nothing` yields no value.
pub fn eval_string(
    kernel: &mut Kernel,
    host: &mut Host,
    types: &ForeignTypes,
    source: &str,
) -> Result<Option<Obj>, KernelError> {
    match host.eval_string(source) {
        Ok(Value::Nothing) => Ok(None),
        Ok(value) => Ok(Some(types.new_value_handle(kernel, value))),
        Err(error) => Err(raise_host_error(kernel, error)),
    }
}

/// Binds the value wrapped by `handle` to `name` in the host's `Main`.
pub fn set_global(
    kernel: &mut Kernel,
    host: &mut Host,
    types: &ForeignTypes,
    name: &str,
    handle: Obj,
) -> Result<(), KernelError> {
    let value = expect_value(kernel, types, handle, "val")?;
    host.set_global(name, value);
    Ok(())
}
