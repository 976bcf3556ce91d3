//! Entry points the bridge installs as kernel functions.
//!
//! The table is the stable surface kernel code binds against. Arity is
//! checked by the kernel before a handler runs, so handlers index `args`
//! directly.

use std::rc::Rc;

use crate::{
    bridge::{
        BridgeCore, call,
        convert::{ConvertError, KernelType, to_host, to_kernel},
        low_level,
    },
    host::types::HostType,
    kernel::{Kernel, error::KernelError, obj::Obj},
};

type ExportResult = Result<Option<Obj>, KernelError>;
type ExportHandler = fn(&BridgeCore, &mut Kernel, &[Obj]) -> ExportResult;

pub struct ExportedFunction {
    pub name: &'static str,
    pub params: &'static [&'static str],
    handler: ExportHandler,
}

pub const EXPORTS: &[ExportedFunction] = &[
    ExportedFunction {
        name: "HostFunction",
        params: &["name"],
        handler: host_function,
    },
    ExportedFunction {
        name: "HostCallFunc0Arg",
        params: &["func"],
        handler: host_call_0,
    },
    ExportedFunction {
        name: "HostCallFunc1Arg",
        params: &["func", "obj"],
        handler: host_call_1,
    },
    ExportedFunction {
        name: "HostCallFunc2Arg",
        params: &["func", "obj1", "obj2"],
        handler: host_call_2,
    },
    ExportedFunction {
        name: "HostCallFunc3Arg",
        params: &["func", "obj1", "obj2", "obj3"],
        handler: host_call_3,
    },
    ExportedFunction {
        name: "HostEvalString",
        params: &["string"],
        handler: host_eval_string,
    },
    ExportedFunction {
        name: "HostUnbox",
        params: &["obj"],
        handler: host_unbox,
    },
    ExportedFunction {
        name: "HostBox",
        params: &["obj"],
        handler: host_box,
    },
    ExportedFunction {
        name: "HostSetVal",
        params: &["name", "val"],
        handler: host_set_val,
    },
    ExportedFunction {
        name: "HostUnboxRecursive",
        params: &["obj"],
        handler: host_unbox_recursive,
    },
    ExportedFunction {
        name: "HostBoxRecursive",
        params: &["obj"],
        handler: host_box_recursive,
    },
];

/// Binds every entry point as a kernel global.
pub(crate) fn install(kernel: &mut Kernel, core: &Rc<BridgeCore>) {
    for export in EXPORTS {
        let core = Rc::clone(core);
        let handler = export.handler;
        kernel.install_function(export.name, export.params, move |kernel, args| {
            handler(&core, kernel, args)
        });
    }
}

/// Conversion failures surface as ordinary kernel errors.
fn raise_convert_error(kernel: &mut Kernel, error: ConvertError) -> KernelError {
    match error {
        // Already written to the error stream when it was raised.
        ConvertError::Kernel(error) => error,
        other => kernel.raise(other.to_string()),
    }
}

fn host_function(core: &BridgeCore, kernel: &mut Kernel, args: &[Obj]) -> ExportResult {
    let name = call::expect_string(kernel, args[0], "name")?;
    let host = core.host.borrow();
    call::lookup_function(kernel, &host, &core.types, &name).map(Some)
}

fn host_call_0(core: &BridgeCore, kernel: &mut Kernel, args: &[Obj]) -> ExportResult {
    let mut host = core.host.borrow_mut();
    call::call0(kernel, &mut host, &core.types, args[0]).map(Some)
}

fn host_call_1(core: &BridgeCore, kernel: &mut Kernel, args: &[Obj]) -> ExportResult {
    let mut host = core.host.borrow_mut();
    call::call1(kernel, &mut host, &core.types, args[0], args[1]).map(Some)
}

fn host_call_2(core: &BridgeCore, kernel: &mut Kernel, args: &[Obj]) -> ExportResult {
    let mut host = core.host.borrow_mut();
    call::call2(kernel, &mut host, &core.types, args[0], args[1], args[2]).map(Some)
}

fn host_call_3(core: &BridgeCore, kernel: &mut Kernel, args: &[Obj]) -> ExportResult {
    let mut host = core.host.borrow_mut();
    call::call3(kernel, &mut host, &core.types, args[0], args[1], args[2], args[3]).map(Some)
}

fn host_eval_string(core: &BridgeCore, kernel: &mut Kernel, args: &[Obj]) -> ExportResult {
    let source = call::expect_string(kernel, args[0], "string")?;
    let mut host = core.host.borrow_mut();
    call::eval_string(kernel, &mut host, &core.types, &source)
}

fn host_unbox(core: &BridgeCore, kernel: &mut Kernel, args: &[Obj]) -> ExportResult {
    let value = call::expect_value(kernel, &core.types, args[0], "obj")?;
    Ok(Some(low_level::unbox(kernel, &value)))
}

fn host_box(core: &BridgeCore, kernel: &mut Kernel, args: &[Obj]) -> ExportResult {
    let handle = match low_level::box_obj(kernel, args[0]) {
        Some(value) => core.types.new_value_handle(kernel, value),
        None => Obj::Fail,
    };
    Ok(Some(handle))
}

fn host_set_val(core: &BridgeCore, kernel: &mut Kernel, args: &[Obj]) -> ExportResult {
    let name = call::expect_string(kernel, args[0], "name")?;
    let mut host = core.host.borrow_mut();
    call::set_global(kernel, &mut host, &core.types, &name, args[1])?;
    Ok(None)
}

fn host_unbox_recursive(core: &BridgeCore, kernel: &mut Kernel, args: &[Obj]) -> ExportResult {
    let value = call::expect_value(kernel, &core.types, args[0], "obj")?;
    match to_kernel(kernel, &core.types, &value, &KernelType::Any) {
        Ok(obj) => Ok(Some(obj)),
        Err(error) => Err(raise_convert_error(kernel, error)),
    }
}

fn host_box_recursive(core: &BridgeCore, kernel: &mut Kernel, args: &[Obj]) -> ExportResult {
    match to_host(kernel, &core.types, args[0], &HostType::Any) {
        Ok(value) => Ok(Some(core.types.new_value_handle(kernel, value))),
        Err(error) => Err(raise_convert_error(kernel, error)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_names_are_unique() {
        let mut names: Vec<_> = EXPORTS.iter().map(|export| export.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), EXPORTS.len());
    }

    #[test]
    fn test_call_arities() {
        let calls = [
            "HostCallFunc0Arg",
            "HostCallFunc1Arg",
            "HostCallFunc2Arg",
            "HostCallFunc3Arg",
        ];
        for (n, name) in calls.iter().enumerate() {
            let export = EXPORTS.iter().find(|export| export.name == *name).unwrap();
            assert_eq!(export.params.len(), n + 1);
        }
        assert_eq!(call::MAX_CALL_ARITY, 3);
    }
}
