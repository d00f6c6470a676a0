//! Global functions: timing, intervals, document loading and trace

use crate::error::VmError;
use crate::function::Invocation;
use crate::value::Value;
use crate::vm::Vm;

use super::{ClassMember, arg};

pub const GLOBAL_FUNCTIONS: &[ClassMember] = &[
    ClassMember::Method {
        name: "getTime",
        func: global_get_time,
    },
    ClassMember::Method {
        name: "setInterval",
        func: global_set_interval,
    },
    ClassMember::Method {
        name: "clearInterval",
        func: global_clear_interval,
    },
    ClassMember::Method {
        name: "loadMovie",
        func: global_load_movie,
    },
    ClassMember::Method {
        name: "attachMovie",
        func: global_attach_movie,
    },
    ClassMember::Method {
        name: "trace",
        func: global_trace,
    },
];

/// Milliseconds since the VM started, as a float
pub fn global_get_time(vm: &mut Vm, _this: &Value, _args: &[Value]) -> Result<Invocation, VmError> {
    // u64 -> f64 is exact for any realistic uptime
    #[allow(clippy::cast_precision_loss)]
    let elapsed = vm.elapsed_millis() as f64;
    Ok(Value::Float(elapsed).into())
}

/// `setInterval(callback, ms, ...args)` or `setInterval(object, "method", ms, ...args)`.
/// Returns the generated interval name.
pub fn global_set_interval(vm: &mut Vm, this: &Value, args: &[Value]) -> Result<Invocation, VmError> {
    let target = arg(args, 0);
    let (callback, callback_this, rest) = if vm.is_callable(&target) {
        let callback_this = if this.is_null_or_undefined() {
            vm.current_context()
                .map_or(Value::Undefined, |c| c.this().clone())
        } else {
            this.clone()
        };
        (target, callback_this, args.get(1..).unwrap_or_default())
    } else {
        let Value::Object(object) = target else {
            return Err(VmError::type_error("setInterval expects a function or an object"));
        };
        let method_name = vm.to_display_string(&arg(args, 1))?;
        let method = vm.get_member(object, method_name.as_str())?;
        if !vm.is_callable(&method) {
            return Err(VmError::type_error(format!(
                "setInterval: {} is not a function",
                method_name
            )));
        }
        (method, target, args.get(2..).unwrap_or_default())
    };
    if rest.is_empty() {
        return Err(VmError::arity("setInterval", args.len()));
    }

    let period = arg(rest, 0).to_integer();
    let period = u64::try_from(period).unwrap_or(0);
    let extra = rest.get(1..).unwrap_or_default().to_vec();

    let name = vm.next_interval_name();
    vm.create_interval(name.as_str(), period, &callback, callback_this, extra)?;
    Ok(Value::String(name).into())
}

/// `clearInterval(name)`; unknown names are ignored.
pub fn global_clear_interval(vm: &mut Vm, _this: &Value, args: &[Value]) -> Result<Invocation, VmError> {
    let name = vm.to_display_string(&arg(args, 0))?;
    vm.clear_interval(name.as_str());
    Ok(Value::Undefined.into())
}

/// Swap the file extension of a movie URL for the configured one.
fn movie_url(url: &str, extension: &str) -> String {
    let file_start = url.rfind(['/', '\\']).map_or(0, |i| i + 1);
    let stem_end = match url.rfind('.') {
        Some(dot) if dot > file_start => dot,
        _ => url.len(),
    };
    let stem = url.get(..stem_end).unwrap_or(url);
    format!("{}{}", stem, extension)
}

pub fn global_load_movie(vm: &mut Vm, _this: &Value, args: &[Value]) -> Result<Invocation, VmError> {
    let loader = vm
        .document_loader()
        .ok_or_else(|| VmError::unsupported("loadMovie: no document loader installed"))?;
    let url = vm.to_display_string(&arg(args, 0))?;
    let url = movie_url(url.as_str(), &vm.config().movie_extension);
    log::debug!("loadMovie {}", url);
    Ok(loader.load_movie(&url)?.into())
}

pub fn global_attach_movie(vm: &mut Vm, _this: &Value, args: &[Value]) -> Result<Invocation, VmError> {
    let loader = vm
        .document_loader()
        .ok_or_else(|| VmError::unsupported("attachMovie: no document loader installed"))?;
    let url = vm.to_display_string(&arg(args, 0))?;
    let url = movie_url(url.as_str(), &vm.config().movie_extension);
    let name = vm.to_display_string(&arg(args, 1))?;
    let depth = arg(args, 2).to_integer();
    log::debug!("attachMovie {} as '{}' at depth {}", url, name, depth);
    Ok(loader.attach_movie(&url, name.as_str(), depth)?.into())
}

/// `trace(message)` writes to the log
pub fn global_trace(vm: &mut Vm, _this: &Value, args: &[Value]) -> Result<Invocation, VmError> {
    let message = vm.to_display_string(&arg(args, 0))?;
    log::info!("{}", message);
    Ok(Value::Undefined.into())
}
