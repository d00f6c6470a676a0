//! Scripting virtual machine core for Apt/ActionScript UI movies
//!
//! The crate owns the object model, the function and frame model, variable and
//! path resolution, the built-in classes and the interval scheduler. Bytecode
//! decoding and opcode semantics live in the host, which drives frames through
//! the [`Dispatch`] trait.
//!
//! # Example
//!
//! ```
//! use aptvm::{Value, Vm};
//!
//! let mut vm = Vm::new();
//! let score = vm.create_object();
//! vm.set_member(score, "points", Value::Integer(10))?;
//! assert_eq!(vm.get_member(score, "points")?, Value::Integer(10));
//!
//! let word = vm.call_method(&Value::from("hello"), "substr", &[Value::Integer(1), Value::Integer(3)])?;
//! assert_eq!(word, Value::from("ell"));
//! # Ok::<(), aptvm::VmError>(())
//! ```

pub mod error;
pub mod function;
pub mod gc;
pub mod object;
pub mod platform;
pub mod prelude;
pub mod string_dict;
pub mod value;
pub mod vm;

pub use error::VmError;
pub use function::{
    DefinedFunction, Function, FunctionDefinition, Invocation, NativeFn, NativeFunction, ParameterSlot,
    PreloadFlags, PreloadKind,
};
pub use gc::{GcStats, ObjectId};
pub use object::{ObjectClass, Property, ScriptObject, StageKind};
pub use platform::{
    ColorTransform, DisplayHandle, DisplayItem, DocumentLoader, HostClock, ManualClock, SpriteItem, StdClock,
    Transform,
};
pub use value::{AsString, CheapClone, Value};
pub use vm::{ActionContext, Dispatch, FrameState, Interval, Scope, ScopeRef, Vm, VmConfig};
