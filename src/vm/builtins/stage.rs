//! Script classes bridged to display items: StageObject, TextField, MovieClip
//!
//! Stage wrappers hold a [`DisplayHandle`]; every accessor reads or writes the
//! item directly, so scripts always see the live scene-graph state.

use std::cell::{Ref, RefMut};

use crate::error::VmError;
use crate::function::Invocation;
use crate::gc::ObjectId;
use crate::platform::{DisplayHandle, DisplayItem, SpriteItem, Transform};
use crate::value::Value;
use crate::vm::Vm;

use super::{ClassDefinition, ClassMember, arg};

pub const STAGE_OBJECT_CLASS: ClassDefinition = ClassDefinition {
    name: "StageObject",
    base: None,
    constructor: stage_constructor,
    properties: STAGE_OBJECT_MEMBERS,
    static_properties: &[],
};

pub const TEXT_FIELD_CLASS: ClassDefinition = ClassDefinition {
    name: "TextField",
    base: Some("StageObject"),
    constructor: stage_constructor,
    properties: &[ClassMember::Accessor {
        name: "textColor",
        get: Some(text_field_get_text_color),
        set: Some(text_field_set_text_color),
    }],
    static_properties: &[],
};

pub const MOVIE_CLIP_CLASS: ClassDefinition = ClassDefinition {
    name: "MovieClip",
    base: Some("StageObject"),
    constructor: stage_constructor,
    properties: &[
        ClassMember::Accessor {
            name: "_currentframe",
            get: Some(movie_clip_current_frame),
            set: None,
        },
        ClassMember::Method {
            name: "gotoAndPlay",
            func: movie_clip_goto_and_play,
        },
        ClassMember::Method {
            name: "gotoAndStop",
            func: movie_clip_goto_and_stop,
        },
        ClassMember::Method {
            name: "play",
            func: movie_clip_play,
        },
        ClassMember::Method {
            name: "stop",
            func: movie_clip_stop,
        },
    ],
    static_properties: &[],
};

const STAGE_OBJECT_MEMBERS: &[ClassMember] = &[
    ClassMember::Accessor {
        name: "_x",
        get: Some(stage_get_x),
        set: Some(stage_set_x),
    },
    ClassMember::Accessor {
        name: "_y",
        get: Some(stage_get_y),
        set: Some(stage_set_y),
    },
    ClassMember::Accessor {
        name: "_xscale",
        get: Some(stage_get_xscale),
        set: Some(stage_set_xscale),
    },
    ClassMember::Accessor {
        name: "_yscale",
        get: Some(stage_get_yscale),
        set: Some(stage_set_yscale),
    },
    ClassMember::Accessor {
        name: "_alpha",
        get: Some(stage_get_alpha),
        set: Some(stage_set_alpha),
    },
    ClassMember::Accessor {
        name: "_visible",
        get: Some(stage_get_visible),
        set: Some(stage_set_visible),
    },
    ClassMember::Accessor {
        name: "_name",
        get: Some(stage_get_name),
        set: Some(stage_set_name),
    },
    ClassMember::Accessor {
        name: "_parent",
        get: Some(stage_get_parent),
        set: None,
    },
    ClassMember::Accessor {
        name: "_target",
        get: Some(stage_get_target),
        set: None,
    },
];

/// Stage objects are created by the host, never by scripts
pub fn stage_constructor(_vm: &mut Vm, _this: &Value, _args: &[Value]) -> Result<Invocation, VmError> {
    Err(VmError::unsupported("display objects cannot be constructed by scripts"))
}

// ═══════════════════════════════════════════════════════════════════════════
// Item access
// ═══════════════════════════════════════════════════════════════════════════

fn stage_item(vm: &Vm, this: &Value) -> Result<DisplayHandle, VmError> {
    match this {
        Value::Object(id) => vm.display_item(*id),
        other => Err(VmError::type_error(format!(
            "display property read on {}",
            other.type_name()
        ))),
    }
}

pub(crate) fn read(item: &DisplayHandle) -> Result<Ref<'_, dyn DisplayItem>, VmError> {
    item.try_borrow()
        .map_err(|_| VmError::internal("display item is already borrowed"))
}

fn write(item: &DisplayHandle) -> Result<RefMut<'_, dyn DisplayItem + 'static>, VmError> {
    item.try_borrow_mut()
        .map_err(|_| VmError::internal("display item is already borrowed"))
}

/// Run `f` against the sprite behind `this`
fn with_sprite<R>(
    vm: &Vm,
    this: &Value,
    f: impl FnOnce(&mut dyn SpriteItem) -> Result<R, VmError>,
) -> Result<R, VmError> {
    let item = stage_item(vm, this)?;
    let mut item = write(&item)?;
    match item.as_sprite_mut() {
        Some(sprite) => f(sprite),
        None => Err(VmError::unsupported(format!(
            "'{}' is not a movie clip",
            item.name()
        ))),
    }
}

/// Absolute target path of an item: `/` for the root, `/a/b` below it.
/// Render items are placement nodes and do not contribute a segment.
pub fn target_path(item: &DisplayHandle) -> String {
    let mut names = Vec::new();
    let mut current = Some(item.clone());
    while let Some(node) = current {
        let Ok(node_ref) = node.try_borrow() else {
            break;
        };
        let parent = node_ref.parent();
        if parent.is_some() && !node_ref.is_render_item() {
            names.push(node_ref.name().to_string());
        }
        current = parent;
    }
    names.reverse();
    format!("/{}", names.join("/"))
}

fn update_transform(
    vm: &Vm,
    this: &Value,
    f: impl FnOnce(&mut Transform),
) -> Result<Invocation, VmError> {
    let item = stage_item(vm, this)?;
    let mut item = write(&item)?;
    let mut transform = item.transform();
    f(&mut transform);
    item.set_transform(transform);
    Ok(Value::Undefined.into())
}

fn transform_value(vm: &Vm, this: &Value, f: impl FnOnce(&Transform) -> f32) -> Result<Invocation, VmError> {
    let item = stage_item(vm, this)?;
    let transform = read(&item)?.transform();
    Ok(Value::Float(f64::from(f(&transform))).into())
}

// Scene values are stored as f32
#[allow(clippy::cast_possible_truncation)]
fn to_f32(value: &Value) -> f32 {
    value.to_float() as f32
}

// ═══════════════════════════════════════════════════════════════════════════
// StageObject accessors
// ═══════════════════════════════════════════════════════════════════════════

pub fn stage_get_x(vm: &mut Vm, this: &Value, _args: &[Value]) -> Result<Invocation, VmError> {
    transform_value(vm, this, |t| t.translation.0)
}

pub fn stage_set_x(vm: &mut Vm, this: &Value, args: &[Value]) -> Result<Invocation, VmError> {
    let x = to_f32(&arg(args, 0));
    update_transform(vm, this, |t| t.translation.0 = x)
}

pub fn stage_get_y(vm: &mut Vm, this: &Value, _args: &[Value]) -> Result<Invocation, VmError> {
    transform_value(vm, this, |t| t.translation.1)
}

pub fn stage_set_y(vm: &mut Vm, this: &Value, args: &[Value]) -> Result<Invocation, VmError> {
    let y = to_f32(&arg(args, 0));
    update_transform(vm, this, |t| t.translation.1 = y)
}

/// Scales are exposed in percent
pub fn stage_get_xscale(vm: &mut Vm, this: &Value, _args: &[Value]) -> Result<Invocation, VmError> {
    transform_value(vm, this, |t| t.scale.0 * 100.0)
}

pub fn stage_set_xscale(vm: &mut Vm, this: &Value, args: &[Value]) -> Result<Invocation, VmError> {
    let scale = to_f32(&arg(args, 0)) / 100.0;
    update_transform(vm, this, |t| t.scale.0 = scale)
}

pub fn stage_get_yscale(vm: &mut Vm, this: &Value, _args: &[Value]) -> Result<Invocation, VmError> {
    transform_value(vm, this, |t| t.scale.1 * 100.0)
}

pub fn stage_set_yscale(vm: &mut Vm, this: &Value, args: &[Value]) -> Result<Invocation, VmError> {
    let scale = to_f32(&arg(args, 0)) / 100.0;
    update_transform(vm, this, |t| t.scale.1 = scale)
}

pub fn stage_get_alpha(vm: &mut Vm, this: &Value, _args: &[Value]) -> Result<Invocation, VmError> {
    transform_value(vm, this, |t| t.color.a * 100.0)
}

/// `_alpha` is a percentage, clamped to 0..=100
pub fn stage_set_alpha(vm: &mut Vm, this: &Value, args: &[Value]) -> Result<Invocation, VmError> {
    let alpha = (to_f32(&arg(args, 0)) / 100.0).clamp(0.0, 1.0);
    update_transform(vm, this, |t| t.color.a = alpha)
}

pub fn stage_get_visible(vm: &mut Vm, this: &Value, _args: &[Value]) -> Result<Invocation, VmError> {
    let item = stage_item(vm, this)?;
    let visible = read(&item)?.visible();
    Ok(Value::Boolean(visible).into())
}

pub fn stage_set_visible(vm: &mut Vm, this: &Value, args: &[Value]) -> Result<Invocation, VmError> {
    let item = stage_item(vm, this)?;
    write(&item)?.set_visible(arg(args, 0).to_boolean());
    Ok(Value::Undefined.into())
}

pub fn stage_get_name(vm: &mut Vm, this: &Value, _args: &[Value]) -> Result<Invocation, VmError> {
    let item = stage_item(vm, this)?;
    let name = read(&item)?.name().to_string();
    Ok(Value::from(name).into())
}

pub fn stage_set_name(vm: &mut Vm, this: &Value, args: &[Value]) -> Result<Invocation, VmError> {
    let name = vm.to_display_string(&arg(args, 0))?;
    let item = stage_item(vm, this)?;
    write(&item)?.set_name(name.as_str());
    Ok(Value::Undefined.into())
}

/// The parent's script object. A render item's parent is the placement of a
/// sprite, so its script parent is one level further up.
pub fn stage_get_parent(vm: &mut Vm, this: &Value, _args: &[Value]) -> Result<Invocation, VmError> {
    let item = stage_item(vm, this)?;
    let parent = {
        let item = read(&item)?;
        if item.is_render_item() {
            match item.parent() {
                Some(placement) => read(&placement)?.parent(),
                None => None,
            }
        } else {
            item.parent()
        }
    };
    let script_object = match parent {
        Some(parent) => read(&parent)?.script_object(),
        None => None,
    };
    Ok(script_object.map_or(Value::Undefined, Value::Object).into())
}

pub fn stage_get_target(vm: &mut Vm, this: &Value, _args: &[Value]) -> Result<Invocation, VmError> {
    let item = stage_item(vm, this)?;
    Ok(Value::from(target_path(&item)).into())
}

// ═══════════════════════════════════════════════════════════════════════════
// TextField
// ═══════════════════════════════════════════════════════════════════════════

// Channels are in 0.0..=1.0
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn channel_to_byte(channel: f32) -> u32 {
    libm::roundf(channel.clamp(0.0, 1.0) * 255.0) as u32
}

/// Parse `0xRRGGBB`, `#RRGGBB` or bare hex digits
fn parse_hex_color(text: &str) -> Option<u32> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .or_else(|| text.strip_prefix('#'))
        .unwrap_or(text);
    u32::from_str_radix(digits, 16).ok()
}

/// `textColor` as a `0xRRGGBB` string
pub fn text_field_get_text_color(vm: &mut Vm, this: &Value, _args: &[Value]) -> Result<Invocation, VmError> {
    let item = stage_item(vm, this)?;
    let color = read(&item)?.transform().color;
    let rgb = (channel_to_byte(color.r) << 16) | (channel_to_byte(color.g) << 8) | channel_to_byte(color.b);
    Ok(Value::from(format!("0x{:06X}", rgb)).into())
}

/// Accepts a hex string or a number
pub fn text_field_set_text_color(vm: &mut Vm, this: &Value, args: &[Value]) -> Result<Invocation, VmError> {
    let value = arg(args, 0);
    let rgb = match &value {
        Value::String(s) => parse_hex_color(s.as_str())
            .ok_or_else(|| VmError::type_error(format!("'{}' is not a hex colour", s)))?,
        other if other.is_number() => u32::try_from(other.to_integer() & 0x00FF_FFFF).unwrap_or(0),
        other => {
            return Err(VmError::type_error(format!(
                "textColor expects a colour, got {}",
                other.type_name()
            )));
        }
    };
    let channel = |shift: u32| ((rgb >> shift) & 0xFF) as f32 / 255.0;
    let (r, g, b) = (channel(16), channel(8), channel(0));
    update_transform(vm, this, |t| {
        t.color.r = r;
        t.color.g = g;
        t.color.b = b;
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// MovieClip
// ═══════════════════════════════════════════════════════════════════════════

/// One-based frame number
pub fn movie_clip_current_frame(vm: &mut Vm, this: &Value, _args: &[Value]) -> Result<Invocation, VmError> {
    let frame = with_sprite(vm, this, |sprite| Ok(sprite.current_frame()))?;
    let frame = i32::try_from(frame.saturating_add(1)).unwrap_or(i32::MAX);
    Ok(Value::Integer(frame).into())
}

/// Jump to a frame label or a one-based frame number
fn goto(sprite: &mut dyn SpriteItem, destination: &Value) -> Result<(), VmError> {
    match destination {
        Value::String(label) => sprite.goto(label.as_str()),
        Value::Integer(_) | Value::Float(_) => {
            let frame = destination.to_integer().saturating_sub(1);
            sprite.goto_frame(u32::try_from(frame).unwrap_or(0));
        }
        other => {
            return Err(VmError::unsupported(format!(
                "can only jump to labels or frame numbers, got {}",
                other.type_name()
            )));
        }
    }
    Ok(())
}

pub fn movie_clip_goto_and_play(vm: &mut Vm, this: &Value, args: &[Value]) -> Result<Invocation, VmError> {
    let destination = arg(args, 0);
    with_sprite(vm, this, |sprite| {
        goto(sprite, &destination)?;
        sprite.play();
        Ok(())
    })?;
    Ok(Value::Undefined.into())
}

pub fn movie_clip_goto_and_stop(vm: &mut Vm, this: &Value, args: &[Value]) -> Result<Invocation, VmError> {
    let destination = arg(args, 0);
    with_sprite(vm, this, |sprite| {
        goto(sprite, &destination)?;
        sprite.stop(true);
        Ok(())
    })?;
    Ok(Value::Undefined.into())
}

pub fn movie_clip_play(vm: &mut Vm, this: &Value, _args: &[Value]) -> Result<Invocation, VmError> {
    with_sprite(vm, this, |sprite| {
        sprite.play();
        Ok(())
    })?;
    Ok(Value::Undefined.into())
}

pub fn movie_clip_stop(vm: &mut Vm, this: &Value, _args: &[Value]) -> Result<Invocation, VmError> {
    with_sprite(vm, this, |sprite| {
        sprite.stop(false);
        Ok(())
    })?;
    Ok(Value::Undefined.into())
}

// ═══════════════════════════════════════════════════════════════════════════
// GetProperty / SetProperty opcodes
// ═══════════════════════════════════════════════════════════════════════════

/// Member name behind a numeric property index of the property opcodes
fn property_name(index: u32) -> Result<&'static str, VmError> {
    Ok(match index {
        0 => "_x",
        1 => "_y",
        2 => "_xscale",
        3 => "_yscale",
        4 => "_currentframe",
        6 => "_alpha",
        7 => "_visible",
        11 => "_target",
        13 => "_name",
        other => {
            return Err(VmError::unsupported(format!(
                "display property index {}",
                other
            )));
        }
    })
}

impl Vm {
    /// GetProperty: read a display property of a stage object by index
    pub fn get_stage_property(&mut self, object: ObjectId, index: u32) -> Result<Value, VmError> {
        let name = property_name(index)?;
        self.display_item(object)?;
        self.get_member(object, name)
    }

    /// SetProperty: write a display property of a stage object by index
    pub fn set_stage_property(&mut self, object: ObjectId, index: u32, value: Value) -> Result<(), VmError> {
        let name = property_name(index)?;
        self.display_item(object)?;
        self.set_member(object, name, value)
    }
}
