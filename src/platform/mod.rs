//! Host collaborator traits.
//!
//! The VM never owns the scene graph, the clock or the document loader. Hosts
//! implement these traits and hand them to the VM; tests use the in-memory
//! implementations provided here.

mod std_impl;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub use std_impl::StdClock;

use crate::error::VmError;
use crate::gc::ObjectId;
use crate::value::Value;

/// Monotonic elapsed-time source used by `getTime` and the interval scheduler.
pub trait HostClock {
    /// Milliseconds on a monotonic timeline. Only differences are meaningful.
    fn now_millis(&self) -> u64;
}

/// A clock that only moves when told to.
///
/// Used to drive the interval scheduler deterministically.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<u64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, millis: u64) {
        self.now.set(self.now.get().saturating_add(millis));
    }

    pub fn set(&self, millis: u64) {
        self.now.set(millis);
    }
}

impl HostClock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.get()
    }
}

/// Loads or attaches another scripted document on behalf of `loadMovie` /
/// `attachMovie`. The returned value is opaque to the VM.
pub trait DocumentLoader {
    fn load_movie(&self, url: &str) -> Result<Value, VmError>;

    fn attach_movie(&self, url: &str, name: &str, depth: i32) -> Result<Value, VmError>;
}

/// Multiplicative colour transform, each channel in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorTransform {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl ColorTransform {
    pub const WHITE: ColorTransform = ColorTransform {
        r: 1.0,
        g: 1.0,
        b: 1.0,
        a: 1.0,
    };
}

impl Default for ColorTransform {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Placement of a display item relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: (f32, f32),
    /// 1.0 is 100%
    pub scale: (f32, f32),
    pub color: ColorTransform,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: (0.0, 0.0),
            scale: (1.0, 1.0),
            color: ColorTransform::WHITE,
        }
    }
}

/// Shared handle to a node of the host's scene graph.
pub type DisplayHandle = Rc<RefCell<dyn DisplayItem>>;

/// A scene-graph node (button, movie clip, text field) as seen by scripts.
///
/// The VM reads and writes this state but never changes the graph's topology.
pub trait DisplayItem {
    fn name(&self) -> &str;

    fn set_name(&mut self, name: &str);

    fn parent(&self) -> Option<DisplayHandle>;

    /// The script wrapper bridged to this item, if one was created.
    fn script_object(&self) -> Option<ObjectId>;

    fn transform(&self) -> Transform;

    fn set_transform(&mut self, transform: Transform);

    fn visible(&self) -> bool;

    fn set_visible(&mut self, visible: bool);

    /// Render items are the per-placement nodes that sit between a sprite and
    /// its children; scripts skip over them when walking `_parent`.
    fn is_render_item(&self) -> bool {
        false
    }

    fn as_sprite(&self) -> Option<&dyn SpriteItem> {
        None
    }

    fn as_sprite_mut(&mut self) -> Option<&mut dyn SpriteItem> {
        None
    }
}

/// Timeline behaviour of movie-clip-like items.
pub trait SpriteItem {
    /// Zero-based index of the frame currently shown
    fn current_frame(&self) -> u32;

    fn goto(&mut self, label: &str);

    /// Jump to a zero-based frame index
    fn goto_frame(&mut self, index: u32);

    fn play(&mut self);

    fn stop(&mut self, force: bool);
}
