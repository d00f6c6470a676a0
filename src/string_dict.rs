//! String dictionary for deduplicating property names.
//!
//! Member names arrive from constant pools, class tables and host calls. Interning
//! them makes repeated lookups of the same name share one `Rc<str>`.

use rustc_hash::FxHashMap;

use crate::value::{AsString, CheapClone};

/// A dictionary for deduplicating AsString instances.
pub struct StringDict {
    /// Box<str> keys avoid double indirection through Rc.
    strings: FxHashMap<Box<str>, AsString>,
}

impl StringDict {
    pub fn new() -> Self {
        Self {
            strings: FxHashMap::default(),
        }
    }

    /// Create a dictionary pre-populated with the runtime's well-known names.
    pub fn with_common_strings() -> Self {
        let mut dict = Self::new();
        for s in COMMON_STRINGS {
            dict.get_or_insert(s);
        }
        dict
    }

    /// Get an existing string or insert a new one.
    pub fn get_or_insert(&mut self, s: &str) -> AsString {
        if let Some(existing) = self.strings.get(s) {
            return existing.cheap_clone();
        }
        let interned = AsString::from(s);
        self.strings.insert(s.into(), interned.cheap_clone());
        interned
    }

    /// Get an existing string without inserting.
    pub fn get(&self, s: &str) -> Option<AsString> {
        self.strings.get(s).map(|s| s.cheap_clone())
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl Default for StringDict {
    fn default() -> Self {
        Self::new()
    }
}

const COMMON_STRINGS: &[&str] = &[
    // Object model
    "length",
    "prototype",
    "constructor",
    "__proto__",
    "toString",
    "valueOf",
    "hasOwnProperty",
    "addProperty",
    // Function
    "call",
    "apply",
    // Well-known variables
    "this",
    "arguments",
    "super",
    "_global",
    "_root",
    "_parent",
    "extern",
    // Classes
    "Object",
    "Function",
    "Boolean",
    "Number",
    "String",
    "Array",
    "StageObject",
    "TextField",
    "MovieClip",
    // Stage properties
    "_x",
    "_y",
    "_xscale",
    "_yscale",
    "_alpha",
    "_visible",
    "_name",
    "_target",
    "_currentframe",
    "textColor",
    // Methods
    "substr",
    "push",
    "join",
    "gotoAndPlay",
    "gotoAndStop",
    "play",
    "stop",
    // Globals
    "getTime",
    "setInterval",
    "clearInterval",
    "loadMovie",
    "attachMovie",
    "trace",
];
