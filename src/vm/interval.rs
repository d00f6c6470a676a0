//! Named recurring invocations driven by host ticks.

use crate::error::VmError;
use crate::gc::ObjectId;
use crate::value::{AsString, CheapClone, Value};

use super::Vm;

/// One registered interval
#[derive(Debug, Clone)]
pub struct Interval {
    pub period_ms: u64,
    pub callback: ObjectId,
    pub this: Value,
    pub args: Vec<Value>,
    /// Clock time of the last firing (registration time before the first)
    pub last_fire: u64,
}

impl Interval {
    /// Whether the interval should fire at clock time `now`
    pub fn is_due(&self, now: u64) -> bool {
        now.saturating_sub(self.last_fire) >= self.period_ms
    }

    pub(crate) fn trace(&self, visitor: &mut dyn FnMut(ObjectId)) {
        visitor(self.callback);
        for value in std::iter::once(&self.this).chain(self.args.iter()) {
            if let Value::Object(id) = value {
                visitor(*id);
            }
        }
    }
}

impl Vm {
    /// Register `callback` to run every `period_ms`. Re-registering a name
    /// replaces the old interval but keeps its place in firing order.
    pub fn create_interval(
        &mut self,
        name: &str,
        period_ms: u64,
        callback: &Value,
        this: Value,
        args: Vec<Value>,
    ) -> Result<(), VmError> {
        let (callback, _) = self.to_function(callback)?;
        let name = self.intern(name);
        log::debug!("interval '{}' registered every {}ms", name, period_ms);
        let interval = Interval {
            period_ms,
            callback,
            this,
            args,
            last_fire: self.clock.now_millis(),
        };
        self.intervals.insert(name, interval);
        Ok(())
    }

    /// Remove an interval. Returns false if no interval has that name.
    pub fn clear_interval(&mut self, name: &str) -> bool {
        let removed = self.intervals.shift_remove(name).is_some();
        if removed {
            log::debug!("interval '{}' cleared", name);
        }
        removed
    }

    pub fn has_interval(&self, name: &str) -> bool {
        self.intervals.contains_key(name)
    }

    /// Registered interval names in firing order
    pub fn interval_names(&self) -> Vec<AsString> {
        self.intervals.keys().cloned().collect()
    }

    pub fn interval(&self, name: &str) -> Option<&Interval> {
        self.intervals.get(name)
    }

    /// Generate a fresh interval name for `setInterval`
    pub(crate) fn next_interval_name(&mut self) -> AsString {
        loop {
            self.next_interval = self.next_interval.wrapping_add(1);
            let name = AsString::from(format!("__interval{}", self.next_interval));
            if !self.intervals.contains_key(name.as_str()) {
                return name;
            }
        }
    }

    /// Fire every due interval once, in registration order.
    ///
    /// Only valid between host frames. Intervals registered by a callback
    /// during this tick are first considered on the next one; intervals
    /// cleared during this tick do not fire. A failing callback is logged and
    /// does not stop the others. Returns the number of intervals fired.
    pub fn tick(&mut self) -> Result<usize, VmError> {
        if !self.contexts.is_empty() {
            return Err(VmError::unsupported("tick while frames are live"));
        }
        let now = self.clock.now_millis();
        let names: Vec<AsString> = self.intervals.keys().cloned().collect();

        let mut fired = 0;
        for name in names {
            let Some(interval) = self.intervals.get_mut(name.as_str()) else {
                continue;
            };
            if !interval.is_due(now) {
                continue;
            }
            interval.last_fire = now;
            let callback = Value::Object(interval.callback);
            let this = interval.this.cheap_clone();
            let args = interval.args.clone();

            fired += 1;
            if let Err(e) = self.call(&callback, &this, &args) {
                log::warn!("interval '{}' failed: {}", name, e);
            }
        }

        self.maybe_collect()?;
        Ok(fired)
    }
}
