use indexmap::IndexMap;

use crate::value::Value;

pub type Frame = IndexMap<String, Value>;

/// Chain of binding frames. Index 0 is the root frame seeded by the host;
/// the last frame is the current one.
#[derive(Debug, Clone)]
pub struct Scope {
    frames: Vec<Frame>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::new()],
        }
    }

    pub fn with_variables(variables: IndexMap<String, Value>) -> Self {
        Self {
            frames: vec![variables],
        }
    }

    /// Looks a name up from the innermost frame outward.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Binds `name` in the current frame, shadowing outer bindings.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.current_mut().insert(name.into(), value);
    }

    /// Removes `name` from the current frame only.
    pub fn delete(&mut self, name: &str) -> Option<Value> {
        self.current_mut().shift_remove(name)
    }

    pub fn push_frame(&mut self) {
        self.frames.push(Frame::new());
    }

    /// Drops the current frame. The root frame is never popped.
    pub fn pop_frame(&mut self) -> Option<Frame> {
        if self.frames.len() > 1 {
            self.frames.pop()
        } else {
            None
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn variables(&self) -> &IndexMap<String, Value> {
        &self.frames[0]
    }

    pub fn into_variables(mut self) -> IndexMap<String, Value> {
        self.frames.swap_remove(0)
    }

    fn current_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }
}
