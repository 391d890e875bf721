use crate::catalog::PhysicalInput;

/// Inputs the executor believes are physically down, in press order.
///
/// Only inputs whose press actually succeeded are tracked, so every release
/// the executor issues pairs with a press that reached the OS.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyStateTracker {
    held: Vec<PhysicalInput>,
}

impl KeyStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self, input: &PhysicalInput) -> bool {
        self.held.contains(input)
    }

    /// Returns false if the input was already held.
    pub fn mark_pressed(&mut self, input: &PhysicalInput) -> bool {
        if self.is_held(input) {
            return false;
        }
        self.held.push(input.clone());
        true
    }

    /// Returns false if the input was not held.
    pub fn mark_released(&mut self, input: &PhysicalInput) -> bool {
        match self.held.iter().position(|held| held == input) {
            Some(index) => {
                self.held.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn held(&self) -> &[PhysicalInput] {
        &self.held
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    /// Empties the tracker, returning what was held in press order.
    pub fn take_all(&mut self) -> Vec<PhysicalInput> {
        std::mem::take(&mut self.held)
    }
}
