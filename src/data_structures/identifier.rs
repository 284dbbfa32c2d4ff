use crate::{error::IdentifierError, pick::NO_OBJECT};

/// Unique ids for meshes and texts. Released ids are handed out again, lowest
/// first, so the pick view only needs as many instances as there are live objects.
#[derive(Debug, Default)]
pub struct Identifiers {
    in_use: Vec<bool>,
    live: usize,
}

impl Identifiers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&mut self) -> Result<u32, IdentifierError> {
        let id = match self.in_use.iter().position(|used| !used) {
            Some(free) => free,
            None => {
                // the id that encodes as white is reserved for "nothing"
                if self.in_use.len() >= NO_OBJECT as usize {
                    return Err(IdentifierError::Exhausted);
                }
                self.in_use.push(false);
                self.in_use.len() - 1
            }
        };
        self.in_use[id] = true;
        self.live += 1;
        Ok(id as u32)
    }

    pub fn release(&mut self, id: u32) -> Result<(), IdentifierError> {
        match self.in_use.get_mut(id as usize) {
            Some(used) if *used => {
                *used = false;
                self.live -= 1;
                Ok(())
            }
            _ => Err(IdentifierError::NotInUse(id)),
        }
    }

    pub fn is_in_use(&self, id: u32) -> bool {
        self.in_use.get(id as usize).copied().unwrap_or(false)
    }

    pub fn live_count(&self) -> usize {
        self.live
    }
}
