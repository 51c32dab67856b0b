//! Undo/redo for manual core additions and removals.
//!
//! Every edit records the position it touched, so undo and redo splice at that
//! exact index instead of hunting for the nearest matching core.

use serde::{Deserialize, Serialize};

use crate::cores::Core;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum EditError {
    #[error("no core at index {index} (list has {len})")]
    OutOfRange { index: usize, len: usize },

    #[error("core list changed outside the edit log at index {index}")]
    OutOfSync { index: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CoreEdit {
    Add { index: usize, core: Core },
    Remove { index: usize, core: Core },
}

impl CoreEdit {
    fn inverse(&self) -> CoreEdit {
        match self {
            CoreEdit::Add { index, core } => CoreEdit::Remove {
                index: *index,
                core: core.clone(),
            },
            CoreEdit::Remove { index, core } => CoreEdit::Add {
                index: *index,
                core: core.clone(),
            },
        }
    }

    fn apply(&self, cores: &mut Vec<Core>) -> Result<(), EditError> {
        match self {
            CoreEdit::Add { index, core } => {
                if *index > cores.len() {
                    return Err(EditError::OutOfRange {
                        index: *index,
                        len: cores.len(),
                    });
                }
                cores.insert(*index, core.clone());
            }
            CoreEdit::Remove { index, core } => {
                match cores.get(*index) {
                    None => {
                        return Err(EditError::OutOfRange {
                            index: *index,
                            len: cores.len(),
                        });
                    }
                    Some(existing) if existing != core => {
                        return Err(EditError::OutOfSync { index: *index });
                    }
                    Some(_) => {}
                }
                cores.remove(*index);
            }
        }
        Ok(())
    }
}

/// Linear history of edits with a redo stack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditLog {
    done: Vec<CoreEdit>,
    undone: Vec<CoreEdit>,
}

impl EditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `edit` and records it. Clears the redo stack.
    pub fn apply(&mut self, cores: &mut Vec<Core>, edit: CoreEdit) -> Result<(), EditError> {
        edit.apply(cores)?;
        self.done.push(edit);
        self.undone.clear();
        Ok(())
    }

    /// Appends `core` and returns its index.
    pub fn add(&mut self, cores: &mut Vec<Core>, core: Core) -> Result<usize, EditError> {
        let index = cores.len();
        self.apply(cores, CoreEdit::Add { index, core })?;
        Ok(index)
    }

    pub fn remove(&mut self, cores: &mut Vec<Core>, index: usize) -> Result<Core, EditError> {
        let core = cores
            .get(index)
            .cloned()
            .ok_or(EditError::OutOfRange { index, len: cores.len() })?;
        self.apply(
            cores,
            CoreEdit::Remove {
                index,
                core: core.clone(),
            },
        )?;
        Ok(core)
    }

    /// Reverts the most recent edit. Returns `false` when there is nothing to undo.
    pub fn undo(&mut self, cores: &mut Vec<Core>) -> Result<bool, EditError> {
        let Some(edit) = self.done.pop() else {
            return Ok(false);
        };
        if let Err(err) = edit.inverse().apply(cores) {
            self.done.push(edit);
            return Err(err);
        }
        self.undone.push(edit);
        Ok(true)
    }

    /// Re-applies the most recently undone edit.
    pub fn redo(&mut self, cores: &mut Vec<Core>) -> Result<bool, EditError> {
        let Some(edit) = self.undone.pop() else {
            return Ok(false);
        };
        if let Err(err) = edit.apply(cores) {
            self.undone.push(edit);
            return Err(err);
        }
        self.done.push(edit);
        Ok(true)
    }

    pub fn history(&self) -> &[CoreEdit] {
        &self.done
    }

    pub fn can_undo(&self) -> bool {
        !self.done.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.undone.is_empty()
    }
}
