use super::Schema;
use crate::reference::Reference;

/// How a registered dependency relates to the registering node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    /// Child validated against the same ancestors (alternatives branches).
    Sibling,
    /// Child validated one level down (object keys, array items).
    Parent,
}

impl Family {
    fn offset(self) -> usize {
        match self {
            Family::Sibling => 0,
            Family::Parent => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registered {
    pub ancestor: usize,
    pub root: String,
}

/// References a node depends on, relative to that node.
#[derive(Debug, Clone, Default)]
pub struct Registrations {
    refs: Vec<Registered>,
}

impl Registrations {
    pub fn register_ref(&mut self, reference: &Reference, family: Family) {
        let (Some(ancestor), Some(root)) = (reference.ancestor(), reference.root()) else {
            return;
        };
        if ancestor >= family.offset() {
            self.refs.push(Registered { ancestor: ancestor - family.offset(), root: root.to_string() });
        }
    }

    pub fn register_schema(&mut self, schema: &Schema, family: Family) {
        for dep in &schema.registrations.refs {
            if dep.ancestor >= family.offset() {
                self.refs.push(Registered {
                    ancestor: dep.ancestor - family.offset(),
                    root: dep.root.clone(),
                });
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Registered> {
        self.refs.iter()
    }

    /// Sibling keys this node reads.
    pub fn siblings(&self) -> impl Iterator<Item = &str> {
        self.refs.iter().filter(|r| r.ancestor == 1).map(|r| r.root.as_str())
    }
}
