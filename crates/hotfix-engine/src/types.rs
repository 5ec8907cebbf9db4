//! Type table
//!
//! The validated type graph of a loaded module. Types are addressed by their
//! index in the module image; each carries at most one direct parent, and the
//! table guarantees every parent chain terminates.

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::image::module::type_flags;
use crate::image::{MethodDef, ModuleImage};

/// Structural problems found while building a type table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructureError {
    /// A type has an empty name
    #[error("Type #{0} has an empty name")]
    EmptyName(u32),

    /// Two types share a fully-qualified name
    #[error("Duplicate type name: {0}")]
    DuplicateType(String),

    /// A parent reference points outside the type table
    #[error("Type '{type_name}' has parent #{parent_id}, table has {count} types")]
    ParentOutOfRange {
        /// Type name
        type_name: String,
        /// Offending parent id
        parent_id: u32,
        /// Type table length
        count: usize,
    },

    /// Following parent references never reaches a root
    #[error("Inheritance cycle through type '{0}'")]
    ParentCycle(String),

    /// A method is bound to a native slot the module does not declare
    #[error("Method '{type_name}::{method}' bound to native slot {slot}, module declares {count}")]
    NativeOutOfRange {
        /// Declaring type
        type_name: String,
        /// Method name
        method: String,
        /// Offending slot
        slot: u32,
        /// Native binding table length
        count: usize,
    },
}

/// A type in the loaded graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    /// Index in the module type table
    pub id: u32,
    /// Fully-qualified name
    pub full_name: String,
    /// Kind flags
    pub flags: u8,
    /// Direct parent
    pub parent: Option<u32>,
    /// Declared methods
    pub methods: Vec<MethodDef>,
}

impl TypeDescriptor {
    /// Whether this is a class (reference type)
    pub fn is_class(&self) -> bool {
        (self.flags & type_flags::CLASS) != 0
    }

    /// Whether this type cannot be instantiated
    pub fn is_abstract(&self) -> bool {
        (self.flags & type_flags::ABSTRACT) != 0
    }

    /// Whether this is an interface
    pub fn is_interface(&self) -> bool {
        (self.flags & type_flags::INTERFACE) != 0
    }

    /// Find a method by name and parameter count
    pub fn method(&self, name: &str, arity: u32) -> Option<&MethodDef> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.param_count == arity)
    }

    /// Whether any method has this name, regardless of arity
    pub fn has_method_named(&self, name: &str) -> bool {
        self.methods.iter().any(|m| m.name == name)
    }
}

/// Validated type graph with name lookup
#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    types: Vec<TypeDescriptor>,
    by_name: FxHashMap<String, u32>,
}

impl TypeTable {
    /// Build and validate a table from a decoded module
    pub fn build(module: &ModuleImage) -> Result<Self, StructureError> {
        let count = module.types.len();
        let mut types = Vec::with_capacity(count);
        let mut by_name = FxHashMap::default();

        for (idx, def) in module.types.iter().enumerate() {
            let id = idx as u32;
            if def.name.is_empty() {
                return Err(StructureError::EmptyName(id));
            }
            if by_name.insert(def.name.clone(), id).is_some() {
                return Err(StructureError::DuplicateType(def.name.clone()));
            }
            if let Some(parent_id) = def.parent_id {
                if parent_id as usize >= count {
                    return Err(StructureError::ParentOutOfRange {
                        type_name: def.name.clone(),
                        parent_id,
                        count,
                    });
                }
            }
            for method in &def.methods {
                if let Some(slot) = method.native_id {
                    if slot as usize >= module.native_bindings.len() {
                        return Err(StructureError::NativeOutOfRange {
                            type_name: def.name.clone(),
                            method: method.name.clone(),
                            slot,
                            count: module.native_bindings.len(),
                        });
                    }
                }
            }
            types.push(TypeDescriptor {
                id,
                full_name: def.name.clone(),
                flags: def.flags,
                parent: def.parent_id,
                methods: def.methods.clone(),
            });
        }

        let table = Self { types, by_name };
        table.check_acyclic()?;
        Ok(table)
    }

    // Each type is walked at most once: a walk stops at the first type
    // already known to reach a root, and meeting a type on the current walk
    // is a cycle.
    fn check_acyclic(&self) -> Result<(), StructureError> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Unvisited,
            OnPath,
            Rooted,
        }

        let mut marks = vec![Mark::Unvisited; self.types.len()];
        let mut path = Vec::new();
        for start in 0..self.types.len() {
            let mut current = Some(start as u32);
            while let Some(id) = current {
                match marks[id as usize] {
                    Mark::Rooted => break,
                    Mark::OnPath => {
                        return Err(StructureError::ParentCycle(
                            self.types[id as usize].full_name.clone(),
                        ))
                    }
                    Mark::Unvisited => {
                        marks[id as usize] = Mark::OnPath;
                        path.push(id);
                        current = self.types[id as usize].parent;
                    }
                }
            }
            for id in path.drain(..) {
                marks[id as usize] = Mark::Rooted;
            }
        }
        Ok(())
    }

    /// Number of types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Get a type by id
    pub fn get(&self, id: u32) -> Option<&TypeDescriptor> {
        self.types.get(id as usize)
    }

    /// Get a type by fully-qualified name
    pub fn get_by_name(&self, name: &str) -> Option<&TypeDescriptor> {
        self.by_name.get(name).and_then(|&id| self.get(id))
    }

    /// Iterate types in table order
    pub fn iter(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.types.iter()
    }

    /// Ancestors of `id`, nearest first, excluding the type itself
    pub fn base_chain(&self, id: u32) -> Vec<&TypeDescriptor> {
        let mut chain = Vec::new();
        let mut current = self.get(id).and_then(|t| t.parent);
        while let Some(parent_id) = current {
            match self.get(parent_id) {
                Some(parent) => {
                    chain.push(parent);
                    current = parent.parent;
                }
                None => break,
            }
        }
        chain
    }

    /// Whether `sub` strictly descends from `base` (a type is not its own subclass)
    pub fn is_subclass_of(&self, sub: u32, base: u32) -> bool {
        let mut current = self.get(sub).and_then(|t| t.parent);
        while let Some(parent_id) = current {
            if parent_id == base {
                return true;
            }
            current = self.get(parent_id).and_then(|t| t.parent);
        }
        false
    }
}
