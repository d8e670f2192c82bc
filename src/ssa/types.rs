//! Whole-program model built by [`super::loader`] and consumed by
//! [`super::builder`]. Stands in for "SSA form" in this reimplementation:
//! nodes carry a synthesized ID the moment they're discovered, the same way
//! the teacher's pack index assigns entries stable numeric positions before
//! they're ever written out.

use std::collections::HashMap;

use crate::diff::goparse::GoFunction;

/// One function, with its program-wide node ID already assigned.
#[derive(Debug, Clone)]
pub struct ProgramFunction {
    pub id: i64,
    pub func: GoFunction,
}

#[derive(Debug, Clone)]
pub struct ProgramInterface {
    pub name: String,
    pub methods: Vec<String>,
}

/// The whole program: every function across every loaded package, plus the
/// type information needed to resolve interface dispatch.
#[derive(Debug, Clone, Default)]
pub struct ProgramModel {
    pub module_path: String,
    pub functions: Vec<ProgramFunction>,
    pub interfaces: Vec<ProgramInterface>,
    /// type name -> set of method names it implements (from any `func (r T) M()`
    /// declaration found in the program, across packages).
    pub method_sets: HashMap<String, Vec<String>>,
    /// type names that appear in a composite literal (`T{}`/`&T{}`) anywhere
    /// in the loaded source, across the whole program.
    pub instantiated_types: Vec<String>,
}

impl ProgramModel {
    pub fn by_id(&self, id: i64) -> Option<&ProgramFunction> {
        self.functions.iter().find(|f| f.id == id)
    }

    pub fn find_by_file_and_name(&self, file: &str, func_name: &str) -> Option<&ProgramFunction> {
        self.functions
            .iter()
            .find(|f| f.func.file == file && f.func.func_name == func_name)
    }

    pub fn find_by_canonical(&self, canonical: &str) -> Option<&ProgramFunction> {
        self.functions
            .iter()
            .find(|f| f.func.canonical_name() == canonical)
    }

    /// Types implementing `interface_name`: any type with a method matching
    /// every name the interface declares. With our single-method-focus
    /// simplification (see `builder`), this in practice checks the one
    /// method a given call site dispatches on.
    pub fn types_implementing_method(&self, method: &str) -> Vec<String> {
        self.method_sets
            .iter()
            .filter(|(_, methods)| methods.iter().any(|m| m == method))
            .map(|(ty, _)| ty.clone())
            .collect()
    }
}
