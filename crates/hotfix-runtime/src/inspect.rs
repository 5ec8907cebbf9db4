//! Module summaries for tooling

use hotfix_engine::image::module::type_flags;
use hotfix_engine::{Domain, HotFixBundle, ParseError, TypeDescriptor};
use serde::Serialize;

use crate::behaviours::{discover, BEHAVIOUR_MARKER};
use crate::entry::ENTRY;

/// One type in a summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeSummary {
    /// Fully-qualified name
    pub name: String,
    /// `class`, `abstract class`, `interface`, or `value type`
    pub kind: &'static str,
    /// Parent type name
    pub parent: Option<String>,
    /// `name/arity` for each method
    pub methods: Vec<String>,
}

/// What a module contains, as seen by the loader
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleSummary {
    /// Module name
    pub name: String,
    /// Payload SHA-256, hex
    pub checksum: String,
    /// Types in table order
    pub types: Vec<TypeSummary>,
    /// Behaviour names, or `None` when the marker is absent
    pub behaviours: Option<Vec<String>>,
    /// Whether the entry point exists with the expected arity
    pub has_entry: bool,
    /// Native binding names the host must provide
    pub natives: Vec<String>,
    /// Whether symbols were supplied and matched
    pub has_symbols: bool,
}

fn kind_of(ty: &TypeDescriptor) -> &'static str {
    if ty.is_interface() {
        "interface"
    } else if ty.flags & type_flags::VALUE_TYPE != 0 {
        "value type"
    } else if ty.is_abstract() {
        "abstract class"
    } else {
        "class"
    }
}

impl ModuleSummary {
    /// Parse `bundle` in a scratch domain and summarize it
    pub fn analyze(bundle: HotFixBundle) -> Result<Self, ParseError> {
        let domain = Domain::new();
        domain.load_module(bundle)?;

        // A freshly loaded, undisposed domain always has a table.
        let table = match domain.type_table() {
            Ok(table) => table,
            Err(_) => return Err(ParseError::Disposed),
        };

        let types = table
            .iter()
            .map(|ty| TypeSummary {
                name: ty.full_name.clone(),
                kind: kind_of(ty),
                parent: ty
                    .parent
                    .and_then(|id| table.get(id))
                    .map(|p| p.full_name.clone()),
                methods: ty
                    .methods
                    .iter()
                    .map(|m| format!("{}/{}", m.name, m.param_count))
                    .collect(),
            })
            .collect();

        let summary = Self {
            name: domain.module_name().unwrap_or_default(),
            checksum: domain.module_checksum().unwrap_or_default(),
            types,
            behaviours: discover(&table, BEHAVIOUR_MARKER).map(|set| set.into_iter().collect()),
            has_entry: domain
                .find_method(ENTRY.type_name, ENTRY.method, ENTRY.arity)
                .is_ok(),
            natives: domain.native_bindings(),
            has_symbols: domain.has_symbols(),
        };
        domain.dispose();
        Ok(summary)
    }
}
