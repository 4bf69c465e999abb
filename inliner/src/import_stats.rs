//! Statistics about inlining of functions imported from other modules.
//!
//! The inliner makes no cross-module decisions; when enabled it only records
//! how often imported definitions end up inlined, so that import heuristics
//! can be tuned elsewhere.
use fnv::FnvHashMap;
use ir::{FunctionId, Module};

/// Per-function record of inline events.
struct ImportedFunction {
    name: String,
    inlined: u64,
}

/// Records inlines of imported functions over the lifetime of one pass.
pub struct ImportedFunctionsStats {
    module_name: String,
    values: FnvHashMap<FunctionId, ImportedFunction>,
}

impl ImportedFunctionsStats {
    pub fn new() -> ImportedFunctionsStats {
        ImportedFunctionsStats {
            module_name: String::new(),
            values: FnvHashMap::default(),
        }
    }

    pub fn set_module_info(&mut self, module: &Module) {
        self.module_name = module.name.clone();
    }

    /// Records that `callee` was inlined into `caller`. Only imported
    /// callees are of interest.
    pub fn record_inline(
        &mut self,
        module: &Module,
        _caller: FunctionId,
        callee: FunctionId,
    ) {
        let func = module.function(callee);

        if !func.imported {
            return;
        }

        self.values
            .entry(callee)
            .or_insert_with(|| ImportedFunction {
                name: func.name.clone(),
                inlined: 0,
            })
            .inlined += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Renders the summary produced at end of pass. The verbose form lists
    /// every recorded function; entries are sorted by name so the output is
    /// stable.
    pub fn dump(&self, verbose: bool) -> String {
        let total: u64 = self.values.values().map(|v| v.inlined).sum();
        let mut buffer = format!(
            "[{}] inlined {} imported functions ({} inline sites)\n",
            self.module_name,
            self.values.len(),
            total
        );

        if verbose {
            let mut entries: Vec<_> = self.values.values().collect();

            entries.sort_by(|a, b| a.name.cmp(&b.name));

            for entry in entries {
                buffer.push_str(&format!(
                    "  {}: inlined {} times\n",
                    entry.name, entry.inlined
                ));
            }
        }

        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir::Linkage;
    use similar_asserts::assert_eq;

    #[test]
    fn test_dump_format() {
        let mut module = Module::new("app".to_string());
        let imported = module.add_function("util", Linkage::External);

        module.function_mut(imported).imported = true;

        let caller = module.add_function("caller", Linkage::External);
        let mut stats = ImportedFunctionsStats::new();

        stats.set_module_info(&module);
        stats.record_inline(&module, caller, imported);

        assert_eq!(
            stats.dump(true),
            "[app] inlined 1 imported functions (1 inline sites)\n  \
             util: inlined 1 times\n"
        );
    }

    #[test]
    fn test_record_inline_only_tracks_imports() {
        let mut module = Module::new("m".to_string());
        let local = module.add_function("local", Linkage::Local);
        let imported = module.add_function("imported", Linkage::External);

        module.function_mut(imported).imported = true;

        let caller = module.add_function("caller", Linkage::External);
        let mut stats = ImportedFunctionsStats::new();

        stats.set_module_info(&module);
        stats.record_inline(&module, caller, local);
        stats.record_inline(&module, caller, imported);
        stats.record_inline(&module, caller, imported);

        assert!(!stats.is_empty());

        let dump = stats.dump(true);

        assert!(dump.contains("inlined 1 imported functions"));
        assert!(dump.contains("2 inline sites"));
        assert!(dump.contains("imported: inlined 2 times"));
        assert!(!dump.contains("local:"));
    }
}
