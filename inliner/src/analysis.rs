//! External analyses consumed through narrow interfaces.
//!
//! The drivers never compute profitability or aliasing themselves; they pull
//! results from the services bundled here. The caches outlive a single
//! driver invocation, so repeated queries for the same function are cheap.
use crate::cost::InlineCost;
use fnv::{FnvHashMap, FnvHashSet};
use ir::{
    Attribute, Builtin, CallSite, FunctionId, Instruction, Module,
};

/// Classifies library routines the optimizer may treat as side-effect free.
pub struct TargetLibrary {
    pure_functions: FnvHashSet<String>,
}

impl TargetLibrary {
    pub fn new() -> TargetLibrary {
        TargetLibrary { pure_functions: FnvHashSet::default() }
    }

    pub fn add_pure(&mut self, name: &str) {
        self.pure_functions.insert(name.to_string());
    }

    pub fn is_pure(&self, name: &str) -> bool {
        self.pure_functions.contains(name)
    }
}

/// The assumptions recorded in a single function.
pub struct AssumptionCache {
    pub assumes: usize,
}

/// Per-function assumption caches, built on demand and kept for the
/// lifetime of the services bundle.
pub struct AssumptionCaches {
    values: FnvHashMap<FunctionId, AssumptionCache>,
}

impl AssumptionCaches {
    pub fn new() -> AssumptionCaches {
        AssumptionCaches { values: FnvHashMap::default() }
    }

    pub fn get(
        &mut self,
        module: &Module,
        function: FunctionId,
    ) -> &AssumptionCache {
        self.values.entry(function).or_insert_with(|| {
            let assumes = module
                .function(function)
                .body
                .blocks
                .iter()
                .flat_map(|b| b.instructions.iter())
                .filter(|i| {
                    matches!(
                        i,
                        Instruction::CallBuiltin(c)
                            if c.builtin == Builtin::Assume
                    )
                })
                .count();

            AssumptionCache { assumes }
        })
    }
}

/// Alias-analysis results for a single function. The inliner only needs
/// these to exist and be forwardable; their contents are owned by the
/// analysis.
pub struct AliasResults {
    pub function: FunctionId,
}

/// Constructs or returns alias-analysis results per function.
pub struct AliasAnalysis {
    values: FnvHashMap<FunctionId, AliasResults>,
}

impl AliasAnalysis {
    pub fn new() -> AliasAnalysis {
        AliasAnalysis { values: FnvHashMap::default() }
    }

    pub fn get(&mut self, function: FunctionId) -> &AliasResults {
        self.values
            .entry(function)
            .or_insert_with(|| AliasResults { function })
    }
}

/// Profile-derived hot/cold information. May be absent entirely.
pub struct ProfileSummary {
    hot: FnvHashSet<FunctionId>,
}

impl ProfileSummary {
    pub fn new() -> ProfileSummary {
        ProfileSummary { hot: FnvHashSet::default() }
    }

    pub fn mark_hot(&mut self, function: FunctionId) {
        self.hot.insert(function);
    }

    pub fn is_hot(&self, function: FunctionId) -> bool {
        self.hot.contains(&function)
    }
}

/// The pluggable services a driver invocation consumes.
///
/// The cost model is a closure so callers can capture whatever state their
/// model needs; everything else is plain data with interior caches.
pub struct Services<'a> {
    pub get_inline_cost: Box<dyn FnMut(&Module, CallSite) -> InlineCost + 'a>,
    pub assumptions: AssumptionCaches,
    pub aliases: AliasAnalysis,
    pub profile: Option<ProfileSummary>,
    pub target_library: TargetLibrary,
}

impl<'a> Services<'a> {
    pub fn new<F>(get_inline_cost: F) -> Services<'a>
    where
        F: FnMut(&Module, CallSite) -> InlineCost + 'a,
    {
        Services {
            get_inline_cost: Box::new(get_inline_cost),
            assumptions: AssumptionCaches::new(),
            aliases: AliasAnalysis::new(),
            profile: None,
            target_library: TargetLibrary::new(),
        }
    }
}

/// Returns `true` if erasing the call at `site` is unconditionally safe:
/// the result (if any) is unused and the callee can't have side effects.
pub fn is_trivially_dead(
    module: &Module,
    site: CallSite,
    library: &TargetLibrary,
) -> bool {
    let Some(Instruction::Call(call)) = module.call_site_instruction(site)
    else {
        return false;
    };

    let Some(callee) = module.get_function(call.callee) else {
        return false;
    };

    let pure = callee.attributes.contains(Attribute::ReadOnly)
        || (callee.is_declaration() && library.is_pure(&callee.name));

    if !pure {
        return false;
    }

    match call.register {
        None => true,
        Some(reg) => {
            module.function(site.caller).register_use_counts()[reg.0] == 0
        }
    }
}
