//! Deciding whether to inline a call site, and performing a single inline.
//!
//! Both drivers share this code: the cost gate consults the external cost
//! model and applies the deferral heuristic, the action performs one inline
//! and the book-keeping around it.
pub mod lazy;
pub mod scc;

use crate::allocas::{merge_inlined_array_allocas, InlinedArrayAllocas};
use crate::analysis::Services;
use crate::config::ImportStats;
use crate::cost::{InlineCost, CALL_PENALTY, LAST_CALL_TO_STATIC_BONUS};
use crate::remarks::{Remark, RemarkId, RemarkKind};
use crate::state::State;
use ir::inline::{inline_function, InlineInfo};
use ir::{merge_attributes_for_inlining, CallSite, Module, Use};

/// The callee/caller names a remark about `site` should carry.
fn remark_names(module: &Module, site: CallSite) -> (String, String) {
    let caller = module.function(site.caller).name.clone();
    let callee = module
        .call_site_callee(site)
        .map(|id| module.function(id).name.clone())
        .unwrap_or_else(|| "<indirect>".to_string());

    (callee, caller)
}

/// Returns `true` if the inliner should attempt to inline at the given call
/// site, emitting an analysis remark either way.
pub fn should_inline(
    module: &Module,
    site: CallSite,
    state: &mut State,
    services: &mut Services,
) -> bool {
    let verdict = (services.get_inline_cost)(module, site);
    let (callee, caller) = remark_names(module, site);

    match verdict {
        InlineCost::Always => {
            state.remarks.emit(Remark::new(
                RemarkKind::Analysis,
                RemarkId::AlwaysInline,
                callee,
                caller,
            ));
            true
        }
        InlineCost::Never => {
            state.remarks.emit(Remark::new(
                RemarkKind::Analysis,
                RemarkId::NeverInline,
                callee,
                caller,
            ));
            false
        }
        InlineCost::Cost { cost, threshold } => {
            if cost >= threshold {
                state.remarks.emit(
                    Remark::new(
                        RemarkKind::Analysis,
                        RemarkId::TooCostly,
                        callee,
                        caller,
                    )
                    .with_cost(cost, threshold),
                );
                return false;
            }

            if should_be_deferred(module, site, verdict, state, services) {
                state.remarks.emit(
                    Remark::new(
                        RemarkKind::Analysis,
                        RemarkId::IncreaseCostInOtherContexts,
                        callee,
                        caller,
                    )
                    .with_cost(cost, threshold),
                );
                false
            } else {
                state.remarks.emit(
                    Remark::new(
                        RemarkKind::Analysis,
                        RemarkId::CanBeInlined,
                        callee,
                        caller,
                    )
                    .with_cost(cost, threshold),
                );
                true
            }
        }
    }
}

/// Returns `true` if a locally profitable inline should be refused because
/// it would block a more profitable inline of the caller itself.
///
/// Call the caller B and the callee C. When B is local or linkonce-ODR, B
/// is an inlining candidate at its own call sites, and absorbing a large C
/// may push B past the threshold there. In that case it's better to leave
/// the call to C alone and inline B outwards instead.
fn should_be_deferred(
    module: &Module,
    site: CallSite,
    verdict: InlineCost,
    state: &mut State,
    services: &mut Services,
) -> bool {
    let caller = site.caller;
    let caller_func = module.function(caller);

    if !caller_func.linkage.is_local()
        && !caller_func.linkage.is_link_once_odr()
    {
        return false;
    }

    let mut total_secondary_cost = 0;
    // The cost the caller would absorb, net of the call instruction it
    // erases.
    let candidate_cost = verdict.cost() - (CALL_PENALTY + 1);
    let mut caller_will_be_removed = caller_func.linkage.is_local();
    let mut outer_inline_blocked = false;

    for user in module.users_of(caller) {
        let outer = match user {
            Use::Call(site) => site,
            Use::Ref(_) | Use::Constant => {
                // A reference that isn't a direct call keeps the caller
                // alive no matter what happens at its call sites.
                caller_will_be_removed = false;
                continue;
            }
        };

        let outer_verdict = (services.get_inline_cost)(module, outer);

        state.stats.caller_callers_analyzed += 1;

        if !outer_verdict.is_profitable() {
            caller_will_be_removed = false;
            continue;
        }

        if outer_verdict.is_always() {
            continue;
        }

        // The outer inline is blocked if absorbing the callee erases its
        // remaining budget.
        if outer_verdict.cost_delta() <= candidate_cost {
            outer_inline_blocked = true;
            total_secondary_cost += outer_verdict.cost();
        }
    }

    // When every outer call would be inlined, the cost model already made
    // the last one artificially cheap in anticipation of the definition
    // being removed. That wasn't accounted for above, so undo the bonus.
    if caller_will_be_removed && module.has_uses(caller) {
        total_secondary_cost -= LAST_CALL_TO_STATIC_BONUS;
    }

    outer_inline_blocked && total_secondary_cost < verdict.cost()
}

/// Inlines the call site if the IR mutator can, updating statistics,
/// attributes, and the per-caller alloca table. Returns `false` when the
/// mutation was refused; the call site is then still valid.
pub fn inline_call_if_possible(
    module: &mut Module,
    site: CallSite,
    info: &mut InlineInfo,
    allocas: &mut InlinedArrayAllocas,
    inline_history: i32,
    state: &mut State,
    services: &mut Services,
) -> bool {
    let caller = site.caller;
    let Some(callee) = module.call_site_callee(site) else {
        return false;
    };

    // Alias results for the callee are computed on demand; the mutator is
    // entitled to consult them while rewriting.
    let _aliases = services.aliases.get(callee);

    if !inline_function(module, site, info, state.config.insert_lifetime) {
        return false;
    }

    if state.config.import_stats != ImportStats::No {
        state.import_stats.record_inline(module, caller, callee);
    }

    merge_attributes_for_inlining(module, caller, callee);

    if !state.config.disable_inlined_alloca_merging {
        merge_inlined_array_allocas(
            module,
            caller,
            info,
            allocas,
            inline_history,
            &mut state.stats,
        );
    }

    true
}
