//! Usage recipe selection.

use extractors_core::{UsageMethod, UsageRecipe};

/// Pick the recipe to run: the first one using `preferred`, otherwise the
/// first one with any method this engine can execute.
///
/// The fallback is the *first* executable recipe in declaration order, not
/// the last recipe listed, and recipes with unknown methods are skipped
/// rather than returned.
pub fn select_usage<'a>(usage: &'a [UsageRecipe], preferred: &UsageMethod) -> Option<&'a UsageRecipe> {
    let chosen = usage
        .iter()
        .find(|u| &u.method == preferred)
        .or_else(|| usage.iter().find(|u| u.method.is_known()));
    if let Some(recipe) = chosen {
        if &recipe.method != preferred {
            tracing::info!(
                preferred = %preferred,
                using = %recipe.method,
                "preferred execution method not offered by this extractor"
            );
        }
    }
    chosen
}
