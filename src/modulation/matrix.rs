use arrayvec::ArrayVec;

use super::{ModRoute, ModTargetId, SourceValues, TargetValues};
use crate::{
    dsp::modulate::{CompensatedSum, ModCurve},
    PatchError, MAX_ROUTES,
};

/// A route with its source and target already turned into slot indices.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ResolvedRoute {
    source: usize,
    target: usize,
    curve: ModCurve,
    depth: f32,
}

/// The route topology of a compiled patch.
///
/// Topology is immutable. Amounts live outside (in the engine's amount
/// table) so a macro can move them without touching this value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModMatrix {
    routes: ArrayVec<ResolvedRoute, MAX_ROUTES>,
}

impl ModMatrix {
    /// Map each route onto slot indices. Patch-level existence checks
    /// (oscillator count, envelope count...) happen in `Patch::compile`;
    /// this only rejects ids that can't exist in any patch.
    pub fn resolve(routes: &[ModRoute]) -> Result<Self, PatchError> {
        if routes.len() > MAX_ROUTES {
            return Err(PatchError::TooMany {
                what: "routes",
                count: routes.len(),
                max: MAX_ROUTES,
            });
        }

        let mut resolved = ArrayVec::new();
        for (route_index, route) in routes.iter().enumerate() {
            let source = route
                .source
                .index()
                .ok_or(PatchError::UnresolvedSource {
                    route: route_index,
                    source: route.source,
                })?;
            let target = route
                .target
                .index()
                .ok_or(PatchError::UnresolvedTarget {
                    route: route_index,
                    target: route.target,
                })?;
            resolved.push(ResolvedRoute {
                source,
                target,
                curve: route.curve,
                depth: route.target.depth(),
            });
        }
        Ok(Self { routes: resolved })
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Sum every route into `out`, then clamp each target to its range.
    ///
    /// `amounts[i]` is the live amount of route `i`; missing entries count
    /// as zero.
    pub fn evaluate(&self, amounts: &[f32], sources: &SourceValues, out: &mut TargetValues) {
        let mut sums = [CompensatedSum::new(); ModTargetId::COUNT];

        for (i, route) in self.routes.iter().enumerate() {
            let amount = amounts.get(i).copied().unwrap_or(0.0);
            if amount == 0.0 {
                continue;
            }
            let shaped = route.curve.apply(sources.slot(route.source));
            sums[route.target].add(shaped as f64 * amount as f64 * route.depth as f64);
        }

        for (slot, sum) in sums.iter().enumerate() {
            out.store(slot, sum.total() as f32);
        }
    }
}
