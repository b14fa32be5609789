use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::{debug, info, warn};

use super::{CompiledPatch, Patch};
use crate::PatchError;

/// Control-side owner of the patch slot the engine reads from.
///
/// Publishing is a single atomic pointer swap. The engine notices the new
/// pointer at its next block and clones the `Arc`; the publisher keeps the
/// previous patch in `retired` until the engine has let go of it, so the
/// last drop (and its deallocation) always happens here rather than on the
/// audio thread.
pub struct PatchPublisher {
    slot: Arc<ArcSwap<CompiledPatch>>,
    retired: Vec<Arc<CompiledPatch>>,
    max_polyphony: usize,
}

impl PatchPublisher {
    pub fn new(patch: Patch, max_polyphony: usize) -> Result<Self, PatchError> {
        let compiled = Self::check(patch, max_polyphony)?;
        info!(patch = compiled.name(), "initial patch loaded");
        Ok(Self {
            slot: Arc::new(ArcSwap::from_pointee(compiled)),
            retired: Vec::new(),
            max_polyphony,
        })
    }

    fn check(patch: Patch, max_polyphony: usize) -> Result<CompiledPatch, PatchError> {
        let compiled = patch.compile()?;
        let voices = compiled.voice_mode().polyphony();
        if voices > max_polyphony {
            return Err(PatchError::PolyphonyExceedsEngine {
                voices,
                max: max_polyphony,
            });
        }
        Ok(compiled)
    }

    /// The shared slot handed to the engine.
    pub fn slot(&self) -> Arc<ArcSwap<CompiledPatch>> {
        Arc::clone(&self.slot)
    }

    /// Validate and publish. On error nothing changes and the current
    /// patch keeps playing.
    pub fn publish(&mut self, patch: Patch) -> Result<Arc<CompiledPatch>, PatchError> {
        let name = patch.name.clone();
        let compiled = match Self::check(patch, self.max_polyphony) {
            Ok(compiled) => Arc::new(compiled),
            Err(err) => {
                warn!(patch = %name, error = %err, "patch rejected");
                return Err(err);
            }
        };

        let previous = self.slot.swap(Arc::clone(&compiled));
        self.retired.push(previous);
        self.collect();

        info!(patch = %name, "patch published");
        Ok(compiled)
    }

    pub fn current(&self) -> Arc<CompiledPatch> {
        self.slot.load_full()
    }

    /// Drop retired patches nobody else references any more. Returns how
    /// many are still waiting on the engine.
    pub fn collect(&mut self) -> usize {
        let before = self.retired.len();
        self.retired.retain(|patch| Arc::strong_count(patch) > 1);
        let freed = before - self.retired.len();
        if freed > 0 {
            debug!(freed, pending = self.retired.len(), "released retired patches");
        }
        self.retired.len()
    }

    pub fn max_polyphony(&self) -> usize {
        self.max_polyphony
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        modulation::{ModRoute, ModSourceId, ModTargetId},
        patch::VoiceMode,
    };

    #[test]
    fn rejected_patch_leaves_current_in_place() {
        let mut publisher = PatchPublisher::new(Patch::new("first"), 16).unwrap();

        let bad = Patch::new("bad").with_route(ModRoute::new(
            ModSourceId::ModWheel,
            ModTargetId::OutputGain,
            -2.0,
        ));
        assert!(publisher.publish(bad).is_err());
        assert_eq!(publisher.current().name(), "first");
    }

    #[test]
    fn polyphony_is_checked_against_engine() {
        let wide = Patch::new("wide").with_voice_mode(VoiceMode::Poly { voices: 32 });
        assert_eq!(
            PatchPublisher::new(wide, 16).err(),
            Some(PatchError::PolyphonyExceedsEngine {
                voices: 32,
                max: 16
            })
        );
    }

    #[test]
    fn retired_patches_wait_for_the_reader() {
        let mut publisher = PatchPublisher::new(Patch::new("a"), 16).unwrap();
        // Simulate the engine holding the current patch
        let held_by_engine = publisher.current();

        publisher.publish(Patch::new("b")).unwrap();
        assert_eq!(publisher.collect(), 1);

        drop(held_by_engine);
        assert_eq!(publisher.collect(), 0);
        assert_eq!(publisher.current().name(), "b");
    }
}
