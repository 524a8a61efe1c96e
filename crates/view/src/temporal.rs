//! Binding of the shared time selector to one time-aware layer.
//!
//! Metadata arrives asynchronously. Each bind is tagged with a generation
//! captured when it is issued and a resolution carrying anything but the
//! latest generation is dropped, so the last bind always wins no matter in
//! which order fetches complete.

use foundation::ids::LayerId;
use foundation::time::{TimeInterval, TimeSpan};
use runtime::generation::{Generation, GenerationCounter};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::surface::TemporalMetadataSource;

/// What a layer reports about its time dimension.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemporalMetadata {
    pub full_extent: TimeSpan,
    #[serde(default)]
    pub step: Option<TimeInterval>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("temporal metadata unavailable for layer `{0}`")]
pub struct MetadataUnavailable(pub LayerId);

/// Current selector state. `window` always lies inside `full_extent`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TemporalBinding {
    pub active_layer: Option<LayerId>,
    pub full_extent: Option<TimeSpan>,
    pub step: Option<TimeInterval>,
    pub window: Option<TimeSpan>,
}

impl TemporalBinding {
    pub fn is_bound(&self) -> bool {
        self.active_layer.is_some() && self.full_extent.is_some()
    }

    /// Number of selector stops across the full extent.
    pub fn stops(&self) -> Option<u64> {
        Some(self.step?.stops_in(&self.full_extent?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BindTicket {
    pub generation: Generation,
    pub layer: LayerId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BindOutcome {
    Bound(TemporalBinding),
    /// A later bind or clear superseded this one; nothing changed.
    Stale,
    /// The fetch produced nothing; the selector stays unbound.
    Unavailable,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemporalBinder {
    binding: TemporalBinding,
    generation: GenerationCounter,
    pending: Option<BindTicket>,
}

impl TemporalBinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn binding(&self) -> &TemporalBinding {
        &self.binding
    }

    pub fn pending(&self) -> Option<&BindTicket> {
        self.pending.as_ref()
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_bound()
    }

    /// Layer the selector is bound to, or being bound to.
    pub fn target_layer(&self) -> Option<&LayerId> {
        self.pending
            .as_ref()
            .map(|t| &t.layer)
            .or(self.binding.active_layer.as_ref())
    }

    /// Starts binding `layer`, invalidating any earlier bind.
    ///
    /// The selector is cleared until the returned ticket resolves.
    pub fn begin(&mut self, layer: LayerId) -> BindTicket {
        let ticket = BindTicket {
            generation: self.generation.advance(),
            layer,
        };
        debug!(layer = %ticket.layer, generation = ticket.generation.0, "temporal bind started");
        self.binding = TemporalBinding::default();
        self.pending = Some(ticket.clone());
        ticket
    }

    /// Unbinds the selector. Returns `false` if it was already idle.
    pub fn clear(&mut self) -> bool {
        let was_active = self.pending.is_some() || self.binding != TemporalBinding::default();
        self.generation.advance();
        self.pending = None;
        self.binding = TemporalBinding::default();
        was_active
    }

    /// Applies a completed metadata fetch.
    ///
    /// `fallback` is the step used when the metadata declares none. The
    /// window is always reset to the full extent.
    pub fn resolve(
        &mut self,
        ticket: &BindTicket,
        metadata: Option<TemporalMetadata>,
        fallback: Option<TimeInterval>,
    ) -> BindOutcome {
        if !self.generation.is_current(ticket.generation) || self.pending.as_ref() != Some(ticket)
        {
            debug!(layer = %ticket.layer, generation = ticket.generation.0, "discarding stale temporal metadata");
            return BindOutcome::Stale;
        }
        self.pending = None;

        let Some(meta) = metadata else {
            warn!("{}", MetadataUnavailable(ticket.layer.clone()));
            self.binding = TemporalBinding::default();
            return BindOutcome::Unavailable;
        };

        self.binding = TemporalBinding {
            active_layer: Some(ticket.layer.clone()),
            full_extent: Some(meta.full_extent),
            step: meta.step.or(fallback),
            window: Some(meta.full_extent),
        };
        debug!(layer = %ticket.layer, stops = ?self.binding.stops(), "temporal binding applied");
        BindOutcome::Bound(self.binding.clone())
    }

    /// Moves the window inside the bound extent.
    ///
    /// A window partly outside the extent is clamped; one that misses it
    /// entirely resets to the full extent. `None` while unbound.
    pub fn set_window(&mut self, window: TimeSpan) -> Option<TimeSpan> {
        let extent = self.binding.full_extent?;
        let applied = extent.clamp(&window).unwrap_or(extent);
        self.binding.window = Some(applied);
        Some(applied)
    }

    /// Begins a bind, awaits `source` and resolves in one go.
    ///
    /// Hosts that keep handling input while the fetch is in flight should
    /// call [`TemporalBinder::begin`] and [`TemporalBinder::resolve`]
    /// separately instead.
    pub async fn bind_with<M: TemporalMetadataSource + ?Sized>(
        &mut self,
        source: &M,
        layer: LayerId,
        fallback: Option<TimeInterval>,
    ) -> BindOutcome {
        let ticket = self.begin(layer);
        let metadata = source.temporal_metadata(&ticket.layer).await;
        self.resolve(&ticket, metadata, fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::{BindOutcome, TemporalBinder, TemporalMetadata};
    use crate::surface::StaticMetadata;
    use foundation::ids::LayerId;
    use foundation::time::{Time, TimeInterval, TimeSpan, TimeUnit};
    use pretty_assertions::assert_eq;

    fn span(a: f64, b: f64) -> TimeSpan {
        TimeSpan::new(Time(a), Time(b))
    }

    fn meta(a: f64, b: f64) -> TemporalMetadata {
        TemporalMetadata {
            full_extent: span(a, b),
            step: None,
        }
    }

    const MONTH: TimeInterval = TimeInterval::new(TimeUnit::Months, 1);

    #[test]
    fn later_bind_wins_in_either_resolution_order() {
        let a = LayerId::new("sstMonthly");
        let b = LayerId::new("chlAnnual");

        let mut binder = TemporalBinder::new();
        let ta = binder.begin(a.clone());
        let tb = binder.begin(b.clone());
        assert_eq!(binder.resolve(&ta, Some(meta(0.0, 10.0)), None), BindOutcome::Stale);
        assert!(matches!(binder.resolve(&tb, Some(meta(5.0, 20.0)), None), BindOutcome::Bound(_)));
        assert_eq!(binder.binding().active_layer, Some(b.clone()));

        let mut binder = TemporalBinder::new();
        let ta = binder.begin(a);
        let tb = binder.begin(b.clone());
        assert!(matches!(binder.resolve(&tb, Some(meta(5.0, 20.0)), None), BindOutcome::Bound(_)));
        assert_eq!(binder.resolve(&ta, Some(meta(0.0, 10.0)), None), BindOutcome::Stale);
        assert_eq!(binder.binding().active_layer, Some(b));
        assert_eq!(binder.binding().window, Some(span(5.0, 20.0)));
    }

    #[test]
    fn rebinding_resets_the_window() {
        let mut binder = TemporalBinder::new();
        let t = binder.begin(LayerId::new("a"));
        binder.resolve(&t, Some(meta(0.0, 100.0)), None);
        assert_eq!(binder.set_window(span(10.0, 20.0)), Some(span(10.0, 20.0)));

        let t = binder.begin(LayerId::new("b"));
        binder.resolve(&t, Some(meta(500.0, 900.0)), None);
        assert_eq!(binder.binding().window, Some(span(500.0, 900.0)));
    }

    #[test]
    fn step_falls_back_to_the_heuristic() {
        let mut binder = TemporalBinder::new();
        let t = binder.begin(LayerId::new("sstMonthly"));
        binder.resolve(&t, Some(meta(0.0, 1.0)), Some(MONTH));
        assert_eq!(binder.binding().step, Some(MONTH));

        let declared = TimeInterval::new(TimeUnit::Days, 8);
        let t = binder.begin(LayerId::new("sstMonthly"));
        binder.resolve(
            &t,
            Some(TemporalMetadata {
                full_extent: span(0.0, 1.0),
                step: Some(declared),
            }),
            Some(MONTH),
        );
        assert_eq!(binder.binding().step, Some(declared));
    }

    #[test]
    fn missing_metadata_leaves_selector_unbound() {
        let mut binder = TemporalBinder::new();
        let t = binder.begin(LayerId::new("a"));
        assert_eq!(binder.resolve(&t, None, Some(MONTH)), BindOutcome::Unavailable);
        assert!(!binder.is_bound());
        assert_eq!(binder.pending(), None);
        // Resolving the same ticket twice is a no-op.
        assert_eq!(binder.resolve(&t, Some(meta(0.0, 1.0)), None), BindOutcome::Stale);
    }

    #[test]
    fn clear_is_idempotent_and_invalidates_pending() {
        let mut binder = TemporalBinder::new();
        let t = binder.begin(LayerId::new("a"));
        assert!(binder.clear());
        assert!(!binder.clear());
        assert_eq!(binder.resolve(&t, Some(meta(0.0, 1.0)), None), BindOutcome::Stale);
        assert_eq!(binder.target_layer(), None);
    }

    #[test]
    fn window_is_clamped_or_reset() {
        let mut binder = TemporalBinder::new();
        assert_eq!(binder.set_window(span(0.0, 1.0)), None);

        let t = binder.begin(LayerId::new("a"));
        binder.resolve(&t, Some(meta(100.0, 200.0)), None);
        assert_eq!(binder.set_window(span(50.0, 150.0)), Some(span(100.0, 150.0)));
        assert_eq!(binder.set_window(span(300.0, 400.0)), Some(span(100.0, 200.0)));
    }

    #[test]
    fn bind_with_awaits_the_source() {
        let source = StaticMetadata::default().with(
            "sstAnnual",
            TemporalMetadata {
                full_extent: span(0.0, 10.0),
                step: None,
            },
        );
        let mut binder = TemporalBinder::new();
        let outcome = pollster::block_on(binder.bind_with(
            &source,
            LayerId::new("sstAnnual"),
            Some(MONTH),
        ));
        assert!(matches!(outcome, BindOutcome::Bound(_)));
        let outcome =
            pollster::block_on(binder.bind_with(&source, LayerId::new("missing"), None));
        assert_eq!(outcome, BindOutcome::Unavailable);
    }
}
