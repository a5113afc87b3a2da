//! Staggered group reveals
//!
//! A group has one observed parent and an ordered list of children. When the
//! parent becomes visible each child is scheduled at
//! `base_delay + index * interval`, so children always start in list order.
//! When a repeatable parent is hidden again, pending child timers are cancelled
//! and every child reverses immediately.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use unveil_animation::{SchedulerHandle, Subscription};
use unveil_core::{ConfigurationError, DetachedHandleWarning, ElementHandle, Result};

use crate::reveal::{RevealController, RevealCore, RevealOptions};
use crate::variants::Variant;
use crate::viewport::VisibilityState;

/// Per-child start delays for a group
#[derive(Clone, Debug, PartialEq)]
pub struct StaggerPlan {
    children: Vec<ElementHandle>,
    base_delay_ms: f32,
    per_item_interval_ms: f32,
}

impl StaggerPlan {
    pub fn new(
        children: Vec<ElementHandle>,
        base_delay_ms: f32,
        per_item_interval_ms: f32,
    ) -> Result<Self> {
        for (label, value) in [
            ("base delay", base_delay_ms),
            ("per-item interval", per_item_interval_ms),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigurationError::InvalidStagger(format!(
                    "{label} must be a finite, non-negative number of milliseconds (got {value})"
                )));
            }
        }
        Ok(Self {
            children,
            base_delay_ms,
            per_item_interval_ms,
        })
    }

    /// Start delay of the child at `index`
    pub fn delay(&self, index: usize) -> f32 {
        self.base_delay_ms + index as f32 * self.per_item_interval_ms
    }

    pub fn delays(&self) -> impl Iterator<Item = (ElementHandle, f32)> + '_ {
        self.children
            .iter()
            .enumerate()
            .map(|(index, element)| (*element, self.delay(index)))
    }

    pub fn children(&self) -> &[ElementHandle] {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn base_delay_ms(&self) -> f32 {
        self.base_delay_ms
    }

    pub fn per_item_interval_ms(&self) -> f32 {
        self.per_item_interval_ms
    }
}

/// Group-level settings
#[derive(Clone, Debug, PartialEq)]
pub struct StaggerOptions {
    pub base_delay_ms: f32,
    pub per_item_interval_ms: f32,
    /// Variant animating the parent itself; `None` leaves it static
    pub parent_variant: Option<String>,
    /// Observation overrides for the parent
    pub reveal: RevealOptions,
}

impl StaggerOptions {
    pub fn new(base_delay_ms: f32, per_item_interval_ms: f32) -> Self {
        Self {
            base_delay_ms,
            per_item_interval_ms,
            ..Self::default()
        }
    }

    pub fn parent_variant(mut self, name: impl Into<String>) -> Self {
        self.parent_variant = Some(name.into());
        self
    }

    pub fn reveal(mut self, reveal: RevealOptions) -> Self {
        self.reveal = reveal;
        self
    }
}

impl Default for StaggerOptions {
    fn default() -> Self {
        Self {
            base_delay_ms: 0.0,
            per_item_interval_ms: 100.0,
            parent_variant: None,
            reveal: RevealOptions::default(),
        }
    }
}

/// One child of a group
#[derive(Clone, Debug, PartialEq)]
pub struct StaggerChild {
    pub element: ElementHandle,
    pub variant: String,
    /// Timing overrides; a delay here adds to the stagger delay
    pub options: RevealOptions,
}

impl StaggerChild {
    pub fn new(element: ElementHandle, variant: impl Into<String>) -> Self {
        Self {
            element,
            variant: variant.into(),
            options: RevealOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RevealOptions) -> Self {
        self.options = options;
        self
    }
}

struct StaggerShared {
    plan: StaggerPlan,
    children: Vec<Weak<RevealCore>>,
    timers: RefCell<Vec<Subscription>>,
    scheduler: SchedulerHandle,
}

impl StaggerShared {
    fn on_parent_change(&self, state: VisibilityState) {
        match state {
            VisibilityState::Visible => {
                let timers: Vec<Subscription> = self
                    .children
                    .iter()
                    .enumerate()
                    .map(|(index, child)| {
                        let child = Weak::clone(child);
                        let delay = self.plan.delay(index);
                        self.scheduler.set_timeout(delay, move |_| match child.upgrade() {
                            Some(core) => {
                                core.request(VisibilityState::Visible);
                            }
                            None => DetachedHandleWarning::emit("stagger child", None),
                        })
                    })
                    .collect();
                tracing::debug!(children = timers.len(), "stagger group scheduled");
                let stale = std::mem::replace(&mut *self.timers.borrow_mut(), timers);
                drop(stale);
            }
            VisibilityState::Hidden => {
                let pending = std::mem::take(&mut *self.timers.borrow_mut());
                drop(pending);
                for core in self.children.iter().filter_map(Weak::upgrade) {
                    core.request(VisibilityState::Hidden);
                }
            }
        }
    }

    fn pending_timers(&self) -> usize {
        self.timers
            .borrow()
            .iter()
            .filter(|timer| timer.is_active())
            .count()
    }

    fn cancel(&self) {
        let pending = std::mem::take(&mut *self.timers.borrow_mut());
        drop(pending);
    }
}

/// Handle to a staggered group
///
/// Dropping the handle disposes the parent, every child, and pending timers.
pub struct StaggerCoordinator {
    parent: RevealController,
    children: Vec<RevealController>,
    shared: Rc<StaggerShared>,
}

impl StaggerCoordinator {
    /// Drive `children` from the visibility of `parent`
    pub(crate) fn new(
        parent: RevealController,
        children: Vec<(ElementHandle, Variant)>,
        plan: StaggerPlan,
        scheduler: SchedulerHandle,
        trigger_once: bool,
    ) -> Self {
        let children: Vec<RevealController> = children
            .into_iter()
            .map(|(element, variant)| {
                RevealController::driven(RevealCore::new(
                    element,
                    scheduler.clone(),
                    variant,
                    trigger_once,
                ))
            })
            .collect();

        let shared = Rc::new(StaggerShared {
            plan,
            children: children
                .iter()
                .map(|child| Rc::downgrade(child.core()))
                .collect(),
            timers: RefCell::new(Vec::new()),
            scheduler,
        });

        let weak = Rc::downgrade(&shared);
        let parent_element = parent.element();
        parent.core().changes().subscribe(move |state| match weak.upgrade() {
            Some(shared) => shared.on_parent_change(*state),
            None => DetachedHandleWarning::emit("stagger group", Some(parent_element)),
        });

        Self {
            parent,
            children,
            shared,
        }
    }

    pub fn parent(&self) -> &RevealController {
        &self.parent
    }

    pub fn children(&self) -> &[RevealController] {
        &self.children
    }

    pub fn child(&self, index: usize) -> Option<&RevealController> {
        self.children.get(index)
    }

    pub fn plan(&self) -> &StaggerPlan {
        &self.shared.plan
    }

    /// Child timers scheduled but not yet fired
    pub fn pending_timers(&self) -> usize {
        self.shared.pending_timers()
    }

    pub fn dispose(&self) {
        self.shared.cancel();
        self.parent.dispose();
        for child in &self.children {
            child.dispose();
        }
    }
}

impl Drop for StaggerCoordinator {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for StaggerCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaggerCoordinator")
            .field("parent", &self.parent.element())
            .field("children", &self.children.len())
            .field("pending_timers", &self.pending_timers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unveil_animation::{FrameScheduler, Keyframe, Transition};
    use unveil_core::{DocumentLayout, Rect};

    use crate::variants::VariantRegistry;
    use crate::viewport::{ObserveOptions, ViewportObserver};

    const VIEWPORT: Rect = Rect::new(0.0, 0.0, 800.0, 600.0);

    fn handles(n: u64) -> Vec<ElementHandle> {
        (10..10 + n).map(ElementHandle::new).collect()
    }

    #[test]
    fn test_plan_delays() {
        let plan = StaggerPlan::new(handles(4), 200.0, 100.0).unwrap();
        let delays: Vec<f32> = plan.delays().map(|(_, d)| d).collect();
        assert_eq!(delays, vec![200.0, 300.0, 400.0, 500.0]);
    }

    #[test]
    fn test_plan_is_monotonic() {
        for (base, interval) in [(0.0, 0.0), (0.0, 50.0), (120.0, 10.0), (1000.0, 0.0)] {
            let plan = StaggerPlan::new(handles(8), base, interval).unwrap();
            let delays: Vec<f32> = plan.delays().map(|(_, d)| d).collect();
            assert!(delays.windows(2).all(|w| w[0] <= w[1]));
            assert_eq!(delays[0], base);
        }
    }

    #[test]
    fn test_negative_timing_rejected() {
        assert!(matches!(
            StaggerPlan::new(handles(2), -1.0, 100.0),
            Err(ConfigurationError::InvalidStagger(_))
        ));
        assert!(matches!(
            StaggerPlan::new(handles(2), 0.0, f32::NAN),
            Err(ConfigurationError::InvalidStagger(_))
        ));
    }

    struct Group {
        scheduler: FrameScheduler,
        observer: ViewportObserver,
        doc: DocumentLayout,
        group: StaggerCoordinator,
    }

    fn group(trigger_once: bool) -> Group {
        let scheduler = FrameScheduler::new();
        let observer = ViewportObserver::new();
        let parent_el = ElementHandle::new(1);
        let mut doc = DocumentLayout::new();
        doc.insert(parent_el, Rect::new(0.0, 1000.0, 800.0, 300.0));

        let container = Variant::new(
            "container",
            Keyframe::new(),
            Keyframe::new(),
            Transition::default(),
        )
        .unwrap();
        let parent = RevealController::observe(
            &observer,
            scheduler.handle(),
            parent_el,
            container,
            ObserveOptions::new(0.1, trigger_once),
        )
        .unwrap();

        let fade = VariantRegistry::standard()
            .variant("fadeUp")
            .unwrap()
            .clone();
        let children: Vec<(ElementHandle, Variant)> = handles(3)
            .into_iter()
            .map(|el| (el, fade.clone()))
            .collect();
        let plan = StaggerPlan::new(handles(3), 0.0, 100.0).unwrap();
        let group =
            StaggerCoordinator::new(parent, children, plan, scheduler.handle(), trigger_once);
        Group {
            scheduler,
            observer,
            doc,
            group,
        }
    }

    impl Group {
        fn frame(&self) {
            let time = self.scheduler.begin_frame(10.0);
            self.observer.resolve(VIEWPORT, &self.doc);
            self.scheduler.run_frame(time);
        }

        fn visible_children(&self) -> usize {
            self.group
                .children()
                .iter()
                .filter(|child| child.state() == VisibilityState::Visible)
                .count()
        }
    }

    #[test]
    fn test_children_start_in_order() {
        let mut g = group(true);
        g.doc.scroll_to(0.0, 600.0);
        g.frame();
        assert_eq!(g.visible_children(), 1);
        assert_eq!(g.group.pending_timers(), 2);

        for _ in 0..9 {
            g.frame();
        }
        assert_eq!(g.visible_children(), 1);
        g.frame();
        assert_eq!(g.visible_children(), 2);

        for _ in 0..10 {
            g.frame();
        }
        assert_eq!(g.visible_children(), 3);
        assert_eq!(g.group.pending_timers(), 0);
    }

    #[test]
    fn test_hiding_parent_reverses_children() {
        let mut g = group(false);
        g.doc.scroll_to(0.0, 600.0);
        g.frame();
        for _ in 0..10 {
            g.frame();
        }
        assert_eq!(g.visible_children(), 2);

        g.doc.scroll_to(0.0, 0.0);
        g.frame();
        assert_eq!(g.visible_children(), 0);
        assert_eq!(g.group.pending_timers(), 0);

        // The cancelled third child never starts
        for _ in 0..30 {
            g.frame();
        }
        assert_eq!(g.group.child(2).unwrap().transitions_fired(), 0);
        assert_eq!(g.group.child(0).unwrap().transitions_fired(), 2);
    }

    #[test]
    fn test_drop_cancels_timers() {
        let mut g = group(true);
        g.doc.scroll_to(0.0, 600.0);
        g.frame();
        assert!(g.scheduler.timeout_count() > 0);

        let Group {
            scheduler,
            observer,
            group,
            ..
        } = g;
        drop(group);
        assert_eq!(scheduler.timeout_count(), 0);
        assert!(observer.is_empty());
    }
}
