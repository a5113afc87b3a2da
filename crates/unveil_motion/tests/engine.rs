//! End-to-end scenarios driving the engine the way a host page would

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing_subscriber::EnvFilter;
use unveil_animation::{Easing, Keyframe, Property, Transition};
use unveil_core::{DocumentLayout, ElementHandle, Rect};
use unveil_motion::{
    CounterOptions, EngineConfig, MotionEngine, ObserveOptions, ObserverEvent, RevealOptions,
    StaggerChild, StaggerOptions, TextRevealOptions, ViewTrigger, VisibilityState,
};

const VIEWPORT: Rect = Rect::new(0.0, 0.0, 1280.0, 720.0);
const FRAME_MS: f32 = 1000.0 / 60.0;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Page {
    engine: MotionEngine,
    layout: DocumentLayout,
}

impl Page {
    fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    fn with_config(config: EngineConfig) -> Self {
        init_tracing();
        Self {
            engine: MotionEngine::new(config).unwrap(),
            layout: DocumentLayout::new(),
        }
    }

    fn place(&mut self, id: u64, y: f32, height: f32) -> ElementHandle {
        let element = ElementHandle::new(id);
        let rect = Rect::new(0.0, y, 600.0, height);
        self.layout.insert(element, rect);
        element
    }

    fn frame(&self) -> bool {
        let report = self.engine.frame(FRAME_MS, VIEWPORT, &self.layout);
        report.pending_work
    }

    fn frames(&self, n: usize) {
        for _ in 0..n {
            self.frame();
        }
    }

    fn settle(&self) {
        let mut guard = 0;
        while self.frame() {
            guard += 1;
            assert!(guard < 10_000, "animations never settled");
        }
    }

    fn scroll_to(&mut self, y: f32) {
        self.layout.scroll_to(0.0, y);
    }
}

#[test]
fn one_shot_reveal_ignores_later_scrolling() {
    let mut page = Page::new();
    // 100px tall, 1000px down the page
    let card = page.place(1, 1000.0, 100.0);
    let options = RevealOptions::new().threshold(0.1).trigger_once(true);
    let reveal = page.engine.reveal(card, "fadeUp", options).unwrap();

    page.frames(5);
    assert_eq!(reveal.transitions_fired(), 0);

    // 15% of the card on screen
    page.scroll_to(1000.0 - 720.0 + 15.0);
    page.frame();
    assert_eq!(reveal.transitions_fired(), 1);
    page.settle();
    assert_eq!(reveal.keyframe(), Keyframe::new().opacity(1.0).y(0.0));

    page.scroll_to(0.0);
    page.frames(10);
    page.scroll_to(900.0);
    page.frames(10);

    assert_eq!(reveal.transitions_fired(), 1);
    assert_eq!(reveal.state(), VisibilityState::Visible);
    assert_eq!(reveal.keyframe(), Keyframe::new().opacity(1.0).y(0.0));
}

#[test]
fn repeatable_reveal_reverses_without_jumping() {
    let mut page = Page::new();
    let card = page.place(1, 1000.0, 100.0);
    let reveal = page
        .engine
        .reveal(card, "scale", RevealOptions::new().trigger_once(false))
        .unwrap();

    let frames = Rc::new(RefCell::new(Vec::<f32>::new()));
    let sink = Rc::clone(&frames);
    reveal.frames().subscribe(move |keyframe| {
        let opacity = keyframe.resolve(Property::Opacity);
        sink.borrow_mut().push(opacity);
    });

    page.scroll_to(600.0);
    page.frames(12);
    page.scroll_to(0.0);
    page.settle();

    let frames = frames.borrow();
    let peak = frames.iter().cloned().fold(0.0_f32, f32::max);
    assert!(
        peak > 0.0 && peak < 1.0,
        "reversed before finishing: peak {peak}"
    );
    for pair in frames.windows(2) {
        let step = (pair[1] - pair[0]).abs();
        assert!(step < 0.25, "jump between {} and {}", pair[0], pair[1]);
    }
    assert_eq!(*frames.last().unwrap(), 0.0);
    assert_eq!(reveal.transitions_fired(), 2);
}

#[test]
fn signals_resolve_before_transition_callbacks() {
    let mut page = Page::new();
    let log = Rc::new(RefCell::new(Vec::<String>::new()));

    let mut reveals = Vec::new();
    let mut observations = Vec::new();
    for id in 1..=3 {
        let element = page.place(id, 800.0 + id as f32 * 50.0, 40.0);
        let reveal = page
            .engine
            .reveal(element, "blur", RevealOptions::default())
            .unwrap();
        let sink = Rc::clone(&log);
        reveal.transitions().subscribe(move |t| {
            sink.borrow_mut().push(format!("start {}", t.element));
        });
        reveals.push(reveal);

        let sink = Rc::clone(&log);
        let observation = page
            .engine
            .observer()
            .observe(element, ObserveOptions::new(0.1, true), move |event| {
                if let ObserverEvent::Visibility(VisibilityState::Visible) = event {
                    sink.borrow_mut().push(format!("signal {element}"));
                }
            })
            .unwrap();
        observations.push(observation);
    }

    page.frame();
    assert!(log.borrow().is_empty());

    page.scroll_to(400.0);
    page.frame();

    let log = log.borrow();
    assert_eq!(log.len(), 6);
    let last_signal = log.iter().rposition(|e| e.starts_with("signal")).unwrap();
    let first_start = log.iter().position(|e| e.starts_with("start")).unwrap();
    assert!(last_signal < first_start, "{log:?}");
}

#[test]
fn stagger_children_start_in_list_order() {
    let mut page = Page::new();
    let list = page.place(1, 900.0, 400.0);
    let items: Vec<ElementHandle> = (0..4)
        .map(|i| page.place(10 + i, 900.0 + i as f32 * 100.0, 80.0))
        .collect();

    let started = Rc::new(RefCell::new(Vec::<(ElementHandle, u64)>::new()));
    let children = items
        .iter()
        .map(|el| StaggerChild::new(*el, "fadeUp"))
        .collect();
    let group = page
        .engine
        .stagger_group(list, children, StaggerOptions::new(50.0, 100.0))
        .unwrap();

    let frame_no = Rc::new(Cell::new(0u64));
    for child in group.children() {
        let sink = Rc::clone(&started);
        let frame_no = Rc::clone(&frame_no);
        child.transitions().subscribe(move |t| {
            sink.borrow_mut().push((t.element, frame_no.get()));
        });
    }

    page.scroll_to(500.0);
    for n in 1..=60 {
        frame_no.set(n);
        page.frame();
    }

    let started = started.borrow();
    let order: Vec<ElementHandle> = started.iter().map(|(el, _)| *el).collect();
    assert_eq!(order, items);
    assert!(started.windows(2).all(|w| w[0].1 < w[1].1));

    let plan: Vec<f32> = group.plan().delays().map(|(_, d)| d).collect();
    assert_eq!(plan, vec![50.0, 150.0, 250.0, 350.0]);
}

#[test]
fn parallax_follows_scroll_smoothly() {
    let mut page = Page::new();
    let hero = page.place(1, 720.0, 360.0);
    let stream = page.engine.parallax(hero, -0.5);

    page.frame();
    assert_eq!(stream.progress(), Some(0.0));
    assert_eq!(stream.offset().y, 0.0);

    // Halfway through: progress (720 - 180) / 1080 = 0.5
    page.scroll_to(540.0);
    page.frame();
    assert_eq!(stream.target(), Some(-25.0));
    let first = stream.offset().y;
    assert!(
        first < 0.0 && first > -25.0,
        "spring must lag the target: {first}"
    );

    page.frames(240);
    assert!((stream.offset().y + 25.0).abs() < 0.05);

    drop(stream);
    assert!(!page.engine.has_pending_work());
}

#[test]
fn counter_starts_when_stat_scrolls_into_view() {
    let mut page = Page::new();
    let stat = page.place(5, 1500.0, 120.0);
    let counter = page
        .engine
        .animate_counter(
            0.0,
            12500.0,
            1500.0,
            CounterOptions::new()
                .suffix("+")
                .separator(',')
                .trigger(ViewTrigger::new(stat)),
        )
        .unwrap();

    let completed = Rc::new(Cell::new(0));
    let sink = Rc::clone(&completed);
    counter
        .completions()
        .subscribe(move |_| sink.set(sink.get() + 1));

    page.frames(30);
    assert!(!counter.is_started());
    assert_eq!(counter.display(), "0+");

    page.scroll_to(1000.0);
    page.frame();
    let early = counter.value();
    assert!(early > 0.0 && early < 12500.0);

    page.settle();
    assert_eq!(counter.value(), 12500.0);
    assert_eq!(counter.display(), "12,500+");
    assert_eq!(completed.get(), 1);
}

#[test]
fn headline_reveals_word_by_word() {
    let page = Page::new();
    let options = TextRevealOptions {
        transition: Transition::timed(200.0, Easing::EaseOut),
        ..TextRevealOptions::new(80.0)
    };
    let headline = page
        .engine
        .reveal_text_with("Design that moves people", options)
        .unwrap();
    assert_eq!(headline.word_count(), 4);

    page.frames(10);
    let words = headline.words();
    let opacity = |i: usize| words[i].keyframe.resolve(Property::Opacity);
    assert!(opacity(0) > opacity(1));
    assert!(opacity(1) > opacity(2));
    assert_eq!(opacity(3), 0.0);

    page.settle();
    assert!(headline.is_finished());
    assert!(headline
        .words()
        .iter()
        .all(|w| w.keyframe == Keyframe::new().opacity(1.0).y(0.0)));
}

#[test]
fn tall_section_still_reveals() {
    let mut page = Page::new();
    let section = page.place(1, 800.0, 3000.0);
    let reveal = page
        .engine
        .reveal(section, "fadeIn-typo", RevealOptions::new().threshold(0.5))
        .unwrap();
    // Unknown variant name falls back
    assert_eq!(reveal.variant_name(), "fadeUp");

    page.scroll_to(1200.0);
    page.frame();
    assert_eq!(reveal.state(), VisibilityState::Visible);
}

#[test]
fn engine_from_toml_config() {
    let config = EngineConfig::from_toml_str(
        r#"
        [reveal]
        threshold = 0.5
        trigger_once = false

        [text]
        word_delay_ms = 10.0
        "#,
    )
    .unwrap();
    let mut page = Page::with_config(config);
    let card = page.place(1, 1000.0, 100.0);
    let reveal = page
        .engine
        .reveal(card, "flip", RevealOptions::default())
        .unwrap();

    // 30% visible: below the configured threshold
    page.scroll_to(1000.0 - 720.0 + 30.0);
    page.frame();
    assert_eq!(reveal.state(), VisibilityState::Hidden);

    page.scroll_to(1000.0 - 720.0 + 60.0);
    page.frame();
    assert_eq!(reveal.state(), VisibilityState::Visible);
}

#[test]
fn dropping_everything_mid_flight_is_clean() {
    let mut page = Page::new();
    let card = page.place(1, 800.0, 100.0);
    let list = page.place(2, 900.0, 300.0);
    let item = page.place(3, 950.0, 50.0);

    let reveal = page
        .engine
        .reveal(card, "bounce", RevealOptions::default())
        .unwrap();
    let children = vec![StaggerChild::new(item, "zoomIn")];
    let group = page
        .engine
        .stagger_group(list, children, StaggerOptions::new(500.0, 0.0))
        .unwrap();
    let stream = page.engine.parallax(card, 0.3);
    let counter = page
        .engine
        .animate_counter(0.0, 10.0, 5000.0, CounterOptions::new())
        .unwrap();
    let text = page.engine.reveal_text("still loading").unwrap();

    page.scroll_to(400.0);
    page.frames(3);
    assert!(page.engine.has_pending_work());

    drop((reveal, group, stream, counter, text));
    assert!(!page.engine.has_pending_work());
    assert!(page.engine.observer().is_empty());
    page.frames(3);
}

#[test]
fn element_removed_mid_transition() {
    let mut page = Page::new();
    let card = page.place(1, 800.0, 100.0);
    let reveal = page
        .engine
        .reveal(card, "slideUp", RevealOptions::default())
        .unwrap();

    page.scroll_to(400.0);
    page.frames(5);
    assert!(reveal.is_animating());
    let frozen = reveal.keyframe();

    page.layout.remove(card);
    page.frames(5);
    assert!(!reveal.is_animating());
    assert_eq!(reveal.keyframe(), frozen);
    assert!(!page.engine.has_pending_work());

    // Back in the layout: the cut-short transition finishes from where it froze
    page.place(1, 800.0, 100.0);
    page.frame();
    assert!(reveal.is_animating());
    page.settle();
    let slide_up = page.engine.registry().variant("slideUp").unwrap();
    assert_eq!(reveal.keyframe(), *slide_up.visible());
    assert_eq!(reveal.transitions_fired(), 1);
}
