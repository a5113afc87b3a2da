//! Word-by-word text reveals
//!
//! Text is split on whitespace and each word fades and rises into place,
//! word `i` starting `i * word_delay` after the reveal begins. Words keep
//! their order; the reveal can wait for an element to scroll into view.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use unveil_animation::{
    Easing, Emitter, FrameControl, Keyframe, SchedulerHandle, Subscription, Transition,
    TransitionPlayer,
};
use unveil_core::{ConfigurationError, DetachedHandleWarning, Result};

use crate::viewport::{Observation, ViewTrigger, ViewportObserver};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextRevealOptions {
    /// Gap between consecutive word starts
    pub word_delay_ms: f32,
    /// Per-word transition; its delay is added before the word delay
    pub transition: Transition,
    /// How far below its resting place a hidden word sits
    pub rise_px: f32,
    pub trigger: Option<ViewTrigger>,
}

impl TextRevealOptions {
    pub fn new(word_delay_ms: f32) -> Self {
        Self {
            word_delay_ms,
            ..Self::default()
        }
    }

    pub fn trigger(mut self, trigger: ViewTrigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.word_delay_ms.is_finite() || self.word_delay_ms < 0.0 {
            return Err(ConfigurationError::InvalidDuration(format!(
                "word delay must be a finite, non-negative number of milliseconds (got {})",
                self.word_delay_ms
            )));
        }
        if !self.rise_px.is_finite() {
            return Err(ConfigurationError::InvalidConfig(format!(
                "word rise must be finite (got {})",
                self.rise_px
            )));
        }
        self.transition.validate()
    }

    pub fn hidden(&self) -> Keyframe {
        Keyframe::new().opacity(0.0).y(self.rise_px)
    }

    pub fn visible(&self) -> Keyframe {
        Keyframe::new().opacity(1.0).y(0.0)
    }

    /// Start delay of word `index`, counted from the start of the reveal
    pub fn delay(&self, index: usize) -> f32 {
        index as f32 * self.word_delay_ms
    }

    fn player(&self, slot: usize) -> TransitionPlayer {
        let transition = self
            .transition
            .with_delay(self.transition.delay_ms() + self.delay(slot));
        TransitionPlayer::new(self.hidden(), self.visible(), transition)
    }
}

impl Default for TextRevealOptions {
    fn default() -> Self {
        Self {
            word_delay_ms: 100.0,
            transition: Transition::timed(500.0, Easing::SMOOTH_OUT),
            rise_px: 20.0,
            trigger: None,
        }
    }
}

/// One word and its current frame
#[derive(Clone, Debug, PartialEq)]
pub struct WordFrame {
    pub index: usize,
    pub text: String,
    pub keyframe: Keyframe,
    pub revealed: bool,
}

struct Word {
    text: String,
    player: TransitionPlayer,
}

impl Word {
    fn frame(&self, index: usize) -> WordFrame {
        WordFrame {
            index,
            text: self.text.clone(),
            keyframe: self.player.current().clone(),
            revealed: self.player.is_finished(),
        }
    }
}

struct TextState {
    options: TextRevealOptions,
    words: Vec<Word>,
    armed: bool,
    frame: Option<Subscription>,
}

impl TextState {
    fn is_finished(&self) -> bool {
        self.words.iter().all(|word| word.player.is_finished())
    }

    fn frames(&self) -> Vec<WordFrame> {
        self.words
            .iter()
            .enumerate()
            .map(|(index, word)| word.frame(index))
            .collect()
    }
}

struct TextShared {
    scheduler: SchedulerHandle,
    state: RefCell<TextState>,
    frames: Emitter<Vec<WordFrame>>,
}

impl TextShared {
    fn arm(self: &Rc<Self>) {
        let mut state = self.state.borrow_mut();
        state.armed = true;
        if state.is_finished() {
            return;
        }
        if !state.frame.as_ref().is_some_and(Subscription::is_active) {
            state.frame = Some(self.schedule_frames());
        }
    }

    fn schedule_frames(self: &Rc<Self>) -> Subscription {
        let weak: Weak<Self> = Rc::downgrade(self);
        self.scheduler.request_frame(move |time| match weak.upgrade() {
            Some(shared) => shared.advance(time.dt_ms),
            None => {
                DetachedHandleWarning::emit("text reveal", None);
                FrameControl::Stop
            }
        })
    }

    fn advance(&self, dt_ms: f32) -> FrameControl {
        let (frames, finished) = {
            let mut state = self.state.borrow_mut();
            for word in state.words.iter_mut() {
                word.player.advance(dt_ms);
            }
            let finished = state.is_finished();
            if finished {
                state.frame = None;
            }
            (state.frames(), finished)
        };
        self.frames.emit(&frames);
        if finished {
            FrameControl::Stop
        } else {
            FrameControl::Continue
        }
    }

    fn cancel(&self) {
        let frame = self.state.borrow_mut().frame.take();
        drop(frame);
    }
}

/// Starts text reveals against one observer and scheduler
#[derive(Clone, Debug)]
pub struct SequencedTextRevealer {
    observer: ViewportObserver,
    scheduler: SchedulerHandle,
    defaults: TextRevealOptions,
}

impl SequencedTextRevealer {
    pub fn new(
        observer: ViewportObserver,
        scheduler: SchedulerHandle,
        defaults: TextRevealOptions,
    ) -> Self {
        Self {
            observer,
            scheduler,
            defaults,
        }
    }

    /// Reveal `text` immediately with the given word delay
    pub fn reveal(&self, text: &str, word_delay_ms: f32) -> Result<PerWordStream> {
        self.reveal_with(text, TextRevealOptions {
            word_delay_ms,
            ..self.defaults
        })
    }

    pub fn reveal_with(&self, text: &str, options: TextRevealOptions) -> Result<PerWordStream> {
        options.validate()?;
        let words: Vec<Word> = text
            .split_whitespace()
            .enumerate()
            .map(|(index, token)| Word {
                text: token.to_string(),
                player: options.player(index),
            })
            .collect();
        let word_count = words.len();

        let shared = Rc::new(TextShared {
            scheduler: self.scheduler.clone(),
            state: RefCell::new(TextState {
                options,
                words,
                armed: false,
                frame: None,
            }),
            frames: Emitter::new(),
        });

        let observation = match options.trigger {
            Some(trigger) => {
                let element = trigger.element;
                let on_visible = Rc::downgrade(&shared);
                let on_detached = Weak::clone(&on_visible);
                Some(trigger.arm(
                    &self.observer,
                    move || match on_visible.upgrade() {
                        Some(shared) => shared.arm(),
                        None => DetachedHandleWarning::emit("text trigger", Some(element)),
                    },
                    move || {
                        if let Some(shared) = on_detached.upgrade() {
                            shared.cancel();
                        }
                    },
                )?)
            }
            None => {
                shared.arm();
                None
            }
        };

        tracing::debug!(words = word_count, "text reveal created");
        Ok(PerWordStream {
            shared,
            observation,
        })
    }
}

/// Handle to one word-by-word reveal
pub struct PerWordStream {
    shared: Rc<TextShared>,
    observation: Option<Observation>,
}

impl PerWordStream {
    /// Current frame of every word, in text order
    pub fn words(&self) -> Vec<WordFrame> {
        self.shared.state.borrow().frames()
    }

    pub fn word_count(&self) -> usize {
        self.shared.state.borrow().words.len()
    }

    /// Words joined by single spaces
    pub fn text(&self) -> String {
        let state = self.shared.state.borrow();
        let words: Vec<&str> = state.words.iter().map(|word| word.text.as_str()).collect();
        words.join(" ")
    }

    pub fn is_started(&self) -> bool {
        self.shared.state.borrow().armed
    }

    /// Every word has reached its visible keyframe
    pub fn is_finished(&self) -> bool {
        self.shared.state.borrow().is_finished()
    }

    /// All word frames, once per animated frame
    pub fn frames(&self) -> &Emitter<Vec<WordFrame>> {
        &self.shared.frames
    }

    /// Replace the text
    ///
    /// Words shared with the old text's leading run keep their progress.
    /// New words follow in order, timed from now if the reveal has started.
    pub fn set_text(&self, text: &str) {
        let armed = {
            let mut state = self.shared.state.borrow_mut();
            let tokens: Vec<&str> = text.split_whitespace().collect();
            let kept = state
                .words
                .iter()
                .zip(&tokens)
                .take_while(|(word, token)| word.text == **token)
                .count();
            let options = state.options;
            let armed = state.armed;

            state.words.truncate(kept);
            for (index, token) in tokens.iter().enumerate().skip(kept) {
                let slot = if armed { index - kept } else { index };
                state.words.push(Word {
                    text: token.to_string(),
                    player: options.player(slot),
                });
            }
            tracing::trace!(kept, total = tokens.len(), "text replaced");
            armed
        };
        if armed {
            self.shared.arm();
        }
    }

    pub fn dispose(&self) {
        if let Some(observation) = &self.observation {
            observation.dispose();
        }
        self.shared.cancel();
        self.shared.frames.clear();
    }
}

impl Drop for PerWordStream {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for PerWordStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerWordStream")
            .field("words", &self.word_count())
            .field("started", &self.is_started())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unveil_animation::{FrameScheduler, Property};
    use unveil_core::{DocumentLayout, ElementHandle, Rect};

    fn revealer(scheduler: &FrameScheduler, observer: &ViewportObserver) -> SequencedTextRevealer {
        let defaults = TextRevealOptions {
            transition: Transition::timed(100.0, Easing::Linear),
            ..TextRevealOptions::default()
        };
        SequencedTextRevealer::new(observer.clone(), scheduler.handle(), defaults)
    }

    fn opacities(stream: &PerWordStream) -> Vec<f32> {
        stream
            .words()
            .iter()
            .map(|word| word.keyframe.resolve(Property::Opacity))
            .collect()
    }

    #[test]
    fn test_tokenizes_on_whitespace() {
        let scheduler = FrameScheduler::new();
        let observer = ViewportObserver::new();
        let stream = revealer(&scheduler, &observer)
            .reveal("  Build   something\tremarkable\n", 50.0)
            .unwrap();
        assert_eq!(stream.word_count(), 3);
        assert_eq!(stream.text(), "Build something remarkable");
        assert_eq!(opacities(&stream), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_words_start_in_order() {
        let scheduler = FrameScheduler::new();
        let observer = ViewportObserver::new();
        let stream = revealer(&scheduler, &observer)
            .reveal("one two three", 100.0)
            .unwrap();

        scheduler.tick(50.0);
        assert_eq!(opacities(&stream), vec![0.5, 0.0, 0.0]);
        scheduler.tick(100.0);
        assert_eq!(opacities(&stream), vec![1.0, 0.5, 0.0]);
        scheduler.tick(100.0);
        scheduler.tick(100.0);
        assert!(stream.is_finished());
        assert!(stream.words().iter().all(|word| word.revealed));
        assert!(!scheduler.has_pending_work());
    }

    #[test]
    fn test_empty_text_is_finished() {
        let scheduler = FrameScheduler::new();
        let observer = ViewportObserver::new();
        let stream = revealer(&scheduler, &observer)
            .reveal("   ", 100.0)
            .unwrap();
        assert_eq!(stream.word_count(), 0);
        assert!(stream.is_finished());
        assert!(!scheduler.has_pending_work());
    }

    #[test]
    fn test_negative_word_delay_rejected() {
        let scheduler = FrameScheduler::new();
        let observer = ViewportObserver::new();
        assert!(revealer(&scheduler, &observer).reveal("a b", -1.0).is_err());
    }

    #[test]
    fn test_set_text_keeps_shared_prefix() {
        let scheduler = FrameScheduler::new();
        let observer = ViewportObserver::new();
        let stream = revealer(&scheduler, &observer)
            .reveal("hello brave world", 0.0)
            .unwrap();
        for _ in 0..10 {
            scheduler.tick(16.0);
        }
        assert!(stream.is_finished());

        stream.set_text("hello brave new world");
        let words = stream.words();
        assert!(words[0].revealed && words[1].revealed);
        assert!(!words[2].revealed && !words[3].revealed);
        assert_eq!(stream.text(), "hello brave new world");

        for _ in 0..10 {
            scheduler.tick(16.0);
        }
        assert!(stream.is_finished());
    }

    #[test]
    fn test_dispose_twice_is_harmless() {
        let scheduler = FrameScheduler::new();
        let observer = ViewportObserver::new();
        let heading = ElementHandle::new(4);
        let stream = revealer(&scheduler, &observer)
            .reveal_with(
                "stay hidden",
                TextRevealOptions::new(50.0).trigger(ViewTrigger::new(heading)),
            )
            .unwrap();

        stream.dispose();
        stream.dispose();
        assert!(observer.is_empty());
        assert!(!scheduler.has_pending_work());
        assert!(stream.frames().is_empty());

        let mut doc = DocumentLayout::new();
        doc.insert(heading, Rect::new(0.0, 0.0, 300.0, 40.0));
        let time = scheduler.begin_frame(16.0);
        observer.resolve(Rect::new(0.0, 0.0, 800.0, 600.0), &doc);
        scheduler.run_frame(time);
        assert!(!stream.is_started());
        assert_eq!(opacities(&stream), vec![0.0, 0.0]);
        drop(stream);
    }

    #[test]
    fn test_trigger_waits_for_visibility() {
        let scheduler = FrameScheduler::new();
        let observer = ViewportObserver::new();
        let heading = ElementHandle::new(9);
        let mut doc = DocumentLayout::new();
        doc.insert(heading, Rect::new(0.0, 700.0, 600.0, 80.0));
        let viewport = Rect::new(0.0, 0.0, 800.0, 600.0);

        let options = TextRevealOptions {
            transition: Transition::timed(100.0, Easing::Linear),
            ..TextRevealOptions::new(0.0).trigger(ViewTrigger::new(heading))
        };
        let stream = revealer(&scheduler, &observer)
            .reveal_with("above the fold", options)
            .unwrap();

        let frame = |doc: &DocumentLayout| {
            let time = scheduler.begin_frame(16.0);
            observer.resolve(viewport, doc);
            scheduler.run_frame(time);
        };
        for _ in 0..5 {
            frame(&doc);
        }
        assert!(!stream.is_started());
        assert_eq!(opacities(&stream), vec![0.0, 0.0, 0.0]);

        doc.scroll_to(0.0, 200.0);
        for _ in 0..10 {
            frame(&doc);
        }
        assert!(stream.is_finished());
    }
}
