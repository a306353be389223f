use log::LevelFilter;

pub use crate::traits::Progress;

impl Progress for indicatif::ProgressBar {
    fn inc(&self, i: u64) {
        indicatif::ProgressBar::inc(self, i)
    }

    fn finish(&self) {
        indicatif::ProgressBar::finish(self)
    }
}

impl Progress for logbar::ProgressBar {
    fn inc(&self, i: u64) {
        logbar::ProgressBar::inc(self, i as usize)
    }

    fn finish(&self) {
        logbar::ProgressBar::finish(self)
    }
}

/// Dummy progress indicator
pub struct NoProgress {}
impl Progress for NoProgress {
    fn inc(&self, _i: u64) {}

    fn finish(&self) {}
}

/// Don't show any progress indicator
pub const NO_PROGRESS: NoProgress = NoProgress {};

/// Progress over the digitised events
///
/// On an interactive terminal this is an `indicatif` bar, otherwise a
/// `logbar`. A bar is only shown at the default `info` log level, and
/// logging is switched off until the bar is finished. If the number
/// of events is not known in advance, terminals get a spinner and
/// other outputs no indicator at all.
pub struct ProgressBar {
    bar: Box<dyn Progress>,
    restore_level: Option<LevelFilter>,
}

impl Default for ProgressBar {
    fn default() -> Self {
        Self {
            bar: Box::new(NO_PROGRESS),
            restore_level: None,
        }
    }
}

impl Progress for ProgressBar {
    fn inc(&self, i: u64) {
        self.bar.inc(i);
    }

    fn finish(&self) {
        self.bar.finish();
        if let Some(level) = self.restore_level {
            log::set_max_level(level);
        }
    }
}

impl ProgressBar {
    /// A new progress indicator for `len` events, if known
    pub fn new(len: Option<u64>, message: &str) -> Self {
        if log::max_level() != LevelFilter::Info {
            return ProgressBar::default();
        }
        let attended = console::Term::stderr().features().is_attended();
        match (len, attended) {
            (Some(len), true) => ProgressBar::indicatif(len, message),
            (None, true) => ProgressBar::spinner(message),
            (Some(len), false) => ProgressBar::logbar(len, message),
            (None, false) => ProgressBar::default(),
        }
    }

    fn indicatif(len: u64, message: &str) -> Self {
        let bar = indicatif::ProgressBar::new(len);
        bar.set_style(
            indicatif::ProgressStyle::default_bar()
                .template("{bar:60.cyan/cyan} {msg} {pos}/{len} [{elapsed}]")
                .unwrap(),
        );
        bar.set_message(message.to_owned());
        Self::silencing(Box::new(bar))
    }

    fn spinner(message: &str) -> Self {
        let bar = indicatif::ProgressBar::new_spinner();
        bar.set_style(
            indicatif::ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg} {pos} [{elapsed}]")
                .unwrap(),
        );
        bar.set_message(message.to_owned());
        Self::silencing(Box::new(bar))
    }

    fn logbar(len: u64, message: &str) -> Self {
        let style = logbar::Style::new().indicator('█');
        eprintln!("{}", message);
        let bar = logbar::ProgressBar::with_style(len as usize, style);
        Self::silencing(Box::new(bar))
    }

    // logging would overwrite the bar
    fn silencing(bar: Box<dyn Progress>) -> Self {
        let level = log::max_level();
        log::set_max_level(LevelFilter::Off);
        Self {
            bar,
            restore_level: Some(level),
        }
    }
}
