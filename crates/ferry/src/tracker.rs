use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;

const PB_STYLE: &str = "{spinner:.blue} {msg:<24} [{elapsed_precise}] {wide_bar:.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";

const TICK: &str = "⠁⠂⠄⡀⢀⠠⠐⠈ ";

const PB_CHARS: &str = "█▓▒░  ";

static PB_TEMPLATE: Lazy<Option<ProgressStyle>> = Lazy::new(|| {
    let pb_style = match ProgressStyle::with_template(PB_STYLE) {
        Ok(pb_style) => pb_style.tick_chars(TICK).progress_chars(PB_CHARS),
        Err(_) => return None,
    };

    Some(pb_style)
});

/// One progress bar per transfer, driven from the transfer callbacks.
#[derive(Debug, Clone)]
pub struct TransferTracker {
    pb: ProgressBar,
}

impl TransferTracker {
    pub fn new(multi: &MultiProgress, label: impl Into<String>) -> Self {
        let pb = multi.add(ProgressBar::no_length());
        if let Some(style) = PB_TEMPLATE.as_ref() {
            pb.set_style(style.clone());
        }
        pb.set_message(label.into());
        TransferTracker { pb }
    }

    /// `total` of 0 means the size is unknown.
    pub fn update(&self, bytes: u64, total: u64) {
        if total > 0 && self.pb.length() != Some(total) {
            self.pb.set_length(total);
        }
        self.pb.set_position(bytes);
    }

    pub fn finish(&self, msg: impl Into<String>) {
        self.pb.finish_with_message(msg.into());
    }

    pub fn fail(&self, msg: impl Into<String>) {
        self.pb.abandon_with_message(msg.into());
    }
}
