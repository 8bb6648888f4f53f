use parking_lot::Mutex;

/// Receives text produced by `PRINT`.
pub trait OutputSink: Send + Sync {
    fn write(&self, text: &str);
}

impl<F> OutputSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn write(&self, text: &str) {
        self(text)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn write(&self, text: &str) {
        println!("{text}");
    }
}

/// Keeps every printed line in memory.
#[derive(Debug, Default)]
pub struct BufferSink {
    lines: Mutex<Vec<String>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock())
    }
}

impl OutputSink for BufferSink {
    fn write(&self, text: &str) {
        self.lines.lock().push(text.to_string());
    }
}
