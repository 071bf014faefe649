//! Output sinks and the swappable writer stack.
//!
//! `write` forwards a value to whichever sink the resolver reports as
//! active, asking once per call. `WriterStack` is the usual resolver: a
//! stack of sinks over a fallback stream, with `grab` capturing everything
//! written while a closure runs.

use std::io;
use std::mem;
use std::sync::{Arc, Mutex, PoisonError};

use tools::utf8::LossyDecoder;

use crate::error::{LookupError, Result};
use crate::value::{Stringified, Value};

pub type SharedSink = Arc<Mutex<dyn Sink>>;

pub trait Sink: Send {
    fn write(&mut self, value: &Value) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Reports the currently active sink.
pub trait SinkResolver {
    fn current_sink(&self) -> Option<SharedSink>;
}

impl<F> SinkResolver for F
where
    F: Fn() -> Option<SharedSink>,
{
    fn current_sink(&self) -> Option<SharedSink> {
        self()
    }
}

pub fn shared(sink: impl Sink + 'static) -> SharedSink {
    Arc::new(Mutex::new(sink))
}

/// Forward `value` to the resolver's active sink.
pub fn write(resolver: &(impl SinkResolver + ?Sized), value: impl Into<Value>) -> Result<()> {
    let sink = resolver.current_sink().ok_or(LookupError::NoActiveSink)?;
    let value = value.into();
    log::trace!(target: "markup.writer", "write {}", value.type_name());
    let mut sink = sink.lock().unwrap_or_else(PoisonError::into_inner);
    sink.write(&value)
}

/// Plain content of a value as written to a stream: strings verbatim,
/// everything else stringified without escaping.
fn plain_bytes(value: &Value) -> Result<Vec<u8>> {
    Ok(match value.clone().stringify()? {
        Stringified::Text(s) => s.into_bytes(),
        Stringified::Bytes(b) => b,
        Stringified::SafeText(t) => t.into_string().into_bytes(),
        Stringified::SafeBytes(b) => b.into_bytes(),
    })
}

/// Renders values onto a byte stream.
#[derive(Debug)]
pub struct StreamSink<W> {
    inner: W,
}

impl<W: io::Write + Send> StreamSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: io::Write + Send> Sink for StreamSink<W> {
    fn write(&mut self, value: &Value) -> Result<()> {
        self.inner.write_all(&plain_bytes(value)?)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

/// Keeps every written value as-is.
#[derive(Debug, Default)]
pub struct CaptureSink {
    chunks: Vec<Value>,
}

impl CaptureSink {
    pub fn chunks(&self) -> &[Value] {
        &self.chunks
    }

    pub fn take(&mut self) -> Vec<Value> {
        mem::take(&mut self.chunks)
    }
}

impl Sink for CaptureSink {
    fn write(&mut self, value: &Value) -> Result<()> {
        self.chunks.push(value.clone());
        Ok(())
    }
}

/// Renders values into a `String`. Byte chunks are decoded lossily, and a
/// sequence split across two byte writes is still decoded as one.
#[derive(Debug, Default)]
pub struct StringSink {
    out: String,
    decoder: LossyDecoder,
}

impl StringSink {
    pub fn as_str(&self) -> &str {
        &self.out
    }

    /// Flushes any incomplete trailing sequence as a replacement character.
    pub fn finish(mut self) -> String {
        self.decoder.finish(&mut self.out);
        self.out
    }
}

impl Sink for StringSink {
    fn write(&mut self, value: &Value) -> Result<()> {
        match value.clone().stringify()? {
            Stringified::Bytes(b) => self.decoder.push(&mut self.out, &b),
            Stringified::SafeBytes(b) => self.decoder.push(&mut self.out, b.as_bytes()),
            Stringified::Text(s) => {
                self.decoder.finish(&mut self.out);
                self.out.push_str(&s);
            }
            Stringified::SafeText(t) => {
                self.decoder.finish(&mut self.out);
                self.out.push_str(t.as_str());
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Fallback {
    #[default]
    Stdout,
    Stderr,
    /// No base sink: writes with an empty stack fail.
    None,
}

/// Configuration for [`WriterStack`].
#[derive(Clone, Debug, Default)]
pub struct WriterStackConfig {
    /// Sink at the bottom of the stack; never popped.
    pub fallback: Fallback,
}

/// Values written while a [`WriterStack::grab`] closure ran, plus its result.
#[derive(Debug)]
pub struct Grabbed<R> {
    pub chunks: Vec<Value>,
    pub result: R,
}

pub struct WriterStack {
    sinks: Mutex<Vec<SharedSink>>,
    floor: usize,
}

impl WriterStack {
    pub fn new(config: WriterStackConfig) -> Self {
        let base: Option<SharedSink> = match config.fallback {
            Fallback::Stdout => Some(shared(StreamSink::new(io::stdout()))),
            Fallback::Stderr => Some(shared(StreamSink::new(io::stderr()))),
            Fallback::None => None,
        };
        let sinks: Vec<SharedSink> = base.into_iter().collect();
        let floor = sinks.len();
        Self {
            sinks: Mutex::new(sinks),
            floor,
        }
    }

    pub fn push(&self, sink: SharedSink) {
        let mut sinks = self.lock();
        sinks.push(sink);
        log::trace!(target: "markup.writer", "push: depth {}", sinks.len());
    }

    /// Pop the innermost sink. The fallback sink is never removed.
    pub fn pop(&self) -> Option<SharedSink> {
        let mut sinks = self.lock();
        if sinks.len() <= self.floor {
            log::warn!(target: "markup.writer", "pop on a stack holding only its fallback sink");
            return None;
        }
        let popped = sinks.pop();
        log::trace!(target: "markup.writer", "pop: depth {}", sinks.len());
        popped
    }

    pub fn depth(&self) -> usize {
        self.lock().len()
    }

    /// Run `f` with a capture sink on top of the stack. The sink is popped
    /// again even when `f` panics.
    pub fn grab<R>(&self, f: impl FnOnce() -> R) -> Grabbed<R> {
        let capture = Arc::new(Mutex::new(CaptureSink::default()));
        let sink: SharedSink = capture.clone();
        self.push(sink.clone());
        let result = {
            let _guard = PopGuard {
                stack: self,
                expected: sink,
            };
            f()
        };
        let chunks = capture.lock().unwrap_or_else(PoisonError::into_inner).take();
        Grabbed { chunks, result }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<SharedSink>> {
        self.sinks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for WriterStack {
    fn default() -> Self {
        Self::new(WriterStackConfig::default())
    }
}

impl SinkResolver for WriterStack {
    fn current_sink(&self) -> Option<SharedSink> {
        self.lock().last().cloned()
    }
}

struct PopGuard<'a> {
    stack: &'a WriterStack,
    expected: SharedSink,
}

impl Drop for PopGuard<'_> {
    fn drop(&mut self) {
        match self.stack.pop() {
            Some(popped) if Arc::ptr_eq(&popped, &self.expected) => {}
            _ => log::warn!(target: "markup.writer", "grab: stack was unbalanced by the grabbed closure"),
        }
    }
}
