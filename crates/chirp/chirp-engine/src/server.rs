//! Producer/consumer orchestration over one shared feed.
//!
//! ```text
//!  input ──► producer ──enqueue──► LockFreeQueue ──dequeue──► worker 0..W ──► sink
//!               │                                                ▲
//!               └──────────── Semaphore::up ─── Semaphore::down ─┘
//! ```
//!
//! Sequential runs skip the queue entirely: each request is applied and
//! answered before the next one is read.

use chirp_config::{ConfigError, Mode, ServerConfig};
use chirp_feed::Feed;
use chirp_sync::LockFreeQueue;
use chirp_wire::{Request, RequestStream, ResponseSink};
use std::io::{self, Read, Write};
use std::thread;
use tracing::{debug, error, info, trace, warn};

use crate::context::SharedContext;
use crate::dispatch;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to spawn worker {worker}")]
    Spawn {
        worker: usize,
        #[source]
        source: io::Error,
    },
}

/// What stopped input consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ending {
    /// A `DONE` request.
    Done,
    /// End of input, or the first request that failed to decode.
    EndOfInput,
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub mode: Mode,
    pub workers: usize,
    /// Requests applied to the feed. `DONE` is not counted.
    pub requests: usize,
    pub responses: usize,
    pub write_failures: usize,
    pub ending: Ending,
}

pub struct Server {
    config: ServerConfig,
    feed: Feed,
}

impl Server {
    /// Builds a server over an empty feed. `config` is validated first, so
    /// a zero reader cap or a parallel run without workers is rejected here.
    pub fn new(config: ServerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let feed = Feed::with_reader_cap(config.reader_cap);
        Ok(Self { config, feed })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn feed(&self) -> &Feed {
        &self.feed
    }

    /// Consumes `input` until `DONE` or end of input and returns once every
    /// response has been written and every worker has exited.
    pub fn run<R, W>(&self, input: R, sink: &ResponseSink<W>) -> Result<RunReport, EngineError>
    where
        R: Read,
        W: Write + Send,
    {
        let requests = RequestStream::new(input);
        info!(mode = ?self.config.mode, workers = self.config.workers, "run starting");
        let report = match self.config.mode {
            Mode::Sequential => Ok(self.run_sequential(requests, sink)),
            Mode::Parallel => self.run_parallel(requests, sink),
        }?;
        info!(
            requests = report.requests,
            responses = report.responses,
            write_failures = report.write_failures,
            ending = ?report.ending,
            "run finished"
        );
        Ok(report)
    }

    fn run_sequential<R: Read, W: Write>(
        &self,
        requests: RequestStream<R>,
        sink: &ResponseSink<W>,
    ) -> RunReport {
        let mut report = RunReport {
            mode: Mode::Sequential,
            workers: 1,
            requests: 0,
            responses: 0,
            write_failures: 0,
            ending: Ending::EndOfInput,
        };

        for request in requests {
            if request.is_done() {
                report.ending = Ending::Done;
                break;
            }
            report.requests += 1;
            if self.respond(&request, sink) {
                report.responses += 1;
            } else {
                report.write_failures += 1;
            }
        }
        report
    }

    fn run_parallel<R: Read, W: Write + Send>(
        &self,
        requests: RequestStream<R>,
        sink: &ResponseSink<W>,
    ) -> Result<RunReport, EngineError> {
        let ctx = SharedContext::new(self.config.workers);
        let queue = LockFreeQueue::new();

        let (ending, handled) = thread::scope(|s| {
            let mut handles = Vec::with_capacity(ctx.workers());
            for worker in 0..ctx.workers() {
                let (ctx, queue) = (&ctx, &queue);
                let spawned = thread::Builder::new()
                    .name(format!("chirp-worker-{worker}"))
                    .spawn_scoped(s, move || self.consume(worker, queue, ctx, sink));
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(source) => {
                        error!(worker, error = %source, "failed to spawn worker");
                        // Release whoever did start before bailing out.
                        ctx.shut_down();
                        join_workers(handles);
                        return Err(EngineError::Spawn { worker, source });
                    }
                }
            }

            let ending = self.produce(requests, &queue, &ctx);
            Ok((ending, join_workers(handles)))
        })?;

        Ok(RunReport {
            mode: Mode::Parallel,
            workers: ctx.workers(),
            requests: handled,
            responses: ctx.responses(),
            write_failures: ctx.write_failures(),
            ending,
        })
    }

    /// Reads requests until `DONE` or end of input. Either way the workers
    /// are flooded so they all observe shutdown once the queue drains.
    fn produce<R: Read>(
        &self,
        requests: RequestStream<R>,
        queue: &LockFreeQueue<Request>,
        ctx: &SharedContext,
    ) -> Ending {
        for request in requests {
            if request.is_done() {
                debug!(id = request.id, "done received, shutting down workers");
                ctx.shut_down();
                return Ending::Done;
            }
            queue.enqueue(request);
            ctx.signal_work();
        }
        debug!("input exhausted, shutting down workers");
        ctx.shut_down();
        Ending::EndOfInput
    }

    /// Worker loop. Returns the number of requests this worker handled.
    fn consume<W: Write>(
        &self,
        worker: usize,
        queue: &LockFreeQueue<Request>,
        ctx: &SharedContext,
        sink: &ResponseSink<W>,
    ) -> usize {
        debug!(worker, "worker started");
        let mut handled = 0;
        loop {
            ctx.wait_for_work();
            match queue.dequeue() {
                Some(request) => {
                    ctx.record_response(self.respond(&request, sink));
                    handled += 1;
                }
                None if ctx.is_shutdown() => break,
                // Woken without work and without shutdown; wait again.
                None => continue,
            }
        }
        debug!(worker, handled, "worker exiting");
        handled
    }

    /// Applies `request` and writes its response. Returns whether the write
    /// succeeded; failures are logged and otherwise ignored.
    fn respond<W: Write>(&self, request: &Request, sink: &ResponseSink<W>) -> bool {
        let response = dispatch::apply(request, &self.feed);
        trace!(id = request.id, command = ?request.command, "request applied");
        match sink.send(&response) {
            Ok(()) => true,
            Err(err) => {
                warn!(id = request.id, error = %err, "failed to write response");
                false
            }
        }
    }
}

/// Waits for every worker; the sum of their handled counts.
fn join_workers(handles: Vec<thread::ScopedJoinHandle<'_, usize>>) -> usize {
    handles
        .into_iter()
        .map(|handle| match handle.join() {
            Ok(handled) => handled,
            Err(panic) => std::panic::resume_unwind(panic),
        })
        .sum()
}
