//! One pass of the widget: sample, update history, render, write.

use std::io::{self, Write};
use std::path::PathBuf;

use crate::command::{CommandRunner, SystemRunner};
use crate::config::Config;
use crate::history::{HistoryStore, Metric};
use crate::protocol::Line;
use crate::render::{Histories, Layout, Renderer};
use crate::sampler::Sampler;
use crate::snapshot::Sample;

pub struct Widget<R = SystemRunner> {
    sampler: Sampler<R>,
    history: HistoryStore,
    renderer: Renderer,
    compact_samples: usize,
    extended_samples: usize,
    process_limit: usize,
}

impl Widget<SystemRunner> {
    pub fn new(cfg: &Config, history_dir: PathBuf) -> Self {
        Self::with_runner(cfg, history_dir, SystemRunner)
    }
}

impl<R: CommandRunner> Widget<R> {
    pub fn with_runner(cfg: &Config, history_dir: PathBuf, runner: R) -> Self {
        Self {
            sampler: Sampler::with_runner(cfg.sources.clone(), runner),
            renderer: Renderer::new(cfg, history_dir.clone()),
            history: HistoryStore::new(history_dir),
            compact_samples: cfg.history.samples(false),
            extended_samples: cfg.history.samples(true),
            process_limit: cfg.sources.process_limit,
        }
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Collects only what `layout` will show. Outside the process table,
    /// `ps` runs only to find a kill candidate.
    pub fn sample(&self, layout: Layout) -> Sample {
        let memory = self.sampler.read_memory_snapshot();
        let mut sample = Sample {
            memory,
            ..Sample::default()
        };

        if layout == Layout::Extended {
            sample.shared_mb = self.sampler.read_shared_memory();
            if memory.swap_configured() {
                sample.swap_partitions = self.sampler.read_swap_partitions();
            }
            sample.processes = self.sampler.read_top_processes(self.process_limit);
            sample.pressure = self.sampler.read_pressure();
        }

        if memory.used_percent() > self.renderer.thresholds.kill_percent {
            sample.kill_candidate = match sample.processes.first() {
                Some(top) => Some(top.clone()),
                None => self.sampler.read_top_processes(1).into_iter().next(),
            };
        }
        sample
    }

    pub fn record(&self, sample: &Sample, layout: Layout) -> Histories {
        let window = match layout {
            Layout::Compact => self.compact_samples,
            Layout::Extended => self.extended_samples,
        };
        let mem = &sample.memory;
        let memory = self
            .history
            .record_and_read(Metric::MemoryPercent, mem.used_percent() as i64, window);
        let swap = mem.swap_configured().then(|| {
            self.history
                .record_and_read(Metric::SwapPercent, mem.swap_percent() as i64, window)
        });
        Histories { memory, swap }
    }

    pub fn lines(&self, layout: Layout) -> Vec<Line> {
        let sample = self.sample(layout);
        let histories = self.record(&sample, layout);
        tracing::debug!(
            used_percent = sample.memory.used_percent(),
            history_len = histories.memory.len(),
            "sampled memory"
        );
        self.renderer.render(&sample, &histories, layout)
    }

    pub fn run<W: Write>(&self, layout: Layout, out: &mut W) -> io::Result<()> {
        for line in self.lines(layout) {
            writeln!(out, "{line}")?;
        }
        out.flush()
    }
}
