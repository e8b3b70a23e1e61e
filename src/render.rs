use std::path::PathBuf;

use crate::config::{Config, Thresholds};
use crate::history::{HistorySeries, Metric};
use crate::protocol::{
    self, bold, divider, divider_styled, graph, grey, mini_progress, progress, sparkline, Action,
    ActionFlags, Line, Status,
};
use crate::snapshot::{truncated_percent, Sample};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Layout {
    #[default]
    Compact,
    Extended,
}

impl Layout {
    pub fn from_extended(extended: bool) -> Self {
        if extended {
            Layout::Extended
        } else {
            Layout::Compact
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Histories {
    pub memory: HistorySeries,
    pub swap: Option<HistorySeries>,
}

pub fn classify(used_percent: u64, thresholds: &Thresholds) -> Status {
    if used_percent < thresholds.warn_percent {
        Status::Ok
    } else if used_percent < thresholds.error_percent {
        Status::Warn
    } else {
        Status::Error
    }
}

pub struct Renderer {
    pub title: String,
    pub refresh_secs: u64,
    pub thresholds: Thresholds,
    pub history_dir: PathBuf,
}

impl Renderer {
    pub fn new(cfg: &Config, history_dir: PathBuf) -> Self {
        Self {
            title: cfg.general.title.clone(),
            refresh_secs: cfg.general.refresh_secs,
            thresholds: cfg.thresholds,
            history_dir,
        }
    }

    pub fn render(&self, sample: &Sample, histories: &Histories, layout: Layout) -> Vec<Line> {
        let mut out = vec![
            Line::Title(self.title.clone()),
            Line::Refresh(self.refresh_secs),
        ];
        match layout {
            Layout::Compact => self.compact(sample, histories, &mut out),
            Layout::Extended => self.extended(sample, histories, &mut out),
        }
        out.extend(self.actions(sample).into_iter().map(Line::Action));
        out
    }

    fn compact(&self, sample: &Sample, histories: &Histories, out: &mut Vec<Line>) {
        let mem = &sample.memory;
        let pct = mem.used_percent();
        let status = classify(pct, &self.thresholds);

        out.push(Line::row(format!(
            "{} Memory: {}MB / {}MB {}",
            protocol::status(status),
            mem.used,
            mem.total,
            sparkline(&histories.memory, "yellow")
        )));
        out.push(Line::row(progress(pct)));
        out.push(Line::blank());

        out.push(Line::row(bold("Memory Breakdown:")));
        out.push(Line::table(["Type", "Usage"]));
        out.push(Line::table_row(["RAM Used".to_string(), mini_progress(pct, 12)]));
        if mem.swap_configured() {
            out.push(Line::table_row([
                "Swap Used".to_string(),
                mini_progress(mem.swap_percent(), 12),
            ]));
        } else {
            out.push(Line::table_row(["Swap".to_string(), grey("Not configured")]));
        }
        out.push(Line::table_row([
            "Cache".to_string(),
            format!("{}MB", mem.buffers + mem.cached),
        ]));
        out.push(Line::table_row([
            "Available".to_string(),
            format!("{}MB", mem.available),
        ]));

        out.push(Line::blank());
        out.push(Line::row(grey(&format!(
            "Available: {}MB ({}%)",
            mem.available,
            mem.share_of_total(mem.available)
        ))));
    }

    fn extended(&self, sample: &Sample, histories: &Histories, out: &mut Vec<Line>) {
        let mem = &sample.memory;
        let pct = mem.used_percent();
        let status = classify(pct, &self.thresholds);

        out.push(Line::row(format!(
            "{} Memory: {}MB / {}MB ({pct}%)",
            protocol::status(status),
            mem.used,
            mem.total
        )));
        out.push(Line::row(progress(pct)));
        out.push(Line::blank());
        out.push(Line::row(format!("Available: {}MB", mem.available)));

        section(out, "Memory Usage History (last 60s):");
        out.push(Line::row(graph(&histories.memory, "yellow", "Memory %")));

        if let Some(swap) = histories.swap.as_ref().filter(|_| mem.swap_configured()) {
            if !swap.is_empty() {
                out.push(Line::blank());
                out.push(Line::row(bold("Swap Usage History:")));
                out.push(Line::row(graph(swap, "red", "Swap %")));
            }
        }

        section(out, "Memory Breakdown:");
        out.push(Line::table(["Type", "Size", "Percentage"]));
        out.push(Line::table_row([
            "Total RAM".to_string(),
            format!("{}MB", mem.total),
            "100%".to_string(),
        ]));
        out.push(Line::table_row([
            "Used".to_string(),
            format!("{}MB", mem.used),
            mini_progress(pct, 10),
        ]));
        for (label, value) in [
            ("Available", mem.available),
            ("Buffers", mem.buffers),
            ("Cache", mem.cached),
        ] {
            out.push(Line::table_row([
                label.to_string(),
                format!("{value}MB"),
                format!("{}%", mem.share_of_total(value)),
            ]));
        }

        if mem.swap_configured() {
            let swap_free = mem.swap_free();
            out.push(Line::table_row([
                "Swap Total".to_string(),
                format!("{}MB", mem.swap_total),
                "100%".to_string(),
            ]));
            out.push(Line::table_row([
                "Swap Used".to_string(),
                format!("{}MB", mem.swap_used),
                mini_progress(mem.swap_percent(), 10),
            ]));
            out.push(Line::table_row([
                "Swap Free".to_string(),
                format!("{swap_free}MB"),
                format!("{}%", truncated_percent(swap_free, mem.swap_total)),
            ]));
        }

        section(out, "Advanced Details:");
        out.push(Line::table(["Metric", "Value"]));
        for (label, value) in [
            ("Active", mem.active),
            ("Inactive", mem.inactive),
            ("Shared", sample.shared_mb),
            ("Dirty", mem.dirty),
            ("Slab (kernel)", mem.slab),
        ] {
            out.push(Line::table_row([label.to_string(), format!("{value}MB")]));
        }

        if mem.swap_configured() && !sample.swap_partitions.is_empty() {
            section(out, "Swap Partitions:");
            out.push(Line::table(["Device", "Type", "Size", "Used", "Priority"]));
            for p in &sample.swap_partitions {
                out.push(Line::table_row([
                    p.device.clone(),
                    p.kind.clone(),
                    format!("{}MB", p.size_mb),
                    format!("{}MB", p.used_mb),
                    p.priority.clone(),
                ]));
            }
        }

        if !sample.processes.is_empty() {
            section(out, "Top Memory Processes:");
            out.push(Line::table(["Process", "Memory", "Percent", "PID"]));
            for p in &sample.processes {
                out.push(Line::table_row([
                    p.name.clone(),
                    format!("{}MB", p.resident_mb),
                    format!("{:.1}%", p.percent),
                    p.pid.to_string(),
                ]));
            }
        }

        if let Some(pressure) = &sample.pressure {
            section(out, "Memory Pressure:");
            out.push(Line::table(["Type", "10s avg", "60s avg"]));
            for (label, avgs) in [("Some stall", &pressure.some), ("Full stall", &pressure.full)] {
                out.push(Line::table_row([
                    label.to_string(),
                    format!("{}%", avgs.avg10.as_deref().unwrap_or("0.00")),
                    format!("{}%", avgs.avg60.as_deref().unwrap_or("0.00")),
                ]));
            }
        }

        if mem.huge_pages_total > 0 {
            out.push(Line::blank());
            out.push(Line::row(divider_styled('─', "cyan1")));
            out.push(Line::blank());
            out.push(Line::row(bold("Huge Pages:")));
            out.push(Line::table(["Metric", "Value"]));
            out.push(Line::table_row(["Total".to_string(), mem.huge_pages_total.to_string()]));
            out.push(Line::table_row(["Free".to_string(), mem.huge_pages_free.to_string()]));
            out.push(Line::table_row([
                "Reserved".to_string(),
                mem.huge_pages_reserved.to_string(),
            ]));
            out.push(Line::table_row([
                "Page Size".to_string(),
                format!("{}KB", mem.huge_page_size_kb),
            ]));
        }
    }

    /// Remediation actions. Kill and clear-swap are conditional; the rest
    /// are always offered.
    pub fn actions(&self, sample: &Sample) -> Vec<Action> {
        let mem = &sample.memory;
        let mut actions = Vec::new();

        if mem.used_percent() > self.thresholds.kill_percent {
            if let Some(top) = &sample.kill_candidate {
                actions.push(Action::new(
                    ActionFlags::DESTRUCTIVE,
                    format!("Kill {} ({})", top.name, top.pid),
                    format!("kill -9 {}", top.pid),
                ));
            }
        }

        if mem.swap_configured() && mem.swap_percent() > self.thresholds.swap_clear_percent {
            actions.push(Action::new(
                ActionFlags::DESTRUCTIVE,
                "Clear swap",
                "swapoff -a && swapon -a",
            ));
        }

        actions.push(Action::new(
            ActionFlags::PRIVILEGED,
            "Drop caches",
            "sh -c 'sync && echo 3 > /proc/sys/vm/drop_caches' && echo 'Caches dropped'",
        ));
        actions.push(Action::new(
            ActionFlags::NONE,
            "View memory map",
            "cat /proc/meminfo",
        ));
        actions.push(Action::new(
            ActionFlags::NONE,
            "Show OOM killer history",
            "dmesg | grep -i 'killed process' | tail -10",
        ));

        let files: Vec<String> = Metric::ALL
            .iter()
            .map(|m| self.history_dir.join(m.file_name()).display().to_string())
            .collect();
        actions.push(Action::new(
            ActionFlags::NONE,
            "Clear memory history",
            format!("rm -f {}", files.join(" ")),
        ));
        actions
    }
}

fn section(out: &mut Vec<Line>, heading: &str) {
    out.push(Line::blank());
    out.push(Line::row(divider()));
    out.push(Line::blank());
    out.push(Line::row(bold(heading)));
}
