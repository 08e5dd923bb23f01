//! Running simulation cycles on a network file.
use super::*;

use gridlib::io::fs::{read_events_file, write_network_file};
use gridlib::simulation::{LogLevel, SimulationResult};
use gridlib::{Config, GridContext};

fn print_cycle(cycle: usize, result: &SimulationResult) {
    let count = |level: LogLevel| result.logs.iter().filter(|l| l.level == level).count();

    println!("{}", format!("Cycle {}", cycle).bold().underline());
    println!("{:14}{:.2}", "Losses:".bold(), result.metrics.losses);
    println!("{:14}{:.2}%", "Efficiency:".bold(), result.metrics.efficiency);
    println!("{:14}{:.2}", "Consumption:".bold(), result.metrics.consumption);
    println!(
        "{:14}{} to apply, {} alerts",
        "Pending:".bold(),
        result.pending_events.fifo,
        result.pending_events.heap
    );
    let errors = count(LogLevel::Error);
    let warnings = count(LogLevel::Warning);
    if errors > 0 {
        println!("{:14}{}", "Errors:".bold(), errors.to_string().red());
    }
    if warnings > 0 {
        println!("{:14}{}", "Warnings:".bold(), warnings.to_string().yellow());
    }
}

impl Simulate {
    pub fn run(self) {
        let Simulate {
            network,
            events,
            cycles,
            demo_events,
            config,
            json,
            save,
        } = self;

        let config = match config {
            Some(path) => match Config::read_from_file(&path) {
                Ok(config) => config,
                Err(err) => fatal_error!(1, "Cannot read config {}: {}", path.display(), err),
            },
            None => Config::default(),
        };
        let history = match BPlusTree::new(config.history_order) {
            Ok(history) => history,
            Err(err) => fatal_error!(1, "Invalid configuration: {}", err),
        };
        let mut context = GridContext::from_parts(read_network(&network), history, config);

        if let Some(path) = events {
            let events = match read_events_file(&path) {
                Ok(events) => events,
                Err(err) => fatal_error!(1, "Cannot read events {}: {}", path.display(), err),
            };
            log::info!("Queued {} events from {}", events.len(), path.display());
            for event in events {
                context.add_event(event);
            }
        }

        let mut results = Vec::with_capacity(cycles);
        for cycle in 1..=cycles {
            let result = context.run_cycle(demo_events);
            if !json {
                print_cycle(cycle, &result);
            }
            results.push(result);
        }
        if json {
            print_json(&results);
        }

        if let Some(path) = save {
            if let Err(err) = write_network_file(&path, &context.graph) {
                fatal_error!(1, "Cannot save network to {}: {}", path.display(), err);
            }
        }
    }
}
