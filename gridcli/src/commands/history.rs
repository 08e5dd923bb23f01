//! Consumption history files.
use super::*;

use gridlib::io::fs::write_history_file;
use gridlib::io::HistoricalDataPoint;

impl HistoryCommand {
    pub fn run(self) {
        match self {
            HistoryCommand::Add {
                history,
                timestamp,
                consumption,
                order,
            } => {
                let point = HistoricalDataPoint {
                    timestamp,
                    consumption,
                };
                if let Err(err) = point.validate() {
                    fatal_error!(1, "Cannot add history entry: {}", err);
                }
                let mut tree = read_history(&history, order);
                tree.insert(timestamp, consumption);
                if let Err(err) = write_history_file(&history, &tree) {
                    fatal_error!(1, "Cannot save history {}: {}", history.display(), err);
                }
                println!("{:14}{}", "Entries:".bold(), tree.len());
            }
            HistoryCommand::Range {
                history,
                from,
                to,
                json,
            } => {
                if from > to {
                    fatal_error!(1, "Range start {} is after its end {}", from, to);
                }
                let tree = read_history(&history, 4);
                let points: Vec<HistoricalDataPoint> = tree
                    .range_query(from, to)
                    .into_iter()
                    .map(|kv| HistoricalDataPoint {
                        timestamp: kv.key,
                        consumption: kv.value,
                    })
                    .collect();
                if json {
                    print_json(&points);
                    return;
                }
                for point in &points {
                    println!("{:>16}  {:.2}", point.timestamp, point.consumption);
                }
                println!("{:14}{}", "Total:".bold(), points.len());
            }
            HistoryCommand::Tree { history } => {
                let tree = read_history(&history, 4);
                print_json(&tree.tree_structure());
            }
            HistoryCommand::Stats { history } => {
                let stats = read_history(&history, 4).stats();
                println!("{:14}{}", "Order:".bold(), stats.order);
                println!("{:14}{}", "Keys:".bold(), stats.total_keys);
                println!("{:14}{}", "Height:".bold(), stats.height);
                println!("{:14}{}", "Leaves:".bold(), stats.leaf_count);
            }
        }
    }
}
