//! Group a day of samples into sessions and print per-session stats.
//!
//! Run with: cargo run --example session_summary

use route_viewer::sessions::group_and_measure;
use route_viewer::{active_distance_total, LocationSample, Visibility};

fn main() {
    // Morning commute and an evening loop around Saint Petersburg
    let samples = vec![
        LocationSample::new("commute", 59.9386, 30.3141, 1_717_221_600),
        LocationSample::new("commute", 59.9420, 30.3250, 1_717_221_900),
        LocationSample::new("evening", 59.9700, 30.3000, 1_717_264_800),
        LocationSample::new("commute", 59.9500, 30.3400, 1_717_222_200),
        LocationSample::new("evening", 59.9750, 30.3100, 1_717_265_400),
        LocationSample::new("evening", 59.9700, 30.3000, 1_717_266_000),
    ];

    let summary = group_and_measure(&samples);

    println!("Sessions\n");
    for stats in summary.stats() {
        println!(
            "  {:<8} {:>2} samples  {:>7.1} m  {:>3} min  {:>5.1} km/h",
            stats.session_id.as_str(),
            stats.sample_count,
            stats.distance,
            stats.duration_minutes(),
            stats.average_speed_kmh,
        );
    }

    let mut visible = Visibility::all_visible(summary.groups.keys());
    println!("\nAll visible:   {:.1} m", active_distance_total(&summary.distances, &visible));

    visible.toggle(&"evening".into());
    println!("Commute only:  {:.1} m", active_distance_total(&summary.distances, &visible));
}
