//! Load a user's route for today and this week's leaderboard.
//!
//! Run with: cargo run --example route_report --features http -- <user-id>
//!
//! Set ROUTE_VIEWER_BASE_URL to point at another backend.

use route_viewer::stats::{format_km, ranked, LeaderboardPeriod};
use route_viewer::{ClientConfig, DateRange, RouteView, TrackerClient, ViewState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let user_id: i64 = std::env::args()
        .nth(1)
        .ok_or("usage: route_report <user-id>")?
        .parse()?;

    let client = TrackerClient::new(ClientConfig::from_env()?)?;

    let mut view = RouteView::new();
    client.load_route_view(&mut view, user_id, DateRange::today()).await;

    match view.state() {
        ViewState::Ready => {
            for stats in view.summary().stats() {
                println!(
                    "{}: {:.0} m in {} min",
                    stats.session_id, stats.distance, stats.duration_minutes()
                );
            }
            println!("Total: {:.0} m", view.active_distance());
        }
        _ => println!("{}", view.message().unwrap_or("nothing loaded")),
    }

    match client.fetch_leaderboards(LeaderboardPeriod::default()).await {
        Ok(boards) => {
            println!("\nTop riders ({})", boards.period.as_str());
            for (rank, user) in ranked(&boards.top_users) {
                println!("{:>2}. {:<20} {}", rank, user.username, format_km(user.distance));
            }
        }
        Err(err) if err.is_no_data() => println!("\nNo leaderboard data yet"),
        Err(err) => println!("\nLeaderboard unavailable: {}", err.user_message()),
    }

    Ok(())
}
